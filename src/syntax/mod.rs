//! Syntax highlighting for card template code
//!
//! This module provides:
//! - Style and color types (`style`, `color`, `theme`)
//! - The rule table and per-line carry state (`rules`, `builtin`)
//! - The shared quote/comment lexer (`lexer`)
//! - The line highlighter and the document driver

pub mod color;
pub mod lexer;
mod builtin;
mod highlighter;
mod manager;
mod rules;
mod style;
mod theme;
mod tokens;

pub use builtin::template_rules;
pub use highlighter::{LineHighlighter, DEFAULT_SCAN_LIMIT};
pub use manager::{split_lines, DocumentHighlighter, HighlightCache};
pub use rules::{BlockKind, Guard, HighlightResult, LineState, RuleTable, StyleRule};
pub use style::{Color, Span, Style, Underline, UnderlineStyle};
pub use theme::Theme;
pub use tokens::TokenType;
