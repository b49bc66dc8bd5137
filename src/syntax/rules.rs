//! Pattern rules for syntax highlighting
//!
//! This module defines the rule types used to classify template code,
//! the multi-line block kinds, and the per-line carry state.

use std::ops::Range;

use regex::Regex;
use tracing::error;

use super::style::Span;
use super::tokens::TokenType;
use crate::error::Result;

/// Condition on the text right after a match
///
/// Stands in for a trailing lookahead, which `regex` does not support.
#[derive(Debug, Clone)]
pub enum Guard {
    /// Accept only if the remainder starts with this pattern
    FollowedBy(Regex),
    /// Reject if the remainder starts with this pattern
    NotFollowedBy(Regex),
}

impl Guard {
    fn anchored(pattern: &str) -> Result<Regex> {
        Ok(Regex::new(&format!("^(?:{})", pattern))?)
    }

    fn accepts(&self, rest: &str) -> bool {
        match self {
            Guard::FollowedBy(re) => re.is_match(rest),
            Guard::NotFollowedBy(re) => !re.is_match(rest),
        }
    }
}

/// A single-line pattern rule
///
/// Rules run in table order and later rules paint over earlier ones.
/// A pattern with capture groups paints only its groups, so it can
/// anchor on context and color just the captured part.
#[derive(Debug, Clone)]
pub struct StyleRule {
    /// Name for debugging
    pub name: String,
    /// Compiled regex pattern
    pub pattern: Regex,
    /// Token type to assign to matches
    pub token_type: TokenType,
    /// Also applied inside comments and strings
    pub in_comments: bool,
    /// Optional trailing condition
    pub guard: Option<Guard>,
}

impl StyleRule {
    /// Create a new rule
    pub fn new(name: &str, pattern: &str, token_type: TokenType) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            pattern: Regex::new(pattern)?,
            token_type,
            in_comments: false,
            guard: None,
        })
    }

    /// Builder: require the match to be followed by `pattern`
    pub fn followed_by(mut self, pattern: &str) -> Result<Self> {
        self.guard = Some(Guard::FollowedBy(Guard::anchored(pattern)?));
        Ok(self)
    }

    /// Builder: reject the match when followed by `pattern`
    pub fn not_followed_by(mut self, pattern: &str) -> Result<Self> {
        self.guard = Some(Guard::NotFollowedBy(Guard::anchored(pattern)?));
        Ok(self)
    }

    /// Builder: also apply inside comments and strings
    pub fn in_comments(mut self) -> Self {
        self.in_comments = true;
        self
    }

    /// Byte ranges this rule paints in `text`
    pub fn paint_ranges(&self, text: &str) -> Vec<Range<usize>> {
        let mut ranges = Vec::new();
        let grouped = self.pattern.captures_len() > 1;
        let mut pos = 0;

        while pos <= text.len() {
            let Some(caps) = self.pattern.captures_at(text, pos) else {
                break;
            };
            let Some(whole) = caps.get(0) else {
                break;
            };

            let accepted = self
                .guard
                .as_ref()
                .map_or(true, |g| g.accepts(&text[whole.end()..]));

            if !accepted {
                pos = next_boundary(text, whole.start());
                continue;
            }

            if grouped {
                ranges.extend(
                    caps.iter()
                        .skip(1)
                        .flatten()
                        .filter(|m| !m.is_empty())
                        .map(|m| m.range()),
                );
            } else if !whole.is_empty() {
                ranges.push(whole.range());
            }

            pos = if whole.is_empty() {
                next_boundary(text, whole.end())
            } else {
                whole.end()
            };
        }

        ranges
    }
}

/// Ordered list of style rules
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: Vec<StyleRule>,
}

impl RuleTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule; a rule that failed to build is logged and skipped
    pub fn push(&mut self, rule: Result<StyleRule>) {
        match rule {
            Ok(rule) => self.rules.push(rule),
            Err(e) => error!(error = %e, "skipping highlight rule"),
        }
    }

    /// All rules, in priority order (every rule applies to plain code)
    pub fn rules(&self) -> &[StyleRule] {
        &self.rules
    }

    /// Rules that also apply inside comments and strings
    pub fn comment_rules(&self) -> impl Iterator<Item = &StyleRule> {
        self.rules.iter().filter(|r| r.in_comments)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Byte offset of the char boundary after `pos` (or one past the end)
fn next_boundary(text: &str, pos: usize) -> usize {
    text[pos..]
        .chars()
        .next()
        .map_or(text.len() + 1, |c| pos + c.len_utf8())
}

/// A construct that can stay open across lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    /// `<!-- ... -->`
    HtmlComment,
    /// `/* ... */`
    BlockComment,
    /// `` ` ... ` ``
    TemplateLiteral,
}

impl BlockKind {
    /// Token that opens the block
    pub fn start_token(&self) -> &'static str {
        match self {
            BlockKind::HtmlComment => "<!--",
            BlockKind::BlockComment => "/*",
            BlockKind::TemplateLiteral => "`",
        }
    }

    /// Token that closes the block
    pub fn end_token(&self) -> &'static str {
        match self {
            BlockKind::HtmlComment => "-->",
            BlockKind::BlockComment => "*/",
            BlockKind::TemplateLiteral => "`",
        }
    }

    /// Style class for the whole block
    pub fn token_type(&self) -> TokenType {
        match self {
            BlockKind::HtmlComment | BlockKind::BlockComment => TokenType::Comment,
            BlockKind::TemplateLiteral => TokenType::StringMultiline,
        }
    }
}

/// Line state for tracking multi-line constructs
///
/// This is the only state carried from one line to the next.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineState {
    /// Block left open at the end of the previous line
    pub open_block: Option<BlockKind>,
}

impl LineState {
    /// Create state for being inside a block
    pub fn inside(kind: BlockKind) -> Self {
        Self {
            open_block: Some(kind),
        }
    }

    /// Check if we're inside a multi-line block
    pub fn is_inside_block(&self) -> bool {
        self.open_block.is_some()
    }

    /// Check if we're in normal (no open block) state
    pub fn is_normal(&self) -> bool {
        self.open_block.is_none()
    }
}

/// Result of highlighting a single line
#[derive(Debug, Clone, PartialEq)]
pub struct HighlightResult {
    /// Spans of styled text in this line
    pub spans: Vec<Span>,
    /// State at end of line (for next line)
    pub end_state: LineState,
}
