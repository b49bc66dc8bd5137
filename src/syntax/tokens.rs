//! Token types for syntax highlighting
//!
//! This module defines the style classes the template highlighter paints
//! and the palette keys used to color them.

use super::style::{Color, Style};

/// Semantic token types for syntax highlighting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TokenType {
    /// Plain text (`&&`, `||`)
    Text,
    /// Reserved for error markers
    Error,
    /// Template field references (`{{Front}}`, `%%`)
    AnkiField,
    /// `{` and `}`
    BracketsCurly,
    /// `(` and `)`
    BracketsRound,
    /// `[` and `]`
    BracketsSquare,
    /// Comments (`<!-- -->`, `/* */`, `//`)
    Comment,
    /// CSS id selectors and `id="..."` values
    CssId,
    /// CSS class selectors and `class="..."` values
    CssClass,
    /// CSS property names
    CssProperty,
    /// HTML attribute names
    HtmlTagAttr,
    /// HTML tag names and entities
    HtmlTag,
    /// Operators and keywords worth a second look
    KeywordAttention,
    /// Block keywords (`for`, `while`, `try`)
    KeywordBlock,
    /// JavaScript keywords
    Keyword,
    /// Identifiers
    Name,
    /// Function call names
    NameFunction,
    /// Numeric literals and hex colors
    Number,
    /// String literals
    String,
    /// Template literals spanning lines
    StringMultiline,
}

impl TokenType {
    /// Every token type, in palette order
    pub const ALL: [TokenType; 20] = [
        TokenType::Text,
        TokenType::Error,
        TokenType::AnkiField,
        TokenType::BracketsCurly,
        TokenType::BracketsRound,
        TokenType::BracketsSquare,
        TokenType::Comment,
        TokenType::CssId,
        TokenType::CssClass,
        TokenType::CssProperty,
        TokenType::HtmlTagAttr,
        TokenType::HtmlTag,
        TokenType::KeywordAttention,
        TokenType::KeywordBlock,
        TokenType::Keyword,
        TokenType::Name,
        TokenType::NameFunction,
        TokenType::Number,
        TokenType::String,
        TokenType::StringMultiline,
    ];

    /// Palette key for this token type
    pub fn key(&self) -> &'static str {
        match self {
            TokenType::Text => "text_color",
            TokenType::Error => "error_color",
            TokenType::AnkiField => "x_anki_field_color",
            TokenType::BracketsCurly => "x_brackets_curly_color",
            TokenType::BracketsRound => "x_brackets_round_color",
            TokenType::BracketsSquare => "x_brackets_square_color",
            TokenType::Comment => "x_comment_color",
            TokenType::CssId => "x_css_id_color",
            TokenType::CssClass => "x_css_class_color",
            TokenType::CssProperty => "x_css_property_color",
            TokenType::HtmlTagAttr => "x_html_tag_attr_color",
            TokenType::HtmlTag => "x_html_tag_color",
            TokenType::KeywordAttention => "x_keyword_attention_color",
            TokenType::KeywordBlock => "x_keyword_block_color",
            TokenType::Keyword => "x_keyword_color",
            TokenType::Name => "x_name_color",
            TokenType::NameFunction => "x_name_function_color",
            TokenType::Number => "x_number_color",
            TokenType::String => "x_string_color",
            TokenType::StringMultiline => "x_string_multiline_color",
        }
    }

    /// Parse a token type from its palette key (for TOML loading)
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.key() == key)
    }

    /// Whether this class is drawn in bold
    pub fn is_bold(&self) -> bool {
        matches!(self, TokenType::HtmlTag | TokenType::KeywordAttention)
    }

    /// Build the style for this class from a foreground color
    pub fn style_with(&self, fg: Color) -> Style {
        let style = Style::fg(fg);
        if self.is_bold() {
            style.with_bold()
        } else {
            style
        }
    }

    /// Default palette color, `#RRGGBB`
    pub fn default_hex(&self, dark: bool) -> &'static str {
        if dark {
            match self {
                TokenType::Text => "#D4D4D4",
                TokenType::Error => "#F44747",
                TokenType::AnkiField => "#FFA500",
                TokenType::BracketsCurly => "#DA70D6",
                TokenType::BracketsRound => "#FFD700",
                TokenType::BracketsSquare => "#179FFF",
                TokenType::Comment => "#6A9955",
                TokenType::CssId => "#D7BA7D",
                TokenType::CssClass => "#4EC9B0",
                TokenType::CssProperty => "#9CDCFE",
                TokenType::HtmlTagAttr => "#9CDCFE",
                TokenType::HtmlTag => "#569CD6",
                TokenType::KeywordAttention => "#FF6E6E",
                TokenType::KeywordBlock => "#C586C0",
                TokenType::Keyword => "#569CD6",
                TokenType::Name => "#D4D4D4",
                TokenType::NameFunction => "#DCDCAA",
                TokenType::Number => "#B5CEA8",
                TokenType::String => "#CE9178",
                TokenType::StringMultiline => "#D69D85",
            }
        } else {
            match self {
                TokenType::Text => "#000000",
                TokenType::Error => "#CD3131",
                TokenType::AnkiField => "#E65100",
                TokenType::BracketsCurly => "#AF00DB",
                TokenType::BracketsRound => "#795E26",
                TokenType::BracketsSquare => "#0451A5",
                TokenType::Comment => "#008000",
                TokenType::CssId => "#800000",
                TokenType::CssClass => "#267F99",
                TokenType::CssProperty => "#E50000",
                TokenType::HtmlTagAttr => "#E50000",
                TokenType::HtmlTag => "#800000",
                TokenType::KeywordAttention => "#D00000",
                TokenType::KeywordBlock => "#AF00DB",
                TokenType::Keyword => "#0000FF",
                TokenType::Name => "#001080",
                TokenType::NameFunction => "#795E26",
                TokenType::Number => "#098658",
                TokenType::String => "#A31515",
                TokenType::StringMultiline => "#A31515",
            }
        }
    }
}
