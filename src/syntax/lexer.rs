//! Quote and comment sub-lexer
//!
//! A small state machine that tells code apart from string literals and
//! comments. The line highlighter uses it to find block openers that are
//! not inside quotes, and the pair matcher uses it to skip brackets that
//! sit inside strings or comments.
//!
//! Rules:
//! - `'` and `"` strings end at the matching quote or at a newline.
//! - Template literals (`` ` ``) may span lines.
//! - A quote preceded by an odd number of backslashes is escaped.
//! - `//` opens a line comment unless it follows `:` (`http://`).
//! - `/* */` and `<!-- -->` comments may span lines.

use super::rules::BlockKind;

/// Lexical context at a position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexContext {
    /// Plain code
    Code,
    /// Inside a string opened by this quote character
    Quote(char),
    /// Inside a `//` comment
    LineComment,
    /// Inside `/* */`
    BlockComment,
    /// Inside `<!-- -->`
    HtmlComment,
}

/// Construct opened from plain code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opening {
    /// A block that may continue on later lines
    Block(BlockKind),
    /// `//` up to end of line
    LineComment,
}

impl Opening {
    /// Length of the opening token in bytes
    pub fn token_len(&self) -> usize {
        match self {
            Opening::Block(kind) => kind.start_token().len(),
            Opening::LineComment => 2,
        }
    }
}

/// Incremental quote/comment lexer
#[derive(Debug, Clone)]
pub struct Lexer {
    context: LexContext,
    /// Bytes of an already recognized delimiter still to be consumed
    skip: usize,
}

impl Lexer {
    /// Start in plain code
    pub fn new() -> Self {
        Self::with_context(LexContext::Code)
    }

    /// Start in a given context
    pub fn with_context(context: LexContext) -> Self {
        Self { context, skip: 0 }
    }

    /// Current context
    pub fn context(&self) -> LexContext {
        self.context
    }

    /// True when in code and not in the middle of a delimiter
    pub fn at_code(&self) -> bool {
        self.context == LexContext::Code && self.skip == 0
    }

    /// Consume the char `ch` found at byte `pos` of `text`
    ///
    /// Returns true when the char is plain code, i.e. not part of a
    /// string, comment or delimiter.
    pub fn step(&mut self, text: &str, pos: usize, ch: char) -> bool {
        if self.skip > 0 {
            self.skip = self.skip.saturating_sub(ch.len_utf8());
            return false;
        }

        let rest = &text[pos..];
        match self.context {
            LexContext::Code => match ch {
                '\'' | '"' | '`' if !is_escaped(text, pos) => {
                    self.context = LexContext::Quote(ch);
                    false
                }
                '/' if rest.starts_with("//") && !preceded_by_colon(text, pos) => {
                    self.enter(LexContext::LineComment, 1);
                    false
                }
                '/' if rest.starts_with("/*") => {
                    self.enter(LexContext::BlockComment, 1);
                    false
                }
                '<' if rest.starts_with("<!--") => {
                    self.enter(LexContext::HtmlComment, 3);
                    false
                }
                _ => true,
            },
            LexContext::Quote(q) => {
                if ch == '\n' && q != '`' {
                    self.context = LexContext::Code;
                    true
                } else {
                    if ch == q && !is_escaped(text, pos) {
                        self.context = LexContext::Code;
                    }
                    false
                }
            }
            LexContext::LineComment => {
                if ch == '\n' {
                    self.context = LexContext::Code;
                    true
                } else {
                    false
                }
            }
            LexContext::BlockComment => {
                if rest.starts_with("*/") {
                    self.enter(LexContext::Code, 1);
                }
                false
            }
            LexContext::HtmlComment => {
                if rest.starts_with("-->") {
                    self.enter(LexContext::Code, 2);
                }
                false
            }
        }
    }

    fn enter(&mut self, context: LexContext, skip: usize) {
        self.context = context;
        self.skip = skip;
    }
}

impl Default for Lexer {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether the char at `pos` is preceded by an odd run of backslashes
pub fn is_escaped(text: &str, pos: usize) -> bool {
    text.as_bytes()[..pos]
        .iter()
        .rev()
        .take_while(|&&b| b == b'\\')
        .count()
        % 2
        == 1
}

fn preceded_by_colon(text: &str, pos: usize) -> bool {
    pos > 0 && text.as_bytes()[pos - 1] == b':'
}

/// Find the first construct opened from plain code in `text`
///
/// `'` and `"` strings are stepped over, so an opener inside them is
/// ignored. Returns the byte offset of the opening token.
pub fn find_opening(text: &str) -> Option<(usize, Opening)> {
    let mut lexer = Lexer::new();
    for (pos, ch) in text.char_indices() {
        if !lexer.at_code() {
            lexer.step(text, pos, ch);
            continue;
        }
        lexer.step(text, pos, ch);
        let opening = match lexer.context() {
            LexContext::Quote('`') => Opening::Block(BlockKind::TemplateLiteral),
            LexContext::BlockComment => Opening::Block(BlockKind::BlockComment),
            LexContext::HtmlComment => Opening::Block(BlockKind::HtmlComment),
            LexContext::LineComment => Opening::LineComment,
            LexContext::Code | LexContext::Quote(_) => continue,
        };
        return Some((pos, opening));
    }
    None
}

/// Label every char of `text` with a lexical region
///
/// Plain code is region 0; each string or comment gets its own id,
/// delimiters included. Only char-start offsets carry meaningful values.
pub fn regions(text: &str) -> Vec<u32> {
    let mut out = vec![0; text.len()];
    let mut lexer = Lexer::new();
    let mut next_id = 0u32;
    let mut in_region = false;

    for (pos, ch) in text.char_indices() {
        if lexer.step(text, pos, ch) {
            in_region = false;
            continue;
        }
        if !in_region {
            next_id += 1;
            in_region = true;
        }
        out[pos] = next_id;
        if lexer.at_code() {
            in_region = false;
        }
    }

    out
}
