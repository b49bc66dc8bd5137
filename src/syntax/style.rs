//! Style types for highlighted text
//!
//! These are semantic attributes only. A host maps them onto whatever
//! character-format type its editing widget uses; the CLI maps them onto
//! terminal attributes in `crate::render`.

/// A text color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Color {
    /// Leave the host's default color in place
    #[default]
    Default,
    /// 24-bit color
    Rgb(u8, u8, u8),
}

impl Color {
    pub const BLACK: Color = Color::Rgb(0, 0, 0);
    pub const WHITE: Color = Color::Rgb(255, 255, 255);

    /// Create an RGB color
    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Color::Rgb(r, g, b)
    }

    /// HSL lightness on a 0-255 scale, `(max + min) / 2`
    ///
    /// Returns `None` for [`Color::Default`].
    pub fn lightness(&self) -> Option<u8> {
        match *self {
            Color::Default => None,
            Color::Rgb(r, g, b) => {
                let max = r.max(g).max(b) as u16;
                let min = r.min(g).min(b) as u16;
                Some(((max + min) / 2) as u8)
            }
        }
    }

    /// Format as `#RRGGBB` (or `None` for the default color)
    pub fn to_hex(&self) -> Option<String> {
        match *self {
            Color::Default => None,
            Color::Rgb(r, g, b) => Some(format!("#{:02X}{:02X}{:02X}", r, g, b)),
        }
    }
}

/// Underline decoration kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnderlineStyle {
    Single,
    Wave,
}

/// Underline decoration with its own color
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Underline {
    pub style: UnderlineStyle,
    pub color: Color,
}

/// Text style attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Style {
    /// Foreground color
    pub fg: Color,
    /// Background color
    pub bg: Color,
    /// Bold text
    pub bold: bool,
    /// Italic text
    pub italic: bool,
    /// Underline decoration
    pub underline: Option<Underline>,
}

impl Style {
    /// Create a style with just foreground color
    pub fn fg(color: Color) -> Self {
        Self {
            fg: color,
            ..Default::default()
        }
    }

    /// Create a style with just background color
    pub fn bg(color: Color) -> Self {
        Self {
            bg: color,
            ..Default::default()
        }
    }

    /// Create a style with only a wavy underline
    pub fn wave(color: Color) -> Self {
        Self {
            underline: Some(Underline {
                style: UnderlineStyle::Wave,
                color,
            }),
            ..Default::default()
        }
    }

    /// Builder: set foreground color
    pub fn with_fg(mut self, color: Color) -> Self {
        self.fg = color;
        self
    }

    /// Builder: set background color
    pub fn with_bg(mut self, color: Color) -> Self {
        self.bg = color;
        self
    }

    /// Builder: set bold
    pub fn with_bold(mut self) -> Self {
        self.bold = true;
        self
    }

    /// Builder: set italic
    pub fn with_italic(mut self) -> Self {
        self.italic = true;
        self
    }

    /// Builder: set a single underline in the foreground color
    pub fn with_underline(mut self) -> Self {
        self.underline = Some(Underline {
            style: UnderlineStyle::Single,
            color: self.fg,
        });
        self
    }

    /// Check if this is the default (no styling)
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

/// A styled span of text within a line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    /// Byte offset where this span starts (inclusive)
    pub start: usize,
    /// Byte offset where this span ends (exclusive)
    pub end: usize,
    /// Style to apply to this span
    pub style: Style,
}

impl Span {
    /// Create a new span
    pub fn new(start: usize, end: usize, style: Style) -> Self {
        Self { start, end, style }
    }

    /// Check if this span contains a byte position
    pub fn contains(&self, pos: usize) -> bool {
        pos >= self.start && pos < self.end
    }

    /// Get the length of this span in bytes
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Check if span is empty
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Shift both ends by `offset`
    pub fn shifted(&self, offset: usize) -> Self {
        Self::new(self.start + offset, self.end + offset, self.style)
    }
}
