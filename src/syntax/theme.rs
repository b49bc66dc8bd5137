//! Highlight theme
//!
//! Resolves a palette (palette key -> color string) into concrete styles.
//! A palette entry that fails to parse is logged and leaves that style
//! unstyled; the rest of the theme is still built.

use std::collections::{BTreeMap, HashMap};

use tracing::warn;

use super::color::parse_color;
use super::style::{Color, Style};
use super::tokens::TokenType;

/// Background used to flag the counterpart of a selected bracket
const PAIR_BG: Color = Color::Rgb(0xCF, 0xCF, 0x6D);
/// Foreground used to flag the counterpart of a selected bracket
const PAIR_FG: Color = Color::Rgb(0xE8, 0x0A, 0xF7);

/// Resolved styles for every highlight class
#[derive(Debug, Clone)]
pub struct Theme {
    styles: HashMap<TokenType, Style>,
    /// Dark variant
    pub dark: bool,
    /// Wavy red underline for anomalous whitespace
    pub odd_whitespace: Style,
    /// Wavy blue underline for tab characters
    pub tab: Style,
    /// Occurrences of the rehighlight target
    pub selection_match: Style,
    /// Counterpart of a selected single bracket, and pair-match highlight
    pub paired: Style,
}

impl Theme {
    /// Build a theme from the built-in palette plus `overrides`
    pub fn new(dark: bool, overrides: &BTreeMap<String, String>) -> Self {
        for key in overrides.keys() {
            if TokenType::from_key(key).is_none() {
                warn!(key = %key, "ignoring unknown palette key");
            }
        }

        let styles = TokenType::ALL
            .iter()
            .map(|&token| {
                let value = overrides
                    .get(token.key())
                    .map(String::as_str)
                    .unwrap_or_else(|| token.default_hex(dark));
                let style = match parse_color(value) {
                    Ok(color) => token.style_with(color),
                    Err(e) => {
                        warn!(key = token.key(), error = %e, "falling back to unstyled format");
                        Style::default()
                    }
                };
                (token, style)
            })
            .collect();

        let selection_match = if dark {
            Style::bg(Color::rgb(0x5E, 0x5E, 0x30)).with_fg(Color::rgb(255, 255, 0))
        } else {
            Style::bg(PAIR_BG).with_fg(Color::rgb(0, 0, 255))
        };

        Self {
            styles,
            dark,
            odd_whitespace: Style::wave(Color::rgb(255, 0, 0)),
            tab: Style::wave(Color::rgb(0, 0, 255)),
            selection_match,
            paired: Style::bg(PAIR_BG).with_fg(PAIR_FG),
        }
    }

    /// Built-in light theme
    pub fn light() -> Self {
        Self::new(false, &BTreeMap::new())
    }

    /// Built-in dark theme
    pub fn dark() -> Self {
        Self::new(true, &BTreeMap::new())
    }

    /// Style for a token class
    pub fn style(&self, token: TokenType) -> Style {
        self.styles.get(&token).copied().unwrap_or_default()
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::dark()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_token_styled() {
        let theme = Theme::light();
        for token in TokenType::ALL {
            assert!(!theme.style(token).is_default(), "{:?}", token);
        }
    }

    #[test]
    fn test_override_applies() {
        let mut palette = BTreeMap::new();
        palette.insert("x_comment_color".to_string(), "red".to_string());
        let theme = Theme::new(true, &palette);
        assert_eq!(theme.style(TokenType::Comment).fg, Color::rgb(255, 0, 0));
    }

    #[test]
    fn test_bad_color_falls_back_per_style() {
        let mut palette = BTreeMap::new();
        palette.insert("x_keyword_color".to_string(), "not-a-color".to_string());
        let theme = Theme::new(false, &palette);
        assert!(theme.style(TokenType::Keyword).is_default());
        // the others are unaffected
        assert!(!theme.style(TokenType::Comment).is_default());
    }

    #[test]
    fn test_selection_styles_by_variant() {
        assert_eq!(Theme::dark().selection_match.bg, Color::rgb(0x5E, 0x5E, 0x30));
        assert_eq!(Theme::light().selection_match.fg, Color::rgb(0, 0, 255));
        assert_eq!(Theme::light().paired, Theme::dark().paired);
    }
}
