//! Configuration file support
//!
//! Loads settings from `<config_dir>/cardcode/config.toml`. Missing keys
//! take their defaults, so a partial file is fine.
//!
//! Example:
//! ```toml
//! theme = "light"
//! external_editor = 'code -g "{file}:{line}:{column}"'
//! pair_debounce_ms = 150
//!
//! [colors.light]
//! x_comment_color = "#008000"
//! x_html_tag_color = "rgb(128, 0, 0)"
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;
use crate::syntax::{Theme, DEFAULT_SCAN_LIMIT};

/// Which palette to highlight with
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeChoice {
    Light,
    #[default]
    Dark,
}

/// Palette overrides, keyed by style name (`x_comment_color`, ...)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Colors {
    pub light: BTreeMap<String, String>,
    pub dark: BTreeMap<String, String>,
}

/// Configuration settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub theme: ThemeChoice,
    pub colors: Colors,
    /// Command template with `{file}`, `{line}` and `{column}`
    pub external_editor: String,
    /// Delay before the bracket/tag pair is looked up after a cursor move
    pub pair_debounce_ms: u64,
    /// How often the external file is checked for changes
    pub external_poll_secs: u64,
    /// Iteration ceiling of the highlighter's scanning loops
    pub scan_limit: usize,
    /// Directory under the home directory for round-trip files and backups
    pub backup_dir_name: String,
    /// Turn pasted tabs into four spaces
    pub replace_tabs_on_paste: bool,
    /// Autocomplete snippets, `%name body`
    pub template_code: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            theme: ThemeChoice::default(),
            colors: Colors::default(),
            external_editor: r#"code -g "{file}:{line}:{column}""#.to_string(),
            pair_debounce_ms: 100,
            external_poll_secs: 5,
            scan_limit: DEFAULT_SCAN_LIMIT,
            backup_dir_name: "anki_backup".to_string(),
            replace_tabs_on_paste: true,
            template_code: Vec::new(),
        }
    }
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("cardcode").join("config.toml"))
    }

    /// Load configuration from the default path
    ///
    /// A missing file gives the defaults; an unreadable one is logged and
    /// also gives the defaults.
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        Self::load_from(&path).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "ignoring config file");
            Self::default()
        })
    }

    /// Load configuration from a file
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse config file contents
    pub fn parse(contents: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(contents)?;
        config.sanitize();
        Ok(config)
    }

    fn sanitize(&mut self) {
        self.pair_debounce_ms = self.pair_debounce_ms.min(5_000);
        self.external_poll_secs = self.external_poll_secs.clamp(1, 3_600);
        self.scan_limit = self.scan_limit.max(100);
    }

    /// Save current configuration to the default path
    pub fn save(&self) -> Result<()> {
        if let Some(path) = Self::config_path() {
            self.save_to(&path)?;
        }
        Ok(())
    }

    /// Save current configuration to a file, creating its directory
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn is_dark(&self) -> bool {
        self.theme == ThemeChoice::Dark
    }

    /// Theme built from the active palette and its overrides
    pub fn build_theme(&self) -> Theme {
        let overrides = if self.is_dark() {
            &self.colors.dark
        } else {
            &self.colors.light
        };
        Theme::new(self.is_dark(), overrides)
    }

    pub fn pair_debounce(&self) -> Duration {
        Duration::from_millis(self.pair_debounce_ms)
    }

    pub fn external_poll(&self) -> Duration {
        Duration::from_secs(self.external_poll_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::{Color, TokenType};

    #[test]
    fn test_parse_config() {
        let contents = r##"
# Comment
theme = "light"
pair_debounce_ms = 250
template_code = ["%b <b>$$</b>"]

[colors.light]
x_comment_color = "#112233"
        "##;

        let config = Config::parse(contents).unwrap();
        assert_eq!(config.theme, ThemeChoice::Light);
        assert_eq!(config.pair_debounce(), Duration::from_millis(250));
        assert_eq!(config.external_poll_secs, 5);
        assert_eq!(config.template_code.len(), 1);
        assert_eq!(config.colors.light["x_comment_color"], "#112233");
        assert!(config.colors.dark.is_empty());
    }

    #[test]
    fn test_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config, Config::default());
        assert!(config.is_dark());
        assert!(config.external_editor.contains("{file}"));
        assert_eq!(config.backup_dir_name, "anki_backup");
    }

    #[test]
    fn test_bad_values_rejected_or_clamped() {
        assert!(Config::parse("theme = 3").is_err());
        let config = Config::parse("external_poll_secs = 0\nscan_limit = 1").unwrap();
        assert_eq!(config.external_poll_secs, 1);
        assert_eq!(config.scan_limit, 100);
    }

    #[test]
    fn test_build_theme_uses_overrides() {
        let config = Config::parse(
            "theme = \"light\"\n[colors.light]\nx_comment_color = \"rgb(1, 2, 3)\"\n",
        )
        .unwrap();
        let theme = config.build_theme();
        assert!(!theme.dark);
        assert_eq!(theme.style(TokenType::Comment).fg, Color::rgb(1, 2, 3));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("config.toml");
        let mut config = Config::default();
        config.theme = ThemeChoice::Light;
        config.template_code.push("%x y".to_string());
        config.colors.dark.insert("x_string_color".into(), "#abcdef".into());

        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }
}
