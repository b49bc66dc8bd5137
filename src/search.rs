//! Find and replace over a text snapshot
//!
//! Offsets are byte offsets. A forward search finds the first match
//! starting at or after `from`; a backward search finds the last match
//! ending at or before `from`.

use std::ops::Range;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Search direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SearchDirection {
    #[default]
    Forward,
    Backward,
}

/// Search flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FindOptions {
    pub case_sensitive: bool,
    pub whole_word: bool,
    pub direction: SearchDirection,
}

impl Default for FindOptions {
    fn default() -> Self {
        Self {
            case_sensitive: true,
            whole_word: false,
            direction: SearchDirection::Forward,
        }
    }
}

impl FindOptions {
    pub fn backward(mut self) -> Self {
        self.direction = SearchDirection::Backward;
        self
    }

    pub fn forward(mut self) -> Self {
        self.direction = SearchDirection::Forward;
        self
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// A compiled search string
#[derive(Debug, Clone)]
pub struct Finder {
    regex: Regex,
    opts: FindOptions,
}

impl Finder {
    /// Literal search for `needle`; an empty needle is an error
    pub fn new(needle: &str, opts: FindOptions) -> Result<Self> {
        if needle.is_empty() {
            return Err(Error::Message("empty search string".into()));
        }
        let regex = RegexBuilder::new(&regex::escape(needle))
            .case_insensitive(!opts.case_sensitive)
            .build()?;
        Ok(Self { regex, opts })
    }

    pub fn options(&self) -> FindOptions {
        self.opts
    }

    /// Same needle, other direction
    pub fn with_direction(&self, direction: SearchDirection) -> Self {
        let mut finder = self.clone();
        finder.opts.direction = direction;
        finder
    }

    fn word_bounded(&self, text: &str, range: &Range<usize>) -> bool {
        if !self.opts.whole_word {
            return true;
        }
        let before = text[..range.start].chars().next_back();
        let after = text[range.end..].chars().next();
        !before.map_or(false, is_word_char) && !after.map_or(false, is_word_char)
    }

    /// All matches inside `within`, in document order
    pub fn matches_in(&self, text: &str, within: Range<usize>) -> Vec<Range<usize>> {
        let end = within.end.min(text.len());
        let mut out = Vec::new();
        let mut pos = within.start.min(end);
        while !text.is_char_boundary(pos) {
            pos += 1;
        }
        while pos <= end {
            let Some(m) = self.regex.find_at(text, pos) else {
                break;
            };
            if m.end() > end {
                break;
            }
            let range = m.range();
            if self.word_bounded(text, &range) {
                out.push(range.clone());
                pos = range.end.max(range.start + 1);
            } else {
                pos = range.start + 1;
            }
            while pos < text.len() && !text.is_char_boundary(pos) {
                pos += 1;
            }
        }
        out
    }

    /// Next match from `from` in the configured direction
    pub fn find(&self, text: &str, from: usize) -> Option<Range<usize>> {
        self.find_in(text, from, 0..text.len())
    }

    /// Like [`Finder::find`], but only matches lying inside `within`
    pub fn find_in(&self, text: &str, from: usize, within: Range<usize>) -> Option<Range<usize>> {
        match self.opts.direction {
            SearchDirection::Forward => {
                let start = from.max(within.start);
                if start > within.end {
                    return None;
                }
                self.matches_in(text, start..within.end).into_iter().next()
            }
            SearchDirection::Backward => {
                let end = from.min(within.end);
                if end < within.start {
                    return None;
                }
                self.matches_in(text, within.start..end).pop()
            }
        }
    }

    /// Search from `from`, restarting at the document edge on a miss
    ///
    /// The flag is true when the match was found after wrapping.
    pub fn find_wrapping(&self, text: &str, from: usize) -> Option<(Range<usize>, bool)> {
        if let Some(found) = self.find(text, from) {
            return Some((found, false));
        }
        let edge = match self.opts.direction {
            SearchDirection::Forward => 0,
            SearchDirection::Backward => text.len(),
        };
        self.find(text, edge).map(|found| (found, true))
    }

    /// Replace every match inside `within` (or the whole text)
    ///
    /// Returns the new text and the number of replacements.
    pub fn replace_all(&self, text: &str, replacement: &str, within: Option<Range<usize>>) -> (String, usize) {
        let within = within.unwrap_or(0..text.len());
        let matches = self.matches_in(text, within);
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for m in &matches {
            out.push_str(&text[last..m.start]);
            out.push_str(replacement);
            last = m.end;
        }
        out.push_str(&text[last..]);
        (out, matches.len())
    }
}

/// One-shot search for `needle` from `from`
pub fn find(text: &str, needle: &str, from: usize, opts: FindOptions) -> Option<Range<usize>> {
    Finder::new(needle, opts).ok()?.find(text, from)
}

/// Replace every match of `needle`, inside `within` when given
pub fn replace_all(
    text: &str,
    needle: &str,
    replacement: &str,
    opts: FindOptions,
    within: Option<Range<usize>>,
) -> Result<(String, usize)> {
    Ok(Finder::new(needle, opts)?.replace_all(text, replacement, within))
}

/// Replace the selected range, returning the new text and the offset
/// right after the inserted replacement
pub fn replace_range(text: &str, range: Range<usize>, replacement: &str) -> (String, usize) {
    let mut out = String::with_capacity(text.len() + replacement.len());
    out.push_str(&text[..range.start]);
    out.push_str(replacement);
    out.push_str(&text[range.end..]);
    (out, range.start + replacement.len())
}

/// Next `%%` placeholder from the cursor
///
/// Forward wraps to the start of the document once; backward skips a
/// marker that ends right at the cursor.
pub fn next_cloze_marker(text: &str, cursor: usize, direction: SearchDirection) -> Option<Range<usize>> {
    const MARKER: &str = "%%";
    let cursor = cursor.min(text.len());
    let found = match direction {
        SearchDirection::Forward => text
            .get(cursor..)
            .and_then(|rest| rest.find(MARKER))
            .map(|i| cursor + i)
            .or_else(|| text.find(MARKER)),
        SearchDirection::Backward => text
            .get(..cursor.saturating_sub(MARKER.len()))
            .and_then(|before| before.rfind(MARKER)),
    };
    found.map(|start| start..start + MARKER.len())
}

/// Recently used search strings, newest first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindHistory {
    entries: Vec<String>,
}

impl FindHistory {
    pub const MAX_ENTRIES: usize = 20;

    pub fn new() -> Self {
        Self::default()
    }

    /// Move `entry` to the front; blank entries are ignored
    pub fn add(&mut self, entry: &str) {
        if entry.trim().is_empty() {
            return;
        }
        self.entries.retain(|e| e != entry);
        self.entries.insert(0, entry.to_string());
        self.entries.truncate(Self::MAX_ENTRIES);
    }

    pub fn latest(&self) -> Option<&str> {
        self.entries.first().map(String::as_str)
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }
}
