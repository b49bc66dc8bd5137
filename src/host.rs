//! Host editing widget interface
//!
//! The core never owns a widget. Whatever surface embeds it implements
//! [`EditorHost`]; offsets are byte offsets into the host's plain text,
//! and an adapter for a widget that counts in other units converts at
//! this boundary.

use std::ops::{Deref, DerefMut, Range};

use crate::syntax::{Span, Style};

/// A selection: the anchor stays put, the position moves
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Selection {
    pub anchor: usize,
    pub position: usize,
}

impl Selection {
    /// Collapsed selection (plain cursor)
    pub fn cursor(pos: usize) -> Self {
        Self {
            anchor: pos,
            position: pos,
        }
    }

    pub fn new(anchor: usize, position: usize) -> Self {
        Self { anchor, position }
    }

    pub fn start(&self) -> usize {
        self.anchor.min(self.position)
    }

    pub fn end(&self) -> usize {
        self.anchor.max(self.position)
    }

    pub fn is_empty(&self) -> bool {
        self.anchor == self.position
    }

    pub fn range(&self) -> Range<usize> {
        self.start()..self.end()
    }
}

/// Which template pane is being edited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Pane {
    Front,
    Back,
    Style,
}

impl Pane {
    pub const ALL: [Pane; 3] = [Pane::Front, Pane::Back, Pane::Style];

    /// Key used in persisted cursor records
    pub fn key(&self) -> &'static str {
        match self {
            Pane::Front => "front_button",
            Pane::Back => "back_button",
            Pane::Style => "style_button",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.key() == key)
    }

    /// Whether the pane holds a stylesheet rather than HTML
    pub fn is_style(&self) -> bool {
        matches!(self, Pane::Style)
    }
}

/// The text-editing surface the core drives
pub trait EditorHost {
    /// Full plain text
    fn text(&self) -> String;

    /// Replace the full plain text
    fn set_text(&mut self, text: &str);

    fn selection(&self) -> Selection;

    fn set_selection(&mut self, selection: Selection);

    fn vertical_scroll(&self) -> i64;

    fn set_vertical_scroll(&mut self, value: i64);

    /// Whether the editing widget holds input focus
    fn has_focus(&self) -> bool;

    fn set_focus(&mut self);

    /// Suspend or resume repainting
    fn set_updates_enabled(&mut self, enabled: bool);

    /// Paint spans (relative to the line start) onto one line
    fn paint_line(&mut self, line: usize, spans: &[Span]);

    /// Replace the set of extra highlighted ranges
    fn set_extra_highlights(&mut self, highlights: Vec<(Range<usize>, Style)>);

    /// Whether the host is currently suppressing its own change signals
    fn signals_blocked(&self) -> bool {
        false
    }

    /// Show a transient message to the user
    fn show_notice(&mut self, message: &str);
}

/// Repaints are suspended while this guard lives
pub struct UpdatesPaused<'a, H: EditorHost + ?Sized> {
    host: &'a mut H,
}

impl<'a, H: EditorHost + ?Sized> UpdatesPaused<'a, H> {
    pub fn new(host: &'a mut H) -> Self {
        host.set_updates_enabled(false);
        Self { host }
    }
}

impl<H: EditorHost + ?Sized> Deref for UpdatesPaused<'_, H> {
    type Target = H;

    fn deref(&self) -> &H {
        self.host
    }
}

impl<H: EditorHost + ?Sized> DerefMut for UpdatesPaused<'_, H> {
    fn deref_mut(&mut self) -> &mut H {
        self.host
    }
}

impl<H: EditorHost + ?Sized> Drop for UpdatesPaused<'_, H> {
    fn drop(&mut self) {
        self.host.set_updates_enabled(true);
    }
}

/// In-memory host, used by the command-line tools and tests
#[derive(Debug, Default, Clone)]
pub struct BufferHost {
    pub text: String,
    pub selection: Selection,
    pub scroll: i64,
    pub focused: bool,
    pub updates_enabled: bool,
    /// Number of times updates were switched off
    pub pauses: usize,
    pub blocked: bool,
    pub painted: Vec<(usize, Vec<Span>)>,
    pub extra: Vec<(Range<usize>, Style)>,
    pub notices: Vec<String>,
}

impl BufferHost {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            focused: true,
            updates_enabled: true,
            ..Default::default()
        }
    }
}

impl EditorHost for BufferHost {
    fn text(&self) -> String {
        self.text.clone()
    }

    fn set_text(&mut self, text: &str) {
        self.text = text.to_string();
        self.set_selection(self.selection);
    }

    fn selection(&self) -> Selection {
        self.selection
    }

    fn set_selection(&mut self, selection: Selection) {
        let len = self.text.len();
        self.selection = Selection::new(selection.anchor.min(len), selection.position.min(len));
    }

    fn vertical_scroll(&self) -> i64 {
        self.scroll
    }

    fn set_vertical_scroll(&mut self, value: i64) {
        self.scroll = value;
    }

    fn has_focus(&self) -> bool {
        self.focused
    }

    fn set_focus(&mut self) {
        self.focused = true;
    }

    fn set_updates_enabled(&mut self, enabled: bool) {
        if !enabled {
            self.pauses += 1;
        }
        self.updates_enabled = enabled;
    }

    fn paint_line(&mut self, line: usize, spans: &[Span]) {
        self.painted.push((line, spans.to_vec()));
    }

    fn set_extra_highlights(&mut self, highlights: Vec<(Range<usize>, Style)>) {
        self.extra = highlights;
    }

    fn signals_blocked(&self) -> bool {
        self.blocked
    }

    fn show_notice(&mut self, message: &str) {
        self.notices.push(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_bounds() {
        let sel = Selection::new(10, 4);
        assert_eq!(sel.start(), 4);
        assert_eq!(sel.end(), 10);
        assert!(!sel.is_empty());
        assert!(Selection::cursor(3).is_empty());
    }

    #[test]
    fn test_pane_keys() {
        for pane in Pane::ALL {
            assert_eq!(Pane::from_key(pane.key()), Some(pane));
        }
        assert_eq!(Pane::from_key("other"), None);
    }

    #[test]
    fn test_updates_guard_restores() {
        let mut host = BufferHost::new("abc");
        {
            let mut paused = UpdatesPaused::new(&mut host);
            assert!(!paused.updates_enabled);
            paused.set_selection(Selection::cursor(2));
        }
        assert!(host.updates_enabled);
        assert_eq!(host.pauses, 1);
        assert_eq!(host.selection, Selection::cursor(2));
    }

    #[test]
    fn test_selection_clamped_to_text() {
        let mut host = BufferHost::new("abc");
        host.set_selection(Selection::new(1, 99));
        assert_eq!(host.selection.end(), 3);
    }
}
