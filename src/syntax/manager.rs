//! Document highlighting driver
//!
//! Keeps per-line carry states and spans for one document and decides
//! which lines need re-highlighting after an edit. State always flows
//! forward from line 0, so an edit that opens or closes a block keeps
//! propagating until a line's end state matches the cached one.

use std::ops::Range;

use tracing::debug;

use super::highlighter::LineHighlighter;
use super::rules::LineState;
use super::style::Span;

/// Per-document highlighting cache
#[derive(Debug, Default, Clone)]
pub struct HighlightCache {
    /// End state of each line
    pub line_states: Vec<LineState>,
    /// Spans of each line, relative to the line start
    pub line_spans: Vec<Vec<Span>>,
    /// Byte offset of each line start in the document
    pub line_starts: Vec<usize>,
}

impl HighlightCache {
    /// Create a new empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop everything from `line` onwards
    pub fn invalidate_from(&mut self, line: usize) {
        self.line_states.truncate(line);
        self.line_spans.truncate(line);
        self.line_starts.truncate(line);
    }

    /// Drop everything
    pub fn invalidate_all(&mut self) {
        self.invalidate_from(0);
    }

    /// Carry state entering `line`
    pub fn state_before(&self, line: usize) -> LineState {
        line.checked_sub(1)
            .and_then(|prev| self.line_states.get(prev))
            .copied()
            .unwrap_or_default()
    }

    fn store(&mut self, line: usize, start: usize, spans: Vec<Span>, state: LineState) {
        if line < self.line_states.len() {
            self.line_states[line] = state;
            self.line_spans[line] = spans;
            self.line_starts[line] = start;
        } else {
            self.line_states.push(state);
            self.line_spans.push(spans);
            self.line_starts.push(start);
        }
    }
}

/// Drives a [`LineHighlighter`] over a whole document
pub struct DocumentHighlighter {
    highlighter: LineHighlighter,
    cache: HighlightCache,
    /// Whether highlighting is enabled
    pub enabled: bool,
}

impl DocumentHighlighter {
    pub fn new(highlighter: LineHighlighter) -> Self {
        Self {
            highlighter,
            cache: HighlightCache::new(),
            enabled: true,
        }
    }

    pub fn highlighter(&self) -> &LineHighlighter {
        &self.highlighter
    }

    pub fn highlighter_mut(&mut self) -> &mut LineHighlighter {
        &mut self.highlighter
    }

    pub fn cache(&self) -> &HighlightCache {
        &self.cache
    }

    /// Highlight every line from line 0
    pub fn highlight_all(&mut self, text: &str) {
        self.cache.invalidate_all();
        let lines = split_lines(text);
        for (idx, &(start, line)) in lines.iter().enumerate() {
            self.highlight_one(idx, start, line);
        }
    }

    /// Set the target to flag on every line, then highlight everything
    pub fn rehighlight_all(&mut self, text: &str, target: Option<String>) {
        self.highlighter.set_target(target);
        self.highlight_all(text);
    }

    /// Re-highlight after lines `first..=last` of `text` changed
    ///
    /// Returns the lines whose spans were recomputed, which always covers
    /// the changed lines and extends past them while carry states differ.
    pub fn lines_changed(&mut self, text: &str, first: usize, last: usize) -> Range<usize> {
        let lines = split_lines(text);
        let first = first.min(self.cache.line_states.len()).min(lines.len());

        if lines.len() != self.cache.line_states.len() {
            // line numbers shifted; everything below the edit is suspect
            self.cache.invalidate_from(first);
            for (idx, &(start, line)) in lines.iter().enumerate().skip(first) {
                self.highlight_one(idx, start, line);
            }
            return first..lines.len();
        }

        let mut idx = first;
        while idx < lines.len() {
            let old_state = self.cache.line_states[idx];
            let (start, line) = lines[idx];
            let new_state = self.highlight_one(idx, start, line);
            idx += 1;
            if idx > last && new_state == old_state {
                break;
            }
        }

        // offsets past the edit may have moved even if states did not
        for (line_idx, &(start, _)) in lines.iter().enumerate().skip(idx) {
            self.cache.line_starts[line_idx] = start;
        }

        debug!(first, last = idx, "re-highlighted lines");
        first..idx
    }

    fn highlight_one(&mut self, idx: usize, start: usize, line: &str) -> LineState {
        let carry = self.cache.state_before(idx);
        if !self.enabled {
            self.cache.store(idx, start, Vec::new(), LineState::default());
            return LineState::default();
        }
        let result = self.highlighter.highlight_line(line, 0, carry);
        self.cache.store(idx, start, result.spans, result.end_state);
        result.end_state
    }

    /// Spans of a line, relative to the line start
    pub fn spans(&self, line: usize) -> &[Span] {
        self.cache
            .line_spans
            .get(line)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// End state of a line
    pub fn end_state(&self, line: usize) -> LineState {
        self.cache.line_states.get(line).copied().unwrap_or_default()
    }

    /// Spans of every line, in document offsets
    pub fn document_spans(&self) -> Vec<Span> {
        self.cache
            .line_spans
            .iter()
            .zip(&self.cache.line_starts)
            .flat_map(|(spans, &start)| spans.iter().map(move |s| s.shifted(start)))
            .collect()
    }

    pub fn line_count(&self) -> usize {
        self.cache.line_states.len()
    }

    /// Toggle syntax highlighting on/off
    pub fn toggle(&mut self) {
        self.enabled = !self.enabled;
    }
}

/// Split a document into `(start offset, line)` pairs
///
/// A trailing `\r` stays part of its line.
pub fn split_lines(text: &str) -> Vec<(usize, &str)> {
    let mut out = Vec::new();
    let mut start = 0;
    for line in text.split('\n') {
        out.push((start, line));
        start += line.len() + 1;
    }
    out
}
