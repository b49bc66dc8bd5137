//! Bracket and tag pair matching
//!
//! Works on a snapshot of the document and returns offsets; the host is
//! only touched at the end to show (or clear) the highlight.
//!
//! Bracket mode follows `{}`, `()` and `[]` in either direction and only
//! counts brackets in the same lexical region as the starting one, so a
//! `}` inside a string or comment never closes a `{` in code.
//!
//! Tag mode starts from a selected tag name right after `<` or `</` and
//! walks to the matching closing or opening tag, skipping HTML comments.

use std::ops::Range;

use tracing::debug;

use crate::host::{EditorHost, Selection, UpdatesPaused};
use crate::syntax::lexer;
use crate::syntax::Style;

/// Elements that never take a closing tag
pub const VOID_ELEMENTS: [&str; 13] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

pub fn is_void_element(name: &str) -> bool {
    VOID_ELEMENTS.iter().any(|v| v.eq_ignore_ascii_case(name))
}

/// How a pair was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairMode {
    /// `{}`, `()` or `[]`
    Bracket,
    /// From an opening tag name forward
    OpeningTag,
    /// From a closing tag name backward
    ClosingTag,
}

/// A successful match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairResult {
    pub mode: PairMode,
    /// Range to highlight
    pub highlight: Range<usize>,
}

/// Find the counterpart of the bracket or tag at `selection`
///
/// With an empty selection the char under the cursor decides; otherwise
/// the first selected char does, and a selected tag name enables tag
/// mode.
pub fn find_pair(text: &str, selection: Selection) -> Option<PairResult> {
    let start = selection.start();
    let ch = text.get(start..)?.chars().next();

    if let Some(ch @ ('{' | '(' | '[' | '}' | ')' | ']')) = ch {
        return match_bracket(text, start, ch).map(|pos| PairResult {
            mode: PairMode::Bracket,
            highlight: pos..pos + 1,
        });
    }

    if selection.is_empty() {
        return None;
    }
    let selected = text.get(selection.range())?;
    let name_len = selected
        .bytes()
        .take_while(|b| b.is_ascii_alphanumeric())
        .count();
    if name_len == 0 {
        return None;
    }
    let name = &selected[..name_len];
    let before = &text[..start];

    if before.ends_with("</") {
        match_closing_tag(text, start - 2, name).map(|highlight| PairResult {
            mode: PairMode::ClosingTag,
            highlight,
        })
    } else if before.ends_with('<') {
        match_opening_tag(text, start + name_len, name).map(|highlight| PairResult {
            mode: PairMode::OpeningTag,
            highlight,
        })
    } else {
        None
    }
}

/// Byte offset of the bracket matching the one at `pos`
pub fn match_bracket(text: &str, pos: usize, ch: char) -> Option<usize> {
    let (other, forward) = match ch {
        '{' => ('}', true),
        '(' => (')', true),
        '[' => (']', true),
        '}' => ('{', false),
        ')' => ('(', false),
        ']' => ('[', false),
        _ => return None,
    };
    let (ch, other) = (ch as u8, other as u8);

    let regions = lexer::regions(text);
    let region = regions[pos];
    let bytes = text.as_bytes();
    let mut depth = 1usize;

    let mut visit = |i: usize| -> bool {
        if regions[i] != region {
            return false;
        }
        if bytes[i] == ch {
            depth += 1;
        } else if bytes[i] == other {
            depth -= 1;
            return depth == 0;
        }
        false
    };

    if forward {
        (pos + 1..bytes.len()).find(|&i| visit(i))
    } else {
        (0..pos).rev().find(|&i| visit(i))
    }
}

/// A tag found at a `<`
#[derive(Debug, Clone, PartialEq, Eq)]
struct TagRef {
    closing: bool,
    name: Range<usize>,
    self_closing: bool,
}

fn read_tag(text: &str, lt: usize) -> Option<TagRef> {
    let bytes = text.as_bytes();
    let mut i = lt + 1;
    let closing = bytes.get(i) == Some(&b'/');
    if closing {
        i += 1;
    }
    let name_start = i;
    while i < bytes.len() && !matches!(bytes[i], b'>' | b'/' | b'<') && !bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    if i == name_start {
        return None;
    }
    let self_closing = !closing && tag_end(text, i).map_or(false, |gt| text[..gt].ends_with('/'));
    Some(TagRef {
        closing,
        name: name_start..i,
        self_closing,
    })
}

/// Offset of the `>` closing the tag whose name ends before `from`
///
/// Quoted attribute values are stepped over.
fn tag_end(text: &str, from: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut quote = None;
    for i in from..bytes.len() {
        match (quote, bytes[i]) {
            (None, q @ (b'"' | b'\'')) => quote = Some(q),
            (Some(q), b) if b == q && !lexer::is_escaped(text, i) => quote = None,
            (None, b'>') => return Some(i),
            (None, b'<') => return None,
            _ => {}
        }
    }
    None
}

/// Per-byte flags for text inside `<!-- -->`, delimiters included
fn html_comment_mask(text: &str) -> Vec<bool> {
    let mut mask = vec![false; text.len()];
    let mut from = 0;
    while let Some(open) = text[from..].find("<!--") {
        let start = from + open;
        let end = text[start + 4..]
            .find("-->")
            .map_or(text.len(), |close| start + 4 + close + 3);
        mask[start..end].fill(true);
        from = end;
    }
    mask
}

fn same_name(text: &str, tag: &TagRef, name: &str) -> bool {
    text[tag.name.clone()].eq_ignore_ascii_case(name)
}

/// Walk forward from just after an opening tag's name
fn match_opening_tag(text: &str, from: usize, name: &str) -> Option<Range<usize>> {
    let mask = html_comment_mask(text);
    let bytes = text.as_bytes();
    let void = is_void_element(name);
    let mut depth = 1usize;

    let gt = tag_end(text, from)?;
    if void || text[..gt].ends_with('/') {
        return Some(gt..gt + 1);
    }

    for i in gt + 1..bytes.len() {
        if mask[i] || bytes[i] != b'<' {
            continue;
        }
        let Some(tag) = read_tag(text, i) else {
            continue;
        };
        if !same_name(text, &tag, name) || tag.self_closing {
            continue;
        }
        if tag.closing {
            depth -= 1;
            if depth == 0 {
                return Some(tag.name);
            }
        } else {
            depth += 1;
        }
    }
    None
}

/// Walk backward from the `<` of a closing tag
fn match_closing_tag(text: &str, lt: usize, name: &str) -> Option<Range<usize>> {
    let mask = html_comment_mask(text);
    let bytes = text.as_bytes();
    let mut depth = 1usize;

    for i in (0..lt).rev() {
        if mask[i] || bytes[i] != b'<' {
            continue;
        }
        let Some(tag) = read_tag(text, i) else {
            continue;
        };
        if !same_name(text, &tag, name) || tag.self_closing {
            continue;
        }
        if tag.closing {
            depth += 1;
        } else {
            depth -= 1;
            if depth == 0 {
                return Some(tag.name);
            }
        }
    }
    None
}

/// Shows the pair of the current selection on a host
#[derive(Debug, Clone)]
pub struct PairHighlighter {
    style: Style,
}

impl PairHighlighter {
    pub fn new(style: Style) -> Self {
        Self { style }
    }

    /// Match from the host's selection and replace any previous
    /// highlight; repaints stay off for the duration
    pub fn apply<H: EditorHost + ?Sized>(&self, host: &mut H) -> Option<PairResult> {
        let mut host = UpdatesPaused::new(host);
        let text = host.text();
        let selection = host.selection();

        let result = find_pair(&text, selection);
        match &result {
            Some(pair) => {
                debug!(mode = ?pair.mode, at = pair.highlight.start, "pair found");
                host.set_extra_highlights(vec![(pair.highlight.clone(), self.style)]);
            }
            None => host.set_extra_highlights(Vec::new()),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::BufferHost;

    fn bracket_at(text: &str, pos: usize) -> Option<usize> {
        find_pair(text, Selection::cursor(pos)).map(|p| p.highlight.start)
    }

    fn tag_from(text: &str, name_start: usize, len: usize) -> Option<PairResult> {
        find_pair(text, Selection::new(name_start, name_start + len))
    }

    #[test]
    fn test_nested_brackets_both_ways() {
        let text = "{ a ( b [ c ] d ) e }";
        let pairs = [(0, 20), (4, 16), (8, 12)];
        for (open, close) in pairs {
            assert_eq!(bracket_at(text, open), Some(close));
            assert_eq!(bracket_at(text, close), Some(open));
        }
    }

    #[test]
    fn test_brackets_in_strings_skipped() {
        let text = "{ 'not a } bracket' }";
        assert_eq!(bracket_at(text, 0), Some(20));
        assert_eq!(bracket_at(text, 20), Some(0));
    }

    #[test]
    fn test_brackets_in_comments_skipped() {
        let text = "f(a /* ) */, b // )\n)";
        assert_eq!(bracket_at(text, 1), Some(20));
        let text = "[<!-- ] -->]";
        assert_eq!(bracket_at(text, 0), Some(11));
    }

    #[test]
    fn test_escaped_quote_backward() {
        let text = r#"{ "a \" }" }"#;
        assert_eq!(bracket_at(text, 11), Some(0));
        assert_eq!(bracket_at(text, 0), Some(11));
    }

    #[test]
    fn test_url_does_not_hide_bracket() {
        let text = "{ a = 'x'; b = http://c }";
        assert_eq!(bracket_at(text, 0), Some(24));
    }

    #[test]
    fn test_bracket_inside_string_matches_within_string() {
        let text = r#"x = "({)}";"#;
        assert_eq!(bracket_at(text, 5), Some(7));
    }

    #[test]
    fn test_unmatched_bracket() {
        assert_eq!(bracket_at("{ a", 0), None);
        assert_eq!(bracket_at("a )", 2), None);
        assert_eq!(bracket_at("plain", 1), None);
    }

    #[test]
    fn test_selected_bracket_uses_first_char() {
        let text = "(ab)";
        let found = find_pair(text, Selection::new(0, 2)).unwrap();
        assert_eq!(found.highlight, 3..4);
    }

    #[test]
    fn test_tag_forward_skips_inner_tags() {
        let text = "<div><span>x</span></div>";
        let found = tag_from(text, 1, 3).unwrap();
        assert_eq!(found.mode, PairMode::OpeningTag);
        assert_eq!(&text[found.highlight.clone()], "div");
        assert_eq!(found.highlight.start, 21);
    }

    #[test]
    fn test_tag_nesting_counts_same_name() {
        let text = "<div><div></div></div>";
        let found = tag_from(text, 1, 3).unwrap();
        assert_eq!(found.highlight.start, 18);
    }

    #[test]
    fn test_tag_backward() {
        let text = "<div><span>x</span></div>";
        let found = tag_from(text, 21, 3).unwrap();
        assert_eq!(found.mode, PairMode::ClosingTag);
        assert_eq!(found.highlight, 1..4);
    }

    #[test]
    fn test_void_and_self_closing_highlight_gt() {
        let text = "<br>";
        assert_eq!(tag_from(text, 1, 2).unwrap().highlight, 3..4);

        let text = r#"<img src="a.png">"#;
        assert_eq!(tag_from(text, 1, 3).unwrap().highlight, 16..17);

        let text = "<x-icon/><p>";
        assert_eq!(tag_from(text, 1, 1).unwrap().highlight, 8..9);
    }

    #[test]
    fn test_gt_inside_attribute_value() {
        let text = r#"<img alt="a>b">"#;
        assert_eq!(tag_from(text, 1, 3).unwrap().highlight, 14..15);

        let text = r#"<p title='x/>'><p></p></p>"#;
        let found = tag_from(text, 1, 1).unwrap();
        assert_eq!(found.highlight, 24..25);
    }

    #[test]
    fn test_tag_case_insensitive_and_comments_skipped() {
        let text = "<DIV><!-- </div> --></div>";
        let found = tag_from(text, 1, 3).unwrap();
        assert_eq!(found.highlight, 22..25);
    }

    #[test]
    fn test_self_closing_same_name_ignored() {
        let text = "<g><g/></g>";
        let found = tag_from(text, 1, 1).unwrap();
        assert_eq!(found.highlight, 9..10);
    }

    #[test]
    fn test_selection_not_after_lt() {
        assert_eq!(tag_from("a div b", 2, 3), None);
        assert_eq!(tag_from("<div>", 0, 1), None);
    }

    #[test]
    fn test_apply_sets_and_clears() {
        let style = Style::default().with_bold();
        let pairs = PairHighlighter::new(style);
        let mut host = BufferHost::new("(a)");
        host.selection = Selection::cursor(0);

        let found = pairs.apply(&mut host).unwrap();
        assert_eq!(found.highlight, 2..3);
        assert_eq!(host.extra, vec![(2..3, style)]);
        assert!(host.updates_enabled);
        assert_eq!(host.pauses, 1);

        host.selection = Selection::cursor(1);
        assert!(pairs.apply(&mut host).is_none());
        assert!(host.extra.is_empty());
        assert!(host.updates_enabled);
    }
}
