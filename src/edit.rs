//! Keyboard editing helpers
//!
//! Each function takes a text snapshot and the host's selection and
//! returns what the host should show next. Offsets are byte offsets.

use std::ops::Range;

use crate::host::Selection;
use crate::search::replace_range;

/// Columns a tab counts for when measuring indentation
pub const TAB_WIDTH: usize = 4;

/// New text and selection after an edit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub text: String,
    pub selection: Selection,
}

/// Byte range of the line holding `pos`, newline excluded
fn line_around(text: &str, pos: usize) -> Range<usize> {
    let start = text[..pos].rfind('\n').map_or(0, |i| i + 1);
    let end = text[pos..].find('\n').map_or(text.len(), |i| pos + i);
    start..end
}

fn indent_len(line: &str) -> usize {
    line.len() - line.trim_start_matches([' ', '\t']).len()
}

fn valid_pos(text: &str, pos: usize) -> Option<usize> {
    text.is_char_boundary(pos).then_some(pos)
}

/// Wrap the selection in `prefix`/`suffix`, or unwrap it when it is
/// already wrapped
///
/// Whitespace between the selection and an existing prefix or suffix is
/// tolerated and removed on unwrap. With `add_space`, wrapping puts one
/// space inside each side. Returns `None` without a selection.
pub fn toggle_wrap(text: &str, selection: Selection, prefix: &str, suffix: &str, add_space: bool) -> Option<Edit> {
    if selection.is_empty() {
        return None;
    }
    let range = selection.range();
    let selected = text.get(range.clone())?;

    if let (Some(left), Some(right)) = (
        wrapped_left(text, range.start, prefix),
        wrapped_right(text, range.end, suffix),
    ) {
        let start = left - prefix.len();
        let (text, _) = replace_range(text, start..right + suffix.len(), selected);
        return Some(Edit {
            text,
            selection: Selection::new(start, start + selected.len()),
        });
    }

    let (open, close) = if add_space {
        (format!("{} ", prefix), format!(" {}", suffix))
    } else {
        (prefix.to_string(), suffix.to_string())
    };
    let wrapped = format!("{}{}{}", open, selected, close);
    let (text, _) = replace_range(text, range.clone(), &wrapped);
    let start = range.start + open.len();
    Some(Edit {
        text,
        selection: Selection::new(start, start + selected.len()),
    })
}

/// End of a `prefix` separated from `pos` by whitespace only
fn wrapped_left(text: &str, pos: usize, prefix: &str) -> Option<usize> {
    let mut at = pos;
    loop {
        let head = &text[..at];
        if head.ends_with(prefix) {
            return Some(at);
        }
        let ch = head.chars().next_back().filter(|c| c.is_whitespace())?;
        at -= ch.len_utf8();
    }
}

/// Start of a `suffix` separated from `pos` by whitespace only
fn wrapped_right(text: &str, pos: usize, suffix: &str) -> Option<usize> {
    let mut at = pos;
    loop {
        let tail = &text[at..];
        if tail.starts_with(suffix) {
            return Some(at);
        }
        let ch = tail.chars().next().filter(|c| c.is_whitespace())?;
        at += ch.len_utf8();
    }
}

/// Enter key with automatic indentation
///
/// - Before the first non-blank char, the line's indentation is repeated.
/// - At the end of a line (trailing blanks after the cursor are dropped),
///   the new line gets the same indentation, one level deeper after `{`.
/// - Between `{` and a final `}`, the brace pair is split over three
///   lines with the cursor on the indented middle one.
///
/// Returns `None` where a plain newline is right.
pub fn enter_with_indent(text: &str, selection: Selection) -> Option<Edit> {
    if !selection.is_empty() {
        return None;
    }
    let pos = valid_pos(text, selection.position.min(text.len()))?;
    let line_range = line_around(text, pos);
    let line = &text[line_range.clone()];
    let col = pos - line_range.start;
    let indent = &line[..indent_len(line)];

    if col == indent.len() {
        let insert = format!("\n{}", indent);
        let (text, end) = replace_range(text, pos..pos, &insert);
        return Some(Edit {
            text,
            selection: Selection::cursor(end),
        });
    }

    let before = &line[..col];
    let after = &line[col..];
    let before_last_brace = after.len() == 1 && line.trim_end().ends_with('}');
    let mut at_end = after.is_empty();
    let mut cut = pos;
    if before.chars().next_back().map_or(false, |c| !c.is_whitespace()) && after.trim().is_empty() {
        cut = line_range.end;
        at_end = true;
    }
    if !at_end && !before_last_brace {
        return None;
    }

    let opens_block = before.trim_end().ends_with('{');
    let mut width: usize = indent
        .chars()
        .map(|c| if c == '\t' { TAB_WIDTH } else { 1 })
        .sum();
    if opens_block {
        width = (width / TAB_WIDTH + 1) * TAB_WIDTH;
    }
    let new_indent = if indent.starts_with('\t') {
        "\t".repeat(width / TAB_WIDTH)
    } else {
        " ".repeat(width)
    };

    let (insert, cursor) = if opens_block && before_last_brace {
        (format!("\n{}\n{}", new_indent, indent), 1 + new_indent.len())
    } else {
        let insert = format!("\n{}", new_indent);
        let len = insert.len();
        (insert, len)
    };
    let (text, _) = replace_range(text, pos..cut, &insert);
    Some(Edit {
        text,
        selection: Selection::cursor(pos + cursor),
    })
}

fn moved(selection: Selection, target: usize, extend: bool) -> Selection {
    if extend {
        Selection::new(selection.anchor, target)
    } else {
        Selection::cursor(target)
    }
}

/// Home key: first non-blank char of the line, then the line start
///
/// With `extend` the anchor stays and the selection grows.
pub fn home(text: &str, selection: Selection, extend: bool) -> Selection {
    let Some(pos) = valid_pos(text, selection.position.min(text.len())) else {
        return selection;
    };
    let line_range = line_around(text, pos);
    let indent = indent_len(&text[line_range.clone()]);
    let target = if pos - line_range.start == indent {
        line_range.start
    } else {
        line_range.start + indent
    };
    moved(selection, target, extend)
}

/// End key: end of the line, then just after its last non-blank char
pub fn end(text: &str, selection: Selection, extend: bool) -> Selection {
    let Some(pos) = valid_pos(text, selection.position.min(text.len())) else {
        return selection;
    };
    let line_range = line_around(text, pos);
    let line = &text[line_range.clone()];
    let trimmed = line.trim_end().len();

    let target = if pos != line_range.end {
        line_range.end
    } else if trimmed > 0 {
        line_range.start + trimmed
    } else {
        pos
    };
    moved(selection, target, extend)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enter(text: &str, pos: usize) -> Option<(String, usize)> {
        enter_with_indent(text, Selection::cursor(pos)).map(|e| (e.text, e.selection.position))
    }

    #[test]
    fn test_wrap_and_unwrap() {
        let text = "say hi now";
        let wrapped = toggle_wrap(text, Selection::new(4, 6), "<b>", "</b>", false).unwrap();
        assert_eq!(wrapped.text, "say <b>hi</b> now");
        assert_eq!(wrapped.selection, Selection::new(7, 9));

        let unwrapped = toggle_wrap(&wrapped.text, wrapped.selection, "<b>", "</b>", false).unwrap();
        assert_eq!(unwrapped.text, text);
        assert_eq!(unwrapped.selection, Selection::new(4, 6));
    }

    #[test]
    fn test_unwrap_tolerates_spaces() {
        let wrapped = toggle_wrap("x", Selection::new(1, 0), "{{c1::", "}}", true).unwrap();
        assert_eq!(wrapped.text, "{{c1:: x }}");
        assert_eq!(&wrapped.text[wrapped.selection.range()], "x");

        let unwrapped = toggle_wrap(&wrapped.text, wrapped.selection, "{{c1::", "}}", true).unwrap();
        assert_eq!(unwrapped.text, "x");
    }

    #[test]
    fn test_wrap_needs_both_sides() {
        // prefix present but not the suffix: wrap again
        let text = "<i>a b";
        let edit = toggle_wrap(text, Selection::new(3, 4), "<i>", "</i>", false).unwrap();
        assert_eq!(edit.text, "<i><i>a</i> b");
        assert_eq!(toggle_wrap(text, Selection::cursor(3), "<i>", "</i>", false), None);
    }

    #[test]
    fn test_enter_before_first_char_keeps_indent() {
        assert_eq!(enter("    foo", 4), Some(("    \n    foo".to_string(), 9)));
        assert_eq!(enter("", 0), Some(("\n".to_string(), 1)));
    }

    #[test]
    fn test_enter_after_brace_indents_deeper() {
        assert_eq!(enter("  a {", 5), Some(("  a {\n    ".to_string(), 10)));
        assert_eq!(enter("\tif {", 5), Some(("\tif {\n\t\t".to_string(), 8)));
        assert_eq!(enter("  b;", 4), Some(("  b;\n  ".to_string(), 7)));
    }

    #[test]
    fn test_enter_splits_brace_pair() {
        let (text, cursor) = enter("a {}", 3).unwrap();
        assert_eq!(text, "a {\n    \n}");
        assert_eq!(cursor, 8);
    }

    #[test]
    fn test_enter_drops_trailing_blanks() {
        assert_eq!(enter("abc   \nz", 3), Some(("abc\n\nz".to_string(), 4)));
    }

    #[test]
    fn test_enter_mid_line_is_plain() {
        assert_eq!(enter("ab cd", 2), None);
        assert_eq!(enter_with_indent("abc", Selection::new(0, 2)), None);
    }

    #[test]
    fn test_smart_home_toggles() {
        let text = "x\n    foo";
        let first = home(text, Selection::cursor(8), false);
        assert_eq!(first, Selection::cursor(6));
        let second = home(text, first, false);
        assert_eq!(second, Selection::cursor(2));
        assert_eq!(home(text, second, false), Selection::cursor(6));
    }

    #[test]
    fn test_home_extends_selection() {
        let text = "  ab";
        assert_eq!(home(text, Selection::new(4, 3), true), Selection::new(4, 2));
        assert_eq!(home("ab", Selection::cursor(0), false), Selection::cursor(0));
    }

    #[test]
    fn test_smart_end_toggles() {
        let text = "foo   \nbar";
        let first = end(text, Selection::cursor(1), false);
        assert_eq!(first, Selection::cursor(6));
        let second = end(text, first, false);
        assert_eq!(second, Selection::cursor(3));
        assert_eq!(end(text, second, false), Selection::cursor(6));
        assert_eq!(end(text, Selection::cursor(1), true), Selection::new(1, 6));
    }
}
