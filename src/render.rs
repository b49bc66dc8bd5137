//! Terminal output of highlighted lines
//!
//! Maps [`Style`] onto ANSI attributes with crossterm. Writes go to any
//! `io::Write`, so the output can be captured.

use std::io::Write;

use crossterm::queue;
use crossterm::style::{
    Attribute, Color as TermColor, Print, ResetColor, SetAttribute, SetBackgroundColor,
    SetForegroundColor, SetUnderlineColor,
};
use unicode_width::UnicodeWidthChar;

use crate::error::Result;
use crate::syntax::{split_lines, Color, DocumentHighlighter, Span, Style, UnderlineStyle};

fn term_color(color: Color) -> Option<TermColor> {
    match color {
        Color::Default => None,
        Color::Rgb(r, g, b) => Some(TermColor::Rgb { r, g, b }),
    }
}

/// Byte length of the longest prefix of `s` that fits in `max_width` columns
pub fn width_cutoff(s: &str, max_width: usize) -> usize {
    let mut width = 0;
    for (idx, ch) in s.char_indices() {
        let ch_width = ch.width().unwrap_or(1);
        if width + ch_width > max_width {
            return idx;
        }
        width += ch_width;
    }
    s.len()
}

fn set_style<W: Write>(out: &mut W, style: &Style) -> Result<()> {
    if let Some(fg) = term_color(style.fg) {
        queue!(out, SetForegroundColor(fg))?;
    }
    if let Some(bg) = term_color(style.bg) {
        queue!(out, SetBackgroundColor(bg))?;
    }
    if style.bold {
        queue!(out, SetAttribute(Attribute::Bold))?;
    }
    if style.italic {
        queue!(out, SetAttribute(Attribute::Italic))?;
    }
    if let Some(underline) = style.underline {
        let attr = match underline.style {
            UnderlineStyle::Single => Attribute::Underlined,
            UnderlineStyle::Wave => Attribute::Undercurled,
        };
        queue!(out, SetAttribute(attr))?;
        if let Some(color) = term_color(underline.color) {
            queue!(out, SetUnderlineColor(color))?;
        }
    }
    Ok(())
}

/// Write one line with its spans (offsets relative to the line start)
///
/// With `max_cols`, the line is cut to that display width.
pub fn render_line<W: Write>(out: &mut W, line: &str, spans: &[Span], max_cols: Option<usize>) -> Result<()> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let end = max_cols.map_or(line.len(), |cols| width_cutoff(line, cols));

    let mut pos = 0;
    for span in spans {
        let start = span.start.max(pos);
        let stop = span.end.min(end);
        if start >= stop {
            continue;
        }
        if !line.is_char_boundary(start) || !line.is_char_boundary(stop) {
            continue;
        }
        if pos < start {
            queue!(out, Print(&line[pos..start]))?;
        }
        set_style(out, &span.style)?;
        queue!(out, Print(&line[start..stop]), SetAttribute(Attribute::Reset), ResetColor)?;
        pos = stop;
    }
    if pos < end {
        queue!(out, Print(&line[pos..end]))?;
    }
    queue!(out, Print('\n'))?;
    Ok(())
}

/// Write a whole highlighted document
pub fn render_document<W: Write>(
    out: &mut W,
    text: &str,
    highlighter: &DocumentHighlighter,
    max_cols: Option<usize>,
) -> Result<()> {
    for (idx, (_, line)) in split_lines(text).into_iter().enumerate() {
        render_line(out, line, highlighter.spans(idx), max_cols)?;
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(line: &str, spans: &[Span], max_cols: Option<usize>) -> String {
        let mut out = Vec::new();
        render_line(&mut out, line, spans, max_cols).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_width_cutoff() {
        assert_eq!(width_cutoff("abc", 2), 2);
        assert_eq!(width_cutoff("abc", 10), 3);
        // wide chars take two columns
        assert_eq!(width_cutoff("日本", 3), 3);
    }

    #[test]
    fn test_plain_line() {
        assert_eq!(rendered("hello", &[], None), "hello\n");
        assert_eq!(rendered("hello\r", &[], Some(3)), "hel\n");
    }

    #[test]
    fn test_styled_span() {
        let style = Style::fg(Color::rgb(255, 0, 0)).with_bold();
        let out = rendered("a bc d", &[Span::new(2, 4, style)], None);
        assert!(out.starts_with("a "));
        assert!(out.contains("\x1b[38;2;255;0;0m"));
        assert!(out.contains("bc"));
        assert!(out.ends_with(" d\n"));
    }

    #[test]
    fn test_span_cut_by_width() {
        let style = Style::fg(Color::rgb(0, 0, 255));
        let out = rendered("abcdef", &[Span::new(4, 6, style)], Some(3));
        assert_eq!(out, "abc\n");
    }
}
