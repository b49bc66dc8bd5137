//! Line highlighter
//!
//! Highlights one line at a time given the block state left open by the
//! previous line. Work proceeds in layers, each painting over the last:
//!
//! 1. Block resolution splits the line into block parts (comments and
//!    template literals) and code segments.
//! 2. Code segments get the rule table; block parts get the rules that
//!    also apply inside comments.
//! 3. Strings in code segments, skipping quoted values of `on*=`,
//!    `style=`, `id=` and `class=` attributes.
//! 4. Color swatches, the rehighlight target, odd whitespace and tabs,
//!    over the whole line.

use std::ops::Range;
use std::sync::OnceLock;

use regex::{Regex, RegexBuilder};
use tracing::error;

use super::builtin::template_rules;
use super::color::{contrast_fg, convert_color_to_hex, named_color, parse_hex};
use super::lexer::{find_opening, is_escaped, Opening};
use super::rules::{BlockKind, HighlightResult, LineState, RuleTable, StyleRule};
use super::style::{Span, Style};
use super::theme::Theme;
use super::tokens::TokenType;

/// Default iteration ceiling for the per-line scanning loops
pub const DEFAULT_SCAN_LIMIT: usize = 10_000;

/// Bracket chars and their counterparts for the rehighlight target
const PAIR_OPEN: &str = "{[(<}])>";
const PAIR_CLOSE: &str = "}])>{[(<";

struct Scanners {
    attribute: Regex,
    quotes: [Regex; 3],
    hex: Regex,
    word: Regex,
    func: Regex,
    odd_space: Regex,
    tabs: Regex,
}

fn scanners() -> Option<&'static Scanners> {
    static SCANNERS: OnceLock<Option<Scanners>> = OnceLock::new();
    SCANNERS
        .get_or_init(|| {
            let compiled = (|| -> Result<Scanners, regex::Error> {
                let ci = |p: &str| RegexBuilder::new(p).case_insensitive(true).build();
                Ok(Scanners {
                    attribute: Regex::new(
                        r"\bon[a-zA-Z]{3,16}\s*=\s*|\bstyle\s*=\s*|\bid\s*=\s*|\bclass\s*=\s*",
                    )?,
                    quotes: [
                        Regex::new(r#""[^"\\]*(?:\\.[^"\\]*)*""#)?,
                        Regex::new(r"'[^'\\]*(?:\\.[^'\\]*)*'")?,
                        Regex::new(r"`[^`\\]*(?:\\.[^`\\]*)*`")?,
                    ],
                    hex: ci(r"#[a-f0-9]{3,8}\b")?,
                    word: Regex::new(r"\b([a-zA-Z]{3,20})\b")?,
                    func: ci(r"rgba?\([^)]+\)|hsla?\([^)]+\)")?,
                    odd_space: Regex::new(
                        "[\u{00A0}\u{2000}-\u{200C}\u{200E}\u{200F}\u{202F}\u{205F}\u{3000}]+",
                    )?,
                    tabs: Regex::new(r"\t+")?,
                })
            })();
            compiled
                .map_err(|e| error!(error = %e, "highlighter scanners unavailable"))
                .ok()
        })
        .as_ref()
}

/// Per-byte style buffer; a later paint replaces an earlier one
struct Painter {
    styles: Vec<Style>,
}

impl Painter {
    fn new(len: usize) -> Self {
        Self {
            styles: vec![Style::default(); len],
        }
    }

    fn paint(&mut self, range: Range<usize>, style: Style) {
        let end = range.end.min(self.styles.len());
        if range.start < end {
            self.styles[range.start..end].fill(style);
        }
    }

    fn into_spans(self, offset: usize) -> Vec<Span> {
        let mut spans: Vec<Span> = Vec::new();
        for (i, style) in self.styles.into_iter().enumerate() {
            if style.is_default() {
                continue;
            }
            match spans.last_mut() {
                Some(last) if last.end == offset + i && last.style == style => last.end += 1,
                _ => spans.push(Span::new(offset + i, offset + i + 1, style)),
            }
        }
        spans
    }
}

/// Single-line highlighter for card template code
pub struct LineHighlighter {
    rules: RuleTable,
    theme: Theme,
    target: Option<String>,
    scan_limit: usize,
}

impl LineHighlighter {
    /// Create a highlighter with the built-in template rules
    pub fn new(theme: Theme) -> Self {
        Self::with_rules(template_rules(), theme)
    }

    /// Create a highlighter with a custom rule table
    pub fn with_rules(rules: RuleTable, theme: Theme) -> Self {
        Self {
            rules,
            theme,
            target: None,
            scan_limit: DEFAULT_SCAN_LIMIT,
        }
    }

    /// Builder: set the iteration ceiling for scanning loops
    pub fn with_scan_limit(mut self, limit: usize) -> Self {
        self.scan_limit = limit.max(1);
        self
    }

    /// Text whose occurrences are flagged on every line
    pub fn set_target(&mut self, target: Option<String>) {
        self.target = target.filter(|t| !t.is_empty());
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.theme = theme;
    }

    /// Highlight one line
    ///
    /// `text` must not contain a newline. Span offsets are shifted by
    /// `start_offset`. The result depends only on the arguments and the
    /// highlighter's configuration.
    pub fn highlight_line(&self, text: &str, start_offset: usize, carry: LineState) -> HighlightResult {
        let mut painter = Painter::new(text.len());
        let (code, end_state) = self.resolve_blocks(text, carry, &mut painter);

        for segment in &code {
            self.paint_strings(text, segment.clone(), &mut painter);
        }
        self.paint_swatches(text, &mut painter);
        self.paint_target(text, &mut painter);
        self.paint_whitespace(text, &mut painter);

        HighlightResult {
            spans: painter.into_spans(start_offset),
            end_state,
        }
    }

    /// Split the line into block parts and code segments
    ///
    /// Paints block parts and runs the rule table over code segments.
    /// Returns the code segments and the state for the next line.
    fn resolve_blocks(
        &self,
        text: &str,
        carry: LineState,
        painter: &mut Painter,
    ) -> (Vec<Range<usize>>, LineState) {
        let mut code = Vec::new();
        let mut open = carry.open_block;
        let mut pos = 0;
        let mut budget = self.scan_limit;

        while pos < text.len() {
            if budget == 0 {
                error!(line = %text, "scan limit reached resolving blocks");
                break;
            }
            budget -= 1;

            if let Some(kind) = open {
                let end = find_block_end(text, pos, kind);
                let stop = end.unwrap_or(text.len());
                self.paint_block(text, pos..stop, kind.token_type(), painter);
                if end.is_none() {
                    break;
                }
                open = None;
                pos = stop;
                continue;
            }

            match find_opening(&text[pos..]) {
                Some((at, opening)) => {
                    let at = pos + at;
                    self.paint_code(text, pos..at, painter);
                    code.push(pos..at);
                    match opening {
                        Opening::Block(kind) => {
                            let token_end = at + opening.token_len();
                            painter.paint(at..token_end, self.theme.style(kind.token_type()));
                            open = Some(kind);
                            pos = token_end;
                        }
                        Opening::LineComment => {
                            self.paint_block(text, at..text.len(), TokenType::Comment, painter);
                            pos = text.len();
                        }
                    }
                }
                None => {
                    self.paint_code(text, pos..text.len(), painter);
                    code.push(pos..text.len());
                    pos = text.len();
                }
            }
        }

        (code, LineState { open_block: open })
    }

    fn paint_block(&self, text: &str, range: Range<usize>, token: TokenType, painter: &mut Painter) {
        painter.paint(range.clone(), self.theme.style(token));
        self.apply_rules(text, range, self.rules.comment_rules(), painter);
    }

    fn paint_code(&self, text: &str, range: Range<usize>, painter: &mut Painter) {
        if !range.is_empty() {
            self.apply_rules(text, range, self.rules.rules().iter(), painter);
        }
    }

    fn apply_rules<'a>(
        &self,
        text: &str,
        range: Range<usize>,
        rules: impl Iterator<Item = &'a StyleRule>,
        painter: &mut Painter,
    ) {
        let sub = &text[range.clone()];
        for rule in rules {
            let style = self.theme.style(rule.token_type);
            for r in rule.paint_ranges(sub) {
                painter.paint(range.start + r.start..range.start + r.end, style);
            }
        }
    }

    /// Paint string literals in a code segment
    ///
    /// Quoted values following an event-handler, `style`, `id` or `class`
    /// attribute are skipped whole.
    fn paint_strings(&self, text: &str, segment: Range<usize>, painter: &mut Painter) {
        let Some(sc) = scanners() else {
            return;
        };
        let seg = &text[segment.clone()];
        let base = segment.start;
        let mut position = 0;
        let mut budget = self.scan_limit;

        while position < seg.len() {
            if budget == 0 {
                error!(line = %text, "scan limit reached scanning strings");
                return;
            }
            budget -= 1;

            let Some(attr) = sc.attribute.find_at(seg, position) else {
                self.paint_plain_strings(text, base + position..segment.end, painter);
                return;
            };
            self.paint_plain_strings(text, base + position..base + attr.start(), painter);

            let value = sc
                .quotes
                .iter()
                .filter_map(|re| re.find_at(seg, attr.end()))
                .find(|m| m.start() == attr.end());
            position = match value {
                Some(m) => m.end(),
                None => attr.end(),
            };
        }
    }

    fn paint_plain_strings(&self, text: &str, range: Range<usize>, painter: &mut Painter) {
        let Some(sc) = scanners() else {
            return;
        };
        let sub = &text[range.clone()];
        let style = self.theme.style(TokenType::String);
        for re in &sc.quotes {
            for m in re.find_iter(sub) {
                let abs = range.start + m.start()..range.start + m.end();
                painter.paint(abs.clone(), style);
                self.apply_rules(text, abs, self.rules.comment_rules(), painter);
            }
        }
    }

    /// Paint a background swatch behind every color value
    fn paint_swatches(&self, text: &str, painter: &mut Painter) {
        let Some(sc) = scanners() else {
            return;
        };
        let swatch = |color| Style::bg(color).with_fg(contrast_fg(color));

        for m in sc.hex.find_iter(text) {
            if let Some(color) = parse_hex(m.as_str()) {
                painter.paint(m.range(), swatch(color));
            }
        }

        for caps in sc.word.captures_iter(text) {
            if let Some(word) = caps.get(1) {
                if let Some(color) = named_color(word.as_str()) {
                    painter.paint(word.range(), swatch(color));
                }
            }
        }

        for m in sc.func.find_iter(text) {
            if let Some(color) = parse_hex(&convert_color_to_hex(m.as_str())) {
                // only the function name, the arguments stay readable
                painter.paint(m.start()..m.start() + 4, swatch(color));
            }
        }
    }

    /// Flag occurrences of the target, plus the counterpart of a
    /// single-bracket target
    fn paint_target(&self, text: &str, painter: &mut Painter) {
        let Some(target) = self.target.as_deref() else {
            return;
        };
        for (at, found) in text.match_indices(target) {
            painter.paint(at..at + found.len(), self.theme.selection_match);
        }

        let mut chars = target.chars();
        if let (Some(ch), None) = (chars.next(), chars.next()) {
            if let Some(idx) = PAIR_OPEN.find(ch) {
                if let Some(partner) = PAIR_CLOSE[idx..].chars().next() {
                    for (at, found) in text.match_indices(partner) {
                        painter.paint(at..at + found.len(), self.theme.paired);
                    }
                }
            }
        }
    }

    fn paint_whitespace(&self, text: &str, painter: &mut Painter) {
        let Some(sc) = scanners() else {
            return;
        };
        for m in sc.odd_space.find_iter(text) {
            painter.paint(m.range(), self.theme.odd_whitespace);
        }
        for m in sc.tabs.find_iter(text) {
            painter.paint(m.range(), self.theme.tab);
        }
    }
}

/// Byte offset just past the end token of `kind`, searching from `from`
fn find_block_end(text: &str, from: usize, kind: BlockKind) -> Option<usize> {
    let token = kind.end_token();
    let mut search = from;
    while let Some(found) = text[search..].find(token) {
        let at = search + found;
        if kind == BlockKind::TemplateLiteral && is_escaped(text, at) {
            search = at + token.len();
            continue;
        }
        return Some(at + token.len());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::style::Color;

    fn highlighter() -> LineHighlighter {
        LineHighlighter::new(Theme::light())
    }

    fn style_at(result: &HighlightResult, pos: usize) -> Style {
        result
            .spans
            .iter()
            .find(|s| s.contains(pos))
            .map(|s| s.style)
            .unwrap_or_default()
    }

    fn fg(token: TokenType) -> Color {
        Theme::light().style(token).fg
    }

    fn run_document(h: &LineHighlighter, doc: &str) -> Vec<HighlightResult> {
        let mut state = LineState::default();
        doc.split('\n')
            .map(|line| {
                let result = h.highlight_line(line, 0, state);
                state = result.end_state;
                result
            })
            .collect()
    }

    #[test]
    fn test_html_comment_opens_and_closes() {
        let h = highlighter();
        let r = h.highlight_line("<b>x</b> <!-- note", 0, LineState::default());
        assert_eq!(r.end_state, LineState::inside(BlockKind::HtmlComment));
        assert_eq!(style_at(&r, 12).fg, fg(TokenType::Comment));
        assert_eq!(style_at(&r, 1).fg, fg(TokenType::HtmlTag));

        let r = h.highlight_line("still --> <i>", 0, r.end_state);
        assert!(r.end_state.is_normal());
        assert_eq!(style_at(&r, 0).fg, fg(TokenType::Comment));
        assert_eq!(style_at(&r, 8).fg, fg(TokenType::Comment));
        assert_eq!(style_at(&r, 11).fg, fg(TokenType::HtmlTag));
    }

    #[test]
    fn test_block_state_between_delimiters() {
        let h = highlighter();
        for (open, close, kind) in [
            ("<!--", "-->", BlockKind::HtmlComment),
            ("/*", "*/", BlockKind::BlockComment),
            ("var t = `", "`;", BlockKind::TemplateLiteral),
        ] {
            let doc = format!("a {{\n{} one\ntwo\nthree {} b\nc", open, close);
            let results = run_document(&h, &doc);
            let states: Vec<_> = results.iter().map(|r| r.end_state.open_block).collect();
            assert_eq!(states, vec![None, Some(kind), Some(kind), None, None]);
        }
    }

    #[test]
    fn test_url_does_not_open_comment() {
        let h = highlighter();
        let r = h.highlight_line(r#"<a href="http://example.com">go</a>"#, 0, LineState::default());
        assert!(r.end_state.is_normal());
        let r = h.highlight_line("see http://example.com now", 0, LineState::default());
        assert_ne!(style_at(&r, 24).fg, fg(TokenType::Comment));
    }

    #[test]
    fn test_comment_token_in_string_ignored() {
        let h = highlighter();
        let r = h.highlight_line(r#"var s = "//not a comment";"#, 0, LineState::default());
        assert!(r.end_state.is_normal());
        assert_eq!(style_at(&r, 12).fg, fg(TokenType::String));

        let r = h.highlight_line(r#"x = "/*"; y = 1;"#, 0, LineState::default());
        assert!(r.end_state.is_normal());
    }

    #[test]
    fn test_line_comment_paints_to_end() {
        let h = highlighter();
        let r = h.highlight_line("x = 1; // if (y) {", 0, LineState::default());
        assert!(r.end_state.is_normal());
        assert_eq!(style_at(&r, 10).fg, fg(TokenType::Comment));
        assert_eq!(style_at(&r, 17).fg, fg(TokenType::Comment));
    }

    #[test]
    fn test_fields_painted_inside_comments() {
        let h = highlighter();
        let r = h.highlight_line("<!-- {{Front}} -->", 0, LineState::default());
        assert_eq!(style_at(&r, 7).fg, fg(TokenType::AnkiField));
        assert_eq!(style_at(&r, 2).fg, fg(TokenType::Comment));
    }

    #[test]
    fn test_escaped_backtick_keeps_literal_open() {
        let h = highlighter();
        let r = h.highlight_line(r"s = `a\` b", 0, LineState::default());
        assert_eq!(r.end_state, LineState::inside(BlockKind::TemplateLiteral));
    }

    #[test]
    fn test_attribute_values_skip_string_pass() {
        let h = highlighter();
        let line = r#"<div class="box" title="hi">"#;
        let r = h.highlight_line(line, 0, LineState::default());
        // class value keeps its class color
        assert_eq!(style_at(&r, 12).fg, fg(TokenType::CssClass));
        // ordinary attribute value is a string
        assert_eq!(style_at(&r, 24).fg, fg(TokenType::String));
    }

    #[test]
    fn test_unquoted_attribute_value_keeps_later_string() {
        let h = highlighter();
        let line = r#"<div id=main title="hello">"#;
        let r = h.highlight_line(line, 0, LineState::default());
        assert_eq!(style_at(&r, 20).fg, fg(TokenType::String));
    }

    #[test]
    fn test_color_swatches() {
        let h = highlighter();
        let r = h.highlight_line("color: #000080; background: white;", 0, LineState::default());
        let swatch = style_at(&r, 8);
        assert_eq!(swatch.bg, Color::rgb(0, 0, 128));
        assert_eq!(swatch.fg, Color::WHITE);
        let named = style_at(&r, 29);
        assert_eq!(named.bg, Color::WHITE);
        assert_eq!(named.fg, Color::BLACK);
    }

    #[test]
    fn test_function_swatch_covers_name_only() {
        let h = highlighter();
        let r = h.highlight_line("a: rgb(255, 0, 0);", 0, LineState::default());
        assert_eq!(style_at(&r, 3).bg, Color::rgb(255, 0, 0));
        assert_eq!(style_at(&r, 6).bg, Color::rgb(255, 0, 0));
        assert_ne!(style_at(&r, 7).bg, Color::rgb(255, 0, 0));
    }

    #[test]
    fn test_target_and_paired_bracket() {
        let mut h = highlighter();
        h.set_target(Some("{".to_string()));
        let r = h.highlight_line("a { b } c", 0, LineState::default());
        assert_eq!(style_at(&r, 2), h.theme().selection_match);
        assert_eq!(style_at(&r, 6), h.theme().paired);

        h.set_target(Some(String::new()));
        assert!(h.target().is_none());
    }

    #[test]
    fn test_whitespace_markers() {
        let h = highlighter();
        let r = h.highlight_line("a\u{00A0}b\tc", 0, LineState::default());
        assert_eq!(style_at(&r, 1), h.theme().odd_whitespace);
        assert_eq!(style_at(&r, 4), h.theme().tab);
    }

    #[test]
    fn test_start_offset_shifts_spans() {
        let h = highlighter();
        let a = h.highlight_line("<b>x</b>", 0, LineState::default());
        let b = h.highlight_line("<b>x</b>", 100, LineState::default());
        let shifted: Vec<_> = a.spans.iter().map(|s| s.shifted(100)).collect();
        assert_eq!(b.spans, shifted);
    }

    #[test]
    fn test_highlighting_is_deterministic() {
        let h = highlighter();
        let doc = "<style>\n/* a\n b */ .x { color: red; }\n</style>\n<script>\nvar s = `\n${a}`;\n</script>";
        assert_eq!(run_document(&h, doc), run_document(&h, doc));
    }

    #[test]
    fn test_scan_limit_stops_pathological_line() {
        let h = highlighter().with_scan_limit(2);
        let line = "/**/".repeat(50);
        let r = h.highlight_line(&line, 0, LineState::default());
        // stopped early but still produced output
        assert!(!r.spans.is_empty());
        assert_eq!(style_at(&r, 1).fg, fg(TokenType::Comment));
        // stopped after the first comment closed, so nothing is left open
        assert_eq!(r.end_state, LineState::default());

        let next = h.highlight_line("<b>x</b>", line.len() + 1, r.end_state);
        let fresh = highlighter().highlight_line("<b>x</b>", line.len() + 1, LineState::default());
        assert_eq!(next.spans, fresh.spans);
        assert_eq!(next.end_state, LineState::default());
    }

    #[test]
    fn test_non_ascii_text() {
        let h = highlighter();
        let r = h.highlight_line("<p>héllo → «wörld»</p> /* ж", 0, LineState::default());
        assert_eq!(r.end_state, LineState::inside(BlockKind::BlockComment));
    }
}
