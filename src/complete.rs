//! Autocomplete candidates and insertion
//!
//! Candidates come from three lists, in this order: items the user picked
//! recently, built-in HTML/CSS/JS names plus configured snippets, and
//! words harvested from the document.
//!
//! A snippet is written `%name body`. Accepting it inserts the body with
//! `⇥` turned into tabs and `$$` replaced by the text that was selected
//! before completion started; a `%%` in the body ends up selected.

use std::ops::Range;
use std::sync::OnceLock;

use regex::Regex;
use tracing::error;

use crate::host::Selection;
use crate::pairs::is_void_element;
use crate::syntax::DEFAULT_SCAN_LIMIT;

/// Number of recently used items kept
pub const RECENT_LIMIT: usize = 10;

/// Shown in place of a tab inside snippet bodies
pub const TAB_MARK: char = '⇥';

/// Elements that get their closing tag inserted after `>`
const AUTO_CLOSE: [&str; 70] = [
    "html", "head", "body", "title", "script", "style", "div", "span", "p", "a", "ul", "ol",
    "li", "table", "thead", "tbody", "tfoot", "tr", "td", "th", "b", "strong", "i", "em", "u",
    "mark", "small", "del", "ins", "sup", "sub", "h1", "h2", "h3", "h4", "h5", "h6", "form",
    "label", "fieldset", "legend", "select", "option", "textarea", "button", "figure",
    "figcaption", "article", "section", "nav", "aside", "main", "header", "footer", "details",
    "summary", "time", "code", "pre", "blockquote", "q", "canvas", "svg", "noscript", "iframe",
    "object", "audio", "video", "map", "address",
];

const HTML_TAGS: &[&str] = &[
    "<a", "<abbr", "<address", "<area", "<article", "<aside", "<audio", "<b", "<base", "<bdi",
    "<bdo", "<blockquote", "<body", "<br", "<button", "<canvas", "<caption", "<cite", "<code",
    "<col", "<colgroup", "<data", "<datalist", "<dd", "<del", "<details", "<dfn", "<dialog",
    "<div", "<dl", "<dt", "<em", "<embed", "<fieldset", "<figcaption", "<figure", "<footer",
    "<form", "<h1", "<h2", "<h3", "<h4", "<h5", "<h6", "<head", "<header", "<hr", "<html", "<i",
    "<iframe", "<img", "<input", "<ins", "<kbd", "<label", "<legend", "<li", "<link", "<main",
    "<map", "<mark", "<meta", "<meter", "<nav", "<noscript", "<object", "<ol", "<optgroup",
    "<option", "<output", "<p", "<param", "<picture", "<pre", "<progress", "<q", "<rp", "<rt",
    "<ruby", "<s", "<samp", "<script", "<section", "<select", "<small", "<source", "<span",
    "<strong", "<style", "<sub", "<summary", "<sup", "<table", "<tbody", "<td", "<template",
    "<textarea", "<tfoot", "<th", "<thead", "<time", "<title", "<tr", "<track", "<u", "<ul",
    "<var", "<video", "<wbr",
];

const HTML_ATTRIBUTES: &[&str] = &[
    "accept", "accesskey", "action", "align", "allow", "alt", "async", "autocomplete",
    "autofocus", "autoplay", "background", "bgcolor", "border", "charset", "checked", "cite",
    "class", "color", "cols", "colspan", "content", "contenteditable", "controls", "crossorigin",
    "data", "datetime", "default", "defer", "dir", "disabled", "download", "draggable", "for",
    "form", "height", "hidden", "href", "hreflang", "id", "label", "lang", "list", "loading",
    "loop", "max", "maxlength", "media", "method", "min", "multiple", "muted", "name", "open",
    "pattern", "placeholder", "poster", "preload", "readonly", "rel", "required", "role", "rows",
    "rowspan", "selected", "size", "span", "spellcheck", "src", "srcset", "start", "step",
    "style", "tabindex", "target", "title", "type", "value", "width", "wrap", "aria-hidden",
    "aria-label", "aria-labelledby", "aria-describedby", "aria-expanded", "aria-live",
];

const CSS_PROPERTIES: &[&str] = &[
    "align-content", "align-items", "align-self", "animation", "animation-delay",
    "animation-duration", "animation-name", "aspect-ratio", "background", "background-color",
    "background-image", "background-position", "background-repeat", "background-size", "border",
    "border-bottom", "border-collapse", "border-color", "border-left", "border-radius",
    "border-right", "border-style", "border-top", "border-width", "bottom", "box-shadow",
    "box-sizing", "clear", "color", "column-gap", "cursor", "display", "filter", "flex",
    "flex-direction", "flex-grow", "flex-shrink", "flex-wrap", "float", "font", "font-family",
    "font-size", "font-style", "font-weight", "gap", "grid", "grid-area", "grid-template-columns",
    "grid-template-rows", "height", "justify-content", "left", "letter-spacing", "line-height",
    "list-style", "margin", "margin-bottom", "margin-left", "margin-right", "margin-top",
    "max-height", "max-width", "min-height", "min-width", "object-fit", "opacity", "outline",
    "overflow", "overflow-x", "overflow-y", "padding", "padding-bottom", "padding-left",
    "padding-right", "padding-top", "pointer-events", "position", "right", "text-align",
    "text-decoration", "text-shadow", "text-transform", "top", "transform", "transition",
    "user-select", "vertical-align", "visibility", "white-space", "width", "word-break",
    "word-wrap", "z-index",
];

const JS_NAMES: &[&str] = &[
    "addEventListener", "appendChild", "classList", "clearInterval", "clearTimeout", "console",
    "createElement", "dataset", "document", "forEach", "getAttribute", "getElementById",
    "getElementsByClassName", "innerHTML", "innerText", "insertAdjacentHTML", "JSON", "length",
    "localStorage", "querySelector", "querySelectorAll", "removeAttribute", "removeChild",
    "removeEventListener", "replaceAll", "setAttribute", "setInterval", "setTimeout",
    "sessionStorage", "startsWith", "endsWith", "style", "textContent", "toLowerCase",
    "toUpperCase", "trim", "window",
];

fn word_regex() -> Option<&'static Regex> {
    static WORD: OnceLock<Option<Regex>> = OnceLock::new();
    WORD.get_or_init(|| {
        Regex::new(r"[A-Za-z_][0-9A-Za-z_-]*")
            .map_err(|e| error!(error = %e, "word harvesting unavailable"))
            .ok()
    })
    .as_ref()
}

fn is_prefix_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '-' | '_' | '<' | '%')
}

fn is_prefix_start(c: char) -> bool {
    c.is_alphabetic() || matches!(c, '_' | '<' | '%')
}

/// Range of the partial word ending at `cursor`
///
/// The word is a run of letters, digits, `-`, `_`, `<` and `%`, trimmed
/// on the left until it starts with a letter, `_`, `<` or `%`.
pub fn completion_prefix(text: &str, cursor: usize) -> Option<Range<usize>> {
    let cursor = cursor.min(text.len());
    let before = text.get(..cursor)?;

    let mut start = cursor;
    for (steps, (idx, ch)) in before.char_indices().rev().enumerate() {
        if steps >= DEFAULT_SCAN_LIMIT {
            error!(cursor, "completion prefix scan limit reached");
            break;
        }
        if !is_prefix_char(ch) {
            break;
        }
        start = idx;
    }

    let offset = text[start..cursor].find(is_prefix_start)?;
    let start = start + offset;
    (start < cursor).then_some(start..cursor)
}

/// Closing tag to insert after typing the `>` that ends `line_before`
pub fn closing_tag_for(line_before: &str) -> Option<String> {
    let line = line_before.trim_end();
    let last = line.rsplit_once('<').map_or("", |(_, tag)| tag);

    if let Some(name) = last.strip_suffix('>') {
        if !name.is_empty() && name.bytes().all(|b| b.is_ascii_alphanumeric()) {
            if is_void_element(name) {
                return None;
            }
            if AUTO_CLOSE.contains(&name) {
                return Some(format!("</{}>", name));
            }
        }
    }

    for (tag, attr) in [("<a ", "href"), ("<audio ", "src"), ("<video ", "src")] {
        if line.contains(tag) && (line.contains(&format!("{}=", attr)) || line.contains(&format!("{} =", attr))) {
            return Some(format!("</{}>", tag[1..].trim_end()));
        }
    }
    None
}

/// Result of accepting a completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub selection: Selection,
}

/// Replace the prefix ending at `cursor` with `item`
///
/// `selected` is the text that was selected before completion started;
/// it fills `$$` in snippet bodies.
pub fn apply_completion(text: &str, cursor: usize, item: &str, selected: &str) -> Completion {
    let range = completion_prefix(text, cursor).unwrap_or(cursor.min(text.len())..cursor.min(text.len()));

    let inserted = if item.starts_with('%') {
        let body = item.split_once(' ').map_or("", |(_, body)| body);
        body.replace(TAB_MARK, "\t").replace("$$", selected)
    } else {
        item.replace(TAB_MARK, "\t")
    };

    let mut out = String::with_capacity(text.len() + inserted.len());
    out.push_str(&text[..range.start]);
    out.push_str(&inserted);
    out.push_str(&text[range.end..]);

    let end = range.start + inserted.len();
    let selection = match inserted.find("%%") {
        Some(marker) if item.starts_with('%') => {
            let at = range.start + marker;
            Selection::new(at, at + 2)
        }
        _ => Selection::cursor(end),
    };
    Completion {
        text: out,
        selection,
    }
}

/// Words of `text` worth offering, in first-seen order
///
/// Tag names right after `<` or `</` are skipped.
pub fn harvest_words(text: &str) -> Vec<String> {
    let Some(word) = word_regex() else {
        return Vec::new();
    };
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for m in word.find_iter(text) {
        let before = &text[..m.start()];
        if before.ends_with('<') || before.ends_with("</") {
            continue;
        }
        if before
            .chars()
            .next_back()
            .map_or(false, |c| c.is_alphanumeric() || c == '-')
        {
            continue;
        }
        if seen.insert(m.as_str()) {
            out.push(m.as_str().to_string());
        }
    }
    out
}

/// Candidate lists for one editor
#[derive(Debug, Clone, Default)]
pub struct Completer {
    recent: Vec<String>,
    builtin: Vec<String>,
    words: Vec<String>,
}

impl Completer {
    /// Built-in names plus `snippets` (tabs shown as `⇥`)
    pub fn new(snippets: &[String]) -> Self {
        let mut builtin: Vec<String> = HTML_TAGS
            .iter()
            .chain(HTML_ATTRIBUTES)
            .chain(CSS_PROPERTIES)
            .chain(JS_NAMES)
            .map(|s| s.to_string())
            .collect();
        builtin.sort();
        builtin.dedup();
        builtin.extend(snippets.iter().map(|s| s.replace('\t', &TAB_MARK.to_string())));
        Self {
            builtin,
            ..Default::default()
        }
    }

    /// Replace the document words with those of `text`
    pub fn harvest(&mut self, text: &str) {
        self.words = harvest_words(text);
    }

    /// Every item, recent first, without duplicates
    pub fn items(&self) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        self.recent
            .iter()
            .chain(&self.builtin)
            .chain(&self.words)
            .map(String::as_str)
            .filter(|s| seen.insert(*s))
            .collect()
    }

    /// Items starting with `prefix`, ignoring case
    pub fn candidates(&self, prefix: &str) -> Vec<&str> {
        let prefix = prefix.to_lowercase();
        self.items()
            .into_iter()
            .filter(|item| item.to_lowercase().starts_with(&prefix))
            .collect()
    }

    /// Candidates for the word ending at `cursor`, if any
    pub fn candidates_at(&self, text: &str, cursor: usize) -> Vec<&str> {
        completion_prefix(text, cursor)
            .map(|range| self.candidates(&text[range]))
            .unwrap_or_default()
    }

    /// Insert `item` and remember it as recently used
    pub fn accept(&mut self, text: &str, cursor: usize, item: &str, selected: &str) -> Completion {
        if !self.recent.iter().any(|r| r == item) {
            self.recent.insert(0, item.to_string());
            self.recent.truncate(RECENT_LIMIT);
        }
        apply_completion(text, cursor, item, selected)
    }

    pub fn recent(&self) -> &[String] {
        &self.recent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_prefix() {
        assert_eq!(completion_prefix("x = <di", 7), Some(4..7));
        assert_eq!(completion_prefix("font-si", 7), Some(0..7));
        assert_eq!(completion_prefix("12abc", 5), Some(2..5));
        assert_eq!(completion_prefix("a 123", 5), None);
        assert_eq!(completion_prefix("a b", 2), None);
        assert_eq!(completion_prefix("%sn", 3), Some(0..3));
        assert_eq!(completion_prefix("", 0), None);
    }

    #[test]
    fn test_closing_tag() {
        assert_eq!(closing_tag_for("  <div>"), Some("</div>".to_string()));
        assert_eq!(closing_tag_for("<p>x <span>"), Some("</span>".to_string()));
        assert_eq!(closing_tag_for("<br>"), None);
        assert_eq!(closing_tag_for("<img>"), None);
        assert_eq!(closing_tag_for("<custom>"), None);
        assert_eq!(closing_tag_for(r#"<a href="x">"#), Some("</a>".to_string()));
        assert_eq!(closing_tag_for(r#"<video src = "v.mp4">"#), Some("</video>".to_string()));
    }

    #[test]
    fn test_candidates_case_insensitive() {
        let c = Completer::new(&[]);
        let found = c.candidates("<DI");
        assert!(found.contains(&"<div"));
        assert!(found.contains(&"<dialog"));
        assert!(found.iter().all(|f| f.to_lowercase().starts_with("<di")));
    }

    #[test]
    fn test_items_order_and_dedup() {
        let mut c = Completer::new(&[]);
        c.harvest("let color = fooBar; fooBar();");
        c.accept("co", 2, "color", "");
        let items = c.items();
        assert_eq!(items[0], "color");
        assert_eq!(items.iter().filter(|i| **i == "color").count(), 1);
        assert_eq!(items.iter().filter(|i| **i == "fooBar").count(), 1);
        assert_eq!(c.recent(), ["color"]);
    }

    #[test]
    fn test_recent_limit() {
        let mut c = Completer::new(&[]);
        for i in 0..15 {
            c.accept("", 0, &format!("item{}", i), "");
        }
        assert_eq!(c.recent().len(), RECENT_LIMIT);
        assert_eq!(c.recent()[0], "item14");
    }

    #[test]
    fn test_harvest_skips_tag_names() {
        let words = harvest_words("<div class=\"front\"></div> front-side x2");
        assert_eq!(words, vec!["class", "front", "front-side", "x2"]);
    }

    #[test]
    fn test_apply_plain() {
        let done = apply_completion("a <sp", 5, "<span", "");
        assert_eq!(done.text, "a <span");
        assert_eq!(done.selection, Selection::cursor(7));
    }

    #[test]
    fn test_apply_snippet() {
        let c = Completer::new(&["%bold <b>$$</b>%%".to_string()]);
        assert!(c.candidates("%bo").contains(&"%bold <b>$$</b>%%"));

        let done = apply_completion("x %bo", 5, "%bold <b>$$</b>%%", "hi");
        assert_eq!(done.text, "x <b>hi</b>%%");
        assert_eq!(done.selection, Selection::new(11, 13));

        let done = apply_completion("%t", 2, "%t a⇥b", "");
        assert_eq!(done.text, "a\tb");
        assert_eq!(done.selection, Selection::cursor(3));
    }

    #[test]
    fn test_snippet_tabs_shown_as_mark() {
        let c = Completer::new(&["%ind\tx".to_string()]);
        assert!(c.items().contains(&"%ind⇥x"));
    }
}
