//! Rich clipboard HTML reduced to simple markup
//!
//! Word processors and browsers put heavily styled HTML on the clipboard.
//! [`simplify_html`] keeps a short list of formatting tags with no
//! attributes and unwraps everything else, keeping its text.

use std::sync::OnceLock;

use regex::{Regex, RegexBuilder};
use tracing::{debug, error};

/// Tags kept, with the name they are written as
const ALLOWED_TAGS: [(&str, &str); 23] = [
    ("b", "b"),
    ("strong", "b"),
    ("i", "i"),
    ("em", "i"),
    ("u", "u"),
    ("span", "span"),
    ("div", "div"),
    ("p", "p"),
    ("mark", "mark"),
    ("sub", "sub"),
    ("sup", "sup"),
    ("blockquote", "blockquote"),
    ("br", "br"),
    ("h1", "h1"),
    ("h2", "h2"),
    ("h3", "h3"),
    ("h4", "h4"),
    ("h5", "h5"),
    ("h6", "h6"),
    ("pre", "pre"),
    ("code", "code"),
    ("samp", "samp"),
    ("kbd", "kbd"),
];

/// Elements dropped together with their content
const DROPPED_ELEMENTS: [&str; 3] = ["style", "script", "title"];

/// Style properties a kept `span` may carry
const COLOR_PROPERTIES: [&str; 3] = ["color:", "background-color:", "background:"];

/// Adjacent formatting runs merged after cleanup
const MERGED_RUNS: [&str; 3] = ["</b><b>", "</i><i>", "</u><u>"];

struct Patterns {
    comment: Regex,
    dropped: Vec<Regex>,
    declaration: Regex,
    tag: Regex,
    style: Regex,
    paragraph: Regex,
    paragraph_end: Regex,
}

fn patterns() -> Option<&'static Patterns> {
    static PATTERNS: OnceLock<Option<Patterns>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            let compiled = (|| -> Result<Patterns, regex::Error> {
                let ci = |p: &str| RegexBuilder::new(p).case_insensitive(true).dot_matches_new_line(true).build();
                Ok(Patterns {
                    comment: ci(r"<!--.*?-->")?,
                    dropped: DROPPED_ELEMENTS
                        .iter()
                        .map(|name| ci(&format!(r"<{0}\b.*?</{0}\s*>", name)))
                        .collect::<Result<_, _>>()?,
                    declaration: Regex::new(r"<[!?][^>]*>")?,
                    tag: Regex::new(r#"<(/?)([A-Za-z][\w:.-]*)((?:[^>"']|"[^"]*"|'[^']*')*)>"#)?,
                    style: ci(r#"\bstyle\s*=\s*(?:"([^"]*)"|'([^']*)')"#)?,
                    paragraph: Regex::new(r"([^\n])<p\b")?,
                    paragraph_end: Regex::new(r"</p>\n?")?,
                })
            })();
            compiled
                .map_err(|e| error!(error = %e, "clipboard patterns unavailable"))
                .ok()
        })
        .as_ref()
}

fn allowed(name: &str) -> Option<&'static str> {
    ALLOWED_TAGS
        .iter()
        .find(|(from, _)| from.eq_ignore_ascii_case(name))
        .map(|&(_, to)| to)
}

/// Color declarations of a `style` attribute, joined with `; `
fn color_style(attributes: &str, style_re: &Regex) -> Option<String> {
    let caps = style_re.captures(attributes)?;
    let value = caps.get(1).or_else(|| caps.get(2))?.as_str();
    let kept: Vec<&str> = value
        .split(';')
        .map(str::trim)
        .filter(|part| COLOR_PROPERTIES.iter().any(|p| part.starts_with(p)))
        .collect();
    (!kept.is_empty()).then(|| kept.join("; ").replace('"', "'"))
}

/// Reduce clipboard HTML to simple markup
///
/// With `keep_colors`, a `span` keeps the color and background parts of
/// its `style` attribute. Paragraphs are put on lines of their own.
pub fn simplify_html(html: &str, keep_colors: bool) -> String {
    let Some(pt) = patterns() else {
        return html.to_string();
    };

    let mut out = html
        .replace('\n', " ")
        .replace("&lt;!--", "<!--")
        .replace("--&gt;", "-->");
    out = pt.comment.replace_all(&out, "").into_owned();
    for dropped in &pt.dropped {
        out = dropped.replace_all(&out, "").into_owned();
    }
    out = pt.declaration.replace_all(&out, "").into_owned();

    out = pt
        .tag
        .replace_all(&out, |caps: &regex::Captures| {
            let closing = &caps[1];
            let Some(name) = allowed(&caps[2]) else {
                return String::new();
            };
            if name == "span" && keep_colors && closing.is_empty() {
                if let Some(style) = color_style(&caps[3], &pt.style) {
                    return format!("<span style=\"{}\">", style);
                }
            }
            format!("<{}{}>", closing, name)
        })
        .into_owned();

    out = out.replace('\u{00A0}', "&nbsp;");
    out = pt.paragraph.replace_all(&out, "$1\n<p").into_owned();
    out = pt.paragraph_end.replace_all(&out, "</p>\n").into_owned();
    for run in MERGED_RUNS {
        out = out.replace(run, "");
    }

    let simplified = out.trim().to_string();
    debug!(from = html.len(), to = simplified.len(), "clipboard html simplified");
    simplified
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attributes_dropped_and_tags_renamed() {
        let html = r#"<p class="MsoNormal" style="margin:0"><strong>Bold</strong> and <em>it</em></p>"#;
        assert_eq!(simplify_html(html, false), "<p><b>Bold</b> and <i>it</i></p>");
    }

    #[test]
    fn test_unknown_tags_unwrapped() {
        let html = r#"<html><body><a href="x">link</a><o:p></o:p> <font face="Arial">text</font></body></html>"#;
        assert_eq!(simplify_html(html, false), "link text");
    }

    #[test]
    fn test_comments_and_styles_removed() {
        let html = "<!DOCTYPE html><head><style>p { color: red }</style></head>\
                    <!--StartFragment-->a&lt;!-- x --&gt;b<!--EndFragment-->";
        assert_eq!(simplify_html(html, false), "ab");
    }

    #[test]
    fn test_span_colors_kept_on_request() {
        let html = r#"<span style="font-size:11pt; color:#ff0000; background-color:yellow">x</span>"#;
        assert_eq!(
            simplify_html(html, true),
            r#"<span style="color:#ff0000; background-color:yellow">x</span>"#
        );
        assert_eq!(simplify_html(html, false), "<span>x</span>");
    }

    #[test]
    fn test_paragraphs_on_own_lines() {
        let html = "<div>a<p>b</p>c</div>";
        assert_eq!(simplify_html(html, false), "<div>a\n<p>b</p>\nc</div>");
    }

    #[test]
    fn test_runs_merged_and_nbsp_kept() {
        let html = "<b>a</b><b>b</b>\u{00A0}<u>c</u><u>d</u>";
        assert_eq!(simplify_html(html, false), "<b>ab</b>&nbsp;<u>cd</u>");

        // runs merge from the inside out
        let html = "<b><i>c</i></b><b><i>d</i></b>";
        assert_eq!(simplify_html(html, false), "<b><i>cd</i></b>");
    }

    #[test]
    fn test_newlines_become_spaces() {
        assert_eq!(simplify_html("<br>one\ntwo", false), "<br>one two");
    }
}
