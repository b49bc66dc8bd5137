//! HTML/CSS/JavaScript card template rules

use crate::syntax::rules::{RuleTable, StyleRule};
use crate::syntax::tokens::TokenType;

/// JavaScript keywords (block and attention words have their own rules)
const KEYWORDS: &str = r"\b(abstract|await|boolean|byte|case|char|class|const|debugger|default|delete|double|else|enum|export|extends|false|final|float|function|if|implements|import|in|instanceof|int|interface|let|long|native|new|null|package|private|protected|public|short|static|super|switch|synchronized|this|transient|true|typeof|var|void|volatile|with|yield)\b";

/// Build the rule table for card templates
///
/// Order matters: later rules paint over earlier ones, so generic
/// identifiers come first and brackets, quotes, keywords and fields last.
pub fn template_rules() -> RuleTable {
    let mut table = RuleTable::new();

    // Operators that are easy to mistype
    table.push(
        StyleRule::new("attention_op", r"([\^&|~!])", TokenType::KeywordAttention)
            .and_then(|r| r.not_followed_by("=")),
    );
    table.push(StyleRule::new("logic_op", r"(?:&&)|(?:\|\|)", TokenType::Text));

    // Assignment inside an if/while condition or a for test
    table.push(StyleRule::new(
        "assign_in_condition",
        r"\b(?:(if)|(while))\b\s*\([^)]*[^=<>!](=)[^=][^)]*\)",
        TokenType::KeywordAttention,
    ));
    table.push(StyleRule::new(
        "assign_in_for",
        r"\bfor\b[^;)]*;[^;)=<>!]*(=)[^;)=<>!]*;[^)]*\)",
        TokenType::KeywordAttention,
    ));
    // Assignment to a call result or a number
    table.push(
        StyleRule::new(
            "assign_to_value",
            r"(?:(\))|(\b\d+))\s*(=)",
            TokenType::KeywordAttention,
        )
        .and_then(|r| r.not_followed_by("[=>]")),
    );

    table.push(StyleRule::new(
        "name",
        r"\b[a-zA-Z$\-_][a-zA-Z0-9$\-_]*\b",
        TokenType::Name,
    ));

    // Markup
    table.push(
        StyleRule::new(
            "entity",
            r"&(?:[A-Za-z0-9]+|#[0-9]+|#x[0-9A-Fa-f]+)",
            TokenType::HtmlTag,
        )
        .and_then(|r| r.followed_by(";")),
    );
    table.push(
        StyleRule::new("tag", r"<(/?[^> ]+)(?:[^>]*)", TokenType::HtmlTag)
            .and_then(|r| r.followed_by(">")),
    );
    table.push(
        StyleRule::new(
            "attribute",
            r"\b([a-zA-Z_]+[a-zA-Z0-9_:\-]*)\s*=",
            TokenType::HtmlTagAttr,
        )
        .and_then(|r| r.followed_by("[^>]*>")),
    );

    // Stylesheets
    table.push(StyleRule::new(
        "css_class",
        r"\.[a-zA-Z$_][a-zA-Z0-9$\-_]*\b",
        TokenType::CssClass,
    ));
    table.push(StyleRule::new(
        "css_id",
        r"#\b[a-zA-Z$_][a-zA-Z0-9$\-_]*\b",
        TokenType::CssId,
    ));
    table.push(StyleRule::new(
        "css_property",
        r"^\s*\b([a-zA-Z$\-_][a-zA-Z0-9$\-_]*\b):",
        TokenType::CssProperty,
    ));
    table.push(StyleRule::new(
        "css_value",
        r"^\s*\b[a-zA-Z$\-_][a-zA-Z0-9$\-_]*\b:\s+([^;>]*)[;>]",
        TokenType::String,
    ));

    table.push(StyleRule::new(
        "function",
        r"(\b[a-zA-Z$\-_][a-zA-Z0-9$\-_]*\b\s*)\(",
        TokenType::NameFunction,
    ));
    table.push(StyleRule::new(
        "number",
        r"(\b.?\b\d+\w*(%?|\b))",
        TokenType::Number,
    ));
    table.push(StyleRule::new("hex_color", r"#[0-9A-Fa-f]{3,8}\b", TokenType::Number));

    table.push(StyleRule::new("curly", r"[{}]", TokenType::BracketsCurly));
    table.push(StyleRule::new("round", r"[()]", TokenType::BracketsRound));
    table.push(StyleRule::new("square", r"[\[\]]", TokenType::BracketsSquare));

    // Quote characters; whole literals are painted by the string pass
    table.push(StyleRule::new("quote", r#"["'`]"#, TokenType::String));

    table.push(StyleRule::new(
        "id_value",
        r#"\bid\s*=\s*["']([a-zA-Z$_][a-zA-Z0-9$\-_]*\b)["']"#,
        TokenType::CssId,
    ));
    table.push(StyleRule::new(
        "class_value",
        r#"\bclass\s*=\s*["']([a-zA-Z$_][a-zA-Z0-9$\-_]*\b)["']"#,
        TokenType::CssClass,
    ));
    table.push(StyleRule::new(
        "style_attr",
        r"\b(style)\s*=\s*",
        TokenType::KeywordAttention,
    ));

    table.push(
        StyleRule::new("keyword", KEYWORDS, TokenType::Keyword)
            .and_then(|r| r.not_followed_by(r"\s*=")),
    );
    table.push(
        StyleRule::new(
            "keyword_block",
            r"\b(do|for|while|try|catch|finally)\b",
            TokenType::KeywordBlock,
        )
        .and_then(|r| r.not_followed_by(r"\s*=")),
    );
    table.push(
        StyleRule::new(
            "keyword_exit",
            r"\b(return|break|continue|goto|throw|close|exit)\b",
            TokenType::KeywordAttention,
        )
        .and_then(|r| r.not_followed_by(r"\s*=")),
    );
    table.push(StyleRule::new("nbsp", "\u{00A0}", TokenType::KeywordAttention));

    // Template fields
    table.push(
        StyleRule::new("field", r"\{\{[^{}]+\}\}", TokenType::AnkiField).map(StyleRule::in_comments),
    );
    table.push(StyleRule::new("cloze_marker", r"%%", TokenType::AnkiField));

    table
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule<'a>(table: &'a RuleTable, name: &str) -> &'a StyleRule {
        table.rules().iter().find(|r| r.name == name).unwrap()
    }

    #[test]
    fn test_all_rules_compile() {
        let table = template_rules();
        assert_eq!(table.len(), 29);
        assert_eq!(table.comment_rules().count(), 1);
    }

    #[test]
    fn test_tag_name_only() {
        let table = template_rules();
        let tag = rule(&table, "tag");
        assert_eq!(tag.paint_ranges(r#"<div class="a">"#), vec![1..4]);
        assert_eq!(tag.paint_ranges("</span>"), vec![1..6]);
        assert!(tag.paint_ranges("a < b").is_empty());
    }

    #[test]
    fn test_attribute_needs_closing_bracket() {
        let table = template_rules();
        let attr = rule(&table, "attribute");
        assert_eq!(attr.paint_ranges(r#"<a href="x">"#), vec![3..7]);
        assert!(attr.paint_ranges("x = 1;").is_empty());
    }

    #[test]
    fn test_keyword_not_assigned() {
        let table = template_rules();
        let kw = rule(&table, "keyword");
        assert_eq!(kw.paint_ranges("if (x) return"), vec![0..2]);
        assert!(kw.paint_ranges("in = 3").is_empty());
    }

    #[test]
    fn test_assignment_in_condition() {
        let table = template_rules();
        let r = rule(&table, "assign_in_condition");
        assert_eq!(r.paint_ranges("if (a = b)"), vec![0..2, 6..7]);
        assert!(r.paint_ranges("if (a == b)").is_empty());
    }

    #[test]
    fn test_css_property_at_line_start() {
        let table = template_rules();
        let r = rule(&table, "css_property");
        assert_eq!(r.paint_ranges("  color: red;"), vec![2..7]);
        let v = rule(&table, "css_value");
        assert_eq!(v.paint_ranges("  color: red;"), vec![9..12]);
    }

    #[test]
    fn test_field_rule() {
        let table = template_rules();
        let r = rule(&table, "field");
        assert_eq!(r.paint_ranges("<b>{{Front}}</b>"), vec![3..12]);
    }
}
