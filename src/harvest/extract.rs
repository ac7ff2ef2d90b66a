//! Field extraction from structured and rendered detail documents
//!
//! Extraction is rule-driven: JSON pointer paths for structured sources
//! (with a `*` segment fanning out over arrays, e.g.
//! `/metadata/labels/results/*/name`), CSS selectors for rendered pages.
//! Markup-stripped text keeps block boundaries as newlines: downstream
//! consumers segment on them, so joining blocks with nothing (or collapsing
//! to one line) destroys sentence boundaries.

use ego_tree::NodeRef;
use scraper::node::Node;
use scraper::{Html, Selector};
use serde_json::Value;

/// Resolves a JSON pointer path against a value.
///
/// Supports standard `/a/b/0` navigation plus a `*` segment that maps the
/// rest of the path over every element of an array, yielding an array of
/// matches (empty if the array is empty). Returns `None` when the path does
/// not resolve.
pub fn pointer(value: &Value, path: &str) -> Option<Value> {
    if path.is_empty() {
        return Some(value.clone());
    }
    if !path.starts_with('/') {
        return None;
    }

    let segments: Vec<String> = path.split('/').skip(1).map(unescape).collect();
    resolve(value, &segments)
}

fn resolve(value: &Value, segments: &[String]) -> Option<Value> {
    let Some((head, rest)) = segments.split_first() else {
        return Some(value.clone());
    };

    if head == "*" {
        let array = value.as_array()?;
        let matches: Vec<Value> = array
            .iter()
            .filter_map(|element| resolve(element, rest))
            .collect();
        return Some(Value::Array(matches));
    }

    let child = match value {
        Value::Object(map) => map.get(head.as_str()),
        Value::Array(array) => head.parse::<usize>().ok().and_then(|i| array.get(i)),
        _ => None,
    }?;

    resolve(child, rest)
}

/// JSON pointer token unescaping: `~1` is `/`, `~0` is `~`
fn unescape(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}

/// Renders a scalar JSON value as a string; `None` for null and containers
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Tags that begin/end a line in the extracted text
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "li", "ul", "ol", "h1", "h2", "h3", "h4", "h5", "h6", "table", "thead", "tbody",
    "tr", "blockquote", "pre", "section", "article", "header", "footer", "dt", "dd", "hr",
];

/// Tags whose content never reaches the extracted text
const SKIP_TAGS: &[&str] = &["script", "style", "noscript", "head", "template"];

/// Strips markup from an HTML fragment, preserving block boundaries as
/// newlines.
///
/// Inline elements contribute their text in flow (`a <b>bold</b> word`
/// stays one line); block elements and `<br>` start a new line. Blank
/// lines are dropped.
pub fn html_to_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut raw = String::new();
    collect_text(fragment.tree.root(), &mut raw);

    let lines: Vec<&str> = raw
        .split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    lines.join("\n")
}

fn collect_text(node: NodeRef<'_, Node>, out: &mut String) {
    for child in node.children() {
        match child.value() {
            Node::Text(text) => out.push_str(&text.text),
            Node::Element(element) => {
                let name = element.name();
                if SKIP_TAGS.contains(&name) {
                    continue;
                }
                if name == "br" {
                    out.push('\n');
                    continue;
                }

                let block = BLOCK_TAGS.contains(&name);
                if block && !out.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
                collect_text(child, out);
                if block && !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}

/// Applies a CSS selector to a parsed document and returns the first
/// match's markup-stripped text
pub fn selector_text(document: &Html, css: &str) -> Option<String> {
    let selector = Selector::parse(css).ok()?;
    document
        .select(&selector)
        .next()
        .map(|element| html_to_text(&element.inner_html()))
}
