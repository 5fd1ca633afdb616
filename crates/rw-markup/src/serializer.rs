//! Markup serializer.

use std::borrow::Cow;

use crate::node::{Element, Node};
use crate::parser::{is_raw_text_element, is_void_element};

/// Serialize a content sequence back to markup.
///
/// Attributes with empty values are written as bare names (`<p data-md>`),
/// void elements get no end tag, and bodies of raw-text elements (`script`,
/// `style`) are written verbatim.
///
/// # Example
///
/// ```
/// use rw_markup::{Element, Node, to_html};
///
/// let p = Element::new("p").with_attr("hidden", "").with_text("a & b");
/// assert_eq!(to_html(&[Node::from(p)]), "<p hidden>a &amp; b</p>");
/// ```
pub fn to_html(nodes: &[Node]) -> String {
    let mut out = String::new();
    for node in nodes {
        write_node(node, &mut out);
    }
    out
}

fn write_node(node: &Node, out: &mut String) {
    match node {
        Node::Element(element) => write_element(element, out),
        Node::Text(text) => out.push_str(&escape_text(text)),
        Node::Comment(body) => {
            out.push_str("<!--");
            out.push_str(body);
            out.push_str("-->");
        }
    }
}

pub(crate) fn write_element(element: &Element, out: &mut String) {
    out.push('<');
    out.push_str(&element.tag);

    for (key, value) in element.attrs.iter() {
        out.push(' ');
        out.push_str(key);
        if !value.is_empty() {
            out.push_str("=\"");
            out.push_str(&escape_attr(value));
            out.push('"');
        }
    }
    out.push('>');

    if is_void_element(&element.tag) {
        return;
    }

    if is_raw_text_element(&element.tag) {
        for child in &element.content {
            match child {
                Node::Text(text) => out.push_str(text),
                Node::Element(_) | Node::Comment(_) => write_node(child, out),
            }
        }
    } else {
        for child in &element.content {
            write_node(child, out);
        }
    }

    out.push_str("</");
    out.push_str(&element.tag);
    out.push('>');
}

/// Escape text for element content.
pub(crate) fn escape_text(text: &str) -> String {
    escape_markup(text, false)
}

/// Escape text so it reads back as the same text when parsed as markup.
///
/// Only `&` and `<` are escaped; `>` is legal in text and kept as written.
pub(crate) fn escape_source_text(text: &str) -> Cow<'_, str> {
    if text.contains(['&', '<']) {
        Cow::Owned(text.replace('&', "&amp;").replace('<', "&lt;"))
    } else {
        Cow::Borrowed(text)
    }
}

/// Escape text for attribute values.
fn escape_attr(text: &str) -> String {
    escape_markup(text, true)
}

fn escape_markup(text: &str, escape_quotes: bool) -> String {
    let mut result = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' if escape_quotes => result.push_str("&quot;"),
            _ => result.push(ch),
        }
    }
    result
}
