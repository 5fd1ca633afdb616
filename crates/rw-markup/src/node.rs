//! Owned markup tree.
//!
//! Nodes are plain values: walkers build replacement nodes instead of mutating
//! shared ones, so the tree never needs reference counting.

use std::borrow::Cow;
use std::fmt;

use crate::parser::is_raw_text_element;
use crate::serializer::{escape_source_text, escape_text, write_element};

/// Attribute map that keeps declaration order.
///
/// Keys are unique. Re-inserting an existing key overwrites its value but keeps
/// the original position, so serialization stays stable across edits.
///
/// # Example
///
/// ```
/// use rw_markup::Attributes;
///
/// let mut attrs: Attributes = [("id", "intro"), ("data-md", "")].into_iter().collect();
/// attrs.insert("id", "lead");
/// assert_eq!(attrs.keys().collect::<Vec<_>>(), vec!["id", "data-md"]);
/// assert_eq!(attrs.remove("data-md"), Some(String::new()));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Attributes {
    entries: Vec<(String, String)>,
}

impl Attributes {
    /// Create an empty attribute map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get an attribute value by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Check whether an attribute is declared.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Insert or overwrite an attribute, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let key = key.into();
        let value = value.into();
        if let Some((_, existing)) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            return Some(std::mem::replace(existing, value));
        }
        self.entries.push((key, value));
        None
    }

    /// Remove an attribute, returning its value if it was declared.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    /// Attribute names in declaration order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// `(name, value)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of declared attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no attributes are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut attrs = Self::new();
        for (key, value) in iter {
            attrs.insert(key, value);
        }
        attrs
    }
}

/// Source position of an element's start tag (1-based).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Location {
    /// Line number.
    pub line: usize,
    /// Column number, counted in characters.
    pub column: usize,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A tag with attributes and a content sequence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Element {
    /// Tag name as written in the source.
    pub tag: String,
    /// Attributes in declaration order.
    pub attrs: Attributes,
    /// Child nodes.
    pub content: Vec<Node>,
    /// Position of the start tag, if the element came from a parser.
    pub location: Option<Location>,
}

impl Element {
    /// Create an element without attributes or content.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: Attributes::new(),
            content: Vec::new(),
            location: None,
        }
    }

    /// Add an attribute.
    #[must_use]
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(key, value);
        self
    }

    /// Replace the attribute map.
    #[must_use]
    pub fn with_attrs(mut self, attrs: Attributes) -> Self {
        self.attrs = attrs;
        self
    }

    /// Replace the content sequence.
    #[must_use]
    pub fn with_content(mut self, content: Vec<Node>) -> Self {
        self.content = content;
        self
    }

    /// Replace the content sequence with a single text node.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.content = vec![Node::Text(text.into())];
        self
    }

    /// Set the source location.
    #[must_use]
    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    /// Node identity for diagnostics: `<tag>` or `<tag> at line:column`.
    #[must_use]
    pub fn describe(&self) -> String {
        match self.location {
            Some(location) => format!("<{}> at {location}", self.tag),
            None => format!("<{}>", self.tag),
        }
    }

    /// Check if the body of this element is character data (`script`, `style`).
    #[must_use]
    pub fn is_raw_text(&self) -> bool {
        is_raw_text_element(&self.tag)
    }

    /// Converter input for each child, in content order.
    ///
    /// Children of raw-text elements are passed as written; all other
    /// children are passed as markup source (see [`Node::fragment_text`]).
    #[must_use]
    pub fn fragments(&self) -> Vec<Cow<'_, str>> {
        if self.is_raw_text() {
            self.content
                .iter()
                .map(|child| match child {
                    Node::Text(text) => Cow::Borrowed(text.as_str()),
                    other => other.fragment_text(),
                })
                .collect()
        } else {
            self.content.iter().map(Node::fragment_text).collect()
        }
    }

    /// Serialize this element, including its start and end tags.
    #[must_use]
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        write_element(self, &mut out);
        out
    }
}

/// A node in the markup tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    /// Element with attributes and children.
    Element(Element),
    /// Decoded character data.
    Text(String),
    /// Comment body (without `<!--` and `-->`).
    Comment(String),
}

impl Node {
    /// Create a text node.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Attribute map of the node. Only elements have one.
    #[must_use]
    pub fn attrs(&self) -> Option<&Attributes> {
        match self {
            Self::Element(element) => Some(&element.attrs),
            Self::Text(_) | Self::Comment(_) => None,
        }
    }

    /// Text handed to a content converter for this node, as markup source.
    ///
    /// Text nodes yield their text with `&` and `<` escaped, elements and
    /// comments yield their serialized markup. Parsing the joined fragments
    /// gives back the original content.
    #[must_use]
    pub fn fragment_text(&self) -> Cow<'_, str> {
        match self {
            Self::Text(text) => escape_source_text(text),
            Self::Element(element) => Cow::Owned(element.to_html()),
            Self::Comment(body) => Cow::Owned(format!("<!--{body}-->")),
        }
    }

    /// Node identity for diagnostics.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Element(element) => element.describe(),
            Self::Text(text) => {
                let preview: String = text.chars().take(20).collect();
                format!("text node \"{}\"", escape_text(&preview))
            }
            Self::Comment(_) => "comment node".to_owned(),
        }
    }
}

impl From<Element> for Node {
    fn from(element: Element) -> Self {
        Self::Element(element)
    }
}
