//! HTML-like markup parser.
//!
//! [`HtmlParser`] tokenizes with `quick-xml` and builds an owned [`Node`] tree.
//! On top of the XML tokenizer it accepts the HTML conveniences authors rely
//! on when writing content markers:
//!
//! - valueless attributes (`<p data-md>`)
//! - void elements without a closing slash (`<br>`, `<img src="...">`)
//! - raw-text elements (`<script>`, `<style>`) whose bodies may contain `<` and `&`
//! - named character references common in prose (`&nbsp;`, `&mdash;`, ...)
//!
//! Closing tags must balance. A stray or mismatched closing tag, or an element
//! left open at the end of input, is a [`ParseError`].

use std::borrow::Cow;
use std::sync::LazyLock;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use regex::Regex;

use crate::entities::{decode_reference, decode_references};
use crate::error::ParseError;
use crate::node::{Attributes, Element, Location, Node};

/// Elements that never have content or a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Elements whose body is character data, not markup.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// Start of a raw-text element.
static RAW_TEXT_OPEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<(script|style)[\s/>]").expect("invalid raw-text element regex")
});

pub(crate) fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.iter().any(|v| v.eq_ignore_ascii_case(tag))
}

pub(crate) fn is_raw_text_element(tag: &str) -> bool {
    RAW_TEXT_ELEMENTS.iter().any(|v| v.eq_ignore_ascii_case(tag))
}

/// Turns markup text into a content sequence.
///
/// Implementations must be deterministic for identical input and context, and
/// the returned nodes must own their data.
pub trait MarkupParser: Send + Sync {
    /// Options forwarded unchanged by callers on every parse.
    type Context: Send + Sync;

    /// Parse `text` into content nodes.
    fn parse(&self, text: &str, context: &Self::Context) -> Result<Vec<Node>, ParseError>;
}

/// Options for [`HtmlParser`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseOptions {
    /// Drop text nodes that contain only whitespace.
    ///
    /// Default: `false`
    pub trim_text: bool,
    /// Keep comments as [`Node::Comment`].
    ///
    /// Default: `true`
    pub keep_comments: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            trim_text: false,
            keep_comments: true,
        }
    }
}

impl ParseOptions {
    /// Set whether whitespace-only text nodes are dropped.
    #[must_use]
    pub fn with_trim_text(mut self, trim_text: bool) -> Self {
        self.trim_text = trim_text;
        self
    }

    /// Set whether comments are kept.
    #[must_use]
    pub fn with_keep_comments(mut self, keep_comments: bool) -> Self {
        self.keep_comments = keep_comments;
        self
    }
}

/// HTML-like parser built on `quick-xml`.
///
/// # Example
///
/// ```
/// use rw_markup::{HtmlParser, MarkupParser, Node, ParseOptions};
///
/// let nodes = HtmlParser.parse("<p data-md>Hello<br>world</p>", &ParseOptions::default())?;
/// let Node::Element(p) = &nodes[0] else { unreachable!() };
/// assert_eq!(p.attrs.get("data-md"), Some(""));
/// assert_eq!(p.content.len(), 3);
/// # Ok::<(), rw_markup::ParseError>(())
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct HtmlParser;

impl MarkupParser for HtmlParser {
    type Context = ParseOptions;

    fn parse(&self, text: &str, context: &ParseOptions) -> Result<Vec<Node>, ParseError> {
        let source = protect_raw_text(text);
        let mut builder = TreeBuilder::new(&source, context);
        builder.parse_document()
    }
}

/// Recursive-descent tree builder over the `quick-xml` event stream.
struct TreeBuilder<'i, 'o> {
    source: &'i str,
    reader: Reader<&'i [u8]>,
    line_starts: Vec<usize>,
    options: &'o ParseOptions,
}

impl<'i, 'o> TreeBuilder<'i, 'o> {
    fn new(source: &'i str, options: &'o ParseOptions) -> Self {
        let mut reader = Reader::from_str(source);
        reader.config_mut().trim_text(false);
        // Void elements have no end tag; balancing is checked here instead.
        reader.config_mut().check_end_names = false;

        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();

        Self {
            source,
            reader,
            line_starts,
            options,
        }
    }

    fn parse_document(&mut self) -> Result<Vec<Node>, ParseError> {
        let mut content = Vec::new();
        loop {
            let location = self.location_at(self.reader.buffer_position());
            match self.read_event()? {
                Event::Eof => return Ok(self.finish(content)),
                Event::End(e) => {
                    let found = self.decode_name(e.name().as_ref())?;
                    if !is_void_element(&found) {
                        return Err(ParseError::UnexpectedEnd {
                            found,
                            expected: None,
                            location,
                        });
                    }
                }
                event => self.push_event(event, location, &mut content)?,
            }
        }
    }

    fn parse_children(&mut self, tag: &str, opened: Location) -> Result<Vec<Node>, ParseError> {
        let mut content = Vec::new();
        loop {
            let location = self.location_at(self.reader.buffer_position());
            match self.read_event()? {
                Event::Eof => {
                    return Err(ParseError::Unclosed {
                        tag: tag.to_owned(),
                        location: opened,
                    });
                }
                Event::End(e) => {
                    let found = self.decode_name(e.name().as_ref())?;
                    if found.eq_ignore_ascii_case(tag) {
                        return Ok(self.finish(content));
                    }
                    // `<br></br>` style end tags for void elements are tolerated.
                    if !is_void_element(&found) {
                        return Err(ParseError::UnexpectedEnd {
                            found,
                            expected: Some(tag.to_owned()),
                            location,
                        });
                    }
                }
                event => self.push_event(event, location, &mut content)?,
            }
        }
    }

    fn push_event(
        &mut self,
        event: Event<'i>,
        location: Location,
        content: &mut Vec<Node>,
    ) -> Result<(), ParseError> {
        match event {
            Event::Start(e) => {
                let mut element = self.start_element(&e, location)?;
                if !is_void_element(&element.tag) {
                    element.content = self.parse_children(&element.tag, location)?;
                }
                content.push(Node::Element(element));
            }
            Event::Empty(e) => {
                content.push(Node::Element(self.start_element(&e, location)?));
            }
            Event::Text(e) => {
                let text = self.reader.decoder().decode(&e)?;
                append_text(content, &text);
            }
            Event::GeneralRef(e) => {
                let name = self.reader.decoder().decode(&e)?;
                append_text(content, &decode_reference(&name));
            }
            Event::CData(e) => {
                append_text(content, &String::from_utf8_lossy(&e));
            }
            Event::Comment(e) => {
                if self.options.keep_comments {
                    let body = self.reader.decoder().decode(&e)?;
                    content.push(Node::Comment(body.into_owned()));
                }
            }
            Event::End(_) | Event::Eof | Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {}
        }
        Ok(())
    }

    fn start_element(
        &self,
        start: &BytesStart<'_>,
        location: Location,
    ) -> Result<Element, ParseError> {
        let tag = self.decode_name(start.name().as_ref())?;

        let mut attrs = Attributes::new();
        for attr in start.html_attributes() {
            let attr = attr.map_err(|e| ParseError::Syntax {
                location,
                source: e.into(),
            })?;
            let key = self.decode_name(attr.key.as_ref())?;
            let value = self.reader.decoder().decode(&attr.value)?;
            attrs.insert(key, decode_references(&value));
        }

        Ok(Element::new(tag).with_attrs(attrs).with_location(location))
    }

    fn read_event(&mut self) -> Result<Event<'i>, ParseError> {
        match self.reader.read_event() {
            Ok(event) => Ok(event),
            Err(source) => Err(ParseError::Syntax {
                location: self.location_at(self.reader.error_position()),
                source,
            }),
        }
    }

    fn decode_name(&self, name: &[u8]) -> Result<String, ParseError> {
        Ok(self.reader.decoder().decode(name)?.into_owned())
    }

    fn finish(&self, mut content: Vec<Node>) -> Vec<Node> {
        if self.options.trim_text {
            content.retain(|node| !matches!(node, Node::Text(text) if text.trim().is_empty()));
        }
        content
    }

    fn location_at<P: TryInto<usize>>(&self, position: P) -> Location {
        let mut offset = position
            .try_into()
            .unwrap_or(usize::MAX)
            .min(self.source.len());
        // The tokenizer may already have consumed the `<` of the next tag.
        let bytes = self.source.as_bytes();
        if offset > 0 && bytes.get(offset) != Some(&b'<') && bytes.get(offset - 1) == Some(&b'<') {
            offset -= 1;
        }
        let line = self.line_starts.partition_point(|&start| start <= offset);
        let line_start = self
            .line_starts
            .get(line.saturating_sub(1))
            .copied()
            .unwrap_or(0);
        let column = self
            .source
            .get(line_start..offset)
            .map_or(1, |prefix| prefix.chars().count() + 1);
        Location {
            line: line.max(1),
            column,
        }
    }
}

/// Merge adjacent text (text runs are split around character references).
fn append_text(content: &mut Vec<Node>, text: &str) {
    if let Some(Node::Text(last)) = content.last_mut() {
        last.push_str(text);
    } else {
        content.push(Node::Text(text.to_owned()));
    }
}

/// Wrap raw-text element bodies in CDATA so the XML tokenizer keeps them verbatim.
///
/// Bodies without `<` or `&` are left alone, as are bodies that already
/// contain a CDATA terminator.
fn protect_raw_text(input: &str) -> Cow<'_, str> {
    let lower = input.to_ascii_lowercase();
    let mut out: Option<String> = None;
    let mut copied = 0;
    let mut cursor = 0;

    while let Some(caps) = RAW_TEXT_OPEN.captures_at(input, cursor) {
        let (Some(open), Some(name)) = (caps.get(0), caps.get(1)) else {
            break;
        };
        let Some(tag_end) = input[open.start()..].find('>').map(|i| open.start() + i) else {
            break;
        };
        if input[..tag_end].ends_with('/') {
            cursor = tag_end + 1;
            continue;
        }

        let body_start = tag_end + 1;
        let close = format!("</{}", name.as_str().to_ascii_lowercase());
        let Some(body_end) = lower[body_start..].find(&close).map(|i| body_start + i) else {
            break;
        };

        let body = &input[body_start..body_end];
        if body.contains(['<', '&']) && !body.contains("]]>") {
            let buf = out.get_or_insert_with(|| String::with_capacity(input.len() + 32));
            buf.push_str(&input[copied..body_start]);
            buf.push_str("<![CDATA[");
            buf.push_str(body);
            buf.push_str("]]>");
            copied = body_end;
        }
        cursor = body_end + close.len();
    }

    match out {
        Some(mut buf) => {
            buf.push_str(&input[copied..]);
            Cow::Owned(buf)
        }
        None => Cow::Borrowed(input),
    }
}
