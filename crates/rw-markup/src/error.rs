//! Error types for markup parsing.

use crate::node::Location;

/// Error returned when text cannot be parsed into content nodes.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ParseError {
    /// Malformed markup reported by the XML tokenizer.
    #[error("markup parse error at {location}")]
    Syntax {
        /// Position where the tokenizer stopped.
        location: Location,
        /// Tokenizer error.
        #[source]
        source: quick_xml::Error,
    },

    /// Encoding error while decoding names or text.
    #[error("encoding error")]
    Encoding(#[from] quick_xml::encoding::EncodingError),

    /// Closing tag that does not match the innermost open element.
    #[error("unexpected closing tag </{found}> at {location}{}", expected_suffix(.expected.as_deref()))]
    UnexpectedEnd {
        /// Tag name of the stray closing tag.
        found: String,
        /// Tag name of the innermost open element, if any.
        expected: Option<String>,
        /// Position of the closing tag.
        location: Location,
    },

    /// Element left open at the end of the input.
    #[error("unclosed element <{tag}> opened at {location}")]
    Unclosed {
        /// Tag name of the open element.
        tag: String,
        /// Position of its start tag.
        location: Location,
    },

    /// Error reported by a [`MarkupParser`](crate::MarkupParser) implemented outside this crate.
    #[error("parser error")]
    External(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ParseError {
    /// Wrap an error from another parser implementation.
    #[must_use]
    pub fn external(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::External(source.into())
    }
}

fn expected_suffix(expected: Option<&str>) -> String {
    expected.map_or_else(String::new, |tag| format!(" (expected </{tag}>)"))
}
