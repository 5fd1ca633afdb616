//! Error types for content transformation.

use rw_markup::ParseError;

use crate::converter::BoxError;

/// Error returned when a tree walk fails.
///
/// The walk is all-or-nothing: the first error aborts it and no partially
/// converted tree is returned.
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    /// The rewriter handed over a node that cannot carry markers.
    #[error("{node} cannot carry converter markers")]
    MalformedNode {
        /// Node identity.
        node: String,
    },

    /// A marker matched but no converter is registered for it.
    #[error("no converter registered for marker `{key}` on {node}")]
    UnknownMarker {
        /// Marker name.
        key: String,
        /// Node identity.
        node: String,
    },

    /// A converter failed.
    #[error("converter `{key}` failed on {node}")]
    Converter {
        /// Marker name of the failing converter.
        key: String,
        /// Node identity.
        node: String,
        /// Error returned by the converter.
        #[source]
        source: BoxError,
    },

    /// Converted text could not be parsed back into nodes.
    #[error("cannot parse converted content of {node}")]
    Reparse {
        /// Node identity.
        node: String,
        /// Parser error.
        #[source]
        source: ParseError,
    },
}

/// Error returned when a transformer cannot be configured.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Marker name that cannot appear as an attribute name.
    #[error("invalid marker `{key}`: {reason}")]
    InvalidMarker {
        /// Marker name as registered.
        key: String,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// Marker registered more than once.
    #[error("marker `{0}` is registered more than once")]
    DuplicateMarker(String),

    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
}
