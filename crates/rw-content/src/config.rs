//! Transformer configuration.
//!
//! Parsed from TOML with serde. Every field is optional:
//!
//! ```toml
//! policy = "first"          # or "all" (default)
//! fragment_concurrency = 4  # omit for unbounded fan-out
//! ```

use std::num::NonZeroUsize;

use serde::Deserialize;

use crate::error::ConfigError;

/// Which markers of a multi-marker node are applied.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionPolicy {
    /// Apply only the first declared marker; other markers stay on the node.
    First,
    /// Apply every declared marker, composed left to right.
    #[default]
    All,
}

/// Raw configuration as parsed from TOML.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ContentConfigRaw {
    policy: SelectionPolicy,
    fragment_concurrency: Option<usize>,
}

/// Content transformer configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ContentConfig {
    /// Marker selection policy.
    pub policy: SelectionPolicy,
    /// Maximum in-flight conversions per node. `None` converts all fragments
    /// of a node at once.
    pub fragment_concurrency: Option<NonZeroUsize>,
}

impl ContentConfig {
    /// Parse configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` for malformed TOML or unknown fields, and
    /// `ConfigError::Validation` if `fragment_concurrency` is zero.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let raw: ContentConfigRaw = toml::from_str(text)?;

        let fragment_concurrency = match raw.fragment_concurrency {
            None => None,
            Some(limit) => Some(NonZeroUsize::new(limit).ok_or_else(|| {
                ConfigError::Validation("fragment_concurrency must be at least 1".to_owned())
            })?),
        };

        Ok(Self {
            policy: raw.policy,
            fragment_concurrency,
        })
    }

    /// Set the selection policy.
    #[must_use]
    pub fn with_policy(mut self, policy: SelectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Bound the number of in-flight conversions per node.
    #[must_use]
    pub fn with_fragment_concurrency(mut self, limit: NonZeroUsize) -> Self {
        self.fragment_concurrency = Some(limit);
        self
    }
}
