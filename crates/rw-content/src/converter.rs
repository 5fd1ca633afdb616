//! Converter table.
//!
//! A converter maps the text of one content fragment to new markup text. The
//! table accepts converters in three styles and stores all of them behind the
//! single [`Converter`] interface, so the conversion pipeline has one code
//! path whatever the converter's flavour:
//!
//! | Registration                                 | Converter shape                         |
//! |----------------------------------------------|-----------------------------------------|
//! | [`with`](ConverterTable::with)               | `Fn(&str) -> String`                    |
//! | [`with_fallible`](ConverterTable::with_fallible) | `Fn(&str) -> Result<String, E>`     |
//! | [`with_async`](ConverterTable::with_async)   | `Fn(String) -> impl Future<Output = Result<String, E>>` |
//! | [`with_converter`](ConverterTable::with_converter) | any [`Converter`] implementation  |

use std::fmt;
use std::future::Future;
use std::sync::{Arc, LazyLock};

use futures::future::{self, BoxFuture};
use futures::{FutureExt, TryFutureExt};
use regex::Regex;

use crate::error::ConfigError;

/// Error type returned by converters.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Pending result of a single conversion.
pub type ConvertFuture = BoxFuture<'static, Result<String, BoxError>>;

/// Characters HTML forbids in attribute names.
static MARKER_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^[^\s"'<>/=\x00-\x1F\x7F]+$"#).expect("invalid marker name regex")
});

/// Transforms the text of one content fragment.
///
/// Any `Fn(String) -> ConvertFuture` closure is a converter.
pub trait Converter: Send + Sync {
    /// Convert `input`, resolving to the converted text.
    fn convert(&self, input: String) -> ConvertFuture;
}

impl<F> Converter for F
where
    F: Fn(String) -> ConvertFuture + Send + Sync,
{
    fn convert(&self, input: String) -> ConvertFuture {
        self(input)
    }
}

/// Mapping from marker attribute name to [`Converter`].
///
/// Built once and handed to [`ContentTransformer::new`](crate::ContentTransformer::new);
/// converters that wrap heavyweight engines (Markdown renderers, compilers)
/// capture them by value or through an `Arc`.
///
/// # Example
///
/// ```
/// use rw_content::ConverterTable;
///
/// let table = ConverterTable::new()
///     .with("upper", |text: &str| text.to_uppercase())
///     .with_fallible("num", |text: &str| {
///         text.trim().parse::<i64>().map(|n| (n * 2).to_string())
///     });
///
/// assert_eq!(table.keys().collect::<Vec<_>>(), vec!["upper", "num"]);
/// assert!(table.validate().is_ok());
/// ```
#[derive(Clone, Default)]
pub struct ConverterTable {
    entries: Vec<(String, Arc<dyn Converter>)>,
}

impl ConverterTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an infallible synchronous converter.
    #[must_use]
    pub fn with<F>(self, key: impl Into<String>, convert: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.with_converter(key, move |input: String| -> ConvertFuture {
            future::ready(Ok(convert(&input))).boxed()
        })
    }

    /// Register a synchronous converter that can fail.
    #[must_use]
    pub fn with_fallible<F, E>(self, key: impl Into<String>, convert: F) -> Self
    where
        F: Fn(&str) -> Result<String, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        self.with_converter(key, move |input: String| -> ConvertFuture {
            future::ready(convert(&input).map_err(Into::into)).boxed()
        })
    }

    /// Register an asynchronous converter.
    #[must_use]
    pub fn with_async<F, Fut, E>(self, key: impl Into<String>, convert: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, E>> + Send + 'static,
        E: Into<BoxError> + 'static,
    {
        self.with_converter(key, move |input: String| -> ConvertFuture {
            convert(input).map_err(Into::into).boxed()
        })
    }

    /// Register a [`Converter`] implementation.
    #[must_use]
    pub fn with_converter<C: Converter + 'static>(self, key: impl Into<String>, converter: C) -> Self {
        self.with_shared(key, Arc::new(converter))
    }

    /// Register a converter shared with other keys or tables.
    #[must_use]
    pub fn with_shared(mut self, key: impl Into<String>, converter: Arc<dyn Converter>) -> Self {
        self.entries.push((key.into(), converter));
        self
    }

    /// Look up the converter registered for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Arc<dyn Converter>> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, converter)| converter)
    }

    /// Check whether `key` names a converter.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Marker names in registration order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Number of registered converters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no converters are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check that every marker name can appear as an attribute name and is
    /// registered once.
    ///
    /// Marker names are matched case-sensitively against attribute names as
    /// the parser reports them.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidMarker`] for empty names or names with
    /// characters not allowed in attribute names, and
    /// [`ConfigError::DuplicateMarker`] for names registered twice.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (index, (key, _)) in self.entries.iter().enumerate() {
            if key.is_empty() {
                return Err(ConfigError::InvalidMarker {
                    key: key.clone(),
                    reason: "marker name is empty",
                });
            }
            if !MARKER_NAME.is_match(key) {
                return Err(ConfigError::InvalidMarker {
                    key: key.clone(),
                    reason: "marker name contains characters not allowed in attribute names",
                });
            }
            if self.keys().take(index).any(|earlier| earlier == key) {
                return Err(ConfigError::DuplicateMarker(key.clone()));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for ConverterTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterTable")
            .field("keys", &self.keys().collect::<Vec<_>>())
            .finish()
    }
}
