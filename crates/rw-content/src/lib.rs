//! Attribute-driven content conversion for markup trees.
//!
//! Authors mark elements with attributes named after converters
//! (`<article data-md>`, `<style postcss>`); this crate finds those elements,
//! runs the named converters over their content, and splices the converted
//! text back into the tree as freshly parsed markup.
//!
//! # Architecture
//!
//! ```text
//! rewrite(tree) ──► ContentPass::matches ──► intersect_keys(table, attrs)
//!                        │
//!                        └─► ContentPass::transform
//!                                ├─ strip marker attributes
//!                                ├─ convert fragments (concurrently, joined in order)
//!                                └─ reparse joined text with the caller's parser
//! ```
//!
//! - [`ConverterTable`]: marker name to [`Converter`]; sync and async closures
//!   are normalised to one future-returning interface
//! - [`intersect_keys`]: markers present on a node, in attribute declaration order
//! - [`ContentTransformer`]: validated configuration; [`bind`](ContentTransformer::bind)
//!   yields a [`ContentPass`] for [`rw_markup::rewrite`]
//! - [`ContentConfig`]: selection policy and optional fan-out limit
//!
//! The crate never parses on its own: callers pass a
//! [`MarkupParser`](rw_markup::MarkupParser) and its context per invocation,
//! so one transformer serves documents in any grammar.
//!
//! # Example
//!
//! ```
//! use rw_content::{ContentConfig, ContentTransformer, ConverterTable};
//! use rw_markup::{HtmlParser, MarkupParser, ParseOptions, to_html};
//!
//! let converters = ConverterTable::new()
//!     .with("upper", |text: &str| text.to_uppercase())
//!     .with_async("greet", |text: String| async move {
//!         Ok::<_, std::convert::Infallible>(format!("<b>hello</b> {text}"))
//!     });
//! let transformer = ContentTransformer::new(converters, ContentConfig::default())?;
//!
//! let options = ParseOptions::default();
//! let tree = HtmlParser.parse(r#"<p class="x" greet upper>world</p>"#, &options)?;
//! let out = futures::executor::block_on(transformer.process(tree, &HtmlParser, &options))?;
//!
//! assert_eq!(to_html(&out), r#"<p class="x"><B>HELLO</B> WORLD</p>"#);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod config;
mod converter;
mod error;
mod intersect;
mod transformer;

pub use config::{ContentConfig, SelectionPolicy};
pub use converter::{BoxError, ConvertFuture, Converter, ConverterTable};
pub use error::{ConfigError, ContentError};
pub use intersect::{MatchResult, intersect_keys};
pub use transformer::{ContentPass, ContentTransformer};
