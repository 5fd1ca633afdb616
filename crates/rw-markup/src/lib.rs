//! Markup tree model and tree-walking primitives.
//!
//! This crate provides the document side of attribute-driven content conversion:
//!
//! - [`Node`] / [`Element`] / [`Attributes`]: an owned markup tree whose
//!   attribute maps keep declaration order
//! - [`MarkupParser`]: the seam for turning text into content nodes, with
//!   [`HtmlParser`] as an HTML-like implementation built on `quick-xml`
//! - [`to_html`]: serialization back to markup
//! - [`rewrite`]: a single-pass async walker that replaces matched nodes
//!   through a [`NodeTransform`]
//!
//! # Example
//!
//! ```
//! use rw_markup::{HtmlParser, MarkupParser, ParseOptions, to_html};
//!
//! let nodes = HtmlParser.parse(r#"<p class="lead" data-md>Hello</p>"#, &ParseOptions::default())?;
//! assert_eq!(to_html(&nodes), r#"<p class="lead" data-md>Hello</p>"#);
//! # Ok::<(), rw_markup::ParseError>(())
//! ```

mod entities;
mod error;
mod node;
mod parser;
mod rewrite;
mod serializer;

pub use error::ParseError;
pub use node::{Attributes, Element, Location, Node};
pub use parser::{HtmlParser, MarkupParser, ParseOptions};
pub use rewrite::{NodeTransform, rewrite};
pub use serializer::to_html;
