//! Content transformer.
//!
//! A [`ContentTransformer`] is configured once per process and reused across
//! documents. Each matched element goes through four phases:
//!
//! 1. select the markers to apply ([`SelectionPolicy`](crate::SelectionPolicy))
//! 2. strip them from the attribute map
//! 3. convert every content fragment, composing the selected converters left
//!    to right; fragments run concurrently and are joined in original order
//! 4. parse the joined output into the element's new content; the body of a
//!    raw-text element (`script`, `style`) is kept as a single text node

use std::borrow::Cow;

use futures::future::{BoxFuture, try_join_all};
use futures::{FutureExt, StreamExt, TryStreamExt, stream};
use rw_markup::{Element, MarkupParser, Node, NodeTransform, rewrite};

use crate::config::ContentConfig;
use crate::converter::{Converter, ConverterTable};
use crate::error::{ConfigError, ContentError};
use crate::intersect::{MatchResult, intersect_keys};

/// Attribute-driven content transformer.
#[derive(Clone, Debug)]
pub struct ContentTransformer {
    converters: ConverterTable,
    config: ContentConfig,
}

impl ContentTransformer {
    /// Create a transformer from a converter table and configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a marker name is empty, is not a valid
    /// attribute name, or is registered twice.
    pub fn new(converters: ConverterTable, config: ContentConfig) -> Result<Self, ConfigError> {
        converters.validate()?;
        tracing::debug!(
            markers = ?converters.keys().collect::<Vec<_>>(),
            policy = ?config.policy,
            "Content transformer configured"
        );
        Ok(Self { converters, config })
    }

    /// Registered converters.
    #[must_use]
    pub fn converters(&self) -> &ConverterTable {
        &self.converters
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &ContentConfig {
        &self.config
    }

    /// Markers declared on `node`, or `None` if it is not a candidate.
    #[must_use]
    pub fn match_node(&self, node: &Node) -> Option<MatchResult> {
        intersect_keys(&self.converters, node.attrs()?)
    }

    /// Bind this transformer to a parser and parse context for one walk.
    ///
    /// The returned pass plugs into [`rw_markup::rewrite`].
    pub fn bind<'a, P: MarkupParser>(
        &'a self,
        parser: &'a P,
        context: &'a P::Context,
    ) -> ContentPass<'a, P> {
        ContentPass {
            transformer: self,
            parser,
            context,
        }
    }

    /// Transform every marked element of a content sequence.
    ///
    /// # Errors
    ///
    /// Returns the first [`ContentError`] raised anywhere in the tree; no
    /// partially transformed tree is returned.
    pub async fn process<P: MarkupParser>(
        &self,
        nodes: Vec<Node>,
        parser: &P,
        context: &P::Context,
    ) -> Result<Vec<Node>, ContentError> {
        rewrite(nodes, &self.bind(parser, context)).await
    }

    /// Convert the content of one matched element.
    ///
    /// Selected markers are removed before any converter runs; other
    /// attributes keep their values and order. An element without content is
    /// converted as a single empty fragment.
    ///
    /// Converters receive each child as markup source
    /// ([`Element::fragments`]), so an identity converter reproduces the
    /// original content. Output for `script` and `style` elements is
    /// character data and is not parsed.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError::UnknownMarker`] if `matched` names a marker this
    /// transformer has no converter for, [`ContentError::Converter`] if any
    /// conversion fails, and [`ContentError::Reparse`] if the joined output
    /// cannot be parsed.
    pub async fn transform_element<P: MarkupParser>(
        &self,
        mut element: Element,
        matched: MatchResult,
        parser: &P,
        context: &P::Context,
    ) -> Result<Element, ContentError> {
        let node = element.describe();
        let keys = matched.select(self.config.policy);

        let chain = keys
            .iter()
            .map(|key| match self.converters.get(key) {
                Some(converter) => Ok((key.as_str(), &**converter)),
                None => Err(ContentError::UnknownMarker {
                    key: key.clone(),
                    node: node.clone(),
                }),
            })
            .collect::<Result<Vec<_>, _>>()?;

        for key in keys {
            element.attrs.remove(key);
        }

        tracing::debug!(
            node = %node,
            keys = ?keys,
            fragments = element.content.len(),
            "Converting marked content"
        );

        let mut fragments: Vec<String> = element
            .fragments()
            .into_iter()
            .map(Cow::into_owned)
            .collect();
        if fragments.is_empty() {
            fragments.push(String::new());
        }

        let conversions: Vec<_> = fragments
            .into_iter()
            .enumerate()
            .map(|(index, text)| convert_fragment(&chain, index, text, &node))
            .collect();

        let converted: Vec<String> = match self.config.fragment_concurrency {
            None => try_join_all(conversions).await?,
            Some(limit) => {
                stream::iter(conversions)
                    .buffered(limit.get())
                    .try_collect()
                    .await?
            }
        };

        let joined = converted.concat();
        element.content = if element.is_raw_text() {
            if joined.is_empty() {
                Vec::new()
            } else {
                vec![Node::Text(joined)]
            }
        } else {
            parser.parse(&joined, context).map_err(|source| {
                tracing::warn!(node = %node, error = %source, "Failed to parse converted content");
                ContentError::Reparse { node, source }
            })?
        };

        Ok(element)
    }
}

/// Run one fragment through every selected converter in order.
async fn convert_fragment(
    chain: &[(&str, &dyn Converter)],
    index: usize,
    mut text: String,
    node: &str,
) -> Result<String, ContentError> {
    for &(key, converter) in chain {
        tracing::trace!(key, fragment = index, "Converting fragment");
        text = converter.convert(text).await.map_err(|source| {
            tracing::warn!(key, node, error = %source, "Converter failed");
            ContentError::Converter {
                key: key.to_owned(),
                node: node.to_owned(),
                source,
            }
        })?;
    }
    Ok(text)
}

/// A [`ContentTransformer`] bound to a parser and parse context.
///
/// Created by [`ContentTransformer::bind`]; implements [`NodeTransform`] so it
/// can drive [`rw_markup::rewrite`] directly.
pub struct ContentPass<'a, P: MarkupParser> {
    transformer: &'a ContentTransformer,
    parser: &'a P,
    context: &'a P::Context,
}

impl<P: MarkupParser> NodeTransform for ContentPass<'_, P> {
    type Match = MatchResult;
    type Error = ContentError;

    fn matches(&self, node: &Node) -> Option<MatchResult> {
        self.transformer.match_node(node)
    }

    fn transform(
        &self,
        node: Node,
        matched: MatchResult,
    ) -> BoxFuture<'_, Result<Node, ContentError>> {
        async move {
            match node {
                Node::Element(element) => {
                    let element = self
                        .transformer
                        .transform_element(element, matched, self.parser, self.context)
                        .await?;
                    Ok(Node::Element(element))
                }
                other => Err(ContentError::MalformedNode {
                    node: other.describe(),
                }),
            }
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    static_assertions::assert_impl_all!(super::ContentTransformer: Send, Sync);

    use std::convert::Infallible;
    use std::num::NonZeroUsize;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use rw_markup::{HtmlParser, ParseError, ParseOptions, to_html};

    use super::*;
    use crate::config::SelectionPolicy;

    fn parse(html: &str) -> Vec<Node> {
        HtmlParser.parse(html, &ParseOptions::default()).unwrap()
    }

    async fn run(
        converters: ConverterTable,
        config: ContentConfig,
        html: &str,
    ) -> Result<String, ContentError> {
        let transformer = ContentTransformer::new(converters, config).unwrap();
        let out = transformer
            .process(parse(html), &HtmlParser, &ParseOptions::default())
            .await?;
        Ok(to_html(&out))
    }

    fn markdown(text: &str) -> String {
        let mut html = String::new();
        pulldown_cmark::html::push_html(&mut html, pulldown_cmark::Parser::new(text));
        html
    }

    fn wrapping() -> ConverterTable {
        ConverterTable::new()
            .with("a", |text: &str| format!("a({text})"))
            .with("b", |text: &str| format!("b({text})"))
    }

    #[tokio::test]
    async fn test_empty_content_is_one_fragment() {
        let converters = ConverterTable::new().with("data-txt", |_: &str| "Lorem".to_owned());
        let html = run(converters, ContentConfig::default(), "<p data-txt></p>").await;
        assert_eq!(html.unwrap(), "<p>Lorem</p>");
    }

    #[tokio::test]
    async fn test_markdown_converter() {
        let converters = ConverterTable::new().with("data-md", markdown);
        let html = run(
            converters,
            ContentConfig::default(),
            "<article data-md>\n# Title\n\nSome *emphasis*.\n</article>",
        )
        .await;

        assert_eq!(
            html.unwrap(),
            "<article><h1>Title</h1>\n<p>Some <em>emphasis</em>.</p>\n</article>"
        );
    }

    #[tokio::test]
    async fn test_template_converter_with_captured_context() {
        let title = "Handbook".to_owned();
        let converters = ConverterTable::new().with("tpl", move |text: &str| {
            text.replace("{title}", &title)
        });

        let html = run(converters, ContentConfig::default(), "<h1 tpl>{title}</h1>").await;
        assert_eq!(html.unwrap(), "<h1>Handbook</h1>");
    }

    #[tokio::test]
    async fn test_multiple_markers_compose_in_declaration_order() {
        let converters = ConverterTable::new()
            .with("shorten", |text: &str| text.chars().take(3).collect())
            .with("uppercase", str::to_uppercase);

        let html = run(
            converters,
            ContentConfig::default(),
            "<p shorten uppercase>the quick fox</p>",
        )
        .await;
        assert_eq!(html.unwrap(), "<p>THE</p>");
    }

    #[tokio::test]
    async fn test_composition_follows_attributes_not_table() {
        let config = ContentConfig::default();

        let forward = run(wrapping(), config, "<p a b>x</p>").await.unwrap();
        let backward = run(wrapping(), config, "<p b a>x</p>").await.unwrap();

        assert_eq!(forward, "<p>b(a(x))</p>");
        assert_eq!(backward, "<p>a(b(x))</p>");
    }

    #[tokio::test]
    async fn test_first_policy_leaves_other_markers() {
        let config = ContentConfig::default().with_policy(SelectionPolicy::First);
        let html = run(wrapping(), config, "<p b a>x</p>").await;
        assert_eq!(html.unwrap(), "<p a>b(x)</p>");
    }

    #[tokio::test]
    async fn test_policy_from_toml() {
        let config = ContentConfig::from_toml_str(r#"policy = "first""#).unwrap();
        let html = run(wrapping(), config, "<p a b>x</p>").await;
        assert_eq!(html.unwrap(), "<p b>a(x)</p>");
    }

    #[tokio::test]
    async fn test_marker_removal_keeps_other_attributes() {
        let converters = ConverterTable::new().with("md", str::to_owned);
        let html = run(
            converters,
            ContentConfig::default(),
            r#"<p id="a" md class="b" data-x="1">x</p>"#,
        )
        .await;
        assert_eq!(html.unwrap(), r#"<p id="a" class="b" data-x="1">x</p>"#);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fragments_keep_order_when_completion_is_reversed() {
        let completed = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&completed);
        let converters = ConverterTable::new().with_async("slow", move |text: String| {
            let log = Arc::clone(&log);
            async move {
                let delay = if text.starts_with("one") {
                    30
                } else if text.contains("two") {
                    15
                } else {
                    0
                };
                tokio::time::sleep(Duration::from_millis(delay)).await;
                log.lock().unwrap().push(text.clone());
                Ok::<_, Infallible>(format!("[{text}]"))
            }
        });

        let html = run(
            converters,
            ContentConfig::default(),
            "<div slow>one<i>two</i>three</div>",
        )
        .await;

        assert_eq!(html.unwrap(), "<div>[one][<i>two</i>][three]</div>");
        assert_eq!(
            *completed.lock().unwrap(),
            vec!["three", "<i>two</i>", "one"]
        );
    }

    #[tokio::test]
    async fn test_identity_keeps_character_references() {
        let converters = ConverterTable::new().with("raw", str::to_owned);

        let html = run(
            converters.clone(),
            ContentConfig::default(),
            "<p raw>Tom &amp; Jerry</p>",
        )
        .await;
        assert_eq!(html.unwrap(), "<p>Tom &amp; Jerry</p>");

        let transformer = ContentTransformer::new(converters, ContentConfig::default()).unwrap();
        let out = transformer
            .process(
                parse("<p raw>&lt;b&gt;x&lt;/b&gt;</p>"),
                &HtmlParser,
                &ParseOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(
            out,
            vec![Node::from(
                Element::new("p")
                    .with_text("<b>x</b>")
                    .with_location(rw_markup::Location { line: 1, column: 1 })
            )]
        );
    }

    #[tokio::test]
    async fn test_identity_round_trip_of_mixed_document() {
        let source = concat!(
            "<div raw>Tom &amp; Jerry <b>&lt;bold&gt;</b><!-- note --> 1 &lt; 2</div>",
            "<script raw>if (a < b && c) {}</script>",
            "<style raw>a > b { color: red }</style>",
        );
        let converters = ConverterTable::new().with("raw", str::to_owned);

        let html = run(converters, ContentConfig::default(), source).await;

        assert_eq!(html.unwrap(), source);
        assert_eq!(to_html(&parse(source)), source);
    }

    #[tokio::test]
    async fn test_script_converter_output_is_not_parsed() {
        let converters = ConverterTable::new().with_async("babel", |code: String| async move {
            tokio::time::sleep(Duration::from_millis(1)).await;
            Ok::<_, Infallible>(code.replace("const ", "var ").replace(" => ", " && "))
        });
        let transformer = ContentTransformer::new(converters, ContentConfig::default()).unwrap();

        let out = transformer
            .process(
                parse("<script babel>const ok = a < b => c</script>"),
                &HtmlParser,
                &ParseOptions::default(),
            )
            .await
            .unwrap();

        let Node::Element(script) = &out[0] else {
            panic!("expected element, got {:?}", out[0]);
        };
        assert_eq!(script.content, vec![Node::text("var ok = a < b && c")]);
        assert_eq!(to_html(&out), "<script>var ok = a < b && c</script>");
    }

    #[tokio::test]
    async fn test_style_converter_output_is_not_parsed() {
        let converters = ConverterTable::new().with("postcss", |css: &str| {
            format!("{css}\n.tip::after {{ content: \"<&>\" }}")
        });

        let html = run(
            converters,
            ContentConfig::default(),
            "<style postcss>a { color: red }</style>",
        )
        .await;

        assert_eq!(
            html.unwrap(),
            "<style>a { color: red }\n.tip::after { content: \"<&>\" }</style>"
        );
    }

    #[tokio::test]
    async fn test_empty_raw_text_output() {
        let converters = ConverterTable::new().with("strip", |_: &str| String::new());
        let html = run(converters, ContentConfig::default(), "<script strip>x()</script>").await;
        assert_eq!(html.unwrap(), "<script></script>");
    }

    #[tokio::test]
    async fn test_async_converter_matches_sync() {
        let source = "<section data-md>\n- one\n- two\n</section><p>tail</p>";

        let sync = ConverterTable::new().with("data-md", markdown);
        let deferred = ConverterTable::new().with_async("data-md", |text: String| async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok::<_, Infallible>(markdown(&text))
        });

        let sync_html = run(sync, ContentConfig::default(), source).await.unwrap();
        let async_html = run(deferred, ContentConfig::default(), source).await.unwrap();

        assert_eq!(sync_html, async_html);
        assert_eq!(
            sync_html,
            "<section><ul>\n<li>one</li>\n<li>two</li>\n</ul>\n</section><p>tail</p>"
        );
    }

    #[tokio::test]
    async fn test_converter_failure_rejects_whole_tree() {
        let converters = ConverterTable::new()
            .with_async("ok", |text: String| async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok::<_, Infallible>(text.to_uppercase())
            })
            .with_fallible("fail", |_: &str| Err::<String, _>("renderer crashed"));

        let result = run(
            converters,
            ContentConfig::default(),
            "<p ok>1</p><p fail>2</p><p ok>3</p>",
        )
        .await;

        match result {
            Err(ContentError::Converter { key, node, source }) => {
                assert_eq!(key, "fail");
                assert_eq!(node, "<p> at 1:12");
                assert_eq!(source.to_string(), "renderer crashed");
            }
            other => panic!("expected converter error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_failure_in_composed_chain_names_key() {
        let converters = ConverterTable::new()
            .with("a", str::to_owned)
            .with_fallible("b", |_: &str| Err::<String, _>("nope"));

        let result = run(converters, ContentConfig::default(), "<p a b>x</p>").await;
        assert!(matches!(result, Err(ContentError::Converter { key, .. }) if key == "b"));
    }

    #[tokio::test]
    async fn test_unparseable_output_is_reparse_error() {
        let converters = ConverterTable::new().with("broken", |_: &str| "<b>open".to_owned());
        let result = run(converters, ContentConfig::default(), "<div broken>x</div>").await;

        match result {
            Err(ContentError::Reparse { node, source }) => {
                assert_eq!(node, "<div> at 1:1");
                assert!(matches!(source, ParseError::Unclosed { tag, .. } if tag == "b"));
            }
            other => panic!("expected reparse error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unmarked_tree_is_unchanged() {
        let source = r#"<div title="c" id="a" class="b"><p>x</p><!-- note --></div>"#;
        let transformer = ContentTransformer::new(wrapping(), ContentConfig::default()).unwrap();

        let out = transformer
            .process(parse(source), &HtmlParser, &ParseOptions::default())
            .await
            .unwrap();

        assert_eq!(out, parse(source));
        assert_eq!(to_html(&out), source);
    }

    #[tokio::test]
    async fn test_output_is_deterministic() {
        let source = "<div a><p b>1</p>2<i>3</i></div><p b a>4</p>";
        let first = run(wrapping(), ContentConfig::default(), source).await.unwrap();
        let second = run(wrapping(), ContentConfig::default(), source).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_nested_markers_convert_inside_out() {
        let converters = ConverterTable::new()
            .with("outer", |text: &str| format!("[{text}]"))
            .with("inner", str::to_uppercase);

        let html = run(
            converters,
            ContentConfig::default(),
            "<div outer><p inner>x</p></div>",
        )
        .await;
        assert_eq!(html.unwrap(), "<div>[<p>X</p>]</div>");
    }

    #[tokio::test]
    async fn test_markup_fragments_are_passed_as_source() {
        let converters = ConverterTable::new().with("raw", str::to_owned);
        let html = run(
            converters,
            ContentConfig::default(),
            "<div raw>a<!-- c --><b>x</b></div>",
        )
        .await;
        assert_eq!(html.unwrap(), "<div>a<!-- c --><b>x</b></div>");
    }

    async fn max_in_flight(config: ContentConfig) -> usize {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let counters = (Arc::clone(&in_flight), Arc::clone(&peak));

        let converters = ConverterTable::new().with_async("c", move |text: String| {
            let (in_flight, peak) = (Arc::clone(&counters.0), Arc::clone(&counters.1));
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, Infallible>(text)
            }
        });

        let html = run(converters, config, "<div c>a<i>b</i>c<i>d</i></div>").await;
        assert_eq!(html.unwrap(), "<div>a<i>b</i>c<i>d</i></div>");
        peak.load(Ordering::SeqCst)
    }

    #[tokio::test]
    async fn test_fragments_fan_out_without_limit() {
        assert_eq!(max_in_flight(ContentConfig::default()).await, 4);
    }

    #[tokio::test]
    async fn test_fragment_concurrency_limit() {
        let limit = NonZeroUsize::new(1).unwrap();
        let config = ContentConfig::default().with_fragment_concurrency(limit);
        assert_eq!(max_in_flight(config).await, 1);
    }

    #[tokio::test]
    async fn test_non_element_is_malformed() {
        let transformer = ContentTransformer::new(wrapping(), ContentConfig::default()).unwrap();
        let marked = Node::from(Element::new("p").with_attr("a", ""));
        let matched = transformer.match_node(&marked).unwrap();

        let options = ParseOptions::default();
        let pass = transformer.bind(&HtmlParser, &options);
        let result = pass.transform(Node::text("x"), matched).await;

        assert!(
            matches!(result, Err(ContentError::MalformedNode { ref node }) if node == "text node \"x\"")
        );
    }

    #[tokio::test]
    async fn test_match_from_other_table_is_unknown_marker() {
        let other = ContentTransformer::new(
            ConverterTable::new().with("md", str::to_owned),
            ContentConfig::default(),
        )
        .unwrap();
        let transformer = ContentTransformer::new(wrapping(), ContentConfig::default()).unwrap();

        let element = Element::new("p").with_attr("md", "");
        let matched = other.match_node(&Node::from(element.clone())).unwrap();
        let result = transformer
            .transform_element(element, matched, &HtmlParser, &ParseOptions::default())
            .await;

        assert!(matches!(result, Err(ContentError::UnknownMarker { key, .. }) if key == "md"));
    }

    #[test]
    fn test_match_node() {
        let transformer = ContentTransformer::new(wrapping(), ContentConfig::default()).unwrap();

        let marked = Node::from(Element::new("p").with_attr("b", "").with_attr("a", ""));
        let matched = transformer.match_node(&marked).unwrap();
        assert_eq!(matched.keys(), ["b", "a"]);

        assert!(transformer.match_node(&Node::from(Element::new("p"))).is_none());
        assert!(transformer.match_node(&Node::text("a")).is_none());
    }

    #[test]
    fn test_invalid_table_rejected_at_configuration() {
        let converters = ConverterTable::new().with("has space", str::to_owned);
        let result = ContentTransformer::new(converters, ContentConfig::default());
        assert!(matches!(result, Err(ConfigError::InvalidMarker { .. })));
    }
}
