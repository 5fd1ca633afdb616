//! Single-pass async tree rewriting.
//!
//! [`rewrite`] walks a content sequence once and hands every node accepted by
//! [`NodeTransform::matches`] to [`NodeTransform::transform`], substituting the
//! returned node in place.
//!
//! # Traversal order
//!
//! ```text
//! rewrite([a, b])
//!   ├─ a: rewrite(a.children) ─► matches(a)? ─► transform(a)
//!   └─ b: rewrite(b.children) ─► matches(b)? ─► transform(b)
//!        (siblings run concurrently, results are collected in input order)
//! ```
//!
//! Children are rewritten before their parent is matched, so a transform sees
//! already-rewritten descendants. Content produced by a transform is not walked
//! again.

use futures::FutureExt;
use futures::future::{BoxFuture, try_join_all};

use crate::node::Node;

/// Match predicate and transform applied by [`rewrite`].
///
/// `matches` returns match data instead of a boolean so the transform does not
/// have to recompute what made the node qualify.
pub trait NodeTransform: Sync {
    /// Data produced by a successful match.
    type Match: Send;
    /// Error produced by a failed transform.
    type Error: Send;

    /// Decide whether `node` should be transformed.
    fn matches(&self, node: &Node) -> Option<Self::Match>;

    /// Produce the replacement for a matched node.
    fn transform(
        &self,
        node: Node,
        matched: Self::Match,
    ) -> BoxFuture<'_, Result<Node, Self::Error>>;
}

/// Rewrite a content sequence, replacing every matched node.
///
/// The whole walk is one future. It resolves once every transform has
/// completed, or with the first error; on error no tree is returned and
/// results of sibling transforms are dropped.
///
/// # Example
///
/// ```
/// use futures::FutureExt;
/// use futures::future::BoxFuture;
/// use rw_markup::{Element, Node, NodeTransform, rewrite};
///
/// struct Upper;
///
/// impl NodeTransform for Upper {
///     type Match = ();
///     type Error = std::convert::Infallible;
///
///     fn matches(&self, node: &Node) -> Option<()> {
///         matches!(node, Node::Text(_)).then_some(())
///     }
///
///     fn transform(&self, node: Node, _: ()) -> BoxFuture<'_, Result<Node, Self::Error>> {
///         let text = node.fragment_text().to_uppercase();
///         async move { Ok(Node::Text(text)) }.boxed()
///     }
/// }
///
/// let tree = vec![Node::from(Element::new("p").with_text("hi"))];
/// let out = futures::executor::block_on(rewrite(tree, &Upper)).unwrap();
/// assert_eq!(out, vec![Node::from(Element::new("p").with_text("HI"))]);
/// ```
pub async fn rewrite<T: NodeTransform>(
    nodes: Vec<Node>,
    transform: &T,
) -> Result<Vec<Node>, T::Error> {
    rewrite_nodes(nodes, transform).await
}

fn rewrite_nodes<T: NodeTransform>(
    nodes: Vec<Node>,
    transform: &T,
) -> BoxFuture<'_, Result<Vec<Node>, T::Error>> {
    try_join_all(nodes.into_iter().map(|node| rewrite_node(node, transform))).boxed()
}

fn rewrite_node<T: NodeTransform>(
    node: Node,
    transform: &T,
) -> BoxFuture<'_, Result<Node, T::Error>> {
    async move {
        let node = match node {
            Node::Element(mut element) if !element.content.is_empty() => {
                let children = std::mem::take(&mut element.content);
                element.content = rewrite_nodes(children, transform).await?;
                Node::Element(element)
            }
            other => other,
        };

        match transform.matches(&node) {
            Some(matched) => transform.transform(node, matched).await,
            None => Ok(node),
        }
    }
    .boxed()
}
