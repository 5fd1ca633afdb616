//! Marker detection.

use rw_markup::Attributes;

use crate::config::SelectionPolicy;
use crate::converter::ConverterTable;

/// Marker names found on one node, in attribute declaration order.
///
/// Never empty: a node without markers yields no `MatchResult` at all.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchResult {
    keys: Vec<String>,
}

impl MatchResult {
    /// All matched marker names.
    #[must_use]
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Marker names applied under `policy`.
    ///
    /// [`SelectionPolicy::First`] keeps only the first declared marker.
    #[must_use]
    pub fn select(&self, policy: SelectionPolicy) -> &[String] {
        match policy {
            SelectionPolicy::First => &self.keys[..1],
            SelectionPolicy::All => &self.keys,
        }
    }
}

/// Find the converter markers declared on a node.
///
/// Keys are returned in the order the attributes appear on the node, not the
/// order the converters were registered, so output does not depend on how the
/// table was built.
///
/// # Example
///
/// ```
/// use rw_content::{ConverterTable, intersect_keys};
/// use rw_markup::Attributes;
///
/// let table = ConverterTable::new()
///     .with("upper", str::to_uppercase)
///     .with("trim", |text: &str| text.trim().to_owned());
/// let attrs: Attributes = [("trim", ""), ("id", "a"), ("upper", "")].into_iter().collect();
///
/// let matched = intersect_keys(&table, &attrs).unwrap();
/// assert_eq!(matched.keys(), ["trim", "upper"]);
///
/// let plain: Attributes = [("id", "a")].into_iter().collect();
/// assert!(intersect_keys(&table, &plain).is_none());
/// ```
#[must_use]
pub fn intersect_keys(table: &ConverterTable, attrs: &Attributes) -> Option<MatchResult> {
    let keys: Vec<String> = attrs
        .keys()
        .filter(|key| table.contains_key(key))
        .map(str::to_owned)
        .collect();

    (!keys.is_empty()).then_some(MatchResult { keys })
}
