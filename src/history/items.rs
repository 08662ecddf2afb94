//! Entries stored in a [`QueryHistory`](super::QueryHistory).

use std::fmt::Debug;

use mongodb::bson::Document;

use crate::codec::DocumentCodec;
use crate::query::QuerySpec;

/// Longest summary shown for one history field, in characters.
pub const SUMMARY_MAX_CHARS: usize = 100;

/// Something that can be kept in a query history.
///
/// Equality must compare every significant field: it is what decides
/// whether an added item is a duplicate.
pub trait HistoryItem: Clone + PartialEq + Debug + Send + Sync + 'static {
    /// One-line description for selection lists.
    fn label(&self) -> String;
}

/// A map/reduce function pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MapReduceHistoryItem {
    pub map_function: String,
    pub reduce_function: String,
}

impl MapReduceHistoryItem {
    pub fn new(map_function: impl Into<String>, reduce_function: impl Into<String>) -> Self {
        Self {
            map_function: map_function.into(),
            reduce_function: reduce_function.into(),
        }
    }

    pub fn map_summary(&self) -> String {
        summarize(&self.map_function)
    }

    pub fn reduce_summary(&self) -> String {
        summarize(&self.reduce_function)
    }
}

impl HistoryItem for MapReduceHistoryItem {
    fn label(&self) -> String {
        format!("map: {} | reduce: {}", self.map_summary(), self.reduce_summary())
    }
}

/// The criteria, projection and sort of an ad-hoc query.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryHistoryItem {
    pub criteria: Option<Document>,
    pub projection: Option<Document>,
    pub sort: Option<Document>,
}

impl QueryHistoryItem {
    /// Empty documents are stored as unset, so `{}` and `None` are one entry.
    pub fn new(
        criteria: Option<Document>,
        projection: Option<Document>,
        sort: Option<Document>,
    ) -> Self {
        let set = |doc: Option<Document>| doc.filter(|d| !d.is_empty());
        Self {
            criteria: set(criteria),
            projection: set(projection),
            sort: set(sort),
        }
    }

    /// Apply this entry's documents to `spec`, keeping its page size.
    pub fn apply_to(&self, spec: QuerySpec) -> QuerySpec {
        spec.with_criteria(self.criteria.clone())
            .with_projection(self.projection.clone())
            .with_sort(self.sort.clone())
    }
}

impl From<&QuerySpec> for QueryHistoryItem {
    fn from(spec: &QuerySpec) -> Self {
        Self::new(
            spec.criteria().cloned(),
            spec.projection().cloned(),
            spec.sort().cloned(),
        )
    }
}

impl HistoryItem for QueryHistoryItem {
    fn label(&self) -> String {
        let codec = DocumentCodec::default();
        let render = |doc: &Option<Document>| match doc {
            Some(d) => codec.to_compact(d).unwrap_or_else(|_| "?".to_string()),
            None => "{}".to_string(),
        };
        summarize(&format!(
            "{} {} {}",
            render(&self.criteria),
            render(&self.projection),
            render(&self.sort)
        ))
    }
}

/// Collapse runs of whitespace and cut to [`SUMMARY_MAX_CHARS`], marking
/// the cut with `…`.
pub fn summarize(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= SUMMARY_MAX_CHARS {
        return collapsed;
    }
    let mut cut: String = collapsed.chars().take(SUMMARY_MAX_CHARS).collect();
    cut.push('…');
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;

    #[test]
    fn test_summarize_collapses_and_truncates() {
        assert_eq!(summarize("function() {\n    emit(this.a, 1);\n}"), "function() { emit(this.a, 1); }");
        let long = "x".repeat(150);
        let summary = summarize(&long);
        assert_eq!(summary.chars().count(), SUMMARY_MAX_CHARS + 1);
        assert!(summary.ends_with('…'));
    }

    #[test]
    fn test_structural_equality() {
        let a = MapReduceHistoryItem::new("function() { emit(1, 1); }", "function(k, v) { return 1; }");
        let b = MapReduceHistoryItem::new(String::from("function() { emit(1, 1); }"), "function(k, v) { return 1; }");
        assert_eq!(a, b);
        assert_ne!(a, MapReduceHistoryItem::new("x", "y"));

        let q1 = QueryHistoryItem::new(Some(doc! { "a": 1 }), None, None);
        let q2 = QueryHistoryItem::new(Some(doc! { "a": 1 }), None, None);
        assert_eq!(q1, q2);
        assert_ne!(q1, QueryHistoryItem::new(Some(doc! { "a": 1 }), None, Some(doc! { "a": 1 })));
    }

    #[test]
    fn test_empty_documents_equal_unset() {
        let empty = QueryHistoryItem::new(Some(doc! {}), Some(doc! {}), Some(doc! {}));
        assert_eq!(empty, QueryHistoryItem::new(None, None, None));
        assert!(empty.criteria.is_none());

        let partial = QueryHistoryItem::new(Some(doc! { "a": 1 }), Some(doc! {}), None);
        assert_eq!(partial, QueryHistoryItem::new(Some(doc! { "a": 1 }), None, None));
    }

    #[test]
    fn test_query_item_round_trips_through_spec() {
        let spec = QuerySpec::new(50)
            .unwrap()
            .with_criteria(Some(doc! { "x": { "$gt": 1 } }))
            .with_sort(Some(doc! { "x": 1 }));
        let item = QueryHistoryItem::from(&spec);
        assert_eq!(item.label(), r#"{"x":{"$gt":1}} {} {"x":1}"#);

        let restored = item.apply_to(QuerySpec::new(10).unwrap());
        assert_eq!(restored.criteria(), spec.criteria());
        assert_eq!(restored.items_per_page(), 10);
    }
}
