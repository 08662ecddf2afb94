//! In-process collection with a subset of MongoDB query semantics.
//!
//! Supported criteria: field equality (with array membership), dotted
//! paths, `$eq`, `$ne`, `$gt`, `$gte`, `$lt`, `$lte`, `$in`, `$nin`,
//! `$exists`, and top-level `$and` / `$or`. Projections are top-level
//! inclusion or exclusion with the usual `_id` rule. Sorting follows the
//! server's cross-type ordering for the types handled here.
//!
//! Indexes are bookkept (names, key patterns, options) but never used to
//! answer queries, and `unique` is not enforced on insert.

use std::cmp::Ordering;
use std::sync::RwLock;

use async_trait::async_trait;
use mongodb::bson::{Bson, Document, oid::ObjectId};

use super::{CollectionHandle, FindRequest, IndexDefinition, IndexInfo, identity_filter};
use crate::error::{MongoviewError, QueryError, Result};
use crate::transfer::export::{BufferedStreamingQuery, StreamingQuery};

/// A collection held in memory.
#[derive(Debug)]
pub struct MemoryCollection {
    name: String,
    documents: RwLock<Vec<Document>>,
    indexes: RwLock<Vec<IndexInfo>>,
}

impl MemoryCollection {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_documents(name, Vec::new())
    }

    /// Create a collection holding `documents` as-is (no `_id` is added).
    pub fn with_documents(name: impl Into<String>, documents: Vec<Document>) -> Self {
        Self {
            name: name.into(),
            documents: RwLock::new(documents),
            indexes: RwLock::new(vec![IndexInfo::id_index()]),
        }
    }

    /// Copy of every stored document in natural order.
    pub fn snapshot(&self) -> Result<Vec<Document>> {
        Ok(self.read()?.clone())
    }

    pub fn len(&self) -> usize {
        self.documents.read().map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Vec<Document>>> {
        self.documents.read().map_err(|_| self.poisoned())
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Vec<Document>>> {
        self.documents.write().map_err(|_| self.poisoned())
    }

    fn write_indexes(&self) -> Result<std::sync::RwLockWriteGuard<'_, Vec<IndexInfo>>> {
        self.indexes.write().map_err(|_| self.poisoned())
    }

    fn poisoned(&self) -> MongoviewError {
        QueryError::Unavailable(format!("collection '{}' is poisoned", self.name)).into()
    }

    fn run_find(&self, request: &FindRequest) -> Result<Vec<Document>> {
        let docs = self.read()?;
        let mut matched: Vec<&Document> = docs
            .iter()
            .filter(|d| request.filter.as_ref().is_none_or(|f| matches_filter(d, f)))
            .collect();

        if let Some(sort) = request.sort.as_ref().filter(|s| !s.is_empty()) {
            matched.sort_by(|a, b| compare_by_sort(a, b, sort));
        }

        let skip = usize::try_from(request.skip).unwrap_or(usize::MAX);
        let limit = match request.limit {
            Some(0) | None => usize::MAX,
            Some(n) => n.unsigned_abs() as usize,
        };

        Ok(matched
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|d| apply_projection(d, request.projection.as_ref()))
            .collect())
    }
}

#[async_trait]
impl CollectionHandle for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn count(&self, filter: Option<&Document>) -> Result<u64> {
        let docs = self.read()?;
        let count = match filter {
            Some(f) => docs.iter().filter(|d| matches_filter(d, f)).count(),
            None => docs.len(),
        };
        Ok(count as u64)
    }

    async fn find(&self, request: FindRequest) -> Result<Vec<Document>> {
        self.run_find(&request)
    }

    async fn find_stream(
        &self,
        request: FindRequest,
        batch_size: u32,
    ) -> Result<Box<dyn StreamingQuery>> {
        let documents = self.run_find(&request)?;
        Ok(Box::new(BufferedStreamingQuery::new(documents, batch_size)))
    }

    async fn insert(&self, document: Document) -> Result<()> {
        self.write()?.push(with_id(document));
        Ok(())
    }

    async fn insert_many(&self, documents: Vec<Document>) -> Result<u64> {
        let count = documents.len() as u64;
        self.write()?.extend(documents.into_iter().map(with_id));
        Ok(count)
    }

    async fn remove(&self, document: &Document) -> Result<u64> {
        let selector = identity_filter(document);
        let mut docs = self.write()?;
        match docs.iter().position(|d| matches_filter(d, &selector)) {
            Some(index) => {
                docs.remove(index);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn save(&self, document: Document) -> Result<()> {
        let mut docs = self.write()?;
        let existing = document
            .get("_id")
            .and_then(|id| docs.iter().position(|d| d.get("_id") == Some(id)));
        match existing {
            Some(index) => docs[index] = document,
            None => docs.push(with_id(document)),
        }
        Ok(())
    }

    async fn drop_collection(&self) -> Result<()> {
        self.write()?.clear();
        *self.write_indexes()? = vec![IndexInfo::id_index()];
        Ok(())
    }

    async fn list_indexes(&self) -> Result<Vec<IndexInfo>> {
        Ok(self.indexes.read().map_err(|_| self.poisoned())?.clone())
    }

    async fn create_index(&self, definition: IndexDefinition) -> Result<String> {
        definition.validate()?;
        let wanted = definition.to_info();
        let mut indexes = self.write_indexes()?;
        if let Some(existing) = indexes
            .iter()
            .find(|i| i.name == wanted.name || i.keys == wanted.keys)
        {
            if *existing == wanted {
                return Ok(existing.name.clone());
            }
            return Err(MongoviewError::InvalidArgument(format!(
                "index '{}' already exists with a different definition",
                existing.name
            )));
        }
        indexes.push(wanted.clone());
        Ok(wanted.name)
    }

    async fn drop_index(&self, name: &str) -> Result<()> {
        let mut indexes = self.write_indexes()?;
        match indexes.iter().position(|i| i.name == name) {
            Some(position) if indexes[position].is_droppable() => {
                indexes.remove(position);
                Ok(())
            }
            Some(_) => Err(MongoviewError::InvalidArgument(format!(
                "cannot drop index '{name}'"
            ))),
            None => Err(MongoviewError::InvalidArgument(format!(
                "index not found: {name}"
            ))),
        }
    }
}

/// Assign an `_id` the way the driver does for documents that lack one.
fn with_id(mut document: Document) -> Document {
    if !document.contains_key("_id") {
        let mut with_id = Document::new();
        with_id.insert("_id", ObjectId::new());
        with_id.extend(std::mem::take(&mut document));
        return with_id;
    }
    document
}

/// Evaluate a criteria document against `doc`.
pub fn matches_filter(doc: &Document, filter: &Document) -> bool {
    filter.iter().all(|(key, condition)| match key.as_str() {
        "$and" => sub_filters(condition).all(|f| matches_filter(doc, f)),
        "$or" => sub_filters(condition).any(|f| matches_filter(doc, f)),
        "$nor" => !sub_filters(condition).any(|f| matches_filter(doc, f)),
        path => matches_condition(lookup(doc, path), condition),
    })
}

fn sub_filters(condition: &Bson) -> impl Iterator<Item = &Document> {
    let items: &[Bson] = match condition {
        Bson::Array(items) => items,
        _ => &[],
    };
    items.iter().filter_map(Bson::as_document)
}

fn matches_condition(value: Option<&Bson>, condition: &Bson) -> bool {
    match condition {
        Bson::Document(ops) if is_operator_document(ops) => ops
            .iter()
            .all(|(op, operand)| matches_operator(value, op, operand)),
        _ => values_equal(value, condition),
    }
}

fn is_operator_document(doc: &Document) -> bool {
    !doc.is_empty() && doc.keys().all(|k| k.starts_with('$'))
}

fn matches_operator(value: Option<&Bson>, op: &str, operand: &Bson) -> bool {
    match op {
        "$eq" => values_equal(value, operand),
        "$ne" => !values_equal(value, operand),
        "$gt" => compare_present(value, operand, |o| o == Ordering::Greater),
        "$gte" => compare_present(value, operand, |o| o != Ordering::Less),
        "$lt" => compare_present(value, operand, |o| o == Ordering::Less),
        "$lte" => compare_present(value, operand, |o| o != Ordering::Greater),
        "$in" => match operand {
            Bson::Array(options) => options.iter().any(|o| values_equal(value, o)),
            _ => false,
        },
        "$nin" => match operand {
            Bson::Array(options) => !options.iter().any(|o| values_equal(value, o)),
            _ => true,
        },
        "$exists" => {
            let wanted = match operand {
                Bson::Boolean(b) => *b,
                Bson::Int32(n) => *n != 0,
                Bson::Int64(n) => *n != 0,
                Bson::Null => false,
                _ => true,
            };
            value.is_some() == wanted
        }
        _ => false,
    }
}

/// Equality with array membership: `{tags: "a"}` matches `tags: ["a", "b"]`.
fn values_equal(value: Option<&Bson>, expected: &Bson) -> bool {
    match (value, expected) {
        (None, Bson::Null) => true,
        (None, _) => false,
        (Some(Bson::Array(items)), expected) if !matches!(expected, Bson::Array(_)) => {
            items.iter().any(|item| scalar_equal(item, expected))
        }
        (Some(actual), expected) => scalar_equal(actual, expected),
    }
}

fn scalar_equal(a: &Bson, b: &Bson) -> bool {
    match (as_f64(a), as_f64(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn compare_present<F>(value: Option<&Bson>, operand: &Bson, accept: F) -> bool
where
    F: Fn(Ordering) -> bool,
{
    let Some(value) = value else {
        return false;
    };
    let candidates: Vec<&Bson> = match value {
        Bson::Array(items) => items.iter().collect(),
        other => vec![other],
    };
    candidates.into_iter().any(|v| {
        type_rank(v) == type_rank(operand) && accept(compare_values(Some(v), Some(operand)))
    })
}

/// Resolve a dotted path, descending into embedded documents.
fn lookup<'a>(doc: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut parts = path.split('.');
    let mut current = doc.get(parts.next()?)?;
    for part in parts {
        current = match current {
            Bson::Document(inner) => inner.get(part)?,
            Bson::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(n) => Some(f64::from(*n)),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(f) => Some(*f),
        _ => None,
    }
}

/// Server ordering of BSON types (missing fields sort with null).
fn type_rank(value: &Bson) -> u8 {
    match value {
        Bson::MinKey => 0,
        Bson::Null | Bson::Undefined => 1,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_) => 2,
        Bson::String(_) | Bson::Symbol(_) => 3,
        Bson::Document(_) => 4,
        Bson::Array(_) => 5,
        Bson::Binary(_) => 6,
        Bson::ObjectId(_) => 7,
        Bson::Boolean(_) => 8,
        Bson::DateTime(_) => 9,
        Bson::Timestamp(_) => 10,
        Bson::RegularExpression(_) => 11,
        Bson::MaxKey => 255,
        _ => 12,
    }
}

fn compare_values(a: Option<&Bson>, b: Option<&Bson>) -> Ordering {
    let a = a.unwrap_or(&Bson::Null);
    let b = b.unwrap_or(&Bson::Null);
    let by_rank = type_rank(a).cmp(&type_rank(b));
    if by_rank != Ordering::Equal {
        return by_rank;
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => x.cmp(y),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => x.bytes().cmp(&y.bytes()),
        (Bson::Boolean(x), Bson::Boolean(y)) => x.cmp(y),
        (Bson::DateTime(x), Bson::DateTime(y)) => x.cmp(y),
        (Bson::Timestamp(x), Bson::Timestamp(y)) => (x.time, x.increment).cmp(&(y.time, y.increment)),
        (Bson::Array(x), Bson::Array(y)) => compare_sequences(x.iter(), y.iter()),
        (Bson::Document(x), Bson::Document(y)) => compare_sequences(x.values(), y.values()),
        _ => match (as_f64(a), as_f64(b)) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        },
    }
}

fn compare_sequences<'a, I>(mut left: I, mut right: I) -> Ordering
where
    I: Iterator<Item = &'a Bson>,
{
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => match compare_values(Some(x), Some(y)) {
                Ordering::Equal => continue,
                other => return other,
            },
        }
    }
}

fn compare_by_sort(a: &Document, b: &Document, sort: &Document) -> Ordering {
    for (path, direction) in sort {
        let descending = as_f64(direction).is_some_and(|d| d < 0.0);
        let ordering = compare_values(lookup(a, path), lookup(b, path));
        let ordering = if descending { ordering.reverse() } else { ordering };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn is_truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(b) => *b,
        Bson::Null => false,
        other => as_f64(other).is_none_or(|n| n != 0.0),
    }
}

/// Apply a top-level inclusion or exclusion projection.
fn apply_projection(doc: &Document, projection: Option<&Document>) -> Document {
    let Some(projection) = projection.filter(|p| !p.is_empty()) else {
        return doc.clone();
    };

    let inclusion = projection
        .iter()
        .any(|(key, value)| key != "_id" && is_truthy(value));

    if inclusion {
        let keep_id = projection.get("_id").is_none_or(is_truthy);
        doc.iter()
            .filter(|(key, _)| {
                if key.as_str() == "_id" {
                    keep_id
                } else {
                    projection.get(key.as_str()).is_some_and(is_truthy)
                }
            })
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    } else {
        doc.iter()
            .filter(|(key, _)| projection.get(key.as_str()).is_none_or(is_truthy))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}
