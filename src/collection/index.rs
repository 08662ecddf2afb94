//! Index descriptions shared by the collection handles.

use std::time::Duration;

use mongodb::IndexModel;
use mongodb::bson::{Bson, Document};
use mongodb::options::IndexOptions;

use crate::error::{MongoviewError, Result};

/// Name of the index every collection has on `_id`.
pub const ID_INDEX_NAME: &str = "_id_";

/// Key types accepted besides an ascending or descending direction.
const SPECIAL_KEY_TYPES: &[&str] = &["2d", "2dsphere", "text", "hashed"];

/// An existing index as listed by a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexInfo {
    pub name: String,
    pub keys: Document,
    pub unique: bool,
    pub sparse: bool,
    pub expire_after_secs: Option<u64>,
}

impl IndexInfo {
    /// The implicit unique index on `_id`.
    pub fn id_index() -> Self {
        Self {
            name: ID_INDEX_NAME.to_string(),
            keys: mongodb::bson::doc! { "_id": 1 },
            unique: true,
            sparse: false,
            expire_after_secs: None,
        }
    }

    pub fn from_model(model: &IndexModel) -> Self {
        let options = model.options.as_ref();
        Self {
            name: options
                .and_then(|o| o.name.clone())
                .unwrap_or_else(|| default_index_name(&model.keys)),
            keys: model.keys.clone(),
            unique: options.and_then(|o| o.unique).unwrap_or(false),
            sparse: options.and_then(|o| o.sparse).unwrap_or(false),
            expire_after_secs: options.and_then(|o| o.expire_after).map(|d| d.as_secs()),
        }
    }

    /// Whether the index may be dropped; the `_id` index may not.
    pub fn is_droppable(&self) -> bool {
        self.name != ID_INDEX_NAME
    }
}

/// A requested index: key pattern plus the options offered when creating one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexDefinition {
    pub keys: Document,
    pub name: Option<String>,
    pub unique: bool,
    pub sparse: bool,
    pub expire_after_secs: Option<u64>,
}

impl IndexDefinition {
    pub fn new(keys: Document) -> Self {
        Self {
            keys,
            ..Default::default()
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    pub fn sparse(mut self, sparse: bool) -> Self {
        self.sparse = sparse;
        self
    }

    pub fn expire_after_secs(mut self, secs: Option<u64>) -> Self {
        self.expire_after_secs = secs;
        self
    }

    /// Check the key pattern.
    ///
    /// Every field needs a non-zero direction or one of the special index
    /// types (`2d`, `2dsphere`, `text`, `hashed`), and a TTL only applies to
    /// single-field indexes.
    pub fn validate(&self) -> Result<()> {
        if self.keys.is_empty() {
            return Err(invalid("an index needs at least one key field"));
        }
        for (field, kind) in &self.keys {
            let valid = match kind {
                Bson::Int32(n) => *n != 0,
                Bson::Int64(n) => *n != 0,
                Bson::Double(n) => *n != 0.0 && n.is_finite(),
                Bson::String(s) => SPECIAL_KEY_TYPES.contains(&s.as_str()),
                _ => false,
            };
            if !valid {
                return Err(invalid(format!("unsupported index key {field}: {kind}")));
            }
        }
        if self.expire_after_secs.is_some() && self.keys.len() > 1 {
            return Err(invalid("a TTL index must have exactly one key field"));
        }
        if self.name.as_deref() == Some("") {
            return Err(invalid("index name must not be empty"));
        }
        Ok(())
    }

    /// The explicit name, or the one the server derives from the keys.
    pub fn resolved_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| default_index_name(&self.keys))
    }

    pub fn to_model(&self) -> IndexModel {
        let mut options = IndexOptions::default();
        options.name = self.name.clone();
        if self.unique {
            options.unique = Some(true);
        }
        if self.sparse {
            options.sparse = Some(true);
        }
        options.expire_after = self.expire_after_secs.map(Duration::from_secs);
        IndexModel::builder()
            .keys(self.keys.clone())
            .options(Some(options))
            .build()
    }

    pub fn to_info(&self) -> IndexInfo {
        IndexInfo {
            name: self.resolved_name(),
            keys: self.keys.clone(),
            unique: self.unique,
            sparse: self.sparse,
            expire_after_secs: self.expire_after_secs,
        }
    }
}

/// `field_direction` pairs joined by `_`, e.g. `age_1_name_-1`.
pub fn default_index_name(keys: &Document) -> String {
    keys.iter()
        .map(|(field, kind)| {
            let kind = match kind {
                Bson::Int32(n) => n.to_string(),
                Bson::Int64(n) => n.to_string(),
                Bson::Double(n) if n.fract() == 0.0 => format!("{}", *n as i64),
                Bson::String(s) => s.clone(),
                other => other.to_string(),
            };
            format!("{field}_{kind}")
        })
        .collect::<Vec<_>>()
        .join("_")
}

fn invalid(message: impl Into<String>) -> MongoviewError {
    MongoviewError::InvalidArgument(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;

    #[test]
    fn test_default_index_name() {
        assert_eq!(default_index_name(&doc! { "age": 1, "name": -1 }), "age_1_name_-1");
        assert_eq!(default_index_name(&doc! { "loc": "2dsphere" }), "loc_2dsphere");
        assert_eq!(default_index_name(&doc! { "n": 1.0 }), "n_1");
    }

    #[test]
    fn test_validate_key_patterns() {
        assert!(IndexDefinition::new(doc! { "a": 1, "b": -1_i64 }).validate().is_ok());
        assert!(IndexDefinition::new(doc! { "t": "text" }).validate().is_ok());
        assert!(IndexDefinition::new(Document::new()).validate().is_err());
        assert!(IndexDefinition::new(doc! { "a": 0 }).validate().is_err());
        assert!(IndexDefinition::new(doc! { "a": "up" }).validate().is_err());
        assert!(IndexDefinition::new(doc! { "a": true }).validate().is_err());
        assert!(
            IndexDefinition::new(doc! { "a": 1, "b": 1 })
                .expire_after_secs(Some(60))
                .validate()
                .is_err()
        );
        assert!(IndexDefinition::new(doc! { "a": 1 }).name("").validate().is_err());
    }

    #[test]
    fn test_model_carries_options() {
        let definition = IndexDefinition::new(doc! { "created": 1 })
            .name("by_created")
            .unique(true)
            .expire_after_secs(Some(3600));
        let model = definition.to_model();
        assert_eq!(model.keys, doc! { "created": 1 });

        let info = IndexInfo::from_model(&model);
        assert_eq!(info, definition.to_info());
        assert_eq!(info.name, "by_created");
        assert!(info.unique && !info.sparse);
        assert_eq!(info.expire_after_secs, Some(3600));
    }

    #[test]
    fn test_id_index_is_not_droppable() {
        assert!(!IndexInfo::id_index().is_droppable());
        assert!(IndexDefinition::new(doc! { "a": 1 }).to_info().is_droppable());
    }
}
