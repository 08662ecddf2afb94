//! Driver-backed collection handle.

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{Document, doc};
use mongodb::options::FindOptions;
use mongodb::{Collection, IndexModel};
use tracing::debug;

use super::{
    CollectionHandle, FindRequest, ID_INDEX_NAME, IndexDefinition, IndexInfo, identity_filter,
};
use crate::error::{MongoviewError, Result};
use crate::transfer::export::{CursorStreamingQuery, StreamingQuery};

/// A [`CollectionHandle`] over a live MongoDB collection.
#[derive(Debug, Clone)]
pub struct MongoCollection {
    inner: Collection<Document>,
}

impl MongoCollection {
    pub fn new(inner: Collection<Document>) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &Collection<Document> {
        &self.inner
    }

    fn find_options(request: &FindRequest) -> FindOptions {
        let mut options = FindOptions::default();
        options.projection = request.projection.clone().filter(|p| !p.is_empty());
        options.sort = request.sort.clone().filter(|s| !s.is_empty());
        if request.skip > 0 {
            options.skip = Some(request.skip);
        }
        options.limit = request.limit;
        options
    }
}

#[async_trait]
impl CollectionHandle for MongoCollection {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn count(&self, filter: Option<&Document>) -> Result<u64> {
        let filter = filter.cloned().unwrap_or_default();
        debug!("count on '{}' with filter {:?}", self.name(), filter);
        Ok(self.inner.count_documents(filter).await?)
    }

    async fn find(&self, request: FindRequest) -> Result<Vec<Document>> {
        debug!(
            "find on '{}': filter={:?} skip={} limit={:?}",
            self.name(),
            request.filter,
            request.skip,
            request.limit
        );
        let options = Self::find_options(&request);
        let cursor = self
            .inner
            .find(request.filter_or_empty())
            .with_options(options)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn find_stream(
        &self,
        request: FindRequest,
        batch_size: u32,
    ) -> Result<Box<dyn StreamingQuery>> {
        let mut options = Self::find_options(&request);
        options.batch_size = Some(batch_size);
        let cursor = self
            .inner
            .find(request.filter_or_empty())
            .with_options(options)
            .await?;
        Ok(Box::new(CursorStreamingQuery::new(
            cursor,
            batch_size,
            self.name(),
        )))
    }

    async fn insert(&self, document: Document) -> Result<()> {
        self.inner.insert_one(document).await?;
        Ok(())
    }

    async fn insert_many(&self, documents: Vec<Document>) -> Result<u64> {
        if documents.is_empty() {
            return Ok(0);
        }
        let result = self.inner.insert_many(documents).await?;
        Ok(result.inserted_ids.len() as u64)
    }

    async fn remove(&self, document: &Document) -> Result<u64> {
        let result = self.inner.delete_one(identity_filter(document)).await?;
        Ok(result.deleted_count)
    }

    async fn save(&self, document: Document) -> Result<()> {
        match document.get("_id").cloned() {
            Some(id) => {
                self.inner
                    .replace_one(doc! { "_id": id }, document)
                    .upsert(true)
                    .await?;
            }
            None => {
                self.inner.insert_one(document).await?;
            }
        }
        Ok(())
    }

    async fn drop_collection(&self) -> Result<()> {
        debug!("dropping collection '{}'", self.name());
        self.inner.drop().await?;
        Ok(())
    }

    async fn list_indexes(&self) -> Result<Vec<IndexInfo>> {
        let cursor = self.inner.list_indexes().await?;
        let models: Vec<IndexModel> = cursor.try_collect().await?;
        Ok(models.iter().map(IndexInfo::from_model).collect())
    }

    async fn create_index(&self, definition: IndexDefinition) -> Result<String> {
        definition.validate()?;
        debug!(
            "creating index on '{}' with keys {:?}",
            self.name(),
            definition.keys
        );
        let result = self.inner.create_index(definition.to_model()).await?;
        debug!("created index '{}'", result.index_name);
        Ok(result.index_name)
    }

    async fn drop_index(&self, name: &str) -> Result<()> {
        if name == ID_INDEX_NAME {
            return Err(MongoviewError::InvalidArgument(format!(
                "cannot drop index '{name}'"
            )));
        }
        debug!("dropping index '{}' on '{}'", name, self.name());
        self.inner.drop_index(name).await?;
        Ok(())
    }
}
