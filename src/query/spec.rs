//! The shape of a paginated query.

use mongodb::bson::Document;

use crate::collection::FindRequest;
use crate::error::{MongoviewError, Result};

/// Page size used when none is configured.
pub const DEFAULT_ITEMS_PER_PAGE: u32 = 20;

/// Criteria, projection, sort and page size of a browsing session.
///
/// Each document is optional; `None` and an empty document both mean "no
/// restriction".
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    criteria: Option<Document>,
    projection: Option<Document>,
    sort: Option<Document>,
    items_per_page: u32,
}

impl Default for QuerySpec {
    fn default() -> Self {
        Self {
            criteria: None,
            projection: None,
            sort: None,
            items_per_page: DEFAULT_ITEMS_PER_PAGE,
        }
    }
}

impl QuerySpec {
    /// Create an unrestricted query with the given page size.
    ///
    /// # Errors
    /// `InvalidArgument` when `items_per_page` is zero.
    pub fn new(items_per_page: u32) -> Result<Self> {
        validate_items_per_page(items_per_page)?;
        Ok(Self {
            items_per_page,
            ..Default::default()
        })
    }

    pub fn with_criteria(mut self, criteria: Option<Document>) -> Self {
        self.criteria = criteria;
        self
    }

    pub fn with_projection(mut self, projection: Option<Document>) -> Self {
        self.projection = projection;
        self
    }

    pub fn with_sort(mut self, sort: Option<Document>) -> Self {
        self.sort = sort;
        self
    }

    pub fn criteria(&self) -> Option<&Document> {
        self.criteria.as_ref()
    }

    pub fn projection(&self) -> Option<&Document> {
        self.projection.as_ref()
    }

    pub fn sort(&self) -> Option<&Document> {
        self.sort.as_ref()
    }

    pub fn items_per_page(&self) -> u32 {
        self.items_per_page
    }

    pub fn set_criteria(&mut self, criteria: Option<Document>) {
        self.criteria = criteria;
    }

    pub fn set_projection(&mut self, projection: Option<Document>) {
        self.projection = projection;
    }

    pub fn set_sort(&mut self, sort: Option<Document>) {
        self.sort = sort;
    }

    pub fn set_items_per_page(&mut self, items_per_page: u32) -> Result<()> {
        validate_items_per_page(items_per_page)?;
        self.items_per_page = items_per_page;
        Ok(())
    }

    /// True when no criteria, projection or sort restricts the query.
    pub fn is_unrestricted(&self) -> bool {
        [&self.criteria, &self.projection, &self.sort]
            .iter()
            .all(|d| d.as_ref().is_none_or(Document::is_empty))
    }

    /// Number of pages needed for `total` matching documents (at least 1).
    pub fn page_count(&self, total: u64) -> u64 {
        total.div_ceil(u64::from(self.items_per_page)).max(1)
    }

    /// Find request for the 1-based `page`.
    pub fn page_request(&self, page: u64) -> FindRequest {
        let skip = page.saturating_sub(1) * u64::from(self.items_per_page);
        FindRequest::new(self.criteria.clone())
            .projection(self.projection.clone())
            .sort(self.sort.clone())
            .skip(skip)
            .limit(i64::from(self.items_per_page))
    }
}

fn validate_items_per_page(items_per_page: u32) -> Result<()> {
    if items_per_page == 0 {
        return Err(MongoviewError::InvalidArgument(
            "items per page must be a positive integer".to_string(),
        ));
    }
    Ok(())
}
