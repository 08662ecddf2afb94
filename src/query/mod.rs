//! Paginated, filterable collection queries.
//!
//! A [`QuerySpec`] holds what to ask for; a [`PageCursor`] asks for it one
//! page at a time:
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use mongodb::bson::doc;
//! # use mongoview::collection::MemoryCollection;
//! # use mongoview::query::{PageCursor, QuerySpec};
//! # async fn run() -> mongoview::Result<()> {
//! let spec = QuerySpec::new(10)?.with_sort(Some(doc! { "name": 1 }));
//! let mut cursor = PageCursor::new(Arc::new(MemoryCollection::new("people")), spec);
//! cursor.set_page(3);
//! cursor.update().await?;
//! println!("page {} of {}", cursor.page(), cursor.page_count());
//! # Ok(())
//! # }
//! ```

pub mod cursor;
pub mod spec;

pub use cursor::{PageCursor, PageSnapshot};
pub use spec::{DEFAULT_ITEMS_PER_PAGE, QuerySpec};

#[cfg(test)]
mod tests;
