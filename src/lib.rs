//! mongoview library
//!
//! Paged browsing of MongoDB query results, streaming export to JSON Lines
//! or JSON arrays, and line-delimited JSON import.
//!
//! # Modules
//!
//! - `cli`: Command-line interface and argument parsing
//! - `codec`: Extended JSON conversion and file character encodings
//! - `collection`: The collection abstraction the other modules work against
//! - `config`: Configuration management
//! - `connection`: MongoDB connection management
//! - `error`: Error types and handling
//! - `history`: Bounded history of recently run queries
//! - `query`: Query shape and the page cursor
//! - `transfer`: Export and import
//! - `worker`: Background task pool
//!
//! # Example
//!
//! ```no_run
//! use mongoview::{Config, ConnectionManager, PageCursor, QuerySpec};
//!
//! #[tokio::main]
//! async fn main() -> mongoview::Result<()> {
//!     let config = Config::default();
//!     let mut manager = ConnectionManager::new(
//!         "mongodb://localhost:27017/shop".to_string(),
//!         config.connection,
//!     );
//!     manager.connect().await?;
//!
//!     let mut cursor = PageCursor::new(manager.collection(None, "orders")?, QuerySpec::new(20)?);
//!     cursor.update().await?;
//!     println!("page {} of {}", cursor.page(), cursor.page_count());
//!
//!     manager.disconnect().await?;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod codec;
pub mod collection;
pub mod config;
pub mod connection;
pub mod error;
pub mod history;
pub mod query;
pub mod transfer;
pub mod worker;

// Re-export commonly used types
pub use codec::{CharacterEncoding, DocumentCodec, JsonMode};
pub use collection::{CollectionHandle, IndexDefinition, IndexInfo};
pub use config::Config;
pub use connection::ConnectionManager;
pub use error::{MongoviewError, Result};
pub use history::QueryHistory;
pub use query::{PageCursor, QuerySpec};
pub use transfer::{Exporter, Importer};
pub use worker::WorkerPool;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library version string
pub fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
