//! Error handling for mongoview.
//!
//! Every fallible operation in the crate returns [`Result`], whose error type
//! [`MongoviewError`] wraps one of the typed failure kinds:
//! - [`QueryError`]: the backend failed while counting, fetching or writing
//! - [`ParseError`]: user supplied JSON (criteria, import lines) was malformed
//! - [`ExportError`] / [`ImportError`]: the destination or source failed
//! - `IndexOutOfRange`: a row outside the current page was requested
//!
//! Driver errors are rendered through [`mongo::ErrorInfo`], which extracts the
//! server code and message into a JSON object.
//!
//! # Example
//!
//! ```rust,no_run
//! use mongoview::error::{MongoviewError, QueryError, Result};
//!
//! fn classify(result: Result<()>) -> &'static str {
//!     match result {
//!         Ok(()) => "ok",
//!         Err(MongoviewError::Query(QueryError::Backend(_))) => "backend",
//!         Err(_) => "other",
//!     }
//! }
//! ```

pub mod kinds;
pub mod mongo;

pub use kinds::{
    ConfigError, ConnectionError, ExportError, ImportError, MongoviewError, ParseError,
    ParseErrorKind, QueryError, Result,
};
pub use mongo::{ErrorDetails, ErrorInfo};
