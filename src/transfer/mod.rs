//! Moving whole result sets between collections and files.
//!
//! [`Exporter`] streams a query's matches to JSON Lines or a JSON array;
//! [`Importer`] reads line-delimited JSON back into a collection.

pub mod export;
pub mod import;
pub mod progress;

pub use export::{
    ExportCoordinator, ExportProperties, ExportPropertiesBuilder, ExportSummary, Exporter,
    default_destination, default_file_name,
};
pub use import::{
    ImportProperties, ImportPropertiesBuilder, ImportReport, Importer, LineError,
};
pub use progress::{ProgressTracker, TransferDirection};
