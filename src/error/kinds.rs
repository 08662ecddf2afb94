use std::{fmt, io};

use crate::error::mongo::format_mongodb_error;

/// Crate-wide `Result` type using [`MongoviewError`] as the error.
pub type Result<T> = std::result::Result<T, MongoviewError>;

/// Top-level error type for mongoview operations.
#[derive(Debug)]
pub enum MongoviewError {
    /// Counting, fetching or writing against the collection failed.
    Query(QueryError),

    /// JSON text could not be turned into a document.
    Parse(ParseError),

    /// Export destination could not be opened or written.
    Export(ExportError),

    /// Import source could not be opened or read.
    Import(ImportError),

    /// Configuration errors.
    Config(ConfigError),

    /// Connection-related errors.
    Connection(ConnectionError),

    /// A row outside `[0, len)` of the current page was requested.
    IndexOutOfRange { index: usize, len: usize },

    /// An argument violated the operation's contract.
    InvalidArgument(String),

    /// The unit of work was cancelled before it completed.
    Cancelled,

    /// A background task panicked or was aborted.
    TaskFailed(String),

    /// I/O errors.
    Io(io::Error),
}

/// Backend failures while talking to the collection.
#[derive(Debug)]
pub enum QueryError {
    /// The driver reported an error.
    Backend(mongodb::error::Error),

    /// A non-driver collection implementation failed.
    Unavailable(String),

    /// The server cursor failed while streaming.
    Cursor(String),
}

/// What went wrong while parsing JSON text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// The text is not valid JSON.
    InvalidJson,

    /// Valid JSON, but a document (object) was required.
    NotADocument,

    /// A shell constructor such as `ObjectId(...)` was malformed.
    InvalidShellConstructor,

    /// Extended JSON wrappers (`$oid`, `$date`, ...) were malformed.
    InvalidExtendedJson,

    /// The bytes could not be decoded with the requested encoding.
    Decoding,

    /// The named character encoding is not supported.
    UnsupportedEncoding,
}

/// Malformed input, optionally attributed to a line of an import source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    pub line: Option<usize>,
}

/// Export destination failures.
#[derive(Debug)]
pub enum ExportError {
    /// The destination could not be created or opened.
    Open { path: String, source: io::Error },

    /// Writing or flushing the destination failed.
    Write(io::Error),

    /// A document could not be encoded in the requested character encoding.
    Encoding(String),
}

/// Import source failures.
#[derive(Debug)]
pub enum ImportError {
    /// The source could not be opened.
    Open { path: String, source: io::Error },

    /// Reading the source failed.
    Read(io::Error),
}

/// Configuration-specific errors.
#[derive(Debug)]
pub enum ConfigError {
    /// Config file not found.
    FileNotFound(String),

    /// Invalid config format.
    InvalidFormat(String),

    /// Invalid field value.
    InvalidValue { field: String, value: String },
}

/// Connection-specific errors.
#[derive(Debug)]
pub enum ConnectionError {
    /// Failed to establish a connection.
    ConnectionFailed(String),

    /// Invalid connection URI.
    InvalidUri(String),

    /// Not currently connected to MongoDB.
    NotConnected,

    /// Ping command failed.
    PingFailed(String),
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            line: None,
        }
    }

    pub fn invalid_json(message: impl Into<String>) -> Self {
        Self::new(ParseErrorKind::InvalidJson, message)
    }

    pub fn not_a_document(found: &str) -> Self {
        Self::new(
            ParseErrorKind::NotADocument,
            format!("expected a JSON object, found {found}"),
        )
    }

    /// Attach the 1-based source line this error was found on.
    pub fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }
}

/* ========================= Display & Error impls ========================= */

impl fmt::Display for MongoviewError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MongoviewError::Query(e) => write!(f, "Query failed: {e}"),
            MongoviewError::Parse(e) => write!(f, "{e}"),
            MongoviewError::Export(e) => write!(f, "Export failed: {e}"),
            MongoviewError::Import(e) => write!(f, "Import failed: {e}"),
            MongoviewError::Config(e) => write!(f, "Configuration error: {e}"),
            MongoviewError::Connection(e) => write!(f, "Connection error: {e}"),
            MongoviewError::IndexOutOfRange { index, len } => {
                write!(f, "Row index {index} out of range for page of {len} documents")
            }
            MongoviewError::InvalidArgument(msg) => write!(f, "Invalid argument: {msg}"),
            MongoviewError::Cancelled => write!(f, "Operation cancelled"),
            MongoviewError::TaskFailed(msg) => write!(f, "Background task failed: {msg}"),
            MongoviewError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::Backend(e) => format_mongodb_error(f, e),
            QueryError::Unavailable(msg) => write!(f, "{msg}"),
            QueryError::Cursor(msg) => write!(f, "Cursor error: {msg}"),
        }
    }
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ParseErrorKind::InvalidJson => "invalid JSON",
            ParseErrorKind::NotADocument => "not a document",
            ParseErrorKind::InvalidShellConstructor => "invalid shell constructor",
            ParseErrorKind::InvalidExtendedJson => "invalid extended JSON",
            ParseErrorKind::Decoding => "decoding error",
            ParseErrorKind::UnsupportedEncoding => "unsupported encoding",
        };
        f.write_str(label)
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "Line {line}: {}: {}", self.kind, self.message),
            None => write!(f, "Parse error ({}): {}", self.kind, self.message),
        }
    }
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::Open { path, source } => {
                write!(f, "cannot open destination {path}: {source}")
            }
            ExportError::Write(e) => write!(f, "cannot write destination: {e}"),
            ExportError::Encoding(msg) => write!(f, "cannot encode output: {msg}"),
        }
    }
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportError::Open { path, source } => write!(f, "cannot open source {path}: {source}"),
            ImportError::Read(e) => write!(f, "cannot read source: {e}"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {path}"),
            ConfigError::InvalidFormat(msg) => write!(f, "Invalid config format: {msg}"),
            ConfigError::InvalidValue { field, value } => {
                write!(f, "Invalid value '{value}' for field '{field}'")
            }
        }
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionError::ConnectionFailed(msg) => write!(f, "Failed to connect: {msg}"),
            ConnectionError::InvalidUri(uri) => write!(f, "Invalid connection URI: {uri}"),
            ConnectionError::NotConnected => write!(f, "Not connected to MongoDB"),
            ConnectionError::PingFailed(msg) => write!(f, "Ping failed: {msg}"),
        }
    }
}

impl std::error::Error for MongoviewError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MongoviewError::Query(e) => Some(e),
            MongoviewError::Parse(e) => Some(e),
            MongoviewError::Export(e) => Some(e),
            MongoviewError::Import(e) => Some(e),
            MongoviewError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl std::error::Error for QueryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            QueryError::Backend(e) => Some(e),
            _ => None,
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExportError::Open { source, .. } => Some(source),
            ExportError::Write(e) => Some(e),
            ExportError::Encoding(_) => None,
        }
    }
}

impl std::error::Error for ImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ImportError::Open { source, .. } => Some(source),
            ImportError::Read(e) => Some(e),
        }
    }
}

impl std::error::Error for ParseError {}
impl std::error::Error for ConfigError {}
impl std::error::Error for ConnectionError {}

/* ========================= Conversions to MongoviewError ========================= */

impl From<io::Error> for MongoviewError {
    fn from(err: io::Error) -> Self {
        MongoviewError::Io(err)
    }
}

impl From<mongodb::error::Error> for MongoviewError {
    fn from(err: mongodb::error::Error) -> Self {
        MongoviewError::Query(QueryError::Backend(err))
    }
}

impl From<QueryError> for MongoviewError {
    fn from(err: QueryError) -> Self {
        MongoviewError::Query(err)
    }
}

impl From<ParseError> for MongoviewError {
    fn from(err: ParseError) -> Self {
        MongoviewError::Parse(err)
    }
}

impl From<ExportError> for MongoviewError {
    fn from(err: ExportError) -> Self {
        MongoviewError::Export(err)
    }
}

impl From<ImportError> for MongoviewError {
    fn from(err: ImportError) -> Self {
        MongoviewError::Import(err)
    }
}

impl From<ConfigError> for MongoviewError {
    fn from(err: ConfigError) -> Self {
        MongoviewError::Config(err)
    }
}

impl From<ConnectionError> for MongoviewError {
    fn from(err: ConnectionError) -> Self {
        MongoviewError::Connection(err)
    }
}
