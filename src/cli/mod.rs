//! Command-line interface for mongoview
//!
//! This module handles:
//! - Command-line argument parsing using clap
//! - Configuration loading and validation
//! - Dispatch of the `browse`, `export`, `import`, `indexes`, `ping` and
//!   `config` commands

use clap::{Parser, Subcommand};
use colored_json::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::level_filters::LevelFilter;
use tracing::{Level, debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::codec::{CharacterEncoding, DocumentCodec, JsonMode};
use crate::collection::{CollectionHandle, IndexDefinition, IndexInfo};
use crate::config::{Config, LogLevel};
use crate::connection::{ConnectionManager, HealthStatus, redact_uri};
use crate::error::{ConnectionError, MongoviewError, Result};
use crate::query::{PageCursor, PageSnapshot, QuerySpec};
use crate::transfer::{
    ExportProperties, ExportSummary, Exporter, ImportProperties, ImportReport, Importer,
    default_destination,
};
use crate::worker::{SharedCursor, WorkerPool};

/// Browse, export and import MongoDB collections
#[derive(Parser, Debug)]
#[command(
    name = "mongoview",
    version,
    about = "Page through, export and import MongoDB collections",
    long_about = "Page through query results, export them as JSON Lines or a JSON array,
and import line-delimited JSON files back into a collection."
)]
pub struct CliArgs {
    /// MongoDB connection URI
    ///
    /// Format: mongodb://[username:password@]host[:port][/database][?options]
    #[arg(value_name = "URI")]
    pub uri: Option<String>,

    /// Database name to use
    #[arg(long, value_name = "NAME")]
    pub database: Option<String>,

    /// Configuration file path
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Disable colored output
    #[arg(long = "no-color")]
    pub no_color: bool,

    /// Quiet mode (minimal output)
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Verbose mode (detailed logging)
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Very verbose mode (trace logging)
    #[arg(long = "vv")]
    pub very_verbose: bool,

    /// Connection timeout in seconds
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands for mongoview
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print one page of a query's results
    Browse {
        /// Collection to query
        #[arg(value_name = "COLLECTION")]
        collection: String,

        /// Query criteria as JSON
        #[arg(long, value_name = "JSON")]
        criteria: Option<String>,

        /// Projection as JSON
        #[arg(long, value_name = "JSON")]
        projection: Option<String>,

        /// Sort order as JSON
        #[arg(long, value_name = "JSON")]
        sort: Option<String>,

        /// Page to show, starting at 1
        #[arg(long, value_name = "N", default_value_t = 1)]
        page: u64,

        /// Documents per page
        #[arg(long = "per-page", value_name = "N")]
        per_page: Option<u32>,
    },

    /// Export a query's results to a file
    Export {
        /// Collection to export from
        #[arg(value_name = "COLLECTION")]
        collection: String,

        /// Destination file; defaults to a timestamped name in the current directory
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,

        /// Query criteria as JSON
        #[arg(long, value_name = "JSON")]
        criteria: Option<String>,

        /// Projection as JSON
        #[arg(long, value_name = "JSON")]
        projection: Option<String>,

        /// Sort order as JSON
        #[arg(long, value_name = "JSON")]
        sort: Option<String>,

        /// Write one JSON array instead of JSON Lines
        #[arg(long = "json-array")]
        json_array: bool,

        /// Character encoding of the file
        #[arg(long, value_name = "NAME")]
        encoding: Option<String>,

        /// Write canonical extended JSON
        #[arg(long)]
        canonical: bool,
    },

    /// Import a line-delimited JSON file into a collection
    Import {
        /// Collection to import into
        #[arg(value_name = "COLLECTION")]
        collection: String,

        /// Source file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Drop the collection before the first insert
        #[arg(long)]
        drop: bool,

        /// Character encoding of the file
        #[arg(long, value_name = "NAME")]
        encoding: Option<String>,
    },

    /// List a collection's indexes, optionally creating or dropping one first
    Indexes {
        /// Collection whose indexes to manage
        #[arg(value_name = "COLLECTION")]
        collection: String,

        /// Create an index with these keys, e.g. '{"age": 1, "name": -1}'
        #[arg(long, value_name = "JSON", conflicts_with = "drop")]
        create: Option<String>,

        /// Name of the created index; derived from the keys when omitted
        #[arg(long, value_name = "NAME", requires = "create")]
        name: Option<String>,

        /// Make the created index unique
        #[arg(long, requires = "create")]
        unique: bool,

        /// Make the created index sparse
        #[arg(long, requires = "create")]
        sparse: bool,

        /// Expire documents this many seconds after the indexed date
        #[arg(long = "expire-after", value_name = "SECONDS", requires = "create")]
        expire_after: Option<u64>,

        /// Drop the index with this name
        #[arg(long, value_name = "NAME")]
        drop: Option<String>,
    },

    /// Check that the server answers and report its version
    Ping,

    /// Show configuration
    Config {
        /// Show effective configuration
        #[arg(long)]
        show: bool,

        /// Validate configuration file
        #[arg(long)]
        validate: bool,

        /// Write a default configuration file
        #[arg(long)]
        init: bool,
    },
}

/// CLI interface handler
pub struct CliInterface {
    /// Parsed command-line arguments
    args: CliArgs,

    /// Loaded configuration
    config: Config,
}

impl CliInterface {
    /// Create a new CLI interface from the process arguments
    ///
    /// # Returns
    /// * `Result<Self>` - New CLI interface or error
    pub fn new() -> Result<Self> {
        Self::from_args(CliArgs::parse())
    }

    /// Create a CLI interface from already parsed arguments
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let config = Self::load_config(&args)?;
        Ok(Self { args, config })
    }

    /// Load configuration from file and merge with arguments
    ///
    /// # Arguments
    /// * `args` - Command-line arguments
    ///
    /// # Returns
    /// * `Result<Config>` - Loaded configuration or error
    fn load_config(args: &CliArgs) -> Result<Config> {
        let mut config = Config::load(args.config_file.as_deref())?;

        if let Err(e) = config.validate() {
            eprintln!("Warning: Configuration validation failed: {}", e);
            eprintln!("Using default configuration instead.");
            config = Config::default();
        }

        Self::apply_args_to_config(&mut config, args);
        Ok(config)
    }

    /// Apply CLI arguments to configuration
    fn apply_args_to_config(config: &mut Config, args: &CliArgs) {
        if args.no_color {
            config.display.color_output = false;
        }

        config.logging.level = if args.very_verbose {
            LogLevel::Trace
        } else if args.verbose {
            LogLevel::Debug
        } else if args.quiet {
            LogLevel::Error
        } else {
            config.logging.level
        };

        if let Some(timeout) = args.timeout {
            config.connection.timeout = timeout;
        }
    }

    /// Get the MongoDB connection URI: the explicit argument, else the configured default
    pub fn connection_uri(&self) -> String {
        self.args
            .uri
            .clone()
            .unwrap_or_else(|| self.config.connection.default_uri.clone())
    }

    /// Log filter for the subscriber.
    ///
    /// `-v`/`--vv` pick the level outright. Otherwise `env_directives`
    /// (the `RUST_LOG` value) apply when present, falling back to the
    /// configured level.
    pub fn log_filter(&self, env_directives: Option<&str>) -> EnvFilter {
        let (level, directives) = if self.args.very_verbose {
            (Level::TRACE, "")
        } else if self.args.verbose {
            (Level::DEBUG, "")
        } else {
            (
                self.config.logging.level.to_tracing_level(),
                env_directives.unwrap_or(""),
            )
        };
        EnvFilter::builder()
            .with_default_directive(LevelFilter::from_level(level).into())
            .parse_lossy(directives)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn args(&self) -> &CliArgs {
        &self.args
    }

    /// Run the selected command
    pub async fn run(&self) -> Result<()> {
        match &self.args.command {
            Commands::Browse {
                collection,
                criteria,
                projection,
                sort,
                page,
                per_page,
            } => {
                let spec = self.build_spec(
                    criteria.as_deref(),
                    projection.as_deref(),
                    sort.as_deref(),
                    *per_page,
                )?;
                self.with_collection(collection, |handle| {
                    self.browse(handle, spec, *page)
                })
                .await
            }
            Commands::Export {
                collection,
                file,
                criteria,
                projection,
                sort,
                json_array,
                encoding,
                canonical,
            } => {
                let codec = DocumentCodec::default();
                let json_array = *json_array || self.config.transfer.json_array;
                let destination = match file {
                    Some(path) => path.clone(),
                    None => default_destination(&std::env::current_dir()?, json_array),
                };
                let mut builder = ExportProperties::builder(collection.as_str(), destination)
                    .transfer_defaults(&self.config.transfer)?
                    .criteria(parse_json_arg(&codec, criteria.as_deref())?)
                    .projection(parse_json_arg(&codec, projection.as_deref())?)
                    .sort(parse_json_arg(&codec, sort.as_deref())?)
                    .json_array(json_array)
                    .show_progress(self.config.transfer.progress && !self.args.quiet);
                if let Some(name) = encoding {
                    builder = builder.encoding(CharacterEncoding::from_name(name)?);
                }
                if *canonical {
                    builder = builder.json_mode(JsonMode::Canonical);
                }
                let properties = builder.build();
                self.with_collection(collection, |handle| self.export(handle, properties))
                    .await
            }
            Commands::Import {
                collection,
                file,
                drop,
                encoding,
            } => {
                let mut builder = ImportProperties::builder(collection.as_str(), file.clone())
                    .transfer_defaults(&self.config.transfer)?
                    .drop_existing(*drop)
                    .show_progress(self.config.transfer.progress && !self.args.quiet);
                if let Some(name) = encoding {
                    builder = builder.encoding(CharacterEncoding::from_name(name)?);
                }
                let properties = builder.build();
                self.with_collection(collection, |handle| self.import(handle, properties))
                    .await
            }
            Commands::Indexes {
                collection,
                create,
                name,
                unique,
                sparse,
                expire_after,
                drop,
            } => {
                let action = match (create, drop) {
                    (Some(keys), _) => {
                        let codec = DocumentCodec::default();
                        let keys = parse_json_arg(&codec, Some(keys.as_str()))?.ok_or_else(|| {
                            MongoviewError::InvalidArgument("index keys are empty".into())
                        })?;
                        let mut definition = IndexDefinition::new(keys)
                            .unique(*unique)
                            .sparse(*sparse)
                            .expire_after_secs(*expire_after);
                        if let Some(name) = name {
                            definition = definition.name(name.as_str());
                        }
                        definition.validate()?;
                        IndexAction::Create(definition)
                    }
                    (None, Some(name)) => IndexAction::Drop(name.clone()),
                    (None, None) => IndexAction::List,
                };
                self.with_collection(collection, |handle| self.indexes(handle, action))
                    .await
            }
            Commands::Ping => self.ping().await,
            Commands::Config {
                show,
                validate,
                init,
            } => self.handle_config_command(*show, *validate, *init),
        }
    }

    /// Build the query shape from JSON arguments and the page size
    fn build_spec(
        &self,
        criteria: Option<&str>,
        projection: Option<&str>,
        sort: Option<&str>,
        per_page: Option<u32>,
    ) -> Result<QuerySpec> {
        let codec = DocumentCodec::default();
        let items_per_page = match per_page {
            Some(n) => n,
            None => u32::try_from(self.config.display.items_per_page).map_err(|_| {
                MongoviewError::InvalidArgument(format!(
                    "items per page too large: {}",
                    self.config.display.items_per_page
                ))
            })?,
        };
        Ok(QuerySpec::new(items_per_page)?
            .with_criteria(parse_json_arg(&codec, criteria)?)
            .with_projection(parse_json_arg(&codec, projection)?)
            .with_sort(parse_json_arg(&codec, sort)?))
    }

    async fn connect(&self) -> Result<ConnectionManager> {
        let mut manager =
            ConnectionManager::new(self.connection_uri(), self.config.connection.clone());
        if !self.args.quiet {
            println!("Connecting to: {}", redact_uri(manager.uri()));
        }
        manager.connect().await?;
        Ok(manager)
    }

    /// Connect, resolve `collection`, run `action` and disconnect again
    async fn with_collection<F, Fut>(&self, collection: &str, action: F) -> Result<()>
    where
        F: FnOnce(Arc<dyn CollectionHandle>) -> Fut,
        Fut: std::future::Future<Output = Result<()>>,
    {
        let mut manager = self.connect().await?;
        let result = match manager.collection(self.args.database.as_deref(), collection) {
            Ok(handle) => action(handle).await,
            Err(e) => Err(e),
        };
        finish_session(result, manager.disconnect().await)
    }

    async fn ping(&self) -> Result<()> {
        let mut manager = self.connect().await?;
        let status = manager.health_check().await;
        let result = status.and_then(|status| {
            println!("{}", health_summary_text(&status));
            if status.is_healthy {
                Ok(())
            } else {
                Err(ConnectionError::PingFailed(format!(
                    "no answer from {}",
                    redact_uri(manager.uri())
                ))
                .into())
            }
        });
        finish_session(result, manager.disconnect().await)
    }

    async fn indexes(
        &self,
        collection: Arc<dyn CollectionHandle>,
        action: IndexAction,
    ) -> Result<()> {
        let indexes = apply_index_action(collection.as_ref(), action).await?;
        let codec = DocumentCodec::default();
        for index in &indexes {
            println!("{}", index_line(&codec, index)?);
        }
        Ok(())
    }

    async fn browse(
        &self,
        collection: Arc<dyn CollectionHandle>,
        spec: QuerySpec,
        page: u64,
    ) -> Result<()> {
        let mut cursor = PageCursor::new(collection, spec);
        cursor.set_page(page);
        let shared = SharedCursor::new(cursor);
        let pool = WorkerPool::new(1);

        let handle = shared.spawn_update(&pool);
        let listener = cancel_on_ctrl_c(handle.cancellation_token());
        let snapshot = handle.join().await;
        listener.abort();
        let snapshot = snapshot?;

        if snapshot.page != page {
            debug!("Requested page {} clamped to {}", page, snapshot.page);
        }
        println!("{}", page_header(&snapshot));

        let codec = DocumentCodec::new(JsonMode::Relaxed, self.config.display.indent);
        for document in &snapshot.documents {
            let text = if self.config.display.pretty {
                codec.to_pretty(document)?
            } else {
                codec.to_compact(document)?
            };
            if self.config.display.color_output {
                println!("{}", text.to_colored_json_auto().unwrap_or(text));
            } else {
                println!("{}", text);
            }
        }
        Ok(())
    }

    async fn export(
        &self,
        collection: Arc<dyn CollectionHandle>,
        properties: ExportProperties,
    ) -> Result<()> {
        let token = CancellationToken::new();
        let listener = cancel_on_ctrl_c(token.clone());
        let summary = Exporter::new(collection)
            .with_cancellation(token)
            .export(&properties)
            .await;
        listener.abort();

        let summary = summary?;
        info!(
            "Exported {} documents from {}",
            summary.documents_exported, properties.collection_name
        );
        println!("{}", export_summary_text(&summary, &properties.destination));
        Ok(())
    }

    async fn import(
        &self,
        collection: Arc<dyn CollectionHandle>,
        properties: ImportProperties,
    ) -> Result<()> {
        let token = CancellationToken::new();
        let listener = cancel_on_ctrl_c(token.clone());
        let report = Importer::new(collection)
            .with_cancellation(token)
            .import_from(&properties)
            .await;
        listener.abort();

        let report = report?;
        println!("{}", import_summary_text(&report));
        for error in &report.errors {
            eprintln!("  {}", error);
        }
        Ok(())
    }

    /// Handle config subcommand
    ///
    /// # Arguments
    /// * `show` - Whether to show configuration
    /// * `validate` - Whether to validate configuration
    /// * `init` - Whether to write a default configuration file
    fn handle_config_command(&self, show: bool, validate: bool, init: bool) -> Result<()> {
        if init {
            self.init_config_file()?;
        }

        if validate {
            self.validate_config_file();
        }

        if show || !(init || validate) {
            self.show_config()?;
        }

        Ok(())
    }

    fn init_config_file(&self) -> Result<()> {
        let path = self.config_path();
        if path.exists() {
            return Err(MongoviewError::InvalidArgument(format!(
                "configuration file already exists: {}",
                path.display()
            )));
        }
        Config::default().save(&path)?;
        println!("Wrote default configuration to {}", path.display());
        Ok(())
    }

    /// Validate configuration file
    fn validate_config_file(&self) {
        let path = self.config_path();
        println!("Validating configuration file: {}", path.display());

        if !path.exists() {
            println!("Configuration file does not exist");
            return;
        }

        match Config::from_file(&path) {
            Ok(config) => match config.validate() {
                Ok(()) => println!("Configuration is valid"),
                Err(e) => println!("Configuration validation failed: {}", e),
            },
            Err(e) => println!("Failed to load configuration: {}", e),
        }
    }

    /// Show effective configuration
    fn show_config(&self) -> Result<()> {
        println!("Configuration file: {}", self.config_path().display());
        println!();
        println!("{}", self.config.to_toml_string()?);
        Ok(())
    }

    /// Get configuration file path (from args or default)
    fn config_path(&self) -> PathBuf {
        self.args
            .config_file
            .clone()
            .unwrap_or_else(Config::default_path)
    }
}

/// What the `indexes` command does before listing.
#[derive(Debug, Clone, PartialEq)]
enum IndexAction {
    List,
    Create(IndexDefinition),
    Drop(String),
}

/// Run `action` against `collection` and return the resulting index list.
async fn apply_index_action(
    collection: &dyn CollectionHandle,
    action: IndexAction,
) -> Result<Vec<IndexInfo>> {
    match action {
        IndexAction::List => {}
        IndexAction::Create(definition) => {
            let name = collection.create_index(definition).await?;
            info!("Created index {} on {}", name, collection.name());
        }
        IndexAction::Drop(name) => {
            collection.drop_index(&name).await?;
            info!("Dropped index {} on {}", name, collection.name());
        }
    }
    collection.list_indexes().await
}

/// Keep the command's own outcome; a failed disconnect is only logged.
fn finish_session(result: Result<()>, disconnected: Result<()>) -> Result<()> {
    if let Err(e) = disconnected {
        warn!("Disconnect failed: {}", e);
    }
    result
}

/// Cancel `token` when the user presses Ctrl+C; abort the returned handle when done.
fn cancel_on_ctrl_c(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping");
            token.cancel();
        }
    })
}

/// Parse an optional JSON argument; blank text means unset.
fn parse_json_arg(
    codec: &DocumentCodec,
    text: Option<&str>,
) -> Result<Option<mongodb::bson::Document>> {
    match text {
        Some(text) => Ok(codec.parse_optional(text)?),
        None => Ok(None),
    }
}

fn page_header(snapshot: &PageSnapshot) -> String {
    format!(
        "page {} of {} ({} documents)",
        snapshot.page, snapshot.page_count, snapshot.total
    )
}

fn health_summary_text(status: &HealthStatus) -> String {
    match (status.is_healthy, &status.server_version) {
        (true, Some(version)) => format!(
            "Server {} answered in {} ms",
            version, status.response_time_ms
        ),
        (true, None) => format!("Server answered in {} ms", status.response_time_ms),
        (false, _) => format!(
            "Server did not answer within {} ms",
            status.response_time_ms
        ),
    }
}

fn index_line(codec: &DocumentCodec, index: &IndexInfo) -> Result<String> {
    let mut line = format!("{}  {}", index.name, codec.to_compact(&index.keys)?);
    if index.unique {
        line.push_str("  unique");
    }
    if index.sparse {
        line.push_str("  sparse");
    }
    if let Some(secs) = index.expire_after_secs {
        line.push_str(&format!("  expires after {secs} s"));
    }
    Ok(line)
}

fn export_summary_text(summary: &ExportSummary, destination: &Path) -> String {
    if summary.cancelled {
        format!(
            "Export cancelled after {} documents ({} bytes) to {}",
            summary.documents_exported,
            summary.bytes_written,
            destination.display()
        )
    } else {
        format!(
            "Exported {} documents ({} bytes) to {} in {} ms",
            summary.documents_exported,
            summary.bytes_written,
            destination.display(),
            summary.elapsed_ms
        )
    }
}

fn import_summary_text(report: &ImportReport) -> String {
    let mut text = format!(
        "Inserted {} documents from {} lines",
        report.inserted, report.lines_read
    );
    if !report.errors.is_empty() {
        text.push_str(&format!(", {} lines rejected", report.errors.len()));
    }
    if report.cancelled {
        text.push_str(" (cancelled)");
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::MemoryCollection;
    use crate::transfer::LineError;
    use mongodb::bson::doc;
    use std::io::Write;

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(args).unwrap()
    }

    fn interface(args: &[&str]) -> CliInterface {
        let args = parse(args);
        let config = {
            let mut config = Config::default();
            CliInterface::apply_args_to_config(&mut config, &args);
            config
        };
        CliInterface { args, config }
    }

    #[test]
    fn test_browse_args_parsing() {
        let args = parse(&[
            "mongoview",
            "mongodb://db:27017/app",
            "browse",
            "people",
            "--criteria",
            r#"{"age": {"$gt": 30}}"#,
            "--page",
            "3",
            "--per-page",
            "50",
        ]);
        assert_eq!(args.uri.as_deref(), Some("mongodb://db:27017/app"));
        match args.command {
            Commands::Browse {
                collection,
                criteria,
                page,
                per_page,
                ..
            } => {
                assert_eq!(collection, "people");
                assert_eq!(criteria.as_deref(), Some(r#"{"age": {"$gt": 30}}"#));
                assert_eq!(page, 3);
                assert_eq!(per_page, Some(50));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_export_and_import_args_parsing() {
        let args = parse(&[
            "mongoview",
            "export",
            "people",
            "out.json",
            "--json-array",
            "--encoding",
            "UTF-16LE",
            "--canonical",
        ]);
        match args.command {
            Commands::Export {
                file,
                json_array,
                encoding,
                canonical,
                ..
            } => {
                assert_eq!(file, Some(PathBuf::from("out.json")));
                assert!(json_array && canonical);
                assert_eq!(encoding.as_deref(), Some("UTF-16LE"));
            }
            other => panic!("unexpected command {:?}", other),
        }

        let args = parse(&["mongoview", "import", "people", "in.jsonl", "--drop"]);
        assert!(matches!(args.command, Commands::Import { drop: true, .. }));
    }

    #[test]
    fn test_indexes_and_ping_args_parsing() {
        let args = parse(&[
            "mongoview",
            "indexes",
            "people",
            "--create",
            r#"{"age": 1}"#,
            "--unique",
            "--expire-after",
            "60",
        ]);
        match args.command {
            Commands::Indexes {
                collection,
                create,
                unique,
                expire_after,
                drop,
                ..
            } => {
                assert_eq!(collection, "people");
                assert_eq!(create.as_deref(), Some(r#"{"age": 1}"#));
                assert!(unique);
                assert_eq!(expire_after, Some(60));
                assert!(drop.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }

        let args = parse(&["mongoview", "indexes", "people", "--drop", "age_1"]);
        assert!(matches!(args.command, Commands::Indexes { drop: Some(_), .. }));

        assert!(
            CliArgs::try_parse_from([
                "mongoview", "indexes", "people", "--create", "{}", "--drop", "x"
            ])
            .is_err()
        );
        assert!(CliArgs::try_parse_from(["mongoview", "indexes", "people", "--unique"]).is_err());

        let args = parse(&["mongoview", "mongodb://db:27017", "ping"]);
        assert!(matches!(args.command, Commands::Ping));
    }

    #[tokio::test]
    async fn test_apply_index_action() {
        let coll = MemoryCollection::new("people");
        let created = apply_index_action(
            &coll,
            IndexAction::Create(IndexDefinition::new(doc! { "age": 1 }).unique(true)),
        )
        .await
        .unwrap();
        assert_eq!(created.len(), 2);
        assert_eq!(created[1].name, "age_1");

        let codec = DocumentCodec::default();
        assert_eq!(
            index_line(&codec, &created[1]).unwrap(),
            r#"age_1  {"age":1}  unique"#
        );

        let listed = apply_index_action(&coll, IndexAction::List).await.unwrap();
        assert_eq!(listed, created);

        let dropped = apply_index_action(&coll, IndexAction::Drop("age_1".into()))
            .await
            .unwrap();
        assert_eq!(dropped, vec![IndexInfo::id_index()]);
        assert!(
            apply_index_action(&coll, IndexAction::Drop("_id_".into()))
                .await
                .is_err()
        );
    }

    #[test]
    fn test_finish_session_keeps_command_outcome() {
        let disconnect_failed = || Err(MongoviewError::TaskFailed("shutdown".into()));

        let result = finish_session(Err(MongoviewError::Cancelled), disconnect_failed());
        assert!(matches!(result, Err(MongoviewError::Cancelled)));

        assert!(finish_session(Ok(()), disconnect_failed()).is_ok());
        assert!(matches!(
            finish_session(Err(MongoviewError::Cancelled), Ok(())),
            Err(MongoviewError::Cancelled)
        ));
    }

    #[test]
    fn test_command_is_required() {
        assert!(CliArgs::try_parse_from(["mongoview"]).is_err());
    }

    #[test]
    fn test_flags_override_config() {
        let cli = interface(&["mongoview", "--vv", "--no-color", "--timeout", "3", "config"]);
        assert_eq!(cli.config().logging.level, LogLevel::Trace);
        assert!(!cli.config().display.color_output);
        assert_eq!(cli.config().connection.timeout, 3);

        let cli = interface(&["mongoview", "-q", "config"]);
        assert_eq!(cli.config().logging.level, LogLevel::Error);
    }

    #[test]
    fn test_log_filter_sources() {
        let cli = interface(&["mongoview", "--vv", "config"]);
        assert_eq!(cli.log_filter(Some("error")).max_level_hint(), Some(LevelFilter::TRACE));

        let cli = interface(&["mongoview", "config"]);
        assert_eq!(
            cli.log_filter(Some("mongoview=debug")).max_level_hint(),
            Some(LevelFilter::DEBUG)
        );
        let configured = LevelFilter::from_level(cli.config().logging.level.to_tracing_level());
        assert_eq!(cli.log_filter(None).max_level_hint(), Some(configured));
    }

    #[test]
    fn test_connection_uri_priority() {
        let cli = interface(&["mongoview", "mongodb://other:27018", "config"]);
        assert_eq!(cli.connection_uri(), "mongodb://other:27018");

        let cli = interface(&["mongoview", "config"]);
        assert_eq!(cli.connection_uri(), Config::default().connection.default_uri);
    }

    #[test]
    fn test_invalid_config_falls_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[display]\nitems_per_page = 0").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let cli = CliInterface::from_args(parse(&["mongoview", "-c", &path, "config"])).unwrap();
        assert_eq!(
            cli.config().display.items_per_page,
            Config::default().display.items_per_page
        );
    }

    #[test]
    fn test_build_spec_from_arguments() {
        let cli = interface(&["mongoview", "config"]);
        let spec = cli
            .build_spec(Some(r#"{"a": 1}"#), Some("  "), None, Some(7))
            .unwrap();
        assert_eq!(spec.items_per_page(), 7);
        assert_eq!(spec.criteria(), Some(&doc! { "a": 1 }));
        assert!(spec.projection().is_none());

        let spec = cli.build_spec(None, None, None, None).unwrap();
        assert_eq!(
            u64::from(spec.items_per_page()),
            cli.config().display.items_per_page
        );

        assert!(matches!(
            cli.build_spec(Some("[1, 2]"), None, None, None),
            Err(MongoviewError::Parse(_))
        ));
        assert!(matches!(
            cli.build_spec(None, None, None, Some(0)),
            Err(MongoviewError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_init_writes_default_config_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let path_arg = path.to_str().unwrap().to_string();
        let cli = interface(&["mongoview", "-c", &path_arg, "config", "--init"]);

        cli.handle_config_command(false, false, true).unwrap();
        assert_eq!(Config::from_file(&path).unwrap(), Config::default());
        assert!(cli.init_config_file().is_err());
    }

    #[test]
    fn test_summary_texts() {
        let snapshot = PageSnapshot {
            page: 2,
            page_count: 3,
            total: 25,
            documents: Vec::new(),
        };
        assert_eq!(page_header(&snapshot), "page 2 of 3 (25 documents)");

        let summary = ExportSummary {
            documents_exported: 4,
            bytes_written: 120,
            elapsed_ms: 9,
            cancelled: false,
        };
        assert_eq!(
            export_summary_text(&summary, Path::new("out.jsonl")),
            "Exported 4 documents (120 bytes) to out.jsonl in 9 ms"
        );

        let report = ImportReport {
            inserted: 3,
            lines_read: 5,
            errors: vec![
                LineError {
                    line: 2,
                    message: "bad".into(),
                },
                LineError {
                    line: 4,
                    message: "bad".into(),
                },
            ],
            cancelled: true,
        };
        assert_eq!(
            import_summary_text(&report),
            "Inserted 3 documents from 5 lines, 2 lines rejected (cancelled)"
        );

        let status = HealthStatus {
            is_healthy: true,
            response_time_ms: 3,
            server_version: Some("7.0.12".into()),
        };
        assert_eq!(health_summary_text(&status), "Server 7.0.12 answered in 3 ms");
        let status = HealthStatus {
            is_healthy: false,
            response_time_ms: 30000,
            server_version: None,
        };
        assert_eq!(
            health_summary_text(&status),
            "Server did not answer within 30000 ms"
        );
    }
}
