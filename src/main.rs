//! mongoview - browse, export and import MongoDB collections
//!
//! # Usage
//!
//! ```bash
//! # Second page of matching documents, 50 per page
//! mongoview mongodb://localhost:27017/shop browse orders --criteria '{"status": "open"}' --page 2 --per-page 50
//!
//! # Export to JSON Lines, then load the file elsewhere
//! mongoview mongodb://localhost:27017/shop export orders orders.jsonl
//! mongoview mongodb://backup:27017/shop import orders orders.jsonl --drop
//! ```

use tracing_subscriber::EnvFilter;

use mongoview::Result;
use mongoview::cli::CliInterface;

/// Application entry point
#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Parse arguments, load configuration, initialize logging and run the command
async fn run() -> Result<()> {
    let cli = CliInterface::new()?;
    initialize_logging(&cli);
    cli.run().await
}

fn initialize_logging(cli: &CliInterface) {
    let env_directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(cli.log_filter(env_directives.as_deref()))
        .with_target(false)
        .with_writer(std::io::stderr);

    if cli.config().logging.timestamps {
        subscriber.init();
    } else {
        subscriber.without_time().init();
    }
}
