//! Switchyard CLI: the main entry point.
//!
//! Commands:
//! - `readme`         Ask the dev team for a README and print the draft
//! - `subscriptions`  Show which agent types listen on which topics
//! - `config`         Show, validate or locate the configuration
//! - `memory`         Add or search knowledge passages

use clap::{Parser, Subcommand};
use switchyard_config::{AppConfig, ConfigError, LoggingConfig};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;

mod commands;

use commands::setup;

#[derive(Parser)]
#[command(
    name = "switchyard",
    about = "Switchyard: event-driven agent messaging runtime",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Request a README from the product manager
    Readme {
        /// What the app should do
        #[arg(short, long)]
        ask: String,

        #[arg(long, default_value = "local")]
        org: String,

        #[arg(long, default_value = "app")]
        repo: String,

        #[arg(long, default_value_t = 1)]
        issue: i64,

        /// Ask point-to-point and wait for the correlated response
        /// instead of publishing on the topic
        #[arg(long)]
        direct: bool,

        /// Close the README chain afterwards and print the final README
        #[arg(long)]
        close: bool,
    },

    /// List topic subscriptions and handled event types
    Subscriptions,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Knowledge store management
    Memory {
        #[command(subcommand)]
        action: MemoryAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration (secrets redacted)
    Show,
    /// Validate the configuration file and environment
    Validate,
    /// Print the config file path
    Path,
    /// Print a default config file
    Init,
}

#[derive(Subcommand)]
enum MemoryAction {
    /// Store a passage in a collection
    Add {
        #[arg(short, long, default_value = "waf")]
        collection: String,

        /// Passage text
        text: String,

        /// Where the passage came from
        #[arg(short, long)]
        source: Option<String>,
    },

    /// Search a collection
    Search {
        #[arg(short, long, default_value = "waf")]
        collection: String,

        query: String,

        #[arg(short, long, default_value_t = 5)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let loaded = load_config(cli.verbose, std::io::stderr, AppConfig::load);
    let logging = loaded
        .as_ref()
        .map(|c| c.logging.clone())
        .unwrap_or_default();
    init_tracing(cli.verbose, &logging);

    match cli.command {
        Commands::Readme {
            ask,
            org,
            repo,
            issue,
            direct,
            close,
        } => {
            let request = commands::readme::ReadmeArgs {
                ask,
                org,
                repo,
                issue,
                direct,
                close,
            };
            commands::readme::run(&setup::require(loaded)?, request).await?
        }
        Commands::Subscriptions => commands::subscriptions::run(&setup::require(loaded)?).await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show(setup::require(loaded)?).await?,
            ConfigAction::Validate => commands::config_cmd::validate(loaded).await?,
            ConfigAction::Path => commands::config_cmd::path().await?,
            ConfigAction::Init => commands::config_cmd::init().await?,
        },
        Commands::Memory { action } => match action {
            MemoryAction::Add {
                collection,
                text,
                source,
            } => {
                commands::memory::add(&setup::require(loaded)?, &collection, &text, source).await?
            }
            MemoryAction::Search {
                collection,
                query,
                limit,
            } => {
                commands::memory::search(&setup::require(loaded)?, &collection, &query, limit).await?
            }
        },
    }

    Ok(())
}

/// Run `load` once under a bootstrap subscriber writing to `writer`. The
/// configured subscriber depends on the result, so it cannot be installed
/// yet.
fn load_config<W>(
    verbose: bool,
    writer: W,
    load: impl FnOnce() -> Result<AppConfig, ConfigError>,
) -> Result<AppConfig, ConfigError>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let bootstrap = tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbose, "info"))
        .with_target(false)
        .with_ansi(false)
        .with_writer(writer)
        .finish();
    tracing::subscriber::with_default(bootstrap, load)
}

/// `RUST_LOG` wins; otherwise `level`, or `debug` with `--verbose`.
fn env_filter(verbose: bool, level: &str) -> EnvFilter {
    let default_level = if verbose { "debug" } else { level };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// JSON output is switched on by `logging.json` in the config file.
fn init_tracing(verbose: bool, logging: &LoggingConfig) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbose, &logging.level))
        .with_target(false)
        .with_writer(std::io::stderr);

    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}
