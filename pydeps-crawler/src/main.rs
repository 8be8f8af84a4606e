//! `pydeps` command-line entry point: crawl the index, serve the listing,
//! or query the local snapshot.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use pydeps_crawler::{
    run_server, Config, IndexClient, PackageStore, Pipeline, QueryFacade, SqliteStore,
    TracingObserver,
};

#[derive(Parser)]
#[command(name = "pydeps")]
#[command(about = "Crawl PyPI and browse which packages depend on what")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON configuration file; defaults apply when it does not exist
    #[arg(long, default_value = "pydeps.json", global = true)]
    config: PathBuf,

    /// SQLite database path, overriding the configuration
    #[arg(long, global = true)]
    database: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one incremental crawl of the package index
    Crawl {
        /// Index base URL, e.g. https://pypi.org
        #[arg(long)]
        index_url: Option<String>,

        /// Maximum concurrent metadata requests
        #[arg(long)]
        concurrency: Option<usize>,

        /// Stop starting new fetches after this many seconds
        #[arg(long)]
        deadline_secs: Option<u64>,
    },

    /// Serve the dependency listing over HTTP
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(long)]
        port: Option<u16>,
    },

    /// Print one page of stored packages as JSON
    Query {
        #[arg(long, default_value_t = 10)]
        limit: i64,

        #[arg(long, default_value_t = 0)]
        offset: i64,

        /// Only packages that depend on this name
        #[arg(long)]
        depends_on: Option<String>,
    },

    /// Show stored package count and crawl bookkeeping
    Status,
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load_or_default(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    if let Some(database) = &cli.database {
        config.storage.database_path = database.clone();
    }
    Ok(config)
}

fn open_store(config: &Config) -> Result<Arc<SqliteStore>> {
    let path = &config.storage.database_path;
    let store = SqliteStore::open(path)
        .with_context(|| format!("Failed to open database {}", path.display()))?;
    Ok(Arc::new(store))
}

#[tokio::main]
async fn main() -> Result<()> {
    let _log_guard = pydeps_logging::init_subscriber();

    let cli = Cli::parse();
    let mut config = load_config(&cli)?;

    match cli.command {
        Commands::Crawl {
            index_url,
            concurrency,
            deadline_secs,
        } => {
            if let Some(url) = index_url {
                config.index.base_url = url;
            }
            if let Some(concurrency) = concurrency {
                config.crawl.concurrency = concurrency;
            }
            if deadline_secs.is_some() {
                config.crawl.deadline_secs = deadline_secs;
            }
            config.validate()?;

            let observer = Arc::new(TracingObserver);
            let index = Arc::new(IndexClient::new(&config.index)?.with_observer(observer.clone()));
            let store = open_store(&config)?;
            info!(
                index = %config.index.base_url,
                database = %config.storage.database_path.display(),
                "Crawling"
            );

            let report = Pipeline::from_config(&config.crawl, index, store)
                .with_observer(observer)
                .run()
                .await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            config.validate()?;

            let store = open_store(&config)?;
            run_server(config, store).await?;
        }
        Commands::Query {
            limit,
            offset,
            depends_on,
        } => {
            let store = open_store(&config)?;
            store.init_schema()?;
            let page = QueryFacade::new(store).page(limit, offset, depends_on.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&page)?);
        }
        Commands::Status => {
            let store = open_store(&config)?;
            store.init_schema()?;
            let status = QueryFacade::new(store).status()?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }

    Ok(())
}
