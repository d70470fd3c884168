//! CLI binary entry point for mood-dash-etl

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
#[cfg(feature = "cli")]
use mood_dash_etl::cli::commands::{
    extract::{ExtractArgs, handle_extract},
    query::{QueryArgs, handle_query},
    run::{RunArgs, handle_run},
    status::{StatusArgs, handle_status},
};
#[cfg(feature = "cli")]
use mood_dash_etl::config::{CONFIG_FILENAME, sample_config};
#[cfg(feature = "cli")]
use std::path::PathBuf;
#[cfg(feature = "cli")]
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "mood-dash-etl")]
#[command(about = "Load Daylio backups and Fitbit sleep logs into DuckDB")]
#[command(version)]
struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, default_value = CONFIG_FILENAME)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum Commands {
    /// Extract the newest backup (if new), clean it and load the database
    Run {
        /// Extract even if the backup was already processed
        #[arg(short, long)]
        force: bool,
    },
    /// Extract the newest backup without loading it
    Extract {
        /// Extract even if the backup was already processed
        #[arg(short, long)]
        force: bool,
    },
    /// Show backup, marker and database state
    Status,
    /// Execute SQL queries against the mood database
    Query {
        /// SQL query to execute
        sql: String,
        /// Output format (table, json, csv)
        #[arg(short, long, default_value = "table")]
        format: String,
    },
    /// Print a sample configuration file
    SampleConfig,
}

#[cfg(feature = "cli")]
fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mood_dash_etl=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run { force } => handle_run(&RunArgs {
            config: cli.config,
            force,
        }),
        Commands::Extract { force } => handle_extract(&ExtractArgs {
            config: cli.config,
            force,
        }),
        Commands::Status => handle_status(&StatusArgs { config: cli.config }),
        Commands::Query { sql, format } => handle_query(&QueryArgs {
            sql,
            config: cli.config,
            format,
        }),
        Commands::SampleConfig => {
            print!("{}", sample_config());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature is not enabled. Build with --features cli");
    std::process::exit(1);
}
