//! Order desk CLI - migrations, seeding and a terminal stream client.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! od-cli migrate
//!
//! # Seed the catalog with the built-in demo items
//! od-cli seed catalog
//!
//! # Seed the catalog from a YAML file
//! od-cli seed catalog --file catalog.yaml
//!
//! # Follow the live order stream
//! od-cli watch --url https://orders.example.com --cookie "orderdesk_session=..."
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `seed catalog` - Insert catalog items into a development database
//! - `watch` - Print live order events, reconnecting on failure

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "od-cli")]
#[command(author, version, about = "Order desk CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Seed the database with development data
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
    /// Follow the live order stream
    Watch {
        /// Base URL of the order desk server
        #[arg(short, long, default_value = "http://127.0.0.1:3002")]
        url: String,

        /// Session cookie (`name=value`) of a logged-in staff member
        #[arg(short, long, env = "ORDERDESK_COOKIE")]
        cookie: String,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Insert catalog items
    Catalog {
        /// YAML file with `name`, `price` and optional `is_available` entries
        #[arg(short, long)]
        file: Option<String>,

        /// Insert even if the catalog already has items
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Seed { target } => match target {
            SeedTarget::Catalog { file, force } => {
                commands::seed::catalog(file.as_deref(), force).await?;
            }
        },
        Commands::Watch { url, cookie } => commands::watch::run(&url, &cookie).await?,
    }
    Ok(())
}
