//! Commerce Connector CLI - migrations and maintenance tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! connector-cli migrate
//!
//! # Drain the promotion queues once
//! connector-cli queue run
//!
//! # Verify a store mapping against the commerce backend
//! connector-cli verify --store 3c8f0f52-8ad1-4bcb-9d5a-0f6b2f0d4e11
//!
//! # Register SKUs and customers from a YAML file
//! connector-cli seed config/seed.yaml
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "connector-cli")]
#[command(author, version, about = "Commerce connector CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Work the promotion queues
    Queue {
        #[command(subcommand)]
        action: QueueAction,
    },
    /// Verify a store mapping against the commerce backend
    Verify {
        /// Store UUID (`X-ACM-UUID`) to verify
        #[arg(short, long)]
        store: String,
    },
    /// Register SKUs and customers from a YAML file
    Seed {
        /// Path to the seed file
        file: String,
    },
}

#[derive(Subcommand)]
enum QueueAction {
    /// Claim and process one batch from each queue
    Run,
    /// Show items waiting in each queue
    Status,
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
        Commands::Queue { action } => match action {
            QueueAction::Run => commands::queue::run_once().await?,
            QueueAction::Status => commands::queue::status().await?,
        },
        Commands::Verify { store } => commands::verify::run(&store).await?,
        Commands::Seed { file } => commands::seed::run(&file).await?,
    }
    Ok(())
}
