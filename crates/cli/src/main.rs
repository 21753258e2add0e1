//! Marvo Store CLI - database migrations and shop management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! marvo-cli migrate
//!
//! # Grant or revoke the admin flag on an existing account
//! marvo-cli admin grant -e owner@example.com
//! marvo-cli admin revoke -e owner@example.com
//!
//! # Load the starter catalog (or your own file) into an empty database
//! marvo-cli seed
//! marvo-cli seed my-catalog.yaml
//! ```
//!
//! # Environment Variables
//!
//! - `MARVO_DATABASE_URL` (or `DATABASE_URL`) - `SQLite` URL, same as the
//!   storefront server

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "marvo-cli")]
#[command(author, version, about = "Marvo Store CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage admin accounts
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
    /// Seed an empty catalog from a YAML file
    Seed {
        /// Path to the catalog YAML file (defaults to the bundled starter catalog)
        file: Option<String>,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Give an existing account access to the admin panel
    Grant {
        /// Account email address
        #[arg(short, long)]
        email: String,
    },
    /// Remove admin panel access from an account
    Revoke {
        /// Account email address
        #[arg(short, long)]
        email: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Admin { action } => match action {
            AdminAction::Grant { email } => commands::admin::set_admin(&email, true).await?,
            AdminAction::Revoke { email } => commands::admin::set_admin(&email, false).await?,
        },
        Commands::Seed { file } => {
            commands::seed::catalog(file.as_deref()).await?;
        }
    }
    Ok(())
}
