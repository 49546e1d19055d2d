//! InsightShop CLI - Database migrations and maintenance tasks.
//!
//! # Usage
//!
//! ```bash
//! # Apply database migrations
//! is-cli migrate
//!
//! # Grant or revoke admin access
//! is-cli admin promote ops@example.com
//! is-cli admin demote ops@example.com
//!
//! # Run holiday sale automation (for cron)
//! is-cli sales run
//!
//! # Re-embed products whose text changed
//! is-cli index products
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "is-cli")]
#[command(author, version, about = "InsightShop CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Manage admin users
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
    /// Sale maintenance
    Sales {
        #[command(subcommand)]
        action: SalesAction,
    },
    /// Vector index maintenance
    Index {
        #[command(subcommand)]
        target: IndexTarget,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Give an existing user admin access
    Promote {
        /// Account email address
        email: String,
    },
    /// Remove admin access from a user
    Demote {
        /// Account email address
        email: String,
    },
}

#[derive(Subcommand)]
enum SalesAction {
    /// Create upcoming holiday sales and sync active flags with today's date
    Run,
}

#[derive(Subcommand)]
enum IndexTarget {
    /// Embed active products whose text changed since the last run
    Products,
}

#[tokio::main]
async fn main() {
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
        Commands::Admin { action } => match action {
            AdminAction::Promote { email } => {
                commands::admin::set_admin(&email, true).await?;
            }
            AdminAction::Demote { email } => {
                commands::admin::set_admin(&email, false).await?;
            }
        },
        Commands::Sales {
            action: SalesAction::Run,
        } => commands::maintenance::run_sales().await?,
        Commands::Index {
            target: IndexTarget::Products,
        } => commands::maintenance::index_products().await?,
    }
    Ok(())
}
