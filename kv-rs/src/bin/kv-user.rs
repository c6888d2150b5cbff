//! CLI tool for managing store users
//!
//! # Usage
//!
//! ```bash
//! # Add a new user with the default capacity
//! kv-user --db sqlite://kv.db add alice password123
//!
//! # Add a user with a 10 MiB quota
//! kv-user --db sqlite://kv.db add bob password123 --capacity 10485760
//!
//! # Show quota usage
//! kv-user --db sqlite://kv.db quota alice
//!
//! # Check if user exists
//! kv-user --db sqlite://kv.db exists alice
//! ```

use clap::{Parser, Subcommand};
use kv_rs::config::StorageConfig;
use kv_rs::security::Authenticator;
use kv_rs::store::{KvStore, SqliteStore, StoreLimits};
use kv_rs::StoreError;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "kv-user")]
#[command(about = "Manage key-value store users", long_about = None)]
struct Cli {
    /// Database URL (e.g., sqlite://kv.db)
    #[arg(short, long, default_value = "sqlite://kv.db")]
    db: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a new user
    Add {
        name: String,
        password: String,
        /// Provisioned capacity in bytes
        #[arg(long)]
        capacity: Option<i64>,
    },
    /// Show quota usage for a user
    Quota { name: String },
    /// Check if user exists
    Exists { name: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let storage = StorageConfig {
        database_url: cli.db.clone(),
        max_connections: 1,
        busy_timeout_secs: 5,
    };
    let limits = StoreLimits::default();
    let store = Arc::new(SqliteStore::connect(&storage, limits).await?);

    match cli.command {
        Commands::Add {
            name,
            password,
            capacity,
        } => {
            let auth = Authenticator::new(store.clone(), limits.default_provisioned_capacity);
            match auth.register(&name, &password, capacity).await {
                Ok(user) => println!(
                    "✓ User {} added with {} bytes of capacity",
                    user.name, user.provisioned_capacity
                ),
                Err(StoreError::Conflict(_)) => {
                    eprintln!("Error: User {} already exists", name);
                    std::process::exit(1);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Commands::Quota { name } => {
            let user = store.get_user(&name).await?;
            let quota = store.get_quota(user.id).await?;
            println!("{:<15} {:<15} {:<15} {:<8}", "Provisioned", "Utilised", "Remaining", "Used");
            println!("{:-<55}", "");
            println!(
                "{:<15} {:<15} {:<15} {:.1}%",
                quota.provisioned,
                quota.utilised,
                quota.remaining(),
                quota.usage_percent()
            );
        }
        Commands::Exists { name } => match store.get_user(&name).await {
            Ok(_) => println!("✓ User {} exists", name),
            Err(StoreError::NotFound(_)) => {
                println!("✗ User {} does not exist", name);
                std::process::exit(1);
            }
            Err(e) => return Err(e.into()),
        },
    }

    store.close().await;
    Ok(())
}
