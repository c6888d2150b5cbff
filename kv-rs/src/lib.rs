//! kv-rs: multi-tenant key-value store with per-user quotas
//!
//! Every user owns a byte quota. Writes are accounted against it inside the
//! same transaction that stores the data, so concurrent writers can never
//! push a user past the provisioned capacity.
//!
//! # Features
//!
//! - **Objects**: JSON values under short keys, with optional expiry
//! - **Quotas**: net-growth accounting for overwrites, batch all-or-nothing
//! - **Storage**: SQLite through sqlx, one transaction per write
//! - **API**: axum REST server with JWT authentication
//!
//! # Example
//!
//! ```no_run
//! use kv_rs::api::ApiServer;
//! use kv_rs::config::Config;
//! use kv_rs::store::SqliteStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let store = SqliteStore::connect(&config.storage, config.limits).await?;
//!
//!     let server = ApiServer::new(Arc::new(store), &config);
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration management
//! - [`error`]: Error types and handling
//! - [`store`]: Persistence, quota accounting and expiry
//! - [`security`]: Registration and password checks
//! - [`api`]: HTTP surface

pub mod api;
pub mod codec;
pub mod config;
pub mod error;
pub mod security;
pub mod store;
pub mod validation;

// Re-export commonly used types
pub use config::Config;
pub use error::{Result, StoreError};
