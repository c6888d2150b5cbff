//! REST API module for kv-rs
//!
//! Exposes registration, login and the per-user object operations over HTTP

pub mod auth;
pub mod handlers;
pub mod server;

pub use server::ApiServer;
