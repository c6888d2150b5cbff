//! Security module
//!
//! - [`auth`]: registration, password hashing and credential checks

pub mod auth;

pub use auth::Authenticator;
