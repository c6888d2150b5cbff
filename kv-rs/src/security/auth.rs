//! User registration and credential checks
//!
//! # Security
//! - Passwords hashed with Argon2 before storage
//! - Unknown users and wrong passwords produce the same error
//!
//! # Usage
//! ```no_run
//! use kv_rs::security::Authenticator;
//! use kv_rs::store::KvStore;
//! use std::sync::Arc;
//!
//! # async fn example(store: Arc<dyn KvStore>) -> Result<(), Box<dyn std::error::Error>> {
//! let auth = Authenticator::new(store, 1024 * 1024 * 1024);
//!
//! auth.register("alice", "password123", None).await?;
//! let user = auth.authenticate("alice", "password123").await?;
//! # Ok(())
//! # }
//! ```

use crate::error::{Result, StoreError};
use crate::store::{KvStore, NewUser, User};
use crate::validation;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

const INVALID_CREDENTIALS: &str = "invalid username/password";

#[derive(Clone)]
pub struct Authenticator {
    store: Arc<dyn KvStore>,
    default_capacity: i64,
}

impl Authenticator {
    pub fn new(store: Arc<dyn KvStore>, default_capacity: i64) -> Self {
        Self {
            store,
            default_capacity,
        }
    }

    /// Register a user with its quota. A missing or zero capacity gets the
    /// configured default.
    pub async fn register(
        &self,
        name: &str,
        password: &str,
        provisioned_capacity: Option<i64>,
    ) -> Result<User> {
        validation::validate_credentials(name, password)?;

        let provisioned_capacity = match provisioned_capacity {
            None | Some(0) => self.default_capacity,
            Some(capacity) if capacity < 0 => {
                return Err(StoreError::InvalidInput(
                    "provisioned capacity cannot be negative".to_string(),
                ))
            }
            Some(capacity) => capacity,
        };

        info!("Registering user: {}", name);

        let user = NewUser {
            name: name.to_string(),
            password_hash: Self::hash_password(password)?,
            provisioned_capacity,
        };

        self.store.create_user(user).await
    }

    /// Check credentials and return the matching user
    pub async fn authenticate(&self, name: &str, password: &str) -> Result<User> {
        validation::validate_credentials(name, password)?;
        debug!("Authentication attempt for {}", name);

        let user = match self.store.get_user(name).await {
            Ok(user) => user,
            Err(StoreError::NotFound(_)) => {
                warn!("Authentication failed: user not found: {}", name);
                return Err(StoreError::Unauthorized(INVALID_CREDENTIALS.to_string()));
            }
            Err(e) => return Err(e),
        };

        if !Self::verify_password(password, &user.password) {
            warn!("Authentication failed: invalid password for {}", name);
            return Err(StoreError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        }

        info!("Authentication successful for {}", name);
        Ok(user)
    }

    /// Hash password with Argon2
    pub fn hash_password(password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);

        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| StoreError::Internal(format!("Failed to hash password: {}", e)))?;

        Ok(password_hash.to_string())
    }

    pub fn verify_password(password: &str, stored_hash: &str) -> bool {
        let Ok(parsed_hash) = PasswordHash::new(stored_hash) else {
            return false;
        };

        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    }
}
