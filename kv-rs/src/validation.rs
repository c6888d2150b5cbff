//! Request validation
//!
//! Checks applied to caller input before anything reaches storage.

use crate::error::{Result, StoreError};
use crate::store::types::{Object, StoreLimits, TTL_HORIZON};

/// Current Unix time in seconds
pub fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

pub fn validate_key(key: &str, max_len: usize) -> Result<()> {
    if key.is_empty() {
        return Err(StoreError::InvalidInput("key cannot be empty".to_string()));
    }
    if key.chars().count() > max_len {
        return Err(StoreError::InvalidInput(format!(
            "key size exceeded, must be within {} characters",
            max_len
        )));
    }
    Ok(())
}

/// `0` means "never expires"; anything else must lie in `[now, TTL_HORIZON]`.
pub fn validate_ttl(ttl: i64, now: i64) -> Result<()> {
    if ttl == 0 {
        return Ok(());
    }
    if ttl < now || ttl > TTL_HORIZON {
        return Err(StoreError::InvalidInput("invalid ttl".to_string()));
    }
    Ok(())
}

pub fn validate_object(object: &Object, limits: &StoreLimits, now: i64) -> Result<()> {
    validate_ttl(object.ttl, now)?;
    validate_key(&object.key, limits.max_key_length)
}

pub fn validate_credentials(name: &str, password: &str) -> Result<()> {
    if name.is_empty() || password.is_empty() {
        return Err(StoreError::InvalidInput(
            "username and password cannot be empty".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const NOW: i64 = 1_700_000_000;

    #[test]
    fn test_validate_key() {
        assert!(validate_key("a", 32).is_ok());
        assert!(validate_key(&"k".repeat(32), 32).is_ok());
        assert!(validate_key(&"k".repeat(33), 32).is_err());
        assert!(validate_key("", 32).is_err());
    }

    #[test]
    fn test_validate_key_counts_characters() {
        // 32 multi-byte characters are still 32 characters
        let key = "é".repeat(32);
        assert!(key.len() > 32);
        assert!(validate_key(&key, 32).is_ok());
    }

    #[test]
    fn test_validate_ttl() {
        assert!(validate_ttl(0, NOW).is_ok());
        assert!(validate_ttl(NOW, NOW).is_ok());
        assert!(validate_ttl(NOW + 60, NOW).is_ok());
        assert!(validate_ttl(TTL_HORIZON, NOW).is_ok());

        assert!(validate_ttl(NOW - 1, NOW).is_err());
        assert!(validate_ttl(-5, NOW).is_err());
        assert!(validate_ttl(TTL_HORIZON + 1, NOW).is_err());
    }

    #[test]
    fn test_validate_object_reports_ttl_first() {
        let obj = Object::new("k".repeat(40), json!(1), NOW - 10);
        match validate_object(&obj, &StoreLimits::default(), NOW) {
            Err(StoreError::InvalidInput(msg)) => assert_eq!(msg, "invalid ttl"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_validate_credentials() {
        assert!(validate_credentials("alice", "pw").is_ok());
        assert!(validate_credentials("", "pw").is_err());
        assert!(validate_credentials("alice", "").is_err());
    }
}
