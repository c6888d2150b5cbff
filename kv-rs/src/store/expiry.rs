//! Expiry gate
//!
//! Expiry is only enforced on read. A stale entry is reported as absent and
//! a detached task removes it. The task deletes the row only if it is still
//! expired when the task runs, but it is not ordered with respect to other
//! writers to the same key.

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::store::sqlite::SqliteStore;

/// `ttl == 0` never expires; otherwise an entry is live up to and including
/// its `ttl` second.
pub fn is_expired(ttl: i64, now: i64) -> bool {
    ttl != 0 && ttl < now
}

/// Fire-and-forget removal of an expired entry. Failures are logged and
/// never reach the reader that triggered them.
pub fn dispatch_purge(store: SqliteStore, user_id: i64, key: String, now: i64) -> JoinHandle<()> {
    tokio::spawn(async move {
        match store.purge_expired(user_id, &key, now).await {
            Ok(true) => debug!("Purged expired object {} for user {}", key, user_id),
            Ok(false) => debug!(
                "Expired object {} for user {} already removed or refreshed",
                key, user_id
            ),
            Err(e) => warn!(
                "Lazy delete of expired object {} for user {} failed: {}",
                key, user_id, e
            ),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_ttl_never_expires() {
        assert!(!is_expired(0, i64::MAX));
    }

    #[test]
    fn test_expiry_boundary() {
        assert!(!is_expired(100, 99));
        assert!(!is_expired(100, 100));
        assert!(is_expired(100, 101));
    }
}
