//! Suppression Store: per-endpoint "ignore until" timestamps.
//!
//! Shared by the reconciler (to keep flapping endpoints out of the known set)
//! and by delivery tasks (to skip candidates that recently failed a probe).
//! Expired entries are deleted lazily the next time they are looked at, so
//! correctness never depends on [`SuppressionStore::clear_expired`] running.

use std::time::Duration;

use dashmap::DashMap;
use liaison_protocols::EndpointRef;
use tokio::time::Instant;
use tracing::{debug, trace};

/// Concurrent map of endpoint name to suppression expiry.
#[derive(Debug, Default)]
pub struct SuppressionStore {
    entries: DashMap<String, Instant>,
}

impl SuppressionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `endpoint` is suppressed at `now`.
    ///
    /// An entry whose expiry has passed is removed.
    pub fn is_suppressed(&self, endpoint: &EndpointRef, now: Instant) -> bool {
        // Copy the expiry out so no shard guard is held during removal.
        let until = match self.entries.get(endpoint.name()) {
            Some(entry) => *entry.value(),
            None => return false,
        };
        if now < until {
            return true;
        }
        self.entries
            .remove_if(endpoint.name(), |_, until| now >= *until);
        trace!(endpoint = %endpoint, "Suppression expired");
        false
    }

    /// Suppress `endpoint` until `now + ttl`.
    ///
    /// Overwrites any earlier expiry; repeated calls never accumulate.
    pub fn suppress(&self, endpoint: &EndpointRef, now: Instant, ttl: Duration) {
        debug!(endpoint = %endpoint, ttl_ms = ttl.as_millis() as u64, "Suppressing endpoint");
        self.entries.insert(endpoint.name().to_string(), now + ttl);
    }

    /// [`is_suppressed`](Self::is_suppressed) at the current instant.
    pub fn is_suppressed_now(&self, endpoint: &EndpointRef) -> bool {
        self.is_suppressed(endpoint, Instant::now())
    }

    /// [`suppress`](Self::suppress) from the current instant.
    pub fn suppress_now(&self, endpoint: &EndpointRef, ttl: Duration) {
        self.suppress(endpoint, Instant::now(), ttl);
    }

    /// Expiry of an active suppression, if any.
    pub fn suppressed_until(&self, endpoint: &EndpointRef) -> Option<Instant> {
        self.entries.get(endpoint.name()).map(|e| *e.value())
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn clear_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, until| now < *until);
        before.saturating_sub(self.entries.len())
    }

    /// Number of entries, expired or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ep(name: &str) -> EndpointRef {
        EndpointRef::new(name, "local")
    }

    #[test]
    fn suppression_holds_until_expiry() {
        let store = SuppressionStore::new();
        let now = Instant::now();
        let ttl = Duration::from_millis(60_000);
        store.suppress(&ep("parser@mesh"), now, ttl);

        assert!(store.is_suppressed(&ep("parser@mesh"), now + ttl - Duration::from_millis(1)));
        assert!(!store.is_suppressed(&ep("parser@mesh"), now + ttl + Duration::from_millis(1)));
    }

    #[test]
    fn expired_entry_is_lazily_deleted() {
        let store = SuppressionStore::new();
        let now = Instant::now();
        store.suppress(&ep("a"), now, Duration::from_secs(1));
        assert_eq!(store.len(), 1);

        assert!(!store.is_suppressed(&ep("a"), now + Duration::from_secs(2)));
        assert!(store.is_empty());
    }

    #[test]
    fn later_suppress_overwrites_instead_of_extending() {
        let store = SuppressionStore::new();
        let now = Instant::now();
        store.suppress(&ep("a"), now, Duration::from_secs(60));
        store.suppress(&ep("a"), now, Duration::from_secs(5));

        assert_eq!(store.suppressed_until(&ep("a")), Some(now + Duration::from_secs(5)));
        assert!(!store.is_suppressed(&ep("a"), now + Duration::from_secs(6)));
    }

    #[test]
    fn unknown_endpoint_is_not_suppressed() {
        let store = SuppressionStore::new();
        assert!(!store.is_suppressed(&ep("nobody"), Instant::now()));
    }

    #[tokio::test(start_paused = true)]
    async fn clear_expired_keeps_active_entries() {
        let store = SuppressionStore::new();
        store.suppress_now(&ep("short"), Duration::from_secs(1));
        store.suppress_now(&ep("long"), Duration::from_secs(60));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(store.clear_expired(), 1);
        assert!(store.is_suppressed_now(&ep("long")));
        assert!(!store.is_suppressed_now(&ep("short")));
    }

    #[tokio::test]
    async fn concurrent_writers_do_not_corrupt() {
        let store = std::sync::Arc::new(SuppressionStore::new());
        let mut tasks = Vec::new();
        for i in 0..16 {
            let store = std::sync::Arc::clone(&store);
            tasks.push(tokio::spawn(async move {
                for j in 0..50 {
                    let e = ep(&format!("agent-{}@mesh", (i + j) % 8));
                    store.suppress_now(&e, Duration::from_secs(60));
                    let _ = store.is_suppressed_now(&e);
                }
            }));
        }
        for t in tasks {
            t.await.unwrap();
        }
        assert_eq!(store.len(), 8);
    }
}
