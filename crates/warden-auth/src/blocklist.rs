//! Revoked token ids
//!
//! The blocklist stores token ids (never tokens) until the longest window in
//! which the token could still be presented has passed. After that the
//! signature check or refresh horizon rejects it anyway, so the entry can go.

use std::fmt::Debug;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::error::{AuthError, AuthResult};

/// Store of revoked token ids
///
/// Implementations backed by an external cache report outages as
/// [`crate::AuthError::Blocklist`]; callers treat that as a denial.
#[async_trait]
pub trait Blocklist: Send + Sync + Debug {
    /// Whether `token_id` is currently blocked
    async fn contains(&self, token_id: &str) -> AuthResult<bool>;

    /// Block `token_id` for `ttl` unless it is already blocked
    ///
    /// Returns `true` if this call inserted the entry. For any one token id
    /// at most one concurrent caller sees `true`.
    async fn insert_if_absent(&self, token_id: &str, ttl: Duration) -> AuthResult<bool>;

    /// Drop entries whose TTL has passed; returns how many were removed
    async fn purge_expired(&self) -> AuthResult<usize>;
}

/// In-process blocklist
#[derive(Debug)]
pub struct MemoryBlocklist {
    entries: DashMap<String, SystemTime>,
    clock: Arc<dyn Clock>,
}

impl MemoryBlocklist {
    /// Blocklist on the system clock
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Blocklist evaluating expiry against `clock`
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    /// Number of stored entries, including ones not yet purged
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entries are stored
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Purge expired entries every `interval` on the current tokio runtime
    ///
    /// The task holds only a weak reference and ends once the blocklist is
    /// dropped.
    pub fn spawn_purge_task(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(blocklist) = weak.upgrade() else {
                    break;
                };
                let removed = blocklist.purge_now();
                if removed > 0 {
                    debug!(removed, remaining = blocklist.len(), "Purged blocklist");
                }
            }
        })
    }

    fn purge_now(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, expires_at| *expires_at > now);
        before.saturating_sub(self.entries.len())
    }
}

impl Default for MemoryBlocklist {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Blocklist for MemoryBlocklist {
    async fn contains(&self, token_id: &str) -> AuthResult<bool> {
        let now = self.clock.now();
        Ok(self
            .entries
            .get(token_id)
            .is_some_and(|expires_at| *expires_at > now))
    }

    async fn insert_if_absent(&self, token_id: &str, ttl: Duration) -> AuthResult<bool> {
        let now = self.clock.now();
        let expires_at = now.checked_add(ttl).ok_or_else(|| {
            AuthError::Configuration(format!(
                "blocklist ttl of {}s overflows the clock",
                ttl.as_secs()
            ))
        })?;

        // The entry guard holds the shard lock, so check and insert are one step
        match self.entries.entry(token_id.to_string()) {
            Entry::Occupied(mut occupied) => {
                if *occupied.get() > now {
                    Ok(false)
                } else {
                    occupied.insert(expires_at);
                    Ok(true)
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(expires_at);
                Ok(true)
            }
        }
    }

    async fn purge_expired(&self) -> AuthResult<usize> {
        Ok(self.purge_now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn blocklist() -> (MemoryBlocklist, ManualClock) {
        let clock = ManualClock::at_unix(1_000);
        (MemoryBlocklist::with_clock(Arc::new(clock.clone())), clock)
    }

    #[tokio::test]
    async fn test_insert_is_idempotent() {
        let (list, _) = blocklist();
        assert!(list.insert_if_absent("a", Duration::from_secs(60)).await.unwrap());
        assert!(!list.insert_if_absent("a", Duration::from_secs(60)).await.unwrap());
        assert!(list.contains("a").await.unwrap());
        assert!(!list.contains("b").await.unwrap());
    }

    #[tokio::test]
    async fn test_overflowing_ttl_is_configuration_error() {
        let (list, _) = blocklist();
        let err = list.insert_if_absent("a", Duration::MAX).await.unwrap_err();
        assert!(matches!(err, AuthError::Configuration(_)));
        assert!(list.is_empty());
    }

    #[tokio::test]
    async fn test_expired_entries_are_absent_and_replaceable() {
        let (list, clock) = blocklist();
        list.insert_if_absent("a", Duration::from_secs(60)).await.unwrap();

        clock.advance(Duration::from_secs(60));
        assert!(!list.contains("a").await.unwrap());
        assert!(list.insert_if_absent("a", Duration::from_secs(60)).await.unwrap());
    }

    #[tokio::test]
    async fn test_purge_removes_only_expired() {
        let (list, clock) = blocklist();
        list.insert_if_absent("short", Duration::from_secs(10)).await.unwrap();
        list.insert_if_absent("long", Duration::from_secs(100)).await.unwrap();

        clock.advance(Duration::from_secs(50));
        assert_eq!(list.purge_expired().await.unwrap(), 1);
        assert_eq!(list.len(), 1);
        assert!(list.contains("long").await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_inserts_have_one_winner() {
        let list = Arc::new(MemoryBlocklist::new());
        let mut handles = Vec::new();
        for _ in 0..32 {
            let list = Arc::clone(&list);
            handles.push(tokio::spawn(async move {
                list.insert_if_absent("same", Duration::from_secs(60))
                    .await
                    .unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_purge_task_stops_when_dropped() {
        let list = Arc::new(MemoryBlocklist::new());
        let handle = list.spawn_purge_task(Duration::from_millis(5));
        drop(list);
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("purge task should end")
            .unwrap();
    }
}
