//! In-memory queue of loyalty credits awaiting delivery.
//!
//! The coordinator only inserts. Attempt bookkeeping and removal belong to the
//! reconciliation worker, which reaches them through crate-private methods.
//! Every method takes the lock for the duration of a map operation and never
//! across an await on anything else.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Unique key of a pending credit: user, creation time and a queue-wide
/// sequence number, so two credits for the same user created in the same
/// instant never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PendingKey(String);

impl PendingKey {
    fn new(user: &str, created_at: DateTime<Utc>, sequence: u64) -> Self {
        let nanos = created_at
            .timestamp_nanos_opt()
            .unwrap_or_else(|| created_at.timestamp_micros().saturating_mul(1_000));
        Self(format!("{user}_{nanos}_{sequence}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PendingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A loyalty credit not yet confirmed by the loyalty service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingCredit {
    pub user: String,
    pub points: u32,
    /// Delivery attempts made by the reconciliation worker.
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    pub last_attempt_at: Option<DateTime<Utc>>,
}

/// What the reconciliation worker should do with an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AttemptSlot {
    /// The entry no longer exists.
    Gone,
    /// The entry reached the attempt ceiling and was removed.
    Expired(PendingCredit),
    /// The attempt counter was bumped; deliver this credit.
    Ready(PendingCredit),
}

/// Shared handle to the pending-credit map.
#[derive(Debug, Clone, Default)]
pub struct PendingCreditQueue {
    entries: Arc<RwLock<HashMap<PendingKey, PendingCredit>>>,
    sequence: Arc<AtomicU64>,
}

impl PendingCreditQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a credit for background delivery.
    pub async fn enqueue(&self, user: &str, points: u32) -> PendingKey {
        let created_at = Utc::now();
        let key = PendingKey::new(
            user,
            created_at,
            self.sequence.fetch_add(1, Ordering::SeqCst),
        );
        let credit = PendingCredit {
            user: user.to_string(),
            points,
            attempts: 0,
            created_at,
            last_attempt_at: None,
        };

        let total = {
            let mut entries = self.entries.write().await;
            entries.insert(key.clone(), credit);
            entries.len()
        };

        metrics::counter!("bonus_pending_total").increment(1);
        metrics::gauge!("pending_credits").set(total as f64);
        tracing::info!(%key, user, points, total_pending = total, "pending credit queued");
        key
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn contains(&self, key: &PendingKey) -> bool {
        self.entries.read().await.contains_key(key)
    }

    pub async fn get(&self, key: &PendingKey) -> Option<PendingCredit> {
        self.entries.read().await.get(key).cloned()
    }

    /// Current keys, oldest first.
    pub async fn keys(&self) -> Vec<PendingKey> {
        self.snapshot().await.into_iter().map(|(key, _)| key).collect()
    }

    /// Copy of every entry, oldest first.
    pub async fn snapshot(&self) -> Vec<(PendingKey, PendingCredit)> {
        let mut entries: Vec<(PendingKey, PendingCredit)> = self
            .entries
            .read()
            .await
            .iter()
            .map(|(key, credit)| (key.clone(), credit.clone()))
            .collect();
        entries.sort_by(|a, b| a.1.created_at.cmp(&b.1.created_at).then(a.0.cmp(&b.0)));
        entries
    }

    /// Claims one delivery attempt for `key`.
    ///
    /// Entries with `attempts >= max_attempts` are removed instead.
    pub(crate) async fn begin_attempt(&self, key: &PendingKey, max_attempts: u32) -> AttemptSlot {
        let mut entries = self.entries.write().await;

        let Some(credit) = entries.get_mut(key) else {
            return AttemptSlot::Gone;
        };

        if credit.attempts >= max_attempts {
            let expired = entries.remove(key);
            let total = entries.len();
            drop(entries);
            metrics::gauge!("pending_credits").set(total as f64);
            return expired.map_or(AttemptSlot::Gone, AttemptSlot::Expired);
        }

        credit.attempts += 1;
        credit.last_attempt_at = Some(Utc::now());
        AttemptSlot::Ready(credit.clone())
    }

    /// Removes a delivered entry.
    pub(crate) async fn remove(&self, key: &PendingKey) -> Option<PendingCredit> {
        let mut entries = self.entries.write().await;
        let removed = entries.remove(key);
        metrics::gauge!("pending_credits").set(entries.len() as f64);
        removed
    }
}
