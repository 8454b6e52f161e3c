//! Retention pruning for the audit table

use crate::error::RequestLogError;
use crate::store::AuditStore;
use chrono::{DateTime, Days, Duration, NaiveTime, Utc};
use reqtrail_cache::{CacheError, CacheStore, helpers};
use std::sync::Arc;

/// Cache key holding the unix time before which no prune runs
pub const PRUNE_GATE_KEY: &str = "request-logging-truncate-table";

/// Cached "do not prune again before" timestamp.
///
/// A missing entry means a prune is due. The check and the update are not
/// atomic; concurrent requests may both prune, which only repeats an
/// idempotent delete.
#[derive(Clone)]
pub struct PruneGate {
    cache: Arc<dyn CacheStore>,
    key: String,
}

impl PruneGate {
    pub fn new(cache: Arc<dyn CacheStore>) -> Self {
        Self {
            cache,
            key: PRUNE_GATE_KEY.to_string(),
        }
    }

    /// Use a different cache key, for hosts running several audit tables
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// The stored next prune time, if any
    pub async fn next_prune_at(&self) -> Result<Option<DateTime<Utc>>, CacheError> {
        let stored: Option<i64> = helpers::get(&*self.cache, &self.key).await?;
        Ok(stored.and_then(|ts| DateTime::from_timestamp(ts, 0)))
    }

    /// `true` when nothing is stored or the stored time is before `now` (whole seconds)
    pub async fn is_due(&self, now: DateTime<Utc>) -> Result<bool, CacheError> {
        let stored: Option<i64> = helpers::get(&*self.cache, &self.key).await?;
        Ok(stored.is_none_or(|ts| ts < now.timestamp()))
    }

    /// Close the gate until `until`; the entry expires then as well.
    pub async fn close_until(
        &self,
        until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), CacheError> {
        let ttl = (until - now).to_std().ok().filter(|ttl| !ttl.is_zero());
        helpers::set(&*self.cache, &self.key, &until.timestamp(), ttl).await
    }
}

impl std::fmt::Debug for PruneGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PruneGate").field("key", &self.key).finish()
    }
}

/// Midnight UTC following `now`
pub fn start_of_next_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .checked_add_days(Days::new(1))
        .map(|day| day.and_time(NaiveTime::MIN).and_utc())
        .unwrap_or(now + Duration::days(1))
}

/// Deletes audit rows older than the retention window, at most once per day
pub struct RetentionPruner {
    store: Arc<dyn AuditStore>,
    gate: PruneGate,
    persistence_days: u32,
}

impl RetentionPruner {
    pub fn new(store: Arc<dyn AuditStore>, gate: PruneGate, persistence_days: u32) -> Self {
        Self {
            store,
            gate,
            persistence_days,
        }
    }

    pub fn gate(&self) -> &PruneGate {
        &self.gate
    }

    /// Rows created before this instant are out of the window
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(i64::from(self.persistence_days))
    }

    /// Prune if the gate allows it. Returns the number of deleted rows when a prune ran.
    pub async fn prune_if_due(&self, now: DateTime<Utc>) -> Result<Option<usize>, RequestLogError> {
        if !self.gate.is_due(now).await? {
            tracing::trace!(key = %self.gate.key(), "Audit prune not due");
            return Ok(None);
        }

        let cutoff = self.cutoff(now);
        let deleted = self.store.delete_created_before(cutoff).await?;
        let next = start_of_next_day(now);
        self.gate.close_until(next, now).await?;

        if deleted > 0 {
            tracing::info!(deleted, %cutoff, "Pruned expired audit rows");
        } else {
            tracing::debug!(%cutoff, next_prune = %next, "Audit prune found nothing to delete");
        }

        Ok(Some(deleted))
    }
}
