//! In-memory registry of produced artifacts
//!
//! [`ArtifactStore`] is the single source of truth for artifact lifecycle
//! transitions. Every transition happens under one mutex, so operations on the
//! same identifier are linearizable. The lock is never held across an
//! `.await`: a record leaves the map first and its file is unlinked after.
//!
//! ```text
//! reserve ──► Pending ──promote──► Ready ──begin_download──► Downloading
//!                │                   │                          │
//!                └─────── delete ────┴── delete / evict ────────┴── delete ──► Deleted
//! ```
//!
//! Expiry eviction only ever removes `Ready` records; a transfer in progress
//! cannot be cut off by the sweeper.

use crate::clock::Clock;
use crate::error::StoreError;
use crate::types::{ArtifactId, ArtifactRecord, ArtifactState};
use crate::utils::{is_managed_file_name, remove_file_logged};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Registry mapping request identifiers to on-disk artifacts
pub struct ArtifactStore {
    entries: Mutex<HashMap<ArtifactId, ArtifactRecord>>,
    clock: Arc<dyn Clock>,
}

impl ArtifactStore {
    /// Create an empty store reading time from `clock`
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// The clock used to stamp records
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<ArtifactId, ArtifactRecord>> {
        // A panic while holding the lock cannot leave a half-applied
        // transition behind, so the map is still consistent.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a finished artifact in the `Ready` state
    pub fn put(&self, mut record: ArtifactRecord) -> Result<(), StoreError> {
        record.state = ArtifactState::Ready;
        self.insert(record)
    }

    /// Claim `id` for an encode that has not finished yet
    ///
    /// The record is `Pending`: invisible to [`get`](Self::get),
    /// [`begin_download`](Self::begin_download) and ttl expiry. Only
    /// [`evict_if_stale_pending`](Self::evict_if_stale_pending) reaps it.
    pub fn reserve(
        &self,
        id: &ArtifactId,
        path: PathBuf,
        display_name: impl Into<String>,
    ) -> Result<(), StoreError> {
        let mut record = ArtifactRecord::new(id.clone(), path, display_name, self.clock.now(), 0);
        record.state = ArtifactState::Pending;
        self.insert(record)
    }

    fn insert(&self, record: ArtifactRecord) -> Result<(), StoreError> {
        use std::collections::hash_map::Entry;

        match self.entries().entry(record.id.clone()) {
            Entry::Occupied(_) => Err(StoreError::DuplicateId(record.id)),
            Entry::Vacant(slot) => {
                debug!(artifact_id = %record.id, state = ?record.state, "artifact registered");
                slot.insert(record);
                Ok(())
            }
        }
    }

    /// Publish a pending artifact: `Pending → Ready`
    ///
    /// The expiry window starts now, not when the encode started.
    pub fn promote(&self, id: &ArtifactId, size_bytes: u64) -> Result<ArtifactRecord, StoreError> {
        let now = self.clock.now();
        let mut entries = self.entries();
        match entries.get_mut(id) {
            Some(record) if record.state == ArtifactState::Pending => {
                record.state = ArtifactState::Ready;
                record.size_bytes = size_bytes;
                record.created_at = now;
                Ok(record.clone())
            }
            _ => Err(StoreError::NotFound(id.clone())),
        }
    }

    /// Look up a downloadable artifact without changing its state
    pub fn get(&self, id: &ArtifactId) -> Result<ArtifactRecord, StoreError> {
        match self.entries().get(id) {
            Some(record) if record.state != ArtifactState::Pending => Ok(record.clone()),
            _ => Err(StoreError::NotFound(id.clone())),
        }
    }

    /// Current state of `id`, including `Pending` records
    pub fn state(&self, id: &ArtifactId) -> Option<ArtifactState> {
        self.entries().get(id).map(|record| record.state)
    }

    /// Atomically move `id` from `Ready` to `Downloading`
    ///
    /// At most one caller wins per identifier; the rest get
    /// [`StoreError::AlreadyDownloading`].
    pub fn begin_download(&self, id: &ArtifactId) -> Result<ArtifactRecord, StoreError> {
        let mut entries = self.entries();
        let record = entries
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;

        match record.state {
            ArtifactState::Ready => {
                record.state = ArtifactState::Downloading;
                Ok(record.clone())
            }
            ArtifactState::Downloading => Err(StoreError::AlreadyDownloading(id.clone())),
            ArtifactState::Pending | ArtifactState::Deleted => {
                Err(StoreError::NotFound(id.clone()))
            }
        }
    }

    /// Remove `id` and unlink its file
    ///
    /// Idempotent: unknown or already-deleted identifiers are a no-op. Returns
    /// whether a record was removed.
    pub async fn delete(&self, id: &ArtifactId) -> bool {
        let removed = self.entries().remove(id);
        match removed {
            Some(record) => {
                self.finalize(record, "deleted").await;
                true
            }
            None => false,
        }
    }

    /// Identifiers of `Ready` records at least `ttl` old at `now`
    pub fn list_expired(&self, now: DateTime<Utc>, ttl: Duration) -> Vec<ArtifactId> {
        self.entries()
            .values()
            .filter(|record| is_expired(record, now, ttl))
            .map(|record| record.id.clone())
            .collect()
    }

    /// Remove `id` only if it is still `Ready` and expired
    ///
    /// Re-checks under the lock, so a download that started after
    /// [`list_expired`](Self::list_expired) is not interrupted.
    pub async fn evict_if_expired(&self, id: &ArtifactId, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.evict_where(id, "expired", |record| is_expired(record, now, ttl))
            .await
    }

    /// Identifiers of `Pending` records reserved at least `max_age` ago
    ///
    /// A healthy encode promotes its record long before this; anything older
    /// belongs to a job that died without cleaning up.
    pub fn list_stale_pending(&self, now: DateTime<Utc>, max_age: Duration) -> Vec<ArtifactId> {
        self.entries()
            .values()
            .filter(|record| is_stale_pending(record, now, max_age))
            .map(|record| record.id.clone())
            .collect()
    }

    /// Remove `id` only if it is still `Pending` and older than `max_age`
    pub async fn evict_if_stale_pending(
        &self,
        id: &ArtifactId,
        now: DateTime<Utc>,
        max_age: Duration,
    ) -> bool {
        self.evict_where(id, "stale pending", |record| {
            is_stale_pending(record, now, max_age)
        })
        .await
    }

    async fn evict_where(
        &self,
        id: &ArtifactId,
        reason: &'static str,
        matches: impl FnOnce(&ArtifactRecord) -> bool,
    ) -> bool {
        let removed = {
            let mut entries = self.entries();
            if entries.get(id).is_some_and(matches) {
                entries.remove(id)
            } else {
                None
            }
        };
        match removed {
            Some(record) => {
                self.finalize(record, reason).await;
                true
            }
            None => false,
        }
    }

    /// Delete every record, whatever its state. Used on shutdown.
    pub async fn clear(&self) -> usize {
        let drained: Vec<ArtifactRecord> = self.entries().drain().map(|(_, r)| r).collect();
        let count = drained.len();
        for record in drained {
            self.finalize(record, "cleared").await;
        }
        count
    }

    /// Delete files in `dir` left behind by a previous process
    ///
    /// Only names this service generates are touched, and files belonging to
    /// live records are skipped.
    pub async fn purge_orphans(&self, dir: &Path) -> std::io::Result<usize> {
        let live: Vec<PathBuf> = self.entries().values().map(|r| r.path.clone()).collect();

        let mut reader = match tokio::fs::read_dir(dir).await {
            Ok(reader) => reader,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };

        let mut purged = 0;
        while let Some(entry) = reader.next_entry().await? {
            let path = entry.path();
            let managed = entry
                .file_name()
                .to_str()
                .is_some_and(is_managed_file_name);
            if !managed || live.contains(&path) {
                continue;
            }
            if remove_file_logged(&path).await {
                purged += 1;
            }
        }

        if purged > 0 {
            info!(?dir, purged, "removed orphaned files from a previous run");
        }
        Ok(purged)
    }

    /// Number of tracked records, including pending ones
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Whether nothing is tracked
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    async fn finalize(&self, mut record: ArtifactRecord, reason: &'static str) {
        let previous = record.state;
        record.state = ArtifactState::Deleted;
        if !remove_file_logged(&record.path).await {
            warn!(
                artifact_id = %record.id,
                path = ?record.path,
                "artifact record removed but its file could not be deleted"
            );
        }
        debug!(artifact_id = %record.id, ?previous, reason, "artifact deleted");
    }
}

fn is_expired(record: &ArtifactRecord, now: DateTime<Utc>, ttl: Duration) -> bool {
    record.state == ArtifactState::Ready && is_older_than(record, now, ttl)
}

fn is_stale_pending(record: &ArtifactRecord, now: DateTime<Utc>, max_age: Duration) -> bool {
    record.state == ArtifactState::Pending && is_older_than(record, now, max_age)
}

fn is_older_than(record: &ArtifactRecord, now: DateTime<Utc>, age: Duration) -> bool {
    // A negative age (clock went backwards) is never old enough
    now.signed_duration_since(record.created_at)
        .to_std()
        .is_ok_and(|elapsed| elapsed >= age)
}
