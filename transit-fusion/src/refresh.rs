//! Publishing and refreshing the current schedule.
//!
//! The current schedule is an immutable `ScheduleStore` behind an `Arc`.
//! Readers clone the `Arc` and keep using their snapshot for as long as they
//! like; refreshes build a complete new store and swap it in with a single
//! write. A failed refresh publishes nothing, so readers keep seeing the last
//! good schedule.
//!
//! Static and realtime refreshes run on independent timers but share one
//! writer lock, so a realtime cycle can't fuse against a schedule that a
//! concurrent static cycle is about to replace.

use std::future::Future;
use std::sync::Arc;

use chrono::Duration;
use futures::future::join_all;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::domain::{MergeError, ScheduleStore, SubfeedId};
use crate::feeds::{FeedError, RealtimeClient, SnapshotClient};
use crate::offset::DayOffsetCache;
use crate::persist::ScheduleArchive;
use crate::realtime::{TripUpdateRecord, apply_realtime};

/// Errors from a refresh cycle. None of them affect the published schedule.
#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    #[error("no schedule sources configured")]
    NoSources,

    #[error("subfeed {subfeed}: {source}")]
    Schedule { subfeed: SubfeedId, source: FeedError },

    #[error("realtime feed {index}: {source}")]
    Realtime { index: usize, source: FeedError },

    #[error("merge failed: {0}")]
    Merge(#[from] MergeError),

    #[error("schedule config hash {found:?} does not match configured {expected:?}")]
    ConfigHash { expected: String, found: String },
}

/// A source of one subfeed's parsed schedule.
pub trait ScheduleSource {
    fn subfeed(&self) -> &SubfeedId;

    fn fetch_schedule(&self) -> impl Future<Output = Result<ScheduleStore, FeedError>> + Send;
}

/// A source of realtime trip updates.
pub trait RealtimeSource {
    fn fetch_updates(&self) -> impl Future<Output = Result<Vec<TripUpdateRecord>, FeedError>> + Send;
}

impl ScheduleSource for SnapshotClient {
    fn subfeed(&self) -> &SubfeedId {
        SnapshotClient::subfeed(self)
    }

    fn fetch_schedule(&self) -> impl Future<Output = Result<ScheduleStore, FeedError>> + Send {
        self.fetch_snapshot()
    }
}

impl RealtimeSource for RealtimeClient {
    fn fetch_updates(&self) -> impl Future<Output = Result<Vec<TripUpdateRecord>, FeedError>> + Send {
        self.fetch_records()
    }
}

/// Shared handle to the currently published schedule.
#[derive(Clone, Default)]
pub struct ScheduleHandle {
    inner: Arc<RwLock<Option<Arc<ScheduleStore>>>>,
}

impl ScheduleHandle {
    /// Create a handle with nothing published.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a handle publishing `store`.
    pub fn with_schedule(store: ScheduleStore) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Some(Arc::new(store)))),
        }
    }

    /// The current snapshot, if any has been published.
    pub async fn current(&self) -> Option<Arc<ScheduleStore>> {
        let guard = self.inner.read().await;
        guard.clone()
    }

    /// Replace the current snapshot.
    pub async fn publish(&self, store: ScheduleStore) {
        let store = Arc::new(store);
        let mut guard = self.inner.write().await;
        *guard = Some(store);
    }
}

/// What a realtime cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RealtimeOutcome {
    /// No schedule was published yet, so there was nothing to fuse onto.
    Skipped,
    /// A fused schedule was published. `failed_sources` feeds contributed
    /// nothing this cycle.
    Applied {
        records: usize,
        errors: usize,
        failed_sources: usize,
    },
}

/// Runs refresh cycles against a set of sources and publishes the results.
pub struct Refresher<S, R> {
    handle: ScheduleHandle,
    schedule_sources: Vec<S>,
    realtime_sources: Vec<R>,
    offsets: Arc<DayOffsetCache>,
    config_hash: String,
    archive: Option<ScheduleArchive>,
    stale_threshold: Duration,
    writer: Mutex<()>,
}

impl<S: ScheduleSource, R: RealtimeSource> Refresher<S, R> {
    pub fn new(
        handle: ScheduleHandle,
        schedule_sources: Vec<S>,
        realtime_sources: Vec<R>,
        offsets: Arc<DayOffsetCache>,
        config_hash: impl Into<String>,
    ) -> Self {
        Self {
            handle,
            schedule_sources,
            realtime_sources,
            offsets,
            config_hash: config_hash.into(),
            archive: None,
            stale_threshold: Duration::hours(24),
            writer: Mutex::new(()),
        }
    }

    /// Persist every newly merged schedule to `archive`.
    pub fn with_archive(mut self, archive: ScheduleArchive) -> Self {
        self.archive = Some(archive);
        self
    }

    /// Age beyond which a published schedule is reported as stale.
    pub fn with_stale_threshold(mut self, threshold: Duration) -> Self {
        self.stale_threshold = threshold;
        self
    }

    pub fn handle(&self) -> &ScheduleHandle {
        &self.handle
    }

    /// Fetch every subfeed, merge and publish.
    ///
    /// Subfeeds are fetched concurrently. Any fetch failure, merge failure
    /// or config hash mismatch aborts the cycle without publishing, and
    /// warns if the schedule left in place is stale. Returns the number of
    /// trips in the new schedule.
    pub async fn refresh_static(&self) -> Result<usize, RefreshError> {
        let merged = match self.fetch_and_merge().await {
            Ok(merged) => merged,
            Err(e) => {
                self.warn_if_stale().await;
                return Err(e);
            }
        };

        let trips = merged.trips().len();
        for warning in &merged.report().warnings {
            warn!(%warning, "schedule parse warning");
        }
        for error in &merged.report().errors {
            warn!(%error, "schedule parse error");
        }

        if let Some(archive) = &self.archive {
            match archive.save(&merged) {
                Ok(path) => info!(path = %path.display(), "persisted schedule"),
                // The in-memory schedule is still good; publish it anyway.
                Err(e) => warn!(error = %e, "failed to persist schedule"),
            }
        }

        let _writer = self.writer.lock().await;
        self.handle.publish(merged).await;
        info!(subfeeds = self.schedule_sources.len(), trips, "published schedule");
        Ok(trips)
    }

    async fn fetch_and_merge(&self) -> Result<ScheduleStore, RefreshError> {
        if self.schedule_sources.is_empty() {
            return Err(RefreshError::NoSources);
        }

        let results = join_all(self.schedule_sources.iter().map(|s| s.fetch_schedule())).await;

        let mut feeds = Vec::with_capacity(results.len());
        let mut ids = Vec::with_capacity(results.len());
        for (source, result) in self.schedule_sources.iter().zip(results) {
            let store = result.map_err(|source_err| RefreshError::Schedule {
                subfeed: source.subfeed().clone(),
                source: source_err,
            })?;
            feeds.push(store);
            ids.push(source.subfeed().clone());
        }

        let merged = ScheduleStore::merge(feeds, &ids)?;
        if merged.config_hash() != self.config_hash {
            return Err(RefreshError::ConfigHash {
                expected: self.config_hash.clone(),
                found: merged.config_hash().to_string(),
            });
        }
        Ok(merged)
    }

    /// Fetch every realtime feed and fuse it onto the current schedule.
    ///
    /// Skipped when nothing is published yet. Each feed stands alone: a
    /// failing feed is logged and the others are still fused. Only when
    /// every feed fails is nothing published. Soft fusion errors are logged
    /// and counted.
    pub async fn refresh_realtime(&self) -> Result<RealtimeOutcome, RefreshError> {
        if self.handle.current().await.is_none() {
            info!("no schedule published yet, skipping realtime refresh");
            return Ok(RealtimeOutcome::Skipped);
        }

        let results = join_all(self.realtime_sources.iter().map(|s| s.fetch_updates())).await;
        let mut records = Vec::new();
        let mut first_failure = None;
        let mut failed_sources = 0;
        for (index, result) in results.into_iter().enumerate() {
            match result {
                Ok(batch) => records.extend(batch),
                Err(source) => {
                    warn!(index, error = %source, "realtime feed failed");
                    failed_sources += 1;
                    first_failure.get_or_insert(RefreshError::Realtime { index, source });
                }
            }
        }
        if failed_sources == self.realtime_sources.len()
            && let Some(err) = first_failure
        {
            return Err(err);
        }

        // Fuse against whatever is current once we hold the writer lock, so
        // a static refresh that finished meanwhile isn't overwritten.
        let _writer = self.writer.lock().await;
        let Some(current) = self.handle.current().await else {
            return Ok(RealtimeOutcome::Skipped);
        };

        let mut errors = 0;
        let fused = apply_realtime(&current, &records, &self.offsets, |e| {
            errors += 1;
            warn!(error = %e, "realtime fusion error");
        });
        self.handle.publish(fused).await;

        info!(records = records.len(), errors, failed_sources, "applied realtime updates");
        Ok(RealtimeOutcome::Applied {
            records: records.len(),
            errors,
            failed_sources,
        })
    }

    /// Is the published schedule older than the stale threshold?
    pub async fn is_stale(&self) -> bool {
        match self.handle.current().await {
            Some(current) => current.is_old_at(chrono::Utc::now(), self.stale_threshold),
            None => false,
        }
    }

    async fn warn_if_stale(&self) {
        if self.is_stale().await {
            warn!(
                threshold_secs = self.stale_threshold.num_seconds(),
                "refresh failed and the published schedule is stale"
            );
        }
    }
}
