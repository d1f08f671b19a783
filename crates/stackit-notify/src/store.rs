//! Client-side notification cache.
//!
//! Holds the last fetched notification list and an unread-count projection
//! that push events can patch before the next refetch lands. Push events
//! never write records; they only patch the count and mark the list stale.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use stackit_client::{Notification, StackitClient};
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::Result;

/// Where the notification list comes from.
#[async_trait]
pub trait NotificationSource: Send + Sync {
    /// Fetch the user's notifications.
    async fn fetch(&self) -> Result<Vec<Notification>>;

    /// Mark every notification read on the server.
    async fn mark_all_read(&self) -> Result<()>;
}

#[async_trait]
impl NotificationSource for StackitClient {
    async fn fetch(&self) -> Result<Vec<Notification>> {
        Ok(self.notifications().list().await?)
    }

    async fn mark_all_read(&self) -> Result<()> {
        self.notifications().mark_all_read().await?;
        Ok(())
    }
}

/// In-memory source with a fetch counter.
#[derive(Debug, Default)]
pub struct MemorySource {
    records: Mutex<Vec<Notification>>,
    fetches: Mutex<usize>,
}

impl MemorySource {
    pub fn new(records: Vec<Notification>) -> Self {
        Self {
            records: Mutex::new(records),
            fetches: Mutex::new(0),
        }
    }

    /// Replace the server-side list.
    pub fn set(&self, records: Vec<Notification>) {
        *self.records.lock() = records;
    }

    /// Number of fetches served so far.
    pub fn fetch_count(&self) -> usize {
        *self.fetches.lock()
    }
}

#[async_trait]
impl NotificationSource for MemorySource {
    async fn fetch(&self) -> Result<Vec<Notification>> {
        *self.fetches.lock() += 1;
        Ok(self.records.lock().clone())
    }

    async fn mark_all_read(&self) -> Result<()> {
        for record in self.records.lock().iter_mut() {
            record.is_read = true;
        }
        Ok(())
    }
}

/// Cache tuning.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// How long a fetched list is served without refetching.
    pub stale_time: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            stale_time: Duration::from_secs(300),
        }
    }
}

impl StoreConfig {
    pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = stale_time;
        self
    }
}

#[derive(Debug, Default)]
struct StoreInner {
    records: Vec<Notification>,
    loaded_at: Option<Instant>,
    stale: bool,
    /// Bumped on every invalidation. A fetch that started under an older
    /// generation does not clear the stale flag.
    generation: u64,
    unread_count: u64,
}

impl StoreInner {
    fn is_fresh(&self, stale_time: Duration) -> bool {
        match self.loaded_at {
            Some(at) => !self.stale && at.elapsed() < stale_time,
            None => false,
        }
    }

    fn replace(&mut self, fetched: Vec<Notification>, started: u64) {
        let previously_read: HashSet<i64> = self
            .records
            .iter()
            .filter(|n| n.is_read)
            .map(|n| n.id)
            .collect();

        let mut seen = HashSet::new();
        let mut records: Vec<Notification> = fetched
            .into_iter()
            .filter(|n| seen.insert(n.id))
            .map(|mut n| {
                if previously_read.contains(&n.id) {
                    n.is_read = true;
                }
                n
            })
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        self.records = records;
        self.loaded_at = Some(Instant::now());

        if self.generation == started {
            self.stale = false;
            self.unread_count = self.records.iter().filter(|n| !n.is_read).count() as u64;
        } else {
            trace!("invalidated during fetch, staying stale");
        }
    }
}

/// The notification cache.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct NotificationStore {
    inner: Arc<RwLock<StoreInner>>,
    source: Arc<dyn NotificationSource>,
    /// Serializes fetches so concurrent readers share one request.
    fetch_lock: Arc<tokio::sync::Mutex<()>>,
    config: StoreConfig,
}

impl NotificationStore {
    pub fn new(source: Arc<dyn NotificationSource>, config: StoreConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(StoreInner::default())),
            source,
            fetch_lock: Arc::new(tokio::sync::Mutex::new(())),
            config,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The notification list, newest first.
    ///
    /// Served from cache while fresh; otherwise refetched.
    pub async fn get_all(&self) -> Result<Vec<Notification>> {
        if let Some(records) = self.fresh_records() {
            return Ok(records);
        }

        let _guard = self.fetch_lock.lock().await;
        // Another caller may have finished a fetch while we waited.
        if let Some(records) = self.fresh_records() {
            return Ok(records);
        }

        let started = self.inner.read().generation;
        debug!("fetching notifications");
        let fetched = self.source.fetch().await?;

        let mut inner = self.inner.write();
        inner.replace(fetched, started);
        debug!(
            count = inner.records.len(),
            unread = inner.unread_count,
            "notifications loaded"
        );
        Ok(inner.records.clone())
    }

    fn fresh_records(&self) -> Option<Vec<Notification>> {
        let inner = self.inner.read();
        if inner.is_fresh(self.config.stale_time) {
            trace!("serving cached notifications");
            Some(inner.records.clone())
        } else {
            None
        }
    }

    /// Overwrite the unread projection with a server-reported total.
    pub fn patch_unread_count(&self, count: u64) {
        let mut inner = self.inner.write();
        inner.unread_count = count;
        inner.generation += 1;
    }

    /// Mark the cached list stale so the next read refetches.
    pub fn invalidate(&self) {
        let mut inner = self.inner.write();
        inner.stale = true;
        inner.generation += 1;
    }

    /// Mark everything read on the server, then invalidate.
    pub async fn mark_all_read(&self) -> Result<()> {
        self.source.mark_all_read().await?;
        self.invalidate();
        Ok(())
    }

    /// Current unread projection.
    pub fn unread_count(&self) -> u64 {
        self.inner.read().unread_count
    }

    /// Cached records without fetching, newest first.
    pub fn cached(&self) -> Vec<Notification> {
        self.inner.read().records.clone()
    }

    /// Whether the next [`get_all`](Self::get_all) would fetch.
    pub fn is_stale(&self) -> bool {
        !self.inner.read().is_fresh(self.config.stale_time)
    }

    /// Drop all cached state (e.g. on logout).
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        let generation = inner.generation + 1;
        *inner = StoreInner {
            generation,
            ..StoreInner::default()
        };
    }
}
