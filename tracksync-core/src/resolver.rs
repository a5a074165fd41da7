//! Track resolution
//!
//! Turns a queue entry into a playable [`MediaDescriptor`]. The underlying
//! fetch (network resolution, URL signing for access-gated content, download
//! lookup) is external behind [`SourceFetcher`]; this module owns the
//! source-selection policy and the resolved-media cache.
//!
//! Selection priority, first success wins:
//! 1. Local downloaded file, when the entry is flagged offline-available and
//!    the owning collection is marked for offline use.
//! 2. A previously cached URL for the track, unless a prior playback error
//!    invalidated it (`retry_count > 0`).
//! 3. A fresh fetch from the resolution service, cached on success.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinSet;
use tracing::{debug, warn};
use tracksync_common::model::{PlayerBehavior, QueueEntry};
use tracksync_common::{Error, Result};

use crate::engine::MediaDescriptor;

/// Interface consumed from the external resolution service
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Resolve a fresh playable URL. May perform an asynchronous signing
    /// step internally for access-gated content. Fails with a retryable or
    /// permanent error.
    async fn fetch(&self, track_id: &str, behavior: PlayerBehavior) -> Result<MediaDescriptor>;

    /// Descriptor for a completed local download, if one exists
    async fn local_source(&self, track_id: &str) -> Option<MediaDescriptor>;
}

/// One cached resolution
#[derive(Debug, Clone)]
struct CacheSlot {
    /// Last successfully resolved descriptor (None after eviction)
    descriptor: Option<MediaDescriptor>,

    /// Playback errors seen for this track since the last clean resolution
    retry_count: u32,

    /// Set when the track was absent from the logical queue at the last
    /// prune; a second absent prune removes the slot
    absent_once: bool,
}

/// Cache of resolved media, keyed by track id
///
/// Concurrent reads, last-writer-wins updates. Staleness is tolerated:
/// entries are pruned best-effort after the track has been out of the
/// logical queue for more than one sync cycle.
pub struct ResolvedMediaCache {
    slots: RwLock<HashMap<String, CacheSlot>>,
}

impl ResolvedMediaCache {
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
        }
    }

    /// Cached descriptor, if present and not evicted
    pub async fn get(&self, track_id: &str) -> Option<MediaDescriptor> {
        self.slots
            .read()
            .await
            .get(track_id)
            .and_then(|slot| slot.descriptor.clone())
    }

    /// Store a successful resolution.
    ///
    /// The retry count survives: a fetch succeeding says nothing about
    /// whether the engine can play the result, so only confirmed playback
    /// clears it (see [`clear_retry`](Self::clear_retry)).
    pub async fn insert(&self, descriptor: MediaDescriptor) {
        let mut slots = self.slots.write().await;
        let retry_count = slots
            .get(&descriptor.track_id)
            .map(|slot| slot.retry_count)
            .unwrap_or(0);
        slots.insert(
            descriptor.track_id.clone(),
            CacheSlot {
                descriptor: Some(descriptor),
                retry_count,
                absent_once: false,
            },
        );
    }

    /// Drop the cached descriptor but keep the retry count
    pub async fn evict(&self, track_id: &str) {
        if let Some(slot) = self.slots.write().await.get_mut(track_id) {
            slot.descriptor = None;
        }
    }

    /// Record a playback error; returns the new retry count
    pub async fn bump_retry(&self, track_id: &str) -> u32 {
        let mut slots = self.slots.write().await;
        let slot = slots.entry(track_id.to_string()).or_insert(CacheSlot {
            descriptor: None,
            retry_count: 0,
            absent_once: false,
        });
        slot.retry_count += 1;
        slot.retry_count
    }

    /// Forget playback errors for a track that is now confirmed playing
    pub async fn clear_retry(&self, track_id: &str) {
        if let Some(slot) = self.slots.write().await.get_mut(track_id) {
            slot.retry_count = 0;
        }
    }

    pub async fn retry_count(&self, track_id: &str) -> u32 {
        self.slots
            .read()
            .await
            .get(track_id)
            .map(|slot| slot.retry_count)
            .unwrap_or(0)
    }

    /// Best-effort eviction of tracks that left the logical queue.
    ///
    /// Called once per completed sync cycle with the track ids still in the
    /// queue. A slot absent for two consecutive prunes is removed.
    pub async fn prune<'a>(&self, live: impl Iterator<Item = &'a str>) {
        let live: std::collections::HashSet<&str> = live.collect();
        let mut slots = self.slots.write().await;
        slots.retain(|track_id, slot| {
            if live.contains(track_id.as_str()) {
                slot.absent_once = false;
                true
            } else if slot.absent_once {
                false
            } else {
                slot.absent_once = true;
                true
            }
        });
    }

    pub async fn len(&self) -> usize {
        self.slots.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.slots.read().await.is_empty()
    }
}

impl Default for ResolvedMediaCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolver adapter: selection policy over [`SourceFetcher`] plus the cache
pub struct Resolver {
    fetcher: Arc<dyn SourceFetcher>,
    cache: ResolvedMediaCache,
    max_retries: u32,
}

impl Resolver {
    pub fn new(fetcher: Arc<dyn SourceFetcher>, max_retries: u32) -> Self {
        Self {
            fetcher,
            cache: ResolvedMediaCache::new(),
            max_retries,
        }
    }

    pub fn cache(&self) -> &ResolvedMediaCache {
        &self.cache
    }

    /// Resolve one entry following the selection priority.
    ///
    /// `offline_collection` is the host-level flag marking the owning
    /// collection for offline use; `retry_count > 0` bypasses the cache.
    pub async fn resolve(
        &self,
        entry: &QueueEntry,
        offline_collection: bool,
        retry_count: u32,
    ) -> Result<MediaDescriptor> {
        if entry.offline_available && offline_collection {
            if let Some(descriptor) = self.fetcher.local_source(&entry.track_id).await {
                debug!("Resolved {} from local download", entry.track_id);
                return Ok(descriptor);
            }
        }

        if retry_count == 0 {
            if let Some(descriptor) = self.cache.get(&entry.track_id).await {
                debug!("Resolved {} from cache", entry.track_id);
                return Ok(descriptor);
            }
        }

        let descriptor = self.fetcher.fetch(&entry.track_id, entry.behavior).await?;
        self.cache.insert(descriptor.clone()).await;
        debug!("Resolved {} from service", entry.track_id);
        Ok(descriptor)
    }

    /// Recover the active track after an engine playback error.
    ///
    /// Increments the track's retry count, evicts exactly its cache entry,
    /// and re-resolves with the cache bypassed. Past the retry cap the track
    /// is permanently unresolvable for this session.
    pub async fn recover_active(
        &self,
        entry: &QueueEntry,
        offline_collection: bool,
    ) -> Result<(MediaDescriptor, u32)> {
        let retry_count = self.cache.bump_retry(&entry.track_id).await;
        self.cache.evict(&entry.track_id).await;

        if retry_count > self.max_retries {
            return Err(Error::Resolution {
                track_id: entry.track_id.clone(),
                message: format!("gave up after {} playback errors", retry_count - 1),
                retryable: false,
            });
        }

        let descriptor = self
            .resolve(entry, offline_collection, retry_count)
            .await?;
        Ok((descriptor, retry_count))
    }

    /// Warm the cache for upcoming entries.
    ///
    /// Resolutions for distinct entries run concurrently; the cache is
    /// last-writer-wins, so racing a foreground resolve is harmless. Fetch
    /// failures are logged and left for the ordered pass to retry.
    pub fn spawn_prefetch(self: &Arc<Self>, entries: Vec<QueueEntry>, offline_collection: bool) {
        let mut set = JoinSet::new();
        for entry in entries {
            let resolver = Arc::clone(self);
            set.spawn(async move {
                if let Err(e) = resolver.resolve(&entry, offline_collection, 0).await {
                    debug!("Prefetch for {} failed: {}", entry.track_id, e);
                }
            });
        }
        tokio::spawn(async move {
            while let Some(result) = set.join_next().await {
                if let Err(e) = result {
                    warn!("Prefetch task panicked: {}", e);
                }
            }
        });
    }
}
