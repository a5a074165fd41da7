//! Playback engine seam
//!
//! The physical engine (decode, output, its own mutable queue) lives in the
//! host. The scheduler drives it through [`PlayerEngine`] and receives its
//! transport events as `EngineEvent`s.
//!
//! Engine mutation calls within one sync generation are issued strictly
//! sequentially: head/tail insert positions are only well-defined relative to
//! the engine queue at the moment of the call.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracksync_common::events::TransportState;
use tracksync_common::Result;

/// A resolved, playable media source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaDescriptor {
    pub track_id: String,
    /// Playable URL (remote stream or local file)
    pub url: String,
    pub duration_secs: f64,
    pub title: String,
    pub artist: String,
    pub artwork_url: Option<String>,
}

/// Point-in-time view of the engine's own queue
///
/// Read via query calls; never assumed stale-free relative to the logical
/// queue.
#[derive(Debug, Clone)]
pub struct EngineQueueSnapshot {
    pub descriptors: Vec<MediaDescriptor>,
    pub active_index: Option<usize>,
    pub state: TransportState,
}

/// Interface consumed from the playback engine
#[async_trait]
pub trait PlayerEngine: Send + Sync {
    /// Append a descriptor at the tail of the engine queue
    async fn add(&self, descriptor: MediaDescriptor) -> Result<()>;

    /// Insert a descriptor at `index` (0 = head)
    async fn add_at(&self, descriptor: MediaDescriptor, index: usize) -> Result<()>;

    /// Remove the entries at the given indices
    async fn remove(&self, indices: &[usize]) -> Result<()>;

    /// Drop the entire engine queue and stop playback
    async fn reset(&self) -> Result<()>;

    /// Replace the descriptor at `index` in place, keeping queue order.
    /// Used to swap in a re-resolved source after a playback error.
    async fn load(&self, index: usize, descriptor: MediaDescriptor) -> Result<()>;

    async fn play(&self) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    async fn seek_to(&self, seconds: f64) -> Result<()>;

    /// Playback rate multiplier (long-form content)
    async fn set_rate(&self, multiplier: f64) -> Result<()>;

    async fn queue_snapshot(&self) -> EngineQueueSnapshot;

    async fn active_index(&self) -> Option<usize>;

    async fn transport_state(&self) -> TransportState;

    /// Current playback position of the active track, in seconds
    async fn position_secs(&self) -> f64;
}
