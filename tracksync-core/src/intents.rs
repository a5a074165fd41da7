//! State container seam
//!
//! The host's state container owns "what should be playing". The scheduler
//! never mutates the logical queue itself; when engine-driven advancement
//! needs a logical decision (shuffle order, chained skips), it dispatches an
//! intent and waits for a fresh [`LogicalQueueModel`] snapshot to come back
//! through `reconcile`.

use async_trait::async_trait;
use uuid::Uuid;

/// Intents dispatchable to the host state container
#[async_trait]
pub trait QueueIntents: Send + Sync {
    /// Advance to the next logical track
    async fn next(&self);

    /// Go back to the previous logical track
    async fn previous(&self);

    /// The engine advanced naturally; align the logical index
    async fn update_index(&self, index: usize);

    /// Mark an occurrence as the active track (e.g. preview playback)
    async fn set_active_track(&self, track_id: String, uid: Uuid, previewing: bool);
}
