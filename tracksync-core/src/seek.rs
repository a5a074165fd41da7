//! Seek coordination
//!
//! The engine only honors seeks in seekable transport states (Ready or
//! Playing). Seeks requested earlier are parked as a single pending value
//! (last-write-wins) and flushed exactly once on the first seekable
//! transition.
//!
//! Also owns the restart-on-same-track guard: a monotonically increasing
//! restart counter from the host means "restart the current track from
//! zero", but it is only honored while the logical index still matches the
//! index of the last restart honored. A new track landing at the same index
//! by coincidence must not be restarted.

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use tracksync_common::events::TransportState;

use crate::engine::PlayerEngine;

#[derive(Debug, Default)]
struct SeekInner {
    /// At most one parked seek target, in seconds
    pending: Option<f64>,

    /// Last restart counter value consumed
    last_restart_counter: Option<u64>,

    /// Logical index at the last restart actually honored
    last_restart_index: Option<usize>,
}

/// Defers seek requests until the engine can take them
pub struct SeekCoordinator {
    engine: Arc<dyn PlayerEngine>,
    inner: Mutex<SeekInner>,
}

impl SeekCoordinator {
    pub fn new(engine: Arc<dyn PlayerEngine>) -> Self {
        Self {
            engine,
            inner: Mutex::new(SeekInner::default()),
        }
    }

    /// Seek now if the engine is seekable, otherwise park the target.
    /// A newer request always overwrites a parked one.
    pub async fn request_seek(&self, seconds: f64) {
        let state = self.engine.transport_state().await;
        if state.is_seekable() {
            self.issue(seconds).await;
        } else {
            debug!("Parking seek to {:.1}s (transport {:?})", seconds, state);
            self.inner.lock().await.pending = Some(seconds);
        }
    }

    /// Flush the parked seek on the first seekable transition
    pub async fn on_transport_changed(&self, state: TransportState) {
        if !state.is_seekable() {
            return;
        }
        // take() before the engine call so a re-entrant event can't double-seek
        let target = self.inner.lock().await.pending.take();
        if let Some(seconds) = target {
            self.issue(seconds).await;
        }
    }

    /// Handle a restart signal from the host.
    ///
    /// `counter` is the host's monotonically increasing restart counter;
    /// `current_index` is the logical index at delivery time. Honored only
    /// when the counter actually changed and the index still matches the
    /// last honored restart (vacuously true for the first restart).
    pub async fn request_restart(&self, counter: u64, current_index: Option<usize>) {
        let honor = {
            let mut inner = self.inner.lock().await;
            if inner.last_restart_counter == Some(counter) {
                return;
            }
            inner.last_restart_counter = Some(counter);

            let same_track = match inner.last_restart_index {
                None => true,
                Some(last) => current_index == Some(last),
            };
            if same_track {
                inner.last_restart_index = current_index;
            }
            same_track
        };

        if honor {
            self.request_seek(0.0).await;
        } else {
            debug!(
                "Ignoring restart {} for index {:?} (track changed since last restart)",
                counter, current_index
            );
        }
    }

    async fn issue(&self, seconds: f64) {
        if let Err(e) = self.engine.seek_to(seconds).await {
            // Non-fatal: the host can re-request
            warn!("Seek to {:.1}s failed: {}", seconds, e);
        }
    }
}
