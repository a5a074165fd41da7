//! Sync generations
//!
//! A generation is a monotonic token identifying one version of an in-flight
//! sync job. Exactly one generation is current at a time; superseding it
//! sets the old generation's cancellation flag, and the old job must stop
//! issuing engine mutations at its next cooperative checkpoint.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracksync_common::{Error, Result};

/// Cloneable handle to one sync generation
#[derive(Debug, Clone)]
pub struct SyncGeneration {
    id: u64,
    cancelled: Arc<AtomicBool>,
}

impl SyncGeneration {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Flag this generation as superseded
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Cooperative checkpoint: `StaleGeneration` when superseded.
    ///
    /// The error is an internal short-circuit signal only; it never reaches
    /// callers outside the sync loops.
    pub fn checkpoint(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::StaleGeneration(self.id))
        } else {
            Ok(())
        }
    }
}
