//! Middle-out queue expansion
//!
//! Fills the engine queue outward from the anchor (current) entry in
//! alternating forward/backward order: offset 1 forward, offset 1 backward,
//! offset 2 forward, and so on. Tracks one skip away from the user's
//! position become playable first, independent of total queue length; a
//! left-to-right fill would make a "skip backward" wait for the whole head
//! of the queue.
//!
//! All engine adds for one generation are issued strictly sequentially.
//! Head and tail insert positions are only meaningful relative to the queue
//! at the moment of the call, so there is no safe concurrent variant.

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use tracksync_common::model::QueueEntry;

use crate::engine::PlayerEngine;
use crate::resolver::Resolver;
use crate::scheduler::generation::SyncGeneration;

/// Expansion mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpandMode {
    /// Full middle-out fill around a freshly-added anchor
    Rebuild,
    /// Tail-only enqueue of new entries behind an intact queue
    Append,
}

/// How an expansion ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpandOutcome {
    /// Every entry was attempted; `skipped` counts resolution/add failures
    Completed { added: usize, skipped: usize },
    /// Superseded by a newer generation at a cooperative checkpoint
    Cancelled,
}

/// Issues ordered engine inserts outward from an anchor index
pub struct MiddleOutEnqueuer {
    engine: Arc<dyn PlayerEngine>,
    resolver: Arc<Resolver>,
    /// Serializes engine mutations against the scheduler's own calls
    /// (reset, anchor add, error-recovery load)
    mutation_lock: Arc<Mutex<()>>,
}

impl MiddleOutEnqueuer {
    pub fn new(
        engine: Arc<dyn PlayerEngine>,
        resolver: Arc<Resolver>,
        mutation_lock: Arc<Mutex<()>>,
    ) -> Self {
        Self {
            engine,
            resolver,
            mutation_lock,
        }
    }

    /// Expand the engine queue for one generation.
    ///
    /// Rebuild mode assumes `entries[anchor]` is already in the engine
    /// queue and fills the rest outward. Append mode ignores `anchor`
    /// ordering concerns and walks `entries[start..]` tail-only.
    pub async fn expand(
        &self,
        generation: &SyncGeneration,
        anchor: usize,
        entries: &[QueueEntry],
        offline_collection: bool,
        mode: ExpandMode,
    ) -> ExpandOutcome {
        match mode {
            ExpandMode::Rebuild => {
                self.expand_rebuild(generation, anchor, entries, offline_collection)
                    .await
            }
            ExpandMode::Append => {
                self.expand_append(generation, entries, offline_collection)
                    .await
            }
        }
    }

    async fn expand_rebuild(
        &self,
        generation: &SyncGeneration,
        anchor: usize,
        entries: &[QueueEntry],
        offline_collection: bool,
    ) -> ExpandOutcome {
        let mut added = 0usize;
        let mut skipped = 0usize;
        let mut offset = 1usize;

        while anchor + offset < entries.len() || offset <= anchor {
            if generation.is_cancelled() {
                info!(
                    "Expansion of generation {} cancelled at offset {}",
                    generation.id(),
                    offset
                );
                return ExpandOutcome::Cancelled;
            }

            if anchor + offset < entries.len() {
                match self
                    .resolve_and_insert(&entries[anchor + offset], offline_collection, None)
                    .await
                {
                    true => added += 1,
                    false => skipped += 1,
                }
            }

            // Checkpoint between the two sides of the same offset
            if generation.is_cancelled() {
                info!(
                    "Expansion of generation {} cancelled between sides of offset {}",
                    generation.id(),
                    offset
                );
                return ExpandOutcome::Cancelled;
            }

            if offset <= anchor {
                // Head insert: entries nearer the anchor were inserted
                // earlier, so each lands directly before them
                match self
                    .resolve_and_insert(&entries[anchor - offset], offline_collection, Some(0))
                    .await
                {
                    true => added += 1,
                    false => skipped += 1,
                }
            }

            offset += 1;
        }

        debug!(
            "Generation {} expansion complete: {} added, {} skipped",
            generation.id(),
            added,
            skipped
        );
        ExpandOutcome::Completed { added, skipped }
    }

    async fn expand_append(
        &self,
        generation: &SyncGeneration,
        entries: &[QueueEntry],
        offline_collection: bool,
    ) -> ExpandOutcome {
        let mut added = 0usize;
        let mut skipped = 0usize;

        for entry in entries {
            if generation.is_cancelled() {
                info!("Append of generation {} cancelled", generation.id());
                return ExpandOutcome::Cancelled;
            }
            match self.resolve_and_insert(entry, offline_collection, None).await {
                true => added += 1,
                false => skipped += 1,
            }
        }

        ExpandOutcome::Completed { added, skipped }
    }

    /// Resolve one entry and insert it (tail, or at `at_index`).
    ///
    /// Failures abort only this entry: resolution failures are retried on a
    /// later reconcile, and a failed add just leaves this neighbor
    /// unavailable for in-app skip until then.
    async fn resolve_and_insert(
        &self,
        entry: &QueueEntry,
        offline_collection: bool,
        at_index: Option<usize>,
    ) -> bool {
        let retry_count = self.resolver.cache().retry_count(&entry.track_id).await;
        let descriptor = match self
            .resolver
            .resolve(entry, offline_collection, retry_count)
            .await
        {
            Ok(descriptor) => descriptor,
            Err(e) => {
                warn!("Resolution of {} failed: {}", entry.track_id, e);
                return false;
            }
        };

        let _guard = self.mutation_lock.lock().await;
        let result = match at_index {
            Some(index) => self.engine.add_at(descriptor, index).await,
            None => self.engine.add(descriptor).await,
        };
        if let Err(e) = result {
            warn!("Engine add for {} failed: {}", entry.track_id, e);
            return false;
        }
        true
    }
}
