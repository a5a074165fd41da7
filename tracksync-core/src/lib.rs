//! # Tracksync Core (scheduler)
//!
//! Queue synchronization and prefetch scheduling between an application-level
//! logical queue and a playback engine's internal queue.
//!
//! **Purpose:** Observe logical-queue snapshots, decide append-vs-rebuild,
//! resolve playable sources asynchronously under cooperative cancellation,
//! and keep the engine queue in the exact order the logical queue wants,
//! with the current track and its neighbors playable first.
//!
//! **Architecture:** A single `QueueSyncScheduler` orchestrates the
//! `MiddleOutEnqueuer`, the resolver adapter, the `SeekCoordinator`, and the
//! `PlaybackPositionTracker`. All external collaborators (engine, source
//! fetcher, state container intents, position persistence) are trait seams.

pub mod engine;
pub mod intents;
pub mod position;
pub mod resolver;
pub mod scheduler;
pub mod seek;
pub mod state;

pub use scheduler::QueueSyncScheduler;
pub use state::SharedState;
