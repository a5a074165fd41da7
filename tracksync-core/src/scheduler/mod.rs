//! Queue sync scheduling
//!
//! `QueueSyncScheduler` is the top-level orchestrator. It observes logical
//! queue snapshots from the host state container, decides append-vs-rebuild,
//! owns the cancellation generation, and drives the middle-out enqueuer.
//! Engine transport events flow back in through `handle_engine_event` to
//! keep logical and engine state reconciled.
//!
//! Concurrency model: `reconcile` bodies are serialized by `sync_lock`; one
//! spawned expansion job exists per generation, and jobs chain on their
//! predecessor's join handle so no two generations ever mutate the engine
//! queue at the same time. Event handlers read state and dispatch intents;
//! the only engine mutation they issue (error-recovery `load`) goes through
//! the shared mutation lock.

mod enqueuer;
mod generation;

pub use enqueuer::{ExpandMode, ExpandOutcome, MiddleOutEnqueuer};
pub use generation::SyncGeneration;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use tracksync_common::config::SchedulerConfig;
use tracksync_common::events::{EngineEvent, EventBus, QueueView, SyncEvent, TransportState};
use tracksync_common::model::{LogicalQueueModel, PlayerBehavior, QueueTransition};

use crate::engine::PlayerEngine;
use crate::intents::QueueIntents;
use crate::position::{PlaybackPositionTracker, PositionStore};
use crate::resolver::{Resolver, SourceFetcher};
use crate::seek::SeekCoordinator;
use crate::state::{ActiveTrack, SharedState};

/// Mutable scheduler state, guarded by one mutex
struct SchedulerInner {
    /// The current (only mutation-authorized) generation
    generation: SyncGeneration,

    /// Model whose sync job last ran to completion
    synced: Option<LogicalQueueModel>,

    /// Model handed to the most recent job (completed or in flight).
    /// Diffing runs against this so a superseding reconcile covers exactly
    /// the delta the in-flight job was already committed to.
    target: Option<LogicalQueueModel>,

    /// Join handle of the in-flight (or most recent) expansion job
    job: Option<JoinHandle<()>>,
}

/// Orchestrates queue synchronization between the logical queue and the
/// playback engine
pub struct QueueSyncScheduler {
    engine: Arc<dyn PlayerEngine>,
    resolver: Arc<Resolver>,
    intents: Arc<dyn QueueIntents>,
    enqueuer: MiddleOutEnqueuer,
    seek: Arc<SeekCoordinator>,
    positions: Arc<PlaybackPositionTracker>,
    shared: Arc<SharedState>,
    bus: EventBus,
    config: SchedulerConfig,

    /// Serializes reconcile bodies
    sync_lock: Mutex<()>,

    /// Serializes engine queue mutations across the enqueuer and the
    /// scheduler's own reset/load calls
    mutation_lock: Arc<Mutex<()>>,

    inner: Mutex<SchedulerInner>,
}

impl QueueSyncScheduler {
    pub fn new(
        engine: Arc<dyn PlayerEngine>,
        fetcher: Arc<dyn SourceFetcher>,
        intents: Arc<dyn QueueIntents>,
        position_store: Arc<dyn PositionStore>,
        user_id: String,
        config: SchedulerConfig,
    ) -> Arc<Self> {
        let resolver = Arc::new(Resolver::new(fetcher, config.max_resolution_retries));
        let mutation_lock = Arc::new(Mutex::new(()));
        let enqueuer = MiddleOutEnqueuer::new(
            Arc::clone(&engine),
            Arc::clone(&resolver),
            Arc::clone(&mutation_lock),
        );
        let seek = Arc::new(SeekCoordinator::new(Arc::clone(&engine)));
        let positions = Arc::new(PlaybackPositionTracker::new(
            position_store,
            user_id,
            config.end_buffer_secs,
        ));
        let bus = EventBus::new(config.event_channel_capacity);

        Arc::new(Self {
            engine,
            resolver,
            intents,
            enqueuer,
            seek,
            positions,
            shared: Arc::new(SharedState::new()),
            bus,
            config,
            sync_lock: Mutex::new(()),
            mutation_lock,
            inner: Mutex::new(SchedulerInner {
                generation: SyncGeneration::new(0),
                synced: None,
                target: None,
                job: None,
            }),
        })
    }

    pub fn shared(&self) -> &Arc<SharedState> {
        &self.shared
    }

    pub fn resolver(&self) -> &Arc<Resolver> {
        &self.resolver
    }

    /// Subscribe to consumer-facing sync events
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<SyncEvent> {
        self.bus.subscribe()
    }

    /// Reconcile the engine queue with a new logical queue snapshot.
    ///
    /// Fire-and-forget from the caller's perspective: decisions and any
    /// engine reset happen before this returns, expansion continues in a
    /// background job. Calls are internally serialized.
    pub async fn reconcile(self: &Arc<Self>, model: LogicalQueueModel) {
        let _guard = self.sync_lock.lock().await;

        let basis = {
            let inner = self.inner.lock().await;
            inner.target.clone().or_else(|| inner.synced.clone())
        };
        let transition = model.transition_from(basis.as_ref());
        debug!(
            "Reconcile: {} entries, current {:?}, transition {:?}",
            model.entries.len(),
            model.current_index,
            transition
        );

        match transition {
            QueueTransition::Unchanged => {}
            QueueTransition::Append { start } => self.start_append(model, start).await,
            QueueTransition::Rebuild => self.start_rebuild(model).await,
            QueueTransition::Clear => self.clear_queue(model).await,
        }
    }

    /// Append-only sync: no cancellation, no engine reset. The job chains
    /// on any in-flight predecessor so adds stay ordered.
    async fn start_append(self: &Arc<Self>, model: LogicalQueueModel, start: usize) {
        let (generation, previous_job) = {
            let mut inner = self.inner.lock().await;
            inner.target = Some(model.clone());
            (inner.generation.clone(), inner.job.take())
        };

        info!(
            "Appending {} entries under generation {}",
            model.entries.len() - start,
            generation.id()
        );

        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            if let Some(job) = previous_job {
                let _ = job.await;
            }
            if generation.is_cancelled() {
                return;
            }

            let outcome = this
                .enqueuer
                .expand(
                    &generation,
                    0,
                    &model.entries[start..],
                    model.offline_mode,
                    ExpandMode::Append,
                )
                .await;

            if let ExpandOutcome::Completed { added, .. } = outcome {
                this.finish_job(&generation, model.clone()).await;
                this.bus.emit_lossy(SyncEvent::QueueAppended {
                    generation: generation.id(),
                    added,
                    timestamp: chrono::Utc::now(),
                });
            }
        });
        self.inner.lock().await.job = Some(handle);
    }

    /// Full resync: supersede the old generation, wait for its cooperative
    /// exit, reset the engine, get the anchor playing, then expand
    /// middle-out in the background.
    async fn start_rebuild(self: &Arc<Self>, model: LogicalQueueModel) {
        let (generation, previous_job) = self.supersede(model.clone()).await;
        if let Some(job) = previous_job {
            // Cooperative exit; the old job stops at its next checkpoint
            let _ = job.await;
        }

        info!(
            "Rebuilding queue under generation {} ({} entries)",
            generation.id(),
            model.entries.len()
        );

        {
            let _mutation = self.mutation_lock.lock().await;
            if let Err(e) = self.engine.reset().await {
                warn!("Engine reset failed: {}", e);
                self.stalled(format!("reset failed: {}", e));
                return;
            }
        }

        // Anchor first, so playback starts with minimal latency. A rebuild
        // transition always carries an active index; Clear handles the rest.
        let Some(anchor) = model.current_index else {
            return;
        };
        let entry = model.entries[anchor].clone();
        let retry_count = self.resolver.cache().retry_count(&entry.track_id).await;
        match self
            .resolver
            .resolve(&entry, model.offline_mode, retry_count)
            .await
        {
            Ok(descriptor) => {
                let added = {
                    let _mutation = self.mutation_lock.lock().await;
                    self.engine.add(descriptor).await
                };
                match added {
                    Ok(()) => {
                        if let Err(e) = self.engine.play().await {
                            warn!("Play after anchor add failed: {}", e);
                        }
                    }
                    Err(e) => {
                        warn!("Anchor add for {} failed: {}", entry.track_id, e);
                        self.stalled(format!("anchor add failed: {}", e));
                    }
                }
            }
            Err(e) => {
                // Only this entry is lost; expansion still runs and the
                // anchor is retried on the next reconcile
                warn!("Anchor resolution for {} failed: {}", entry.track_id, e);
            }
        }

        self.shared
            .set_active(Some(ActiveTrack {
                index: anchor,
                entry: entry.clone(),
            }))
            .await;
        self.bus.emit_lossy(SyncEvent::TrackChanged {
            uid: entry.uid,
            track_id: entry.track_id.clone(),
            index: anchor,
            timestamp: chrono::Utc::now(),
        });

        // Long-form re-entry resumes from the saved position
        if let Some(position) = self.positions.resume_position(&entry).await {
            self.seek.request_seek(position).await;
        }

        let this = Arc::clone(self);
        let job_generation = generation.clone();
        let handle = tokio::spawn(async move {
            let outcome = this
                .enqueuer
                .expand(
                    &job_generation,
                    anchor,
                    &model.entries,
                    model.offline_mode,
                    ExpandMode::Rebuild,
                )
                .await;

            if let ExpandOutcome::Completed { added, skipped } = outcome {
                this.finish_job(&job_generation, model.clone()).await;
                debug!(
                    "Generation {} synced: {} added, {} skipped",
                    job_generation.id(),
                    added,
                    skipped
                );
                this.bus.emit_lossy(SyncEvent::QueueSynced {
                    generation: job_generation.id(),
                    entry_count: model.entries.len(),
                    timestamp: chrono::Utc::now(),
                });
            }
        });
        self.inner.lock().await.job = Some(handle);
    }

    /// Empty model: cancel outstanding work and drop the engine queue
    async fn clear_queue(self: &Arc<Self>, model: LogicalQueueModel) {
        let (generation, previous_job) = self.supersede(model.clone()).await;
        if let Some(job) = previous_job {
            let _ = job.await;
        }

        info!("Clearing engine queue (generation {})", generation.id());
        {
            let _mutation = self.mutation_lock.lock().await;
            if let Err(e) = self.engine.reset().await {
                warn!("Engine reset failed: {}", e);
                self.stalled(format!("reset failed: {}", e));
            }
        }
        self.shared.set_active(None).await;

        let mut inner = self.inner.lock().await;
        inner.synced = Some(model);
    }

    /// Cancel the current generation and install its successor
    async fn supersede(
        &self,
        target: LogicalQueueModel,
    ) -> (SyncGeneration, Option<JoinHandle<()>>) {
        let mut inner = self.inner.lock().await;
        inner.generation.cancel();
        let next = SyncGeneration::new(inner.generation.id() + 1);
        inner.generation = next.clone();
        inner.target = Some(target);
        (next, inner.job.take())
    }

    /// Record a completed job's snapshot and prune the media cache.
    /// A superseded job records nothing.
    async fn finish_job(&self, generation: &SyncGeneration, model: LogicalQueueModel) {
        {
            let mut inner = self.inner.lock().await;
            if generation.is_cancelled() || inner.generation.id() != generation.id() {
                return;
            }
            inner.synced = Some(model.clone());
        }
        self.resolver
            .cache()
            .prune(model.entries.iter().map(|e| e.track_id.as_str()))
            .await;
    }

    fn stalled(&self, reason: String) {
        self.bus.emit_lossy(SyncEvent::QueueStalled {
            reason,
            timestamp: chrono::Utc::now(),
        });
    }

    /// Handle a transport event from the engine.
    ///
    /// Handlers read and compare state, dispatch intents, and schedule
    /// seeks; they never mutate the engine queue except the error-recovery
    /// `load`, which goes through the mutation lock.
    pub async fn handle_engine_event(self: &Arc<Self>, event: EngineEvent) {
        match event {
            EngineEvent::ActiveTrackChanged {
                index,
                last_position_secs,
            } => {
                self.on_active_track_changed(index, last_position_secs)
                    .await;
            }
            EngineEvent::PlaybackError { code } => self.on_playback_error(code).await,
            EngineEvent::PlaybackStateChanged { state } => {
                self.shared.set_transport(state).await;
                self.seek.on_transport_changed(state).await;
                if state == TransportState::Playing {
                    // Confirmed playback forgives earlier errors on this track
                    if let Some(active) = self.shared.active().await {
                        self.resolver
                            .cache()
                            .clear_retry(&active.entry.track_id)
                            .await;
                    }
                }
                self.bus.emit_lossy(SyncEvent::TransportChanged {
                    state,
                    timestamp: chrono::Utc::now(),
                });
            }
            EngineEvent::RemotePlay => {
                if let Err(e) = self.engine.play().await {
                    warn!("Remote play failed: {}", e);
                }
            }
            EngineEvent::RemotePause => {
                if let Err(e) = self.engine.pause().await {
                    warn!("Remote pause failed: {}", e);
                }
            }
            EngineEvent::RemoteNext => self.intents.next().await,
            EngineEvent::RemotePrevious => self.intents.previous().await,
            EngineEvent::RemoteSeek { position_secs } => {
                self.seek.request_seek(position_secs).await;
            }
            EngineEvent::RemoteJumpForward => {
                let position = self.engine.position_secs().await;
                self.seek
                    .request_seek(position + self.config.jump_interval_secs)
                    .await;
            }
            EngineEvent::RemoteJumpBackward => {
                let position = self.engine.position_secs().await;
                self.seek
                    .request_seek((position - self.config.jump_interval_secs).max(0.0))
                    .await;
            }
        }
    }

    /// The engine moved to a new queue index on its own (track end or
    /// native auto-advance). Decide whether to trust it.
    async fn on_active_track_changed(self: &Arc<Self>, index: usize, last_position_secs: f64) {
        let model = {
            let inner = self.inner.lock().await;
            inner.target.clone().or_else(|| inner.synced.clone())
        };
        let Some(model) = model else {
            return;
        };

        // Completion bookkeeping for the outgoing long-form track
        if let Some(outgoing) = self.shared.active().await {
            if outgoing.entry.kind.is_long_form() {
                if let Some(descriptor) =
                    self.resolver.cache().get(&outgoing.entry.track_id).await
                {
                    self.positions
                        .note_track_ended(
                            &outgoing.entry,
                            last_position_secs,
                            descriptor.duration_secs,
                        )
                        .await;
                }
            }
        }

        // With shuffle on, engine-native order diverges from the desired
        // randomized order; the owning state container picks what's next
        if model.shuffle_enabled {
            debug!("Engine advance under shuffle: requesting next from host");
            self.intents.next().await;
            return;
        }

        let Some(entry) = model.entries.get(index).cloned() else {
            warn!(
                "Engine advanced to index {} beyond logical queue ({} entries)",
                index,
                model.entries.len()
            );
            return;
        };

        // Chained skip over inaccessible tracks
        if entry.behavior == PlayerBehavior::SkipInaccessible {
            debug!("Engine landed on inaccessible {}; skipping", entry.track_id);
            self.intents.next().await;
            return;
        }

        self.intents.update_index(index).await;
        if entry.behavior == PlayerBehavior::PreviewOnly {
            self.intents
                .set_active_track(entry.track_id.clone(), entry.uid, true)
                .await;
        }
        self.shared
            .set_active(Some(ActiveTrack {
                index,
                entry: entry.clone(),
            }))
            .await;
        self.bus.emit_lossy(SyncEvent::TrackChanged {
            uid: entry.uid,
            track_id: entry.track_id.clone(),
            index,
            timestamp: chrono::Utc::now(),
        });

        if let Some(position) = self.positions.resume_position(&entry).await {
            self.seek.request_seek(position).await;
        }
    }

    /// Replace only the failed active entry; the rest of the queue stays.
    async fn on_playback_error(self: &Arc<Self>, code: String) {
        let Some(active) = self.shared.active().await else {
            debug!("Playback error {} with no active track; ignoring", code);
            return;
        };
        warn!(
            "Playback error {} on active track {}",
            code, active.entry.track_id
        );

        let offline_collection = {
            let inner = self.inner.lock().await;
            inner
                .target
                .as_ref()
                .or(inner.synced.as_ref())
                .map(|m| m.offline_mode)
                .unwrap_or(false)
        };

        match self
            .resolver
            .recover_active(&active.entry, offline_collection)
            .await
        {
            Ok((descriptor, retry_count)) => {
                let engine_index = self.engine.active_index().await.unwrap_or(active.index);
                let loaded = {
                    let _mutation = self.mutation_lock.lock().await;
                    self.engine.load(engine_index, descriptor).await
                };
                match loaded {
                    Ok(()) => {
                        self.bus.emit_lossy(SyncEvent::TrackRecovered {
                            track_id: active.entry.track_id.clone(),
                            retry_count,
                            timestamp: chrono::Utc::now(),
                        });
                        if let Err(e) = self.engine.play().await {
                            warn!("Play after recovery failed: {}", e);
                        }
                    }
                    Err(e) => {
                        warn!("Reload of {} failed: {}", active.entry.track_id, e);
                        self.stalled(format!("recovery load failed: {}", e));
                    }
                }
            }
            Err(e) => {
                // Permanently unresolvable: silently move on to the next
                // viable track
                warn!("Giving up on {}: {}", active.entry.track_id, e);
                self.intents.next().await;
            }
        }
    }

    /// Seek within the active track (deferred while the engine can't)
    pub async fn request_seek(&self, seconds: f64) {
        if self.shared.active().await.is_none() {
            debug!("Seek to {:.1}s ignored: no active track", seconds);
            return;
        }
        self.seek.request_seek(seconds).await;
    }

    /// Restart the current track from zero; `counter` is the host's
    /// monotonically increasing restart signal
    pub async fn request_restart(&self, counter: u64) {
        let index = self.shared.active().await.map(|a| a.index);
        self.seek.request_restart(counter, index).await;
    }

    /// Change the playback rate (long-form listening speed)
    pub async fn request_rate_change(&self, multiplier: f64) {
        if let Err(e) = self.engine.set_rate(multiplier).await {
            warn!("Rate change to {:.2}x failed: {}", multiplier, e);
            return;
        }
        self.shared.set_rate(multiplier).await;
    }

    /// Current effective queue state for display
    pub async fn queue_view(&self) -> QueueView {
        let entries = {
            let inner = self.inner.lock().await;
            inner
                .target
                .as_ref()
                .or(inner.synced.as_ref())
                .map(|m| m.entries.clone())
                .unwrap_or_default()
        };
        QueueView {
            entries,
            current_index: self.shared.active().await.map(|a| a.index),
            transport: self.shared.transport().await,
        }
    }

    /// Spawn the periodic long-form progress writer
    pub fn spawn_position_poller(&self) -> JoinHandle<()> {
        Arc::clone(&self.positions).spawn_poller(
            Arc::clone(&self.engine),
            Arc::clone(&self.shared),
            Duration::from_secs(self.config.position_save_interval_secs),
        )
    }

    /// Wait for all in-flight sync jobs to finish (tests, shutdown)
    pub async fn wait_idle(&self) {
        loop {
            let job = self.inner.lock().await.job.take();
            match job {
                Some(handle) => {
                    let _ = handle.await;
                }
                None => break,
            }
        }
    }
}
