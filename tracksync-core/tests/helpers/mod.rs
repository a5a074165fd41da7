//! Shared test fixtures: call-recording mock engine, scripted source
//! fetcher, intent recorder, and an in-memory position store.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use tracksync_common::config::SchedulerConfig;
use tracksync_common::events::TransportState;
use tracksync_common::model::{
    LogicalQueueModel, PlayerBehavior, QueueEntry, RepeatMode, TrackKind,
};
use tracksync_common::{Error, Result};
use tracksync_core::engine::{EngineQueueSnapshot, MediaDescriptor, PlayerEngine};
use tracksync_core::intents::QueueIntents;
use tracksync_core::position::{PlaybackPositionRecord, PositionStore};
use tracksync_core::resolver::SourceFetcher;
use tracksync_core::QueueSyncScheduler;

// ========================================
// Model builders
// ========================================

pub fn entry(track_id: &str) -> QueueEntry {
    QueueEntry {
        track_id: track_id.to_string(),
        uid: Uuid::new_v4(),
        behavior: PlayerBehavior::FullPlay,
        kind: TrackKind::Music,
        offline_available: false,
    }
}

pub fn entry_with(track_id: &str, behavior: PlayerBehavior, kind: TrackKind) -> QueueEntry {
    QueueEntry {
        track_id: track_id.to_string(),
        uid: Uuid::new_v4(),
        behavior,
        kind,
        offline_available: false,
    }
}

pub fn model(entries: Vec<QueueEntry>, current: usize) -> LogicalQueueModel {
    LogicalQueueModel {
        entries,
        current_index: Some(current),
        shuffle_enabled: false,
        repeat_mode: RepeatMode::Off,
        offline_mode: false,
    }
}

// ========================================
// Mock playback engine
// ========================================

/// One recorded engine mutation/transport call
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Add {
        track_id: String,
        /// None = tail insert, Some(i) = positional insert
        at: Option<usize>,
    },
    Remove(Vec<usize>),
    Reset,
    Load {
        index: usize,
        track_id: String,
    },
    Play,
    Pause,
    SeekTo(f64),
    SetRate(f64),
}

/// Engine double that records every call in order and maintains a real
/// internal queue so insert positions can be verified.
pub struct MockEngine {
    calls: Mutex<Vec<EngineCall>>,
    queue: Mutex<Vec<MediaDescriptor>>,
    state: Mutex<TransportState>,
    active: Mutex<Option<usize>>,
    position: Mutex<f64>,
    fail_adds: AtomicBool,
    /// Invoked with the running add count after each successful add
    add_hook: Mutex<Option<Box<dyn Fn(usize) + Send + Sync>>>,
}

impl MockEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            queue: Mutex::new(Vec::new()),
            state: Mutex::new(TransportState::Idle),
            active: Mutex::new(None),
            position: Mutex::new(0.0),
            fail_adds: AtomicBool::new(false),
            add_hook: Mutex::new(None),
        })
    }

    pub fn set_state(&self, state: TransportState) {
        *self.state.lock().unwrap() = state;
    }

    pub fn set_active(&self, index: Option<usize>) {
        *self.active.lock().unwrap() = index;
    }

    pub fn set_position(&self, seconds: f64) {
        *self.position.lock().unwrap() = seconds;
    }

    pub fn set_fail_adds(&self, fail: bool) {
        self.fail_adds.store(fail, Ordering::SeqCst);
    }

    pub fn set_add_hook(&self, hook: Box<dyn Fn(usize) + Send + Sync>) {
        *self.add_hook.lock().unwrap() = Some(hook);
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Only the add calls, in order
    pub fn adds(&self) -> Vec<EngineCall> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, EngineCall::Add { .. }))
            .collect()
    }

    pub fn seeks(&self) -> Vec<f64> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                EngineCall::SeekTo(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, predicate: impl Fn(&EngineCall) -> bool) -> usize {
        self.calls().iter().filter(|c| predicate(c)).count()
    }

    /// Track ids of the engine queue, in queue order
    pub fn queue_track_ids(&self) -> Vec<String> {
        self.queue
            .lock()
            .unwrap()
            .iter()
            .map(|d| d.track_id.clone())
            .collect()
    }

    fn record(&self, call: EngineCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn run_add_hook(&self) {
        let count = self
            .calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| matches!(c, EngineCall::Add { .. }))
            .count();
        if let Some(hook) = self.add_hook.lock().unwrap().as_ref() {
            hook(count);
        }
    }
}

#[async_trait]
impl PlayerEngine for MockEngine {
    async fn add(&self, descriptor: MediaDescriptor) -> Result<()> {
        if self.fail_adds.load(Ordering::SeqCst) {
            return Err(Error::EngineMutation("mock add failure".to_string()));
        }
        self.record(EngineCall::Add {
            track_id: descriptor.track_id.clone(),
            at: None,
        });
        self.queue.lock().unwrap().push(descriptor);
        self.run_add_hook();
        Ok(())
    }

    async fn add_at(&self, descriptor: MediaDescriptor, index: usize) -> Result<()> {
        if self.fail_adds.load(Ordering::SeqCst) {
            return Err(Error::EngineMutation("mock add failure".to_string()));
        }
        self.record(EngineCall::Add {
            track_id: descriptor.track_id.clone(),
            at: Some(index),
        });
        self.queue.lock().unwrap().insert(index, descriptor);
        self.run_add_hook();
        Ok(())
    }

    async fn remove(&self, indices: &[usize]) -> Result<()> {
        self.record(EngineCall::Remove(indices.to_vec()));
        let mut queue = self.queue.lock().unwrap();
        let mut sorted = indices.to_vec();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        for index in sorted {
            if index < queue.len() {
                queue.remove(index);
            }
        }
        Ok(())
    }

    async fn reset(&self) -> Result<()> {
        self.record(EngineCall::Reset);
        self.queue.lock().unwrap().clear();
        *self.active.lock().unwrap() = None;
        Ok(())
    }

    async fn load(&self, index: usize, descriptor: MediaDescriptor) -> Result<()> {
        self.record(EngineCall::Load {
            index,
            track_id: descriptor.track_id.clone(),
        });
        let mut queue = self.queue.lock().unwrap();
        if index < queue.len() {
            queue[index] = descriptor;
        } else {
            queue.push(descriptor);
        }
        Ok(())
    }

    async fn play(&self) -> Result<()> {
        self.record(EngineCall::Play);
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        self.record(EngineCall::Pause);
        Ok(())
    }

    async fn seek_to(&self, seconds: f64) -> Result<()> {
        self.record(EngineCall::SeekTo(seconds));
        Ok(())
    }

    async fn set_rate(&self, multiplier: f64) -> Result<()> {
        self.record(EngineCall::SetRate(multiplier));
        Ok(())
    }

    async fn queue_snapshot(&self) -> EngineQueueSnapshot {
        EngineQueueSnapshot {
            descriptors: self.queue.lock().unwrap().clone(),
            active_index: *self.active.lock().unwrap(),
            state: *self.state.lock().unwrap(),
        }
    }

    async fn active_index(&self) -> Option<usize> {
        *self.active.lock().unwrap()
    }

    async fn transport_state(&self) -> TransportState {
        *self.state.lock().unwrap()
    }

    async fn position_secs(&self) -> f64 {
        *self.position.lock().unwrap()
    }
}

// ========================================
// Scripted source fetcher
// ========================================

/// Fetcher double: counts fetches per track, can fail selected tracks,
/// and hands out a distinct URL per fetch so cache bypass is observable.
pub struct MockFetcher {
    fetch_counts: Mutex<HashMap<String, usize>>,
    failing: Mutex<HashSet<String>>,
    local: Mutex<HashMap<String, MediaDescriptor>>,
    durations: Mutex<HashMap<String, f64>>,
}

impl MockFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            fetch_counts: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            local: Mutex::new(HashMap::new()),
            durations: Mutex::new(HashMap::new()),
        })
    }

    pub fn fail_track(&self, track_id: &str) {
        self.failing.lock().unwrap().insert(track_id.to_string());
    }

    pub fn unfail_track(&self, track_id: &str) {
        self.failing.lock().unwrap().remove(track_id);
    }

    pub fn set_duration(&self, track_id: &str, duration_secs: f64) {
        self.durations
            .lock()
            .unwrap()
            .insert(track_id.to_string(), duration_secs);
    }

    pub fn add_local(&self, track_id: &str, path: &str) {
        let descriptor = MediaDescriptor {
            track_id: track_id.to_string(),
            url: path.to_string(),
            duration_secs: 180.0,
            title: track_id.to_string(),
            artist: "artist".to_string(),
            artwork_url: None,
        };
        self.local
            .lock()
            .unwrap()
            .insert(track_id.to_string(), descriptor);
    }

    pub fn fetch_count(&self, track_id: &str) -> usize {
        self.fetch_counts
            .lock()
            .unwrap()
            .get(track_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn clear_counts(&self) {
        self.fetch_counts.lock().unwrap().clear();
    }
}

#[async_trait]
impl SourceFetcher for MockFetcher {
    async fn fetch(&self, track_id: &str, _behavior: PlayerBehavior) -> Result<MediaDescriptor> {
        let count = {
            let mut counts = self.fetch_counts.lock().unwrap();
            let count = counts.entry(track_id.to_string()).or_insert(0);
            *count += 1;
            *count
        };
        if self.failing.lock().unwrap().contains(track_id) {
            return Err(Error::Resolution {
                track_id: track_id.to_string(),
                message: "mock fetch failure".to_string(),
                retryable: true,
            });
        }
        let duration = self
            .durations
            .lock()
            .unwrap()
            .get(track_id)
            .copied()
            .unwrap_or(180.0);
        Ok(MediaDescriptor {
            track_id: track_id.to_string(),
            url: format!("https://cdn.example/{}?sig={}", track_id, count),
            duration_secs: duration,
            title: track_id.to_string(),
            artist: "artist".to_string(),
            artwork_url: None,
        })
    }

    async fn local_source(&self, track_id: &str) -> Option<MediaDescriptor> {
        self.local.lock().unwrap().get(track_id).cloned()
    }
}

// ========================================
// Intent recorder
// ========================================

#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    Next,
    Previous,
    UpdateIndex(usize),
    SetActiveTrack {
        track_id: String,
        previewing: bool,
    },
}

/// State-container double recording dispatched intents in order
pub struct RecordedIntents {
    intents: Mutex<Vec<Intent>>,
}

impl RecordedIntents {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            intents: Mutex::new(Vec::new()),
        })
    }

    pub fn intents(&self) -> Vec<Intent> {
        self.intents.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.intents.lock().unwrap().clear();
    }
}

#[async_trait]
impl QueueIntents for RecordedIntents {
    async fn next(&self) {
        self.intents.lock().unwrap().push(Intent::Next);
    }

    async fn previous(&self) {
        self.intents.lock().unwrap().push(Intent::Previous);
    }

    async fn update_index(&self, index: usize) {
        self.intents
            .lock()
            .unwrap()
            .push(Intent::UpdateIndex(index));
    }

    async fn set_active_track(&self, track_id: String, _uid: Uuid, previewing: bool) {
        self.intents.lock().unwrap().push(Intent::SetActiveTrack {
            track_id,
            previewing,
        });
    }
}

// ========================================
// In-memory position store
// ========================================

pub struct MemoryPositionStore {
    records: Mutex<HashMap<(String, String), PlaybackPositionRecord>>,
}

impl MemoryPositionStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            records: Mutex::new(HashMap::new()),
        })
    }

    pub fn seed(&self, record: PlaybackPositionRecord) {
        self.records
            .lock()
            .unwrap()
            .insert((record.user_id.clone(), record.track_id.clone()), record);
    }

    pub fn get(&self, user_id: &str, track_id: &str) -> Option<PlaybackPositionRecord> {
        self.records
            .lock()
            .unwrap()
            .get(&(user_id.to_string(), track_id.to_string()))
            .cloned()
    }
}

#[async_trait]
impl PositionStore for MemoryPositionStore {
    async fn load(&self, user_id: &str, track_id: &str) -> Result<Option<PlaybackPositionRecord>> {
        Ok(self.get(user_id, track_id))
    }

    async fn save(&self, record: PlaybackPositionRecord) -> Result<()> {
        self.seed(record);
        Ok(())
    }
}

// ========================================
// Harness
// ========================================

pub struct Harness {
    pub scheduler: Arc<QueueSyncScheduler>,
    pub engine: Arc<MockEngine>,
    pub fetcher: Arc<MockFetcher>,
    pub intents: Arc<RecordedIntents>,
    pub store: Arc<MemoryPositionStore>,
}

pub fn harness() -> Harness {
    harness_with_config(SchedulerConfig::default())
}

/// Route scheduler logs through the test writer; `RUST_LOG` filters as usual
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn harness_with_config(config: SchedulerConfig) -> Harness {
    init_tracing();
    let engine = MockEngine::new();
    let fetcher = MockFetcher::new();
    let intents = RecordedIntents::new();
    let store = MemoryPositionStore::new();
    let scheduler = QueueSyncScheduler::new(
        engine.clone(),
        fetcher.clone(),
        intents.clone(),
        store.clone(),
        "user-1".to_string(),
        config,
    );
    Harness {
        scheduler,
        engine,
        fetcher,
        intents,
        store,
    }
}
