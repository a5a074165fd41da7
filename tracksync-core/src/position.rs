//! Playback position persistence for long-form content
//!
//! Podcast and audiobook entries get per-user progress records so playback
//! resumes mid-track on re-entry. Music entries are never recorded.
//!
//! While a long-form track plays, an `InProgress` record is written on a
//! fixed interval. When a track ends within `end_buffer_secs` of its
//! duration it is marked `Completed` with position reset to zero, so the
//! next listen starts from the top.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use tracksync_common::events::TransportState;
use tracksync_common::model::QueueEntry;
use tracksync_common::Result;

use crate::engine::PlayerEngine;
use crate::state::SharedState;

/// Progress status of a long-form track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionStatus {
    InProgress,
    Completed,
}

/// One per-user progress record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackPositionRecord {
    pub user_id: String,
    pub track_id: String,
    pub status: PositionStatus,
    pub position_secs: f64,
    pub updated_at: DateTime<Utc>,
}

/// Persistence seam; the host owns the storage format
#[async_trait]
pub trait PositionStore: Send + Sync {
    async fn load(&self, user_id: &str, track_id: &str) -> Result<Option<PlaybackPositionRecord>>;
    async fn save(&self, record: PlaybackPositionRecord) -> Result<()>;
}

/// Records and reads long-form playback progress
pub struct PlaybackPositionTracker {
    store: Arc<dyn PositionStore>,
    user_id: String,
    end_buffer_secs: f64,
}

impl PlaybackPositionTracker {
    pub fn new(store: Arc<dyn PositionStore>, user_id: String, end_buffer_secs: f64) -> Self {
        Self {
            store,
            user_id,
            end_buffer_secs,
        }
    }

    /// Write an `InProgress` record for a playing long-form track.
    /// No-op for music entries.
    pub async fn record_progress(&self, entry: &QueueEntry, position_secs: f64) {
        if !entry.kind.is_long_form() {
            return;
        }
        self.save(entry, PositionStatus::InProgress, position_secs)
            .await;
    }

    /// Bookkeeping when a long-form track stops being the active track.
    ///
    /// Within `end_buffer_secs` of the duration counts as completed, and a
    /// completed record resets the position so re-entry starts from zero.
    pub async fn note_track_ended(
        &self,
        entry: &QueueEntry,
        last_position_secs: f64,
        duration_secs: f64,
    ) {
        if !entry.kind.is_long_form() {
            return;
        }
        if last_position_secs >= duration_secs - self.end_buffer_secs {
            self.save(entry, PositionStatus::Completed, 0.0).await;
        } else {
            self.save(entry, PositionStatus::InProgress, last_position_secs)
                .await;
        }
    }

    /// Saved position to resume from, if the track was left mid-way
    pub async fn resume_position(&self, entry: &QueueEntry) -> Option<f64> {
        if !entry.kind.is_long_form() {
            return None;
        }
        match self.store.load(&self.user_id, &entry.track_id).await {
            Ok(Some(record))
                if record.status == PositionStatus::InProgress && record.position_secs > 0.0 =>
            {
                Some(record.position_secs)
            }
            Ok(_) => None,
            Err(e) => {
                warn!("Loading position for {} failed: {}", entry.track_id, e);
                None
            }
        }
    }

    async fn save(&self, entry: &QueueEntry, status: PositionStatus, position_secs: f64) {
        let record = PlaybackPositionRecord {
            user_id: self.user_id.clone(),
            track_id: entry.track_id.clone(),
            status,
            position_secs,
            updated_at: Utc::now(),
        };
        if let Err(e) = self.store.save(record).await {
            // Progress persistence is best-effort
            warn!("Saving position for {} failed: {}", entry.track_id, e);
        }
    }

    /// Spawn the periodic progress writer.
    ///
    /// Polls the engine position on `interval` and records it while the
    /// transport is playing and the active track is long-form.
    pub fn spawn_poller(
        self: Arc<Self>,
        engine: Arc<dyn PlayerEngine>,
        shared: Arc<SharedState>,
        interval: Duration,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if shared.transport().await != TransportState::Playing {
                    continue;
                }
                let Some(active) = shared.active().await else {
                    continue;
                };
                if !active.entry.kind.is_long_form() {
                    continue;
                }
                let position = engine.position_secs().await;
                debug!(
                    "Progress for {}: {:.1}s",
                    active.entry.track_id, position
                );
                self.record_progress(&active.entry, position).await;
            }
        })
    }
}
