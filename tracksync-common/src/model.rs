//! Logical queue data model
//!
//! The logical queue is the application's desired play order, owned by the
//! host state container and delivered to the scheduler as an immutable
//! snapshot. This module defines the snapshot types and the append-vs-rebuild
//! diff the scheduler runs on every snapshot change.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-entry playback behavior, computed by the host from access rules.
/// Immutable for the life of the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerBehavior {
    /// Full track is playable
    FullPlay,
    /// Only a preview clip is playable (access-gated track)
    PreviewOnly,
    /// Track must be skipped entirely
    SkipInaccessible,
}

/// Content classification, supplied by the host's metadata.
///
/// Podcast and audiobook entries are "long-form": they get position
/// persistence and variable playback rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackKind {
    Music,
    Podcast,
    Audiobook,
}

impl TrackKind {
    /// Long-form content gets position persistence and rate control
    pub fn is_long_form(&self) -> bool {
        matches!(self, TrackKind::Podcast | TrackKind::Audiobook)
    }
}

/// Repeat mode of the logical queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatMode {
    Off,
    All,
    One,
}

/// One occurrence of a track in the logical queue
///
/// `uid` is the stable identity of this occurrence: the same track may appear
/// twice in a queue with two distinct uids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// External track identifier (resolution key)
    pub track_id: String,

    /// Stable identity of this occurrence in the queue
    pub uid: Uuid,

    /// Playback behavior for this entry
    pub behavior: PlayerBehavior,

    /// Content classification
    pub kind: TrackKind,

    /// Whether a downloaded local copy is flagged for this track
    pub offline_available: bool,
}

impl QueueEntry {
    /// Flags that, when changed, invalidate an append in favor of a rebuild
    fn sync_flags(&self) -> (PlayerBehavior, bool) {
        (self.behavior, self.offline_available)
    }
}

/// Immutable snapshot of the desired queue
///
/// Produced by the host state container, consumed by the scheduler. The
/// scheduler never mutates a model; it compares snapshots.
///
/// `current_index` is `None` when there is no active queue. When `Some`, it
/// must be `< entries.len()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicalQueueModel {
    pub entries: Vec<QueueEntry>,
    pub current_index: Option<usize>,
    pub shuffle_enabled: bool,
    pub repeat_mode: RepeatMode,
    /// Host-level offline mode (play downloads only)
    pub offline_mode: bool,
}

impl LogicalQueueModel {
    /// An empty model: nothing should be playing
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
            current_index: None,
            shuffle_enabled: false,
            repeat_mode: RepeatMode::Off,
            offline_mode: false,
        }
    }

    /// Entry at the current index, if any
    pub fn current_entry(&self) -> Option<&QueueEntry> {
        self.current_index.and_then(|i| self.entries.get(i))
    }

    /// Uids of all entries, in order
    pub fn uids(&self) -> Vec<Uuid> {
        self.entries.iter().map(|e| e.uid).collect()
    }

    /// Model-level flags that force a rebuild when they change
    fn sync_flags(&self) -> (bool, RepeatMode, bool) {
        (self.shuffle_enabled, self.repeat_mode, self.offline_mode)
    }

    /// Classify the transition from the last fully-synced snapshot.
    ///
    /// Append detection is deliberately conservative: a missed rebuild leaves
    /// the engine queue stale, which is a worse failure than one redundant
    /// rebuild. Any flag change, behavior change on a shared-prefix entry, or
    /// current-index change falls through to `Rebuild`.
    pub fn transition_from(&self, previous: Option<&LogicalQueueModel>) -> QueueTransition {
        if self.entries.is_empty() || self.current_index.is_none() {
            return QueueTransition::Clear;
        }

        let Some(prev) = previous else {
            return QueueTransition::Rebuild;
        };

        if prev.sync_flags() != self.sync_flags() || prev.current_index != self.current_index {
            return QueueTransition::Rebuild;
        }

        // The shared prefix must be identical in uid order *and* in the
        // flags that affect how each entry is resolved and played.
        let prefix_unchanged = prev.entries.len() <= self.entries.len()
            && prev
                .entries
                .iter()
                .zip(self.entries.iter())
                .all(|(a, b)| a.uid == b.uid && a.sync_flags() == b.sync_flags());

        if !prefix_unchanged {
            return QueueTransition::Rebuild;
        }

        if prev.entries.len() == self.entries.len() {
            QueueTransition::Unchanged
        } else {
            QueueTransition::Append {
                start: prev.entries.len(),
            }
        }
    }
}

/// Outcome of diffing a new model against the previously-synced one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueTransition {
    /// Same queue, same flags: nothing to do
    Unchanged,
    /// Previous uids are a strict prefix of the new ones; enqueue the suffix
    /// starting at `start` without touching the existing engine queue
    Append { start: usize },
    /// Anything else: reset the engine queue and re-sync from scratch
    Rebuild,
    /// Model is empty or has no active index: cancel and reset only
    Clear,
}
