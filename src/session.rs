//! Session-lifetime bookkeeping and the observable snapshot.
//!
//! [`SessionHistory`] owns the PlayedSet and ListenedSet. Both only grow
//! while the session lives; [`SessionHistory::reset`] exists for tests and for
//! starting a fresh session in-process.

use crate::sleep_timer::SleepTimerState;
use crate::song::{FileId, RepeatMode, Song};
use serde::Serialize;
use std::collections::HashSet;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct SessionHistory {
    played: HashSet<FileId>,
    listened: HashSet<FileId>,
}

impl SessionHistory {
    /// Record that `song` was started. Returns `false` if it already was.
    pub fn mark_played(&mut self, song: &Song) -> bool {
        self.played.insert(song.file_id.clone())
    }

    /// Record a genuine listen. A listened song is always a played song.
    pub fn mark_listened(&mut self, song: &Song) -> bool {
        self.played.insert(song.file_id.clone());
        self.listened.insert(song.file_id.clone())
    }

    #[must_use]
    pub fn is_played(&self, file_id: &FileId) -> bool {
        self.played.contains(file_id)
    }

    #[must_use]
    pub fn is_listened(&self, file_id: &FileId) -> bool {
        self.listened.contains(file_id)
    }

    #[must_use]
    pub fn played(&self) -> &HashSet<FileId> {
        &self.played
    }

    #[must_use]
    pub fn listened(&self) -> &HashSet<FileId> {
        &self.listened
    }

    pub fn reset(&mut self) {
        self.played.clear();
        self.listened.clear();
    }
}

/// Coarse playback state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerStatus {
    Idle,
    Playing,
    Paused,
}

/// Read-only view of everything a UI or test harness observes.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub current_song: Option<Song>,
    pub status: PlayerStatus,
    pub is_playing: bool,
    #[serde(serialize_with = "as_secs")]
    pub position: Duration,
    #[serde(serialize_with = "opt_as_secs")]
    pub duration: Option<Duration>,
    pub volume: f32,
    pub shuffle_enabled: bool,
    pub repeat_mode: RepeatMode,
    pub personalized: Vec<Song>,
    pub cursor: usize,
    pub queue: Vec<Song>,
    pub sleep_timer: SleepTimerState,
    /// A recommendation request is outstanding.
    pub loading: bool,
}

fn as_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

fn opt_as_secs<S: serde::Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
    match d {
        Some(d) => s.serialize_some(&d.as_secs_f64()),
        None => s.serialize_none(),
    }
}
