//! # Listen Tracking
//!
//! Decides whether a playback span was a genuine listen or a skip. A span is
//! measured from [`ListenTracker::on_song_start`] to the next
//! [`ListenTracker::on_song_stop`], which is called on every skip, advance,
//! previous, close and natural end of track.
//!
//! A span counts as a listen only when it is **strictly** longer than the
//! configured threshold (20 seconds by default); exactly 20.0 seconds is a
//! skip. Listens land in the session-wide ListenedSet and in the evidence for
//! the current personalization batch. Skips leave only the PlayedSet entry
//! that was made when the song started.

use crate::clock::Clock;
use crate::session::SessionHistory;
use crate::song::Song;
use log::{debug, info};
use std::time::Duration;

/// Result of closing a playback span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenOutcome {
    Listened(Duration),
    Skipped(Duration),
}

impl ListenOutcome {
    #[must_use]
    pub fn is_listen(&self) -> bool {
        matches!(self, Self::Listened(_))
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        match *self {
            Self::Listened(d) | Self::Skipped(d) => d,
        }
    }
}

/// The span currently being measured.
#[derive(Debug, Clone)]
struct Span {
    song: Song,
    started_at: Duration,
}

/// Classifies playback spans and collects per-batch listen evidence.
#[derive(Debug, Clone)]
pub struct ListenTracker {
    threshold: Duration,
    current: Option<Span>,
    /// CurrentBatchListenedSongs, in listen order, unique by `file_id`.
    batch: Vec<Song>,
}

impl ListenTracker {
    #[must_use]
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            current: None,
            batch: Vec::new(),
        }
    }

    /// Start measuring `song`. Any span still open is discarded unclassified;
    /// callers stop the previous song first.
    pub fn on_song_start(&mut self, song: &Song, clock: &dyn Clock) {
        self.current = Some(Span {
            song: song.clone(),
            started_at: clock.now(),
        });
    }

    /// Close the open span and classify it.
    ///
    /// Returns `None` when nothing was being measured.
    pub fn on_song_stop(
        &mut self,
        clock: &dyn Clock,
        history: &mut SessionHistory,
    ) -> Option<(Song, ListenOutcome)> {
        let span = self.current.take()?;
        let elapsed = clock.now().saturating_sub(span.started_at);

        let outcome = if elapsed > self.threshold {
            history.mark_listened(&span.song);
            if self.batch.iter().any(|s| s.same_file(&span.song)) {
                debug!("{} already in current batch", span.song);
            } else {
                self.batch.push(span.song.clone());
            }
            info!(
                "Listened to {} for {:.1}s (batch size {})",
                span.song,
                elapsed.as_secs_f64(),
                self.batch.len()
            );
            ListenOutcome::Listened(elapsed)
        } else {
            info!("Skipped {} after {:.1}s", span.song, elapsed.as_secs_f64());
            ListenOutcome::Skipped(elapsed)
        };

        Some((span.song, outcome))
    }

    /// Reopen a span that was closed but whose song kept playing.
    pub fn resume(&mut self, song: &Song, started_at: Duration) {
        self.current = Some(Span {
            song: song.clone(),
            started_at,
        });
    }

    /// Whether a span is open.
    #[must_use]
    pub fn is_tracking(&self) -> bool {
        self.current.is_some()
    }

    /// Evidence for the next multi-seed recommendation.
    #[must_use]
    pub fn batch_listened(&self) -> &[Song] {
        &self.batch
    }

    /// Start a new personalization batch.
    pub fn reset_batch(&mut self) {
        if !self.batch.is_empty() {
            debug!("Resetting batch evidence ({} songs)", self.batch.len());
        }
        self.batch.clear();
    }

    /// Forget the open span and the batch.
    pub fn reset(&mut self) {
        self.current = None;
        self.batch.clear();
    }
}
