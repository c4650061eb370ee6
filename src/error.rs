//! Error types for the playback core.
//!
//! The controller never fails hard: every variant here is either recovered
//! locally (and logged) or surfaced to the caller as a non-fatal condition.
//! The catalog, configuration and CLI layers keep using `anyhow` for context.

use std::time::Duration;
use thiserror::Error;

/// Errors produced by the playback core and its collaborators.
#[derive(Error, Debug)]
pub enum PlayerError {
    /// The recommender or catalog service could not answer.
    #[error("Recommendation fetch failed: {0}")]
    RecommendationFetchFailed(String),

    /// Queue, personalized list and replacement fetch are all exhausted.
    #[error("No more recommendations available")]
    NoMoreRecommendations,

    /// The operation needs a current song and there is none.
    #[error("Nothing is playing")]
    NothingPlaying,

    /// The media transport has not reported a duration yet.
    #[error("Media metadata unavailable after {attempts} attempt(s)")]
    MediaMetadataUnavailable { attempts: u32 },

    /// Sleep timers need at least one minute.
    #[error("Invalid sleep timer: {0:?}")]
    InvalidSleepTimer(Duration),

    /// Catalog collaborator errors that are not recommendation fetches.
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// SQLite errors from the bundled catalog.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl PlayerError {
    /// Whether the playback state machine can carry on unchanged.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::InvalidSleepTimer(_))
    }
}

/// Convenience Result type using [`PlayerError`].
pub type Result<T> = std::result::Result<T, PlayerError>;
