//! Playback orchestration with an adaptive, self-refilling queue.
//!
//! Core modules:
//! - [`controller`] - The playback state machine
//! - [`listen`] - Genuine-listen vs skip classification
//! - [`queue`] - The explicit, user-ordered queue
//! - [`personalization`] - Recommendation-driven personalized list
//! - [`sleep_timer`] - Countdown and after-current-song stop
//!
//! ### Supporting Modules
//!
//! - [`song`] - Song identity and repeat modes
//! - [`session`] - Played/listened sets and the observable snapshot
//! - [`catalog`] - Catalog collaborator trait and the SQLite implementation
//! - [`algorithm`] - Scoring used by the bundled recommender
//! - [`media`] - Media transport and artwork collaborators
//! - [`clock`] - Wall-clock and simulated time
//! - [`config`] - Data directory and session tunables
//! - [`error`] - Error taxonomy of the playback core
//! - [`simulate`] - Scripted sessions on simulated time
//! - [`cli`] / [`completion`] - Command-line surface
//!
//! ## Quick Start Example
//!
//! ```
//! use cadence::catalog::{Catalog, SqliteCatalog};
//! use cadence::clock::{Clock, ManualClock};
//! use cadence::config::SessionConfig;
//! use cadence::controller::PlaybackController;
//! use cadence::media::{CatalogDurationTransport, MediaTransport};
//! use cadence::song::{Song, UserId};
//! use std::rc::Rc;
//!
//! let mut catalog = SqliteCatalog::in_memory()?;
//! catalog.import_songs(&[
//!     Song::new("1", "So What", "Miles Davis"),
//!     Song::new("2", "Freddie Freeloader", "Miles Davis"),
//!     Song::new("3", "Blue in Green", "Miles Davis"),
//! ])?;
//!
//! let clock = Rc::new(ManualClock::new());
//! let mut player = PlaybackController::new(
//!     Rc::new(catalog) as Rc<dyn Catalog>,
//!     Rc::new(CatalogDurationTransport) as Rc<dyn MediaTransport>,
//!     Rc::clone(&clock) as Rc<dyn Clock>,
//!     SessionConfig::default(),
//! );
//! player.sign_in(UserId::from("me"));
//!
//! player.play(Song::new("1", "So What", "Miles Davis"));
//! player.process_pending();
//! assert_eq!(player.personalized().len(), 3);
//!
//! clock.advance_secs(25);
//! player.advance()?;
//! assert!(player.history().is_listened(&"1".into()));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Session Model
//!
//! - **Played**: every song that started this session. Never recommended again.
//! - **Listened**: songs that played for more than 20 seconds. Excluded from
//!   recommendation requests and used as seeds for the next batch.
//! - **Skipped**: anything stopped at or before 20 seconds.
//!
//! The next song comes from the explicit queue, then from the personalized
//! list, then from a fresh batch fetched once the list runs out.
//!
//! ## Error Handling
//!
//! The playback core reports [`error::PlayerError`]; every variant except an
//! invalid sleep timer leaves the session usable. Catalog setup, configuration
//! and the CLI use `anyhow::Result` with context.
//!
//! ## Testing
//!
//! ```bash
//! cargo test
//! cargo bench
//! ```

pub mod algorithm;
pub mod catalog;
pub mod cli;
pub mod clock;
pub mod completion;
pub mod config;
pub mod controller;
pub mod error;
pub mod listen;
pub mod media;
pub mod personalization;
pub mod queue;
pub mod session;
pub mod simulate;
pub mod sleep_timer;
pub mod song;
