//! # Playback Controller
//!
//! The state machine at the centre of a listening session. It owns the
//! explicit queue, the personalized list, the session history, the listen
//! tracker and the sleep timer, and talks to the outside world only through
//! the [`Catalog`], [`MediaTransport`] and [`Clock`] collaborators.
//!
//! ## Next-song priority
//!
//! 1. The explicit queue, if it has items.
//! 2. The next entry of the personalized list (refilled near its end).
//! 3. A fresh batch fetched inline once the list is exhausted.
//!
//! ## Deferred requests
//!
//! Seeding after [`PlaybackController::play`] and refilling near the end of
//! the list are queued as jobs and resolved by
//! [`PlaybackController::process_pending`]. Until then the list keeps its
//! previous contents (`[song]` right after a play). Responses that belong to
//! a superseded seed or batch are dropped. Only the exhausted-list
//! replacement is fetched inline because there is nothing else to play.

use crate::catalog::{Catalog, RecommendationRequest};
use crate::clock::Clock;
use crate::config::SessionConfig;
use crate::error::{PlayerError, Result};
use crate::listen::{ListenOutcome, ListenTracker};
use crate::media::{ArtworkCache, MediaResource, MediaTransport};
use crate::personalization::{PersonalizationEngine, PersonalizedList};
use crate::queue::ExplicitQueue;
use crate::session::{PlayerStatus, SessionHistory, SessionSnapshot};
use crate::sleep_timer::{SleepTimer, SleepTimerMode, SleepTimerState};
use crate::song::{RepeatMode, Song, SongId, UserId};
use log::{debug, error, info, trace, warn};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

/// Where the song picked by [`PlaybackController::advance`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextSource {
    Queue,
    Personalized,
    /// First song of a replacement batch.
    NewBatch,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Advanced {
    pub song: Song,
    pub source: NextSource,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Previous {
    /// Stepped back to an earlier list entry.
    Stepped(Song),
    /// Already at the anchor: the current song started over.
    Restarted,
}

/// What happened when a song finished on its own.
#[derive(Debug, Clone, PartialEq)]
pub enum SongEnd {
    Repeated,
    Advanced(Advanced),
    /// The after-song sleep timer closed the session.
    Slept,
}

/// The song that is loaded, playing or not.
#[derive(Debug, Clone)]
struct NowPlaying {
    song: Song,
    playing: bool,
    position: Duration,
    duration: Option<Duration>,
    pending_seek: Option<Duration>,
    /// Position readbacks are ignored until this instant.
    grace_until: Option<Duration>,
    media: Option<MediaResource>,
    metadata_attempts: u32,
}

impl NowPlaying {
    fn new(song: Song, media: Option<MediaResource>, playing: bool) -> Self {
        Self {
            song,
            playing,
            position: Duration::ZERO,
            duration: None,
            pending_seek: None,
            grace_until: None,
            media,
            metadata_attempts: 0,
        }
    }

    fn restart(&mut self) {
        self.position = Duration::ZERO;
        self.playing = true;
        self.pending_seek = None;
        self.grace_until = None;
    }
}

#[derive(Debug, Clone)]
enum Playback {
    Idle,
    Loaded(NowPlaying),
}

/// Last-played auto-resume happens at most once per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resume {
    Available,
    Consumed,
    Dismissed,
}

#[derive(Debug)]
enum Job {
    Seed {
        token: u64,
        batch: u64,
        anchor: Song,
        request: RecommendationRequest,
    },
    Refill {
        batch: u64,
        request: RecommendationRequest,
    },
}

pub struct PlaybackController {
    config: SessionConfig,
    catalog: Rc<dyn Catalog>,
    transport: Rc<dyn MediaTransport>,
    clock: Rc<dyn Clock>,
    engine: PersonalizationEngine,
    artwork: ArtworkCache,
    user: Option<UserId>,
    playback: Playback,
    volume: f32,
    shuffle: bool,
    repeat: RepeatMode,
    queue: ExplicitQueue,
    list: PersonalizedList,
    history: SessionHistory,
    tracker: ListenTracker,
    sleep: SleepTimer,
    pending: VecDeque<Job>,
    seed_token: u64,
    refill_in_flight: bool,
    /// `(batch, len)` of the list when the last refill was issued.
    last_refill: Option<(u64, usize)>,
    resume: Resume,
}

impl PlaybackController {
    pub fn new(
        catalog: Rc<dyn Catalog>,
        transport: Rc<dyn MediaTransport>,
        clock: Rc<dyn Clock>,
        config: SessionConfig,
    ) -> Self {
        let engine = PersonalizationEngine::new(Rc::clone(&catalog), &config);
        Self {
            engine,
            artwork: ArtworkCache::default(),
            user: None,
            playback: Playback::Idle,
            volume: config.default_volume.clamp(0.0, 1.0),
            shuffle: false,
            repeat: RepeatMode::Off,
            queue: ExplicitQueue::new(),
            list: PersonalizedList::default(),
            history: SessionHistory::default(),
            tracker: ListenTracker::new(config.listen_threshold),
            sleep: SleepTimer::new(config.sleep_tick),
            pending: VecDeque::new(),
            seed_token: 0,
            refill_in_flight: false,
            last_refill: None,
            resume: Resume::Available,
            config,
            catalog,
            transport,
            clock,
        }
    }

    /// Use a different artwork cache, e.g. one with another asset resolver.
    #[must_use]
    pub fn with_artwork(mut self, artwork: ArtworkCache) -> Self {
        self.artwork = artwork;
        self
    }

    pub fn sign_in(&mut self, user: UserId) {
        info!("Signed in as {user}");
        self.user = Some(user);
    }

    /// Later plays stop asking for recommendations.
    pub fn sign_out(&mut self) {
        if let Some(user) = self.user.take() {
            info!("Signed out {user}");
        }
    }

    /// Play `song` now and reseed the personalized list from it.
    pub fn play(&mut self, song: Song) {
        info!("Playing {song}");
        self.stop_tracking();
        if self.resume == Resume::Available {
            self.resume = Resume::Consumed;
        }
        self.start_song(song.clone());
        self.reseed(song);
    }

    /// Playing ⇄ Paused. Does nothing when idle.
    pub fn toggle_play(&mut self) -> PlayerStatus {
        if let Playback::Loaded(now) = &mut self.playback {
            now.playing = !now.playing;
            debug!("{} {}", if now.playing { "Resumed" } else { "Paused" }, now.song);
        }
        self.status()
    }

    /// Move to the next song.
    ///
    /// # Errors
    ///
    /// [`PlayerError::NoMoreRecommendations`] when the queue and list are
    /// exhausted and no replacement batch could be fetched; the current song
    /// keeps playing. [`PlayerError::NothingPlaying`] when idle with an
    /// empty queue.
    pub fn advance(&mut self) -> Result<Advanced> {
        let closed = self.stop_tracking();

        if let Some(song) = self.queue.dequeue_next() {
            debug!("Queue has priority; {} left", self.queue.len());
            self.play(song.clone());
            return Ok(Advanced {
                song,
                source: NextSource::Queue,
            });
        }

        let Some(current) = self.current_song().cloned() else {
            return Err(PlayerError::NothingPlaying);
        };

        self.maybe_request_refill(&current);

        if let Some(next) = self.list.step_forward().cloned() {
            debug!("Personalized list at {}/{}", self.list.cursor() + 1, self.list.len());
            self.start_song(next.clone());
            return Ok(Advanced {
                song: next,
                source: NextSource::Personalized,
            });
        }

        match self.replace_exhausted(&current) {
            Some(song) => Ok(Advanced {
                song,
                source: NextSource::NewBatch,
            }),
            None => {
                warn!("No more recommendations; staying on {current}");
                if let Some(outcome) = closed {
                    let started_at = self.clock.now().saturating_sub(outcome.elapsed());
                    self.tracker.resume(&current, started_at);
                }
                Err(PlayerError::NoMoreRecommendations)
            }
        }
    }

    /// Step back in the personalized list, or restart the anchor song.
    pub fn previous(&mut self) -> Result<Previous> {
        if self.current_song().is_none() {
            return Err(PlayerError::NothingPlaying);
        }

        if self.list.cursor() > 0 {
            self.stop_tracking();
            if let Some(song) = self.list.step_back().cloned() {
                info!("Back to {song}");
                self.start_song(song.clone());
                return Ok(Previous::Stepped(song));
            }
        }

        if let Playback::Loaded(now) = &mut self.playback {
            debug!("Restarting {}", now.song);
            now.restart();
        }
        Ok(Previous::Restarted)
    }

    /// Natural end of the current song.
    pub fn on_song_end(&mut self) -> Result<SongEnd> {
        let Some(current) = self.current_song().cloned() else {
            return Err(PlayerError::NothingPlaying);
        };

        if self.sleep.trigger_after_song() {
            self.close();
            return Ok(SongEnd::Slept);
        }

        match self.repeat {
            // advance() closes the listen span and reopens it if nothing follows.
            RepeatMode::Off => self.advance().map(SongEnd::Advanced),
            mode => {
                self.stop_tracking();
                if mode == RepeatMode::Once {
                    self.repeat = RepeatMode::Off;
                }
                info!("Repeating {current}");
                if let Playback::Loaded(now) = &mut self.playback {
                    now.restart();
                }
                self.tracker.on_song_start(&current, &*self.clock);
                Ok(SongEnd::Repeated)
            }
        }
    }

    /// Stop playback and end the session's last-played resume. Pending
    /// recommendation requests and the sleep timer are dropped.
    pub fn close(&mut self) {
        self.stop_tracking();
        if let Err(e) = self.catalog.stop_current_song_tracking() {
            warn!("Failed to stop catalog tracking: {e}");
        }
        self.sleep.cancel();
        self.pending.clear();
        self.refill_in_flight = false;
        self.last_refill = None;
        self.seed_token += 1;
        if let Playback::Loaded(now) = &self.playback {
            info!("Closed player on {}", now.song);
        }
        self.playback = Playback::Idle;
        self.resume = Resume::Dismissed;
    }

    pub fn set_repeat_mode(&mut self, mode: RepeatMode) {
        debug!("Repeat mode {mode:?}");
        self.repeat = mode;
    }

    pub fn set_shuffle_enabled(&mut self, enabled: bool) {
        debug!("Shuffle {}", if enabled { "on" } else { "off" });
        self.shuffle = enabled;
    }

    /// Clamped to `[0, 1]`; NaN is ignored. Returns the volume in effect.
    pub fn set_volume(&mut self, volume: f32) -> f32 {
        if !volume.is_nan() {
            self.volume = volume.clamp(0.0, 1.0);
        }
        self.volume
    }

    /// Returns `true` if the seek took effect now, `false` if it waits for
    /// the duration to become known.
    pub fn seek(&mut self, target: Duration) -> Result<bool> {
        let now = self.clock.now();
        let Playback::Loaded(playing) = &mut self.playback else {
            return Err(PlayerError::NothingPlaying);
        };

        match playing.duration {
            Some(duration) => {
                playing.position = target.min(duration);
                playing.pending_seek = None;
                playing.grace_until = Some(now + self.config.seek_grace);
                Ok(true)
            }
            None => {
                debug!("Duration unknown; deferring seek to {:.1}s", target.as_secs_f64());
                playing.pending_seek = Some(target);
                Ok(false)
            }
        }
    }

    /// Position reported by the media layer. Ignored during a seek's grace
    /// window and while a seek is pending.
    pub fn on_position_update(&mut self, position: Duration) -> bool {
        let now = self.clock.now();
        let Playback::Loaded(playing) = &mut self.playback else {
            return false;
        };

        if playing.pending_seek.is_some() || playing.grace_until.is_some_and(|until| now < until) {
            trace!("Ignoring position readback {:.1}s", position.as_secs_f64());
            return false;
        }
        playing.grace_until = None;
        playing.position = playing.duration.map_or(position, |d| position.min(d));
        true
    }

    /// Ask the transport for the current song's duration.
    ///
    /// Returns `Ok(None)` while the metadata is still loading. A pending
    /// seek is applied as soon as the duration arrives.
    ///
    /// # Errors
    ///
    /// [`PlayerError::MediaMetadataUnavailable`] once the retry limit is
    /// reached. Polling may continue afterwards.
    pub fn poll_metadata(&mut self) -> Result<Option<Duration>> {
        let now = self.clock.now();
        let Playback::Loaded(playing) = &mut self.playback else {
            return Err(PlayerError::NothingPlaying);
        };
        if playing.duration.is_some() {
            return Ok(playing.duration);
        }

        playing.metadata_attempts += 1;
        if playing.media.is_none() {
            match self.transport.resolve(&playing.song) {
                Ok(resource) => playing.media = Some(resource),
                Err(e) => debug!("Media for {} still unavailable: {e}", playing.song),
            }
        }

        let probed = playing
            .media
            .as_ref()
            .and_then(|resource| self.transport.probe_duration(resource));

        match probed {
            Some(duration) => {
                debug!("{} is {:.1}s long", playing.song, duration.as_secs_f64());
                playing.duration = Some(duration);
                playing.position = playing.position.min(duration);
                if let Some(target) = playing.pending_seek.take() {
                    playing.position = target.min(duration);
                    playing.grace_until = Some(now + self.config.seek_grace);
                    info!("Applied pending seek to {:.1}s", playing.position.as_secs_f64());
                }
                Ok(Some(duration))
            }
            None if playing.metadata_attempts >= self.config.metadata_retry_limit => {
                if playing.metadata_attempts == self.config.metadata_retry_limit {
                    warn!("No duration for {} after {} attempts", playing.song, playing.metadata_attempts);
                }
                Err(PlayerError::MediaMetadataUnavailable {
                    attempts: playing.metadata_attempts,
                })
            }
            None => Ok(None),
        }
    }

    pub fn enqueue(&mut self, song: Song) {
        self.queue.enqueue(song);
    }

    pub fn remove_from_queue(&mut self, song: &Song) -> bool {
        self.queue.remove(song)
    }

    pub fn clear_queue(&mut self) {
        self.queue.clear();
    }

    /// Flip the liked flag in the catalog and mirror it on the current song.
    pub fn toggle_like(&mut self, song_id: &SongId) -> Result<bool> {
        let liked = self.catalog.toggle_like(song_id)?;
        if let Playback::Loaded(now) = &mut self.playback {
            if &now.song.id == song_id {
                now.song.is_liked = liked;
            }
        }
        Ok(liked)
    }

    /// Load the user's last played song, paused, once per session.
    ///
    /// Skipped after any explicit play or after [`Self::close`].
    pub fn restore_last_played(&mut self) -> Option<Song> {
        if self.resume != Resume::Available {
            return None;
        }
        let user = self.user.clone()?;
        self.resume = Resume::Consumed;

        let song = match self.catalog.last_played_song(&user) {
            Ok(Some(song)) => song,
            Ok(None) => return None,
            Err(e) => {
                warn!("Could not load last played song: {e}");
                return None;
            }
        };

        info!("Restoring last played song {song}");
        self.history.mark_played(&song);
        self.seed_token += 1;
        self.list = self.engine.seed(&user, &song, &self.history, self.shuffle);
        self.tracker.reset_batch();
        self.artwork.preload(&song);
        let media = self.resolve_media(&song);
        self.playback = Playback::Loaded(NowPlaying::new(song.clone(), media, false));
        Some(song)
    }

    /// Resolve every deferred recommendation request. Returns how many were
    /// resolved, stale ones included.
    pub fn process_pending(&mut self) -> usize {
        let mut resolved = 0;
        while let Some(job) = self.pending.pop_front() {
            resolved += 1;
            match job {
                Job::Seed {
                    token,
                    batch,
                    anchor,
                    request,
                } => {
                    let fetched = self.engine.fetch(&request);
                    if token != self.seed_token || batch != self.list.batch() {
                        info!("Discarding stale seed response for {anchor}");
                        continue;
                    }
                    self.list = self.engine.seed_from(anchor, fetched, &self.history, batch);
                    self.tracker.reset_batch();
                }
                Job::Refill { batch, request } => {
                    self.refill_in_flight = false;
                    let fetched = self.engine.fetch(&request);
                    if batch != self.list.batch() {
                        info!("Discarding refill for superseded batch {batch}");
                        continue;
                    }
                    let songs = self.engine.refill_from(fetched, &self.history, &self.list);
                    self.engine.apply_refill(&mut self.list, songs);
                }
            }
        }
        resolved
    }

    /// Replaces any running timer.
    pub fn start_sleep_timer(&mut self, mode: SleepTimerMode) -> Result<()> {
        self.sleep.start(mode, self.clock.now())
    }

    pub fn cancel_sleep_timer(&mut self) {
        self.sleep.cancel();
    }

    /// Drive time-based work: the sleep countdown and metadata retries.
    /// Returns `true` if the sleep timer closed the session.
    pub fn tick(&mut self) -> bool {
        if self.sleep.poll(self.clock.now()) {
            self.close();
            return true;
        }
        if matches!(&self.playback, Playback::Loaded(now) if now.duration.is_none()) {
            if let Err(e) = self.poll_metadata() {
                trace!("{e}");
            }
        }
        false
    }

    /// Forget everything learned this session. Collaborators are kept.
    pub fn reset(&mut self) {
        info!("Resetting session");
        self.history.reset();
        self.tracker.reset();
        self.queue.clear();
        self.list = PersonalizedList::default();
        self.playback = Playback::Idle;
        self.sleep.cancel();
        self.pending.clear();
        self.refill_in_flight = false;
        self.last_refill = None;
        self.seed_token += 1;
        self.resume = Resume::Available;
        self.repeat = RepeatMode::Off;
        self.shuffle = false;
        self.volume = self.config.default_volume.clamp(0.0, 1.0);
    }

    #[must_use]
    pub fn status(&self) -> PlayerStatus {
        match &self.playback {
            Playback::Idle => PlayerStatus::Idle,
            Playback::Loaded(now) if now.playing => PlayerStatus::Playing,
            Playback::Loaded(_) => PlayerStatus::Paused,
        }
    }

    #[must_use]
    pub fn current_song(&self) -> Option<&Song> {
        match &self.playback {
            Playback::Idle => None,
            Playback::Loaded(now) => Some(&now.song),
        }
    }

    #[must_use]
    pub fn position(&self) -> Duration {
        match &self.playback {
            Playback::Idle => Duration::ZERO,
            Playback::Loaded(now) => now.position,
        }
    }

    #[must_use]
    pub fn duration(&self) -> Option<Duration> {
        match &self.playback {
            Playback::Idle => None,
            Playback::Loaded(now) => now.duration,
        }
    }

    #[must_use]
    pub fn volume(&self) -> f32 {
        self.volume
    }

    #[must_use]
    pub fn shuffle_enabled(&self) -> bool {
        self.shuffle
    }

    #[must_use]
    pub fn repeat_mode(&self) -> RepeatMode {
        self.repeat
    }

    #[must_use]
    pub fn queue(&self) -> &ExplicitQueue {
        &self.queue
    }

    #[must_use]
    pub fn personalized(&self) -> &PersonalizedList {
        &self.list
    }

    #[must_use]
    pub fn history(&self) -> &SessionHistory {
        &self.history
    }

    #[must_use]
    pub fn batch_listened(&self) -> &[Song] {
        self.tracker.batch_listened()
    }

    #[must_use]
    pub fn sleep_timer(&self) -> SleepTimerState {
        self.sleep.state()
    }

    #[must_use]
    pub fn user(&self) -> Option<&UserId> {
        self.user.as_ref()
    }

    #[must_use]
    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_refill_in_flight(&self) -> bool {
        self.refill_in_flight
    }

    /// Artwork reference for the current song.
    pub fn current_artwork(&mut self) -> Option<String> {
        let song = self.current_song()?.clone();
        self.artwork.artwork_for(&song).map(str::to_string)
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            current_song: self.current_song().cloned(),
            status: self.status(),
            is_playing: self.status() == PlayerStatus::Playing,
            position: self.position(),
            duration: self.duration(),
            volume: self.volume,
            shuffle_enabled: self.shuffle,
            repeat_mode: self.repeat,
            personalized: self.list.songs().to_vec(),
            cursor: self.list.cursor(),
            queue: self.queue.iter().cloned().collect(),
            sleep_timer: self.sleep.state(),
            loading: !self.pending.is_empty(),
        }
    }

    fn stop_tracking(&mut self) -> Option<ListenOutcome> {
        let (song, outcome) = self.tracker.on_song_stop(&*self.clock, &mut self.history)?;
        if let Err(e) = self.catalog.record_listen_outcome(&song, outcome) {
            warn!("Could not record outcome for {song}: {e}");
        }
        Some(outcome)
    }

    /// Load `song` and start measuring it. The list is left alone.
    fn start_song(&mut self, song: Song) {
        self.history.mark_played(&song);
        if let Err(e) = self.catalog.record_listening_history(&song.id) {
            warn!("Could not record listening history for {song}: {e}");
        }
        self.tracker.on_song_start(&song, &*self.clock);
        self.artwork.preload(&song);
        let media = self.resolve_media(&song);
        self.playback = Playback::Loaded(NowPlaying::new(song, media, true));
        if let Err(e) = self.poll_metadata() {
            trace!("{e}");
        }
    }

    fn resolve_media(&self, song: &Song) -> Option<MediaResource> {
        match self.transport.resolve(song) {
            Ok(resource) => Some(resource),
            Err(e) => {
                error!("Could not resolve media for {song}: {e}");
                None
            }
        }
    }

    fn reseed(&mut self, song: Song) {
        let batch = self.engine.next_batch();
        self.list = PersonalizedList::singleton(song.clone(), batch);
        self.tracker.reset_batch();
        self.seed_token += 1;

        match &self.user {
            Some(user) => {
                let request = self.engine.seed_request(user, &song, &self.history, self.shuffle);
                self.pending.push_back(Job::Seed {
                    token: self.seed_token,
                    batch,
                    anchor: song,
                    request,
                });
            }
            None => debug!("Not signed in; personalized list stays at {song}"),
        }
    }

    fn maybe_request_refill(&mut self, current: &Song) {
        if !self.list.is_refill_point() {
            return;
        }
        if self.refill_in_flight {
            debug!("Refill already in flight");
            return;
        }
        let Some(user) = self.user.clone() else {
            return;
        };
        let shape = (self.list.batch(), self.list.len());
        if self.last_refill == Some(shape) {
            debug!("Already refilled batch {} at length {}", shape.0, shape.1);
            return;
        }

        let request = self.engine.refill_request(
            &user,
            current,
            self.tracker.batch_listened(),
            &self.history,
            &self.list,
            self.shuffle,
        );
        info!("Requesting refill for batch {}", shape.0);
        self.refill_in_flight = true;
        self.last_refill = Some(shape);
        self.pending.push_back(Job::Refill {
            batch: shape.0,
            request,
        });
    }

    /// Fetch a new batch inline and start its first song.
    fn replace_exhausted(&mut self, current: &Song) -> Option<Song> {
        let Some(user) = self.user.clone() else {
            debug!("Not signed in; cannot fetch a new batch");
            return None;
        };

        let request = self.engine.replacement_request(
            &user,
            current,
            self.tracker.batch_listened(),
            &self.history,
            self.shuffle,
        );
        let fetched = self.engine.fetch(&request);
        let list = self.engine.replacement_from(fetched, &self.history)?;
        let first = list.anchor()?.clone();

        self.list = list;
        self.tracker.reset_batch();
        self.seed_token += 1;
        self.start_song(first.clone());
        Some(first)
    }
}

impl std::fmt::Debug for PlaybackController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackController")
            .field("status", &self.status())
            .field("current", &self.current_song().map(ToString::to_string))
            .field("list_len", &self.list.len())
            .field("cursor", &self.list.cursor())
            .field("queue_len", &self.queue.len())
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}
