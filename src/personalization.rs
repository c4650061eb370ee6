//! # Personalization Engine
//!
//! Maintains the personalized list that plays once the explicit queue is
//! empty. A list is anchored at index 0 by the song that seeded it and lives
//! for one *batch*: it is grown by refills and wholesale replaced once the
//! cursor runs off its end.
//!
//! ## Request kinds
//!
//! | Call        | Seeds                                      | Excluded                      |
//! |-------------|--------------------------------------------|-------------------------------|
//! | seed        | the song being played                      | listened                      |
//! | refill      | batch listens, else the current song       | listened (+ list, multi-seed) |
//! | replacement | batch listens, else the current song       | listened                      |
//!
//! Every response is filtered again locally: played songs never come back
//! through a fresh fetch, and refills skip anything already in the list.
//!
//! ## Failure policy
//!
//! A failed or empty seed degrades to a single-song list; a failed refill
//! leaves the list untouched; a failed replacement yields `None`. Errors are
//! logged here and never reach the controller.

use crate::catalog::{Catalog, RecommendationRequest, Seeds};
use crate::config::SessionConfig;
use crate::error::Result;
use crate::session::SessionHistory;
use crate::song::{FileId, Song, UserId};
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::rc::Rc;

/// Ordered songs for the current batch plus the playing position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersonalizedList {
    songs: Vec<Song>,
    cursor: usize,
    batch: u64,
}

impl PersonalizedList {
    /// List of just the anchor song.
    #[must_use]
    pub fn singleton(anchor: Song, batch: u64) -> Self {
        Self::seeded(anchor, Vec::new(), batch)
    }

    #[must_use]
    pub fn seeded(anchor: Song, rest: Vec<Song>, batch: u64) -> Self {
        let mut songs = Vec::with_capacity(rest.len() + 1);
        songs.push(anchor);
        songs.extend(rest);
        Self { songs, cursor: 0, batch }
    }

    #[must_use]
    pub fn songs(&self) -> &[Song] {
        &self.songs
    }

    #[must_use]
    pub fn anchor(&self) -> Option<&Song> {
        self.songs.first()
    }

    #[must_use]
    pub fn current(&self) -> Option<&Song> {
        self.songs.get(self.cursor)
    }

    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[must_use]
    pub fn batch(&self) -> u64 {
        self.batch
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.songs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    #[must_use]
    pub fn contains_file(&self, file_id: &FileId) -> bool {
        self.songs.iter().any(|s| &s.file_id == file_id)
    }

    /// Second-to-last position: the moment to prefetch more songs.
    #[must_use]
    pub fn is_refill_point(&self) -> bool {
        self.songs.len() >= 2 && self.cursor == self.songs.len() - 2
    }

    /// Move to the next entry, if there is one.
    pub fn step_forward(&mut self) -> Option<&Song> {
        if self.cursor + 1 < self.songs.len() {
            self.cursor += 1;
            self.songs.get(self.cursor)
        } else {
            None
        }
    }

    /// Move to the previous entry, if there is one.
    pub fn step_back(&mut self) -> Option<&Song> {
        if self.cursor > 0 {
            self.cursor -= 1;
            self.songs.get(self.cursor)
        } else {
            None
        }
    }

    fn append(&mut self, songs: Vec<Song>) {
        self.songs.extend(songs);
    }
}

/// Builds recommendation requests and turns responses into list contents.
pub struct PersonalizationEngine {
    catalog: Rc<dyn Catalog>,
    seed_take: usize,
    list_cap: usize,
    refill_cap: usize,
    fetch_limit: usize,
    next_batch: u64,
}

impl PersonalizationEngine {
    #[must_use]
    pub fn new(catalog: Rc<dyn Catalog>, config: &SessionConfig) -> Self {
        let widest = config.seed_take.max(config.list_cap).max(config.refill_cap);
        Self {
            catalog,
            seed_take: config.seed_take,
            list_cap: config.list_cap.max(1),
            refill_cap: config.refill_cap,
            // Local filtering discards played songs, so over-fetch.
            fetch_limit: widest * 4,
            next_batch: 1,
        }
    }

    /// Identifier for a fresh batch.
    pub fn next_batch(&mut self) -> u64 {
        let batch = self.next_batch;
        self.next_batch += 1;
        batch
    }

    /// Call the recommender. Errors are logged and passed back unchanged.
    pub fn fetch(&self, request: &RecommendationRequest) -> Result<Vec<Song>> {
        let kind = match &request.seeds {
            Seeds::Single(song) => format!("single seed {song}"),
            Seeds::Multi(songs) => format!("{} listened seeds", songs.len()),
        };
        debug!("Fetching recommendations from {kind}");
        let result = self.catalog.recommend(request);
        match &result {
            Ok(songs) => debug!("Recommender returned {} song(s) for {kind}", songs.len()),
            Err(e) => error!("Recommendation fetch for {kind} failed: {e}"),
        }
        result
    }

    pub fn seed_request(
        &self,
        user: &UserId,
        song: &Song,
        history: &SessionHistory,
        shuffle: bool,
    ) -> RecommendationRequest {
        RecommendationRequest {
            user: user.clone(),
            seeds: Seeds::Single(song.clone()),
            exclude: history.listened().clone(),
            limit: self.fetch_limit,
            shuffle,
        }
    }

    /// `[anchor, up to seed_take unplayed songs]`, or `[anchor]` on failure.
    pub fn seed_from(
        &self,
        anchor: Song,
        fetched: Result<Vec<Song>>,
        history: &SessionHistory,
        batch: u64,
    ) -> PersonalizedList {
        let candidates = match fetched {
            Ok(songs) => songs,
            Err(_) => {
                warn!("Seeding for {anchor} failed; list falls back to the song alone");
                return PersonalizedList::singleton(anchor, batch);
            }
        };

        let mut seen: HashSet<FileId> = HashSet::from([anchor.file_id.clone()]);
        let rest: Vec<Song> = candidates
            .into_iter()
            .filter(|s| !history.is_played(&s.file_id) && seen.insert(s.file_id.clone()))
            .take(self.seed_take.min(self.list_cap - 1))
            .collect();

        if rest.is_empty() {
            warn!("No fresh recommendations for {anchor}; list is the song alone");
        } else {
            info!("Personalized list seeded from {anchor}: {} song(s)", rest.len() + 1);
        }
        PersonalizedList::seeded(anchor, rest, batch)
    }

    /// Synchronous seed: request, fetch and build in one step.
    pub fn seed(
        &mut self,
        user: &UserId,
        song: &Song,
        history: &SessionHistory,
        shuffle: bool,
    ) -> PersonalizedList {
        let batch = self.next_batch();
        let request = self.seed_request(user, song, history, shuffle);
        let fetched = self.fetch(&request);
        self.seed_from(song.clone(), fetched, history, batch)
    }

    /// Seeds for refill and replacement: the batch's genuine listens when
    /// there are any, the current song otherwise.
    fn evidence_seeds(&self, current: &Song, batch_listened: &[Song]) -> Seeds {
        match batch_listened {
            [] => Seeds::Single(current.clone()),
            songs if self.catalog.supports_multi_seed() => Seeds::Multi(songs.to_vec()),
            [.., last] => {
                debug!("Catalog lacks multi-seed support; seeding from {last}");
                Seeds::Single(last.clone())
            }
        }
    }

    pub fn refill_request(
        &self,
        user: &UserId,
        current: &Song,
        batch_listened: &[Song],
        history: &SessionHistory,
        list: &PersonalizedList,
        shuffle: bool,
    ) -> RecommendationRequest {
        let seeds = self.evidence_seeds(current, batch_listened);
        let mut exclude = history.listened().clone();
        if matches!(seeds, Seeds::Multi(_)) {
            exclude.extend(list.songs().iter().map(|s| s.file_id.clone()));
        }
        RecommendationRequest {
            user: user.clone(),
            seeds,
            exclude,
            limit: self.fetch_limit,
            shuffle,
        }
    }

    /// Songs to append: not played, not listened, not already listed.
    pub fn refill_from(
        &self,
        fetched: Result<Vec<Song>>,
        history: &SessionHistory,
        list: &PersonalizedList,
    ) -> Vec<Song> {
        let Ok(candidates) = fetched else {
            warn!("Refill failed; personalized list left unchanged");
            return Vec::new();
        };

        let mut seen = HashSet::new();
        let fresh: Vec<Song> = candidates
            .into_iter()
            .filter(|s| {
                !history.is_played(&s.file_id)
                    && !history.is_listened(&s.file_id)
                    && !list.contains_file(&s.file_id)
                    && seen.insert(s.file_id.clone())
            })
            .take(self.refill_cap)
            .collect();

        if fresh.is_empty() {
            info!("Refill produced no new songs");
        }
        fresh
    }

    /// Synchronous refill: request, fetch and filter in one step.
    pub fn refill(
        &self,
        user: &UserId,
        current: &Song,
        batch_listened: &[Song],
        history: &SessionHistory,
        list: &PersonalizedList,
        shuffle: bool,
    ) -> Vec<Song> {
        let request = self.refill_request(user, current, batch_listened, history, list, shuffle);
        let fetched = self.fetch(&request);
        self.refill_from(fetched, history, list)
    }

    /// Extend `list` with a refill result.
    pub fn apply_refill(&self, list: &mut PersonalizedList, songs: Vec<Song>) {
        if !songs.is_empty() {
            info!("Appending {} song(s) to personalized list", songs.len());
            list.append(songs);
        }
    }

    pub fn replacement_request(
        &self,
        user: &UserId,
        current: &Song,
        batch_listened: &[Song],
        history: &SessionHistory,
        shuffle: bool,
    ) -> RecommendationRequest {
        RecommendationRequest {
            user: user.clone(),
            seeds: self.evidence_seeds(current, batch_listened),
            exclude: history.listened().clone(),
            limit: self.fetch_limit,
            shuffle,
        }
    }

    /// A new batch whose anchor is the first fresh recommendation.
    pub fn replacement_from(
        &mut self,
        fetched: Result<Vec<Song>>,
        history: &SessionHistory,
    ) -> Option<PersonalizedList> {
        let candidates = fetched.ok()?;
        let mut seen = HashSet::new();
        let mut fresh = candidates.into_iter().filter(|s| {
            !history.is_played(&s.file_id)
                && !history.is_listened(&s.file_id)
                && seen.insert(s.file_id.clone())
        });

        let anchor = fresh.next()?;
        let rest: Vec<Song> = fresh.take(self.list_cap - 1).collect();
        let batch = self.next_batch();
        info!("New batch {batch} anchored at {anchor} with {} more song(s)", rest.len());
        Some(PersonalizedList::seeded(anchor, rest, batch))
    }
}

impl std::fmt::Debug for PersonalizationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersonalizationEngine")
            .field("seed_take", &self.seed_take)
            .field("list_cap", &self.list_cap)
            .field("refill_cap", &self.refill_cap)
            .field("next_batch", &self.next_batch)
            .finish_non_exhaustive()
    }
}
