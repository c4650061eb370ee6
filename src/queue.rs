//! # Explicit Queue
//!
//! Songs the user asked for, played in insertion order. The queue always wins
//! over the personalized list: the controller drains it before looking at
//! recommendations. No deduplication is performed, so a song may be queued
//! several times.

use crate::song::Song;
use log::debug;
use std::collections::VecDeque;

#[derive(Debug, Clone, Default)]
pub struct ExplicitQueue {
    songs: VecDeque<Song>,
}

impl ExplicitQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, song: Song) {
        debug!("Queued {song} at position {}", self.songs.len());
        self.songs.push_back(song);
    }

    /// Pop the head of the queue.
    pub fn dequeue_next(&mut self) -> Option<Song> {
        self.songs.pop_front()
    }

    /// Remove the first entry with the same catalog `id`.
    pub fn remove(&mut self, song: &Song) -> bool {
        match self.songs.iter().position(|s| s.id == song.id) {
            Some(index) => {
                self.songs.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.songs.clear();
    }

    #[must_use]
    pub fn has_items(&self) -> bool {
        !self.songs.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.songs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Song> {
        self.songs.iter()
    }
}
