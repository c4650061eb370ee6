//! # Catalog
//!
//! The catalog is the playback core's only window onto song data,
//! recommendations and listening history. [`Catalog`] is the collaborator
//! contract; [`SqliteCatalog`] is the bundled offline implementation backed by
//! SQLite, whose recommender ranks songs with [`crate::algorithm`].
//!
//! ## Recommendation requests
//!
//! A single [`RecommendationRequest`] type covers both the generic and the
//! "smart" call: [`Seeds::Single`] asks for songs like one seed,
//! [`Seeds::Multi`] asks for songs like a set of genuinely-listened songs.
//! Catalogs that cannot handle several seeds report it through
//! [`Catalog::supports_multi_seed`] and never receive [`Seeds::Multi`].
//!
//! ## Schema
//!
//! ```text
//! songs(id, file_id, title, artist, album, img_id, liked, duration,
//!       touches, listens, skips)
//! history(id, song_id, played_at, finished)
//! ```

use crate::algorithm::{self, ScoringContext, SongStats};
use crate::error::{PlayerError, Result};
use crate::listen::ListenOutcome;
use crate::song::{FileId, Song, SongId, UserId};
use anyhow::Context;
use log::{debug, info};
use rand::seq::SliceRandom;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashSet;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

/// Seed material for a recommendation.
#[derive(Debug, Clone, PartialEq)]
pub enum Seeds {
    Single(Song),
    Multi(Vec<Song>),
}

impl Seeds {
    #[must_use]
    pub fn songs(&self) -> &[Song] {
        match self {
            Self::Single(song) => std::slice::from_ref(song),
            Self::Multi(songs) => songs,
        }
    }
}

/// One recommendation call.
#[derive(Debug, Clone, PartialEq)]
pub struct RecommendationRequest {
    pub user: UserId,
    pub seeds: Seeds,
    /// Soft exclusion: the recommender should avoid these files.
    pub exclude: HashSet<FileId>,
    /// Upper bound on returned songs.
    pub limit: usize,
    /// Advisory; the recommender may vary its ordering.
    pub shuffle: bool,
}

/// Collaborator contract consumed by the playback core.
pub trait Catalog {
    fn songs(&self) -> Result<Vec<Song>>;

    /// Ranked candidates, best first.
    fn recommend(&self, request: &RecommendationRequest) -> Result<Vec<Song>>;

    fn supports_multi_seed(&self) -> bool {
        true
    }

    /// Fire-and-forget telemetry when a song starts.
    fn record_listening_history(&self, song_id: &SongId) -> Result<()>;

    /// Flush any in-progress history record.
    fn stop_current_song_tracking(&self) -> Result<()> {
        Ok(())
    }

    /// Song to offer when a session starts.
    fn last_played_song(&self, _user: &UserId) -> Result<Option<Song>> {
        Ok(None)
    }

    /// Flip the liked flag, returning the new value.
    fn toggle_like(&self, song_id: &SongId) -> Result<bool>;

    /// Feedback from listen classification.
    fn record_listen_outcome(&self, _song: &Song, _outcome: ListenOutcome) -> Result<()> {
        Ok(())
    }
}

impl<C: Catalog + ?Sized> Catalog for Rc<C> {
    fn songs(&self) -> Result<Vec<Song>> {
        (**self).songs()
    }
    fn recommend(&self, request: &RecommendationRequest) -> Result<Vec<Song>> {
        (**self).recommend(request)
    }
    fn supports_multi_seed(&self) -> bool {
        (**self).supports_multi_seed()
    }
    fn record_listening_history(&self, song_id: &SongId) -> Result<()> {
        (**self).record_listening_history(song_id)
    }
    fn stop_current_song_tracking(&self) -> Result<()> {
        (**self).stop_current_song_tracking()
    }
    fn last_played_song(&self, user: &UserId) -> Result<Option<Song>> {
        (**self).last_played_song(user)
    }
    fn toggle_like(&self, song_id: &SongId) -> Result<bool> {
        (**self).toggle_like(song_id)
    }
    fn record_listen_outcome(&self, song: &Song, outcome: ListenOutcome) -> Result<()> {
        (**self).record_listen_outcome(song, outcome)
    }
}

const SONG_COLUMNS: &str =
    "id, file_id, title, artist, album, img_id, liked, duration, touches, listens, skips";

/// SQLite-backed catalog for offline use.
#[derive(Debug)]
pub struct SqliteCatalog {
    conn: Connection,
    scoring: ScoringContext,
}

impl SqliteCatalog {
    /// Open (creating if needed) the catalog at `path`.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open catalog database at {}", path.display()))?;
        Self::with_connection(conn)
    }

    /// Catalog in memory, for tests and scripted sessions.
    pub fn in_memory() -> anyhow::Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> anyhow::Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS songs (
                id       TEXT PRIMARY KEY,
                file_id  TEXT NOT NULL,
                title    TEXT NOT NULL,
                artist   TEXT NOT NULL,
                album    TEXT NOT NULL DEFAULT '',
                img_id   TEXT,
                liked    INTEGER NOT NULL DEFAULT 0,
                duration REAL,
                touches  INTEGER NOT NULL DEFAULT 0,
                listens  INTEGER NOT NULL DEFAULT 0,
                skips    INTEGER NOT NULL DEFAULT 0
            );
            CREATE TABLE IF NOT EXISTS history (
                id        INTEGER PRIMARY KEY AUTOINCREMENT,
                song_id   TEXT NOT NULL REFERENCES songs(id),
                played_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
                finished  INTEGER NOT NULL DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS idx_songs_file_id ON songs(file_id);
            CREATE INDEX IF NOT EXISTS idx_history_song ON history(song_id);",
        )
        .context("Failed to create catalog schema")?;

        Ok(Self {
            conn,
            scoring: ScoringContext::default(),
        })
    }

    /// Delete and recreate the catalog file.
    pub fn init(path: &Path, force: bool) -> anyhow::Result<Self> {
        if path.exists() {
            if !force {
                anyhow::bail!(
                    "Catalog already exists at {}. Use --force to overwrite.",
                    path.display()
                );
            }
            std::fs::remove_file(path)
                .with_context(|| format!("Failed to remove old catalog {}", path.display()))?;
            info!("Removed existing catalog at {}", path.display());
        }
        Self::open(path)
    }

    /// Insert or update songs, keeping listening statistics intact.
    pub fn import_songs(&mut self, songs: &[Song]) -> anyhow::Result<usize> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO songs (id, file_id, title, artist, album, img_id, liked, duration)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(id) DO UPDATE SET
                    file_id = excluded.file_id,
                    title = excluded.title,
                    artist = excluded.artist,
                    album = excluded.album,
                    img_id = excluded.img_id,
                    duration = excluded.duration",
            )?;
            for song in songs {
                stmt.execute(params![
                    song.id.as_str(),
                    song.media_key(),
                    song.title,
                    song.artist,
                    song.album,
                    song.img_id,
                    song.is_liked,
                    song.duration.map(|d| d.as_secs_f64()),
                ])
                .with_context(|| format!("Failed to import song {song}"))?;
            }
        }
        tx.commit().context("Committing song import failed")?;
        info!("Imported {} song(s)", songs.len());
        Ok(songs.len())
    }

    /// Look up by exact id, then by case-insensitive title or artist match.
    pub fn find_song(&self, query: &str) -> Result<Option<Song>> {
        let sql = format!("SELECT {SONG_COLUMNS} FROM songs WHERE id = ?1");
        if let Some((song, _)) = self.conn.query_row(&sql, [query], row_to_song).optional()? {
            return Ok(Some(song));
        }

        let sql = format!(
            "SELECT {SONG_COLUMNS} FROM songs
             WHERE title LIKE ?1 OR artist LIKE ?1
             ORDER BY title LIMIT 1"
        );
        let pattern = format!("%{query}%");
        Ok(self
            .conn
            .query_row(&sql, [pattern], row_to_song)
            .optional()?
            .map(|(song, _)| song))
    }

    pub fn stats(&self, song_id: &SongId) -> Result<Option<SongStats>> {
        let sql = format!("SELECT {SONG_COLUMNS} FROM songs WHERE id = ?1");
        Ok(self
            .conn
            .query_row(&sql, [song_id.as_str()], row_to_song)
            .optional()?
            .map(|(_, stats)| stats))
    }

    fn songs_with_stats(&self) -> Result<Vec<(Song, SongStats)>> {
        let sql = format!("SELECT {SONG_COLUMNS} FROM songs ORDER BY artist, album, title");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], row_to_song)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

fn row_to_song(row: &Row<'_>) -> rusqlite::Result<(Song, SongStats)> {
    let duration: Option<f64> = row.get(7)?;
    let liked: bool = row.get(6)?;
    let song = Song {
        id: SongId(row.get(0)?),
        file_id: FileId(row.get(1)?),
        title: row.get(2)?,
        artist: row.get(3)?,
        album: row.get(4)?,
        img_id: row.get(5)?,
        is_liked: liked,
        duration: duration.and_then(|d| Duration::try_from_secs_f64(d).ok()),
    };
    let stats = SongStats {
        touches: row.get(8)?,
        listens: row.get(9)?,
        skips: row.get(10)?,
        loved: liked,
    };
    Ok((song, stats))
}

impl Catalog for SqliteCatalog {
    fn songs(&self) -> Result<Vec<Song>> {
        Ok(self
            .songs_with_stats()?
            .into_iter()
            .map(|(song, _)| song)
            .collect())
    }

    fn recommend(&self, request: &RecommendationRequest) -> Result<Vec<Song>> {
        let seeds = request.seeds.songs();
        let seed_files: HashSet<&FileId> = seeds.iter().map(|s| &s.file_id).collect();

        let candidates: Vec<(Song, SongStats)> = self
            .songs_with_stats()?
            .into_iter()
            .filter(|(song, _)| {
                !seed_files.contains(&song.file_id) && !request.exclude.contains(&song.file_id)
            })
            .collect();

        let ranked = algorithm::rank_candidates(candidates, seeds, &self.scoring);
        let mut songs: Vec<Song> = ranked
            .into_iter()
            .take(request.limit.saturating_mul(2))
            .map(|(song, _)| song)
            .collect();

        if request.shuffle {
            songs.shuffle(&mut rand::thread_rng());
        }
        songs.truncate(request.limit);

        debug!(
            "Recommended {} song(s) for {} seed(s), {} excluded",
            songs.len(),
            seeds.len(),
            request.exclude.len()
        );
        Ok(songs)
    }

    fn record_listening_history(&self, song_id: &SongId) -> Result<()> {
        self.conn.execute(
            "UPDATE history SET finished = 1 WHERE finished = 0",
            [],
        )?;
        self.conn.execute(
            "INSERT INTO history (song_id) VALUES (?1)",
            [song_id.as_str()],
        )?;
        self.conn.execute(
            "UPDATE songs SET touches = touches + 1 WHERE id = ?1",
            [song_id.as_str()],
        )?;
        Ok(())
    }

    fn stop_current_song_tracking(&self) -> Result<()> {
        let closed = self.conn.execute(
            "UPDATE history SET finished = 1 WHERE finished = 0",
            [],
        )?;
        debug!("Closed {closed} open history record(s)");
        Ok(())
    }

    fn last_played_song(&self, _user: &UserId) -> Result<Option<Song>> {
        let sql = format!(
            "SELECT {} FROM songs s JOIN history h ON h.song_id = s.id
             ORDER BY h.id DESC LIMIT 1",
            SONG_COLUMNS
                .split(", ")
                .map(|c| format!("s.{c}"))
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(self
            .conn
            .query_row(&sql, [], row_to_song)
            .optional()?
            .map(|(song, _)| song))
    }

    fn toggle_like(&self, song_id: &SongId) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE songs SET liked = 1 - liked WHERE id = ?1",
            [song_id.as_str()],
        )?;
        if changed == 0 {
            return Err(PlayerError::Catalog(format!("unknown song {song_id}")));
        }
        let liked: bool = self.conn.query_row(
            "SELECT liked FROM songs WHERE id = ?1",
            [song_id.as_str()],
            |row| row.get(0),
        )?;
        Ok(liked)
    }

    fn record_listen_outcome(&self, song: &Song, outcome: ListenOutcome) -> Result<()> {
        let column = if outcome.is_listen() { "listens" } else { "skips" };
        self.conn.execute(
            &format!("UPDATE songs SET {column} = {column} + 1 WHERE id = ?1"),
            [song.id.as_str()],
        )?;
        Ok(())
    }
}
