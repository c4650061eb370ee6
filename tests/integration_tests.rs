//! # Integration Tests for Cadence
//!
//! End-to-end listening sessions against scripted and SQLite catalogs, on
//! simulated time, plus a few checks of the `cadence` binary itself.

use anyhow::Result;
use cadence::catalog::{Catalog, RecommendationRequest, Seeds, SqliteCatalog};
use cadence::clock::{Clock, ManualClock};
use cadence::config::SessionConfig;
use cadence::controller::{NextSource, PlaybackController, Previous};
use cadence::error::PlayerError;
use cadence::media::{CatalogDurationTransport, MediaTransport};
use cadence::session::PlayerStatus;
use cadence::sleep_timer::{SleepTimerMode, SleepTimerState};
use cadence::song::{FileId, Song, SongId, UserId};
use std::cell::{Cell, RefCell};
use std::path::PathBuf;
use std::rc::Rc;
use tempfile::TempDir;

/// Recommends library songs in library order, minus seeds and exclusions.
struct MockRecommender {
    library: Vec<Song>,
    requests: RefCell<Vec<RecommendationRequest>>,
    failing: Cell<bool>,
    multi_seed: bool,
    last_played: Option<Song>,
    stop_calls: Cell<u32>,
}

impl MockRecommender {
    fn library(ids: &[&str]) -> Self {
        Self {
            library: ids.iter().map(|id| song(id)).collect(),
            requests: RefCell::new(Vec::new()),
            failing: Cell::new(false),
            multi_seed: true,
            last_played: None,
            stop_calls: Cell::new(0),
        }
    }

    fn new(ids: &[&str]) -> Rc<Self> {
        Rc::new(Self::library(ids))
    }

    fn last_request(&self) -> RecommendationRequest {
        self.requests
            .borrow()
            .last()
            .cloned()
            .expect("at least one recommendation request")
    }
}

impl Catalog for MockRecommender {
    fn songs(&self) -> cadence::error::Result<Vec<Song>> {
        Ok(self.library.clone())
    }

    fn recommend(&self, request: &RecommendationRequest) -> cadence::error::Result<Vec<Song>> {
        self.requests.borrow_mut().push(request.clone());
        if self.failing.get() {
            return Err(PlayerError::RecommendationFetchFailed("service unavailable".into()));
        }
        let seeds = request.seeds.songs();
        Ok(self
            .library
            .iter()
            .filter(|s| !seeds.iter().any(|seed| seed.same_file(s)))
            .filter(|s| !request.exclude.contains(&s.file_id))
            .take(request.limit)
            .cloned()
            .collect())
    }

    fn supports_multi_seed(&self) -> bool {
        self.multi_seed
    }

    fn record_listening_history(&self, _song_id: &SongId) -> cadence::error::Result<()> {
        Ok(())
    }

    fn stop_current_song_tracking(&self) -> cadence::error::Result<()> {
        self.stop_calls.set(self.stop_calls.get() + 1);
        Ok(())
    }

    fn last_played_song(&self, _user: &UserId) -> cadence::error::Result<Option<Song>> {
        Ok(self.last_played.clone())
    }

    fn toggle_like(&self, _song_id: &SongId) -> cadence::error::Result<bool> {
        Ok(true)
    }
}

fn song(id: &str) -> Song {
    Song::new(id, &format!("Song {id}"), "Artist")
}

fn ids(songs: &[Song]) -> Vec<&str> {
    songs.iter().map(|s| s.id.as_str()).collect()
}

fn file(id: &str) -> FileId {
    FileId::from(id)
}

/// Signed-in controller on a manual clock.
fn player_for(catalog: Rc<dyn Catalog>) -> (PlaybackController, Rc<ManualClock>) {
    let clock = Rc::new(ManualClock::new());
    let mut player = PlaybackController::new(
        catalog,
        Rc::new(CatalogDurationTransport) as Rc<dyn MediaTransport>,
        Rc::clone(&clock) as Rc<dyn Clock>,
        SessionConfig::default(),
    );
    player.sign_in(UserId::from("listener"));
    (player, clock)
}

/// Temporary SQLite catalog holding `count` three-minute songs.
fn create_test_catalog(count: usize) -> Result<(TempDir, PathBuf)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("catalog.db");
    let mut catalog = SqliteCatalog::init(&db_path, false)?;

    let songs: Vec<Song> = (0..count)
        .map(|i| {
            let artist = if i % 2 == 0 { "Even Band" } else { "Odd Band" };
            let mut song = Song::new(&format!("t{i:02}"), &format!("Track {i}"), artist);
            song.duration = Some(std::time::Duration::from_secs(180));
            song
        })
        .collect();
    catalog.import_songs(&songs)?;
    Ok((temp_dir, db_path))
}

#[cfg(test)]
mod scenario_tests {
    use super::*;

    #[test]
    fn test_seed_advance_and_refill() {
        let catalog = MockRecommender::new(&[
            "A", "x1", "x2", "x3", "x4", "y1", "y2", "y3", "y4", "y5", "y6",
        ]);
        let (mut player, clock) = player_for(Rc::clone(&catalog) as Rc<dyn Catalog>);

        player.play(song("A"));
        player.process_pending();
        assert_eq!(ids(player.personalized().songs()), vec!["A", "x1", "x2", "x3", "x4"]);

        clock.advance_secs(25);
        player.advance().unwrap();
        player.advance().unwrap();
        assert_eq!(player.personalized().cursor(), 2);
        assert!(player.history().is_listened(&file("A")));

        player.advance().unwrap();
        assert_eq!(player.personalized().cursor(), 3);
        assert_eq!(player.pending_requests(), 0);

        // cursor == len - 2: the refill is issued and then the list steps on.
        player.advance().unwrap();
        assert!(player.is_refill_in_flight());
        player.process_pending();

        let refill = catalog.last_request();
        assert_eq!(refill.seeds, Seeds::Multi(vec![song("A")]));
        assert!(refill.exclude.contains(&file("A")));

        let list = player.personalized();
        assert_eq!(
            ids(list.songs()),
            vec!["A", "x1", "x2", "x3", "x4", "y1", "y2", "y3", "y4", "y5"]
        );
        assert_eq!(list.cursor(), 4);
    }

    #[test]
    fn test_listen_versus_skip() {
        let catalog = MockRecommender::new(&["A", "B", "C", "D", "E", "F"]);
        let (mut player, clock) = player_for(catalog);

        player.play(song("A"));
        player.process_pending();
        clock.advance_secs(25);
        player.advance().unwrap();
        assert!(player.history().is_listened(&file("A")));
        assert_eq!(ids(player.batch_listened()), vec!["A"]);

        player.play(song("B"));
        clock.advance_secs(5);
        player.advance().unwrap();

        let history = player.history();
        assert!(history.is_played(&file("B")));
        assert!(!history.is_listened(&file("B")));
        assert!(!player.batch_listened().iter().any(|s| s.id.as_str() == "B"));
    }

    #[test]
    fn test_queue_is_fifo_and_has_priority() {
        let catalog = MockRecommender::new(&["A", "B", "C", "D", "E", "F"]);
        let (mut player, _clock) = player_for(catalog);
        player.play(song("A"));
        player.process_pending();

        for id in ["q1", "q2", "q3"] {
            player.enqueue(song(id));
        }
        let mut order = Vec::new();
        for _ in 0..3 {
            let next = player.advance().unwrap();
            assert_eq!(next.source, NextSource::Queue);
            order.push(next.song.id.to_string());
        }

        assert_eq!(order, vec!["q1", "q2", "q3"]);
        assert!(!player.queue().has_items());
    }

    #[test]
    fn test_remove_and_clear_queue() {
        let catalog = MockRecommender::new(&["A"]);
        let (mut player, _clock) = player_for(catalog);
        player.enqueue(song("q1"));
        player.enqueue(song("q2"));
        player.enqueue(song("q1"));

        assert!(player.remove_from_queue(&song("q1")));
        assert_eq!(player.queue().iter().map(|s| s.id.as_str()).collect::<Vec<_>>(), vec!["q2", "q1"]);
        player.clear_queue();
        assert!(player.queue().is_empty());
    }

    #[test]
    fn test_only_one_refill_in_flight() {
        let names: Vec<String> = (0..20).map(|i| format!("s{i:02}")).collect();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        let catalog = MockRecommender::new(&names);
        let (mut player, _clock) = player_for(Rc::clone(&catalog) as Rc<dyn Catalog>);

        player.play(song("s00"));
        player.process_pending();
        for _ in 0..4 {
            player.advance().unwrap();
        }
        let requests_before = catalog.requests.borrow().len();
        player.previous().unwrap();
        player.advance().unwrap();

        assert_eq!(player.pending_requests(), 1);
        player.process_pending();
        assert_eq!(catalog.requests.borrow().len(), requests_before + 1);
        assert!(!player.is_refill_in_flight());
    }

    #[test]
    fn test_previous_at_anchor_keeps_song() {
        let catalog = MockRecommender::new(&["A", "B", "C"]);
        let (mut player, clock) = player_for(catalog);
        player.play(song("A"));
        player.process_pending();
        clock.advance_secs(40);

        assert_eq!(player.previous().unwrap(), Previous::Restarted);
        assert_eq!(player.current_song().map(|s| s.id.as_str()), Some("A"));
        assert_eq!(player.personalized().cursor(), 0);
    }

    #[test]
    fn test_close_prevents_resume() {
        let catalog = Rc::new(MockRecommender {
            last_played: Some(song("Z")),
            ..MockRecommender::library(&["A", "B"])
        });
        let (mut player, _clock) = player_for(Rc::clone(&catalog) as Rc<dyn Catalog>);

        player.play(song("A"));
        player.close();
        assert_eq!(player.status(), PlayerStatus::Idle);
        assert_eq!(catalog.stop_calls.get(), 1);
        assert!(player.restore_last_played().is_none());
    }

    #[test]
    fn test_sleep_timer_countdown_and_cancel() {
        let catalog = MockRecommender::new(&["A", "B"]);
        let (mut player, clock) = player_for(catalog);
        player.play(song("A"));

        player.start_sleep_timer(SleepTimerMode::Minutes(1)).unwrap();
        player.cancel_sleep_timer();
        clock.advance_secs(120);
        assert!(!player.tick());
        assert_eq!(player.status(), PlayerStatus::Playing);

        player.start_sleep_timer(SleepTimerMode::Minutes(1)).unwrap();
        clock.advance_secs(60);
        assert!(player.tick());
        assert_eq!(player.status(), PlayerStatus::Idle);
        assert_eq!(player.sleep_timer(), SleepTimerState::Inactive);
        assert!(!player.tick());
    }

    #[test]
    fn test_zero_minute_timer_rejected() {
        let catalog = MockRecommender::new(&["A"]);
        let (mut player, _clock) = player_for(catalog);
        let err = player.start_sleep_timer(SleepTimerMode::Minutes(0)).unwrap_err();
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_recommender_outage_degrades_gracefully() {
        let catalog = MockRecommender::new(&["A", "B", "C", "D", "E", "F"]);
        let (mut player, _clock) = player_for(Rc::clone(&catalog) as Rc<dyn Catalog>);

        catalog.failing.set(true);
        player.play(song("A"));
        player.process_pending();
        assert_eq!(ids(player.personalized().songs()), vec!["A"]);
        assert!(matches!(player.advance(), Err(PlayerError::NoMoreRecommendations)));
        assert_eq!(player.current_song().map(|s| s.id.as_str()), Some("A"));

        catalog.failing.set(false);
        let next = player.advance().unwrap();
        assert_eq!(next.source, NextSource::NewBatch);
        assert_eq!(next.song.id.as_str(), "B");
    }

    #[test]
    fn test_single_seed_fallback_without_multi_seed() {
        let catalog = Rc::new(MockRecommender {
            multi_seed: false,
            ..MockRecommender::library(&["A", "B", "C", "D", "E", "F", "G"])
        });
        let (mut player, clock) = player_for(Rc::clone(&catalog) as Rc<dyn Catalog>);
        player.play(song("A"));
        player.process_pending();

        for _ in 0..4 {
            clock.advance_secs(30);
            player.advance().unwrap();
        }
        player.process_pending();

        // D was the latest genuine listen when the refill left at cursor 3.
        assert_eq!(catalog.last_request().seeds, Seeds::Single(song("D")));
    }
}

#[cfg(test)]
mod sqlite_catalog_tests {
    use super::*;

    #[test]
    fn test_session_updates_catalog_statistics() -> Result<()> {
        let (_temp_dir, db_path) = create_test_catalog(12)?;
        let catalog = Rc::new(SqliteCatalog::open(&db_path)?);
        let (mut player, clock) = player_for(Rc::clone(&catalog) as Rc<dyn Catalog>);

        let first = catalog.find_song("Track 0")?.expect("track 0 exists");
        player.play(first.clone());
        player.process_pending();
        assert_eq!(player.personalized().len(), 5);
        assert_eq!(player.duration(), Some(std::time::Duration::from_secs(180)));

        clock.advance_secs(30);
        let second = player.advance()?.song;
        clock.advance_secs(3);
        player.advance()?;

        let first_stats = catalog.stats(&first.id)?.expect("stats for first song");
        assert_eq!(first_stats.touches, 1);
        assert_eq!(first_stats.listens, 1);
        let second_stats = catalog.stats(&second.id)?.expect("stats for second song");
        assert_eq!(second_stats.skips, 1);
        Ok(())
    }

    #[test]
    fn test_last_played_song_resumes_in_new_session() -> Result<()> {
        let (_temp_dir, db_path) = create_test_catalog(6)?;
        {
            let catalog = Rc::new(SqliteCatalog::open(&db_path)?);
            let (mut player, _clock) = player_for(catalog as Rc<dyn Catalog>);
            player.play(Song::new("t03", "Track 3", "Odd Band"));
        }

        let catalog = Rc::new(SqliteCatalog::open(&db_path)?);
        let (mut player, _clock) = player_for(catalog as Rc<dyn Catalog>);
        let restored = player.restore_last_played().expect("a song to restore");

        assert_eq!(restored.id.as_str(), "t03");
        assert_eq!(player.status(), PlayerStatus::Paused);
        assert_eq!(player.personalized().anchor().map(|s| s.id.as_str()), Some("t03"));
        assert!(player.personalized().len() > 1);
        Ok(())
    }

    #[test]
    fn test_sqlite_recommendations_skip_played_songs() -> Result<()> {
        let (_temp_dir, db_path) = create_test_catalog(8)?;
        let catalog = Rc::new(SqliteCatalog::open(&db_path)?);
        let (mut player, _clock) = player_for(Rc::clone(&catalog) as Rc<dyn Catalog>);

        let mut seen = Vec::new();
        player.play(catalog.find_song("t00")?.expect("t00 exists"));
        player.process_pending();
        seen.push(player.current_song().map(|s| s.id.to_string()));
        while let Ok(next) = player.advance() {
            player.process_pending();
            seen.push(Some(next.song.id.to_string()));
        }

        let mut unique = seen.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), seen.len(), "no song played twice: {seen:?}");
        assert_eq!(seen.len(), 8);
        Ok(())
    }
}

#[cfg(test)]
mod cli_tests {
    use super::*;
    use std::process::Command;

    /// Run the binary against `db`, with an empty session config beside it.
    fn cadence(db: &std::path::Path, args: &[&str]) -> std::process::Output {
        let config = db.with_file_name("config.json");
        if !config.exists() {
            std::fs::write(&config, "{}").expect("Failed to write session config");
        }
        Command::new(env!("CARGO_BIN_EXE_cadence"))
            .arg("--db")
            .arg(db)
            .arg("--config")
            .arg(&config)
            .args(args)
            .output()
            .expect("Failed to run cadence")
    }

    #[test]
    fn test_cli_help_displays_correctly() {
        let output = Command::new(env!("CARGO_BIN_EXE_cadence"))
            .arg("--help")
            .output()
            .expect("Failed to run help command");

        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("cadence"));
        assert!(stdout.contains("recommend"));
        assert!(stdout.contains("simulate"));
    }

    #[test]
    fn test_completion_generation() {
        let output = Command::new(env!("CARGO_BIN_EXE_cadence"))
            .args(["completion", "bash"])
            .output()
            .expect("Failed to run completion command");

        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("_cadence"));
        assert!(stdout.contains("complete"));
    }

    #[test]
    fn test_import_list_and_recommend() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let db = temp_dir.path().join("cli.db");
        let library = temp_dir.path().join("library.json");
        std::fs::write(
            &library,
            r#"[
                {"id": "1", "title": "So What", "artist": "Miles Davis", "duration": 562},
                {"id": "2", "title": "Freddie Freeloader", "artist": "Miles Davis"},
                {"id": "3", "title": "Naima", "artist": "John Coltrane"}
            ]"#,
        )?;

        assert!(cadence(&db, &["init-db"]).status.success());
        assert!(!cadence(&db, &["init-db"]).status.success(), "refuses to overwrite");
        assert!(cadence(&db, &["import", library.to_str().unwrap()]).status.success());

        let list = cadence(&db, &["list"]);
        assert!(String::from_utf8_lossy(&list.stdout).contains("Freddie Freeloader"));

        let recommend = cadence(&db, &["recommend", "So What", "--limit", "1"]);
        let stdout = String::from_utf8_lossy(&recommend.stdout);
        assert!(stdout.contains("Freddie Freeloader"), "same artist ranks first: {stdout}");
        assert!(!stdout.contains("Naima"));
        Ok(())
    }

    #[test]
    fn test_simulate_prints_snapshot() -> Result<()> {
        let (temp_dir, db_path) = create_test_catalog(6)?;
        let script = temp_dir.path().join("session.txt");
        std::fs::write(&script, "play Track 0\nwait 25\nnext\nstatus\n")?;

        let output = cadence(&db_path, &["simulate", script.to_str().unwrap()]);
        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("\"personalized\""));
        assert!(stdout.contains("\"status\": \"playing\""));
        Ok(())
    }
}
