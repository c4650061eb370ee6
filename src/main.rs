//! # Cadence
//!
//! Command-line front end for the playback core: manages the SQLite catalog,
//! previews recommendations and runs scripted sessions on simulated time.
//!
//! ## Usage
//!
//! ```bash
//! cadence init-db
//! cadence import library.json
//! cadence list
//! cadence recommend "So What" --limit 10
//! RUST_LOG=debug cadence simulate session.txt
//! ```

use anyhow::{bail, Context, Result};
use cadence::catalog::{Catalog, RecommendationRequest, Seeds, SqliteCatalog};
use cadence::cli::{self, Args, Command};
use cadence::completion;
use cadence::config::RuntimeConfig;
use cadence::simulate::{self, Simulation};
use cadence::song::{Song, UserId};
use clap::{CommandFactory, Parser};
use log::info;
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;
use std::rc::Rc;

/// Main entry point.
///
/// Logging is controlled through `RUST_LOG`:
/// - `RUST_LOG=debug cadence simulate s.txt` - Enable debug logging
/// - `RUST_LOG=cadence::controller=trace cadence simulate s.txt` - Module-specific logging
fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();
    // Completion must work without a data directory.
    let resolve = || RuntimeConfig::resolve(args.db.clone(), args.config.as_deref());

    match args.command {
        Command::InitDb { force } => {
            let runtime = resolve()?;
            info!("Initializing catalog at {}", runtime.db_path.display());
            SqliteCatalog::init(&runtime.db_path, force)?;
            println!("Catalog created at {}", runtime.db_path.display());
        }
        Command::Import { path } => {
            let runtime = resolve()?;
            let songs = read_songs(&path)?;
            let mut catalog = open_catalog(&runtime.db_path)?;
            let count = catalog.import_songs(&songs)?;
            println!("Imported {count} song(s) from {}", path.display());
        }
        Command::List => {
            let runtime = resolve()?;
            let catalog = open_catalog(&runtime.db_path)?;
            list_songs(&catalog)?;
        }
        Command::Recommend { song, limit, shuffle } => {
            let runtime = resolve()?;
            let catalog = open_catalog(&runtime.db_path)?;
            let Some(seed) = catalog.find_song(&song)? else {
                bail!("No song matching `{song}' in the catalog");
            };
            let request = RecommendationRequest {
                user: UserId::from("local"),
                seeds: Seeds::Single(seed.clone()),
                exclude: HashSet::new(),
                limit,
                shuffle,
            };
            println!("Because you played {seed}:");
            for (rank, song) in catalog.recommend(&request)?.iter().enumerate() {
                println!("{:>3}. {song}", rank + 1);
            }
        }
        Command::Simulate { script, user } => {
            let runtime = resolve()?;
            let text = read_script(&script)?;
            let commands = simulate::parse_script(&text)?;
            let catalog: Rc<dyn Catalog> = Rc::new(open_catalog(&runtime.db_path)?);
            let mut simulation = Simulation::new(catalog, runtime.session.clone(), UserId::from(user))?;

            let mut stdout = std::io::stdout().lock();
            let snapshot = simulation.run(&commands, &mut stdout)?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        Command::Completion { shell } => {
            let mut cmd = cli::Args::command();
            completion::generate_completions(completion::shell_to_completion_shell(&shell), &mut cmd);
        }
        Command::CompleteSongs => {
            completion::print_song_completions(&resolve()?.db_path)?;
        }
    }

    Ok(())
}

fn open_catalog(db_path: &Path) -> Result<SqliteCatalog> {
    if !db_path.exists() {
        bail!(
            "No catalog at {}. Run `cadence init-db` first.",
            db_path.display()
        );
    }
    SqliteCatalog::open(db_path)
}

fn read_songs(path: &Path) -> Result<Vec<Song>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid song list in {}", path.display()))
}

fn read_script(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read script from stdin")?;
        return Ok(text);
    }
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn list_songs(catalog: &SqliteCatalog) -> Result<()> {
    let songs = catalog.songs()?;
    if songs.is_empty() {
        println!("The catalog is empty. Import songs with `cadence import <json>`.");
        return Ok(());
    }

    println!("{:<12} {:<28} {:<24} {:>7} {:>7} {:>6}", "ID", "Title", "Artist", "Touches", "Listens", "Skips");
    for song in &songs {
        let stats = catalog.stats(&song.id)?.unwrap_or_default();
        println!(
            "{:<12} {:<28} {:<24} {:>7} {:>7} {:>6}{}",
            truncate(song.id.as_str(), 12),
            truncate(&song.title, 28),
            truncate(&song.artist, 24),
            stats.touches,
            stats.listens,
            stats.skips,
            if song.is_liked { "  ♥" } else { "" }
        );
    }
    println!("\n{} song(s)", songs.len());
    Ok(())
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(width.saturating_sub(1)).collect();
        cut.push('…');
        cut
    }
}
