//! # Command-Line Interface Module
//!
//! Clap derive definitions for the `cadence` binary.
//!
//! ## Commands
//!
//! - `init-db`: Create an empty catalog database
//! - `import`: Load songs from a JSON file into the catalog
//! - `list`: Display all catalogued songs with statistics
//! - `recommend`: Show what the recommender would pick after a song
//! - `simulate`: Run a scripted listening session on simulated time
//! - `completion`: Generate shell completions
//!
//! ## Examples
//!
//! ```bash
//! cadence init-db
//! cadence import library.json
//! cadence recommend "Blue in Green" --limit 10
//! cadence simulate session.txt
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Shell types supported for completion generation
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    /// Bash shell
    Bash,
    /// Zsh shell
    Zsh,
    /// Fish shell
    Fish,
    /// PowerShell
    PowerShell,
    /// Elvish shell
    Elvish,
}

/// Main application arguments structure.
#[derive(Parser, Debug)]
#[command(name = "cadence")]
#[command(about = "Cadence: playback orchestration with adaptive queueing")]
#[command(version)]
pub struct Args {
    /// Catalog database to use instead of the default data directory
    #[arg(long, global = true, env = "CADENCE_DB", value_hint = clap::ValueHint::FilePath)]
    pub db: Option<PathBuf>,

    /// Session configuration file (JSON)
    #[arg(long, global = true, env = "CADENCE_CONFIG", value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the catalog database
    ///
    /// Fails if the database already exists unless `--force` is given.
    InitDb {
        /// Delete and recreate an existing database
        #[arg(long)]
        force: bool,
    },

    /// Import songs from a JSON array
    ///
    /// Each entry needs `id`, `title` and `artist`; `file_id`, `album`,
    /// `img_id`, `is_liked` and `duration` (seconds) are optional. Existing
    /// songs with the same id are updated.
    Import {
        /// JSON file to read
        #[arg(value_hint = clap::ValueHint::FilePath)]
        path: PathBuf,
    },

    /// List all songs in the catalog
    ///
    /// Shows touches (times started), listens and skips for every song.
    List,

    /// Show recommendations seeded by one song
    Recommend {
        /// Song id, or part of a title or artist name
        #[arg(value_hint = clap::ValueHint::Other)]
        song: String,

        /// Number of recommendations to show
        #[arg(short, long, default_value = "5")]
        limit: usize,

        /// Let the recommender vary its ordering
        #[arg(long)]
        shuffle: bool,
    },

    /// Run a scripted session against the catalog
    ///
    /// The script holds one command per line (`play <song>`, `next`,
    /// `prev`, `queue <song>`, `wait <secs>`, `end`, `seek <secs>`,
    /// `repeat <mode>`, `shuffle on|off`, `sleep <minutes|after-song>`,
    /// `like`, `close`, `status`). Time is simulated, so `wait 600`
    /// returns immediately. A snapshot is printed as JSON after `status`
    /// and at the end of the script.
    Simulate {
        /// Script file, or `-` for stdin
        #[arg(value_hint = clap::ValueHint::FilePath)]
        script: PathBuf,

        /// User the session runs as
        #[arg(long, default_value = "local")]
        user: String,
    },

    /// Generate shell completions
    ///
    /// Usage: cadence completion bash > ~/.local/share/bash-completion/completions/cadence
    Completion {
        /// Shell to generate completions for
        shell: Shell,
    },

    /// List song titles for completion (hidden command)
    #[command(hide = true)]
    CompleteSongs,
}
