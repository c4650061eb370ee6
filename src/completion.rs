//! # Shell Completion Module
//!
//! Completion scripts via `clap_complete`, plus a hidden helper that lists
//! song titles from the catalog for dynamic completion of `recommend`.
//!
//! ```bash
//! cadence completion bash > ~/.local/share/bash-completion/completions/cadence
//! cadence completion zsh > ~/.config/zsh/completions/_cadence
//! ```

use crate::catalog::{Catalog, SqliteCatalog};
use anyhow::Result;
use clap::Command;
use clap_complete::{generate, Generator, Shell as CompletionShell};
use std::io;
use std::path::Path;

/// Generate shell completions for the given shell
pub fn generate_completions<G: Generator>(gen: G, cmd: &mut Command) {
    generate(gen, cmd, cmd.get_name().to_string(), &mut io::stdout());
}

/// Convert our Shell enum to clap_complete's Shell enum
pub fn shell_to_completion_shell(shell: &crate::cli::Shell) -> CompletionShell {
    match shell {
        crate::cli::Shell::Bash => CompletionShell::Bash,
        crate::cli::Shell::Zsh => CompletionShell::Zsh,
        crate::cli::Shell::Fish => CompletionShell::Fish,
        crate::cli::Shell::PowerShell => CompletionShell::PowerShell,
        crate::cli::Shell::Elvish => CompletionShell::Elvish,
    }
}

/// Titles and artists known to the catalog, sorted and deduplicated.
///
/// A missing or unreadable database yields an empty list; completion must
/// never fail loudly.
pub fn get_song_completions(db_path: &Path) -> Result<Vec<String>> {
    if !db_path.exists() {
        return Ok(Vec::new());
    }

    let songs = match SqliteCatalog::open(db_path).map(|catalog| catalog.songs()) {
        Ok(Ok(songs)) => songs,
        _ => return Ok(Vec::new()),
    };

    let mut completions: Vec<String> = songs
        .into_iter()
        .flat_map(|song| [song.title, song.artist])
        .filter(|s| !s.is_empty())
        .collect();
    completions.sort();
    completions.dedup();
    Ok(completions)
}

/// Print completions one per line, quoting entries with whitespace.
pub fn print_song_completions(db_path: &Path) -> Result<()> {
    for completion in get_song_completions(db_path)? {
        if completion.contains(char::is_whitespace) {
            println!("\"{}\"", completion.replace('"', "\\\""));
        } else {
            println!("{completion}");
        }
    }
    Ok(())
}
