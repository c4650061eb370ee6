//! # Scripted Sessions
//!
//! Drives a [`PlaybackController`] from a line-oriented script on a
//! [`ManualClock`], so whole listening sessions run instantly and
//! reproducibly. `wait` advances time one second at a time: playing songs
//! move forward, finish on their own once their duration is reached, and
//! deferred recommendation requests are resolved after every step.
//!
//! ```text
//! # comments and blank lines are ignored
//! play So What
//! wait 25
//! next
//! queue Blue in Green
//! sleep 30
//! status
//! ```

use crate::catalog::Catalog;
use crate::clock::{Clock, ManualClock};
use crate::config::SessionConfig;
use crate::controller::{PlaybackController, SongEnd};
use crate::media::{CatalogDurationTransport, MediaTransport};
use crate::session::{PlayerStatus, SessionSnapshot};
use crate::sleep_timer::SleepTimerMode;
use crate::song::{RepeatMode, Song, UserId};
use anyhow::{anyhow, bail, Context, Result};
use log::{debug, warn};
use std::io::Write;
use std::rc::Rc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum ScriptCommand {
    Play(String),
    Queue(String),
    Next,
    Prev,
    End,
    Wait(Duration),
    Seek(Duration),
    Repeat(RepeatMode),
    Shuffle(bool),
    Sleep(SleepTimerMode),
    CancelSleep,
    Volume(f32),
    Like,
    Resume,
    Close,
    Status,
}

/// Parse a script. Errors name the offending line.
pub fn parse_script(text: &str) -> Result<Vec<ScriptCommand>> {
    text.lines()
        .enumerate()
        .map(|(index, line)| (index + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(number, line)| {
            parse_line(line).with_context(|| format!("line {number}: `{line}'"))
        })
        .collect()
}

fn parse_line(line: &str) -> Result<ScriptCommand> {
    let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();
    let needs_arg = |what: &str| argument(word, rest, what);

    let command = match word {
        "play" => ScriptCommand::Play(needs_arg("a song")?.to_string()),
        "queue" => ScriptCommand::Queue(needs_arg("a song")?.to_string()),
        "next" => ScriptCommand::Next,
        "prev" | "previous" => ScriptCommand::Prev,
        "end" => ScriptCommand::End,
        "wait" => ScriptCommand::Wait(parse_secs(needs_arg("seconds")?)?),
        "seek" => ScriptCommand::Seek(parse_secs(needs_arg("seconds")?)?),
        "repeat" => ScriptCommand::Repeat(needs_arg("a mode")?.parse().map_err(|e| anyhow!("{e}"))?),
        "shuffle" => match needs_arg("on or off")? {
            "on" => ScriptCommand::Shuffle(true),
            "off" => ScriptCommand::Shuffle(false),
            other => bail!("expected on or off, got `{other}'"),
        },
        "sleep" => match needs_arg("minutes or after-song")? {
            "cancel" | "off" => ScriptCommand::CancelSleep,
            mode => ScriptCommand::Sleep(mode.parse().map_err(|e| anyhow!("{e}"))?),
        },
        "volume" => ScriptCommand::Volume(needs_arg("a level")?.parse().context("invalid volume")?),
        "like" => ScriptCommand::Like,
        "resume" => ScriptCommand::Resume,
        "close" => ScriptCommand::Close,
        "status" => ScriptCommand::Status,
        other => bail!("unknown command `{other}'"),
    };
    Ok(command)
}

fn argument<'a>(word: &str, rest: &'a str, what: &str) -> Result<&'a str> {
    if rest.is_empty() {
        bail!("`{word}' needs {what}");
    }
    Ok(rest)
}

fn parse_secs(value: &str) -> Result<Duration> {
    let secs: f64 = value.parse().with_context(|| format!("invalid seconds `{value}'"))?;
    Duration::try_from_secs_f64(secs).map_err(|e| anyhow!("invalid seconds `{value}': {e}"))
}

/// A controller on simulated time, plus song lookup by name.
pub struct Simulation {
    player: PlaybackController,
    clock: Rc<ManualClock>,
    library: Vec<Song>,
}

impl Simulation {
    /// Signed in as `user`, with durations taken from the catalog.
    pub fn new(catalog: Rc<dyn Catalog>, config: SessionConfig, user: UserId) -> Result<Self> {
        let library = catalog.songs().context("Failed to load catalog songs")?;
        let clock = Rc::new(ManualClock::new());
        let transport: Rc<dyn MediaTransport> = Rc::new(CatalogDurationTransport);
        let mut player = PlaybackController::new(catalog, transport, Rc::clone(&clock) as Rc<dyn Clock>, config);
        player.sign_in(user);
        Ok(Self {
            player,
            clock,
            library,
        })
    }

    #[must_use]
    pub fn player(&self) -> &PlaybackController {
        &self.player
    }

    /// Exact id first, then a case-insensitive title or artist match.
    pub fn find(&self, query: &str) -> Option<Song> {
        let needle = query.to_lowercase();
        self.library
            .iter()
            .find(|s| s.id.as_str() == query)
            .or_else(|| self.library.iter().find(|s| s.title.to_lowercase() == needle))
            .or_else(|| {
                self.library.iter().find(|s| {
                    s.title.to_lowercase().contains(&needle) || s.artist.to_lowercase().contains(&needle)
                })
            })
            .cloned()
    }

    /// Run every command, writing a log of events to `out`.
    pub fn run<W: Write>(&mut self, commands: &[ScriptCommand], out: &mut W) -> Result<SessionSnapshot> {
        for command in commands {
            debug!("Script: {command:?}");
            self.step(command, out)?;
        }
        Ok(self.player.snapshot())
    }

    fn step<W: Write>(&mut self, command: &ScriptCommand, out: &mut W) -> Result<()> {
        match command {
            ScriptCommand::Play(query) => {
                let song = self.lookup(query)?;
                writeln!(out, "play  {song}")?;
                self.player.play(song);
                self.player.process_pending();
            }
            ScriptCommand::Queue(query) => {
                let song = self.lookup(query)?;
                writeln!(out, "queue {song}")?;
                self.player.enqueue(song);
            }
            ScriptCommand::Next => match self.player.advance() {
                Ok(next) => writeln!(out, "next  {} ({:?})", next.song, next.source)?,
                Err(e) => writeln!(out, "next  -- {e}")?,
            },
            ScriptCommand::Prev => match self.player.previous() {
                Ok(previous) => writeln!(out, "prev  {previous:?}")?,
                Err(e) => writeln!(out, "prev  -- {e}")?,
            },
            ScriptCommand::End => self.finish_song(out)?,
            ScriptCommand::Wait(duration) => self.wait(*duration, out)?,
            ScriptCommand::Seek(target) => match self.player.seek(*target) {
                Ok(true) => writeln!(out, "seek  {:.1}s", self.player.position().as_secs_f64())?,
                Ok(false) => writeln!(out, "seek  pending {:.1}s", target.as_secs_f64())?,
                Err(e) => writeln!(out, "seek  -- {e}")?,
            },
            ScriptCommand::Repeat(mode) => self.player.set_repeat_mode(*mode),
            ScriptCommand::Shuffle(enabled) => self.player.set_shuffle_enabled(*enabled),
            ScriptCommand::Sleep(mode) => {
                if let Err(e) = self.player.start_sleep_timer(*mode) {
                    writeln!(out, "sleep -- {e}")?;
                }
            }
            ScriptCommand::CancelSleep => self.player.cancel_sleep_timer(),
            ScriptCommand::Volume(level) => {
                self.player.set_volume(*level);
            }
            ScriptCommand::Like => {
                let Some(id) = self.player.current_song().map(|s| s.id.clone()) else {
                    writeln!(out, "like  -- nothing is playing")?;
                    return Ok(());
                };
                match self.player.toggle_like(&id) {
                    Ok(liked) => writeln!(out, "like  {id} -> {liked}")?,
                    Err(e) => writeln!(out, "like  -- {e}")?,
                }
            }
            ScriptCommand::Resume => match self.player.restore_last_played() {
                Some(song) => writeln!(out, "resume {song}")?,
                None => writeln!(out, "resume -- nothing to restore")?,
            },
            ScriptCommand::Close => {
                self.player.close();
                writeln!(out, "close")?;
            }
            ScriptCommand::Status => {
                let snapshot = self.player.snapshot();
                writeln!(out, "{}", serde_json::to_string_pretty(&snapshot)?)?;
            }
        }
        Ok(())
    }

    fn lookup(&self, query: &str) -> Result<Song> {
        self.find(query)
            .ok_or_else(|| anyhow!("No song matching `{query}' in the catalog"))
    }

    fn finish_song<W: Write>(&mut self, out: &mut W) -> Result<()> {
        match self.player.on_song_end() {
            Ok(SongEnd::Advanced(next)) => writeln!(out, "end   -> {} ({:?})", next.song, next.source)?,
            Ok(SongEnd::Repeated) => writeln!(out, "end   -> repeat")?,
            Ok(SongEnd::Slept) => writeln!(out, "end   -> sleep timer closed the player")?,
            Err(e) => writeln!(out, "end   -- {e}")?,
        }
        self.player.process_pending();
        Ok(())
    }

    fn wait<W: Write>(&mut self, duration: Duration, out: &mut W) -> Result<()> {
        let second = Duration::from_secs(1);
        let mut left = duration;
        while !left.is_zero() {
            let step = left.min(second);
            left -= step;
            self.clock.advance(step);

            if self.player.status() == PlayerStatus::Playing {
                let position = self.player.position() + step;
                self.player.on_position_update(position);
                if self.player.duration().is_some_and(|d| position >= d) {
                    self.finish_song(out)?;
                }
            }

            if self.player.tick() {
                writeln!(out, "sleep timer closed the player")?;
            }
            self.player.process_pending();
        }
        if self.player.status() == PlayerStatus::Idle && self.player.pending_requests() > 0 {
            warn!("Requests still pending while idle");
        }
        Ok(())
    }
}
