//! # Sleep Timer
//!
//! Deferred session termination, either after a number of minutes or once the
//! current song ends. The timer does not own a callback: firing is reported as
//! a `true` return from [`SleepTimer::poll`] or
//! [`SleepTimer::trigger_after_song`], and the controller reacts by closing
//! the session. A timer fires at most once per `start`.

use crate::error::{PlayerError, Result};
use log::{debug, info};
use serde::Serialize;
use std::time::Duration;

/// What the user asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepTimerMode {
    Minutes(u32),
    AfterCurrentSong,
}

impl std::str::FromStr for SleepTimerMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s == "after-song" || s == "after-current-song" {
            return Ok(Self::AfterCurrentSong);
        }
        s.parse::<u32>()
            .map(Self::Minutes)
            .map_err(|_| format!("expected minutes or `after-song', got `{s}'"))
    }
}

/// Observable timer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SleepTimerState {
    #[default]
    Inactive,
    Countdown { remaining_minutes: u32 },
    AfterCurrentSong,
}

#[derive(Debug, Clone)]
pub struct SleepTimer {
    state: SleepTimerState,
    tick: Duration,
    /// Deadline of the next countdown tick; `None` unless counting down.
    next_tick: Option<Duration>,
}

impl SleepTimer {
    /// `tick` is the countdown granularity, one minute in production.
    #[must_use]
    pub fn new(tick: Duration) -> Self {
        Self {
            state: SleepTimerState::Inactive,
            tick,
            next_tick: None,
        }
    }

    /// Replace any running timer.
    ///
    /// # Errors
    ///
    /// A zero-minute countdown is rejected and leaves the previous timer
    /// running.
    pub fn start(&mut self, mode: SleepTimerMode, now: Duration) -> Result<()> {
        match mode {
            SleepTimerMode::Minutes(0) => {
                return Err(PlayerError::InvalidSleepTimer(Duration::ZERO));
            }
            SleepTimerMode::Minutes(minutes) => {
                self.state = SleepTimerState::Countdown { remaining_minutes: minutes };
                self.next_tick = Some(now + self.tick);
                info!("Sleep timer set for {minutes} minute(s)");
            }
            SleepTimerMode::AfterCurrentSong => {
                self.state = SleepTimerState::AfterCurrentSong;
                self.next_tick = None;
                info!("Sleep timer set for end of current song");
            }
        }
        Ok(())
    }

    /// Process every tick due by `now`. Returns `true` exactly once, when the
    /// countdown reaches zero.
    pub fn poll(&mut self, now: Duration) -> bool {
        while let (SleepTimerState::Countdown { remaining_minutes }, Some(deadline)) =
            (self.state, self.next_tick)
        {
            if now < deadline {
                break;
            }
            let remaining = remaining_minutes.saturating_sub(1);
            if remaining == 0 {
                info!("Sleep timer elapsed");
                self.disarm();
                return true;
            }
            debug!("Sleep timer: {remaining} minute(s) left");
            self.state = SleepTimerState::Countdown { remaining_minutes: remaining };
            self.next_tick = Some(deadline + self.tick);
        }
        false
    }

    /// Called when a song ends naturally. Fires only in after-song mode.
    pub fn trigger_after_song(&mut self) -> bool {
        if self.state == SleepTimerState::AfterCurrentSong {
            info!("Sleep timer fired at end of song");
            self.disarm();
            true
        } else {
            false
        }
    }

    pub fn cancel(&mut self) {
        if self.is_active() {
            debug!("Sleep timer cancelled");
        }
        self.disarm();
    }

    #[must_use]
    pub fn state(&self) -> SleepTimerState {
        self.state
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state != SleepTimerState::Inactive
    }

    fn disarm(&mut self) {
        self.state = SleepTimerState::Inactive;
        self.next_tick = None;
    }
}
