//! Focus/break cycle.
//!
//! [`PomodoroTimer`] is the state machine; it only moves when something calls
//! [`PomodoroTimer::tick`]. [`driver::TimerDriver`] supplies that one-second
//! cadence on a tokio runtime.

use crate::{CoreError, PomodoroSettings, Session, Store, StudyService, SubjectId};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod driver;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TimerMode {
    Work,
    ShortBreak,
    LongBreak,
}

impl TimerMode {
    pub fn label(&self) -> &'static str {
        match self {
            TimerMode::Work => "Focus Time",
            TimerMode::ShortBreak => "Short Break",
            TimerMode::LongBreak => "Long Break",
        }
    }

    /// Configured length in seconds.
    pub fn duration_secs(&self, settings: &PomodoroSettings) -> u64 {
        let minutes = match self {
            TimerMode::Work => settings.work_minutes,
            TimerMode::ShortBreak => settings.short_break_minutes,
            TimerMode::LongBreak => settings.long_break_minutes,
        };
        u64::from(minutes) * 60
    }
}

impl fmt::Display for TimerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimerSnapshot {
    pub mode: TimerMode,
    pub remaining_secs: u64,
    pub total_secs: u64,
    pub active: bool,
    pub completed_work_intervals: u32,
}

impl TimerSnapshot {
    /// "MM:SS" of the remaining time.
    pub fn clock(&self) -> String {
        format!("{:02}:{:02}", self.remaining_secs / 60, self.remaining_secs % 60)
    }

    pub fn progress(&self) -> f32 {
        if self.total_secs == 0 {
            0.0
        } else {
            (self.total_secs - self.remaining_secs.min(self.total_secs)) as f32 / self.total_secs as f32
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transition {
    pub from: TimerMode,
    pub to: TimerMode,
    /// Set when a finished work interval was written to the store.
    pub recorded: Option<Session>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Paused; nothing moved.
    Idle,
    Running { remaining_secs: u64 },
    Expired(Transition),
}

pub struct PomodoroTimer {
    study: StudyService,
    settings: PomodoroSettings,
    mode: TimerMode,
    remaining_secs: u64,
    active: bool,
    completed_work_intervals: u32,
    subject: Option<SubjectId>,
}

impl PomodoroTimer {
    /// Starts paused in `Work` with the store's current settings.
    pub fn new(store: Store) -> Self {
        let settings = store.settings().pomodoro;
        Self {
            study: StudyService::new(store),
            settings,
            mode: TimerMode::Work,
            remaining_secs: TimerMode::Work.duration_secs(&settings),
            active: false,
            completed_work_intervals: 0,
            subject: None,
        }
    }

    pub fn mode(&self) -> TimerMode {
        self.mode
    }

    pub fn remaining_secs(&self) -> u64 {
        self.remaining_secs
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn completed_work_intervals(&self) -> u32 {
        self.completed_work_intervals
    }

    pub fn subject(&self) -> Option<SubjectId> {
        self.subject
    }

    pub fn settings(&self) -> &PomodoroSettings {
        &self.settings
    }

    pub fn select_subject(&mut self, subject: Option<SubjectId>) {
        self.subject = subject;
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            mode: self.mode,
            remaining_secs: self.remaining_secs,
            total_secs: self.mode.duration_secs(&self.settings),
            active: self.active,
            completed_work_intervals: self.completed_work_intervals,
        }
    }

    pub fn start(&mut self) {
        self.active = true;
    }

    pub fn pause(&mut self) {
        self.active = false;
    }

    pub fn toggle(&mut self) -> bool {
        self.active = !self.active;
        self.active
    }

    /// Restores the full duration of the current mode. Mode, counter and the
    /// active flag are untouched.
    pub fn reset(&mut self) {
        self.remaining_secs = self.mode.duration_secs(&self.settings);
    }

    /// Manual switch: pauses and discards the current countdown.
    pub fn set_mode(&mut self, mode: TimerMode) {
        self.active = false;
        self.mode = mode;
        self.remaining_secs = mode.duration_secs(&self.settings);
    }

    /// New settings always become the source of durations. A paused timer
    /// picks them up immediately; a running countdown keeps its remaining time
    /// until the next mode change.
    pub fn apply_settings(&mut self, settings: PomodoroSettings) {
        self.settings = settings;
        if !self.active {
            self.remaining_secs = self.mode.duration_secs(&self.settings);
        }
    }

    /// Re-reads settings from the store.
    pub fn reload_settings(&mut self) {
        let settings = self.study.settings().pomodoro;
        self.apply_settings(settings);
    }

    /// One elapsed second.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Result<TickOutcome, CoreError> {
        if !self.active {
            return Ok(TickOutcome::Idle);
        }
        self.remaining_secs = self.remaining_secs.saturating_sub(1);
        if self.remaining_secs > 0 {
            return Ok(TickOutcome::Running {
                remaining_secs: self.remaining_secs,
            });
        }
        self.expire(now).map(TickOutcome::Expired)
    }

    fn expire(&mut self, now: DateTime<Utc>) -> Result<Transition, CoreError> {
        self.active = false;
        let from = self.mode;
        let mut recorded = None;
        let to = match from {
            TimerMode::Work => {
                // On a failed write the machine stays paused at 00:00 in Work,
                // so starting again retries the record.
                recorded = self.record_work_interval(now)?;
                self.completed_work_intervals = self.completed_work_intervals.saturating_add(1);
                let every = self.settings.sessions_per_long_break;
                if every != 0 && self.completed_work_intervals % every == 0 {
                    TimerMode::LongBreak
                } else {
                    TimerMode::ShortBreak
                }
            }
            TimerMode::ShortBreak | TimerMode::LongBreak => TimerMode::Work,
        };
        self.mode = to;
        self.remaining_secs = to.duration_secs(&self.settings);
        Ok(Transition { from, to, recorded })
    }

    fn record_work_interval(&self, now: DateTime<Utc>) -> Result<Option<Session>, CoreError> {
        let Some(subject_id) = self.subject else {
            tracing::debug!("work interval finished with no subject selected; not recorded");
            return Ok(None);
        };
        let duration = TimerMode::Work.duration_secs(&self.settings);
        // At most u32::MAX minutes, well inside i64 seconds.
        let start = now - Duration::seconds(duration as i64);
        let session = self.study.record_session(subject_id, duration, start)?;
        tracing::info!(subject = %subject_id, duration, "recorded study session");
        Ok(Some(session))
    }
}
