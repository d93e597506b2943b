//! The playback state machine.
//!
//! A [`PlaybackEngine`] owns at most one [`Trace`] and a cursor into it. The
//! cursor starts at `None` (before the first step, rendered with the trace's
//! initial snapshot). Navigation only moves the cursor: every step already
//! carries its captured snapshot, so nothing is recomputed.
//!
//! The engine is synchronous. Autoplay timing lives in the session layer,
//! which calls [`PlaybackEngine::tick`] under the session lock.

use std::time::Duration;

use dbviz_core::{Step, Trace};
use serde::Serialize;
use serde_json::Value;

use crate::error::PlaybackError;

pub const MIN_SPEED: f64 = 0.25;
pub const MAX_SPEED: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Idle,
    Step,
    Playing,
    Paused,
}

/// Result of one autoplay tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    pub index: usize,
    /// The cursor reached the last step and playback paused itself.
    pub finished: bool,
}

#[derive(Debug)]
pub struct PlaybackEngine {
    trace: Option<Trace>,
    cursor: Option<usize>,
    mode: Mode,
    speed: f64,
}

impl Default for PlaybackEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackEngine {
    pub fn new() -> Self {
        PlaybackEngine {
            trace: None,
            cursor: None,
            mode: Mode::Idle,
            speed: 1.0,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn trace(&self) -> Option<&Trace> {
        self.trace.as_ref()
    }

    pub fn total_steps(&self) -> usize {
        self.trace.as_ref().map_or(0, Trace::len)
    }

    /// The step under the cursor.
    pub fn current_step(&self) -> Option<&Step> {
        let trace = self.trace.as_ref()?;
        trace.get(self.cursor?)
    }

    /// Rendering data for the cursor position: the step's snapshot, or the
    /// trace's initial snapshot before the first step.
    pub fn current_snapshot(&self) -> Option<&Value> {
        let trace = self.trace.as_ref()?;
        match self.cursor {
            Some(i) => trace.get(i).map(|s| &s.snapshot),
            None => Some(&trace.initial_snapshot),
        }
    }

    /// Replaces the trace. Any state goes to `step` with the cursor before
    /// the first step.
    pub fn attach(&mut self, trace: Trace) {
        self.trace = Some(trace);
        self.cursor = None;
        self.mode = Mode::Step;
    }

    fn loaded(&self) -> Result<&Trace, PlaybackError> {
        self.trace.as_ref().ok_or(PlaybackError::NotInitialized)
    }

    fn next_index(&self) -> Result<usize, PlaybackError> {
        let trace = self.loaded()?;
        let next = self.cursor.map_or(0, |c| c + 1);
        if next >= trace.len() {
            return Err(PlaybackError::NoMoreSteps);
        }
        Ok(next)
    }

    pub fn step_forward(&mut self) -> Result<usize, PlaybackError> {
        let next = self.next_index()?;
        self.cursor = Some(next);
        self.mode = Mode::Step;
        Ok(next)
    }

    /// Moves the cursor back one step. `Ok(None)` means the cursor is now
    /// before the first step.
    pub fn step_backward(&mut self) -> Result<Option<usize>, PlaybackError> {
        self.loaded()?;
        let current = self.cursor.ok_or(PlaybackError::NoPreviousSteps)?;
        self.cursor = current.checked_sub(1);
        self.mode = Mode::Step;
        Ok(self.cursor)
    }

    pub fn play(&mut self) -> Result<(), PlaybackError> {
        self.loaded()?;
        if self.mode == Mode::Playing {
            return Err(PlaybackError::AlreadyPlaying);
        }
        self.next_index()?;
        self.mode = Mode::Playing;
        Ok(())
    }

    /// Advances one step while playing. Returns `None` when not playing.
    /// Reaching the last step pauses playback instead of looping.
    pub fn tick(&mut self) -> Option<Tick> {
        if self.mode != Mode::Playing {
            return None;
        }
        let Ok(index) = self.next_index() else {
            self.mode = Mode::Paused;
            return None;
        };
        self.cursor = Some(index);
        let finished = index + 1 >= self.total_steps();
        if finished {
            self.mode = Mode::Paused;
        }
        Some(Tick { index, finished })
    }

    /// Pauses autoplay. Returns whether playback was running.
    pub fn pause(&mut self) -> bool {
        if self.mode == Mode::Playing {
            self.mode = Mode::Paused;
            true
        } else {
            false
        }
    }

    /// Discards the trace and cursor.
    pub fn reset(&mut self) {
        self.trace = None;
        self.cursor = None;
        self.mode = Mode::Idle;
    }

    /// Sets the speed factor, clamped to `[MIN_SPEED, MAX_SPEED]`. `NaN`
    /// leaves the speed unchanged. Returns the stored speed.
    pub fn set_speed(&mut self, factor: f64) -> f64 {
        if !factor.is_nan() {
            self.speed = factor.clamp(MIN_SPEED, MAX_SPEED);
        }
        self.speed
    }

    /// Autoplay delay between steps for a `base` interval at speed 1.0.
    pub fn interval(&self, base: Duration) -> Duration {
        base.div_f64(self.speed)
    }
}
