//! Shared statement clock of a sequence under construction.
//!
//! Statements are stamped with the current time and, outside parallel
//! sections, push the clock forward by their duration. Inside a parallel
//! section the clock stays put and only the end time grows, so every track
//! of the section starts together; leaving the section snaps the clock to
//! the slowest track.

use log::trace;

use super::error::{CompileError, CompileResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeline {
    current_time: u64,
    end_time: u64,
    auto_update: bool,
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Timeline {
    pub fn new() -> Self {
        Self {
            current_time: 0,
            end_time: 0,
            auto_update: true,
        }
    }

    /// A timeline whose clock starts at `time`.
    pub fn starting_at(time: u64) -> Self {
        Self {
            current_time: time,
            end_time: time,
            auto_update: true,
        }
    }

    pub fn current_time(&self) -> u64 {
        self.current_time
    }

    pub fn end_time(&self) -> u64 {
        self.end_time
    }

    pub fn is_parallel(&self) -> bool {
        !self.auto_update
    }

    /// Account for a statement of `duration` ns starting now. Returns its start time.
    pub fn add(&mut self, duration: u64) -> u64 {
        let start = self.current_time;
        self.end_time = self.end_time.max(start + duration);
        if self.auto_update {
            self.current_time = start + duration;
        }
        start
    }

    /// Move the clock forward to `time`.
    pub fn advance_to(&mut self, time: u64) -> CompileResult<()> {
        if time < self.current_time {
            return Err(CompileError::timing(format!(
                "timeline cannot move back from {} to {} ns",
                self.current_time, time
            )));
        }
        self.current_time = time;
        self.end_time = self.end_time.max(time);
        Ok(())
    }

    /// Enter a parallel section.
    pub fn disable_update(&mut self) -> CompileResult<()> {
        if !self.auto_update {
            return Err(CompileError::syntax("parallel sections cannot be nested"));
        }
        self.auto_update = false;
        Ok(())
    }

    /// Leave a parallel section; the clock continues from the latest end time.
    pub fn enable_update(&mut self) -> CompileResult<()> {
        if self.auto_update {
            return Err(CompileError::syntax("no parallel section is open"));
        }
        self.auto_update = true;
        trace!(
            "parallel section closed, clock {} -> {} ns",
            self.current_time,
            self.end_time
        );
        self.current_time = self.end_time;
        Ok(())
    }
}
