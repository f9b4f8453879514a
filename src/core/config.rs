//! Compiler configuration.
//!
//! A plain value type with defaults matching the hardware: 32 registers,
//! signed emulation on, `wait_sync` prologue on. The command line driver maps
//! its flags onto this struct.

use super::error::{CompileError, CompileResult};

/// Number of shift-and-add terms used to convert a phase register to
/// hardware phase units at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PhaseResolution {
    /// 4 terms, error up to ~7e5 units.
    Low,
    /// 6 terms, error up to ~5e4 units.
    #[default]
    Default,
    /// 11 terms, error below 4 units.
    High,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerConfig {
    /// Emulate arithmetic shift right and signed comparisons.
    pub emulate_signed: bool,
    pub phase_resolution: PhaseResolution,
    /// A gap needing more `wait` instructions than this becomes a wait loop.
    pub max_unrolled_waits: usize,
    /// Update interval of offset and gain ramps in ns.
    pub ramp_step: u64,
    /// Emit `wait_sync` before the first statement.
    pub sync_on_start: bool,
    /// Size of the physical register bank.
    pub register_count: usize,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            emulate_signed: true,
            phase_resolution: PhaseResolution::Default,
            max_unrolled_waits: 3,
            ramp_step: 100,
            sync_on_start: true,
            register_count: 32,
        }
    }
}

impl CompilerConfig {
    pub fn with_signed_emulation(mut self, enabled: bool) -> Self {
        self.emulate_signed = enabled;
        self
    }

    pub fn with_phase_resolution(mut self, resolution: PhaseResolution) -> Self {
        self.phase_resolution = resolution;
        self
    }

    pub fn with_max_unrolled_waits(mut self, count: usize) -> Self {
        self.max_unrolled_waits = count;
        self
    }

    pub fn with_ramp_step(mut self, step: u64) -> Self {
        self.ramp_step = step;
        self
    }

    pub fn with_sync_on_start(mut self, enabled: bool) -> Self {
        self.sync_on_start = enabled;
        self
    }

    pub fn with_register_count(mut self, count: usize) -> Self {
        self.register_count = count;
        self
    }

    /// Check the values the scheduler relies on.
    pub fn validate(&self) -> CompileResult<()> {
        if self.register_count == 0 || self.register_count > 64 {
            return Err(CompileError::value(format!(
                "register count must be between 1 and 64, got {}",
                self.register_count
            )));
        }
        if self.ramp_step < 20 || self.ramp_step % 4 != 0 || self.ramp_step > 65532 {
            return Err(CompileError::value(format!(
                "ramp step must be a multiple of 4 between 20 and 65532 ns, got {}",
                self.ramp_step
            )));
        }
        if self.max_unrolled_waits == 0 {
            return Err(CompileError::value("max unrolled waits must be at least 1"));
        }
        Ok(())
    }
}
