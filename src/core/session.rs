// This module tracks per-compilation statistics for the q1seq scheduler. CompilationStats
// is owned by the instruction queue and updated as instructions are appended, waits are
// folded or synthesized, pending parameter updates are flushed, merged or reused, and
// settings are overwritten under a shared update. The register allocator's high-water
// mark is copied in on finalization. The Display implementation renders the summary that
// the compiler logs at info level and the command line driver prints with --stats.

//! Compilation statistics.

use std::collections::BTreeMap;
use std::fmt;

/// Counters collected while compiling one sequence.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CompilationStats {
    /// Instructions appended or inserted, including overwritten ones.
    pub instructions_emitted: usize,

    /// Count of each mnemonic.
    pub instruction_counts: BTreeMap<String, usize>,

    /// No-ops inserted for write-then-read hazards.
    pub hazard_nops: usize,

    /// Gaps absorbed into the trailing wait of a real-time instruction.
    pub waits_folded: usize,

    /// Explicit `wait` instructions with an immediate duration.
    pub waits_emitted: usize,

    /// Gaps long enough to need a runtime wait loop.
    pub wait_loops: usize,

    pub updates_flushed: usize,
    pub updates_merged: usize,
    pub updates_reused: usize,
    pub settings_overwritten: usize,

    /// Largest number of registers live at once.
    pub register_high_water: usize,
}

impl CompilationStats {
    pub fn record_instruction(&mut self, mnemonic: &str) {
        self.instructions_emitted += 1;
        *self
            .instruction_counts
            .entry(mnemonic.to_string())
            .or_insert(0) += 1;
    }

    pub fn count(&self, mnemonic: &str) -> usize {
        self.instruction_counts.get(mnemonic).copied().unwrap_or(0)
    }
}

impl fmt::Display for CompilationStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Compilation Statistics:")?;
        writeln!(f, "  Instructions emitted: {}", self.instructions_emitted)?;
        writeln!(f, "  Hazard nops: {}", self.hazard_nops)?;
        writeln!(
            f,
            "  Waits: {} folded, {} emitted, {} loops",
            self.waits_folded, self.waits_emitted, self.wait_loops
        )?;
        writeln!(
            f,
            "  Parameter updates: {} flushed, {} merged, {} reused",
            self.updates_flushed, self.updates_merged, self.updates_reused
        )?;
        writeln!(f, "  Settings overwritten: {}", self.settings_overwritten)?;
        writeln!(f, "  Register high-water mark: {}", self.register_high_water)?;

        if !self.instruction_counts.is_empty() {
            writeln!(f, "  Instruction breakdown:")?;
            let mut sorted: Vec<_> = self.instruction_counts.iter().collect();
            sorted.sort_by_key(|(_, count)| std::cmp::Reverse(**count));
            for (mnemonic, count) in sorted {
                writeln!(f, "    {}: {}", mnemonic, count)?;
            }
        }
        Ok(())
    }
}
