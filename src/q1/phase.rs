//! Runtime phase conversion.
//!
//! A float register holding a phase in turns is a 32-bit fixed-point value.
//! `set_ph` wants nanoturns, so the register is wrapped to one turn by
//! clearing the sign bit and multiplied by 1e9 / 2^31 with a fixed list of
//! shift-and-add terms. Each list keeps the result below one full turn for
//! every 31-bit input.

use crate::core::{CompileResult, PhaseResolution, Reg};

use super::instruction::Operand;
use super::isa::SIGN_BIT;
use super::queue::InstructionQueue;

/// `(shift, add)` terms; `add == false` subtracts.
pub type PhaseTerms = &'static [(u32, bool)];

const LOW_TERMS: PhaseTerms = &[(1, true), (5, false), (8, false), (11, true)];

const DEFAULT_TERMS: PhaseTerms = &[
    (1, true),
    (5, false),
    (8, false),
    (10, true),
    (13, false),
    (14, false),
];

const HIGH_TERMS: PhaseTerms = &[
    (1, true),
    (5, false),
    (8, false),
    (10, true),
    (13, false),
    (14, false),
    (15, true),
    (17, false),
    (20, true),
    (22, true),
    (30, false),
];

pub fn phase_terms(resolution: PhaseResolution) -> PhaseTerms {
    match resolution {
        PhaseResolution::Low => LOW_TERMS,
        PhaseResolution::Default => DEFAULT_TERMS,
        PhaseResolution::High => HIGH_TERMS,
    }
}

/// What the emitted conversion computes for a register value.
pub fn convert_phase(raw: u32, resolution: PhaseResolution) -> u32 {
    let masked = raw & !SIGN_BIT;
    phase_terms(resolution)
        .iter()
        .fold(0u32, |acc, &(shift, add)| {
            let term = masked >> shift;
            if add {
                acc.wrapping_add(term)
            } else {
                acc.wrapping_sub(term)
            }
        })
}

impl InstructionQueue {
    /// Convert the phase in turns held by `src` into phase units in `dst`.
    pub fn emit_phase_conversion(&mut self, src: Reg, dst: Reg) -> CompileResult<()> {
        let terms = phase_terms(self.config().phase_resolution);
        self.scoped(|q| {
            let masked = q.temp()?;
            let term = q.temp()?;
            q.emit(
                "and",
                vec![src.into(), Operand::word(!SIGN_BIT), masked.into()],
            )?;
            let mut first = true;
            for &(shift, add) in terms {
                if first {
                    q.emit("asr", vec![masked.into(), Operand::word(shift), dst.into()])?;
                    first = false;
                    continue;
                }
                q.emit("asr", vec![masked.into(), Operand::word(shift), term.into()])?;
                let op = if add { "add" } else { "sub" };
                q.emit(op, vec![dst.into(), term.into(), dst.into()])?;
            }
            Ok(())
        })
    }
}
