//! Offset and gain ramps.
//!
//! A ramp is a runtime loop that adds a fixed step to a pair of 32-bit
//! fixed-point accumulators and commits the upper 16 bits every
//! `ramp_step` ns. The exact end value is set once more when the ramp
//! duration has elapsed, so rounding in the step never shows in the output.

use log::debug;

use crate::core::fixed_point::{encode_i16, encode_i32};
use crate::core::{CompileError, CompileResult};

use super::instruction::{Instruction, Operand};
use super::queue::{InstructionQueue, MergePolicy};

impl InstructionQueue {
    /// Ramp the setting `mnemonic` (`set_awg_offs` or `set_awg_gain`) from
    /// `from` to `to` over `duration` ns, starting at `time`.
    pub fn emit_ramp(
        &mut self,
        mnemonic: &'static str,
        from: (f64, f64),
        to: (f64, f64),
        duration: u64,
        time: u64,
    ) -> CompileResult<()> {
        self.ensure_mutable()?;
        if self.conditional.is_some() {
            return Err(CompileError::syntax(
                "ramps are not allowed inside conditional blocks",
            ));
        }
        let step = self.config().ramp_step;
        let steps = duration / step;
        if steps == 0 {
            return Err(CompileError::value(format!(
                "ramp of {duration} ns is shorter than one {step} ns step"
            )));
        }
        let start = [encode_i32(from.0)?, encode_i32(from.1)?];
        let end = [encode_i32(to.0)?, encode_i32(to.1)?];
        let final_values = [encode_i16(to.0)?, encode_i16(to.1)?];
        let delta = [0usize, 1].map(|k| ((end[k] as i64 - start[k] as i64) / steps as i64) as i32);

        let target = self.to_internal(time)?;
        // Check the end time before anything is emitted.
        self.to_internal(time + duration)?;

        self.scoped(|q| {
            let acc = q.registers.temp_regs(2)?;
            let out = q.registers.temp_regs(2)?;
            let counter = q.temp()?;
            for k in 0..2 {
                q.emit("move", vec![Operand::word(start[k] as u32), acc[k].into()])?;
            }
            q.emit("move", vec![Operand::word(steps as u32), counter.into()])?;

            q.advance_internal(target, MergePolicy::Merge, false)?;
            let label = q.fresh_label("ramp");
            q.set_label(label.clone())?;
            for k in 0..2 {
                q.emit("asr", vec![acc[k].into(), Operand::word(16), out[k].into()])?;
            }
            q.emit(mnemonic, vec![out[0].into(), out[1].into()])?;
            q.append(Instruction::timed("upd_param", vec![], step))?;
            for k in 0..2 {
                q.emit(
                    "add",
                    vec![acc[k].into(), Operand::word(delta[k] as u32), acc[k].into()],
                )?;
            }
            q.emit("loop", vec![counter.into(), Operand::label(label)])?;
            Ok(())
        })?;
        self.rt_time += steps * step;
        self.last_rt = None;
        debug!(
            "{} ramp: {} x {} ns from {} ns",
            mnemonic, steps, step, time
        );

        self.emit_realtime_setting(
            mnemonic,
            vec![
                Operand::Imm(final_values[0] as i64),
                Operand::Imm(final_values[1] as i64),
            ],
            time + duration,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::CompilerConfig;
    use crate::q1::simulator::Simulator;

    fn queue() -> InstructionQueue {
        InstructionQueue::new(CompilerConfig::default().with_sync_on_start(false)).unwrap()
    }

    #[test]
    fn test_ramp_structure_and_timing() {
        let mut q = queue();
        q.emit_ramp("set_awg_offs", (0.0, 0.0), (0.5, -0.5), 1000, 0)
            .unwrap();
        q.finalize().unwrap();
        let listing: Vec<String> = q
            .instructions()
            .iter()
            .filter(|i| !i.overwritten)
            .map(ToString::to_string)
            .collect();
        assert!(listing.contains(&"upd_param 100".to_string()));
        assert!(listing.contains(&"set_awg_offs 16384,-16384".to_string()));
        assert_eq!(q.current_time(), 1004);

        let run = Simulator::new(q.instructions()).run().unwrap();
        assert_eq!(run.times_of("upd_param").len(), 11);
        assert_eq!(run.times_of("upd_param")[9], 900);
        assert_eq!(run.elapsed, 1004);
    }

    #[test]
    fn test_ramp_needs_a_step() {
        let mut q = queue();
        assert!(matches!(
            q.emit_ramp("set_awg_gain", (0.0, 0.0), (1.0, 1.0), 40, 0),
            Err(CompileError::Value { .. })
        ));
        assert_eq!(q.registers().next_free(), 0);
    }

    #[test]
    fn test_partial_step_is_waited_before_final_value() {
        let mut q = queue();
        q.emit_ramp("set_awg_gain", (0.0, 0.0), (0.25, 0.25), 240, 0)
            .unwrap();
        q.finalize().unwrap();
        let run = Simulator::new(q.instructions()).run().unwrap();
        // two loop updates, then the final commit at 240
        assert_eq!(run.times_of("upd_param"), vec![0, 100, 240]);
    }
}
