//! Signed arithmetic on an unsigned ALU.
//!
//! `asr`, `jlt` and `jge` only know unsigned values. With signed emulation
//! enabled, right shifts propagate the sign bit and comparisons follow
//! two's-complement order by flipping the sign bit of both operands. The
//! variant is chosen at compile time from the operand kinds.

use log::trace;

use crate::core::{CompileError, CompileResult, Reg};

use super::instruction::Operand;
use super::isa::SIGN_BIT;
use super::queue::InstructionQueue;

/// Conditional jump flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// `jlt`: jump if less than.
    Lt,
    /// `jge`: jump if greater or equal.
    Ge,
}

impl Comparison {
    pub fn mnemonic(self) -> &'static str {
        match self {
            Comparison::Lt => "jlt",
            Comparison::Ge => "jge",
        }
    }
}

/// Map two's-complement order onto unsigned order.
pub fn sign_flip(value: i64) -> u32 {
    (value as i32 as u32) ^ SIGN_BIT
}

/// Bits an arithmetic shift by `amount` fills in for a negative value.
pub fn sign_extension_mask(amount: u32) -> u32 {
    if amount == 0 {
        0
    } else {
        !(u32::MAX >> amount)
    }
}

impl InstructionQueue {
    /// Jump to `label` when `reg` compares against `threshold`.
    pub fn emit_signed_jump(
        &mut self,
        cmp: Comparison,
        reg: Reg,
        threshold: i64,
        label: &str,
    ) -> CompileResult<()> {
        if self.config().emulate_signed {
            if threshold < i32::MIN as i64 || threshold > i32::MAX as i64 {
                return Err(CompileError::value(format!(
                    "threshold {threshold} does not fit in a signed 32-bit register"
                )));
            }
            self.scoped(|q| {
                let flipped = q.temp()?;
                q.emit(
                    "xor",
                    vec![reg.into(), Operand::word(SIGN_BIT), flipped.into()],
                )?;
                q.emit(
                    cmp.mnemonic(),
                    vec![
                        flipped.into(),
                        Operand::word(sign_flip(threshold)),
                        Operand::label(label),
                    ],
                )?;
                Ok(())
            })?;
        } else {
            if threshold < 0 || threshold > u32::MAX as i64 {
                return Err(CompileError::value(format!(
                    "threshold {threshold} needs signed emulation"
                )));
            }
            self.emit(
                cmp.mnemonic(),
                vec![
                    reg.into(),
                    Operand::word(threshold as u32),
                    Operand::label(label),
                ],
            )?;
        }
        self.last_rt = None;
        Ok(())
    }

    /// Jump to the runtime error trap when a wait duration in `reg` is below the minimum.
    pub(super) fn emit_min_duration_check(&mut self, reg: Reg) -> CompileResult<()> {
        let trap = self.trap_label();
        self.emit_signed_jump(Comparison::Lt, reg, 4, &trap)
    }

    /// `dst = src >> amount` with a literal shift amount.
    pub fn emit_shift_right_imm(&mut self, src: Reg, amount: u32, dst: Reg) -> CompileResult<()> {
        if amount > 31 {
            return Err(CompileError::value(format!(
                "shift amount {amount} is outside 0..=31"
            )));
        }
        if amount == 0 {
            if src != dst {
                self.emit("move", vec![src.into(), dst.into()])?;
            }
            return Ok(());
        }
        if !self.config().emulate_signed {
            self.emit("asr", vec![src.into(), Operand::word(amount), dst.into()])?;
            return Ok(());
        }

        trace!("signed shift {} >> {} into {}", src, amount, dst);
        self.scoped(|q| {
            let saved = if src == dst {
                let copy = q.temp()?;
                q.emit("move", vec![src.into(), copy.into()])?;
                copy
            } else {
                src
            };
            let skip = q.fresh_label("sign");
            q.emit("asr", vec![src.into(), Operand::word(amount), dst.into()])?;
            q.emit(
                "jlt",
                vec![
                    saved.into(),
                    Operand::word(SIGN_BIT),
                    Operand::label(skip.clone()),
                ],
            )?;
            q.emit(
                "or",
                vec![
                    dst.into(),
                    Operand::word(sign_extension_mask(amount)),
                    dst.into(),
                ],
            )?;
            q.set_label(skip)
        })
    }

    /// `dst = src >> amount` with the shift amount in a register. Branch free.
    pub fn emit_shift_right_reg(&mut self, src: Reg, amount: Reg, dst: Reg) -> CompileResult<()> {
        if !self.config().emulate_signed {
            self.emit("asr", vec![src.into(), amount.into(), dst.into()])?;
            return Ok(());
        }

        trace!("signed shift {} >> {} into {}", src, amount, dst);
        self.scoped(|q| {
            let magnitude = q.temp()?;
            let sign = q.temp()?;
            let zero = q.temp()?;
            q.emit(
                "and",
                vec![src.into(), Operand::word(!SIGN_BIT), magnitude.into()],
            )?;
            q.emit(
                "and",
                vec![src.into(), Operand::word(SIGN_BIT), sign.into()],
            )?;
            q.emit("asr", vec![magnitude.into(), amount.into(), magnitude.into()])?;
            q.emit("asr", vec![sign.into(), amount.into(), sign.into()])?;
            q.emit("move", vec![Operand::Imm(0), zero.into()])?;
            q.emit("sub", vec![zero.into(), sign.into(), sign.into()])?;
            q.emit("or", vec![magnitude.into(), sign.into(), dst.into()])?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CompilerConfig, DType};

    fn queue(emulate: bool) -> InstructionQueue {
        let config = CompilerConfig::default()
            .with_sync_on_start(false)
            .with_signed_emulation(emulate);
        InstructionQueue::new(config).unwrap()
    }

    fn listing(q: &InstructionQueue) -> Vec<String> {
        q.instructions().iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_mask() {
        assert_eq!(sign_extension_mask(4), 0xF000_0000);
        assert_eq!(sign_extension_mask(31), 0xFFFF_FFFE);
        assert_eq!(sign_extension_mask(0), 0);
        assert_eq!(sign_flip(-1), 0x7FFF_FFFF);
        assert_eq!(sign_flip(0), SIGN_BIT);
    }

    #[test]
    fn test_literal_shift_costs_two_instructions() {
        let mut q = queue(true);
        let a = q.registers_mut().allocate("a", DType::Int).unwrap();
        let b = q.registers_mut().allocate("b", DType::Int).unwrap();
        q.emit_shift_right_imm(a, 4, b).unwrap();
        q.emit("nop", vec![]).unwrap();
        assert_eq!(
            listing(&q),
            vec![
                "asr R0,4,R1",
                "jlt R0,2147483648,@_sign1",
                "or R1,4026531840,R1",
                "nop",
            ]
        );
        assert_eq!(q.instructions()[3].label.as_deref(), Some("_sign1"));
    }

    #[test]
    fn test_in_place_shift_saves_original() {
        let mut q = queue(true);
        let a = q.registers_mut().allocate("a", DType::Int).unwrap();
        q.emit_shift_right_imm(a, 1, a).unwrap();
        assert_eq!(
            listing(&q),
            vec![
                "move R0,R1",
                "asr R0,1,R0",
                "jlt R1,2147483648,@_sign1",
                "or R0,2147483648,R0",
            ]
        );
        assert_eq!(q.registers().next_free(), 1);
    }

    #[test]
    fn test_plain_shift_without_emulation() {
        let mut q = queue(false);
        let a = q.registers_mut().allocate("a", DType::Int).unwrap();
        q.emit_shift_right_imm(a, 3, a).unwrap();
        assert_eq!(listing(&q), vec!["asr R0,3,R0"]);
    }

    #[test]
    fn test_register_shift_is_branch_free() {
        let mut q = queue(true);
        let a = q.registers_mut().allocate("a", DType::Int).unwrap();
        let n = q.registers_mut().allocate("n", DType::Int).unwrap();
        q.emit_shift_right_reg(a, n, a).unwrap();
        let body: Vec<String> = listing(&q)
            .into_iter()
            .filter(|line| line != "nop")
            .collect();
        assert_eq!(body.len(), 7);
        assert!(q.instructions().iter().all(|i| !i.mnemonic.starts_with('j')));
    }

    #[test]
    fn test_signed_jump_flips_both_sides() {
        let mut q = queue(true);
        let a = q.registers_mut().allocate("a", DType::Int).unwrap();
        q.emit_signed_jump(Comparison::Ge, a, -5, "target").unwrap();
        assert_eq!(
            listing(&q),
            vec![
                "xor R0,2147483648,R1",
                "nop",
                "jge R1,2147483643,@target",
            ]
        );
    }

    #[test]
    fn test_negative_threshold_needs_emulation() {
        let mut q = queue(false);
        let a = q.registers_mut().allocate("a", DType::Int).unwrap();
        assert!(q.emit_signed_jump(Comparison::Lt, a, -1, "x").is_err());
    }
}
