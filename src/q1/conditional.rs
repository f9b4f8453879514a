// This module compiles conditional blocks. A block names a set of trigger counters and
// holds branches guarded by one of six operators over the counters' flags. The hardware
// evaluates branches one after another: each branch opens with set_cond, and every
// real-time instruction of a branch whose condition is false still costs the else
// duration. The compiler therefore accounts the skip time of each branch to every branch
// before it, starts the next branch that much later, and at the end pads the last
// real-time instruction of every branch so all paths leave the block at the same time.
// Every branch whose condition holds runs, so the operators of a block must be pairwise
// exclusive; only a fixed set of operator combinations is accepted and the implicit else
// branch takes whatever input states the declared branches leave.

//! Conditional blocks with duration equalization.

use std::fmt;
use std::str::FromStr;

use log::debug;

use crate::core::{CompileError, CompileResult};

use super::instruction::{Instruction, Operand};
use super::isa::{ELSE_DURATION, MAX_WAIT};
use super::queue::{InstructionQueue, MergePolicy};

/// Largest trigger counter address.
pub const MAX_COUNTER: u8 = 14;

/// `set_cond` operator over the masked counter flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Or = 0,
    Nor = 1,
    And = 2,
    Nand = 3,
    Xor = 4,
    Xnor = 5,
}

impl Operator {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Operator::Or),
            1 => Some(Operator::Nor),
            2 => Some(Operator::And),
            3 => Some(Operator::Nand),
            4 => Some(Operator::Xor),
            5 => Some(Operator::Xnor),
            _ => None,
        }
    }

    /// The logical opposite; flips the low bit of the code.
    pub fn negate(self) -> Self {
        match self {
            Operator::Or => Operator::Nor,
            Operator::Nor => Operator::Or,
            Operator::And => Operator::Nand,
            Operator::Nand => Operator::And,
            Operator::Xor => Operator::Xnor,
            Operator::Xnor => Operator::Xor,
        }
    }

    pub fn family(self) -> u8 {
        self.code() >> 1
    }

    /// Evaluate on a flag word restricted to `mask`.
    pub fn evaluate(self, flags: u32, mask: u32) -> bool {
        let set = (flags & mask).count_ones();
        let total = mask.count_ones();
        match self {
            Operator::Or => set > 0,
            Operator::Nor => set == 0,
            Operator::And => set == total,
            Operator::Nand => set != total,
            Operator::Xor => set % 2 == 1,
            Operator::Xnor => set % 2 == 0,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Operator::Or => "or",
            Operator::Nor => "nor",
            Operator::And => "and",
            Operator::Nand => "nand",
            Operator::Xor => "xor",
            Operator::Xnor => "xnor",
        }
    }

    /// True when the operator holds for a single counter that is set.
    fn accepts_set(self) -> bool {
        self.code() % 2 == 0
    }
}

/// Operators that partition several counters into all set, none set and mixed.
const TRI_STATE: [Operator; 3] = [Operator::And, Operator::Nor, Operator::Xor];

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Operator {
    type Err = CompileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "or" => Ok(Operator::Or),
            "nor" => Ok(Operator::Nor),
            "and" => Ok(Operator::And),
            "nand" => Ok(Operator::Nand),
            "xor" => Ok(Operator::Xor),
            "xnor" => Ok(Operator::Xnor),
            other => Err(CompileError::syntax(format!("unknown operator '{other}'"))),
        }
    }
}

/// Operator of the implicit else branch, or `None` when the branches are exhaustive.
///
/// Every branch whose condition holds is executed, so the operators must be
/// pairwise exclusive. Accepted sets:
/// - one branch: the else is its negation;
/// - two branches on a single counter: one accepts the set counter and the
///   other the clear one, no else;
/// - two branches on several counters: two of AND, NOR and XOR, the else is
///   the third;
/// - three branches on several counters: exactly AND, NOR and XOR, no else.
pub fn derive_else(operators: &[Operator], counters: usize) -> CompileResult<Option<Operator>> {
    for (i, op) in operators.iter().enumerate() {
        if operators[..i].contains(op) {
            return Err(CompileError::syntax(format!("duplicate operator {op}")));
        }
    }
    let not_exclusive = || {
        let names: Vec<String> = operators.iter().map(ToString::to_string).collect();
        CompileError::syntax(format!(
            "operators not exclusive: {} over {} counter(s)",
            names.join(", "),
            counters
        ))
    };
    let single = counters == 1;
    match operators {
        [] => Err(CompileError::syntax("conditional block has no branches")),
        [only] => Ok(Some(only.negate())),
        [a, b] if single => {
            if a.accepts_set() != b.accepts_set() {
                Ok(None)
            } else {
                Err(not_exclusive())
            }
        }
        [_, _] | [_, _, _] if !single => {
            if !operators.iter().all(|op| TRI_STATE.contains(op)) {
                return Err(not_exclusive());
            }
            Ok(TRI_STATE.into_iter().find(|op| !operators.contains(op)))
        }
        _ => Err(not_exclusive()),
    }
}

/// State of the conditional block being compiled.
#[derive(Debug)]
pub struct ConditionalBlock {
    counters: Vec<u8>,
    mask: u32,
    /// Hardware time at block entry.
    start: u64,
    start_shift: u64,
    operators: Vec<Operator>,
    /// Hardware end time of each closed branch.
    ends: Vec<u64>,
    /// Last real-time instruction of each closed branch.
    terminals: Vec<usize>,
    /// Skip time of all closed branches.
    else_total: u64,
    /// `set_cond` index of the open branch.
    open: Option<usize>,
}

impl ConditionalBlock {
    pub fn mask(&self) -> u32 {
        self.mask
    }

    pub fn counters(&self) -> &[u8] {
        &self.counters
    }
}

impl InstructionQueue {
    pub fn in_conditional(&self) -> bool {
        self.conditional.is_some()
    }

    /// Inside a conditional block but not inside one of its branches.
    pub fn between_branches(&self) -> bool {
        self.conditional.as_ref().is_some_and(|c| c.open.is_none())
    }

    /// Open a conditional block over `counters` at `time`.
    pub fn enter_conditional(&mut self, counters: &[u8], time: u64) -> CompileResult<()> {
        self.ensure_mutable()?;
        if self.conditional.is_some() {
            return Err(CompileError::syntax("nested conditional blocks are not supported"));
        }
        if counters.is_empty() {
            return Err(CompileError::syntax("conditional block needs at least one counter"));
        }
        let mut mask = 0u32;
        for &counter in counters {
            if counter > MAX_COUNTER {
                return Err(CompileError::value(format!(
                    "counter {counter} is outside 0..={MAX_COUNTER}"
                )));
            }
            if mask & (1 << counter) != 0 {
                return Err(CompileError::syntax(format!("duplicate counter {counter}")));
            }
            mask |= 1 << counter;
        }
        self.advance_to(time, MergePolicy::Flush)?;
        self.last_rt = None;
        debug!("conditional block on mask {:#x} at {} ns", mask, self.rt_time);
        self.conditional = Some(ConditionalBlock {
            counters: counters.to_vec(),
            mask,
            start: self.rt_time,
            start_shift: self.time_shift,
            operators: Vec::new(),
            ends: Vec::new(),
            terminals: Vec::new(),
            else_total: 0,
            open: None,
        });
        Ok(())
    }

    /// Open a branch guarded by `op`. Its statements are timed from the block start.
    pub fn enter_branch(&mut self, op: Operator) -> CompileResult<()> {
        self.ensure_mutable()?;
        let Some(block) = self.conditional.as_ref() else {
            return Err(CompileError::syntax(
                "condition opened without an enclosing conditional block",
            ));
        };
        if block.open.is_some() {
            return Err(CompileError::syntax(
                "branch opened before the previous branch was closed",
            ));
        }
        if block.operators.contains(&op) {
            return Err(CompileError::syntax(format!("duplicate operator {op}")));
        }
        let (mask, start, start_shift, else_total) =
            (block.mask, block.start, block.start_shift, block.else_total);

        self.rt_time = start + else_total;
        self.time_shift = start_shift + else_total;
        let index = self.emit_untimed_setting(
            "set_cond",
            vec![
                Operand::Imm(1),
                Operand::Imm(mask as i64),
                Operand::Imm(op.code() as i64),
                Operand::Imm(ELSE_DURATION as i64),
            ],
        )?;
        if let Some(block) = self.conditional.as_mut() {
            block.operators.push(op);
            block.open = Some(index);
        }
        Ok(())
    }

    /// Close the open branch and account its skip time.
    pub fn exit_branch(&mut self) -> CompileResult<()> {
        self.ensure_mutable()?;
        let Some(set_cond) = self.conditional.as_ref().and_then(|c| c.open) else {
            return Err(CompileError::syntax("branch end without an open branch"));
        };
        self.flush_pending_update()?;

        let mut timed: Vec<usize> = (set_cond + 1..self.instructions().len())
            .filter(|&i| self.instructions()[i].is_timed())
            .collect();
        if timed.is_empty() {
            let index = self.append(Instruction::timed("wait", vec![], ELSE_DURATION))?;
            self.rt_time += ELSE_DURATION;
            timed.push(index);
        }
        let else_time = timed.len() as u64 * ELSE_DURATION;
        let terminal = timed[timed.len() - 1];
        let end = self.rt_time;

        let Some(block) = self.conditional.as_mut() else {
            return Err(CompileError::internal("conditional block vanished"));
        };
        for previous in &mut block.ends {
            *previous += else_time;
        }
        block.ends.push(end);
        block.terminals.push(terminal);
        block.else_total += else_time;
        block.open = None;
        let (start, start_shift, else_total) = (block.start, block.start_shift, block.else_total);

        debug!(
            "branch closed at {} ns, else time {} ns",
            end, else_time
        );
        self.rt_time = start + else_total;
        self.time_shift = start_shift + else_total;
        self.last_rt = None;
        Ok(())
    }

    /// Close the block at caller time `time`, equalizing all branch durations.
    ///
    /// Each branch is padded by extending the trailing wait of its last
    /// real-time instruction, so a branch can be at most 65532 ns shorter than
    /// the block. Longer padding fails with a timing error: an extra `wait`
    /// would itself cost else time on every other path.
    pub fn exit_conditional(&mut self, time: u64) -> CompileResult<()> {
        self.ensure_mutable()?;
        let Some(block) = self.conditional.as_ref() else {
            return Err(CompileError::internal(
                "closing a conditional block that was never opened",
            ));
        };
        if block.open.is_some() {
            return Err(CompileError::syntax(
                "branch not closed before the end of the conditional block",
            ));
        }
        if time % ELSE_DURATION != 0 {
            return Err(CompileError::timing(format!(
                "time {time} ns is not a multiple of {ELSE_DURATION} ns"
            )));
        }
        let else_op = derive_else(&block.operators, block.counters.len())?;
        if let Some(op) = else_op {
            debug!("implicit else branch {}", op);
            self.enter_branch(op)?;
            self.exit_branch()?;
        }

        let Some(block) = self.conditional.take() else {
            return Err(CompileError::internal("conditional block vanished"));
        };
        let requested = time + block.start_shift;
        let exit = block.ends.iter().copied().fold(requested, u64::max);
        for (&end, &terminal) in block.ends.iter().zip(&block.terminals) {
            let instr = &mut self.instructions_mut()[terminal];
            instr.wait_after += exit - end;
            if instr.wait_after > MAX_WAIT {
                return Err(CompileError::timing(format!(
                    "branch needs {} ns of padding, more than a single wait allows",
                    exit - end
                )));
            }
        }
        self.emit_untimed_setting(
            "set_cond",
            vec![
                Operand::Imm(0),
                Operand::Imm(0),
                Operand::Imm(0),
                Operand::Imm(ELSE_DURATION as i64),
            ],
        )?;
        self.rt_time = exit;
        self.time_shift = exit - time;
        debug!(
            "conditional block closed at {} ns, {} branches",
            exit,
            block.ends.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negate_flips_low_bit() {
        for code in 0..6 {
            let op = Operator::from_code(code).unwrap();
            assert_eq!(op.negate().code(), code ^ 1);
            assert_eq!(op.negate().family(), op.family());
        }
    }

    #[test]
    fn test_single_branch_else_is_opposite() {
        assert_eq!(derive_else(&[Operator::Xor], 3).unwrap(), Some(Operator::Xnor));
        assert_eq!(derive_else(&[Operator::Or], 1).unwrap(), Some(Operator::Nor));
    }

    #[test]
    fn test_single_counter_pairs() {
        assert_eq!(derive_else(&[Operator::And, Operator::Nor], 1).unwrap(), None);
        assert_eq!(derive_else(&[Operator::Nand, Operator::Or], 1).unwrap(), None);
        assert_eq!(derive_else(&[Operator::Xor, Operator::Nor], 1).unwrap(), None);
        // on one counter AND and OR both mean "set"
        assert!(derive_else(&[Operator::And, Operator::Or], 1).is_err());
        assert!(derive_else(&[Operator::Nor, Operator::Xnor], 1).is_err());
        assert!(derive_else(&[Operator::And, Operator::Nor, Operator::Xor], 1).is_err());
    }

    #[test]
    fn test_tri_state_pairs_leave_the_third() {
        assert_eq!(
            derive_else(&[Operator::And, Operator::Nor], 2).unwrap(),
            Some(Operator::Xor)
        );
        assert_eq!(
            derive_else(&[Operator::Xor, Operator::And], 3).unwrap(),
            Some(Operator::Nor)
        );
        assert_eq!(
            derive_else(&[Operator::Nor, Operator::Xor], 2).unwrap(),
            Some(Operator::And)
        );
    }

    #[test]
    fn test_tri_state_exhausted() {
        assert_eq!(
            derive_else(&[Operator::And, Operator::Nor, Operator::Xor], 2).unwrap(),
            None
        );
        assert!(derive_else(&[Operator::And, Operator::Nor, Operator::Nand], 2).is_err());
    }

    #[test]
    fn test_overlapping_operators_are_rejected() {
        // all set satisfies both AND and OR
        let err = derive_else(&[Operator::And, Operator::Or], 2).unwrap_err();
        assert!(err.to_string().contains("operators not exclusive"));
        for pair in [
            [Operator::And, Operator::Nand],
            [Operator::Or, Operator::Nor],
            [Operator::Xor, Operator::Xnor],
            [Operator::Or, Operator::And],
            [Operator::Nand, Operator::Xor],
        ] {
            let err = derive_else(&pair, 2).unwrap_err();
            assert_eq!(err.kind(), crate::core::ErrorKind::Syntax, "{pair:?}");
        }
    }

    #[test]
    fn test_duplicate_branches() {
        let err = derive_else(&[Operator::And, Operator::And], 2).unwrap_err();
        assert_eq!(err.to_string(), "syntax error: duplicate operator and");
        assert!(derive_else(&[], 2).is_err());
        assert!(derive_else(
            &[Operator::And, Operator::Nor, Operator::Xor, Operator::Or],
            2
        )
        .is_err());
    }

    #[test]
    fn test_evaluate() {
        let mask = 0b11;
        assert!(Operator::And.evaluate(0b11, mask));
        assert!(Operator::Xor.evaluate(0b01, mask));
        assert!(Operator::Nor.evaluate(0b100, mask));
        assert!(!Operator::Or.evaluate(0, mask));
    }

    #[test]
    fn test_parse_operator() {
        assert_eq!("NAND".parse::<Operator>().unwrap(), Operator::Nand);
        assert!("maybe".parse::<Operator>().is_err());
    }
}
