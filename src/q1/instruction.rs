//! Instruction list entries.
//!
//! An [`Instruction`] is a mnemonic with operands, an optional label, an
//! optional comment and, for timed instructions, the duration the sequencer
//! waits after issuing it. Instructions replaced by a later setting under the
//! same parameter update stay in the list flagged as overwritten.

use std::fmt;

use crate::core::Reg;

use super::isa::{class_of, InstrClass};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Reg(Reg),
    Imm(i64),
    Label(String),
}

impl Operand {
    /// A 32-bit register value, rendered unsigned.
    pub fn word(value: u32) -> Self {
        Operand::Imm(value as i64)
    }

    pub fn label(name: impl Into<String>) -> Self {
        Operand::Label(name.into())
    }

    pub fn as_reg(&self) -> Option<Reg> {
        match self {
            Operand::Reg(reg) => Some(*reg),
            _ => None,
        }
    }
}

impl From<Reg> for Operand {
    fn from(reg: Reg) -> Self {
        Operand::Reg(reg)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Reg(reg) => write!(f, "{reg}"),
            Operand::Imm(value) => write!(f, "{value}"),
            Operand::Label(name) => write!(f, "@{name}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub mnemonic: &'static str,
    pub args: Vec<Operand>,
    pub label: Option<String>,
    pub comment: Option<String>,
    /// Trailing duration of a timed instruction in ns.
    pub wait_after: u64,
    pub overwritten: bool,
}

impl Instruction {
    pub fn new(mnemonic: &'static str, args: Vec<Operand>) -> Self {
        Self {
            mnemonic,
            args,
            label: None,
            comment: None,
            wait_after: 0,
            overwritten: false,
        }
    }

    pub fn timed(mnemonic: &'static str, args: Vec<Operand>, duration: u64) -> Self {
        Self {
            wait_after: duration,
            ..Self::new(mnemonic, args)
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn class(&self) -> InstrClass {
        class_of(self.mnemonic)
    }

    pub fn is_timed(&self) -> bool {
        self.class() == InstrClass::Timed
    }

    /// `wait Rn`: the duration comes from a register.
    pub fn has_register_duration(&self) -> bool {
        self.mnemonic == "wait" && matches!(self.args.first(), Some(Operand::Reg(_)))
    }

    pub fn registers(&self) -> impl Iterator<Item = Reg> + '_ {
        self.args.iter().filter_map(Operand::as_reg)
    }

    /// Whether any operand names the physical register of `reg`.
    pub fn references(&self, reg: Reg) -> bool {
        self.registers().any(|r| r.slot() == reg.slot())
    }

    /// Destination of an arithmetic instruction.
    pub fn written_register(&self) -> Option<Reg> {
        if self.class() != InstrClass::Arithmetic {
            return None;
        }
        self.args.last().and_then(Operand::as_reg)
    }

    /// Comma-separated operands, duration last for timed instructions.
    pub fn operand_text(&self) -> String {
        let mut parts: Vec<String> = self.args.iter().map(ToString::to_string).collect();
        if self.is_timed() && !self.has_register_duration() {
            parts.push(self.wait_after.to_string());
        }
        parts.join(",")
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let operands = self.operand_text();
        if operands.is_empty() {
            write!(f, "{}", self.mnemonic)
        } else {
            write!(f, "{} {}", self.mnemonic, operands)
        }
    }
}
