//! Reference executor for compiled programs.
//!
//! Runs an instruction list the way the sequencer would and keeps track of
//! real time: timed instructions advance the clock by their duration, or by
//! the else duration when a `set_cond` condition is false. Trigger counter
//! flags are supplied by the caller. `wait_sync` marks the time origin.

use hashbrown::HashMap;
use thiserror::Error;

use super::conditional::Operator;
use super::instruction::{Instruction, Operand};
use super::isa::{class_of, InstrClass, MIN_LATENCY};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimError {
    #[error("unknown label '{0}'")]
    UnknownLabel(String),

    #[error("malformed instruction {index}: `{text}`")]
    Malformed { index: usize, text: String },

    #[error("illegal instruction reached at {index}")]
    Illegal { index: usize },

    #[error("wait of {value} ns at instruction {index} is below the minimum")]
    InvalidWait { index: usize, value: u32 },

    #[error("step limit of {0} exceeded")]
    StepLimit(usize),

    #[error("execution ran past the last instruction")]
    RanOffEnd,
}

/// A timed instruction that executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Position in the full instruction list.
    pub index: usize,
    pub time: u64,
    pub mnemonic: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    pub registers: Vec<u32>,
    /// Time at which `stop` was reached.
    pub elapsed: u64,
    pub events: Vec<Event>,
}

impl Execution {
    /// Start times of executed instructions with `mnemonic`.
    pub fn times_of(&self, mnemonic: &str) -> Vec<u64> {
        self.events
            .iter()
            .filter(|e| e.mnemonic == mnemonic)
            .map(|e| e.time)
            .collect()
    }
}

pub struct Simulator<'a> {
    program: Vec<(usize, &'a Instruction)>,
    labels: HashMap<String, usize>,
    flags: u32,
    step_limit: usize,
}

struct Condition {
    mask: u32,
    op: Operator,
    else_duration: u64,
}

impl<'a> Simulator<'a> {
    pub fn new(instructions: &'a [Instruction]) -> Self {
        let program: Vec<(usize, &Instruction)> = instructions
            .iter()
            .enumerate()
            .filter(|(_, i)| !i.overwritten)
            .collect();
        let labels = program
            .iter()
            .enumerate()
            .filter_map(|(pc, (_, i))| i.label.clone().map(|l| (l, pc)))
            .collect();
        Self {
            program,
            labels,
            flags: 0,
            step_limit: 1_000_000,
        }
    }

    /// Trigger counter flags, bit `n` for counter `n`.
    pub fn with_flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_step_limit(mut self, limit: usize) -> Self {
        self.step_limit = limit;
        self
    }

    pub fn run(&self) -> Result<Execution, SimError> {
        let mut regs = [0u32; 64];
        let mut time = 0u64;
        let mut events = Vec::new();
        let mut condition: Option<Condition> = None;
        let mut pc = 0usize;

        for _ in 0..self.step_limit {
            let Some(&(index, instr)) = self.program.get(pc) else {
                return Err(SimError::RanOffEnd);
            };
            let malformed = || SimError::Malformed {
                index,
                text: instr.to_string(),
            };
            let value = |n: usize| -> Result<u32, SimError> {
                match instr.args.get(n) {
                    Some(Operand::Reg(r)) => Ok(regs[r.slot() as usize]),
                    Some(Operand::Imm(v)) => Ok(*v as u32),
                    _ => Err(malformed()),
                }
            };
            let dest = |n: usize| -> Result<usize, SimError> {
                match instr.args.get(n) {
                    Some(Operand::Reg(r)) => Ok(r.slot() as usize),
                    _ => Err(malformed()),
                }
            };
            let target = |n: usize| -> Result<usize, SimError> {
                match instr.args.get(n) {
                    Some(Operand::Label(l)) => self
                        .labels
                        .get(l)
                        .copied()
                        .ok_or_else(|| SimError::UnknownLabel(l.clone())),
                    _ => Err(malformed()),
                }
            };
            pc += 1;

            match instr.mnemonic {
                "nop" => {}
                "stop" => {
                    return Ok(Execution {
                        registers: regs.to_vec(),
                        elapsed: time,
                        events,
                    })
                }
                "illegal" => return Err(SimError::Illegal { index }),
                "jmp" => pc = target(0)?,
                "jge" => {
                    if value(0)? >= value(1)? {
                        pc = target(2)?;
                    }
                }
                "jlt" => {
                    if value(0)? < value(1)? {
                        pc = target(2)?;
                    }
                }
                "loop" => {
                    let r = dest(0)?;
                    regs[r] = regs[r].wrapping_sub(1);
                    if regs[r] != 0 {
                        pc = target(1)?;
                    }
                }
                "move" => {
                    let v = value(0)?;
                    regs[dest(1)?] = v;
                }
                "not" => {
                    let v = value(0)?;
                    regs[dest(1)?] = !v;
                }
                "add" | "sub" | "and" | "or" | "xor" | "asl" | "asr" => {
                    let (a, b) = (value(0)?, value(1)?);
                    let v = match instr.mnemonic {
                        "add" => a.wrapping_add(b),
                        "sub" => a.wrapping_sub(b),
                        "and" => a & b,
                        "or" => a | b,
                        "xor" => a ^ b,
                        "asl" => a << (b & 31),
                        _ => a >> (b & 31),
                    };
                    regs[dest(2)?] = v;
                }
                "set_cond" => {
                    condition = if value(0)? == 1 {
                        let op = Operator::from_code(value(2)? as u8).ok_or_else(malformed)?;
                        Some(Condition {
                            mask: value(1)?,
                            op,
                            else_duration: value(3)? as u64,
                        })
                    } else {
                        None
                    };
                }
                "wait_sync" => time = 0,
                mnemonic => {
                    let class = class_of(mnemonic);
                    let enabled = condition
                        .as_ref()
                        .map_or(true, |c| c.op.evaluate(self.flags, c.mask));
                    match (class, enabled) {
                        (InstrClass::Timed, true) => {
                            let duration = if instr.has_register_duration() {
                                let v = value(0)?;
                                if (v as u64) < MIN_LATENCY {
                                    return Err(SimError::InvalidWait { index, value: v });
                                }
                                v as u64
                            } else {
                                instr.wait_after
                            };
                            events.push(Event {
                                index,
                                time,
                                mnemonic: instr.mnemonic,
                            });
                            time += duration;
                        }
                        (InstrClass::Timed, false) => {
                            time += condition.as_ref().map_or(0, |c| c.else_duration);
                        }
                        (InstrClass::Setting, _) => {}
                        _ => return Err(malformed()),
                    }
                }
            }
        }
        Err(SimError::StepLimit(self.step_limit))
    }
}
