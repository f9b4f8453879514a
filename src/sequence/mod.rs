// This module is the statement front-end of q1seq. A sequence is an ordered list of
// statements, each stamped with a start time in ns. Statement kinds form a closed enum and
// every statement lowers itself onto an instruction queue through a single dispatcher in
// the lowering module. Statements come either from the text format parsed by the parser
// module or from the SequenceBuilder, which stamps them from a shared timeline. The
// compiler module drives a whole sequence through one queue and wraps the first failure
// with the failing statement. The check module holds the FileCheck-style matcher used by
// the filetests.

//! Sequence statements and their compilation.

use std::fmt;

use crate::core::DType;
use crate::q1::{Comparison, Expr, Operator};

pub mod builder;
pub mod check;
pub mod compiler;
pub mod lowering;
pub mod parser;

pub use builder::{Branches, SequenceBuilder};
pub use compiler::SequenceCompiler;
pub use parser::{parse, ParseError, ParsedSequence};

/// Statement argument before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Int(i64),
    Float(f64),
    Var(String),
}

impl Arg {
    pub fn var(name: impl Into<String>) -> Self {
        Arg::Var(name.into())
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Int(v) => write!(f, "{v}"),
            Arg::Float(v) => write!(f, "{v:?}"),
            Arg::Var(name) => write!(f, "{name}"),
        }
    }
}

impl From<i64> for Arg {
    fn from(value: i64) -> Self {
        Arg::Int(value)
    }
}

impl From<f64> for Arg {
    fn from(value: f64) -> Self {
        Arg::Float(value)
    }
}

impl From<&str> for Arg {
    fn from(name: &str) -> Self {
        Arg::Var(name.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopKind {
    Repeat {
        count: u64,
    },
    /// `var` runs from `start` up to, not including, `stop`.
    Range {
        var: String,
        start: i64,
        stop: i64,
        step: i64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RampTarget {
    Offset,
    Gain,
}

impl RampTarget {
    pub fn mnemonic(self) -> &'static str {
        match self {
            RampTarget::Offset => "set_awg_offs",
            RampTarget::Gain => "set_awg_gain",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    Declare {
        name: String,
        dtype: DType,
    },
    Assign {
        name: String,
        expr: Expr,
    },
    Label(String),
    Jump(String),
    JumpIf {
        var: String,
        cmp: Comparison,
        threshold: i64,
        label: String,
    },
    LoopStart(LoopKind),
    LoopEnd,
    Wait(Arg),
    SetMarkers(Arg),
    ResetPhase,
    /// Phase in turns, or raw phase units for an int register.
    SetPhase(Arg),
    ShiftPhase(Arg),
    /// Frequency in Hz, or raw units for an int register.
    SetFrequency(Arg),
    SetOffset(Arg, Arg),
    SetGain(Arg, Arg),
    Ramp {
        target: RampTarget,
        from: (f64, f64),
        to: (f64, f64),
        duration: u64,
    },
    Play {
        wave0: String,
        wave1: String,
    },
    Acquire {
        acquisition: String,
        bin: Arg,
    },
    AcquireWeighed {
        acquisition: String,
        bin: Arg,
        weight0: String,
        weight1: String,
    },
    AcquireTtl {
        acquisition: String,
        bin: Arg,
        enable: bool,
    },
    SetLatchEnable(bool),
    ResetLatch,
    ConditionalStart {
        counters: Vec<u8>,
    },
    Branch(Operator),
    BranchEnd,
    ConditionalEnd,
}

/// A statement at a start time in ns.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub time: u64,
    pub kind: StatementKind,
    /// Line of the statement in a text program.
    pub position: Option<usize>,
}

impl Statement {
    pub fn new(time: u64, kind: StatementKind) -> Self {
        Self {
            time,
            kind,
            position: None,
        }
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.position = Some(line);
        self
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{} {}", self.time, self.kind)
    }
}

fn flag(value: bool) -> u8 {
    u8::from(value)
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use StatementKind::*;
        match self {
            Declare { name, dtype } => write!(f, "var {name} {dtype}"),
            Assign { name, expr } => write!(f, "{name} = {expr}"),
            Label(name) => write!(f, "label {name}"),
            Jump(label) => write!(f, "jmp {label}"),
            JumpIf {
                var,
                cmp,
                threshold,
                label,
            } => write!(f, "{} {var} {threshold} {label}", cmp.mnemonic()),
            LoopStart(LoopKind::Repeat { count }) => write!(f, "repeat {count}"),
            LoopStart(LoopKind::Range {
                var,
                start,
                stop,
                step,
            }) => write!(f, "for {var} {start} {stop} {step}"),
            LoopEnd => write!(f, "end_loop"),
            Wait(arg) => write!(f, "wait {arg}"),
            SetMarkers(arg) => write!(f, "set_markers {arg}"),
            ResetPhase => write!(f, "reset_phase"),
            SetPhase(arg) => write!(f, "set_phase {arg}"),
            ShiftPhase(arg) => write!(f, "shift_phase {arg}"),
            SetFrequency(arg) => write!(f, "set_frequency {arg}"),
            SetOffset(a, b) => write!(f, "set_offset {a} {b}"),
            SetGain(a, b) => write!(f, "set_gain {a} {b}"),
            Ramp {
                target,
                from,
                to,
                duration,
            } => {
                let op = match target {
                    RampTarget::Offset => "ramp_offset",
                    RampTarget::Gain => "ramp_gain",
                };
                write!(
                    f,
                    "{op} {:?} {:?} {:?} {:?} {duration}",
                    from.0, from.1, to.0, to.1
                )
            }
            Play { wave0, wave1 } => write!(f, "play {wave0} {wave1}"),
            Acquire { acquisition, bin } => write!(f, "acquire {acquisition} {bin}"),
            AcquireWeighed {
                acquisition,
                bin,
                weight0,
                weight1,
            } => write!(f, "acquire_weighed {acquisition} {bin} {weight0} {weight1}"),
            AcquireTtl {
                acquisition,
                bin,
                enable,
            } => write!(f, "acquire_ttl {acquisition} {bin} {}", flag(*enable)),
            SetLatchEnable(enable) => write!(f, "set_latch_en {}", flag(*enable)),
            ResetLatch => write!(f, "latch_rst"),
            ConditionalStart { counters } => {
                write!(f, "if_start")?;
                for counter in counters {
                    write!(f, " {counter}")?;
                }
                Ok(())
            }
            Branch(op) => write!(f, "branch {op}"),
            BranchEnd => write!(f, "end_branch"),
            ConditionalEnd => write!(f, "if_end"),
        }
    }
}
