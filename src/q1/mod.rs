// This module holds everything specific to the Q1 sequencer target: the instruction set
// conventions, the instruction list model, the instruction queue with its timing
// scheduler, signed arithmetic emulation, conditional blocks, expression lowering, runtime
// phase conversion, offset and gain ramps, data tables, program output and a reference
// executor used by tests to check runtime behaviour.

//! Q1 sequencer code generation.

pub mod conditional;
pub mod emitter;
pub mod expression;
pub mod instruction;
pub mod isa;
pub mod phase;
pub mod queue;
pub mod ramp;
pub mod signed;
pub mod simulator;
pub mod tables;

pub use conditional::{derive_else, Operator};
pub use emitter::{Program, ProgramDocument};
pub use expression::{BinOp, Expr, UnOp};
pub use instruction::{Instruction, Operand};
pub use queue::{InstructionQueue, LoopSpec, MergePolicy, PendingUpdate};
pub use signed::Comparison;
pub use simulator::{Execution, SimError, Simulator};
pub use tables::DataTables;
