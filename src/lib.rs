//! q1seq - pulse sequence compiler for Q1-style real-time sequencers.
//!
//! q1seq takes time-annotated sequence statements (settings, waveform
//! playback, acquisitions, waits, loops, jumps, register arithmetic and
//! trigger-conditioned branches) and produces a sequencer program whose
//! real-time duration matches the requested start times exactly.
//!
//! # Primary Usage
//!
//! ```ignore
//! use q1seq::core::CompilerConfig;
//! use q1seq::sequence::parse;
//! use q1seq::SequenceCompiler;
//!
//! let parsed = parse("waveform sq 1.0 1.0\n@0 set_offset 0.5 0.5\n@100 play sq sq\n")?;
//! let program = SequenceCompiler::new(CompilerConfig::default())
//!     .compile(&parsed.statements, parsed.tables)?;
//! println!("{}", program.listing());
//! ```
//!
//! # Architecture
//!
//! - [`core`] - Errors, configuration, register allocation, numeric formats
//! - [`q1`] - Instruction queue, signed arithmetic, conditionals, output
//! - [`sequence`] - Statements, text parser, builder, statement compiler

pub mod core;
pub mod q1;
pub mod sequence;

pub use core::{
    // Errors
    CompileError, CompileResult, ErrorKind,
    // Configuration
    CompilerConfig, PhaseResolution,
    // Registers and timing
    DType, Reg, RegisterAllocator, Timeline,
    CompilationStats,
};
pub use q1::{InstructionQueue, MergePolicy, Program, ProgramDocument};
pub use sequence::{SequenceBuilder, SequenceCompiler, Statement, StatementKind};
