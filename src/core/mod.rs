// This module groups the target-independent infrastructure of the q1seq compiler: the
// error taxonomy, the compiler configuration, the scoped register allocator, the
// fixed-point codecs for amplitudes, phases and frequencies, the statement timeline with
// parallel sections, and compilation statistics. Nothing here knows about the sequencer
// instruction set; target code lives in the q1 module.

//! Core q1seq infrastructure.
//!
//! # Key Components
//!
//! ## Register Allocation (`register_file`)
//! - Stack-discipline allocation with lexical scopes
//! - Handles tagged with their allocation serial
//!
//! ## Numeric Formats (`fixed_point`)
//! - 32-bit and 16-bit amplitude codecs, phase and frequency encoding
//!
//! ## Timeline (`timeline`)
//! - Statement clock with parallel sections

pub mod config;
pub mod error;
pub mod fixed_point;
pub mod register_file;
pub mod session;
pub mod timeline;

pub use config::{CompilerConfig, PhaseResolution};
pub use error::{CompileError, CompileResult, ErrorKind};
pub use register_file::{DType, Reg, RegBitSet, RegisterAllocator, MAX_REGISTERS};
pub use session::CompilationStats;
pub use timeline::Timeline;
