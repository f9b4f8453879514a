// This module defines the error taxonomy of the q1seq compiler using the thiserror crate.
// CompileError has one variant per failure class: register name conflicts and undefined
// names, register bank exhaustion, timing violations (off-grid times, time running
// backwards, negative waits), operand type mismatches, out-of-range numeric literals,
// malformed conditional blocks, mutation after finalization, and internal invariant
// violations. The InStatement variant wraps the first error raised while compiling a
// statement with that statement's text and source line, so diagnostics are
// self-contained. ErrorKind lets callers match on the class without caring about
// the wrapping. CompileResult<T> is the usual Result alias.

//! Error types for the q1seq compiler.

use thiserror::Error;

/// Failure class of a [`CompileError`], independent of statement context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NameConflict,
    UndefinedName,
    MemoryExhausted,
    Timing,
    Type,
    Value,
    Syntax,
    State,
    Internal,
}

/// Main error type for sequence compilation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error("name conflict: '{name}' is already allocated")]
    NameConflict { name: String },

    #[error("undefined name: '{name}'")]
    UndefinedName { name: String },

    #[error("register bank exhausted: all {capacity} registers are in use")]
    MemoryExhausted { capacity: usize },

    #[error("timing error: {reason}")]
    Timing { reason: String },

    #[error("type error: {reason}")]
    Type { reason: String },

    #[error("value error: {reason}")]
    Value { reason: String },

    #[error("syntax error: {reason}")]
    Syntax { reason: String },

    #[error("state error: {reason}")]
    State { reason: String },

    #[error("internal error: {reason}")]
    Internal { reason: String },

    #[error("{}: {source}", statement_context(.statement, .position))]
    InStatement {
        statement: String,
        position: Option<usize>,
        #[source]
        source: Box<CompileError>,
    },
}

fn statement_context(statement: &str, position: &Option<usize>) -> String {
    match position {
        Some(line) => format!("line {line}: `{statement}`"),
        None => format!("`{statement}`"),
    }
}

impl CompileError {
    pub fn timing(reason: impl Into<String>) -> Self {
        CompileError::Timing { reason: reason.into() }
    }

    pub fn type_error(reason: impl Into<String>) -> Self {
        CompileError::Type { reason: reason.into() }
    }

    pub fn value(reason: impl Into<String>) -> Self {
        CompileError::Value { reason: reason.into() }
    }

    pub fn syntax(reason: impl Into<String>) -> Self {
        CompileError::Syntax { reason: reason.into() }
    }

    pub fn state(reason: impl Into<String>) -> Self {
        CompileError::State { reason: reason.into() }
    }

    pub fn internal(reason: impl Into<String>) -> Self {
        CompileError::Internal { reason: reason.into() }
    }

    /// The failure class, looking through statement context.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CompileError::NameConflict { .. } => ErrorKind::NameConflict,
            CompileError::UndefinedName { .. } => ErrorKind::UndefinedName,
            CompileError::MemoryExhausted { .. } => ErrorKind::MemoryExhausted,
            CompileError::Timing { .. } => ErrorKind::Timing,
            CompileError::Type { .. } => ErrorKind::Type,
            CompileError::Value { .. } => ErrorKind::Value,
            CompileError::Syntax { .. } => ErrorKind::Syntax,
            CompileError::State { .. } => ErrorKind::State,
            CompileError::Internal { .. } => ErrorKind::Internal,
            CompileError::InStatement { source, .. } => source.kind(),
        }
    }

    /// Attach statement context. Only the innermost statement is recorded.
    pub fn with_statement(self, statement: String, position: Option<usize>) -> Self {
        match self {
            wrapped @ CompileError::InStatement { .. } => wrapped,
            other => CompileError::InStatement {
                statement,
                position,
                source: Box::new(other),
            },
        }
    }
}

/// Result type alias for compile operations.
pub type CompileResult<T> = Result<T, CompileError>;
