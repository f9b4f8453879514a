//! Compilation of a whole statement list.

use log::{debug, info};

use crate::core::{CompileResult, CompilerConfig};
use crate::q1::{DataTables, InstructionQueue, Program};

use super::Statement;

/// Compiles statement lists into sequencer programs.
///
/// Every compilation runs on a fresh [`InstructionQueue`]; nothing is shared
/// between calls.
#[derive(Debug, Clone, Default)]
pub struct SequenceCompiler {
    config: CompilerConfig,
}

impl SequenceCompiler {
    pub fn new(config: CompilerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Lower `statements` in order and finalize the program.
    ///
    /// The first failing statement aborts the compilation; its error carries
    /// the statement text and source line.
    pub fn compile(&self, statements: &[Statement], tables: DataTables) -> CompileResult<Program> {
        let mut queue = InstructionQueue::new(self.config.clone())?;
        debug!("compiling {} statements", statements.len());
        for statement in statements {
            statement
                .write_instruction(&mut queue, &tables)
                .map_err(|err| err.with_statement(statement.to_string(), statement.position))?;
        }
        queue.finalize()?;
        let program = Program::new(queue, tables)?;
        info!(
            "program duration {} ns, {} instructions",
            program.duration(),
            program.active_instructions().count()
        );
        Ok(program)
    }
}
