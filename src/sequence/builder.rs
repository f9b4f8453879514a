//! Programmatic construction of statement lists.
//!
//! [`SequenceBuilder`] stamps every statement with the current time of a
//! [`Timeline`] and advances it by the statement's duration. Settings take no
//! time; `play`, `acquire`, `wait` and ramps take the duration passed to
//! them. Parallel sections start all their statements together and continue
//! after the longest one.

use crate::core::{CompileResult, CompilerConfig, DType, Timeline};
use crate::q1::{DataTables, Expr, Operator, Program};

use super::{Arg, LoopKind, RampTarget, SequenceCompiler, Statement, StatementKind};

#[derive(Debug, Default)]
pub struct SequenceBuilder {
    timeline: Timeline,
    statements: Vec<Statement>,
    tables: DataTables,
}

impl SequenceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn tables_mut(&mut self) -> &mut DataTables {
        &mut self.tables
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    fn push(&mut self, kind: StatementKind, duration: u64) -> &mut Self {
        let time = self.timeline.add(duration);
        self.statements.push(Statement::new(time, kind));
        self
    }

    pub fn declare(&mut self, name: &str, dtype: DType) -> &mut Self {
        self.push(
            StatementKind::Declare {
                name: name.to_string(),
                dtype,
            },
            0,
        )
    }

    pub fn assign(&mut self, name: &str, expr: Expr) -> &mut Self {
        self.push(
            StatementKind::Assign {
                name: name.to_string(),
                expr,
            },
            0,
        )
    }

    pub fn set_markers(&mut self, markers: impl Into<Arg>) -> &mut Self {
        self.push(StatementKind::SetMarkers(markers.into()), 0)
    }

    pub fn reset_phase(&mut self) -> &mut Self {
        self.push(StatementKind::ResetPhase, 0)
    }

    pub fn set_phase(&mut self, turns: impl Into<Arg>) -> &mut Self {
        self.push(StatementKind::SetPhase(turns.into()), 0)
    }

    pub fn shift_phase(&mut self, turns: impl Into<Arg>) -> &mut Self {
        self.push(StatementKind::ShiftPhase(turns.into()), 0)
    }

    pub fn set_frequency(&mut self, hz: impl Into<Arg>) -> &mut Self {
        self.push(StatementKind::SetFrequency(hz.into()), 0)
    }

    pub fn set_offset(&mut self, path0: impl Into<Arg>, path1: impl Into<Arg>) -> &mut Self {
        self.push(StatementKind::SetOffset(path0.into(), path1.into()), 0)
    }

    pub fn set_gain(&mut self, path0: impl Into<Arg>, path1: impl Into<Arg>) -> &mut Self {
        self.push(StatementKind::SetGain(path0.into(), path1.into()), 0)
    }

    pub fn ramp(
        &mut self,
        target: RampTarget,
        from: (f64, f64),
        to: (f64, f64),
        duration: u64,
    ) -> &mut Self {
        self.push(
            StatementKind::Ramp {
                target,
                from,
                to,
                duration,
            },
            duration,
        )
    }

    pub fn play(&mut self, wave0: &str, wave1: &str, duration: u64) -> &mut Self {
        self.push(
            StatementKind::Play {
                wave0: wave0.to_string(),
                wave1: wave1.to_string(),
            },
            duration,
        )
    }

    pub fn acquire(&mut self, acquisition: &str, bin: impl Into<Arg>, duration: u64) -> &mut Self {
        self.push(
            StatementKind::Acquire {
                acquisition: acquisition.to_string(),
                bin: bin.into(),
            },
            duration,
        )
    }

    /// Literal wait; the clock moves on by `duration`.
    pub fn wait(&mut self, duration: u64) -> &mut Self {
        self.push(StatementKind::Wait(Arg::Int(duration as i64)), duration)
    }

    /// Repeat the statements added by `body` `count` times.
    pub fn repeat(&mut self, count: u64, body: impl FnOnce(&mut Self)) -> CompileResult<&mut Self> {
        let start = self.timeline.current_time();
        self.push(StatementKind::LoopStart(LoopKind::Repeat { count }), 0);
        body(self);
        let end = self.timeline.current_time();
        self.push(StatementKind::LoopEnd, 0);
        self.timeline
            .advance_to(start + count.saturating_mul(end - start))?;
        Ok(self)
    }

    /// Start everything added by `body` at the current time.
    pub fn parallel(&mut self, body: impl FnOnce(&mut Self)) -> CompileResult<&mut Self> {
        self.timeline.disable_update()?;
        body(self);
        self.timeline.enable_update()?;
        Ok(self)
    }

    /// Conditional block over `counters`; `branches` adds the branches.
    pub fn conditional(
        &mut self,
        counters: &[u8],
        branches: impl FnOnce(&mut Branches<'_>),
    ) -> CompileResult<&mut Self> {
        let start = self.timeline.current_time();
        self.push(
            StatementKind::ConditionalStart {
                counters: counters.to_vec(),
            },
            0,
        );
        let mut block = Branches {
            builder: &mut *self,
            start,
            end: start,
        };
        branches(&mut block);
        let end = block.end;
        self.timeline.advance_to(end)?;
        self.push(StatementKind::ConditionalEnd, 0);
        Ok(self)
    }

    pub fn build(self) -> (Vec<Statement>, DataTables) {
        (self.statements, self.tables)
    }

    pub fn compile(self, config: CompilerConfig) -> CompileResult<Program> {
        SequenceCompiler::new(config).compile(&self.statements, self.tables)
    }
}

/// Branches of a conditional block. Every branch starts at the block start.
pub struct Branches<'a> {
    builder: &'a mut SequenceBuilder,
    start: u64,
    end: u64,
}

impl Branches<'_> {
    pub fn branch(&mut self, op: Operator, body: impl FnOnce(&mut SequenceBuilder)) -> &mut Self {
        let outer = std::mem::replace(&mut self.builder.timeline, Timeline::starting_at(self.start));
        self.builder.push(StatementKind::Branch(op), 0);
        body(self.builder);
        self.builder.push(StatementKind::BranchEnd, 0);
        self.end = self.end.max(self.builder.timeline.current_time());
        self.builder.timeline = outer;
        self
    }
}
