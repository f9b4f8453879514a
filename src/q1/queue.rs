// This module implements the instruction queue, the timing scheduler at the heart of the
// q1seq compiler. Statements arrive in program order, each with a start time, and the
// queue turns them into a flat instruction list whose real-time duration matches those
// times exactly. The queue keeps a real-time clock, a single pending parameter update
// that is either merged into the next real-time instruction at the same time or inserted
// as its own upd_param, the last real-time instruction whose trailing wait can absorb
// later gaps, and the last written register for the write-then-read hazard. Gaps that do
// not fit into trailing slack become explicit waits or, when long, a runtime wait loop.
// Loops, register waits and conditional blocks move the mapping between caller times and
// the hardware clock through a time shift. The register allocator is owned by the queue
// so that scoped temporaries are released on every exit path.

//! Instruction queue and timing scheduler.

use log::{debug, info, trace};

use crate::core::{
    CompilationStats, CompileError, CompileResult, CompilerConfig, DType, Reg,
    RegisterAllocator,
};

use super::conditional::ConditionalBlock;
use super::instruction::{Instruction, Operand};
use super::isa::{MAX_WAIT, MIN_LATENCY, TRAP_LABEL};
use super::signed::Comparison;

/// What `advance_to` does with a pending update due exactly at the target time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    /// Leave it pending.
    Keep,
    /// Cancel it; the instruction about to be emitted commits the parameters.
    Merge,
    /// Materialize it as an `upd_param`.
    Flush,
}

/// A parameter commit that still has to be placed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUpdate {
    /// Where the `upd_param` goes if the update is flushed.
    pub index: usize,
    /// Hardware time the update is due.
    pub time: u64,
    /// Settings committed by this update.
    pub settings: Vec<usize>,
}

/// Loop header as requested by a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopSpec {
    Repeat {
        count: u64,
    },
    Range {
        var: String,
        start: i64,
        stop: i64,
        step: i64,
    },
}

#[derive(Debug, Clone, Copy)]
enum LoopCounter {
    Repeat { counter: Reg },
    Range { var: Reg, stop: i64, step: i64 },
}

#[derive(Debug)]
struct LoopFrame {
    label: String,
    start: u64,
    start_shift: u64,
    iterations: u64,
    counter: LoopCounter,
}

pub struct InstructionQueue {
    config: CompilerConfig,
    instructions: Vec<Instruction>,
    pub(super) registers: RegisterAllocator,
    /// Hardware clock in ns.
    pub(super) rt_time: u64,
    /// Offset from caller times to the hardware clock.
    pub(super) time_shift: u64,
    pending: Option<PendingUpdate>,
    pub(super) last_rt: Option<usize>,
    last_written: Option<Reg>,
    pending_label: Option<String>,
    pub(super) conditional: Option<ConditionalBlock>,
    loops: Vec<LoopFrame>,
    label_counter: usize,
    trap_used: bool,
    finalized: bool,
    pub(super) stats: CompilationStats,
}

impl InstructionQueue {
    pub fn new(config: CompilerConfig) -> CompileResult<Self> {
        config.validate()?;
        let registers = RegisterAllocator::new(config.register_count)?;
        let mut queue = Self {
            config,
            instructions: Vec::new(),
            registers,
            rt_time: 0,
            time_shift: 0,
            pending: None,
            last_rt: None,
            last_written: None,
            pending_label: None,
            conditional: None,
            loops: Vec::new(),
            label_counter: 0,
            trap_used: false,
            finalized: false,
            stats: CompilationStats::default(),
        };
        if queue.config.sync_on_start {
            queue.append(Instruction::timed("wait_sync", vec![], MIN_LATENCY))?;
        }
        Ok(queue)
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub(super) fn instructions_mut(&mut self) -> &mut [Instruction] {
        &mut self.instructions
    }

    pub fn registers(&self) -> &RegisterAllocator {
        &self.registers
    }

    pub fn registers_mut(&mut self) -> &mut RegisterAllocator {
        &mut self.registers
    }

    /// Hardware clock in ns.
    pub fn current_time(&self) -> u64 {
        self.rt_time
    }

    pub fn time_shift(&self) -> u64 {
        self.time_shift
    }

    pub fn pending_update(&self) -> Option<&PendingUpdate> {
        self.pending.as_ref()
    }

    pub fn stats(&self) -> &CompilationStats {
        &self.stats
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn in_loop(&self) -> bool {
        !self.loops.is_empty()
    }

    pub(super) fn ensure_mutable(&self) -> CompileResult<()> {
        if self.finalized {
            return Err(CompileError::state("the program has already been finalized"));
        }
        Ok(())
    }

    /// Map a caller time onto the hardware clock.
    pub fn to_internal(&self, time: u64) -> CompileResult<u64> {
        if time % MIN_LATENCY != 0 {
            return Err(CompileError::timing(format!(
                "time {time} ns is not a multiple of {MIN_LATENCY} ns"
            )));
        }
        time.checked_add(self.time_shift).ok_or_else(|| {
            CompileError::timing(format!("time {time} ns overflows the hardware clock"))
        })
    }

    /// Generate a label that cannot collide with user labels.
    pub fn fresh_label(&mut self, prefix: &str) -> String {
        self.label_counter += 1;
        format!("_{}{}", prefix, self.label_counter)
    }

    /// Run `f` inside a register scope; its temporaries are released on every exit path.
    pub fn scoped<T>(&mut self, f: impl FnOnce(&mut Self) -> CompileResult<T>) -> CompileResult<T> {
        self.registers.enter_scope();
        let result = f(self);
        let exit = self.registers.exit_scope();
        let value = result?;
        exit?;
        Ok(value)
    }

    pub fn temp(&mut self) -> CompileResult<Reg> {
        self.registers.temp()
    }

    pub(super) fn trap_label(&mut self) -> String {
        self.trap_used = true;
        TRAP_LABEL.to_string()
    }

    /// Append an instruction, guarding the write-then-read hazard.
    pub(super) fn append(&mut self, instr: Instruction) -> CompileResult<usize> {
        self.ensure_mutable()?;
        debug_assert!(
            instr.registers().all(|r| self.registers.is_live(r)),
            "instruction {} uses a register outside its scope",
            instr
        );
        if let Some(written) = self.last_written {
            if instr.references(written) {
                self.stats.hazard_nops += 1;
                self.push_raw(Instruction::new("nop", vec![]));
            }
        }
        self.last_written = instr.written_register();
        Ok(self.push_raw(instr))
    }

    fn push_raw(&mut self, mut instr: Instruction) -> usize {
        if instr.label.is_none() {
            instr.label = self.pending_label.take();
        }
        trace!("[{:>5}] {:>8} ns  {}", self.instructions.len(), self.rt_time, instr);
        self.stats.record_instruction(instr.mnemonic);
        self.instructions.push(instr);
        self.instructions.len() - 1
    }

    /// Emit a non-real-time instruction.
    pub fn emit(&mut self, mnemonic: &'static str, args: Vec<Operand>) -> CompileResult<usize> {
        self.append(Instruction::new(mnemonic, args))
    }

    /// Attach `name` to the next emitted instruction.
    pub fn set_label(&mut self, name: impl Into<String>) -> CompileResult<()> {
        self.ensure_mutable()?;
        if self.pending_label.is_some() {
            self.append(Instruction::new("nop", vec![]))?;
        }
        self.pending_label = Some(name.into());
        self.last_rt = None;
        Ok(())
    }

    /// Advance the hardware clock to caller time `time`.
    pub fn advance_to(&mut self, time: u64, policy: MergePolicy) -> CompileResult<()> {
        self.ensure_mutable()?;
        let target = self.to_internal(time)?;
        self.advance_internal(target, policy, false).map(|_| ())
    }

    /// Like [`advance_to`](Self::advance_to) but returns the amount by which
    /// the clock is already past `time` instead of failing.
    pub fn advance_to_compensated(&mut self, time: u64, policy: MergePolicy) -> CompileResult<u64> {
        self.ensure_mutable()?;
        let target = self.to_internal(time)?;
        self.advance_internal(target, policy, true)
    }

    pub(super) fn advance_internal(
        &mut self,
        target: u64,
        policy: MergePolicy,
        compensate: bool,
    ) -> CompileResult<u64> {
        if let Some(pending) = &self.pending {
            if pending.time == target {
                match policy {
                    MergePolicy::Keep => {}
                    MergePolicy::Merge => {
                        debug!("merged parameter update at {} ns", target);
                        self.pending = None;
                        self.stats.updates_merged += 1;
                    }
                    MergePolicy::Flush => self.flush_pending_update()?,
                }
            } else if pending.time < target || policy == MergePolicy::Flush {
                self.flush_pending_update()?;
            }
        }

        if target < self.rt_time {
            let deficit = self.rt_time - target;
            if compensate {
                debug!("clock is {} ns past {} ns, compensating at runtime", deficit, target);
                return Ok(deficit);
            }
            return Err(CompileError::timing(format!(
                "time ordering violated: requested {} ns but the clock is already at {} ns",
                target.saturating_sub(self.time_shift),
                self.rt_time.saturating_sub(self.time_shift)
            )));
        }
        let delta = target - self.rt_time;
        if delta > 0 {
            self.insert_wait(delta)?;
        }
        Ok(0)
    }

    fn insert_wait(&mut self, delta: u64) -> CompileResult<()> {
        let mut remaining = delta;
        if let Some(index) = self.last_rt {
            let instr = &mut self.instructions[index];
            let folded = MAX_WAIT.saturating_sub(instr.wait_after).min(remaining);
            if folded > 0 {
                instr.wait_after += folded;
                remaining -= folded;
                self.stats.waits_folded += 1;
                debug!("folded {} ns into `{}`", folded, instr);
            }
        }

        if remaining > 0 {
            let full = remaining / MAX_WAIT;
            let rest = remaining % MAX_WAIT;
            let count = full + u64::from(rest > 0);
            if count as usize <= self.config.max_unrolled_waits || self.conditional.is_some() {
                for _ in 0..full {
                    self.push_wait(MAX_WAIT)?;
                }
                if rest > 0 {
                    self.push_wait(rest)?;
                }
            } else {
                self.push_wait_loop(full, rest)?;
            }
        }
        self.rt_time += delta;
        Ok(())
    }

    fn push_wait(&mut self, duration: u64) -> CompileResult<()> {
        let index = self.append(Instruction::timed("wait", vec![], duration))?;
        self.stats.waits_emitted += 1;
        self.last_rt = Some(index);
        Ok(())
    }

    fn push_wait_loop(&mut self, iterations: u64, rest: u64) -> CompileResult<()> {
        if iterations > u32::MAX as u64 {
            return Err(CompileError::timing(format!(
                "gap of {} ns exceeds the longest wait loop ({} x {} ns)",
                iterations * MAX_WAIT + rest,
                u32::MAX,
                MAX_WAIT
            )));
        }
        debug!(
            "wait loop: {} x {} ns + {} ns",
            iterations, MAX_WAIT, rest
        );
        self.stats.wait_loops += 1;
        self.scoped(|q| {
            let counter = q.temp()?;
            let label = q.fresh_label("wait");
            q.emit("move", vec![Operand::word(iterations as u32), counter.into()])?;
            q.set_label(label.clone())?;
            q.append(Instruction::timed("wait", vec![], MAX_WAIT))?;
            q.emit("loop", vec![counter.into(), Operand::label(label)])?;
            Ok(())
        })?;
        self.last_rt = None;
        if rest > 0 {
            self.push_wait(rest)?;
        }
        Ok(())
    }

    /// Advance to `time` and open a pending update there.
    pub fn schedule_update(&mut self, time: u64) -> CompileResult<()> {
        self.ensure_mutable()?;
        let target = self.to_internal(time)?;
        self.advance_internal(target, MergePolicy::Keep, false)?;
        self.record_pending(target, None);
        Ok(())
    }

    fn record_pending(&mut self, time: u64, setting: Option<usize>) {
        let index = self.instructions.len();
        match &mut self.pending {
            Some(pending) if pending.time == time => {
                pending.index = index;
                pending.settings.extend(setting);
                self.stats.updates_reused += 1;
            }
            _ => {
                self.pending = Some(PendingUpdate {
                    index,
                    time,
                    settings: setting.into_iter().collect(),
                });
            }
        }
    }

    /// Insert the pending update as an `upd_param` at its reserved position.
    pub fn flush_pending_update(&mut self) -> CompileResult<()> {
        self.ensure_mutable()?;
        let Some(pending) = self.pending.take() else {
            return Ok(());
        };
        debug_assert!(self.last_rt.map_or(true, |i| i < pending.index));
        let instr = Instruction::timed("upd_param", vec![], MIN_LATENCY);
        trace!("[{:>5}] {:>8} ns  {} (inserted)", pending.index, pending.time, instr);
        self.stats.record_instruction(instr.mnemonic);
        self.stats.updates_flushed += 1;
        if pending.index == self.instructions.len() {
            self.last_written = None;
        }
        self.instructions.insert(pending.index, instr);
        self.last_rt = Some(pending.index);
        self.rt_time += MIN_LATENCY;
        debug!("flushed parameter update at {} ns", pending.time);
        Ok(())
    }

    /// Emit a real-time instruction at `time` that also commits pending settings.
    pub fn emit_realtime_command(
        &mut self,
        mnemonic: &'static str,
        args: Vec<Operand>,
        time: u64,
    ) -> CompileResult<()> {
        self.emit_timed(mnemonic, args, time, MergePolicy::Merge)
    }

    /// Emit a real-time instruction at `time` that does not commit settings.
    pub fn emit_latch_command(
        &mut self,
        mnemonic: &'static str,
        args: Vec<Operand>,
        time: u64,
    ) -> CompileResult<()> {
        self.emit_timed(mnemonic, args, time, MergePolicy::Flush)
    }

    fn emit_timed(
        &mut self,
        mnemonic: &'static str,
        args: Vec<Operand>,
        time: u64,
        policy: MergePolicy,
    ) -> CompileResult<()> {
        self.ensure_mutable()?;
        let target = self.to_internal(time)?;
        self.advance_internal(target, policy, false)?;
        let index = self.append(Instruction::timed(mnemonic, args, MIN_LATENCY))?;
        self.rt_time += MIN_LATENCY;
        self.last_rt = Some(index);
        Ok(())
    }

    /// Emit a parameter setting at `time`, committed by a pending update.
    pub fn emit_realtime_setting(
        &mut self,
        mnemonic: &'static str,
        args: Vec<Operand>,
        time: u64,
    ) -> CompileResult<()> {
        self.ensure_mutable()?;
        let target = self.to_internal(time)?;
        self.advance_internal(target, MergePolicy::Keep, false)?;
        let index = self.append(Instruction::new(mnemonic, args))?;

        if mnemonic != "set_ph_delta" {
            if let Some(pending) = &self.pending {
                if pending.time == target {
                    let earlier: Vec<usize> = pending
                        .settings
                        .iter()
                        .copied()
                        .filter(|&i| {
                            let instr = &self.instructions[i];
                            instr.mnemonic == mnemonic && !instr.overwritten && instr.label.is_none()
                        })
                        .collect();
                    for i in earlier {
                        debug!("`{}` overwritten at {} ns", self.instructions[i], target);
                        self.instructions[i].overwritten = true;
                        self.stats.settings_overwritten += 1;
                    }
                }
            }
        }
        self.record_pending(target, Some(index));
        Ok(())
    }

    /// Emit a `set_cond`-style zero-time setting that needs no update.
    pub(super) fn emit_untimed_setting(
        &mut self,
        mnemonic: &'static str,
        args: Vec<Operand>,
    ) -> CompileResult<usize> {
        let index = self.append(Instruction::new(mnemonic, args))?;
        self.last_rt = None;
        Ok(index)
    }

    /// Wait `duration` ns after `time`.
    pub fn emit_wait(&mut self, duration: u64, time: u64) -> CompileResult<()> {
        self.ensure_mutable()?;
        if duration % MIN_LATENCY != 0 {
            return Err(CompileError::timing(format!(
                "wait of {duration} ns is not a multiple of {MIN_LATENCY} ns"
            )));
        }
        let end = time.checked_add(duration).ok_or_else(|| {
            CompileError::timing(format!("wait of {duration} ns at {time} ns overflows the clock"))
        })?;
        let target = self.to_internal(end)?;
        self.advance_internal(target, MergePolicy::Keep, false)?;
        Ok(())
    }

    /// Wait for the number of ns held in `duration`, starting at `time`.
    ///
    /// Latency already spent past `time` is subtracted at runtime and the
    /// remaining duration is checked against the minimum wait. Afterwards the
    /// clock reads `time` again, relative to the end of the runtime wait.
    pub fn emit_register_wait(&mut self, duration: Reg, time: u64) -> CompileResult<()> {
        self.ensure_mutable()?;
        if self.conditional.is_some() {
            return Err(CompileError::syntax(
                "register waits are not allowed inside conditional blocks",
            ));
        }
        let target = self.to_internal(time)?;
        let compensation = self.advance_internal(target, MergePolicy::Flush, true)?;
        self.scoped(|q| {
            let wait_reg = if compensation > 0 {
                let adjusted = q.temp()?;
                q.emit(
                    "sub",
                    vec![
                        duration.into(),
                        Operand::word(compensation as u32),
                        adjusted.into(),
                    ],
                )?;
                adjusted
            } else {
                duration
            };
            q.emit_min_duration_check(wait_reg)?;
            q.append(Instruction::timed("wait", vec![wait_reg.into()], 0))?;
            Ok(())
        })?;
        self.time_shift += compensation;
        self.last_rt = None;
        debug!(
            "register wait {} at {} ns, {} ns compensated",
            duration, time, compensation
        );
        Ok(())
    }

    /// Unconditional jump at `time`.
    pub fn emit_jump(&mut self, label: &str, time: u64) -> CompileResult<()> {
        self.advance_to(time, MergePolicy::Flush)?;
        self.emit("jmp", vec![Operand::label(label)])?;
        self.last_rt = None;
        Ok(())
    }

    /// Label the next instruction, at `time`.
    pub fn emit_label(&mut self, label: &str, time: u64) -> CompileResult<()> {
        self.advance_to(time, MergePolicy::Flush)?;
        self.set_label(label)
    }

    /// Open a loop body at `time`.
    pub fn loop_start(&mut self, spec: LoopSpec, time: u64) -> CompileResult<()> {
        self.ensure_mutable()?;
        if self.conditional.is_some() {
            return Err(CompileError::syntax(
                "loops are not allowed inside conditional blocks",
            ));
        }
        let iterations = self.loop_iterations(&spec)?;
        let target = self.to_internal(time)?;
        self.advance_internal(target, MergePolicy::Flush, false)?;

        self.registers.enter_scope();
        let counter = match self.bind_loop_counter(&spec, iterations) {
            Ok(counter) => counter,
            Err(err) => {
                self.registers.exit_scope()?;
                return Err(err);
            }
        };
        let label = self.fresh_label("loop");
        self.set_label(label.clone())?;
        debug!(
            "loop {} at {} ns, {} iterations",
            label, self.rt_time, iterations
        );
        self.loops.push(LoopFrame {
            label,
            start: self.rt_time,
            start_shift: self.time_shift,
            iterations,
            counter,
        });
        Ok(())
    }

    fn loop_iterations(&self, spec: &LoopSpec) -> CompileResult<u64> {
        match spec {
            LoopSpec::Repeat { count } => {
                if *count == 0 || *count > u32::MAX as u64 {
                    return Err(CompileError::value(format!(
                        "repeat count must be between 1 and {}, got {}",
                        u32::MAX,
                        count
                    )));
                }
                Ok(*count)
            }
            LoopSpec::Range {
                start, stop, step, ..
            } => {
                let (start, stop, step) = (*start, *stop, *step);
                if step == 0 {
                    return Err(CompileError::value("loop step cannot be zero"));
                }
                let out_of_range = || {
                    CompileError::value(format!(
                        "loop range {start}..{stop} step {step} does not fit in 32 bits"
                    ))
                };
                let after = stop.checked_add(step).ok_or_else(out_of_range)?;
                let bounds = [start, stop, step, after];
                if bounds
                    .iter()
                    .any(|v| *v < i32::MIN as i64 || *v > i32::MAX as i64)
                {
                    return Err(out_of_range());
                }
                if !self.config.emulate_signed && bounds.iter().any(|v| *v < 0) {
                    return Err(CompileError::value(
                        "negative loop bounds require signed emulation",
                    ));
                }
                let span = if step > 0 { stop - start } else { start - stop };
                let stride = step.abs();
                if span <= 0 {
                    return Err(CompileError::value(format!(
                        "empty loop range {start}..{stop} step {step}"
                    )));
                }
                Ok(((span + stride - 1) / stride) as u64)
            }
        }
    }

    fn bind_loop_counter(&mut self, spec: &LoopSpec, iterations: u64) -> CompileResult<LoopCounter> {
        match spec {
            LoopSpec::Repeat { .. } => {
                let counter = self.temp()?;
                self.emit("move", vec![Operand::word(iterations as u32), counter.into()])?;
                Ok(LoopCounter::Repeat { counter })
            }
            LoopSpec::Range {
                var,
                start,
                stop,
                step,
            } => {
                let reg = self.registers.allocate(var, DType::Int)?;
                self.emit("move", vec![Operand::word(*start as i32 as u32), reg.into()])?;
                Ok(LoopCounter::Range {
                    var: reg,
                    stop: *stop,
                    step: *step,
                })
            }
        }
    }

    /// Close the innermost loop body at `time`.
    pub fn loop_end(&mut self, time: u64) -> CompileResult<()> {
        self.ensure_mutable()?;
        if self.loops.is_empty() {
            return Err(CompileError::syntax("loop end without a matching loop start"));
        }
        let target = self.to_internal(time)?;
        self.advance_internal(target, MergePolicy::Flush, false)?;
        let Some(frame) = self.loops.pop() else {
            return Err(CompileError::internal("loop stack is empty"));
        };

        match frame.counter {
            LoopCounter::Repeat { counter } => {
                self.emit("loop", vec![counter.into(), Operand::label(&frame.label)])?;
            }
            LoopCounter::Range { var, stop, step } => {
                if step > 0 {
                    self.emit("add", vec![var.into(), Operand::word(step as u32), var.into()])?;
                    self.emit_signed_jump(Comparison::Lt, var, stop, &frame.label)?;
                } else {
                    self.emit(
                        "sub",
                        vec![var.into(), Operand::word((-step) as u32), var.into()],
                    )?;
                    self.emit_signed_jump(Comparison::Ge, var, stop + 1, &frame.label)?;
                }
            }
        }
        self.registers.exit_scope()?;

        let body = self.rt_time - frame.start;
        let shift = self.time_shift - frame.start_shift;
        let overflow = || {
            CompileError::timing(format!(
                "{} iterations of {} ns overflow the hardware clock",
                frame.iterations, body
            ))
        };
        self.rt_time = frame
            .iterations
            .checked_mul(body)
            .and_then(|total| total.checked_add(frame.start))
            .ok_or_else(overflow)?;
        self.time_shift = frame
            .iterations
            .checked_mul(shift)
            .and_then(|total| total.checked_add(frame.start_shift))
            .ok_or_else(overflow)?;
        self.last_rt = None;
        debug!(
            "loop {} closed: {} x {} ns, clock at {} ns",
            frame.label, frame.iterations, body, self.rt_time
        );
        Ok(())
    }

    /// Close the program: commit pending settings, stop, and place the error trap.
    pub fn finalize(&mut self) -> CompileResult<()> {
        self.ensure_mutable()?;
        if !self.loops.is_empty() {
            return Err(CompileError::syntax(format!(
                "{} loop(s) not closed at the end of the program",
                self.loops.len()
            )));
        }
        if self.conditional.is_some() {
            return Err(CompileError::syntax(
                "conditional block not closed at the end of the program",
            ));
        }
        self.flush_pending_update()?;
        self.append(Instruction::new("stop", vec![]))?;
        if self.trap_used {
            self.set_label(TRAP_LABEL)?;
            self.append(Instruction::new("illegal", vec![]))?;
        }
        self.stats.register_high_water = self.registers.high_water_mark();
        self.finalized = true;
        info!(
            "compiled {} instructions, {} ns, {} registers",
            self.instructions.len(),
            self.rt_time,
            self.stats.register_high_water
        );
        Ok(())
    }

    /// Consume a finalized queue.
    pub fn into_parts(self) -> CompileResult<(Vec<Instruction>, CompilationStats, u64)> {
        if !self.finalized {
            return Err(CompileError::state("the program has not been finalized"));
        }
        Ok((self.instructions, self.stats, self.rt_time))
    }
}
