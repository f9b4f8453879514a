//! Lowering of statements onto the instruction queue.
//!
//! [`Statement::write_instruction`] is the single dispatcher over statement
//! kinds. Typed argument slots go through the normalization helpers at the
//! bottom of this file, which turn an [`Arg`] into an immediate or a
//! register operand and reject operand kinds the slot cannot take.

use log::warn;

use crate::core::fixed_point::{encode_frequency, encode_i16, encode_phase};
use crate::core::{CompileError, CompileResult, DType, Reg};
use crate::q1::{DataTables, InstructionQueue, LoopSpec, MergePolicy, Operand};

use super::{Arg, LoopKind, Statement, StatementKind};

/// Largest value of the 4-bit marker mask.
const MAX_MARKERS: i64 = 0b1111;

impl Statement {
    /// Append the instructions of this statement to `queue`.
    pub fn write_instruction(
        &self,
        queue: &mut InstructionQueue,
        tables: &DataTables,
    ) -> CompileResult<()> {
        use StatementKind::*;

        let time = self.time;
        if queue.between_branches()
            && !matches!(self.kind, Branch(_) | ConditionalEnd | Declare { .. })
        {
            return Err(CompileError::syntax(
                "only branches can appear directly inside a conditional block",
            ));
        }

        match &self.kind {
            Declare { name, dtype } => {
                queue.to_internal(time)?;
                queue.registers_mut().allocate(name, *dtype)?;
                Ok(())
            }
            Assign { name, expr } => {
                queue.to_internal(time)?;
                if queue.in_conditional() {
                    return Err(CompileError::syntax(
                        "register assignments cannot be conditioned",
                    ));
                }
                let (reg, dtype) = queue.registers().binding(name)?;
                let value_type = expr.dtype(queue.registers())?;
                if value_type != dtype {
                    return Err(CompileError::type_error(format!(
                        "cannot assign {value_type} `{expr}` to {dtype} variable '{name}'"
                    )));
                }
                queue.evaluate(expr, Some(reg))?;
                Ok(())
            }
            Label(name) => {
                check_user_label(name)?;
                reject_in_conditional(queue, "labels")?;
                queue.emit_label(name, time)
            }
            Jump(label) => {
                check_user_label(label)?;
                reject_in_conditional(queue, "jumps")?;
                queue.emit_jump(label, time)
            }
            JumpIf {
                var,
                cmp,
                threshold,
                label,
            } => {
                check_user_label(label)?;
                reject_in_conditional(queue, "jumps")?;
                let reg = queue.registers().get(var)?;
                queue.advance_to(time, MergePolicy::Flush)?;
                queue.emit_signed_jump(*cmp, reg, *threshold, label)
            }
            LoopStart(kind) => {
                let spec = match kind {
                    LoopKind::Repeat { count } => LoopSpec::Repeat { count: *count },
                    LoopKind::Range {
                        var,
                        start,
                        stop,
                        step,
                    } => LoopSpec::Range {
                        var: var.clone(),
                        start: *start,
                        stop: *stop,
                        step: *step,
                    },
                };
                queue.loop_start(spec, time)
            }
            LoopEnd => queue.loop_end(time),
            Wait(arg) => write_wait(queue, arg, time),
            SetMarkers(arg) => {
                let markers = int_operand(queue, arg, "marker mask")?;
                if let Operand::Imm(value) = markers {
                    if !(0..=MAX_MARKERS).contains(&value) {
                        return Err(CompileError::value(format!(
                            "marker mask {value} is outside 0..={MAX_MARKERS}"
                        )));
                    }
                }
                queue.emit_realtime_setting("set_mrk", vec![markers], time)
            }
            ResetPhase => queue.emit_realtime_setting("reset_ph", vec![], time),
            SetPhase(arg) => write_phase(queue, "set_ph", arg, time),
            ShiftPhase(arg) => write_phase(queue, "set_ph_delta", arg, time),
            SetFrequency(arg) => {
                let frequency = match arg {
                    Arg::Int(hz) => Operand::word(encode_frequency(*hz as f64)?),
                    Arg::Float(hz) => Operand::word(encode_frequency(*hz)?),
                    Arg::Var(_) => int_operand(queue, arg, "frequency")?,
                };
                queue.emit_realtime_setting("set_freq", vec![frequency], time)
            }
            SetOffset(a, b) => write_amplitudes(queue, "set_awg_offs", a, b, time),
            SetGain(a, b) => write_amplitudes(queue, "set_awg_gain", a, b, time),
            Ramp {
                target,
                from,
                to,
                duration,
            } => queue.emit_ramp(target.mnemonic(), *from, *to, *duration, time),
            Play { wave0, wave1 } => {
                let args = vec![
                    index_operand(tables.waveform_index(wave0)?),
                    index_operand(tables.waveform_index(wave1)?),
                ];
                queue.emit_realtime_command("play", args, time)
            }
            Acquire { acquisition, bin } => {
                let (index, bins) = tables.acquisition(acquisition)?;
                let bin = bin_operand(queue, bin, acquisition, bins)?;
                queue.emit_realtime_command("acquire", vec![index_operand(index), bin], time)
            }
            AcquireWeighed {
                acquisition,
                bin,
                weight0,
                weight1,
            } => {
                let (index, bins) = tables.acquisition(acquisition)?;
                let args = vec![
                    index_operand(index),
                    bin_operand(queue, bin, acquisition, bins)?,
                    index_operand(tables.weight_index(weight0)?),
                    index_operand(tables.weight_index(weight1)?),
                ];
                queue.emit_realtime_command("acquire_weighed", args, time)
            }
            AcquireTtl {
                acquisition,
                bin,
                enable,
            } => {
                let (index, bins) = tables.acquisition(acquisition)?;
                let args = vec![
                    index_operand(index),
                    bin_operand(queue, bin, acquisition, bins)?,
                    Operand::Imm(i64::from(*enable)),
                ];
                queue.emit_realtime_command("acquire_ttl", args, time)
            }
            SetLatchEnable(enable) => queue.emit_latch_command(
                "set_latch_en",
                vec![Operand::Imm(i64::from(*enable))],
                time,
            ),
            ResetLatch => queue.emit_latch_command("latch_rst", vec![], time),
            ConditionalStart { counters } => queue.enter_conditional(counters, time),
            Branch(op) => {
                queue.to_internal(time)?;
                queue.enter_branch(*op)
            }
            BranchEnd => {
                queue.to_internal(time)?;
                queue.exit_branch()
            }
            ConditionalEnd => queue.exit_conditional(time),
        }
    }
}

fn check_user_label(name: &str) -> CompileResult<()> {
    let valid = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        let reason = if name.starts_with('_') {
            format!("label '{name}' is reserved: names starting with '_' belong to the compiler")
        } else {
            format!("invalid label '{name}'")
        };
        return Err(CompileError::syntax(reason));
    }
    Ok(())
}

fn reject_in_conditional(queue: &InstructionQueue, what: &str) -> CompileResult<()> {
    if queue.in_conditional() {
        return Err(CompileError::syntax(format!(
            "{what} are not allowed inside conditional blocks"
        )));
    }
    Ok(())
}

fn write_wait(queue: &mut InstructionQueue, arg: &Arg, time: u64) -> CompileResult<()> {
    match arg {
        Arg::Int(duration) if *duration < 0 => Err(CompileError::timing(format!(
            "negative wait of {duration} ns"
        ))),
        Arg::Int(0) => {
            queue.to_internal(time)?;
            warn!("ignoring zero-length wait at {time} ns");
            Ok(())
        }
        Arg::Int(duration) => queue.emit_wait(*duration as u64, time),
        Arg::Float(_) => Err(CompileError::type_error(
            "wait duration must be an integer number of ns",
        )),
        Arg::Var(name) => {
            let reg = typed_register(queue, name, DType::Int, "wait duration")?;
            queue.emit_register_wait(reg, time)
        }
    }
}

fn write_phase(
    queue: &mut InstructionQueue,
    mnemonic: &'static str,
    arg: &Arg,
    time: u64,
) -> CompileResult<()> {
    match arg {
        Arg::Int(turns) => {
            let units = encode_phase(*turns as f64)?;
            queue.emit_realtime_setting(mnemonic, vec![Operand::word(units)], time)
        }
        Arg::Float(turns) => {
            let units = encode_phase(*turns)?;
            queue.emit_realtime_setting(mnemonic, vec![Operand::word(units)], time)
        }
        Arg::Var(name) => match queue.registers().binding(name)? {
            (reg, DType::Int) => queue.emit_realtime_setting(mnemonic, vec![reg.into()], time),
            (reg, DType::Float) => queue.scoped(|q| {
                let units = q.temp()?;
                q.emit_phase_conversion(reg, units)?;
                q.emit_realtime_setting(mnemonic, vec![units.into()], time)
            }),
        },
    }
}

fn write_amplitudes(
    queue: &mut InstructionQueue,
    mnemonic: &'static str,
    a: &Arg,
    b: &Arg,
    time: u64,
) -> CompileResult<()> {
    if let (Some(x), Some(y)) = (amplitude_literal(a)?, amplitude_literal(b)?) {
        return queue.emit_realtime_setting(
            mnemonic,
            vec![Operand::Imm(x as i64), Operand::Imm(y as i64)],
            time,
        );
    }
    // Register operands are read as 16-bit values from their low half.
    queue.scoped(|q| {
        let x = amplitude_register(q, a)?;
        let y = amplitude_register(q, b)?;
        q.emit_realtime_setting(mnemonic, vec![x.into(), y.into()], time)
    })
}

fn amplitude_literal(arg: &Arg) -> CompileResult<Option<i16>> {
    match arg {
        Arg::Int(v) => encode_i16(*v as f64).map(Some),
        Arg::Float(v) => encode_i16(*v).map(Some),
        Arg::Var(_) => Ok(None),
    }
}

fn amplitude_register(queue: &mut InstructionQueue, arg: &Arg) -> CompileResult<Reg> {
    let out = queue.temp()?;
    match amplitude_literal(arg)? {
        Some(value) => {
            queue.emit("move", vec![Operand::word(value as u16 as u32), out.into()])?;
        }
        None => {
            let Arg::Var(name) = arg else {
                return Err(CompileError::internal("amplitude literal was not encoded"));
            };
            let reg = typed_register(queue, name, DType::Float, "amplitude")?;
            queue.emit("asr", vec![reg.into(), Operand::word(16), out.into()])?;
        }
    }
    Ok(out)
}

/// Immediate or int register for a plain 32-bit slot.
fn int_operand(queue: &InstructionQueue, arg: &Arg, what: &str) -> CompileResult<Operand> {
    match arg {
        Arg::Int(v) => {
            if *v < i32::MIN as i64 || *v > u32::MAX as i64 {
                return Err(CompileError::value(format!(
                    "{what} {v} does not fit in 32 bits"
                )));
            }
            Ok(Operand::word(*v as u32))
        }
        Arg::Float(v) => Err(CompileError::type_error(format!(
            "{what} must be an integer, got {v:?}"
        ))),
        Arg::Var(name) => Ok(typed_register(queue, name, DType::Int, what)?.into()),
    }
}

fn bin_operand(
    queue: &InstructionQueue,
    arg: &Arg,
    acquisition: &str,
    bins: u32,
) -> CompileResult<Operand> {
    let operand = int_operand(queue, arg, "acquisition bin")?;
    if let Operand::Imm(bin) = operand {
        if bin >= bins as i64 {
            return Err(CompileError::value(format!(
                "bin {bin} is out of range for acquisition '{acquisition}' with {bins} bins"
            )));
        }
    }
    Ok(operand)
}

fn typed_register(
    queue: &InstructionQueue,
    name: &str,
    expected: DType,
    what: &str,
) -> CompileResult<Reg> {
    let (reg, dtype) = queue.registers().binding(name)?;
    if dtype != expected {
        return Err(CompileError::type_error(format!(
            "{what} needs a {expected} register, '{name}' is {dtype}"
        )));
    }
    Ok(reg)
}

fn index_operand(index: usize) -> Operand {
    Operand::Imm(index as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::CompilerConfig;
    use crate::q1::Operator;

    fn queue() -> InstructionQueue {
        InstructionQueue::new(CompilerConfig::default().with_sync_on_start(false)).unwrap()
    }

    fn tables() -> DataTables {
        let mut tables = DataTables::new();
        tables.add_waveform("gauss", vec![0.0, 0.5, 0.0]).unwrap();
        tables.add_waveform("zero", vec![0.0]).unwrap();
        tables.add_weight("w", vec![1.0]).unwrap();
        tables.add_acquisition("readout", 4).unwrap();
        tables
    }

    fn run(queue: &mut InstructionQueue, statements: &[(u64, StatementKind)]) -> CompileResult<()> {
        let tables = tables();
        for (time, kind) in statements {
            Statement::new(*time, kind.clone()).write_instruction(queue, &tables)?;
        }
        Ok(())
    }

    fn listing(q: &InstructionQueue) -> Vec<String> {
        q.instructions()
            .iter()
            .filter(|i| !i.overwritten)
            .map(ToString::to_string)
            .collect()
    }

    fn declare(name: &str, dtype: DType) -> StatementKind {
        StatementKind::Declare {
            name: name.to_string(),
            dtype,
        }
    }

    fn play(wave: &str) -> StatementKind {
        StatementKind::Play {
            wave0: wave.to_string(),
            wave1: wave.to_string(),
        }
    }

    #[test]
    fn test_literal_settings() {
        let mut q = queue();
        run(
            &mut q,
            &[
                (0, StatementKind::SetPhase(Arg::Float(0.25))),
                (0, StatementKind::SetFrequency(Arg::Float(-10e6))),
                (0, StatementKind::SetMarkers(Arg::Int(3))),
                (0, play("zero")),
            ],
        )
        .unwrap();
        assert_eq!(
            listing(&q),
            vec![
                "set_ph 250000000",
                "set_freq 4254967296",
                "set_mrk 3",
                "play 1,1,4"
            ]
        );
    }

    #[test]
    fn test_float_register_offset() {
        let mut q = queue();
        run(
            &mut q,
            &[
                (0, declare("o", DType::Float)),
                (0, StatementKind::SetOffset(Arg::var("o"), Arg::Float(0.5))),
                (0, play("gauss")),
            ],
        )
        .unwrap();
        assert_eq!(
            listing(&q),
            vec![
                "asr R0,16,R1",
                "move 16384,R2",
                "nop",
                "set_awg_offs R1,R2",
                "play 0,0,4"
            ]
        );
        assert_eq!(q.registers().next_free(), 1);
    }

    #[test]
    fn test_operand_kinds_are_checked() {
        let mut q = queue();
        run(&mut q, &[(0, declare("n", DType::Int))]).unwrap();
        let err = run(&mut q, &[(0, StatementKind::SetGain(Arg::var("n"), Arg::var("n")))]);
        assert!(matches!(err, Err(CompileError::Type { .. })));
        let err = run(&mut q, &[(0, StatementKind::SetMarkers(Arg::Int(16)))]);
        assert!(matches!(err, Err(CompileError::Value { .. })));
        let err = run(&mut q, &[(0, StatementKind::Wait(Arg::Float(1.0)))]);
        assert!(matches!(err, Err(CompileError::Type { .. })));
        let err = run(&mut q, &[(0, play("missing"))]);
        assert!(matches!(err, Err(CompileError::UndefinedName { .. })));
    }

    #[test]
    fn test_acquisition_bins() {
        let mut q = queue();
        let acquire = |bin: i64| StatementKind::Acquire {
            acquisition: "readout".to_string(),
            bin: Arg::Int(bin),
        };
        run(&mut q, &[(0, acquire(3))]).unwrap();
        assert_eq!(listing(&q), vec!["acquire 0,3,4"]);
        assert!(matches!(
            run(&mut q, &[(100, acquire(4))]),
            Err(CompileError::Value { .. })
        ));
    }

    #[test]
    fn test_float_phase_register_is_converted() {
        let mut q = queue();
        run(
            &mut q,
            &[
                (0, declare("p", DType::Float)),
                (0, StatementKind::ShiftPhase(Arg::var("p"))),
            ],
        )
        .unwrap();
        let list = listing(&q);
        assert_eq!(list[0], "and R0,2147483647,R2");
        assert_eq!(list.last().map(String::as_str), Some("set_ph_delta R1"));
    }

    #[test]
    fn test_labels() {
        let mut q = queue();
        assert!(matches!(
            run(&mut q, &[(0, StatementKind::Label("_loop1".to_string()))]),
            Err(CompileError::Syntax { .. })
        ));
        run(
            &mut q,
            &[
                (0, StatementKind::Label("start".to_string())),
                (0, play("zero")),
                (100, StatementKind::Jump("start".to_string())),
            ],
        )
        .unwrap();
        assert_eq!(listing(&q), vec!["play 1,1,100", "jmp @start"]);
        assert_eq!(q.instructions()[0].label.as_deref(), Some("start"));
    }

    #[test]
    fn test_zero_wait_is_ignored() {
        let mut q = queue();
        run(&mut q, &[(0, StatementKind::Wait(Arg::Int(0)))]).unwrap();
        assert!(q.instructions().is_empty());
        assert!(matches!(
            run(&mut q, &[(2, StatementKind::Wait(Arg::Int(0)))]),
            Err(CompileError::Timing { .. })
        ));
    }

    #[test]
    fn test_only_branches_between_branches() {
        let mut q = queue();
        run(
            &mut q,
            &[
                (0, StatementKind::ConditionalStart { counters: vec![0] }),
                (0, StatementKind::Branch(Operator::Or)),
                (0, play("gauss")),
                (0, StatementKind::BranchEnd),
            ],
        )
        .unwrap();
        assert!(matches!(
            run(&mut q, &[(0, play("gauss"))]),
            Err(CompileError::Syntax { .. })
        ));
    }

    #[test]
    fn test_no_assignment_inside_branch() {
        let mut q = queue();
        let err = run(
            &mut q,
            &[
                (0, declare("n", DType::Int)),
                (0, StatementKind::ConditionalStart { counters: vec![1] }),
                (0, StatementKind::Branch(Operator::Nor)),
                (
                    0,
                    StatementKind::Assign {
                        name: "n".to_string(),
                        expr: crate::q1::Expr::Int(1),
                    },
                ),
            ],
        );
        assert!(matches!(err, Err(CompileError::Syntax { .. })));
    }
}
