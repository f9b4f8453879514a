//! Sequencer instruction set conventions.

/// Minimum latency and time resolution in ns.
pub const MIN_LATENCY: u64 = 4;

/// Largest immediate accepted by a single `wait`.
pub const MAX_WAIT: u64 = 65532;

pub const SIGN_BIT: u32 = 0x8000_0000;

/// Time a conditioned-out real-time instruction takes.
pub const ELSE_DURATION: u64 = 4;

/// Label of the shared runtime error trap.
pub const TRAP_LABEL: &str = "_runtime_error";

/// Execution class of a mnemonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstrClass {
    /// Q1 control flow, no real-time effect.
    Control,
    /// ALU instruction writing its last operand.
    Arithmetic,
    /// Real-time parameter latch, takes no time.
    Setting,
    /// Real-time instruction with a trailing duration.
    Timed,
}

pub fn class_of(mnemonic: &str) -> InstrClass {
    match mnemonic {
        "move" | "not" | "add" | "sub" | "and" | "or" | "xor" | "asl" | "asr" => {
            InstrClass::Arithmetic
        }
        "set_mrk" | "set_freq" | "set_ph" | "set_ph_delta" | "reset_ph" | "set_awg_gain"
        | "set_awg_offs" | "set_cond" => InstrClass::Setting,
        "upd_param" | "play" | "acquire" | "acquire_weighed" | "acquire_ttl"
        | "set_latch_en" | "latch_rst" | "wait" | "wait_sync" => InstrClass::Timed,
        _ => InstrClass::Control,
    }
}
