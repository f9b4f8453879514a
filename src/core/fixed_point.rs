//! Fixed-point codecs for the sequencer's numeric formats.
//!
//! Amplitudes live in [-1.0, 1.0]. The 32-bit format scales by 2^31 and is
//! used for float-tagged registers and float literals in expressions. The
//! 16-bit format scales by 2^15 and is what gain and offset immediates use.
//! Phases are expressed in turns and encoded as nanoturns, frequencies in Hz
//! are encoded in quarter-hertz units.

use super::error::{CompileError, CompileResult};

const SCALE_32: f64 = 2147483648.0;
const SCALE_16: f64 = 32768.0;

/// Phase units per full turn.
pub const PHASE_UNITS: u32 = 1_000_000_000;

/// Largest representable frequency magnitude in Hz.
pub const MAX_FREQUENCY: f64 = 500e6;

fn check_amplitude(value: f64) -> CompileResult<()> {
    if !(-1.0..=1.0).contains(&value) {
        return Err(CompileError::value(format!(
            "{value} is outside the fixed-point range [-1.0, 1.0]"
        )));
    }
    Ok(())
}

/// Encode into the 32-bit format. 1.0 saturates to `i32::MAX`.
pub fn encode_i32(value: f64) -> CompileResult<i32> {
    check_amplitude(value)?;
    let scaled = (value * SCALE_32).round();
    Ok(scaled.clamp(i32::MIN as f64, i32::MAX as f64) as i32)
}

pub fn decode_i32(raw: i32) -> f64 {
    raw as f64 / SCALE_32
}

/// Encode into the 16-bit format. 1.0 saturates to `i16::MAX`.
pub fn encode_i16(value: f64) -> CompileResult<i16> {
    check_amplitude(value)?;
    let scaled = (value * SCALE_16).round();
    Ok(scaled.clamp(i16::MIN as f64, i16::MAX as f64) as i16)
}

pub fn decode_i16(raw: i16) -> f64 {
    raw as f64 / SCALE_16
}

/// Encode a phase in turns. Any real value is accepted and wrapped to one turn.
pub fn encode_phase(turns: f64) -> CompileResult<u32> {
    if !turns.is_finite() {
        return Err(CompileError::value(format!("phase {turns} is not finite")));
    }
    let frac = turns - turns.floor();
    let units = (frac * PHASE_UNITS as f64).round() as u64;
    Ok((units % PHASE_UNITS as u64) as u32)
}

/// Encode a frequency in Hz as its 32-bit two's-complement register value.
pub fn encode_frequency(hz: f64) -> CompileResult<u32> {
    if !hz.is_finite() || hz.abs() > MAX_FREQUENCY {
        return Err(CompileError::value(format!(
            "frequency {hz} Hz is outside +/-{MAX_FREQUENCY} Hz"
        )));
    }
    Ok(((hz * 4.0).round() as i64) as i32 as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_i32_half_is_within_one_lsb() {
        let raw = encode_i32(0.5).unwrap();
        assert_eq!(raw, 1 << 30);
        assert!((decode_i32(raw) - 0.5).abs() <= 1.0 / SCALE_32);
    }

    #[test]
    fn test_i32_limits() {
        assert_eq!(encode_i32(1.0).unwrap(), i32::MAX);
        assert_eq!(encode_i32(-1.0).unwrap(), i32::MIN);
        assert_eq!(encode_i32(0.0).unwrap(), 0);
    }

    #[test]
    fn test_out_of_range_is_value_error() {
        assert!(matches!(encode_i32(1.5), Err(CompileError::Value { .. })));
        assert!(matches!(encode_i16(-1.01), Err(CompileError::Value { .. })));
        assert!(encode_i32(f64::NAN).is_err());
    }

    #[test]
    fn test_i16_values() {
        assert_eq!(encode_i16(0.5).unwrap(), 16384);
        assert_eq!(encode_i16(1.0).unwrap(), 32767);
        assert_eq!(encode_i16(-1.0).unwrap(), -32768);
        assert!((decode_i16(encode_i16(-0.25).unwrap()) + 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_phase_wraps() {
        assert_eq!(encode_phase(0.25).unwrap(), 250_000_000);
        assert_eq!(encode_phase(1.25).unwrap(), 250_000_000);
        assert_eq!(encode_phase(-0.25).unwrap(), 750_000_000);
        assert_eq!(encode_phase(0.9999999999).unwrap(), 0);
    }

    #[test]
    fn test_frequency() {
        assert_eq!(encode_frequency(100e6).unwrap(), 400_000_000);
        assert_eq!(encode_frequency(-1.0).unwrap(), (-4i32) as u32);
        assert!(encode_frequency(600e6).is_err());
    }
}
