//! MTS frequency encoding
//!
//! The MIDI Tuning Standard expresses a frequency as a semitone number
//! plus a 14-bit fraction of a semitone, packed into three 7-bit bytes.
//! Used by the change-tuning Universal SysEx message.

/// 14-bit fractional resolution of the MTS encoding.
const RESOLUTION: f64 = 16384.0;

/// Relative tolerance of the round trip through the 3-byte encoding.
pub const ROUND_TRIP_EPSILON: f64 = 1e-6;

/// Whether a frequency fits the MTS encoding: its semitone number must
/// land in 0-127. Frequencies outside that window would wrap the
/// semitone byte past seven bits and corrupt the SysEx body, so callers
/// must reject them before encoding.
pub fn is_encodable(freq: f64) -> bool {
    if !freq.is_finite() || freq <= 0.0 {
        return false;
    }
    let semitones = 69.0 + 12.0 * (freq / 440.0).log2();
    (0.0..128.0).contains(&semitones)
}

/// Transform a frequency in Hz into the 3-byte MTS tuning encoding.
///
/// The first byte is the equal-tempered semitone at or below the
/// frequency (A440 = 69); the remaining two bytes carry the cents
/// offset from that semitone as a 14-bit fraction, high bits first.
/// The triple (0x7F, 0x7F, 0x7F) is reserved by the standard, so the
/// low byte is forced to 0x7E in that one case.
///
/// The frequency must satisfy [`is_encodable`]; outside that window
/// the semitone byte does not fit seven bits.
pub fn frequency_to_bytes(freq: f64) -> [u8; 3] {
    let semitones = 69.0 + 12.0 * (freq / 440.0).log2();
    let first_byte = semitones as i64;
    let lower_freq = 440.0 * 2f64.powf((first_byte as f64 - 69.0) / 12.0);
    let cent_dif = if freq != lower_freq {
        1200.0 * (freq / lower_freq).log2()
    } else {
        0.0
    };
    let cents = (cent_dif / 100.0 * RESOLUTION).round();

    let second_byte = ((cents as i64) >> 7).min(0x7F);
    let mut third_byte = ((cents - (second_byte << 7) as f64).min(127.0)) as i64;
    if third_byte == 0x7F && second_byte == 0x7F && first_byte == 0x7F {
        third_byte = 0x7E;
    }

    [first_byte as u8, second_byte as u8, third_byte as u8]
}

/// The inverse of [`frequency_to_bytes`]: recover the frequency in Hz.
pub fn bytes_to_frequency(freq_bytes: [u8; 3]) -> f64 {
    let base_frequency = 440.0 * 2f64.powf((freq_bytes[0] as f64 - 69.0) / 12.0);
    let frac =
        (((freq_bytes[1] as u32) << 7) + freq_bytes[2] as u32) as f64 * 100.0 / RESOLUTION;
    base_frequency * 2f64.powf(frac / 1200.0)
}
