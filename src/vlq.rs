//! MIDI variable-length quantity codec
//!
//! Delta times and meta/SysEx payload lengths are stored in the file as
//! variable-length quantities: 7 data bits per byte, most significant
//! group first, high bit set on every byte except the last. MIDI tick
//! values fit in 4 bytes (28 data bits).

use crate::error::{MidiError, Result};

/// Maximum number of bytes in a valid variable-length quantity.
pub const MAX_VLQ_BYTES: usize = 4;

/// Encode a tick count as a MIDI variable-length quantity.
///
/// The input is rounded to the nearest integer before encoding (ties
/// round up); pipeline times are floats carrying sub-tick precision
/// until this point. Zero encodes as a single zero byte. Negative
/// inputs clamp to zero, which is where the stream writer's rounding
/// feedback can briefly push a delta.
pub fn write_var_length(value: f64) -> Vec<u8> {
    let mut input = (value + 0.5) as u32;

    let mut output = vec![(input & 0x7F) as u8];
    input >>= 7;
    while input > 0 {
        output.push((input & 0x7F | 0x80) as u8);
        input >>= 7;
    }

    output.reverse();
    output
}

/// Decode a variable-length quantity starting at `offset`.
///
/// Returns the decoded value and the number of bytes consumed. Fails
/// with `MalformedVarLength` if the buffer ends before a terminating
/// byte (high bit clear) or if more than 4 bytes carry the continuation
/// bit.
pub fn read_var_length(buffer: &[u8], offset: usize) -> Result<(u32, usize)> {
    let mut value: u32 = 0;
    let mut bytes_read = 0;

    loop {
        let byte = match buffer.get(offset + bytes_read) {
            Some(&b) => b,
            None => {
                return Err(MidiError::MalformedVarLength(format!(
                    "buffer ended after {} byte(s) with continuation bit still set",
                    bytes_read
                )));
            }
        };
        bytes_read += 1;
        if bytes_read > MAX_VLQ_BYTES {
            return Err(MidiError::MalformedVarLength(format!(
                "more than {} bytes in sequence",
                MAX_VLQ_BYTES
            )));
        }

        value = (value << 7) | (byte & 0x7F) as u32;
        if byte & 0x80 == 0 {
            break;
        }
    }

    Ok((value, bytes_read))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_a_single_byte() {
        assert_eq!(write_var_length(0.0), vec![0x00]);
    }

    #[test]
    fn rounding_ties_go_up() {
        assert_eq!(write_var_length(0.5), vec![0x01]);
        assert_eq!(write_var_length(0.49), vec![0x00]);
        assert_eq!(write_var_length(-0.3), vec![0x00]);
    }

    #[test]
    fn well_known_encodings() {
        // Reference values from the SMF specification
        assert_eq!(write_var_length(0x40 as f64), vec![0x40]);
        assert_eq!(write_var_length(0x7F as f64), vec![0x7F]);
        assert_eq!(write_var_length(0x80 as f64), vec![0x81, 0x00]);
        assert_eq!(write_var_length(960.0), vec![0x87, 0x40]);
        assert_eq!(write_var_length(0x0FFF_FFFF as f64), vec![0xFF, 0xFF, 0xFF, 0x7F]);
    }

    #[test]
    fn truncated_sequence_is_rejected() {
        let err = read_var_length(&[0x81], 0).unwrap_err();
        assert!(matches!(err, MidiError::MalformedVarLength(_)));
    }

    #[test]
    fn overlong_sequence_is_rejected() {
        let err = read_var_length(&[0x81, 0x81, 0x81, 0x81, 0x01], 0).unwrap_err();
        assert!(matches!(err, MidiError::MalformedVarLength(_)));
    }
}
