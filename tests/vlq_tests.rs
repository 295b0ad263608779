//! Validation tests for the variable-length quantity codec

use midiwriter::vlq::{read_var_length, write_var_length};

/// Boundary values at every encoded-length transition, plus the ends.
const BOUNDARIES: [u32; 9] = [
    0,
    1,
    0x7F,
    0x80,
    0x3FFF,
    0x4000,
    0x1F_FFFF,
    0x20_0000,
    0x0FFF_FFFF,
];

#[test]
fn round_trip_at_length_boundaries() {
    for &n in &BOUNDARIES {
        let encoded = write_var_length(n as f64);
        let (decoded, consumed) = read_var_length(&encoded, 0).unwrap();
        assert_eq!(decoded, n, "value {} did not survive the round trip", n);
        assert_eq!(
            consumed,
            encoded.len(),
            "value {} decoded with the wrong byte count",
            n
        );
    }
}

#[test]
fn round_trip_over_sampled_range() {
    // A coarse sweep of the 28-bit range; the stride is prime so byte
    // boundaries are not systematically skipped.
    let mut n: u64 = 0;
    while n <= 0x0FFF_FFFF {
        let encoded = write_var_length(n as f64);
        let (decoded, consumed) = read_var_length(&encoded, 0).unwrap();
        assert_eq!(decoded as u64, n);
        assert_eq!(consumed, encoded.len());
        n += 99_991;
    }
}

#[test]
fn encoded_length_matches_value_magnitude() {
    assert_eq!(write_var_length(0x7F as f64).len(), 1);
    assert_eq!(write_var_length(0x80 as f64).len(), 2);
    assert_eq!(write_var_length(0x3FFF as f64).len(), 2);
    assert_eq!(write_var_length(0x4000 as f64).len(), 3);
    assert_eq!(write_var_length(0x1F_FFFF as f64).len(), 3);
    assert_eq!(write_var_length(0x20_0000 as f64).len(), 4);
}

#[test]
fn continuation_bits_are_set_on_all_but_last_byte() {
    let encoded = write_var_length(0x0FFF_FFFF as f64);
    for byte in &encoded[..encoded.len() - 1] {
        assert!(byte & 0x80 != 0);
    }
    assert!(encoded[encoded.len() - 1] & 0x80 == 0);
}

#[test]
fn decode_respects_offset() {
    let mut buffer = vec![0xAA, 0xBB];
    buffer.extend(write_var_length(960.0));
    let (value, consumed) = read_var_length(&buffer, 2).unwrap();
    assert_eq!(value, 960);
    assert_eq!(consumed, 2);
}
