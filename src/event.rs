//! Event model
//!
//! Two layers of events exist. [`ScoreEvent`] is the high-level record a
//! caller appends to a track: times are in beats, notes carry a
//! duration. [`MidiEvent`] is the low-level timed record produced by
//! track expansion: times are in absolute ticks (later rewritten to
//! deltas), a note has become a NoteOn/NoteOff pair, and each event
//! carries an ordinal used only to break ties between events at the
//! same tick.

use std::hash::{Hash, Hasher};

/// High-level event as inserted by the caller. Times and durations are
/// in beats.
///
/// Equality is variant-aware and deliberately partial: it compares the
/// variant, the time, and the fields that identify the event on the
/// wire, so that the duplicate filter treats e.g. two notes with the
/// same pitch, channel and start time as one event regardless of
/// duration or volume. `Hash` agrees with this equality.
#[derive(Debug, Clone)]
pub enum ScoreEvent {
    Note {
        channel: u8,
        pitch: u8,
        time: f64,
        duration: f64,
        volume: u8,
        annotation: Option<String>,
    },
    /// Tempo change; `tempo` is stored in microseconds per beat,
    /// converted from BPM at insertion time.
    Tempo { time: f64, tempo: u32 },
    ProgramChange { channel: u8, time: f64, program: u8 },
    ControllerEvent {
        channel: u8,
        time: f64,
        controller_type: u8,
        value: u8,
    },
    TrackName { time: f64, name: String },
    SysEx {
        time: f64,
        manufacturer_id: u8,
        payload: Vec<u8>,
    },
    UniversalSysEx {
        time: f64,
        real_time: bool,
        sysex_channel: u8,
        code: u8,
        subcode: u8,
        payload: Vec<u8>,
    },
}

impl ScoreEvent {
    /// Event time in beats.
    pub fn time(&self) -> f64 {
        match self {
            ScoreEvent::Note { time, .. }
            | ScoreEvent::Tempo { time, .. }
            | ScoreEvent::ProgramChange { time, .. }
            | ScoreEvent::ControllerEvent { time, .. }
            | ScoreEvent::TrackName { time, .. }
            | ScoreEvent::SysEx { time, .. }
            | ScoreEvent::UniversalSysEx { time, .. } => *time,
        }
    }

    /// Shift the event time by `delta` beats.
    pub fn shift_time(&mut self, delta: f64) {
        match self {
            ScoreEvent::Note { time, .. }
            | ScoreEvent::Tempo { time, .. }
            | ScoreEvent::ProgramChange { time, .. }
            | ScoreEvent::ControllerEvent { time, .. }
            | ScoreEvent::TrackName { time, .. }
            | ScoreEvent::SysEx { time, .. }
            | ScoreEvent::UniversalSysEx { time, .. } => *time += delta,
        }
    }

    /// Variant tag used by the hash; must be distinct per variant.
    fn tag(&self) -> u8 {
        match self {
            ScoreEvent::Note { .. } => 0,
            ScoreEvent::Tempo { .. } => 1,
            ScoreEvent::ProgramChange { .. } => 2,
            ScoreEvent::ControllerEvent { .. } => 3,
            ScoreEvent::TrackName { .. } => 4,
            ScoreEvent::SysEx { .. } => 5,
            ScoreEvent::UniversalSysEx { .. } => 6,
        }
    }
}

impl PartialEq for ScoreEvent {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                ScoreEvent::Note {
                    channel: c1,
                    pitch: p1,
                    time: t1,
                    ..
                },
                ScoreEvent::Note {
                    channel: c2,
                    pitch: p2,
                    time: t2,
                    ..
                },
            ) => t1 == t2 && p1 == p2 && c1 == c2,
            (
                ScoreEvent::Tempo { time: t1, tempo: v1 },
                ScoreEvent::Tempo { time: t2, tempo: v2 },
            ) => t1 == t2 && v1 == v2,
            (
                ScoreEvent::ProgramChange {
                    channel: c1,
                    time: t1,
                    program: p1,
                },
                ScoreEvent::ProgramChange {
                    channel: c2,
                    time: t2,
                    program: p2,
                },
            ) => t1 == t2 && p1 == p2 && c1 == c2,
            (
                ScoreEvent::ControllerEvent {
                    channel: c1,
                    time: t1,
                    controller_type: ty1,
                    value: v1,
                },
                ScoreEvent::ControllerEvent {
                    channel: c2,
                    time: t2,
                    controller_type: ty2,
                    value: v2,
                },
            ) => t1 == t2 && ty1 == ty2 && v1 == v2 && c1 == c2,
            (
                ScoreEvent::TrackName { time: t1, name: n1 },
                ScoreEvent::TrackName { time: t2, name: n2 },
            ) => t1 == t2 && n1 == n2,
            (
                ScoreEvent::SysEx {
                    time: t1,
                    manufacturer_id: m1,
                    ..
                },
                ScoreEvent::SysEx {
                    time: t2,
                    manufacturer_id: m2,
                    ..
                },
            ) => t1 == t2 && m1 == m2,
            (
                ScoreEvent::UniversalSysEx {
                    time: t1,
                    sysex_channel: s1,
                    code: c1,
                    subcode: sc1,
                    ..
                },
                ScoreEvent::UniversalSysEx {
                    time: t2,
                    sysex_channel: s2,
                    code: c2,
                    subcode: sc2,
                    ..
                },
            ) => t1 == t2 && c1 == c2 && sc1 == sc2 && s1 == s2,
            _ => false,
        }
    }
}

// Times are validated finite and non-negative at insertion, so the
// float comparison above is reflexive in practice.
impl Eq for ScoreEvent {}

impl Hash for ScoreEvent {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Only fields that participate in equality may feed the hash.
        // Time is hashed by its integer part so that any two equal
        // times hash equal.
        self.tag().hash(state);
        (self.time() as i64).hash(state);
        match self {
            ScoreEvent::Note { channel, pitch, .. } => {
                pitch.hash(state);
                channel.hash(state);
            }
            ScoreEvent::Tempo { tempo, .. } => tempo.hash(state),
            ScoreEvent::ProgramChange {
                channel, program, ..
            } => {
                program.hash(state);
                channel.hash(state);
            }
            ScoreEvent::ControllerEvent {
                channel,
                controller_type,
                value,
                ..
            } => {
                controller_type.hash(state);
                value.hash(state);
                channel.hash(state);
            }
            ScoreEvent::TrackName { name, .. } => name.hash(state),
            ScoreEvent::SysEx {
                manufacturer_id, ..
            } => manufacturer_id.hash(state),
            ScoreEvent::UniversalSysEx {
                sysex_channel,
                code,
                subcode,
                ..
            } => {
                code.hash(state);
                subcode.hash(state);
                sysex_channel.hash(state);
            }
        }
    }
}

/// Low-level timed MIDI event, produced by track expansion.
///
/// `time` holds absolute ticks until the file-level rebase converts the
/// whole list to delta times; the stream writer then folds its rounding
/// feedback into the same field.
#[derive(Debug, Clone, PartialEq)]
pub struct MidiEvent {
    pub time: f64,
    /// Tie-break rank for events on the same tick: lower writes first.
    pub ord: u8,
    pub kind: MidiEventKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MidiEventKind {
    NoteOn { channel: u8, pitch: u8, volume: u8 },
    NoteOff { channel: u8, pitch: u8, volume: u8 },
    Tempo { tempo: u32 },
    ProgramChange { channel: u8, program: u8 },
    ControllerEvent {
        channel: u8,
        controller_type: u8,
        value: u8,
    },
    TrackName { name: String },
    SysEx {
        manufacturer_id: u8,
        payload: Vec<u8>,
    },
    UniversalSysEx {
        real_time: bool,
        sysex_channel: u8,
        code: u8,
        subcode: u8,
        payload: Vec<u8>,
    },
}

impl MidiEventKind {
    /// Tie-break ordinal: track names first, then other metadata and
    /// SysEx, then NoteOffs, then NoteOns and tempo changes. Keeps
    /// same-tick output deterministic and note-offs ahead of note-ons.
    pub fn ordinal(&self) -> u8 {
        match self {
            MidiEventKind::TrackName { .. } => 0,
            MidiEventKind::ProgramChange { .. }
            | MidiEventKind::ControllerEvent { .. }
            | MidiEventKind::SysEx { .. }
            | MidiEventKind::UniversalSysEx { .. } => 1,
            MidiEventKind::NoteOff { .. } => 2,
            MidiEventKind::NoteOn { .. } | MidiEventKind::Tempo { .. } => 3,
        }
    }
}

impl MidiEvent {
    pub fn new(time: f64, kind: MidiEventKind) -> Self {
        let ord = kind.ordinal();
        MidiEvent { time, ord, kind }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(event: &ScoreEvent) -> u64 {
        let mut hasher = DefaultHasher::new();
        event.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn note_equality_ignores_duration_and_volume() {
        let a = ScoreEvent::Note {
            channel: 0,
            pitch: 60,
            time: 1.0,
            duration: 1.0,
            volume: 100,
            annotation: None,
        };
        let b = ScoreEvent::Note {
            channel: 0,
            pitch: 60,
            time: 1.0,
            duration: 2.0,
            volume: 50,
            annotation: Some("staccato".to_string()),
        };
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn different_variants_never_compare_equal() {
        let note = ScoreEvent::Note {
            channel: 0,
            pitch: 60,
            time: 0.0,
            duration: 1.0,
            volume: 100,
            annotation: None,
        };
        let tempo = ScoreEvent::Tempo {
            time: 0.0,
            tempo: 500_000,
        };
        assert_ne!(note, tempo);
    }

    #[test]
    fn sysex_equality_ignores_payload() {
        let a = ScoreEvent::SysEx {
            time: 0.0,
            manufacturer_id: 0x41,
            payload: vec![1, 2, 3],
        };
        let b = ScoreEvent::SysEx {
            time: 0.0,
            manufacturer_id: 0x41,
            payload: vec![9, 9],
        };
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn ordinals_order_metadata_before_notes() {
        let name = MidiEventKind::TrackName {
            name: "lead".to_string(),
        };
        let off = MidiEventKind::NoteOff {
            channel: 0,
            pitch: 60,
            volume: 100,
        };
        let on = MidiEventKind::NoteOn {
            channel: 0,
            pitch: 60,
            volume: 100,
        };
        assert!(name.ordinal() < off.ordinal());
        assert!(off.ordinal() < on.ordinal());
    }
}
