//! MIDI file serialization engine
//!
//! Takes an abstract sequence of musical events (notes, tempo changes,
//! program changes, controller events, track names, SysEx payloads) and
//! produces a byte-exact Standard MIDI Format 1 file. The pipeline per
//! track: duplicate removal, expansion of notes into on/off pairs,
//! de-interleaving of overlapping notes, rebasing to a file-wide time
//! origin, and delta-time encoding with rounding-error feedback.

pub mod error;
pub mod event;
pub mod file;
pub mod frequency;
pub mod score;
pub mod track;
pub mod vlq;

pub use error::{MidiError, Result};
pub use event::{MidiEvent, MidiEventKind, ScoreEvent};
pub use file::{MidiFile, MidiHeader};
pub use score::{load_score, render_score, validate_score, Score};
pub use track::MidiTrack;

/// Number of MIDI ticks per beat (quarter note). Chosen for adequate
/// temporal resolution; every beat-denominated time is scaled by this
/// constant during track expansion.
pub const TICKS_PER_BEAT: u16 = 960;
