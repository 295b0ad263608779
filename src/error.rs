//! Error types for the MIDI writer

use std::fmt;

/// Custom error type for MIDI file construction
#[derive(Debug, Clone)]
pub enum MidiError {
    /// E001: Event parameter outside its MIDI range (pitch/volume/program
    /// 0-127, channel 0-15, positive times and durations)
    OutOfRangeValue(String),
    /// E002: NoteOff without a matching pending NoteOn on its pitch+channel
    UnbalancedNoteEvents(String),
    /// E003: Truncated or over-long variable-length quantity
    MalformedVarLength(String),
    /// E004: Event of an unrecognized kind reached the serializer
    UnknownEventVariant(String),
    /// E005: Score description failed to parse or validate
    ScoreParseError(String),
    /// E006: File I/O error
    FileIoError(String),
}

impl fmt::Display for MidiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MidiError::OutOfRangeValue(msg) => {
                write!(f, "E001: Value out of range - {}", msg)
            }
            MidiError::UnbalancedNoteEvents(msg) => {
                write!(f, "E002: Unbalanced note events - {}", msg)
            }
            MidiError::MalformedVarLength(msg) => {
                write!(f, "E003: Malformed variable-length quantity - {}", msg)
            }
            MidiError::UnknownEventVariant(msg) => {
                write!(f, "E004: Unknown event variant - {}", msg)
            }
            MidiError::ScoreParseError(msg) => {
                write!(f, "E005: Score description error - {}", msg)
            }
            MidiError::FileIoError(msg) => {
                write!(f, "E006: File I/O error - {}", msg)
            }
        }
    }
}

impl std::error::Error for MidiError {}

// From implementations for common error types
impl From<std::io::Error> for MidiError {
    fn from(err: std::io::Error) -> Self {
        MidiError::FileIoError(format!("File I/O error: {}", err))
    }
}

impl From<serde_json::Error> for MidiError {
    fn from(err: serde_json::Error) -> Self {
        MidiError::ScoreParseError(format!("JSON error: {}", err))
    }
}

/// Result type alias for MIDI writer operations
pub type Result<T> = std::result::Result<T, MidiError>;
