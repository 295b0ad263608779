//! Score description files
//!
//! The CLI renders a JSON *score description* into a MIDI file. The
//! description is a declarative mirror of the insertion API: a list of
//! tracks, each carrying notes, tempo changes, controller events, SysEx
//! payloads and tunings. Times and durations are in beats throughout.

use serde::{Deserialize, Serialize};

use crate::error::{MidiError, Result};
use crate::file::MidiFile;

/// Top-level score description.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Score {
    /// Drop structurally identical events at track close.
    pub remove_duplicates: bool,
    /// Untangle overlapping same-pitch notes so their on/off pairs nest.
    pub deinterleave: bool,
    /// If set, rebase the whole score so the earliest event starts at
    /// this beat.
    pub start_at: Option<f64>,
    pub tracks: Vec<TrackSpec>,
}

impl Default for Score {
    fn default() -> Self {
        Score {
            remove_duplicates: true,
            deinterleave: true,
            start_at: None,
            tracks: Vec::new(),
        }
    }
}

/// One track of the score.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackSpec {
    /// Track name meta event, written at beat 0.
    pub name: Option<String>,
    /// Default MIDI channel for the track's events.
    pub channel: u8,
    /// Program (instrument) number, set at beat 0 when present.
    pub program: Option<u8>,
    pub tempos: Vec<TempoSpec>,
    pub notes: Vec<NoteSpec>,
    pub controllers: Vec<ControllerSpec>,
    pub sysex: Vec<SysExSpec>,
    pub tunings: Vec<TuningSpec>,
}

impl Default for TrackSpec {
    fn default() -> Self {
        TrackSpec {
            name: None,
            channel: 0,
            program: None,
            tempos: Vec::new(),
            notes: Vec::new(),
            controllers: Vec::new(),
            sysex: Vec::new(),
            tunings: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TempoSpec {
    pub time: f64,
    pub bpm: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteSpec {
    pub pitch: u8,
    pub time: f64,
    pub duration: f64,
    #[serde(default = "default_volume")]
    pub volume: u8,
    /// Overrides the track channel when set.
    pub channel: Option<u8>,
    pub annotation: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerSpec {
    pub time: f64,
    /// Controller number, e.g. 0x0A for pan.
    pub controller_type: u8,
    pub value: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SysExSpec {
    pub time: f64,
    pub manufacturer_id: u8,
    pub payload: Vec<u8>,
}

/// A note-to-frequency assignment for the MTS change-tuning message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuningSpec {
    pub pitch: u8,
    pub frequency: f64,
}

fn default_volume() -> u8 {
    100
}

/// Load and validate a score description from a JSON file.
pub fn load_score<P: AsRef<std::path::Path>>(path: P) -> Result<Score> {
    let content = std::fs::read_to_string(path)?;
    let score: Score = serde_json::from_str(&content)?;
    validate_score(&score)?;
    Ok(score)
}

/// Validate the ranges a score must satisfy before rendering, with the
/// offending track named in the message.
pub fn validate_score(score: &Score) -> Result<()> {
    if score.tracks.is_empty() {
        return Err(MidiError::ScoreParseError(
            "score has no tracks".to_string(),
        ));
    }
    if score.tracks.len() > u16::MAX as usize {
        return Err(MidiError::ScoreParseError(format!(
            "score has {} tracks; a MIDI file holds at most {}",
            score.tracks.len(),
            u16::MAX
        )));
    }

    for (index, track) in score.tracks.iter().enumerate() {
        if track.channel > 15 {
            return Err(MidiError::ScoreParseError(format!(
                "track {}: channel must be 0-15, got {}",
                index, track.channel
            )));
        }
        if let Some(program) = track.program {
            if program > 127 {
                return Err(MidiError::ScoreParseError(format!(
                    "track {}: program must be 0-127, got {}",
                    index, program
                )));
            }
        }
        for tempo in &track.tempos {
            if !(tempo.bpm > 0.0) || !tempo.bpm.is_finite() {
                return Err(MidiError::ScoreParseError(format!(
                    "track {}: tempo must be a positive BPM, got {}",
                    index, tempo.bpm
                )));
            }
            if tempo.time < 0.0 {
                return Err(MidiError::ScoreParseError(format!(
                    "track {}: tempo change at negative beat {}",
                    index, tempo.time
                )));
            }
        }
        for note in &track.notes {
            if note.pitch > 127 || note.volume > 127 {
                return Err(MidiError::ScoreParseError(format!(
                    "track {}: note pitch and volume must be 0-127 (pitch {}, volume {})",
                    index, note.pitch, note.volume
                )));
            }
            if !(note.duration > 0.0) || note.time < 0.0 {
                return Err(MidiError::ScoreParseError(format!(
                    "track {}: note at beat {} needs a non-negative time and positive duration",
                    index, note.time
                )));
            }
        }
        for controller in &track.controllers {
            if controller.value > 127 {
                return Err(MidiError::ScoreParseError(format!(
                    "track {}: controller value must be 0-127, got {}",
                    index, controller.value
                )));
            }
            if controller.time < 0.0 {
                return Err(MidiError::ScoreParseError(format!(
                    "track {}: controller event at negative beat {}",
                    index, controller.time
                )));
            }
        }
        for sysex in &track.sysex {
            if sysex.time < 0.0 {
                return Err(MidiError::ScoreParseError(format!(
                    "track {}: SysEx event at negative beat {}",
                    index, sysex.time
                )));
            }
        }
        for tuning in &track.tunings {
            if tuning.pitch > 127 {
                return Err(MidiError::ScoreParseError(format!(
                    "track {}: tuned note number must be 0-127, got {}",
                    index, tuning.pitch
                )));
            }
            if !crate::frequency::is_encodable(tuning.frequency) {
                return Err(MidiError::ScoreParseError(format!(
                    "track {}: tuning frequency {} Hz is outside the MTS-encodable range",
                    index, tuning.frequency
                )));
            }
        }
    }

    Ok(())
}

/// Build a [`MidiFile`] from a validated score description.
pub fn render_score(score: &Score) -> Result<MidiFile> {
    let mut file = MidiFile::with_options(
        score.tracks.len() as u16,
        score.remove_duplicates,
        score.deinterleave,
    );

    for (index, track) in score.tracks.iter().enumerate() {
        if let Some(name) = &track.name {
            file.add_track_name(index, 0.0, name)?;
        }
        if let Some(program) = track.program {
            file.add_program_change(index, track.channel, 0.0, program)?;
        }
        for tempo in &track.tempos {
            file.add_tempo(index, tempo.time, tempo.bpm)?;
        }
        for note in &track.notes {
            file.add_note(
                index,
                note.channel.unwrap_or(track.channel),
                note.pitch,
                note.time,
                note.duration,
                note.volume,
                note.annotation.clone(),
            )?;
        }
        for controller in &track.controllers {
            file.add_controller_event(
                index,
                track.channel,
                controller.time,
                controller.controller_type,
                controller.value,
            )?;
        }
        for sysex in &track.sysex {
            file.add_sys_ex(index, sysex.time, sysex.manufacturer_id, sysex.payload.clone())?;
        }
        if !track.tunings.is_empty() {
            let tunings: Vec<(u8, f64)> = track
                .tunings
                .iter()
                .map(|t| (t.pitch, t.frequency))
                .collect();
            file.change_note_tuning(index, &tunings, 0x7F, false, 0)?;
        }
    }

    if let Some(offset) = score.start_at {
        file.shift_tracks(offset);
    }

    Ok(file)
}

/// A small two-track example score, used by the CLI's `show-score`
/// command as a starting template.
pub fn example_score() -> Score {
    Score {
        remove_duplicates: true,
        deinterleave: true,
        start_at: None,
        tracks: vec![
            TrackSpec {
                name: Some("Lead".to_string()),
                channel: 0,
                program: Some(0),
                tempos: vec![TempoSpec {
                    time: 0.0,
                    bpm: 120.0,
                }],
                notes: vec![
                    NoteSpec {
                        pitch: 60,
                        time: 0.0,
                        duration: 1.0,
                        volume: 100,
                        channel: None,
                        annotation: None,
                    },
                    NoteSpec {
                        pitch: 64,
                        time: 1.0,
                        duration: 1.0,
                        volume: 100,
                        channel: None,
                        annotation: None,
                    },
                    NoteSpec {
                        pitch: 67,
                        time: 2.0,
                        duration: 2.0,
                        volume: 110,
                        channel: None,
                        annotation: Some("hold".to_string()),
                    },
                ],
                controllers: vec![ControllerSpec {
                    time: 0.0,
                    controller_type: 0x0A,
                    value: 64,
                }],
                sysex: Vec::new(),
                tunings: Vec::new(),
            },
            TrackSpec {
                name: Some("Bass".to_string()),
                channel: 1,
                program: Some(32),
                tempos: Vec::new(),
                notes: vec![NoteSpec {
                    pitch: 36,
                    time: 0.0,
                    duration: 4.0,
                    volume: 90,
                    channel: None,
                    annotation: None,
                }],
                controllers: Vec::new(),
                sysex: Vec::new(),
                tunings: Vec::new(),
            },
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn example_score_validates_and_renders() {
        let score = example_score();
        validate_score(&score).unwrap();
        let mut file = render_score(&score).unwrap();
        let mut bytes = Vec::new();
        file.write_file(&mut bytes).unwrap();
        assert_eq!(&bytes[0..4], b"MThd");
    }

    #[test]
    fn empty_score_is_rejected() {
        let score = Score::default();
        let err = validate_score(&score).unwrap_err();
        assert!(matches!(err, MidiError::ScoreParseError(_)));
    }

    #[test]
    fn out_of_range_note_is_reported_with_track_index() {
        let mut score = example_score();
        score.tracks[1].notes[0].pitch = 200;
        let err = validate_score(&score).unwrap_err();
        assert!(err.to_string().contains("track 1"));
    }
}
