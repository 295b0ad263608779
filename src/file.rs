//! MIDI file assembly
//!
//! [`MidiFile`] owns a fixed set of tracks and the header descriptor,
//! exposes the event-insertion API (with range validation), and drives
//! the close sequence: close every track, sort, find the file-wide time
//! origin, rebase each track to delta times, and encode each track's
//! byte stream. `write_file` then emits header and track chunks in
//! order.

use std::io::Write;

use crate::error::{MidiError, Result};
use crate::event::ScoreEvent;
use crate::track::MidiTrack;
use crate::TICKS_PER_BEAT;

/// The MIDI file header chunk: `MThd`, length 6, format 1, track
/// count, ticks per beat.
#[derive(Debug, Clone)]
pub struct MidiHeader {
    num_tracks: u16,
}

impl MidiHeader {
    pub fn new(num_tracks: u16) -> Self {
        MidiHeader { num_tracks }
    }

    pub fn write<W: Write>(&self, sink: &mut W) -> Result<()> {
        sink.write_all(b"MThd")?;
        sink.write_all(&6u32.to_be_bytes())?;
        sink.write_all(&1u16.to_be_bytes())?; // format 1: multi-track
        sink.write_all(&self.num_tracks.to_be_bytes())?;
        sink.write_all(&TICKS_PER_BEAT.to_be_bytes())?;
        Ok(())
    }
}

/// A complete, well-formed Standard MIDI Format 1 file under
/// construction.
#[derive(Debug, Clone)]
pub struct MidiFile {
    header: MidiHeader,
    tracks: Vec<MidiTrack>,
    closed: bool,
}

impl MidiFile {
    /// Create a file with `num_tracks` tracks, duplicate removal and
    /// note de-interleaving both enabled.
    pub fn new(num_tracks: u16) -> Self {
        Self::with_options(num_tracks, true, true)
    }

    /// Create a file with explicit pipeline options. `remove_duplicates`
    /// drops structurally identical events at track close;
    /// `deinterleave` untangles overlapping same-pitch notes so their
    /// on/off pairs nest.
    pub fn with_options(num_tracks: u16, remove_duplicates: bool, deinterleave: bool) -> Self {
        let tracks = (0..num_tracks)
            .map(|_| MidiTrack::new(remove_duplicates, deinterleave))
            .collect();

        MidiFile {
            header: MidiHeader::new(num_tracks),
            tracks,
            closed: false,
        }
    }

    pub fn num_tracks(&self) -> u16 {
        self.tracks.len() as u16
    }

    pub fn track(&self, track: usize) -> Option<&MidiTrack> {
        self.tracks.get(track)
    }

    fn track_mut(&mut self, track: usize) -> Result<&mut MidiTrack> {
        let count = self.tracks.len();
        self.tracks.get_mut(track).ok_or_else(|| {
            MidiError::OutOfRangeValue(format!(
                "track index {} out of range (file has {} tracks)",
                track, count
            ))
        })
    }

    /// Add a note. `time` and `duration` are in beats; `pitch` and
    /// `volume` (velocity) are 0-127; `channel` is 0-15. The optional
    /// annotation is carried on the event but never serialized.
    pub fn add_note(
        &mut self,
        track: usize,
        channel: u8,
        pitch: u8,
        time: f64,
        duration: f64,
        volume: u8,
        annotation: Option<String>,
    ) -> Result<()> {
        check_data_byte("pitch", pitch)?;
        check_data_byte("volume", volume)?;
        check_channel(channel)?;
        check_time(time)?;
        if !(duration > 0.0) || !duration.is_finite() {
            return Err(MidiError::OutOfRangeValue(format!(
                "duration must be a positive number of beats, got {}",
                duration
            )));
        }

        self.track_mut(track)?.add_event(ScoreEvent::Note {
            channel,
            pitch,
            time,
            duration,
            volume,
            annotation,
        });
        Ok(())
    }

    /// Add a tempo change at `time`, in beats per minute. The stored
    /// value is microseconds per beat.
    pub fn add_tempo(&mut self, track: usize, time: f64, bpm: f64) -> Result<()> {
        check_time(time)?;
        if !(bpm > 0.0) || !bpm.is_finite() {
            return Err(MidiError::OutOfRangeValue(format!(
                "tempo must be a positive BPM value, got {}",
                bpm
            )));
        }

        let tempo = (60_000_000.0 / bpm).round() as u32;
        self.track_mut(track)?
            .add_event(ScoreEvent::Tempo { time, tempo });
        Ok(())
    }

    /// Add a program (instrument) change.
    pub fn add_program_change(
        &mut self,
        track: usize,
        channel: u8,
        time: f64,
        program: u8,
    ) -> Result<()> {
        check_data_byte("program", program)?;
        check_channel(channel)?;
        check_time(time)?;

        self.track_mut(track)?.add_event(ScoreEvent::ProgramChange {
            channel,
            time,
            program,
        });
        Ok(())
    }

    /// Add a controller (CC) event, e.g. type 0x0A for pan.
    pub fn add_controller_event(
        &mut self,
        track: usize,
        channel: u8,
        time: f64,
        controller_type: u8,
        value: u8,
    ) -> Result<()> {
        check_data_byte("controller value", value)?;
        check_channel(channel)?;
        check_time(time)?;

        self.track_mut(track)?.add_event(ScoreEvent::ControllerEvent {
            channel,
            time,
            controller_type,
            value,
        });
        Ok(())
    }

    /// Add a track name meta event.
    pub fn add_track_name(&mut self, track: usize, time: f64, name: &str) -> Result<()> {
        check_time(time)?;

        self.track_mut(track)?.add_event(ScoreEvent::TrackName {
            time,
            name: name.to_string(),
        });
        Ok(())
    }

    /// Add a manufacturer-specific SysEx event. The payload is written
    /// verbatim between the manufacturer id and the 0xF7 terminator.
    pub fn add_sys_ex(
        &mut self,
        track: usize,
        time: f64,
        manufacturer_id: u8,
        payload: Vec<u8>,
    ) -> Result<()> {
        check_time(time)?;

        self.track_mut(track)?.add_event(ScoreEvent::SysEx {
            time,
            manufacturer_id,
            payload,
        });
        Ok(())
    }

    /// Add a Universal SysEx event. `sysex_channel` defaults to 0x7F
    /// ("all devices") at the call sites that do not care.
    #[allow(clippy::too_many_arguments)]
    pub fn add_universal_sys_ex(
        &mut self,
        track: usize,
        time: f64,
        code: u8,
        subcode: u8,
        payload: Vec<u8>,
        sysex_channel: u8,
        real_time: bool,
    ) -> Result<()> {
        check_time(time)?;

        self.track_mut(track)?.add_event(ScoreEvent::UniversalSysEx {
            time,
            real_time,
            sysex_channel,
            code,
            subcode,
            payload,
        });
        Ok(())
    }

    /// Change the tuning of MIDI notes via the MTS change-tuning
    /// Universal SysEx message. `tunings` pairs a note number with the
    /// frequency in Hz it should sound at.
    ///
    /// Note that many players do not implement this part of the
    /// standard.
    pub fn change_note_tuning(
        &mut self,
        track: usize,
        tunings: &[(u8, f64)],
        sysex_channel: u8,
        real_time: bool,
        tuning_program: u8,
    ) -> Result<()> {
        check_data_byte("tuning program", tuning_program)?;
        for &(note_number, frequency) in tunings {
            check_data_byte("tuned note number", note_number)?;
            if !crate::frequency::is_encodable(frequency) {
                return Err(MidiError::OutOfRangeValue(format!(
                    "tuning frequency {} Hz is outside the MTS-encodable range \
                     (semitone 0-127, roughly 8.18 Hz to 13.3 kHz)",
                    frequency
                )));
            }
        }

        self.track_mut(track)?
            .change_note_tuning(tunings, sysex_channel, real_time, tuning_program);
        Ok(())
    }

    /// Shift all tracks' high-level events so the earliest event in the
    /// file sits at `offset` beats. Must be called before the file is
    /// closed; it operates on the pre-expansion event lists.
    pub fn shift_tracks(&mut self, offset: f64) {
        let origin = self
            .tracks
            .iter()
            .flat_map(|t| t.events().iter().map(|e| e.time()))
            .fold(f64::INFINITY, f64::min);
        if !origin.is_finite() {
            return; // no events anywhere
        }

        for track in &mut self.tracks {
            track.shift_events(offset - origin);
        }
    }

    /// Close the file for further writing: close every track, sort each
    /// track's low-level events by (time, ordinal), rebase every track
    /// to the file-wide origin, and build each track's byte stream.
    /// Idempotent.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }

        for track in &mut self.tracks {
            track.close_track()?;
            // Program changes and the like must come before notes on
            // the same tick, so sort by ordinality within each time.
            track.sort_midi_events();
        }

        let origin = self.find_origin();

        for track in &mut self.tracks {
            track.adjust_time(origin);
            track.write_midi_stream()?;
        }

        self.closed = true;
        Ok(())
    }

    /// The earliest low-level event time across all tracks. Assumes the
    /// per-track lists are sorted, which `close` guarantees.
    fn find_origin(&self) -> f64 {
        let origin = self
            .tracks
            .iter()
            .filter_map(|t| t.midi_events().first())
            .map(|e| e.time)
            .fold(f64::INFINITY, f64::min);
        if origin.is_finite() {
            origin
        } else {
            0.0
        }
    }

    /// Write the complete MIDI file to `sink`.
    ///
    /// Closes the file first if it is still open, so any pipeline
    /// failure surfaces before a single byte is emitted. Calling this
    /// more than once writes identical bytes each time.
    pub fn write_file<W: Write>(&mut self, sink: &mut W) -> Result<()> {
        self.close()?;

        self.header.write(sink)?;
        for track in &self.tracks {
            track.write_track(sink)?;
        }
        Ok(())
    }
}

fn check_data_byte(what: &str, value: u8) -> Result<()> {
    if value > 127 {
        return Err(MidiError::OutOfRangeValue(format!(
            "{} must be 0-127, got {}",
            what, value
        )));
    }
    Ok(())
}

fn check_channel(channel: u8) -> Result<()> {
    if channel > 15 {
        return Err(MidiError::OutOfRangeValue(format!(
            "channel must be 0-15, got {}",
            channel
        )));
    }
    Ok(())
}

fn check_time(time: f64) -> Result<()> {
    if !time.is_finite() || time < 0.0 {
        return Err(MidiError::OutOfRangeValue(format!(
            "time must be a non-negative number of beats, got {}",
            time
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_pitch_is_rejected() {
        let mut file = MidiFile::new(1);
        let err = file.add_note(0, 0, 128, 0.0, 1.0, 100, None).unwrap_err();
        assert!(matches!(err, MidiError::OutOfRangeValue(_)));
        // The file stays usable after a rejected insertion.
        file.add_note(0, 0, 60, 0.0, 1.0, 100, None).unwrap();
    }

    #[test]
    fn out_of_range_channel_is_rejected() {
        let mut file = MidiFile::new(1);
        let err = file.add_note(0, 16, 60, 0.0, 1.0, 100, None).unwrap_err();
        assert!(matches!(err, MidiError::OutOfRangeValue(_)));
    }

    #[test]
    fn bad_track_index_is_rejected() {
        let mut file = MidiFile::new(1);
        let err = file.add_tempo(3, 0.0, 120.0).unwrap_err();
        assert!(matches!(err, MidiError::OutOfRangeValue(_)));
    }

    #[test]
    fn shift_tracks_rebases_earliest_event_to_offset() {
        let mut file = MidiFile::new(2);
        file.add_note(0, 0, 60, 4.0, 1.0, 100, None).unwrap();
        file.add_note(1, 0, 64, 6.0, 1.0, 100, None).unwrap();
        file.shift_tracks(1.0);

        let t0 = file.track(0).unwrap().events()[0].time();
        let t1 = file.track(1).unwrap().events()[0].time();
        assert!((t0 - 1.0).abs() < 1e-9);
        assert!((t1 - 3.0).abs() < 1e-9);
    }

    #[test]
    fn tempo_is_stored_as_microseconds_per_beat() {
        let mut file = MidiFile::new(1);
        file.add_tempo(0, 0.0, 120.0).unwrap();
        match &file.track(0).unwrap().events()[0] {
            ScoreEvent::Tempo { tempo, .. } => assert_eq!(*tempo, 500_000),
            other => panic!("expected tempo event, got {:?}", other),
        }
    }

    #[test]
    fn tempo_conversion_rounds_to_nearest_microsecond() {
        // 144 BPM gives 416666.67 microseconds per beat, which must
        // round up rather than truncate.
        let mut file = MidiFile::new(1);
        file.add_tempo(0, 0.0, 144.0).unwrap();
        match &file.track(0).unwrap().events()[0] {
            ScoreEvent::Tempo { tempo, .. } => assert_eq!(*tempo, 416_667),
            other => panic!("expected tempo event, got {:?}", other),
        }
    }
}
