//! MIDI track pipeline
//!
//! A track collects high-level [`ScoreEvent`]s while open. Closing runs
//! the processing pipeline: duplicate removal, expansion into low-level
//! [`MidiEvent`]s (beats scaled to ticks, notes split into on/off
//! pairs), a stable time sort, and optional de-interleaving of
//! overlapping notes. The owning [`MidiFile`](crate::file::MidiFile)
//! then rebases the track to delta times and asks it to encode its byte
//! stream.

use std::collections::{HashMap, HashSet};
use std::io::Write;

use crate::error::{MidiError, Result};
use crate::event::{MidiEvent, MidiEventKind, ScoreEvent};
use crate::frequency::frequency_to_bytes;
use crate::vlq;
use crate::TICKS_PER_BEAT;

/// A single MIDI track: high-level events while open, low-level events
/// and an encoded byte stream once closed.
#[derive(Debug, Clone)]
pub struct MidiTrack {
    event_list: Vec<ScoreEvent>,
    midi_event_list: Vec<MidiEvent>,
    midi_data: Vec<u8>,
    closed: bool,
    remove_duplicates: bool,
    deinterleave: bool,
}

impl MidiTrack {
    pub fn new(remove_duplicates: bool, deinterleave: bool) -> Self {
        MidiTrack {
            event_list: Vec::new(),
            midi_event_list: Vec::new(),
            midi_data: Vec::new(),
            closed: false,
            remove_duplicates,
            deinterleave,
        }
    }

    /// High-level events inserted so far (pre-close view).
    pub fn events(&self) -> &[ScoreEvent] {
        &self.event_list
    }

    /// Low-level events; empty until the track is closed.
    pub fn midi_events(&self) -> &[MidiEvent] {
        &self.midi_event_list
    }

    /// Compound sort by (time, ordinal), run once at file close so
    /// metadata and note-offs precede note-ons on a shared tick.
    pub fn sort_midi_events(&mut self) {
        self.midi_event_list.sort_by(|a, b| {
            a.time
                .partial_cmp(&b.time)
                .unwrap()
                .then(a.ord.cmp(&b.ord))
        });
    }

    /// Encoded track payload; empty until the stream has been written.
    pub fn encoded_stream(&self) -> &[u8] {
        &self.midi_data
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Append a high-level event. Range validation happens at the
    /// [`MidiFile`](crate::file::MidiFile) insertion API.
    pub fn add_event(&mut self, event: ScoreEvent) {
        self.event_list.push(event);
    }

    /// Shift every high-level event by `delta` beats. Used by the
    /// file-level rebase before closing.
    pub fn shift_events(&mut self, delta: f64) {
        for event in &mut self.event_list {
            event.shift_time(delta);
        }
    }

    /// Append a change-tuning Universal SysEx event (MTS code 8,
    /// subcode 2) built from `(pitch, frequency)` pairs.
    pub fn change_note_tuning(
        &mut self,
        tunings: &[(u8, f64)],
        sysex_channel: u8,
        real_time: bool,
        tuning_program: u8,
    ) {
        let mut payload = vec![tuning_program, tunings.len() as u8];
        for &(note_number, frequency) in tunings {
            payload.push(note_number);
            payload.extend(frequency_to_bytes(frequency));
        }

        self.event_list.push(ScoreEvent::UniversalSysEx {
            time: 0.0,
            real_time,
            sysex_channel,
            code: 8,
            subcode: 2,
            payload,
        });
    }

    /// Close the track: remove duplicates if configured, expand the
    /// event list, sort, and de-interleave if configured. Idempotent;
    /// called by the owning file.
    pub fn close_track(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if self.remove_duplicates {
            self.dedup_events();
        }

        self.process_event_list()
    }

    /// Remove exact structural duplicates from the event list, keeping
    /// the first occurrence, then sort by time. Insertion order is the
    /// only tie-break within equal times. Idempotent.
    fn dedup_events(&mut self) {
        let mut seen = HashSet::new();
        self.event_list.retain(|event| seen.insert(event.clone()));

        self.event_list
            .sort_by(|a, b| a.time().partial_cmp(&b.time()).unwrap());
    }

    /// Expand each high-level event into one or two low-level events
    /// with times scaled from beats to ticks, then time-sort and
    /// optionally de-interleave.
    fn process_event_list(&mut self) -> Result<()> {
        let ticks = TICKS_PER_BEAT as f64;

        for event in &self.event_list {
            match event {
                ScoreEvent::Note {
                    channel,
                    pitch,
                    time,
                    duration,
                    volume,
                    ..
                } => {
                    self.midi_event_list.push(MidiEvent::new(
                        time * ticks,
                        MidiEventKind::NoteOn {
                            channel: *channel,
                            pitch: *pitch,
                            volume: *volume,
                        },
                    ));
                    // The off event carries the note's velocity, as the
                    // original writer does.
                    self.midi_event_list.push(MidiEvent::new(
                        (time + duration) * ticks,
                        MidiEventKind::NoteOff {
                            channel: *channel,
                            pitch: *pitch,
                            volume: *volume,
                        },
                    ));
                }
                ScoreEvent::Tempo { time, tempo } => {
                    self.midi_event_list.push(MidiEvent::new(
                        time * ticks,
                        MidiEventKind::Tempo { tempo: *tempo },
                    ));
                }
                ScoreEvent::ProgramChange {
                    channel,
                    time,
                    program,
                } => {
                    self.midi_event_list.push(MidiEvent::new(
                        time * ticks,
                        MidiEventKind::ProgramChange {
                            channel: *channel,
                            program: *program,
                        },
                    ));
                }
                ScoreEvent::ControllerEvent {
                    channel,
                    time,
                    controller_type,
                    value,
                } => {
                    self.midi_event_list.push(MidiEvent::new(
                        time * ticks,
                        MidiEventKind::ControllerEvent {
                            channel: *channel,
                            controller_type: *controller_type,
                            value: *value,
                        },
                    ));
                }
                ScoreEvent::TrackName { time, name } => {
                    self.midi_event_list.push(MidiEvent::new(
                        time * ticks,
                        MidiEventKind::TrackName { name: name.clone() },
                    ));
                }
                ScoreEvent::SysEx {
                    time,
                    manufacturer_id,
                    payload,
                } => {
                    self.midi_event_list.push(MidiEvent::new(
                        time * ticks,
                        MidiEventKind::SysEx {
                            manufacturer_id: *manufacturer_id,
                            payload: payload.clone(),
                        },
                    ));
                }
                ScoreEvent::UniversalSysEx {
                    time,
                    real_time,
                    sysex_channel,
                    code,
                    subcode,
                    payload,
                } => {
                    self.midi_event_list.push(MidiEvent::new(
                        time * ticks,
                        MidiEventKind::UniversalSysEx {
                            real_time: *real_time,
                            sysex_channel: *sysex_channel,
                            code: *code,
                            subcode: *subcode,
                            payload: payload.clone(),
                        },
                    ));
                }
            }
        }

        // Later stages expect the list to be time-sorted.
        self.midi_event_list
            .sort_by(|a, b| a.time.partial_cmp(&b.time).unwrap());

        if self.deinterleave {
            self.deinterleave_notes()?;
        }

        Ok(())
    }

    /// Correct interleaved notes.
    ///
    /// Notes on the same pitch and channel can interleave with respect
    /// to their start and stop times (A on, B on, A off, B off), which
    /// players interpret as crossed rather than overlapping pairs. Per
    /// (pitch, channel) key a stack of pending start times is kept; a
    /// NoteOff arriving while more than one start is pending takes the
    /// most recent start time as its own, so the pairs nest LIFO.
    /// Expects a time-sorted list.
    fn deinterleave_notes(&mut self) -> Result<()> {
        let mut stack: HashMap<(u8, u8), Vec<f64>> = HashMap::new();

        for event in &mut self.midi_event_list {
            match &event.kind {
                MidiEventKind::NoteOn { channel, pitch, .. } => {
                    stack.entry((*pitch, *channel)).or_default().push(event.time);
                }
                MidiEventKind::NoteOff { channel, pitch, .. } => {
                    let pending = stack.get_mut(&(*pitch, *channel)).ok_or_else(|| {
                        MidiError::UnbalancedNoteEvents(format!(
                            "NoteOff at tick {} for pitch {} channel {} has no pending NoteOn",
                            event.time, pitch, channel
                        ))
                    })?;
                    match pending.len() {
                        0 => {
                            return Err(MidiError::UnbalancedNoteEvents(format!(
                                "NoteOff at tick {} for pitch {} channel {} has no pending NoteOn",
                                event.time, pitch, channel
                            )));
                        }
                        1 => {
                            pending.pop();
                        }
                        _ => {
                            if let Some(start) = pending.pop() {
                                event.time = start;
                            }
                        }
                    }
                }
                _ => {}
            }
        }

        // Two sequential stable sorts, not one compound sort: the
        // ordinal pass runs first so it only survives as a tie-break
        // within groups the time pass leaves in place.
        self.midi_event_list.sort_by(|a, b| a.ord.cmp(&b.ord));
        self.midi_event_list
            .sort_by(|a, b| a.time.partial_cmp(&b.time).unwrap());

        Ok(())
    }

    /// Rewrite absolute tick times as running delta times, rebased so
    /// the file-wide `origin` becomes tick zero.
    pub fn adjust_time(&mut self, origin: f64) {
        if self.midi_event_list.is_empty() {
            return;
        }

        let mut running_time = 0.0;
        for event in &mut self.midi_event_list {
            let adjusted = event.time - origin;
            event.time = adjusted - running_time;
            running_time = adjusted;
        }
    }

    /// Encode the delta-timed event list into the track byte stream and
    /// terminate it with the end-of-track meta event.
    pub fn write_midi_stream(&mut self) -> Result<()> {
        let mut data = self.write_events_to_stream()?;

        // End of track: delta 0, meta 0x2F, length 0.
        data.extend_from_slice(&[0x00, 0xFF, 0x2F, 0x00]);
        self.midi_data = data;

        Ok(())
    }

    /// Serialize the events into bytes.
    ///
    /// The first pass feeds variable-length rounding error forward:
    /// each delta is encoded and decoded to find out how far the stored
    /// value drifts from the precise elapsed time, and the drift is
    /// folded into the delta so it never accumulates across a long
    /// track. The second pass emits delta bytes, status byte, and the
    /// per-kind payload.
    fn write_events_to_stream(&mut self) -> Result<Vec<u8>> {
        let mut precise_time = 0.0; // elapsed time ignoring round-off
        let mut actual_time = 0.0; // elapsed time as written to the stream

        for event in &mut self.midi_event_list {
            precise_time += event.time;

            let encoded = vlq::write_var_length(event.time);
            let (rounded_val, _) = vlq::read_var_length(&encoded, 0)?;
            let rounded_time = actual_time + rounded_val as f64;

            event.time += precise_time - rounded_time;

            let encoded = vlq::write_var_length(event.time);
            let (rounded_val, _) = vlq::read_var_length(&encoded, 0)?;
            actual_time += rounded_val as f64;
        }

        let mut data = Vec::new();
        for event in &self.midi_event_list {
            data.extend(vlq::write_var_length(event.time));

            match &event.kind {
                MidiEventKind::NoteOn {
                    channel,
                    pitch,
                    volume,
                } => {
                    data.push(0x9 << 4 | *channel);
                    data.push(*pitch);
                    data.push(*volume);
                }
                MidiEventKind::NoteOff {
                    channel,
                    pitch,
                    volume,
                } => {
                    data.push(0x8 << 4 | *channel);
                    data.push(*pitch);
                    data.push(*volume);
                }
                MidiEventKind::Tempo { tempo } => {
                    data.push(0xFF);
                    data.push(0x51);
                    data.push(0x03); // data length
                    data.extend_from_slice(&tempo.to_be_bytes()[1..]);
                }
                MidiEventKind::ProgramChange { channel, program } => {
                    data.push(0xC << 4 | *channel);
                    data.push(*program);
                }
                MidiEventKind::ControllerEvent {
                    channel,
                    controller_type,
                    value,
                } => {
                    data.push(0xB << 4 | *channel);
                    data.push(*controller_type);
                    data.push(*value);
                }
                MidiEventKind::TrackName { name } => {
                    data.push(0xFF); // meta event
                    data.push(0x03); // event type
                    data.extend(vlq::write_var_length(name.len() as f64));
                    data.extend_from_slice(name.as_bytes());
                }
                MidiEventKind::SysEx {
                    manufacturer_id,
                    payload,
                } => {
                    data.push(0xF0);
                    data.extend(vlq::write_var_length((payload.len() + 2) as f64));
                    data.push(*manufacturer_id);
                    data.extend_from_slice(payload);
                    data.push(0xF7);
                }
                MidiEventKind::UniversalSysEx {
                    real_time,
                    sysex_channel,
                    code,
                    subcode,
                    payload,
                } => {
                    data.push(0xF0);
                    data.extend(vlq::write_var_length((payload.len() + 5) as f64));
                    data.push(if *real_time { 0x7F } else { 0x7E });
                    data.push(*sysex_channel);
                    data.push(*code);
                    data.push(*subcode);
                    data.extend_from_slice(payload);
                    data.push(0xF7);
                }
            }
        }

        Ok(data)
    }

    /// Write the track chunk (`MTrk`, length, stream) to the sink. The
    /// stream must already have been built via [`write_midi_stream`].
    ///
    /// [`write_midi_stream`]: MidiTrack::write_midi_stream
    pub fn write_track<W: Write>(&self, sink: &mut W) -> Result<()> {
        sink.write_all(b"MTrk")?;
        sink.write_all(&(self.midi_data.len() as u32).to_be_bytes())?;
        sink.write_all(&self.midi_data)?;
        Ok(())
    }
}
