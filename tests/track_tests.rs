//! Validation tests for the track pipeline: deduplication, expansion,
//! ordering, and de-interleaving

use midiwriter::{MidiEventKind, MidiFile, MidiTrack, ScoreEvent};

/// Count NoteOn minus NoteOff per (pitch, channel) over a closed
/// track's low-level list, checking along the way that no key ever
/// goes negative (an off preceding its on).
fn check_note_balance(track: &MidiTrack) {
    let mut open: std::collections::HashMap<(u8, u8), i32> = std::collections::HashMap::new();

    for event in track.midi_events() {
        match &event.kind {
            MidiEventKind::NoteOn { channel, pitch, .. } => {
                *open.entry((*pitch, *channel)).or_insert(0) += 1;
            }
            MidiEventKind::NoteOff { channel, pitch, .. } => {
                let count = open.entry((*pitch, *channel)).or_insert(0);
                *count -= 1;
                assert!(
                    *count >= 0,
                    "NoteOff for pitch {} channel {} precedes its NoteOn",
                    pitch,
                    channel
                );
            }
            _ => {}
        }
    }

    for ((pitch, channel), count) in open {
        assert_eq!(
            count, 0,
            "pitch {} channel {} left {} unmatched NoteOn(s)",
            pitch, channel, count
        );
    }
}

fn note(pitch: u8, time: f64, duration: f64) -> ScoreEvent {
    ScoreEvent::Note {
        channel: 0,
        pitch,
        time,
        duration,
        volume: 100,
        annotation: None,
    }
}

#[test]
fn deduplication_is_idempotent() {
    // Inserting each event once, twice, or three times must close to
    // the same low-level list.
    let build = |copies: usize| -> MidiTrack {
        let mut track = MidiTrack::new(true, true);
        for _ in 0..copies {
            track.add_event(note(60, 0.0, 1.0));
            track.add_event(note(64, 1.0, 1.0));
            track.add_event(ScoreEvent::Tempo {
                time: 0.0,
                tempo: 500_000,
            });
        }
        track.close_track().unwrap();
        track
    };

    let once = build(1);
    for copies in [2, 3] {
        let multi = build(copies);
        assert_eq!(
            once.midi_events(),
            multi.midi_events(),
            "{} copies deduplicated differently than one",
            copies
        );
    }
}

#[test]
fn duplicate_removal_can_be_disabled() {
    let mut track = MidiTrack::new(false, true);
    track.add_event(note(60, 0.0, 1.0));
    track.add_event(note(60, 0.0, 1.0));
    track.close_track().unwrap();
    assert_eq!(track.midi_events().len(), 4, "both copies should expand");
}

#[test]
fn closed_track_is_time_sorted_with_ordinal_tie_break() {
    let mut track = MidiTrack::new(true, true);
    track.add_event(note(60, 1.0, 1.0));
    track.add_event(note(62, 0.0, 1.0));
    track.add_event(ScoreEvent::TrackName {
        time: 0.0,
        name: "mixed".to_string(),
    });
    track.add_event(ScoreEvent::ProgramChange {
        channel: 0,
        time: 0.0,
        program: 5,
    });
    track.close_track().unwrap();

    let events = track.midi_events();
    for pair in events.windows(2) {
        assert!(
            pair[0].time <= pair[1].time,
            "times must be non-decreasing"
        );
        if pair[0].time == pair[1].time {
            assert!(
                pair[0].ord <= pair[1].ord,
                "ordinal order broken at tick {}",
                pair[0].time
            );
        }
    }

    // Time 0 holds the track name, the program change, and a NoteOn,
    // in exactly that rank order.
    assert!(matches!(events[0].kind, MidiEventKind::TrackName { .. }));
    assert!(matches!(events[1].kind, MidiEventKind::ProgramChange { .. }));
}

#[test]
fn interleaved_notes_balance_after_deinterleave() {
    let mut track = MidiTrack::new(false, true);
    // Three overlapping notes on one pitch, plus a fourth on another
    // channel that must be tracked independently.
    track.add_event(note(60, 0.0, 3.0));
    track.add_event(note(60, 1.0, 3.0));
    track.add_event(note(60, 2.0, 3.0));
    track.add_event(ScoreEvent::Note {
        channel: 3,
        pitch: 60,
        time: 0.5,
        duration: 4.0,
        volume: 80,
        annotation: None,
    });
    track.close_track().unwrap();

    check_note_balance(&track);
}

#[test]
fn chords_survive_the_pipeline() {
    let mut track = MidiTrack::new(true, true);
    for pitch in [60, 64, 67] {
        track.add_event(note(pitch, 0.0, 1.0));
    }
    track.close_track().unwrap();

    check_note_balance(&track);
    assert_eq!(track.midi_events().len(), 6);
}

#[test]
fn sorting_matches_across_whole_file_close() {
    // The file-level close applies the compound (time, ordinal) sort;
    // the invariant must hold for every track of a closed file.
    let mut file = MidiFile::new(2);
    file.add_track_name(0, 0.0, "one").unwrap();
    file.add_note(0, 0, 60, 0.0, 1.0, 100, None).unwrap();
    file.add_tempo(0, 0.0, 90.0).unwrap();
    file.add_note(1, 1, 48, 2.0, 0.5, 90, None).unwrap();
    file.add_program_change(1, 1, 2.0, 12).unwrap();

    let mut bytes = Vec::new();
    file.write_file(&mut bytes).unwrap();

    for index in 0..file.num_tracks() as usize {
        let events = file.track(index).unwrap().midi_events();
        // Times are deltas after close; they must all be non-negative.
        for event in events {
            assert!(
                event.time >= -1e-9,
                "track {} holds a negative delta {}",
                index,
                event.time
            );
        }
    }
}
