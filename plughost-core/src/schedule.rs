//! Resolution of symbolic schedule positions to absolute sample offsets.
//!
//! The tempo comes in through the [`Timebase`] argument on every call; there
//! is no ambient tempo state.

use plughost_net::{ScheduledCc, ScheduledNote, ScheduledParam};
use plughost_types::{CcSchedule, NoteSequence, ParamSchedule, Position, Timebase, Timing};

use crate::error::{Error, Result};

/// Sample count for `position`; beats need a tempo.
pub fn samples(timebase: &Timebase, position: Position) -> Result<f64> {
    timebase.samples(position).ok_or_else(|| {
        Error::Configuration(format!(
            "{:?} needs a tempo; set bpm before resolving beat positions",
            position
        ))
    })
}

fn base_offset(timebase: &Timebase, offset: Option<Position>) -> Result<f64> {
    match offset {
        Some(position) => samples(timebase, position),
        None => Ok(0.0),
    }
}

/// Walk a note sequence in order, anchoring each note to the block start or
/// to the previous note.
pub fn resolve_notes(sequence: &NoteSequence, timebase: &Timebase) -> Result<Vec<ScheduledNote>> {
    let base = base_offset(timebase, sequence.offset)?;
    let mut previous: Option<f64> = None;
    let mut resolved = Vec::with_capacity(sequence.notes.len());

    for note in &sequence.notes {
        let start = match note.timing {
            Timing::At(position) => base + samples(timebase, position)?,
            Timing::After(interval) => {
                let interval = samples(timebase, interval)?;
                // The first note has nothing to follow and sits on the block start
                match previous {
                    Some(prev) => prev + interval,
                    None => base,
                }
            }
            Timing::Inherit => previous.unwrap_or(base),
        };
        let duration = samples(timebase, note.duration)?;
        resolved.push(ScheduledNote {
            processor: note.processor.key,
            note: note.note as u32,
            velocity: note.velocity,
            start,
            duration,
            channel: note.channel as u32,
        });
        previous = Some(start);
    }
    Ok(resolved)
}

pub fn resolve_ccs(schedule: &CcSchedule, timebase: &Timebase) -> Result<Vec<ScheduledCc>> {
    let base = base_offset(timebase, schedule.offset)?;
    schedule
        .events
        .iter()
        .map(|event| {
            Ok(ScheduledCc {
                processor: event.processor.key,
                controller: event.controller as u32,
                value: event.value as u32,
                time: base + samples(timebase, event.at)?,
                channel: event.channel as u32,
            })
        })
        .collect()
}

/// Parameter changes land on the processing block containing their offset.
pub fn resolve_params(schedule: &ParamSchedule, timebase: &Timebase) -> Result<Vec<ScheduledParam>> {
    let base = base_offset(timebase, schedule.offset)?;
    schedule
        .events
        .iter()
        .map(|event| {
            let at = base + samples(timebase, event.at)?;
            Ok(ScheduledParam {
                processor: event.processor.key,
                param_index: event.param_index,
                value: event.value,
                at_block: timebase.block_at(at),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use plughost_types::{MidiCcEvent, MidiNoteEvent, ParamChangeEvent, ProcessorHandle};

    const SYNTH: ProcessorHandle = ProcessorHandle { uid: 7, key: 1 };

    fn starts(notes: &[ScheduledNote]) -> Vec<f64> {
        notes.iter().map(|n| n.start).collect()
    }

    #[test]
    fn half_beat_intervals_at_120_bpm() {
        let timebase = Timebase::new(44100, 64).with_bpm(120.0);
        let mut seq = NoteSequence::starting_at(Position::Beats(0.0));
        for note in [60, 62, 64, 65] {
            seq.push(
                MidiNoteEvent::new(SYNTH, note, 0.8, Position::Beats(0.5))
                    .after(Position::Beats(0.5)),
            );
        }
        // The first interval anchors at the block start
        let resolved = resolve_notes(&seq, &timebase).unwrap();
        assert_eq!(starts(&resolved), vec![0.0, 11025.0, 22050.0, 33075.0]);
        assert!(resolved.iter().all(|n| n.duration == 11025.0));
    }

    #[test]
    fn leading_interval_is_ignored_after_an_offset_block() {
        let timebase = Timebase::new(44100, 64).with_bpm(120.0);
        let seq = NoteSequence::starting_at(Position::Beats(2.0))
            .with(MidiNoteEvent::new(SYNTH, 60, 0.8, Position::Beats(0.5)).after(Position::Beats(1.0)))
            .with(MidiNoteEvent::new(SYNTH, 62, 0.8, Position::Beats(0.5)).after(Position::Beats(1.0)))
            .with(MidiNoteEvent::new(SYNTH, 64, 0.8, Position::Beats(0.5)));
        let resolved = resolve_notes(&seq, &timebase).unwrap();
        assert_eq!(starts(&resolved), vec![44100.0, 66150.0, 66150.0]);
    }

    #[test]
    fn absolute_offsets_are_relative_to_block() {
        let timebase = Timebase::new(44100, 64);
        let seq = NoteSequence::starting_at(Position::Seconds(1.0))
            .with(MidiNoteEvent::new(SYNTH, 60, 1.0, Position::Samples(100)).at(Position::Samples(50)))
            .with(MidiNoteEvent::new(SYNTH, 64, 1.0, Position::Samples(100)))
            .with(MidiNoteEvent::new(SYNTH, 67, 1.0, Position::Samples(100)).after(Position::Seconds(0.5)));
        let resolved = resolve_notes(&seq, &timebase).unwrap();
        // Inherit reuses the previous start
        assert_eq!(starts(&resolved), vec![44150.0, 44150.0, 66200.0]);
    }

    #[test]
    fn unset_offset_starts_at_zero() {
        let timebase = Timebase::default();
        let seq = NoteSequence::new().with(MidiNoteEvent::new(SYNTH, 60, 1.0, Position::Samples(1)));
        assert_eq!(starts(&resolve_notes(&seq, &timebase).unwrap()), vec![0.0]);
    }

    #[test]
    fn beats_without_tempo_is_configuration_error() {
        let timebase = Timebase::default();
        let seq = NoteSequence::new()
            .with(MidiNoteEvent::new(SYNTH, 60, 1.0, Position::Samples(10)).after(Position::Beats(1.0)));
        assert!(matches!(
            resolve_notes(&seq, &timebase),
            Err(Error::Configuration(_))
        ));

        let params = ParamSchedule {
            offset: Some(Position::Beats(4.0)),
            events: vec![],
        };
        assert!(matches!(
            resolve_params(&params, &timebase),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn param_changes_resolve_to_blocks() {
        let timebase = Timebase::new(44100, 64);
        let schedule = ParamSchedule {
            offset: Some(Position::Samples(640)),
            events: vec![
                ParamChangeEvent {
                    processor: SYNTH,
                    param_index: 3,
                    value: 0.5,
                    at: Position::Samples(0),
                },
                ParamChangeEvent {
                    processor: SYNTH,
                    param_index: 3,
                    value: 1.0,
                    at: Position::Seconds(1.0),
                },
            ],
        };
        let resolved = resolve_params(&schedule, &timebase).unwrap();
        assert_eq!(resolved[0].at_block, 10);
        // (640 + 44100) / 64 = 699.06
        assert_eq!(resolved[1].at_block, 699);
        assert_eq!(resolved[1].processor, 1);
    }

    #[test]
    fn cc_times_are_absolute_samples() {
        let timebase = Timebase::new(48000, 128);
        let mut schedule = CcSchedule::new(vec![MidiCcEvent {
            processor: SYNTH,
            controller: 74,
            value: 127,
            channel: 2,
            at: Position::Seconds(0.5),
        }]);
        schedule.offset = Some(Position::Samples(1000));
        let resolved = resolve_ccs(&schedule, &timebase).unwrap();
        assert_eq!(resolved[0].time, 25000.0);
        assert_eq!(resolved[0].controller, 74);
        assert_eq!(resolved[0].channel, 2);
    }
}
