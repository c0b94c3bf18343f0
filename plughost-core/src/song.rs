//! The song aggregate and its full-replace push to the host.

use std::collections::{BTreeSet, HashSet};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use plughost_net::HostControl;
use plughost_types::{
    AudioConnection, AudioTrack, CcRoute, CcSchedule, NoteSequence, OrderedNoteSchedule,
    ParamSchedule, ProcessorHandle,
};

use crate::error::{Error, Result};
use crate::schedule::{resolve_ccs, resolve_notes, resolve_params};

/// Anything a song can hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SongItem {
    Notes(NoteSequence),
    Ccs(CcSchedule),
    Params(ParamSchedule),
    OrderedNotes(OrderedNoteSchedule),
    AudioTrack(AudioTrack),
    Processor(ProcessorHandle),
    Connection(AudioConnection),
    CcRoute(CcRoute),
}

macro_rules! song_item_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(impl From<$ty> for SongItem {
            fn from(value: $ty) -> Self {
                SongItem::$variant(value)
            }
        })*
    };
}

song_item_from! {
    NoteSequence => Notes,
    CcSchedule => Ccs,
    ParamSchedule => Params,
    OrderedNoteSchedule => OrderedNotes,
    AudioTrack => AudioTrack,
    ProcessorHandle => Processor,
    AudioConnection => Connection,
    CcRoute => CcRoute,
}

/// What one [`Song::send`] pushed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SendReport {
    pub param_changes: usize,
    pub cc_events: usize,
    pub notes: usize,
    pub ordered_notes: u32,
    pub processors: usize,
    pub connections: usize,
    pub cc_routes: usize,
}

/// Processors, wiring and every schedule for one playback session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Song {
    pub processors: BTreeSet<ProcessorHandle>,
    pub note_sequences: Vec<NoteSequence>,
    pub cc_schedules: Vec<CcSchedule>,
    pub param_schedules: Vec<ParamSchedule>,
    pub ordered_notes: Vec<OrderedNoteSchedule>,
    pub audio_tracks: Vec<AudioTrack>,
    pub connections: Vec<AudioConnection>,
    pub cc_routes: Vec<CcRoute>,
}

impl Song {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, item: impl Into<SongItem>) {
        match item.into() {
            SongItem::Notes(s) => self.note_sequences.push(s),
            SongItem::Ccs(s) => self.cc_schedules.push(s),
            SongItem::Params(s) => self.param_schedules.push(s),
            SongItem::OrderedNotes(s) => self.ordered_notes.push(s),
            SongItem::AudioTrack(t) => self.audio_tracks.push(t),
            SongItem::Processor(p) => {
                self.processors.insert(p);
            }
            SongItem::Connection(c) => self.connections.push(c),
            SongItem::CcRoute(r) => self.cc_routes.push(r),
        }
    }

    pub fn with(mut self, item: impl Into<SongItem>) -> Self {
        self.add(item);
        self
    }

    /// Remove the first item equal to `item`. Returns whether one was found.
    pub fn remove(&mut self, item: &SongItem) -> bool {
        fn remove_first<T: PartialEq>(items: &mut Vec<T>, target: &T) -> bool {
            match items.iter().position(|x| x == target) {
                Some(i) => {
                    items.remove(i);
                    true
                }
                None => false,
            }
        }

        match item {
            SongItem::Notes(s) => remove_first(&mut self.note_sequences, s),
            SongItem::Ccs(s) => remove_first(&mut self.cc_schedules, s),
            SongItem::Params(s) => remove_first(&mut self.param_schedules, s),
            SongItem::OrderedNotes(s) => remove_first(&mut self.ordered_notes, s),
            SongItem::AudioTrack(t) => remove_first(&mut self.audio_tracks, t),
            SongItem::Processor(p) => self.processors.remove(p),
            SongItem::Connection(c) => remove_first(&mut self.connections, c),
            SongItem::CcRoute(r) => remove_first(&mut self.cc_routes, r),
        }
    }

    fn require(&self, processor: ProcessorHandle, what: &str) -> Result<()> {
        if self.processors.contains(&processor) {
            Ok(())
        } else {
            Err(Error::Validation(format!(
                "{} references processor {} which is not in the song",
                what, processor
            )))
        }
    }

    /// Every referenced processor must be part of the song, and keys must be
    /// unique.
    pub fn validate(&self) -> Result<()> {
        let mut keys = HashSet::new();
        for p in &self.processors {
            if !keys.insert(p.key) {
                return Err(Error::Validation(format!(
                    "processor key {} is used more than once",
                    p.key
                )));
            }
        }
        for seq in &self.note_sequences {
            for p in seq.processors() {
                self.require(p, "note sequence")?;
            }
        }
        for schedule in &self.cc_schedules {
            for p in schedule.processors() {
                self.require(p, "CC schedule")?;
            }
        }
        for schedule in &self.param_schedules {
            for p in schedule.processors() {
                self.require(p, "parameter schedule")?;
            }
        }
        for track in &self.audio_tracks {
            if let Some(p) = track.processor {
                self.require(p, "audio track")?;
            }
        }
        for c in &self.connections {
            self.require(c.source, "audio connection")?;
            self.require(c.dest, "audio connection")?;
        }
        for r in &self.cc_routes {
            self.require(r.processor, "CC route")?;
        }
        Ok(())
    }

    /// Replace everything on the host with this song.
    ///
    /// Order: parameter, CC, note and ordered-note schedules (each cleared
    /// then pushed), then all plugins cleared and reloaded by uid, then audio
    /// connections and CC routes re-applied. Audio tracks stay client-side.
    pub fn send<H: HostControl + ?Sized>(&self, host: &mut H) -> Result<SendReport> {
        self.validate()?;

        // Resolve up front so a missing tempo fails before anything is cleared
        let timebase = host.timebase();
        let mut params = Vec::new();
        for schedule in &self.param_schedules {
            params.extend(resolve_params(schedule, &timebase)?);
        }
        let mut ccs = Vec::new();
        for schedule in &self.cc_schedules {
            ccs.extend(resolve_ccs(schedule, &timebase)?);
        }
        let mut notes = Vec::new();
        for seq in &self.note_sequences {
            notes.extend(resolve_notes(seq, &timebase)?);
        }

        let mut report = SendReport::default();

        host.clear_param_schedule()?;
        for change in params {
            host.schedule_param_change(change)?;
            report.param_changes += 1;
        }

        host.clear_midi_cc_schedule()?;
        for cc in ccs {
            host.schedule_midi_cc(cc)?;
            report.cc_events += 1;
        }

        host.clear_midi_schedule()?;
        for note in notes {
            host.schedule_midi_note(note)?;
            report.notes += 1;
        }

        host.clear_ordered_notes()?;
        for schedule in &self.ordered_notes {
            report.ordered_notes += host.schedule_ordered_notes(&schedule.entries)?;
        }

        host.clear_all_plugins()?;
        let cached: Option<HashSet<u32>> = host
            .cached_plugins()
            .map(|plugins| plugins.iter().map(|d| d.uid).collect());
        let available = match cached {
            Some(uids) => uids,
            None => {
                debug!("no cached plugin list, asking host");
                host.list_plugins()?.iter().map(|d| d.uid).collect()
            }
        };
        for p in &self.processors {
            if !available.contains(&p.uid) {
                return Err(Error::Validation(format!(
                    "no available plugin with uid {} for processor {}",
                    p.uid, p
                )));
            }
            host.load_plugin_by_uid(p.uid, p.key)?;
            report.processors += 1;
        }

        for connection in &self.connections {
            host.connect_audio(connection)?;
            report.connections += 1;
        }
        for route in &self.cc_routes {
            host.route_cc_to_param(route)?;
            report.cc_routes += 1;
        }

        info!("song sent: {:?}", report);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plughost_types::{MidiNoteEvent, Position};

    fn synth() -> ProcessorHandle {
        ProcessorHandle::new(7, 1)
    }

    #[test]
    fn add_and_remove_match_item_kind() {
        let seq = NoteSequence::new().with(MidiNoteEvent::new(synth(), 60, 1.0, Position::Samples(10)));
        let mut song = Song::new().with(synth()).with(seq.clone()).with(seq.clone());
        assert_eq!(song.note_sequences.len(), 2);

        assert!(song.remove(&SongItem::Notes(seq.clone())));
        assert_eq!(song.note_sequences.len(), 1);
        assert!(song.remove(&SongItem::Processor(synth())));
        assert!(!song.remove(&SongItem::Processor(synth())));
    }

    #[test]
    fn processors_are_a_set() {
        let song = Song::new().with(synth()).with(synth());
        assert_eq!(song.processors.len(), 1);
    }

    #[test]
    fn validate_rejects_unknown_processor() {
        let seq = NoteSequence::new().with(MidiNoteEvent::new(synth(), 60, 1.0, Position::Samples(10)));
        let song = Song::new().with(seq);
        assert!(matches!(song.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn validate_rejects_shared_key() {
        let song = Song::new()
            .with(ProcessorHandle::new(7, 1))
            .with(ProcessorHandle::new(9, 1));
        assert!(matches!(song.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn validate_checks_connections_and_routes() {
        let other = ProcessorHandle::new(9, 2);
        let song = Song::new().with(synth()).with(AudioConnection {
            source: synth(),
            source_channel: 0,
            dest: other,
            dest_channel: 0,
        });
        assert!(song.validate().is_err());
        assert!(song.with(other).validate().is_ok());
    }
}
