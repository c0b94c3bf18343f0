//! Scheduled events and the schedules that group them.
//!
//! Positions here are symbolic; plughost-core resolves them to absolute
//! sample offsets against a [`Timebase`](crate::Timebase) before upload.

use serde::{Deserialize, Serialize};

use crate::{Position, ProcessorHandle, Timing};

/// A timed MIDI note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MidiNoteEvent {
    pub processor: ProcessorHandle,
    pub note: u8,
    /// 0.0-1.0
    pub velocity: f32,
    /// MIDI channel 1-16
    pub channel: u8,
    pub duration: Position,
    pub timing: Timing,
}

impl MidiNoteEvent {
    pub fn new(processor: ProcessorHandle, note: u8, velocity: f32, duration: Position) -> Self {
        Self {
            processor,
            note,
            velocity,
            channel: 1,
            duration,
            timing: Timing::Inherit,
        }
    }

    pub fn on_channel(mut self, channel: u8) -> Self {
        self.channel = channel;
        self
    }

    pub fn at(mut self, position: Position) -> Self {
        self.timing = Timing::At(position);
        self
    }

    pub fn after(mut self, interval: Position) -> Self {
        self.timing = Timing::After(interval);
        self
    }
}

/// A timed MIDI continuous-controller message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MidiCcEvent {
    pub processor: ProcessorHandle,
    pub controller: u8,
    /// 0-127
    pub value: u8,
    pub channel: u8,
    pub at: Position,
}

/// A timed parameter change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamChangeEvent {
    pub processor: ProcessorHandle,
    /// Host-stable parameter index
    pub param_index: u32,
    pub value: f32,
    pub at: Position,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScheduledEvent {
    Note(MidiNoteEvent),
    Cc(MidiCcEvent),
    Param(ParamChangeEvent),
}

impl ScheduledEvent {
    pub fn processor(&self) -> ProcessorHandle {
        match self {
            Self::Note(e) => e.processor,
            Self::Cc(e) => e.processor,
            Self::Param(e) => e.processor,
        }
    }
}

/// A block of notes resolved in order from a common start offset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoteSequence {
    /// Start of the block; sample 0 when unset
    pub offset: Option<Position>,
    pub notes: Vec<MidiNoteEvent>,
}

impl NoteSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(offset: Position) -> Self {
        Self {
            offset: Some(offset),
            notes: Vec::new(),
        }
    }

    pub fn push(&mut self, note: MidiNoteEvent) {
        self.notes.push(note);
    }

    pub fn with(mut self, note: MidiNoteEvent) -> Self {
        self.notes.push(note);
        self
    }

    pub fn processors(&self) -> impl Iterator<Item = ProcessorHandle> + '_ {
        self.notes.iter().map(|n| n.processor)
    }
}

/// CC automation with absolute event positions inside the block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CcSchedule {
    pub offset: Option<Position>,
    pub events: Vec<MidiCcEvent>,
}

impl CcSchedule {
    pub fn new(events: Vec<MidiCcEvent>) -> Self {
        Self {
            offset: None,
            events,
        }
    }

    pub fn processors(&self) -> impl Iterator<Item = ProcessorHandle> + '_ {
        self.events.iter().map(|e| e.processor)
    }
}

/// Parameter automation with absolute event positions inside the block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamSchedule {
    pub offset: Option<Position>,
    pub events: Vec<ParamChangeEvent>,
}

impl ParamSchedule {
    pub fn new(events: Vec<ParamChangeEvent>) -> Self {
        Self {
            offset: None,
            events,
        }
    }

    pub fn processors(&self) -> impl Iterator<Item = ProcessorHandle> + '_ {
        self.events.iter().map(|e| e.processor)
    }
}

/// A note fired by an external trigger rather than at a fixed time.
///
/// Entries sharing `order` fire together on the next trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderedNoteEntry {
    pub order: u32,
    pub note: u8,
    /// 0-127
    pub velocity: u8,
    pub channel: u8,
    /// Samples, used when the keyboard's own note-off is ignored
    pub duration: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderedNoteSchedule {
    pub entries: Vec<OrderedNoteEntry>,
}

impl OrderedNoteSchedule {
    pub fn new(entries: Vec<OrderedNoteEntry>) -> Self {
        Self { entries }
    }

    /// Number of distinct trigger buckets.
    pub fn bucket_count(&self) -> usize {
        let mut orders: Vec<u32> = self.entries.iter().map(|e| e.order).collect();
        orders.sort_unstable();
        orders.dedup();
        orders.len()
    }
}
