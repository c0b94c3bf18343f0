//! # plughost-types
//!
//! Shared type definitions for the plughost client.
//! This crate contains the plain data used across plughost-net and plughost-core:
//! descriptors decoded from host replies, processor handles, time positions and
//! the schedule/song building blocks.

mod descriptor;
mod routing;
mod schedule;
mod timing;

pub use descriptor::{
    BusDescriptor, ChannelsInfo, ParameterDescriptor, ParameterFlags, ParameterRange,
    PluginDescriptor,
};
pub use routing::{AudioConnection, AudioTrack, CcRoute, MidiChannel};
pub use schedule::{
    CcSchedule, MidiCcEvent, MidiNoteEvent, NoteSequence, OrderedNoteEntry, OrderedNoteSchedule,
    ParamChangeEvent, ParamSchedule, ScheduledEvent,
};
pub use timing::{Position, Timebase, Timing, DEFAULT_BLOCK_SIZE, DEFAULT_SAMPLE_RATE};

/// One loaded processor instance in the host graph.
///
/// `uid` identifies the plugin type and is stable across host restarts.
/// `key` disambiguates concurrent instances of the same plugin and is only
/// unique within one loaded session. Neither is the host's internal node id.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct ProcessorHandle {
    pub uid: u32,
    pub key: u32,
}

impl ProcessorHandle {
    pub fn new(uid: u32, key: u32) -> Self {
        Self { uid, key }
    }
}

impl std::fmt::Display for ProcessorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.uid, self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_display_shows_uid_and_key() {
        assert_eq!(ProcessorHandle::new(7, 3).to_string(), "7#3");
    }

    #[test]
    fn handles_with_same_uid_differ_by_key() {
        let a = ProcessorHandle::new(7, 0);
        let b = ProcessorHandle::new(7, 1);
        assert_ne!(a, b);
        assert!(a < b);
    }
}
