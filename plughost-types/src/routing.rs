//! Graph wiring and audio tracks owned by a song.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::ProcessorHandle;

/// MIDI channel filter for CC routing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MidiChannel {
    #[default]
    Any,
    /// 1-16
    Only(u8),
}

impl MidiChannel {
    /// Wire form: `-1` for any channel.
    pub fn to_wire(self) -> i32 {
        match self {
            Self::Any => -1,
            Self::Only(ch) => ch as i32,
        }
    }

    pub fn from_wire(value: i32) -> Self {
        match u8::try_from(value) {
            Ok(ch) => Self::Only(ch),
            Err(_) => Self::Any,
        }
    }
}

/// Audio connection between two processor channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioConnection {
    pub source: ProcessorHandle,
    pub source_channel: u32,
    pub dest: ProcessorHandle,
    pub dest_channel: u32,
}

/// Live MIDI CC mapped onto a processor parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CcRoute {
    pub processor: ProcessorHandle,
    pub param_index: u32,
    pub controller: u8,
    pub channel: MidiChannel,
}

/// An audio file played alongside the schedules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioTrack {
    pub file_path: PathBuf,
    /// Processor the track feeds, if any
    pub processor: Option<ProcessorHandle>,
}

impl AudioTrack {
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
            processor: None,
        }
    }
}
