//! Time positions and their conversion to sample offsets.

use serde::{Deserialize, Serialize};

pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;
pub const DEFAULT_BLOCK_SIZE: u32 = 64;

/// A point or span of time in one of the three supported units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Position {
    Samples(u64),
    Seconds(f64),
    /// Musical beats; needs a tempo to resolve
    Beats(f64),
}

impl Default for Position {
    fn default() -> Self {
        Self::Samples(0)
    }
}

impl Position {
    pub fn is_musical(&self) -> bool {
        matches!(self, Self::Beats(_))
    }
}

/// How a note inside a sequence is anchored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub enum Timing {
    /// No offset given: reuse the previous note's offset (block start for the first note)
    #[default]
    Inherit,
    /// Relative to the start of the enclosing sequence
    At(Position),
    /// Relative to the previously resolved note
    After(Position),
}

/// Sample rate, block size and tempo used to resolve positions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Timebase {
    pub sample_rate: u32,
    pub block_size: u32,
    /// Beats per minute; `None` until configured
    pub bpm: Option<f64>,
}

impl Default for Timebase {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            block_size: DEFAULT_BLOCK_SIZE,
            bpm: None,
        }
    }
}

impl Timebase {
    pub fn new(sample_rate: u32, block_size: u32) -> Self {
        Self {
            sample_rate,
            block_size: block_size.max(1),
            bpm: None,
        }
    }

    pub fn with_bpm(mut self, bpm: f64) -> Self {
        self.set_bpm(bpm);
        self
    }

    /// Non-positive or non-finite tempos leave the tempo unset.
    pub fn set_bpm(&mut self, bpm: f64) {
        self.bpm = (bpm.is_finite() && bpm > 0.0).then_some(bpm);
    }

    /// Sample count for `position`, or `None` for beats without a tempo.
    pub fn samples(&self, position: Position) -> Option<f64> {
        let rate = self.sample_rate as f64;
        match position {
            Position::Samples(n) => Some(n as f64),
            Position::Seconds(s) => Some(s * rate),
            Position::Beats(b) => self.bpm.map(|bpm| b * 60.0 * rate / bpm),
        }
    }

    /// Processing block containing the given sample offset.
    pub fn block_at(&self, samples: f64) -> u64 {
        if samples <= 0.0 {
            return 0;
        }
        (samples / self.block_size as f64).floor() as u64
    }

    /// Number of blocks covering `seconds` of playback.
    pub fn blocks_for_seconds(&self, seconds: f64) -> u64 {
        let samples = seconds.max(0.0) * self.sample_rate as f64;
        (samples / self.block_size as f64).ceil() as u64
    }
}
