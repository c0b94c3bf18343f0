//! # plughost-core
//!
//! Song-level logic on top of plughost-net: resolving schedules against a
//! timebase, pushing whole songs to the host, saving them, and the
//! configuration and plugin-scan plumbing around a session.

pub mod bad_paths;
pub mod config;
mod error;
pub mod paths;
pub mod persistence;
pub mod scan;
pub mod schedule;
pub mod song;

pub use bad_paths::BadPathCache;
pub use config::Config;
pub use error::{Error, Result};
pub use persistence::load_song;
pub use scan::{scan_with_cache, ScanOutcome};
pub use song::{SendReport, Song, SongItem};
