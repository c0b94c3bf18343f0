//! Song files on disk (pretty JSON).

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use log::info;

use crate::error::{Error, Result};
use crate::song::Song;

/// First of `path`, `path1`, `path2`, ... that does not exist yet.
pub fn unused_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }
    (1u32..)
        .map(|n| {
            let mut name = OsString::from(path.as_os_str());
            name.push(n.to_string());
            PathBuf::from(name)
        })
        .find(|candidate| !candidate.exists())
        .unwrap_or_else(|| path.to_path_buf())
}

impl Song {
    /// Write the song without overwriting an existing file. Returns the path
    /// actually written.
    pub fn save(&self, path: &Path) -> Result<PathBuf> {
        let target = unused_path(path);
        if let Some(parent) = target.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&target, json).map_err(|e| Error::io(&target, e))?;
        info!("saved song to {}", target.display());
        Ok(target)
    }
}

pub fn load_song(path: &Path) -> Result<Song> {
    let contents = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    Ok(serde_json::from_str(&contents)?)
}
