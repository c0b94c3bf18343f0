//! Plugin files that crashed or hung the host during a scan.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use log::warn;

use crate::error::{Error, Result};

/// A JSON array of path strings, kept sorted and deduplicated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BadPathCache {
    path: PathBuf,
    entries: BTreeSet<String>,
}

impl BadPathCache {
    /// Read the cache file. A missing file is an empty cache.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str::<Vec<String>>(&contents)?
                .into_iter()
                .collect(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeSet::new(),
            Err(e) => return Err(Error::io(&path, e)),
        };
        Ok(Self { path, entries })
    }

    /// Like [`BadPathCache::load`], but a corrupt file starts an empty cache.
    pub fn load_or_empty(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match Self::load(&path) {
            Ok(cache) => cache,
            Err(e) => {
                warn!("ignoring bad-path cache {}: {}", path.display(), e);
                Self {
                    path,
                    entries: BTreeSet::new(),
                }
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add newly reported paths. Returns how many were new.
    pub fn merge<I, S>(&mut self, paths: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let before = self.entries.len();
        self.entries.extend(paths.into_iter().map(Into::into));
        self.entries.len() - before
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
            }
        }
        let json = serde_json::to_string_pretty(&self.entries())?;
        fs::write(&self.path, json).map_err(|e| Error::io(&self.path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = BadPathCache::load(dir.path().join("badpaths.json")).unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn merge_dedupes_and_persists_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("badpaths.json");
        fs::write(&file, r#"["/z/crash.so", "/a/hang.vst3"]"#).unwrap();

        let mut cache = BadPathCache::load(&file).unwrap();
        assert_eq!(cache.merge(["/a/hang.vst3", "/m/new.so"]), 1);
        cache.save().unwrap();

        let reloaded = BadPathCache::load(&file).unwrap();
        assert_eq!(
            reloaded.entries(),
            vec!["/a/hang.vst3", "/m/new.so", "/z/crash.so"]
        );
    }

    #[test]
    fn corrupt_file_is_an_error_unless_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("badpaths.json");
        fs::write(&file, "{not json").unwrap();
        assert!(matches!(BadPathCache::load(&file), Err(Error::Json(_))));
        assert!(BadPathCache::load_or_empty(&file).is_empty());
    }
}
