use std::path::PathBuf;

use log::info;

use plughost_net::Session;
use plughost_types::PluginDescriptor;

use crate::bad_paths::BadPathCache;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq)]
pub struct ScanOutcome {
    /// Plugins the host reported finding
    pub found: u32,
    /// Bad paths not already in the cache
    pub new_bad_paths: usize,
    pub plugins: Vec<PluginDescriptor>,
}

/// Scan `dirs` skipping cached bad paths, fold the host's new bad paths into
/// the cache, save it, and fetch the resulting plugin list.
pub fn scan_with_cache(
    session: &mut Session,
    dirs: &[PathBuf],
    cache: &mut BadPathCache,
) -> Result<ScanOutcome> {
    let dirs: Vec<String> = dirs
        .iter()
        .map(|d| d.to_string_lossy().into_owned())
        .collect();
    let found = session.scan_plugins(&dirs, &cache.entries())?;

    let reported = session.list_bad_paths()?;
    let new_bad_paths = cache.merge(reported);
    cache.save()?;
    if new_bad_paths > 0 {
        info!("{} new bad plugin paths saved to {}", new_bad_paths, cache.path().display());
    }

    let plugins = session.list_plugins()?;
    Ok(ScanOutcome {
        found,
        new_bad_paths,
        plugins,
    })
}
