//! Platform plugin directories.

use std::path::PathBuf;

use crate::config::expand_home;

#[cfg(target_os = "windows")]
const DEFAULT_DIRS: &[&str] = &[
    r"C:\Program Files\Steinberg\VSTPlugins",
    r"C:\Program Files\Common Files\VST3",
    r"C:\Program Files\Vstplugins",
    r"C:\Program Files (x86)\Steinberg\VSTPlugins",
    r"C:\Program Files (x86)\VstPlugins",
    r"C:\VstPlugins",
];

#[cfg(target_os = "macos")]
const DEFAULT_DIRS: &[&str] = &[
    "/Library/Audio/Plug-Ins/VST",
    "/Library/Audio/Plug-Ins/VST3",
    "/Library/Audio/Plug-Ins/Components",
    "~/Library/Audio/Plug-Ins/VST",
    "~/Library/Audio/Plug-Ins/VST3",
];

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
const DEFAULT_DIRS: &[&str] = &[
    "/usr/lib/vst",
    "/usr/local/lib/vst",
    "~/.vst",
    "/usr/lib/vst3",
    "/usr/local/lib/vst3",
    "~/.vst3",
    "/usr/lib/ladspa",
    "/usr/local/lib/ladspa",
    "~/.ladspa",
    "/usr/lib/lv2",
    "/usr/local/lib/lv2",
    "~/.lv2",
];

/// Standard plugin locations for this platform, home-expanded.
pub fn default_plugin_dirs() -> Vec<PathBuf> {
    DEFAULT_DIRS
        .iter()
        .map(|d| expand_home(PathBuf::from(d)))
        .collect()
}

/// Platform defaults followed by `extra`, without duplicates.
pub fn scan_dirs(extra: &[PathBuf]) -> Vec<PathBuf> {
    let mut dirs = default_plugin_dirs();
    for dir in extra {
        if !dirs.contains(dir) {
            dirs.push(dir.clone());
        }
    }
    dirs
}
