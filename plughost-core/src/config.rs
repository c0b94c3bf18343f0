use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use plughost_net::{PipeLayout, SessionConfig};
use plughost_types::Timebase;

use crate::error::Result;

const DEFAULT_CONFIG: &str = include_str!("../config.toml");

#[derive(Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    host: HostConfig,
    #[serde(default)]
    audio: AudioConfig,
    #[serde(default)]
    plugins: PluginsConfig,
}

#[derive(Deserialize, Default)]
struct HostConfig {
    pipe_name: Option<String>,
    executable: Option<PathBuf>,
    auto_launch: Option<bool>,
    connect_attempts: Option<u32>,
    retry_delay_ms: Option<u64>,
    launch_grace_ms: Option<u64>,
    command_timeout_ms: Option<u64>,
    shutdown_grace_ms: Option<u64>,
    exit_timeout_ms: Option<u64>,
    layout: Option<String>,
}

#[derive(Deserialize, Default)]
struct AudioConfig {
    sample_rate: Option<u32>,
    block_size: Option<u32>,
    bpm: Option<f64>,
}

#[derive(Deserialize, Default)]
struct PluginsConfig {
    directories: Option<Vec<String>>,
    bad_paths_file: Option<PathBuf>,
}

pub struct Config {
    host: HostConfig,
    audio: AudioConfig,
    plugins: PluginsConfig,
}

impl Config {
    /// Embedded defaults overlaid with the user's config file, if any.
    pub fn load() -> Self {
        Self::load_from(user_config_path().as_deref())
    }

    /// Like [`Config::load`] with an explicit user file.
    pub fn load_from(path: Option<&Path>) -> Self {
        let mut base = embedded();

        if let Some(path) = path {
            if path.exists() {
                match std::fs::read_to_string(path) {
                    Ok(contents) => match toml::from_str::<ConfigFile>(&contents) {
                        Ok(user) => merge(&mut base, user),
                        Err(e) => {
                            log::warn!(target: "config", "ignoring malformed config {}: {}", path.display(), e)
                        }
                    },
                    Err(e) => {
                        log::warn!(target: "config", "could not read config {}: {}", path.display(), e)
                    }
                }
            }
        }

        Self::from_file(base)
    }

    /// Parse `contents` over the embedded defaults, failing on bad TOML.
    pub fn parse(contents: &str) -> Result<Self> {
        let mut base = embedded();
        let user: ConfigFile = toml::from_str(contents)?;
        merge(&mut base, user);
        Ok(Self::from_file(base))
    }

    fn from_file(file: ConfigFile) -> Self {
        Config {
            host: file.host,
            audio: file.audio,
            plugins: file.plugins,
        }
    }

    pub fn layout(&self) -> PipeLayout {
        match self.host.layout.as_deref().map(str::to_lowercase).as_deref() {
            Some("single") => PipeLayout::Single,
            Some("dual") | None => PipeLayout::Dual,
            Some(other) => {
                log::warn!(target: "config", "unknown pipe layout {:?}, using dual", other);
                PipeLayout::Dual
            }
        }
    }

    pub fn timebase(&self) -> Timebase {
        let fallback = Timebase::default();
        let mut timebase = Timebase::new(
            self.audio.sample_rate.unwrap_or(fallback.sample_rate),
            self.audio.block_size.unwrap_or(fallback.block_size),
        );
        if let Some(bpm) = self.audio.bpm {
            timebase.set_bpm(bpm);
        }
        timebase
    }

    pub fn session_config(&self) -> SessionConfig {
        let fallback = SessionConfig::default();
        let ms = |v: Option<u64>, d: Duration| v.map(Duration::from_millis).unwrap_or(d);
        SessionConfig {
            pipe_name: self
                .host
                .pipe_name
                .clone()
                .unwrap_or(fallback.pipe_name),
            executable: self.host.executable.clone().map(expand_home),
            auto_launch: self.host.auto_launch.unwrap_or(fallback.auto_launch),
            connect_attempts: self
                .host
                .connect_attempts
                .unwrap_or(fallback.connect_attempts)
                .max(1),
            retry_delay: ms(self.host.retry_delay_ms, fallback.retry_delay),
            launch_grace: ms(self.host.launch_grace_ms, fallback.launch_grace),
            // 0 disables the timeout
            command_timeout: match self.host.command_timeout_ms {
                Some(0) => None,
                Some(t) => Some(Duration::from_millis(t)),
                None => fallback.command_timeout,
            },
            shutdown_grace: ms(self.host.shutdown_grace_ms, fallback.shutdown_grace),
            exit_timeout: ms(self.host.exit_timeout_ms, fallback.exit_timeout),
            layout: self.layout(),
            timebase: self.timebase(),
        }
    }

    /// Extra scan directories on top of the platform defaults.
    pub fn plugin_directories(&self) -> Vec<PathBuf> {
        self.plugins
            .directories
            .iter()
            .flatten()
            .map(|d| expand_home(PathBuf::from(d)))
            .collect()
    }

    pub fn bad_paths_file(&self) -> PathBuf {
        self.plugins
            .bad_paths_file
            .clone()
            .map(expand_home)
            .unwrap_or_else(default_bad_paths_file)
    }
}

fn embedded() -> ConfigFile {
    match toml::from_str(DEFAULT_CONFIG) {
        Ok(file) => file,
        Err(e) => {
            log::error!(target: "config", "embedded config.toml is invalid: {}", e);
            ConfigFile::default()
        }
    }
}

pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("plughost")
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("plughost").join("config.toml"))
}

fn default_bad_paths_file() -> PathBuf {
    config_dir().join("badpaths.json")
}

/// Replace a leading `~` with the home directory.
pub fn expand_home(path: PathBuf) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path;
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path,
    }
}

fn merge(base: &mut ConfigFile, user: ConfigFile) {
    merge_host(&mut base.host, user.host);
    merge_audio(&mut base.audio, user.audio);
    merge_plugins(&mut base.plugins, user.plugins);
}

fn merge_host(base: &mut HostConfig, user: HostConfig) {
    if user.pipe_name.is_some() {
        base.pipe_name = user.pipe_name;
    }
    if user.executable.is_some() {
        base.executable = user.executable;
    }
    if user.auto_launch.is_some() {
        base.auto_launch = user.auto_launch;
    }
    if user.connect_attempts.is_some() {
        base.connect_attempts = user.connect_attempts;
    }
    if user.retry_delay_ms.is_some() {
        base.retry_delay_ms = user.retry_delay_ms;
    }
    if user.launch_grace_ms.is_some() {
        base.launch_grace_ms = user.launch_grace_ms;
    }
    if user.command_timeout_ms.is_some() {
        base.command_timeout_ms = user.command_timeout_ms;
    }
    if user.shutdown_grace_ms.is_some() {
        base.shutdown_grace_ms = user.shutdown_grace_ms;
    }
    if user.exit_timeout_ms.is_some() {
        base.exit_timeout_ms = user.exit_timeout_ms;
    }
    if user.layout.is_some() {
        base.layout = user.layout;
    }
}

fn merge_audio(base: &mut AudioConfig, user: AudioConfig) {
    if user.sample_rate.is_some() {
        base.sample_rate = user.sample_rate;
    }
    if user.block_size.is_some() {
        base.block_size = user.block_size;
    }
    if user.bpm.is_some() {
        base.bpm = user.bpm;
    }
}

fn merge_plugins(base: &mut PluginsConfig, user: PluginsConfig) {
    if user.directories.is_some() {
        base.directories = user.directories;
    }
    if user.bad_paths_file.is_some() {
        base.bad_paths_file = user.bad_paths_file;
    }
}
