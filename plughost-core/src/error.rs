use std::io;
use std::path::PathBuf;

use thiserror::Error;

use plughost_net::HostError;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Host(#[from] HostError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid song: {0}")]
    Validation(String),

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
