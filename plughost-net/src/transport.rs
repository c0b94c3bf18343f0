//! Byte-stream endpoints for the two host pipes.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A connected pipe endpoint.
pub trait Stream: Read + Write + Send {
    /// Bound blocking reads; `None` waits forever.
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()>;

    /// Second handle on the same endpoint, used to close it from another thread.
    fn try_clone_boxed(&self) -> io::Result<Box<dyn Stream>>;

    /// Unblock pending reads on every handle of this endpoint.
    fn close(&self) -> io::Result<()>;
}

#[cfg(unix)]
impl Stream for std::os::unix::net::UnixStream {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        std::os::unix::net::UnixStream::set_read_timeout(self, timeout)
    }

    fn try_clone_boxed(&self) -> io::Result<Box<dyn Stream>> {
        Ok(Box::new(self.try_clone()?))
    }

    fn close(&self) -> io::Result<()> {
        match self.shutdown(std::net::Shutdown::Both) {
            // Peer already gone
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            other => other,
        }
    }
}

/// Named pipes opened as files.
///
/// Files have no native read timeout; `CommandChannel` falls back to reading
/// replies on a helper thread. `close` cannot interrupt a read already blocked
/// on another handle, so a listener on a file pipe only exits once the host
/// closes its end.
impl Stream for File {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        match timeout {
            None => Ok(()),
            Some(_) => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "read timeouts are not supported on file pipes",
            )),
        }
    }

    fn try_clone_boxed(&self) -> io::Result<Box<dyn Stream>> {
        Ok(Box::new(self.try_clone()?))
    }

    fn close(&self) -> io::Result<()> {
        Ok(())
    }
}

/// Whether the host speaks on one pipe or two.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipeLayout {
    /// Separate command and notification pipes
    #[default]
    Dual,
    /// Command pipe only, no notifications
    Single,
}

/// Endpoint names derived from the configured pipe name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipeNames {
    pub commands: String,
    pub notifications: Option<String>,
}

impl PipeNames {
    pub fn new(pipe_name: &str, layout: PipeLayout) -> Self {
        match layout {
            PipeLayout::Dual => Self {
                commands: format!("{}_commands", pipe_name),
                notifications: Some(format!("{}_notifications", pipe_name)),
            },
            PipeLayout::Single => Self {
                commands: pipe_name.to_string(),
                notifications: None,
            },
        }
    }
}

/// Filesystem location of a named endpoint.
pub fn endpoint_path(name: &str) -> PathBuf {
    #[cfg(windows)]
    {
        PathBuf::from(format!(r"\\.\pipe\{}", name))
    }
    #[cfg(not(windows))]
    {
        std::env::temp_dir().join(name)
    }
}

/// Both endpoints of one connection.
pub struct Channels {
    pub commands: Box<dyn Stream>,
    pub notifications: Option<Box<dyn Stream>>,
}

/// Opens endpoints. Swapped out in tests for in-process streams.
pub trait Connector: Send {
    fn open(&mut self, names: &PipeNames) -> io::Result<Channels>;
}

/// Connects to the host's real pipes.
#[derive(Debug, Default, Clone, Copy)]
pub struct PipeConnector;

impl PipeConnector {
    fn open_one(name: &str) -> io::Result<Box<dyn Stream>> {
        let path = endpoint_path(name);
        #[cfg(unix)]
        {
            let stream = std::os::unix::net::UnixStream::connect(&path)?;
            Ok(Box::new(stream))
        }
        #[cfg(not(unix))]
        {
            let file = std::fs::OpenOptions::new()
                .read(true)
                .write(true)
                .open(&path)?;
            Ok(Box::new(file))
        }
    }
}

impl Connector for PipeConnector {
    fn open(&mut self, names: &PipeNames) -> io::Result<Channels> {
        let commands = Self::open_one(&names.commands)?;
        let notifications = match &names.notifications {
            Some(name) => Some(Self::open_one(name)?),
            None => None,
        };
        Ok(Channels {
            commands,
            notifications,
        })
    }
}
