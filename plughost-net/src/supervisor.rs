//! Host process lifecycle.

use std::fs;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use log::{info, warn};

use crate::error::{HostError, Result};

/// Starts and stops the host executable on behalf of a session.
pub trait Supervisor: Send {
    fn start(&mut self, pipe_name: &str) -> Result<()>;
    fn is_running(&mut self) -> bool;
    /// Wait up to `timeout` for a voluntary exit, then kill.
    fn stop(&mut self, timeout: Duration);
}

/// For sessions that never launch anything.
#[derive(Debug, Default)]
pub struct NoSupervisor;

impl Supervisor for NoSupervisor {
    fn start(&mut self, _pipe_name: &str) -> Result<()> {
        Err(HostError::Launch("no host executable configured".to_string()))
    }

    fn is_running(&mut self) -> bool {
        false
    }

    fn stop(&mut self, _timeout: Duration) {}
}

/// A child process running the host executable.
pub struct HostProcess {
    executable: PathBuf,
    child: Option<Child>,
}

const POLL_INTERVAL: Duration = Duration::from_millis(20);

impl HostProcess {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            child: None,
        }
    }

    pub fn log_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("plughost")
            .join("host.log")
    }

    fn output_file() -> Option<fs::File> {
        let path = Self::log_path();
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        fs::File::create(&path).ok()
    }

    fn redirect(file: &Option<fs::File>) -> Stdio {
        file.as_ref()
            .and_then(|f| f.try_clone().ok())
            .map(Stdio::from)
            .unwrap_or_else(Stdio::null)
    }
}

impl Supervisor for HostProcess {
    fn start(&mut self, pipe_name: &str) -> Result<()> {
        if self.is_running() {
            return Ok(());
        }
        // Host output goes to a log file for crash diagnostics
        let log_file = Self::output_file();
        let child = Command::new(&self.executable)
            .arg(pipe_name)
            .stdout(Self::redirect(&log_file))
            .stderr(Self::redirect(&log_file))
            .spawn()
            .map_err(|e| {
                HostError::Launch(format!("{}: {}", self.executable.display(), e))
            })?;
        info!("launched host {} (pid {})", self.executable.display(), child.id());
        self.child = Some(child);
        Ok(())
    }

    fn is_running(&mut self) -> bool {
        match self.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    fn stop(&mut self, timeout: Duration) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        let deadline = Instant::now() + timeout;
        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    info!("host exited with {}", status);
                    return;
                }
                Ok(None) if Instant::now() < deadline => thread::sleep(POLL_INTERVAL),
                Ok(None) => break,
                Err(e) => {
                    warn!("could not poll host process: {}", e);
                    break;
                }
            }
        }
        warn!("host did not exit within {:?}, killing", timeout);
        let _ = child.kill();
        let _ = child.wait();
    }
}

impl Drop for HostProcess {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}
