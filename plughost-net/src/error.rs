//! Error types for the host connection

use std::io;
use thiserror::Error;

use crate::protocol::CommandTag;

#[derive(Error, Debug)]
pub enum HostError {
    #[error("Connection failed after {attempts} attempt(s): {reason}")]
    Connection { attempts: u32, reason: String },

    #[error("Could not launch host: {0}")]
    Launch(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("{command} failed: {message}")]
    Command { command: CommandTag, message: String },

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Timeout after {duration_ms}ms waiting for {command} reply")]
    Timeout { command: CommandTag, duration_ms: u64 },

    #[error("Not connected to host")]
    NotConnected,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl HostError {
    /// Errors after which the command stream can no longer be trusted.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            HostError::Protocol(_) | HostError::Timeout { .. } | HostError::Io(_)
        )
    }

    pub(crate) fn command(command: CommandTag, message: impl Into<String>) -> Self {
        let message = message.into();
        HostError::Command {
            command,
            message: if message.is_empty() {
                "host reported failure".to_string()
            } else {
                message
            },
        }
    }

    /// Classify an IO error raised while a reply to `command` was being read.
    pub(crate) fn from_reply_io(err: io::Error, command: CommandTag, timeout_ms: u64) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof => HostError::Protocol(format!(
                "stream closed mid-reply to {}",
                command
            )),
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => HostError::Timeout {
                command,
                duration_ms: timeout_ms,
            },
            io::ErrorKind::InvalidData => HostError::Protocol(err.to_string()),
            _ => HostError::Io(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, HostError>;
