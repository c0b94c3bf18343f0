//! Synchronous request/reply over the command pipe.

use std::io::{self, Read};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use log::{debug, warn};

use crate::error::{HostError, Result};
use crate::protocol::{Command, WireMessage};
use crate::transport::Stream;
use crate::wire::{WireReader, WireWriter};

/// One outstanding request at a time; replies are matched by program order.
pub struct CommandChannel {
    stream: Box<dyn Stream>,
    /// Set when the stream cannot time out reads itself
    pump: Option<ReplyPump>,
    timeout: Option<Duration>,
}

impl CommandChannel {
    pub fn new(stream: Box<dyn Stream>, timeout: Option<Duration>) -> Result<Self> {
        let pump = match stream.set_read_timeout(timeout) {
            Ok(()) => None,
            Err(e) if e.kind() == io::ErrorKind::Unsupported => {
                debug!("no native read timeout ({}), reading replies on a helper thread", e);
                Some(ReplyPump::spawn(stream.try_clone_boxed()?, timeout)?)
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            stream,
            pump,
            timeout,
        })
    }

    fn timeout_ms(&self) -> u64 {
        self.timeout.map(|t| t.as_millis() as u64).unwrap_or(0)
    }

    /// Write a command that has no reply.
    pub fn send(&mut self, command: &Command) -> Result<()> {
        let mut w = WireWriter::new();
        command.encode(&mut w);
        w.send_to(&mut *self.stream)?;
        Ok(())
    }

    /// Write a command and block until its reply is fully read.
    pub fn request<T: WireMessage>(&mut self, command: &Command) -> Result<T> {
        self.send(command)?;
        let tag = command.tag();
        let timeout_ms = self.timeout_ms();
        let decoded = match &mut self.pump {
            Some(pump) => T::decode(&mut WireReader::new(pump)),
            None => T::decode(&mut WireReader::new(&mut *self.stream)),
        };
        decoded.map_err(|e| HostError::from_reply_io(e, tag, timeout_ms))
    }

    pub fn close(&self) {
        let _ = self.stream.close();
    }
}

/// Reads the command pipe on its own thread and hands chunks over a channel,
/// so each read can wait with a deadline.
///
/// The thread blocks in `read` until the host closes the pipe. A channel that
/// timed out is dropped by the session, which leaves the thread detached.
struct ReplyPump {
    chunks: Receiver<io::Result<Vec<u8>>>,
    pending: Vec<u8>,
    pos: usize,
    timeout: Option<Duration>,
    finished: bool,
}

impl ReplyPump {
    fn spawn(mut stream: Box<dyn Stream>, timeout: Option<Duration>) -> io::Result<Self> {
        let (tx, chunks) = crossbeam_channel::unbounded();
        thread::Builder::new()
            .name("plughost-replies".to_string())
            .spawn(move || {
                let mut buf = [0u8; 4096];
                loop {
                    let chunk = match stream.read(&mut buf) {
                        Ok(0) => break,
                        Ok(n) => Ok(buf[..n].to_vec()),
                        Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                        Err(e) => Err(e),
                    };
                    let failed = chunk.is_err();
                    if tx.send(chunk).is_err() || failed {
                        break;
                    }
                }
                debug!("reply reader exiting");
            })?;
        Ok(Self {
            chunks,
            pending: Vec::new(),
            pos: 0,
            timeout,
            finished: false,
        })
    }

    fn next_chunk(&mut self) -> io::Result<Option<Vec<u8>>> {
        let received = match self.timeout {
            Some(timeout) => self.chunks.recv_timeout(timeout),
            None => self.chunks.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match received {
            Ok(chunk) => chunk.map(Some),
            Err(RecvTimeoutError::Timeout) => {
                warn!("no reply bytes within {:?}", self.timeout);
                Err(io::ErrorKind::TimedOut.into())
            }
            Err(RecvTimeoutError::Disconnected) => Ok(None),
        }
    }
}

impl Read for ReplyPump {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while self.pos >= self.pending.len() {
            if self.finished {
                return Ok(0);
            }
            match self.next_chunk()? {
                Some(chunk) => {
                    self.pending = chunk;
                    self.pos = 0;
                }
                None => self.finished = true,
            }
        }
        let n = buf.len().min(self.pending.len() - self.pos);
        buf[..n].copy_from_slice(&self.pending[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}
