//! Background reader for the notification pipe.

use std::io::{self, BufReader};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use log::{debug, error, info, warn};

use crate::protocol::{Notification, NotificationTag, ParamChange};
use crate::transport::Stream;
use crate::wire::WireReader;

/// Append-only record of parameter changes echoed by the host.
///
/// Shared between the listener thread and the session; cloning shares the
/// same buffer.
#[derive(Debug, Clone, Default)]
pub struct ParamChangeLog(Arc<Mutex<Vec<ParamChange>>>);

impl ParamChangeLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, Vec<ParamChange>> {
        // A panicked writer leaves the vec intact; keep using it
        self.0.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn push(&self, change: ParamChange) {
        self.entries().push(change);
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    pub fn snapshot(&self) -> Vec<ParamChange> {
        self.entries().clone()
    }

    /// Take all entries, leaving the log empty.
    pub fn drain(&self) -> Vec<ParamChange> {
        std::mem::take(&mut *self.entries())
    }
}

/// Fans decoded notifications out to subscribers.
///
/// Each subscriber gets its own unbounded queue from the moment it
/// subscribes. Dropped receivers are pruned on the next publish, so nothing
/// accumulates when nobody is listening.
#[derive(Debug, Clone, Default)]
pub struct NotificationHub(Arc<Mutex<Vec<Sender<Notification>>>>);

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn senders(&self) -> MutexGuard<'_, Vec<Sender<Notification>>> {
        self.0.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn subscribe(&self) -> Receiver<Notification> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.senders().push(tx);
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.senders().len()
    }

    pub fn publish(&self, notification: &Notification) {
        self.senders()
            .retain(|tx| tx.send(notification.clone()).is_ok());
    }

    /// Disconnect every subscriber; their receivers see the end of the stream.
    pub fn close(&self) {
        self.senders().clear();
    }
}

/// Why the listener loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerExit {
    /// Host sent its shutdown notification
    Goodbye,
    /// Stream closed between notifications
    Closed,
    /// Unknown tag, short read or IO failure
    Failed(String),
}

pub struct NotificationListener {
    handle: Option<JoinHandle<ListenerExit>>,
    closer: Box<dyn Stream>,
}

impl NotificationListener {
    pub fn spawn(
        stream: Box<dyn Stream>,
        log: ParamChangeLog,
        hub: NotificationHub,
    ) -> io::Result<Self> {
        let closer = stream.try_clone_boxed()?;
        let handle = thread::Builder::new()
            .name("plughost-notify".to_string())
            .spawn(move || {
                let exit = notification_reader_thread(stream, log, &hub);
                hub.close();
                exit
            })?;
        Ok(Self {
            handle: Some(handle),
            closer,
        })
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Close the pipe and wait up to `grace` for the thread to exit.
    ///
    /// Returns `None` when the thread is still blocked after the grace period;
    /// it is then detached.
    pub fn stop(mut self, grace: Duration) -> Option<ListenerExit> {
        let _ = self.closer.close();
        let handle = self.handle.take()?;
        let deadline = Instant::now() + grace;
        while !handle.is_finished() {
            if Instant::now() >= deadline {
                warn!("notification listener still running after {:?}, detaching", grace);
                return None;
            }
            thread::sleep(Duration::from_millis(5));
        }
        match handle.join() {
            Ok(exit) => Some(exit),
            Err(_) => Some(ListenerExit::Failed("listener panicked".to_string())),
        }
    }
}

impl Drop for NotificationListener {
    fn drop(&mut self) {
        if self.handle.is_some() {
            let _ = self.closer.close();
        }
    }
}

fn notification_reader_thread(
    stream: Box<dyn Stream>,
    log: ParamChangeLog,
    hub: &NotificationHub,
) -> ListenerExit {
    let mut reader = WireReader::new(BufReader::new(stream));

    loop {
        let raw = match reader.u8() {
            Ok(raw) => raw,
            Err(e) => {
                return match e.kind() {
                    io::ErrorKind::UnexpectedEof
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::BrokenPipe => {
                        info!("notification pipe closed");
                        ListenerExit::Closed
                    }
                    _ => {
                        error!("notification read error: {}", e);
                        ListenerExit::Failed(e.to_string())
                    }
                };
            }
        };

        let tag = match NotificationTag::try_from(raw) {
            Ok(tag) => tag,
            Err(raw) => {
                // No envelope, so the stream cannot be resynchronised
                error!("unknown notification tag {}", raw);
                return ListenerExit::Failed(format!("unknown notification tag {}", raw));
            }
        };

        let notification = match Notification::decode_body(tag, &mut reader) {
            Ok(n) => n,
            Err(e) => {
                error!("truncated {} notification: {}", tag, e);
                return ListenerExit::Failed(format!("truncated {} notification", tag));
            }
        };

        debug!("notification: {:?}", notification);

        if let Notification::ParamChanged(change) = &notification {
            log.push(*change);
        }

        let goodbye = notification == Notification::Shutdown;
        hub.publish(&notification);
        if goodbye {
            info!("host said goodbye");
            return ListenerExit::Goodbye;
        }
    }
}
