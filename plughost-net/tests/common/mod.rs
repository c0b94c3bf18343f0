#![allow(dead_code)]
//! Test harness utilities for plughost-net integration tests.
//!
//! The mock host runs on a thread and talks to a real [`Session`] over
//! in-process socket pairs, decoding with the crate's own codec.

use std::io::{self, ErrorKind, Write};
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use plughost_net::{
    Channels, ChannelsReply, Command, Connector, HostError, LoadReply, Notification, ParamsReply,
    PipeNames, Session, SessionConfig, StatusReply, Supervisor, ValueReply, WireMessage,
    WireReader, WireWriter,
};
use plughost_types::{ParameterDescriptor, ParameterRange, PluginDescriptor};

/// Session config with delays short enough for tests.
pub fn fast_config() -> SessionConfig {
    SessionConfig {
        pipe_name: "plughost-test".to_string(),
        retry_delay: Duration::from_millis(1),
        launch_grace: Duration::from_millis(1),
        command_timeout: Some(Duration::from_secs(2)),
        shutdown_grace: Duration::from_millis(20),
        exit_timeout: Duration::from_millis(20),
        ..SessionConfig::default()
    }
}

/// Host side of both pipes.
pub struct HostEnd {
    pub commands: UnixStream,
    pub notifications: UnixStream,
}

impl HostEnd {
    pub fn recv(&mut self) -> io::Result<Command> {
        Command::decode(&mut WireReader::new(&mut self.commands))
    }

    pub fn reply<T: WireMessage>(&mut self, reply: &T) {
        let mut w = WireWriter::new();
        reply.encode(&mut w);
        w.send_to(&mut self.commands).unwrap();
    }

    /// Write raw bytes on the command pipe.
    pub fn reply_raw(&mut self, bytes: &[u8]) {
        self.commands.write_all(bytes).unwrap();
    }

    pub fn notify(&mut self, notification: &Notification) {
        let mut w = WireWriter::new();
        notification.encode(&mut w);
        w.send_to(&mut self.notifications).unwrap();
    }
}

/// Hands out prepared socket-pair ends, failing the first `failures` opens.
pub struct PairConnector {
    ends: Option<Channels>,
    failures: u32,
    pub opens: Arc<AtomicU32>,
}

impl PairConnector {
    pub fn new(failures: u32) -> (Self, HostEnd) {
        let (client_cmd, host_cmd) = UnixStream::pair().unwrap();
        let (client_note, host_note) = UnixStream::pair().unwrap();
        let connector = Self {
            ends: Some(Channels {
                commands: Box::new(client_cmd),
                notifications: Some(Box::new(client_note)),
            }),
            failures,
            opens: Arc::new(AtomicU32::new(0)),
        };
        let host = HostEnd {
            commands: host_cmd,
            notifications: host_note,
        };
        (connector, host)
    }
}

impl Connector for PairConnector {
    fn open(&mut self, _names: &PipeNames) -> io::Result<Channels> {
        let n = self.opens.fetch_add(1, Ordering::SeqCst);
        if n < self.failures {
            return Err(io::Error::new(ErrorKind::NotFound, "pipe not found"));
        }
        self.ends
            .take()
            .ok_or_else(|| io::Error::new(ErrorKind::ConnectionRefused, "ends already taken"))
    }
}

/// Counts lifecycle calls instead of spawning anything.
#[derive(Default)]
pub struct CountingSupervisor {
    pub starts: Arc<AtomicU32>,
    pub stops: Arc<AtomicU32>,
    pub fail_start: bool,
    pub running: bool,
}

impl Supervisor for CountingSupervisor {
    fn start(&mut self, _pipe_name: &str) -> plughost_net::Result<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        if self.fail_start {
            return Err(HostError::Launch("test host refuses to start".to_string()));
        }
        self.running = true;
        Ok(())
    }

    fn is_running(&mut self) -> bool {
        self.running
    }

    fn stop(&mut self, _timeout: Duration) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.running = false;
    }
}

/// A session connected to a mock host on the first attempt.
pub fn connected_session() -> (Session, HostEnd) {
    let (connector, host) = PairConnector::new(0);
    let mut session = Session::with_parts(
        fast_config(),
        Box::new(connector),
        Box::new(CountingSupervisor::default()),
    );
    session.connect().unwrap();
    (session, host)
}

pub fn synth_descriptor(uid: u32) -> PluginDescriptor {
    PluginDescriptor {
        is_instrument: true,
        num_outputs: 2,
        format_name: "VST3".to_string(),
        manufacturer: "Test".to_string(),
        ..PluginDescriptor::new(uid, "Synth")
    }
}

pub fn param_descriptors(count: u32) -> Vec<ParameterDescriptor> {
    (0..count)
        .map(|i| ParameterDescriptor {
            original_index: i,
            name: format!("Param {}", i),
            range: ParameterRange::default(),
            value: 0.0,
            num_steps: 0x7fff_ffff,
            flags: Default::default(),
        })
        .collect()
}

/// Successful reply for every command that has one.
pub fn canned_reply(command: &Command) -> Option<WireWriter> {
    let mut w = WireWriter::new();
    match command {
        Command::LoadPlugin { .. } => LoadReply {
            success: true,
            name: "Synth".to_string(),
            uid: 7,
            message: String::new(),
        }
        .encode(&mut w),
        // Hosts do not echo the requested uid
        Command::LoadPluginByIndex { .. } => LoadReply {
            success: true,
            name: "Synth".to_string(),
            uid: 0,
            message: String::new(),
        }
        .encode(&mut w),
        Command::ScanPlugins { .. } => 5u32.encode(&mut w),
        Command::ListPlugins => vec![synth_descriptor(7), synth_descriptor(9)].encode(&mut w),
        Command::GetPluginInfo { .. } => synth_descriptor(7).encode(&mut w),
        Command::ShowPluginUi { .. }
        | Command::HidePluginUi { .. }
        | Command::SetParameter { .. }
        | Command::ConnectAudio { .. }
        | Command::ConnectMidi { .. } => StatusReply::ok().encode(&mut w),
        Command::GetParameter { .. } => ValueReply {
            success: true,
            value: 0.5,
            message: String::new(),
        }
        .encode(&mut w),
        Command::ListBadPaths => vec!["/bad/one.so".to_string()].encode(&mut w),
        Command::GetParamsInfo { .. } => ParamsReply {
            success: true,
            params: param_descriptors(4),
            message: String::new(),
        }
        .encode(&mut w),
        Command::GetChannelsInfo { .. } => ChannelsReply {
            success: true,
            ..Default::default()
        }
        .encode(&mut w),
        Command::LoadAudioFile { .. } => 2i32.encode(&mut w),
        Command::ScheduleOrderedNotes(entries) => (entries.len() as u32).encode(&mut w),
        Command::ToggleRecording | Command::ToggleMonitoring => true.encode(&mut w),
        other if other.tag().has_reply() => true.encode(&mut w),
        _ => return None,
    }
    Some(w)
}

/// Serve commands on a thread until the pipe closes or shutdown arrives.
/// Returns every command received.
pub fn spawn_host<F>(mut host: HostEnd, mut handler: F) -> JoinHandle<Vec<Command>>
where
    F: FnMut(&Command, &mut HostEnd) + Send + 'static,
{
    thread::spawn(move || {
        let mut received = Vec::new();
        while let Ok(command) = host.recv() {
            handler(&command, &mut host);
            let done = command == Command::Shutdown;
            received.push(command);
            if done {
                break;
            }
        }
        received
    })
}

/// A host that answers everything successfully.
pub fn spawn_canned_host(host: HostEnd) -> JoinHandle<Vec<Command>> {
    spawn_host(host, |command, host| {
        if let Some(w) = canned_reply(command) {
            w.send_to(&mut host.commands).unwrap();
        }
    })
}
