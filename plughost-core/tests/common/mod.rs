#![allow(dead_code)]
//! Test harness utilities for plughost-core integration tests.

use std::io;
use std::os::unix::net::UnixStream;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use plughost_net::{
    Channels, Command, Connector, HostControl, LoadReply, PipeNames, ScheduledCc, ScheduledNote,
    ScheduledParam, Session, SessionConfig, WireMessage, WireReader, WireWriter,
};
use plughost_types::{
    AudioConnection, CcRoute, OrderedNoteEntry, PluginDescriptor, ProcessorHandle, Timebase,
};

/// Host-side state a song push is expected to produce.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteState {
    pub params: Vec<ScheduledParam>,
    pub ccs: Vec<ScheduledCc>,
    pub notes: Vec<ScheduledNote>,
    pub ordered: Vec<OrderedNoteEntry>,
    pub plugins: Vec<ProcessorHandle>,
    pub connections: Vec<AudioConnection>,
    pub routes: Vec<CcRoute>,
}

/// In-memory [`HostControl`] that records calls and models remote state.
pub struct RecordingHost {
    pub timebase: Timebase,
    pub catalog: Vec<PluginDescriptor>,
    pub cached: Option<Vec<PluginDescriptor>>,
    pub calls: Vec<String>,
    pub remote: RemoteState,
}

impl RecordingHost {
    pub fn new(timebase: Timebase, catalog_uids: &[u32]) -> Self {
        Self {
            timebase,
            catalog: catalog_uids
                .iter()
                .map(|uid| PluginDescriptor::new(*uid, format!("Plugin {}", uid)))
                .collect(),
            cached: None,
            calls: Vec::new(),
            remote: RemoteState::default(),
        }
    }
}

impl HostControl for RecordingHost {
    fn timebase(&self) -> Timebase {
        self.timebase
    }

    fn clear_param_schedule(&mut self) -> plughost_net::Result<()> {
        self.calls.push("clear_param_schedule".into());
        self.remote.params.clear();
        Ok(())
    }

    fn schedule_param_change(&mut self, change: ScheduledParam) -> plughost_net::Result<()> {
        self.calls.push("schedule_param_change".into());
        self.remote.params.push(change);
        Ok(())
    }

    fn clear_midi_cc_schedule(&mut self) -> plughost_net::Result<()> {
        self.calls.push("clear_midi_cc_schedule".into());
        self.remote.ccs.clear();
        Ok(())
    }

    fn schedule_midi_cc(&mut self, cc: ScheduledCc) -> plughost_net::Result<()> {
        self.calls.push("schedule_midi_cc".into());
        self.remote.ccs.push(cc);
        Ok(())
    }

    fn clear_midi_schedule(&mut self) -> plughost_net::Result<()> {
        self.calls.push("clear_midi_schedule".into());
        self.remote.notes.clear();
        Ok(())
    }

    fn schedule_midi_note(&mut self, note: ScheduledNote) -> plughost_net::Result<()> {
        self.calls.push("schedule_midi_note".into());
        self.remote.notes.push(note);
        Ok(())
    }

    fn clear_ordered_notes(&mut self) -> plughost_net::Result<()> {
        self.calls.push("clear_ordered_notes".into());
        self.remote.ordered.clear();
        Ok(())
    }

    fn schedule_ordered_notes(&mut self, entries: &[OrderedNoteEntry]) -> plughost_net::Result<u32> {
        self.calls.push("schedule_ordered_notes".into());
        self.remote.ordered.extend_from_slice(entries);
        Ok(entries.len() as u32)
    }

    fn clear_all_plugins(&mut self) -> plughost_net::Result<()> {
        self.calls.push("clear_all_plugins".into());
        self.remote.plugins.clear();
        self.remote.connections.clear();
        self.remote.routes.clear();
        Ok(())
    }

    fn cached_plugins(&self) -> Option<&[PluginDescriptor]> {
        self.cached.as_deref()
    }

    fn list_plugins(&mut self) -> plughost_net::Result<Vec<PluginDescriptor>> {
        self.calls.push("list_plugins".into());
        self.cached = Some(self.catalog.clone());
        Ok(self.catalog.clone())
    }

    fn load_plugin_by_uid(&mut self, uid: u32, key: u32) -> plughost_net::Result<ProcessorHandle> {
        self.calls.push("load_plugin_by_uid".into());
        let handle = ProcessorHandle::new(uid, key);
        self.remote.plugins.push(handle);
        Ok(handle)
    }

    fn connect_audio(&mut self, connection: &AudioConnection) -> plughost_net::Result<()> {
        self.calls.push("connect_audio".into());
        self.remote.connections.push(*connection);
        Ok(())
    }

    fn route_cc_to_param(&mut self, route: &CcRoute) -> plughost_net::Result<()> {
        self.calls.push("route_cc_to_param".into());
        self.remote.routes.push(*route);
        Ok(())
    }
}

struct OnceConnector(Option<Channels>);

impl Connector for OnceConnector {
    fn open(&mut self, _names: &PipeNames) -> io::Result<Channels> {
        self.0
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "pipe not found"))
    }
}

/// A connected session whose host answers through `handler`, which returns
/// the encoded reply (if any) for each command.
pub fn session_with_host<F>(mut handler: F) -> (Session, JoinHandle<Vec<Command>>)
where
    F: FnMut(&Command) -> Option<WireWriter> + Send + 'static,
{
    let (client_cmd, mut host_cmd) = UnixStream::pair().unwrap();
    let (client_note, host_note) = UnixStream::pair().unwrap();
    let connector = OnceConnector(Some(Channels {
        commands: Box::new(client_cmd),
        notifications: Some(Box::new(client_note)),
    }));
    let config = SessionConfig {
        auto_launch: false,
        connect_attempts: 1,
        command_timeout: Some(Duration::from_secs(2)),
        shutdown_grace: Duration::from_millis(10),
        exit_timeout: Duration::from_millis(10),
        ..SessionConfig::default()
    };
    let mut session = Session::with_parts(
        config,
        Box::new(connector),
        Box::new(plughost_net::NoSupervisor),
    );
    session.connect().unwrap();

    let host = thread::spawn(move || {
        let _notifications = host_note;
        let mut received = Vec::new();
        while let Ok(command) = Command::decode(&mut WireReader::new(&mut host_cmd)) {
            if let Some(reply) = handler(&command) {
                if reply.send_to(&mut host_cmd).is_err() {
                    break;
                }
            }
            let done = command == Command::Shutdown;
            received.push(command);
            if done {
                break;
            }
        }
        received
    });
    (session, host)
}

pub fn encoded<T: WireMessage>(reply: &T) -> Option<WireWriter> {
    let mut w = WireWriter::new();
    reply.encode(&mut w);
    Some(w)
}

pub fn loaded(uid: u32) -> Option<WireWriter> {
    encoded(&LoadReply {
        success: true,
        name: format!("Plugin {}", uid),
        uid,
        message: String::new(),
    })
}
