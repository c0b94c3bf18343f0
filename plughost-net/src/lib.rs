//! # plughost-net
//!
//! Client side of the plugin host's two-pipe protocol.
//!
//! The command pipe carries strictly ordered request/reply pairs from the
//! client; the notification pipe carries host-originated events and is owned
//! by a background listener thread. [`Session`] ties both together with the
//! host process lifecycle.

mod command;
mod control;
mod error;
mod notify;
mod protocol;
mod reply;
mod session;
mod supervisor;
mod transport;
mod wire;

pub use command::CommandChannel;
pub use control::HostControl;
pub use error::{HostError, Result};
pub use notify::{ListenerExit, NotificationHub, NotificationListener, ParamChangeLog};
pub use protocol::{
    CcActivity, Command, CommandTag, NoteActivity, Notification, NotificationTag, ParamChange,
    PlaybackAction, ScheduledCc, ScheduledNote, ScheduledParam, VelocityMode, WireMessage,
};
pub use reply::{ChannelsReply, LoadReply, ParamsReply, StatusReply, ValueReply};
pub use session::{ConnectionState, Session, SessionConfig, DEFAULT_PIPE_NAME};
pub use supervisor::{HostProcess, NoSupervisor, Supervisor};
pub use transport::{endpoint_path, Channels, Connector, PipeConnector, PipeLayout, PipeNames, Stream};
pub use wire::{WireReader, WireWriter};
