//! Connection lifecycle and the command API.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use crossbeam_channel::Receiver;
use log::{debug, error, info, warn};

use plughost_types::{
    AudioConnection, CcRoute, ChannelsInfo, OrderedNoteEntry, ParameterDescriptor,
    PluginDescriptor, ProcessorHandle, Timebase,
};

use crate::command::CommandChannel;
use crate::control::HostControl;
use crate::error::{HostError, Result};
use crate::notify::{NotificationHub, NotificationListener, ParamChangeLog};
use crate::protocol::{
    Command, CommandTag, Notification, PlaybackAction, ScheduledCc, ScheduledNote,
    ScheduledParam, VelocityMode, WireMessage,
};
use crate::reply::{ChannelsReply, LoadReply, ParamsReply, StatusReply, ValueReply};
use crate::supervisor::{HostProcess, NoSupervisor, Supervisor};
use crate::transport::{Channels, Connector, PipeConnector, PipeLayout, PipeNames};

pub const DEFAULT_PIPE_NAME: &str = "juceclientserver";

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub pipe_name: String,
    /// Host binary launched when the first connection attempt fails
    pub executable: Option<PathBuf>,
    pub auto_launch: bool,
    pub connect_attempts: u32,
    pub retry_delay: Duration,
    /// Wait after launching before the next attempt
    pub launch_grace: Duration,
    /// `None` blocks forever on a silent host. Pipes without a native read
    /// timeout are read on a helper thread to enforce it.
    pub command_timeout: Option<Duration>,
    pub shutdown_grace: Duration,
    pub exit_timeout: Duration,
    pub layout: PipeLayout,
    pub timebase: Timebase,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            pipe_name: DEFAULT_PIPE_NAME.to_string(),
            executable: None,
            auto_launch: true,
            connect_attempts: 5,
            retry_delay: Duration::from_millis(1000),
            launch_grace: Duration::from_millis(1000),
            command_timeout: Some(Duration::from_millis(10_000)),
            shutdown_grace: Duration::from_millis(500),
            exit_timeout: Duration::from_millis(3000),
            layout: PipeLayout::Dual,
            timebase: Timebase::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Launching,
    Connecting,
    Connected,
    Failed,
}

/// A client connection to one host process.
pub struct Session {
    config: SessionConfig,
    state: ConnectionState,
    connector: Box<dyn Connector>,
    supervisor: Box<dyn Supervisor>,
    commands: Option<CommandChannel>,
    listener: Option<NotificationListener>,
    param_log: ParamChangeLog,
    hub: NotificationHub,
    timebase: Timebase,
    available: Option<Vec<PluginDescriptor>>,
    loaded: BTreeMap<u32, ProcessorHandle>,
    params: HashMap<u32, Vec<ParameterDescriptor>>,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        let supervisor: Box<dyn Supervisor> = match &config.executable {
            Some(path) => Box::new(HostProcess::new(path)),
            None => Box::new(NoSupervisor),
        };
        Self::with_parts(config, Box::new(PipeConnector), supervisor)
    }

    pub fn with_parts(
        config: SessionConfig,
        connector: Box<dyn Connector>,
        supervisor: Box<dyn Supervisor>,
    ) -> Self {
        Self {
            timebase: config.timebase,
            config,
            state: ConnectionState::Disconnected,
            connector,
            supervisor,
            commands: None,
            listener: None,
            param_log: ParamChangeLog::new(),
            hub: NotificationHub::new(),
            available: None,
            loaded: BTreeMap::new(),
            params: HashMap::new(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Open both pipes, launching the host after the first failed attempt
    /// when auto-launch is on.
    pub fn connect(&mut self) -> Result<()> {
        if self.is_connected() {
            return Ok(());
        }
        let names = PipeNames::new(&self.config.pipe_name, self.config.layout);
        let attempts = self.config.connect_attempts.max(1);
        let mut reason = String::new();

        for attempt in 0..attempts {
            self.state = ConnectionState::Connecting;
            info!(
                "connecting to {} (attempt {}/{})",
                names.commands,
                attempt + 1,
                attempts
            );
            match self.connector.open(&names) {
                Ok(channels) => return self.attach(channels),
                Err(e) => {
                    warn!("could not open {}: {}", names.commands, e);
                    reason = e.to_string();
                }
            }
            if attempt + 1 == attempts {
                break;
            }
            if attempt == 0 && self.config.auto_launch && !self.supervisor.is_running() {
                self.state = ConnectionState::Launching;
                if let Err(e) = self.supervisor.start(&self.config.pipe_name) {
                    error!("{}", e);
                    self.state = ConnectionState::Failed;
                    return Err(e);
                }
                thread::sleep(self.config.launch_grace);
            } else {
                thread::sleep(self.config.retry_delay);
            }
        }

        self.state = ConnectionState::Failed;
        Err(HostError::Connection { attempts, reason })
    }

    fn attach(&mut self, channels: Channels) -> Result<()> {
        // Fresh hub per connection; a detached old listener can only close its own
        self.hub.close();
        self.hub = NotificationHub::new();
        let attached = CommandChannel::new(channels.commands, self.config.command_timeout)
            .and_then(|commands| {
                let listener = match channels.notifications {
                    Some(stream) => Some(NotificationListener::spawn(
                        stream,
                        self.param_log.clone(),
                        self.hub.clone(),
                    )?),
                    None => None,
                };
                Ok((commands, listener))
            });
        match attached {
            Ok((commands, listener)) => {
                self.commands = Some(commands);
                self.listener = listener;
                self.state = ConnectionState::Connected;
                info!("connected to host on {}", self.config.pipe_name);
                Ok(())
            }
            Err(e) => {
                self.state = ConnectionState::Failed;
                Err(e)
            }
        }
    }

    /// Drop the current pipes and run the connect sequence again.
    pub fn reconnect(&mut self) -> Result<()> {
        self.close_channels(false);
        self.connect()
    }

    /// Close the pipes and stop the host if this session launched it.
    pub fn disconnect(&mut self, shutdown: bool) {
        self.close_channels(shutdown);
        self.supervisor.stop(self.config.exit_timeout);
        info!("disconnected from host");
    }

    fn close_channels(&mut self, shutdown: bool) {
        if let Some(mut commands) = self.commands.take() {
            if shutdown {
                if let Err(e) = commands.send(&Command::Shutdown) {
                    warn!("shutdown command failed: {}", e);
                }
                thread::sleep(self.config.shutdown_grace);
            }
            commands.close();
        }
        if let Some(listener) = self.listener.take() {
            listener.stop(self.config.shutdown_grace);
        }
        self.loaded.clear();
        self.params.clear();
        self.state = ConnectionState::Disconnected;
    }

    // =========================================================================
    // Shared state
    // =========================================================================

    pub fn timebase(&self) -> Timebase {
        self.timebase
    }

    /// Tempo used to resolve beat positions.
    pub fn set_tempo(&mut self, bpm: f64) -> Result<()> {
        if !(bpm.is_finite() && bpm > 0.0) {
            return Err(HostError::Configuration(format!("invalid tempo {}", bpm)));
        }
        self.timebase.set_bpm(bpm);
        Ok(())
    }

    pub fn param_log(&self) -> &ParamChangeLog {
        &self.param_log
    }

    /// Subscribe to notifications decoded from now on. The receiver
    /// disconnects when the notification pipe closes; subscribe again after
    /// a reconnect.
    pub fn notifications(&self) -> Receiver<Notification> {
        self.hub.subscribe()
    }

    pub fn available_plugins(&self) -> Option<&[PluginDescriptor]> {
        self.available.as_deref()
    }

    pub fn loaded_processors(&self) -> impl Iterator<Item = ProcessorHandle> + '_ {
        self.loaded.values().copied()
    }

    // =========================================================================
    // Request plumbing
    // =========================================================================

    fn settle<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            if e.is_fatal() {
                error!("{}; dropping command pipe", e);
                if let Some(commands) = self.commands.take() {
                    commands.close();
                }
                self.state = ConnectionState::Failed;
            }
        }
        result
    }

    fn send(&mut self, command: Command) -> Result<()> {
        let result = match self.commands.as_mut() {
            Some(channel) => channel.send(&command),
            None => return Err(HostError::NotConnected),
        };
        self.settle(result)
    }

    fn request<T: WireMessage>(&mut self, command: Command) -> Result<T> {
        let result = match self.commands.as_mut() {
            Some(channel) => channel.request(&command),
            None => return Err(HostError::NotConnected),
        };
        self.settle(result)
    }

    /// Commands replying `success:u32, errmsg:str`.
    fn status(&mut self, command: Command) -> Result<()> {
        let tag = command.tag();
        let reply: StatusReply = self.request(command)?;
        if reply.success {
            Ok(())
        } else {
            Err(HostError::command(tag, reply.message))
        }
    }

    /// Commands replying a bare `success:u32`.
    fn ack(&mut self, command: Command) -> Result<()> {
        let tag = command.tag();
        if self.request::<bool>(command)? {
            Ok(())
        } else {
            Err(HostError::command(tag, ""))
        }
    }

    fn live(&self, key: u32) -> Result<()> {
        if self.loaded.contains_key(&key) {
            Ok(())
        } else {
            Err(HostError::Validation(format!(
                "no processor loaded with key {}",
                key
            )))
        }
    }

    fn check_param(&self, key: u32, param_index: u32) -> Result<()> {
        self.live(key)?;
        // Hosts may hide parameters, so indices need not be contiguous
        if let Some(params) = self.params.get(&key) {
            if !params.iter().any(|p| p.original_index == param_index) {
                return Err(HostError::Validation(format!(
                    "processor {} has no parameter with index {}",
                    key, param_index
                )));
            }
        }
        Ok(())
    }

    // =========================================================================
    // Plugins
    // =========================================================================

    /// `requested_uid` wins over the uid in the reply when the caller named one.
    fn load(
        &mut self,
        command: Command,
        key: u32,
        requested_uid: Option<u32>,
    ) -> Result<ProcessorHandle> {
        if self.loaded.contains_key(&key) {
            return Err(HostError::Validation(format!("key {} is already in use", key)));
        }
        let tag = command.tag();
        let reply: LoadReply = self.request(command)?;
        if !reply.success {
            return Err(HostError::command(tag, reply.message));
        }
        let uid = match requested_uid {
            Some(uid) => {
                if reply.uid != uid {
                    debug!("host reported uid {} for requested uid {}", reply.uid, uid);
                }
                uid
            }
            None => reply.uid,
        };
        let handle = ProcessorHandle::new(uid, key);
        info!("loaded {} as {}", reply.name, handle);
        self.loaded.insert(key, handle);
        Ok(handle)
    }

    pub fn load_plugin(&mut self, path: &Path, key: u32) -> Result<ProcessorHandle> {
        let path = path.to_string_lossy().into_owned();
        self.load(Command::LoadPlugin { path, key }, key, None)
    }

    pub fn load_plugin_by_uid(&mut self, uid: u32, key: u32) -> Result<ProcessorHandle> {
        self.load(Command::LoadPluginByIndex { uid, key }, key, Some(uid))
    }

    pub fn remove_plugin(&mut self, key: u32) -> Result<()> {
        self.live(key)?;
        self.send(Command::RemovePlugin { key })?;
        self.loaded.remove(&key);
        self.params.remove(&key);
        Ok(())
    }

    pub fn clear_all_plugins(&mut self) -> Result<()> {
        self.send(Command::ClearAllPlugins)?;
        self.loaded.clear();
        self.params.clear();
        Ok(())
    }

    /// Ask the host to scan `directories`, skipping `bad_paths`. Returns the
    /// number of plugins found.
    pub fn scan_plugins<S: AsRef<str>>(&mut self, directories: &[S], bad_paths: &[S]) -> Result<u32> {
        let command = Command::ScanPlugins {
            directories: directories.iter().map(|s| s.as_ref().to_string()).collect(),
            bad_paths: bad_paths.iter().map(|s| s.as_ref().to_string()).collect(),
        };
        let found = self.request::<u32>(command)?;
        self.available = None;
        info!("host scan found {} plugins", found);
        Ok(found)
    }

    /// Fetch and cache the host's plugin list.
    pub fn list_plugins(&mut self) -> Result<Vec<PluginDescriptor>> {
        let plugins: Vec<PluginDescriptor> = self.request(Command::ListPlugins)?;
        self.available = Some(plugins.clone());
        Ok(plugins)
    }

    pub fn list_bad_paths(&mut self) -> Result<Vec<String>> {
        self.request(Command::ListBadPaths)
    }

    pub fn plugin_info(&mut self, index: u32) -> Result<PluginDescriptor> {
        if let Some(available) = &self.available {
            if index as usize >= available.len() {
                return Err(HostError::Validation(format!(
                    "plugin index {} out of range ({} available)",
                    index,
                    available.len()
                )));
            }
        }
        self.request(Command::GetPluginInfo { index })
    }

    // =========================================================================
    // Processors
    // =========================================================================

    pub fn show_plugin_ui(&mut self, key: u32) -> Result<()> {
        self.live(key)?;
        self.status(Command::ShowPluginUi { key })
    }

    pub fn hide_plugin_ui(&mut self, key: u32) -> Result<()> {
        self.live(key)?;
        self.status(Command::HidePluginUi { key })
    }

    pub fn set_parameter(&mut self, key: u32, param_index: u32, value: f32) -> Result<()> {
        self.check_param(key, param_index)?;
        self.status(Command::SetParameter {
            key,
            param_index,
            value,
        })
    }

    pub fn get_parameter(&mut self, key: u32, param_index: u32) -> Result<f32> {
        self.check_param(key, param_index)?;
        let reply: ValueReply = self.request(Command::GetParameter { key, param_index })?;
        if reply.success {
            Ok(reply.value)
        } else {
            Err(HostError::command(CommandTag::GetParameter, reply.message))
        }
    }

    /// Parameter descriptors; cached to validate later parameter calls.
    pub fn params_info(&mut self, key: u32) -> Result<Vec<ParameterDescriptor>> {
        self.live(key)?;
        let reply: ParamsReply = self.request(Command::GetParamsInfo { key })?;
        if !reply.success {
            return Err(HostError::command(CommandTag::GetParamsInfo, reply.message));
        }
        self.params.insert(key, reply.params.clone());
        Ok(reply.params)
    }

    pub fn channels_info(&mut self, key: u32) -> Result<ChannelsInfo> {
        self.live(key)?;
        let reply: ChannelsReply = self.request(Command::GetChannelsInfo { key })?;
        if reply.success {
            Ok(reply.info)
        } else {
            Err(HostError::command(CommandTag::GetChannelsInfo, reply.message))
        }
    }

    pub fn connect_audio(&mut self, connection: &AudioConnection) -> Result<()> {
        self.live(connection.source.key)?;
        self.live(connection.dest.key)?;
        self.status(Command::ConnectAudio {
            source: connection.source.key,
            source_channel: connection.source_channel,
            dest: connection.dest.key,
            dest_channel: connection.dest_channel,
        })
    }

    pub fn connect_midi(&mut self, source: ProcessorHandle, dest: ProcessorHandle) -> Result<()> {
        self.live(source.key)?;
        self.live(dest.key)?;
        self.status(Command::ConnectMidi {
            source: source.key,
            dest: dest.key,
        })
    }

    // =========================================================================
    // Playback and schedules
    // =========================================================================

    /// Play up to `last_block`, rendering to `output_file` when given.
    pub fn start_playback(&mut self, last_block: u64, output_file: Option<&Path>) -> Result<()> {
        self.ack(Command::StartPlayback {
            last_block,
            output_file: output_file.map(|p| p.to_string_lossy().into_owned()),
        })
    }

    pub fn schedule_midi_note(&mut self, note: ScheduledNote) -> Result<()> {
        self.send(Command::ScheduleMidiNote(note))
    }

    pub fn schedule_midi_cc(&mut self, cc: ScheduledCc) -> Result<()> {
        self.send(Command::ScheduleMidiCc(cc))
    }

    pub fn schedule_param_change(&mut self, change: ScheduledParam) -> Result<()> {
        self.send(Command::ScheduleParamChange(change))
    }

    pub fn clear_midi_schedule(&mut self) -> Result<()> {
        self.send(Command::ClearMidiSchedule)
    }

    pub fn clear_midi_cc_schedule(&mut self) -> Result<()> {
        self.send(Command::ClearMidiCcSchedule)
    }

    pub fn clear_param_schedule(&mut self) -> Result<()> {
        self.send(Command::ClearParamSchedule)
    }

    pub fn schedule_ordered_notes(&mut self, entries: &[OrderedNoteEntry]) -> Result<u32> {
        self.request(Command::ScheduleOrderedNotes(entries.to_vec()))
    }

    pub fn start_ordered_playback(
        &mut self,
        use_keyboard_velocity: bool,
        use_keyboard_duration: bool,
    ) -> Result<()> {
        self.ack(Command::StartOrderedPlayback {
            use_keyboard_velocity,
            use_keyboard_duration,
        })
    }

    pub fn stop_ordered_playback(&mut self) -> Result<()> {
        self.ack(Command::StopOrderedPlayback)
    }

    pub fn clear_ordered_notes(&mut self) -> Result<()> {
        self.ack(Command::ClearOrderedNotes)
    }

    // =========================================================================
    // Live input routing
    // =========================================================================

    pub fn route_keyboard_input(&mut self, key: u32, velocity: VelocityMode) -> Result<()> {
        self.live(key)?;
        self.ack(Command::RouteKeyboardInput { key, velocity })
    }

    pub fn unroute_keyboard_input(&mut self) -> Result<()> {
        self.ack(Command::UnrouteKeyboardInput)
    }

    pub fn route_cc_to_param(&mut self, route: &CcRoute) -> Result<()> {
        self.check_param(route.processor.key, route.param_index)?;
        self.ack(Command::RouteCcToParam {
            key: route.processor.key,
            param_index: route.param_index,
            controller: route.controller as u32,
            channel: route.channel,
        })
    }

    pub fn unroute_cc_to_param(&mut self, key: u32, param_index: u32, controller: u8) -> Result<()> {
        self.live(key)?;
        self.ack(Command::UnrouteCcToParam {
            key,
            param_index,
            controller: controller as u32,
        })
    }

    pub fn show_virtual_keyboard(&mut self) -> Result<()> {
        self.ack(Command::ShowVirtualKeyboard)
    }

    pub fn hide_virtual_keyboard(&mut self) -> Result<()> {
        self.ack(Command::HideVirtualKeyboard)
    }

    pub fn route_virtual_keyboard(&mut self, key: u32, velocity: VelocityMode) -> Result<()> {
        self.live(key)?;
        self.ack(Command::RouteVirtualKeyboard { key, velocity })
    }

    pub fn unroute_virtual_keyboard(&mut self) -> Result<()> {
        self.ack(Command::UnrouteVirtualKeyboard)
    }

    // =========================================================================
    // Recording and audio files
    // =========================================================================

    /// Returns whether recording is now active.
    pub fn toggle_recording(&mut self) -> Result<bool> {
        self.request(Command::ToggleRecording)
    }

    /// Returns whether input monitoring is now active.
    pub fn toggle_monitoring(&mut self) -> Result<bool> {
        self.request(Command::ToggleMonitoring)
    }

    /// Load an audio file into a new player; returns the player id.
    pub fn load_audio_file(&mut self, path: &Path) -> Result<u32> {
        let path = path.to_string_lossy().into_owned();
        let player: i32 = self.request(Command::LoadAudioFile { path: path.clone() })?;
        u32::try_from(player).map_err(|_| {
            HostError::command(CommandTag::LoadAudioFile, format!("could not load {}", path))
        })
    }

    pub fn control_audio_playback(&mut self, player: u32, action: PlaybackAction) -> Result<()> {
        self.ack(Command::ControlAudioPlayback { player, action })
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(commands) = self.commands.take() {
            commands.close();
        }
        // Listener drop closes its pipe
        self.listener.take();
    }
}

impl HostControl for Session {
    fn timebase(&self) -> Timebase {
        self.timebase
    }

    fn clear_param_schedule(&mut self) -> Result<()> {
        Session::clear_param_schedule(self)
    }

    fn schedule_param_change(&mut self, change: ScheduledParam) -> Result<()> {
        Session::schedule_param_change(self, change)
    }

    fn clear_midi_cc_schedule(&mut self) -> Result<()> {
        Session::clear_midi_cc_schedule(self)
    }

    fn schedule_midi_cc(&mut self, cc: ScheduledCc) -> Result<()> {
        Session::schedule_midi_cc(self, cc)
    }

    fn clear_midi_schedule(&mut self) -> Result<()> {
        Session::clear_midi_schedule(self)
    }

    fn schedule_midi_note(&mut self, note: ScheduledNote) -> Result<()> {
        Session::schedule_midi_note(self, note)
    }

    fn clear_ordered_notes(&mut self) -> Result<()> {
        Session::clear_ordered_notes(self)
    }

    fn schedule_ordered_notes(&mut self, entries: &[OrderedNoteEntry]) -> Result<u32> {
        Session::schedule_ordered_notes(self, entries)
    }

    fn clear_all_plugins(&mut self) -> Result<()> {
        Session::clear_all_plugins(self)
    }

    fn cached_plugins(&self) -> Option<&[PluginDescriptor]> {
        self.available_plugins()
    }

    fn list_plugins(&mut self) -> Result<Vec<PluginDescriptor>> {
        Session::list_plugins(self)
    }

    fn load_plugin_by_uid(&mut self, uid: u32, key: u32) -> Result<ProcessorHandle> {
        Session::load_plugin_by_uid(self, uid, key)
    }

    fn connect_audio(&mut self, connection: &AudioConnection) -> Result<()> {
        Session::connect_audio(self, connection)
    }

    fn route_cc_to_param(&mut self, route: &CcRoute) -> Result<()> {
        Session::route_cc_to_param(self, route)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calls_before_connect_fail_cleanly() {
        let mut session = Session::new(SessionConfig::default());
        assert_eq!(session.state(), ConnectionState::Disconnected);
        assert!(matches!(session.toggle_recording(), Err(HostError::NotConnected)));
        assert!(matches!(
            session.clear_midi_schedule(),
            Err(HostError::NotConnected)
        ));
    }

    #[test]
    fn unknown_key_is_validation_error() {
        let mut session = Session::new(SessionConfig::default());
        let err = session.set_parameter(3, 0, 0.5).unwrap_err();
        assert!(matches!(err, HostError::Validation(_)));
    }

    #[test]
    fn tempo_must_be_positive() {
        let mut session = Session::new(SessionConfig::default());
        assert!(matches!(session.set_tempo(0.0), Err(HostError::Configuration(_))));
        session.set_tempo(120.0).unwrap();
        assert_eq!(session.timebase().bpm, Some(120.0));
    }
}
