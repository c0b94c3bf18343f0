//! Command and notification tag tables.
//!
//! Every message starts with a one-byte tag followed by that tag's fixed field
//! sequence. Tags decode into exhaustively matched enums so a new tag can
//! never be silently read with another tag's layout.

use std::io::{self, Read};

use serde::{Deserialize, Serialize};

use plughost_types::{MidiChannel, OrderedNoteEntry};

use crate::wire::{WireReader, WireWriter};

/// A value with a fixed wire layout.
pub trait WireMessage: Sized {
    fn encode(&self, w: &mut WireWriter);
    fn decode<R: Read>(r: &mut WireReader<R>) -> io::Result<Self>;
}

fn invalid_data(msg: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

macro_rules! wire_tags {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($variant:ident = $value:literal => $text:literal,)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[repr(u8)]
        pub enum $name {
            $($variant = $value,)*
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant,)*];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text,)*
                }
            }
        }

        impl TryFrom<u8> for $name {
            type Error = u8;

            fn try_from(value: u8) -> std::result::Result<Self, u8> {
                match value {
                    $($value => Ok($name::$variant),)*
                    other => Err(other),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

wire_tags! {
    /// Command pipe tags, client to host.
    pub enum CommandTag {
        LoadPlugin = 0 => "load_plugin",
        LoadPluginByIndex = 1 => "load_plugin_by_index",
        ScanPlugins = 2 => "scan_plugins",
        ListPlugins = 3 => "list_plugins",
        GetPluginInfo = 4 => "get_plugin_info",
        ShowPluginUi = 5 => "show_plugin_ui",
        HidePluginUi = 6 => "hide_plugin_ui",
        SetParameter = 7 => "set_parameter",
        GetParameter = 8 => "get_parameter",
        ConnectAudio = 9 => "connect_audio",
        ConnectMidi = 10 => "connect_midi",
        StartPlayback = 11 => "start_playback",
        Shutdown = 12 => "shutdown",
        RemovePlugin = 13 => "remove_plugin",
        ListBadPaths = 14 => "list_bad_paths",
        GetParamsInfo = 15 => "get_params_info",
        GetChannelsInfo = 16 => "get_channels_info",
        ScheduleMidiNote = 17 => "schedule_midi_note",
        ScheduleMidiCc = 18 => "schedule_midi_cc",
        ClearMidiSchedule = 19 => "clear_midi_schedule",
        ScheduleParamChange = 20 => "schedule_param_change",
        RouteKeyboardInput = 21 => "route_keyboard_input",
        UnrouteKeyboardInput = 22 => "unroute_keyboard_input",
        RouteCcToParam = 23 => "route_cc_to_param",
        UnrouteCcToParam = 24 => "unroute_cc_to_param",
        ShowVirtualKeyboard = 25 => "show_virtual_keyboard",
        HideVirtualKeyboard = 26 => "hide_virtual_keyboard",
        RouteVirtualKeyboard = 27 => "route_virtual_keyboard",
        UnrouteVirtualKeyboard = 28 => "unroute_virtual_keyboard",
        ToggleRecording = 29 => "toggle_recording",
        ToggleMonitoring = 30 => "toggle_monitoring",
        LoadAudioFile = 31 => "load_audio_file",
        ControlAudioPlayback = 32 => "control_audio_playback",
        ScheduleOrderedNotes = 33 => "schedule_ordered_notes",
        StartOrderedPlayback = 34 => "start_ordered_playback",
        StopOrderedPlayback = 35 => "stop_ordered_playback",
        ClearOrderedNotes = 36 => "clear_ordered_notes",
        ClearMidiCcSchedule = 37 => "clear_midi_cc_schedule",
        ClearParamSchedule = 38 => "clear_param_schedule",
        ClearAllPlugins = 39 => "clear_all_plugins",
    }
}

impl CommandTag {
    /// Whether the host writes a reply for this tag.
    pub fn has_reply(self) -> bool {
        !matches!(
            self,
            CommandTag::Shutdown
                | CommandTag::RemovePlugin
                | CommandTag::ScheduleMidiNote
                | CommandTag::ScheduleMidiCc
                | CommandTag::ClearMidiSchedule
                | CommandTag::ScheduleParamChange
                | CommandTag::ClearMidiCcSchedule
                | CommandTag::ClearParamSchedule
                | CommandTag::ClearAllPlugins
        )
    }
}

wire_tags! {
    /// Notification pipe tags, host to client.
    pub enum NotificationTag {
        ParamChanged = 0 => "param_changed",
        ParamChangesEnd = 1 => "param_changes_end",
        PlaybackStopped = 2 => "playback_stopped",
        MidiNoteEvent = 3 => "midi_note_event",
        MidiCcEvent = 4 => "midi_cc_event",
        VirtualKeyboardNoteEvent = 5 => "virtual_keyboard_note_event",
        VirtualKeyboardCcEvent = 6 => "virtual_keyboard_cc_event",
        MidiKeyboardRouted = 7 => "midi_keyboard_routed",
        VirtualKeyboardRouted = 8 => "virtual_keyboard_routed",
        RecordingStarted = 9 => "recording_started",
        RecordingStopped = 10 => "recording_stopped",
        MonitoringChanged = 11 => "monitoring_changed",
        AudioFileLoaded = 12 => "audio_file_loaded",
        AudioPlaybackStarted = 13 => "audio_playback_started",
        AudioPlaybackStopped = 14 => "audio_playback_stopped",
        OrderedNoteTriggered = 15 => "ordered_note_triggered",
        OrderedPlaybackStarted = 16 => "ordered_playback_started",
        OrderedPlaybackStopped = 17 => "ordered_playback_stopped",
        Shutdown = 18 => "shutdown",
    }
}

// =============================================================================
// Command payloads
// =============================================================================

/// A MIDI note with its start and duration already resolved to samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScheduledNote {
    pub processor: u32,
    pub note: u32,
    pub velocity: f32,
    pub start: f64,
    pub duration: f64,
    pub channel: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScheduledCc {
    pub processor: u32,
    pub controller: u32,
    pub value: u32,
    pub time: f64,
    pub channel: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScheduledParam {
    pub processor: u32,
    pub param_index: u32,
    pub value: f32,
    pub at_block: u64,
}

/// Velocity source for keyboard routing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum VelocityMode {
    FromKeyboard,
    /// 0.0-1.0
    Fixed(f32),
}

impl Default for VelocityMode {
    fn default() -> Self {
        Self::FromKeyboard
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PlaybackAction {
    Stop,
    Start { file_position: u64 },
    Schedule { start_sample: u64, file_position: u64 },
}

/// A request on the command pipe, with its arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    LoadPlugin { path: String, key: u32 },
    LoadPluginByIndex { uid: u32, key: u32 },
    ScanPlugins { directories: Vec<String>, bad_paths: Vec<String> },
    ListPlugins,
    GetPluginInfo { index: u32 },
    ShowPluginUi { key: u32 },
    HidePluginUi { key: u32 },
    SetParameter { key: u32, param_index: u32, value: f32 },
    GetParameter { key: u32, param_index: u32 },
    ConnectAudio { source: u32, source_channel: u32, dest: u32, dest_channel: u32 },
    ConnectMidi { source: u32, dest: u32 },
    StartPlayback { last_block: u64, output_file: Option<String> },
    Shutdown,
    RemovePlugin { key: u32 },
    ListBadPaths,
    GetParamsInfo { key: u32 },
    GetChannelsInfo { key: u32 },
    ScheduleMidiNote(ScheduledNote),
    ScheduleMidiCc(ScheduledCc),
    ClearMidiSchedule,
    ScheduleParamChange(ScheduledParam),
    RouteKeyboardInput { key: u32, velocity: VelocityMode },
    UnrouteKeyboardInput,
    RouteCcToParam { key: u32, param_index: u32, controller: u32, channel: MidiChannel },
    UnrouteCcToParam { key: u32, param_index: u32, controller: u32 },
    ShowVirtualKeyboard,
    HideVirtualKeyboard,
    RouteVirtualKeyboard { key: u32, velocity: VelocityMode },
    UnrouteVirtualKeyboard,
    ToggleRecording,
    ToggleMonitoring,
    LoadAudioFile { path: String },
    ControlAudioPlayback { player: u32, action: PlaybackAction },
    ScheduleOrderedNotes(Vec<OrderedNoteEntry>),
    StartOrderedPlayback { use_keyboard_velocity: bool, use_keyboard_duration: bool },
    StopOrderedPlayback,
    ClearOrderedNotes,
    ClearMidiCcSchedule,
    ClearParamSchedule,
    ClearAllPlugins,
}

impl Command {
    pub fn tag(&self) -> CommandTag {
        match self {
            Command::LoadPlugin { .. } => CommandTag::LoadPlugin,
            Command::LoadPluginByIndex { .. } => CommandTag::LoadPluginByIndex,
            Command::ScanPlugins { .. } => CommandTag::ScanPlugins,
            Command::ListPlugins => CommandTag::ListPlugins,
            Command::GetPluginInfo { .. } => CommandTag::GetPluginInfo,
            Command::ShowPluginUi { .. } => CommandTag::ShowPluginUi,
            Command::HidePluginUi { .. } => CommandTag::HidePluginUi,
            Command::SetParameter { .. } => CommandTag::SetParameter,
            Command::GetParameter { .. } => CommandTag::GetParameter,
            Command::ConnectAudio { .. } => CommandTag::ConnectAudio,
            Command::ConnectMidi { .. } => CommandTag::ConnectMidi,
            Command::StartPlayback { .. } => CommandTag::StartPlayback,
            Command::Shutdown => CommandTag::Shutdown,
            Command::RemovePlugin { .. } => CommandTag::RemovePlugin,
            Command::ListBadPaths => CommandTag::ListBadPaths,
            Command::GetParamsInfo { .. } => CommandTag::GetParamsInfo,
            Command::GetChannelsInfo { .. } => CommandTag::GetChannelsInfo,
            Command::ScheduleMidiNote(_) => CommandTag::ScheduleMidiNote,
            Command::ScheduleMidiCc(_) => CommandTag::ScheduleMidiCc,
            Command::ClearMidiSchedule => CommandTag::ClearMidiSchedule,
            Command::ScheduleParamChange(_) => CommandTag::ScheduleParamChange,
            Command::RouteKeyboardInput { .. } => CommandTag::RouteKeyboardInput,
            Command::UnrouteKeyboardInput => CommandTag::UnrouteKeyboardInput,
            Command::RouteCcToParam { .. } => CommandTag::RouteCcToParam,
            Command::UnrouteCcToParam { .. } => CommandTag::UnrouteCcToParam,
            Command::ShowVirtualKeyboard => CommandTag::ShowVirtualKeyboard,
            Command::HideVirtualKeyboard => CommandTag::HideVirtualKeyboard,
            Command::RouteVirtualKeyboard { .. } => CommandTag::RouteVirtualKeyboard,
            Command::UnrouteVirtualKeyboard => CommandTag::UnrouteVirtualKeyboard,
            Command::ToggleRecording => CommandTag::ToggleRecording,
            Command::ToggleMonitoring => CommandTag::ToggleMonitoring,
            Command::LoadAudioFile { .. } => CommandTag::LoadAudioFile,
            Command::ControlAudioPlayback { .. } => CommandTag::ControlAudioPlayback,
            Command::ScheduleOrderedNotes(_) => CommandTag::ScheduleOrderedNotes,
            Command::StartOrderedPlayback { .. } => CommandTag::StartOrderedPlayback,
            Command::StopOrderedPlayback => CommandTag::StopOrderedPlayback,
            Command::ClearOrderedNotes => CommandTag::ClearOrderedNotes,
            Command::ClearMidiCcSchedule => CommandTag::ClearMidiCcSchedule,
            Command::ClearParamSchedule => CommandTag::ClearParamSchedule,
            Command::ClearAllPlugins => CommandTag::ClearAllPlugins,
        }
    }
}

fn write_velocity(w: &mut WireWriter, velocity: VelocityMode) {
    match velocity {
        VelocityMode::FromKeyboard => w.flag(true).f32(1.0),
        VelocityMode::Fixed(v) => w.flag(false).f32(v),
    };
}

fn read_velocity<R: Read>(r: &mut WireReader<R>) -> io::Result<VelocityMode> {
    let use_keyboard = r.flag()?;
    let fixed = r.f32()?;
    Ok(if use_keyboard {
        VelocityMode::FromKeyboard
    } else {
        VelocityMode::Fixed(fixed)
    })
}

impl WireMessage for Command {
    fn encode(&self, w: &mut WireWriter) {
        w.u8(self.tag() as u8);
        match self {
            Command::LoadPlugin { path, key } => {
                w.str(path).u32(*key);
            }
            Command::LoadPluginByIndex { uid, key } => {
                w.u32(*uid).u32(*key);
            }
            Command::ScanPlugins {
                directories,
                bad_paths,
            } => {
                w.strs(directories).strs(bad_paths);
            }
            Command::GetPluginInfo { index } => {
                w.u32(*index);
            }
            Command::ShowPluginUi { key }
            | Command::HidePluginUi { key }
            | Command::RemovePlugin { key }
            | Command::GetParamsInfo { key }
            | Command::GetChannelsInfo { key } => {
                w.u32(*key);
            }
            Command::SetParameter {
                key,
                param_index,
                value,
            } => {
                w.u32(*key).u32(*param_index).f32(*value);
            }
            Command::GetParameter { key, param_index } => {
                w.u32(*key).u32(*param_index);
            }
            Command::ConnectAudio {
                source,
                source_channel,
                dest,
                dest_channel,
            } => {
                w.u32(*source)
                    .u32(*source_channel)
                    .u32(*dest)
                    .u32(*dest_channel);
            }
            Command::ConnectMidi { source, dest } => {
                w.u32(*source).u32(*dest);
            }
            Command::StartPlayback {
                last_block,
                output_file,
            } => {
                w.u64(*last_block).flag(output_file.is_some());
                if let Some(file) = output_file {
                    w.str(file);
                }
            }
            Command::ScheduleMidiNote(n) => {
                w.u32(n.processor)
                    .u32(n.note)
                    .f32(n.velocity)
                    .f64(n.start)
                    .f64(n.duration)
                    .u32(n.channel);
            }
            Command::ScheduleMidiCc(c) => {
                w.u32(c.processor)
                    .u32(c.controller)
                    .u32(c.value)
                    .f64(c.time)
                    .u32(c.channel);
            }
            Command::ScheduleParamChange(p) => {
                w.u32(p.processor)
                    .u32(p.param_index)
                    .f32(p.value)
                    .u64(p.at_block);
            }
            Command::RouteKeyboardInput { key, velocity }
            | Command::RouteVirtualKeyboard { key, velocity } => {
                w.u32(*key);
                write_velocity(w, *velocity);
            }
            Command::RouteCcToParam {
                key,
                param_index,
                controller,
                channel,
            } => {
                w.u32(*key)
                    .u32(*param_index)
                    .u32(*controller)
                    .i32(channel.to_wire());
            }
            Command::UnrouteCcToParam {
                key,
                param_index,
                controller,
            } => {
                w.u32(*key).u32(*param_index).u32(*controller);
            }
            Command::LoadAudioFile { path } => {
                w.str(path);
            }
            Command::ControlAudioPlayback { player, action } => {
                w.u32(*player);
                match action {
                    PlaybackAction::Stop => {
                        w.u8(0);
                    }
                    PlaybackAction::Start { file_position } => {
                        w.u8(1).u64(*file_position);
                    }
                    PlaybackAction::Schedule {
                        start_sample,
                        file_position,
                    } => {
                        w.u8(2).u64(*start_sample).u64(*file_position);
                    }
                }
            }
            Command::ScheduleOrderedNotes(entries) => {
                w.u32(entries.len() as u32);
                for e in entries {
                    w.u32(e.order)
                        .u32(e.note as u32)
                        .u32(e.velocity as u32)
                        .u32(e.channel as u32)
                        .u32(e.duration);
                }
            }
            Command::StartOrderedPlayback {
                use_keyboard_velocity,
                use_keyboard_duration,
            } => {
                w.flag(*use_keyboard_velocity).flag(*use_keyboard_duration);
            }
            Command::ListPlugins
            | Command::Shutdown
            | Command::ListBadPaths
            | Command::ClearMidiSchedule
            | Command::UnrouteKeyboardInput
            | Command::ShowVirtualKeyboard
            | Command::HideVirtualKeyboard
            | Command::UnrouteVirtualKeyboard
            | Command::ToggleRecording
            | Command::ToggleMonitoring
            | Command::StopOrderedPlayback
            | Command::ClearOrderedNotes
            | Command::ClearMidiCcSchedule
            | Command::ClearParamSchedule
            | Command::ClearAllPlugins => {}
        }
    }

    fn decode<R: Read>(r: &mut WireReader<R>) -> io::Result<Self> {
        let raw = r.u8()?;
        let tag = CommandTag::try_from(raw)
            .map_err(|t| invalid_data(format!("unknown command tag {}", t)))?;
        let cmd = match tag {
            CommandTag::LoadPlugin => Command::LoadPlugin {
                path: r.str()?,
                key: r.u32()?,
            },
            CommandTag::LoadPluginByIndex => Command::LoadPluginByIndex {
                uid: r.u32()?,
                key: r.u32()?,
            },
            CommandTag::ScanPlugins => Command::ScanPlugins {
                directories: r.str_list()?,
                bad_paths: r.str_list()?,
            },
            CommandTag::ListPlugins => Command::ListPlugins,
            CommandTag::GetPluginInfo => Command::GetPluginInfo { index: r.u32()? },
            CommandTag::ShowPluginUi => Command::ShowPluginUi { key: r.u32()? },
            CommandTag::HidePluginUi => Command::HidePluginUi { key: r.u32()? },
            CommandTag::SetParameter => Command::SetParameter {
                key: r.u32()?,
                param_index: r.u32()?,
                value: r.f32()?,
            },
            CommandTag::GetParameter => Command::GetParameter {
                key: r.u32()?,
                param_index: r.u32()?,
            },
            CommandTag::ConnectAudio => Command::ConnectAudio {
                source: r.u32()?,
                source_channel: r.u32()?,
                dest: r.u32()?,
                dest_channel: r.u32()?,
            },
            CommandTag::ConnectMidi => Command::ConnectMidi {
                source: r.u32()?,
                dest: r.u32()?,
            },
            CommandTag::StartPlayback => {
                let last_block = r.u64()?;
                let output_file = if r.flag()? { Some(r.str()?) } else { None };
                Command::StartPlayback {
                    last_block,
                    output_file,
                }
            }
            CommandTag::Shutdown => Command::Shutdown,
            CommandTag::RemovePlugin => Command::RemovePlugin { key: r.u32()? },
            CommandTag::ListBadPaths => Command::ListBadPaths,
            CommandTag::GetParamsInfo => Command::GetParamsInfo { key: r.u32()? },
            CommandTag::GetChannelsInfo => Command::GetChannelsInfo { key: r.u32()? },
            CommandTag::ScheduleMidiNote => Command::ScheduleMidiNote(ScheduledNote {
                processor: r.u32()?,
                note: r.u32()?,
                velocity: r.f32()?,
                start: r.f64()?,
                duration: r.f64()?,
                channel: r.u32()?,
            }),
            CommandTag::ScheduleMidiCc => Command::ScheduleMidiCc(ScheduledCc {
                processor: r.u32()?,
                controller: r.u32()?,
                value: r.u32()?,
                time: r.f64()?,
                channel: r.u32()?,
            }),
            CommandTag::ClearMidiSchedule => Command::ClearMidiSchedule,
            CommandTag::ScheduleParamChange => Command::ScheduleParamChange(ScheduledParam {
                processor: r.u32()?,
                param_index: r.u32()?,
                value: r.f32()?,
                at_block: r.u64()?,
            }),
            CommandTag::RouteKeyboardInput => Command::RouteKeyboardInput {
                key: r.u32()?,
                velocity: read_velocity(r)?,
            },
            CommandTag::UnrouteKeyboardInput => Command::UnrouteKeyboardInput,
            CommandTag::RouteCcToParam => Command::RouteCcToParam {
                key: r.u32()?,
                param_index: r.u32()?,
                controller: r.u32()?,
                channel: MidiChannel::from_wire(r.i32()?),
            },
            CommandTag::UnrouteCcToParam => Command::UnrouteCcToParam {
                key: r.u32()?,
                param_index: r.u32()?,
                controller: r.u32()?,
            },
            CommandTag::ShowVirtualKeyboard => Command::ShowVirtualKeyboard,
            CommandTag::HideVirtualKeyboard => Command::HideVirtualKeyboard,
            CommandTag::RouteVirtualKeyboard => Command::RouteVirtualKeyboard {
                key: r.u32()?,
                velocity: read_velocity(r)?,
            },
            CommandTag::UnrouteVirtualKeyboard => Command::UnrouteVirtualKeyboard,
            CommandTag::ToggleRecording => Command::ToggleRecording,
            CommandTag::ToggleMonitoring => Command::ToggleMonitoring,
            CommandTag::LoadAudioFile => Command::LoadAudioFile { path: r.str()? },
            CommandTag::ControlAudioPlayback => {
                let player = r.u32()?;
                let action = match r.u8()? {
                    0 => PlaybackAction::Stop,
                    1 => PlaybackAction::Start {
                        file_position: r.u64()?,
                    },
                    2 => PlaybackAction::Schedule {
                        start_sample: r.u64()?,
                        file_position: r.u64()?,
                    },
                    other => {
                        return Err(invalid_data(format!("unknown playback action {}", other)))
                    }
                };
                Command::ControlAudioPlayback { player, action }
            }
            CommandTag::ScheduleOrderedNotes => {
                let count = r.u32()?;
                let mut entries = Vec::with_capacity(count.min(4096) as usize);
                for _ in 0..count {
                    entries.push(OrderedNoteEntry {
                        order: r.u32()?,
                        note: r.u32()? as u8,
                        velocity: r.u32()? as u8,
                        channel: r.u32()? as u8,
                        duration: r.u32()?,
                    });
                }
                Command::ScheduleOrderedNotes(entries)
            }
            CommandTag::StartOrderedPlayback => Command::StartOrderedPlayback {
                use_keyboard_velocity: r.flag()?,
                use_keyboard_duration: r.flag()?,
            },
            CommandTag::StopOrderedPlayback => Command::StopOrderedPlayback,
            CommandTag::ClearOrderedNotes => Command::ClearOrderedNotes,
            CommandTag::ClearMidiCcSchedule => Command::ClearMidiCcSchedule,
            CommandTag::ClearParamSchedule => Command::ClearParamSchedule,
            CommandTag::ClearAllPlugins => Command::ClearAllPlugins,
        };
        Ok(cmd)
    }
}

// =============================================================================
// Notifications
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamChange {
    pub processor: u32,
    pub param_index: u32,
    pub value: f32,
    pub at_block: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteActivity {
    pub note: u32,
    pub velocity: u32,
    pub channel: u32,
    pub on: bool,
    pub sample_position: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CcActivity {
    pub controller: u32,
    pub value: u32,
    pub channel: u32,
    pub at_block: u64,
}

/// An event pushed by the host on the notification pipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Notification {
    ParamChanged(ParamChange),
    ParamChangesEnd,
    PlaybackStopped,
    MidiNote(NoteActivity),
    MidiCc(CcActivity),
    VirtualKeyboardNote(NoteActivity),
    VirtualKeyboardCc(CcActivity),
    /// `processor` is `None` when the keyboard was unrouted
    MidiKeyboardRouted { processor: Option<u32>, sample_position: u64 },
    VirtualKeyboardRouted { processor: Option<u32>, sample_position: u64 },
    RecordingStarted { file: String, sample_position: i64 },
    RecordingStopped { file: String, sample_position: i64 },
    MonitoringChanged { enabled: bool, sample_position: i64 },
    AudioFileLoaded { file: String, player: i32 },
    AudioPlaybackStarted { player: i32, sample_position: i64 },
    AudioPlaybackStopped { player: i32, sample_position: i64 },
    OrderedNoteTriggered { order: i32, index: i32, total: i32 },
    OrderedPlaybackStarted { sample_position: i64 },
    OrderedPlaybackStopped { sample_position: i64 },
    Shutdown,
}

fn routed_processor(raw: i32) -> Option<u32> {
    u32::try_from(raw).ok()
}

fn write_note(w: &mut WireWriter, n: &NoteActivity) {
    w.u32(n.note)
        .u32(n.velocity)
        .u32(n.channel)
        .flag(n.on)
        .u64(n.sample_position);
}

fn read_note<R: Read>(r: &mut WireReader<R>) -> io::Result<NoteActivity> {
    Ok(NoteActivity {
        note: r.u32()?,
        velocity: r.u32()?,
        channel: r.u32()?,
        on: r.flag()?,
        sample_position: r.u64()?,
    })
}

fn write_cc(w: &mut WireWriter, c: &CcActivity) {
    w.u32(c.controller).u32(c.value).u32(c.channel).u64(c.at_block);
}

fn read_cc<R: Read>(r: &mut WireReader<R>) -> io::Result<CcActivity> {
    Ok(CcActivity {
        controller: r.u32()?,
        value: r.u32()?,
        channel: r.u32()?,
        at_block: r.u64()?,
    })
}

impl Notification {
    pub fn tag(&self) -> NotificationTag {
        match self {
            Notification::ParamChanged(_) => NotificationTag::ParamChanged,
            Notification::ParamChangesEnd => NotificationTag::ParamChangesEnd,
            Notification::PlaybackStopped => NotificationTag::PlaybackStopped,
            Notification::MidiNote(_) => NotificationTag::MidiNoteEvent,
            Notification::MidiCc(_) => NotificationTag::MidiCcEvent,
            Notification::VirtualKeyboardNote(_) => NotificationTag::VirtualKeyboardNoteEvent,
            Notification::VirtualKeyboardCc(_) => NotificationTag::VirtualKeyboardCcEvent,
            Notification::MidiKeyboardRouted { .. } => NotificationTag::MidiKeyboardRouted,
            Notification::VirtualKeyboardRouted { .. } => NotificationTag::VirtualKeyboardRouted,
            Notification::RecordingStarted { .. } => NotificationTag::RecordingStarted,
            Notification::RecordingStopped { .. } => NotificationTag::RecordingStopped,
            Notification::MonitoringChanged { .. } => NotificationTag::MonitoringChanged,
            Notification::AudioFileLoaded { .. } => NotificationTag::AudioFileLoaded,
            Notification::AudioPlaybackStarted { .. } => NotificationTag::AudioPlaybackStarted,
            Notification::AudioPlaybackStopped { .. } => NotificationTag::AudioPlaybackStopped,
            Notification::OrderedNoteTriggered { .. } => NotificationTag::OrderedNoteTriggered,
            Notification::OrderedPlaybackStarted { .. } => NotificationTag::OrderedPlaybackStarted,
            Notification::OrderedPlaybackStopped { .. } => NotificationTag::OrderedPlaybackStopped,
            Notification::Shutdown => NotificationTag::Shutdown,
        }
    }

    /// Decode the fields that follow an already-read tag.
    pub fn decode_body<R: Read>(tag: NotificationTag, r: &mut WireReader<R>) -> io::Result<Self> {
        let n = match tag {
            NotificationTag::ParamChanged => Notification::ParamChanged(ParamChange {
                processor: r.u32()?,
                param_index: r.u32()?,
                value: r.f32()?,
                at_block: r.u64()?,
            }),
            NotificationTag::ParamChangesEnd => Notification::ParamChangesEnd,
            NotificationTag::PlaybackStopped => Notification::PlaybackStopped,
            NotificationTag::MidiNoteEvent => Notification::MidiNote(read_note(r)?),
            NotificationTag::MidiCcEvent => Notification::MidiCc(read_cc(r)?),
            NotificationTag::VirtualKeyboardNoteEvent => {
                Notification::VirtualKeyboardNote(read_note(r)?)
            }
            NotificationTag::VirtualKeyboardCcEvent => Notification::VirtualKeyboardCc(read_cc(r)?),
            NotificationTag::MidiKeyboardRouted => Notification::MidiKeyboardRouted {
                processor: routed_processor(r.i32()?),
                sample_position: r.u64()?,
            },
            NotificationTag::VirtualKeyboardRouted => Notification::VirtualKeyboardRouted {
                processor: routed_processor(r.i32()?),
                sample_position: r.u64()?,
            },
            NotificationTag::RecordingStarted => Notification::RecordingStarted {
                file: r.str()?,
                sample_position: r.i64()?,
            },
            NotificationTag::RecordingStopped => Notification::RecordingStopped {
                file: r.str()?,
                sample_position: r.i64()?,
            },
            NotificationTag::MonitoringChanged => Notification::MonitoringChanged {
                enabled: r.flag()?,
                sample_position: r.i64()?,
            },
            NotificationTag::AudioFileLoaded => Notification::AudioFileLoaded {
                file: r.str()?,
                player: r.i32()?,
            },
            NotificationTag::AudioPlaybackStarted => Notification::AudioPlaybackStarted {
                player: r.i32()?,
                sample_position: r.i64()?,
            },
            NotificationTag::AudioPlaybackStopped => Notification::AudioPlaybackStopped {
                player: r.i32()?,
                sample_position: r.i64()?,
            },
            NotificationTag::OrderedNoteTriggered => Notification::OrderedNoteTriggered {
                order: r.i32()?,
                index: r.i32()?,
                total: r.i32()?,
            },
            NotificationTag::OrderedPlaybackStarted => Notification::OrderedPlaybackStarted {
                sample_position: r.i64()?,
            },
            NotificationTag::OrderedPlaybackStopped => Notification::OrderedPlaybackStopped {
                sample_position: r.i64()?,
            },
            NotificationTag::Shutdown => Notification::Shutdown,
        };
        Ok(n)
    }
}

impl WireMessage for Notification {
    fn encode(&self, w: &mut WireWriter) {
        w.u8(self.tag() as u8);
        match self {
            Notification::ParamChanged(p) => {
                w.u32(p.processor).u32(p.param_index).f32(p.value).u64(p.at_block);
            }
            Notification::MidiNote(n) | Notification::VirtualKeyboardNote(n) => write_note(w, n),
            Notification::MidiCc(c) | Notification::VirtualKeyboardCc(c) => write_cc(w, c),
            Notification::MidiKeyboardRouted {
                processor,
                sample_position,
            }
            | Notification::VirtualKeyboardRouted {
                processor,
                sample_position,
            } => {
                let raw = processor.and_then(|p| i32::try_from(p).ok()).unwrap_or(-1);
                w.i32(raw).u64(*sample_position);
            }
            Notification::RecordingStarted {
                file,
                sample_position,
            }
            | Notification::RecordingStopped {
                file,
                sample_position,
            } => {
                w.str(file).i64(*sample_position);
            }
            Notification::MonitoringChanged {
                enabled,
                sample_position,
            } => {
                w.flag(*enabled).i64(*sample_position);
            }
            Notification::AudioFileLoaded { file, player } => {
                w.str(file).i32(*player);
            }
            Notification::AudioPlaybackStarted {
                player,
                sample_position,
            }
            | Notification::AudioPlaybackStopped {
                player,
                sample_position,
            } => {
                w.i32(*player).i64(*sample_position);
            }
            Notification::OrderedNoteTriggered {
                order,
                index,
                total,
            } => {
                w.i32(*order).i32(*index).i32(*total);
            }
            Notification::OrderedPlaybackStarted { sample_position }
            | Notification::OrderedPlaybackStopped { sample_position } => {
                w.i64(*sample_position);
            }
            Notification::ParamChangesEnd
            | Notification::PlaybackStopped
            | Notification::Shutdown => {}
        }
    }

    fn decode<R: Read>(r: &mut WireReader<R>) -> io::Result<Self> {
        let raw = r.u8()?;
        let tag = NotificationTag::try_from(raw)
            .map_err(|t| invalid_data(format!("unknown notification tag {}", t)))?;
        Self::decode_body(tag, r)
    }
}
