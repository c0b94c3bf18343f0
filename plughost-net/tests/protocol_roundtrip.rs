mod common;

use std::os::unix::net::UnixStream;
use std::thread;

use plughost_net::{
    CcActivity, ChannelsReply, Command, CommandChannel, LoadReply, NotificationTag, Notification,
    ParamsReply, PlaybackAction, ScheduledCc, ScheduledNote, ScheduledParam, StatusReply,
    VelocityMode, WireMessage, WireReader, WireWriter,
};
use plughost_types::{
    BusDescriptor, ChannelsInfo, MidiChannel, OrderedNoteEntry, PluginDescriptor,
};

use common::param_descriptors;

/// Host thread that decodes one command and answers with `reply`.
fn exchange<T>(command: Command, reply: T) -> (Command, T)
where
    T: WireMessage + Send + 'static,
{
    let (client, mut host) = UnixStream::pair().unwrap();
    let host = thread::spawn(move || {
        let received = Command::decode(&mut WireReader::new(&mut host)).unwrap();
        let mut w = WireWriter::new();
        reply.encode(&mut w);
        w.send_to(&mut host).unwrap();
        received
    });
    let mut channel = CommandChannel::new(Box::new(client), None).unwrap();
    let decoded: T = channel.request(&command).unwrap();
    (host.join().unwrap(), decoded)
}

#[test]
fn load_reply_survives_the_round_trip() {
    let reply = LoadReply {
        success: true,
        name: "Synth \u{00e9}".to_string(),
        uid: 7,
        message: String::new(),
    };
    let command = Command::LoadPlugin {
        path: "/plugins/synth.vst3".to_string(),
        key: 3,
    };
    let (seen, decoded) = exchange(command.clone(), reply.clone());
    assert_eq!(seen, command);
    assert_eq!(decoded, reply);
}

#[test]
fn descriptor_lists_survive_the_round_trip() {
    let plugins = vec![
        PluginDescriptor {
            category: "Synth".to_string(),
            path: "/p/a.vst3".to_string(),
            ..PluginDescriptor::new(1, "A")
        },
        PluginDescriptor::new(2, "B"),
    ];
    let (seen, decoded) = exchange(Command::ListPlugins, plugins.clone());
    assert_eq!(seen, Command::ListPlugins);
    assert_eq!(decoded, plugins);

    let params = ParamsReply {
        success: true,
        params: param_descriptors(3),
        message: String::new(),
    };
    let (_, decoded) = exchange(Command::GetParamsInfo { key: 1 }, params.clone());
    assert_eq!(decoded, params);

    let channels = ChannelsReply {
        success: true,
        info: ChannelsInfo {
            accepts_midi: true,
            produces_midi: true,
            inputs: vec![BusDescriptor {
                num_channels: 1,
                channel_types: vec!["Mono".to_string()],
                enabled: true,
                layout: "Mono".to_string(),
            }],
            outputs: vec![],
        },
        message: String::new(),
    };
    let (_, decoded) = exchange(Command::GetChannelsInfo { key: 1 }, channels.clone());
    assert_eq!(decoded, channels);
}

#[test]
fn every_argument_layout_decodes_as_sent() {
    let commands = vec![
        Command::LoadPluginByIndex { uid: 7, key: 3 },
        Command::ScanPlugins {
            directories: vec!["/a".to_string(), "/b".to_string()],
            bad_paths: vec!["/a/broken.so".to_string()],
        },
        Command::SetParameter {
            key: 1,
            param_index: 4,
            value: 0.25,
        },
        Command::ConnectAudio {
            source: 1,
            source_channel: 0,
            dest: 2,
            dest_channel: 1,
        },
        Command::StartPlayback {
            last_block: 689,
            output_file: Some("/tmp/out.wav".to_string()),
        },
        Command::ScheduleMidiNote(ScheduledNote {
            processor: 1,
            note: 60,
            velocity: 0.8,
            start: 11025.0,
            duration: 22050.0,
            channel: 1,
        }),
        Command::ScheduleMidiCc(ScheduledCc {
            processor: 1,
            controller: 74,
            value: 100,
            time: 512.0,
            channel: 2,
        }),
        Command::ScheduleParamChange(ScheduledParam {
            processor: 1,
            param_index: 3,
            value: 0.5,
            at_block: 172,
        }),
        Command::RouteKeyboardInput {
            key: 1,
            velocity: VelocityMode::Fixed(0.7),
        },
        Command::RouteCcToParam {
            key: 1,
            param_index: 2,
            controller: 1,
            channel: MidiChannel::Only(3),
        },
        Command::ControlAudioPlayback {
            player: 0,
            action: PlaybackAction::Schedule {
                start_sample: 44100,
                file_position: 100,
            },
        },
        Command::ScheduleOrderedNotes(vec![OrderedNoteEntry {
            order: 0,
            note: 64,
            velocity: 90,
            channel: 1,
            duration: 4410,
        }]),
        Command::StartOrderedPlayback {
            use_keyboard_velocity: true,
            use_keyboard_duration: false,
        },
    ];
    for command in commands {
        let (seen, ok) = exchange(command.clone(), StatusReply::ok());
        assert_eq!(seen, command);
        assert!(ok.success);
    }
}

#[test]
fn every_notification_tag_decodes() {
    let notifications = vec![
        Notification::ParamChangesEnd,
        Notification::PlaybackStopped,
        Notification::VirtualKeyboardCc(CcActivity {
            controller: 1,
            value: 64,
            channel: 1,
            at_block: 3,
        }),
        Notification::VirtualKeyboardRouted {
            processor: Some(2),
            sample_position: 9,
        },
        Notification::RecordingStarted {
            file: "take1.wav".to_string(),
            sample_position: 0,
        },
        Notification::RecordingStopped {
            file: "take1.wav".to_string(),
            sample_position: 88200,
        },
        Notification::MonitoringChanged {
            enabled: true,
            sample_position: 5,
        },
        Notification::AudioFileLoaded {
            file: "loop.wav".to_string(),
            player: 1,
        },
        Notification::AudioPlaybackStarted {
            player: 1,
            sample_position: 0,
        },
        Notification::AudioPlaybackStopped {
            player: 1,
            sample_position: -1,
        },
        Notification::OrderedNoteTriggered {
            order: 0,
            index: 1,
            total: 4,
        },
        Notification::OrderedPlaybackStarted { sample_position: 10 },
        Notification::OrderedPlaybackStopped { sample_position: 20 },
        Notification::Shutdown,
    ];

    let mut w = WireWriter::new();
    for n in &notifications {
        n.encode(&mut w);
    }
    let mut r = WireReader::new(std::io::Cursor::new(w.into_bytes()));
    for expected in &notifications {
        let decoded = Notification::decode(&mut r).unwrap();
        assert_eq!(&decoded, expected);
    }
    assert_eq!(NotificationTag::ALL.len(), 19);
}
