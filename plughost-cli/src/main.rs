use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use plughost_core::{config, load_song, paths, scan_with_cache, BadPathCache, Config};
use plughost_net::{Notification, Session};

const USAGE: &str = "usage: plughost [-v] [--config FILE] [--pipe NAME] [--bpm BPM] <command>

commands:
  scan                       scan plugin directories and list what was found
  list                       list plugins known to the host
  play SONG [SECONDS] [-o FILE]
                             send a saved song and play it (default 10 seconds)
  monitor                    print host notifications until it shuts down";

#[derive(Debug, Clone, PartialEq)]
enum Action {
    Scan,
    List,
    Play {
        song: PathBuf,
        seconds: f64,
        output: Option<PathBuf>,
    },
    Monitor,
}

#[derive(Debug, Clone, PartialEq)]
struct Args {
    verbose: bool,
    config: Option<PathBuf>,
    pipe: Option<String>,
    bpm: Option<f64>,
    action: Action,
}

fn parse_args(args: &[String]) -> Result<Args, String> {
    let mut verbose = false;
    let mut config = None;
    let mut pipe = None;
    let mut bpm = None;
    let mut output = None;
    let mut positional = Vec::new();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let mut value = |flag: &str| {
            iter.next()
                .cloned()
                .ok_or_else(|| format!("{} needs a value", flag))
        };
        match arg.as_str() {
            "-v" | "--verbose" => verbose = true,
            "--config" => config = Some(PathBuf::from(value(arg)?)),
            "--pipe" => pipe = Some(value(arg)?),
            "--bpm" => {
                let raw = value(arg)?;
                bpm = Some(raw.parse::<f64>().map_err(|_| format!("bad bpm {:?}", raw))?);
            }
            "-o" | "--output" => output = Some(PathBuf::from(value(arg)?)),
            "-h" | "--help" => return Err(USAGE.to_string()),
            flag if flag.starts_with('-') => return Err(format!("unknown option {}", flag)),
            _ => positional.push(arg.clone()),
        }
    }

    let action = match positional.first().map(String::as_str) {
        Some("scan") => Action::Scan,
        Some("list") => Action::List,
        Some("monitor") => Action::Monitor,
        Some("play") => {
            let song = positional
                .get(1)
                .map(PathBuf::from)
                .ok_or_else(|| "play needs a song file".to_string())?;
            let seconds = match positional.get(2) {
                Some(raw) => raw
                    .parse::<f64>()
                    .map_err(|_| format!("bad duration {:?}", raw))?,
                None => 10.0,
            };
            Action::Play {
                song,
                seconds,
                output,
            }
        }
        Some(other) => return Err(format!("unknown command {:?}\n\n{}", other, USAGE)),
        None => return Err(USAGE.to_string()),
    };

    Ok(Args {
        verbose,
        config,
        pipe,
        bpm,
        action,
    })
}

fn init_logging(verbose: bool) {
    use simplelog::*;

    let log_level = if verbose { LevelFilter::Debug } else { LevelFilter::Warn };

    let log_path = config::config_dir().join("plughost.log");
    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let log_file = match File::create(&log_path)
        .or_else(|_| File::create(std::env::temp_dir().join("plughost.log")))
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("cannot create log file: {}", e);
            return;
        }
    };

    if let Err(e) = WriteLogger::init(log_level, simplelog::Config::default(), log_file) {
        eprintln!("failed to initialize logger: {}", e);
        return;
    }

    log::info!("plughost starting (log level: {:?})", log_level);
}

fn run(args: Args) -> Result<(), String> {
    let config = match &args.config {
        Some(path) => Config::load_from(Some(path.as_path())),
        None => Config::load(),
    };
    let mut session_config = config.session_config();
    if let Some(pipe) = args.pipe {
        session_config.pipe_name = pipe;
    }
    if let Some(bpm) = args.bpm {
        if !(bpm.is_finite() && bpm > 0.0) {
            return Err(format!("bpm must be positive, got {}", bpm));
        }
        session_config.timebase.set_bpm(bpm);
    }

    let mut session = Session::new(session_config);
    session.connect().map_err(|e| e.to_string())?;

    // Only playback sends the shutdown command. A host this process launched
    // is stopped on disconnect either way.
    let shutdown = matches!(args.action, Action::Play { .. });
    let result = match args.action {
        Action::Scan => scan(&mut session, &config),
        Action::List => list(&mut session),
        Action::Play {
            song,
            seconds,
            output,
        } => play(&mut session, &song, seconds, output),
        Action::Monitor => monitor(&session),
    };

    session.disconnect(shutdown);
    result
}

fn scan(session: &mut Session, config: &Config) -> Result<(), String> {
    let dirs = paths::scan_dirs(&config.plugin_directories());
    let mut cache = BadPathCache::load_or_empty(config.bad_paths_file());
    let outcome = scan_with_cache(session, &dirs, &mut cache).map_err(|e| e.to_string())?;

    println!(
        "found {} plugins ({} new bad paths, {} cached)",
        outcome.found,
        outcome.new_bad_paths,
        cache.len()
    );
    print_plugins(&outcome.plugins);
    Ok(())
}

fn list(session: &mut Session) -> Result<(), String> {
    let plugins = session.list_plugins().map_err(|e| e.to_string())?;
    print_plugins(&plugins);
    Ok(())
}

fn print_plugins(plugins: &[plughost_types::PluginDescriptor]) {
    for p in plugins {
        let kind = if p.is_instrument { "instrument" } else { "effect" };
        println!(
            "{:>10}  {:<32} {:<10} {} ({})",
            p.uid, p.name, kind, p.format_name, p.manufacturer
        );
    }
}

fn play(
    session: &mut Session,
    song: &std::path::Path,
    seconds: f64,
    output: Option<PathBuf>,
) -> Result<(), String> {
    let song = load_song(song).map_err(|e| e.to_string())?;
    let report = song.send(session).map_err(|e| e.to_string())?;
    println!(
        "sent {} notes, {} ccs, {} parameter changes to {} processors",
        report.notes, report.cc_events, report.param_changes, report.processors
    );

    let notifications = session.notifications();
    let last_block = session.timebase().blocks_for_seconds(seconds);
    session
        .start_playback(last_block, output.as_deref())
        .map_err(|e| e.to_string())?;

    let budget = Duration::from_secs_f64(seconds.max(0.0)) + Duration::from_secs(5);
    if !wait_for_stop(&notifications, budget)? {
        log::warn!("no playback-stopped notification after {:?}", budget);
    }
    if let Some(path) = output {
        println!("rendered to {}", path.display());
    }
    Ok(())
}

/// Print notifications until playback stops. `budget` bounds the whole wait;
/// returns `false` when it runs out or the stream ends first.
fn wait_for_stop(notifications: &Receiver<Notification>, budget: Duration) -> Result<bool, String> {
    let deadline = Instant::now() + budget;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Ok(false);
        }
        match notifications.recv_timeout(remaining) {
            Ok(Notification::PlaybackStopped) => return Ok(true),
            Ok(Notification::Shutdown) => return Err("host shut down during playback".into()),
            Ok(other) => print_notification(&other),
            Err(_) => return Ok(false),
        }
    }
}

fn print_notification(notification: &Notification) {
    match serde_json::to_string(notification) {
        Ok(line) => println!("{}", line),
        Err(e) => log::warn!("cannot print {:?}: {}", notification, e),
    }
}

fn monitor(session: &Session) -> Result<(), String> {
    for notification in session.notifications().iter() {
        print_notification(&notification);
        if notification == Notification::Shutdown {
            break;
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let raw: Vec<String> = std::env::args().skip(1).collect();
    let args = match parse_args(&raw) {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{}", message);
            return ExitCode::from(2);
        }
    };
    init_logging(args.verbose);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            log::error!("{}", message);
            eprintln!("plughost: {}", message);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Result<Args, String> {
        parse_args(&raw.iter().map(|s| s.to_string()).collect::<Vec<_>>())
    }

    #[test]
    fn play_with_options() {
        let parsed = args(&["-v", "--pipe", "test", "play", "song.json", "4.5", "-o", "out.wav"]).unwrap();
        assert!(parsed.verbose);
        assert_eq!(parsed.pipe.as_deref(), Some("test"));
        assert_eq!(
            parsed.action,
            Action::Play {
                song: PathBuf::from("song.json"),
                seconds: 4.5,
                output: Some(PathBuf::from("out.wav")),
            }
        );
    }

    #[test]
    fn play_defaults_to_ten_seconds() {
        let parsed = args(&["play", "song.json"]).unwrap();
        assert!(matches!(parsed.action, Action::Play { seconds, .. } if seconds == 10.0));
    }

    #[test]
    fn steady_notifications_do_not_extend_playback_wait() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let chatter = std::thread::spawn(move || {
            while tx.send(Notification::ParamChangesEnd).is_ok() {
                std::thread::sleep(Duration::from_millis(10));
            }
        });

        let started = Instant::now();
        assert_eq!(wait_for_stop(&rx, Duration::from_millis(100)), Ok(false));
        assert!(started.elapsed() < Duration::from_secs(1));
        drop(rx);
        chatter.join().unwrap();
    }

    #[test]
    fn playback_stop_ends_wait() {
        let (tx, rx) = crossbeam_channel::unbounded();
        tx.send(Notification::ParamChangesEnd).unwrap();
        tx.send(Notification::PlaybackStopped).unwrap();
        assert_eq!(wait_for_stop(&rx, Duration::from_secs(2)), Ok(true));

        tx.send(Notification::Shutdown).unwrap();
        assert!(wait_for_stop(&rx, Duration::from_secs(2)).is_err());
    }

    #[test]
    fn rejects_missing_values_and_commands() {
        assert!(args(&[]).is_err());
        assert!(args(&["--pipe"]).is_err());
        assert!(args(&["play"]).is_err());
        assert!(args(&["--bpm", "fast", "scan"]).is_err());
        assert!(args(&["explode"]).is_err());
    }
}
