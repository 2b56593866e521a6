//! Thock - keyboard sounds from the terminal
//!
//! Headless front end for `thock-core`. It:
//! 1. Loads settings and the sound pack
//! 2. Configures the audio engine and watches the system default output
//! 3. Turns every character typed on stdin into a key sound
//!
//! ## Command line flags
//!
//! - `--dry-run`: render into a null device (no sound card needed)
//! - `--list-devices`: print output devices and exit

mod args;
mod commands;

use std::io::{self, BufRead};
use std::iter;
use std::path::Path;

use anyhow::{Context, Result};
use crossbeam::channel::{self, Sender};

use args::{Args, USAGE};
use commands::{Command, HELP};
use thock_core::audio::{get_output_devices, BufferPreset, DeviceWatcher, NullDriver};
use thock_core::config::{default_config_path, load_config, save_config, EngineSettings};
use thock_core::engine::{AudioEngine, EngineEvent};
use thock_core::pack::{KeyDirection, KeyMapper, SoundPackManifest};

fn main() -> Result<()> {
    // Initialize logger - set RUST_LOG=debug for verbose output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = Args::parse(std::env::args().skip(1))?;
    if args.help {
        println!("{}", USAGE);
        return Ok(());
    }
    if args.list_devices {
        print_devices();
        return Ok(());
    }

    log::info!("thock starting up");

    // Decoding runs on rayon; build the pool up front so its threads are named
    rayon::ThreadPoolBuilder::new()
        .thread_name(|i| format!("sound-decode-{}", i))
        .build_global()
        .context("Failed to initialize Rayon thread pool")?;

    let config_path = default_config_path();
    let mut settings: EngineSettings = load_config(&config_path);
    apply_args(&mut settings, &args);

    let pack_dir = settings
        .sound_pack
        .clone()
        .context("No sound pack given (pass PACK_DIR or set sound_pack in the config file)")?;

    let engine = if args.dry_run {
        log::info!("Dry run: rendering into a null device");
        AudioEngine::new(Box::new(NullDriver::ticking()))?
    } else {
        AudioEngine::with_cpal()?
    };

    let loaded = engine
        .load_sound_pack(&pack_dir)
        .with_context(|| format!("Failed to load sound pack {:?}", pack_dir))?;
    let manifest = match SoundPackManifest::load(&pack_dir) {
        Ok(manifest) => Some(manifest),
        Err(e) => {
            log::warn!("{}; every key plays a sound from the pack directory", e);
            None
        }
    };

    engine.set_volume(settings.volume);
    engine.set_idle_timeout(settings.idle_timeout());
    engine.set_latency_measurement(settings.measure_latency);
    if let Err(e) = engine.configure(settings.buffer_frames(), settings.device.clone()) {
        log::error!("Audio output unavailable ({}), retrying on the next key", e);
    }

    let (event_tx, event_rx) = channel::unbounded();
    let listener = engine.spawn_event_listener(event_rx)?;
    let watcher_tx = event_tx.clone();
    let watcher = DeviceWatcher::spawn(DeviceWatcher::DEFAULT_INTERVAL, move |_| {
        let _ = watcher_tx.send(EngineEvent::SystemDefaultDeviceChanged);
    })?;

    println!(
        "thock: {} sounds from {} - type away, :help for commands, :quit to exit",
        loaded,
        manifest
            .as_ref()
            .map(|m| m.name.clone())
            .unwrap_or_else(|| pack_dir.display().to_string())
    );

    let mut player = Player::new(engine.clone(), manifest, settings.pitch_variation);
    let mut console = Console {
        engine: &engine,
        events: &event_tx,
        settings: &mut settings,
        config_path: &config_path,
    };

    for line in io::stdin().lock().lines() {
        let line = line.context("Failed to read stdin")?;
        match Command::parse(&line) {
            Some(Ok(Command::Quit)) => break,
            Some(Ok(Command::Pitch(range))) => {
                player.pitch_variation = range;
                console.settings.pitch_variation = range;
            }
            Some(Ok(command)) => console.run(command),
            Some(Err(e)) => eprintln!("{}", e),
            None => {
                for c in line.chars().chain(iter::once('\n')) {
                    player.key(KeyMapper::from_char(c));
                }
            }
        }
        engine.drain_latency();
    }

    drop(watcher);
    drop(console);
    drop(event_tx);
    if listener.join().is_err() {
        log::warn!("Engine event thread panicked");
    }
    engine.shutdown();

    if args.save {
        save_config(&settings, &config_path)?;
    }
    Ok(())
}

/// Command line values override the config file
fn apply_args(settings: &mut EngineSettings, args: &Args) {
    if let Some(dir) = &args.pack_dir {
        settings.sound_pack = Some(dir.clone());
    }
    if let Some(frames) = args.buffer {
        settings.buffer_size = BufferPreset::Custom(frames);
    }
    if let Some(device) = &args.device {
        settings.device = Some(device.clone());
    }
    if let Some(volume) = args.volume {
        settings.volume = volume;
    }
    if let Some(pitch) = args.pitch {
        settings.pitch_variation = pitch;
    }
    if let Some(secs) = args.idle_secs {
        settings.idle_timeout_secs = secs;
    }
    if args.measure_latency {
        settings.measure_latency = true;
    }
}

/// Turns key names into `play()` calls
struct Player {
    engine: AudioEngine,
    manifest: Option<SoundPackManifest>,
    names: Vec<String>,
    pitch_variation: f32,
}

impl Player {
    fn new(engine: AudioEngine, manifest: Option<SoundPackManifest>, pitch_variation: f32) -> Self {
        let mut names = engine.library().names();
        names.sort();
        Self {
            engine,
            manifest,
            names,
            pitch_variation,
        }
    }

    fn key(&self, key: &str) {
        match &self.manifest {
            Some(manifest) => {
                match manifest.pick(key, KeyDirection::Down) {
                    Some(file) => self.play(file),
                    None => log::warn!("No available sound for key {}", key),
                }
                // stdin has no key releases, so the release follows the press
                if let Some(file) = manifest.pick(key, KeyDirection::Up) {
                    self.play(file);
                }
            }
            None => {
                if self.names.is_empty() {
                    return;
                }
                // Same key, same sound
                let index = key.bytes().map(usize::from).sum::<usize>() % self.names.len();
                self.play(&self.names[index]);
            }
        }
    }

    fn play(&self, file: &str) {
        if self.engine.play(file, self.pitch_variation).is_none() {
            log::debug!("Key sound {} not played", file);
        }
    }
}

/// Applies `:commands` and keeps the settings in sync for `:save`
struct Console<'a> {
    engine: &'a AudioEngine,
    events: &'a Sender<EngineEvent>,
    settings: &'a mut EngineSettings,
    config_path: &'a Path,
}

impl Console<'_> {
    fn run(&mut self, command: Command) {
        match command {
            Command::Volume(volume) => {
                self.engine.set_volume(volume);
                self.settings.volume = self.engine.volume();
                println!("volume {:.2}", self.settings.volume);
            }
            Command::Buffer(frames) => {
                self.settings.buffer_size = BufferPreset::Custom(frames);
                self.send(EngineEvent::BufferSizeChanged(frames));
            }
            Command::Device(uid) => {
                self.settings.device = uid.clone();
                self.send(EngineEvent::DeviceChanged(uid));
            }
            Command::Idle(timeout) => {
                self.settings.idle_timeout_secs = timeout.as_secs();
                self.send(EngineEvent::IdleTimeoutChanged(timeout));
            }
            Command::Pitch(range) => self.settings.pitch_variation = range,
            Command::Devices => print_devices(),
            Command::Status => self.print_status(),
            Command::Save => {
                if let Err(e) = save_config(&*self.settings, self.config_path) {
                    eprintln!("{:#}", e);
                }
            }
            Command::Help => println!("{}", HELP),
            Command::Quit => {}
        }
    }

    fn send(&self, event: EngineEvent) {
        if self.events.send(event).is_err() {
            log::warn!("Engine event thread is gone");
        }
    }

    fn print_status(&self) {
        println!("state: {:?}", self.engine.state());
        println!("voices: {}", self.engine.active_voices());
        println!("volume: {:.2}", self.engine.volume());
        println!("idle timeout: {:?}", self.engine.idle_timeout());
        match self.engine.stream_info() {
            Some(info) => println!(
                "stream: {} @ {}Hz, {} frames x {} ({:.1}ms, up to {:.1}ms)",
                info.device_name,
                info.sample_rate,
                info.buffer_frames,
                info.buffer_count,
                info.latency_ms(),
                info.max_latency_ms()
            ),
            None => println!("stream: closed"),
        }
        if let Some(avg) = self.engine.average_latency_ms() {
            println!("trigger latency: {:.2}ms avg", avg);
        }
    }
}

fn print_devices() {
    match get_output_devices() {
        Ok(devices) => {
            for device in devices {
                let marker = if device.is_default { "*" } else { " " };
                println!(
                    "{} {}  ({} ch)  uid: {}",
                    marker,
                    device,
                    device.max_channels,
                    device.uid()
                );
            }
        }
        Err(e) => eprintln!("No output devices: {}", e),
    }
}
