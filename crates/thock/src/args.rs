//! Command line parsing

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};

pub const USAGE: &str = "\
Usage: thock [OPTIONS] [PACK_DIR]

Reads keystrokes from stdin (one line at a time) and plays the matching
sound from PACK_DIR. Lines starting with ':' are commands, see :help.

Options:
  --buffer <FRAMES>     Frames per hardware block
  --device <UID>        Output device, \"[HOST] name\" (default: system default)
  --volume <0-1>        Master volume
  --pitch <SEMITONES>   Random pitch variation range
  --idle <SECS>         Close the stream after SECS without sound (0 = never)
  --measure-latency     Log trigger-to-render latency
  --list-devices        Print output devices and exit
  --dry-run             Render into a null device instead of the sound card
  --save                Write the resulting settings to the config file
  -h, --help            Show this help";

/// Parsed command line, every setting optional so it can override the config file
#[derive(Debug, Default, PartialEq)]
pub struct Args {
    pub pack_dir: Option<PathBuf>,
    pub buffer: Option<u32>,
    pub device: Option<String>,
    pub volume: Option<f32>,
    pub pitch: Option<f32>,
    pub idle_secs: Option<u64>,
    pub measure_latency: bool,
    pub list_devices: bool,
    pub dry_run: bool,
    pub save: bool,
    pub help: bool,
}

impl Args {
    pub fn parse<I>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut parsed = Args::default();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--buffer" => parsed.buffer = Some(value(&mut args, &arg)?),
                "--device" => parsed.device = Some(value(&mut args, &arg)?),
                "--volume" => parsed.volume = Some(value(&mut args, &arg)?),
                "--pitch" => parsed.pitch = Some(value(&mut args, &arg)?),
                "--idle" => parsed.idle_secs = Some(value(&mut args, &arg)?),
                "--measure-latency" => parsed.measure_latency = true,
                "--list-devices" => parsed.list_devices = true,
                "--dry-run" => parsed.dry_run = true,
                "--save" => parsed.save = true,
                "-h" | "--help" => parsed.help = true,
                flag if flag.starts_with('-') => bail!("Unknown option: {}", flag),
                path => {
                    if parsed.pack_dir.is_some() {
                        bail!("Unexpected argument: {}", path);
                    }
                    parsed.pack_dir = Some(PathBuf::from(path));
                }
            }
        }

        Ok(parsed)
    }
}

fn value<T, I>(args: &mut I, flag: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    I: Iterator<Item = String>,
{
    let raw = args
        .next()
        .ok_or_else(|| anyhow!("{} needs a value", flag))?;
    raw.parse()
        .with_context(|| format!("Invalid value for {}: {}", flag, raw))
}
