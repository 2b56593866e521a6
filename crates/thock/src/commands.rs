//! `:command` lines typed into the console

use std::time::Duration;

use anyhow::{bail, Context, Result};

pub const HELP: &str = "\
Commands:
  :volume <0-1>      Set master volume
  :buffer <FRAMES>   Change the buffer size
  :device [UID]      Switch output device (no UID = system default)
  :idle <SECS>       Change the idle timeout (0 = never stop)
  :pitch <ST>        Change the random pitch range
  :devices           List output devices
  :status            Show stream state
  :save              Save current settings
  :quit              Exit";

#[derive(Debug, PartialEq)]
pub enum Command {
    Volume(f32),
    Buffer(u32),
    Device(Option<String>),
    Idle(Duration),
    Pitch(f32),
    Devices,
    Status,
    Save,
    Help,
    Quit,
}

impl Command {
    /// Parse a console line; None when the line is not a command
    pub fn parse(line: &str) -> Option<Result<Self>> {
        let rest = line.trim().strip_prefix(':')?;
        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };
        Some(Self::parse_parts(name, arg))
    }

    fn parse_parts(name: &str, arg: &str) -> Result<Self> {
        let command = match name {
            "volume" | "v" => Command::Volume(number(arg, name)?),
            "buffer" | "b" => Command::Buffer(number(arg, name)?),
            "device" | "d" => Command::Device((!arg.is_empty()).then(|| arg.to_string())),
            "idle" => Command::Idle(Duration::from_secs(number(arg, name)?)),
            "pitch" | "p" => Command::Pitch(number(arg, name)?),
            "devices" => Command::Devices,
            "status" | "s" => Command::Status,
            "save" => Command::Save,
            "help" | "h" | "?" => Command::Help,
            "quit" | "q" | "exit" => Command::Quit,
            other => bail!("Unknown command :{} (try :help)", other),
        };
        Ok(command)
    }
}

fn number<T>(arg: &str, name: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    if arg.is_empty() {
        bail!(":{} needs a value", name);
    }
    arg.parse()
        .with_context(|| format!("Invalid value for :{}: {}", name, arg))
}
