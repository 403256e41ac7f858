//! Operator console on stdin
//!
//! One command per line. On the primary each command becomes one or more
//! [`ControlEvent`]s pushed into the frame tick's control queue. Replicas
//! only honour `quit`.
//!
//! ```text
//! load <ch> <asset>      preload <ch> <asset>     swap <ch>     unload <ch>
//! play [ch]              pause [ch]               rewind [ch]
//! loop <ch> on|off       toggle <name> on|off     set <scalar> <value>
//! fly <lat> <lon> <radius>                        preset <name>
//! quit
//! ```

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{anyhow, bail, Context, Result};

use dome_core::control::ControlEvent;
use dome_core::media::MediaCommand;
use dome_core::navigation::GeoLocation;
use dome_core::{AssetName, MediaChannel, Role, Scalar, Toggle};

/// A parsed console line
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Control(ControlEvent),
    Quit,
}

/// Parse one console line; blank lines yield `None`
pub fn parse_line(line: &str) -> Result<Option<ConsoleCommand>> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let Some((&verb, args)) = words.split_first() else {
        return Ok(None);
    };

    let event = match (verb, args) {
        ("quit" | "exit", []) => return Ok(Some(ConsoleCommand::Quit)),
        ("load", [ch, asset]) => media(ch, MediaCommand::Load(asset_name(asset)?))?,
        ("preload", [ch, asset]) => media(ch, MediaCommand::Preload(asset_name(asset)?))?,
        ("swap", [ch]) => media(ch, MediaCommand::Swap)?,
        ("unload", [ch]) => media(ch, MediaCommand::Unload)?,
        ("play", rest) => media(optional_channel(rest)?, MediaCommand::Play)?,
        ("pause", rest) => media(optional_channel(rest)?, MediaCommand::Pause)?,
        ("rewind", rest) => media(optional_channel(rest)?, MediaCommand::Rewind)?,
        ("loop", [ch, state]) => media(ch, MediaCommand::SetLooping(on_off(state)?))?,
        ("toggle", [name, state]) => ControlEvent::SetToggle {
            toggle: Toggle::from_name(name).ok_or_else(|| anyhow!("Unknown toggle '{}'", name))?,
            on: on_off(state)?,
        },
        ("set", [name, value]) => ControlEvent::SetScalar {
            scalar: Scalar::from_name(name).ok_or_else(|| anyhow!("Unknown scalar '{}'", name))?,
            value: number(value)? as f32,
        },
        ("fly", [lat, lon, radius]) => {
            ControlEvent::FlyTo(GeoLocation::new(number(lat)?, number(lon)?, number(radius)?))
        }
        ("preset", [name]) => ControlEvent::Preset(name.to_string()),
        _ => bail!("Unrecognised command '{}'", line.trim()),
    };
    Ok(Some(ConsoleCommand::Control(event)))
}

fn media(channel: &str, command: MediaCommand) -> Result<ControlEvent> {
    Ok(ControlEvent::Media {
        channel: channel_from_name(channel)?,
        command,
    })
}

fn optional_channel<'a>(args: &[&'a str]) -> Result<&'a str> {
    match args {
        [] => Ok("panorama"),
        [ch] => Ok(*ch),
        _ => bail!("Expected at most one channel"),
    }
}

fn channel_from_name(name: &str) -> Result<MediaChannel> {
    if let Ok(index) = name.parse::<usize>() {
        return MediaChannel::from_index(index).ok_or_else(|| anyhow!("No media channel {}", index));
    }
    MediaChannel::ALL
        .into_iter()
        .find(|c| c.name() == name)
        .ok_or_else(|| anyhow!("Unknown media channel '{}'", name))
}

fn asset_name(id: &str) -> Result<AssetName> {
    AssetName::new(id).ok_or_else(|| anyhow!("Asset id '{}' is too long", id))
}

fn on_off(word: &str) -> Result<bool> {
    match word {
        "on" | "1" | "true" => Ok(true),
        "off" | "0" | "false" => Ok(false),
        _ => bail!("Expected on|off, got '{}'", word),
    }
}

fn number(word: &str) -> Result<f64> {
    let value: f64 = word
        .parse()
        .with_context(|| format!("'{}' is not a number", word))?;
    if !value.is_finite() {
        bail!("'{}' is not finite", word);
    }
    Ok(value)
}

/// Read stdin until EOF or `quit`, feeding `controls` on the primary
///
/// Sets `quit` when the operator quits or stdin closes.
pub fn spawn_console(
    role: Role,
    mut controls: Option<rtrb::Producer<ControlEvent>>,
    quit: Arc<AtomicBool>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("console".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        log::warn!("[CONSOLE] stdin read failed: {}", e);
                        break;
                    }
                };
                match parse_line(&line) {
                    Ok(None) => {}
                    Ok(Some(ConsoleCommand::Quit)) => break,
                    Ok(Some(ConsoleCommand::Control(event))) => match controls.as_mut() {
                        Some(producer) => {
                            if producer.push(event).is_err() {
                                log::warn!("[CONSOLE] Control queue full, command dropped");
                            }
                        }
                        None => log::warn!("[CONSOLE] {} ignores operator input", role.name()),
                    },
                    Err(e) => log::warn!("[CONSOLE] {:#}", e),
                }
            }
            log::info!("[CONSOLE] Closed, shutting down");
            quit.store(true, Ordering::Release);
        })
}
