//! Dome Node - one process per display/audio node of the dome cluster
//!
//! This is the main entry point for a cluster node. It:
//! 1. Establishes the node's role (primary or replica) once
//! 2. Binds the replication transport
//! 3. Runs the frame tick at the display rate and hands frames to the renderer
//!
//! ## Command line flags
//!
//! - `--primary` / `--replica`: force the role (overrides the config file)
//! - `--config <path>`: config file (default `~/.config/dome-node/config.yaml`)

mod config;
mod console;
mod render;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};

use config::NodeConfig;
use dome_core::config::{default_config_path, load_config};
use dome_core::control::{control_channel, ControlEvent, PresetTable};
use dome_core::dataset::DatasetCycle;
use dome_core::decode::{DecoderFactory, SequenceDecoderFactory};
use dome_core::elements::EmissionField;
use dome_core::media::{AssetResolver, ChannelBinding, MediaCommand, MediaController, MediaRoot};
use dome_core::navigation::{GeoLocation, Navigator};
use dome_core::replication::{ReplicationChannel, StateTransport, UdpTransport};
use dome_core::role::local_hostname;
use dome_core::{AssetName, FrameTick, MediaChannel, PrimaryInputs, RenderSink, Role, RoleCoordinator, RoleSources};
use render::LogRenderSink;

/// Particles in the emission field
const EMISSION_PARTICLES: usize = 384;
/// Emission sites on the globe
const EMISSION_SITES: usize = 12;
/// Longest frame delta fed to the tick (a stalled frame must not jump clocks)
const MAX_FRAME_DT: f64 = 0.25;

#[derive(Debug, Default)]
struct Args {
    primary: bool,
    replica: bool,
    config: Option<PathBuf>,
}

fn parse_args() -> Result<Args> {
    let mut args = Args::default();
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--primary" => args.primary = true,
            "--replica" => args.replica = true,
            "--config" => {
                let path = iter.next().context("--config needs a path")?;
                args.config = Some(PathBuf::from(path));
            }
            other => bail!("Unknown argument '{}' (expected --primary, --replica, --config <path>)", other),
        }
    }
    Ok(args)
}

fn main() -> Result<()> {
    // Initialize logger - set RUST_LOG=debug for verbose output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    if let Err(e) = run() {
        log::error!("dome-node failed to start: {:#}", e);
        return Err(e);
    }
    Ok(())
}

fn run() -> Result<()> {
    let args = parse_args()?;
    log::info!("dome-node starting up");

    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    let (config, _origin): (NodeConfig, _) = load_config(&config_path);
    config.validate()?;

    let coordinator = RoleCoordinator::establish(&RoleSources {
        cli_primary: args.primary,
        cli_replica: args.replica,
        config_role: config.role,
        primary_hostname: config.primary_hostname.clone(),
        hostname: local_hostname(),
    })?;
    let role = coordinator.role();

    let transport = UdpTransport::bind(
        &config.network.bind,
        &config.network.targets,
        config.network.broadcast,
    )?;

    let media = media_controllers(&config, role);
    let quit = Arc::new(AtomicBool::new(false));

    // The one place the role decides which tick path runs
    let (tick, console_controls) = match coordinator.authority() {
        Some(authority) => {
            let (mut producer, consumer) = control_channel();
            for event in startup_events(&config) {
                if producer.push(event).is_err() {
                    log::warn!("[NODE] Control queue full at startup");
                }
            }
            let inputs = PrimaryInputs {
                controls: consumer,
                navigator: Navigator::new(GeoLocation::default()),
                dataset: DatasetCycle::new(config.dataset),
                emissions: EmissionField::new(EMISSION_PARTICLES, EMISSION_SITES),
                presets: PresetTable::from_pairs(
                    config.media.presets.iter().map(|(k, v)| (k.as_str(), v.as_str())),
                ),
            };
            let channel = ReplicationChannel::new(transport);
            (FrameTick::primary(authority, channel, media, inputs), Some(producer))
        }
        None => (FrameTick::replica(ReplicationChannel::new(transport), media), None),
    };

    let console = console::spawn_console(role, console_controls, quit.clone())
        .context("Failed to spawn console thread")?;

    run_frame_loop(tick, &mut LogRenderSink::new(), config.display.frame_rate, &quit);

    log::info!("dome-node shutting down");
    // The console thread blocks on stdin; only wait for it when it already ended
    if console.is_finished() {
        let _ = console.join();
    }
    Ok(())
}

fn media_controllers(config: &NodeConfig, role: Role) -> Vec<MediaController> {
    let root = config.media.root_for(role);
    log::info!("[NODE] Media root {:?}", root);
    let factory: Arc<dyn DecoderFactory> =
        Arc::new(SequenceDecoderFactory::new(config.media.sequence_fps));
    let resolver: Arc<dyn AssetResolver> = Arc::new(MediaRoot::new(root.clone()));

    [ChannelBinding::PANORAMA, ChannelBinding::GLOBE]
        .into_iter()
        .map(|binding| {
            MediaController::new(binding, factory.clone(), resolver.clone())
                .with_swap_mode(config.media.swap_mode)
        })
        .collect()
}

/// Start the looping data video on the globe channel
fn startup_events(config: &NodeConfig) -> Vec<ControlEvent> {
    let Some(id) = config.media.data_video.as_deref() else {
        return Vec::new();
    };
    let Some(asset) = AssetName::new(id) else {
        log::warn!("[NODE] data_video '{}' is not a valid asset id", id);
        return Vec::new();
    };
    [
        MediaCommand::SetLooping(true),
        MediaCommand::Load(asset),
        MediaCommand::Play,
    ]
    .into_iter()
    .map(|command| ControlEvent::Media {
        channel: MediaChannel::GLOBE,
        command,
    })
    .collect()
}

fn run_frame_loop<T: StateTransport>(
    mut tick: FrameTick<T>,
    sink: &mut dyn RenderSink,
    frame_rate: f64,
    quit: &AtomicBool,
) {
    let period = Duration::from_secs_f64(1.0 / frame_rate);
    log::info!(
        "[NODE] {} frame loop at {:.1} Hz",
        tick.role().name(),
        frame_rate
    );

    let mut last = Instant::now();
    while !quit.load(Ordering::Acquire) {
        let started = Instant::now();
        let dt = started.duration_since(last).as_secs_f64().min(MAX_FRAME_DT);
        last = started;

        let frame = tick.tick(dt);
        sink.present(&frame);

        if let Some(rest) = period.checked_sub(started.elapsed()) {
            std::thread::sleep(rest);
        }
    }

    let stats = tick.replication_stats();
    log::info!(
        "[NODE] {} frames, replication sent {} received {} stale {} malformed {}",
        tick.frame(),
        stats.sent,
        stats.received,
        stats.stale,
        stats.malformed
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_startup_events_start_looping_data_video() {
        let mut config = NodeConfig::default();
        assert!(startup_events(&config).is_empty());

        config.media.data_video = Some("sst_anomaly".to_string());
        let events = startup_events(&config);
        assert_eq!(events.len(), 3);
        assert!(events.iter().all(|e| matches!(
            e,
            ControlEvent::Media {
                channel: MediaChannel::GLOBE,
                ..
            }
        )));
        assert_eq!(
            events[1],
            ControlEvent::Media {
                channel: MediaChannel::GLOBE,
                command: MediaCommand::Load(AssetName::new("sst_anomaly").unwrap()),
            }
        );
    }

    #[test]
    fn test_replica_uses_replica_root() {
        let mut config = NodeConfig::default();
        config.media.replica_root = Some(PathBuf::from("/mnt/dome"));
        let controllers = media_controllers(&config, Role::Replica);
        assert_eq!(controllers.len(), 2);
        assert_eq!(controllers[0].channel(), MediaChannel::PANORAMA);
        assert_eq!(controllers[1].channel(), MediaChannel::GLOBE);
    }
}
