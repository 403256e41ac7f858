//! Frame tick - the per-node scheduler
//!
//! Runs once per display frame. The role is checked exactly once, at
//! construction, which selects one of two code paths:
//!
//! ```text
//! PrimaryTick                               ReplicaTick
//! ───────────                               ───────────
//! 1. drain control queue → state            1. receive newest snapshot (or keep last)
//! 2. camera, dataset year, particles        2. camera ← state.pose
//! 3. media: advance clocks, fetch           3. media: copy clocks in, fetch
//! 4. publish snapshot
//!                      └──────── RenderFrame ────────┘
//! ```
//!
//! Decoding is not replicated: every node decodes its own copy of the media
//! at the clock position carried in the shared state.

use crate::control::{ControlEvent, PresetTable};
use crate::dataset::DatasetCycle;
use crate::decode::PictureBuffers;
use crate::elements::EmissionField;
use crate::media::{ChannelTick, MediaCommand, MediaController};
use crate::navigation::Navigator;
use crate::replication::{ReplicationChannel, ReplicationStats, StateTransport};
use crate::role::PrimaryAuthority;
use crate::state::SharedState;
use crate::types::{MediaChannel, Pose, Role, Toggle};

/// Primary-only inputs and simulations
pub struct PrimaryInputs {
    pub controls: rtrb::Consumer<ControlEvent>,
    pub navigator: Navigator,
    pub dataset: DatasetCycle,
    pub emissions: EmissionField,
    pub presets: PresetTable,
}

struct PrimaryTick {
    authority: PrimaryAuthority,
    inputs: PrimaryInputs,
}

struct ReplicaTick {
    /// Local camera, overwritten from every applied snapshot
    camera: Pose,
}

enum TickPath {
    Primary(Box<PrimaryTick>),
    Replica(ReplicaTick),
}

/// What rendering gets each frame
pub struct RenderFrame<'a> {
    pub frame: u64,
    pub role: Role,
    pub state: &'a SharedState,
    /// Camera to render with
    pub camera: Pose,
    /// A new snapshot was applied this frame (always true on the primary)
    pub fresh: bool,
    media: &'a [MediaController],
    ticks: &'a [ChannelTick],
}

impl<'a> RenderFrame<'a> {
    pub fn controller(&self, channel: MediaChannel) -> Option<&'a MediaController> {
        self.media.iter().find(|m| m.channel() == channel)
    }

    /// Picture of the channel's active slot; all planes from one picture
    pub fn picture(&self, channel: MediaChannel) -> Option<&'a PictureBuffers> {
        self.controller(channel).and_then(|m| m.active_picture())
    }

    /// Picture of the channel's preloading slot, if it renders
    pub fn preload_picture(&self, channel: MediaChannel) -> Option<&'a PictureBuffers> {
        self.controller(channel).and_then(|m| m.preload_picture())
    }

    pub fn tick(&self, channel: MediaChannel) -> Option<ChannelTick> {
        self.media
            .iter()
            .position(|m| m.channel() == channel)
            .and_then(|i| self.ticks.get(i).copied())
    }
}

/// Rendering boundary
pub trait RenderSink {
    fn present(&mut self, frame: &RenderFrame<'_>);
}

/// Per-node frame scheduler
pub struct FrameTick<T: StateTransport> {
    path: TickPath,
    state: SharedState,
    channel: ReplicationChannel<T>,
    media: Vec<MediaController>,
    ticks: Vec<ChannelTick>,
    frame: u64,
}

impl<T: StateTransport> FrameTick<T> {
    pub fn primary(
        authority: PrimaryAuthority,
        channel: ReplicationChannel<T>,
        media: Vec<MediaController>,
        inputs: PrimaryInputs,
    ) -> Self {
        let mut state = SharedState::default();
        state.pose = inputs.navigator.pose();
        Self::with_path(
            TickPath::Primary(Box::new(PrimaryTick { authority, inputs })),
            state,
            channel,
            media,
        )
    }

    pub fn replica(channel: ReplicationChannel<T>, media: Vec<MediaController>) -> Self {
        let state = SharedState::default();
        let camera = state.pose;
        Self::with_path(
            TickPath::Replica(ReplicaTick { camera }),
            state,
            channel,
            media,
        )
    }

    fn with_path(
        path: TickPath,
        state: SharedState,
        channel: ReplicationChannel<T>,
        media: Vec<MediaController>,
    ) -> Self {
        let idle = ChannelTick {
            active: crate::decode::FetchOutcome::Idle,
            preload: crate::decode::FetchOutcome::Idle,
        };
        let ticks = vec![idle; media.len()];
        Self {
            path,
            state,
            channel,
            media,
            ticks,
            frame: 0,
        }
    }

    pub fn role(&self) -> Role {
        match self.path {
            TickPath::Primary(_) => Role::Primary,
            TickPath::Replica(_) => Role::Replica,
        }
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn replication_stats(&self) -> ReplicationStats {
        self.channel.stats()
    }

    pub fn media(&self) -> &[MediaController] {
        &self.media
    }

    /// Run one frame with `dt` seconds since the previous one
    pub fn tick(&mut self, dt: f64) -> RenderFrame<'_> {
        self.frame += 1;
        let (camera, fresh) = match &mut self.path {
            TickPath::Primary(primary) => {
                primary.run(&mut self.state, &mut self.media, &mut self.ticks, dt);
                self.channel.publish(&self.state, primary.authority);
                (self.state.pose, true)
            }
            TickPath::Replica(replica) => {
                let fresh = replica.run(
                    &mut self.state,
                    &mut self.channel,
                    &mut self.media,
                    &mut self.ticks,
                );
                (replica.camera, fresh)
            }
        };

        RenderFrame {
            frame: self.frame,
            role: self.role(),
            state: &self.state,
            camera,
            fresh,
            media: &self.media,
            ticks: &self.ticks,
        }
    }
}

impl PrimaryTick {
    fn run(
        &mut self,
        state: &mut SharedState,
        media: &mut [MediaController],
        ticks: &mut [ChannelTick],
        dt: f64,
    ) {
        let authority = self.authority;

        while let Ok(event) = self.inputs.controls.pop() {
            self.apply(event, state, media);
        }

        state.pose = self
            .inputs
            .navigator
            .update(dt, state.toggle(Toggle::AUTO_ROTATE), authority);
        self.inputs.dataset.update(state, dt, authority);
        let elements = self.inputs.emissions.update(dt, authority);
        state.set_elements(elements);

        for (controller, tick) in media.iter_mut().zip(ticks.iter_mut()) {
            *tick = controller.tick_primary(state, dt, authority);
        }
    }

    fn apply(&mut self, event: ControlEvent, state: &mut SharedState, media: &mut [MediaController]) {
        match event {
            ControlEvent::SetToggle { toggle, on } => state.set_toggle(toggle, on),
            ControlEvent::SetScalar { scalar, value } => {
                if value.is_finite() {
                    state.set_scalar(scalar, value);
                } else {
                    log::warn!("[CONTROL] Ignoring non-finite value for scalar {}", scalar.0);
                }
            }
            ControlEvent::Media { channel, command } => {
                self.media_command(channel, command, state, media);
            }
            ControlEvent::FlyTo(target) => self.inputs.navigator.fly_to(target),
            ControlEvent::SetPose(pose) => self.inputs.navigator.set_pose(pose),
            ControlEvent::Preset(name) => match self.inputs.presets.get(&name) {
                Some(asset) => {
                    log::info!("[CONTROL] Preset '{}' → '{}'", name, asset.as_str());
                    self.media_command(MediaChannel::PANORAMA, MediaCommand::Load(asset), state, media);
                    self.media_command(MediaChannel::PANORAMA, MediaCommand::Play, state, media);
                }
                None => log::warn!("[CONTROL] Unknown preset '{}'", name),
            },
        }
    }

    fn media_command(
        &self,
        channel: MediaChannel,
        command: MediaCommand,
        state: &mut SharedState,
        media: &mut [MediaController],
    ) {
        match media.iter_mut().find(|m| m.channel() == channel) {
            Some(controller) => controller.apply_command(command, state, self.authority),
            None => log::warn!(
                "[CONTROL] No media controller for channel {}, dropping {}",
                channel.name(),
                command.name()
            ),
        }
    }
}

impl ReplicaTick {
    /// Returns true if a new snapshot was applied
    fn run<T: StateTransport>(
        &mut self,
        state: &mut SharedState,
        channel: &mut ReplicationChannel<T>,
        media: &mut [MediaController],
        ticks: &mut [ChannelTick],
    ) -> bool {
        let fresh = match channel.receive_latest() {
            Some(snapshot) => {
                *state = snapshot;
                true
            }
            None => false,
        };
        self.camera = state.pose;

        for (controller, tick) in media.iter_mut().zip(ticks.iter_mut()) {
            *tick = controller.tick_replica(state);
        }
        fresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::control::control_channel;
    use crate::dataset::DatasetConfig;
    use crate::decode::{FetchOutcome, SlotState};
    use crate::media::ChannelBinding;
    use crate::navigation::GeoLocation;
    use crate::replication::{LoopbackBus, LoopbackPublisher, LoopbackSubscriber};
    use crate::state::AssetName;
    use crate::test_support::{MapResolver, ScriptHandle, ScriptedDecoder};
    use crate::types::{ClockId, Scalar};

    const DT: f64 = 0.02;

    fn controllers(script: &ScriptHandle) -> Vec<MediaController> {
        [ChannelBinding::PANORAMA, ChannelBinding::GLOBE]
            .into_iter()
            .map(|binding| {
                MediaController::new(binding, script.factory(), Arc::new(MapResolver::new()))
            })
            .collect()
    }

    struct Cluster {
        controls: rtrb::Producer<ControlEvent>,
        primary: FrameTick<LoopbackPublisher>,
        replica: FrameTick<LoopbackSubscriber>,
    }

    /// Primary and replica with separate decoders over one loopback bus
    fn cluster(primary_script: &ScriptHandle, replica_script: &ScriptHandle) -> Cluster {
        let _ = env_logger::builder().is_test(true).try_init();
        let bus = LoopbackBus::new();
        let (controls, consumer) = control_channel();
        let inputs = PrimaryInputs {
            controls: consumer,
            navigator: Navigator::new(GeoLocation::default()),
            dataset: DatasetCycle::new(DatasetConfig::default()),
            emissions: EmissionField::with_seed(16, 2, 9),
            presets: PresetTable::from_pairs([("water", "out3r2x")]),
        };
        let authority = Role::Primary.authority().unwrap();
        let replica = FrameTick::replica(
            ReplicationChannel::new(bus.subscribe()),
            controllers(replica_script),
        );
        let primary = FrameTick::primary(
            authority,
            ReplicationChannel::new(bus.publisher()),
            controllers(primary_script),
            inputs,
        );
        Cluster {
            controls,
            primary,
            replica,
        }
    }

    fn send(cluster: &mut Cluster, event: ControlEvent) {
        cluster.controls.push(event).unwrap();
    }

    fn load(cluster: &mut Cluster, asset: &str) {
        send(
            cluster,
            ControlEvent::Media {
                channel: MediaChannel::PANORAMA,
                command: MediaCommand::Load(AssetName::new(asset).unwrap()),
            },
        );
    }

    /// Frame index shown on the panorama channel of (primary, replica)
    fn step(cluster: &mut Cluster, dt: f64) -> (Option<u8>, Option<u8>) {
        let p = cluster.primary.tick(dt);
        let p_frame = p
            .picture(MediaChannel::PANORAMA)
            .and_then(|b| ScriptedDecoder::frame_of(b.planes()));
        let r = cluster.replica.tick(dt);
        let r_frame = r
            .picture(MediaChannel::PANORAMA)
            .and_then(|b| ScriptedDecoder::frame_of(b.planes()));
        (p_frame, r_frame)
    }

    #[test]
    fn test_replica_before_first_snapshot_renders_defaults() {
        let script = ScriptHandle::new(10.0);
        let mut cluster = cluster(&script, &script);
        let frame = cluster.replica.tick(DT);
        assert!(!frame.fresh);
        assert_eq!(*frame.state, SharedState::default());
        assert!(frame.picture(MediaChannel::PANORAMA).is_none());
    }

    #[test]
    fn test_replica_mirrors_pose_and_toggles() {
        let script = ScriptHandle::new(10.0);
        let mut cluster = cluster(&script, &script);
        send(
            &mut cluster,
            ControlEvent::SetToggle {
                toggle: Toggle::AUTO_ROTATE,
                on: true,
            },
        );
        send(
            &mut cluster,
            ControlEvent::SetToggle {
                toggle: Toggle::layer(2).unwrap(),
                on: true,
            },
        );
        send(
            &mut cluster,
            ControlEvent::SetScalar {
                scalar: Scalar::LIGHT_INTENSITY,
                value: 0.25,
            },
        );

        for _ in 0..5 {
            let primary_state = *cluster.primary.tick(DT).state;
            let frame = cluster.replica.tick(DT);
            assert!(frame.fresh);
            assert_eq!(frame.camera, primary_state.pose);
            assert_eq!(frame.state.toggles, primary_state.toggles);
            assert_eq!(frame.state.elements(), primary_state.elements());
        }
        let frame = cluster.replica.tick(DT);
        assert!(frame.state.toggle(Toggle::layer(2).unwrap()));
        assert_eq!(frame.state.scalar(Scalar::LIGHT_INTENSITY), 0.25);
        assert!(!frame.state.elements().is_empty());
    }

    #[test]
    fn test_stale_replica_keeps_last_snapshot() {
        let script = ScriptHandle::new(10.0);
        let mut cluster = cluster(&script, &script);
        cluster.primary.tick(DT);
        let first = *cluster.replica.tick(DT).state;
        // No primary tick in between: nothing new arrives
        let frame = cluster.replica.tick(DT);
        assert!(!frame.fresh);
        assert_eq!(*frame.state, first);
    }

    #[test]
    fn test_replica_never_advances_clocks() {
        let script = ScriptHandle::new(10.0);
        let mut cluster = cluster(&script, &script);
        load(&mut cluster, "a");
        send(
            &mut cluster,
            ControlEvent::Media {
                channel: MediaChannel::PANORAMA,
                command: MediaCommand::Play,
            },
        );
        step(&mut cluster, DT);
        step(&mut cluster, DT);
        let clock = cluster.replica.state().clock(ClockId::PANORAMA);
        // Replica ticks alone with a large dt: its clock does not move
        for _ in 0..3 {
            cluster.replica.tick(1.0);
        }
        assert_eq!(cluster.replica.state().clock(ClockId::PANORAMA), clock);
        assert_eq!(
            cluster.replica.media()[0].clock().value(),
            cluster.primary.state().clock(ClockId::PANORAMA)
        );
    }

    #[test]
    fn test_loop_wrap_shows_first_frame_on_both_nodes() {
        let primary_script = ScriptHandle::new(10.0);
        let replica_script = ScriptHandle::new(10.0);
        let mut cluster = cluster(&primary_script, &replica_script);
        load(&mut cluster, "clip");
        for event in [
            ControlEvent::Media {
                channel: MediaChannel::PANORAMA,
                command: MediaCommand::SetLooping(true),
            },
            ControlEvent::Media {
                channel: MediaChannel::PANORAMA,
                command: MediaCommand::Play,
            },
        ] {
            send(&mut cluster, event);
        }
        // Load at 0, then jump close to the end
        step(&mut cluster, 0.0);
        step(&mut cluster, 9.98);
        assert!((cluster.primary.state().clock(ClockId::PANORAMA) - 9.98).abs() < 1e-9);

        let wrapped = cluster.primary.tick(DT).tick(MediaChannel::PANORAMA);
        assert_eq!(wrapped.map(|t| t.active), Some(FetchOutcome::LoopWrapped));
        let p = cluster
            .primary
            .media()[0]
            .active_picture()
            .and_then(|b| ScriptedDecoder::frame_of(b.planes()));
        let r = cluster
            .replica
            .tick(DT)
            .picture(MediaChannel::PANORAMA)
            .and_then(|b| ScriptedDecoder::frame_of(b.planes()));
        assert_eq!(cluster.primary.state().clock(ClockId::PANORAMA), 0.0);
        assert_eq!(cluster.replica.state().clock(ClockId::PANORAMA), 0.0);
        assert_eq!(p, Some(0));
        assert_eq!(r, Some(0));
        // Replica followed by seeking its own decoder back
        assert!(replica_script.log().seeks.contains(&0.0));

        let (p, r) = step(&mut cluster, DT);
        assert_eq!((p, r), (Some(1), Some(1)));
    }

    fn panorama(command: MediaCommand) -> ControlEvent {
        ControlEvent::Media {
            channel: MediaChannel::PANORAMA,
            command,
        }
    }

    #[test]
    fn test_rewind_after_end_restarts_both_nodes() {
        let primary_script = ScriptHandle::new(1.0);
        let replica_script = ScriptHandle::new(1.0);
        let mut cluster = cluster(&primary_script, &replica_script);
        load(&mut cluster, "clip");
        send(&mut cluster, panorama(MediaCommand::Play));
        step(&mut cluster, 0.0);
        assert_eq!(step(&mut cluster, 0.75), (Some(37), Some(37)));
        assert_eq!(step(&mut cluster, 0.125), (Some(43), Some(43)));
        // Clock reaches the end: both hold the last picture
        assert_eq!(step(&mut cluster, 0.125), (Some(43), Some(43)));
        step(&mut cluster, 0.125);
        for node in [&cluster.primary.media()[0], &cluster.replica.media()[0]] {
            assert_eq!(node.active_state(), SlotState::Exhausted);
        }

        send(&mut cluster, panorama(MediaCommand::Rewind));
        assert_eq!(step(&mut cluster, 0.125), (Some(6), Some(6)));
        assert_eq!(step(&mut cluster, 0.125), (Some(12), Some(12)));
        for node in [&cluster.primary.media()[0], &cluster.replica.media()[0]] {
            assert_eq!(node.active_state(), SlotState::Ready);
        }
        assert_eq!(
            cluster.replica.state().clock(ClockId::PANORAMA),
            cluster.primary.state().clock(ClockId::PANORAMA)
        );
        assert_eq!(replica_script.log().seeks, vec![0.125]);
    }

    #[test]
    fn test_replica_waits_for_primary_wrap_when_its_stream_is_shorter() {
        let primary_script = ScriptHandle::new(1.0);
        let replica_script = ScriptHandle::new(1.0);
        replica_script.set_duration("clip", 0.875);
        let mut cluster = cluster(&primary_script, &replica_script);
        load(&mut cluster, "clip");
        send(&mut cluster, panorama(MediaCommand::SetLooping(true)));
        send(&mut cluster, panorama(MediaCommand::Play));
        step(&mut cluster, 0.0);
        assert_eq!(step(&mut cluster, 0.75), (Some(37), Some(37)));

        // Replica's copy has ended; it holds its picture and keeps its position
        assert_eq!(step(&mut cluster, 0.125), (Some(43), Some(37)));
        assert!(replica_script.log().seeks.is_empty());
        assert_eq!(cluster.replica.media()[0].active_state(), SlotState::Ready);

        // Primary wraps; replica follows the clock back to the start
        assert_eq!(step(&mut cluster, 0.125), (Some(0), Some(0)));
        assert_eq!(cluster.replica.state().clock(ClockId::PANORAMA), 0.0);
        assert_eq!(replica_script.log().seeks, vec![0.0]);
        assert_eq!(step(&mut cluster, DT), (Some(1), Some(1)));
    }

    #[test]
    fn test_preload_swap_never_shows_zero_or_two_active() {
        let script = ScriptHandle::new(10.0);
        let mut cluster = cluster(&script, &script);
        load(&mut cluster, "a");
        send(
            &mut cluster,
            ControlEvent::Media {
                channel: MediaChannel::PANORAMA,
                command: MediaCommand::Play,
            },
        );
        for _ in 0..10 {
            step(&mut cluster, DT);
        }

        send(
            &mut cluster,
            ControlEvent::Media {
                channel: MediaChannel::PANORAMA,
                command: MediaCommand::Preload(AssetName::new("b").unwrap()),
            },
        );
        step(&mut cluster, DT);
        for node in [&cluster.primary.media()[0], &cluster.replica.media()[0]] {
            assert_eq!(node.arena().active().asset(), "a");
            assert_eq!(node.preload_state(), SlotState::Ready);
        }

        send(
            &mut cluster,
            ControlEvent::Media {
                channel: MediaChannel::PANORAMA,
                command: MediaCommand::Swap,
            },
        );
        let (p, r) = step(&mut cluster, DT);
        assert!(p.is_some() && r.is_some());
        for node in [&cluster.primary.media()[0], &cluster.replica.media()[0]] {
            assert_eq!(node.arena().active().asset(), "b");
            assert_eq!(node.active_state(), SlotState::Ready);
            assert_eq!(node.preload_state(), SlotState::Empty);
        }
    }

    #[test]
    fn test_preset_loads_panorama() {
        let script = ScriptHandle::new(10.0);
        let mut cluster = cluster(&script, &script);
        send(&mut cluster, ControlEvent::Preset("water".to_string()));
        send(&mut cluster, ControlEvent::Preset("unknown".to_string()));
        step(&mut cluster, DT);
        let state = cluster.primary.state();
        assert_eq!(state.cue(MediaChannel::PANORAMA).asset.as_str(), "out3r2x");
        assert!(state.toggle(Toggle::PANORAMA_PLAYING));
        assert_eq!(cluster.replica.media()[0].arena().active().asset(), "out3r2x");
    }

    #[test]
    fn test_fly_to_reaches_replica() {
        let script = ScriptHandle::new(10.0);
        let mut cluster = cluster(&script, &script);
        let target = GeoLocation::new(30.0, 45.0, 2.0);
        send(&mut cluster, ControlEvent::FlyTo(target));
        for _ in 0..5 {
            step(&mut cluster, 0.5);
        }
        let camera = cluster.replica.tick(0.0).camera;
        let at = GeoLocation::from_position(camera.position);
        assert!((at.lat - 30.0).abs() < 1e-6);
        assert!((at.lon - 45.0).abs() < 1e-6);
    }
}
