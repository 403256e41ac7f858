//! Media controller - load / preload / swap orchestration for one channel
//!
//! Every node runs one controller per media channel and reconciles its
//! decode slots against the channel's [`MediaCue`] in the shared state.
//! Decoding is local; only the asset selection and clock position are
//! shared.
//!
//! # Tick flow
//!
//! ```text
//! Primary:  commands → cue ─┐
//!                           ├─▶ reconcile slots ─▶ advance clocks ─▶ fetch ─▶ clocks → state
//! Replica:  received cue ───┘                     (copied from state)
//! ```
//!
//! Two switching patterns:
//! - **Simple replace** (`load`): the active slot is discarded and the new
//!   asset loaded in its place; the clock restarts. A visible gap is fine.
//! - **Preload + swap**: the new asset loads into the inactive slot while
//!   the active one keeps playing; `swap` promotes it in one transition.

mod arena;
mod command;
mod resolve;

pub use arena::{SlotArena, SlotIndex};
pub use command::MediaCommand;
pub use resolve::{AssetResolver, MediaRoot};

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::clock::PlaybackClock;
use crate::decode::{DecodeSlot, DecoderFactory, FetchOutcome, PictureBuffers, SlotState};
use crate::role::PrimaryAuthority;
use crate::state::{AssetName, MediaCue, SharedState};
use crate::types::{ClockId, MediaChannel, Toggle};

/// What happens to the clock of a promoted slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapMode {
    /// The promoted slot starts again from the loop target
    #[default]
    Restart,
    /// The promoted slot keeps the position its preload clock reached
    TransferClock,
}

/// Where a channel's clocks and toggles live in the shared state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelBinding {
    pub channel: MediaChannel,
    pub clock: ClockId,
    /// Clock of the preloading slot; `None` disables preload rendering
    pub preload_clock: Option<ClockId>,
    pub playing: Toggle,
    pub looping: Toggle,
}

impl ChannelBinding {
    pub const PANORAMA: ChannelBinding = ChannelBinding {
        channel: MediaChannel::PANORAMA,
        clock: ClockId::PANORAMA,
        preload_clock: Some(ClockId::PANORAMA_PRELOAD),
        playing: Toggle::PANORAMA_PLAYING,
        looping: Toggle::PANORAMA_LOOP,
    };

    pub const GLOBE: ChannelBinding = ChannelBinding {
        channel: MediaChannel::GLOBE,
        clock: ClockId::GLOBE,
        preload_clock: None,
        playing: Toggle::GLOBE_PLAYING,
        looping: Toggle::GLOBE_LOOP,
    };

    pub fn for_channel(channel: MediaChannel) -> ChannelBinding {
        if channel == MediaChannel::GLOBE {
            Self::GLOBE
        } else {
            Self::PANORAMA
        }
    }
}

/// Fetch results of one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelTick {
    pub active: FetchOutcome,
    pub preload: FetchOutcome,
}

/// Cue generations this node has acted on
#[derive(Debug, Default, Clone, Copy)]
struct SeenGenerations {
    load: u32,
    preload: u32,
    swap: u32,
}

/// Owns the decode slots and clocks of one media channel
pub struct MediaController {
    binding: ChannelBinding,
    arena: SlotArena,
    clock: PlaybackClock,
    preload_clock: PlaybackClock,
    factory: Arc<dyn DecoderFactory>,
    resolver: Arc<dyn AssetResolver>,
    swap_mode: SwapMode,
    seen: SeenGenerations,
    /// A swap arrived before this node's preload slot was ready
    swap_deferred: bool,
}

impl std::fmt::Debug for MediaController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaController")
            .field("channel", &self.binding.channel.name())
            .field("arena", &self.arena)
            .field("clock", &self.clock.value())
            .field("swap_mode", &self.swap_mode)
            .finish_non_exhaustive()
    }
}

impl MediaController {
    pub fn new(
        binding: ChannelBinding,
        factory: Arc<dyn DecoderFactory>,
        resolver: Arc<dyn AssetResolver>,
    ) -> Self {
        Self {
            binding,
            arena: SlotArena::new(),
            clock: PlaybackClock::new(),
            preload_clock: PlaybackClock::new(),
            factory,
            resolver,
            swap_mode: SwapMode::default(),
            seen: SeenGenerations::default(),
            swap_deferred: false,
        }
    }

    pub fn with_swap_mode(mut self, mode: SwapMode) -> Self {
        self.swap_mode = mode;
        self
    }

    #[inline]
    pub fn channel(&self) -> MediaChannel {
        self.binding.channel
    }

    pub fn binding(&self) -> &ChannelBinding {
        &self.binding
    }

    pub fn clock(&self) -> &PlaybackClock {
        &self.clock
    }

    pub fn preload_clock(&self) -> &PlaybackClock {
        &self.preload_clock
    }

    pub fn arena(&self) -> &SlotArena {
        &self.arena
    }

    pub fn active_state(&self) -> SlotState {
        self.arena.active().state()
    }

    pub fn preload_state(&self) -> SlotState {
        self.arena.preload().state()
    }

    /// A swap is waiting for the local preload slot
    pub fn swap_deferred(&self) -> bool {
        self.swap_deferred
    }

    /// Current picture of the active slot
    pub fn active_picture(&self) -> Option<&PictureBuffers> {
        let slot = self.arena.active();
        (slot.is_displayable() && slot.buffers().generation() > 0).then(|| slot.buffers())
    }

    /// Current picture of the preloading slot
    pub fn preload_picture(&self) -> Option<&PictureBuffers> {
        self.binding.preload_clock?;
        let slot = self.arena.preload();
        (slot.is_displayable() && slot.buffers().generation() > 0).then(|| slot.buffers())
    }

    // ────────────────────────────────────────────────────────────────────────
    // Primary
    // ────────────────────────────────────────────────────────────────────────

    /// Apply an operator command to the shared state (primary only)
    ///
    /// Asset changes only edit the cue; the slots follow during the next
    /// reconcile, exactly as on the replicas.
    pub fn apply_command(
        &mut self,
        command: MediaCommand,
        state: &mut SharedState,
        _authority: PrimaryAuthority,
    ) {
        let name = self.binding.channel.name();
        match command {
            MediaCommand::Load(asset) => {
                log::info!("[MEDIA] {}: load '{}'", name, asset.as_str());
                state.cue_mut(self.binding.channel).request_load(asset);
            }
            MediaCommand::Preload(asset) => {
                if self.binding.preload_clock.is_none() {
                    log::warn!("[MEDIA] {}: channel has no preload slot, ignoring preload", name);
                    return;
                }
                log::info!("[MEDIA] {}: preload '{}'", name, asset.as_str());
                state.cue_mut(self.binding.channel).request_preload(asset);
            }
            MediaCommand::Swap => {
                let cue = state.cue(self.binding.channel);
                let preload = self.arena.preload();
                if cue.preload_generation != self.seen.preload
                    || !preload.is_displayable()
                    || preload.asset() != cue.preload.as_str()
                {
                    log::warn!(
                        "[MEDIA] {}: swap rejected, preload slot is {} ('{}')",
                        name,
                        preload.state().name(),
                        preload.asset()
                    );
                    return;
                }
                log::info!("[MEDIA] {}: swap to '{}'", name, preload.asset());
                state.cue_mut(self.binding.channel).request_swap();
            }
            MediaCommand::Unload => {
                log::info!("[MEDIA] {}: unload", name);
                state.cue_mut(self.binding.channel).request_unload();
            }
            MediaCommand::Play => state.set_toggle(self.binding.playing, true),
            MediaCommand::Pause => state.set_toggle(self.binding.playing, false),
            MediaCommand::SetLooping(on) => state.set_toggle(self.binding.looping, on),
            MediaCommand::Rewind => {
                self.clock.reset();
                self.arena.active_mut().rewind();
                state.set_clock(self.binding.clock, self.clock.value());
            }
        }
    }

    /// One primary tick: reconcile, advance clocks, fetch, publish clocks
    pub fn tick_primary(
        &mut self,
        state: &mut SharedState,
        dt: f64,
        authority: PrimaryAuthority,
    ) -> ChannelTick {
        let cue = *state.cue(self.binding.channel);
        let looping = state.toggle(self.binding.looping);
        self.reconcile(&cue, looping);
        self.apply_loop_mode(looping);

        if state.toggle(self.binding.playing) {
            if self.arena.active().is_ready() {
                self.clock.advance(dt, authority);
            }
            if self.binding.preload_clock.is_some() && self.arena.preload().is_ready() {
                self.preload_clock.advance(dt, authority);
            }
        }

        let active = fetch_wrapping(self.arena.active_mut(), &mut self.clock);
        let preload = match self.binding.preload_clock {
            Some(_) => fetch_wrapping(self.arena.preload_mut(), &mut self.preload_clock),
            None => FetchOutcome::Idle,
        };

        state.set_clock(self.binding.clock, self.clock.value());
        if let Some(id) = self.binding.preload_clock {
            state.set_clock(id, self.preload_clock.value());
        }
        ChannelTick { active, preload }
    }

    // ────────────────────────────────────────────────────────────────────────
    // Replica
    // ────────────────────────────────────────────────────────────────────────

    /// One replica tick: reconcile, copy clocks in, fetch
    ///
    /// Never advances a clock; the values arrive already advanced.
    pub fn tick_replica(&mut self, state: &SharedState) -> ChannelTick {
        let cue = *state.cue(self.binding.channel);
        let looping = state.toggle(self.binding.looping);
        self.reconcile(&cue, looping);
        self.apply_loop_mode(looping);

        self.clock.sync(state.clock(self.binding.clock));
        let active = self.arena.active_mut().follow(self.clock.value());
        let preload = match self.binding.preload_clock {
            Some(id) => {
                self.preload_clock.sync(state.clock(id));
                self.arena.preload_mut().follow(self.preload_clock.value())
            }
            None => FetchOutcome::Idle,
        };
        ChannelTick { active, preload }
    }

    // ────────────────────────────────────────────────────────────────────────
    // Reconcile
    // ────────────────────────────────────────────────────────────────────────

    /// Bring the local slots in line with `cue`
    ///
    /// A new load supersedes any swap in the same snapshot. A swap whose
    /// preload slot is still loading is deferred; a swap with no matching
    /// preload slot (e.g. the node joined late) falls back to a direct
    /// load of the cue's asset.
    pub fn reconcile(&mut self, cue: &MediaCue, looping: bool) {
        if cue.load_generation != self.seen.load {
            self.seen.load = cue.load_generation;
            self.seen.swap = cue.swap_generation;
            self.swap_deferred = false;
            self.replace(&cue.asset, looping);
        } else if cue.swap_generation != self.seen.swap {
            self.try_swap(cue, looping);
        }

        if cue.preload_generation != self.seen.preload {
            self.seen.preload = cue.preload_generation;
            let slot = self.open(&cue.preload, looping);
            self.arena.replace_preload(slot);
            self.preload_clock.reset();
        }
    }

    fn replace(&mut self, asset: &AssetName, looping: bool) {
        let slot = self.open(asset, looping);
        self.arena.replace_active(slot);
        self.clock.reset();
        log::debug!(
            "[MEDIA] {}: active slot replaced ('{}', {})",
            self.binding.channel.name(),
            asset.as_str(),
            self.arena.active().state().name()
        );
    }

    fn try_swap(&mut self, cue: &MediaCue, looping: bool) {
        let name = self.binding.channel.name();
        let preload = self.arena.preload();
        let matches = !cue.asset.is_empty() && preload.asset() == cue.asset.as_str();

        if matches && preload.state() == SlotState::Loading {
            if !self.swap_deferred {
                log::debug!("[MEDIA] {}: swap deferred until '{}' is ready", name, preload.asset());
                self.swap_deferred = true;
            }
            return;
        }

        self.seen.swap = cue.swap_generation;
        self.swap_deferred = false;

        if matches && self.arena.promote() {
            match self.swap_mode {
                SwapMode::Restart => self.clock.reset(),
                SwapMode::TransferClock => self.clock.transfer_from(&self.preload_clock),
            }
            self.preload_clock.reset();
            log::info!(
                "[MEDIA] {}: swapped to '{}' (slot {:?}, clock {:.3}s)",
                name,
                self.arena.active().asset(),
                self.arena.active_index(),
                self.clock.value()
            );
        } else {
            log::warn!(
                "[MEDIA] {}: no preloaded '{}' to swap in, loading directly",
                name,
                cue.asset.as_str()
            );
            self.arena.replace_preload(DecodeSlot::empty());
            self.replace(&cue.asset, looping);
        }
    }

    /// Resolve and open `asset` in a fresh slot
    fn open(&self, asset: &AssetName, looping: bool) -> DecodeSlot {
        let name = asset.as_str();
        if name.is_empty() {
            return DecodeSlot::empty();
        }
        match self.resolver.resolve(name) {
            Ok(path) => DecodeSlot::load(name, &path, self.factory.create(), looping),
            Err(e) => DecodeSlot::failed(name, e.to_string()),
        }
    }

    fn apply_loop_mode(&mut self, looping: bool) {
        if self.arena.active_mut().set_looping(looping) {
            self.clock.reset();
        }
        if self.arena.preload_mut().set_looping(looping) {
            self.preload_clock.reset();
        }
    }
}

/// Fetch for the clock position; a loop wrap resets the clock and fetches
/// the first picture in the same tick
fn fetch_wrapping(slot: &mut DecodeSlot, clock: &mut PlaybackClock) -> FetchOutcome {
    match slot.fetch(clock.value()) {
        FetchOutcome::LoopWrapped => {
            let end = clock.value();
            clock.reset();
            let again = slot.fetch(clock.value());
            log::debug!(
                "[MEDIA] '{}' looped at {:.3}s (restart fetch: {:?})",
                slot.asset(),
                end,
                again
            );
            FetchOutcome::LoopWrapped
        }
        outcome => outcome,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MapResolver, ScriptHandle, ScriptedDecoder};
    use crate::types::Role;

    const DT: f64 = 0.02;

    fn authority() -> PrimaryAuthority {
        Role::Primary.authority().unwrap()
    }

    fn asset(name: &str) -> AssetName {
        AssetName::new(name).unwrap()
    }

    fn controller(script: &ScriptHandle) -> MediaController {
        MediaController::new(
            ChannelBinding::PANORAMA,
            script.factory(),
            Arc::new(MapResolver::new().with_missing("missing")),
        )
    }

    fn playing_state() -> SharedState {
        let mut state = SharedState::default();
        state.set_toggle(Toggle::PANORAMA_PLAYING, true);
        state
    }

    fn frame(ctrl: &MediaController) -> Option<u8> {
        ctrl.active_picture()
            .and_then(|p| ScriptedDecoder::frame_of(p.planes()))
    }

    #[test]
    fn test_load_plays_and_advances() {
        let script = ScriptHandle::new(10.0);
        let mut ctrl = controller(&script);
        let mut state = playing_state();

        ctrl.apply_command(MediaCommand::Load(asset("a")), &mut state, authority());
        let tick = ctrl.tick_primary(&mut state, DT, authority());
        assert_eq!(tick.active, FetchOutcome::Submitted);
        assert_eq!(ctrl.active_state(), SlotState::Ready);
        assert!((state.clock(ClockId::PANORAMA) - DT).abs() < 1e-12);

        ctrl.tick_primary(&mut state, DT, authority());
        assert!((state.clock(ClockId::PANORAMA) - 2.0 * DT).abs() < 1e-12);
        assert_eq!(frame(&ctrl), Some(2));
    }

    #[test]
    fn test_paused_clock_holds() {
        let script = ScriptHandle::new(10.0);
        let mut ctrl = controller(&script);
        let mut state = SharedState::default();
        ctrl.apply_command(MediaCommand::Load(asset("a")), &mut state, authority());
        ctrl.tick_primary(&mut state, DT, authority());
        ctrl.tick_primary(&mut state, DT, authority());
        assert_eq!(state.clock(ClockId::PANORAMA), 0.0);
        assert!(ctrl.active_picture().is_some());
    }

    #[test]
    fn test_reload_same_asset_resets_clock_each_time() {
        let script = ScriptHandle::new(10.0);
        let mut ctrl = controller(&script);
        let mut state = playing_state();

        for _ in 0..2 {
            ctrl.apply_command(MediaCommand::Load(asset("a")), &mut state, authority());
            ctrl.reconcile(state.cue(MediaChannel::PANORAMA), false);
            assert_eq!(ctrl.clock().value(), 0.0);
            for _ in 0..10 {
                ctrl.tick_primary(&mut state, DT, authority());
            }
            assert!(ctrl.clock().value() > 0.0);
        }
        assert_eq!(script.log().loaded.len(), 2);
        // Exactly one slot holds the asset
        assert_eq!(ctrl.active_state(), SlotState::Ready);
        assert_eq!(ctrl.preload_state(), SlotState::Empty);
    }

    #[test]
    fn test_load_failure_keeps_controller_usable() {
        let script = ScriptHandle::new(10.0);
        let mut ctrl = controller(&script);
        let mut state = playing_state();

        ctrl.apply_command(MediaCommand::Load(asset("missing")), &mut state, authority());
        let tick = ctrl.tick_primary(&mut state, DT, authority());
        assert_eq!(tick.active, FetchOutcome::Idle);
        assert_eq!(ctrl.active_state(), SlotState::Failed);
        assert_eq!(state.clock(ClockId::PANORAMA), 0.0);

        ctrl.apply_command(MediaCommand::Load(asset("b")), &mut state, authority());
        ctrl.tick_primary(&mut state, DT, authority());
        assert_eq!(ctrl.active_state(), SlotState::Ready);
    }

    #[test]
    fn test_loop_wrap_restarts_in_same_tick() {
        let script = ScriptHandle::new(10.0);
        let mut ctrl = controller(&script);
        let mut state = playing_state();
        state.set_toggle(Toggle::PANORAMA_LOOP, true);

        ctrl.apply_command(MediaCommand::Load(asset("a")), &mut state, authority());
        ctrl.tick_primary(&mut state, 0.0, authority());
        // Jump close to the end
        ctrl.tick_primary(&mut state, 9.98, authority());
        assert!((state.clock(ClockId::PANORAMA) - 9.98).abs() < 1e-9);

        let tick = ctrl.tick_primary(&mut state, DT, authority());
        assert_eq!(tick.active, FetchOutcome::LoopWrapped);
        assert_eq!(state.clock(ClockId::PANORAMA), 0.0);
        assert_eq!(frame(&ctrl), Some(0));

        // Monotonic again afterwards
        ctrl.tick_primary(&mut state, DT, authority());
        assert!((state.clock(ClockId::PANORAMA) - DT).abs() < 1e-12);
    }

    #[test]
    fn test_end_without_loop_exhausts_and_holds_clock() {
        let script = ScriptHandle::new(1.0);
        let mut ctrl = controller(&script);
        let mut state = playing_state();

        ctrl.apply_command(MediaCommand::Load(asset("a")), &mut state, authority());
        ctrl.tick_primary(&mut state, 0.0, authority());
        ctrl.tick_primary(&mut state, 0.99, authority());
        let tick = ctrl.tick_primary(&mut state, DT, authority());
        assert_eq!(tick.active, FetchOutcome::Exhausted);
        let held = state.clock(ClockId::PANORAMA);
        ctrl.tick_primary(&mut state, DT, authority());
        assert_eq!(state.clock(ClockId::PANORAMA), held);
        // Last picture stays displayed
        assert!(ctrl.active_picture().is_some());

        // Enabling loop restarts from the top
        state.set_toggle(Toggle::PANORAMA_LOOP, true);
        ctrl.tick_primary(&mut state, DT, authority());
        assert_eq!(ctrl.active_state(), SlotState::Ready);
        assert!(state.clock(ClockId::PANORAMA) < 0.1);
    }

    #[test]
    fn test_swap_rejected_until_preload_ready() {
        let script = ScriptHandle::new(10.0);
        let mut ctrl = controller(&script);
        let mut state = playing_state();

        ctrl.apply_command(MediaCommand::Load(asset("a")), &mut state, authority());
        ctrl.tick_primary(&mut state, DT, authority());

        // Swap with nothing preloaded
        ctrl.apply_command(MediaCommand::Swap, &mut state, authority());
        assert_eq!(state.cue(MediaChannel::PANORAMA).swap_generation, 0);

        // Preload requested but not yet reconciled
        ctrl.apply_command(MediaCommand::Preload(asset("b")), &mut state, authority());
        ctrl.apply_command(MediaCommand::Swap, &mut state, authority());
        assert_eq!(state.cue(MediaChannel::PANORAMA).swap_generation, 0);

        // Decoder of "b" takes a few polls to start
        script.delay_start(3);
        ctrl.tick_primary(&mut state, DT, authority());
        assert_eq!(ctrl.preload_state(), SlotState::Loading);
        ctrl.apply_command(MediaCommand::Swap, &mut state, authority());
        assert_eq!(state.cue(MediaChannel::PANORAMA).swap_generation, 0);
        assert_eq!(ctrl.arena().active().asset(), "a");
    }

    #[test]
    fn test_preload_and_swap_is_atomic() {
        let script = ScriptHandle::new(10.0);
        let mut ctrl = controller(&script);
        let mut state = playing_state();

        ctrl.apply_command(MediaCommand::Load(asset("a")), &mut state, authority());
        for _ in 0..50 {
            ctrl.tick_primary(&mut state, DT, authority());
        }
        ctrl.apply_command(MediaCommand::Preload(asset("b")), &mut state, authority());
        ctrl.tick_primary(&mut state, DT, authority());
        assert_eq!(ctrl.preload_state(), SlotState::Ready);
        // A keeps playing while B preloads
        assert_eq!(ctrl.arena().active().asset(), "a");
        assert!(ctrl.preload_picture().is_some());
        let before = ctrl.arena().active_index();

        ctrl.apply_command(MediaCommand::Swap, &mut state, authority());
        ctrl.tick_primary(&mut state, DT, authority());

        assert_eq!(ctrl.arena().active_index(), before.other());
        assert_eq!(ctrl.arena().active().asset(), "b");
        assert_eq!(ctrl.active_state(), SlotState::Ready);
        assert_eq!(ctrl.preload_state(), SlotState::Empty);
        assert!(ctrl.preload_picture().is_none());
        // Old decoder was stopped
        assert!(script.log().stopped);
        // Restart mode: B's clock began at 0 and advanced one tick
        assert!((state.clock(ClockId::PANORAMA) - DT).abs() < 1e-12);
        assert_eq!(state.clock(ClockId::PANORAMA_PRELOAD), 0.0);
    }

    #[test]
    fn test_transfer_clock_swap() {
        let script = ScriptHandle::new(10.0);
        let mut ctrl = controller(&script).with_swap_mode(SwapMode::TransferClock);
        let mut state = playing_state();

        ctrl.apply_command(MediaCommand::Load(asset("a")), &mut state, authority());
        ctrl.tick_primary(&mut state, DT, authority());
        ctrl.apply_command(MediaCommand::Preload(asset("b")), &mut state, authority());
        for _ in 0..10 {
            ctrl.tick_primary(&mut state, DT, authority());
        }
        let preload_position = state.clock(ClockId::PANORAMA_PRELOAD);
        assert!(preload_position > 0.0);

        ctrl.apply_command(MediaCommand::Swap, &mut state, authority());
        ctrl.tick_primary(&mut state, DT, authority());
        assert!((state.clock(ClockId::PANORAMA) - (preload_position + DT)).abs() < 1e-9);
    }

    #[test]
    fn test_replica_defers_swap_until_ready() {
        let script = ScriptHandle::new(10.0);
        let mut replica = controller(&script);
        let mut state = SharedState::default();
        state.cue_mut(MediaChannel::PANORAMA).request_load(asset("a"));
        replica.tick_replica(&state);
        assert_eq!(replica.active_state(), SlotState::Ready);

        // The replica's decoder for "b" needs two polls longer than the primary's
        script.delay_start(2);
        state.cue_mut(MediaChannel::PANORAMA).request_preload(asset("b"));
        replica.tick_replica(&state);
        assert_eq!(replica.preload_state(), SlotState::Loading);

        state.cue_mut(MediaChannel::PANORAMA).request_swap();
        replica.tick_replica(&state);
        assert!(replica.swap_deferred());
        assert_eq!(replica.arena().active().asset(), "a");
        // Became ready during this tick's fetch
        assert_eq!(replica.preload_state(), SlotState::Ready);

        replica.tick_replica(&state);
        assert!(!replica.swap_deferred());
        assert_eq!(replica.arena().active().asset(), "b");
        assert_eq!(replica.preload_state(), SlotState::Empty);
    }

    #[test]
    fn test_late_joiner_loads_swapped_asset_directly() {
        let script = ScriptHandle::new(10.0);
        let mut replica = controller(&script);
        let mut cue = MediaCue::default();
        cue.request_load(asset("a"));
        cue.request_preload(asset("b"));
        cue.request_swap();
        // Preload already cleared by a second preload of nothing
        cue.request_preload(AssetName::EMPTY);

        replica.reconcile(&cue, false);
        assert_eq!(replica.arena().active().asset(), "b");
        assert_eq!(replica.preload_state(), SlotState::Empty);
    }

    #[test]
    fn test_rewind_resets_clock() {
        let script = ScriptHandle::new(10.0);
        let mut ctrl = controller(&script);
        let mut state = playing_state();
        ctrl.apply_command(MediaCommand::Load(asset("a")), &mut state, authority());
        for _ in 0..5 {
            ctrl.tick_primary(&mut state, DT, authority());
        }
        ctrl.apply_command(MediaCommand::Rewind, &mut state, authority());
        assert_eq!(state.clock(ClockId::PANORAMA), 0.0);
    }

    #[test]
    fn test_globe_channel_has_no_preload() {
        let script = ScriptHandle::new(10.0);
        let mut ctrl = MediaController::new(
            ChannelBinding::GLOBE,
            script.factory(),
            Arc::new(MapResolver::new()),
        );
        let mut state = SharedState::default();
        ctrl.apply_command(MediaCommand::Preload(asset("b")), &mut state, authority());
        assert_eq!(state.cue(MediaChannel::GLOBE).preload_generation, 0);
    }
}
