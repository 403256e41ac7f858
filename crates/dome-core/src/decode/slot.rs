//! Decode slot - one decoder plus its output buffers and lifecycle state
//!
//! ```text
//!   Empty ──load──▶ Loading ──stream started──▶ Ready ──end, no loop──▶ Exhausted
//!     │                                          │  ▲
//!     └──load error──▶ Failed                    └──┘ end + loop: seek to start
//! ```

use std::path::Path;

use super::{PictureBuffers, VideoDecoder};

/// Clock moved backwards by more than this → reposition the decoder
const DISCONTINUITY_EPSILON: f64 = 1e-6;

/// Lifecycle state of a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// No asset
    Empty,
    /// The asset could not be opened
    Failed,
    /// Decoder opened and started, stream not yet producing
    Loading,
    /// Producing pictures
    Ready,
    /// Stream ended with loop disabled; the last picture stays displayed
    Exhausted,
}

impl SlotState {
    pub fn name(&self) -> &'static str {
        match self {
            SlotState::Empty => "empty",
            SlotState::Failed => "failed",
            SlotState::Loading => "loading",
            SlotState::Ready => "ready",
            SlotState::Exhausted => "exhausted",
        }
    }
}

/// Result of one tick's fetch attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Slot not ready; nothing attempted
    Idle,
    /// A complete picture was copied into the buffers
    Submitted,
    /// Decoder still catching up; the previous picture stays
    Pending,
    /// Stream ended with looping on; the decoder was sent back to the
    /// start and the owning clock must be reset
    LoopWrapped,
    /// Stream ended with looping off
    Exhausted,
}

/// One decoder instance with its picture buffers
pub struct DecodeSlot {
    asset: String,
    state: SlotState,
    decoder: Option<Box<dyn VideoDecoder>>,
    buffers: PictureBuffers,
    looping: bool,
    last_fetch: Option<f64>,
    failure: Option<String>,
}

impl std::fmt::Debug for DecodeSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodeSlot")
            .field("asset", &self.asset)
            .field("state", &self.state)
            .field("looping", &self.looping)
            .field("generation", &self.buffers.generation())
            .finish_non_exhaustive()
    }
}

impl DecodeSlot {
    /// Slot holding nothing
    pub fn empty() -> Self {
        Self {
            asset: String::new(),
            state: SlotState::Empty,
            decoder: None,
            buffers: PictureBuffers::new(),
            looping: false,
            last_fetch: None,
            failure: None,
        }
    }

    /// Slot whose asset could not be resolved to a path
    pub fn failed(asset: &str, reason: String) -> Self {
        log::warn!("[DECODE] Cannot load '{}': {}", asset, reason);
        let mut slot = Self::empty();
        slot.asset = asset.to_string();
        slot.state = SlotState::Failed;
        slot.failure = Some(reason);
        slot
    }

    /// Open `path` with `decoder` (Empty → Loading)
    ///
    /// Audio decoding is disabled and loop mode configured before the file
    /// is opened. A load error yields a `Failed` slot; it is logged here and
    /// never propagated into the frame loop.
    pub fn load(asset: &str, path: &Path, mut decoder: Box<dyn VideoDecoder>, looping: bool) -> Self {
        decoder.enable_audio(false);
        decoder.set_looping(looping);

        if let Err(e) = decoder.load(path) {
            let mut slot = Self::failed(asset, e.to_string());
            slot.looping = looping;
            return slot;
        }
        decoder.start();
        log::info!("[DECODE] Loading '{}' from {:?} (loop: {})", asset, path, looping);

        let mut slot = Self::empty();
        slot.asset = asset.to_string();
        slot.state = SlotState::Loading;
        slot.decoder = Some(decoder);
        slot.looping = looping;
        slot.poll_ready();
        slot
    }

    /// Loading → Ready once the decoder reports its stream geometry
    ///
    /// Returns true if the slot is ready. A stalled decoder simply stays in
    /// `Loading`; there is no timeout at this level.
    pub fn poll_ready(&mut self) -> bool {
        if self.state == SlotState::Loading {
            if let Some(geometry) = self.decoder.as_ref().and_then(|d| d.geometry()) {
                self.buffers.allocate(&geometry);
                self.state = SlotState::Ready;
                log::info!(
                    "[DECODE] '{}' ready ({}x{})",
                    self.asset,
                    geometry.width,
                    geometry.height
                );
            }
        }
        self.state == SlotState::Ready
    }

    /// Try to show the picture for clock position `time`
    ///
    /// At end of stream with looping on the decoder is sent back to the
    /// start and [`FetchOutcome::LoopWrapped`] tells the caller to reset its
    /// clock.
    pub fn fetch(&mut self, time: f64) -> FetchOutcome {
        self.fetch_at(time, true)
    }

    /// Like [`fetch`](Self::fetch) for a clock owned by another node
    ///
    /// The end of a looping stream is left alone: the wrap arrives as a
    /// backwards clock jump and is handled by the discontinuity seek.
    pub fn follow(&mut self, time: f64) -> FetchOutcome {
        self.fetch_at(time, false)
    }

    fn fetch_at(&mut self, time: f64, may_wrap: bool) -> FetchOutcome {
        if self.state == SlotState::Exhausted && !self.resume_if_rewound(time) {
            return FetchOutcome::Exhausted;
        }
        if !self.poll_ready() {
            return FetchOutcome::Idle;
        }
        let Some(decoder) = self.decoder.as_mut() else {
            return FetchOutcome::Idle;
        };

        // The clock jumped back without us wrapping (replica catching up
        // with a loop, load or swap on the primary)
        if let Some(last) = self.last_fetch {
            if time + DISCONTINUITY_EPSILON < last {
                log::debug!(
                    "[DECODE] '{}' clock moved back {:.3}s → {:.3}s, seeking",
                    self.asset,
                    last,
                    time
                );
                decoder.seek(time);
            }
        }
        self.last_fetch = Some(time);

        if let Some(picture) = decoder.picture_for(time) {
            let submitted = self.buffers.submit(picture);
            decoder.picture_consumed();
            return match submitted {
                Ok(()) => FetchOutcome::Submitted,
                Err(e) => {
                    log::warn!("[DECODE] '{}' dropped malformed picture: {}", self.asset, e);
                    FetchOutcome::Pending
                }
            };
        }

        if !decoder.finished() {
            return FetchOutcome::Pending;
        }

        if self.looping && decoder.is_looping() {
            if !may_wrap {
                return FetchOutcome::Pending;
            }
            log::debug!("[DECODE] '{}' reached end at {:.3}s, looping", self.asset, time);
            decoder.seek(0.0);
            self.last_fetch = None;
            FetchOutcome::LoopWrapped
        } else {
            log::info!("[DECODE] '{}' finished at {:.3}s", self.asset, time);
            self.state = SlotState::Exhausted;
            FetchOutcome::Exhausted
        }
    }

    /// Leave Exhausted when the clock jumped back behind the last fetch
    fn resume_if_rewound(&mut self, time: f64) -> bool {
        let (Some(last), Some(decoder)) = (self.last_fetch, self.decoder.as_mut()) else {
            return false;
        };
        if time + DISCONTINUITY_EPSILON >= last {
            return false;
        }
        log::debug!(
            "[DECODE] '{}' clock moved back {:.3}s → {:.3}s after end, resuming",
            self.asset,
            last,
            time
        );
        decoder.seek(time);
        self.last_fetch = Some(time);
        self.state = SlotState::Ready;
        true
    }

    /// Change loop mode
    ///
    /// Turning looping on for an exhausted slot rewinds it to the start and
    /// returns true; the owning clock must then be reset.
    pub fn set_looping(&mut self, looping: bool) -> bool {
        if self.looping == looping {
            return false;
        }
        self.looping = looping;
        let Some(decoder) = self.decoder.as_mut() else {
            return false;
        };
        decoder.set_looping(looping);
        if looping && self.state == SlotState::Exhausted {
            decoder.seek(0.0);
            self.last_fetch = None;
            self.state = SlotState::Ready;
            log::debug!("[DECODE] '{}' rewound after loop enabled", self.asset);
            return true;
        }
        false
    }

    /// Send the decoder back to the start of the stream
    pub fn rewind(&mut self) {
        if let Some(decoder) = self.decoder.as_mut() {
            decoder.seek(0.0);
            self.last_fetch = None;
            if self.state == SlotState::Exhausted {
                self.state = SlotState::Ready;
            }
        }
    }

    #[inline]
    pub fn state(&self) -> SlotState {
        self.state
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.state == SlotState::Ready
    }

    /// Ready or exhausted: has (or had) pictures to show
    pub fn is_displayable(&self) -> bool {
        matches!(self.state, SlotState::Ready | SlotState::Exhausted)
    }

    pub fn asset(&self) -> &str {
        &self.asset
    }

    pub fn looping(&self) -> bool {
        self.looping
    }

    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    #[inline]
    pub fn buffers(&self) -> &PictureBuffers {
        &self.buffers
    }
}

impl Drop for DecodeSlot {
    fn drop(&mut self) {
        if let Some(mut decoder) = self.decoder.take() {
            decoder.stop();
            log::debug!("[DECODE] Slot for '{}' discarded", self.asset);
        }
    }
}
