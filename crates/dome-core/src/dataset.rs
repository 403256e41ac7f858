//! Dataset year cycling (primary only)
//!
//! A self-wrapping [`PlaybackClock`] whose loop target is the first year of
//! the dataset. The primary derives the normalised dataset index from it;
//! replicas only read the resulting scalars.

use serde::{Deserialize, Serialize};

use crate::clock::PlaybackClock;
use crate::role::PrimaryAuthority;
use crate::state::SharedState;
use crate::types::{ClockId, Scalar, Toggle};

/// Year range of the dataset
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    pub first_year: f64,
    /// Exclusive: reaching it wraps back to `first_year`
    pub last_year: f64,
    pub years_per_second: f64,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            first_year: 2012.0,
            last_year: 2023.0,
            years_per_second: 2.0,
        }
    }
}

/// Year clock plus the scalars derived from it
#[derive(Debug, Clone)]
pub struct DatasetCycle {
    config: DatasetConfig,
    clock: PlaybackClock,
}

impl DatasetCycle {
    pub fn new(config: DatasetConfig) -> Self {
        let clock = PlaybackClock::new()
            .with_loop_target(config.first_year)
            .with_rate(config.years_per_second)
            .with_wrap(config.last_year);
        Self { config, clock }
    }

    pub fn year(&self) -> f64 {
        self.clock.value()
    }

    /// Position in the year range, 0..1
    pub fn index(&self) -> f64 {
        let span = self.config.last_year - self.config.first_year;
        if span <= 0.0 {
            return 0.0;
        }
        ((self.clock.value() - self.config.first_year) / span).clamp(0.0, 1.0)
    }

    /// Advance while cycling is on and publish year, index and clock
    pub fn update(&mut self, state: &mut SharedState, dt: f64, authority: PrimaryAuthority) {
        if state.toggle(Toggle::CYCLE_YEARS) && self.clock.advance(dt, authority) {
            log::debug!("[DATASET] Year cycle wrapped to {}", self.config.first_year);
        }
        state.set_clock(ClockId::DATASET, self.clock.value());
        state.set_scalar(Scalar::CURRENT_YEAR, self.clock.value() as f32);
        state.set_scalar(Scalar::DATASET_INDEX, self.index() as f32);
    }
}
