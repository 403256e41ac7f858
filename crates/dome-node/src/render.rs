//! Logging render sink
//!
//! Rendering lives outside this process; this sink stands in for it by
//! reporting which pictures each frame would draw.

use std::time::{Duration, Instant};

use dome_core::{MediaChannel, RenderFrame, RenderSink, Scalar};

const STATUS_INTERVAL: Duration = Duration::from_secs(1);

/// Logs picture generations at debug and a status line once per second
pub struct LogRenderSink {
    last_status: Instant,
    last_generation: [u64; 2],
    frames_since_status: u64,
}

impl LogRenderSink {
    pub fn new() -> Self {
        Self {
            last_status: Instant::now(),
            last_generation: [0; 2],
            frames_since_status: 0,
        }
    }
}

impl Default for LogRenderSink {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderSink for LogRenderSink {
    fn present(&mut self, frame: &RenderFrame<'_>) {
        self.frames_since_status += 1;

        for channel in MediaChannel::ALL {
            let Some(picture) = frame.picture(channel) else {
                continue;
            };
            let seen = &mut self.last_generation[channel.index()];
            if picture.generation() != *seen {
                *seen = picture.generation();
                log::debug!(
                    "[RENDER] frame {} {}: picture #{} at {:.3}s",
                    frame.frame,
                    channel.name(),
                    picture.generation(),
                    picture.timestamp()
                );
            }
        }

        let elapsed = self.last_status.elapsed();
        if elapsed < STATUS_INTERVAL {
            return;
        }
        let fps = self.frames_since_status as f64 / elapsed.as_secs_f64();
        self.last_status = Instant::now();
        self.frames_since_status = 0;

        let describe = |channel: MediaChannel| match frame.controller(channel) {
            Some(m) => format!(
                "{} '{}' {} @ {:.2}s",
                channel.name(),
                m.arena().active().asset(),
                m.active_state().name(),
                m.clock().value()
            ),
            None => format!("{} -", channel.name()),
        };
        let [x, y, z] = frame.camera.position;
        log::info!(
            "[RENDER] {} {:.1} fps | {} | {} | year {:.1} | {} elements | camera ({:.2}, {:.2}, {:.2})",
            frame.role.name(),
            fps,
            describe(MediaChannel::PANORAMA),
            describe(MediaChannel::GLOBE),
            frame.state.scalar(Scalar::CURRENT_YEAR),
            frame.state.elements().len(),
            x,
            y,
            z
        );
    }
}
