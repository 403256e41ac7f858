//! Image-sequence decoder
//!
//! Plays a directory of numbered still images (PNG/JPEG) at a fixed rate.
//! Decoding runs on a background thread that stays a bounded number of
//! frames ahead of the consumer:
//!
//! ```text
//!   frame loop (non-blocking)                 decode thread
//!   ─────────────────────────                 ─────────────
//!   seek(t) ──── Command::Seek{gen} ────────▶ restart at frame ⌊t·fps⌋
//!   picture_for(t) ◀── Message::Frame{gen} ── image::open → rgb_to_yuv420
//!   picture_consumed ── recycled planes ────▶ reused for the next frame
//! ```
//!
//! Every seek bumps a generation; frames from older generations are
//! discarded on arrival, so a seek never shows a stale frame.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, SendTimeoutError, Sender, TryRecvError};

use super::yuv::{line_sizes, rgb_to_yuv420};
use super::{DecoderFactory, Picture, Plane, StreamGeometry, VideoDecoder, NUM_PLANES};
use crate::error::{DecodeError, DecodeResult};

/// Frames decoded ahead of the consumer
pub const DEFAULT_READ_AHEAD: usize = 8;

/// How long the decode thread blocks on a full queue before rechecking
/// its command channel
const SEND_POLL: Duration = Duration::from_millis(20);

const FRAME_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

enum Command {
    /// Restart decoding at `frame`, tagging output with `generation`
    Seek { generation: u64, frame: usize },
    Stop,
}

struct DecodedFrame {
    generation: u64,
    index: usize,
    picture: Picture,
}

enum Message {
    Frame(DecodedFrame),
    /// All frames of `generation` have been sent
    End { generation: u64 },
}

/// `VideoDecoder` over a directory of still images
pub struct ImageSequenceDecoder {
    fps: f64,
    read_ahead: usize,
    looping: bool,
    frames: Arc<Vec<PathBuf>>,
    geometry: Option<StreamGeometry>,
    started: bool,

    generation: u64,
    end_seen: bool,
    /// Clock position of the last seek or picture request
    position: f64,
    /// Received frame that is still in the future
    peeked: Option<DecodedFrame>,
    current: Picture,

    commands: Option<Sender<Command>>,
    output: Option<Receiver<Message>>,
    recycle: Option<Sender<[Plane; NUM_PLANES]>>,
    handle: Option<JoinHandle<()>>,
}

impl ImageSequenceDecoder {
    pub fn new(fps: f64) -> Self {
        Self {
            fps: if fps.is_finite() && fps > 0.0 { fps } else { 25.0 },
            read_ahead: DEFAULT_READ_AHEAD,
            looping: false,
            frames: Arc::new(Vec::new()),
            geometry: None,
            started: false,
            generation: 0,
            end_seen: false,
            position: 0.0,
            peeked: None,
            current: Picture::default(),
            commands: None,
            output: None,
            recycle: None,
            handle: None,
        }
    }

    pub fn with_read_ahead(mut self, frames: usize) -> Self {
        self.read_ahead = frames.max(1);
        self
    }

    /// Number of frames in the loaded sequence
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Stream length in seconds
    pub fn duration(&self) -> f64 {
        self.frames.len() as f64 / self.fps
    }

    fn frame_at(&self, time: f64) -> usize {
        if time.is_finite() && time > 0.0 {
            (time * self.fps).floor() as usize
        } else {
            0
        }
    }

    fn send(&self, command: Command) {
        if let Some(tx) = &self.commands {
            if tx.send(command).is_err() {
                log::warn!("[DECODE] Sequence decode thread is gone");
            }
        }
    }

    fn recycle_planes(&self, planes: [Plane; NUM_PLANES]) {
        if let Some(tx) = &self.recycle {
            let _ = tx.send(planes);
        }
    }

    /// Next received frame of the current generation
    fn next_frame(&mut self) -> Option<DecodedFrame> {
        if let Some(frame) = self.peeked.take() {
            return Some(frame);
        }
        loop {
            let message = match self.output.as_ref()?.try_recv() {
                Ok(message) => message,
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => {
                    log::error!("[DECODE] Sequence decode thread disconnected");
                    self.end_seen = true;
                    return None;
                }
            };
            match message {
                Message::Frame(frame) if frame.generation == self.generation => return Some(frame),
                Message::Frame(stale) => self.recycle_planes(stale.picture.planes),
                Message::End { generation } if generation == self.generation => {
                    self.end_seen = true;
                    return None;
                }
                Message::End { .. } => {}
            }
        }
    }

    fn stop_thread(&mut self) {
        if let Some(tx) = self.commands.take() {
            let _ = tx.send(Command::Stop);
        }
        // Unblocks a decode thread waiting on a full queue
        self.output = None;
        self.recycle = None;
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("[DECODE] Sequence decode thread panicked");
            }
        }
    }
}

impl VideoDecoder for ImageSequenceDecoder {
    fn load(&mut self, path: &Path) -> DecodeResult<()> {
        self.stop_thread();
        self.started = false;
        self.geometry = None;

        let entries = std::fs::read_dir(path).map_err(|source| DecodeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut frames: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| FRAME_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            })
            .collect();
        if frames.is_empty() {
            return Err(DecodeError::EmptyStream(path.to_path_buf()));
        }
        frames.sort();

        let (width, height) =
            image::image_dimensions(&frames[0]).map_err(|e| DecodeError::Unsupported {
                path: frames[0].clone(),
                reason: e.to_string(),
            })?;
        if width == 0 || height == 0 {
            return Err(DecodeError::Unsupported {
                path: frames[0].clone(),
                reason: "zero-sized frame".to_string(),
            });
        }

        let frames = Arc::new(frames);
        let (command_tx, command_rx) = channel::unbounded();
        let (output_tx, output_rx) = channel::bounded(self.read_ahead);
        let (recycle_tx, recycle_rx) = channel::unbounded();

        let thread_frames = frames.clone();
        let handle = thread::Builder::new()
            .name("sequence-decoder".to_string())
            .spawn(move || decode_thread(thread_frames, command_rx, output_tx, recycle_rx))
            .map_err(|e| DecodeError::ThreadSpawn(e.to_string()))?;

        log::info!(
            "[DECODE] Opened sequence {:?}: {} frames {}x{} at {} fps",
            path,
            frames.len(),
            width,
            height,
            self.fps
        );

        self.frames = frames;
        self.geometry = Some(StreamGeometry {
            width,
            height,
            line_sizes: line_sizes(width),
        });
        self.commands = Some(command_tx);
        self.output = Some(output_rx);
        self.recycle = Some(recycle_tx);
        self.handle = Some(handle);
        self.generation = 0;
        self.end_seen = false;
        self.position = 0.0;
        self.peeked = None;
        Ok(())
    }

    fn enable_audio(&mut self, _enabled: bool) {
        // Still images carry no audio
    }

    fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    fn start(&mut self) {
        if self.handle.is_none() || self.started {
            return;
        }
        self.started = true;
        self.seek(0.0);
    }

    fn stop(&mut self) {
        self.started = false;
        self.stop_thread();
    }

    fn seek(&mut self, time: f64) {
        self.generation += 1;
        self.end_seen = false;
        self.position = time;
        if let Some(frame) = self.peeked.take() {
            self.recycle_planes(frame.picture.planes);
        }
        self.send(Command::Seek {
            generation: self.generation,
            frame: self.frame_at(time),
        });
    }

    /// The last frame was delivered and the clock has run past its slot
    fn finished(&self) -> bool {
        self.end_seen && self.peeked.is_none() && self.frame_at(self.position) >= self.frames.len()
    }

    fn is_looping(&self) -> bool {
        self.looping
    }

    fn picture_for(&mut self, time: f64) -> Option<&Picture> {
        if !self.started {
            return None;
        }
        self.position = time;
        let target = self.frame_at(time);
        let mut best: Option<DecodedFrame> = None;
        while let Some(frame) = self.next_frame() {
            if frame.index > target {
                self.peeked = Some(frame);
                break;
            }
            if let Some(skipped) = best.replace(frame) {
                self.recycle_planes(skipped.picture.planes);
            }
        }
        let frame = best?;
        let mut picture = frame.picture;
        picture.timestamp = frame.index as f64 / self.fps;
        let previous = std::mem::replace(&mut self.current, picture);
        if !previous.planes[0].data.is_empty() {
            self.recycle_planes(previous.planes);
        }
        Some(&self.current)
    }

    fn picture_consumed(&mut self) {
        let planes = std::mem::take(&mut self.current.planes);
        if !planes[0].data.is_empty() {
            self.recycle_planes(planes);
        }
    }

    fn geometry(&self) -> Option<StreamGeometry> {
        if self.started {
            self.geometry
        } else {
            None
        }
    }
}

impl Drop for ImageSequenceDecoder {
    fn drop(&mut self) {
        self.stop_thread();
    }
}

fn decode_thread(
    frames: Arc<Vec<PathBuf>>,
    commands: Receiver<Command>,
    output: Sender<Message>,
    recycle: Receiver<[Plane; NUM_PLANES]>,
) {
    log::debug!("[DECODE] Sequence decode thread started ({} frames)", frames.len());
    let mut pool: VecDeque<[Plane; NUM_PLANES]> = VecDeque::new();
    // Idle until the first seek
    let mut position: Option<(u64, usize)> = None;

    'run: loop {
        let command = match position {
            Some(_) => match commands.try_recv() {
                Ok(command) => Some(command),
                Err(TryRecvError::Empty) => None,
                Err(TryRecvError::Disconnected) => break,
            },
            None => match commands.recv() {
                Ok(command) => Some(command),
                Err(_) => break,
            },
        };
        match command {
            Some(Command::Stop) => break,
            Some(Command::Seek { generation, frame }) => {
                position = Some((generation, frame));
                continue;
            }
            None => {}
        }

        let Some((generation, index)) = position else {
            continue;
        };
        if index >= frames.len() {
            let _ = output.send(Message::End { generation });
            position = None;
            continue;
        }

        while let Ok(planes) = recycle.try_recv() {
            pool.push_back(planes);
        }
        let mut planes = pool.pop_front().unwrap_or_default();

        let path = &frames[index];
        match image::open(path) {
            Ok(img) => {
                let rgb = img.to_rgb8();
                rgb_to_yuv420(rgb.as_raw(), rgb.width(), rgb.height(), &mut planes);
            }
            Err(e) => {
                log::warn!("[DECODE] Skipping unreadable frame {:?}: {}", path, e);
                pool.push_back(planes);
                position = Some((generation, index + 1));
                continue;
            }
        }

        let mut message = Message::Frame(DecodedFrame {
            generation,
            index,
            picture: Picture {
                planes,
                timestamp: 0.0,
            },
        });
        position = Some((generation, index + 1));

        // Block on a full queue, but keep listening for seek/stop
        loop {
            match output.send_timeout(message, SEND_POLL) {
                Ok(()) => break,
                Err(SendTimeoutError::Disconnected(_)) => break 'run,
                Err(SendTimeoutError::Timeout(pending)) => {
                    if !commands.is_empty() {
                        if let Message::Frame(frame) = pending {
                            pool.push_back(frame.picture.planes);
                        }
                        continue 'run;
                    }
                    message = pending;
                }
            }
        }
    }
    log::debug!("[DECODE] Sequence decode thread stopped");
}

/// Creates an [`ImageSequenceDecoder`] per load
#[derive(Debug, Clone, Copy)]
pub struct SequenceDecoderFactory {
    pub fps: f64,
    pub read_ahead: usize,
}

impl SequenceDecoderFactory {
    pub fn new(fps: f64) -> Self {
        Self {
            fps,
            read_ahead: DEFAULT_READ_AHEAD,
        }
    }
}

impl DecoderFactory for SequenceDecoderFactory {
    fn create(&self) -> Box<dyn VideoDecoder> {
        Box::new(ImageSequenceDecoder::new(self.fps).with_read_ahead(self.read_ahead))
    }
}
