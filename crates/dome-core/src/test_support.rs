//! In-memory decoder and resolver for deterministic tests
//!
//! A `ScriptHandle` is shared between the test and every decoder created
//! from it, so the test can change behaviour mid-run and inspect what the
//! slot asked the decoder to do.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::decode::{DecoderFactory, Picture, Plane, StreamGeometry, VideoDecoder};
use crate::error::{DecodeError, DecodeResult};
use crate::media::AssetResolver;

/// Calls observed by scripted decoders
#[derive(Debug, Default, Clone)]
pub struct DecoderLog {
    pub loaded: Vec<PathBuf>,
    pub audio_disabled: bool,
    pub looping: bool,
    pub started: bool,
    pub stopped: bool,
    pub consumed: usize,
    pub seeks: Vec<f64>,
}

#[derive(Debug)]
struct Script {
    default_duration: f64,
    durations: HashMap<String, f64>,
    fail_load: bool,
    start_delay: usize,
    drop_next: usize,
    log: DecoderLog,
}

/// Shared, test-controlled behaviour of scripted decoders
#[derive(Debug, Clone)]
pub struct ScriptHandle {
    inner: Arc<Mutex<Script>>,
}

impl ScriptHandle {
    /// Every stream lasts `duration` seconds unless overridden per file
    pub fn new(duration: f64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Script {
                default_duration: duration,
                durations: HashMap::new(),
                fail_load: false,
                start_delay: 0,
                drop_next: 0,
                log: DecoderLog::default(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Stream length for files named `file_name`
    pub fn set_duration(&self, file_name: &str, duration: f64) {
        self.lock().durations.insert(file_name.to_string(), duration);
    }

    /// Next loads fail
    pub fn fail_load(&self) {
        self.lock().fail_load = true;
    }

    /// The next `polls` geometry queries report a stream not yet started
    pub fn delay_start(&self, polls: usize) {
        self.lock().start_delay = polls;
    }

    /// The next `count` picture requests miss
    pub fn drop_next(&self, count: usize) {
        self.lock().drop_next = count;
    }

    pub fn log(&self) -> DecoderLog {
        self.lock().log.clone()
    }

    /// Factory producing decoders driven by this script
    pub fn factory(&self) -> Arc<dyn DecoderFactory> {
        let handle = self.clone();
        Arc::new(move || Box::new(ScriptedDecoder::new(&handle)) as Box<dyn VideoDecoder>)
    }
}

/// Decoder producing a synthetic picture for every time inside the stream
///
/// The luma plane is filled with the frame index (at 50 fps) so tests can
/// tell which frame a slot is showing.
#[derive(Debug)]
pub struct ScriptedDecoder {
    script: ScriptHandle,
    duration: f64,
    looping: bool,
    started: bool,
    position: f64,
    picture: Picture,
}

impl ScriptedDecoder {
    pub const WIDTH: u32 = 100;
    pub const HEIGHT: u32 = 10;
    /// Padded luma line size (wider than `WIDTH`)
    pub const LINE_SIZE: usize = 128;
    pub const FPS: f64 = 50.0;

    pub fn new(script: &ScriptHandle) -> Self {
        let duration = script.lock().default_duration;
        Self {
            script: script.clone(),
            duration,
            looping: false,
            started: false,
            position: 0.0,
            picture: Picture::default(),
        }
    }

    /// Frame index the luma plane of `buffers` was filled with
    pub fn frame_of(planes: &[Plane]) -> Option<u8> {
        planes.first().and_then(|p| p.data.first().copied())
    }

    fn fill(&mut self, time: f64) {
        let frame = (time * Self::FPS).floor() as u8;
        let rows = Self::HEIGHT as usize;
        let chroma = Self::LINE_SIZE / 2;
        let chroma_rows = rows.div_ceil(2);
        self.picture = Picture {
            planes: [
                Plane {
                    stride: Self::LINE_SIZE,
                    rows,
                    data: vec![frame; Self::LINE_SIZE * rows],
                },
                Plane {
                    stride: chroma,
                    rows: chroma_rows,
                    data: vec![128; chroma * chroma_rows],
                },
                Plane {
                    stride: chroma,
                    rows: chroma_rows,
                    data: vec![128; chroma * chroma_rows],
                },
            ],
            timestamp: time,
        };
    }
}

impl VideoDecoder for ScriptedDecoder {
    fn load(&mut self, path: &Path) -> DecodeResult<()> {
        let mut script = self.script.lock();
        script.log.loaded.push(path.to_path_buf());
        if script.fail_load {
            return Err(DecodeError::Unsupported {
                path: path.to_path_buf(),
                reason: "scripted failure".to_string(),
            });
        }
        if let Some(d) = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| script.durations.get(n))
        {
            self.duration = *d;
        }
        Ok(())
    }

    fn enable_audio(&mut self, enabled: bool) {
        self.script.lock().log.audio_disabled = !enabled;
    }

    fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
        self.script.lock().log.looping = looping;
    }

    fn start(&mut self) {
        self.started = true;
        self.script.lock().log.started = true;
    }

    fn stop(&mut self) {
        self.started = false;
        self.script.lock().log.stopped = true;
    }

    fn seek(&mut self, time: f64) {
        self.position = time;
        self.script.lock().log.seeks.push(time);
    }

    fn finished(&self) -> bool {
        self.position >= self.duration
    }

    fn is_looping(&self) -> bool {
        self.looping
    }

    fn picture_for(&mut self, time: f64) -> Option<&Picture> {
        {
            let mut script = self.script.lock();
            if script.drop_next > 0 {
                script.drop_next -= 1;
                return None;
            }
        }
        self.position = time;
        if time >= self.duration {
            return None;
        }
        self.fill(time);
        Some(&self.picture)
    }

    fn picture_consumed(&mut self) {
        self.script.lock().log.consumed += 1;
    }

    fn geometry(&self) -> Option<StreamGeometry> {
        if !self.started {
            return None;
        }
        let mut script = self.script.lock();
        if script.start_delay > 0 {
            script.start_delay -= 1;
            return None;
        }
        Some(StreamGeometry {
            width: Self::WIDTH,
            height: Self::HEIGHT,
            line_sizes: [Self::LINE_SIZE, Self::LINE_SIZE / 2, Self::LINE_SIZE / 2],
        })
    }
}

/// Resolves every asset id to `/media/<id>` except the ids marked missing
#[derive(Debug, Default)]
pub struct MapResolver {
    missing: Vec<String>,
}

impl MapResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_missing(mut self, asset: &str) -> Self {
        self.missing.push(asset.to_string());
        self
    }
}

impl AssetResolver for MapResolver {
    fn resolve(&self, asset: &str) -> DecodeResult<PathBuf> {
        if self.missing.iter().any(|m| m == asset) {
            return Err(DecodeError::AssetNotFound(asset.to_string()));
        }
        Ok(PathBuf::from("/media").join(asset))
    }
}
