//! Common types for Dome
//!
//! Fixed sizes of the replicated frame state, the named indices into its
//! toggle/scalar/clock arrays, and the camera pose.

/// Number of independent playback clocks carried in the shared state
pub const NUM_CLOCKS: usize = 4;

/// Number of boolean feature toggles carried in the shared state
pub const NUM_TOGGLES: usize = 32;

/// Number of scalar parameters carried in the shared state
pub const NUM_SCALARS: usize = 16;

/// Number of media channels (one MediaController each)
pub const NUM_MEDIA_CHANNELS: usize = 2;

/// Number of dataset layers that can be toggled on the globe
pub const NUM_LAYERS: usize = 16;

/// Maximum number of derived render elements carried per snapshot
pub const MAX_ELEMENTS: usize = 512;

/// Capacity of a fixed-size asset name (bytes, NUL padded)
pub const ASSET_NAME_LEN: usize = 128;

/// Process role, fixed for the lifetime of the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Authoritative for simulation time and user input
    Primary,
    /// Mirrors the primary's state, computes no simulation truth
    Replica,
}

impl Role {
    pub fn name(&self) -> &'static str {
        match self {
            Role::Primary => "primary",
            Role::Replica => "replica",
        }
    }

    #[inline]
    pub fn is_primary(&self) -> bool {
        matches!(self, Role::Primary)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Index into the shared toggle array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Toggle(pub u8);

impl Toggle {
    /// Panorama video playback on/off
    pub const PANORAMA_PLAYING: Toggle = Toggle(0);
    /// Globe data video playback on/off
    pub const GLOBE_PLAYING: Toggle = Toggle(1);
    /// Loop mode of the panorama channel
    pub const PANORAMA_LOOP: Toggle = Toggle(2);
    /// Loop mode of the globe channel
    pub const GLOBE_LOOP: Toggle = Toggle(3);
    /// Render the panorama on the primary's own window too
    pub const RENDER_IN_SIM: Toggle = Toggle(4);
    /// Cycle the dataset year clock
    pub const CYCLE_YEARS: Toggle = Toggle(5);
    /// Orbit the camera around the globe
    pub const AUTO_ROTATE: Toggle = Toggle(6);
    /// Cloud layer visibility
    pub const SHOW_CLOUDS: Toggle = Toggle(7);

    const FIRST_LAYER: u8 = 8;

    /// Visibility toggle of dataset layer `index` (0..NUM_LAYERS)
    pub fn layer(index: usize) -> Option<Toggle> {
        (index < NUM_LAYERS).then(|| Toggle(Self::FIRST_LAYER + index as u8))
    }

    /// Named toggles accepted by the operator console
    pub const NAMED: [(&'static str, Toggle); 8] = [
        ("panorama", Toggle::PANORAMA_PLAYING),
        ("globe", Toggle::GLOBE_PLAYING),
        ("panorama-loop", Toggle::PANORAMA_LOOP),
        ("globe-loop", Toggle::GLOBE_LOOP),
        ("render-in-sim", Toggle::RENDER_IN_SIM),
        ("cycle-years", Toggle::CYCLE_YEARS),
        ("rotate", Toggle::AUTO_ROTATE),
        ("clouds", Toggle::SHOW_CLOUDS),
    ];

    /// Resolve a console name; `layer<N>` selects a dataset layer
    pub fn from_name(name: &str) -> Option<Toggle> {
        if let Some(n) = name.strip_prefix("layer") {
            return n.parse::<usize>().ok().and_then(Toggle::layer);
        }
        Self::NAMED
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, t)| *t)
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Index into the shared scalar array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Scalar(pub u8);

impl Scalar {
    /// Overall video brightness multiplier
    pub const BRIGHTNESS: Scalar = Scalar(0);
    /// Blend factor of the active panorama slot
    pub const BLEND_ACTIVE: Scalar = Scalar(1);
    /// Blend factor of the preloading panorama slot
    pub const BLEND_PRELOAD: Scalar = Scalar(2);
    /// Globe light intensity
    pub const LIGHT_INTENSITY: Scalar = Scalar(3);
    /// Normalised position of the dataset year clock (0..1)
    pub const DATASET_INDEX: Scalar = Scalar(4);
    /// Blend between base imagery and dataset layers
    pub const DATA_BLEND: Scalar = Scalar(5);
    /// Current dataset year as a real number
    pub const CURRENT_YEAR: Scalar = Scalar(6);

    pub const NAMED: [(&'static str, Scalar); 7] = [
        ("brightness", Scalar::BRIGHTNESS),
        ("blend-active", Scalar::BLEND_ACTIVE),
        ("blend-preload", Scalar::BLEND_PRELOAD),
        ("light", Scalar::LIGHT_INTENSITY),
        ("dataset-index", Scalar::DATASET_INDEX),
        ("data-blend", Scalar::DATA_BLEND),
        ("year", Scalar::CURRENT_YEAR),
    ];

    pub fn from_name(name: &str) -> Option<Scalar> {
        Self::NAMED
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, s)| *s)
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Index into the shared clock array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClockId(pub u8);

impl ClockId {
    pub const PANORAMA: ClockId = ClockId(0);
    pub const PANORAMA_PRELOAD: ClockId = ClockId(1);
    pub const GLOBE: ClockId = ClockId(2);
    pub const DATASET: ClockId = ClockId(3);

    #[inline]
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Identifies one MediaController and its cue in the shared state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MediaChannel(pub u8);

impl MediaChannel {
    /// Full-dome panorama video (preload + swap)
    pub const PANORAMA: MediaChannel = MediaChannel(0);
    /// Data video draped on the globe
    pub const GLOBE: MediaChannel = MediaChannel(1);

    pub const ALL: [MediaChannel; NUM_MEDIA_CHANNELS] = [MediaChannel::PANORAMA, MediaChannel::GLOBE];

    pub fn from_index(idx: usize) -> Option<Self> {
        (idx < NUM_MEDIA_CHANNELS).then_some(MediaChannel(idx as u8))
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.0 as usize
    }

    pub fn name(&self) -> &'static str {
        match self.0 {
            0 => "panorama",
            1 => "globe",
            _ => "unknown",
        }
    }
}

/// Camera position and orientation
///
/// Orientation is a unit quaternion stored as `[w, x, y, z]`.
/// Uses `#[repr(C)]` with only `f64` fields so it can be embedded in the
/// byte-copied shared state.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Pose {
    pub position: [f64; 3],
    pub orientation: [f64; 4],
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Pose {
    pub const IDENTITY: Pose = Pose {
        position: [0.0, 0.0, 0.0],
        orientation: [1.0, 0.0, 0.0, 0.0],
    };

    pub fn new(position: [f64; 3], orientation: [f64; 4]) -> Self {
        Self { position, orientation }
    }

    /// Distance of the camera from the origin
    pub fn distance(&self) -> f64 {
        let [x, y, z] = self.position;
        (x * x + y * y + z * z).sqrt()
    }

    /// Pose at `position` looking at `target` with +Y as the up hint
    ///
    /// Forward is -Z in camera space. Degenerate inputs (target at the
    /// position, or looking straight along the up axis) keep the identity
    /// orientation for the missing axis.
    pub fn looking_at(position: [f64; 3], target: [f64; 3]) -> Self {
        let forward = normalize(sub(target, position));
        let Some(forward) = forward else {
            return Self::new(position, Self::IDENTITY.orientation);
        };
        let back = [-forward[0], -forward[1], -forward[2]];
        let right = normalize(cross([0.0, 1.0, 0.0], back)).unwrap_or([1.0, 0.0, 0.0]);
        let up = cross(back, right);
        Self::new(position, quat_from_basis(right, up, back))
    }

    /// Rotate the whole pose around the world Y axis by `angle` radians
    pub fn orbit_y(&self, angle: f64) -> Self {
        let (s, c) = (angle * 0.5).sin_cos();
        let q = [c, 0.0, s, 0.0];
        let [x, y, z] = self.position;
        let (sa, ca) = angle.sin_cos();
        let position = [x * ca + z * sa, y, -x * sa + z * ca];
        Self::new(position, quat_normalize(quat_mul(q, self.orientation)))
    }
}

fn sub(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn normalize(v: [f64; 3]) -> Option<[f64; 3]> {
    let len = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    (len > 1e-12).then(|| [v[0] / len, v[1] / len, v[2] / len])
}

fn quat_mul(a: [f64; 4], b: [f64; 4]) -> [f64; 4] {
    [
        a[0] * b[0] - a[1] * b[1] - a[2] * b[2] - a[3] * b[3],
        a[0] * b[1] + a[1] * b[0] + a[2] * b[3] - a[3] * b[2],
        a[0] * b[2] - a[1] * b[3] + a[2] * b[0] + a[3] * b[1],
        a[0] * b[3] + a[1] * b[2] - a[2] * b[1] + a[3] * b[0],
    ]
}

fn quat_normalize(q: [f64; 4]) -> [f64; 4] {
    let len = (q[0] * q[0] + q[1] * q[1] + q[2] * q[2] + q[3] * q[3]).sqrt();
    if len < 1e-12 {
        return Pose::IDENTITY.orientation;
    }
    [q[0] / len, q[1] / len, q[2] / len, q[3] / len]
}

/// Quaternion from an orthonormal basis given as the rotation matrix columns
fn quat_from_basis(x: [f64; 3], y: [f64; 3], z: [f64; 3]) -> [f64; 4] {
    let (m00, m11, m22) = (x[0], y[1], z[2]);
    let trace = m00 + m11 + m22;
    let q = if trace > 0.0 {
        let s = (trace + 1.0).sqrt() * 2.0;
        [0.25 * s, (y[2] - z[1]) / s, (z[0] - x[2]) / s, (x[1] - y[0]) / s]
    } else if m00 > m11 && m00 > m22 {
        let s = (1.0 + m00 - m11 - m22).sqrt() * 2.0;
        [(y[2] - z[1]) / s, 0.25 * s, (y[0] + x[1]) / s, (z[0] + x[2]) / s]
    } else if m11 > m22 {
        let s = (1.0 + m11 - m00 - m22).sqrt() * 2.0;
        [(z[0] - x[2]) / s, (y[0] + x[1]) / s, 0.25 * s, (z[1] + y[2]) / s]
    } else {
        let s = (1.0 + m22 - m00 - m11).sqrt() * 2.0;
        [(x[1] - y[0]) / s, (z[0] + x[2]) / s, (z[1] + y[2]) / s, 0.25 * s]
    };
    quat_normalize(q)
}
