//! Camera navigation around the globe (primary only)
//!
//! The camera always sits on a sphere around the globe centre and looks at
//! it. Replicas never run this; they take the pose from the shared state.

use serde::{Deserialize, Serialize};

use crate::role::PrimaryAuthority;
use crate::types::Pose;

/// Duration of a fly-to morph in seconds
pub const MORPH_DURATION: f64 = 2.0;

/// Auto-rotate speed per unit of camera distance (radians per second)
pub const ROTATE_RATE: f64 = 0.03;

/// Position on a sphere around the globe centre
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    /// Degrees, -90..90
    pub lat: f64,
    /// Degrees, -180..180
    pub lon: f64,
    /// Distance from the centre (globe radius is 1)
    pub radius: f64,
}

impl Default for GeoLocation {
    fn default() -> Self {
        Self {
            lat: 0.0,
            lon: 0.0,
            radius: 3.0,
        }
    }
}

impl GeoLocation {
    pub fn new(lat: f64, lon: f64, radius: f64) -> Self {
        Self {
            lat: lat.clamp(-90.0, 90.0),
            lon: wrap_degrees(lon),
            radius: radius.max(0.0),
        }
    }

    /// Cartesian position (+Y north pole, lon 0 on +Z)
    pub fn position(&self) -> [f64; 3] {
        let (lat, lon) = (self.lat.to_radians(), self.lon.to_radians());
        [
            self.radius * lat.cos() * lon.sin(),
            self.radius * lat.sin(),
            self.radius * lat.cos() * lon.cos(),
        ]
    }

    pub fn from_position(position: [f64; 3]) -> Self {
        let [x, y, z] = position;
        let radius = (x * x + y * y + z * z).sqrt();
        if radius < 1e-12 {
            return Self::new(0.0, 0.0, 0.0);
        }
        Self::new((y / radius).asin().to_degrees(), x.atan2(z).to_degrees(), radius)
    }

    /// Camera pose at this location facing the centre
    pub fn pose(&self) -> Pose {
        Pose::looking_at(self.position(), [0.0; 3])
    }

    /// Linear interpolation in lat/lon/radius (longitude the short way)
    pub fn lerp(&self, to: &GeoLocation, t: f64) -> GeoLocation {
        let t = t.clamp(0.0, 1.0);
        let dlon = wrap_degrees(to.lon - self.lon);
        GeoLocation::new(
            self.lat + (to.lat - self.lat) * t,
            self.lon + dlon * t,
            self.radius + (to.radius - self.radius) * t,
        )
    }
}

fn wrap_degrees(deg: f64) -> f64 {
    let wrapped = (deg + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped.is_finite() {
        wrapped
    } else {
        0.0
    }
}

/// Fly-to animation
#[derive(Debug, Clone, PartialEq)]
pub struct CameraMorph {
    from: GeoLocation,
    to: GeoLocation,
    elapsed: f64,
    duration: f64,
}

impl CameraMorph {
    pub fn new(from: GeoLocation, to: GeoLocation, duration: f64) -> Self {
        Self {
            from,
            to,
            elapsed: 0.0,
            duration: duration.max(1e-6),
        }
    }

    /// Advance and return the current location
    pub fn step(&mut self, dt: f64) -> GeoLocation {
        if dt.is_finite() && dt > 0.0 {
            self.elapsed = (self.elapsed + dt).min(self.duration);
        }
        self.from.lerp(&self.to, self.elapsed / self.duration)
    }

    pub fn is_done(&self) -> bool {
        self.elapsed >= self.duration
    }
}

/// Primary-side camera state
#[derive(Debug, Clone)]
pub struct Navigator {
    pose: Pose,
    morph: Option<CameraMorph>,
}

impl Navigator {
    pub fn new(home: GeoLocation) -> Self {
        Self {
            pose: home.pose(),
            morph: None,
        }
    }

    pub fn pose(&self) -> Pose {
        self.pose
    }

    pub fn location(&self) -> GeoLocation {
        GeoLocation::from_position(self.pose.position)
    }

    pub fn is_morphing(&self) -> bool {
        self.morph.is_some()
    }

    /// Start a morph from the current location to `target`
    pub fn fly_to(&mut self, target: GeoLocation) {
        log::info!(
            "[NAV] Flying to lat {:.2} lon {:.2} radius {:.2}",
            target.lat,
            target.lon,
            target.radius
        );
        self.morph = Some(CameraMorph::new(self.location(), target, MORPH_DURATION));
    }

    /// Place the camera directly; cancels a running morph
    pub fn set_pose(&mut self, pose: Pose) {
        self.pose = pose;
        self.morph = None;
    }

    /// Advance one frame; the result goes into the shared state
    pub fn update(&mut self, dt: f64, auto_rotate: bool, _authority: PrimaryAuthority) -> Pose {
        if let Some(morph) = self.morph.as_mut() {
            self.pose = morph.step(dt).pose();
            if morph.is_done() {
                self.morph = None;
            }
        } else if auto_rotate && dt.is_finite() && dt > 0.0 {
            self.pose = self.pose.orbit_y(ROTATE_RATE * self.pose.distance() * dt);
        }
        self.pose
    }
}
