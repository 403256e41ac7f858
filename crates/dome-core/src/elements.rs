//! Emission particle field (primary only)
//!
//! Particles rise from fixed emission sites on the globe surface with
//! random jitter and fade out over their lifetime. The random process runs
//! only on the primary; replicas draw the positions and colours carried in
//! the shared state.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::role::PrimaryAuthority;
use crate::state::DerivedElement;
use crate::types::MAX_ELEMENTS;

/// Globe surface radius particles start from
const SURFACE: f32 = 1.0;
/// Outward drift in globe radii per second
const RISE_SPEED: f32 = 0.04;
/// Random walk amplitude per second
const JITTER: f32 = 0.02;
const MIN_LIFE: f32 = 2.0;
const MAX_LIFE: f32 = 6.0;

#[derive(Debug, Clone)]
struct Particle {
    site: usize,
    position: [f32; 3],
    age: f32,
    life: f32,
}

/// Fixed-capacity particle field feeding `SharedState::elements`
#[derive(Debug)]
pub struct EmissionField {
    sites: Vec<[f32; 3]>,
    particles: Vec<Particle>,
    elements: Vec<DerivedElement>,
    rng: StdRng,
}

impl EmissionField {
    /// `count` particles (clamped to `MAX_ELEMENTS`) spread over `sites`
    /// random emission sites
    pub fn new(count: usize, sites: usize) -> Self {
        Self::with_rng(count, sites, StdRng::from_entropy())
    }

    /// Deterministic field for tests and rehearsal
    pub fn with_seed(count: usize, sites: usize, seed: u64) -> Self {
        Self::with_rng(count, sites, StdRng::seed_from_u64(seed))
    }

    fn with_rng(count: usize, sites: usize, mut rng: StdRng) -> Self {
        let count = count.min(MAX_ELEMENTS);
        let sites: Vec<[f32; 3]> = (0..sites.max(1))
            .map(|_| random_unit_vector(&mut rng))
            .collect();
        let mut field = Self {
            sites,
            particles: Vec::with_capacity(count),
            elements: vec![DerivedElement::default(); count],
            rng,
        };
        for i in 0..count {
            let mut particle = field.spawn(i % field.sites.len());
            // Stagger ages so the field does not pulse
            particle.age = field.rng.gen_range(0.0..particle.life);
            field.particles.push(particle);
        }
        field.refresh_elements();
        field
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    fn spawn(&mut self, site: usize) -> Particle {
        let base = self.sites[site];
        let spread = 0.01;
        let position = [
            base[0] * SURFACE + self.rng.gen_range(-spread..spread),
            base[1] * SURFACE + self.rng.gen_range(-spread..spread),
            base[2] * SURFACE + self.rng.gen_range(-spread..spread),
        ];
        Particle {
            site,
            position,
            age: 0.0,
            life: self.rng.gen_range(MIN_LIFE..MAX_LIFE),
        }
    }

    /// Advance one frame and return the elements to publish
    pub fn update(&mut self, dt: f64, _authority: PrimaryAuthority) -> &[DerivedElement] {
        let dt = if dt.is_finite() && dt > 0.0 { dt as f32 } else { 0.0 };
        for i in 0..self.particles.len() {
            let expired = {
                let p = &mut self.particles[i];
                p.age += dt;
                p.age >= p.life
            };
            if expired {
                let fresh = self.spawn(self.particles[i].site);
                self.particles[i] = fresh;
                continue;
            }
            let normal = self.sites[self.particles[i].site];
            let jitter = [
                self.rng.gen_range(-1.0f32..1.0),
                self.rng.gen_range(-1.0f32..1.0),
                self.rng.gen_range(-1.0f32..1.0),
            ];
            let p = &mut self.particles[i];
            for axis in 0..3 {
                p.position[axis] += (normal[axis] * RISE_SPEED + jitter[axis] * JITTER) * dt;
            }
        }
        self.refresh_elements();
        &self.elements
    }

    fn refresh_elements(&mut self) {
        for (element, p) in self.elements.iter_mut().zip(&self.particles) {
            let fade = 1.0 - (p.age / p.life).clamp(0.0, 1.0);
            element.position = p.position;
            element.color = [1.0, 0.55 + 0.35 * fade, 0.2, fade];
        }
    }
}

fn random_unit_vector(rng: &mut StdRng) -> [f32; 3] {
    loop {
        let v = [
            rng.gen_range(-1.0f32..1.0),
            rng.gen_range(-1.0f32..1.0),
            rng.gen_range(-1.0f32..1.0),
        ];
        let len = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
        if len > 1e-3 && len <= 1.0 {
            return [v[0] / len, v[1] / len, v[2] / len];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    fn authority() -> PrimaryAuthority {
        Role::Primary.authority().unwrap()
    }

    #[test]
    fn test_count_is_clamped() {
        let field = EmissionField::with_seed(MAX_ELEMENTS + 100, 4, 1);
        assert_eq!(field.len(), MAX_ELEMENTS);
    }

    #[test]
    fn test_same_seed_same_field() {
        let mut a = EmissionField::with_seed(32, 3, 42);
        let mut b = EmissionField::with_seed(32, 3, 42);
        for _ in 0..10 {
            assert_eq!(a.update(0.016, authority()), b.update(0.016, authority()));
        }
    }

    #[test]
    fn test_particles_stay_near_globe_and_fade() {
        let mut field = EmissionField::with_seed(64, 5, 7);
        for _ in 0..600 {
            for element in field.update(0.016, authority()) {
                let [x, y, z] = element.position;
                let r = (x * x + y * y + z * z).sqrt();
                assert!(r > 0.9 && r < 1.5, "radius {r}");
                assert!((0.0..=1.0).contains(&element.color[3]));
            }
        }
    }

    #[test]
    fn test_zero_dt_keeps_positions() {
        let mut field = EmissionField::with_seed(8, 1, 3);
        let before = field.update(0.0, authority()).to_vec();
        assert_eq!(field.update(0.0, authority()), before.as_slice());
    }
}
