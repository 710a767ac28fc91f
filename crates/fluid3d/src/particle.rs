//! Particle representation shared by all three solvers.

use glam::{Mat3, UVec3, Vec3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::constants::{LATTICE_JITTER, WATER_COLOR};
use crate::error::{check_bounds, FluidResult};

/// A single fluid particle.
#[derive(Clone, Debug, PartialEq)]
pub struct FluidParticle {
    /// Index into the owning solver's particle array
    pub id: usize,
    /// World position
    pub position: Vec3,
    /// Current velocity
    pub velocity: Vec3,
    /// Acceleration from the last SPH force pass
    pub acceleration: Vec3,
    /// Density from the last substep (kg/m³)
    pub density: f32,
    /// Pressure from the last SPH substep
    pub pressure: f32,
    pub mass: f32,
    /// Linear RGBA
    pub color: [f32; 4],
    /// Neighbour indices within h, rebuilt every substep
    pub neighbors: Vec<usize>,
    /// Affine velocity matrix, reserved for APIC-style transfers
    pub affine: Option<Mat3>,
}

impl FluidParticle {
    /// A particle at rest with the given mass and rest density.
    pub fn new(id: usize, position: Vec3, mass: f32, rest_density: f32) -> Self {
        Self {
            id,
            position,
            velocity: Vec3::ZERO,
            acceleration: Vec3::ZERO,
            density: rest_density,
            pressure: 0.0,
            mass,
            color: WATER_COLOR,
            neighbors: Vec::new(),
            affine: None,
        }
    }

    pub fn with_color(mut self, color: [f32; 4]) -> Self {
        self.color = color;
        self
    }
}

/// Fixed population of particles.
///
/// Particles are only added by the solvers' `initialize_*` calls; a running
/// simulation never changes the count, so neighbour indices and hash buckets
/// can refer to particles by index.
#[derive(Clone, Debug, Default)]
pub struct Particles {
    pub list: Vec<FluidParticle>,
}

impl Particles {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            list: Vec::with_capacity(capacity),
        }
    }

    /// Append a particle at rest. Its id is its index.
    pub fn spawn(&mut self, position: Vec3, mass: f32, rest_density: f32, color: [f32; 4]) {
        let id = self.list.len();
        self.list
            .push(FluidParticle::new(id, position, mass, rest_density).with_color(color));
    }

    /// Replace the population with particles at `positions`.
    pub fn reset_to(&mut self, positions: &[Vec3], mass: f32, rest_density: f32) {
        self.list.clear();
        self.list.reserve(positions.len());
        for &position in positions {
            self.spawn(position, mass, rest_density, WATER_COLOR);
        }
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn clear(&mut self) {
        self.list.clear();
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut FluidParticle> {
        self.list.iter_mut()
    }

    /// Mean of the per-particle densities, 0 when empty.
    pub fn mean_density(&self) -> f32 {
        if self.list.is_empty() {
            return 0.0;
        }
        self.list.iter().map(|p| p.density).sum::<f32>() / self.list.len() as f32
    }
}

/// RNG for lattice jitter; `None` seeds from OS entropy.
pub fn make_rng(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    }
}

/// Jittered lattice filling `[min, max)`.
///
/// Lattice points sit at `min + i * spacing` while below `max` on every axis,
/// each nudged by up to ±`LATTICE_JITTER / 2` of the spacing. Stops after
/// `limit` points, filling x fastest, then y, then z.
pub fn jittered_lattice(
    min: Vec3,
    max: Vec3,
    spacing: f32,
    limit: usize,
    rng: &mut impl Rng,
) -> FluidResult<Vec<Vec3>> {
    check_bounds(min, max)?;
    if !(spacing.is_finite() && spacing > 0.0) {
        return Err(crate::error::FluidError::config(
            "particle_radius",
            format!("lattice spacing must be positive, got {}", spacing),
        ));
    }

    let counts = lattice_counts(min, max, spacing);
    let total = (counts.x as usize)
        .saturating_mul(counts.y as usize)
        .saturating_mul(counts.z as usize);
    let jitter = LATTICE_JITTER * spacing;

    let mut points = Vec::with_capacity(total.min(limit));
    'fill: for k in 0..counts.z {
        for j in 0..counts.y {
            for i in 0..counts.x {
                if points.len() >= limit {
                    break 'fill;
                }
                let offset = Vec3::new(
                    rng.gen::<f32>() - 0.5,
                    rng.gen::<f32>() - 0.5,
                    rng.gen::<f32>() - 0.5,
                ) * jitter;
                let lattice = Vec3::new(i as f32, j as f32, k as f32) * spacing;
                points.push(min + lattice + offset);
            }
        }
    }
    Ok(points)
}

/// Keeps a lattice point that lands on `max` through rounding out of the box.
const LATTICE_ROUNDING: f32 = 1e-5;

/// Lattice points per axis for `[min, max)` at `spacing`.
fn lattice_counts(min: Vec3, max: Vec3, spacing: f32) -> UVec3 {
    ((max - min) / spacing * (1.0 - LATTICE_ROUNDING))
        .ceil()
        .as_uvec3()
}

/// Mass of one lattice cell of the complete fill of `[min, max)`.
///
/// Every point of the full lattice owns `V_box / N` of the box, so a fill
/// stopped early by `limit` still starts at rest density.
pub(crate) fn lattice_cell_mass(min: Vec3, max: Vec3, spacing: f32, rest_density: f32) -> f32 {
    let counts = lattice_counts(min, max, spacing).max(UVec3::ONE).as_vec3();
    let cell = (max - min) / counts;
    rest_density * cell.x * cell.y * cell.z
}
