//! Weakly-compressible SPH with a Tait equation of state.
//!
//! Each substep:
//! 1. rebuild the spatial hash and neighbour lists (r < h)
//! 2. density `ρᵢ = Σⱼ mⱼ W_poly6(rᵢⱼ)` including self, pressure from Tait
//! 3. accelerations from pressure, viscosity, surface tension and gravity
//! 4. semi-implicit Euler
//! 5. boundary collision
//!
//! Explicit integration: the stable substep shrinks as stiffness grows.

use glam::Vec3;
use log::{info, trace};
use rand_chacha::ChaCha8Rng;

use crate::advection::integrate_semi_implicit;
use crate::boundary::{Boundaries, FluidBoundary};
use crate::config::{FluidConfig, FluidConfigPatch};
use crate::constants::{
    MIN_KERNEL_DISTANCE, SURFACE_NORMAL_THRESHOLD, TAIT_GAMMA, WATER_COLOR,
};
use crate::error::{FluidError, FluidResult};
use crate::kernels::SphKernels;
use crate::particle::{jittered_lattice, lattice_cell_mass, make_rng, FluidParticle, Particles};
use crate::solver::FluidSolver;
use crate::spatial_hash::SpatialHashGrid;

pub struct SphSolver {
    config: FluidConfig,
    kernels: SphKernels,
    hash: SpatialHashGrid,
    particles: Particles,
    boundaries: Boundaries,
    rng: ChaCha8Rng,
}

impl SphSolver {
    /// Solver with `patch` merged over [`FluidConfig::sph_defaults`].
    pub fn new(patch: FluidConfigPatch) -> FluidResult<Self> {
        Self::with_config(patch.apply(FluidConfig::sph_defaults()))
    }

    pub fn with_config(config: FluidConfig) -> FluidResult<Self> {
        config.validate()?;
        let kernels = SphKernels::new(config.smoothing_radius)?;
        let hash = SpatialHashGrid::new(config.smoothing_radius)?;
        Ok(Self {
            rng: make_rng(config.seed),
            particles: Particles::with_capacity(config.particle_count),
            config,
            kernels,
            hash,
            boundaries: Boundaries::new(),
        })
    }

    pub fn kernels(&self) -> &SphKernels {
        &self.kernels
    }

    /// Tait stiffness B = k ρ₀ / γ.
    pub fn tait_b(&self) -> f32 {
        self.config.stiffness * self.config.rest_density / TAIT_GAMMA as f32
    }

    /// Fill `[min, max)` with a jittered lattice at spacing 2r, up to the
    /// remaining `particle_count` capacity. Returns the number spawned.
    pub fn initialize_box(
        &mut self,
        min: Vec3,
        max: Vec3,
        color: Option<[f32; 4]>,
    ) -> FluidResult<usize> {
        let remaining = self.config.particle_count.saturating_sub(self.particles.len());
        let spacing = self.config.particle_radius * 2.0;
        let points = jittered_lattice(min, max, spacing, remaining, &mut self.rng)?;
        let mass = lattice_cell_mass(min, max, spacing, self.config.rest_density);
        let color = color.unwrap_or(WATER_COLOR);
        for &p in &points {
            self.particles
                .spawn(p, mass, self.config.rest_density, color);
        }
        info!(
            "sph: spawned {} particles (mass {:.5}), {} total",
            points.len(),
            mass,
            self.particles.len()
        );
        Ok(points.len())
    }

    /// Replace the population with particles of `mass` at `positions`.
    pub fn initialize_particles(&mut self, positions: &[Vec3], mass: f32) -> FluidResult<()> {
        check_mass(mass)?;
        self.particles
            .reset_to(positions, mass, self.config.rest_density);
        info!("sph: initialized {} particles", positions.len());
        Ok(())
    }

    pub fn mean_density(&self) -> f32 {
        self.particles.mean_density()
    }

    fn compute_density_pressure(&mut self) {
        let b = self.tait_b();
        let rho0 = self.config.rest_density;
        let w0 = self.kernels.poly6(0.0);
        let list = &self.particles.list;

        let densities: Vec<f32> = list
            .iter()
            .map(|p| {
                p.neighbors.iter().fold(p.mass * w0, |rho, &j| {
                    let q = &list[j];
                    rho + q.mass * self.kernels.poly6(p.position.distance(q.position))
                })
            })
            .collect();

        for (p, rho) in self.particles.list.iter_mut().zip(densities) {
            p.density = rho;
            p.pressure = (b * ((rho / rho0).powi(TAIT_GAMMA) - 1.0)).max(0.0);
        }
    }

    fn compute_accelerations(&mut self) {
        let k = &self.kernels;
        let mu = self.config.viscosity;
        let sigma = self.config.surface_tension;
        let gravity = self.config.gravity;
        let list = &self.particles.list;

        let accelerations: Vec<Vec3> = list
            .iter()
            .map(|pi| {
                let mut pressure = Vec3::ZERO;
                let mut viscosity = Vec3::ZERO;
                let mut normal = Vec3::ZERO;
                let mut curvature = 0.0;
                let pi_term = pi.pressure / (pi.density * pi.density);

                for &j in &pi.neighbors {
                    let pj = &list[j];
                    let r = pi.position - pj.position;
                    let dist = r.length();
                    if dist < MIN_KERNEL_DISTANCE {
                        continue;
                    }
                    let pj_term = pj.pressure / (pj.density * pj.density);
                    pressure -= pj.mass * (pi_term + pj_term) * k.spiky_gradient(r, dist);
                    viscosity += pj.mass * (pj.velocity - pi.velocity) / pj.density
                        * k.viscosity_laplacian(dist);

                    let volume = pj.mass / pj.density;
                    normal += volume * k.cubic_spline_gradient(r, dist);
                    curvature += volume * k.poly6_laplacian(dist);
                }

                let mut accel = gravity + pressure + mu * viscosity;
                if sigma > 0.0 && normal.length() > SURFACE_NORMAL_THRESHOLD {
                    accel -= sigma * curvature * normal.normalize() / pi.density;
                }
                accel
            })
            .collect();

        for (p, a) in self.particles.list.iter_mut().zip(accelerations) {
            p.acceleration = a;
        }
    }
}

impl FluidSolver for SphSolver {
    fn name(&self) -> &'static str {
        "sph"
    }

    fn config(&self) -> &FluidConfig {
        &self.config
    }

    fn particles(&self) -> &[FluidParticle] {
        &self.particles.list
    }

    fn particles_mut(&mut self) -> &mut [FluidParticle] {
        &mut self.particles.list
    }

    fn boundaries(&self) -> &[FluidBoundary] {
        self.boundaries.as_slice()
    }

    fn add_boundary(&mut self, boundary: FluidBoundary) -> FluidResult<()> {
        self.boundaries.add(boundary)
    }

    fn step(&mut self, dt: f32) {
        if self.particles.is_empty() {
            return;
        }
        self.hash
            .rebuild_neighbors(&mut self.particles.list, self.config.smoothing_radius);
        self.compute_density_pressure();
        self.compute_accelerations();
        integrate_semi_implicit(&mut self.particles.list, dt);
        self.boundaries
            .resolve(&mut self.particles.list, self.config.boundary_damping);
        trace!(
            "sph: mean density {:.2} over {} cells",
            self.particles.mean_density(),
            self.hash.cell_count()
        );
    }

    fn clear(&mut self) {
        self.particles.clear();
        self.boundaries.clear();
        self.hash.clear();
    }
}

pub(crate) fn check_mass(mass: f32) -> FluidResult<()> {
    if mass.is_finite() && mass > 0.0 {
        Ok(())
    } else {
        Err(FluidError::config(
            "mass",
            format!("must be positive and finite, got {}", mass),
        ))
    }
}
