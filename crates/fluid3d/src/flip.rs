//! FLIP solver: particles carry velocity, a sparse grid does the pressure work.
//!
//! Per substep:
//! 1. P2G scatter, touched cells marked fluid (or solid inside a boundary)
//! 2. gravity on fluid cells
//! 3. approximate pressure projection
//! 4. G2P gather blended by `flip_ratio`
//! 5. advection and boundary collision
//!
//! The grid is rebuilt every substep.

use glam::Vec3;
use log::{info, trace};
use rand_chacha::ChaCha8Rng;

use crate::advection::advect_particles;
use crate::boundary::{Boundaries, FluidBoundary};
use crate::config::{default_flip_ratio, FlipGridConfig, FluidConfig, FluidConfigPatch};
use crate::constants::{FLIP_PARTICLE_MASS, FLIP_SPACING_RADII, WATER_COLOR};
use crate::error::FluidResult;
use crate::grid::FlipGrid;
use crate::particle::{jittered_lattice, make_rng, FluidParticle, Particles};
use crate::pressure::{self, fluid_cell_count};
use crate::solver::FluidSolver;
use crate::sph::check_mass;
use crate::transfer::{grid_to_particles, particles_to_grid};

pub struct FlipSolver {
    config: FluidConfig,
    grid: FlipGrid,
    particles: Particles,
    boundaries: Boundaries,
    rng: ChaCha8Rng,
    /// 0 = pure PIC, 1 = pure FLIP
    flip_ratio: f32,
}

impl FlipSolver {
    /// Solver with `patch` merged over [`FluidConfig::flip_defaults`].
    pub fn new(patch: FluidConfigPatch, grid: FlipGridConfig) -> FluidResult<Self> {
        Self::with_config(patch.apply(FluidConfig::flip_defaults()), grid)
    }

    pub fn with_config(config: FluidConfig, grid: FlipGridConfig) -> FluidResult<Self> {
        config.validate()?;
        let grid = FlipGrid::new(grid)?;
        Ok(Self {
            rng: make_rng(config.seed),
            particles: Particles::with_capacity(config.particle_count),
            config,
            grid,
            boundaries: Boundaries::new(),
            flip_ratio: default_flip_ratio(),
        })
    }

    pub fn flip_ratio(&self) -> f32 {
        self.flip_ratio
    }

    /// Set the FLIP/PIC blend, clamped to [0, 1].
    pub fn set_flip_ratio(&mut self, ratio: f32) {
        self.flip_ratio = if ratio.is_nan() { 0.0 } else { ratio.clamp(0.0, 1.0) };
    }

    /// Grid from the most recent substep.
    pub fn grid(&self) -> &FlipGrid {
        &self.grid
    }

    /// Fill `[min, max)` with a jittered lattice at spacing 1.5r, up to the
    /// remaining `particle_count` capacity. Returns the number spawned.
    pub fn initialize_box(
        &mut self,
        min: Vec3,
        max: Vec3,
        color: Option<[f32; 4]>,
    ) -> FluidResult<usize> {
        let remaining = self.config.particle_count.saturating_sub(self.particles.len());
        let spacing = self.config.particle_radius * FLIP_SPACING_RADII;
        let points = jittered_lattice(min, max, spacing, remaining, &mut self.rng)?;
        let color = color.unwrap_or(WATER_COLOR);
        for &p in &points {
            self.particles
                .spawn(p, FLIP_PARTICLE_MASS, self.config.rest_density, color);
        }
        info!(
            "flip: spawned {} particles, {} total",
            points.len(),
            self.particles.len()
        );
        Ok(points.len())
    }

    /// Replace the population with particles of `mass` at `positions`.
    pub fn initialize_particles(&mut self, positions: &[Vec3], mass: f32) -> FluidResult<()> {
        check_mass(mass)?;
        self.particles
            .reset_to(positions, mass, self.config.rest_density);
        info!("flip: initialized {} particles", positions.len());
        Ok(())
    }
}

impl FluidSolver for FlipSolver {
    fn name(&self) -> &'static str {
        "flip"
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
        if self.particles.is_empty() || !(dt > 0.0) {
            return;
        }

        // 1. P2G
        particles_to_grid(&mut self.grid, &self.particles.list);
        let boundaries = &self.boundaries;
        self.grid.mark_solids(|p| boundaries.is_solid(p));

        // 2. Gravity
        self.grid.apply_gravity(self.config.gravity, dt);

        // 3. Pressure
        let max_div = pressure::project(
            &mut self.grid,
            self.config.rest_density,
            dt,
            self.config.iterations,
        );

        // 4. G2P
        grid_to_particles(&self.grid, &mut self.particles.list, self.flip_ratio);

        // 5. Advect and collide
        advect_particles(&mut self.particles.list, dt);
        self.boundaries
            .resolve(&mut self.particles.list, self.config.boundary_damping);

        trace!(
            "flip: {} fluid cells of {}, max divergence {:.4}",
            fluid_cell_count(&self.grid),
            self.grid.len(),
            max_div
        );
    }

    fn clear(&mut self) {
        self.particles.clear();
        self.boundaries.clear();
        self.grid.clear();
    }
}
