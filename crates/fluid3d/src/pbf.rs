//! Position Based Fluids (Macklin & Müller 2013).
//!
//! Incompressibility is enforced by projecting predicted positions onto the
//! density constraint `Cᵢ = ρᵢ/ρ₀ − 1` for a fixed number of Jacobi passes.
//! Velocity is then the net displacement over the substep, which keeps the
//! method stable at substeps where explicit SPH would blow up.

use glam::Vec3;
use log::{info, trace};
use rand_chacha::ChaCha8Rng;

use crate::boundary::{Boundaries, FluidBoundary};
use crate::config::{FluidConfig, FluidConfigPatch, PbfTuning};
use crate::constants::{MIN_KERNEL_DISTANCE, PBF_MIN_VORTICITY, WATER_COLOR};
use crate::error::FluidResult;
use crate::kernels::SphKernels;
use crate::particle::{jittered_lattice, lattice_cell_mass, make_rng, FluidParticle, Particles};
use crate::solver::FluidSolver;
use crate::spatial_hash::SpatialHashGrid;
use crate::sph::check_mass;

pub struct PbfSolver {
    config: FluidConfig,
    tuning: PbfTuning,
    kernels: SphKernels,
    hash: SpatialHashGrid,
    particles: Particles,
    boundaries: Boundaries,
    rng: ChaCha8Rng,
    // Per-substep scratch, indexed like `particles`
    start_positions: Vec<Vec3>,
    lambdas: Vec<f32>,
    constraints: Vec<f32>,
    deltas: Vec<Vec3>,
}

impl PbfSolver {
    /// Solver with `patch` merged over [`FluidConfig::pbf_defaults`].
    pub fn new(patch: FluidConfigPatch) -> FluidResult<Self> {
        Self::with_config(patch.apply(FluidConfig::pbf_defaults()))
    }

    pub fn with_config(config: FluidConfig) -> FluidResult<Self> {
        config.validate()?;
        let kernels = SphKernels::new(config.smoothing_radius)?;
        let hash = SpatialHashGrid::new(config.smoothing_radius)?;
        Ok(Self {
            tuning: PbfTuning::default(),
            rng: make_rng(config.seed),
            particles: Particles::with_capacity(config.particle_count),
            config,
            kernels,
            hash,
            boundaries: Boundaries::new(),
            start_positions: Vec::new(),
            lambdas: Vec::new(),
            constraints: Vec::new(),
            deltas: Vec::new(),
        })
    }

    pub fn tuning(&self) -> &PbfTuning {
        &self.tuning
    }

    pub fn set_tuning(&mut self, tuning: PbfTuning) -> FluidResult<()> {
        tuning.validate()?;
        self.tuning = tuning;
        Ok(())
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
            "pbf: spawned {} particles (mass {:.5}), {} total",
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
        info!("pbf: initialized {} particles", positions.len());
        Ok(())
    }

    /// Constraint values `ρᵢ/ρ₀ − 1` from the last projection pass.
    pub fn constraints(&self) -> &[f32] {
        &self.constraints
    }

    pub fn mean_density(&self) -> f32 {
        self.particles.mean_density()
    }

    fn predict(&mut self, dt: f32) {
        let gravity = self.config.gravity;
        self.start_positions.clear();
        for p in self.particles.iter_mut() {
            self.start_positions.push(p.position);
            p.velocity += gravity * dt;
            p.position += p.velocity * dt;
        }
    }

    /// One Jacobi pass: densities and multipliers for every particle, then
    /// position corrections applied together.
    fn project_density(&mut self) {
        let k = &self.kernels;
        let rho0 = self.config.rest_density;
        let epsilon = self.config.stiffness;
        let w0 = k.poly6(0.0);
        let list = &mut self.particles.list;

        self.lambdas.clear();
        self.constraints.clear();
        for i in 0..list.len() {
            let pi = &list[i];
            let mut rho = pi.mass * w0;
            let mut grad_i = Vec3::ZERO;
            let mut sum_grad_sq = 0.0;
            for &j in &pi.neighbors {
                let pj = &list[j];
                let r = pi.position - pj.position;
                let dist = r.length();
                rho += pj.mass * k.poly6(dist);
                let grad_j = k.spiky_gradient(r, dist) * (pj.mass / rho0);
                sum_grad_sq += grad_j.length_squared();
                grad_i += grad_j;
            }
            sum_grad_sq += grad_i.length_squared();
            let c = rho / rho0 - 1.0;
            self.constraints.push(c);
            self.lambdas.push(-c / (sum_grad_sq + epsilon));
            list[i].density = rho;
        }

        let t = &self.tuning;
        let w_dq = k.poly6(t.artificial_pressure_dq * k.smoothing_radius());
        self.deltas.clear();
        for (i, pi) in list.iter().enumerate() {
            let lambda_i = self.lambdas[i];
            let delta = pi.neighbors.iter().fold(Vec3::ZERO, |acc, &j| {
                let pj = &list[j];
                let r = pi.position - pj.position;
                let dist = r.length();
                let s_corr = if w_dq > 0.0 {
                    -t.artificial_pressure_k * (k.poly6(dist) / w_dq).powi(t.artificial_pressure_n)
                } else {
                    0.0
                };
                acc + k.spiky_gradient(r, dist) * (pj.mass * (lambda_i + self.lambdas[j] + s_corr))
            });
            self.deltas.push(delta / rho0);
        }

        for (p, d) in list.iter_mut().zip(&self.deltas) {
            p.position += *d;
        }
    }

    fn update_velocities(&mut self, dt: f32) {
        let inv_dt = 1.0 / dt;
        for (p, start) in self.particles.iter_mut().zip(&self.start_positions) {
            p.velocity = (p.position - *start) * inv_dt;
        }
    }

    /// Re-inject rotation lost to damping: `v += ε (N × ω) dt` with
    /// `N = ∇|ω| / |∇|ω||`.
    fn confine_vorticity(&mut self, dt: f32) {
        let epsilon = self.tuning.vorticity_epsilon;
        if epsilon <= 0.0 {
            return;
        }
        let k = &self.kernels;
        let list = &self.particles.list;

        let omegas: Vec<Vec3> = list
            .iter()
            .map(|pi| {
                pi.neighbors.iter().fold(Vec3::ZERO, |acc, &j| {
                    let pj = &list[j];
                    let r = pi.position - pj.position;
                    let grad = k.spiky_gradient(r, r.length());
                    acc + (pj.velocity - pi.velocity).cross(grad) * (pj.mass / pj.density)
                })
            })
            .collect();

        let impulses: Vec<Vec3> = list
            .iter()
            .enumerate()
            .map(|(i, pi)| {
                let omega = omegas[i];
                if omega.length() < PBF_MIN_VORTICITY {
                    return Vec3::ZERO;
                }
                let eta = pi.neighbors.iter().fold(Vec3::ZERO, |acc, &j| {
                    let pj = &list[j];
                    let r = pi.position - pj.position;
                    let grad = k.spiky_gradient(r, r.length());
                    acc + grad * (omegas[j].length() * pj.mass / pj.density)
                });
                if eta.length() < PBF_MIN_VORTICITY {
                    return Vec3::ZERO;
                }
                eta.normalize().cross(omega) * (epsilon * dt)
            })
            .collect();

        for (p, dv) in self.particles.iter_mut().zip(impulses) {
            p.velocity += dv;
        }
    }

    /// XSPH: blend each velocity towards its neighbourhood average, reading
    /// only the pre-blend velocities.
    fn apply_xsph(&mut self) {
        let c = self.config.viscosity;
        if c <= 0.0 {
            return;
        }
        let k = &self.kernels;
        let list = &self.particles.list;

        let corrections: Vec<Vec3> = list
            .iter()
            .map(|pi| {
                pi.neighbors.iter().fold(Vec3::ZERO, |acc, &j| {
                    let pj = &list[j];
                    let dist = pi.position.distance(pj.position);
                    let avg_density = 0.5 * (pi.density + pj.density);
                    if avg_density <= 0.0 {
                        return acc;
                    }
                    acc + (pj.velocity - pi.velocity) * (pj.mass * k.poly6(dist) / avg_density)
                }) * c
            })
            .collect();

        for (p, dv) in self.particles.iter_mut().zip(corrections) {
            p.velocity += dv;
        }
    }
}

impl FluidSolver for PbfSolver {
    fn name(&self) -> &'static str {
        "pbf"
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
        self.predict(dt);
        self.hash
            .rebuild_neighbors(&mut self.particles.list, self.config.smoothing_radius);
        for _ in 0..self.config.iterations {
            self.project_density();
        }
        self.update_velocities(dt);
        self.confine_vorticity(dt);
        self.apply_xsph();
        self.boundaries
            .resolve(&mut self.particles.list, self.config.boundary_damping);

        let distance: f32 = self
            .particles
            .list
            .iter()
            .zip(&self.start_positions)
            .map(|(p, s)| p.position.distance(*s))
            .sum();
        trace!(
            "pbf: mean density {:.2}, mean displacement {:.6}",
            self.particles.mean_density(),
            distance / self.particles.len() as f32
        );
    }

    fn clear(&mut self) {
        self.particles.clear();
        self.boundaries.clear();
        self.hash.clear();
        self.start_positions.clear();
        self.lambdas.clear();
        self.constraints.clear();
        self.deltas.clear();
    }
}
