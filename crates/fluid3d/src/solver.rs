//! Public surface shared by the SPH, PBF and FLIP solvers.

use log::{debug, warn};

use crate::boundary::FluidBoundary;
use crate::config::FluidConfig;
use crate::error::{FluidError, FluidResult};
use crate::particle::FluidParticle;

/// How one `simulate()` call is split into fixed substeps.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SubstepPlan {
    /// Number of substeps to run
    pub count: usize,
    /// Length of each substep (s)
    pub dt: f32,
    /// Time not simulated because the substep cap was hit (s)
    pub dropped: f32,
}

impl SubstepPlan {
    /// `ceil(delta / time_step)` substeps of `delta / count` each.
    ///
    /// Non-finite or non-positive `delta` gives no substeps. Past
    /// `max_substeps` the count is capped, each substep is `time_step` long and
    /// the rest of `delta` is dropped.
    pub fn new(delta: f32, time_step: f32, max_substeps: usize) -> Self {
        let idle = Self {
            count: 0,
            dt: 0.0,
            dropped: 0.0,
        };
        if !(delta.is_finite() && delta > 0.0) || !(time_step > 0.0) || max_substeps == 0 {
            return idle;
        }

        let wanted = (delta / time_step).ceil();
        if wanted > max_substeps as f32 {
            let covered = time_step * max_substeps as f32;
            return Self {
                count: max_substeps,
                dt: time_step,
                dropped: delta - covered,
            };
        }

        let count = (wanted as usize).max(1);
        Self {
            count,
            dt: delta / count as f32,
            dropped: 0.0,
        }
    }

    pub fn is_truncated(&self) -> bool {
        self.dropped > 0.0
    }
}

/// A particle fluid solver.
///
/// Each solver owns its particles, boundaries and acceleration structures;
/// nothing is shared between instances.
pub trait FluidSolver {
    /// Short name used in log output.
    fn name(&self) -> &'static str;

    fn config(&self) -> &FluidConfig;

    fn particles(&self) -> &[FluidParticle];

    /// Live access to particle state. The population size is fixed.
    fn particles_mut(&mut self) -> &mut [FluidParticle];

    fn boundaries(&self) -> &[FluidBoundary];

    fn add_boundary(&mut self, boundary: FluidBoundary) -> FluidResult<()>;

    /// Advance one substep of length `dt`.
    fn step(&mut self, dt: f32);

    /// Drop all particles and boundaries.
    fn clear(&mut self);

    /// Advance by `delta_time` in fixed substeps. Blocks until done.
    fn simulate(&mut self, delta_time: f32) -> SubstepPlan {
        let config = self.config();
        let plan = SubstepPlan::new(delta_time, config.time_step, config.max_substeps);
        if plan.is_truncated() {
            warn!(
                "{}: frame of {:.4}s exceeds {} substeps, dropping {:.4}s",
                self.name(),
                delta_time,
                plan.count,
                plan.dropped
            );
        }
        debug!(
            "{}: {} substeps of {:.6}s for {} particles",
            self.name(),
            plan.count,
            plan.dt,
            self.particles().len()
        );
        for _ in 0..plan.count {
            self.step(plan.dt);
        }
        plan
    }

    /// Flattened xyz positions.
    fn particle_positions(&self) -> Vec<f32> {
        self.particles()
            .iter()
            .flat_map(|p| p.position.to_array())
            .collect()
    }

    /// Flattened xyz velocities.
    fn particle_velocities(&self) -> Vec<f32> {
        self.particles()
            .iter()
            .flat_map(|p| p.velocity.to_array())
            .collect()
    }

    /// Flattened RGBA colours.
    fn particle_colors(&self) -> Vec<f32> {
        self.particles().iter().flat_map(|p| p.color).collect()
    }

    fn particle_count(&self) -> usize {
        self.particles().len()
    }

    /// The particle with id `index`.
    fn particle(&self, index: usize) -> FluidResult<&FluidParticle> {
        let particles = self.particles();
        particles.get(index).ok_or(FluidError::InvalidParticleIndex {
            index,
            len: particles.len(),
        })
    }
}
