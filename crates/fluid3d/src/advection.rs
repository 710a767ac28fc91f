//! Explicit integrators shared by the solvers.

use crate::particle::FluidParticle;

/// Advect particles using simple Euler integration.
pub fn advect_particles(particles: &mut [FluidParticle], dt: f32) {
    for particle in particles.iter_mut() {
        particle.position += particle.velocity * dt;
    }
}

/// Semi-implicit Euler from the stored accelerations: `v += a dt`, then
/// `x += v dt` with the updated velocity.
pub fn integrate_semi_implicit(particles: &mut [FluidParticle], dt: f32) {
    for particle in particles.iter_mut() {
        particle.velocity += particle.acceleration * dt;
        particle.position += particle.velocity * dt;
    }
}
