//! Particle-grid transfer tests (P2G and G2P)
//!
//! Exercises the FLIP transfers on scattered particle clouds rather than
//! single particles.

use fluid3d::transfer::{grid_to_particles, particles_to_grid, sample_fluid_velocity};
use fluid3d::{CellMarker, FlipGrid, FlipGridConfig, FluidParticle, UVec3, Vec3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn grid() -> FlipGrid {
    FlipGrid::new(FlipGridConfig {
        resolution: UVec3::splat(16),
        origin: Vec3::ZERO,
        cell_size: 0.1,
    })
    .unwrap()
}

/// Random particles inside `[0.4, 1.2)³` with random velocities.
fn cloud(seed: u64, count: usize) -> Vec<FluidParticle> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..count)
        .map(|id| {
            let position = Vec3::splat(0.4) + Vec3::new(rng.gen(), rng.gen(), rng.gen()) * 0.8;
            let mut p = FluidParticle::new(id, position, 0.01, 1000.0);
            p.velocity = Vec3::new(rng.gen(), rng.gen(), rng.gen()) * 2.0 - Vec3::ONE;
            p
        })
        .collect()
}

/// Test that a uniform velocity field survives a PIC round trip
#[test]
fn test_uniform_velocity_round_trip() {
    let mut g = grid();
    let mut particles = cloud(1, 300);
    let v = Vec3::new(0.4, -1.2, 0.7);
    for p in &mut particles {
        p.velocity = v;
    }
    particles_to_grid(&mut g, &particles);
    grid_to_particles(&g, &mut particles, 0.0);
    for p in &particles {
        assert!((p.velocity - v).length() < 1e-5, "{}", p.velocity);
    }
}

/// Test that flip_ratio = 0 gives exactly the interpolated grid velocity
#[test]
fn test_pure_pic_matches_interpolation() {
    let mut g = grid();
    let mut particles = cloud(2, 200);
    particles_to_grid(&mut g, &particles);
    g.apply_gravity(Vec3::new(0.0, -9.81, 0.0), 0.01);

    let expected: Vec<Vec3> = particles
        .iter()
        .map(|p| sample_fluid_velocity(&g, p.position).unwrap())
        .collect();
    grid_to_particles(&g, &mut particles, 0.0);
    for (p, e) in particles.iter().zip(expected) {
        assert_eq!(p.velocity, e);
    }
}

/// Test that flip_ratio = 1 leaves every particle velocity untouched
#[test]
fn test_pure_flip_keeps_velocities() {
    let mut g = grid();
    let mut particles = cloud(3, 200);
    let before: Vec<Vec3> = particles.iter().map(|p| p.velocity).collect();
    particles_to_grid(&mut g, &particles);
    g.apply_gravity(Vec3::new(0.0, -9.81, 0.0), 0.05);
    grid_to_particles(&g, &mut particles, 1.0);
    for (p, v) in particles.iter().zip(before) {
        assert_eq!(p.velocity, v);
    }
}

/// Test that every particle is listed in exactly the cell that contains it
#[test]
fn test_cells_record_their_particles() {
    let mut g = grid();
    let particles = cloud(4, 150);
    particles_to_grid(&mut g, &particles);

    let mut seen = vec![0usize; particles.len()];
    for (cell, data) in g.iter() {
        assert_eq!(data.marker, CellMarker::Fluid);
        for &id in &data.particles {
            assert_eq!(g.world_to_cell(particles[id].position), cell);
            seen[id] += 1;
        }
    }
    assert!(seen.iter().all(|&n| n == 1));
}
