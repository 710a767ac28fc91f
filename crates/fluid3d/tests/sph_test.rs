//! SPH solver tests
//!
//! Conservation checks on small isolated clusters and an end-to-end
//! collapse onto a floor.

use fluid3d::{FluidBoundary, FluidConfigPatch, FluidSolver, SphSolver, Vec3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn weightless(surface_tension: f32, viscosity: f32) -> SphSolver {
    SphSolver::new(FluidConfigPatch {
        gravity: Some(Vec3::ZERO),
        surface_tension: Some(surface_tension),
        viscosity: Some(viscosity),
        ..Default::default()
    })
    .unwrap()
}

fn momentum(solver: &SphSolver) -> Vec3 {
    solver
        .particles()
        .iter()
        .map(|p| p.velocity * p.mass)
        .sum()
}

fn momentum_scale(solver: &SphSolver) -> f32 {
    solver
        .particles()
        .iter()
        .map(|p| (p.velocity * p.mass).length())
        .sum()
}

/// Test that a compressed pair exchanges equal and opposite momentum
#[test]
fn test_pair_conserves_momentum() {
    let mut solver = weightless(0.0728, 0.001);
    solver
        .initialize_particles(&[Vec3::new(0.0, 0.0, 0.0), Vec3::new(0.02, 0.01, 0.0)], 0.064)
        .unwrap();
    solver.particles_mut()[0].velocity = Vec3::new(0.3, 0.0, -0.1);
    solver.particles_mut()[1].velocity = Vec3::new(-0.1, 0.2, 0.0);
    let before = momentum(&solver);

    solver.simulate(0.01);

    let after = momentum(&solver);
    assert!(
        (after - before).length() < 1e-6,
        "momentum drifted from {} to {}",
        before,
        after
    );
    // The pair actually interacted
    assert!(solver.particles()[0].velocity != Vec3::new(0.3, 0.0, -0.1));
}

/// Test that pressure forces alone conserve momentum in an irregular cluster
#[test]
fn test_pressure_cluster_conserves_momentum() {
    let mut rng = ChaCha8Rng::seed_from_u64(11);
    let positions: Vec<Vec3> = (0..12)
        .map(|_| Vec3::new(rng.gen(), rng.gen(), rng.gen()) * 0.06)
        .collect();
    let mut solver = weightless(0.0, 0.0);
    solver.initialize_particles(&positions, 0.064).unwrap();
    for (i, p) in solver.particles_mut().iter_mut().enumerate() {
        p.mass = 0.05 + 0.01 * i as f32;
    }
    let before = momentum(&solver);
    assert_eq!(before, Vec3::ZERO);

    solver.simulate(0.005);

    let drift = (momentum(&solver) - before).length();
    let scale = momentum_scale(&solver);
    assert!(scale > 0.0, "cluster should be pushed apart");
    assert!(drift <= 1e-4 * scale + 1e-7, "drift {} vs scale {}", drift, scale);
}

/// Test that a block dropped on a floor never rises above its start and
/// never sinks below the floor
#[test]
fn test_block_collapses_onto_floor() {
    let mut solver = SphSolver::new(FluidConfigPatch {
        seed: Some(3),
        ..Default::default()
    })
    .unwrap();
    solver.add_boundary(FluidBoundary::floor(0.0)).unwrap();
    let spawned = solver
        .initialize_box(Vec3::ZERO, Vec3::splat(0.2), None)
        .unwrap();
    assert_eq!(spawned, 125);

    let initial_max_y = solver
        .particles()
        .iter()
        .map(|p| p.position.y)
        .fold(f32::MIN, f32::max);

    for _ in 0..60 {
        solver.simulate(1.0 / 60.0);
        for p in solver.particles() {
            assert!(p.position.y >= 0.0, "below floor: {}", p.position);
            assert!(p.position.y <= initial_max_y, "above start: {}", p.position);
        }
    }
}

/// Test that particle lookups by id report out-of-range indices
#[test]
fn test_particle_lookup() {
    let mut solver = weightless(0.0, 0.0);
    solver
        .initialize_particles(&[Vec3::ZERO, Vec3::ONE], 0.01)
        .unwrap();
    assert_eq!(solver.particle(1).unwrap().id, 1);
    let err = solver.particle(2).unwrap_err();
    assert_eq!(
        err.to_string(),
        "particle index 2 out of range for 2 particles"
    );
}

/// Test that a fill capped by particle_count still starts near rest density
#[test]
fn test_capped_fill_starts_at_rest() {
    let mut solver = SphSolver::new(FluidConfigPatch {
        particle_count: Some(125),
        gravity: Some(Vec3::ZERO),
        seed: Some(5),
        ..Default::default()
    })
    .unwrap();
    // The full lattice would hold 25³ points; only one thin slab is spawned
    let n = solver
        .initialize_box(Vec3::ZERO, Vec3::ONE, None)
        .unwrap();
    assert_eq!(n, 125);

    let spacing = solver.config().particle_radius * 2.0;
    let cell_mass = solver.config().rest_density * spacing.powi(3);
    for p in solver.particles() {
        assert!((p.mass - cell_mass).abs() < 1e-4 * cell_mass, "mass {}", p.mass);
    }

    solver.step(1e-6);
    let rest = solver.config().rest_density;
    for p in solver.particles() {
        assert!(p.density < rest, "density {}", p.density);
        assert!(p.velocity.is_finite());
    }
}

/// Test the flattened render buffers
#[test]
fn test_flat_buffers() {
    let mut solver = weightless(0.0, 0.0);
    solver
        .initialize_particles(&[Vec3::new(1.0, 2.0, 3.0), Vec3::ZERO], 0.01)
        .unwrap();
    solver.particles_mut()[0].velocity = Vec3::new(-1.0, 0.0, 1.0);
    solver.particles_mut()[1].color = [0.1, 0.2, 0.3, 0.4];

    assert_eq!(
        solver.particle_positions(),
        vec![1.0, 2.0, 3.0, 0.0, 0.0, 0.0]
    );
    assert_eq!(
        solver.particle_velocities(),
        vec![-1.0, 0.0, 1.0, 0.0, 0.0, 0.0]
    );
    assert_eq!(&solver.particle_colors()[4..], &[0.1, 0.2, 0.3, 0.4]);
    assert_eq!(solver.particle_colors().len(), 8);
}
