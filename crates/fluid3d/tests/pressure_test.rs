//! Pressure projection tests on particle-built grids
//!
//! Fluid cells come from a real P2G scatter, solids from boundaries, as in a
//! FLIP substep.

use fluid3d::pressure::{compute_divergence, project};
use fluid3d::transfer::particles_to_grid;
use fluid3d::{
    Boundaries, CellMarker, FlipGrid, FlipGridConfig, FluidBoundary, FluidParticle, IVec3, UVec3,
    Vec3,
};

fn column(velocity: Vec3) -> Vec<FluidParticle> {
    let mut particles = Vec::new();
    for i in 0..8 {
        for j in 0..6 {
            for k in 0..8 {
                let pos = Vec3::new(0.25, 0.15, 0.25) + Vec3::new(i as f32, j as f32, k as f32) * 0.05;
                let mut p = FluidParticle::new(particles.len(), pos, 0.01, 1000.0);
                p.velocity = velocity;
                particles.push(p);
            }
        }
    }
    particles
}

fn grid_over_floor(particles: &[FluidParticle]) -> FlipGrid {
    let mut grid = FlipGrid::new(FlipGridConfig {
        resolution: UVec3::splat(10),
        origin: Vec3::ZERO,
        cell_size: 0.1,
    })
    .unwrap();
    let mut boundaries = Boundaries::new();
    boundaries.add(FluidBoundary::floor(0.2)).unwrap();
    particles_to_grid(&mut grid, particles);
    grid.mark_solids(|p| boundaries.is_solid(p));
    grid
}

/// Test that cells below the floor become solid and stop moving
#[test]
fn test_floor_cells_are_solid() {
    let grid = grid_over_floor(&column(Vec3::new(0.0, -1.0, 0.0)));
    assert!(grid.count(CellMarker::Solid) > 0);
    for (cell, data) in grid.iter() {
        if grid.cell_center(cell).y < 0.2 {
            assert_eq!(data.marker, CellMarker::Solid);
            assert_eq!(data.velocity, Vec3::ZERO);
        } else {
            assert_eq!(data.marker, CellMarker::Fluid);
        }
    }
}

/// Test that projection slows a column falling onto a floor
#[test]
fn test_projection_resists_floor_impact() {
    let mut grid = grid_over_floor(&column(Vec3::new(0.0, -1.0, 0.0)));
    let before = compute_divergence(&mut grid);
    assert!(before > 0.0);

    let bottom = IVec3::new(4, 2, 4);
    let v_before = grid.get(bottom).unwrap().velocity.y;
    project(&mut grid, 1000.0, 0.005, 50);
    let bottom_cell = grid.get(bottom).unwrap();
    assert!(bottom_cell.pressure > 0.0);
    assert!(bottom_cell.velocity.y > v_before);

    let after = compute_divergence(&mut grid);
    assert!(after < before, "before {} after {}", before, after);
}

/// Test that a column at rest produces no pressure
#[test]
fn test_resting_column_is_pressure_free() {
    let mut grid = grid_over_floor(&column(Vec3::ZERO));
    project(&mut grid, 1000.0, 0.005, 20);
    for (_, data) in grid.iter() {
        assert_eq!(data.pressure, 0.0);
        assert_eq!(data.velocity, Vec3::ZERO);
    }
}
