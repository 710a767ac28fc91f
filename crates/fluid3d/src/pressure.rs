//! Approximate pressure projection on the sparse FLIP grid.
//!
//! Divergence and pressure gradient use central differences over the six face
//! neighbours; pressure comes from a fixed number of Jacobi sweeps. The
//! result reduces divergence but is not divergence-free: the sweep count is
//! far below what Jacobi needs to converge on a 64³ grid.
//!
//! Neighbour rules:
//! - solid or outside the grid: zero velocity, mirrors the centre pressure
//! - air or missing: the centre's own velocity, zero pressure
//! - fluid: its stored velocity and pressure

use glam::{IVec3, Vec3};
use rustc_hash::FxHashMap;

use crate::grid::{CellMarker, FlipGrid, Neighbor, FACE_OFFSETS};

/// Store `∇·v` in every fluid cell and return the largest magnitude.
pub fn compute_divergence(grid: &mut FlipGrid) -> f32 {
    let inv_2dx = 0.5 / grid.cell_size();
    let fluid = grid.fluid_cells();

    let divergences: Vec<(IVec3, f32)> = fluid
        .iter()
        .map(|&cell| {
            let own = grid.get(cell).map_or(Vec3::ZERO, |c| c.velocity);
            let velocity_at = |offset: IVec3| match grid.neighbor(cell + offset) {
                Neighbor::Solid => Vec3::ZERO,
                Neighbor::Air => own,
                Neighbor::Fluid(c) => c.velocity,
            };
            let div = (velocity_at(IVec3::X).x - velocity_at(IVec3::NEG_X).x
                + velocity_at(IVec3::Y).y
                - velocity_at(IVec3::NEG_Y).y
                + velocity_at(IVec3::Z).z
                - velocity_at(IVec3::NEG_Z).z)
                * inv_2dx;
            (cell, div)
        })
        .collect();

    let mut max_div = 0.0f32;
    for (cell, div) in divergences {
        if let Some(c) = grid.get_mut(cell) {
            c.divergence = div;
        }
        max_div = max_div.max(div.abs());
    }
    max_div
}

/// Run `iterations` Jacobi sweeps of
/// `p = (Σ p_nonsolid − (ρ₀/dt) dx² div) / n_nonsolid` over fluid cells.
///
/// Each sweep reads only the previous sweep's pressures.
pub fn solve_pressure_jacobi(grid: &mut FlipGrid, rest_density: f32, dt: f32, iterations: usize) {
    let fluid = grid.fluid_cells();
    if fluid.is_empty() || !(dt > 0.0) {
        return;
    }
    let dx = grid.cell_size();
    let scale = rest_density / dt * dx * dx;

    for cell in &fluid {
        if let Some(c) = grid.get_mut(*cell) {
            c.pressure = 0.0;
        }
    }

    let mut next: FxHashMap<IVec3, f32> = FxHashMap::default();
    for _ in 0..iterations {
        next.clear();
        for &cell in &fluid {
            let mut sum = 0.0;
            let mut open = 0u32;
            for offset in FACE_OFFSETS {
                match grid.neighbor(cell + offset) {
                    Neighbor::Solid => {}
                    Neighbor::Air => open += 1,
                    Neighbor::Fluid(c) => {
                        sum += c.pressure;
                        open += 1;
                    }
                }
            }
            let div = grid.get(cell).map_or(0.0, |c| c.divergence);
            let p = if open > 0 {
                (sum - scale * div) / open as f32
            } else {
                0.0
            };
            next.insert(cell, p);
        }
        for (&cell, &p) in &next {
            if let Some(c) = grid.get_mut(cell) {
                c.pressure = p;
            }
        }
    }
}

/// `v -= (dt/ρ₀) ∇p` on fluid cells.
pub fn apply_pressure_gradient(grid: &mut FlipGrid, rest_density: f32, dt: f32) {
    let inv_2dx = 0.5 / grid.cell_size();
    let factor = dt / rest_density;
    let fluid = grid.fluid_cells();

    let corrections: Vec<(IVec3, Vec3)> = fluid
        .iter()
        .map(|&cell| {
            let own = grid.get(cell).map_or(0.0, |c| c.pressure);
            let pressure_at = |offset: IVec3| match grid.neighbor(cell + offset) {
                Neighbor::Solid => own,
                Neighbor::Air => 0.0,
                Neighbor::Fluid(c) => c.pressure,
            };
            let grad = Vec3::new(
                pressure_at(IVec3::X) - pressure_at(IVec3::NEG_X),
                pressure_at(IVec3::Y) - pressure_at(IVec3::NEG_Y),
                pressure_at(IVec3::Z) - pressure_at(IVec3::NEG_Z),
            ) * inv_2dx;
            (cell, grad * factor)
        })
        .collect();

    for (cell, dv) in corrections {
        if let Some(c) = grid.get_mut(cell) {
            c.velocity -= dv;
        }
    }
}

/// Divergence, Jacobi sweeps, gradient subtraction. Returns the largest
/// divergence before projection.
pub fn project(grid: &mut FlipGrid, rest_density: f32, dt: f32, iterations: usize) -> f32 {
    let max_div = compute_divergence(grid);
    solve_pressure_jacobi(grid, rest_density, dt, iterations);
    apply_pressure_gradient(grid, rest_density, dt);
    max_div
}

/// Number of fluid cells, for diagnostics.
pub fn fluid_cell_count(grid: &FlipGrid) -> usize {
    grid.count(CellMarker::Fluid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FlipGridConfig;
    use glam::UVec3;

    fn grid_with_fluid(cells: &[(IVec3, Vec3)]) -> FlipGrid {
        let mut grid = FlipGrid::new(FlipGridConfig {
            resolution: UVec3::splat(8),
            origin: Vec3::ZERO,
            cell_size: 0.1,
        })
        .unwrap();
        for &(cell, velocity) in cells {
            if let Some(c) = grid.touch(cell) {
                c.marker = CellMarker::Fluid;
                c.velocity = velocity;
            }
        }
        grid
    }

    #[test]
    fn test_uniform_flow_has_no_divergence() {
        let mut cells = Vec::new();
        for x in 2..5 {
            for y in 2..5 {
                for z in 2..5 {
                    cells.push((IVec3::new(x, y, z), Vec3::new(0.5, -0.2, 0.1)));
                }
            }
        }
        let mut grid = grid_with_fluid(&cells);
        let max_div = compute_divergence(&mut grid);
        assert!(max_div < 1e-5, "max div {}", max_div);
    }

    #[test]
    fn test_expanding_flow_is_positive() {
        let mut grid = grid_with_fluid(&[
            (IVec3::new(3, 3, 3), Vec3::ZERO),
            (IVec3::new(4, 3, 3), Vec3::X),
            (IVec3::new(2, 3, 3), Vec3::NEG_X),
        ]);
        compute_divergence(&mut grid);
        let div = grid.get(IVec3::new(3, 3, 3)).unwrap().divergence;
        assert!((div - 10.0).abs() < 1e-4, "div {}", div);
    }

    #[test]
    fn test_solid_neighbour_blocks_flow() {
        // Falling column resting on a solid cell compresses at the bottom
        let mut grid = grid_with_fluid(&[
            (IVec3::new(3, 3, 3), Vec3::new(0.0, -1.0, 0.0)),
            (IVec3::new(3, 4, 3), Vec3::new(0.0, -1.0, 0.0)),
        ]);
        if let Some(c) = grid.touch(IVec3::new(3, 2, 3)) {
            c.marker = CellMarker::Solid;
        }
        compute_divergence(&mut grid);
        assert!(grid.get(IVec3::new(3, 3, 3)).unwrap().divergence < 0.0);

        solve_pressure_jacobi(&mut grid, 1000.0, 0.01, 20);
        assert!(grid.get(IVec3::new(3, 3, 3)).unwrap().pressure > 0.0);

        apply_pressure_gradient(&mut grid, 1000.0, 0.01);
        // Pressure pushes the bottom cell back up
        assert!(grid.get(IVec3::new(3, 3, 3)).unwrap().velocity.y > -1.0);
    }

    #[test]
    fn test_projection_reduces_divergence() {
        let mut cells = Vec::new();
        for x in 1..7 {
            for y in 1..4 {
                for z in 1..7 {
                    cells.push((IVec3::new(x, y, z), Vec3::new(0.0, -1.0, 0.0)));
                }
            }
        }
        let mut grid = grid_with_fluid(&cells);
        for x in 0..8 {
            for z in 0..8 {
                if let Some(c) = grid.touch(IVec3::new(x, 0, z)) {
                    c.marker = CellMarker::Solid;
                }
            }
        }
        let before = project(&mut grid, 1000.0, 0.01, 50);
        let after = compute_divergence(&mut grid);
        assert!(after < before, "before {} after {}", before, after);
    }

    #[test]
    fn test_empty_grid_is_noop() {
        let mut grid = grid_with_fluid(&[]);
        assert_eq!(project(&mut grid, 1000.0, 0.01, 10), 0.0);
        assert_eq!(fluid_cell_count(&grid), 0);
    }
}
