//! Particle-Grid transfer functions for FLIP.
//!
//! P2G: scatter particle velocities to the 27 cells around each particle with
//! tent (trilinear) weights, normalised per cell by the weight sum.
//! G2P: gather the trilinear-weighted velocity of nearby fluid cells (PIC)
//! and blend it with the particle's own velocity (FLIP).

use glam::{IVec3, Vec3};

use crate::constants::FLIP_MIN_WEIGHT;
use crate::grid::{CellMarker, FlipGrid};
use crate::particle::FluidParticle;

/// Tent weight `Π (1 - |d|/dx)` of a cell centre seen from `pos`.
#[inline]
pub fn trilinear_weight(pos: Vec3, center: Vec3, inv_cell_size: f32) -> f32 {
    let d = ((pos - center) * inv_cell_size).abs();
    (1.0 - d.x).max(0.0) * (1.0 - d.y).max(0.0) * (1.0 - d.z).max(0.0)
}

/// Visit every in-bounds cell of the 3x3x3 stencil around `pos` whose weight
/// reaches `FLIP_MIN_WEIGHT`.
fn for_each_stencil_cell(grid: &FlipGrid, pos: Vec3, mut f: impl FnMut(IVec3, f32)) {
    let base = grid.world_to_cell(pos);
    let inv_dx = 1.0 / grid.cell_size();
    for dk in -1..=1 {
        for dj in -1..=1 {
            for di in -1..=1 {
                let cell = base + IVec3::new(di, dj, dk);
                if !grid.in_bounds(cell) {
                    continue;
                }
                let w = trilinear_weight(pos, grid.cell_center(cell), inv_dx);
                if w >= FLIP_MIN_WEIGHT {
                    f(cell, w);
                }
            }
        }
    }
}

/// Rebuild `grid` from `particles` (P2G).
///
/// Touched cells are marked fluid. Each particle is also recorded as a member
/// of the cell containing it.
pub fn particles_to_grid(grid: &mut FlipGrid, particles: &[FluidParticle]) {
    grid.clear();

    let mut touched = Vec::with_capacity(27);
    for (id, p) in particles.iter().enumerate() {
        touched.clear();
        for_each_stencil_cell(grid, p.position, |cell, w| touched.push((cell, w)));
        for &(cell, w) in &touched {
            if let Some(c) = grid.touch(cell) {
                c.velocity += p.velocity * w;
                c.weight += w;
            }
        }
        if let Some(c) = grid.get_mut(grid.world_to_cell(p.position)) {
            c.particles.push(id);
        }
    }

    for (_, cell) in grid.iter_mut() {
        if cell.weight > 0.0 {
            cell.velocity /= cell.weight;
        }
        cell.marker = CellMarker::Fluid;
    }
}

/// Trilinear-weighted velocity of the fluid cells around `pos`, or `None`
/// when no fluid cell is in reach.
pub fn sample_fluid_velocity(grid: &FlipGrid, pos: Vec3) -> Option<Vec3> {
    let mut sum = Vec3::ZERO;
    let mut weight = 0.0;
    for_each_stencil_cell(grid, pos, |cell, w| {
        if let Some(c) = grid.get(cell) {
            if c.marker == CellMarker::Fluid {
                sum += c.velocity * w;
                weight += w;
            }
        }
    });
    (weight > 0.0).then(|| sum / weight)
}

/// Transfer grid velocities back to particles (G2P).
///
/// `v = pic * (1 - flip_ratio) + v_particle * flip_ratio`. A particle with no
/// fluid cell in reach keeps its velocity.
pub fn grid_to_particles(grid: &FlipGrid, particles: &mut [FluidParticle], flip_ratio: f32) {
    for p in particles.iter_mut() {
        if let Some(pic) = sample_fluid_velocity(grid, p.position) {
            p.velocity = pic * (1.0 - flip_ratio) + p.velocity * flip_ratio;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FlipGridConfig;
    use glam::UVec3;

    fn grid() -> FlipGrid {
        FlipGrid::new(FlipGridConfig {
            resolution: UVec3::splat(8),
            origin: Vec3::ZERO,
            cell_size: 0.5,
        })
        .unwrap()
    }

    fn particle(position: Vec3, velocity: Vec3) -> FluidParticle {
        let mut p = FluidParticle::new(0, position, 0.01, 1000.0);
        p.velocity = velocity;
        p
    }

    #[test]
    fn test_weight_at_center_and_edge() {
        assert_eq!(trilinear_weight(Vec3::ONE, Vec3::ONE, 2.0), 1.0);
        assert_eq!(trilinear_weight(Vec3::new(1.5, 1.0, 1.0), Vec3::ONE, 2.0), 0.0);
        let w = trilinear_weight(Vec3::new(1.25, 1.0, 1.0), Vec3::ONE, 2.0);
        assert!((w - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_weights_partition_unity() {
        let g = grid();
        for pos in [Vec3::splat(2.0), Vec3::new(1.3, 2.6, 1.9), Vec3::new(2.11, 1.74, 2.49)] {
            let mut total = 0.0;
            for_each_stencil_cell(&g, pos, |_, w| total += w);
            assert!((total - 1.0).abs() < 1e-3, "sum {} at {}", total, pos);
        }
    }

    #[test]
    fn test_p2g_marks_fluid_and_normalises() {
        let mut g = grid();
        let particles = vec![particle(Vec3::new(2.1, 2.2, 2.3), Vec3::new(1.0, 2.0, 3.0))];
        particles_to_grid(&mut g, &particles);
        assert!(!g.is_empty());
        for (_, cell) in g.iter() {
            assert_eq!(cell.marker, CellMarker::Fluid);
            // One contributor: normalisation restores its velocity exactly
            assert!((cell.velocity - Vec3::new(1.0, 2.0, 3.0)).length() < 1e-5);
        }
        let home = g.get(g.world_to_cell(Vec3::new(2.1, 2.2, 2.3))).unwrap();
        assert_eq!(home.particles, vec![0]);
    }

    #[test]
    fn test_p2g_skips_out_of_bounds_cells() {
        let mut g = grid();
        let particles = vec![particle(Vec3::splat(0.1), Vec3::X)];
        particles_to_grid(&mut g, &particles);
        for (cell, _) in g.iter() {
            assert!(cell.cmpge(IVec3::ZERO).all());
        }
    }

    #[test]
    fn test_g2p_pure_pic_matches_sample() {
        let mut g = grid();
        let mut particles = vec![
            particle(Vec3::new(2.0, 2.0, 2.0), Vec3::new(1.0, 0.0, 0.0)),
            particle(Vec3::new(2.4, 2.1, 2.0), Vec3::new(0.0, -1.0, 0.5)),
        ];
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

    #[test]
    fn test_g2p_pure_flip_keeps_velocity() {
        let mut g = grid();
        let mut particles = vec![particle(Vec3::splat(2.0), Vec3::new(0.3, -0.2, 0.1))];
        particles_to_grid(&mut g, &particles);
        g.apply_gravity(Vec3::new(0.0, -9.81, 0.0), 0.1);
        grid_to_particles(&g, &mut particles, 1.0);
        assert_eq!(particles[0].velocity, Vec3::new(0.3, -0.2, 0.1));
    }

    #[test]
    fn test_g2p_without_fluid_keeps_velocity() {
        let g = grid();
        let mut particles = vec![particle(Vec3::splat(2.0), Vec3::new(0.3, -0.2, 0.1))];
        grid_to_particles(&g, &mut particles, 0.0);
        assert_eq!(particles[0].velocity, Vec3::new(0.3, -0.2, 0.1));
    }
}
