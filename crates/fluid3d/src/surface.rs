//! Isosurface extraction from a particle cloud.
//!
//! The particles define a scalar field `Σ (1 - q³)` with `q = dist / R` over
//! every particle closer than `R`. The field is sampled at the corners of a
//! uniform grid over the reconstruction bounds, then Marching Cubes emits a
//! triangle soup with one flat normal per triangle.

use glam::{UVec3, Vec3};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_ISO_VALUE, ISO_EPSILON};
use crate::error::{check_bounds, FluidError, FluidResult};
use crate::mc_tables::{CORNER_OFFSETS, EDGE_CORNERS, EDGE_TABLE, TRI_TABLE};
use crate::particle::FluidParticle;
use crate::serde_utils;
use crate::spatial_hash::SpatialHashGrid;

/// One output vertex.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SurfaceVertex {
    #[serde(with = "serde_utils::vec3")]
    pub position: Vec3,
    #[serde(with = "serde_utils::vec3")]
    pub normal: Vec3,
}

/// Triangle soup ready for upload: three vertices per triangle, flattened
/// xyz, with the triangle's normal repeated on each of its vertices.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SurfaceMesh {
    pub positions: Vec<f32>,
    pub normals: Vec<f32>,
}

impl SurfaceMesh {
    pub fn triangle_count(&self) -> usize {
        self.positions.len() / 9
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn vertices(&self) -> Vec<SurfaceVertex> {
        self.positions
            .chunks_exact(3)
            .zip(self.normals.chunks_exact(3))
            .map(|(p, n)| SurfaceVertex {
                position: Vec3::from_slice(p),
                normal: Vec3::from_slice(n),
            })
            .collect()
    }

    fn push_triangle(&mut self, tri: [Vec3; 3]) {
        let normal = (tri[1] - tri[0]).cross(tri[2] - tri[0]).normalize_or_zero();
        for v in tri {
            self.positions.extend_from_slice(&v.to_array());
            self.normals.extend_from_slice(&normal.to_array());
        }
    }
}

pub struct SurfaceReconstructor {
    /// Cells per axis
    resolution: usize,
    bounds_min: Vec3,
    bounds_max: Vec3,
    cell_size: Vec3,
    smoothing_radius: f32,
    iso_value: f32,
    hash: SpatialHashGrid,
    /// Field samples at the `(resolution + 1)³` grid corners, x fastest
    field: Vec<f32>,
}

impl SurfaceReconstructor {
    pub fn new(
        resolution: usize,
        bounds_min: Vec3,
        bounds_max: Vec3,
        smoothing_radius: f32,
    ) -> FluidResult<Self> {
        if resolution == 0 {
            return Err(FluidError::config("resolution", "must be at least 1"));
        }
        check_bounds(bounds_min, bounds_max)?;
        let hash = SpatialHashGrid::new(smoothing_radius).map_err(|_| {
            FluidError::config(
                "smoothing_radius",
                format!("must be positive and finite, got {}", smoothing_radius),
            )
        })?;
        Ok(Self {
            resolution,
            bounds_min,
            bounds_max,
            cell_size: (bounds_max - bounds_min) / resolution as f32,
            smoothing_radius,
            iso_value: DEFAULT_ISO_VALUE,
            hash,
            field: Vec::new(),
        })
    }

    pub fn with_iso_value(mut self, iso_value: f32) -> Self {
        self.iso_value = iso_value;
        self
    }

    pub fn iso_value(&self) -> f32 {
        self.iso_value
    }

    pub fn resolution(&self) -> usize {
        self.resolution
    }

    pub fn bounds(&self) -> (Vec3, Vec3) {
        (self.bounds_min, self.bounds_max)
    }

    /// Field value at `point`. One particle contributes `1 - (d/R)³` while
    /// closer than `R`, so a point on top of a particle gets exactly 1 from it.
    pub fn sample_field(&self, point: Vec3, particles: &[FluidParticle]) -> f32 {
        particles
            .iter()
            .map(|p| self.falloff(point.distance(p.position)))
            .sum()
    }

    #[inline]
    fn falloff(&self, dist: f32) -> f32 {
        if dist >= self.smoothing_radius {
            return 0.0;
        }
        let q = dist / self.smoothing_radius;
        1.0 - q * q * q
    }

    #[inline]
    fn corner_index(&self, i: usize, j: usize, k: usize) -> usize {
        let n = self.resolution + 1;
        i + n * (j + n * k)
    }

    #[inline]
    fn corner_position(&self, i: usize, j: usize, k: usize) -> Vec3 {
        self.bounds_min + Vec3::new(i as f32, j as f32, k as f32) * self.cell_size
    }

    fn sample_grid(&mut self, particles: &[FluidParticle]) {
        self.hash.clear();
        for (id, p) in particles.iter().enumerate() {
            self.hash.insert(id, p.position);
        }

        let n = self.resolution + 1;
        self.field.clear();
        self.field.resize(n * n * n, 0.0);
        if particles.is_empty() {
            return;
        }

        let mut candidates = Vec::new();
        for k in 0..n {
            for j in 0..n {
                for i in 0..n {
                    let point = self.corner_position(i, j, k);
                    self.hash
                        .query_into(point, self.smoothing_radius, &mut candidates);
                    let value: f32 = candidates
                        .iter()
                        .map(|&id| self.falloff(point.distance(particles[id].position)))
                        .sum();
                    let index = self.corner_index(i, j, k);
                    self.field[index] = value;
                }
            }
        }
    }

    /// Point on the edge between two grid corners where the field crosses
    /// the iso value. `a` must be the corner with the smaller index so both
    /// cells sharing an edge produce the same vertex.
    fn interpolate(&self, a: Vec3, va: f32, b: Vec3, vb: f32) -> Vec3 {
        let t = if (self.iso_value - va).abs() < ISO_EPSILON {
            0.0
        } else if (vb - va).abs() < ISO_EPSILON {
            0.5
        } else {
            (self.iso_value - va) / (vb - va)
        };
        a + (b - a) * t
    }

    /// Sample the field over the bounds and extract its iso surface.
    pub fn reconstruct_surface(&mut self, particles: &[FluidParticle]) -> SurfaceMesh {
        self.sample_grid(particles);

        let mut mesh = SurfaceMesh::default();
        if particles.is_empty() {
            return mesh;
        }

        let mut corners = [UVec3::ZERO; 8];
        let mut values = [0.0f32; 8];
        let mut edge_points = [Vec3::ZERO; 12];

        for k in 0..self.resolution {
            for j in 0..self.resolution {
                for i in 0..self.resolution {
                    let mut case = 0usize;
                    for (c, offset) in CORNER_OFFSETS.iter().enumerate() {
                        let corner = UVec3::new(
                            (i + offset[0]) as u32,
                            (j + offset[1]) as u32,
                            (k + offset[2]) as u32,
                        );
                        corners[c] = corner;
                        values[c] = self.field[self.corner_index(
                            corner.x as usize,
                            corner.y as usize,
                            corner.z as usize,
                        )];
                        if values[c] > self.iso_value {
                            case |= 1 << c;
                        }
                    }

                    let edges = EDGE_TABLE[case];
                    if edges == 0 {
                        continue;
                    }

                    for (e, &[c0, c1]) in EDGE_CORNERS.iter().enumerate() {
                        if edges & (1 << e) == 0 {
                            continue;
                        }
                        // Orient every edge low corner to high corner
                        let (lo, hi) = if corners[c0].element_sum() <= corners[c1].element_sum() {
                            (c0, c1)
                        } else {
                            (c1, c0)
                        };
                        let (a, b) = (corners[lo], corners[hi]);
                        edge_points[e] = self.interpolate(
                            self.corner_position(a.x as usize, a.y as usize, a.z as usize),
                            values[lo],
                            self.corner_position(b.x as usize, b.y as usize, b.z as usize),
                            values[hi],
                        );
                    }

                    for tri in TRI_TABLE[case].chunks_exact(3) {
                        if tri[0] < 0 {
                            break;
                        }
                        mesh.push_triangle([
                            edge_points[tri[0] as usize],
                            edge_points[tri[1] as usize],
                            edge_points[tri[2] as usize],
                        ]);
                    }
                }
            }
        }

        debug!(
            "surface: {} triangles from {} particles on a {}³ grid",
            mesh.triangle_count(),
            particles.len(),
            self.resolution
        );
        mesh
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn particle_at(position: Vec3) -> FluidParticle {
        FluidParticle::new(0, position, 1.0, 1000.0)
    }

    fn reconstructor() -> SurfaceReconstructor {
        SurfaceReconstructor::new(20, Vec3::splat(-1.0), Vec3::splat(1.0), 0.5).unwrap()
    }

    #[test]
    fn test_rejects_bad_arguments() {
        assert!(SurfaceReconstructor::new(0, Vec3::ZERO, Vec3::ONE, 0.1).is_err());
        assert!(SurfaceReconstructor::new(8, Vec3::ONE, Vec3::ZERO, 0.1).is_err());
        assert!(SurfaceReconstructor::new(8, Vec3::ZERO, Vec3::ONE, 0.0).is_err());
    }

    #[test]
    fn test_field_self_weight_and_support() {
        let r = reconstructor();
        let particles = vec![particle_at(Vec3::new(0.1, 0.2, 0.3))];
        assert_eq!(r.sample_field(Vec3::new(0.1, 0.2, 0.3), &particles), 1.0);
        assert_eq!(r.sample_field(Vec3::new(0.7, 0.2, 0.3), &particles), 0.0);
        let half = r.sample_field(Vec3::new(0.35, 0.2, 0.3), &particles);
        assert!((half - 0.875).abs() < 1e-5);
    }

    #[test]
    fn test_empty_cloud_gives_empty_mesh() {
        let mut r = reconstructor();
        let mesh = r.reconstruct_surface(&[]);
        assert!(mesh.is_empty());
        assert_eq!(mesh.triangle_count(), 0);
    }

    #[test]
    fn test_interpolation_fallbacks() {
        let r = reconstructor();
        let (a, b) = (Vec3::ZERO, Vec3::X);
        assert_eq!(r.interpolate(a, 0.5, b, 0.9), a);
        assert_eq!(r.interpolate(a, 0.7, b, 0.7), Vec3::new(0.5, 0.0, 0.0));
        let p = r.interpolate(a, 0.0, b, 1.0);
        assert!((p.x - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_single_particle_gives_outward_blob() {
        let mut r = reconstructor();
        let center = Vec3::new(0.03, -0.02, 0.01);
        let mesh = r.reconstruct_surface(&[particle_at(center)]);
        assert!(mesh.triangle_count() > 0);
        assert_eq!(mesh.normals.len(), mesh.positions.len());

        // 1 - q³ = 0.5 at q ≈ 0.794
        let expected = 0.5 * 0.5f32.cbrt();
        for v in mesh.vertices() {
            let d = v.position.distance(center);
            assert!((d - expected).abs() < 0.05, "vertex at distance {}", d);
        }
        for tri in mesh.vertices().chunks_exact(3) {
            let centroid = (tri[0].position + tri[1].position + tri[2].position) / 3.0;
            if tri[0].normal != Vec3::ZERO {
                assert!(tri[0].normal.dot(centroid - center) > 0.0);
                assert!((tri[0].normal.length() - 1.0).abs() < 1e-4);
            }
        }
    }
}
