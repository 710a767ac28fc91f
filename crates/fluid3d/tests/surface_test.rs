//! Surface reconstruction tests
//!
//! Meshes extracted from small particle sets must be closed: every edge is
//! shared by exactly two triangles.

use std::collections::HashMap;

use fluid3d::{FluidParticle, SurfaceMesh, SurfaceReconstructor, Vec3};

fn particles(positions: &[Vec3]) -> Vec<FluidParticle> {
    positions
        .iter()
        .enumerate()
        .map(|(id, &p)| FluidParticle::new(id, p, 1.0, 1000.0))
        .collect()
}

type VertexKey = [u32; 3];

fn key(v: Vec3) -> VertexKey {
    [v.x.to_bits(), v.y.to_bits(), v.z.to_bits()]
}

/// Number of triangles using each undirected edge.
fn edge_uses(mesh: &SurfaceMesh) -> HashMap<(VertexKey, VertexKey), usize> {
    let mut uses = HashMap::new();
    for tri in mesh.vertices().chunks_exact(3) {
        for (a, b) in [(0, 1), (1, 2), (2, 0)] {
            let (ka, kb) = (key(tri[a].position), key(tri[b].position));
            let edge = if ka < kb { (ka, kb) } else { (kb, ka) };
            *uses.entry(edge).or_insert(0) += 1;
        }
    }
    uses
}

fn assert_closed(mesh: &SurfaceMesh) {
    let uses = edge_uses(mesh);
    assert!(!uses.is_empty());
    for (edge, n) in uses {
        assert_eq!(n, 2, "edge {:?} used {} times", edge, n);
    }
}

/// Test that a lone particle yields a closed blob
#[test]
fn test_single_particle_mesh_is_closed() {
    let mut reconstructor =
        SurfaceReconstructor::new(20, Vec3::splat(-1.0), Vec3::splat(1.0), 0.5).unwrap();
    let mesh = reconstructor.reconstruct_surface(&particles(&[Vec3::new(0.03, -0.02, 0.01)]));
    assert_eq!(mesh.triangle_count(), 600);
    assert_closed(&mesh);
}

/// Test that two overlapping particles merge into one closed surface on a
/// non-cubic grid
#[test]
fn test_merged_pair_mesh_is_closed() {
    let cloud = particles(&[Vec3::new(-0.12, 0.01, 0.02), Vec3::new(0.13, -0.01, 0.0)]);
    let mut reconstructor = SurfaceReconstructor::new(
        24,
        Vec3::new(-0.8, -0.6, -0.6),
        Vec3::new(0.8, 0.6, 0.6),
        0.3,
    )
    .unwrap();
    let mesh = reconstructor.reconstruct_surface(&cloud);
    assert_eq!(mesh.positions.len(), mesh.triangle_count() * 9);
    assert_closed(&mesh);

    // The bridge between the two particles is covered
    let midpoint = Vec3::new(0.005, 0.0, 0.01);
    assert!(reconstructor.sample_field(midpoint, &cloud) > reconstructor.iso_value());
    for v in mesh.vertices() {
        assert!(v.position.cmpge(Vec3::new(-0.8, -0.6, -0.6)).all());
        assert!(v.position.cmple(Vec3::new(0.8, 0.6, 0.6)).all());
    }
}

/// Test that the reconstructor can be reused across frames
#[test]
fn test_reconstruction_is_repeatable() {
    let mut reconstructor =
        SurfaceReconstructor::new(16, Vec3::splat(-0.5), Vec3::splat(0.5), 0.25).unwrap();
    let first = reconstructor.reconstruct_surface(&particles(&[Vec3::ZERO]));
    let moved = reconstructor.reconstruct_surface(&particles(&[Vec3::new(0.1, 0.0, 0.0)]));
    let again = reconstructor.reconstruct_surface(&particles(&[Vec3::ZERO]));
    assert_eq!(first, again);
    assert_ne!(first, moved);
}

/// Test that a particle outside the bounds leaves no surface inside them
#[test]
fn test_far_particle_produces_nothing() {
    let mut reconstructor =
        SurfaceReconstructor::new(8, Vec3::ZERO, Vec3::ONE, 0.2).unwrap();
    let mesh = reconstructor.reconstruct_surface(&particles(&[Vec3::splat(5.0)]));
    assert!(mesh.is_empty());
}

/// Test that raising the iso value tightens the blob around a particle
#[test]
fn test_iso_value_sets_blob_radius() {
    let center = Vec3::new(0.03, -0.02, 0.01);
    let mut reconstructor =
        SurfaceReconstructor::new(20, Vec3::splat(-1.0), Vec3::splat(1.0), 0.5)
            .unwrap()
            .with_iso_value(0.75);
    assert_eq!(reconstructor.iso_value(), 0.75);

    let mesh = reconstructor.reconstruct_surface(&particles(&[center]));
    assert_closed(&mesh);

    // 1 - q³ = 0.75 at q = ∛0.25
    let expected = 0.5 * 0.25f32.cbrt();
    for v in mesh.vertices() {
        let d = v.position.distance(center);
        assert!((d - expected).abs() < 0.04, "vertex at distance {}", d);
    }
}
