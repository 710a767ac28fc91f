//! Property-based tests for neighbour search using proptest
//!
//! The spatial hash may return extra candidates but must never miss a
//! particle inside the query ball. Checked against brute force.

use fluid3d::{FluidParticle, SpatialHashGrid, Vec3};
use proptest::prelude::*;

const MAX_PARTICLES: usize = 200;
const DOMAIN: f32 = 2.0;

/// Positions inside a cube straddling the origin, so negative cell
/// coordinates are covered too.
fn valid_position() -> impl Strategy<Value = Vec3> {
    (
        -DOMAIN..DOMAIN,
        -DOMAIN..DOMAIN,
        -DOMAIN..DOMAIN,
    )
        .prop_map(|(x, y, z)| Vec3::new(x, y, z))
}

fn particle_set() -> impl Strategy<Value = Vec<Vec3>> {
    prop::collection::vec(valid_position(), 1..=MAX_PARTICLES)
}

fn brute_force(positions: &[Vec3], center: Vec3, radius: f32) -> Vec<usize> {
    positions
        .iter()
        .enumerate()
        .filter(|(_, p)| p.distance(center) <= radius)
        .map(|(i, _)| i)
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: every particle within the radius is among the candidates
    #[test]
    fn test_neighbors_superset_of_ball(
        positions in particle_set(),
        center in valid_position(),
        cell_size in 0.05f32..1.0,
        radius in 0.0f32..1.5,
    ) {
        let mut hash = SpatialHashGrid::new(cell_size).unwrap();
        for (i, &p) in positions.iter().enumerate() {
            hash.insert(i, p);
        }
        prop_assert_eq!(hash.len(), positions.len());

        let candidates = hash.get_neighbors(center, radius);
        for i in brute_force(&positions, center, radius) {
            prop_assert!(
                candidates.contains(&i),
                "particle {} at {:?} missing for query {:?} r={}", i, positions[i], center, radius
            );
        }
        // Each particle lives in exactly one bucket
        let mut sorted = candidates.clone();
        sorted.sort_unstable();
        sorted.dedup();
        prop_assert_eq!(sorted.len(), candidates.len());
    }

    /// Property: neighbour lists are exactly the other particles closer than h
    #[test]
    fn test_neighbor_lists_match_brute_force(
        positions in particle_set(),
        radius in 0.05f32..0.8,
    ) {
        let mut particles: Vec<FluidParticle> = positions
            .iter()
            .enumerate()
            .map(|(i, &p)| FluidParticle::new(i, p, 1.0, 1000.0))
            .collect();
        let mut hash = SpatialHashGrid::new(radius).unwrap();
        hash.rebuild_neighbors(&mut particles, radius);

        for (i, p) in particles.iter().enumerate() {
            let mut expected: Vec<usize> = (0..positions.len())
                .filter(|&j| j != i && positions[i].distance_squared(positions[j]) < radius * radius)
                .collect();
            let mut actual = p.neighbors.clone();
            expected.sort_unstable();
            actual.sort_unstable();
            prop_assert_eq!(actual, expected);
        }
    }
}
