//! Uniform-cell spatial hash for neighbour queries.
//!
//! Cells are keyed by a packed 64-bit integer. The hash is rebuilt from
//! scratch every substep (`clear` + `insert`); there is no removal API.
//! Queries return a superset of the true neighbourhood and callers filter by
//! exact distance.

use glam::{IVec3, Vec3};
use rustc_hash::FxHashMap;

use crate::error::{FluidError, FluidResult};
use crate::particle::FluidParticle;

/// Bits per axis in a packed cell key.
const KEY_BITS: u32 = 21;
/// Cell coordinates are clamped to `[-KEY_OFFSET, KEY_OFFSET - 1]`.
const KEY_OFFSET: i32 = 1 << (KEY_BITS - 1);
const KEY_MASK: u64 = (1 << KEY_BITS) - 1;

/// Pack a cell coordinate into one `u64`.
///
/// Coordinates beyond ±2²⁰ are clamped, so very distant particles share
/// boundary cells. That only ever adds candidates.
#[inline]
pub fn pack_cell_key(cell: IVec3) -> u64 {
    let pack = |c: i32| (c.clamp(-KEY_OFFSET, KEY_OFFSET - 1) + KEY_OFFSET) as u64 & KEY_MASK;
    (pack(cell.x) << (2 * KEY_BITS)) | (pack(cell.y) << KEY_BITS) | pack(cell.z)
}

/// Inverse of [`pack_cell_key`] for coordinates inside the key range.
#[inline]
pub fn unpack_cell_key(key: u64) -> IVec3 {
    let unpack = |bits: u64| (bits & KEY_MASK) as i32 - KEY_OFFSET;
    IVec3::new(
        unpack(key >> (2 * KEY_BITS)),
        unpack(key >> KEY_BITS),
        unpack(key),
    )
}

#[derive(Clone, Debug)]
pub struct SpatialHashGrid {
    cell_size: f32,
    inv_cell_size: f32,
    cells: FxHashMap<u64, Vec<usize>>,
    entries: usize,
}

impl SpatialHashGrid {
    pub fn new(cell_size: f32) -> FluidResult<Self> {
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(FluidError::config(
                "cell_size",
                format!("must be positive and finite, got {}", cell_size),
            ));
        }
        Ok(Self {
            cell_size,
            inv_cell_size: 1.0 / cell_size,
            cells: FxHashMap::default(),
            entries: 0,
        })
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Cell containing `pos`: `floor(pos / cell_size)`.
    #[inline]
    pub fn cell_coord(&self, pos: Vec3) -> IVec3 {
        let scaled = (pos * self.inv_cell_size).floor();
        // Float→int casts saturate (NaN → 0); clamp to the packable range.
        IVec3::new(scaled.x as i32, scaled.y as i32, scaled.z as i32)
            .clamp(IVec3::splat(-KEY_OFFSET), IVec3::splat(KEY_OFFSET - 1))
    }

    pub fn insert(&mut self, id: usize, pos: Vec3) {
        let key = pack_cell_key(self.cell_coord(pos));
        self.cells.entry(key).or_default().push(id);
        self.entries += 1;
    }

    pub fn clear(&mut self) {
        self.cells.clear();
        self.entries = 0;
    }

    /// Number of inserted ids.
    pub fn len(&self) -> usize {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    /// Number of non-empty buckets.
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Ids in every cell within `ceil(radius / cell_size)` Chebyshev distance
    /// of the cell containing `pos`.
    pub fn get_neighbors(&self, pos: Vec3, radius: f32) -> Vec<usize> {
        let mut out = Vec::new();
        self.query_into(pos, radius, &mut out);
        out
    }

    /// Allocation-reusing form of [`get_neighbors`](Self::get_neighbors).
    /// Clears `out` first.
    pub fn query_into(&self, pos: Vec3, radius: f32, out: &mut Vec<usize>) {
        out.clear();
        if !(radius >= 0.0) || self.cells.is_empty() {
            return;
        }
        let reach = (radius * self.inv_cell_size).ceil().min(KEY_OFFSET as f32) as i32;
        let center = self.cell_coord(pos);
        let lo = (center - IVec3::splat(reach)).max(IVec3::splat(-KEY_OFFSET));
        let hi = (center + IVec3::splat(reach)).min(IVec3::splat(KEY_OFFSET - 1));

        // Very large radii cover more cells than exist; walk the buckets instead.
        let span = (hi - lo + IVec3::ONE).as_i64vec3();
        let scanned = span.x.saturating_mul(span.y).saturating_mul(span.z);
        if scanned > self.cells.len() as i64 {
            for (&key, ids) in &self.cells {
                let cell = unpack_cell_key(key);
                if cell.cmpge(lo).all() && cell.cmple(hi).all() {
                    out.extend_from_slice(ids);
                }
            }
            return;
        }

        for z in lo.z..=hi.z {
            for y in lo.y..=hi.y {
                for x in lo.x..=hi.x {
                    if let Some(ids) = self.cells.get(&pack_cell_key(IVec3::new(x, y, z))) {
                        out.extend_from_slice(ids);
                    }
                }
            }
        }
    }

    /// Rebuild from `particles` and store, for each particle, the indices of
    /// the other particles strictly within `radius`.
    pub fn rebuild_neighbors(&mut self, particles: &mut [FluidParticle], radius: f32) {
        self.clear();
        for (i, p) in particles.iter().enumerate() {
            self.insert(i, p.position);
        }

        let positions: Vec<Vec3> = particles.iter().map(|p| p.position).collect();
        let radius_sq = radius * radius;
        let mut candidates = Vec::new();
        for (i, p) in particles.iter_mut().enumerate() {
            self.query_into(positions[i], radius, &mut candidates);
            p.neighbors.clear();
            p.neighbors.extend(candidates.iter().copied().filter(|&j| {
                j != i && positions[i].distance_squared(positions[j]) < radius_sq
            }));
        }
    }
}
