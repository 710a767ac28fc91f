//! Sparse collocated grid for the FLIP solver.
//!
//! Velocity, pressure and marker all live at cell centres
//! (`origin + (i + 0.5) * dx`). Cells exist only once a particle touches them
//! and the whole grid is rebuilt every substep; nothing carries over.

use glam::{IVec3, Vec3};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::config::FlipGridConfig;
use crate::error::FluidResult;
use crate::spatial_hash::{pack_cell_key, unpack_cell_key};

/// Cell classification for pressure solve.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub enum CellMarker {
    /// Solid obstacle (no flow)
    Solid,
    /// Touched by at least one particle
    Fluid,
    /// Empty air
    #[default]
    Air,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct GridCell {
    /// Particles whose position lies inside this cell
    pub particles: Vec<usize>,
    pub velocity: Vec3,
    pub pressure: f32,
    pub marker: CellMarker,
    /// Sum of scatter weights, used to normalise `velocity`
    pub weight: f32,
    /// Central-difference divergence from the last projection
    pub divergence: f32,
}

/// What a pressure stencil sees in a neighbouring slot.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Neighbor<'a> {
    /// Marked solid, or outside the grid resolution
    Solid,
    /// Missing or air: free surface with zero pressure
    Air,
    Fluid(&'a GridCell),
}

/// The six face neighbours.
pub const FACE_OFFSETS: [IVec3; 6] = [
    IVec3::new(1, 0, 0),
    IVec3::new(-1, 0, 0),
    IVec3::new(0, 1, 0),
    IVec3::new(0, -1, 0),
    IVec3::new(0, 0, 1),
    IVec3::new(0, 0, -1),
];

#[derive(Clone, Debug)]
pub struct FlipGrid {
    config: FlipGridConfig,
    inv_cell_size: f32,
    cells: FxHashMap<u64, GridCell>,
}

impl FlipGrid {
    pub fn new(config: FlipGridConfig) -> FluidResult<Self> {
        config.validate()?;
        Ok(Self {
            inv_cell_size: 1.0 / config.cell_size,
            config,
            cells: FxHashMap::default(),
        })
    }

    pub fn config(&self) -> &FlipGridConfig {
        &self.config
    }

    pub fn cell_size(&self) -> f32 {
        self.config.cell_size
    }

    pub fn origin(&self) -> Vec3 {
        self.config.origin
    }

    /// Drop every cell.
    pub fn clear(&mut self) {
        self.cells.clear();
    }

    /// Number of allocated cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn count(&self, marker: CellMarker) -> usize {
        self.cells.values().filter(|c| c.marker == marker).count()
    }

    /// Cell containing `pos` (may lie outside the resolution).
    #[inline]
    pub fn world_to_cell(&self, pos: Vec3) -> IVec3 {
        let scaled = ((pos - self.config.origin) * self.inv_cell_size).floor();
        IVec3::new(scaled.x as i32, scaled.y as i32, scaled.z as i32)
    }

    #[inline]
    pub fn cell_center(&self, cell: IVec3) -> Vec3 {
        self.config.origin + (cell.as_vec3() + Vec3::splat(0.5)) * self.config.cell_size
    }

    #[inline]
    pub fn in_bounds(&self, cell: IVec3) -> bool {
        cell.cmpge(IVec3::ZERO).all() && cell.as_uvec3().cmplt(self.config.resolution).all()
    }

    pub fn get(&self, cell: IVec3) -> Option<&GridCell> {
        if !self.in_bounds(cell) {
            return None;
        }
        self.cells.get(&pack_cell_key(cell))
    }

    pub fn get_mut(&mut self, cell: IVec3) -> Option<&mut GridCell> {
        if !self.in_bounds(cell) {
            return None;
        }
        self.cells.get_mut(&pack_cell_key(cell))
    }

    /// The cell at `cell`, created empty on first touch. `None` outside the
    /// resolution.
    pub fn touch(&mut self, cell: IVec3) -> Option<&mut GridCell> {
        if !self.in_bounds(cell) {
            return None;
        }
        Some(self.cells.entry(pack_cell_key(cell)).or_default())
    }

    pub fn neighbor(&self, cell: IVec3) -> Neighbor<'_> {
        if !self.in_bounds(cell) {
            return Neighbor::Solid;
        }
        match self.cells.get(&pack_cell_key(cell)) {
            Some(c) if c.marker == CellMarker::Solid => Neighbor::Solid,
            Some(c) if c.marker == CellMarker::Fluid => Neighbor::Fluid(c),
            _ => Neighbor::Air,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (IVec3, &GridCell)> {
        self.cells.iter().map(|(&k, c)| (unpack_cell_key(k), c))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (IVec3, &mut GridCell)> {
        self.cells.iter_mut().map(|(&k, c)| (unpack_cell_key(k), c))
    }

    /// Coordinates of every fluid cell.
    pub fn fluid_cells(&self) -> Vec<IVec3> {
        self.iter()
            .filter(|(_, c)| c.marker == CellMarker::Fluid)
            .map(|(k, _)| k)
            .collect()
    }

    /// Apply gravity to fluid cells only.
    pub fn apply_gravity(&mut self, gravity: Vec3, dt: f32) {
        for cell in self.cells.values_mut() {
            if cell.marker == CellMarker::Fluid {
                cell.velocity += gravity * dt;
            }
        }
    }

    /// Mark cells whose centre lies in a solid region and zero their velocity.
    pub fn mark_solids(&mut self, is_solid: impl Fn(Vec3) -> bool) {
        let origin = self.config.origin;
        let dx = self.config.cell_size;
        for (&key, cell) in self.cells.iter_mut() {
            let center = origin + (unpack_cell_key(key).as_vec3() + Vec3::splat(0.5)) * dx;
            if is_solid(center) {
                cell.marker = CellMarker::Solid;
                cell.velocity = Vec3::ZERO;
                cell.pressure = 0.0;
            }
        }
    }
}
