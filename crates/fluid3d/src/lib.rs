//! 3D Particle Fluid Simulation
//!
//! Three independent particle solvers sharing kernel math and neighbour
//! search, plus a Marching Cubes surface extractor:
//!
//! - [`SphSolver`]: weakly compressible SPH with a Tait equation of state
//! - [`PbfSolver`]: Position Based Fluids (density constraint projection)
//! - [`FlipSolver`]: hybrid FLIP/PIC on a sparse collocated grid
//! - [`SurfaceReconstructor`]: iso surface of a particle cloud
//!
//! Solvers are plain owned values. Run as many as you like side by side.
//!
//! # Example
//!
//! ```
//! use fluid3d::{FluidBoundary, FluidConfigPatch, FluidSolver, SphSolver, Vec3};
//!
//! let mut sph = SphSolver::new(FluidConfigPatch {
//!     particle_count: Some(500),
//!     seed: Some(7),
//!     ..Default::default()
//! })
//! .unwrap();
//! sph.add_boundary(FluidBoundary::floor(0.0)).unwrap();
//! sph.initialize_box(Vec3::ZERO, Vec3::splat(0.2), None).unwrap();
//!
//! // One 60 Hz frame, split into fixed substeps
//! sph.simulate(1.0 / 60.0);
//!
//! let positions = sph.particle_positions();
//! assert_eq!(positions.len(), sph.particle_count() * 3);
//! ```

pub mod advection;
pub mod boundary;
pub mod config;
pub mod constants;
pub mod error;
pub mod flip;
pub mod grid;
pub mod kernels;
pub mod mc_tables;
pub mod particle;
pub mod pbf;
pub mod pressure;
pub mod serde_utils;
pub mod solver;
pub mod spatial_hash;
pub mod sph;
pub mod surface;
pub mod transfer;

pub use boundary::{Boundaries, BoundaryShape, FluidBoundary};
pub use config::{FlipGridConfig, FluidConfig, FluidConfigPatch, PbfTuning};
pub use error::{FluidError, FluidResult};
pub use flip::FlipSolver;
pub use glam;
pub use glam::{IVec3, Mat3, UVec3, Vec3};
pub use grid::{CellMarker, FlipGrid, GridCell};
pub use kernels::SphKernels;
pub use particle::{FluidParticle, Particles};
pub use pbf::PbfSolver;
pub use solver::{FluidSolver, SubstepPlan};
pub use spatial_hash::SpatialHashGrid;
pub use sph::SphSolver;
pub use surface::{SurfaceMesh, SurfaceReconstructor, SurfaceVertex};
