//! Physical constants and per-solver defaults.
//!
//! ## Density Conventions
//!
//! Densities are absolute (kg/m³). SPH and PBF particles carry a mass so that
//! `Σ mⱼ W(rᵢⱼ)` lands on `rest_density` for a particle inside a packed
//! lattice. FLIP particles carry a nominal mass only; the FLIP pressure solve
//! works on grid velocities and uses `rest_density` as the fluid density.

use glam::Vec3;

/// Gravity acceleration (m/s^2) - negative Y direction
pub const GRAVITY: f32 = -9.81;

/// Gravity as a vector.
pub const GRAVITY_VEC: Vec3 = Vec3::new(0.0, GRAVITY, 0.0);

/// Density of water (kg/m³)
pub const WATER_DENSITY: f32 = 1000.0;

/// Surface tension of water at 20°C (N/m)
pub const WATER_SURFACE_TENSION: f32 = 0.0728;

/// Default particle colour [R, G, B, A]
pub const WATER_COLOR: [f32; 4] = [0.2, 0.5, 1.0, 1.0];

/// Below this distance two particles are treated as coincident and kernel
/// gradients evaluate to zero.
pub const MIN_KERNEL_DISTANCE: f32 = 1e-4;

/// Upper bound on substeps taken by a single `simulate()` call.
pub const DEFAULT_MAX_SUBSTEPS: usize = 256;

/// Lattice jitter as a fraction of particle spacing.
pub const LATTICE_JITTER: f32 = 0.1;

// =============================================================================
// SPH
// =============================================================================

/// Tait equation-of-state exponent for water.
pub const TAIT_GAMMA: i32 = 7;

/// Colour-field normals shorter than this do not receive surface tension.
pub const SURFACE_NORMAL_THRESHOLD: f32 = 1e-3;

// =============================================================================
// PBF
// =============================================================================

/// Strength `k` of the artificial-pressure (tensile instability) term.
pub const PBF_ARTIFICIAL_PRESSURE_K: f32 = 1e-4;

/// Exponent `n` of the artificial-pressure term.
pub const PBF_ARTIFICIAL_PRESSURE_N: i32 = 4;

/// Reference distance Δq of the artificial-pressure term, as a fraction of h.
pub const PBF_ARTIFICIAL_PRESSURE_DQ: f32 = 0.1;

/// Vorticity confinement strength.
pub const PBF_VORTICITY_EPSILON: f32 = 0.01;

/// Vorticity magnitudes below this are left alone.
pub const PBF_MIN_VORTICITY: f32 = 1e-4;

// =============================================================================
// FLIP
// =============================================================================

/// FLIP/PIC blend ratio (0.95 = 95% particle velocity, 5% grid velocity)
pub const FLIP_RATIO: f32 = 0.95;

/// Default grid resolution per axis.
pub const FLIP_GRID_RESOLUTION: u32 = 64;

/// Default grid origin (minimum corner).
pub const FLIP_GRID_ORIGIN: Vec3 = Vec3::splat(-1.0);

/// Default grid extent along each axis.
pub const FLIP_GRID_EXTENT: f32 = 2.0;

/// Nominal mass of a FLIP particle.
pub const FLIP_PARTICLE_MASS: f32 = 0.01;

/// Trilinear weights below this are not scattered.
pub const FLIP_MIN_WEIGHT: f32 = 1e-4;

/// Lattice spacing of `FlipSolver::initialize_box`, in particle radii.
pub const FLIP_SPACING_RADII: f32 = 1.5;

// =============================================================================
// SURFACE
// =============================================================================

/// Iso value of the reconstructed surface.
pub const DEFAULT_ISO_VALUE: f32 = 0.5;

/// Interpolation denominators below this fall back to fixed parameters.
pub const ISO_EPSILON: f32 = 1e-4;
