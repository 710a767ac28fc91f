//! Solver configuration.
//!
//! `FluidConfig` is fully resolved. Callers usually build a
//! `FluidConfigPatch` with only the fields they care about and let the solver
//! merge it over its own defaults.

use std::path::Path;

use glam::{UVec3, Vec3};
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_MAX_SUBSTEPS, FLIP_GRID_EXTENT, FLIP_GRID_ORIGIN, FLIP_GRID_RESOLUTION, FLIP_RATIO,
    GRAVITY_VEC, PBF_ARTIFICIAL_PRESSURE_DQ, PBF_ARTIFICIAL_PRESSURE_K,
    PBF_ARTIFICIAL_PRESSURE_N, PBF_VORTICITY_EPSILON, WATER_DENSITY, WATER_SURFACE_TENSION,
};
use crate::error::{FluidError, FluidResult};
use crate::serde_utils;

/// Resolved parameters shared by all solvers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FluidConfig {
    /// Maximum number of particles `initialize_box` will create
    pub particle_count: usize,
    /// Particle radius; sets lattice spacing
    pub particle_radius: f32,
    /// Kernel support radius h
    pub smoothing_radius: f32,
    /// Rest density ρ₀ (kg/m³)
    pub rest_density: f32,
    /// SPH: viscosity coefficient μ. PBF: XSPH blend factor c.
    pub viscosity: f32,
    /// Surface tension coefficient σ (SPH only)
    pub surface_tension: f32,
    /// SPH: Tait stiffness. PBF: constraint relaxation ε. FLIP: unused.
    pub stiffness: f32,
    #[serde(with = "serde_utils::vec3")]
    pub gravity: Vec3,
    /// Target substep length (s)
    pub time_step: f32,
    /// PBF: constraint iterations. FLIP: pressure iterations.
    pub iterations: usize,
    /// Fraction of normal velocity kept (and reversed) on boundary contact
    pub boundary_damping: f32,
    /// Cap on substeps per `simulate()` call
    pub max_substeps: usize,
    /// Seed for lattice jitter; `None` draws from OS entropy
    pub seed: Option<u64>,
}

impl FluidConfig {
    /// Weakly-compressible SPH defaults.
    pub fn sph_defaults() -> Self {
        Self {
            particle_count: 5000,
            particle_radius: 0.02,
            smoothing_radius: 0.08,
            rest_density: WATER_DENSITY,
            viscosity: 0.001,
            surface_tension: WATER_SURFACE_TENSION,
            stiffness: 50.0,
            gravity: GRAVITY_VEC,
            time_step: 0.001,
            iterations: 2,
            boundary_damping: 0.3,
            max_substeps: DEFAULT_MAX_SUBSTEPS,
            seed: None,
        }
    }

    /// Position-based fluid defaults (120 Hz substeps).
    pub fn pbf_defaults() -> Self {
        Self {
            particle_count: 8000,
            particle_radius: 0.02,
            smoothing_radius: 0.1,
            rest_density: WATER_DENSITY,
            viscosity: 0.01,
            surface_tension: WATER_SURFACE_TENSION,
            stiffness: 100.0,
            gravity: GRAVITY_VEC,
            time_step: 0.0083,
            iterations: 4,
            boundary_damping: 0.3,
            max_substeps: DEFAULT_MAX_SUBSTEPS,
            seed: None,
        }
    }

    /// FLIP defaults.
    pub fn flip_defaults() -> Self {
        Self {
            particle_count: 10000,
            particle_radius: 0.01,
            smoothing_radius: 0.04,
            rest_density: WATER_DENSITY,
            viscosity: 0.001,
            surface_tension: 0.0,
            stiffness: 1.0,
            gravity: GRAVITY_VEC,
            time_step: 0.005,
            iterations: 50,
            boundary_damping: 0.5,
            max_substeps: DEFAULT_MAX_SUBSTEPS,
            seed: None,
        }
    }

    /// Reject parameters that would poison the kernel chain with NaN/inf.
    pub fn validate(&self) -> FluidResult<()> {
        positive("smoothing_radius", self.smoothing_radius)?;
        positive("rest_density", self.rest_density)?;
        positive("particle_radius", self.particle_radius)?;
        positive("time_step", self.time_step)?;
        non_negative("viscosity", self.viscosity)?;
        non_negative("surface_tension", self.surface_tension)?;
        non_negative("stiffness", self.stiffness)?;
        unit_interval("boundary_damping", self.boundary_damping)?;
        if !self.gravity.is_finite() {
            return Err(FluidError::config(
                "gravity",
                format!("must be finite, got {}", self.gravity),
            ));
        }
        if self.max_substeps == 0 {
            return Err(FluidError::config("max_substeps", "must be at least 1"));
        }
        Ok(())
    }

    /// Save configuration to JSON file
    pub fn save_json(&self, path: &Path) -> FluidResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load configuration from JSON file
    pub fn load_json(path: &Path) -> FluidResult<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }
}

/// Partial configuration; `None` fields fall back to the solver's defaults.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FluidConfigPatch {
    pub particle_count: Option<usize>,
    pub particle_radius: Option<f32>,
    pub smoothing_radius: Option<f32>,
    pub rest_density: Option<f32>,
    pub viscosity: Option<f32>,
    pub surface_tension: Option<f32>,
    pub stiffness: Option<f32>,
    #[serde(with = "serde_utils::option_vec3")]
    pub gravity: Option<Vec3>,
    pub time_step: Option<f32>,
    pub iterations: Option<usize>,
    pub boundary_damping: Option<f32>,
    pub max_substeps: Option<usize>,
    pub seed: Option<u64>,
}

impl FluidConfigPatch {
    /// Merge the set fields over `defaults`.
    pub fn apply(&self, defaults: FluidConfig) -> FluidConfig {
        FluidConfig {
            particle_count: self.particle_count.unwrap_or(defaults.particle_count),
            particle_radius: self.particle_radius.unwrap_or(defaults.particle_radius),
            smoothing_radius: self.smoothing_radius.unwrap_or(defaults.smoothing_radius),
            rest_density: self.rest_density.unwrap_or(defaults.rest_density),
            viscosity: self.viscosity.unwrap_or(defaults.viscosity),
            surface_tension: self.surface_tension.unwrap_or(defaults.surface_tension),
            stiffness: self.stiffness.unwrap_or(defaults.stiffness),
            gravity: self.gravity.unwrap_or(defaults.gravity),
            time_step: self.time_step.unwrap_or(defaults.time_step),
            iterations: self.iterations.unwrap_or(defaults.iterations),
            boundary_damping: self.boundary_damping.unwrap_or(defaults.boundary_damping),
            max_substeps: self.max_substeps.unwrap_or(defaults.max_substeps),
            seed: self.seed.or(defaults.seed),
        }
    }
}

/// PBF-only knobs that the shared config has no field for.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PbfTuning {
    /// Artificial pressure strength k
    pub artificial_pressure_k: f32,
    /// Artificial pressure exponent n
    pub artificial_pressure_n: i32,
    /// Artificial pressure reference distance Δq, as a fraction of h
    pub artificial_pressure_dq: f32,
    /// Vorticity confinement strength
    pub vorticity_epsilon: f32,
}

impl Default for PbfTuning {
    fn default() -> Self {
        Self {
            artificial_pressure_k: PBF_ARTIFICIAL_PRESSURE_K,
            artificial_pressure_n: PBF_ARTIFICIAL_PRESSURE_N,
            artificial_pressure_dq: PBF_ARTIFICIAL_PRESSURE_DQ,
            vorticity_epsilon: PBF_VORTICITY_EPSILON,
        }
    }
}

impl PbfTuning {
    pub fn validate(&self) -> FluidResult<()> {
        non_negative("artificial_pressure_k", self.artificial_pressure_k)?;
        non_negative("vorticity_epsilon", self.vorticity_epsilon)?;
        if self.artificial_pressure_n < 1 {
            return Err(FluidError::config(
                "artificial_pressure_n",
                format!("must be at least 1, got {}", self.artificial_pressure_n),
            ));
        }
        if !(self.artificial_pressure_dq > 0.0 && self.artificial_pressure_dq < 1.0) {
            return Err(FluidError::config(
                "artificial_pressure_dq",
                format!("must lie in (0, 1), got {}", self.artificial_pressure_dq),
            ));
        }
        Ok(())
    }
}

/// Placement of the FLIP background grid.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FlipGridConfig {
    /// Number of cells along each axis
    #[serde(with = "serde_utils::uvec3")]
    pub resolution: UVec3,
    /// Minimum corner of the grid
    #[serde(with = "serde_utils::vec3")]
    pub origin: Vec3,
    /// Edge length of a cubic cell
    pub cell_size: f32,
}

impl Default for FlipGridConfig {
    fn default() -> Self {
        Self {
            resolution: UVec3::splat(FLIP_GRID_RESOLUTION),
            origin: FLIP_GRID_ORIGIN,
            cell_size: FLIP_GRID_EXTENT / FLIP_GRID_RESOLUTION as f32,
        }
    }
}

impl FlipGridConfig {
    /// Grid spanning `[min, max]` with `resolution` cells along x.
    pub fn spanning(min: Vec3, max: Vec3, resolution_x: u32) -> FluidResult<Self> {
        crate::error::check_bounds(min, max)?;
        if resolution_x == 0 {
            return Err(FluidError::config("resolution", "must be non-zero"));
        }
        let cell_size = (max.x - min.x) / resolution_x as f32;
        let resolution = ((max - min) / cell_size).ceil().as_uvec3().max(UVec3::ONE);
        Ok(Self {
            resolution,
            origin: min,
            cell_size,
        })
    }

    pub fn validate(&self) -> FluidResult<()> {
        positive("cell_size", self.cell_size)?;
        if self.resolution.min_element() == 0 {
            return Err(FluidError::config(
                "resolution",
                format!("must be non-zero on every axis, got {}", self.resolution),
            ));
        }
        if !self.origin.is_finite() {
            return Err(FluidError::config("origin", "must be finite"));
        }
        Ok(())
    }
}

/// Default FLIP/PIC blend.
pub const fn default_flip_ratio() -> f32 {
    FLIP_RATIO
}

fn positive(field: &'static str, value: f32) -> FluidResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(FluidError::config(
            field,
            format!("must be positive and finite, got {}", value),
        ))
    }
}

fn non_negative(field: &'static str, value: f32) -> FluidResult<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(FluidError::config(
            field,
            format!("must be non-negative and finite, got {}", value),
        ))
    }
}

pub(crate) fn unit_interval(field: &'static str, value: f32) -> FluidResult<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(FluidError::config(
            field,
            format!("must lie in [0, 1], got {}", value),
        ))
    }
}
