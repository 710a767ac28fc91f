//! Dam Break - headless comparison of the three solvers
//!
//! Drops the same water column into the same tank with SPH, PBF and FLIP,
//! prints per-second stats and reconstructs the final surface of each.
//! Optionally writes the config used for each solver as JSON.
//!
//! Run with: RUST_LOG=info cargo run --example dam_break --release [-- out_dir]

use std::path::PathBuf;
use std::time::Instant;

use fluid3d::{
    FlipGridConfig, FlipSolver, FluidBoundary, FluidConfigPatch, FluidResult, FluidSolver,
    PbfSolver, SphSolver, SurfaceReconstructor, Vec3,
};

// Scene
const TANK_MIN: Vec3 = Vec3::ZERO;
const TANK_MAX: Vec3 = Vec3::new(0.6, 0.6, 0.3);
const COLUMN_MIN: Vec3 = Vec3::new(0.0, 0.0, 0.0);
const COLUMN_MAX: Vec3 = Vec3::new(0.2, 0.3, 0.3);
const PARTICLE_BUDGET: usize = 3000;
const SEED: u64 = 42;

// Run
const FRAME_DT: f32 = 1.0 / 60.0;
const SECONDS: usize = 2;
const SURFACE_RESOLUTION: usize = 48;

fn patch() -> FluidConfigPatch {
    FluidConfigPatch {
        particle_count: Some(PARTICLE_BUDGET),
        seed: Some(SEED),
        ..Default::default()
    }
}

fn tank() -> FluidBoundary {
    FluidBoundary::container_between(TANK_MIN, TANK_MAX)
}

fn run(label: &str, solver: &mut dyn FluidSolver, out_dir: Option<&PathBuf>) -> FluidResult<()> {
    println!();
    println!("=== {} ===", label);
    println!("{} particles", solver.particle_count());

    if let Some(dir) = out_dir {
        let path = dir.join(format!("{}_config.json", solver.name()));
        solver.config().save_json(&path)?;
        println!("Config written to {}", path.display());
    }

    let start = Instant::now();
    for second in 1..=SECONDS {
        let mut substeps = 0;
        for _ in 0..(1.0 / FRAME_DT).round() as usize {
            substeps += solver.simulate(FRAME_DT).count;
        }
        let particles = solver.particles();
        let n = particles.len().max(1) as f32;
        let mean_height = particles.iter().map(|p| p.position.y).sum::<f32>() / n;
        let front = particles
            .iter()
            .map(|p| p.position.x)
            .fold(f32::MIN, f32::max);
        let max_speed = particles
            .iter()
            .map(|p| p.velocity.length())
            .fold(0.0, f32::max);
        println!(
            "t={}s  substeps={}  mean_y={:.3}  front_x={:.3}  max_speed={:.2}",
            second, substeps, mean_height, front, max_speed
        );
    }
    println!("Simulated in {:.2?}", start.elapsed());

    let smoothing = solver.config().smoothing_radius.max(solver.config().particle_radius * 4.0);
    let mut reconstructor =
        SurfaceReconstructor::new(SURFACE_RESOLUTION, TANK_MIN, TANK_MAX, smoothing)?;
    let mesh = reconstructor.reconstruct_surface(solver.particles());
    println!("Surface: {} triangles", mesh.triangle_count());
    Ok(())
}

fn main() -> FluidResult<()> {
    env_logger::init();
    let out_dir = std::env::args().nth(1).map(PathBuf::from);

    let mut sph = SphSolver::new(patch())?;
    sph.add_boundary(tank())?;
    sph.initialize_box(COLUMN_MIN, COLUMN_MAX, None)?;
    run("SPH", &mut sph, out_dir.as_ref())?;

    let mut pbf = PbfSolver::new(patch())?;
    pbf.add_boundary(tank())?;
    pbf.initialize_box(COLUMN_MIN, COLUMN_MAX, None)?;
    run("PBF", &mut pbf, out_dir.as_ref())?;

    let grid = FlipGridConfig::spanning(TANK_MIN, TANK_MAX, 32)?;
    let mut flip = FlipSolver::new(patch(), grid)?;
    flip.add_boundary(tank())?;
    flip.initialize_box(COLUMN_MIN, COLUMN_MAX, None)?;
    run("FLIP", &mut flip, out_dir.as_ref())?;

    Ok(())
}
