//! Drop scene
//!
//! Drops an OBJ mesh (or a sphere when no mesh is given) into a shallow
//! basin and writes the liquid surface and particles of every step to
//! `simulation data/DropObjMesh/`.
//!
//! Usage: `drop_scene [mesh.obj]`, log level via `RUST_LOG`.

use std::error::Error;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use glam::Vec3;
use liquid3d::{
    Domain, FlipSimulation3D, ParticleSnapshot, SceneOutput, Shape, SimParams, TriMesh,
};
use serde::{Deserialize, Serialize};

const OUTPUT_DIR: &str = "simulation data";
const SCENE_NAME: &str = "DropObjMesh";

const MIN_RESOLUTION: usize = 10;
const MAX_RESOLUTION: usize = 500;

/// Everything a run was started with, written to `scene.json`.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct SceneParams {
    resolution: usize,
    dimension: usize,
    dt: f32,
    steps: usize,
    /// Mesh dropped into the basin; a sphere when absent
    mesh: Option<PathBuf>,
    /// Basin height as a fraction of the domain height
    basin_height: f32,
    sim: SimParams,
}

impl SceneParams {
    fn new(resolution: usize, mesh: Option<PathBuf>) -> Self {
        Self {
            resolution,
            dimension: 3,
            dt: 0.5,
            steps: 250,
            mesh,
            basin_height: 0.1,
            sim: SimParams::default(),
        }
    }

    fn domain(&self) -> Domain {
        if self.dimension == 2 {
            Domain::planar(self.resolution, self.resolution, self.dt)
        } else {
            Domain::cube(self.resolution, self.dt)
        }
    }
}

/// Accept a resolution in `[10, 500]`.
fn parse_resolution(line: &str) -> Option<usize> {
    line.trim()
        .parse::<usize>()
        .ok()
        .filter(|res| (MIN_RESOLUTION..=MAX_RESOLUTION).contains(res))
}

/// Prompt until a valid resolution is entered. End of input is an error.
fn read_resolution<R: BufRead, W: Write>(input: &mut R, prompt: &mut W) -> io::Result<usize> {
    let mut line = String::new();
    loop {
        write!(
            prompt,
            "Enter grid resolution (between {} and {}): ",
            MIN_RESOLUTION, MAX_RESOLUTION
        )?;
        prompt.flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "no grid resolution given",
            ));
        }
        if let Some(res) = parse_resolution(&line) {
            return Ok(res);
        }
    }
}

/// Centre `mesh` in the domain with its largest half-extent at a third of the
/// resolution.
fn fit_mesh(mesh: &mut TriMesh, resolution: usize) {
    let Some((lo, hi)) = mesh.bounds() else {
        return;
    };
    let half = 0.5 * (hi - lo).max_element();
    if half <= 0.0 {
        return;
    }
    let res = resolution as f32;
    mesh.offset(-(lo + hi) * 0.5);
    mesh.scale(Vec3::splat(res / 3.0 / half));
    mesh.offset(Vec3::splat(res * 0.5));
}

/// Liquid at rest: the basin plus the dropped object.
fn scene_shapes(params: &SceneParams, domain: &Domain) -> Result<Vec<Shape>, Box<dyn Error>> {
    let extent = domain.extent();
    let basin = Shape::Box {
        min: Vec3::ZERO,
        max: Vec3::new(extent.x, params.basin_height * extent.y, extent.z),
    };

    let object = match &params.mesh {
        Some(path) => {
            let mut mesh = TriMesh::load_obj(path)?;
            fit_mesh(&mut mesh, params.resolution);
            Shape::mesh(mesh)
        }
        None => {
            let mut center = extent * 0.5;
            if !domain.is_3d() {
                center.z = 0.5;
            }
            Shape::Sphere {
                center,
                radius: params.resolution as f32 / 6.0,
            }
        }
    };
    Ok(vec![basin, object])
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let mesh = std::env::args().nth(1).map(PathBuf::from);
    let resolution = {
        let stdin = io::stdin();
        read_resolution(&mut stdin.lock(), &mut io::stdout())?
    };

    let params = SceneParams::new(resolution, mesh);
    let domain = params.domain();
    let shapes = scene_shapes(&params, &domain)?;

    let output = SceneOutput::create(OUTPUT_DIR, SCENE_NAME)?;
    output.write_scene(&params)?;
    log::info!("Writing output to {}", output.dir().display());

    let mut sim = FlipSimulation3D::new(&domain, params.sim.clone());
    sim.init_scene(&shapes);

    for _ in 0..params.steps {
        let report = sim.step();

        if let Some(surface) = sim.surface() {
            if let Err(e) = output.write_surface(report.frame, surface) {
                log::error!("Frame {}: {}", report.frame, e);
            }
        }
        let snapshot = ParticleSnapshot::capture(report.frame, report.time, &sim.particles);
        if let Err(e) = output.write_particles(&snapshot) {
            log::error!("Frame {}: {}", report.frame, e);
        }
    }

    log::info!(
        "Finished {} steps, {} particles",
        params.steps,
        sim.particle_count()
    );
    Ok(())
}
