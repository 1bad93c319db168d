//! Numbered per-step output files for a scene.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};
use crate::mesh::TriMesh;
use crate::particle::Particles3D;

/// Particle state at the end of one step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParticleSnapshot {
    pub frame: usize,
    pub time: f32,
    pub positions: Vec<[f32; 3]>,
    pub velocities: Vec<[f32; 3]>,
}

impl ParticleSnapshot {
    pub fn capture(frame: usize, time: f32, particles: &Particles3D) -> Self {
        let active = particles.list.iter().filter(|p| p.is_active());
        let (positions, velocities) = active
            .map(|p| (p.position.to_array(), p.velocity.to_array()))
            .unzip();
        Self {
            frame,
            time,
            positions,
            velocities,
        }
    }
}

/// Output directory `<base>/<scene>/`.
#[derive(Clone, Debug)]
pub struct SceneOutput {
    dir: PathBuf,
}

impl SceneOutput {
    /// Create (if needed) the scene directory.
    pub fn create(base: impl AsRef<Path>, scene: &str) -> SimResult<Self> {
        let dir = base.as_ref().join(scene);
        fs::create_dir_all(&dir).map_err(|source| SimError::Output {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn surface_path(&self, frame: usize) -> PathBuf {
        self.dir.join(format!("fluidsurface_final_{:04}.obj", frame))
    }

    pub fn particles_path(&self, frame: usize) -> PathBuf {
        self.dir.join(format!("flipParts_{:04}.json", frame))
    }

    pub fn write_surface(&self, frame: usize, mesh: &TriMesh) -> SimResult<PathBuf> {
        let path = self.surface_path(frame);
        mesh.save_obj(&path)?;
        Ok(path)
    }

    pub fn write_particles(&self, snapshot: &ParticleSnapshot) -> SimResult<PathBuf> {
        let path = self.particles_path(snapshot.frame);
        self.write_json(&path, snapshot)?;
        Ok(path)
    }

    /// Write the parameters a run was started with to `scene.json`.
    pub fn write_scene<T: Serialize>(&self, params: &T) -> SimResult<PathBuf> {
        let path = self.dir.join("scene.json");
        self.write_json(&path, params)?;
        Ok(path)
    }

    fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> SimResult<()> {
        let file = fs::File::create(path).map_err(|source| SimError::Output {
            path: path.to_path_buf(),
            source,
        })?;
        write_json_to(BufWriter::new(file), path, value)
    }
}

/// Serialize `value` into `out`. Write failures are reported against `path`;
/// only genuine serialization failures become [`SimError::Snapshot`].
fn write_json_to<W: Write, T: Serialize>(mut out: W, path: &Path, value: &T) -> SimResult<()> {
    let io_err = |source| SimError::Output {
        path: path.to_path_buf(),
        source,
    };
    serde_json::to_writer(&mut out, value).map_err(|e| {
        if e.is_io() {
            io_err(e.into())
        } else {
            SimError::from(e)
        }
    })?;
    out.flush().map_err(io_err)
}
