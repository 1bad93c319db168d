//! Error type shared by the simulation core and its I/O collaborators.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    /// Integer grid access outside `[0, n)` on some axis.
    #[error("cell ({i}, {j}, {k}) is outside the domain {size:?}")]
    OutOfDomain {
        i: i64,
        j: i64,
        k: i64,
        size: [usize; 3],
    },

    #[error("failed to read mesh {}: {source}", path.display())]
    MeshIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}:{line}: {message}", path.display())]
    MeshParse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("mesh has no triangles")]
    EmptyMesh,

    #[error("failed to write {}: {source}", path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("snapshot serialization failed: {0}")]
    Snapshot(#[from] serde_json::Error),
}

pub type SimResult<T> = Result<T, SimError>;
