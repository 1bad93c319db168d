//! Serde proxy for glam vectors.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// `Vec3` as a `{ x, y, z }` object; use with `#[serde(with = "Vec3Def")]`.
#[derive(Serialize, Deserialize)]
#[serde(remote = "Vec3")]
pub struct Vec3Def {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}
