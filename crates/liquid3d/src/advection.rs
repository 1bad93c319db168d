//! Particle advection through the staggered velocity field.

use glam::Vec3;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::Domain;
use crate::flags::FlagGrid;
use crate::mac::MacGrid;
use crate::particle::{ParticleStatus, Particles3D};

/// Time integration scheme for particle paths.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntegrationMode {
    Euler,
    Rk2,
    #[default]
    Rk4,
}

/// What happens to a particle whose new position lies in an Obstacle cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObstaclePolicy {
    /// Keep it at its position from before the step
    #[default]
    Stop,
    /// Mark it deleted
    Delete,
}

/// Integrate one step of `x' = u(x)`.
pub fn integrate(vel: &MacGrid, pos: Vec3, dt: f32, mode: IntegrationMode) -> Vec3 {
    match mode {
        IntegrationMode::Euler => pos + vel.sample(pos) * dt,
        IntegrationMode::Rk2 => {
            let k1 = vel.sample(pos);
            let k2 = vel.sample(pos + k1 * (0.5 * dt));
            pos + k2 * dt
        }
        IntegrationMode::Rk4 => {
            let k1 = vel.sample(pos);
            let k2 = vel.sample(pos + k1 * (0.5 * dt));
            let k3 = vel.sample(pos + k2 * (0.5 * dt));
            let k4 = vel.sample(pos + k3 * dt);
            pos + (k1 + 2.0 * k2 + 2.0 * k3 + k4) * (dt / 6.0)
        }
    }
}

/// Move every active particle through `vel` for `dt`.
///
/// Positions are clamped into the domain; a particle ending in an Obstacle
/// cell is handled per `policy`. Returns the number of particles deleted.
pub fn advect_in_grid(
    particles: &mut Particles3D,
    domain: &Domain,
    flags: &FlagGrid,
    vel: &MacGrid,
    dt: f32,
    mode: IntegrationMode,
    policy: ObstaclePolicy,
) -> usize {
    particles
        .list
        .par_iter_mut()
        .map(|particle| {
            if !particle.is_active() {
                return 0;
            }
            let old = particle.position;
            let mut new = integrate(vel, old, dt, mode);
            if !new.is_finite() {
                new = old;
            }
            new = domain.clamp_position(new);

            if !flags.is_obstacle_at(new) {
                particle.position = new;
                return 0;
            }
            match policy {
                ObstaclePolicy::Stop if !flags.is_obstacle_at(old) => {
                    particle.position = old;
                    0
                }
                _ => {
                    // Delete policy, or a particle that never left the obstacle
                    particle.status = ParticleStatus::Deleted;
                    1
                }
            }
        })
        .sum()
}
