//! Marker particles carrying the liquid's velocity.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::domain::Domain;

/// Lifecycle of a particle between compactions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParticleStatus {
    #[default]
    Active,
    /// Marked for removal at the next [`Particles3D::compact`]
    Deleted,
}

/// A single particle in the FLIP simulation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Particle3D {
    /// Position in grid units
    pub position: Vec3,
    /// Particle-owned velocity
    pub velocity: Vec3,
    pub status: ParticleStatus,
}

impl Particle3D {
    /// Create a new particle at the given position with initial velocity.
    pub fn new(position: Vec3, velocity: Vec3) -> Self {
        Self {
            position,
            velocity,
            status: ParticleStatus::Active,
        }
    }

    /// Create a stationary particle at the given position.
    pub fn at(position: Vec3) -> Self {
        Self::new(position, Vec3::ZERO)
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.status == ParticleStatus::Active
    }
}

impl Default for Particle3D {
    fn default() -> Self {
        Self::new(Vec3::ZERO, Vec3::ZERO)
    }
}

/// Collection of particles.
///
/// Removal is two-phase: [`mark_deleted`](Self::mark_deleted) during a pass,
/// then one [`compact`](Self::compact) at the end of it.
#[derive(Clone, Debug, Default)]
pub struct Particles3D {
    pub list: Vec<Particle3D>,
}

impl Particles3D {
    /// Create an empty particle collection.
    pub fn new() -> Self {
        Self { list: Vec::new() }
    }

    /// Create with pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            list: Vec::with_capacity(capacity),
        }
    }

    /// Add a particle with the given position and velocity.
    pub fn spawn(&mut self, position: Vec3, velocity: Vec3) {
        self.list.push(Particle3D::new(position, velocity));
    }

    /// Add a stationary particle.
    pub fn spawn_at(&mut self, position: Vec3) {
        self.list.push(Particle3D::at(position));
    }

    /// Number of stored particles, deleted ones included until compaction.
    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.list.iter().filter(|p| p.is_active()).count()
    }

    pub fn clear(&mut self) {
        self.list.clear();
    }

    #[inline]
    pub fn mark_deleted(&mut self, idx: usize) {
        self.list[idx].status = ParticleStatus::Deleted;
    }

    /// Drop deleted particles, keeping the order of the survivors.
    ///
    /// Returns the old → new index map, `None` for removed particles.
    pub fn compact(&mut self) -> Vec<Option<usize>> {
        let mut remap = Vec::with_capacity(self.list.len());
        let mut next = 0;
        for p in &self.list {
            if p.is_active() {
                remap.push(Some(next));
                next += 1;
            } else {
                remap.push(None);
            }
        }
        self.list.retain(|p| p.is_active());
        remap
    }

    /// Mean position of the active particles.
    pub fn center_of_mass(&self) -> Option<Vec3> {
        let (sum, count) = self
            .list
            .iter()
            .filter(|p| p.is_active())
            .fold((Vec3::ZERO, 0usize), |(s, n), p| (s + p.position, n + 1));
        (count > 0).then(|| sum / count as f32)
    }
}

/// Cell → particle lookup built by counting sort.
///
/// `cell(i, j, k)` yields the indices of the active particles whose position
/// floors to that cell. Stale after any particle moves or compaction.
#[derive(Clone, Debug, Default)]
pub struct ParticleIndex {
    size: [usize; 3],
    /// Start offset of each cell in `indices`, plus a final sentinel
    cell_start: Vec<usize>,
    indices: Vec<usize>,
}

impl ParticleIndex {
    pub fn new(domain: &Domain) -> Self {
        Self {
            size: domain.size(),
            cell_start: vec![0; domain.cell_count() + 1],
            indices: Vec::new(),
        }
    }

    pub fn rebuild(&mut self, particles: &Particles3D, domain: &Domain) {
        let cells = domain.cell_count();
        self.size = domain.size();
        self.cell_start.clear();
        self.cell_start.resize(cells + 1, 0);

        let cell_of = |p: &Particle3D| -> Option<usize> {
            if !p.is_active() || !domain.contains(p.position) {
                return None;
            }
            let c = domain.cell_of(p.position);
            Some(domain.index(c.x as usize, c.y as usize, c.z as usize))
        };

        // Count
        for p in &particles.list {
            if let Some(cell) = cell_of(p) {
                self.cell_start[cell + 1] += 1;
            }
        }
        // Prefix sum
        for c in 0..cells {
            self.cell_start[c + 1] += self.cell_start[c];
        }
        // Scatter
        let mut cursor = self.cell_start.clone();
        self.indices.clear();
        self.indices.resize(self.cell_start[cells], 0);
        for (idx, p) in particles.list.iter().enumerate() {
            if let Some(cell) = cell_of(p) {
                self.indices[cursor[cell]] = idx;
                cursor[cell] += 1;
            }
        }
    }

    /// Indices of the particles in cell `(i, j, k)`.
    #[inline]
    pub fn cell(&self, i: usize, j: usize, k: usize) -> &[usize] {
        let c = k * self.size[0] * self.size[1] + j * self.size[0] + i;
        &self.indices[self.cell_start[c]..self.cell_start[c + 1]]
    }

    #[inline]
    pub fn count(&self, i: usize, j: usize, k: usize) -> usize {
        self.cell(i, j, k).len()
    }

    /// Total particles indexed.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_particle_creation() {
        let p = Particle3D::new(Vec3::new(1.0, 2.0, 3.0), Vec3::new(0.1, 0.2, 0.3));
        assert_eq!(p.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(p.velocity, Vec3::new(0.1, 0.2, 0.3));
        assert!(p.is_active());
    }

    #[test]
    fn test_particles_spawn() {
        let mut particles = Particles3D::new();
        particles.spawn(Vec3::ONE, Vec3::ZERO);
        particles.spawn_at(Vec3::new(2.0, 2.0, 2.0));
        assert_eq!(particles.len(), 2);
    }

    #[test]
    fn test_mark_and_compact_with_remap() {
        let mut particles = Particles3D::new();
        for i in 0..5 {
            particles.spawn_at(Vec3::splat(i as f32 + 0.5));
        }
        particles.mark_deleted(1);
        particles.mark_deleted(3);
        assert_eq!(particles.len(), 5);
        assert_eq!(particles.active_count(), 3);

        let remap = particles.compact();
        assert_eq!(remap, vec![Some(0), None, Some(1), None, Some(2)]);
        assert_eq!(particles.list[1].position, Vec3::splat(2.5));
    }

    #[test]
    fn test_particle_index_groups_by_cell() {
        let d = Domain::cube(4, 1.0);
        let mut particles = Particles3D::new();
        particles.spawn_at(Vec3::new(1.2, 1.2, 1.2));
        particles.spawn_at(Vec3::new(3.5, 0.5, 0.5));
        particles.spawn_at(Vec3::new(1.8, 1.9, 1.1));
        particles.spawn_at(Vec3::new(1.5, 1.5, 1.5));
        particles.mark_deleted(3);

        let mut index = ParticleIndex::new(&d);
        index.rebuild(&particles, &d);
        assert_eq!(index.cell(1, 1, 1), &[0, 2]);
        assert_eq!(index.cell(3, 0, 0), &[1]);
        assert_eq!(index.count(0, 0, 0), 0);
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_center_of_mass_ignores_deleted() {
        let mut particles = Particles3D::new();
        particles.spawn_at(Vec3::new(1.0, 1.0, 1.0));
        particles.spawn_at(Vec3::new(3.0, 3.0, 3.0));
        particles.spawn_at(Vec3::new(100.0, 0.0, 0.0));
        particles.mark_deleted(2);
        assert_eq!(particles.center_of_mass(), Some(Vec3::splat(2.0)));
        assert_eq!(Particles3D::new().center_of_mass(), None);
    }
}
