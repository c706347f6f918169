//! Collision capture: recording physical overlaps discovered during `predict`,
//! and the trait a host-supplied resolver implements to act on them.

use crate::constants::COLLISION_BUFFER_INITIAL_CAPACITY;
use crate::particle::ParticleSet;
use glam::DVec3;

/// A recorded physical overlap between particles `i` and `j`, found during
/// [`crate::shell::ShellMembership::predict`].
///
/// `ghost` snapshots particle `i`'s state at the moment the overlap was
/// detected, mirroring the original's "ghost box" shift record — a resolver
/// that wants to reconstruct the pre-collision geometry (e.g. for a
/// restitution model) can use it without re-deriving it from the now-possibly
/// already-merged particle array.
#[derive(Debug, Clone, Copy)]
pub struct CollisionRecord {
    pub i: usize,
    pub j: usize,
    pub ghost_pos: DVec3,
    pub ghost_vel: DVec3,
}

/// Flat, doubling buffer of [`CollisionRecord`]s.
///
/// Starts at capacity 32 (SPEC_FULL.md §4.7) and doubles on overflow. The count
/// is reset at the start of every `predict` call and again after collision
/// re-entry.
#[derive(Debug, Clone, Default)]
pub struct CollisionBuffer {
    records: Vec<CollisionRecord>,
}

impl CollisionBuffer {
    pub fn new() -> Self {
        Self { records: Vec::new() }
    }

    /// Record a collision between `i` and `j`, snapshotting `i`'s current state.
    pub fn record(&mut self, particles: &ParticleSet, i: usize, j: usize) {
        if self.records.capacity() == 0 {
            self.records.reserve(COLLISION_BUFFER_INITIAL_CAPACITY);
        } else if self.records.len() == self.records.capacity() {
            self.records.reserve(self.records.capacity());
        }
        self.records.push(CollisionRecord {
            i,
            j,
            ghost_pos: particles[i].pos,
            ghost_vel: particles[i].vel,
        });
    }

    /// Drop all recorded collisions without resolving them.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn records(&self) -> &[CollisionRecord] {
        &self.records
    }
}

/// A direct-collision resolver, invoked by [`crate::shell::ShellMembership::predict`]
/// (phase P3) whenever the buffer is non-empty.
///
/// Implementations mutate `particles` (typically removing merged/destroyed bodies)
/// and return whether `N` changed, which tells `predict` it must restart from the
/// top for the current `(shell, dt)`.
pub trait CollisionResolver {
    fn resolve(&mut self, particles: &mut ParticleSet, collisions: &[CollisionRecord]) -> bool;
}

/// Reference resolver: merges each colliding pair into one particle at their
/// combined center of mass, conserving momentum.
///
/// This is the simplest physically sane direct-collision model (perfectly
/// inelastic merger); a host wanting restitution, fragmentation, or material
/// properties supplies its own [`CollisionResolver`] instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeOnContact;

impl CollisionResolver for MergeOnContact {
    fn resolve(&mut self, particles: &mut ParticleSet, collisions: &[CollisionRecord]) -> bool {
        if collisions.is_empty() {
            return false;
        }

        // Collisions recorded this pass may repeat an index if a body touched
        // more than one neighbor; only merge each surviving index once, largest
        // index first so earlier removals don't invalidate later ones.
        let mut pairs: Vec<(usize, usize)> = collisions
            .iter()
            .map(|c| (c.i.min(c.j), c.i.max(c.j)))
            .collect();
        pairs.sort_unstable();
        pairs.dedup();

        let mut removed = vec![false; particles.len()];
        let mut changed = false;

        for (i, j) in pairs {
            if removed[i] || removed[j] {
                continue;
            }
            let pi = particles[i];
            let pj = particles[j];
            let total_mass = pi.m + pj.m;
            if total_mass <= 0.0 {
                continue;
            }
            let merged_pos = (pi.pos * pi.m + pj.pos * pj.m) / total_mass;
            let merged_vel = (pi.vel * pi.m + pj.vel * pj.m) / total_mass;
            let merged_r = (pi.r.powi(3) + pj.r.powi(3)).cbrt();

            particles[i].m = total_mass;
            particles[i].r = merged_r;
            particles[i].pos = merged_pos;
            particles[i].vel = merged_vel;
            removed[j] = true;
            changed = true;
        }

        // Remove from the back so earlier indices stay valid.
        for idx in (0..removed.len()).rev() {
            if removed[idx] {
                particles.remove(idx);
            }
        }

        changed
    }
}
