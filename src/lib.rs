//! # Mercurana -- Adaptive Symplectic Multi-Step N-Body Integrator
//!
//! An adaptive symplectic integrator for gravitational N-body dynamics, combining
//! a whole-system symplectic splitting with hierarchical, per-pair sub-stepping
//! for close encounters, so that a handful of bodies in a tight pass do not force
//! the entire system onto a tiny global step.
//!
//! ## Quick Start
//!
//! ```
//! use mercurana::prelude::*;
//! use glam::DVec3;
//!
//! let mut particles: ParticleSet = vec![
//!     Particle::new(1.0, 0.01, DVec3::ZERO, DVec3::ZERO),
//!     Particle::new(1e-3, 0.0, DVec3::new(1.0, 0.0, 0.0), DVec3::new(0.0, 1.0, 0.0)),
//! ]
//! .into_iter()
//! .collect();
//!
//! let config = MercuranaConfig {
//!     n_dominant: 1,
//!     ..MercuranaConfig::default()
//! };
//! let mut integrator = Mercurana::new(config, 0.01);
//! integrator.part1(&particles).unwrap();
//!
//! let gravity = DirectSummation;
//! let mut resolver = MergeOnContact;
//! integrator.part2(&mut particles, &gravity, &mut resolver);
//! ```
//!
//! ## Architecture
//!
//! - [`particle`] -- Particle and ParticleSet, the data the rest of the crate operates on
//! - [`switching`] -- The C^infinity switching function blending force across shell boundaries
//! - [`predictor`] -- Closest-approach (rmin²) estimation over a drift segment
//! - [`dcrit`] -- The per-shell, per-particle critical-radius table
//! - [`shell`] -- The shell membership engine, the core of the adaptive descent
//! - [`operator`] -- Shell-aware drift/kick sub-operators and the recursive descent
//! - [`eos`] -- The operator-splitting driver and its named symplectic schemes
//! - [`gravity`] -- The `GravitySource` trait and a direct-summation reference impl
//! - [`collision`] -- Collision capture buffer, `CollisionResolver` trait, and a merge reference impl
//! - [`error`] -- Configuration errors and non-fatal advisories
//! - [`integrator`] -- `Mercurana`, the top-level lifecycle: `part1`/`part2`/`synchronize`/`reset`
//! - [`constants`] -- Physical constants and integrator-wide defaults

pub mod collision;
pub mod constants;
pub mod dcrit;
pub mod error;
pub mod eos;
pub mod gravity;
pub mod integrator;
pub mod operator;
pub mod particle;
pub mod predictor;
pub mod shell;
pub mod switching;

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::collision::{CollisionRecord, CollisionResolver, MergeOnContact};
    pub use crate::error::{MercuranaAdvisory, MercuranaError};
    pub use crate::eos::EosScheme;
    pub use crate::gravity::{DirectSummation, GravitySource};
    pub use crate::integrator::{Mercurana, MercuranaConfig};
    pub use crate::particle::{Particle, ParticleSet};
    pub use crate::switching::{InfinitelyDifferentiable, SwitchingFunction};
}
