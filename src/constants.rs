//! Physical constants and integrator-wide defaults.

// ============================================================================
// Units
// ============================================================================

/// Default gravitational constant, in whatever unit system the host uses.
///
/// Most N-body codes run in units where `G = 1` (e.g. solar masses, AU, years);
/// the integrator itself is unit-agnostic and only uses this as the default for
/// [`crate::integrator::MercuranaConfig`].
pub const G: f64 = 1.0;

// ============================================================================
// Mercurana defaults (`reb_integrator_mercurana_reset` in the original)
// ============================================================================

/// Default encounter-sensitivity constant kappa.
pub const DEFAULT_KAPPA: f64 = 1e-3;

/// Default critical-radius exponent alpha.
pub const DEFAULT_ALPHA: f64 = 0.5;

/// Default number of shell-0 sub-steps.
pub const DEFAULT_N0: usize = 2;

/// Default number of sub-steps for any shell deeper than 0.
///
/// The original's documented reset default (n1 = 0) is only valid for Smax <= 2;
/// since the same reset also sets Smax = 10, this port defaults n1 to n0 instead
/// so a freshly reset integrator always starts in a state its own validation
/// accepts (see `DESIGN.md`).
pub const DEFAULT_N1: usize = DEFAULT_N0;

/// Default maximum shell depth.
pub const DEFAULT_SMAX: usize = 10;

/// Initial capacity of the collision record buffer.
pub const COLLISION_BUFFER_INITIAL_CAPACITY: usize = 32;

/// Iteration count for the machine-independent Newton cube root used by dcrit.
pub const CBRT_NEWTON_ITERATIONS: usize = 64;
