//! Error and advisory taxonomy.
//!
//! Configuration mistakes are hard failures surfaced through `Result`; everything
//! else the integrator can recover from on its own is a non-fatal advisory drained
//! by the host through [`crate::integrator::Mercurana::take_advisories`].

/// Configuration errors returned from [`crate::integrator::Mercurana::part1`].
///
/// Returning one of these leaves the integrator's allocation state untouched:
/// `part2` remains a no-op until a subsequent `part1` call succeeds.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum MercuranaError {
    #[error("Smax must be >= 1, got {0}")]
    InvalidSmax(usize),
    #[error("n0 must be > 0 when Smax > 1")]
    InvalidN0,
    #[error("n1 must be > 0 when Smax > 2")]
    InvalidN1,
    #[error("kappa must be > 0 when Smax > 1, got {0}")]
    InvalidKappa(f64),
    #[error("variational equations are not supported by Mercurana")]
    VariationalEquationsUnsupported,
}

/// A host's requested gravity routine, checked against what Mercurana requires.
///
/// Mercurana always computes gravity through its own shell-blended routine; any
/// other setting is overridden and reported via
/// [`MercuranaAdvisory::GravityModeOverridden`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GravityMode {
    /// Plain direct summation, compatible with Mercurana's own routine.
    Basic,
    /// Mercurana's shell-blended routine; the integrator's native mode.
    Mercurana,
    /// Any other host-selected gravity routine; forced to `Mercurana` at `part1`.
    Other,
}

impl Default for GravityMode {
    fn default() -> Self {
        GravityMode::Mercurana
    }
}

/// A host's requested collision search mode, checked against what Mercurana supports.
///
/// Mercurana only supports a direct pairwise collision search; anything else is
/// overridden and reported via [`MercuranaAdvisory::CollisionModeOverridden`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CollisionMode {
    /// No collision search.
    None,
    /// Direct pairwise search; the integrator's only supported mode.
    Direct,
    /// Any other host-selected collision search mode; forced to `Direct` at `part1`.
    Other,
}

impl Default for CollisionMode {
    fn default() -> Self {
        CollisionMode::Direct
    }
}

/// Non-fatal conditions the integrator recovered from on its own.
///
/// Pushed onto an internal queue and simultaneously emitted as `tracing::warn!`
/// events, so a host that only wires up logging still observes them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MercuranaAdvisory {
    /// The host's configured gravity mode was overridden to the integrator's
    /// required mode.
    GravityModeOverridden,
    /// The host's configured collision mode was overridden to DIRECT.
    CollisionModeOverridden,
    /// `recalculate_dcrit_this_timestep` was requested while unsynchronized.
    DesyncAtDcritRecompute,
    /// A descent would have exceeded `Smax`; it was capped at the deepest
    /// available shell instead.
    ShellBudgetExhausted { shell: usize },
}
