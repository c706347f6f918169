//! The top-level integrator: configuration, lifecycle, and the glue between
//! the shell membership engine and the external operator-splitting driver.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::collision::CollisionResolver;
use crate::dcrit::CriticalRadiusTable;
use crate::error::{CollisionMode, GravityMode, MercuranaAdvisory, MercuranaError};
use crate::eos::{EosScheme, SplittingDriver};
use crate::gravity::GravitySource;
use crate::operator::{DescentConfig, StepContext};
use crate::particle::ParticleSet;
use crate::shell::ShellMembership;
use crate::switching::{InfinitelyDifferentiable, SwitchingFunction};

/// A cooperative, shareable interrupt flag.
///
/// A host can clone this (it's an `Arc`) and flip it from a signal handler;
/// `part2` checks it between sub-steps and returns early, leaving state at the
/// last completed sub-step.
#[derive(Debug, Clone, Default)]
pub struct InterruptFlag(Arc<AtomicBool>);

impl InterruptFlag {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

/// Validated configuration for a [`Mercurana`] instance.
///
/// Constructed via [`MercuranaConfig::default`] and validated on the next
/// [`Mercurana::part1`] call; see [`MercuranaError`] for the constraints.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MercuranaConfig {
    pub smax: usize,
    pub n0: usize,
    pub n1: usize,
    pub kappa: f64,
    pub gm0r0: f64,
    pub alpha: f64,
    pub safe_mode: bool,
    pub phi0: EosScheme,
    pub phi1: EosScheme,
    pub n_dominant: usize,
    pub recalculate_dcrit_this_timestep: bool,
    /// Number of variational particles the host has configured. Mercurana has no
    /// variational-equations support; any nonzero value fails `part1` with
    /// [`MercuranaError::VariationalEquationsUnsupported`].
    pub var_config_n: usize,
    /// The host's requested gravity routine; anything other than
    /// [`GravityMode::Mercurana`] (or the compatible [`GravityMode::Basic`]) is
    /// force-overridden at `part1` and reported via
    /// [`MercuranaAdvisory::GravityModeOverridden`].
    pub gravity_mode: GravityMode,
    /// The host's requested collision search mode; anything other than
    /// [`CollisionMode::Direct`] (or [`CollisionMode::None`]) is force-overridden
    /// at `part1` and reported via [`MercuranaAdvisory::CollisionModeOverridden`].
    pub collision_mode: CollisionMode,
}

impl Default for MercuranaConfig {
    fn default() -> Self {
        Self {
            smax: crate::constants::DEFAULT_SMAX,
            n0: crate::constants::DEFAULT_N0,
            n1: crate::constants::DEFAULT_N1,
            kappa: crate::constants::DEFAULT_KAPPA,
            gm0r0: 0.0,
            alpha: crate::constants::DEFAULT_ALPHA,
            safe_mode: true,
            phi0: EosScheme::Lf,
            phi1: EosScheme::Lf,
            n_dominant: 0,
            recalculate_dcrit_this_timestep: false,
            var_config_n: 0,
            gravity_mode: GravityMode::default(),
            collision_mode: CollisionMode::default(),
        }
    }
}

impl MercuranaConfig {
    fn validate(&self) -> Result<(), MercuranaError> {
        if self.var_config_n > 0 {
            return Err(MercuranaError::VariationalEquationsUnsupported);
        }
        if self.smax < 1 {
            return Err(MercuranaError::InvalidSmax(self.smax));
        }
        if self.smax > 1 && self.n0 == 0 {
            return Err(MercuranaError::InvalidN0);
        }
        if self.smax > 2 && self.n1 == 0 {
            return Err(MercuranaError::InvalidN1);
        }
        if self.smax > 1 && self.kappa <= 0.0 {
            return Err(MercuranaError::InvalidKappa(self.kappa));
        }
        Ok(())
    }
}

/// The adaptive symplectic multi-step integrator.
///
/// Owns its membership bookkeeping and dcrit table; the host owns the
/// particles and supplies a [`GravitySource`], [`CollisionResolver`], and
/// (optionally) a custom [`SwitchingFunction`] to every step.
pub struct Mercurana {
    config: MercuranaConfig,
    switching: Box<dyn SwitchingFunction>,
    membership: Option<ShellMembership>,
    dcrit: CriticalRadiusTable,
    clock: f64,
    dt: f64,
    synchronized: bool,
    allocated_n: usize,
    advisories: Vec<MercuranaAdvisory>,
    interrupt: InterruptFlag,
}

impl Default for Mercurana {
    fn default() -> Self {
        Self::new(MercuranaConfig::default(), 1.0)
    }
}

impl Mercurana {
    /// Construct a new integrator with the given configuration and global step.
    pub fn new(config: MercuranaConfig, dt: f64) -> Self {
        Self {
            config,
            switching: Box::new(InfinitelyDifferentiable),
            membership: None,
            dcrit: CriticalRadiusTable::new(),
            clock: 0.0,
            dt,
            synchronized: true,
            allocated_n: 0,
            advisories: Vec::new(),
            interrupt: InterruptFlag::new(),
        }
    }

    /// Install a custom switching function, replacing the default C^infinity bump.
    pub fn with_switching_function(mut self, switching: Box<dyn SwitchingFunction>) -> Self {
        self.switching = switching;
        self
    }

    pub fn interrupt_flag(&self) -> InterruptFlag {
        self.interrupt.clone()
    }

    pub fn current_time(&self) -> f64 {
        self.clock
    }

    pub fn config(&self) -> &MercuranaConfig {
        &self.config
    }

    /// Count of shells exercised by the most recent `part2` call (`0` if shell 0
    /// never had to descend). A value of `2` means shell 0 descended once, into
    /// shell 1, not that shell index 2 was reached.
    pub fn max_shells_used(&self) -> usize {
        self.membership.as_ref().map(ShellMembership::max_shell_used).unwrap_or(0)
    }

    /// Particles in `map_encounter[shell]` for the most recent step.
    pub fn map_encounter(&self, shell: usize) -> &[usize] {
        self.membership.as_ref().map(|m| m.map_encounter(shell)).unwrap_or(&[])
    }

    /// The deepest shell particle `i` was promoted into under the encounter role
    /// this step.
    pub fn inshell_encounter(&self, i: usize) -> usize {
        self.membership.as_ref().map(|m| m.inshell_encounter(i)).unwrap_or(0)
    }

    /// Cumulative time particle `i` has been drifted so far this step.
    pub fn t_drifted(&self, i: usize) -> f64 {
        self.membership.as_ref().map(|m| m.t_drifted(i)).unwrap_or(0.0)
    }

    /// Drain and return all advisories accumulated since the last call.
    pub fn take_advisories(&mut self) -> Vec<MercuranaAdvisory> {
        std::mem::take(&mut self.advisories)
    }

    fn push_advisory(&mut self, advisory: MercuranaAdvisory) {
        tracing::warn!(?advisory, "mercurana advisory");
        self.advisories.push(advisory);
    }

    /// Validate configuration, (re)allocate membership/dcrit state for the
    /// current particle count, and refresh dcrit if needed.
    ///
    /// Returns a typed error (and leaves allocation state untouched) if the
    /// configuration is invalid.
    #[tracing::instrument(level = "trace", skip_all)]
    pub fn part1(&mut self, particles: &ParticleSet) -> Result<(), MercuranaError> {
        self.config.validate()?;

        if !matches!(self.config.gravity_mode, GravityMode::Basic | GravityMode::Mercurana) {
            self.push_advisory(MercuranaAdvisory::GravityModeOverridden);
        }
        if !matches!(self.config.collision_mode, CollisionMode::None | CollisionMode::Direct) {
            self.push_advisory(MercuranaAdvisory::CollisionModeOverridden);
        }

        let n = particles.len();
        let needs_realloc = self.membership.is_none() || n != self.allocated_n;
        if needs_realloc {
            self.membership = Some(ShellMembership::new(n, self.config.n_dominant, self.config.smax));
            self.allocated_n = n;
            self.recompute_dcrit(particles);
        } else if self.config.recalculate_dcrit_this_timestep {
            if !self.synchronized {
                self.push_advisory(MercuranaAdvisory::DesyncAtDcritRecompute);
            }
            self.recompute_dcrit(particles);
        }

        Ok(())
    }

    fn recompute_dcrit(&mut self, particles: &ParticleSet) {
        let masses: Vec<f64> = particles.iter().map(|p| p.m).collect();
        // Shell 0 descends with phi0; every deeper shell descends with phi1.
        let schemes: Vec<EosScheme> = (0..self.config.smax.saturating_sub(1))
            .map(|s| if s == 0 { self.config.phi0 } else { self.config.phi1 })
            .collect();
        let fractions =
            CriticalRadiusTable::chain_shell_dt_fractions(&schemes, self.config.n0, self.config.n1);
        self.dcrit.recompute(
            &masses,
            self.dt,
            self.config.kappa,
            self.config.gm0r0,
            self.config.alpha,
            &fractions,
        );
    }

    /// Perform one global step.
    ///
    /// Snapshots `p0`, zeroes `t_drifted`, runs the preprocessor if the state
    /// is currently synchronized, runs one driver step at shell 0, marks the
    /// state unsynchronized, and (in safe mode) synchronizes immediately.
    #[tracing::instrument(level = "trace", skip_all)]
    pub fn part2(
        &mut self,
        particles: &mut ParticleSet,
        gravity: &dyn GravitySource,
        resolver: &mut dyn CollisionResolver,
    ) {
        let Some(membership) = self.membership.as_mut() else {
            return;
        };
        membership.begin_step(particles);

        let descent = DescentConfig {
            n0: self.config.n0,
            n1: self.config.n1,
            phi0: self.config.phi0,
            phi1: self.config.phi1,
        };

        let mut advisories = Vec::new();
        {
            let mut ctx = StepContext {
                particles,
                membership,
                dcrit: &self.dcrit,
                switching: self.switching.as_ref(),
                gravity,
                resolver,
                clock: &mut self.clock,
                descent,
                advisories: &mut advisories,
            };

            if self.synchronized {
                SplittingDriver::preprocessor(&mut ctx, self.dt, 0, self.config.phi0);
            }
            SplittingDriver::step(&mut ctx, self.dt, 1.0, 1.0, 0, self.config.phi0);
        }

        for advisory in advisories {
            self.push_advisory(advisory);
        }
        self.synchronized = false;

        if self.config.safe_mode {
            self.synchronize(particles, gravity);
        }
    }

    /// Apply the postprocessor of the outer splitting, if not already synchronized.
    pub fn synchronize(&mut self, particles: &mut ParticleSet, gravity: &dyn GravitySource) {
        if self.synchronized {
            return;
        }
        let Some(membership) = self.membership.as_mut() else {
            return;
        };
        let mut resolver = crate::collision::MergeOnContact;
        let mut advisories = Vec::new();
        let descent = DescentConfig {
            n0: self.config.n0,
            n1: self.config.n1,
            phi0: self.config.phi0,
            phi1: self.config.phi1,
        };
        let mut ctx = StepContext {
            particles,
            membership,
            dcrit: &self.dcrit,
            switching: self.switching.as_ref(),
            gravity,
            resolver: &mut resolver,
            clock: &mut self.clock,
            descent,
            advisories: &mut advisories,
        };
        SplittingDriver::postprocessor(&mut ctx, self.dt, 0, self.config.phi0);
        self.synchronized = true;
    }

    /// Free all owned memory and restore the documented default configuration.
    pub fn reset(&mut self) {
        *self = Self::new(MercuranaConfig::default(), self.dt);
    }
}
