//! Drift and kick sub-operators: shell-aware position/velocity updates, and the
//! recursive descent that ties the membership engine to the operator-splitting
//! driver.

use crate::collision::CollisionResolver;
use crate::dcrit::CriticalRadiusTable;
use crate::error::MercuranaAdvisory;
use crate::eos::{EosScheme, ShellStepper, SplittingDriver};
use crate::gravity::GravitySource;
use crate::particle::ParticleSet;
use crate::shell::ShellMembership;
use crate::switching::SwitchingFunction;

/// Sub-step counts and schemes for descending past shell 0 (`n0`/`phi0`)
/// versus any deeper shell (`n1`/`phi1`).
#[derive(Debug, Clone, Copy)]
pub struct DescentConfig {
    pub n0: usize,
    pub n1: usize,
    pub phi0: EosScheme,
    pub phi1: EosScheme,
}

impl DescentConfig {
    /// Number of sub-steps to partition a descending drift into, keyed by the
    /// shell being drifted (not the shell being descended into): `n0` at shell
    /// 0, `n1` at any deeper shell.
    fn sub_steps(&self, shell: usize) -> usize {
        if shell == 0 {
            self.n0
        } else {
            self.n1
        }
    }

    /// Scheme to run the descent with, keyed the same way as `sub_steps`.
    fn scheme(&self, shell: usize) -> EosScheme {
        if shell == 0 {
            self.phi0
        } else {
            self.phi1
        }
    }
}

fn owns_dominant(inshell: usize, shell: usize) -> bool {
    inshell == shell
}

fn owns_subdominant(inshell_sub: usize, inshell_enc: usize, shell: usize) -> bool {
    inshell_sub == shell && inshell_enc <= shell
}

fn owns_encounter(inshell_sub: usize, inshell_enc: usize, shell: usize) -> bool {
    inshell_sub < shell && inshell_enc == shell
}

/// Borrowed bundle of everything a drift/kick step needs, scoped to one
/// `part2`/`synchronize` call.
///
/// Implements [`ShellStepper`] so [`SplittingDriver`] can recurse through it
/// without the core owning any host-supplied collaborator between steps —
/// `part2` builds one of these, runs the driver, and lets it go out of scope.
pub struct StepContext<'a> {
    pub particles: &'a mut ParticleSet,
    pub membership: &'a mut ShellMembership,
    pub dcrit: &'a CriticalRadiusTable,
    pub switching: &'a dyn SwitchingFunction,
    pub gravity: &'a dyn GravitySource,
    pub resolver: &'a mut dyn CollisionResolver,
    pub clock: &'a mut f64,
    pub descent: DescentConfig,
    pub advisories: &'a mut Vec<MercuranaAdvisory>,
}

impl<'a> StepContext<'a> {
    /// Switching-function boundary radii `(ri, ro)` for the gravity kick at
    /// `shell`. Shell 0 sees the full, unblended force; a deeper shell's kick
    /// excludes whatever region the parent shell's dcrit already handed off to
    /// the finer sub-stepping.
    fn switching_radii(&self, shell: usize) -> (f64, f64) {
        if shell == 0 {
            return (0.0, 0.0);
        }
        let n = self.particles.len();
        let ro = (0..n).map(|i| self.dcrit.get(shell - 1, i)).fold(0.0_f64, f64::max);
        let ri = (0..n).map(|i| self.dcrit.get(shell, i)).fold(0.0_f64, f64::max);
        (ri, ro)
    }
}

impl<'a> ShellStepper for StepContext<'a> {
    fn drift(&mut self, shell: usize, a: f64) {
        let outcome = self.membership.predict(
            shell,
            a,
            self.particles,
            self.dcrit,
            self.switching,
            self.resolver,
        );
        self.advisories.extend(outcome.advisories);

        let dominant = self.membership.map_dominant(shell).to_vec();
        for i in dominant {
            if owns_dominant(self.membership.inshell_dominant(i), shell) {
                let v = self.particles[i].vel;
                self.particles[i].pos += a * v;
                self.membership.add_drift_time(i, a);
            }
        }

        let subdominant = self.membership.map_subdominant(shell).to_vec();
        for i in subdominant {
            if owns_subdominant(
                self.membership.inshell_subdominant(i),
                self.membership.inshell_encounter(i),
                shell,
            ) {
                let v = self.particles[i].vel;
                self.particles[i].pos += a * v;
                self.membership.add_drift_time(i, a);
            }
        }

        let encounter = self.membership.map_encounter(shell).to_vec();
        for i in encounter {
            if owns_encounter(
                self.membership.inshell_subdominant(i),
                self.membership.inshell_encounter(i),
                shell,
            ) {
                let v = self.particles[i].vel;
                self.particles[i].pos += a * v;
                self.membership.add_drift_time(i, a);
            }
        }

        if outcome.descend {
            let scheme = self.descent.scheme(shell);
            let steps = self.descent.sub_steps(shell).max(1);
            let sub_a = a / steps as f64;
            for _ in 0..steps {
                SplittingDriver::step(self, sub_a, 1.0, 1.0, shell + 1, scheme);
            }
        } else {
            *self.clock += a;
        }
    }

    fn kick(&mut self, shell: usize, y: f64, _v: f64) {
        let (ri, ro) = self.switching_radii(shell);
        self.gravity.accelerate(self.particles, self.switching, ri, ro);

        let dominant = self.membership.map_dominant(shell).to_vec();
        for i in dominant {
            let acc = self.particles[i].acc;
            self.particles[i].vel += y * acc;
        }

        let encounter = self.membership.map_encounter(shell).to_vec();
        for i in encounter {
            let acc = self.particles[i].acc;
            self.particles[i].vel += y * acc;
        }

        if shell > 0 {
            let subdominant = self.membership.map_subdominant(shell).to_vec();
            for i in subdominant {
                if self.membership.inshell_encounter(i) < shell {
                    let acc = self.particles[i].acc;
                    self.particles[i].vel += y * acc;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::MergeOnContact;
    use crate::particle::Particle;
    use crate::switching::InfinitelyDifferentiable;
    use approx::assert_abs_diff_eq;
    use glam::DVec3;

    #[test]
    fn inclusion_rules_match_the_table() {
        assert!(owns_dominant(2, 2));
        assert!(!owns_dominant(1, 2));

        assert!(owns_subdominant(2, 0, 2));
        assert!(owns_subdominant(2, 2, 2));
        assert!(!owns_subdominant(2, 3, 2));
        assert!(!owns_subdominant(1, 0, 2));

        assert!(owns_encounter(1, 2, 2));
        assert!(!owns_encounter(2, 2, 2));
        assert!(!owns_encounter(1, 1, 2));
    }

    #[test]
    fn drift_and_kick_advance_a_two_body_system() {
        let mut particles: ParticleSet = vec![
            Particle::new(1.0, 0.0, DVec3::ZERO, DVec3::new(0.0, 0.1, 0.0)),
            Particle::new(1.0, 0.0, DVec3::new(10.0, 0.0, 0.0), DVec3::new(0.0, -0.1, 0.0)),
        ]
        .into_iter()
        .collect();
        let mut membership = ShellMembership::new(particles.len(), 2, 4);
        membership.begin_step(&particles);

        let mut dcrit = CriticalRadiusTable::new();
        dcrit.recompute(&[1.0, 1.0], 0.1, 1e-6, 0.0, 0.5, &[1.0, 0.5, 0.25, 0.125]);

        let switching = InfinitelyDifferentiable;
        let gravity = crate::gravity::DirectSummation;
        let mut resolver = MergeOnContact;
        let mut clock = 0.0;
        let mut advisories = Vec::new();

        let descent = DescentConfig {
            n0: 2,
            n1: 2,
            phi0: EosScheme::Lf,
            phi1: EosScheme::Lf,
        };

        {
            let mut ctx = StepContext {
                particles: &mut particles,
                membership: &mut membership,
                dcrit: &dcrit,
                switching: &switching,
                gravity: &gravity,
                resolver: &mut resolver,
                clock: &mut clock,
                descent,
                advisories: &mut advisories,
            };
            ctx.drift(0, 0.05);
            ctx.kick(0, 1.0, 0.0);
            ctx.drift(0, 0.05);
        }

        assert_abs_diff_eq!(clock, 0.1, epsilon = 1e-12);
        assert!(particles[0].pos.y != 0.0);
        assert!(particles[1].acc.length_squared() > 0.0);
    }
}
