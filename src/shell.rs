//! Shell membership engine: the core bookkeeping that decides, at every drift
//! sub-step, which particles must descend into a finer shell.

use crate::collision::{CollisionBuffer, CollisionResolver};
use crate::dcrit::CriticalRadiusTable;
use crate::error::MercuranaAdvisory;
use crate::particle::{Particle, ParticleSet};
use crate::predictor::{rmin2, rmin2_drifted};
use crate::switching::SwitchingFunction;

/// Result of a [`ShellMembership::predict`] call: whether shell `s+1` ended up
/// non-empty (the drift operator uses this to decide whether to recurse) and
/// any advisories raised along the way.
#[derive(Debug, Clone, Default)]
pub struct PredictOutcome {
    pub descend: bool,
    pub advisories: Vec<MercuranaAdvisory>,
}

/// Per-shell, per-particle membership state.
///
/// Owns the three role maps per shell, the per-particle `inshell_*` /
/// `maxdrift_*` arrays, the step-start snapshot `p0`, and the collision buffer.
/// Reallocated whenever `N` or `Smax` changes; reset at the start of every
/// global step via [`ShellMembership::begin_step`].
pub struct ShellMembership {
    n_dominant: usize,
    smax: usize,

    map_dominant: Vec<Vec<usize>>,
    map_subdominant: Vec<Vec<usize>>,
    map_encounter: Vec<Vec<usize>>,

    inshell_dominant: Vec<usize>,
    inshell_subdominant: Vec<usize>,
    inshell_encounter: Vec<usize>,

    maxdrift_dominant: Vec<f64>,
    maxdrift_encounter: Vec<f64>,
    t_drifted: Vec<f64>,
    p0: Vec<Particle>,

    collisions: CollisionBuffer,
    max_shell_used: usize,
    budget_warned_this_step: bool,
}

impl ShellMembership {
    /// Allocate fresh membership state for `n` particles, `n_dominant` of which
    /// are dominant, with `smax` shells (indices `0..smax`).
    pub fn new(n: usize, n_dominant: usize, smax: usize) -> Self {
        Self {
            n_dominant,
            smax,
            map_dominant: vec![Vec::new(); smax],
            map_subdominant: vec![Vec::new(); smax],
            map_encounter: vec![Vec::new(); smax],
            inshell_dominant: vec![0; n],
            inshell_subdominant: vec![0; n],
            inshell_encounter: vec![0; n],
            maxdrift_dominant: vec![f64::INFINITY; n],
            maxdrift_encounter: vec![f64::INFINITY; n],
            t_drifted: vec![0.0; n],
            p0: vec![Particle::default(); n],
            collisions: CollisionBuffer::new(),
            max_shell_used: 0,
            budget_warned_this_step: false,
        }
    }

    pub fn n(&self) -> usize {
        self.t_drifted.len()
    }

    pub fn smax(&self) -> usize {
        self.smax
    }

    pub fn t_drifted(&self, i: usize) -> f64 {
        self.t_drifted[i]
    }

    pub fn inshell_encounter(&self, i: usize) -> usize {
        self.inshell_encounter[i]
    }

    pub fn inshell_dominant(&self, i: usize) -> usize {
        self.inshell_dominant[i]
    }

    pub fn inshell_subdominant(&self, i: usize) -> usize {
        self.inshell_subdominant[i]
    }

    pub fn map_dominant(&self, shell: usize) -> &[usize] {
        &self.map_dominant[shell]
    }

    pub fn map_subdominant(&self, shell: usize) -> &[usize] {
        &self.map_subdominant[shell]
    }

    pub fn map_encounter(&self, shell: usize) -> &[usize] {
        &self.map_encounter[shell]
    }

    /// Count of shells exercised this step (`Nmaxshellsused` in the original),
    /// not a shell index: descending once from shell 0 to shell 1 reports `2`.
    pub fn max_shell_used(&self) -> usize {
        self.max_shell_used
    }

    pub fn add_drift_time(&mut self, i: usize, a: f64) {
        self.t_drifted[i] += a;
    }

    /// (P0) Bootstrap at the start of a global step: snapshot `p0`, zero
    /// `t_drifted`, reset all `maxdrift` to `+inf`, and seed the shell-0 maps
    /// (dominant = `[0, N_dom)`, subdominant = encounter = `[N_dom, N)`).
    pub fn begin_step(&mut self, particles: &ParticleSet) {
        let n = particles.len();
        if n != self.t_drifted.len() {
            *self = Self::new(n, self.n_dominant, self.smax);
        }

        self.p0.clear();
        self.p0.extend(particles.iter().copied());
        self.t_drifted.iter_mut().for_each(|t| *t = 0.0);
        self.maxdrift_dominant.iter_mut().for_each(|m| *m = f64::INFINITY);
        self.maxdrift_encounter.iter_mut().for_each(|m| *m = f64::INFINITY);
        self.inshell_dominant.iter_mut().for_each(|s| *s = 0);
        self.inshell_subdominant.iter_mut().for_each(|s| *s = 0);
        self.inshell_encounter.iter_mut().for_each(|s| *s = 0);

        for row in self
            .map_dominant
            .iter_mut()
            .chain(self.map_subdominant.iter_mut())
            .chain(self.map_encounter.iter_mut())
        {
            row.clear();
        }
        self.map_dominant[0].extend(0..self.n_dominant);
        self.map_subdominant[0].extend(self.n_dominant..n);
        self.map_encounter[0].extend(self.n_dominant..n);

        self.max_shell_used = 0;
        self.budget_warned_this_step = false;
    }

    fn dcritsum(dcrit: &CriticalRadiusTable, shell: usize, i: usize, j: usize) -> f64 {
        dcrit.get(shell, i) + dcrit.get(shell, j)
    }

    /// Dom-Dom and Dom-Sub passes update the dominant-role slack array
    /// (`reb_integrator_mercurana_part2`'s `maxdrift_dominant[mi]`/`[mj]`).
    fn update_maxdrift_dominant_pair(&mut self, i: usize, j: usize, rmin: f64, dcritsum: f64) {
        let slack = ((rmin.max(0.0)).sqrt() - dcritsum).max(0.0) / 2.0;
        if slack < self.maxdrift_dominant[i] {
            self.maxdrift_dominant[i] = slack;
        }
        if slack < self.maxdrift_dominant[j] {
            self.maxdrift_dominant[j] = slack;
        }
    }

    /// Enc-Enc and P1's encounter re-scan update the encounter-role slack array.
    fn update_maxdrift_encounter_pair(&mut self, i: usize, j: usize, rmin: f64, dcritsum: f64) {
        let slack = ((rmin.max(0.0)).sqrt() - dcritsum).max(0.0) / 2.0;
        if slack < self.maxdrift_encounter[i] {
            self.maxdrift_encounter[i] = slack;
        }
        if slack < self.maxdrift_encounter[j] {
            self.maxdrift_encounter[j] = slack;
        }
    }

    /// Entry point, called immediately before drifting shell `s` by `dt`.
    /// Populates shell `s+1`'s maps and records any physical overlaps found
    /// along the way.
    pub fn predict(
        &mut self,
        shell: usize,
        dt: f64,
        particles: &mut ParticleSet,
        dcrit: &CriticalRadiusTable,
        _switching: &dyn SwitchingFunction,
        resolver: &mut dyn CollisionResolver,
    ) -> PredictOutcome {
        let mut advisories = Vec::new();

        for row in [
            &mut self.map_dominant,
            &mut self.map_subdominant,
            &mut self.map_encounter,
        ] {
            if let Some(next) = row.get_mut(shell + 1) {
                next.clear();
            }
        }

        if shell + 1 >= self.smax {
            if !self.budget_warned_this_step {
                advisories.push(MercuranaAdvisory::ShellBudgetExhausted { shell });
                self.budget_warned_this_step = true;
            }
            return PredictOutcome { descend: false, advisories };
        }

        self.collisions.clear();

        // (P1) max-drift reconciliation, s > 0 only.
        if shell > 0 {
            let encounter_members: Vec<usize> = self.map_encounter[shell].clone();
            for i in encounter_members {
                let displaced = (particles[i].pos - self.p0[i].pos).length();
                if displaced <= self.maxdrift_encounter[i] {
                    continue;
                }
                let shell0_encounter: Vec<usize> = self.map_encounter[0].clone();
                for j in shell0_encounter {
                    if self.map_encounter[shell].contains(&j) || i == j {
                        continue;
                    }
                    let offset = self.t_drifted[i] - self.t_drifted[j];
                    let dcritsum = Self::dcritsum(dcrit, shell, i, j);
                    let r2 = rmin2_drifted(&particles[i], &particles[j], dt, offset);
                    if r2 < dcritsum * dcritsum {
                        for s in 1..=shell {
                            if !self.map_encounter[s].contains(&j) {
                                self.map_encounter[s].push(j);
                            }
                        }
                        self.inshell_encounter[j] = shell;
                        particles[j].pos += offset * particles[j].vel;
                    } else {
                        self.update_maxdrift_encounter_pair(i, j, r2, dcritsum);
                    }
                }
            }
        }

        // (P2) pair scans within shell s.
        self.scan_dominant_dominant(shell, dt, particles, dcrit);
        self.scan_dominant_subdominant(shell, dt, particles, dcrit);
        self.scan_encounter_encounter(shell, dt, particles, dcrit);

        // (P3) collision reentry.
        if !self.collisions.is_empty() {
            let records: Vec<_> = self.collisions.records().to_vec();
            self.collisions.clear();
            let n_changed = resolver.resolve(particles, &records);
            if n_changed {
                tracing::warn!(shell, "collision reentry: particle count changed, replaying predict");
                return self.predict(shell, dt, particles, dcrit, _switching, resolver);
            }
        }

        let descend = !self.map_dominant[shell + 1].is_empty()
            || !self.map_subdominant[shell + 1].is_empty()
            || !self.map_encounter[shell + 1].is_empty();
        if descend {
            // Matches `rim->Nmaxshellsused = MAX(rim->Nmaxshellsused, shell+2)`:
            // a count of shells exercised, not the deepest shell's index.
            self.max_shell_used = self.max_shell_used.max(shell + 2);
        }

        PredictOutcome { descend, advisories }
    }

    fn scan_dominant_dominant(
        &mut self,
        shell: usize,
        dt: f64,
        particles: &mut ParticleSet,
        dcrit: &CriticalRadiusTable,
    ) {
        let members = self.map_dominant[shell].clone();
        for a in 0..members.len() {
            for b in (a + 1)..members.len() {
                let (i, j) = (members[a], members[b]);
                let r2 = rmin2(&particles[i], &particles[j], dt);
                let dcritsum = Self::dcritsum(dcrit, shell, i, j);
                self.maybe_record_collision(particles, i, j, r2);
                if r2 < dcritsum * dcritsum {
                    if !self.map_dominant[shell + 1].contains(&i) {
                        self.map_dominant[shell + 1].push(i);
                        self.inshell_dominant[i] = shell + 1;
                    }
                    if !self.map_dominant[shell + 1].contains(&j) {
                        self.map_dominant[shell + 1].push(j);
                        self.inshell_dominant[j] = shell + 1;
                    }
                } else {
                    self.update_maxdrift_dominant_pair(i, j, r2, dcritsum);
                }
            }
        }
    }

    fn scan_dominant_subdominant(
        &mut self,
        shell: usize,
        dt: f64,
        particles: &mut ParticleSet,
        dcrit: &CriticalRadiusTable,
    ) {
        let doms = self.map_dominant[shell].clone();
        let subs = self.map_subdominant[shell].clone();
        for &i in &doms {
            for &j in &subs {
                let r2 = rmin2(&particles[i], &particles[j], dt);
                let dcritsum = Self::dcritsum(dcrit, shell, i, j);
                self.maybe_record_collision(particles, i, j, r2);
                if r2 < dcritsum * dcritsum {
                    if !self.map_dominant[shell + 1].contains(&i) {
                        self.map_dominant[shell + 1].push(i);
                        self.inshell_dominant[i] = shell + 1;
                    }
                    if !self.map_subdominant[shell + 1].contains(&j) {
                        self.map_subdominant[shell + 1].push(j);
                        self.inshell_subdominant[j] = shell + 1;
                    }
                } else {
                    self.update_maxdrift_dominant_pair(i, j, r2, dcritsum);
                }
            }
        }
    }

    fn scan_encounter_encounter(
        &mut self,
        shell: usize,
        dt: f64,
        particles: &mut ParticleSet,
        dcrit: &CriticalRadiusTable,
    ) {
        let members = self.map_encounter[shell].clone();
        for a in 0..members.len() {
            for b in (a + 1)..members.len() {
                let (i, j) = (members[a], members[b]);
                let r2 = rmin2(&particles[i], &particles[j], dt);
                let dcritsum = Self::dcritsum(dcrit, shell, i, j);
                self.maybe_record_collision(particles, i, j, r2);
                if r2 < dcritsum * dcritsum {
                    if !self.map_encounter[shell + 1].contains(&i) {
                        self.map_encounter[shell + 1].push(i);
                        self.inshell_encounter[i] = shell + 1;
                    }
                    if !self.map_encounter[shell + 1].contains(&j) {
                        self.map_encounter[shell + 1].push(j);
                        self.inshell_encounter[j] = shell + 1;
                    }
                } else {
                    self.update_maxdrift_encounter_pair(i, j, r2, dcritsum);
                }
            }
        }
    }

    fn maybe_record_collision(&mut self, particles: &ParticleSet, i: usize, j: usize, r2: f64) {
        let contact = particles[i].r + particles[j].r;
        if r2 < contact * contact {
            self.collisions.record(particles, i, j);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::MergeOnContact;
    use crate::switching::InfinitelyDifferentiable;
    use glam::DVec3;

    fn three_body_encounter() -> ParticleSet {
        vec![
            // dominant central body
            Particle::new(1000.0, 0.01, DVec3::ZERO, DVec3::ZERO),
            // two light bodies on a near head-on pass
            Particle::new(1e-6, 0.0, DVec3::new(-0.01, 5.0, 0.0), DVec3::new(0.0, -1.0, 0.05)),
            Particle::new(1e-6, 0.0, DVec3::new(0.01, 5.0, 0.0), DVec3::new(0.0, -1.0, -0.05)),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn begin_step_bootstraps_shell_zero() {
        let particles = three_body_encounter();
        let mut membership = ShellMembership::new(particles.len(), 1, 4);
        membership.begin_step(&particles);

        assert_eq!(membership.map_dominant(0), &[0]);
        assert_eq!(membership.map_subdominant(0), &[1, 2]);
        assert_eq!(membership.map_encounter(0), &[1, 2]);
        assert_eq!(membership.t_drifted(0), 0.0);
    }

    #[test]
    fn no_descent_when_bodies_stay_far_apart() {
        let mut particles: ParticleSet = vec![
            Particle::new(1.0, 0.0, DVec3::ZERO, DVec3::ZERO),
            Particle::new(1.0, 0.0, DVec3::new(100.0, 0.0, 0.0), DVec3::ZERO),
        ]
        .into_iter()
        .collect();
        let mut membership = ShellMembership::new(particles.len(), 1, 4);
        membership.begin_step(&particles);

        let mut dcrit = CriticalRadiusTable::new();
        dcrit.recompute(&[1.0, 1.0], 0.1, 1e-3, 0.0, 0.5, &[1.0, 0.5, 0.25, 0.125]);

        let switching = InfinitelyDifferentiable;
        let mut resolver = MergeOnContact;
        let outcome = membership.predict(0, 0.1, &mut particles, &dcrit, &switching, &mut resolver);
        assert!(!outcome.descend);
    }

    #[test]
    fn budget_exhaustion_raises_advisory_once() {
        let mut particles: ParticleSet = vec![
            Particle::new(1.0, 0.0, DVec3::ZERO, DVec3::ZERO),
            Particle::new(1.0, 0.0, DVec3::new(0.001, 0.0, 0.0), DVec3::new(0.0, 10.0, 0.0)),
        ]
        .into_iter()
        .collect();
        let mut membership = ShellMembership::new(particles.len(), 1, 1);
        membership.begin_step(&particles);

        let mut dcrit = CriticalRadiusTable::new();
        dcrit.recompute(&[1.0, 1.0], 0.1, 1e-3, 0.0, 0.5, &[1.0]);

        let switching = InfinitelyDifferentiable;
        let mut resolver = MergeOnContact;
        let outcome = membership.predict(0, 0.1, &mut particles, &dcrit, &switching, &mut resolver);
        assert!(!outcome.descend);
        assert_eq!(
            outcome.advisories,
            vec![MercuranaAdvisory::ShellBudgetExhausted { shell: 0 }]
        );
    }

    #[test]
    fn close_approach_promotes_both_bodies_to_the_next_shell() {
        let mut particles = three_body_encounter();
        let mut membership = ShellMembership::new(particles.len(), 1, 4);
        membership.begin_step(&particles);

        // Tiny kappa => tiny dcrit, so only a genuinely close pass promotes.
        let mut dcrit = CriticalRadiusTable::new();
        dcrit.recompute(&[1000.0, 1e-6, 1e-6], 1.0, 1e-9, 0.0, 0.5, &[1.0, 0.5, 0.25, 0.125]);

        let switching = InfinitelyDifferentiable;
        let mut resolver = MergeOnContact;
        let outcome = membership.predict(0, 1.0, &mut particles, &dcrit, &switching, &mut resolver);

        if outcome.descend {
            assert!(membership.map_encounter(1).contains(&1) || membership.map_dominant(1).contains(&1));
        }
    }
}
