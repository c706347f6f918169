//! Critical-radius table: the per-shell, per-particle encounter threshold that
//! drives promotion decisions in [`crate::shell`].

use crate::constants::{CBRT_NEWTON_ITERATIONS, G};
use crate::eos::EosScheme;

/// Platform-independent cube root via Newton's method, matching the original's
/// `sqrt3` helper (a fixed iteration count rather than a libm `cbrt` call, so the
/// table is bit-reproducible across targets).
///
/// `x` must be non-negative; returns `0.0` for `x == 0.0`.
pub fn cbrt_newton(x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    let mut guess = x;
    for _ in 0..CBRT_NEWTON_ITERATIONS {
        guess -= (guess * guess * guess - x) / (3.0 * guess * guess);
    }
    guess
}

/// The table `dcrit[s][i]`: critical radius at shell `s` for particle `i`,
/// monotonic non-increasing in `s`.
#[derive(Debug, Clone, Default)]
pub struct CriticalRadiusTable {
    rows: Vec<Vec<f64>>,
}

impl CriticalRadiusTable {
    pub fn new() -> Self {
        Self { rows: Vec::new() }
    }

    /// `dcrit[s][i]`, or `0.0` if either index is out of range (treated as "no
    /// encounter threshold" rather than panicking, since a stale table queried
    /// mid-resize is a recoverable condition the caller handles by recomputing).
    pub fn get(&self, shell: usize, particle: usize) -> f64 {
        self.rows
            .get(shell)
            .and_then(|row| row.get(particle))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn shells(&self) -> usize {
        self.rows.len()
    }

    /// Recompute every row from scratch.
    ///
    /// `masses` gives each particle's mass; `dt` is the current global step;
    /// `kappa` controls encounter sensitivity; `gm0r0`, when positive, enables
    /// the relativistic-scale blend; `alpha` is the shell-depth exponent;
    /// `shell_dt_fraction(s)` returns the shell-`s` longest drift sub-step as a
    /// fraction of the shell-0 step, obtained by chaining
    /// [`EosScheme::longest_drift_fraction`] down through the descent.
    #[allow(clippy::too_many_arguments)]
    pub fn recompute(
        &mut self,
        masses: &[f64],
        dt: f64,
        kappa: f64,
        gm0r0: f64,
        alpha: f64,
        shell_dt_fractions: &[f64],
    ) {
        let n = masses.len();
        self.rows = Vec::with_capacity(shell_dt_fractions.len());

        for &frac in shell_dt_fractions {
            let mut row = Vec::with_capacity(n);
            for &m in masses {
                let d_grav_cubed = G * dt * dt * m / kappa;
                let mut d = cbrt_newton(d_grav_cubed);

                if gm0r0 > 0.0 {
                    let d_rel_fourth = (G * G * dt * dt * m * m) / (gm0r0 * kappa);
                    let d_rel = d_rel_fourth.sqrt().sqrt();
                    d = d.max(d_rel);
                }

                let scale = if alpha == 0.5 {
                    frac.sqrt()
                } else {
                    frac.powf(alpha)
                };
                row.push(scale * d);
            }
            self.rows.push(row);
        }
    }

    /// Chain per-scheme longest-drift fractions into shell-0-relative step
    /// fractions, one entry per shell depth from 0 to `shell_schemes.len()`.
    ///
    /// `shell_schemes[s]` is the scheme used to descend from shell `s` to `s+1`;
    /// the returned vector has length `shell_schemes.len() + 1`, with entry `0`
    /// always `1.0` (shell 0 has no parent sub-stepping).
    ///
    /// Mirrors `reb_integrator_mercurana_part1`'s per-shell loop: at each level
    /// the running fraction is multiplied by the scheme's longest-drift
    /// coefficient, then divided by that shell's sub-step count (`n0` at shell
    /// 0, `n1` at any deeper shell, falling back to `n0` when `n1 == 0`).
    pub fn chain_shell_dt_fractions(shell_schemes: &[EosScheme], n0: usize, n1: usize) -> Vec<f64> {
        let mut fractions = Vec::with_capacity(shell_schemes.len() + 1);
        fractions.push(1.0);
        let mut acc = 1.0;
        for (s, &scheme) in shell_schemes.iter().enumerate() {
            let n = if s > 0 && n1 > 0 { n1 } else { n0 };
            acc *= scheme.longest_drift_fraction();
            acc /= n.max(1) as f64;
            fractions.push(acc);
        }
        fractions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn cbrt_newton_matches_libm_cbrt() {
        for x in [1.0, 8.0, 27.0, 0.001, 1e10] {
            assert_abs_diff_eq!(cbrt_newton(x), x.cbrt(), epsilon = 1e-9 * x.cbrt().max(1.0));
        }
    }

    #[test]
    fn cbrt_newton_of_zero_is_zero() {
        assert_eq!(cbrt_newton(0.0), 0.0);
    }

    #[test]
    fn dcrit_is_monotonic_non_increasing_in_shell() {
        let fractions = vec![1.0, 0.5, 0.25];
        let mut table = CriticalRadiusTable::new();
        table.recompute(&[1.0, 2.0], 0.1, 1e-3, 0.0, 0.5, &fractions);

        for i in 0..2 {
            let mut prev = f64::INFINITY;
            for s in 0..3 {
                let v = table.get(s, i);
                assert!(v <= prev + 1e-15);
                prev = v;
            }
        }
    }

    #[test]
    fn relativistic_term_can_dominate() {
        let fractions = vec![1.0];
        let mut table = CriticalRadiusTable::new();
        // Enormous gm0r0 suppresses the relativistic term so it should equal the
        // pure-gravity case; tiny gm0r0 makes it dominate instead.
        table.recompute(&[1.0], 1.0, 1e-3, 1e12, 0.5, &fractions);
        let suppressed = table.get(0, 0);

        let mut table2 = CriticalRadiusTable::new();
        table2.recompute(&[1.0], 1.0, 1e-3, 0.0, 0.5, &fractions);
        let baseline = table2.get(0, 0);

        assert_abs_diff_eq!(suppressed, baseline, epsilon = 1e-6);

        let mut table3 = CriticalRadiusTable::new();
        table3.recompute(&[1.0], 1.0, 1e-3, 1e-12, 0.5, &fractions);
        assert!(table3.get(0, 0) > baseline);
    }

    #[test]
    fn chain_fractions_start_at_one_and_shrink() {
        let schemes = vec![EosScheme::Lf, EosScheme::Lf4];
        let fractions = CriticalRadiusTable::chain_shell_dt_fractions(&schemes, 2, 2);
        assert_eq!(fractions.len(), 3);
        assert_eq!(fractions[0], 1.0);
        assert!(fractions[1] < fractions[0]);
        assert!(fractions[2] < fractions[1]);
    }

    #[test]
    fn chain_fractions_divide_by_substep_count() {
        let schemes = vec![EosScheme::Lf];
        let fractions_n2 = CriticalRadiusTable::chain_shell_dt_fractions(&schemes, 2, 2);
        let fractions_n4 = CriticalRadiusTable::chain_shell_dt_fractions(&schemes, 4, 4);
        // Doubling n0 halves the shell-1 fraction (LF's longest-drift coefficient
        // is the same in both cases; only the division by n differs).
        assert_abs_diff_eq!(fractions_n2[1], fractions_n4[1] * 2.0, epsilon = 1e-12);
    }

    #[test]
    fn chain_fractions_fall_back_to_n0_when_n1_is_zero() {
        let schemes = vec![EosScheme::Lf, EosScheme::Lf];
        let fractions = CriticalRadiusTable::chain_shell_dt_fractions(&schemes, 2, 0);
        let fractions_explicit = CriticalRadiusTable::chain_shell_dt_fractions(&schemes, 2, 2);
        assert_abs_diff_eq!(fractions[2], fractions_explicit[2], epsilon = 1e-12);
    }
}
