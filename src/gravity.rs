//! Gravity evaluation: the trait a host supplies to fill in accelerations, plus
//! a direct-summation reference implementation with switching-function blending.

use crate::constants::G;
use crate::particle::ParticleSet;
use crate::switching::SwitchingFunction;
use glam::DVec3;

/// A source of gravitational acceleration, invoked by the shell operator during
/// every kick.
///
/// `shell` identifies which shell's kick is in progress; implementations that
/// only care about total force can ignore it, but a host wanting to add
/// non-gravitational per-shell forces (e.g. radiation pressure active only at
/// the innermost shell) can branch on it.
pub trait GravitySource {
    /// Fill in `particles[i].acc` for every `i`, accumulating the force from
    /// the pair range `[lo, hi)` blended by `switching` across shells `ri`/`ro`.
    fn accelerate(
        &self,
        particles: &mut ParticleSet,
        switching: &dyn SwitchingFunction,
        ri: f64,
        ro: f64,
    );
}

/// Reference O(N^2) pairwise Newtonian gravity, with the pair force scaled by
/// `1 - L(d; ri, ro)` so that the shell's own close-encounter sub-stepping can
/// take over the blended-in remainder (SPEC_FULL.md §4.5).
///
/// Passing `ri == ro == 0.0` disables blending (`L` is always `1`, i.e. full
/// direct force), which is what the outermost shell (no further refinement)
/// uses.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectSummation;

impl GravitySource for DirectSummation {
    fn accelerate(
        &self,
        particles: &mut ParticleSet,
        switching: &dyn SwitchingFunction,
        ri: f64,
        ro: f64,
    ) {
        let n = particles.len();
        for p in particles.iter_mut() {
            p.acc = DVec3::ZERO;
        }

        for i in 0..n {
            for j in (i + 1)..n {
                let dx = particles[i].pos - particles[j].pos;
                let d2 = dx.length_squared();
                if d2 == 0.0 {
                    continue;
                }
                let d = d2.sqrt();

                let weight = if ri == 0.0 && ro == 0.0 {
                    1.0
                } else {
                    1.0 - switching.l(d, ri, ro)
                };
                if weight == 0.0 {
                    continue;
                }

                let inv_d3 = weight / (d2 * d);
                let acc_i = -G * particles[j].m * inv_d3 * dx;
                let acc_j = G * particles[i].m * inv_d3 * dx;
                particles[i].acc += acc_i;
                particles[j].acc += acc_j;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particle::Particle;
    use crate::switching::InfinitelyDifferentiable;
    use approx::assert_abs_diff_eq;

    #[test]
    fn two_body_force_is_newtonian_and_opposite() {
        let mut particles: ParticleSet = vec![
            Particle::new(1.0, 0.0, DVec3::ZERO, DVec3::ZERO),
            Particle::new(2.0, 0.0, DVec3::new(2.0, 0.0, 0.0), DVec3::ZERO),
        ]
        .into_iter()
        .collect();

        let switching = InfinitelyDifferentiable;
        DirectSummation.accelerate(&mut particles, &switching, 0.0, 0.0);

        // a_i = G m_j / d^2, directed toward particle j.
        let expected_mag = G * 2.0 / 4.0;
        assert_abs_diff_eq!(particles[0].acc.x, expected_mag, epsilon = 1e-12);
        assert_abs_diff_eq!(particles[0].acc.y, 0.0, epsilon = 1e-12);

        let expected_mag_j = G * 1.0 / 4.0;
        assert_abs_diff_eq!(particles[1].acc.x, -expected_mag_j, epsilon = 1e-12);
    }

    #[test]
    fn full_blend_radius_zeroes_the_force() {
        let mut particles: ParticleSet = vec![
            Particle::new(1.0, 0.0, DVec3::ZERO, DVec3::ZERO),
            Particle::new(2.0, 0.0, DVec3::new(1.5, 0.0, 0.0), DVec3::ZERO),
        ]
        .into_iter()
        .collect();

        let switching = InfinitelyDifferentiable;
        // d = 1.5 is above ro = 1.0, so L = 1 and weight = 1 - L = 0.
        DirectSummation.accelerate(&mut particles, &switching, 0.5, 1.0);
        assert_eq!(particles[0].acc, DVec3::ZERO);
        assert_eq!(particles[1].acc, DVec3::ZERO);
    }

    #[test]
    fn coincident_particles_do_not_produce_nan() {
        let mut particles: ParticleSet = vec![
            Particle::new(1.0, 0.0, DVec3::ZERO, DVec3::ZERO),
            Particle::new(1.0, 0.0, DVec3::ZERO, DVec3::ZERO),
        ]
        .into_iter()
        .collect();
        let switching = InfinitelyDifferentiable;
        DirectSummation.accelerate(&mut particles, &switching, 0.0, 0.0);
        assert_eq!(particles[0].acc, DVec3::ZERO);
        assert_eq!(particles[1].acc, DVec3::ZERO);
    }
}
