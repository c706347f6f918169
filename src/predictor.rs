//! Closest-approach prediction over a linear drift segment.

use crate::particle::Particle;

/// Minimum squared distance between `p1` and `p2` over a drift of signed length `dt`,
/// assuming both particles move linearly (at their current velocities) for `|dt|`.
///
/// Evaluates the squared separation at `tau = 0`, at `tau = |dt|`, and (if it falls
/// inside the interval) at the analytic extremum of the quadratic
/// `|p1(tau) - p2(tau)|^2`, returning the smallest of the candidates.
pub fn rmin2(p1: &Particle, p2: &Particle, dt: f64) -> f64 {
    let dts = dt.signum();
    let dt = dt.abs();

    let dx1 = p1.pos - p2.pos;
    let r1 = dx1.length_squared();

    let dv1 = dts * (p1.vel - p2.vel);
    let dx2 = dx1 + dt * dv1;
    let r2 = dx2.length_squared();

    let mut rmin2 = r1.min(r2);

    let dv_sq = dv1.length_squared();
    if dv_sq > 0.0 {
        let t_closest = dx1.dot(dv1) / dv_sq;
        let frac = t_closest / dt;
        if (0.0..=1.0).contains(&frac) {
            let dx3 = dx1 + t_closest * dv1;
            rmin2 = rmin2.min(dx3.length_squared());
        }
    }

    rmin2
}

/// Same as [`rmin2`], but `p2` is first linearly advanced by `p2_drift` (its own
/// velocity times that time offset) before the comparison.
///
/// Used when comparing two particles whose `t_drifted` differs within the current
/// global step: advancing `p2` by the difference puts both particles on the same
/// timeline before the closest-approach estimate is computed.
pub fn rmin2_drifted(p1: &Particle, p2: &Particle, dt: f64, p2_drift: f64) -> f64 {
    let mut p2_drifted = *p2;
    p2_drifted.pos += p2_drift * p2_drifted.vel;
    rmin2(p1, &p2_drifted, dt)
}
