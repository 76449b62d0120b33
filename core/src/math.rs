//! Gas-loading kernel.
//!
//! Implements the Schreiner equation (linear pressure ramp) and the Haldane
//! equation (constant pressure) for a single compartment, plus the
//! exponential seam that lets the transcendental call be replaced with a
//! precomputed table on hardware where `exp` is expensive.
//!
//! Both equations are pure and total for positive decay constants. Time is
//! in minutes, pressures in bar, rates in bar/min.

use std::collections::HashMap;

/// Evaluation of `exp(-k * t)` for a compartment decay constant `k` and a
/// segment duration `t` in minutes.
///
/// The decompression model composes with this trait so the default
/// math-library exponential can be swapped for a table-backed variant.
pub trait ExpCalc: Send + Sync {
    fn exp_minus_kt(&self, k: f64, t: f64) -> f64;
}

/// Default exponential, straight from the math library.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdExp;

impl ExpCalc for StdExp {
    fn exp_minus_kt(&self, k: f64, t: f64) -> f64 {
        (-k * t).exp()
    }
}

/// Table-backed exponential.
///
/// Rows are precomputed per decay constant over a fixed time grid: the keys
/// are the Cartesian product of the registered decay constants and the
/// multiples of `delta` up to the horizon. Off-grid remainders and
/// unregistered constants fall back to the math library, so the result is
/// always exact on grid points and correct everywhere.
#[derive(Debug, Clone)]
pub struct TabExp {
    delta: f64,
    rows: HashMap<u64, Vec<f64>>,
}

impl TabExp {
    /// Build the table for the given decay constants.
    ///
    /// `delta` is the grid spacing in minutes (1.0 for constant-depth
    /// segments; pass the 3-m travel time for linear segments). `horizon`
    /// is the largest tabulated duration in minutes.
    pub fn new(decay_constants: &[f64], delta: f64, horizon: f64) -> Self {
        let n = (horizon / delta).ceil() as usize;
        let rows = decay_constants
            .iter()
            .map(|&k| {
                let e = (-k * delta).exp();
                let mut row = Vec::with_capacity(n + 1);
                let mut acc = 1.0;
                for _ in 0..=n {
                    row.push(acc);
                    acc *= e;
                }
                (k.to_bits(), row)
            })
            .collect();
        TabExp { delta, rows }
    }
}

impl ExpCalc for TabExp {
    fn exp_minus_kt(&self, k: f64, t: f64) -> f64 {
        let Some(row) = self.rows.get(&k.to_bits()) else {
            return (-k * t).exp();
        };
        let steps = (t / self.delta).floor() as usize;
        let steps = steps.min(row.len() - 1);
        let rem = t - steps as f64 * self.delta;
        if rem.abs() < 1e-12 {
            row[steps]
        } else {
            row[steps] * (-k * rem).exp()
        }
    }
}

/// Schreiner equation: compartment pressure after a linear pressure ramp.
///
/// - `p_alv`: inspired partial pressure of the gas at segment start (bar).
/// - `t`: segment duration (min).
/// - `r`: rate of change of the inspired partial pressure (bar/min), i.e.
///   the ambient pressure rate scaled by the gas fraction. Negative on
///   ascent, positive on descent.
/// - `k`: compartment decay constant, `ln 2 / half_time`.
/// - `p0`: compartment pressure at segment start (bar).
pub fn schreiner(p_alv: f64, t: f64, r: f64, k: f64, p0: f64, exp: &dyn ExpCalc) -> f64 {
    if t <= 0.0 {
        return p0;
    }
    p_alv + r * (t - 1.0 / k) - (p_alv - p0 - r / k) * exp.exp_minus_kt(k, t)
}

/// Haldane equation: compartment pressure after constant-depth exposure.
///
/// `p_alv` is the inspired partial pressure held throughout; the remaining
/// parameters are as in [`schreiner`].
pub fn haldane(p_alv: f64, t: f64, k: f64, p0: f64, exp: &dyn ExpCalc) -> f64 {
    if t <= 0.0 {
        return p0;
    }
    p0 + (p_alv - p0) * (1.0 - exp.exp_minus_kt(k, t))
}

#[cfg(test)]
mod tests {
    use super::*;

    const WVP: f64 = 0.0627;

    fn k(half_time: f64) -> f64 {
        2.0_f64.ln() / half_time
    }

    /// Inspired partial pressure for a fraction at absolute pressure.
    fn p_alv(abs_p: f64, f_gas: f64) -> f64 {
        f_gas * (abs_p - WVP)
    }

    #[test]
    fn test_schreiner_air_ascent() {
        // 1 min of ascent at -1 bar/min on air, 5 min compartment.
        let v = schreiner(p_alv(4.0, 0.79), 1.0, -0.79, k(5.0), 3.0, &StdExp);
        assert!((v - 2.96198).abs() < 1e-4, "got {v}");
    }

    #[test]
    fn test_schreiner_air_descent() {
        let v = schreiner(p_alv(4.0, 0.79), 1.0, 0.79, k(5.0), 3.0, &StdExp);
        assert!((v - 3.06661).abs() < 1e-4, "got {v}");
    }

    #[test]
    fn test_schreiner_ean_ascent() {
        // EAN32 carries 68% N2.
        let v = schreiner(p_alv(4.0, 0.68), 1.0, -0.68, k(5.0), 3.0, &StdExp);
        assert!((v - 2.9132).abs() < 1e-4, "got {v}");
    }

    #[test]
    fn test_schreiner_ean_descent() {
        let v = schreiner(p_alv(4.0, 0.68), 1.0, 0.68, k(5.0), 3.0, &StdExp);
        assert!((v - 3.00326).abs() < 1e-4, "got {v}");
    }

    #[test]
    fn test_schreiner_zero_time_is_noop() {
        let v = schreiner(3.1, 0.0, -0.79, k(5.0), 3.0, &StdExp);
        assert_eq!(v, 3.0);
    }

    #[test]
    fn test_haldane_composes() {
        let kc = k(8.0);
        let p_i = 2.5;
        let one = haldane(p_i, 7.0, kc, 0.75, &StdExp);
        let two = haldane(p_i, 4.0, kc, haldane(p_i, 3.0, kc, 0.75, &StdExp), &StdExp);
        assert!(
            (one - two).abs() < 1e-9,
            "split exposure must equal combined: {one} vs {two}"
        );
    }

    #[test]
    fn test_haldane_monotone() {
        let kc = k(12.5);
        // On-gassing: inspired above compartment pressure.
        let mut prev = 1.0;
        for t in 1..30 {
            let v = haldane(3.0, t as f64, kc, 1.0, &StdExp);
            assert!(v > prev, "uptake must increase with time");
            assert!(v < 3.0, "must never overshoot inspired pressure");
            prev = v;
        }
        // Off-gassing: inspired below compartment pressure.
        let mut prev = 3.0;
        for t in 1..30 {
            let v = haldane(1.0, t as f64, kc, 3.0, &StdExp);
            assert!(v < prev, "elimination must decrease with time");
            assert!(v > 1.0);
            prev = v;
        }
    }

    #[test]
    fn test_tab_exp_matches_std_on_grid() {
        let ks = [k(5.0), k(8.0), k(1.88)];
        let tab = TabExp::new(&ks, 1.0, 64.0);
        for &kc in &ks {
            for t in 0..=64 {
                let t = t as f64;
                let expected = (-kc * t).exp();
                let got = tab.exp_minus_kt(kc, t);
                assert!(
                    (got - expected).abs() < 1e-12,
                    "k={kc} t={t}: {got} vs {expected}"
                );
            }
        }
    }

    #[test]
    fn test_tab_exp_off_grid_and_unknown_k() {
        let ks = [k(5.0)];
        let tab = TabExp::new(&ks, 1.0, 64.0);
        // Off-grid duration decomposes into table part and remainder.
        let got = tab.exp_minus_kt(ks[0], 2.5);
        assert!((got - (-ks[0] * 2.5).exp()).abs() < 1e-12);
        // Unregistered decay constant falls back to the math library.
        let got = tab.exp_minus_kt(0.5, 3.0);
        assert!((got - (-0.5_f64 * 3.0).exp()).abs() < 1e-15);
        // Beyond the horizon still correct.
        let got = tab.exp_minus_kt(ks[0], 200.0);
        assert!((got - (-ks[0] * 200.0).exp()).abs() < 1e-12);
    }
}
