//! Ascent-ceiling search primitives.
//!
//! Everything here derives from one predicate: an ascent is valid when the
//! model's ceiling does not exceed the target pressure (within a small
//! epsilon for floating noise). On top of it sit the two first-stop
//! finders, the stop-length search and the speculative gas-switch check.

use crate::config::{round_down_3m, round_up_3m, Config, DEPTH_EPSILON};
use crate::error::PlanError;
use crate::gas::GasMix;
use crate::model::{TissueState, ZhL16, P_WATER_VAPOUR};

/// Pressure tolerance (bar) for ascent-validity checks.
pub const PRESSURE_EPSILON: f64 = 1e-6;

/// Coarse step of the stop-length linear scan, in stop-time units.
const STOP_SCAN_STEP: u64 = 64;

/// Hard bound on the stop-length scan (min); beyond this the off-gassing
/// gradient is too small for the stop ever to clear.
const STOP_SCAN_LIMIT: f64 = 1440.0;

/// True when the diver may ascend from `state` to the target pressure
/// without breaching the gradient-factor-adjusted ceiling.
pub fn ascent_valid(model: &ZhL16, state: &TissueState, gf: f64, p_target: f64) -> bool {
    model.ceiling_limit(state, gf) <= p_target + PRESSURE_EPSILON
}

/// Depth at which the leading compartment stops off-gassing on the given
/// mix. A decompression stop below this depth can never clear.
pub(crate) fn deco_zone_depth(config: &Config, state: &TissueState, gas: &GasMix) -> f64 {
    if gas.inert() <= 0.0 {
        return f64::INFINITY;
    }
    config.to_depth(state.max_total() / gas.inert() + P_WATER_VAPOUR)
}

/// Find the largest `k` in `1..=n` for which `f(k)` holds, or 0 when none
/// does. `f` must be monotone: true on a prefix, false after.
pub(crate) fn bisect_find<F: FnMut(usize) -> bool>(n: usize, mut f: F) -> usize {
    let mut lo = 1;
    let mut hi = n + 1;
    while lo < hi {
        let k = (lo + hi) / 2;
        if f(k) {
            lo = k + 1;
        } else {
            hi = k;
        }
    }
    hi - 1
}

/// First decompression stop, with tissues advanced to it.
#[derive(Debug, Clone)]
pub struct FirstStop {
    /// Stop depth (m), on the 3-m grid.
    pub depth: f64,
    /// Absolute pressure at the stop (bar).
    pub abs_p: f64,
    /// Ascent time spent reaching the stop (min).
    pub time: f64,
    /// Tissue state on arrival.
    pub tissues: TissueState,
}

/// Strategy for locating the first decompression stop between two
/// pressures. Returns `None` when the ascent is clean all the way to
/// `p_to`.
pub trait FirstStopFinder {
    fn find_first_stop(
        &self,
        model: &ZhL16,
        config: &Config,
        state: &TissueState,
        p_from: f64,
        p_to: f64,
        gas: &GasMix,
        gf: f64,
    ) -> Result<Option<FirstStop>, PlanError>;
}

/// Default finder: the stepwise ceiling chase.
///
/// Repeatedly rounds the ceiling up to the 3-m grid and ascends to it,
/// re-projecting the ceiling after every leg. When on-gassing during a
/// projected leg would breach the ceiling at arrival, the candidate stop is
/// deepened one grid step at a time before committing.
#[derive(Debug, Clone, Copy, Default)]
pub struct StepwiseChase;

/// Alternative finder: bisection over the 3-m grid between the target and
/// the current depth. Usually agrees with the chase; may pick a shallower
/// stop when the ceiling moves a lot during the ascent.
#[derive(Debug, Clone, Copy, Default)]
pub struct DepthBisect;

impl FirstStopFinder for StepwiseChase {
    fn find_first_stop(
        &self,
        model: &ZhL16,
        config: &Config,
        state: &TissueState,
        p_from: f64,
        p_to: f64,
        gas: &GasMix,
        gf: f64,
    ) -> Result<Option<FirstStop>, PlanError> {
        let rate = -(config.ascent_rate * config.meter_to_bar);
        let depth_to = config.to_depth(p_to).max(0.0);
        let min_stop = round_up_3m(depth_to).max(config.last_stop_depth);
        let mut depth = config.to_depth(p_from);
        let mut state = state.clone();
        let mut elapsed = 0.0;

        loop {
            let d_ceil = config.to_depth(model.ceiling_limit(&state, gf)).max(0.0);
            let raw = round_up_3m(d_ceil);
            if raw <= depth_to + DEPTH_EPSILON {
                tracing::trace!(depth, depth_to, "ceiling clear of target, no stop");
                return Ok(None);
            }
            let mut candidate = raw.max(min_stop);
            loop {
                if candidate >= depth - DEPTH_EPSILON {
                    // No shallower grid depth is reachable; the stop is
                    // where we stand, provided that is a grid depth.
                    return if (round_up_3m(depth) - depth).abs() <= DEPTH_EPSILON {
                        tracing::debug!(depth, "first stop pinned at current depth");
                        Ok(Some(FirstStop {
                            depth,
                            abs_p: config.to_pressure(depth),
                            time: elapsed,
                            tissues: state,
                        }))
                    } else {
                        Err(PlanError::StopBelowDecoZone {
                            depth: candidate,
                            gas: *gas,
                        })
                    };
                }
                let t = (depth - candidate) / config.ascent_rate;
                let trial = model.load(&state, t, rate, config.to_pressure(depth), gas);
                if ascent_valid(model, &trial, gf, config.to_pressure(candidate)) {
                    state = trial;
                    elapsed += t;
                    depth = candidate;
                    break;
                }
                // On-gassing during the projected leg raised the ceiling
                // above the candidate; deepen one grid step.
                candidate += 3.0;
                tracing::trace!(candidate, "projected ascent breached ceiling, deepening");
                if candidate > deco_zone_depth(config, &state, gas) + DEPTH_EPSILON {
                    return Err(PlanError::StopBelowDecoZone {
                        depth: candidate,
                        gas: *gas,
                    });
                }
            }
        }
    }
}

impl FirstStopFinder for DepthBisect {
    fn find_first_stop(
        &self,
        model: &ZhL16,
        config: &Config,
        state: &TissueState,
        p_from: f64,
        p_to: f64,
        gas: &GasMix,
        gf: f64,
    ) -> Result<Option<FirstStop>, PlanError> {
        let rate = -(config.ascent_rate * config.meter_to_bar);
        let depth_to = config.to_depth(p_to).max(0.0);
        let min_stop = round_up_3m(depth_to).max(config.last_stop_depth);
        let depth = config.to_depth(p_from);
        if depth <= depth_to + DEPTH_EPSILON {
            return Ok(None);
        }

        // Grid candidates from deep to shallow, the stage target last.
        let mut candidates = Vec::new();
        let mut d = round_down_3m(depth);
        if (d - depth).abs() <= DEPTH_EPSILON {
            d -= 3.0;
        }
        while d > min_stop + DEPTH_EPSILON {
            candidates.push(d);
            d -= 3.0;
        }
        if min_stop > depth_to + DEPTH_EPSILON && min_stop < depth - DEPTH_EPSILON {
            candidates.push(min_stop);
        }
        candidates.push(depth_to);

        let n = candidates.len();
        let probe = |target: f64| {
            let t = (depth - target) / config.ascent_rate;
            let trial = model.load(state, t, rate, p_from, gas);
            ascent_valid(model, &trial, gf, config.to_pressure(target))
        };
        let k = bisect_find(n, |k| probe(candidates[k - 1]));
        if k == n {
            return Ok(None);
        }
        if k == 0 {
            return if (round_up_3m(depth) - depth).abs() <= DEPTH_EPSILON {
                Ok(Some(FirstStop {
                    depth,
                    abs_p: config.to_pressure(depth),
                    time: 0.0,
                    tissues: state.clone(),
                }))
            } else {
                Err(PlanError::StopBelowDecoZone {
                    depth: round_up_3m(depth),
                    gas: *gas,
                })
            };
        }
        let stop = candidates[k - 1];
        let t = (depth - stop) / config.ascent_rate;
        let tissues = model.load(state, t, rate, p_from, gas);
        tracing::debug!(stop, "bisect found first stop");
        Ok(Some(FirstStop {
            depth: stop,
            abs_p: config.to_pressure(stop),
            time: t,
            tissues,
        }))
    }
}

/// Minimum hold at a decompression stop before ascent to the next one is
/// allowed.
///
/// `gf_next` is the gradient factor that will apply at the next stop.
/// Returns the stop time as a multiple of the configured granularity,
/// never less than one unit. Linear scan in coarse steps, then bisection
/// of the bracketing interval.
pub fn stop_length(
    model: &ZhL16,
    config: &Config,
    state: &TissueState,
    depth_stop: f64,
    p_next: f64,
    gas: &GasMix,
    gf_next: f64,
) -> Result<f64, PlanError> {
    let p_stop = config.to_pressure(depth_stop);
    let unit = config.min_stop_time;
    let valid = |m: u64| {
        let trial = model.load(state, m as f64 * unit, 0.0, p_stop, gas);
        ascent_valid(model, &trial, gf_next, p_next)
    };

    if valid(0) {
        return Ok(unit);
    }
    let mut m = 0u64;
    while !valid(m + STOP_SCAN_STEP) {
        m += STOP_SCAN_STEP;
        if m as f64 * unit > STOP_SCAN_LIMIT {
            return Err(PlanError::StopSearchDiverged {
                depth: depth_stop,
                gas: *gas,
            });
        }
    }
    let (mut lo, mut hi) = (m, m + STOP_SCAN_STEP);
    while hi - lo > 1 {
        let mid = (lo + hi) / 2;
        if valid(mid) {
            hi = mid;
        } else {
            lo = mid;
        }
    }
    tracing::trace!(depth_stop, minutes = hi as f64 * unit, "stop length found");
    Ok(hi as f64 * unit)
}

/// Speculative validity of a 3-step gas switch: ascend to the switch
/// depth on the old mix, change mix, ascend to the next grid depth on the
/// new mix. Valid when no leg breaches the ceiling.
pub fn gas_switch_valid(
    model: &ZhL16,
    config: &Config,
    state: &TissueState,
    depth_from: f64,
    old_gas: &GasMix,
    new_gas: &GasMix,
    gf: f64,
) -> bool {
    let rate = -(config.ascent_rate * config.meter_to_bar);
    let mut s = state.clone();
    let mut d = depth_from;
    let legs = [
        (new_gas.switch_depth, *old_gas),
        (round_down_3m(new_gas.switch_depth), *new_gas),
    ];
    for (target, gas) in legs {
        if target < d - DEPTH_EPSILON {
            let t = (d - target) / config.ascent_rate;
            s = model.load(&s, t, rate, config.to_pressure(d), &gas);
            d = target;
        }
        if !ascent_valid(model, &s, gf, config.to_pressure(d)) {
            return false;
        }
    }
    true
}
