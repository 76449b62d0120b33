//! Profile expansion and per-tissue sample records.
//!
//! The engine emits logical steps only. For visualisation or export a
//! host can re-emit each step as fixed-interval samples, replaying the
//! step's segment through the model with partial durations, and flatten
//! any step into one row per compartment matching the documented CSV
//! schema. No I/O happens here.

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::engine::DiveStep;
use crate::gas::GasMix;
use crate::model::{ZhL16, NUM_COMPARTMENTS};

/// One export row: a single compartment at a single step.
///
/// `tissue_gf_limit` is the tolerated pressure under the step's gradient
/// factor; `tissue_limit` is the raw Bühlmann limit (gf = 1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TissueSample {
    pub time: f64,
    pub depth: f64,
    pub pressure: f64,
    pub gas: GasMix,
    /// Compartment number, 1-based.
    pub tissue_no: usize,
    pub tissue_pressure: f64,
    pub tissue_gf_limit: f64,
    pub tissue_limit: f64,
}

/// Flatten a dive step into one row per tissue compartment.
pub fn tissue_samples(model: &ZhL16, config: &Config, step: &DiveStep) -> Vec<TissueSample> {
    (0..NUM_COMPARTMENTS)
        .map(|i| TissueSample {
            time: step.time,
            depth: config.to_depth(step.abs_p),
            pressure: step.abs_p,
            gas: step.gas,
            tissue_no: i + 1,
            tissue_pressure: step.tissues.total(i),
            tissue_gf_limit: model.tolerated_pressure(&step.tissues, i, step.gf),
            tissue_limit: model.tolerated_pressure(&step.tissues, i, 1.0),
        })
        .collect()
}

/// Re-emit logical steps as samples no more than `time_delta` minutes
/// apart.
///
/// Each step's segment is subdivided by replaying it through the model
/// with partial durations; segment endpoints keep the engine's original
/// states, so expansion never changes the plan.
pub fn expand(model: &ZhL16, steps: &[DiveStep], time_delta: f64) -> Vec<DiveStep> {
    let mut out = Vec::new();
    let Some(first) = steps.first() else {
        return out;
    };
    out.push(first.clone());

    for pair in steps.windows(2) {
        let (prev, cur) = (&pair[0], &pair[1]);
        let duration = cur.time - prev.time;
        if duration > time_delta {
            // Ambient rate is zero for held segments, so the replay uses
            // Haldane there and Schreiner on travel, same as the engine.
            let rate = (cur.abs_p - prev.abs_p) / duration;
            let mut tissues = prev.tissues.clone();
            let mut abs_p = prev.abs_p;
            let mut elapsed = 0.0;
            while elapsed + time_delta < duration - 1e-9 {
                tissues = model.load(&tissues, time_delta, rate, abs_p, &cur.gas);
                abs_p += rate * time_delta;
                elapsed += time_delta;
                out.push(DiveStep {
                    phase: cur.phase,
                    abs_p,
                    time: prev.time + elapsed,
                    gas: cur.gas,
                    prev_gas: None,
                    gf: cur.gf,
                    tissues: tissues.clone(),
                });
            }
        }
        out.push(cur.clone());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Engine, Phase};
    use crate::model::Variant;

    fn plan_40_35() -> (Engine, crate::engine::Plan) {
        let engine = Engine::new(Config::default()).unwrap();
        let plan = engine.calculate(40.0, 35.0, &[GasMix::air()]).unwrap();
        (engine, plan)
    }

    #[test]
    fn test_tissue_samples_shape() {
        let (engine, plan) = plan_40_35();
        let step = plan
            .steps
            .iter()
            .find(|s| s.phase == Phase::Const)
            .unwrap();
        let rows = tissue_samples(engine.model(), engine.config(), step);
        assert_eq!(rows.len(), NUM_COMPARTMENTS);
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(row.tissue_no, i + 1);
            assert!((row.depth - 40.0).abs() < 1e-9);
            assert!(row.tissue_pressure > 0.0);
            assert!(
                row.tissue_gf_limit >= row.tissue_limit,
                "a reduced gradient factor must not lower the tolerated pressure"
            );
        }
    }

    #[test]
    fn test_expand_preserves_endpoints() {
        let (engine, plan) = plan_40_35();
        let expanded = expand(engine.model(), &plan.steps, 1.0);
        assert_eq!(expanded.first(), plan.steps.first());
        assert_eq!(expanded.last(), plan.steps.last());
        assert!(expanded.len() >= plan.steps.len());
        for pair in expanded.windows(2) {
            let dt = pair[1].time - pair[0].time;
            assert!(dt >= -1e-9, "samples must not go back in time");
            assert!(dt <= 1.0 + 1e-9, "samples must be at most one delta apart");
        }
    }

    #[test]
    fn test_expand_matches_partial_load() {
        let model = ZhL16::new(Variant::ZhL16B);
        let config = Config::default();
        let engine = Engine::new(config.clone()).unwrap();
        let plan = engine.calculate(30.0, 25.0, &[GasMix::air()]).unwrap();
        let expanded = expand(&model, &plan.steps, 1.0);

        // A sample inside the bottom segment equals loading the segment
        // start state for the partial duration directly.
        let bottom_start = plan
            .steps
            .iter()
            .position(|s| s.phase == Phase::Descent)
            .unwrap();
        let prev = &plan.steps[bottom_start];
        let sample = expanded
            .iter()
            .find(|s| s.phase == Phase::Const && (s.time - prev.time - 2.0).abs() < 1e-9)
            .expect("expansion must produce a sample 2 min into the bottom");
        let direct = model.load(&prev.tissues, 2.0, 0.0, prev.abs_p, &GasMix::air());
        for i in 0..NUM_COMPARTMENTS {
            assert!(
                (sample.tissues.n2[i] - direct.n2[i]).abs() < 1e-9,
                "compartment {i}"
            );
        }
    }

    #[test]
    fn test_expand_empty() {
        let model = ZhL16::new(Variant::ZhL16B);
        assert!(expand(&model, &[], 1.0).is_empty());
    }
}
