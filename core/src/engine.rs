//! Dive engine.
//!
//! Owns the running tissue state and clock for one planning call, proposes
//! tentative segments to the decompression model and emits the resulting
//! dive steps: descent, bottom segment, gas switches, free ascent and the
//! staged decompression stops, together with the decompression table.
//!
//! The engine is stateless between runs; either a full plan is produced or
//! an error is raised and nothing is returned.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::config::{round_down_3m, round_up_3m, Config, DEPTH_EPSILON};
use crate::error::{ConfigError, EngineError};
use crate::gas::GasMix;
use crate::model::{TissueState, ZhL16};
use crate::search::{
    ascent_valid, gas_switch_valid, stop_length, FirstStopFinder, StepwiseChase,
};

/// Phase of a dive step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Start,
    Descent,
    Const,
    Ascent,
    DecoStop,
    GasSwitch,
}

/// One planned step of the dive.
///
/// `abs_p` is the absolute pressure at the step's end, `gas` the mix
/// breathed to reach it and `time` the cumulative runtime in minutes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiveStep {
    pub phase: Phase,
    pub abs_p: f64,
    pub time: f64,
    pub gas: GasMix,
    /// The mix in use before a gas switch; set on `GasSwitch` steps only.
    pub prev_gas: Option<GasMix>,
    /// Gradient factor the step was planned under.
    pub gf: f64,
    pub tissues: TissueState,
}

/// One entry of the decompression table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecoStop {
    /// Stop depth (m).
    pub depth: f64,
    /// Stop time (min).
    pub time: f64,
}

/// The decompression table, deepest stop first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecoTable {
    pub stops: Vec<DecoStop>,
}

impl DecoTable {
    /// Total decompression time (min).
    pub fn total(&self) -> f64 {
        self.stops.iter().map(|s| s.time).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }
}

/// A complete plan: the ordered step sequence and the deco table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub steps: Vec<DiveStep>,
    pub deco_table: DecoTable,
}

/// The dive decompression engine.
pub struct Engine {
    config: Config,
    model: ZhL16,
    finder: Box<dyn FirstStopFinder>,
}

impl Engine {
    /// Create an engine from a configuration, with the default model
    /// backend and the stepwise first-stop finder.
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        config.validate()?;
        let model = ZhL16::new(config.variant);
        Ok(Engine {
            config,
            model,
            finder: Box::new(StepwiseChase),
        })
    }

    /// Create an engine with a custom model and first-stop strategy.
    pub fn with_parts(
        config: Config,
        model: ZhL16,
        finder: Box<dyn FirstStopFinder>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Engine {
            config,
            model,
            finder,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn model(&self) -> &ZhL16 {
        &self.model
    }

    /// Plan a dive to `bottom_depth` metres with `bottom_time` minutes of
    /// runtime (descent included), breathing from `gas_list`.
    ///
    /// The gas list holds the bottom mix anchored at 0 m plus any
    /// decompression mixes with their switch depths.
    pub fn calculate(
        &self,
        bottom_depth: f64,
        bottom_time: f64,
        gas_list: &[GasMix],
    ) -> Result<Plan, EngineError> {
        self.config.validate()?;
        let (bottom_gas, mut pending) = validate_gas_list(gas_list, bottom_depth)?;
        let cfg = &self.config;

        let descent_time = bottom_depth / cfg.descent_rate;
        if bottom_time < descent_time {
            return Err(ConfigError::BottomTime {
                bottom_time,
                descent_time,
            }
            .into());
        }

        let mut run = Run {
            engine: self,
            state: self.model.init(cfg.surface_pressure),
            time: 0.0,
            gas: bottom_gas,
            steps: Vec::new(),
            table: Vec::new(),
        };
        run.push(Phase::Start, 0.0, cfg.gf_low, None);

        // Descent and bottom segment.
        run.state = self.model.load(
            &run.state,
            descent_time,
            cfg.descent_rate * cfg.meter_to_bar,
            cfg.surface_pressure,
            &bottom_gas,
        );
        run.time += descent_time;
        run.push(Phase::Descent, bottom_depth, cfg.gf_low, None);

        let hold = bottom_time - descent_time;
        run.state = self
            .model
            .load(&run.state, hold, 0.0, cfg.to_pressure(bottom_depth), &bottom_gas);
        run.time += hold;
        run.push(Phase::Const, bottom_depth, cfg.gf_low, None);

        // NDL check: a hypothetical direct ascent judged at gf high.
        let direct_time = bottom_depth / cfg.ascent_rate;
        let direct = self.model.load(
            &run.state,
            direct_time,
            -(cfg.ascent_rate * cfg.meter_to_bar),
            cfg.to_pressure(bottom_depth),
            &bottom_gas,
        );
        if ascent_valid(&self.model, &direct, cfg.gf_high, cfg.surface_pressure) {
            tracing::debug!(bottom_depth, bottom_time, "NDL dive, surfacing directly");
            run.state = direct;
            run.time += direct_time;
            run.push(Phase::Ascent, 0.0, cfg.gf_high, None);
            return Ok(run.into_plan());
        }

        // Free-ascent stages delimited by gas-switch depths.
        let mut depth = bottom_depth;
        let first_stop;
        loop {
            let target = pending
                .front()
                .map(|g| round_up_3m(g.switch_depth))
                .unwrap_or(0.0);
            let found = self.finder.find_first_stop(
                &self.model,
                cfg,
                &run.state,
                cfg.to_pressure(depth),
                cfg.to_pressure(target),
                &run.gas,
                cfg.gf_low,
            )?;
            match found {
                Some(stop) => {
                    tracing::debug!(stop.depth, "first deco stop");
                    if stop.depth < depth - DEPTH_EPSILON {
                        run.state = stop.tissues;
                        run.time += stop.time;
                        run.push(Phase::Ascent, stop.depth, cfg.gf_low, None);
                    }
                    first_stop = stop.depth;
                    depth = stop.depth;
                    break;
                }
                None => {
                    if depth > target + DEPTH_EPSILON {
                        run.ascend(depth, target, cfg.gf_low);
                        depth = target;
                    }
                    let Some(next_gas) = pending.front().copied() else {
                        // Clean ascent all the way to the surface.
                        return Ok(run.into_plan());
                    };
                    if !gas_switch_valid(
                        &self.model,
                        cfg,
                        &run.state,
                        depth,
                        &run.gas,
                        &next_gas,
                        cfg.gf_low,
                    ) {
                        tracing::debug!(
                            switch_depth = next_gas.switch_depth,
                            "gas switch would breach ceiling, entering deco here"
                        );
                        first_stop = depth;
                        break;
                    }
                    pending.pop_front();
                    let sw = next_gas.switch_depth;
                    if sw < depth - DEPTH_EPSILON {
                        run.ascend(depth, sw, cfg.gf_low);
                        depth = sw;
                    }
                    run.switch(next_gas, depth, cfg.gf_low);
                    let aligned = round_down_3m(sw);
                    if aligned < depth - DEPTH_EPSILON {
                        run.ascend(depth, aligned, cfg.gf_low);
                        depth = aligned;
                    }
                }
            }
        }

        // Decompression loop. The first stop fixes the gradient factor
        // interpolation towards gf high at the surface.
        let gf_at = |d: f64| cfg.gf_high + (d / first_stop) * (cfg.gf_low - cfg.gf_high);
        let mut d = depth;
        while d > DEPTH_EPSILON {
            while let Some(g) = pending.front() {
                if round_down_3m(g.switch_depth) >= d - DEPTH_EPSILON {
                    let g = *g;
                    pending.pop_front();
                    run.switch(g, d, gf_at(d));
                } else {
                    break;
                }
            }
            let d_next = if d - 3.0 < cfg.last_stop_depth - DEPTH_EPSILON {
                0.0
            } else {
                d - 3.0
            };
            let gf_next = gf_at(d_next);
            let t = stop_length(
                &self.model,
                cfg,
                &run.state,
                d,
                cfg.to_pressure(d_next),
                &run.gas,
                gf_next,
            )?;
            tracing::debug!(depth = d, minutes = t, gas = %run.gas, "deco stop");
            run.state = self
                .model
                .load(&run.state, t, 0.0, cfg.to_pressure(d), &run.gas);
            run.time += t;
            run.push(Phase::DecoStop, d, gf_at(d), None);
            run.table.push(DecoStop { depth: d, time: t });
            run.ascend(d, d_next, gf_next);
            d = d_next;
        }
        Ok(run.into_plan())
    }
}

/// Running state of one planning call.
struct Run<'a> {
    engine: &'a Engine,
    state: TissueState,
    time: f64,
    gas: GasMix,
    steps: Vec<DiveStep>,
    table: Vec<DecoStop>,
}

impl Run<'_> {
    fn push(&mut self, phase: Phase, depth: f64, gf: f64, prev_gas: Option<GasMix>) {
        self.steps.push(DiveStep {
            phase,
            abs_p: self.engine.config.to_pressure(depth),
            time: self.time,
            gas: self.gas,
            prev_gas,
            gf,
            tissues: self.state.clone(),
        });
    }

    /// Ascend between two depths on the running mix and emit the step.
    fn ascend(&mut self, from: f64, to: f64, gf: f64) {
        let cfg = &self.engine.config;
        let t = (from - to) / cfg.ascent_rate;
        self.state = self.engine.model.load(
            &self.state,
            t,
            -(cfg.ascent_rate * cfg.meter_to_bar),
            cfg.to_pressure(from),
            &self.gas,
        );
        self.time += t;
        self.push(Phase::Ascent, to, gf, None);
    }

    /// Switch the running mix in place and emit the step.
    fn switch(&mut self, new_gas: GasMix, depth: f64, gf: f64) {
        let prev = self.gas;
        self.gas = new_gas;
        self.push(Phase::GasSwitch, depth, gf, Some(prev));
    }

    fn into_plan(self) -> Plan {
        Plan {
            steps: self.steps,
            deco_table: DecoTable { stops: self.table },
        }
    }
}

/// Split the gas list into the bottom mix and the decompression mixes
/// ordered deepest switch first.
fn validate_gas_list(
    gas_list: &[GasMix],
    bottom_depth: f64,
) -> Result<(GasMix, VecDeque<GasMix>), ConfigError> {
    if gas_list.is_empty() {
        return Err(ConfigError::EmptyGasList);
    }
    let mut bottom = None;
    let mut deco = Vec::new();
    for gas in gas_list {
        gas.validate()?;
        if gas.switch_depth == 0.0 {
            if bottom.is_some() {
                return Err(ConfigError::DuplicateSwitchDepth(0.0));
            }
            bottom = Some(*gas);
        } else {
            if round_up_3m(gas.switch_depth) >= bottom_depth {
                return Err(ConfigError::SwitchDepthBeyondBottom {
                    switch_depth: gas.switch_depth,
                    bottom_depth,
                });
            }
            deco.push(*gas);
        }
    }
    let bottom = bottom.ok_or(ConfigError::MissingBottomMix)?;
    deco.sort_by(|a, b| b.switch_depth.total_cmp(&a.switch_depth));
    for pair in deco.windows(2) {
        if (pair[0].switch_depth - pair[1].switch_depth).abs() <= DEPTH_EPSILON {
            return Err(ConfigError::DuplicateSwitchDepth(pair[0].switch_depth));
        }
    }
    Ok((bottom, deco.into()))
}
