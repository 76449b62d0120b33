//! Dive decompression planner core.
//!
//! Implements Bühlmann's ZH-L16 inert-gas model with Erik Baker's gradient
//! factors (ZH-L16B-GF and ZH-L16C-GF). Given a bottom depth and time, a
//! list of nitrox/trimix mixes with switch depths and the decompression
//! parameters, the engine plans the full dive: descent, bottom segment,
//! gas switches, free ascent and the staged decompression stops, with
//! tissue saturation at every step.
//!
//! # Quick Start
//!
//! ```
//! use decoplan_core::{Config, Engine, GasMix};
//!
//! let engine = Engine::new(Config::default()).unwrap();
//!
//! // 18 m for 30 min on air stays within no-deco limits.
//! let plan = engine.calculate(18.0, 30.0, &[GasMix::air()]).unwrap();
//! assert!(plan.deco_table.is_empty());
//!
//! // 40 m for 35 min does not.
//! let plan = engine.calculate(40.0, 35.0, &[GasMix::air()]).unwrap();
//! assert!(plan.deco_table.total() > 0.0);
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod gas;
pub mod math;
pub mod model;
pub mod profile;
pub mod search;

pub use config::Config;
pub use engine::{DecoStop, DecoTable, DiveStep, Engine, Phase, Plan};
pub use error::{ConfigError, EngineError, PlanError};
pub use gas::GasMix;
pub use math::{ExpCalc, StdExp, TabExp};
pub use model::{TissueState, Variant, ZhL16};
pub use profile::{expand, tissue_samples, TissueSample};
pub use search::{DepthBisect, FirstStop, FirstStopFinder, StepwiseChase};
