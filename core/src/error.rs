use thiserror::Error;

use crate::gas::GasMix;

/// Error type for planner configuration problems, detected before any
/// planning takes place.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("gas mix fractions must sum to 1, got o2={o2} n2={n2} he={he}")]
    GasFractions { o2: f64, n2: f64, he: f64 },

    #[error("gas list is empty")]
    EmptyGasList,

    #[error("no bottom mix anchored at 0 m")]
    MissingBottomMix,

    #[error("duplicate gas switch depth {0} m")]
    DuplicateSwitchDepth(f64),

    #[error("switch depth {switch_depth} m is not above bottom depth {bottom_depth} m")]
    SwitchDepthBeyondBottom { switch_depth: f64, bottom_depth: f64 },

    #[error("ascent rate must be positive, got {0} m/min")]
    AscentRate(f64),

    #[error("descent rate must be positive, got {0} m/min")]
    DescentRate(f64),

    #[error("surface pressure {0} bar out of 0.5-1.5 bar range")]
    SurfacePressure(f64),

    #[error("gradient factors must satisfy 0 < low <= high <= 1, got {low}/{high}")]
    GradientFactors { low: f64, high: f64 },

    #[error("last stop depth must be 3 or 6 m, got {0}")]
    LastStopDepth(f64),

    #[error("minimum stop time must be positive, got {0} min")]
    MinStopTime(f64),

    #[error("meter to bar conversion must be positive, got {0}")]
    MeterToBar(f64),

    #[error("bottom time {bottom_time} min does not cover the {descent_time} min descent")]
    BottomTime { bottom_time: f64, descent_time: f64 },
}

/// Error type for failures detected while planning. These are terminal for
/// the current plan; no partial result is returned.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlanError {
    #[error("first stop at {depth} m on {gas} sits below the deco zone")]
    StopBelowDecoZone { depth: f64, gas: GasMix },

    #[error("no convergence finding stop length at {depth} m on {gas}")]
    StopSearchDiverged { depth: f64, gas: GasMix },
}

/// Umbrella error returned by the dive engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Plan(#[from] PlanError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::GradientFactors {
            low: 0.9,
            high: 0.3,
        };
        assert_eq!(
            err.to_string(),
            "gradient factors must satisfy 0 < low <= high <= 1, got 0.9/0.3"
        );

        let err = ConfigError::EmptyGasList;
        assert_eq!(err.to_string(), "gas list is empty");

        let err = ConfigError::LastStopDepth(4.5);
        assert_eq!(err.to_string(), "last stop depth must be 3 or 6 m, got 4.5");
    }

    #[test]
    fn test_plan_error_display() {
        let err = PlanError::StopSearchDiverged {
            depth: 6.0,
            gas: GasMix::air(),
        };
        assert_eq!(
            err.to_string(),
            "no convergence finding stop length at 6 m on air"
        );
    }

    #[test]
    fn test_engine_error_is_transparent() {
        let err = EngineError::from(ConfigError::EmptyGasList);
        assert_eq!(err.to_string(), "gas list is empty");
    }
}
