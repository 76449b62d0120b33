//! Planner configuration and depth/pressure conversion.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::model::Variant;

/// Default surface atmospheric pressure (bar) at sea level.
pub const DEFAULT_SURFACE_PRESSURE: f64 = 1.01325;

/// Default pressure increase per metre of water (bar/m).
pub const DEFAULT_METER_TO_BAR: f64 = 0.09985;

/// Absorbs floating noise when aligning depths to the 3-m grid.
pub(crate) const DEPTH_EPSILON: f64 = 1e-6;

/// Read-only configuration for a planning run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Ascent rate (m/min).
    pub ascent_rate: f64,
    /// Descent rate (m/min).
    pub descent_rate: f64,
    /// Surface pressure (bar).
    pub surface_pressure: f64,
    /// Gradient factor at the first stop.
    pub gf_low: f64,
    /// Gradient factor at the surface.
    pub gf_high: f64,
    /// Depth of the last decompression stop (m), 3 or 6.
    pub last_stop_depth: f64,
    /// Pressure per metre of water (bar/m).
    pub meter_to_bar: f64,
    /// Granularity of decompression stop times (min).
    pub min_stop_time: f64,
    /// Coefficient table variant.
    pub variant: Variant,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            ascent_rate: 10.0,
            descent_rate: 20.0,
            surface_pressure: DEFAULT_SURFACE_PRESSURE,
            gf_low: 0.30,
            gf_high: 0.85,
            last_stop_depth: 3.0,
            meter_to_bar: DEFAULT_METER_TO_BAR,
            min_stop_time: 1.0,
            variant: Variant::ZhL16B,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.ascent_rate > 0.0) {
            return Err(ConfigError::AscentRate(self.ascent_rate));
        }
        if !(self.descent_rate > 0.0) {
            return Err(ConfigError::DescentRate(self.descent_rate));
        }
        if !(0.5..=1.5).contains(&self.surface_pressure) {
            return Err(ConfigError::SurfacePressure(self.surface_pressure));
        }
        if !(self.gf_low > 0.0 && self.gf_low <= self.gf_high && self.gf_high <= 1.0) {
            return Err(ConfigError::GradientFactors {
                low: self.gf_low,
                high: self.gf_high,
            });
        }
        if self.last_stop_depth != 3.0 && self.last_stop_depth != 6.0 {
            return Err(ConfigError::LastStopDepth(self.last_stop_depth));
        }
        if !(self.min_stop_time > 0.0) {
            return Err(ConfigError::MinStopTime(self.min_stop_time));
        }
        if !(self.meter_to_bar > 0.0) {
            return Err(ConfigError::MeterToBar(self.meter_to_bar));
        }
        Ok(())
    }

    /// Absolute pressure (bar) at a depth (m).
    pub fn to_pressure(&self, depth: f64) -> f64 {
        self.surface_pressure + depth * self.meter_to_bar
    }

    /// Depth (m) at an absolute pressure (bar).
    pub fn to_depth(&self, abs_p: f64) -> f64 {
        (abs_p - self.surface_pressure) / self.meter_to_bar
    }
}

/// Round a depth up to the next multiple of 3 m.
pub(crate) fn round_up_3m(depth: f64) -> f64 {
    (((depth - DEPTH_EPSILON) / 3.0).ceil() * 3.0).max(0.0)
}

/// Round a depth down to the previous multiple of 3 m.
pub(crate) fn round_down_3m(depth: f64) -> f64 {
    (((depth + DEPTH_EPSILON) / 3.0).floor() * 3.0).max(0.0)
}
