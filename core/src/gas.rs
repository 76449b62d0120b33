//! Breathing gas mixes.
//!
//! A mix is defined by its O2/N2/He mole fractions and the depth at which
//! the planner is allowed to switch to it. The bottom mix is anchored at
//! 0 m; decompression mixes carry the depth of their intended switch.
//! PPO2 policing is the caller's responsibility.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Tolerance for the fraction-sum check.
const FRACTION_EPSILON: f64 = 1e-9;

/// Fraction of N2 in air.
pub const AIR_FN2: f64 = 0.79;

/// A breathing gas mix with its switch depth.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GasMix {
    /// Fraction of O2 (0.0-1.0).
    pub o2: f64,
    /// Fraction of N2 (0.0-1.0).
    pub n2: f64,
    /// Fraction of He (0.0-1.0).
    pub he: f64,
    /// Depth (m) at which this mix becomes breathable during ascent.
    pub switch_depth: f64,
}

impl GasMix {
    /// Create a mix from O2 and He fractions; N2 makes up the remainder.
    pub fn new(o2: f64, he: f64, switch_depth: f64) -> Result<Self, ConfigError> {
        let n2 = 1.0 - o2 - he;
        let mix = GasMix {
            o2,
            n2,
            he,
            switch_depth,
        };
        mix.validate()?;
        Ok(mix)
    }

    /// Air, anchored at the surface.
    pub fn air() -> Self {
        GasMix {
            o2: 0.21,
            n2: AIR_FN2,
            he: 0.0,
            switch_depth: 0.0,
        }
    }

    /// Nitrox mix with the given O2 fraction.
    pub fn nitrox(o2: f64, switch_depth: f64) -> Result<Self, ConfigError> {
        Self::new(o2, 0.0, switch_depth)
    }

    /// Trimix with the given O2 and He fractions.
    pub fn trimix(o2: f64, he: f64, switch_depth: f64) -> Result<Self, ConfigError> {
        Self::new(o2, he, switch_depth)
    }

    /// Total inert fraction (N2 + He).
    pub fn inert(&self) -> f64 {
        self.n2 + self.he
    }

    pub fn is_trimix(&self) -> bool {
        self.he > 0.0
    }

    /// Check fractions are in range and sum to 1.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let in_range = |f: f64| (0.0..=1.0).contains(&f);
        let sum = self.o2 + self.n2 + self.he;
        if !in_range(self.o2)
            || !in_range(self.n2)
            || !in_range(self.he)
            || (sum - 1.0).abs() > FRACTION_EPSILON
            || self.o2 <= 0.0
            || self.switch_depth < 0.0
        {
            return Err(ConfigError::GasFractions {
                o2: self.o2,
                n2: self.n2,
                he: self.he,
            });
        }
        Ok(())
    }
}

impl fmt::Display for GasMix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let o2 = (self.o2 * 100.0).round() as u32;
        let he = (self.he * 100.0).round() as u32;
        if he > 0 {
            write!(f, "TX{o2}/{he}")
        } else if o2 == 100 {
            write!(f, "O2")
        } else if o2 == 21 {
            write!(f, "air")
        } else {
            write!(f, "EAN{o2}")
        }
    }
}
