//! Bühlmann ZH-L16 decompression model with gradient factors.
//!
//! Holds the 16-compartment inert-gas state, advances it through constant
//! and linear segments via the gas-loading kernel, and computes the
//! gradient-factor-adjusted ascent ceiling. Two coefficient variants are
//! provided: ZH-L16B-GF and ZH-L16C-GF (the C tables tighten the N2 A
//! coefficients from compartment 5 onwards; half-times are shared).
//!
//! The model is stateless apart from its tables: tissue states are values
//! passed in and returned, and the gradient factor in use is an explicit
//! parameter of the ceiling query.

use serde::{Deserialize, Serialize};

use crate::gas::GasMix;
use crate::math::{haldane, schreiner, ExpCalc, StdExp};

// ============================================================================
// Physical Constants
// ============================================================================

/// Water vapour pressure in the lungs (bar), at 37°C.
pub const P_WATER_VAPOUR: f64 = 0.0627;

/// Fraction of N2 used for surface equilibration on air.
const AIR_EQ_FN2: f64 = 0.7902;

/// Number of tissue compartments.
pub const NUM_COMPARTMENTS: usize = 16;

// ============================================================================
// ZH-L16 Compartment Constants (Bühlmann / Baker)
// ============================================================================

/// N2 half-times in minutes, shared by the B and C variants.
const N2_HALF_TIMES: [f64; NUM_COMPARTMENTS] = [
    5.0, 8.0, 12.5, 18.5, 27.0, 38.3, 54.3, 77.0, 109.0, 146.0, 187.0, 239.0, 305.0, 390.0, 498.0,
    635.0,
];

/// He half-times in minutes, shared by the B and C variants.
const HE_HALF_TIMES: [f64; NUM_COMPARTMENTS] = [
    1.88, 3.02, 4.72, 6.99, 10.21, 14.48, 20.53, 29.11, 41.20, 55.19, 70.69, 90.34, 115.29, 147.42,
    188.24, 240.03,
];

/// N2 'a' coefficients (bar) for ZH-L16B.
const N2_A_B: [f64; NUM_COMPARTMENTS] = [
    1.1696, 1.0000, 0.8618, 0.7562, 0.6667, 0.5600, 0.4947, 0.4500, 0.4187, 0.3798, 0.3497, 0.3223,
    0.2850, 0.2737, 0.2523, 0.2327,
];

/// N2 'a' coefficients (bar) for ZH-L16C.
const N2_A_C: [f64; NUM_COMPARTMENTS] = [
    1.1696, 1.0000, 0.8618, 0.7562, 0.6200, 0.5043, 0.4410, 0.4000, 0.3750, 0.3500, 0.3295, 0.3065,
    0.2835, 0.2610, 0.2480, 0.2327,
];

/// N2 'b' coefficients (dimensionless), shared by the B and C variants.
const N2_B: [f64; NUM_COMPARTMENTS] = [
    0.5578, 0.6514, 0.7222, 0.7825, 0.8126, 0.8434, 0.8693, 0.8910, 0.9092, 0.9222, 0.9319, 0.9403,
    0.9477, 0.9544, 0.9602, 0.9653,
];

/// He 'a' coefficients (bar).
const HE_A: [f64; NUM_COMPARTMENTS] = [
    1.6189, 1.3830, 1.1919, 1.0458, 0.9220, 0.8205, 0.7305, 0.6502, 0.5950, 0.5545, 0.5333, 0.5189,
    0.5181, 0.5176, 0.5172, 0.5119,
];

/// He 'b' coefficients (dimensionless).
const HE_B: [f64; NUM_COMPARTMENTS] = [
    0.4770, 0.5747, 0.6527, 0.7223, 0.7582, 0.7957, 0.8279, 0.8553, 0.8757, 0.8903, 0.8997, 0.9073,
    0.9122, 0.9171, 0.9217, 0.9267,
];

/// Model coefficient variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Variant {
    ZhL16B,
    ZhL16C,
}

impl Default for Variant {
    fn default() -> Self {
        Variant::ZhL16B
    }
}

// ============================================================================
// Tissue State
// ============================================================================

/// Immutable snapshot of the 16-compartment inert-gas loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TissueState {
    /// N2 partial pressure in each compartment (bar).
    pub n2: [f64; NUM_COMPARTMENTS],
    /// He partial pressure in each compartment (bar).
    pub he: [f64; NUM_COMPARTMENTS],
}

impl TissueState {
    /// Total inert pressure of a compartment.
    pub fn total(&self, i: usize) -> f64 {
        self.n2[i] + self.he[i]
    }

    /// Largest total inert pressure across all compartments.
    pub fn max_total(&self) -> f64 {
        (0..NUM_COMPARTMENTS)
            .map(|i| self.total(i))
            .fold(0.0, f64::max)
    }
}

// ============================================================================
// Decompression Model
// ============================================================================

pub struct ZhL16 {
    variant: Variant,
    n2_a: &'static [f64; NUM_COMPARTMENTS],
    k_n2: [f64; NUM_COMPARTMENTS],
    k_he: [f64; NUM_COMPARTMENTS],
    exp: Box<dyn ExpCalc>,
}

impl ZhL16 {
    /// Create the model with the math-library exponential.
    pub fn new(variant: Variant) -> Self {
        Self::with_exp(variant, Box::new(StdExp))
    }

    /// Create the model with a custom exponential backend.
    pub fn with_exp(variant: Variant, exp: Box<dyn ExpCalc>) -> Self {
        let ln2 = 2.0_f64.ln();
        let mut k_n2 = [0.0; NUM_COMPARTMENTS];
        let mut k_he = [0.0; NUM_COMPARTMENTS];
        for i in 0..NUM_COMPARTMENTS {
            k_n2[i] = ln2 / N2_HALF_TIMES[i];
            k_he[i] = ln2 / HE_HALF_TIMES[i];
        }
        let n2_a = match variant {
            Variant::ZhL16B => &N2_A_B,
            Variant::ZhL16C => &N2_A_C,
        };
        ZhL16 {
            variant,
            n2_a,
            k_n2,
            k_he,
            exp,
        }
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    /// All 32 decay constants, N2 first. Useful for building the
    /// table-backed exponential.
    pub fn decay_constants(&self) -> Vec<f64> {
        self.k_n2.iter().chain(self.k_he.iter()).copied().collect()
    }

    /// Surface-equilibrated state: compartments saturated with air at the
    /// given surface pressure, no helium.
    pub fn init(&self, surface_pressure: f64) -> TissueState {
        let p_n2 = AIR_EQ_FN2 * (surface_pressure - P_WATER_VAPOUR);
        TissueState {
            n2: [p_n2; NUM_COMPARTMENTS],
            he: [0.0; NUM_COMPARTMENTS],
        }
    }

    /// Advance every compartment by `t` minutes breathing `gas`.
    ///
    /// `rate` is the ambient pressure change in bar/min (negative on
    /// ascent, zero at constant depth) and `p_start` the absolute pressure
    /// at segment start.
    pub fn load(&self, state: &TissueState, t: f64, rate: f64, p_start: f64, gas: &GasMix) -> TissueState {
        if t <= 0.0 {
            return state.clone();
        }
        let p_alv_n2 = gas.n2 * (p_start - P_WATER_VAPOUR);
        let p_alv_he = gas.he * (p_start - P_WATER_VAPOUR);
        let mut next = state.clone();
        if rate == 0.0 {
            for i in 0..NUM_COMPARTMENTS {
                next.n2[i] = haldane(p_alv_n2, t, self.k_n2[i], state.n2[i], &*self.exp);
                next.he[i] = haldane(p_alv_he, t, self.k_he[i], state.he[i], &*self.exp);
            }
        } else {
            let r_n2 = gas.n2 * rate;
            let r_he = gas.he * rate;
            for i in 0..NUM_COMPARTMENTS {
                next.n2[i] = schreiner(p_alv_n2, t, r_n2, self.k_n2[i], state.n2[i], &*self.exp);
                next.he[i] = schreiner(p_alv_he, t, r_he, self.k_he[i], state.he[i], &*self.exp);
            }
        }
        next
    }

    /// Tolerated absolute pressure of one compartment at gradient factor
    /// `gf`, clamped at vacuum.
    ///
    /// A and B are the Bühlmann coefficients weighted by the helium and
    /// nitrogen loading of the compartment.
    pub fn tolerated_pressure(&self, state: &TissueState, i: usize, gf: f64) -> f64 {
        let p_n2 = state.n2[i];
        let p_he = state.he[i];
        let p_total = p_n2 + p_he;
        let (a, b) = if p_total > 1e-10 {
            let a = (self.n2_a[i] * p_n2 + HE_A[i] * p_he) / p_total;
            let b = (N2_B[i] * p_n2 + HE_B[i] * p_he) / p_total;
            (a, b)
        } else {
            (self.n2_a[i], N2_B[i])
        };
        let p_tol = (p_total - gf * a) / (gf / b - gf + 1.0);
        p_tol.max(0.0)
    }

    /// The ascent ceiling: the shallowest absolute pressure the diver may
    /// ascend to without any compartment breaching its
    /// gradient-factor-adjusted M-value.
    pub fn ceiling_limit(&self, state: &TissueState, gf: f64) -> f64 {
        (0..NUM_COMPARTMENTS)
            .map(|i| self.tolerated_pressure(state, i, gf))
            .fold(0.0, f64::max)
    }

    /// Index of the compartment governing the ceiling.
    pub fn leading_compartment(&self, state: &TissueState, gf: f64) -> usize {
        let mut leading = 0;
        let mut max_p = f64::MIN;
        for i in 0..NUM_COMPARTMENTS {
            let p = self.tolerated_pressure(state, i, gf);
            if p > max_p {
                max_p = p;
                leading = i;
            }
        }
        leading
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SURFACE: f64 = 1.01325;

    fn air() -> GasMix {
        GasMix::air()
    }

    #[test]
    fn test_init_surface_equilibrium() {
        let model = ZhL16::new(Variant::ZhL16B);
        let state = model.init(1.013);
        for i in 0..NUM_COMPARTMENTS {
            assert!(
                (state.n2[i] - 0.75092706).abs() < 1e-8,
                "compartment {i} n2 {}",
                state.n2[i]
            );
            assert_eq!(state.he[i], 0.0);
        }
    }

    #[test]
    fn test_load_zero_time_is_noop() {
        let model = ZhL16::new(Variant::ZhL16B);
        let state = model.init(SURFACE);
        let next = model.load(&state, 0.0, -1.0, 4.0, &air());
        assert_eq!(state, next);
    }

    #[test]
    fn test_load_constant_depth_composes() {
        let model = ZhL16::new(Variant::ZhL16B);
        let state = model.init(SURFACE);
        let p = 4.0;
        let whole = model.load(&state, 25.0, 0.0, p, &air());
        let halved = model.load(&model.load(&state, 10.0, 0.0, p, &air()), 15.0, 0.0, p, &air());
        for i in 0..NUM_COMPARTMENTS {
            assert!(
                (whole.n2[i] - halved.n2[i]).abs() < 1e-9,
                "compartment {i}: {} vs {}",
                whole.n2[i],
                halved.n2[i]
            );
        }
    }

    #[test]
    fn test_load_descent_raises_loading() {
        let model = ZhL16::new(Variant::ZhL16B);
        let state = model.init(SURFACE);
        // 2 min descent to 40 m at 20 m/min, about 2 bar/min.
        let next = model.load(&state, 2.0, 2.0, SURFACE, &air());
        for i in 0..NUM_COMPARTMENTS {
            assert!(next.n2[i] > state.n2[i], "descent must on-gas, compartment {i}");
            assert!(next.n2[i] >= 0.0);
        }
    }

    #[test]
    fn test_trimix_helium_loading() {
        let model = ZhL16::new(Variant::ZhL16B);
        let state = model.init(SURFACE);
        let tx = GasMix::trimix(0.18, 0.45, 0.0).unwrap();
        let next = model.load(&state, 20.0, 0.0, 7.0, &tx);
        for i in 0..NUM_COMPARTMENTS {
            assert!(next.he[i] > 0.0, "helium must load on trimix");
        }
        // Fast He compartment nearly equilibrated after 20 min.
        let p_alv_he = 0.45 * (7.0 - P_WATER_VAPOUR);
        assert!((next.he[0] - p_alv_he).abs() < 0.01);
    }

    #[test]
    fn test_tolerated_pressure_reference() {
        // Compartment 1, pure N2 load of 3 bar.
        let model = ZhL16::new(Variant::ZhL16B);
        let mut state = model.init(SURFACE);
        state.n2[0] = 3.0;
        state.he[0] = 0.0;
        let v = model.tolerated_pressure(&state, 0, 0.3);
        assert!((v - 2.14013).abs() < 1e-4, "gf 30%: got {v}");
        let v = model.tolerated_pressure(&state, 0, 1.0);
        assert!((v - 1.02099).abs() < 1e-4, "gf 100%: got {v}");
    }

    #[test]
    fn test_ceiling_at_equilibrium_is_above_surface() {
        let model = ZhL16::new(Variant::ZhL16B);
        let state = model.init(SURFACE);
        let limit = model.ceiling_limit(&state, 0.85);
        assert!(
            limit <= SURFACE,
            "equilibrated diver must be clear to surface, got {limit}"
        );
    }

    #[test]
    fn test_leading_compartment_tracks_exposure() {
        let model = ZhL16::new(Variant::ZhL16B);
        let state = model.init(SURFACE);
        // Short deep exposure: a fast compartment governs the ceiling.
        let short = model.load(&state, 10.0, 0.0, 5.0, &air());
        let fast = model.leading_compartment(&short, 0.3);
        assert!(fast < 4, "short exposure should be led by a fast compartment, got {fast}");
        // Saturation exposure: leadership moves to a slower compartment.
        let long = model.load(&state, 600.0, 0.0, 5.0, &air());
        let slow = model.leading_compartment(&long, 0.3);
        assert!(slow > fast, "long exposure must shift the lead slower");
        assert_eq!(model.variant(), Variant::ZhL16B);
    }

    #[test]
    fn test_ceiling_monotone_in_gf() {
        let model = ZhL16::new(Variant::ZhL16B);
        let state = model.init(SURFACE);
        let loaded = model.load(&state, 30.0, 0.0, 5.0, &air());
        let mut prev = f64::MAX;
        for gf in [0.2, 0.3, 0.5, 0.85, 1.0] {
            let limit = model.ceiling_limit(&loaded, gf);
            assert!(
                limit <= prev,
                "lowering gf must raise or keep the ceiling: gf={gf} limit={limit}"
            );
            prev = limit;
        }
    }

    #[test]
    fn test_variant_c_no_less_conservative() {
        let b = ZhL16::new(Variant::ZhL16B);
        let c = ZhL16::new(Variant::ZhL16C);
        let state = b.init(SURFACE);
        let loaded = b.load(&state, 35.0, 0.0, 5.0, &air());
        let limit_b = b.ceiling_limit(&loaded, 0.3);
        let limit_c = c.ceiling_limit(&loaded, 0.3);
        assert!(
            limit_c >= limit_b - 1e-12,
            "C must not allow a shallower ceiling: {limit_c} vs {limit_b}"
        );
    }

    #[test]
    fn test_tab_exp_backend_close_to_std() {
        use crate::math::TabExp;
        let std_model = ZhL16::new(Variant::ZhL16B);
        let ks = std_model.decay_constants();
        let tab_model =
            ZhL16::with_exp(Variant::ZhL16B, Box::new(TabExp::new(&ks, 1.0, 128.0)));
        let state = std_model.init(SURFACE);
        let a = std_model.load(&state, 30.0, 0.0, 5.0, &air());
        let b = tab_model.load(&state, 30.0, 0.0, 5.0, &air());
        for i in 0..NUM_COMPARTMENTS {
            assert!((a.n2[i] - b.n2[i]).abs() < 1e-9, "compartment {i}");
        }
    }
}
