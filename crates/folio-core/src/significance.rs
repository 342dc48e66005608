// SPDX-License-Identifier: Apache-2.0

//! Two-proportion z-test over aggregate arm counters.

use folio_model::{Arm, ArmCounts, Significance};

/// Both arms need strictly more views than this before evaluation runs.
pub const MIN_SAMPLE_VIEWS: u64 = 100;
pub const SIGNIFICANCE_ALPHA: f64 = 0.05;
pub const SIGNIFICANT_CONFIDENCE: f64 = 0.95;

#[must_use]
pub fn ready_for_evaluation(control: ArmCounts, variant: ArmCounts) -> bool {
    control.views > MIN_SAMPLE_VIEWS && variant.views > MIN_SAMPLE_VIEWS
}

// Abramowitz and Stegun 7.1.26, max error 1.5e-7.
fn erf(x: f64) -> f64 {
    const A1: f64 = 0.254_829_592;
    const A2: f64 = -0.284_496_736;
    const A3: f64 = 1.421_413_741;
    const A4: f64 = -1.453_152_027;
    const A5: f64 = 1.061_405_429;
    const P: f64 = 0.327_591_1;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    let t = 1.0 / (1.0 + P * x);
    let y = 1.0 - (((((A5 * t + A4) * t) + A3) * t + A2) * t + A1) * t * (-x * x).exp();
    sign * y
}

/// Standard normal cumulative distribution function.
#[must_use]
pub fn normal_cdf(x: f64) -> f64 {
    0.5 * (1.0 + erf(x / std::f64::consts::SQRT_2))
}

/// Evaluates the difference in conversion rate between the two arms.
///
/// Returns `None` when either arm has no views. A degenerate pooled rate
/// (standard error of zero) yields `p = 1.0` and no winner.
#[must_use]
pub fn evaluate(control: ArmCounts, variant: ArmCounts) -> Option<Significance> {
    if control.views == 0 || variant.views == 0 {
        return None;
    }
    let nc = control.views as f64;
    let nv = variant.views as f64;
    let control_rate = control.conversions as f64 / nc;
    let variant_rate = variant.conversions as f64 / nv;
    let pooled = (control.conversions + variant.conversions) as f64 / (nc + nv);
    let se = (pooled * (1.0 - pooled) * (1.0 / nc + 1.0 / nv)).sqrt();

    if !se.is_finite() || se <= 0.0 {
        return Some(Significance {
            p_value: 1.0,
            confidence_level: None,
            is_significant: false,
            winner: None,
        });
    }

    let z = (control_rate - variant_rate).abs() / se;
    let p_value = 2.0 * (1.0 - normal_cdf(z));
    let is_significant = p_value < SIGNIFICANCE_ALPHA;
    let winner = is_significant.then(|| {
        if variant_rate > control_rate {
            Arm::Variant
        } else {
            Arm::Control
        }
    });
    Some(Significance {
        p_value,
        confidence_level: is_significant.then_some(SIGNIFICANT_CONFIDENCE),
        is_significant,
        winner,
    })
}
