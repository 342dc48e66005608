// SPDX-License-Identifier: Apache-2.0

use folio_model::{WebVital, WebVitals};
use serde::{Deserialize, Serialize};

/// A breach above this multiple of the budget is reported as high severity.
pub const HIGH_SEVERITY_FACTOR: f64 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Medium,
    High,
}

impl Severity {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BudgetViolation {
    pub metric: WebVital,
    pub value: f64,
    pub threshold: f64,
    pub severity: Severity,
}

/// Upper bounds for web vitals. Timings are milliseconds, CLS is unitless.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceBudget {
    pub lcp_ms: f64,
    pub fid_ms: f64,
    pub cls: f64,
    pub fcp_ms: f64,
    pub ttfb_ms: f64,
}

impl Default for PerformanceBudget {
    fn default() -> Self {
        Self {
            lcp_ms: 2500.0,
            fid_ms: 100.0,
            cls: 0.1,
            fcp_ms: 1800.0,
            ttfb_ms: 800.0,
        }
    }
}

impl PerformanceBudget {
    #[must_use]
    pub fn threshold(&self, vital: WebVital) -> f64 {
        match vital {
            WebVital::Lcp => self.lcp_ms,
            WebVital::Fid => self.fid_ms,
            WebVital::Cls => self.cls,
            WebVital::Fcp => self.fcp_ms,
            WebVital::Ttfb => self.ttfb_ms,
        }
    }

    /// Metrics strictly above their budget, in `WebVital::ALL` order.
    #[must_use]
    pub fn check(&self, vitals: &WebVitals) -> Vec<BudgetViolation> {
        WebVital::ALL
            .iter()
            .filter_map(|vital| {
                let value = vitals.get(*vital)?;
                let threshold = self.threshold(*vital);
                (value > threshold).then(|| BudgetViolation {
                    metric: *vital,
                    value,
                    threshold,
                    severity: if value > threshold * HIGH_SEVERITY_FACTOR {
                        Severity::High
                    } else {
                        Severity::Medium
                    },
                })
            })
            .collect()
    }
}
