#![forbid(unsafe_code)]
//! Pure, I/O-free logic shared by the store and the server.

pub mod budget;
pub mod range;
pub mod significance;
pub mod user_agent;

pub use budget::{BudgetViolation, PerformanceBudget, Severity, HIGH_SEVERITY_FACTOR};
pub use range::{calculate_trend, percent_of, ReportRange};
pub use significance::{
    evaluate, normal_cdf, ready_for_evaluation, SIGNIFICANCE_ALPHA, MIN_SAMPLE_VIEWS,
    SIGNIFICANT_CONFIDENCE,
};
pub use user_agent::{SubstringClassifier, UserAgentClassifier};

pub const CRATE_NAME: &str = "folio-core";
