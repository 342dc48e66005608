#![forbid(unsafe_code)]
//! Folio model SSOT: experiments, assignments, sessions and beacon records.

mod events;
mod experiment;
mod ids;
mod session;

pub use events::{
    client_time, ConnectionInfo, ConversionEvent, EngagementEvent, PageView, PerformanceSample,
    WebVital, WebVitals,
};
pub use experiment::{
    ArmCounts, Assignment, Experiment, ExperimentPatch, NewExperiment, Significance,
    TrafficSplit, DEFAULT_TRAFFIC_SPLIT, TARGET_PAGES_MAX,
};
pub use ids::{
    Arm, ExperimentId, ExperimentName, ParseError, SessionId, VariantLabel, CONTROL_LABEL,
    EXPERIMENT_ID_MAX_LEN, EXPERIMENT_NAME_MAX_LEN, SESSION_ID_MAX_LEN, VARIANT_LABEL,
    VARIANT_LABEL_MAX_LEN,
};
pub use session::{
    whole_seconds_between, ClientProfile, DeviceClass, SessionAction, SessionRecord,
    SessionStart, UNKNOWN_LABEL,
};

pub const CRATE_NAME: &str = "folio-model";
