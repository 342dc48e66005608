#![forbid(unsafe_code)]

pub mod dto;
pub mod error_mapping;
pub mod errors;
pub mod openapi;
pub mod responses;

pub use dto::{
    AbTestCommand, AbTestRequest, BeaconContext, ConversionRequest, CreateExperimentRequest,
    EngagementRequest, FieldChecks, PageViewRequest, PerformanceRequest, ReportQuery,
    SessionCommand, SessionRequest, UpdateExperimentRequest,
};
pub use errors::{ApiError, ApiErrorCode, FieldError, UNKNOWN_REQUEST_ID};
pub use openapi::openapi_v1_spec;
pub use responses::{AckResponse, ExperimentListResponse, ExperimentResponse, HealthResponse};

pub const CRATE_NAME: &str = "folio-api";
