// SPDX-License-Identifier: Apache-2.0

//! Request bodies as sent by the beacon and the admin UI, plus their
//! validation into model types. Every field is optional on the wire so that
//! missing values are reported as field errors instead of decode failures.

use crate::errors::{ApiError, FieldError};
use chrono::{DateTime, Utc};
use folio_model::{
    client_time, ConnectionInfo, ConversionEvent, DeviceClass, EngagementEvent, ExperimentName,
    ExperimentPatch, NewExperiment, PageView, ParseError, PerformanceSample, SessionAction,
    SessionId, TrafficSplit, VariantLabel, WebVitals, TARGET_PAGES_MAX,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PAGE_MAX_LEN: usize = 2048;
pub const TEXT_MAX_LEN: usize = 512;
pub const LABEL_MAX_LEN: usize = 128;
pub const DESCRIPTION_MAX_LEN: usize = 4096;

/// Accumulates field errors across one request body.
#[derive(Debug, Default)]
pub struct FieldChecks {
    errors: Vec<FieldError>,
}

impl FieldChecks {
    pub fn parse<T>(&mut self, result: Result<T, ParseError>) -> Option<T> {
        match result {
            Ok(v) => Some(v),
            Err(e) => {
                self.errors.push(e.into());
                None
            }
        }
    }

    pub fn reject(&mut self, field: &str, reason: impl Into<String>) {
        self.errors.push(FieldError::new(field, reason));
    }

    pub fn required_text(&mut self, field: &str, value: Option<String>, max: usize) -> Option<String> {
        match value {
            None => {
                self.reject(field, "is required");
                None
            }
            Some(v) => self.bounded_text(field, v, max),
        }
    }

    /// Absent or blank values become `None`.
    pub fn optional_text(
        &mut self,
        field: &str,
        value: Option<String>,
        max: usize,
    ) -> Option<String> {
        let v = value?;
        if v.trim().is_empty() {
            return None;
        }
        self.bounded_text(field, v, max)
    }

    fn bounded_text(&mut self, field: &str, value: String, max: usize) -> Option<String> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            self.reject(field, "must not be empty");
            return None;
        }
        if trimmed.len() > max {
            self.reject(field, format!("exceeds max length {max}"));
            return None;
        }
        Some(trimmed.to_string())
    }

    pub fn metric(&mut self, field: &str, value: Option<f64>) -> Option<f64> {
        let v = value?;
        if !v.is_finite() || v < 0.0 {
            self.reject(field, "must be a finite non-negative number");
            return None;
        }
        Some(v)
    }

    pub fn bounded_int(&mut self, field: &str, value: Option<i64>, min: i64, max: i64) -> Option<i64> {
        let v = value?;
        if !(min..=max).contains(&v) {
            self.reject(field, format!("must be between {min} and {max}"));
            return None;
        }
        Some(v)
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    #[must_use]
    pub fn into_error(self) -> ApiError {
        ApiError::validation_failed(self.errors)
    }

    pub fn finish<T>(self, value: Option<T>) -> Result<T, ApiError> {
        match value {
            Some(v) if self.errors.is_empty() => Ok(v),
            _ => Err(self.into_error()),
        }
    }
}

fn session_id(checks: &mut FieldChecks, raw: Option<String>) -> Option<SessionId> {
    match raw {
        None => {
            checks.reject("sessionId", "is required");
            None
        }
        Some(raw) => checks.parse(SessionId::parse(&raw)),
    }
}

/// Server-side facts attached to every beacon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeaconContext {
    pub now: DateTime<Utc>,
    pub device: DeviceClass,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbTestRequest {
    pub session_id: Option<String>,
    pub experiment_name: Option<String>,
    pub variant: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbTestCommand {
    pub session_id: SessionId,
    pub experiment_name: ExperimentName,
    pub variant: VariantLabel,
}

impl AbTestRequest {
    pub fn validate(self) -> Result<AbTestCommand, ApiError> {
        let mut checks = FieldChecks::default();
        let session_id = session_id(&mut checks, self.session_id);
        let experiment_name = match self.experiment_name {
            None => {
                checks.reject("experimentName", "is required");
                None
            }
            Some(raw) => checks.parse(ExperimentName::parse(&raw)),
        };
        let variant = match self.variant {
            None => {
                checks.reject("variant", "is required");
                None
            }
            Some(raw) => checks.parse(VariantLabel::parse(&raw)),
        };
        let command = match (session_id, experiment_name, variant) {
            (Some(session_id), Some(experiment_name), Some(variant)) => Some(AbTestCommand {
                session_id,
                experiment_name,
                variant,
            }),
            _ => None,
        };
        checks.finish(command)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    pub session_id: Option<String>,
    pub action: Option<String>,
    pub page: Option<String>,
    pub referer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCommand {
    pub session_id: SessionId,
    pub action: SessionAction,
    pub page: Option<String>,
    pub referrer: Option<String>,
}

impl SessionRequest {
    pub fn validate(self) -> Result<SessionCommand, ApiError> {
        let mut checks = FieldChecks::default();
        let session_id = session_id(&mut checks, self.session_id);
        let action = match self.action.as_deref() {
            Some("start") => Some(SessionAction::Start),
            Some("end") => Some(SessionAction::End),
            Some(_) => {
                checks.reject("action", "must be one of: start, end");
                None
            }
            None => {
                checks.reject("action", "is required");
                None
            }
        };
        let page = match action {
            Some(SessionAction::Start) => checks.required_text("page", self.page, PAGE_MAX_LEN),
            _ => checks.optional_text("page", self.page, PAGE_MAX_LEN),
        };
        let referrer = checks.optional_text("referer", self.referer, PAGE_MAX_LEN);
        let command = match (session_id, action) {
            (Some(session_id), Some(action)) => Some(SessionCommand {
                session_id,
                action,
                page,
                referrer,
            }),
            _ => None,
        };
        checks.finish(command)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageViewRequest {
    pub session_id: Option<String>,
    pub path: Option<String>,
    pub title: Option<String>,
    pub referer: Option<String>,
    pub metadata: Option<Value>,
    pub timestamp: Option<i64>,
}

impl PageViewRequest {
    pub fn validate(self, ctx: BeaconContext) -> Result<PageView, ApiError> {
        let mut checks = FieldChecks::default();
        let session_id = session_id(&mut checks, self.session_id);
        let path = checks.required_text("path", self.path, PAGE_MAX_LEN);
        let title = checks.optional_text("title", self.title, TEXT_MAX_LEN);
        let referrer = checks.optional_text("referer", self.referer, PAGE_MAX_LEN);
        let view = match (session_id, path) {
            (Some(session_id), Some(path)) => Some(PageView {
                session_id,
                path,
                title,
                referrer,
                device: ctx.device,
                metadata: self.metadata.filter(|m| !m.is_null()),
                occurred_at: client_time(self.timestamp, ctx.now),
            }),
            _ => None,
        };
        checks.finish(view)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsDto {
    pub lcp: Option<f64>,
    pub fid: Option<f64>,
    pub cls: Option<f64>,
    pub fcp: Option<f64>,
    pub ttfb: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfoDto {
    pub effective_type: Option<String>,
    pub downlink: Option<f64>,
    pub rtt: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceRequest {
    pub session_id: Option<String>,
    pub page: Option<String>,
    pub metrics: Option<MetricsDto>,
    pub connection_info: Option<ConnectionInfoDto>,
    pub timestamp: Option<i64>,
}

impl PerformanceRequest {
    pub fn validate(self, ctx: BeaconContext) -> Result<PerformanceSample, ApiError> {
        let mut checks = FieldChecks::default();
        let session_id = session_id(&mut checks, self.session_id);
        let page = checks.required_text("page", self.page, PAGE_MAX_LEN);
        let metrics = self.metrics.unwrap_or_default();
        let vitals = WebVitals {
            lcp: checks.metric("metrics.lcp", metrics.lcp),
            fid: checks.metric("metrics.fid", metrics.fid),
            cls: checks.metric("metrics.cls", metrics.cls),
            fcp: checks.metric("metrics.fcp", metrics.fcp),
            ttfb: checks.metric("metrics.ttfb", metrics.ttfb),
        };
        if vitals.is_empty() && checks.is_clean() {
            checks.reject("metrics", "at least one web vital is required");
        }
        let connection = self.connection_info.map(|c| ConnectionInfo {
            effective_type: checks.optional_text(
                "connectionInfo.effectiveType",
                c.effective_type,
                LABEL_MAX_LEN,
            ),
            downlink: checks.metric("connectionInfo.downlink", c.downlink),
            rtt: checks.metric("connectionInfo.rtt", c.rtt),
        });
        let sample = match (session_id, page) {
            (Some(session_id), Some(page)) => Some(PerformanceSample {
                session_id,
                page,
                vitals,
                connection,
                occurred_at: client_time(self.timestamp, ctx.now),
            }),
            _ => None,
        };
        checks.finish(sample)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementRequest {
    pub session_id: Option<String>,
    pub page: Option<String>,
    pub event: Option<String>,
    pub time_on_page: Option<i64>,
    pub scroll_depth: Option<i64>,
    pub timestamp: Option<i64>,
}

impl EngagementRequest {
    pub fn validate(self, ctx: BeaconContext) -> Result<EngagementEvent, ApiError> {
        let mut checks = FieldChecks::default();
        let session_id = session_id(&mut checks, self.session_id);
        let page = checks.required_text("page", self.page, PAGE_MAX_LEN);
        let event = checks.required_text("event", self.event, LABEL_MAX_LEN);
        let time_on_page_ms = checks.bounded_int("timeOnPage", self.time_on_page, 0, i64::MAX);
        let scroll_depth = checks.bounded_int("scrollDepth", self.scroll_depth, 0, 100);
        let record = match (session_id, page, event) {
            (Some(session_id), Some(page), Some(event)) => Some(EngagementEvent {
                session_id,
                page,
                event,
                time_on_page_ms,
                scroll_depth,
                occurred_at: client_time(self.timestamp, ctx.now),
            }),
            _ => None,
        };
        checks.finish(record)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionRequest {
    pub session_id: Option<String>,
    #[serde(rename = "type")]
    pub conversion_type: Option<String>,
    pub value: Option<f64>,
    pub page: Option<String>,
    pub metadata: Option<Value>,
    pub timestamp: Option<i64>,
}

impl ConversionRequest {
    pub fn validate(self, ctx: BeaconContext) -> Result<ConversionEvent, ApiError> {
        let mut checks = FieldChecks::default();
        let session_id = session_id(&mut checks, self.session_id);
        let conversion_type = checks.required_text("type", self.conversion_type, LABEL_MAX_LEN);
        let page = checks.required_text("page", self.page, PAGE_MAX_LEN);
        let value = match self.value {
            Some(v) if !v.is_finite() => {
                checks.reject("value", "must be a finite number");
                None
            }
            other => other,
        };
        let record = match (session_id, conversion_type, page) {
            (Some(session_id), Some(conversion_type), Some(page)) => Some(ConversionEvent {
                session_id,
                conversion_type,
                value,
                page,
                metadata: self.metadata.filter(|m| !m.is_null()),
                occurred_at: client_time(self.timestamp, ctx.now),
            }),
            _ => None,
        };
        checks.finish(record)
    }
}

fn target_pages(checks: &mut FieldChecks, pages: Vec<String>) -> Option<Vec<String>> {
    if pages.len() > TARGET_PAGES_MAX {
        checks.reject("targetPages", format!("at most {TARGET_PAGES_MAX} pages"));
        return None;
    }
    let mut out = Vec::with_capacity(pages.len());
    for page in pages {
        out.push(checks.required_text("targetPages", Some(page), PAGE_MAX_LEN)?);
    }
    Some(out)
}

fn traffic_split(checks: &mut FieldChecks, raw: Option<i64>) -> Option<TrafficSplit> {
    let raw = raw?;
    checks.parse(TrafficSplit::new(raw))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateExperimentRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub traffic_split: Option<i64>,
    pub target_pages: Option<Vec<String>>,
    pub component: Option<String>,
    pub control_version: Option<Value>,
    pub variant_version: Option<Value>,
    pub primary_goal: Option<String>,
    pub success_metric: Option<String>,
}

impl CreateExperimentRequest {
    pub fn validate(self) -> Result<NewExperiment, ApiError> {
        let mut checks = FieldChecks::default();
        let name = match self.name {
            None => {
                checks.reject("name", "is required");
                None
            }
            Some(raw) => checks.parse(ExperimentName::parse(raw.trim())),
        };
        let description = checks.optional_text("description", self.description, DESCRIPTION_MAX_LEN);
        let split = traffic_split(&mut checks, self.traffic_split);
        let pages = target_pages(&mut checks, self.target_pages.unwrap_or_default());
        let component = checks.optional_text("component", self.component, LABEL_MAX_LEN);
        let primary_goal = checks.optional_text("primaryGoal", self.primary_goal, LABEL_MAX_LEN);
        let success_metric =
            checks.optional_text("successMetric", self.success_metric, LABEL_MAX_LEN);
        let experiment = name.map(|name| {
            let mut exp = NewExperiment::named(name);
            exp.description = description.unwrap_or_default();
            exp.traffic_split = split.unwrap_or_default();
            exp.target_pages = pages.unwrap_or_default();
            exp.component = component;
            if let Some(v) = self.control_version {
                exp.control_version = v;
            }
            if let Some(v) = self.variant_version {
                exp.variant_version = v;
            }
            exp.primary_goal = primary_goal;
            exp.success_metric = success_metric;
            exp
        });
        checks.finish(experiment)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateExperimentRequest {
    pub is_active: Option<bool>,
    pub description: Option<String>,
    pub traffic_split: Option<i64>,
    pub target_pages: Option<Vec<String>>,
    pub component: Option<String>,
    pub control_version: Option<Value>,
    pub variant_version: Option<Value>,
    pub primary_goal: Option<String>,
    pub success_metric: Option<String>,
}

impl UpdateExperimentRequest {
    pub fn validate(self) -> Result<ExperimentPatch, ApiError> {
        let mut checks = FieldChecks::default();
        let patch = ExperimentPatch {
            is_active: self.is_active,
            description: checks.optional_text(
                "description",
                self.description,
                DESCRIPTION_MAX_LEN,
            ),
            traffic_split: traffic_split(&mut checks, self.traffic_split),
            target_pages: self.target_pages.and_then(|p| target_pages(&mut checks, p)),
            component: checks.optional_text("component", self.component, LABEL_MAX_LEN),
            control_version: self.control_version,
            variant_version: self.variant_version,
            primary_goal: checks.optional_text("primaryGoal", self.primary_goal, LABEL_MAX_LEN),
            success_metric: checks.optional_text(
                "successMetric",
                self.success_metric,
                LABEL_MAX_LEN,
            ),
        };
        if patch.is_empty() && checks.is_clean() {
            checks.reject("body", "no updatable fields supplied");
        }
        checks.finish(Some(patch))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportQuery {
    pub range: Option<String>,
}
