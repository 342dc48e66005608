// SPDX-License-Identifier: Apache-2.0

//! Append-only beacon records. Every record carries the client-reported time.

use crate::ids::SessionId;
use crate::session::DeviceClass;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{Display, Formatter};

/// Resolves a client timestamp (epoch millis), falling back to `now` when absent
/// or out of range.
#[must_use]
pub fn client_time(timestamp_ms: Option<i64>, now: DateTime<Utc>) -> DateTime<Utc> {
    timestamp_ms
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .unwrap_or(now)
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageView {
    pub session_id: SessionId,
    pub path: String,
    pub title: Option<String>,
    pub referrer: Option<String>,
    pub device: DeviceClass,
    pub metadata: Option<Value>,
    pub occurred_at: DateTime<Utc>,
}

/// Core Web Vitals tracked by the performance beacon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WebVital {
    Lcp,
    Fid,
    Cls,
    Fcp,
    Ttfb,
}

impl WebVital {
    pub const ALL: [WebVital; 5] = [Self::Lcp, Self::Fid, Self::Cls, Self::Fcp, Self::Ttfb];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lcp => "LCP",
            Self::Fid => "FID",
            Self::Cls => "CLS",
            Self::Fcp => "FCP",
            Self::Ttfb => "TTFB",
        }
    }
}

impl Display for WebVital {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WebVitals {
    pub lcp: Option<f64>,
    pub fid: Option<f64>,
    pub cls: Option<f64>,
    pub fcp: Option<f64>,
    pub ttfb: Option<f64>,
}

impl WebVitals {
    #[must_use]
    pub fn get(&self, vital: WebVital) -> Option<f64> {
        match vital {
            WebVital::Lcp => self.lcp,
            WebVital::Fid => self.fid,
            WebVital::Cls => self.cls,
            WebVital::Fcp => self.fcp,
            WebVital::Ttfb => self.ttfb,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        WebVital::ALL.iter().all(|v| self.get(*v).is_none())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
    pub effective_type: Option<String>,
    pub downlink: Option<f64>,
    pub rtt: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceSample {
    pub session_id: SessionId,
    pub page: String,
    pub vitals: WebVitals,
    pub connection: Option<ConnectionInfo>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngagementEvent {
    pub session_id: SessionId,
    pub page: String,
    pub event: String,
    pub time_on_page_ms: Option<i64>,
    pub scroll_depth: Option<i64>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConversionEvent {
    pub session_id: SessionId,
    pub conversion_type: String,
    pub value: Option<f64>,
    pub page: String,
    pub metadata: Option<Value>,
    pub occurred_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_time_prefers_reported_timestamp() {
        let now = Utc.timestamp_millis_opt(2_000_000_000_000).single().expect("now");
        let reported = client_time(Some(1_700_000_000_123), now);
        assert_eq!(reported.timestamp_millis(), 1_700_000_000_123);
        assert_eq!(client_time(None, now), now);
        assert_eq!(client_time(Some(i64::MAX), now), now);
    }

    #[test]
    fn empty_vitals_are_detected() {
        assert!(WebVitals::default().is_empty());
        let v = WebVitals {
            cls: Some(0.02),
            ..WebVitals::default()
        };
        assert!(!v.is_empty());
        assert_eq!(v.get(WebVital::Cls), Some(0.02));
    }
}
