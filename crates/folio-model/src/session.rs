// SPDX-License-Identifier: Apache-2.0

use crate::ids::SessionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

pub const UNKNOWN_LABEL: &str = "unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    Desktop,
    Mobile,
    Tablet,
}

impl DeviceClass {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Desktop => "desktop",
            Self::Mobile => "mobile",
            Self::Tablet => "tablet",
        }
    }

    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "desktop" => Some(Self::Desktop),
            "mobile" => Some(Self::Mobile),
            "tablet" => Some(Self::Tablet),
            _ => None,
        }
    }
}

impl Display for DeviceClass {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reporting labels derived from a user-agent string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientProfile {
    pub device: DeviceClass,
    pub browser: String,
    pub os: String,
}

impl Default for ClientProfile {
    fn default() -> Self {
        Self {
            device: DeviceClass::Desktop,
            browser: UNKNOWN_LABEL.to_string(),
            os: UNKNOWN_LABEL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionAction {
    Start,
    End,
}

/// Session-start signal as persisted by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStart {
    pub session_id: SessionId,
    pub page: String,
    pub referrer: Option<String>,
    pub user_agent: Option<String>,
    pub profile: ClientProfile,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub session_id: SessionId,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration: Option<i64>,
    pub is_active: bool,
    pub entry_page: Option<String>,
    pub exit_page: Option<String>,
    pub referrer: Option<String>,
    pub user_agent: Option<String>,
    pub device: Option<DeviceClass>,
    pub browser: Option<String>,
    pub os: Option<String>,
    pub page_views: u64,
    pub has_converted: bool,
    pub conversion_type: Option<String>,
    pub conversion_value: Option<f64>,
}

/// Whole seconds between two instants, clamped at zero for skewed clocks.
#[must_use]
pub fn whole_seconds_between(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    (end - start).num_seconds().max(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn duration_is_whole_seconds_and_never_negative() {
        let start = Utc.timestamp_millis_opt(1_700_000_000_000).single().expect("ts");
        let end = Utc.timestamp_millis_opt(1_700_000_065_900).single().expect("ts");
        assert_eq!(whole_seconds_between(start, end), 65);
        assert_eq!(whole_seconds_between(end, start), 0);
    }

    #[test]
    fn device_labels_round_trip() {
        for d in [DeviceClass::Desktop, DeviceClass::Mobile, DeviceClass::Tablet] {
            assert_eq!(DeviceClass::from_label(d.as_str()), Some(d));
        }
        assert_eq!(DeviceClass::from_label("watch"), None);
    }
}
