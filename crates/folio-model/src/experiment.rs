// SPDX-License-Identifier: Apache-2.0

use crate::ids::{Arm, ExperimentId, ExperimentName, ParseError, SessionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_TRAFFIC_SPLIT: u8 = 50;
pub const TARGET_PAGES_MAX: usize = 32;

/// Percentage of traffic routed to the variant arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrafficSplit(u8);

impl TrafficSplit {
    pub fn new(percent: i64) -> Result<Self, ParseError> {
        u8::try_from(percent)
            .ok()
            .filter(|p| *p <= 100)
            .map(Self)
            .ok_or(ParseError::InvalidFormat("trafficSplit"))
    }

    #[must_use]
    pub const fn percent(self) -> u8 {
        self.0
    }
}

impl Default for TrafficSplit {
    fn default() -> Self {
        Self(DEFAULT_TRAFFIC_SPLIT)
    }
}

/// Views and conversions accumulated by one arm.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArmCounts {
    pub views: u64,
    pub conversions: u64,
}

/// Significance fields persisted on an experiment after evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Significance {
    pub p_value: f64,
    pub confidence_level: Option<f64>,
    pub is_significant: bool,
    pub winner: Option<Arm>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Experiment {
    pub id: ExperimentId,
    pub name: ExperimentName,
    pub description: String,
    pub is_active: bool,
    pub traffic_split: TrafficSplit,
    pub target_pages: Vec<String>,
    pub component: Option<String>,
    pub control_version: Value,
    pub variant_version: Value,
    pub primary_goal: Option<String>,
    pub success_metric: Option<String>,
    pub control_views: u64,
    pub variant_views: u64,
    pub control_conversions: u64,
    pub variant_conversions: u64,
    pub confidence_level: Option<f64>,
    pub p_value: Option<f64>,
    pub is_significant: bool,
    pub winner: Option<Arm>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Experiment {
    #[must_use]
    pub fn counts(&self, arm: Arm) -> ArmCounts {
        match arm {
            Arm::Control => ArmCounts {
                views: self.control_views,
                conversions: self.control_conversions,
            },
            Arm::Variant => ArmCounts {
                views: self.variant_views,
                conversions: self.variant_conversions,
            },
        }
    }

    #[must_use]
    pub fn significance(&self) -> Option<Significance> {
        self.p_value.map(|p_value| Significance {
            p_value,
            confidence_level: self.confidence_level,
            is_significant: self.is_significant,
            winner: self.winner,
        })
    }
}

/// Admin-supplied definition of a new experiment. Always created inactive.
#[derive(Debug, Clone, PartialEq)]
pub struct NewExperiment {
    pub name: ExperimentName,
    pub description: String,
    pub traffic_split: TrafficSplit,
    pub target_pages: Vec<String>,
    pub component: Option<String>,
    pub control_version: Value,
    pub variant_version: Value,
    pub primary_goal: Option<String>,
    pub success_metric: Option<String>,
}

impl NewExperiment {
    #[must_use]
    pub fn named(name: ExperimentName) -> Self {
        Self {
            name,
            description: String::new(),
            traffic_split: TrafficSplit::default(),
            target_pages: Vec::new(),
            component: None,
            control_version: Value::Object(serde_json::Map::new()),
            variant_version: Value::Object(serde_json::Map::new()),
            primary_goal: None,
            success_metric: None,
        }
    }
}

/// Partial update; `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExperimentPatch {
    pub is_active: Option<bool>,
    pub description: Option<String>,
    pub traffic_split: Option<TrafficSplit>,
    pub target_pages: Option<Vec<String>>,
    pub component: Option<String>,
    pub control_version: Option<Value>,
    pub variant_version: Option<Value>,
    pub primary_goal: Option<String>,
    pub success_metric: Option<String>,
}

impl ExperimentPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: String,
    pub experiment_id: ExperimentId,
    pub session_id: SessionId,
    pub variant: String,
    pub has_converted: bool,
    pub converted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Assignment {
    #[must_use]
    pub fn arm(&self) -> Arm {
        Arm::from_label(&self.variant)
    }
}
