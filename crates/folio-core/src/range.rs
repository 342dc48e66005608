// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Duration, Utc};
use std::fmt::{Display, Formatter};

/// Reporting window for the admin dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReportRange {
    OneHour,
    OneDay,
    #[default]
    SevenDays,
    ThirtyDays,
    NinetyDays,
    OneYear,
}

impl ReportRange {
    /// Unrecognised labels fall back to the default window.
    #[must_use]
    pub fn parse_or_default(input: Option<&str>) -> Self {
        match input.map(str::trim) {
            Some("1h") => Self::OneHour,
            Some("24h") => Self::OneDay,
            Some("30d") => Self::ThirtyDays,
            Some("90d") => Self::NinetyDays,
            Some("1y") => Self::OneYear,
            _ => Self::SevenDays,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OneHour => "1h",
            Self::OneDay => "24h",
            Self::SevenDays => "7d",
            Self::ThirtyDays => "30d",
            Self::NinetyDays => "90d",
            Self::OneYear => "1y",
        }
    }

    #[must_use]
    pub fn duration(self) -> Duration {
        match self {
            Self::OneHour => Duration::hours(1),
            Self::OneDay => Duration::hours(24),
            Self::SevenDays => Duration::days(7),
            Self::ThirtyDays => Duration::days(30),
            Self::NinetyDays => Duration::days(90),
            Self::OneYear => Duration::days(365),
        }
    }

    /// `(previous_start, current_start)`; the current window ends at `now`.
    #[must_use]
    pub fn windows(self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let current_start = now - self.duration();
        (current_start - self.duration(), current_start)
    }
}

impl Display for ReportRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whole-percent change against the previous period.
#[must_use]
pub fn calculate_trend(current: u64, previous: u64) -> i64 {
    if previous == 0 {
        return if current > 0 { 100 } else { 0 };
    }
    let delta = current as f64 - previous as f64;
    (delta / previous as f64 * 100.0).round() as i64
}

/// Rounded whole percentage, zero for an empty total.
#[must_use]
pub fn percent_of(part: u64, total: u64) -> u64 {
    if total == 0 {
        return 0;
    }
    (part as f64 / total as f64 * 100.0).round() as u64
}
