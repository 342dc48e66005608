// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

pub const SESSION_ID_MAX_LEN: usize = 128;
pub const EXPERIMENT_NAME_MAX_LEN: usize = 128;
pub const EXPERIMENT_ID_MAX_LEN: usize = 64;
pub const VARIANT_LABEL_MAX_LEN: usize = 64;

pub const CONTROL_LABEL: &str = "control";
pub const VARIANT_LABEL: &str = "variant";

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParseError {
    Empty(&'static str),
    Trimmed(&'static str),
    TooLong(&'static str, usize),
    InvalidFormat(&'static str),
}

impl ParseError {
    /// Field the error refers to, used for field-level error reporting.
    #[must_use]
    pub fn field(&self) -> &'static str {
        match self {
            Self::Empty(name)
            | Self::Trimmed(name)
            | Self::TooLong(name, _)
            | Self::InvalidFormat(name) => name,
        }
    }
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty(name) => write!(f, "{name} must not be empty"),
            Self::Trimmed(name) => {
                write!(f, "{name} must not contain leading/trailing whitespace")
            }
            Self::TooLong(name, max) => write!(f, "{name} exceeds max length {max}"),
            Self::InvalidFormat(name) => write!(f, "{name} has an invalid format"),
        }
    }
}

impl std::error::Error for ParseError {}

fn check_bounds(name: &'static str, input: &str, max: usize) -> Result<(), ParseError> {
    if input.is_empty() {
        return Err(ParseError::Empty(name));
    }
    if input.trim() != input {
        return Err(ParseError::Trimmed(name));
    }
    if input.len() > max {
        return Err(ParseError::TooLong(name, max));
    }
    Ok(())
}

/// Client-generated browsing session identifier (`session_<ms>_<rand>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(transparent)]
#[non_exhaustive]
pub struct SessionId(String);

impl SessionId {
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        check_bounds("sessionId", input, SESSION_ID_MAX_LEN)?;
        if !input
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.' | b':'))
        {
            return Err(ParseError::InvalidFormat("sessionId"));
        }
        Ok(Self(input.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(transparent)]
#[non_exhaustive]
pub struct ExperimentName(String);

impl ExperimentName {
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        check_bounds("experimentName", input, EXPERIMENT_NAME_MAX_LEN)?;
        if input.chars().any(char::is_control) {
            return Err(ParseError::InvalidFormat("experimentName"));
        }
        Ok(Self(input.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ExperimentName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(transparent)]
#[non_exhaustive]
pub struct ExperimentId(String);

impl ExperimentId {
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn parse(input: &str) -> Result<Self, ParseError> {
        check_bounds("id", input, EXPERIMENT_ID_MAX_LEN)?;
        if !input.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-') {
            return Err(ParseError::InvalidFormat("id"));
        }
        Ok(Self(input.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ExperimentId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Variant label as sent by the client. Only `"control"` maps to the control arm.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
#[non_exhaustive]
pub struct VariantLabel(String);

impl VariantLabel {
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        check_bounds("variant", input, VARIANT_LABEL_MAX_LEN)?;
        Ok(Self(input.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn arm(&self) -> Arm {
        Arm::from_label(&self.0)
    }
}

/// One side of a two-arm experiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arm {
    Control,
    Variant,
}

impl Arm {
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        if label == CONTROL_LABEL {
            Self::Control
        } else {
            Self::Variant
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Control => CONTROL_LABEL,
            Self::Variant => VARIANT_LABEL,
        }
    }

    pub fn parse(input: &str) -> Result<Self, ParseError> {
        match input {
            CONTROL_LABEL => Ok(Self::Control),
            VARIANT_LABEL => Ok(Self::Variant),
            _ => Err(ParseError::InvalidFormat("arm")),
        }
    }
}

impl Display for Arm {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
