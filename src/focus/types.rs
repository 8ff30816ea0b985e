use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Error};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::sensing::SignalName;

/// Inclusive lower bounds of each state on the 0-100 composite scale.
pub const FOCUSED_MIN: f64 = 80.0;
pub const ACTIVE_MIN: f64 = 50.0;
pub const DISTRACTED_MIN: f64 = 20.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FocusState {
    Focused,
    Active,
    Distracted,
    Inactive,
}

impl FocusState {
    /// Maps a composite score to its state. Every finite score lands in
    /// exactly one bucket.
    pub fn from_score(score: f64) -> Self {
        if score >= FOCUSED_MIN {
            FocusState::Focused
        } else if score >= ACTIVE_MIN {
            FocusState::Active
        } else if score >= DISTRACTED_MIN {
            FocusState::Distracted
        } else {
            FocusState::Inactive
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FocusState::Focused => "FOCUSED",
            FocusState::Active => "ACTIVE",
            FocusState::Distracted => "DISTRACTED",
            FocusState::Inactive => "INACTIVE",
        }
    }
}

impl FromStr for FocusState {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "FOCUSED" => Ok(FocusState::Focused),
            "ACTIVE" => Ok(FocusState::Active),
            "DISTRACTED" => Ok(FocusState::Distracted),
            "INACTIVE" => Ok(FocusState::Inactive),
            other => Err(anyhow!("unknown focus state {other}")),
        }
    }
}

impl fmt::Display for FocusState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User- or context-asserted flags that neutralize one signal's penalty.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ExceptionTag {
    /// Looking down at paper is not looking away: gaze is read as neutral.
    TakingNotes,
    /// Speaking is expected: ambient audio is read as neutral.
    Presenting,
}

impl ExceptionTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExceptionTag::TakingNotes => "taking_notes",
            ExceptionTag::Presenting => "presenting",
        }
    }

    /// The signal this tag suppresses.
    pub fn suppressed_signal(&self) -> SignalName {
        match self {
            ExceptionTag::TakingNotes => SignalName::Gaze,
            ExceptionTag::Presenting => SignalName::AmbientAudio,
        }
    }
}

impl FromStr for ExceptionTag {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "taking_notes" => Ok(ExceptionTag::TakingNotes),
            "presenting" => Ok(ExceptionTag::Presenting),
            other => Err(anyhow!("unknown exception tag '{other}'")),
        }
    }
}

/// How one signal fed the composite on a tick.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SignalContribution {
    /// Weight after renormalizing over the available signals.
    pub weight: f64,
    /// Value used, after exception suppression.
    pub value: f64,
    /// `weight * value` on the 0-100 scale.
    pub contribution: f64,
}

/// Classifier output for one tick.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FocusReading {
    pub timestamp: DateTime<Utc>,
    pub composite_score: f64,
    pub state: FocusState,
    pub signal_breakdown: BTreeMap<SignalName, SignalContribution>,
    pub active_exceptions: BTreeSet<ExceptionTag>,
}

impl FocusReading {
    /// Composite score on the `[0, 1]` attention scale used by sessions.
    pub fn normalized_score(&self) -> f64 {
        self.composite_score / 100.0
    }
}
