//! Probe readings shared by every sampler.
//!
//! A sampler never fails: when its capability is missing it reports
//! `available = false` with the neutral value, and the classifier only ever
//! looks at that flag.

use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Error};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Value reported by a sampler whose capability is unavailable.
pub const NEUTRAL_VALUE: f64 = 0.5;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum SignalName {
    Pose,
    Gaze,
    WindowStability,
    AmbientAudio,
    MouseActivity,
    KeyboardRhythm,
    CpuLoad,
}

impl SignalName {
    pub const ALL: [SignalName; 7] = [
        SignalName::Pose,
        SignalName::Gaze,
        SignalName::WindowStability,
        SignalName::AmbientAudio,
        SignalName::MouseActivity,
        SignalName::KeyboardRhythm,
        SignalName::CpuLoad,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalName::Pose => "pose",
            SignalName::Gaze => "gaze",
            SignalName::WindowStability => "window_stability",
            SignalName::AmbientAudio => "ambient_audio",
            SignalName::MouseActivity => "mouse_activity",
            SignalName::KeyboardRhythm => "keyboard_rhythm",
            SignalName::CpuLoad => "cpu_load",
        }
    }
}

impl fmt::Display for SignalName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalName {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        SignalName::ALL
            .into_iter()
            .find(|name| name.as_str() == value)
            .ok_or_else(|| anyhow!("unknown signal name '{value}'"))
    }
}

/// One probe reading. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SignalSample {
    pub timestamp: DateTime<Utc>,
    pub signal_name: SignalName,
    pub value: f64,
    pub available: bool,
}

impl SignalSample {
    /// A measured reading. Values are clamped into `[0, 1]`.
    pub fn measured(signal_name: SignalName, value: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            signal_name,
            value: value.clamp(0.0, 1.0),
            available: true,
        }
    }

    pub fn unavailable(signal_name: SignalName, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            signal_name,
            value: NEUTRAL_VALUE,
            available: false,
        }
    }
}

/// A periodic low-level probe.
///
/// `sample` runs on a blocking worker and must return quickly; slow or
/// missing capabilities are reported through [`SignalSample::unavailable`].
pub trait Sampler: Send {
    fn signal(&self) -> SignalName;

    fn sample(&mut self, now: DateTime<Utc>) -> SignalSample;
}
