//! One row per classifier tick: which app held focus and how attentive the
//! user was while it did.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::focus::{FocusReading, FocusState};
use crate::sensing::ActiveApp;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppUsage {
    pub id: Option<i64>,
    pub timestamp: DateTime<Utc>,
    pub app_name: String,
    pub window_title: String,
    /// Time this row accounts for.
    pub duration_ms: u64,
    /// How long the app had held focus without a switch at `timestamp`.
    pub held_ms: u64,
    pub focus_state: FocusState,
    pub composite_score: f64,
}

impl AppUsage {
    pub fn from_tick(app: &ActiveApp, reading: &FocusReading, duration_ms: u64) -> Self {
        let held_ms = (reading.timestamp - app.since).num_milliseconds().max(0) as u64;
        Self {
            id: None,
            timestamp: reading.timestamp,
            app_name: app.app_name.clone(),
            window_title: app.title.clone(),
            duration_ms,
            held_ms,
            focus_state: reading.state,
            composite_score: reading.composite_score,
        }
    }
}

/// Per-app time over a range, with the focused share broken out.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AppUsageTotal {
    pub app_name: String,
    pub total_ms: u64,
    pub focused_ms: u64,
}
