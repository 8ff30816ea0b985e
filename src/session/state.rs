use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::SessionError;
use crate::focus::FocusReading;
use crate::schedule::BlockType;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Active,
    Completed,
    Abandoned,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "ACTIVE",
            SessionStatus::Completed => "COMPLETED",
            SessionStatus::Abandoned => "ABANDONED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::Active)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Progressed,
    Completed,
}

/// One attempt at a block's goal.
///
/// Completion is conjunctive: the session completes only on the tick where
/// both `elapsed_ms >= goal_ms` and
/// `running_attention_average >= attention_threshold` hold. Completed and
/// abandoned sessions never change again.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LearningSession {
    pub session_id: String,
    pub block_type: BlockType,
    pub block_name: String,
    pub start_time: DateTime<Utc>,
    pub goal_ms: u64,
    pub attention_threshold: f64,
    pub elapsed_ms: u64,
    pub running_attention_average: f64,
    pub reading_count: u64,
    pub last_reading_at: Option<DateTime<Utc>>,
    pub status: SessionStatus,
    pub ended_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl LearningSession {
    /// # Panics
    ///
    /// If `attention_threshold` is outside `[0, 1]` or NaN.
    pub fn begin(
        session_id: String,
        block_type: BlockType,
        block_name: String,
        goal_ms: u64,
        attention_threshold: f64,
        start_time: DateTime<Utc>,
    ) -> Self {
        assert!(
            (0.0..=1.0).contains(&attention_threshold),
            "attention threshold must be within [0, 1], got {attention_threshold}"
        );

        Self {
            session_id,
            block_type,
            block_name,
            start_time,
            goal_ms,
            attention_threshold,
            elapsed_ms: 0,
            running_attention_average: 0.0,
            reading_count: 0,
            last_reading_at: None,
            status: SessionStatus::Active,
            ended_at: None,
            updated_at: start_time,
        }
    }

    pub fn duration_met(&self) -> bool {
        self.elapsed_ms >= self.goal_ms
    }

    pub fn attention_met(&self) -> bool {
        self.running_attention_average >= self.attention_threshold
    }

    pub fn goal_met(&self) -> bool {
        self.duration_met() && self.attention_met()
    }

    /// Share of the duration goal reached, capped at 1.
    pub fn time_progress(&self) -> f64 {
        if self.goal_ms == 0 {
            return 1.0;
        }
        (self.elapsed_ms as f64 / self.goal_ms as f64).min(1.0)
    }

    /// Running average relative to the threshold, capped at 1.
    pub fn attention_progress(&self) -> f64 {
        if self.attention_threshold <= 0.0 {
            return 1.0;
        }
        (self.running_attention_average / self.attention_threshold).min(1.0)
    }

    /// Applies one classifier tick worth `tick_ms` of elapsed time.
    ///
    /// Readings must arrive in non-decreasing timestamp order, none earlier
    /// than `start_time`; an older reading is rejected without touching the
    /// session.
    pub fn apply_reading(
        &mut self,
        reading: &FocusReading,
        tick_ms: u64,
    ) -> Result<TickOutcome, SessionError> {
        if self.status.is_terminal() {
            return Err(SessionError::InvalidState {
                block_type: self.block_type,
                status: self.status,
            });
        }
        // Nothing may precede the session start, including the first reading.
        let last = self.last_reading_at.unwrap_or(self.start_time);
        if reading.timestamp < last {
            return Err(SessionError::OutOfOrder {
                last,
                received: reading.timestamp,
            });
        }

        let score = reading.normalized_score();
        assert!(
            (0.0..=1.0).contains(&score),
            "reading score must be within [0, 100], got {}",
            reading.composite_score
        );

        let count = self.reading_count + 1;
        let average =
            self.running_attention_average + (score - self.running_attention_average) / count as f64;
        let elapsed_ms = self.elapsed_ms.saturating_add(tick_ms);

        self.reading_count = count;
        self.running_attention_average = average;
        self.elapsed_ms = elapsed_ms;
        self.last_reading_at = Some(reading.timestamp);
        self.updated_at = reading.timestamp;

        if self.goal_met() {
            self.status = SessionStatus::Completed;
            self.ended_at = Some(reading.timestamp);
            return Ok(TickOutcome::Completed);
        }
        Ok(TickOutcome::Progressed)
    }

    /// Ends an active session: completed if the goal already holds,
    /// abandoned otherwise.
    pub fn finish(&mut self, at: DateTime<Utc>) -> Result<SessionStatus, SessionError> {
        if self.status.is_terminal() {
            return Err(SessionError::InvalidState {
                block_type: self.block_type,
                status: self.status,
            });
        }

        self.status = if self.goal_met() {
            SessionStatus::Completed
        } else {
            SessionStatus::Abandoned
        };
        self.ended_at = Some(at);
        self.updated_at = at;
        Ok(self.status)
    }
}
