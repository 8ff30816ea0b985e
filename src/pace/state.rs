use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Error};
use serde::{Deserialize, Serialize};

pub const MAX_FOCUS_HOURS_BUCKET: u8 = 10;
pub const MAX_QUIZ_BUCKET: u8 = 5;
pub const MAX_COMPLETION_BUCKET: u8 = 10;

/// Recent focus below this share of the earlier days' focus flags burnout.
pub const BURNOUT_RATIO: f64 = 0.85;

/// Raw weekly statistics the discretised state is derived from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyAggregates {
    pub avg_daily_focus_hours: f64,
    /// Mean of the latest quiz percentages, `[0, 100]`.
    pub avg_quiz_score: f64,
    /// Completed share of finished sessions, `[0, 1]`.
    pub completion_rate: f64,
    pub recent_focus: f64,
    pub past_focus: f64,
}

impl WeeklyAggregates {
    pub fn burnout(&self) -> bool {
        self.recent_focus < self.past_focus * BURNOUT_RATIO
    }
}

/// Discretised weekly state. Small and fixed on purpose: the table has at
/// most 11 * 6 * 11 * 2 rows.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub struct PaceState {
    pub focus_hours: u8,
    pub quiz_score: u8,
    pub completion: u8,
    pub burnout: bool,
}

impl PaceState {
    pub fn new(focus_hours: u8, quiz_score: u8, completion: u8, burnout: bool) -> Self {
        Self {
            focus_hours: focus_hours.min(MAX_FOCUS_HOURS_BUCKET),
            quiz_score: quiz_score.min(MAX_QUIZ_BUCKET),
            completion: completion.min(MAX_COMPLETION_BUCKET),
            burnout,
        }
    }

    pub fn from_aggregates(aggregates: &WeeklyAggregates) -> Self {
        Self::new(
            bucket(aggregates.avg_daily_focus_hours, MAX_FOCUS_HOURS_BUCKET),
            bucket(aggregates.avg_quiz_score / 20.0, MAX_QUIZ_BUCKET),
            bucket(aggregates.completion_rate * 10.0, MAX_COMPLETION_BUCKET),
            aggregates.burnout(),
        )
    }

    /// Storage key, e.g. `f3-q4-c7-b0`.
    pub fn key(&self) -> String {
        format!(
            "f{}-q{}-c{}-b{}",
            self.focus_hours,
            self.quiz_score,
            self.completion,
            u8::from(self.burnout)
        )
    }
}

fn bucket(value: f64, max: u8) -> u8 {
    if !value.is_finite() || value <= 0.0 {
        return 0;
    }
    value.floor().min(f64::from(max)) as u8
}

impl fmt::Display for PaceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

impl FromStr for PaceState {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = value.split('-').collect();
        let [focus, quiz, completion, burnout] = parts.as_slice() else {
            bail!("malformed pace state key '{value}'");
        };

        let field = |raw: &str, prefix: char| -> Result<u8, Error> {
            raw.strip_prefix(prefix)
                .ok_or_else(|| anyhow!("expected '{prefix}' segment in '{value}'"))?
                .parse::<u8>()
                .with_context(|| format!("invalid '{prefix}' bucket in '{value}'"))
        };

        let burnout = match field(*burnout, 'b')? {
            0 => false,
            1 => true,
            other => bail!("invalid burnout flag {other} in '{value}'"),
        };
        Ok(Self::new(
            field(*focus, 'f')?,
            field(*quiz, 'q')?,
            field(*completion, 'c')?,
            burnout,
        ))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum PaceAction {
    Maintain,
    #[serde(rename = "slow_20")]
    Slow20,
    #[serde(rename = "slow_50")]
    Slow50,
    #[serde(rename = "speed_20")]
    Speed20,
    #[serde(rename = "speed_50")]
    Speed50,
    AddRestDay,
    AdjustDifficulty,
}

impl PaceAction {
    /// `Maintain` first: greedy selection breaks ties in its favour.
    pub const ALL: [PaceAction; 7] = [
        PaceAction::Maintain,
        PaceAction::Slow20,
        PaceAction::Slow50,
        PaceAction::Speed20,
        PaceAction::Speed50,
        PaceAction::AddRestDay,
        PaceAction::AdjustDifficulty,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaceAction::Maintain => "maintain",
            PaceAction::Slow20 => "slow_20",
            PaceAction::Slow50 => "slow_50",
            PaceAction::Speed20 => "speed_20",
            PaceAction::Speed50 => "speed_50",
            PaceAction::AddRestDay => "add_rest_day",
            PaceAction::AdjustDifficulty => "adjust_difficulty",
        }
    }

    /// Factor the planning layer applies to daily block goals.
    pub fn daily_target_multiplier(&self) -> f64 {
        match self {
            PaceAction::Slow20 => 0.8,
            PaceAction::Slow50 => 0.5,
            PaceAction::Speed20 => 1.2,
            PaceAction::Speed50 => 1.5,
            PaceAction::Maintain | PaceAction::AddRestDay | PaceAction::AdjustDifficulty => 1.0,
        }
    }
}

impl fmt::Display for PaceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaceAction {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        PaceAction::ALL
            .into_iter()
            .find(|action| action.as_str() == value)
            .ok_or_else(|| anyhow!("unknown pace action '{value}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn aggregates() -> WeeklyAggregates {
        WeeklyAggregates {
            avg_daily_focus_hours: 2.7,
            avg_quiz_score: 85.0,
            completion_rate: 0.75,
            recent_focus: 60.0,
            past_focus: 65.0,
        }
    }

    #[test]
    fn discretises_weekly_aggregates() {
        let state = PaceState::from_aggregates(&aggregates());
        assert_eq!(state, PaceState::new(2, 4, 7, false));
        assert_eq!(state.key(), "f2-q4-c7-b0");
    }

    #[test]
    fn buckets_saturate_and_ignore_garbage() {
        let state = PaceState::from_aggregates(&WeeklyAggregates {
            avg_daily_focus_hours: 14.0,
            avg_quiz_score: 100.0,
            completion_rate: f64::NAN,
            recent_focus: 40.0,
            past_focus: 60.0,
        });
        assert_eq!(state, PaceState::new(10, 5, 0, true));
    }

    #[test]
    fn state_keys_parse_back() {
        let state = PaceState::new(3, 1, 9, true);
        assert_eq!(state.key().parse::<PaceState>().unwrap(), state);
        assert!("f3-q1-c9".parse::<PaceState>().is_err());
        assert!("f3-q1-c9-b2".parse::<PaceState>().is_err());
        assert!("x3-q1-c9-b0".parse::<PaceState>().is_err());
    }

    #[test]
    fn actions_use_stable_names() {
        for action in PaceAction::ALL {
            assert_eq!(action.as_str().parse::<PaceAction>().unwrap(), action);
            assert_eq!(
                serde_json::to_string(&action).unwrap(),
                format!("\"{}\"", action.as_str())
            );
        }
        assert_eq!(PaceAction::ALL[0], PaceAction::Maintain);
    }
}
