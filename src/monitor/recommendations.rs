use serde::Serialize;

use crate::focus::FocusState;

/// A decline steeper than this while focused suggests a break.
pub const DECLINE_THRESHOLD: f64 = -5.0;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    ShortBreak,
    KeepMomentum,
    CloseDistractions,
    EnableDoNotDisturb,
    ReturnToLearning,
    RestAndReturn,
}

impl Recommendation {
    pub fn message(&self) -> &'static str {
        match self {
            Recommendation::ShortBreak => "Your focus is declining. Consider a 2-minute break.",
            Recommendation::KeepMomentum => "Good focus level. Keep up the momentum!",
            Recommendation::CloseDistractions => "Distracted state detected. Close distracting tabs or apps?",
            Recommendation::EnableDoNotDisturb => "Enable Do Not Disturb mode?",
            Recommendation::ReturnToLearning => "No activity detected. Return to learning?",
            Recommendation::RestAndReturn => "Or take a break and come back refreshed.",
        }
    }
}

pub fn recommendations(state: FocusState, trend: f64) -> Vec<Recommendation> {
    match state {
        FocusState::Focused if trend < DECLINE_THRESHOLD => vec![Recommendation::ShortBreak],
        FocusState::Focused => Vec::new(),
        FocusState::Active => vec![Recommendation::KeepMomentum],
        FocusState::Distracted => vec![
            Recommendation::CloseDistractions,
            Recommendation::EnableDoNotDisturb,
        ],
        FocusState::Inactive => vec![
            Recommendation::ReturnToLearning,
            Recommendation::RestAndReturn,
        ],
    }
}
