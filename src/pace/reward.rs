use super::state::{PaceState, MAX_COMPLETION_BUCKET, MAX_QUIZ_BUCKET};

pub const RETENTION_WEIGHT: f64 = 0.35;
pub const COMPLETION_WEIGHT: f64 = 0.25;
pub const SATISFACTION_WEIGHT: f64 = 0.25;
pub const BURNOUT_WEIGHT: f64 = 0.10;

/// Satisfaction assumed when the user gave no rating (3 of 5).
pub const DEFAULT_SATISFACTION: f64 = 0.6;

/// Terms of the post-hoc weekly reward. Each is clamped to `[-1, 1]`
/// before weighting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RewardInputs {
    pub delta_retention: f64,
    pub delta_completion: f64,
    pub satisfaction: f64,
    pub burnout_penalty: f64,
}

impl RewardInputs {
    /// Inputs for the week that led from `prev` to `next`.
    pub fn between(prev: &PaceState, next: &PaceState, satisfaction: f64) -> Self {
        Self {
            delta_retention: (f64::from(next.quiz_score) - f64::from(prev.quiz_score))
                / f64::from(MAX_QUIZ_BUCKET),
            delta_completion: (f64::from(next.completion) - f64::from(prev.completion))
                / f64::from(MAX_COMPLETION_BUCKET),
            satisfaction,
            burnout_penalty: if next.burnout { 1.0 } else { 0.0 },
        }
    }

    /// # Panics
    ///
    /// If any term is NaN or infinite.
    pub fn reward(&self) -> f64 {
        let terms = [
            self.delta_retention,
            self.delta_completion,
            self.satisfaction,
            self.burnout_penalty,
        ];
        assert!(
            terms.iter().all(|term| term.is_finite()),
            "reward inputs must be finite, got {self:?}"
        );

        let clamp = |value: f64| value.clamp(-1.0, 1.0);
        RETENTION_WEIGHT * clamp(self.delta_retention)
            + COMPLETION_WEIGHT * clamp(self.delta_completion)
            + SATISFACTION_WEIGHT * clamp(self.satisfaction)
            - BURNOUT_WEIGHT * clamp(self.burnout_penalty)
    }
}
