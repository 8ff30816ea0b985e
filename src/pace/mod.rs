//! Weekly adaptive pacing: a small tabular Q-learner that nudges the study
//! plan once a week.

pub mod learner;
pub mod reward;
pub mod state;
pub mod table;

pub use learner::{
    PaceLearner, PaceSettings, PaceStep, PendingExperience, ResolvedExperience, WeeklyAdjustment,
    ADJUSTMENT_INTERVAL_DAYS,
};
pub use reward::{RewardInputs, DEFAULT_SATISFACTION};
pub use state::{PaceAction, PaceState, WeeklyAggregates};
pub use table::{QEntry, QTable};
