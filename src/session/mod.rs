//! Learning sessions: per-block goal tracking driven by focus readings.

pub mod errors;
pub mod state;
pub mod tracker;

pub use errors::SessionError;
pub use state::{LearningSession, SessionStatus, TickOutcome};
pub use tracker::SessionTracker;
