//! Focus classification: weighted fusion of signal samples into a 0-100
//! composite and one of four discrete states.

pub mod classifier;
pub mod types;
pub mod weights;

pub use classifier::{classify, FocusClassifier, EXCEPTION_NEUTRAL_VALUE, FALLBACK_SCORE};
pub use types::{ExceptionTag, FocusReading, FocusState, SignalContribution};
pub use weights::SignalWeights;
