use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};

use super::types::{ExceptionTag, FocusReading, FocusState, SignalContribution};
use super::weights::SignalWeights;
use crate::sensing::{SignalName, SignalSample};

/// Value a suppressed signal is read as while its exception is active.
pub const EXCEPTION_NEUTRAL_VALUE: f64 = 0.7;

/// Composite reported when no signal is available.
pub const FALLBACK_SCORE: f64 = 50.0;

/// Fuses signal samples into a [`FocusReading`].
///
/// Pure computation. Unavailable samples are ignored and the base weights
/// are renormalized over the rest, so a missing camera shifts its share onto
/// the remaining signals instead of dragging the score down.
#[derive(Debug, Clone, Default)]
pub struct FocusClassifier {
    weights: SignalWeights,
}

impl FocusClassifier {
    pub fn new(weights: SignalWeights) -> Self {
        weights.validate();
        Self { weights }
    }

    pub fn weights(&self) -> &SignalWeights {
        &self.weights
    }

    /// Classifies with the newest sample timestamp (or now) as the reading
    /// time.
    pub fn classify(
        &self,
        samples: &[SignalSample],
        exceptions: &BTreeSet<ExceptionTag>,
    ) -> FocusReading {
        let timestamp = samples
            .iter()
            .map(|sample| sample.timestamp)
            .max()
            .unwrap_or_else(Utc::now);
        self.classify_at(timestamp, samples, exceptions)
    }

    /// # Panics
    ///
    /// If an available sample carries a value outside `[0, 1]` or NaN. That
    /// is a bug in the sampler, not a runtime condition.
    pub fn classify_at(
        &self,
        timestamp: DateTime<Utc>,
        samples: &[SignalSample],
        exceptions: &BTreeSet<ExceptionTag>,
    ) -> FocusReading {
        let mut latest: BTreeMap<SignalName, &SignalSample> = BTreeMap::new();
        for sample in samples.iter().filter(|sample| sample.available) {
            assert!(
                (0.0..=1.0).contains(&sample.value),
                "{} sample value must be within [0, 1], got {}",
                sample.signal_name,
                sample.value
            );
            match latest.get(&sample.signal_name) {
                Some(existing) if existing.timestamp > sample.timestamp => {}
                _ => {
                    latest.insert(sample.signal_name, sample);
                }
            }
        }

        let available: Vec<SignalName> = latest.keys().copied().collect();
        let weights = self.weights.effective(&available);
        if weights.is_empty() {
            return FocusReading {
                timestamp,
                composite_score: FALLBACK_SCORE,
                state: FocusState::Active,
                signal_breakdown: BTreeMap::new(),
                active_exceptions: exceptions.clone(),
            };
        }

        let suppressed: BTreeSet<SignalName> = exceptions
            .iter()
            .map(ExceptionTag::suppressed_signal)
            .collect();

        let mut composite = 0.0;
        let mut breakdown = BTreeMap::new();
        for (signal, weight) in weights {
            let value = if suppressed.contains(&signal) {
                EXCEPTION_NEUTRAL_VALUE
            } else {
                latest[&signal].value
            };
            let contribution = weight * value * 100.0;
            composite += contribution;
            breakdown.insert(
                signal,
                SignalContribution {
                    weight,
                    value,
                    contribution,
                },
            );
        }

        let composite_score = composite.clamp(0.0, 100.0);
        FocusReading {
            timestamp,
            composite_score,
            state: FocusState::from_score(composite_score),
            signal_breakdown: breakdown,
            active_exceptions: exceptions.clone(),
        }
    }
}

/// Classifies with the default weights.
pub fn classify(samples: &[SignalSample], exceptions: &BTreeSet<ExceptionTag>) -> FocusReading {
    FocusClassifier::default().classify(samples, exceptions)
}
