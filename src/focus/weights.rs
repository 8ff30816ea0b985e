use std::collections::BTreeMap;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::sensing::SignalName;

/// Base weight per signal. Only the ratios matter: weights are renormalized
/// over whichever signals are available on a tick.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct SignalWeights {
    pub pose: f64,
    pub gaze: f64,
    pub window_stability: f64,
    pub ambient_audio: f64,
    pub mouse_activity: f64,
    pub keyboard_rhythm: f64,
    pub cpu_load: f64,
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            pose: 0.35,
            gaze: 0.20,
            window_stability: 0.15,
            ambient_audio: 0.15,
            mouse_activity: 0.10,
            keyboard_rhythm: 0.05,
            cpu_load: 0.05,
        }
    }
}

impl SignalWeights {
    pub fn base(&self, signal: SignalName) -> f64 {
        match signal {
            SignalName::Pose => self.pose,
            SignalName::Gaze => self.gaze,
            SignalName::WindowStability => self.window_stability,
            SignalName::AmbientAudio => self.ambient_audio,
            SignalName::MouseActivity => self.mouse_activity,
            SignalName::KeyboardRhythm => self.keyboard_rhythm,
            SignalName::CpuLoad => self.cpu_load,
        }
    }

    /// Weights for `available`, scaled to sum to 1. Empty when the available
    /// signals carry no weight at all.
    pub fn effective(&self, available: &[SignalName]) -> BTreeMap<SignalName, f64> {
        let total: f64 = available.iter().map(|signal| self.base(*signal)).sum();
        if total <= 0.0 {
            return BTreeMap::new();
        }

        available
            .iter()
            .filter(|signal| self.base(**signal) > 0.0)
            .map(|signal| (*signal, self.base(*signal) / total))
            .collect()
    }

    /// Rejects negative or non-finite weights.
    pub fn check(&self) -> Result<()> {
        for signal in SignalName::ALL {
            let weight = self.base(signal);
            if !(weight.is_finite() && weight >= 0.0) {
                bail!("weight for {signal} must be a non-negative number, got {weight}");
            }
        }
        Ok(())
    }

    /// Panics on weights [`check`](Self::check) rejects; those are
    /// configuration bugs once settings have been loaded.
    pub fn validate(&self) {
        if let Err(err) = self.check() {
            panic!("{err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redistributes_missing_camera_weight_proportionally() {
        let weights = SignalWeights::default();
        let effective = weights.effective(&[SignalName::Gaze, SignalName::MouseActivity]);
        assert!((effective[&SignalName::Gaze] - 0.20 / 0.30).abs() < 1e-12);
        assert!((effective[&SignalName::MouseActivity] - 0.10 / 0.30).abs() < 1e-12);
    }

    #[test]
    fn zero_weight_signals_are_left_out() {
        let weights = SignalWeights {
            cpu_load: 0.0,
            ..SignalWeights::default()
        };
        assert!(weights.effective(&[SignalName::CpuLoad]).is_empty());
        let effective = weights.effective(&[SignalName::CpuLoad, SignalName::Pose]);
        assert_eq!(effective.len(), 1);
        assert_eq!(effective[&SignalName::Pose], 1.0);
    }

    #[test]
    #[should_panic(expected = "non-negative")]
    fn negative_weights_fail_fast() {
        SignalWeights {
            gaze: -0.1,
            ..SignalWeights::default()
        }
        .validate();
    }

    #[test]
    fn check_reports_the_offending_signal() {
        let weights = SignalWeights {
            cpu_load: f64::NAN,
            ..SignalWeights::default()
        };
        let err = weights.check().unwrap_err();
        assert!(err.to_string().contains("cpu_load"));
        assert!(SignalWeights::default().check().is_ok());
    }
}
