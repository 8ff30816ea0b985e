use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::signal::{SignalName, SignalSample};

/// Latest sample per signal, written by the sampler loops and read once per
/// classifier tick.
#[derive(Clone, Default)]
pub struct SampleBoard {
    inner: Arc<Mutex<HashMap<SignalName, SignalSample>>>,
}

impl SampleBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `sample` unless a newer one for the same signal is already
    /// on the board.
    pub async fn publish(&self, sample: SignalSample) {
        let mut guard = self.inner.lock().await;
        match guard.get(&sample.signal_name) {
            Some(existing) if existing.timestamp > sample.timestamp => {}
            _ => {
                guard.insert(sample.signal_name, sample);
            }
        }
    }

    /// Current view of every signal. Samples older than `max_age` are
    /// reported unavailable; signals never published are left out.
    pub async fn snapshot(&self, now: DateTime<Utc>, max_age: Duration) -> Vec<SignalSample> {
        let max_age =
            chrono::Duration::milliseconds(i64::try_from(max_age.as_millis()).unwrap_or(i64::MAX));
        let guard = self.inner.lock().await;

        let mut samples: Vec<SignalSample> = guard
            .values()
            .map(|sample| {
                if now - sample.timestamp > max_age {
                    SignalSample::unavailable(sample.signal_name, sample.timestamp)
                } else {
                    sample.clone()
                }
            })
            .collect();
        samples.sort_by_key(|sample| sample.signal_name);
        samples
    }

    pub async fn clear(&self) {
        self.inner.lock().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    #[tokio::test]
    async fn keeps_newest_sample_per_signal() {
        let board = SampleBoard::new();
        let now = Utc::now();
        board
            .publish(SignalSample::measured(SignalName::Gaze, 0.9, now))
            .await;
        board
            .publish(SignalSample::measured(
                SignalName::Gaze,
                0.1,
                now - ChronoDuration::seconds(3),
            ))
            .await;

        let samples = board.snapshot(now, Duration::from_secs(30)).await;
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].value, 0.9);
    }

    #[tokio::test]
    async fn stale_samples_become_unavailable() {
        let board = SampleBoard::new();
        let now = Utc::now();
        board
            .publish(SignalSample::measured(
                SignalName::Pose,
                0.9,
                now - ChronoDuration::seconds(120),
            ))
            .await;
        board
            .publish(SignalSample::measured(SignalName::Gaze, 0.8, now))
            .await;

        let samples = board.snapshot(now, Duration::from_secs(45)).await;
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].signal_name, SignalName::Pose);
        assert!(!samples[0].available);
        assert!(samples[1].available);
    }
}
