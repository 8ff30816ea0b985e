use std::sync::{Arc, Mutex, TryLockError};
use std::time::Duration;

use chrono::Utc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::board::SampleBoard;
use super::signal::{Sampler, SignalSample};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

/// Drives one sampler on its own period until `cancel_token` fires.
///
/// Each probe runs on a blocking worker under `timeout`. A probe that times
/// out, or is still busy from the previous period, publishes an unavailable
/// sample instead of stalling the loop. A probe that panics is dropped,
/// which releases any device it holds, and its signal stays unavailable.
pub async fn sampler_loop(
    sampler: Box<dyn Sampler>,
    board: SampleBoard,
    period: Duration,
    timeout: Duration,
    cancel_token: CancellationToken,
) {
    let signal = sampler.signal();
    let sampler = Arc::new(Mutex::new(sampler));

    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let timestamp = Utc::now();
                let job = tokio::task::spawn_blocking({
                    let sampler = Arc::clone(&sampler);
                    move || match sampler.try_lock() {
                        Ok(mut guard) => Some(guard.sample(timestamp)),
                        Err(TryLockError::WouldBlock) => None,
                        Err(TryLockError::Poisoned(_)) => None,
                    }
                });

                match tokio::time::timeout(timeout, job).await {
                    Ok(Ok(Some(sample))) => board.publish(sample).await,
                    Ok(Ok(None)) => {
                        log_warn!("{signal} sampler still busy, reporting unavailable");
                        board.publish(SignalSample::unavailable(signal, timestamp)).await;
                    }
                    Ok(Err(join_err)) => {
                        log_error!("{signal} sampler crashed: {join_err}; disabling it");
                        board.publish(SignalSample::unavailable(signal, timestamp)).await;
                        break;
                    }
                    Err(_) => {
                        log_warn!("{signal} sample timed out (> {}ms)", timeout.as_millis());
                        board.publish(SignalSample::unavailable(signal, timestamp)).await;
                    }
                }
            }
            _ = cancel_token.cancelled() => {
                log_info!("{signal} sampler shutting down");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensing::capture::tests::CountingBackend;
    use crate::sensing::capture::{CaptureHandle, CaptureSampler};
    use crate::sensing::signal::SignalName;
    use chrono::DateTime;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct SlowSampler;

    impl Sampler for SlowSampler {
        fn signal(&self) -> SignalName {
            SignalName::AmbientAudio
        }

        fn sample(&mut self, now: DateTime<Utc>) -> SignalSample {
            std::thread::sleep(Duration::from_millis(300));
            SignalSample::measured(self.signal(), 1.0, now)
        }
    }

    struct PanickingSampler {
        inner: CaptureSampler,
    }

    impl Sampler for PanickingSampler {
        fn signal(&self) -> SignalName {
            self.inner.signal()
        }

        fn sample(&mut self, now: DateTime<Utc>) -> SignalSample {
            let _ = self.inner.sample(now);
            panic!("camera driver exploded");
        }
    }

    #[tokio::test]
    async fn slow_sampler_reports_unavailable() {
        let board = SampleBoard::new();
        let token = CancellationToken::new();
        let handle = tokio::spawn(sampler_loop(
            Box::new(SlowSampler),
            board.clone(),
            Duration::from_secs(60),
            Duration::from_millis(20),
            token.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(100)).await;
        token.cancel();
        handle.await.unwrap();

        let samples = board.snapshot(Utc::now(), Duration::from_secs(60)).await;
        assert_eq!(samples.len(), 1);
        assert!(!samples[0].available);
    }

    #[tokio::test]
    async fn panicking_sampler_releases_its_device() {
        let acquired = Arc::new(AtomicUsize::new(0));
        let released = Arc::new(AtomicUsize::new(0));
        let backend = CountingBackend {
            acquired: acquired.clone(),
            released: released.clone(),
            fail_acquire: false,
            value: 0.7,
        };
        let handle = CaptureHandle::new(Box::new(backend), Duration::from_secs(1));
        let sampler = PanickingSampler {
            inner: CaptureSampler::new(SignalName::Pose, handle),
        };

        let board = SampleBoard::new();
        sampler_loop(
            Box::new(sampler),
            board.clone(),
            Duration::from_millis(10),
            Duration::from_secs(1),
            CancellationToken::new(),
        )
        .await;

        assert_eq!(acquired.load(Ordering::SeqCst), 1);
        assert_eq!(released.load(Ordering::SeqCst), 1);
        let samples = board.snapshot(Utc::now(), Duration::from_secs(60)).await;
        assert!(!samples[0].available);
    }
}
