//! Keyboard and mouse activity.
//!
//! An OS input hook (outside this crate) calls [`InputActivity::record_keyboard`]
//! and [`InputActivity::record_mouse`]; the samplers turn idle time into a
//! linearly decaying score.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::signal::{Sampler, SignalName, SignalSample};

const KEYBOARD_DECAY: Duration = Duration::from_secs(10);
const MOUSE_DECAY: Duration = Duration::from_secs(15);

#[derive(Debug, Default)]
struct InputState {
    attached: bool,
    last_keyboard: Option<DateTime<Utc>>,
    last_mouse: Option<DateTime<Utc>>,
}

/// Shared input clock. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct InputActivity {
    inner: Arc<Mutex<InputState>>,
}

impl InputActivity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks that an input source is feeding events. Until then both input
    /// samplers report unavailable.
    pub fn attach(&self) {
        self.with_state(|state| state.attached = true);
    }

    pub fn detach(&self) {
        self.with_state(|state| state.attached = false);
    }

    pub fn record_keyboard(&self, at: DateTime<Utc>) {
        self.with_state(|state| state.last_keyboard = Some(at));
    }

    pub fn record_mouse(&self, at: DateTime<Utc>) {
        self.with_state(|state| state.last_mouse = Some(at));
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut InputState) -> T) -> T {
        let mut guard = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }
}

fn decay_score(last: Option<DateTime<Utc>>, now: DateTime<Utc>, window: Duration) -> f64 {
    let Some(last) = last else {
        return 0.0;
    };
    let idle_secs = (now - last).num_milliseconds().max(0) as f64 / 1000.0;
    (1.0 - idle_secs / window.as_secs_f64()).max(0.0)
}

pub struct KeyboardSampler {
    activity: InputActivity,
}

impl KeyboardSampler {
    pub fn new(activity: InputActivity) -> Self {
        Self { activity }
    }
}

impl Sampler for KeyboardSampler {
    fn signal(&self) -> SignalName {
        SignalName::KeyboardRhythm
    }

    fn sample(&mut self, now: DateTime<Utc>) -> SignalSample {
        let (attached, last) = self
            .activity
            .with_state(|state| (state.attached, state.last_keyboard));
        if !attached {
            return SignalSample::unavailable(self.signal(), now);
        }
        SignalSample::measured(self.signal(), decay_score(last, now, KEYBOARD_DECAY), now)
    }
}

pub struct MouseSampler {
    activity: InputActivity,
}

impl MouseSampler {
    pub fn new(activity: InputActivity) -> Self {
        Self { activity }
    }
}

impl Sampler for MouseSampler {
    fn signal(&self) -> SignalName {
        SignalName::MouseActivity
    }

    fn sample(&mut self, now: DateTime<Utc>) -> SignalSample {
        let (attached, last) = self
            .activity
            .with_state(|state| (state.attached, state.last_mouse));
        if !attached {
            return SignalSample::unavailable(self.signal(), now);
        }
        SignalSample::measured(self.signal(), decay_score(last, now, MOUSE_DECAY), now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    #[test]
    fn detached_input_is_unavailable() {
        let activity = InputActivity::new();
        let mut sampler = KeyboardSampler::new(activity);
        let sample = sampler.sample(Utc::now());
        assert!(!sample.available);
    }

    #[test]
    fn keyboard_score_decays_over_ten_seconds() {
        let activity = InputActivity::new();
        activity.attach();
        let now = Utc::now();
        activity.record_keyboard(now - ChronoDuration::seconds(5));

        let mut sampler = KeyboardSampler::new(activity.clone());
        let sample = sampler.sample(now);
        assert!(sample.available);
        assert!((sample.value - 0.5).abs() < 1e-9);

        activity.record_keyboard(now - ChronoDuration::seconds(30));
        assert_eq!(sampler.sample(now).value, 0.0);
    }

    #[test]
    fn mouse_without_events_reads_idle() {
        let activity = InputActivity::new();
        activity.attach();
        let mut sampler = MouseSampler::new(activity);
        let sample = sampler.sample(Utc::now());
        assert!(sample.available);
        assert_eq!(sample.value, 0.0);
    }
}
