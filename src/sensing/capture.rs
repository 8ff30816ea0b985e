//! Camera and microphone capabilities.
//!
//! Devices are opened lazily on the first sample that needs them, with a
//! bounded acquisition timeout, and released when the last sampler holding
//! the [`CaptureHandle`] is dropped. That covers orderly shutdown, loop
//! cancellation and a sampler panicking on its worker.
//!
//! No platform backend ships in this build: every device resolves to
//! [`UnsupportedBackend`], so pose, gaze and ambient audio always report
//! unavailable and the classifier renormalizes over the other signals.
//! `enable_camera` and `enable_microphone` only gate which devices a real
//! backend would be allowed to open.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};

use super::signal::{Sampler, SignalName, SignalSample};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

const ACQUIRE_RETRY: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureKind {
    Camera,
    Microphone,
}

/// A platform capture device. One implementation per platform; the choice
/// is made once at startup.
pub trait CaptureBackend: Send {
    fn kind(&self) -> CaptureKind;

    /// Opens the device, giving up after `timeout`.
    fn acquire(&mut self, timeout: Duration) -> Result<()>;

    /// Normalized `[0, 1]` reading for `signal` from the open device.
    fn measure(&mut self, signal: SignalName) -> Result<f64>;

    fn release(&mut self);
}

/// Backend for platforms (or builds) without capture support.
pub struct UnsupportedBackend {
    kind: CaptureKind,
}

impl UnsupportedBackend {
    pub fn new(kind: CaptureKind) -> Self {
        Self { kind }
    }
}

impl CaptureBackend for UnsupportedBackend {
    fn kind(&self) -> CaptureKind {
        self.kind
    }

    fn acquire(&mut self, _timeout: Duration) -> Result<()> {
        bail!("{:?} capture is not supported on this platform", self.kind)
    }

    fn measure(&mut self, _signal: SignalName) -> Result<f64> {
        bail!("{:?} capture is not supported on this platform", self.kind)
    }

    fn release(&mut self) {}
}

/// Selects the capture backend for this platform. Always the unsupported
/// backend for now; `enabled` only changes what gets logged.
pub fn platform_backend(kind: CaptureKind, enabled: bool) -> Box<dyn CaptureBackend> {
    if enabled {
        log_warn!("{kind:?} capture is enabled but not supported on this platform; reporting unavailable");
    } else {
        log_info!("{kind:?} capture disabled by settings");
    }
    Box::new(UnsupportedBackend::new(kind))
}

enum DeviceState {
    Closed,
    Open,
    Failed(Instant),
}

struct HandleInner {
    backend: Box<dyn CaptureBackend>,
    state: DeviceState,
}

impl Drop for HandleInner {
    fn drop(&mut self) {
        if matches!(self.state, DeviceState::Open) {
            self.backend.release();
            log_info!("{:?} released", self.backend.kind());
        }
    }
}

/// Shared ownership of one capture device, e.g. a camera feeding both the
/// pose and the gaze signal.
#[derive(Clone)]
pub struct CaptureHandle {
    inner: Arc<Mutex<HandleInner>>,
    timeout: Duration,
}

impl CaptureHandle {
    pub fn new(backend: Box<dyn CaptureBackend>, timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HandleInner {
                backend,
                state: DeviceState::Closed,
            })),
            timeout,
        }
    }

    /// Reads `signal`, opening the device first if needed. `None` means the
    /// capability is unavailable right now.
    pub fn measure(&self, signal: SignalName) -> Option<f64> {
        let mut inner = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        match inner.state {
            DeviceState::Open => {}
            DeviceState::Failed(at) if at.elapsed() < ACQUIRE_RETRY => return None,
            DeviceState::Closed | DeviceState::Failed(_) => {
                let timeout = self.timeout;
                match inner.backend.acquire(timeout) {
                    Ok(()) => {
                        log_info!("{:?} acquired", inner.backend.kind());
                        inner.state = DeviceState::Open;
                    }
                    Err(err) => {
                        log_warn!("{:?} unavailable: {err:#}", inner.backend.kind());
                        inner.state = DeviceState::Failed(Instant::now());
                        return None;
                    }
                }
            }
        }

        match inner.backend.measure(signal) {
            Ok(value) => Some(value),
            Err(err) => {
                log::debug!("{signal} capture read failed: {err:#}");
                None
            }
        }
    }
}

/// Sampler for a capture-backed signal (pose, gaze, ambient audio).
pub struct CaptureSampler {
    signal: SignalName,
    handle: CaptureHandle,
}

impl CaptureSampler {
    pub fn new(signal: SignalName, handle: CaptureHandle) -> Self {
        Self { signal, handle }
    }
}

impl Sampler for CaptureSampler {
    fn signal(&self) -> SignalName {
        self.signal
    }

    fn sample(&mut self, now: DateTime<Utc>) -> SignalSample {
        match self.handle.measure(self.signal) {
            Some(value) if value.is_finite() => SignalSample::measured(self.signal, value, now),
            _ => SignalSample::unavailable(self.signal, now),
        }
    }
}
