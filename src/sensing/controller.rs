use std::time::Duration;

use anyhow::{bail, Context, Result};
use log::info;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::board::SampleBoard;
use super::capture::{platform_backend, CaptureHandle, CaptureKind, CaptureSampler};
use super::input::{InputActivity, KeyboardSampler, MouseSampler};
use super::loop_worker::sampler_loop;
use super::signal::{Sampler, SignalName};
use super::system::CpuSampler;
use super::window::{platform_probe, ActiveWindow, WindowSampler};
use crate::settings::Settings;

/// Builds one sampler per signal for this platform. The window sampler
/// publishes the focused app into `active_window`.
pub fn platform_samplers(
    settings: &Settings,
    input: &InputActivity,
    active_window: &ActiveWindow,
) -> Vec<Box<dyn Sampler>> {
    let timeout = Duration::from_millis(settings.capture_timeout_ms);
    let camera = CaptureHandle::new(
        platform_backend(CaptureKind::Camera, settings.enable_camera),
        timeout,
    );
    let microphone = CaptureHandle::new(
        platform_backend(CaptureKind::Microphone, settings.enable_microphone),
        timeout,
    );

    vec![
        Box::new(CaptureSampler::new(SignalName::Pose, camera.clone())),
        Box::new(CaptureSampler::new(SignalName::Gaze, camera)),
        Box::new(CaptureSampler::new(SignalName::AmbientAudio, microphone)),
        Box::new(WindowSampler::new(platform_probe(), active_window.clone())),
        Box::new(MouseSampler::new(input.clone())),
        Box::new(KeyboardSampler::new(input.clone())),
        Box::new(CpuSampler::new()),
    ]
}

pub struct SensingController {
    handles: Vec<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl SensingController {
    pub fn new() -> Self {
        Self {
            handles: Vec::new(),
            cancel_token: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.cancel_token.is_some()
    }

    /// Spawns one loop per sampler, all publishing into `board`.
    pub fn start_sensing(
        &mut self,
        samplers: Vec<Box<dyn Sampler>>,
        board: SampleBoard,
        period: Duration,
        timeout: Duration,
    ) -> Result<()> {
        if self.cancel_token.is_some() {
            bail!("sensing already active");
        }

        let cancel_token = CancellationToken::new();
        info!("Starting {} samplers every {}s", samplers.len(), period.as_secs_f64());

        for sampler in samplers {
            let handle = tokio::spawn(sampler_loop(
                sampler,
                board.clone(),
                period,
                timeout,
                cancel_token.child_token(),
            ));
            self.handles.push(handle);
        }

        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    pub async fn stop_sensing(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        for handle in self.handles.drain(..) {
            handle.await.context("sampler loop task failed to join")?;
        }
        Ok(())
    }
}

impl Default for SensingController {
    fn default() -> Self {
        Self::new()
    }
}
