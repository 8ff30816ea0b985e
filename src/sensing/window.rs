//! Active-window tracking and the window stability signal.

use std::collections::VecDeque;
use std::process::Command;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::signal::{Sampler, SignalName, SignalSample};

const STABILITY_HISTORY: usize = 12;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WindowIdentity {
    pub app_name: String,
    pub title: String,
}

/// Platform capability for reading the focused window.
pub trait WindowProbe: Send {
    /// `Ok(None)` when no window currently has focus.
    fn active_window(&mut self) -> Result<Option<WindowIdentity>>;
}

pub struct UnsupportedWindowProbe;

impl WindowProbe for UnsupportedWindowProbe {
    fn active_window(&mut self) -> Result<Option<WindowIdentity>> {
        bail!("active window detection is not supported on this platform")
    }
}

/// X11 probe backed by the `xprop` tool.
pub struct XpropWindowProbe;

impl XpropWindowProbe {
    fn run(args: &[&str]) -> Result<String> {
        let output = Command::new("xprop")
            .args(args)
            .output()
            .context("failed to spawn xprop")?;
        if !output.status.success() {
            bail!("xprop exited with {}", output.status);
        }
        String::from_utf8(output.stdout).context("xprop output is not UTF-8")
    }
}

impl WindowProbe for XpropWindowProbe {
    fn active_window(&mut self) -> Result<Option<WindowIdentity>> {
        let root = Self::run(&["-root", "_NET_ACTIVE_WINDOW"])?;
        let Some(window_id) = root.split_whitespace().last() else {
            return Ok(None);
        };
        if window_id == "0x0" {
            return Ok(None);
        }

        let props = Self::run(&["-id", window_id, "WM_CLASS", "_NET_WM_NAME"])?;
        let mut app_name = None;
        let mut title = String::new();
        for line in props.lines() {
            if line.starts_with("WM_CLASS") {
                app_name = last_quoted(line);
            } else if line.starts_with("_NET_WM_NAME") {
                title = last_quoted(line).unwrap_or_default();
            }
        }

        let app_name = app_name.ok_or_else(|| anyhow!("window {window_id} has no WM_CLASS"))?;
        Ok(Some(WindowIdentity { app_name, title }))
    }
}

fn last_quoted(line: &str) -> Option<String> {
    let parts: Vec<&str> = line.split('"').collect();
    if parts.len() < 3 {
        return None;
    }
    Some(parts[parts.len() - 2].to_string())
}

/// Picks the probe for the running platform. Called once at startup.
pub fn platform_probe() -> Box<dyn WindowProbe> {
    if cfg!(target_os = "linux") {
        Box::new(XpropWindowProbe)
    } else {
        Box::new(UnsupportedWindowProbe)
    }
}

/// The app holding focus as of the last window poll.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActiveApp {
    pub app_name: String,
    pub title: String,
    /// When this app last took focus.
    pub since: DateTime<Utc>,
    pub observed_at: DateTime<Utc>,
}

impl ActiveApp {
    /// Continuous focus time up to the last poll.
    pub fn held_for(&self) -> Duration {
        self.observed_at - self.since
    }
}

/// Slot the window sampler publishes into and the monitor reads from.
/// Cleared whenever no window has focus or the probe fails.
#[derive(Debug, Clone, Default)]
pub struct ActiveWindow {
    inner: Arc<Mutex<Option<ActiveApp>>>,
}

impl ActiveWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<ActiveApp> {
        self.lock().clone()
    }

    /// The current app, unless its last poll is older than `max_age`.
    pub fn fresh(&self, now: DateTime<Utc>, max_age: Duration) -> Option<ActiveApp> {
        self.current().filter(|app| now - app.observed_at <= max_age)
    }

    fn set(&self, app: Option<ActiveApp>) {
        *self.lock() = app;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<ActiveApp>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Scores how steadily one app has held focus: the share of the recent
/// polls that saw the current app.
pub struct WindowSampler {
    probe: Box<dyn WindowProbe>,
    history: VecDeque<String>,
    current: Option<ActiveApp>,
    slot: ActiveWindow,
}

impl WindowSampler {
    pub fn new(probe: Box<dyn WindowProbe>, slot: ActiveWindow) -> Self {
        Self {
            probe,
            history: VecDeque::with_capacity(STABILITY_HISTORY),
            current: None,
            slot,
        }
    }

    fn observe(&mut self, window: WindowIdentity, now: DateTime<Utc>) -> f64 {
        let since = match &self.current {
            Some(current) if current.app_name == window.app_name => current.since,
            _ => now,
        };
        let app_name = window.app_name.clone();
        let active = ActiveApp {
            app_name: window.app_name,
            title: window.title,
            since,
            observed_at: now,
        };
        self.slot.set(Some(active.clone()));
        self.current = Some(active);

        self.history.push_back(app_name.clone());
        if self.history.len() > STABILITY_HISTORY {
            self.history.pop_front();
        }

        let same_app = self.history.iter().filter(|app| **app == app_name).count();
        same_app as f64 / self.history.len() as f64
    }

    fn lose_focus(&mut self) {
        self.current = None;
        self.slot.set(None);
    }
}

impl Sampler for WindowSampler {
    fn signal(&self) -> SignalName {
        SignalName::WindowStability
    }

    fn sample(&mut self, now: DateTime<Utc>) -> SignalSample {
        match self.probe.active_window() {
            Ok(Some(window)) => {
                let stability = self.observe(window, now);
                SignalSample::measured(self.signal(), stability, now)
            }
            Ok(None) => {
                self.lose_focus();
                SignalSample::unavailable(self.signal(), now)
            }
            Err(err) => {
                log::debug!("window probe failed: {err:#}");
                self.lose_focus();
                SignalSample::unavailable(self.signal(), now)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Replays a fixed list of focused apps, then reports no focus.
    pub(crate) struct ScriptedProbe {
        pub(crate) apps: Vec<&'static str>,
    }

    impl WindowProbe for ScriptedProbe {
        fn active_window(&mut self) -> Result<Option<WindowIdentity>> {
            if self.apps.is_empty() {
                return Ok(None);
            }
            let app = self.apps.remove(0);
            Ok(Some(WindowIdentity {
                app_name: app.to_string(),
                title: format!("{app} - main"),
            }))
        }
    }

    pub(crate) fn scripted(apps: Vec<&'static str>, slot: ActiveWindow) -> WindowSampler {
        WindowSampler::new(Box::new(ScriptedProbe { apps }), slot)
    }

    #[test]
    fn stability_is_share_of_recent_polls() {
        let mut sampler = scripted(
            vec!["editor", "editor", "browser", "editor"],
            ActiveWindow::new(),
        );
        let now = Utc::now();

        assert_eq!(sampler.sample(now).value, 1.0);
        assert_eq!(sampler.sample(now).value, 1.0);
        assert!((sampler.sample(now).value - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(sampler.sample(now).value, 0.75);

        let unfocused = sampler.sample(now);
        assert!(!unfocused.available);
    }

    #[test]
    fn publishes_the_active_app_and_how_long_it_held_focus() {
        let slot = ActiveWindow::new();
        let mut sampler = scripted(vec!["editor", "editor", "browser"], slot.clone());
        let start = Utc::now();

        sampler.sample(start);
        sampler.sample(start + Duration::seconds(30));
        let app = slot.current().unwrap();
        assert_eq!(app.app_name, "editor");
        assert_eq!(app.title, "editor - main");
        assert_eq!(app.held_for(), Duration::seconds(30));

        sampler.sample(start + Duration::seconds(40));
        let app = slot.current().unwrap();
        assert_eq!(app.app_name, "browser");
        assert_eq!(app.since, start + Duration::seconds(40));
        assert!(slot.fresh(start + Duration::seconds(45), Duration::seconds(45)).is_some());
        assert!(slot.fresh(start + Duration::seconds(90), Duration::seconds(45)).is_none());

        sampler.sample(start + Duration::seconds(50));
        assert!(slot.current().is_none());
    }

    #[test]
    fn unsupported_probe_reports_unavailable() {
        let slot = ActiveWindow::new();
        let mut sampler = WindowSampler::new(Box::new(UnsupportedWindowProbe), slot.clone());
        assert!(!sampler.sample(Utc::now()).available);
        assert!(slot.current().is_none());
    }

    #[test]
    fn parses_quoted_xprop_values() {
        assert_eq!(
            last_quoted(r#"WM_CLASS(STRING) = "code", "Code""#).as_deref(),
            Some("Code")
        );
        assert_eq!(last_quoted("WM_CLASS:  not found."), None);
    }
}
