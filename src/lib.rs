pub mod db;
pub mod focus;
pub mod monitor;
pub mod pace;
pub mod schedule;
pub mod sensing;
pub mod session;
pub mod settings;
pub mod utils;

use std::{path::Path, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use chrono::Utc;
use log::{info, warn};
use tokio::{sync::watch, task::JoinHandle, time};

use db::Database;
use focus::FocusClassifier;
use monitor::{FocusMonitor, MonitorConfig};
use pace::PaceLearner;
use sensing::{platform_samplers, ActiveWindow, InputActivity, SampleBoard, SensingController};
use session::SessionTracker;
use settings::{debug_mode, SettingsStore};

pub use db::{AppUsage, QuizResult};
pub use focus::{ExceptionTag, FocusReading, FocusState};
pub use monitor::FocusSnapshot;
pub use schedule::{BlockType, TimeBlock};
pub use session::{LearningSession, SessionError, SessionStatus};

const PACE_CHECK_INTERVAL: Duration = Duration::from_secs(60 * 60);

pub struct AppState {
    pub db: Database,
    pub settings: SettingsStore,
    pub board: SampleBoard,
    pub input: InputActivity,
    pub active_window: ActiveWindow,
    pub monitor: FocusMonitor,
    pub pace: Arc<PaceLearner>,
    sensing: SensingController,
}

impl AppState {
    /// Opens storage and settings under `data_dir` and wires the pipeline.
    /// Nothing is spawned yet.
    pub async fn bootstrap(data_dir: &Path, debug: bool) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create {}", data_dir.display()))?;

        let settings = SettingsStore::new(data_dir.join("settings.json"))?;
        let db = Database::new(data_dir.join("rfai.sqlite3"))?;
        Self::with_parts(db, settings, debug).await
    }

    pub async fn with_parts(db: Database, settings: SettingsStore, debug: bool) -> Result<Self> {
        // Sessions left ACTIVE by a previous process cannot resume their window.
        let recovered = db.abandon_stale_sessions(Utc::now()).await?;
        for session_id in &recovered {
            warn!("Recovered unfinished session {session_id}; marked as abandoned");
        }

        let current = settings.get();
        let tick_interval = current.tick_interval(debug);
        let board = SampleBoard::new();
        let active_window = ActiveWindow::new();
        let tracker = SessionTracker::new(db.clone(), tick_interval);
        let monitor = FocusMonitor::new(
            board.clone(),
            FocusClassifier::new(current.weights),
            current.schedule(),
            tracker,
            db.clone(),
            MonitorConfig::from_settings(&current, debug),
            active_window.clone(),
        );
        let pace = Arc::new(PaceLearner::new(
            db.clone(),
            current.pace,
            tick_interval,
        ));

        Ok(Self {
            db,
            settings,
            board,
            input: InputActivity::new(),
            active_window,
            monitor,
            pace,
            sensing: SensingController::new(),
        })
    }

    pub fn start_sensing(&mut self) -> Result<()> {
        let current = self.settings.get();
        let samplers = platform_samplers(&current, &self.input, &self.active_window);
        self.sensing.start_sensing(
            samplers,
            self.board.clone(),
            current.sample_interval(),
            current.capture_timeout(),
        )
    }

    /// Finishes open sessions, then stops the tick and the samplers.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.monitor.stop_ticker().await;
        let closed = self.monitor.tracker().close_all(Utc::now()).await;
        if !closed.is_empty() {
            info!("Closed {} open session(s) on shutdown", closed.len());
        }
        self.sensing.stop_sensing().await
    }
}

fn spawn_pace_checks(pace: Arc<PaceLearner>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = time::interval(PACE_CHECK_INTERVAL);
        loop {
            interval.tick().await;
            match pace.run_if_due(Utc::now(), None).await {
                Ok(Some(adjustment)) => info!(
                    "Weekly pace adjustment: {} in state {}",
                    adjustment.action, adjustment.state
                ),
                Ok(None) => {}
                Err(err) => warn!("Weekly pace adjustment failed: {err:#}"),
            }
        }
    })
}

/// Runs the monitor until Ctrl-C.
pub async fn run() -> Result<()> {
    let debug = debug_mode();
    utils::init_logging(debug);
    info!("rfai starting up (debug: {debug})");

    let data_dir = settings::data_dir()?;
    let mut state = AppState::bootstrap(&data_dir, debug).await?;
    info!("Using data directory {}", data_dir.display());

    state.start_sensing()?;
    let (_override_tx, override_rx) = watch::channel(None);
    state.monitor.spawn_ticker(override_rx).await;
    let pace_checks = spawn_pace_checks(state.pace.clone());

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutting down");

    pace_checks.abort();
    state.shutdown().await
}
