//! The tick pipeline: board snapshot, classification, storage, schedule
//! window events and session updates, plus the read side the outer layer
//! polls.

pub mod recommendations;
pub mod trend;

use std::{collections::BTreeSet, sync::Arc, time::Duration};

use anyhow::Result;
use chrono::{DateTime, Local, NaiveTime, Utc};
use serde::Serialize;
use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
    time,
};

use crate::db::{AppUsage, Database};
use crate::focus::{ExceptionTag, FocusClassifier, FocusReading};
use crate::schedule::{BlockType, BlockWindowWatcher, Schedule, TimeBlock, WindowEvent};
use crate::sensing::{ActiveApp, ActiveWindow, SampleBoard};
use crate::session::{LearningSession, SessionError, SessionTracker};
use crate::settings::Settings;
use crate::{log_error, log_info, log_warn};

pub use recommendations::{recommendations, Recommendation};
pub use trend::TrendWindow;

const ENABLE_LOGS: bool = true;

/// One tick's reading plus the short-term direction of the score.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FocusSnapshot {
    pub reading: FocusReading,
    pub trend: f64,
}

impl FocusSnapshot {
    pub fn recommendations(&self) -> Vec<Recommendation> {
        recommendations(self.reading.state, self.trend)
    }
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub tick_interval: Duration,
    pub max_sample_age: Duration,
    pub auto_start_sessions: bool,
}

impl MonitorConfig {
    pub fn from_settings(settings: &Settings, debug: bool) -> Self {
        Self {
            tick_interval: settings.tick_interval(debug),
            max_sample_age: settings.max_sample_age(),
            auto_start_sessions: settings.auto_start_sessions,
        }
    }
}

#[derive(Clone)]
pub struct FocusMonitor {
    board: SampleBoard,
    classifier: FocusClassifier,
    schedule: Arc<Schedule>,
    tracker: SessionTracker,
    db: Database,
    config: MonitorConfig,
    active_window: ActiveWindow,
    exceptions: Arc<Mutex<BTreeSet<ExceptionTag>>>,
    latest: Arc<Mutex<Option<FocusSnapshot>>>,
    history: Arc<Mutex<TrendWindow>>,
    watcher: Arc<Mutex<BlockWindowWatcher>>,
    ticker: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl FocusMonitor {
    pub fn new(
        board: SampleBoard,
        classifier: FocusClassifier,
        schedule: Schedule,
        tracker: SessionTracker,
        db: Database,
        config: MonitorConfig,
        active_window: ActiveWindow,
    ) -> Self {
        Self {
            board,
            classifier,
            schedule: Arc::new(schedule),
            tracker,
            db,
            config,
            active_window,
            exceptions: Arc::new(Mutex::new(BTreeSet::new())),
            latest: Arc::new(Mutex::new(None)),
            history: Arc::new(Mutex::new(TrendWindow::new())),
            watcher: Arc::new(Mutex::new(BlockWindowWatcher::new())),
            ticker: Arc::new(Mutex::new(None)),
        }
    }

    pub fn tracker(&self) -> &SessionTracker {
        &self.tracker
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Runs one tick using the local wall clock for the schedule.
    pub async fn tick(
        &self,
        now: DateTime<Utc>,
        override_block: Option<&str>,
    ) -> Result<FocusSnapshot> {
        let local_time = now.with_timezone(&Local).time();
        self.tick_at(now, local_time, override_block).await
    }

    /// Runs one tick with an explicit time of day for the schedule lookup.
    pub async fn tick_at(
        &self,
        now: DateTime<Utc>,
        local_time: NaiveTime,
        override_block: Option<&str>,
    ) -> Result<FocusSnapshot> {
        let samples = self.board.snapshot(now, self.config.max_sample_age).await;
        let exceptions = self.exceptions.lock().await.clone();
        let reading = self.classifier.classify_at(now, &samples, &exceptions);

        let trend = {
            let mut history = self.history.lock().await;
            history.push(reading.composite_score);
            history.trend()
        };
        let snapshot = FocusSnapshot {
            reading: reading.clone(),
            trend,
        };
        *self.latest.lock().await = Some(snapshot.clone());

        if let Err(err) = self.db.insert_focus_reading(&reading).await {
            log_error!("Failed to store focus reading: {err:#}");
        }
        if let Some(app) = self.fresh_app(now) {
            let tick_ms = self.config.tick_interval.as_millis() as u64;
            let usage = AppUsage::from_tick(&app, &reading, tick_ms);
            if let Err(err) = self.db.insert_app_usage(&usage).await {
                log_error!("Failed to store app usage for '{}': {err:#}", app.app_name);
            }
        }

        let current = self
            .schedule
            .current_block(local_time, override_block)
            .cloned();
        let events = self.watcher.lock().await.observe(current.as_ref());
        for event in events {
            self.handle_window_event(event, now).await;
        }

        self.tracker.apply_reading(&reading).await;
        Ok(snapshot)
    }

    async fn handle_window_event(&self, event: WindowEvent, now: DateTime<Utc>) {
        match event {
            WindowEvent::Closed(block) => match self.tracker.close_window(block.block_type, now).await {
                Ok(Some(session)) => log_info!(
                    "Window for '{}' closed; session {} ended as {}",
                    block.name,
                    session.session_id,
                    session.status.as_str()
                ),
                Ok(None) => {}
                Err(err) => log_error!("Failed to close window for '{}': {err}", block.name),
            },
            WindowEvent::Opened(block) => {
                log_info!("Window for '{}' opened", block.name);
                if !self.config.auto_start_sessions {
                    return;
                }
                match self.tracker.start_for_block(&block, now).await {
                    Ok(session) => log_info!("Auto-started session {}", session.session_id),
                    Err(SessionError::Conflict { .. }) => {}
                    Err(err) => log_warn!("Could not auto-start '{}': {err}", block.name),
                }
            }
        }
    }

    /// Starts the periodic tick. The current override is read from
    /// `override_rx` on every tick.
    pub async fn spawn_ticker(&self, override_rx: watch::Receiver<Option<String>>) {
        let mut ticker_guard = self.ticker.lock().await;
        if let Some(handle) = ticker_guard.take() {
            handle.abort();
        }

        let monitor = self.clone();
        let tick_interval = self.config.tick_interval;
        let handle = tokio::spawn(async move {
            let mut interval = time::interval(tick_interval);
            interval.set_missed_tick_behavior(time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let override_block = override_rx.borrow().clone();
                if let Err(err) = monitor.tick(Utc::now(), override_block.as_deref()).await {
                    log_error!("Focus tick failed: {err:#}");
                }
            }
        });

        *ticker_guard = Some(handle);
        log_info!("Focus ticker running every {}s", tick_interval.as_secs_f64());
    }

    pub async fn stop_ticker(&self) {
        if let Some(handle) = self.ticker.lock().await.take() {
            handle.abort();
            let _ = handle.await;
        }
    }

    fn fresh_app(&self, now: DateTime<Utc>) -> Option<ActiveApp> {
        let max_age = chrono::Duration::from_std(self.config.max_sample_age).ok()?;
        self.active_window.fresh(now, max_age)
    }

    /// The focused app and how long it has held focus, if the window
    /// sampler has seen one recently.
    pub fn current_app(&self) -> Option<ActiveApp> {
        self.fresh_app(Utc::now())
    }

    pub async fn current_focus(&self) -> Option<FocusReading> {
        self.latest
            .lock()
            .await
            .as_ref()
            .map(|snapshot| snapshot.reading.clone())
    }

    pub async fn current_snapshot(&self) -> Option<FocusSnapshot> {
        self.latest.lock().await.clone()
    }

    pub async fn session_status(&self, block_type: BlockType) -> Option<LearningSession> {
        self.tracker.session_status(block_type).await
    }

    pub fn current_block(
        &self,
        now: DateTime<Utc>,
        override_block: Option<&str>,
    ) -> Option<TimeBlock> {
        let local_time = now.with_timezone(&Local).time();
        self.schedule
            .current_block(local_time, override_block)
            .cloned()
    }

    pub async fn start_session(
        &self,
        block_type: BlockType,
        block_name: &str,
        goal_ms: u64,
        attention_threshold: f64,
    ) -> Result<LearningSession, SessionError> {
        self.tracker
            .start_session(block_type, block_name, goal_ms, attention_threshold, Utc::now())
            .await
    }

    pub async fn end_session(&self, block_type: BlockType) -> Result<LearningSession, SessionError> {
        self.tracker.end_session(block_type, Utc::now()).await
    }

    /// Returns false if the tag was already set.
    pub async fn set_exception(&self, tag: ExceptionTag) -> bool {
        self.exceptions.lock().await.insert(tag)
    }

    /// Returns false if the tag was not set.
    pub async fn clear_exception(&self, tag: ExceptionTag) -> bool {
        self.exceptions.lock().await.remove(&tag)
    }

    pub async fn active_exceptions(&self) -> BTreeSet<ExceptionTag> {
        self.exceptions.lock().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::focus::FocusState;
    use crate::schedule::default_blocks;
    use crate::sensing::window::tests::scripted;
    use crate::sensing::{Sampler, SignalName, SignalSample};
    use crate::session::SessionStatus;
    use chrono::Duration as ChronoDuration;
    use pretty_assertions::assert_eq;

    fn config(auto_start: bool) -> MonitorConfig {
        MonitorConfig {
            tick_interval: Duration::from_secs(15),
            max_sample_age: Duration::from_secs(45),
            auto_start_sessions: auto_start,
        }
    }

    fn monitor(auto_start: bool) -> (FocusMonitor, SampleBoard, Database) {
        watching(auto_start, ActiveWindow::new())
    }

    fn watching(
        auto_start: bool,
        active_window: ActiveWindow,
    ) -> (FocusMonitor, SampleBoard, Database) {
        let db = Database::in_memory().unwrap();
        let board = SampleBoard::new();
        let tracker = SessionTracker::new(db.clone(), Duration::from_secs(15));
        let monitor = FocusMonitor::new(
            board.clone(),
            FocusClassifier::default(),
            Schedule::new(default_blocks()),
            tracker,
            db.clone(),
            config(auto_start),
            active_window,
        );
        (monitor, board, db)
    }

    fn hm(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
    }

    #[tokio::test]
    async fn tick_classifies_publishes_and_stores() {
        let (monitor, board, db) = monitor(false);
        let now = Utc::now();
        assert!(monitor.current_focus().await.is_none());

        board
            .publish(SignalSample::measured(SignalName::WindowStability, 0.9, now))
            .await;
        board
            .publish(SignalSample::measured(SignalName::KeyboardRhythm, 0.9, now))
            .await;

        let snapshot = monitor.tick_at(now, hm(6, 0), None).await.unwrap();
        assert!((snapshot.reading.composite_score - 90.0).abs() < 1e-9);
        assert_eq!(snapshot.reading.state, FocusState::Focused);
        assert_eq!(monitor.current_focus().await, Some(snapshot.reading.clone()));

        let stored = db
            .focus_readings_between(now - ChronoDuration::seconds(1), now + ChronoDuration::seconds(1))
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
    }

    #[tokio::test]
    async fn focused_app_is_published_and_logged_per_tick() {
        let active = ActiveWindow::new();
        let (monitor, board, db) = watching(false, active.clone());
        let mut sampler = scripted(vec!["editor", "editor"], active.clone());
        let start = Utc::now() - ChronoDuration::seconds(15);
        assert!(monitor.current_app().is_none());

        board.publish(sampler.sample(start)).await;
        monitor.tick_at(start, hm(6, 0), None).await.unwrap();
        let now = start + ChronoDuration::seconds(15);
        board.publish(sampler.sample(now)).await;
        let snapshot = monitor.tick_at(now, hm(6, 0), None).await.unwrap();

        let app = monitor.current_app().unwrap();
        assert_eq!(app.app_name, "editor");
        assert_eq!(app.since, start);
        assert_eq!(app.held_for(), ChronoDuration::seconds(15));

        let usage = db
            .app_usage_between(start, now + ChronoDuration::seconds(1))
            .await
            .unwrap();
        assert_eq!(usage.len(), 2);
        assert!(usage.iter().all(|row| row.app_name == "editor"));
        assert!(usage.iter().all(|row| row.duration_ms == 15_000));
        assert_eq!(usage[0].held_ms, 0);
        assert_eq!(usage[1].held_ms, 15_000);
        assert_eq!(usage[1].focus_state, snapshot.reading.state);
        assert_eq!(usage[1].window_title, "editor - main");
    }

    #[tokio::test]
    async fn no_usage_is_logged_without_a_fresh_window() {
        let active = ActiveWindow::new();
        let (monitor, board, db) = watching(false, active.clone());
        let mut sampler = scripted(vec!["editor"], active.clone());
        let then = Utc::now() - ChronoDuration::seconds(120);
        board.publish(sampler.sample(then)).await;

        let now = Utc::now();
        monitor.tick_at(now, hm(6, 0), None).await.unwrap();
        assert!(monitor.current_app().is_none());

        // Focus lost: the slot clears.
        board.publish(sampler.sample(now)).await;
        assert!(active.current().is_none());
        monitor.tick_at(now, hm(6, 0), None).await.unwrap();

        let usage = db
            .app_usage_between(then, now + ChronoDuration::seconds(1))
            .await
            .unwrap();
        assert!(usage.is_empty());
    }

    #[tokio::test]
    async fn stale_samples_fall_back_to_neutral() {
        let (monitor, board, _db) = monitor(false);
        let now = Utc::now();
        board
            .publish(SignalSample::measured(
                SignalName::Gaze,
                0.1,
                now - ChronoDuration::seconds(120),
            ))
            .await;

        let snapshot = monitor.tick_at(now, hm(6, 0), None).await.unwrap();
        assert_eq!(snapshot.reading.composite_score, 50.0);
        assert_eq!(snapshot.reading.state, FocusState::Active);
    }

    #[tokio::test]
    async fn exceptions_flow_into_readings() {
        let (monitor, board, _db) = monitor(false);
        let now = Utc::now();
        board
            .publish(SignalSample::measured(SignalName::Gaze, 0.1, now))
            .await;

        assert!(monitor.set_exception(ExceptionTag::TakingNotes).await);
        assert!(!monitor.set_exception(ExceptionTag::TakingNotes).await);
        let snapshot = monitor.tick_at(now, hm(6, 0), None).await.unwrap();
        assert!((snapshot.reading.composite_score - 70.0).abs() < 1e-9);
        assert!(snapshot
            .reading
            .active_exceptions
            .contains(&ExceptionTag::TakingNotes));

        assert!(monitor.clear_exception(ExceptionTag::TakingNotes).await);
        assert!(monitor.active_exceptions().await.is_empty());
    }

    #[tokio::test]
    async fn window_close_abandons_and_open_can_auto_start() {
        let (monitor, _board, _db) = monitor(true);
        let now = Utc::now();

        monitor.tick_at(now, hm(9, 0), None).await.unwrap();
        let started = monitor.session_status(BlockType::Science).await.unwrap();
        assert_eq!(started.status, SessionStatus::Active);
        assert_eq!(started.reading_count, 1);

        monitor
            .tick_at(now + ChronoDuration::seconds(15), hm(12, 0), None)
            .await
            .unwrap();
        let closed = monitor.session_status(BlockType::Science).await.unwrap();
        assert_eq!(closed.session_id, started.session_id);
        assert_eq!(closed.status, SessionStatus::Abandoned);
    }

    #[tokio::test]
    async fn override_opens_a_block_outside_its_hours() {
        let (monitor, _board, _db) = monitor(true);
        let now = Utc::now();

        monitor
            .tick_at(now, hm(6, 0), Some("Artistic Movies"))
            .await
            .unwrap();
        assert!(monitor.session_status(BlockType::Artistic).await.is_some());
        assert!(monitor.session_status(BlockType::Science).await.is_none());

        monitor
            .tick_at(now + ChronoDuration::seconds(15), hm(6, 0), None)
            .await
            .unwrap();
        assert_eq!(
            monitor
                .session_status(BlockType::Artistic)
                .await
                .unwrap()
                .status,
            SessionStatus::Abandoned
        );
    }

    #[tokio::test]
    async fn manual_sessions_are_left_alone_without_auto_start() {
        let (monitor, _board, _db) = monitor(false);
        let now = Utc::now();

        monitor.tick_at(now, hm(9, 0), None).await.unwrap();
        assert!(monitor.session_status(BlockType::Science).await.is_none());

        monitor
            .start_session(BlockType::Science, "Science Learning", 60_000, 0.4)
            .await
            .unwrap();
        monitor
            .tick_at(Utc::now() + ChronoDuration::seconds(1), hm(9, 1), None)
            .await
            .unwrap();
        let session = monitor.session_status(BlockType::Science).await.unwrap();
        assert_eq!(session.reading_count, 1);

        let ended = monitor.end_session(BlockType::Science).await.unwrap();
        assert_eq!(ended.status, SessionStatus::Abandoned);
    }

    #[tokio::test]
    async fn ticker_runs_until_stopped() {
        let (monitor, _board, _db) = monitor(false);
        let fast = FocusMonitor {
            config: MonitorConfig {
                tick_interval: Duration::from_millis(10),
                ..config(false)
            },
            ..monitor
        };
        let (_tx, rx) = watch::channel(None);

        fast.spawn_ticker(rx).await;
        time::sleep(Duration::from_millis(50)).await;
        fast.stop_ticker().await;

        assert!(fast.current_snapshot().await.is_some());
    }
}
