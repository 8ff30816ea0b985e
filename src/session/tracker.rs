use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::errors::SessionError;
use super::state::{LearningSession, SessionStatus, TickOutcome};
use crate::db::Database;
use crate::focus::FocusReading;
use crate::schedule::{BlockType, TimeBlock};
use crate::{log_error, log_info, log_warn};

const ENABLE_LOGS: bool = true;

type SessionSlot = Arc<Mutex<LearningSession>>;

/// Owns the latest session per block type.
///
/// Lock order is always map, then session. Each session has its own mutex,
/// so ticks for one block never wait on another block. Every mutation is
/// applied to a copy, persisted, and only then published, so a failed write
/// or a rejected reading leaves the visible session untouched.
#[derive(Clone)]
pub struct SessionTracker {
    sessions: Arc<Mutex<HashMap<BlockType, SessionSlot>>>,
    db: Database,
    tick_ms: u64,
}

impl SessionTracker {
    pub fn new(db: Database, tick_interval: Duration) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            db,
            tick_ms: u64::try_from(tick_interval.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub fn tick_ms(&self) -> u64 {
        self.tick_ms
    }

    pub async fn start_session(
        &self,
        block_type: BlockType,
        block_name: &str,
        goal_ms: u64,
        attention_threshold: f64,
        now: DateTime<Utc>,
    ) -> Result<LearningSession, SessionError> {
        let mut sessions = self.sessions.lock().await;

        if let Some(existing) = sessions.get(&block_type) {
            if existing.lock().await.status == SessionStatus::Active {
                return Err(SessionError::Conflict { block_type });
            }
        }

        let session = LearningSession::begin(
            Uuid::new_v4().to_string(),
            block_type,
            block_name.to_string(),
            goal_ms,
            attention_threshold,
            now,
        );
        self.db.upsert_learning_session(&session).await?;
        sessions.insert(block_type, Arc::new(Mutex::new(session.clone())));

        log_info!(
            "Started {} session {} (goal {} ms, threshold {:.2})",
            block_type,
            session.session_id,
            goal_ms,
            attention_threshold
        );
        Ok(session)
    }

    pub async fn start_for_block(
        &self,
        block: &TimeBlock,
        now: DateTime<Utc>,
    ) -> Result<LearningSession, SessionError> {
        self.start_session(
            block.block_type,
            &block.name,
            block.goal_ms(),
            block.attention_threshold,
            now,
        )
        .await
    }

    /// Ends the active session for `block_type`: completed if its goal
    /// already holds, abandoned otherwise. Ending a finished session fails
    /// with `InvalidState` and changes nothing, so retries are safe.
    pub async fn end_session(
        &self,
        block_type: BlockType,
        at: DateTime<Utc>,
    ) -> Result<LearningSession, SessionError> {
        let slot = self.slot(block_type).await?;
        let mut current = slot.lock().await;

        let mut next = current.clone();
        let status = next.finish(at)?;
        self.db.upsert_learning_session(&next).await?;
        *current = next.clone();

        log_info!(
            "Ended {} session {} as {} (elapsed {} ms, attention {:.3})",
            block_type,
            next.session_id,
            status.as_str(),
            next.elapsed_ms,
            next.running_attention_average
        );
        Ok(next)
    }

    /// Feeds one reading to the session for `block_type`.
    pub async fn apply_reading_to(
        &self,
        block_type: BlockType,
        reading: &FocusReading,
    ) -> Result<TickOutcome, SessionError> {
        let slot = self.slot(block_type).await?;
        let mut current = slot.lock().await;
        self.apply_locked(&mut current, reading).await
    }

    /// Feeds one reading to every active session. Per-session failures are
    /// logged and skipped; returns the sessions that advanced.
    pub async fn apply_reading(&self, reading: &FocusReading) -> Vec<(BlockType, TickOutcome)> {
        let slots: Vec<(BlockType, SessionSlot)> = {
            let sessions = self.sessions.lock().await;
            sessions
                .iter()
                .map(|(block_type, slot)| (*block_type, slot.clone()))
                .collect()
        };

        let mut advanced = Vec::new();
        for (block_type, slot) in slots {
            let mut current = slot.lock().await;
            if current.status != SessionStatus::Active {
                continue;
            }

            match self.apply_locked(&mut current, reading).await {
                Ok(outcome) => {
                    if outcome == TickOutcome::Completed {
                        log_info!(
                            "{} session {} completed (elapsed {} ms, attention {:.3})",
                            block_type,
                            current.session_id,
                            current.elapsed_ms,
                            current.running_attention_average
                        );
                    }
                    advanced.push((block_type, outcome));
                }
                Err(err @ SessionError::OutOfOrder { .. }) => {
                    log_warn!("Dropped reading for {} session: {}", block_type, err);
                }
                Err(err) => {
                    log_error!("Failed to apply reading to {} session: {}", block_type, err);
                }
            }
        }
        advanced
    }

    /// Window for `block_type` closed. An active session is finished;
    /// anything else is left alone.
    pub async fn close_window(
        &self,
        block_type: BlockType,
        at: DateTime<Utc>,
    ) -> Result<Option<LearningSession>, SessionError> {
        match self.session_status(block_type).await {
            Some(session) if session.status == SessionStatus::Active => {
                match self.end_session(block_type, at).await {
                    Ok(ended) => Ok(Some(ended)),
                    // A tick completed it between the check and the end.
                    Err(SessionError::InvalidState { .. }) => Ok(None),
                    Err(err) => Err(err),
                }
            }
            _ => Ok(None),
        }
    }

    /// Finishes every active session. Used on shutdown.
    pub async fn close_all(&self, at: DateTime<Utc>) -> Vec<LearningSession> {
        let mut closed = Vec::new();
        for session in self.active_sessions().await {
            match self.close_window(session.block_type, at).await {
                Ok(Some(ended)) => closed.push(ended),
                Ok(None) => {}
                Err(err) => {
                    log_error!("Failed to close {} session: {}", session.block_type, err);
                }
            }
        }
        closed
    }

    /// Latest session for `block_type`, finished or not.
    pub async fn session_status(&self, block_type: BlockType) -> Option<LearningSession> {
        let slot = self.sessions.lock().await.get(&block_type).cloned()?;
        let session = slot.lock().await.clone();
        Some(session)
    }

    pub async fn active_sessions(&self) -> Vec<LearningSession> {
        let slots: Vec<SessionSlot> = self.sessions.lock().await.values().cloned().collect();

        let mut active = Vec::new();
        for slot in slots {
            let session = slot.lock().await;
            if session.status == SessionStatus::Active {
                active.push(session.clone());
            }
        }
        active.sort_by_key(|session| session.start_time);
        active
    }

    async fn slot(&self, block_type: BlockType) -> Result<SessionSlot, SessionError> {
        self.sessions
            .lock()
            .await
            .get(&block_type)
            .cloned()
            .ok_or(SessionError::NotFound { block_type })
    }

    async fn apply_locked(
        &self,
        current: &mut LearningSession,
        reading: &FocusReading,
    ) -> Result<TickOutcome, SessionError> {
        let mut next = current.clone();
        let outcome = next.apply_reading(reading, self.tick_ms)?;
        self.db.upsert_learning_session(&next).await?;
        *current = next;
        Ok(outcome)
    }
}
