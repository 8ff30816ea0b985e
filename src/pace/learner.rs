use std::sync::Mutex;
use std::time::Duration as StdDuration;

use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex as AsyncMutex;

use super::reward::{RewardInputs, DEFAULT_SATISFACTION};
use super::state::{PaceAction, PaceState};
use super::table::QEntry;
use crate::db::Database;
use crate::log_info;

const ENABLE_LOGS: bool = true;

pub const ADJUSTMENT_INTERVAL_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct PaceSettings {
    pub epsilon: f64,
    pub learning_rate: f64,
    pub discount: f64,
}

impl Default for PaceSettings {
    fn default() -> Self {
        Self {
            epsilon: 0.2,
            learning_rate: 0.1,
            discount: 0.95,
        }
    }
}

impl PaceSettings {
    pub fn check(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.epsilon) {
            bail!("epsilon must be within [0, 1], got {}", self.epsilon);
        }
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            bail!("learning rate must be within (0, 1], got {}", self.learning_rate);
        }
        if !(0.0..=1.0).contains(&self.discount) {
            bail!("discount must be within [0, 1], got {}", self.discount);
        }
        Ok(())
    }
}

/// Last week's decision, still waiting for its reward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingExperience {
    pub id: i64,
    pub chosen_at: DateTime<Utc>,
    pub state: PaceState,
    pub action: PaceAction,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedExperience {
    pub id: i64,
    pub reward: f64,
    pub next_state: PaceState,
    pub entry: QEntry,
}

/// Everything one weekly run writes, committed as a single transaction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaceStep {
    pub resolved: Option<ResolvedExperience>,
    pub chosen_at: DateTime<Utc>,
    pub state: PaceState,
    pub action: PaceAction,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyAdjustment {
    pub state: PaceState,
    pub action: PaceAction,
    pub reward: Option<f64>,
    pub updated_entry: Option<QEntry>,
    pub q_values: Vec<(PaceAction, f64)>,
}

/// Weekly pace nudge. One learner per process; each run holds `run_lock`
/// from reading the table until the step is committed.
pub struct PaceLearner {
    db: Database,
    settings: PaceSettings,
    tick_interval: StdDuration,
    rng: Mutex<StdRng>,
    run_lock: AsyncMutex<()>,
}

impl PaceLearner {
    pub fn new(db: Database, settings: PaceSettings, tick_interval: StdDuration) -> Self {
        Self::with_rng(db, settings, tick_interval, StdRng::from_entropy())
    }

    pub fn with_seed(
        db: Database,
        settings: PaceSettings,
        tick_interval: StdDuration,
        seed: u64,
    ) -> Self {
        Self::with_rng(db, settings, tick_interval, StdRng::seed_from_u64(seed))
    }

    fn with_rng(
        db: Database,
        settings: PaceSettings,
        tick_interval: StdDuration,
        rng: StdRng,
    ) -> Self {
        Self {
            db,
            settings,
            tick_interval,
            rng: Mutex::new(rng),
            run_lock: AsyncMutex::new(()),
        }
    }

    pub fn settings(&self) -> &PaceSettings {
        &self.settings
    }

    /// Rewards last week's pending decision against `state`, then picks and
    /// records this week's action.
    pub async fn weekly_adjustment(
        &self,
        state: PaceState,
        satisfaction: f64,
        now: DateTime<Utc>,
    ) -> Result<WeeklyAdjustment> {
        let _guard = self.run_lock.lock().await;
        self.adjust_locked(state, satisfaction, now).await
    }

    /// Runs the adjustment from stored aggregates if a week has passed since
    /// the last run. Returns `None` when not yet due.
    pub async fn run_if_due(
        &self,
        now: DateTime<Utc>,
        satisfaction: Option<f64>,
    ) -> Result<Option<WeeklyAdjustment>> {
        let _guard = self.run_lock.lock().await;

        if let Some(last) = self.db.last_pace_run().await? {
            if now - last < Duration::days(ADJUSTMENT_INTERVAL_DAYS) {
                return Ok(None);
            }
        }

        let aggregates = self
            .db
            .weekly_aggregates(now, self.tick_interval)
            .await?;
        let state = PaceState::from_aggregates(&aggregates);
        let adjustment = self
            .adjust_locked(state, satisfaction.unwrap_or(DEFAULT_SATISFACTION), now)
            .await?;
        Ok(Some(adjustment))
    }

    async fn adjust_locked(
        &self,
        state: PaceState,
        satisfaction: f64,
        now: DateTime<Utc>,
    ) -> Result<WeeklyAdjustment> {
        let mut table = self.db.load_q_table().await?;
        let pending = self.db.pending_pace_experience().await?;

        let resolved = pending.map(|pending| {
            let reward = RewardInputs::between(&pending.state, &state, satisfaction).reward();
            let entry = table.update(
                pending.state,
                pending.action,
                reward,
                &state,
                self.settings.learning_rate,
                self.settings.discount,
            );
            ResolvedExperience {
                id: pending.id,
                reward,
                next_state: state,
                entry,
            }
        });

        let action = {
            let mut rng = self
                .rng
                .lock()
                .map_err(|_| anyhow!("pace rng lock poisoned"))?;
            table.choose_action(&state, self.settings.epsilon, &mut *rng)
        };

        self.db
            .commit_pace_step(PaceStep {
                resolved,
                chosen_at: now,
                state,
                action,
            })
            .await?;

        match &resolved {
            Some(resolved) => log_info!(
                "Pace step: {} -> {} (reward {:.3}, q {:.3} -> {:.3})",
                state,
                action,
                resolved.reward,
                resolved.entry.q_before,
                resolved.entry.q_after
            ),
            None => log_info!("Pace step: {} -> {} (nothing pending to reward)", state, action),
        }

        Ok(WeeklyAdjustment {
            state,
            action,
            reward: resolved.map(|resolved| resolved.reward),
            updated_entry: resolved.map(|resolved| resolved.entry),
            q_values: table.row(&state),
        })
    }
}
