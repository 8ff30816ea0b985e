use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use crate::db::{
    connection::Database,
    helpers::{format_datetime, parse_datetime},
};
use crate::pace::{PaceAction, PaceState, PaceStep, PendingExperience, QTable};

impl Database {
    pub async fn load_q_table(&self) -> Result<QTable> {
        self.execute(|conn| {
            let mut stmt = conn.prepare("SELECT state_key, action, q_value FROM pace_q_values")?;
            let mut rows = stmt.query([])?;
            let mut entries = Vec::new();
            while let Some(row) = rows.next()? {
                let state: String = row.get(0)?;
                let action: String = row.get(1)?;
                entries.push((
                    state.parse::<PaceState>()?,
                    action.parse::<PaceAction>()?,
                    row.get::<_, f64>(2)?,
                ));
            }
            Ok(QTable::from_entries(entries))
        })
        .await
    }

    /// Latest decision that has not been rewarded yet.
    pub async fn pending_pace_experience(&self) -> Result<Option<PendingExperience>> {
        self.execute(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, chosen_at, state_key, action
                     FROM pace_experiences
                     WHERE resolved_at IS NULL
                     ORDER BY chosen_at DESC, id DESC
                     LIMIT 1",
                    [],
                    |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                        ))
                    },
                )
                .optional()?;

            match row {
                Some((id, chosen_at, state, action)) => Ok(Some(PendingExperience {
                    id,
                    chosen_at: parse_datetime(&chosen_at, "chosen_at")?,
                    state: state.parse()?,
                    action: action.parse()?,
                })),
                None => Ok(None),
            }
        })
        .await
    }

    pub async fn last_pace_run(&self) -> Result<Option<DateTime<Utc>>> {
        self.execute(|conn| {
            let latest: Option<String> = conn.query_row(
                "SELECT MAX(chosen_at) FROM pace_experiences",
                [],
                |row| row.get(0),
            )?;
            latest
                .map(|raw| parse_datetime(&raw, "chosen_at"))
                .transpose()
        })
        .await
    }

    /// Resolves the previous experience, writes its updated table cell and
    /// records the new pending decision, all or nothing.
    pub async fn commit_pace_step(&self, step: PaceStep) -> Result<()> {
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            let stamp = format_datetime(&step.chosen_at);

            if let Some(resolved) = step.resolved {
                tx.execute(
                    "INSERT INTO pace_q_values (state_key, action, q_value, updated_at)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(state_key, action) DO UPDATE SET
                        q_value = excluded.q_value,
                        updated_at = excluded.updated_at",
                    params![
                        resolved.entry.state.key(),
                        resolved.entry.action.as_str(),
                        resolved.entry.q_after,
                        stamp,
                    ],
                )?;
                tx.execute(
                    "UPDATE pace_experiences
                     SET reward = ?1,
                         next_state_key = ?2,
                         q_value_before = ?3,
                         q_value_after = ?4,
                         resolved_at = ?5
                     WHERE id = ?6",
                    params![
                        resolved.reward,
                        resolved.next_state.key(),
                        resolved.entry.q_before,
                        resolved.entry.q_after,
                        stamp,
                        resolved.id,
                    ],
                )?;
            }

            tx.execute(
                "INSERT INTO pace_experiences (chosen_at, state_key, action)
                 VALUES (?1, ?2, ?3)",
                params![stamp, step.state.key(), step.action.as_str()],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
    }
}
