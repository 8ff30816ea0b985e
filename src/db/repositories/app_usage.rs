use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::params;

use crate::db::{
    connection::Database,
    helpers::{format_datetime, parse_datetime, to_i64, to_u64},
    models::{AppUsage, AppUsageTotal},
};

impl Database {
    pub async fn insert_app_usage(&self, usage: &AppUsage) -> Result<i64> {
        let record = usage.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO app_usage (
                    timestamp,
                    app_name,
                    window_title,
                    duration_ms,
                    held_ms,
                    focus_state,
                    composite_score
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    format_datetime(&record.timestamp),
                    record.app_name,
                    record.window_title,
                    to_i64(record.duration_ms)?,
                    to_i64(record.held_ms)?,
                    record.focus_state.as_str(),
                    record.composite_score,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    /// Rows with `start <= timestamp < end`, oldest first.
    pub async fn app_usage_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<AppUsage>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, timestamp, app_name, window_title, duration_ms, held_ms,
                        focus_state, composite_score
                 FROM app_usage
                 WHERE timestamp >= ?1 AND timestamp < ?2
                 ORDER BY timestamp ASC, id ASC",
            )?;

            let mut rows = stmt.query(params![format_datetime(&start), format_datetime(&end)])?;
            let mut usage = Vec::new();
            while let Some(row) = rows.next()? {
                let timestamp: String = row.get(1)?;
                let duration_ms: i64 = row.get(4)?;
                let held_ms: i64 = row.get(5)?;
                let focus_state: String = row.get(6)?;

                usage.push(AppUsage {
                    id: Some(row.get(0)?),
                    timestamp: parse_datetime(&timestamp, "timestamp")?,
                    app_name: row.get(2)?,
                    window_title: row.get(3)?,
                    duration_ms: to_u64(duration_ms, "duration_ms")?,
                    held_ms: to_u64(held_ms, "held_ms")?,
                    focus_state: focus_state.parse()?,
                    composite_score: row.get(7)?,
                });
            }
            Ok(usage)
        })
        .await
    }

    /// Time per app over `[start, end)`, most used first.
    pub async fn app_usage_totals(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<AppUsageTotal>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT app_name,
                        SUM(duration_ms),
                        SUM(CASE WHEN focus_state = 'FOCUSED' THEN duration_ms ELSE 0 END)
                 FROM app_usage
                 WHERE timestamp >= ?1 AND timestamp < ?2
                 GROUP BY app_name
                 ORDER BY SUM(duration_ms) DESC, app_name ASC",
            )?;

            let mut rows = stmt.query(params![format_datetime(&start), format_datetime(&end)])?;
            let mut totals = Vec::new();
            while let Some(row) = rows.next()? {
                let total_ms: i64 = row.get(1)?;
                let focused_ms: i64 = row.get(2)?;
                totals.push(AppUsageTotal {
                    app_name: row.get(0)?,
                    total_ms: to_u64(total_ms, "total_ms")?,
                    focused_ms: to_u64(focused_ms, "focused_ms")?,
                });
            }
            Ok(totals)
        })
        .await
    }
}
