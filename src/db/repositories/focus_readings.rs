use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::params;
use serde_json::{from_str, to_string};

use crate::db::{
    connection::Database,
    helpers::{format_datetime, parse_datetime},
};
use crate::focus::FocusReading;

impl Database {
    /// Appends one classifier tick. Returns the row id.
    pub async fn insert_focus_reading(&self, reading: &FocusReading) -> Result<i64> {
        let record = reading.clone();
        self.execute(move |conn| {
            let breakdown_json = to_string(&record.signal_breakdown)
                .context("failed to serialize signal breakdown")?;
            let exceptions_json = to_string(&record.active_exceptions)
                .context("failed to serialize active exceptions")?;

            conn.execute(
                "INSERT INTO focus_readings (
                    timestamp,
                    composite_score,
                    state,
                    breakdown_json,
                    exceptions_json
                ) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    format_datetime(&record.timestamp),
                    record.composite_score,
                    record.state.as_str(),
                    breakdown_json,
                    exceptions_json,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    /// Readings with `start <= timestamp < end`, oldest first.
    pub async fn focus_readings_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<FocusReading>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT timestamp, composite_score, state, breakdown_json, exceptions_json
                 FROM focus_readings
                 WHERE timestamp >= ?1 AND timestamp < ?2
                 ORDER BY timestamp ASC, id ASC",
            )?;

            let mut rows = stmt.query(params![format_datetime(&start), format_datetime(&end)])?;
            let mut readings = Vec::new();
            while let Some(row) = rows.next()? {
                let timestamp: String = row.get(0)?;
                let state: String = row.get(2)?;
                let breakdown_json: String = row.get(3)?;
                let exceptions_json: String = row.get(4)?;

                readings.push(FocusReading {
                    timestamp: parse_datetime(&timestamp, "timestamp")?,
                    composite_score: row.get(1)?,
                    state: state.parse()?,
                    signal_breakdown: from_str(&breakdown_json)
                        .context("failed to parse breakdown_json")?,
                    active_exceptions: from_str(&exceptions_json)
                        .context("failed to parse exceptions_json")?,
                });
            }
            Ok(readings)
        })
        .await
    }
}
