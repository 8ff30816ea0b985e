use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use crate::db::{
    connection::Database,
    helpers::{
        format_datetime, format_optional_datetime, parse_block_type, parse_datetime,
        parse_optional_datetime, parse_status, to_i64, to_u64,
    },
};
use crate::session::{LearningSession, SessionStatus};

const SESSION_COLUMNS: &str = "id, block_type, block_name, start_time, goal_ms, attention_threshold,
     elapsed_ms, running_attention_average, reading_count, last_reading_at, status, ended_at, updated_at";

fn row_to_session(row: &Row) -> Result<LearningSession> {
    let block_type: String = row.get("block_type")?;
    let start_time: String = row.get("start_time")?;
    let goal_ms: i64 = row.get("goal_ms")?;
    let elapsed_ms: i64 = row.get("elapsed_ms")?;
    let reading_count: i64 = row.get("reading_count")?;
    let last_reading_at: Option<String> = row.get("last_reading_at")?;
    let status: String = row.get("status")?;
    let ended_at: Option<String> = row.get("ended_at")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(LearningSession {
        session_id: row.get("id")?,
        block_type: parse_block_type(&block_type)?,
        block_name: row.get("block_name")?,
        start_time: parse_datetime(&start_time, "start_time")?,
        goal_ms: to_u64(goal_ms, "goal_ms")?,
        attention_threshold: row.get("attention_threshold")?,
        elapsed_ms: to_u64(elapsed_ms, "elapsed_ms")?,
        running_attention_average: row.get("running_attention_average")?,
        reading_count: to_u64(reading_count, "reading_count")?,
        last_reading_at: parse_optional_datetime(last_reading_at, "last_reading_at")?,
        status: parse_status(&status)?,
        ended_at: parse_optional_datetime(ended_at, "ended_at")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

impl Database {
    /// Inserts the session or overwrites its mutable fields.
    pub async fn upsert_learning_session(&self, session: &LearningSession) -> Result<()> {
        let record = session.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO learning_sessions (
                    id, block_type, block_name, start_time, goal_ms, attention_threshold,
                    elapsed_ms, running_attention_average, reading_count, last_reading_at,
                    status, ended_at, updated_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                 ON CONFLICT(id) DO UPDATE SET
                    elapsed_ms = excluded.elapsed_ms,
                    running_attention_average = excluded.running_attention_average,
                    reading_count = excluded.reading_count,
                    last_reading_at = excluded.last_reading_at,
                    status = excluded.status,
                    ended_at = excluded.ended_at,
                    updated_at = excluded.updated_at",
                params![
                    record.session_id,
                    record.block_type.as_str(),
                    record.block_name,
                    format_datetime(&record.start_time),
                    to_i64(record.goal_ms)?,
                    record.attention_threshold,
                    to_i64(record.elapsed_ms)?,
                    record.running_attention_average,
                    to_i64(record.reading_count)?,
                    format_optional_datetime(record.last_reading_at.as_ref()),
                    record.status.as_str(),
                    format_optional_datetime(record.ended_at.as_ref()),
                    format_datetime(&record.updated_at),
                ],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn get_learning_session(&self, session_id: &str) -> Result<Option<LearningSession>> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM learning_sessions WHERE id = ?1"
            ))?;
            let session = stmt
                .query_row(params![session_id], |row| Ok(row_to_session(row)))
                .optional()?
                .transpose()?;
            Ok(session)
        })
        .await
    }

    pub async fn list_active_learning_sessions(&self) -> Result<Vec<LearningSession>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS}
                 FROM learning_sessions
                 WHERE status = 'ACTIVE'
                 ORDER BY start_time ASC"
            ))?;

            let mut rows = stmt.query([])?;
            let mut sessions = Vec::new();
            while let Some(row) = rows.next()? {
                sessions.push(row_to_session(row)?);
            }
            Ok(sessions)
        })
        .await
    }

    /// Newest first.
    pub async fn list_learning_sessions(&self, limit: usize) -> Result<Vec<LearningSession>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS}
                 FROM learning_sessions
                 ORDER BY start_time DESC
                 LIMIT ?1"
            ))?;

            let mut rows = stmt.query(params![to_i64(limit as u64)?])?;
            let mut sessions = Vec::new();
            while let Some(row) = rows.next()? {
                sessions.push(row_to_session(row)?);
            }
            Ok(sessions)
        })
        .await
    }

    /// Marks every session left ACTIVE by a previous process as abandoned.
    /// Returns the affected ids.
    pub async fn abandon_stale_sessions(&self, at: DateTime<Utc>) -> Result<Vec<String>> {
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            let ids = {
                let mut stmt =
                    tx.prepare("SELECT id FROM learning_sessions WHERE status = 'ACTIVE'")?;
                let ids = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                ids
            };

            let stamp = format_datetime(&at);
            tx.execute(
                "UPDATE learning_sessions
                 SET status = ?1,
                     ended_at = ?2,
                     updated_at = ?2
                 WHERE status = 'ACTIVE'",
                params![SessionStatus::Abandoned.as_str(), stamp],
            )?;
            tx.commit()?;
            Ok(ids)
        })
        .await
    }
}
