use std::time::Duration as StdDuration;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use rusqlite::params;

use crate::db::{connection::Database, helpers::format_datetime};
use crate::pace::WeeklyAggregates;

const WINDOW_DAYS: i64 = 7;
const RECENT_DAYS: i64 = 3;
const QUIZ_SAMPLE: i64 = 3;
/// Focus level assumed for a stretch with no readings.
const NEUTRAL_FOCUS: f64 = 50.0;

impl Database {
    /// Statistics for the seven days ending at `now`. Each stored reading
    /// stands for one tick of `tick_interval`.
    pub async fn weekly_aggregates(
        &self,
        now: DateTime<Utc>,
        tick_interval: StdDuration,
    ) -> Result<WeeklyAggregates> {
        let tick_secs = tick_interval.as_secs_f64();
        self.execute(move |conn| {
            let end = format_datetime(&now);
            let start = format_datetime(&(now - Duration::days(WINDOW_DAYS)));
            let split = format_datetime(&(now - Duration::days(RECENT_DAYS)));

            let focused: i64 = conn.query_row(
                "SELECT COUNT(*) FROM focus_readings
                 WHERE timestamp >= ?1 AND timestamp < ?2 AND state = 'FOCUSED'",
                params![start, end],
                |row| row.get(0),
            )?;
            let avg_daily_focus_hours =
                focused as f64 * tick_secs / 3600.0 / WINDOW_DAYS as f64;

            let avg_quiz_score: Option<f64> = conn.query_row(
                "SELECT AVG(score) FROM (
                    SELECT score FROM quiz_results
                    WHERE taken_at < ?1
                    ORDER BY taken_at DESC
                    LIMIT ?2
                 )",
                params![end, QUIZ_SAMPLE],
                |row| row.get(0),
            )?;

            let (completed, finished): (i64, i64) = conn.query_row(
                "SELECT COUNT(CASE WHEN status = 'COMPLETED' THEN 1 END), COUNT(*)
                 FROM learning_sessions
                 WHERE start_time >= ?1 AND start_time < ?2 AND status != 'ACTIVE'",
                params![start, end],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;
            let completion_rate = if finished == 0 {
                0.0
            } else {
                completed as f64 / finished as f64
            };

            let mean_focus = |from: &str, to: &str| -> rusqlite::Result<Option<f64>> {
                conn.query_row(
                    "SELECT AVG(composite_score) FROM focus_readings
                     WHERE timestamp >= ?1 AND timestamp < ?2",
                    params![from, to],
                    |row| row.get(0),
                )
            };
            let recent_focus = mean_focus(&split, &end)?.unwrap_or(NEUTRAL_FOCUS);
            let past_focus = mean_focus(&start, &split)?.unwrap_or(NEUTRAL_FOCUS);

            Ok(WeeklyAggregates {
                avg_daily_focus_hours,
                avg_quiz_score: avg_quiz_score.unwrap_or(0.0),
                completion_rate,
                recent_focus,
                past_focus,
            })
        })
        .await
    }
}
