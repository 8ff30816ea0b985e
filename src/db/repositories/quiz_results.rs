use anyhow::Result;
use rusqlite::params;

use crate::db::{
    connection::Database,
    helpers::{format_datetime, parse_block_type, parse_datetime, to_i64, to_u64},
    models::QuizResult,
};

impl Database {
    pub async fn insert_quiz_result(&self, result: &QuizResult) -> Result<i64> {
        let record = result.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO quiz_results (
                    quiz_id, block_type, taken_at, score, total_questions, correct_answers
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    record.quiz_id,
                    record.block_type.map(|block| block.as_str()),
                    format_datetime(&record.taken_at),
                    record.score,
                    to_i64(u64::from(record.total_questions))?,
                    to_i64(u64::from(record.correct_answers))?,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    /// Latest results first.
    pub async fn recent_quiz_results(&self, limit: usize) -> Result<Vec<QuizResult>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, quiz_id, block_type, taken_at, score, total_questions, correct_answers
                 FROM quiz_results
                 ORDER BY taken_at DESC, id DESC
                 LIMIT ?1",
            )?;

            let mut rows = stmt.query(params![to_i64(limit as u64)?])?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                let block_type: Option<String> = row.get(2)?;
                let taken_at: String = row.get(3)?;
                let total: i64 = row.get(5)?;
                let correct: i64 = row.get(6)?;

                results.push(QuizResult {
                    id: Some(row.get(0)?),
                    quiz_id: row.get(1)?,
                    block_type: block_type.as_deref().map(parse_block_type).transpose()?,
                    taken_at: parse_datetime(&taken_at, "taken_at")?,
                    score: row.get(4)?,
                    total_questions: u32::try_from(to_u64(total, "total_questions")?)?,
                    correct_answers: u32::try_from(to_u64(correct, "correct_answers")?)?,
                });
            }
            Ok(results)
        })
        .await
    }
}
