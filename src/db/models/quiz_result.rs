//! Quiz outcomes recorded by the outer layer. They only feed the weekly
//! pace aggregates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::schedule::BlockType;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuizResult {
    pub id: Option<i64>,
    pub quiz_id: String,
    pub block_type: Option<BlockType>,
    pub taken_at: DateTime<Utc>,
    /// Percentage in `[0, 100]`.
    pub score: f64,
    pub total_questions: u32,
    pub correct_answers: u32,
}

impl QuizResult {
    pub fn new(
        quiz_id: impl Into<String>,
        block_type: Option<BlockType>,
        taken_at: DateTime<Utc>,
        total_questions: u32,
        correct_answers: u32,
    ) -> Self {
        let correct_answers = correct_answers.min(total_questions);
        let score = if total_questions == 0 {
            0.0
        } else {
            f64::from(correct_answers) * 100.0 / f64::from(total_questions)
        };

        Self {
            id: None,
            quiz_id: quiz_id.into(),
            block_type,
            taken_at,
            score,
            total_questions,
            correct_answers,
        }
    }
}
