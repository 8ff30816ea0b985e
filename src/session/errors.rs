use chrono::{DateTime, Utc};
use thiserror::Error;

use super::state::SessionStatus;
use crate::schedule::BlockType;

/// Failures surfaced by the session tracker. Every variant except
/// `Storage` is raised before any state is touched.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("a {block_type} session is already active")]
    Conflict { block_type: BlockType },

    #[error("{block_type} session is {status:?}, not active")]
    InvalidState {
        block_type: BlockType,
        status: SessionStatus,
    },

    #[error("no {block_type} session has been started")]
    NotFound { block_type: BlockType },

    #[error("reading at {received} is older than last applied reading at {last}")]
    OutOfOrder {
        last: DateTime<Utc>,
        received: DateTime<Utc>,
    },

    #[error("session storage failed: {0:#}")]
    Storage(#[from] anyhow::Error),
}
