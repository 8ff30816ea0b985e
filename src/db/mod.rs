//! SQLite persistence: readings, app usage, sessions, quiz results and the
//! pace table.

pub mod connection;
pub mod helpers;
mod migrations;
pub mod models;
mod repositories;

pub use connection::Database;
pub use models::{AppUsage, AppUsageTotal, QuizResult};
