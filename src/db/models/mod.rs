pub mod app_usage;
pub mod quiz_result;

pub use app_usage::{AppUsage, AppUsageTotal};
pub use quiz_result::QuizResult;
