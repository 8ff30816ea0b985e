//! Query methods on [`Database`](super::Database), one file per table
//! group.

mod aggregates;
mod app_usage;
mod focus_readings;
mod pace;
mod quiz_results;
mod sessions;
