//! Mock capture pipeline orchestration for the `stream` command.

mod runner;
mod stats;

pub use runner::{StreamConfig, StreamRunner};
pub use stats::StreamStats;
