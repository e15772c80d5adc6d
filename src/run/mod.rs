//! Tuning run records
//!
//! A [`TuningRun`] is created when the coordinator starts, collects every
//! candidate record the search produces, and is persisted as
//! `tuning_run.json` once the search ends. Finished candidates are also
//! streamed to a [`HistoryLog`] so that an interrupted run can resume.
//!
//! ## Lifecycle
//!
//! ```text
//! Pending -> Running -> { Completed | Failed | Cancelled }
//! ```

mod context;
mod history;
mod tuning_run;

pub use context::RunContext;
pub use history::{HistoryHeader, HistoryLog, HISTORY_FILE};
pub use tuning_run::{RunStatus, TuningRun};
