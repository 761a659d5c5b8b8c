pub mod cli;
pub mod commands;
pub mod config;
pub mod event;
pub mod execution;
pub mod logging;
pub mod report;
pub mod selector;
pub mod state;
pub mod time;

pub use event::{Event, EventKind};
pub use execution::{EventReconciler, TestHostCommand};
pub use state::{ExitStatus, RunOutcome, RunSummary};
