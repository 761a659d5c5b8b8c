// State module - test and suite state machines
// The tree is the single owner of every state; the reconciler is its single writer.

pub mod anomaly;
pub mod metrics;
pub mod result;
pub mod suite_state;
pub mod summary;
pub mod test_state;
pub mod tree;

pub use anomaly::{Anomaly, AnomalyKind, StateError};
pub use metrics::RunMetrics;
pub use result::TestResult;
pub use suite_state::{SuiteCounts, SuiteEventState, SuiteStatus};
pub use summary::{ExitStatus, RunOutcome, RunSummary};
pub use test_state::{TestEventState, TestStatus};
pub use tree::{NodeId, NodeRef, StateTree};
