// Per-suite state machine and aggregate counters

use serde::Serialize;
use std::fmt;

use super::{NodeId, StateError, TestStatus};

/// Suite lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SuiteStatus {
    NotStarted,
    Running,
    Finished,
    Crashed,
}

impl SuiteStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Crashed)
    }
}

impl fmt::Display for SuiteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::NotStarted => "not started",
            Self::Running => "running",
            Self::Finished => "finished",
            Self::Crashed => "crashed",
        };
        f.write_str(text)
    }
}

/// Test counts aggregated over every descendant test of a suite
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SuiteCounts {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    /// Tests resolved as `Crashed`
    pub errored: usize,
}

impl SuiteCounts {
    pub fn terminal(&self) -> usize {
        self.passed + self.failed + self.errored
    }

    pub fn succeeded(&self) -> bool {
        self.failed == 0 && self.errored == 0
    }

    pub(crate) fn record(&mut self, status: TestStatus) {
        match status {
            TestStatus::Passed => self.passed += 1,
            TestStatus::Failed => self.failed += 1,
            TestStatus::Crashed => self.errored += 1,
            TestStatus::NotStarted | TestStatus::Running => {}
        }
    }
}

/// State of one suite; children live in the owning [`StateTree`](super::StateTree) arena
#[derive(Debug, Clone, PartialEq)]
pub struct SuiteEventState {
    name: String,
    status: SuiteStatus,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) counts: SuiteCounts,
    /// Children before this index are undeclared or have already begun
    pub(crate) expected_cursor: usize,
    started_at: Option<f64>,
    finished_at: Option<f64>,
}

impl SuiteEventState {
    pub fn new(name: impl Into<String>, parent: Option<NodeId>) -> Self {
        Self {
            name: name.into(),
            status: SuiteStatus::NotStarted,
            parent,
            children: Vec::new(),
            counts: SuiteCounts::default(),
            expected_cursor: 0,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> SuiteStatus {
        self.status
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in declaration order
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn counts(&self) -> SuiteCounts {
        self.counts
    }

    pub fn started_at(&self) -> Option<f64> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<f64> {
        self.finished_at
    }

    pub fn duration_seconds(&self) -> f64 {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => (end - start).max(0.0),
            _ => 0.0,
        }
    }

    pub(crate) fn begin(&mut self, now: f64) -> Result<(), StateError> {
        if self.status != SuiteStatus::NotStarted {
            return Err(StateError::SuiteAlreadyStarted {
                name: self.name.clone(),
                status: self.status,
            });
        }
        self.status = SuiteStatus::Running;
        self.started_at = Some(now);
        Ok(())
    }

    /// Mark finished; the tree guarantees no child is still running
    pub(crate) fn finish(&mut self, now: f64) -> Result<(), StateError> {
        if self.status != SuiteStatus::Running {
            return Err(StateError::SuiteNotRunning {
                name: self.name.clone(),
                status: self.status,
            });
        }
        self.status = SuiteStatus::Finished;
        self.finished_at = Some(now);
        Ok(())
    }

    pub(crate) fn crash(&mut self, now: f64) {
        if self.started_at.is_none() {
            self.started_at = Some(now);
        }
        self.status = SuiteStatus::Crashed;
        self.finished_at = Some(now);
    }
}
