// Anomalies - transitions the state machines refused or had to repair

use serde::Serialize;
use thiserror::Error;

use super::{SuiteStatus, TestStatus};

/// A transition rejected by a test or suite state machine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("test '{id}' cannot begin: it is already {status}")]
    TestAlreadyStarted { id: String, status: TestStatus },

    #[error("test '{id}' cannot end: it is {status}")]
    TestNotRunning { id: String, status: TestStatus },

    #[error("output for test '{id}' arrived while it was {status}")]
    OutputWhileNotRunning { id: String, status: TestStatus },

    #[error("test '{id}' cannot be crashed: it is {status}")]
    TestNotCrashable { id: String, status: TestStatus },

    #[error("suite '{name}' cannot begin: it is already {status}")]
    SuiteAlreadyStarted { name: String, status: SuiteStatus },

    #[error("suite '{name}' cannot end: it is {status}")]
    SuiteNotRunning { name: String, status: SuiteStatus },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AnomalyKind {
    /// A begin or end the state machine refused
    InvalidTransition,
    /// A child began ahead of an earlier declared sibling
    OutOfOrder,
    /// A child that was not part of the declared plan
    Undeclared,
    /// A state was begun implicitly because its begin event never arrived
    MissingBegin,
    /// Output attributed to a test that was not running
    StrayOutput,
    /// A record that could not be decoded
    MalformedRecord,
    /// A state closed as `Crashed` by reconciliation
    ForcedCrash,
}

/// One entry in the run's anomaly log
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Anomaly {
    pub kind: AnomalyKind,
    pub message: String,
}

impl Anomaly {
    pub fn new(kind: AnomalyKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<StateError> for Anomaly {
    fn from(err: StateError) -> Self {
        let kind = match err {
            StateError::OutputWhileNotRunning { .. } => AnomalyKind::StrayOutput,
            _ => AnomalyKind::InvalidTransition,
        };
        Self::new(kind, err.to_string())
    }
}
