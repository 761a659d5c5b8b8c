// Per-test result rows for the run summary

use serde::Serialize;

use crate::event::TestException;
use crate::state::{TestEventState, TestStatus};

/// Final verdict of one test
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestResult {
    pub name: String,
    pub suite_path: Vec<String>,
    pub status: TestStatus,
    pub duration_seconds: f64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exceptions: Vec<TestException>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub output: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stray_output: String,
}

impl TestResult {
    pub fn from_state(state: &TestEventState, suite_path: Vec<String>) -> Self {
        Self {
            name: state.identifier(),
            suite_path,
            status: state.status(),
            duration_seconds: state.duration_seconds().unwrap_or_default(),
            exceptions: state.exceptions().to_vec(),
            output: state.output().to_string(),
            stray_output: state.stray_output().to_string(),
        }
    }

    /// First failure reason, if any
    pub fn error_message(&self) -> Option<&str> {
        self.exceptions.first().map(|e| e.reason.as_str())
    }
}
