// Per-test state machine

use serde::Serialize;
use std::fmt;

use super::StateError;
use crate::event::TestException;

/// Test lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TestStatus {
    NotStarted,
    Running,
    Passed,
    Failed,
    Crashed,
}

impl TestStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Passed | Self::Failed | Self::Crashed)
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::NotStarted => "not started",
            Self::Running => "running",
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Crashed => "crashed",
        };
        f.write_str(text)
    }
}

/// State of a single test, identified as `ClassName/methodName`
#[derive(Debug, Clone, PartialEq)]
pub struct TestEventState {
    class_name: String,
    method_name: String,
    status: TestStatus,
    output: String,
    stray_output: String,
    exceptions: Vec<TestException>,
    started_at: Option<f64>,
    duration_seconds: Option<f64>,
}

impl TestEventState {
    pub fn new(class_name: impl Into<String>, method_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            method_name: method_name.into(),
            status: TestStatus::NotStarted,
            output: String::new(),
            stray_output: String::new(),
            exceptions: Vec::new(),
            started_at: None,
            duration_seconds: None,
        }
    }

    /// Build from a host-supplied name; bare method names take the enclosing suite as class
    pub fn from_name(name: &str, default_class: &str) -> Self {
        match name.split_once('/') {
            Some((class, method)) => Self::new(class, method),
            None => Self::new(default_class, name),
        }
    }

    /// Whether a host-supplied name refers to this test
    pub fn answers_to(&self, name: &str) -> bool {
        match name.split_once('/') {
            Some((class, method)) => class == self.class_name && method == self.method_name,
            None => name == self.method_name,
        }
    }

    pub fn identifier(&self) -> String {
        format!("{}/{}", self.class_name, self.method_name)
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    pub fn status(&self) -> TestStatus {
        self.status
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    /// Output that arrived while the test was not running
    pub fn stray_output(&self) -> &str {
        &self.stray_output
    }

    pub fn exceptions(&self) -> &[TestException] {
        &self.exceptions
    }

    pub fn duration_seconds(&self) -> Option<f64> {
        self.duration_seconds
    }

    pub fn begin(&mut self, now: f64) -> Result<(), StateError> {
        if self.status != TestStatus::NotStarted {
            return Err(StateError::TestAlreadyStarted {
                id: self.identifier(),
                status: self.status,
            });
        }
        self.status = TestStatus::Running;
        self.started_at = Some(now);
        Ok(())
    }

    pub fn record_output(&mut self, text: &str) -> Result<(), StateError> {
        if self.status != TestStatus::Running {
            self.stray_output.push_str(text);
            return Err(StateError::OutputWhileNotRunning {
                id: self.identifier(),
                status: self.status,
            });
        }
        self.output.push_str(text);
        Ok(())
    }

    /// Close a running test with the host's verdict.
    ///
    /// `duration` falls back to the wall-clock time since `begin` when the host omits it.
    pub fn end(
        &mut self,
        succeeded: bool,
        exceptions: Vec<TestException>,
        duration: Option<f64>,
        now: f64,
    ) -> Result<TestStatus, StateError> {
        if self.status != TestStatus::Running {
            return Err(StateError::TestNotRunning {
                id: self.identifier(),
                status: self.status,
            });
        }
        self.status = if succeeded && exceptions.is_empty() {
            TestStatus::Passed
        } else {
            TestStatus::Failed
        };
        self.exceptions = exceptions;
        self.duration_seconds = Some(duration.unwrap_or_else(|| self.elapsed(now)));
        Ok(self.status)
    }

    /// Adopt output the host reported only on the end record
    pub fn adopt_final_output(&mut self, output: Option<String>) {
        if let Some(text) = output
            && self.output.is_empty()
        {
            self.output = text;
        }
    }

    pub fn force_crash(&mut self, reason: &str, now: f64) -> Result<(), StateError> {
        if self.status != TestStatus::Running {
            return Err(StateError::TestNotCrashable {
                id: self.identifier(),
                status: self.status,
            });
        }
        self.status = TestStatus::Crashed;
        self.exceptions.push(TestException::crash(reason));
        self.duration_seconds = Some(self.elapsed(now));
        Ok(())
    }

    /// Resolve a test that was expected to run but never began
    pub fn abandon(&mut self, reason: &str) -> Result<(), StateError> {
        if self.status != TestStatus::NotStarted {
            return Err(StateError::TestNotCrashable {
                id: self.identifier(),
                status: self.status,
            });
        }
        self.status = TestStatus::Crashed;
        self.exceptions.push(TestException::crash(reason));
        self.duration_seconds = Some(0.0);
        Ok(())
    }

    fn elapsed(&self, now: f64) -> f64 {
        self.started_at
            .map(|start| (now - start).max(0.0))
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_end_passes() {
        let mut state = TestEventState::new("ClassA", "testFoo");
        state.begin(1.0).unwrap();
        assert_eq!(state.status(), TestStatus::Running);
        let status = state.end(true, Vec::new(), None, 3.5).unwrap();
        assert_eq!(status, TestStatus::Passed);
        assert_eq!(state.duration_seconds(), Some(2.5));
    }

    #[test]
    fn test_exceptions_fail_even_when_succeeded() {
        let mut state = TestEventState::new("ClassA", "testFoo");
        state.begin(0.0).unwrap();
        let status = state
            .end(true, vec![TestException::new("A.m", 3, "nope")], Some(0.1), 1.0)
            .unwrap();
        assert_eq!(status, TestStatus::Failed);
        assert_eq!(state.duration_seconds(), Some(0.1));
    }

    #[test]
    fn test_second_end_is_rejected() {
        let mut state = TestEventState::new("ClassA", "testFoo");
        state.begin(0.0).unwrap();
        state.end(false, Vec::new(), None, 1.0).unwrap();
        let err = state.end(true, Vec::new(), None, 2.0).unwrap_err();
        assert_eq!(
            err,
            StateError::TestNotRunning {
                id: "ClassA/testFoo".to_string(),
                status: TestStatus::Failed
            }
        );
        assert_eq!(state.status(), TestStatus::Failed);
    }

    #[test]
    fn test_double_begin_is_rejected() {
        let mut state = TestEventState::new("ClassA", "testFoo");
        state.begin(0.0).unwrap();
        assert!(state.begin(1.0).is_err());
        assert_eq!(state.status(), TestStatus::Running);
    }

    #[test]
    fn test_output_outside_running_is_kept_as_stray() {
        let mut state = TestEventState::new("ClassA", "testFoo");
        assert!(state.record_output("early\n").is_err());
        state.begin(0.0).unwrap();
        state.record_output("during\n").unwrap();
        state.end(true, Vec::new(), None, 1.0).unwrap();
        assert!(state.record_output("late\n").is_err());

        assert_eq!(state.output(), "during\n");
        assert_eq!(state.stray_output(), "early\nlate\n");
    }

    #[test]
    fn test_force_crash_only_from_running() {
        let mut state = TestEventState::new("ClassA", "testFoo");
        assert!(state.force_crash("gone", 0.0).is_err());
        state.begin(0.0).unwrap();
        state.force_crash("gone", 4.0).unwrap();
        assert_eq!(state.status(), TestStatus::Crashed);
        assert_eq!(state.exceptions()[0].reason, "gone");
        assert!(state.force_crash("again", 5.0).is_err());
    }

    #[test]
    fn test_abandon_only_from_not_started() {
        let mut state = TestEventState::new("ClassA", "testFoo");
        state.abandon("never ran").unwrap();
        assert_eq!(state.status(), TestStatus::Crashed);

        let mut running = TestEventState::new("ClassA", "testBar");
        running.begin(0.0).unwrap();
        assert!(running.abandon("never ran").is_err());
    }

    #[test]
    fn test_from_name_and_answers_to() {
        let bare = TestEventState::from_name("testFoo", "ClassA");
        assert_eq!(bare.identifier(), "ClassA/testFoo");
        assert!(bare.answers_to("testFoo"));
        assert!(bare.answers_to("ClassA/testFoo"));
        assert!(!bare.answers_to("ClassB/testFoo"));

        let qualified = TestEventState::from_name("ClassB/testBar", "Ignored");
        assert_eq!(qualified.class_name(), "ClassB");
        assert_eq!(qualified.method_name(), "testBar");
    }

    #[test]
    fn test_final_output_only_when_nothing_streamed() {
        let mut state = TestEventState::new("ClassA", "testFoo");
        state.begin(0.0).unwrap();
        state.record_output("streamed").unwrap();
        state.adopt_final_output(Some("duplicate".to_string()));
        assert_eq!(state.output(), "streamed");
    }
}
