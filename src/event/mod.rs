// Event module - normalized lifecycle events published to reporters

pub mod raw;

pub use raw::{RawRecord, RecordError, parse_line};

use serde::{Deserialize, Serialize};

/// Kind of lifecycle transition an event describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    BeginSuite,
    EndSuite,
    BeginTest,
    EndTest,
    TestOutput,
    Info,
}

/// Failure location reported by the test host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestException {
    pub file_path: String,
    pub line_number: u32,
    pub reason: String,
}

impl TestException {
    pub fn new(file_path: impl Into<String>, line_number: u32, reason: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            line_number,
            reason: reason.into(),
        }
    }

    /// Exception attached to states closed by reconciliation
    pub fn crash(reason: impl Into<String>) -> Self {
        Self::new("", 0, reason)
    }
}

/// Normalized event
///
/// Events are facts: once built they are only cloned and read. `suite_path` is the chain of suite
/// names from the top-level suite down to the suite the event belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    pub suite_path: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub succeeded: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exceptions: Vec<TestException>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_text: Option<String>,
    /// Set on end events synthesized for states forced to `Crashed`
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub crashed: bool,
}

impl Event {
    fn bare(kind: EventKind, suite_path: Vec<String>) -> Self {
        Self {
            kind,
            suite_path,
            test_name: None,
            succeeded: None,
            duration_seconds: None,
            exceptions: Vec::new(),
            output_text: None,
            crashed: false,
        }
    }

    pub fn begin_suite(suite_path: Vec<String>) -> Self {
        Self::bare(EventKind::BeginSuite, suite_path)
    }

    pub fn end_suite(suite_path: Vec<String>, succeeded: bool, duration_seconds: f64) -> Self {
        Self {
            succeeded: Some(succeeded),
            duration_seconds: Some(duration_seconds),
            ..Self::bare(EventKind::EndSuite, suite_path)
        }
    }

    pub fn begin_test(suite_path: Vec<String>, test_name: impl Into<String>) -> Self {
        Self {
            test_name: Some(test_name.into()),
            ..Self::bare(EventKind::BeginTest, suite_path)
        }
    }

    pub fn end_test(
        suite_path: Vec<String>,
        test_name: impl Into<String>,
        succeeded: bool,
        duration_seconds: f64,
        exceptions: Vec<TestException>,
        output_text: Option<String>,
    ) -> Self {
        Self {
            test_name: Some(test_name.into()),
            succeeded: Some(succeeded),
            duration_seconds: Some(duration_seconds),
            exceptions,
            output_text,
            ..Self::bare(EventKind::EndTest, suite_path)
        }
    }

    pub fn test_output(
        suite_path: Vec<String>,
        test_name: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            test_name: Some(test_name.into()),
            output_text: Some(text.into()),
            ..Self::bare(EventKind::TestOutput, suite_path)
        }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self {
            output_text: Some(text.into()),
            ..Self::bare(EventKind::Info, Vec::new())
        }
    }

    /// Mark a synthesized end event as the result of a forced crash
    pub fn into_crashed(mut self) -> Self {
        self.crashed = true;
        self
    }

    /// `Class/method` identity for test events
    pub fn test_identifier(&self) -> Option<String> {
        let name = self.test_name.as_deref()?;
        if name.contains('/') {
            return Some(name.to_string());
        }
        match self.suite_path.last() {
            Some(class) => Some(format!("{}/{}", class, name)),
            None => Some(name.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_end_test_carries_verdict() {
        let event = Event::end_test(
            vec!["ClassA".to_string()],
            "testFoo",
            false,
            0.25,
            vec![TestException::new("A.m", 12, "boom")],
            Some("log".to_string()),
        );
        assert_eq!(event.kind, EventKind::EndTest);
        assert_eq!(event.succeeded, Some(false));
        assert_eq!(event.exceptions.len(), 1);
        assert!(!event.crashed);
    }

    #[test]
    fn test_identifier_from_suite_and_method() {
        let event = Event::begin_test(vec!["All".to_string(), "ClassA".to_string()], "testFoo");
        assert_eq!(event.test_identifier(), Some("ClassA/testFoo".to_string()));

        let event = Event::begin_test(vec!["All".to_string()], "ClassB/testBar");
        assert_eq!(event.test_identifier(), Some("ClassB/testBar".to_string()));

        assert_eq!(Event::info("x").test_identifier(), None);
    }

    #[test]
    fn test_serialization_skips_empty_fields() {
        let json = serde_json::to_value(Event::begin_suite(vec!["S".to_string()])).unwrap();
        assert_eq!(json["kind"], "BeginSuite");
        assert!(json.get("test_name").is_none());
        assert!(json.get("crashed").is_none());

        let crashed = Event::end_suite(vec!["S".to_string()], false, 1.0).into_crashed();
        let json = serde_json::to_value(crashed).unwrap();
        assert_eq!(json["crashed"], true);
    }
}
