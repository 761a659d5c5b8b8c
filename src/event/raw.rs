// Raw records - one line of test host output decoded into a structured transition

use serde::Deserialize;
use thiserror::Error;

use super::TestException;

/// Decode failure for a line that looked like a structured record
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("invalid JSON record: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("unknown event kind '{0}'")]
    UnknownEvent(String),

    #[error("'{event}' record is missing required field '{field}'")]
    MissingField {
        event: &'static str,
        field: &'static str,
    },
}

/// Structured transition decoded from the test host stream
#[derive(Debug, Clone, PartialEq)]
pub enum RawRecord {
    BeginSuite {
        suite_path: Vec<String>,
    },
    EndSuite {
        suite_path: Vec<String>,
        duration_seconds: Option<f64>,
    },
    BeginTest {
        suite_path: Vec<String>,
        test: String,
    },
    EndTest {
        suite_path: Vec<String>,
        test: String,
        succeeded: bool,
        duration_seconds: Option<f64>,
        exceptions: Vec<TestException>,
        output: Option<String>,
    },
    TestOutput {
        suite_path: Vec<String>,
        test: Option<String>,
        output: String,
    },
    Info {
        message: String,
    },
    /// Unstructured text written by the host or by the code under test
    Output(String),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireSuite {
    One(String),
    Path(Vec<String>),
}

impl From<WireSuite> for Vec<String> {
    fn from(suite: WireSuite) -> Self {
        match suite {
            WireSuite::One(name) => vec![name],
            WireSuite::Path(path) => path,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireException {
    #[serde(default, rename = "filePathInProject")]
    file_path: String,
    #[serde(default, rename = "lineNumber")]
    line_number: u32,
    #[serde(default)]
    reason: String,
}

#[derive(Debug, Deserialize)]
struct WireRecord {
    event: String,
    #[serde(default)]
    suite: Option<WireSuite>,
    #[serde(default)]
    test: Option<String>,
    #[serde(default)]
    succeeded: Option<bool>,
    #[serde(default, rename = "totalDuration")]
    total_duration: Option<f64>,
    #[serde(default)]
    exceptions: Vec<WireException>,
    #[serde(default)]
    output: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Decode one line of host output.
///
/// Lines that do not start with `{` are unstructured output and always decode to
/// [`RawRecord::Output`]; everything else must be a well-formed record.
pub fn parse_line(line: &str) -> Result<RawRecord, RecordError> {
    let trimmed = line.trim();
    if !trimmed.starts_with('{') {
        return Ok(RawRecord::Output(line.trim_end_matches(['\r', '\n']).to_string()));
    }

    let wire: WireRecord = serde_json::from_str(trimmed)?;
    let suite_path: Vec<String> = wire.suite.map(Into::into).unwrap_or_default();

    let record = match wire.event.as_str() {
        "begin-test-suite" => RawRecord::BeginSuite { suite_path },
        "end-test-suite" => RawRecord::EndSuite {
            suite_path,
            duration_seconds: wire.total_duration,
        },
        "begin-test" => RawRecord::BeginTest {
            suite_path,
            test: wire.test.ok_or(RecordError::MissingField {
                event: "begin-test",
                field: "test",
            })?,
        },
        "end-test" => RawRecord::EndTest {
            suite_path,
            test: wire.test.ok_or(RecordError::MissingField {
                event: "end-test",
                field: "test",
            })?,
            succeeded: wire.succeeded.ok_or(RecordError::MissingField {
                event: "end-test",
                field: "succeeded",
            })?,
            duration_seconds: wire.total_duration,
            exceptions: wire
                .exceptions
                .into_iter()
                .map(|e| TestException::new(e.file_path, e.line_number, e.reason))
                .collect(),
            output: wire.output,
        },
        "test-output" => RawRecord::TestOutput {
            suite_path,
            test: wire.test,
            output: wire.output.ok_or(RecordError::MissingField {
                event: "test-output",
                field: "output",
            })?,
        },
        "info" => RawRecord::Info {
            message: wire.message.or(wire.output).unwrap_or_default(),
        },
        other => return Err(RecordError::UnknownEvent(other.to_string())),
    };

    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_begin_suite_single_name() {
        let record = parse_line(r#"{"event":"begin-test-suite","suite":"ClassA"}"#).unwrap();
        assert_eq!(
            record,
            RawRecord::BeginSuite {
                suite_path: vec!["ClassA".to_string()]
            }
        );
    }

    #[test]
    fn test_parse_end_test_with_exceptions() {
        let line = r#"{"event":"end-test","suite":["All","ClassA"],"test":"ClassA/testFoo","succeeded":false,"totalDuration":0.5,"exceptions":[{"filePathInProject":"ClassA.m","lineNumber":42,"reason":"expected 1"}]}"#;
        match parse_line(line).unwrap() {
            RawRecord::EndTest {
                suite_path,
                test,
                succeeded,
                duration_seconds,
                exceptions,
                output,
            } => {
                assert_eq!(suite_path, vec!["All", "ClassA"]);
                assert_eq!(test, "ClassA/testFoo");
                assert!(!succeeded);
                assert_eq!(duration_seconds, Some(0.5));
                assert_eq!(exceptions, vec![TestException::new("ClassA.m", 42, "expected 1")]);
                assert!(output.is_none());
            }
            other => panic!("unexpected record: {:?}", other),
        }
    }

    #[test]
    fn test_plain_line_is_output() {
        assert_eq!(
            parse_line("2026-01-01 hello from the test\n").unwrap(),
            RawRecord::Output("2026-01-01 hello from the test".to_string())
        );
    }

    #[test]
    fn test_truncated_json_is_error() {
        let err = parse_line(r#"{"event":"begin-te"#).unwrap_err();
        assert!(matches!(err, RecordError::InvalidJson(_)));
    }

    #[test]
    fn test_unknown_event_is_error() {
        let err = parse_line(r#"{"event":"teleport"}"#).unwrap_err();
        assert!(matches!(err, RecordError::UnknownEvent(ref k) if k == "teleport"));
    }

    #[test]
    fn test_end_test_without_verdict_is_error() {
        let err = parse_line(r#"{"event":"end-test","test":"A/x"}"#).unwrap_err();
        assert_eq!(
            err.to_string(),
            "'end-test' record is missing required field 'succeeded'"
        );
    }
}
