// Run summary - the structured result handed to presentation layers

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{Anomaly, RunMetrics, TestResult, TestStatus};
use crate::event::Event;
use crate::report::{Reporter, ReporterFault};

/// How the test host process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitStatus {
    /// Exited on its own with a status code
    Exited(i32),
    /// Killed by a signal
    Signaled(i32),
    /// Killed by the runner after the timeout elapsed
    TimedOut,
}

impl ExitStatus {
    /// Hosts exit 0 when every test passed and 1 when some failed; anything else is abnormal
    pub fn is_abnormal(&self) -> bool {
        !matches!(self, Self::Exited(0) | Self::Exited(1))
    }

    /// Reason attached to states that were still open when the host went away
    pub fn crash_reason(&self) -> String {
        match self {
            Self::Exited(code) if !self.is_abnormal() => {
                format!("test host exited (status {}) before this finished", code)
            }
            Self::Exited(code) => format!("test host exited abnormally with status {}", code),
            Self::Signaled(signal) => format!("test host was terminated by signal {}", signal),
            Self::TimedOut => "test host timed out and was killed".to_string(),
        }
    }

    pub fn from_process(status: std::process::ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return Self::Exited(code);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return Self::Signaled(signal);
            }
        }
        Self::Exited(-1)
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exited(code) => write!(f, "exited with status {}", code),
            Self::Signaled(signal) => write!(f, "terminated by signal {}", signal),
            Self::TimedOut => f.write_str("timed out"),
        }
    }
}

/// Overall verdict of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunOutcome {
    Passed,
    Failed,
    Crashed,
}

impl RunOutcome {
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Passed => 0,
            Self::Failed => 1,
            Self::Crashed => 2,
        }
    }
}

/// Everything known about a run once the host has exited
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    pub exit_status: ExitStatus,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub crashed: usize,
    pub tests: Vec<TestResult>,
    pub events: Vec<Event>,
    pub anomalies: Vec<Anomaly>,
    pub reporter_faults: Vec<ReporterFault>,
    pub metrics: RunMetrics,
}

impl RunSummary {
    pub fn all_passed(&self) -> bool {
        self.outcome == RunOutcome::Passed
    }

    pub fn duration_seconds(&self) -> f64 {
        self.metrics.total_duration_seconds
    }

    pub fn tests_with_status(&self, status: TestStatus) -> impl Iterator<Item = &TestResult> {
        self.tests.iter().filter(move |t| t.status == status)
    }

    /// Deliver the recorded event log to a reporter attached after the run
    pub fn replay_into(&self, reporter: &dyn Reporter) -> Vec<ReporterFault> {
        crate::report::ReporterBus::replay(reporter, &self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_status_abnormal() {
        assert!(!ExitStatus::Exited(0).is_abnormal());
        assert!(!ExitStatus::Exited(1).is_abnormal());
        assert!(ExitStatus::Exited(134).is_abnormal());
        assert!(ExitStatus::Signaled(11).is_abnormal());
        assert!(ExitStatus::TimedOut.is_abnormal());
    }

    #[test]
    fn test_crash_reasons_distinguish_timeout() {
        assert_eq!(
            ExitStatus::TimedOut.crash_reason(),
            "test host timed out and was killed"
        );
        assert_eq!(
            ExitStatus::Signaled(11).crash_reason(),
            "test host was terminated by signal 11"
        );
        assert!(ExitStatus::Exited(0).crash_reason().contains("before this finished"));
    }

    #[test]
    fn test_outcome_exit_codes() {
        assert_eq!(RunOutcome::Passed.exit_code(), 0);
        assert_eq!(RunOutcome::Failed.exit_code(), 1);
        assert_eq!(RunOutcome::Crashed.exit_code(), 2);
    }
}
