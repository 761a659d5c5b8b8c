// Event reconciler - turns the test host's raw stream into authoritative verdicts

use std::sync::Arc;
use tracing::{debug, info};

use crate::event::{Event, RawRecord, parse_line};
use crate::report::{BusError, Reporter, ReporterBus};
use crate::state::{
    Anomaly, AnomalyKind, ExitStatus, NodeId, RunMetrics, RunOutcome, RunSummary, StateTree,
    TestResult,
};
use crate::time::{Clock, SystemClock, format_seconds};

/// Single writer for one run's state tree.
///
/// Records are applied strictly in the order they are fed; every normalized event is published
/// to the reporter bus and appended to the run log before the next record is looked at.
pub struct EventReconciler {
    tree: StateTree,
    bus: ReporterBus,
    clock: Arc<dyn Clock>,
    log: Vec<Event>,
    started_at: f64,
    records_fed: u64,
}

impl EventReconciler {
    pub fn new(root_name: impl Into<String>) -> Self {
        Self::with_clock(root_name, Arc::new(SystemClock))
    }

    pub fn with_clock(root_name: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        let started_at = clock.now_seconds();
        Self {
            tree: StateTree::new(root_name, started_at),
            bus: ReporterBus::new(),
            clock,
            log: Vec::new(),
            started_at,
            records_fed: 0,
        }
    }

    /// Declare the tests the host is expected to run; see [`StateTree::seed`]
    pub fn with_plan(mut self, prefix: &[String], identifiers: &[String]) -> Self {
        self.tree.seed(prefix, identifiers);
        self
    }

    /// Attach a reporter; only allowed before the first record is fed
    pub fn attach(&mut self, reporter: Box<dyn Reporter>) -> Result<(), BusError> {
        self.bus.attach(reporter)
    }

    pub fn tree(&self) -> &StateTree {
        &self.tree
    }

    /// Events published so far, in publication order
    pub fn events(&self) -> &[Event] {
        &self.log
    }

    /// Apply one raw line from the host
    pub fn feed(&mut self, raw: &str) {
        self.bus.seal();
        self.records_fed += 1;

        match parse_line(raw) {
            Ok(record) => self.apply(record, raw),
            Err(err) => self.malformed(raw, &err.to_string()),
        }
    }

    /// Apply an already decoded record
    pub fn feed_record(&mut self, record: RawRecord) {
        self.bus.seal();
        self.records_fed += 1;
        let raw = format!("{:?}", record);
        self.apply(record, &raw);
    }

    fn malformed(&mut self, raw: &str, reason: &str) {
        self.tree.record_anomaly(Anomaly::new(
            AnomalyKind::MalformedRecord,
            format!("{}: {}", reason, raw.trim()),
        ));
        self.publish(Event::info(raw.trim_end_matches(['\r', '\n'])));
    }

    fn publish(&mut self, event: Event) {
        debug!("Publishing {:?} {:?}", event.kind, event.suite_path);
        self.bus.publish(&event);
        self.log.push(event);
    }

    /// Suite addressed by a test-level record; an empty path means the innermost running suite
    fn route_suite(&mut self, path: &[String], now: f64, out: &mut Vec<Event>) -> Option<NodeId> {
        if path.is_empty() {
            Some(self.tree.innermost_running_suite())
        } else {
            self.tree.open_suite_path(path, now, out)
        }
    }

    fn apply(&mut self, record: RawRecord, raw: &str) {
        let now = self.clock.now_seconds();
        let mut out = Vec::new();

        match record {
            RawRecord::BeginSuite { suite_path } => {
                let Some((name, parents)) = suite_path.split_last() else {
                    return self.malformed(raw, "suite record without a suite name");
                };
                if let Some(parent) = self.tree.open_suite_path(parents, now, &mut out) {
                    self.tree.begin_child_suite(parent, name, now, &mut out);
                }
            }
            RawRecord::EndSuite {
                suite_path,
                duration_seconds,
            } => {
                if suite_path.is_empty() {
                    return self.malformed(raw, "suite record without a suite name");
                }
                let suite = match self.tree.find_suite(&suite_path) {
                    Some(id) => Some(id),
                    None => self.tree.open_suite_path(&suite_path, now, &mut out),
                };
                if let Some(suite) = suite {
                    self.tree
                        .end_suite(suite, duration_seconds, now, &mut out);
                }
            }
            RawRecord::BeginTest { suite_path, test } => {
                if let Some(suite) = self.route_suite(&suite_path, now, &mut out) {
                    self.tree.begin_child_test(suite, &test, now, &mut out);
                }
            }
            RawRecord::EndTest {
                suite_path,
                test,
                succeeded,
                duration_seconds,
                exceptions,
                output,
            } => {
                let Some(suite) = self.route_suite(&suite_path, now, &mut out) else {
                    return self.publish_all(out);
                };
                let target = match self.tree.child_test(suite, &test) {
                    Some(id) => Some(id),
                    None => {
                        self.tree.record_anomaly(Anomaly::new(
                            AnomalyKind::MissingBegin,
                            format!("test '{}' ended without a begin event", test),
                        ));
                        self.tree.begin_child_test(suite, &test, now, &mut out)
                    }
                };
                if let Some(id) = target {
                    self.tree.end_test(
                        id,
                        succeeded,
                        exceptions,
                        duration_seconds,
                        output,
                        now,
                        &mut out,
                    );
                }
            }
            RawRecord::TestOutput {
                suite_path,
                test,
                output,
            } => {
                let target = match test {
                    Some(name) => {
                        let suite = if suite_path.is_empty() {
                            Some(self.tree.innermost_running_suite())
                        } else {
                            self.tree.find_suite(&suite_path)
                        };
                        suite.and_then(|s| self.tree.child_test(s, &name))
                    }
                    None => self.tree.running_test(),
                };
                match target {
                    Some(id) => self.tree.record_output(id, &output, &mut out),
                    None => out.push(Event::info(output)),
                }
            }
            RawRecord::Info { message } => out.push(Event::info(message)),
            RawRecord::Output(text) => match self.tree.running_test() {
                Some(id) => self.tree.record_output(id, &format!("{}\n", text), &mut out),
                None if text.trim().is_empty() => {}
                None => out.push(Event::info(text)),
            },
        }

        self.publish_all(out);
    }

    fn publish_all(&mut self, events: Vec<Event>) {
        for event in events {
            self.publish(event);
        }
    }

    /// Close the run once the host has exited.
    ///
    /// Consumes the reconciler so it can only happen once. Every state still open is resolved to
    /// `Crashed`; the run is `Crashed` when the host ended abnormally or anything had to be forced.
    pub fn finish(mut self, exit_status: ExitStatus) -> RunSummary {
        self.bus.seal();
        let now = self.clock.now_seconds();
        let reason = exit_status.crash_reason();

        let mut out = Vec::new();
        let forced = self
            .tree
            .reconcile_on_process_exit(&reason, now, &mut out);
        self.publish_all(out);

        let counts = self.tree.counts();
        let outcome = if exit_status.is_abnormal() || self.tree.forced_count() > 0 {
            RunOutcome::Crashed
        } else if counts.failed > 0 {
            RunOutcome::Failed
        } else {
            RunOutcome::Passed
        };

        info!(
            "Run finished ({}): {:?}, {} passed, {} failed, {} crashed, {} forced at exit",
            exit_status, outcome, counts.passed, counts.failed, counts.errored, forced
        );

        let tests = self
            .tree
            .tests()
            .into_iter()
            .filter_map(|id| {
                self.tree
                    .test(id)
                    .map(|state| TestResult::from_state(state, self.tree.path_of(id)))
            })
            .collect();

        RunSummary {
            outcome,
            exit_status,
            total: counts.total,
            passed: counts.passed,
            failed: counts.failed,
            crashed: counts.errored,
            tests,
            anomalies: self.tree.anomalies().to_vec(),
            reporter_faults: self.bus.faults().to_vec(),
            metrics: RunMetrics {
                started_at: format_seconds(self.started_at),
                finished_at: format_seconds(now),
                total_duration_seconds: (now - self.started_at).max(0.0),
                records_fed: self.records_fed,
                events_published: self.bus.published() as u64,
            },
            events: self.log,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use crate::state::{SuiteStatus, TestStatus};
    use crate::time::ManualClock;

    fn reconciler() -> (EventReconciler, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(100.0));
        (EventReconciler::with_clock("run", clock.clone()), clock)
    }

    #[test]
    fn test_durations_come_from_clock_when_host_omits_them() {
        let (mut rec, clock) = reconciler();
        rec.feed(r#"{"event":"begin-test-suite","suite":"S"}"#);
        rec.feed(r#"{"event":"begin-test","suite":"S","test":"t1"}"#);
        clock.advance(2.0);
        rec.feed(r#"{"event":"end-test","suite":"S","test":"t1","succeeded":true}"#);
        rec.feed(r#"{"event":"end-test-suite","suite":"S"}"#);

        let summary = rec.finish(ExitStatus::Exited(0));
        assert_eq!(summary.tests[0].duration_seconds, 2.0);
        assert_eq!(summary.metrics.total_duration_seconds, 2.0);
        assert_eq!(summary.outcome, RunOutcome::Passed);
    }

    #[test]
    fn test_plain_output_goes_to_running_test() {
        let (mut rec, _) = reconciler();
        rec.feed(r#"{"event":"begin-test-suite","suite":"S"}"#);
        rec.feed(r#"{"event":"begin-test","suite":"S","test":"t1"}"#);
        rec.feed("hello from t1");
        rec.feed(r#"{"event":"end-test","suite":"S","test":"t1","succeeded":true}"#);

        let output = rec.events().iter().find(|e| e.kind == EventKind::TestOutput);
        assert_eq!(
            output.and_then(|e| e.output_text.as_deref()),
            Some("hello from t1\n")
        );
        let end = rec.events().last().unwrap();
        assert_eq!(end.output_text.as_deref(), Some("hello from t1\n"));
    }

    #[test]
    fn test_plain_output_without_test_is_info() {
        let (mut rec, _) = reconciler();
        rec.feed("host starting up");
        rec.feed("   ");
        assert_eq!(rec.events().len(), 1);
        assert_eq!(rec.events()[0].kind, EventKind::Info);
    }

    #[test]
    fn test_begin_test_with_empty_path_uses_innermost_suite() {
        let (mut rec, _) = reconciler();
        rec.feed(r#"{"event":"begin-test-suite","suite":["Outer"]}"#);
        rec.feed(r#"{"event":"begin-test-suite","suite":["Outer","Inner"]}"#);
        rec.feed(r#"{"event":"begin-test","test":"Inner/t1"}"#);

        let begin = rec.events().last().unwrap();
        assert_eq!(begin.kind, EventKind::BeginTest);
        assert_eq!(begin.suite_path, vec!["Outer", "Inner"]);
        assert_eq!(begin.test_name.as_deref(), Some("Inner/t1"));
    }

    #[test]
    fn test_end_test_without_begin_synthesizes_begin() {
        let (mut rec, _) = reconciler();
        rec.feed(r#"{"event":"begin-test-suite","suite":"S"}"#);
        rec.feed(r#"{"event":"end-test","suite":"S","test":"t1","succeeded":false}"#);

        let kinds: Vec<_> = rec.events().iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![EventKind::BeginSuite, EventKind::BeginTest, EventKind::EndTest]
        );
        assert_eq!(rec.tree().anomalies()[0].kind, AnomalyKind::MissingBegin);
    }

    #[test]
    fn test_missing_parent_suite_is_begun_implicitly() {
        let (mut rec, _) = reconciler();
        rec.feed(r#"{"event":"begin-test","suite":["Outer","Inner"],"test":"t1"}"#);

        let kinds: Vec<_> = rec.events().iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![EventKind::BeginSuite, EventKind::BeginSuite, EventKind::BeginTest]
        );
        let inner = rec
            .tree()
            .find_suite(&["Outer".to_string(), "Inner".to_string()])
            .unwrap();
        assert_eq!(
            rec.tree().suite(inner).unwrap().status(),
            SuiteStatus::Running
        );
    }

    #[test]
    fn test_duplicate_end_is_not_published() {
        let (mut rec, _) = reconciler();
        rec.feed(r#"{"event":"begin-test","suite":"S","test":"t1"}"#);
        rec.feed(r#"{"event":"end-test","suite":"S","test":"t1","succeeded":true}"#);
        let before = rec.events().len();
        rec.feed(r#"{"event":"end-test","suite":"S","test":"t1","succeeded":false}"#);

        assert_eq!(rec.events().len(), before);
        let id = rec.tree().tests()[0];
        assert_eq!(rec.tree().test(id).unwrap().status(), TestStatus::Passed);
    }

    #[test]
    fn test_abnormal_exit_with_nothing_open_is_still_crashed() {
        let (rec, _) = reconciler();
        let summary = rec.finish(ExitStatus::Signaled(9));
        assert_eq!(summary.outcome, RunOutcome::Crashed);
        assert_eq!(summary.total, 0);
    }
}
