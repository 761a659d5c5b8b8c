// State tree - arena of suite and test states indexed by NodeId
//
// Every mutation goes through this type so aggregate counters and the anomaly log stay in step
// with the state machines. Operations append the normalized events they imply to `out`; the
// reconciler owns publication.

use serde::Serialize;
use tracing::{debug, warn};

use super::{
    Anomaly, AnomalyKind, StateError, SuiteCounts, SuiteEventState, SuiteStatus, TestEventState,
    TestStatus,
};
use crate::event::{Event, TestException};

/// Index of a node in the [`StateTree`] arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(usize);

/// Borrowed view of one arena node
#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
    Suite(&'a SuiteEventState),
    Test(&'a TestEventState),
}

#[derive(Debug, Clone)]
enum Node {
    Suite(SuiteEventState),
    Test {
        state: TestEventState,
        parent: NodeId,
    },
}

#[derive(Debug, Clone)]
struct Slot {
    node: Node,
    declared: bool,
}

#[derive(Debug, Clone)]
pub struct StateTree {
    slots: Vec<Slot>,
    root: NodeId,
    planned: bool,
    last_begun_test: Option<NodeId>,
    anomalies: Vec<Anomaly>,
    forced: usize,
}

impl StateTree {
    /// Create a tree whose root suite is already running
    pub fn new(root_name: impl Into<String>, now: f64) -> Self {
        let mut root = SuiteEventState::new(root_name, None);
        let _ = root.begin(now);
        Self {
            slots: vec![Slot {
                node: Node::Suite(root),
                declared: true,
            }],
            root: NodeId(0),
            planned: false,
            last_begun_test: None,
            anomalies: Vec::new(),
            forced: 0,
        }
    }

    /// Declare the tests expected to run, grouped into one suite per class under `prefix`
    pub fn seed(&mut self, prefix: &[String], identifiers: &[String]) {
        self.planned = true;

        let mut container = self.root;
        for name in prefix {
            container = match self.child_suite(container, name) {
                Some(id) => id,
                None => self.add_suite(container, name, true),
            };
        }

        for identifier in identifiers {
            let Some((class, method)) = identifier.split_once('/') else {
                warn!("Ignoring plan entry without a method: {}", identifier);
                continue;
            };
            let suite = match self.child_suite(container, class) {
                Some(id) => id,
                None => self.add_suite(container, class, true),
            };
            if self.child_test(suite, identifier).is_none() {
                self.add_test(suite, TestEventState::new(class, method), true);
            }
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> Option<NodeRef<'_>> {
        self.slots.get(id.0).map(|slot| match &slot.node {
            Node::Suite(suite) => NodeRef::Suite(suite),
            Node::Test { state, .. } => NodeRef::Test(state),
        })
    }

    pub fn suite(&self, id: NodeId) -> Option<&SuiteEventState> {
        match self.slots.get(id.0).map(|slot| &slot.node) {
            Some(Node::Suite(suite)) => Some(suite),
            _ => None,
        }
    }

    pub fn test(&self, id: NodeId) -> Option<&TestEventState> {
        match self.slots.get(id.0).map(|slot| &slot.node) {
            Some(Node::Test { state, .. }) => Some(state),
            _ => None,
        }
    }

    pub fn root_suite(&self) -> &SuiteEventState {
        match &self.slots[self.root.0].node {
            Node::Suite(suite) => suite,
            Node::Test { .. } => unreachable!("root is always a suite"),
        }
    }

    pub fn counts(&self) -> SuiteCounts {
        self.root_suite().counts()
    }

    pub fn anomalies(&self) -> &[Anomaly] {
        &self.anomalies
    }

    /// Number of states closed as `Crashed` by reconciliation so far
    pub fn forced_count(&self) -> usize {
        self.forced
    }

    pub fn is_planned(&self) -> bool {
        self.planned
    }

    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        match &self.slots.get(id.0)?.node {
            Node::Suite(suite) => suite.parent(),
            Node::Test { parent, .. } => Some(*parent),
        }
    }

    /// Suite names from below the root down to `id`; tests report their suite's path
    pub fn path_of(&self, id: NodeId) -> Vec<String> {
        let mut cursor = match self.node(id) {
            Some(NodeRef::Test(_)) => self.parent_of(id),
            Some(NodeRef::Suite(_)) => Some(id),
            None => None,
        };
        let mut path = Vec::new();
        while let Some(current) = cursor {
            if current == self.root {
                break;
            }
            if let Some(suite) = self.suite(current) {
                path.push(suite.name().to_string());
            }
            cursor = self.parent_of(current);
        }
        path.reverse();
        path
    }

    pub fn child_suite(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        let suite = self.suite(parent)?;
        suite
            .children()
            .iter()
            .copied()
            .find(|child| matches!(self.suite(*child), Some(s) if s.name() == name))
    }

    pub fn child_test(&self, suite: NodeId, name: &str) -> Option<NodeId> {
        let parent = self.suite(suite)?;
        parent
            .children()
            .iter()
            .copied()
            .find(|child| matches!(self.test(*child), Some(t) if t.answers_to(name)))
    }

    /// Look up a suite by path without creating anything
    pub fn find_suite(&self, path: &[String]) -> Option<NodeId> {
        path.iter()
            .try_fold(self.root, |parent, name| self.child_suite(parent, name))
    }

    /// Deepest running suite, following the most recently declared running child at each level
    pub fn innermost_running_suite(&self) -> NodeId {
        let mut current = self.root;
        while let Some(next) = self.suite(current).and_then(|suite| {
            suite.children().iter().rev().copied().find(|child| {
                matches!(self.suite(*child), Some(s) if s.status() == SuiteStatus::Running)
            })
        }) {
            current = next;
        }
        current
    }

    /// The most recently begun test, if it is still running
    pub fn running_test(&self) -> Option<NodeId> {
        self.last_begun_test
            .filter(|id| matches!(self.test(*id), Some(t) if t.status() == TestStatus::Running))
    }

    /// Every test in declaration order
    pub fn tests(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_tests(self.root, &mut out);
        out
    }

    fn collect_tests(&self, id: NodeId, out: &mut Vec<NodeId>) {
        match self.node(id) {
            Some(NodeRef::Test(_)) => out.push(id),
            Some(NodeRef::Suite(suite)) => {
                for child in suite.children() {
                    self.collect_tests(*child, out);
                }
            }
            None => {}
        }
    }

    pub(crate) fn record_anomaly(&mut self, anomaly: Anomaly) {
        warn!("{:?}: {}", anomaly.kind, anomaly.message);
        self.anomalies.push(anomaly);
    }

    fn reject(&mut self, err: StateError) {
        self.record_anomaly(err.into());
    }

    fn suite_mut(&mut self, id: NodeId) -> Option<&mut SuiteEventState> {
        match self.slots.get_mut(id.0).map(|slot| &mut slot.node) {
            Some(Node::Suite(suite)) => Some(suite),
            _ => None,
        }
    }

    fn test_mut(&mut self, id: NodeId) -> Option<&mut TestEventState> {
        match self.slots.get_mut(id.0).map(|slot| &mut slot.node) {
            Some(Node::Test { state, .. }) => Some(state),
            _ => None,
        }
    }

    fn add_suite(&mut self, parent: NodeId, name: &str, declared: bool) -> NodeId {
        let id = NodeId(self.slots.len());
        self.slots.push(Slot {
            node: Node::Suite(SuiteEventState::new(name, Some(parent))),
            declared,
        });
        if let Some(suite) = self.suite_mut(parent) {
            suite.children.push(id);
        }
        id
    }

    fn add_test(&mut self, parent: NodeId, state: TestEventState, declared: bool) -> NodeId {
        let id = NodeId(self.slots.len());
        self.slots.push(Slot {
            node: Node::Test { state, parent },
            declared,
        });
        if let Some(suite) = self.suite_mut(parent) {
            suite.children.push(id);
        }
        self.propagate(parent, |counts| counts.total += 1);
        id
    }

    /// Apply `update` to `from` and each of its ancestors
    fn propagate(&mut self, from: NodeId, update: impl Fn(&mut SuiteCounts)) {
        let mut cursor = Some(from);
        while let Some(id) = cursor {
            cursor = match self.suite_mut(id) {
                Some(suite) => {
                    update(&mut suite.counts);
                    suite.parent
                }
                None => None,
            };
        }
    }

    fn status_is_not_started(&self, id: NodeId) -> bool {
        match self.node(id) {
            Some(NodeRef::Suite(suite)) => suite.status() == SuiteStatus::NotStarted,
            Some(NodeRef::Test(test)) => test.status() == TestStatus::NotStarted,
            None => false,
        }
    }

    fn display_name(&self, id: NodeId) -> String {
        match self.node(id) {
            Some(NodeRef::Suite(suite)) => suite.name().to_string(),
            Some(NodeRef::Test(test)) => test.identifier(),
            None => String::new(),
        }
    }

    /// First declared child that has not started yet.
    ///
    /// Statuses never return to `NotStarted`, so the suite's cursor only moves forward and the
    /// scan is amortized over every begin in that suite.
    fn next_expected(&mut self, parent: NodeId) -> Option<NodeId> {
        let suite = self.suite(parent)?;
        let mut cursor = suite.expected_cursor;
        let expected = loop {
            let Some(&child) = suite.children().get(cursor) else {
                break None;
            };
            if self.slots[child.0].declared && self.status_is_not_started(child) {
                break Some(child);
            }
            cursor += 1;
        };
        if let Some(suite) = self.suite_mut(parent) {
            suite.expected_cursor = cursor;
        }
        expected
    }

    fn check_order(&mut self, parent: NodeId, child: NodeId) {
        if !self.status_is_not_started(child) {
            return;
        }
        if let Some(expected) = self.next_expected(parent)
            && expected != child
        {
            let message = format!(
                "'{}' began in '{}' ahead of '{}'",
                self.display_name(child),
                self.display_name(parent),
                self.display_name(expected)
            );
            self.record_anomaly(Anomaly::new(AnomalyKind::OutOfOrder, message));
        }
    }

    fn note_undeclared(&mut self, parent: NodeId, name: &str) {
        if self.is_planned() {
            let message = format!(
                "'{}' is not declared in '{}'",
                name,
                self.display_name(parent)
            );
            self.record_anomaly(Anomaly::new(AnomalyKind::Undeclared, message));
        }
    }

    /// Begin the named child suite of `parent`, creating it when it was not declared.
    ///
    /// Returns `None` when the suite refuses to begin (it already started).
    pub fn begin_child_suite(
        &mut self,
        parent: NodeId,
        name: &str,
        now: f64,
        out: &mut Vec<Event>,
    ) -> Option<NodeId> {
        let child = match self.child_suite(parent, name) {
            Some(id) => {
                self.check_order(parent, id);
                id
            }
            None => {
                self.note_undeclared(parent, name);
                self.add_suite(parent, name, false)
            }
        };

        let result = self.suite_mut(child)?.begin(now);
        match result {
            Ok(()) => {
                debug!("Suite began: {}", name);
                out.push(Event::begin_suite(self.path_of(child)));
                Some(child)
            }
            Err(err) => {
                self.reject(err);
                None
            }
        }
    }

    /// Begin the named test in `suite`, creating it when it was not declared
    pub fn begin_child_test(
        &mut self,
        suite: NodeId,
        name: &str,
        now: f64,
        out: &mut Vec<Event>,
    ) -> Option<NodeId> {
        let child = match self.child_test(suite, name) {
            Some(id) => {
                self.check_order(suite, id);
                id
            }
            None => {
                self.note_undeclared(suite, name);
                let class = self
                    .suite(suite)
                    .map(|s| s.name().to_string())
                    .unwrap_or_default();
                self.add_test(suite, TestEventState::from_name(name, &class), false)
            }
        };

        let result = self.test_mut(child)?.begin(now);
        match result {
            Ok(()) => {
                self.last_begun_test = Some(child);
                let identifier = self.display_name(child);
                debug!("Test began: {}", identifier);
                out.push(Event::begin_test(self.path_of(child), identifier));
                Some(child)
            }
            Err(err) => {
                self.reject(err);
                None
            }
        }
    }

    /// Walk `path`, implicitly beginning suites whose begin event never arrived.
    ///
    /// Returns `None` when a suite on the path is already closed.
    pub fn open_suite_path(
        &mut self,
        path: &[String],
        now: f64,
        out: &mut Vec<Event>,
    ) -> Option<NodeId> {
        let mut current = self.root;
        for name in path {
            let existing = self.child_suite(current, name);
            current = match existing.and_then(|id| self.suite(id).map(|s| (id, s.status()))) {
                Some((id, SuiteStatus::Running)) => id,
                Some((_, status)) if status.is_terminal() => {
                    let message = format!("event routed to suite '{}' after it {}", name, status);
                    self.record_anomaly(Anomaly::new(AnomalyKind::InvalidTransition, message));
                    return None;
                }
                _ => {
                    let message = format!("suite '{}' began without a begin event", name);
                    self.record_anomaly(Anomaly::new(AnomalyKind::MissingBegin, message));
                    self.begin_child_suite(current, name, now, out)?
                }
            };
        }
        Some(current)
    }

    /// Record streamed output; output for a test that is not running is kept as stray output
    pub fn record_output(&mut self, test: NodeId, text: &str, out: &mut Vec<Event>) {
        let Some(result) = self.test_mut(test).map(|state| state.record_output(text)) else {
            return;
        };
        match result {
            Ok(()) => out.push(Event::test_output(
                self.path_of(test),
                self.display_name(test),
                text,
            )),
            Err(err) => self.reject(err),
        }
    }

    /// Close a test with the host's verdict, synthesizing its begin when it never arrived
    #[allow(clippy::too_many_arguments)]
    pub fn end_test(
        &mut self,
        test: NodeId,
        succeeded: bool,
        exceptions: Vec<TestException>,
        duration: Option<f64>,
        output: Option<String>,
        now: f64,
        out: &mut Vec<Event>,
    ) {
        if self.status_is_not_started(test) {
            let identifier = self.display_name(test);
            self.record_anomaly(Anomaly::new(
                AnomalyKind::MissingBegin,
                format!("test '{}' ended without a begin event", identifier),
            ));
            if let Some(state) = self.test_mut(test)
                && state.begin(now).is_ok()
            {
                self.last_begun_test = Some(test);
                out.push(Event::begin_test(self.path_of(test), identifier));
            }
        }

        let path = self.path_of(test);
        let Some(state) = self.test_mut(test) else {
            return;
        };
        match state.end(succeeded, exceptions, duration, now) {
            Ok(status) => {
                state.adopt_final_output(output);
                let event = end_test_event(state, path);
                if let Some(parent) = self.parent_of(test) {
                    self.propagate(parent, |counts| counts.record(status));
                }
                debug!("Test ended: {} ({})", self.display_name(test), status);
                out.push(event);
            }
            Err(err) => self.reject(err),
        }
    }

    /// Close a suite; children that are not terminal are crashed first
    pub fn end_suite(
        &mut self,
        suite: NodeId,
        duration: Option<f64>,
        now: f64,
        out: &mut Vec<Event>,
    ) {
        let Some(status) = self.suite(suite).map(|s| s.status()) else {
            return;
        };
        match status {
            SuiteStatus::NotStarted => {
                let name = self.display_name(suite);
                self.record_anomaly(Anomaly::new(
                    AnomalyKind::MissingBegin,
                    format!("suite '{}' ended without a begin event", name),
                ));
                if let Some(state) = self.suite_mut(suite)
                    && state.begin(now).is_ok()
                {
                    out.push(Event::begin_suite(self.path_of(suite)));
                }
            }
            SuiteStatus::Running => {}
            SuiteStatus::Finished | SuiteStatus::Crashed => {
                let name = self.display_name(suite);
                self.reject(StateError::SuiteNotRunning { name, status });
                return;
            }
        }

        let children = self
            .suite(suite)
            .map(|s| s.children().to_vec())
            .unwrap_or_default();
        for child in children {
            self.close_crashed(child, "test did not finish before its suite ended", now, out);
        }

        let Some(state) = self.suite_mut(suite) else {
            return;
        };
        if let Err(err) = state.finish(now) {
            self.reject(err);
            return;
        }
        let succeeded = state.counts().succeeded();
        let duration = duration.unwrap_or_else(|| state.duration_seconds());
        debug!("Suite ended: {}", state.name());
        out.push(Event::end_suite(self.path_of(suite), succeeded, duration));
    }

    /// Force every open or expected-but-unstarted state below the root to `Crashed`, then close
    /// the root. Returns the number of states forced during this sweep.
    pub fn reconcile_on_process_exit(
        &mut self,
        reason: &str,
        now: f64,
        out: &mut Vec<Event>,
    ) -> usize {
        let before = self.forced;
        let children = self.root_suite().children().to_vec();
        for child in children {
            self.close_crashed(child, reason, now, out);
        }
        let forced = self.forced - before;

        let root = self.root;
        if let Some(state) = self.suite_mut(root)
            && state.status() == SuiteStatus::Running
        {
            if forced > 0 {
                state.crash(now);
            } else {
                let _ = state.finish(now);
            }
        }
        forced
    }

    fn note_forced(&mut self, id: NodeId, reason: &str) {
        self.forced += 1;
        let message = format!("'{}' crashed: {}", self.display_name(id), reason);
        self.record_anomaly(Anomaly::new(AnomalyKind::ForcedCrash, message));
    }

    fn close_crashed(&mut self, id: NodeId, reason: &str, now: f64, out: &mut Vec<Event>) {
        match self.node(id) {
            Some(NodeRef::Test(test)) => {
                let status = test.status();
                if status.is_terminal() {
                    return;
                }
                let path = self.path_of(id);
                let Some(state) = self.test_mut(id) else {
                    return;
                };
                if status == TestStatus::NotStarted {
                    out.push(Event::begin_test(path.clone(), state.identifier()));
                    if let Err(err) = state.abandon(reason) {
                        self.reject(err);
                        return;
                    }
                } else if let Err(err) = state.force_crash(reason, now) {
                    self.reject(err);
                    return;
                }
                let event = end_test_event(state, path).into_crashed();
                if let Some(parent) = self.parent_of(id) {
                    self.propagate(parent, |counts| counts.record(TestStatus::Crashed));
                }
                self.note_forced(id, reason);
                out.push(event);
            }
            Some(NodeRef::Suite(suite)) => {
                let status = suite.status();
                if status.is_terminal() {
                    return;
                }
                let children = suite.children().to_vec();
                let path = self.path_of(id);
                if status == SuiteStatus::NotStarted {
                    out.push(Event::begin_suite(path.clone()));
                }
                for child in children {
                    self.close_crashed(child, reason, now, out);
                }
                let Some(state) = self.suite_mut(id) else {
                    return;
                };
                state.crash(now);
                let duration = state.duration_seconds();
                self.note_forced(id, reason);
                out.push(Event::end_suite(path, false, duration).into_crashed());
            }
            None => {}
        }
    }
}

fn end_test_event(state: &TestEventState, suite_path: Vec<String>) -> Event {
    let output = (!state.output().is_empty()).then(|| state.output().to_string());
    Event::end_test(
        suite_path,
        state.identifier(),
        state.status() == TestStatus::Passed,
        state.duration_seconds().unwrap_or_default(),
        state.exceptions().to_vec(),
        output,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(path: &[&str]) -> Vec<String> {
        path.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_seed_declares_class_suites_in_order() {
        let mut tree = StateTree::new("run", 0.0);
        tree.seed(
            &names(&["All tests"]),
            &names(&["A/x", "A/y", "B/z", "A/x"]),
        );

        let container = tree.find_suite(&names(&["All tests"])).unwrap();
        let classes: Vec<&str> = tree
            .suite(container)
            .unwrap()
            .children()
            .iter()
            .map(|id| tree.suite(*id).unwrap().name())
            .collect();
        assert_eq!(classes, vec!["A", "B"]);
        assert_eq!(tree.counts().total, 3);
        assert_eq!(tree.tests().len(), 3);
    }

    #[test]
    fn test_counts_propagate_to_every_ancestor() {
        let mut tree = StateTree::new("run", 0.0);
        let mut out = Vec::new();
        let outer = tree.begin_child_suite(tree.root(), "Outer", 0.0, &mut out).unwrap();
        let inner = tree.begin_child_suite(outer, "Inner", 0.0, &mut out).unwrap();
        let test = tree.begin_child_test(inner, "t1", 0.0, &mut out).unwrap();
        tree.end_test(test, false, Vec::new(), None, None, 1.0, &mut out);

        for id in [inner, outer, tree.root()] {
            let counts = tree.suite(id).unwrap().counts();
            assert_eq!(counts.total, 1);
            assert_eq!(counts.failed, 1);
        }
        assert_eq!(tree.path_of(test), names(&["Outer", "Inner"]));
    }

    #[test]
    fn test_out_of_order_begin_is_tolerated() {
        let mut tree = StateTree::new("run", 0.0);
        tree.seed(&[], &names(&["A/x", "A/y"]));
        let mut out = Vec::new();
        let suite = tree.begin_child_suite(tree.root(), "A", 0.0, &mut out).unwrap();
        let y = tree.begin_child_test(suite, "y", 0.0, &mut out).unwrap();

        assert_eq!(tree.test(y).unwrap().status(), TestStatus::Running);
        assert_eq!(tree.anomalies().len(), 1);
        assert_eq!(tree.anomalies()[0].kind, AnomalyKind::OutOfOrder);
    }

    #[test]
    fn test_end_suite_crashes_running_children_then_finishes() {
        let mut tree = StateTree::new("run", 0.0);
        let mut out = Vec::new();
        let suite = tree.begin_child_suite(tree.root(), "S", 0.0, &mut out).unwrap();
        let test = tree.begin_child_test(suite, "t1", 0.0, &mut out).unwrap();
        out.clear();

        tree.end_suite(suite, None, 2.0, &mut out);

        assert_eq!(tree.test(test).unwrap().status(), TestStatus::Crashed);
        assert_eq!(tree.suite(suite).unwrap().status(), SuiteStatus::Finished);
        assert_eq!(out.len(), 2);
        assert!(out[0].crashed);
        assert_eq!(out[1].succeeded, Some(false));
        assert!(!out[1].crashed);
    }

    #[test]
    fn test_reconcile_closes_open_suite_after_passed_test() {
        let mut tree = StateTree::new("run", 0.0);
        let mut out = Vec::new();
        let suite = tree.begin_child_suite(tree.root(), "S", 0.0, &mut out).unwrap();
        let test = tree.begin_child_test(suite, "t1", 0.0, &mut out).unwrap();
        tree.end_test(test, true, Vec::new(), None, None, 1.0, &mut out);
        out.clear();

        let forced = tree.reconcile_on_process_exit("test host exited", 2.0, &mut out);

        assert_eq!(forced, 1);
        assert_eq!(tree.test(test).unwrap().status(), TestStatus::Passed);
        assert_eq!(tree.suite(suite).unwrap().status(), SuiteStatus::Crashed);
        assert_eq!(tree.root_suite().status(), SuiteStatus::Crashed);
        assert_eq!(out.len(), 1);
        assert!(out[0].crashed);
    }

    #[test]
    fn test_reconcile_abandons_expected_tests() {
        let mut tree = StateTree::new("run", 0.0);
        tree.seed(&[], &names(&["A/x"]));
        let mut out = Vec::new();

        tree.reconcile_on_process_exit("test host exited", 1.0, &mut out);

        let kinds: Vec<_> = out.iter().map(|e| e.kind).collect();
        use crate::event::EventKind::*;
        assert_eq!(kinds, vec![BeginSuite, BeginTest, EndTest, EndSuite]);
        assert_eq!(tree.counts().errored, 1);
        assert_eq!(tree.counts().total, tree.counts().terminal());
    }

    #[test]
    fn test_open_suite_path_refuses_closed_suite() {
        let mut tree = StateTree::new("run", 0.0);
        let mut out = Vec::new();
        let suite = tree.begin_child_suite(tree.root(), "S", 0.0, &mut out).unwrap();
        tree.end_suite(suite, None, 1.0, &mut out);

        assert!(tree.open_suite_path(&names(&["S"]), 2.0, &mut out).is_none());
        assert_eq!(
            tree.anomalies().last().unwrap().kind,
            AnomalyKind::InvalidTransition
        );
    }

    #[test]
    fn test_innermost_running_suite() {
        let mut tree = StateTree::new("run", 0.0);
        let mut out = Vec::new();
        assert_eq!(tree.innermost_running_suite(), tree.root());
        let outer = tree.begin_child_suite(tree.root(), "Outer", 0.0, &mut out).unwrap();
        let inner = tree.begin_child_suite(outer, "Inner", 0.0, &mut out).unwrap();
        assert_eq!(tree.innermost_running_suite(), inner);
        tree.end_suite(inner, None, 1.0, &mut out);
        assert_eq!(tree.innermost_running_suite(), outer);
    }

    #[test]
    fn test_expected_cursor_skips_started_children() {
        let mut tree = StateTree::new("run", 0.0);
        tree.seed(&[], &names(&["A/x", "A/y", "A/z"]));
        let mut out = Vec::new();
        let suite = tree.begin_child_suite(tree.root(), "A", 0.0, &mut out).unwrap();

        tree.begin_child_test(suite, "y", 0.0, &mut out);
        assert_eq!(tree.anomalies().len(), 1);
        assert_eq!(tree.suite(suite).unwrap().expected_cursor, 0);

        let x = tree.begin_child_test(suite, "x", 0.0, &mut out).unwrap();
        tree.end_test(x, true, Vec::new(), None, None, 1.0, &mut out);
        tree.begin_child_test(suite, "z", 1.0, &mut out);

        assert_eq!(tree.anomalies().len(), 1);
        assert_eq!(tree.suite(suite).unwrap().expected_cursor, 2);
    }

    #[test]
    fn test_undeclared_only_reported_when_planned() {
        let mut tree = StateTree::new("run", 0.0);
        let mut out = Vec::new();
        assert!(!tree.is_planned());
        tree.begin_child_suite(tree.root(), "Adhoc", 0.0, &mut out);
        assert!(tree.anomalies().is_empty());

        tree.seed(&[], &names(&["A/x"]));
        assert!(tree.is_planned());
        tree.begin_child_suite(tree.root(), "Other", 0.0, &mut out);
        assert_eq!(tree.anomalies().len(), 1);
        assert_eq!(tree.anomalies()[0].kind, AnomalyKind::Undeclared);
    }
}
