// Test host process - launch arguments, environment, and the output pump

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::EventReconciler;
use crate::selector::{SELECT_ALL, SELECT_NONE};
use crate::state::{ExitStatus, RunSummary};

/// Tells the host which wire format to emit
pub const ENV_EVENT_FORMAT: &str = "HOSTTESTIFY_EVENT_FORMAT";
pub const EVENT_FORMAT_JSON_LINES: &str = "json-lines";

pub const ARG_TEST_SELECTION: &str = "-TestSelection";
pub const ARG_INVERT_SCOPE: &str = "-TestInvertScope";

/// How long to keep reading after the host exits while a descendant still holds its pipes
pub const DEFAULT_LEAK_TIMEOUT: Duration = Duration::from_millis(100);

/// How to launch one test host process
#[derive(Debug, Clone)]
pub struct TestHostCommand {
    pub program: PathBuf,
    pub arguments: Vec<String>,
    pub environment: BTreeMap<String, String>,
    /// Identifiers to run; `None` runs everything the host knows about
    pub selection: Option<Vec<String>>,
    pub timeout: Duration,
    pub leak_timeout: Duration,
}

impl TestHostCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            arguments: Vec::new(),
            environment: BTreeMap::new(),
            selection: None,
            timeout: Duration::from_secs(crate::config::default_timeout()),
            leak_timeout: DEFAULT_LEAK_TIMEOUT,
        }
    }

    /// Configured arguments followed by the selection flags
    pub fn host_arguments(&self) -> Vec<String> {
        let selection = match &self.selection {
            Some(tests) if tests.is_empty() => SELECT_NONE.to_string(),
            Some(tests) => tests.join(","),
            None => SELECT_ALL.to_string(),
        };

        let mut args = self.arguments.clone();
        args.extend([
            ARG_TEST_SELECTION.to_string(),
            selection,
            ARG_INVERT_SCOPE.to_string(),
            "NO".to_string(),
        ]);
        args
    }

    /// Inherited environment, overlaid by the configured environment, then by `overrides`
    pub fn environment_with_overrides(
        &self,
        overrides: &BTreeMap<String, String>,
    ) -> BTreeMap<String, String> {
        let mut env: BTreeMap<String, String> = std::env::vars().collect();
        env.extend(self.environment.clone());
        env.extend(overrides.clone());
        env.insert(
            ENV_EVENT_FORMAT.to_string(),
            EVENT_FORMAT_JSON_LINES.to_string(),
        );
        env
    }

    /// Run the host to completion, feeding its combined stdout/stderr into `reconciler`.
    ///
    /// The run ends when the host exits, not when its pipes close: output still arriving after
    /// the exit is read for at most `leak_timeout`. The host is killed when the timeout elapses
    /// and the run is finished as timed out.
    pub async fn run(
        &self,
        mut reconciler: EventReconciler,
        overrides: &BTreeMap<String, String>,
    ) -> Result<RunSummary> {
        let mut child = Command::new(&self.program)
            .args(self.host_arguments())
            .env_clear()
            .envs(self.environment_with_overrides(overrides))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| {
                format!("Failed to spawn test host: {}", self.program.display())
            })?;

        info!(
            "Started test host {} (pid {:?})",
            self.program.display(),
            child.id()
        );

        let stdout = child
            .stdout
            .take()
            .context("Test host stdout was not captured")?;
        let stderr = child
            .stderr
            .take()
            .context("Test host stderr was not captured")?;

        let (tx, mut rx) = mpsc::unbounded_channel();
        pump_lines(stdout, tx.clone());
        pump_lines(stderr, tx);

        let deadline = tokio::time::sleep(self.timeout);
        tokio::pin!(deadline);

        let mut output_open = true;
        // Pending output is fed before the exit status is looked at
        let exited = loop {
            tokio::select! {
                biased;
                _ = &mut deadline => break None,
                line = rx.recv(), if output_open => match line {
                    Some(line) => reconciler.feed(&line),
                    None => output_open = false,
                },
                status = child.wait() => {
                    let status = status.context("Failed to wait for test host")?;
                    break Some(ExitStatus::from_process(status));
                }
            }
        };

        let exit_status = match exited {
            Some(status) => {
                if output_open {
                    self.drain_after_exit(&mut reconciler, &mut rx).await;
                }
                status
            }
            None => {
                warn!(
                    "Test host exceeded {}s timeout, killing it",
                    self.timeout.as_secs()
                );
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill test host: {}", e);
                }
                while let Ok(line) = rx.try_recv() {
                    reconciler.feed(&line);
                }
                ExitStatus::TimedOut
            }
        };

        debug!("Test host {}", exit_status);
        Ok(reconciler.finish(exit_status))
    }

    /// Read what the host wrote before exiting; stop once its pipes close or after the leak
    /// timeout when a descendant keeps them open
    async fn drain_after_exit(
        &self,
        reconciler: &mut EventReconciler,
        rx: &mut mpsc::UnboundedReceiver<String>,
    ) {
        let leak_deadline = tokio::time::sleep(self.leak_timeout);
        tokio::pin!(leak_deadline);
        loop {
            tokio::select! {
                line = rx.recv() => match line {
                    Some(line) => reconciler.feed(&line),
                    None => return,
                },
                _ = &mut leak_deadline => {
                    warn!(
                        "Test host exited but its output stayed open for {}ms; ignoring the rest",
                        self.leak_timeout.as_millis()
                    );
                    while let Ok(line) = rx.try_recv() {
                        reconciler.feed(&line);
                    }
                    return;
                }
            }
        }
    }
}

fn pump_lines<R>(reader: R, tx: mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("Failed to read test host output: {}", e);
                    break;
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_arguments_default_to_all() {
        let mut command = TestHostCommand::new("/usr/bin/host");
        command.arguments = vec!["--bundle".to_string(), "Foo.xctest".to_string()];
        assert_eq!(
            command.host_arguments(),
            vec![
                "--bundle",
                "Foo.xctest",
                "-TestSelection",
                "All",
                "-TestInvertScope",
                "NO"
            ]
        );
    }

    #[test]
    fn test_host_arguments_join_selection() {
        let mut command = TestHostCommand::new("host");
        command.selection = Some(vec!["A/x".to_string(), "B/y".to_string()]);
        let args = command.host_arguments();
        assert_eq!(args[1], "A/x,B/y");
    }

    #[test]
    fn test_host_arguments_empty_selection_is_none() {
        let mut command = TestHostCommand::new("host");
        command.selection = Some(Vec::new());
        assert_eq!(
            command.host_arguments(),
            vec!["-TestSelection", "None", "-TestInvertScope", "NO"]
        );
    }

    #[test]
    fn test_environment_overrides_win() {
        let mut command = TestHostCommand::new("host");
        command
            .environment
            .insert("HOSTTESTIFY_TEST_LAYER".to_string(), "config".to_string());
        command
            .environment
            .insert("HOSTTESTIFY_TEST_KEEP".to_string(), "kept".to_string());
        let overrides = BTreeMap::from([(
            "HOSTTESTIFY_TEST_LAYER".to_string(),
            "override".to_string(),
        )]);

        let env = command.environment_with_overrides(&overrides);
        assert_eq!(env["HOSTTESTIFY_TEST_LAYER"], "override");
        assert_eq!(env["HOSTTESTIFY_TEST_KEEP"], "kept");
        assert_eq!(env[ENV_EVENT_FORMAT], EVENT_FORMAT_JSON_LINES);
    }
}
