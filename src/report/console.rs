// Console reporter - pytest-style output

use std::io::Write;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::cli::ProgressMode;
use crate::event::{Event, EventKind};
use crate::state::{RunOutcome, RunSummary, TestStatus};

/// Environment information for report
#[derive(Debug, Clone)]
pub struct EnvironmentInfo {
    pub host: String,
    pub selection: String,
    pub timeout_seconds: u64,
}

/// Console reporter
pub struct ConsoleReporter {
    mode: ProgressMode,
    progress_bar: ProgressBar,
    env_info: EnvironmentInfo,
    dots_lock: Mutex<()>,
    dots_count: AtomicUsize,
}

impl ConsoleReporter {
    /// Create new console reporter; `total_tests` sizes the progress bar when known
    pub fn new(mode: ProgressMode, total_tests: Option<u64>, env_info: EnvironmentInfo) -> Self {
        let progress_bar = match (mode, total_tests) {
            (ProgressMode::Bar, Some(total)) => {
                let pb = ProgressBar::new(total);
                if let Ok(bar_style) =
                    ProgressStyle::default_bar().template("{bar:40} {pos}/{len} {msg}")
                {
                    pb.set_style(bar_style);
                }
                pb
            }
            (ProgressMode::Bar, None) => ProgressBar::new_spinner(),
            _ => ProgressBar::hidden(),
        };

        Self {
            mode,
            progress_bar,
            env_info,
            dots_lock: Mutex::new(()),
            dots_count: AtomicUsize::new(0),
        }
    }

    fn status_of(event: &Event) -> TestStatus {
        if event.crashed {
            TestStatus::Crashed
        } else if event.succeeded == Some(true) {
            TestStatus::Passed
        } else {
            TestStatus::Failed
        }
    }

    fn print_dot(&self, status: TestStatus) {
        let mark = match status {
            TestStatus::Passed => style(".").green(),
            TestStatus::Failed => style("F").red(),
            _ => style("C").magenta().bold(),
        };

        let _guard = self.dots_lock.lock();
        print!("{}", mark);
        let _ = std::io::stdout().flush();

        let count = self.dots_count.fetch_add(1, Ordering::Relaxed) + 1;
        if count >= 80 {
            println!();
            self.dots_count.store(0, Ordering::Relaxed);
        }
    }

    /// Print summary
    pub fn print_summary(&self, summary: &RunSummary) {
        self.progress_bar.finish_and_clear();
        if matches!(self.mode, ProgressMode::Dots) && self.dots_count.load(Ordering::Relaxed) > 0
        {
            println!();
        }

        let duration_ms = (summary.duration_seconds() * 1000.0).round() as u64;
        println!();
        println!(
            "════════════════════════════════════════════════════════════════════════════════"
        );
        match summary.outcome {
            RunOutcome::Passed => println!(
                "{} ({} passed in {}ms)",
                style("✅ PASSED").green().bold(),
                summary.passed,
                duration_ms
            ),
            RunOutcome::Failed => println!(
                "{} ({} failed, {} passed in {}ms)",
                style("❌ FAILED").red().bold(),
                summary.failed,
                summary.passed,
                duration_ms
            ),
            RunOutcome::Crashed => println!(
                "{} ({}; {} crashed, {} failed, {} passed in {}ms)",
                style("💥 CRASHED").magenta().bold(),
                summary.exit_status,
                summary.crashed,
                summary.failed,
                summary.passed,
                duration_ms
            ),
        }
        println!(
            "────────────────────────────────────────────────────────────────────────────────"
        );
        println!("📊 Execution Statistics:");
        println!("   • Total tests: {}", summary.total);
        println!("   • Passed: {}", summary.passed);
        println!("   • Failed: {}", summary.failed);
        println!("   • Crashed: {}", summary.crashed);
        println!("   • Duration: {}ms", duration_ms);
        println!("   • Started: {}", summary.metrics.started_at);
        println!("   • Test host: {}", summary.exit_status);

        let failed: Vec<_> = summary.tests_with_status(TestStatus::Failed).collect();
        if !failed.is_empty() {
            println!("❌ Failed Tests:");
            for result in failed {
                println!("   • {} ({:.3}s)", result.name, result.duration_seconds);
                for exception in &result.exceptions {
                    println!(
                        "      {}:{}: {}",
                        exception.file_path, exception.line_number, exception.reason
                    );
                }
            }
        }

        let crashed: Vec<_> = summary.tests_with_status(TestStatus::Crashed).collect();
        if !crashed.is_empty() {
            println!("💥 Crashed Tests:");
            for result in crashed {
                println!(
                    "   • {}: {}",
                    result.name,
                    result.error_message().unwrap_or("crashed")
                );
            }
        }

        println!("🔧 Environment:");
        println!("   • Host: {}", self.env_info.host);
        println!("   • Selection: {}", self.env_info.selection);
        println!("   • Timeout: {}s", self.env_info.timeout_seconds);

        if summary.anomalies.is_empty() && summary.reporter_faults.is_empty() {
            println!("✨ No anomalies detected");
        } else {
            println!(
                "⚠️  {} anomalies, {} reporter faults",
                summary.anomalies.len(),
                summary.reporter_faults.len()
            );
        }
        println!(
            "════════════════════════════════════════════════════════════════════════════════"
        );
        println!();
    }
}

impl super::Reporter for ConsoleReporter {
    fn on_event(&self, event: &Event) -> Result<()> {
        let name = event.test_name.as_deref().unwrap_or_default();
        match (event.kind, self.mode) {
            (EventKind::BeginTest, ProgressMode::Verbose) => {
                print!("{} ... ", name);
                let _ = std::io::stdout().flush();
            }
            (EventKind::BeginTest, ProgressMode::Bar) => {
                self.progress_bar.set_message(name.to_string());
            }
            (EventKind::EndTest, ProgressMode::Dots) => self.print_dot(Self::status_of(event)),
            (EventKind::EndTest, ProgressMode::Bar) => self.progress_bar.inc(1),
            (EventKind::EndTest, ProgressMode::Verbose) => {
                let duration = event.duration_seconds.unwrap_or_default();
                match Self::status_of(event) {
                    TestStatus::Passed => println!("{} ({:.3}s)", style("PASS").green(), duration),
                    TestStatus::Failed => {
                        let reason = event
                            .exceptions
                            .first()
                            .map(|e| e.reason.as_str())
                            .unwrap_or("failed");
                        println!("{}: {}", style("FAIL").red(), reason);
                    }
                    _ => {
                        let reason = event
                            .exceptions
                            .last()
                            .map(|e| e.reason.as_str())
                            .unwrap_or("crashed");
                        println!("{}: {}", style("CRASH").magenta().bold(), reason);
                    }
                }
            }
            (EventKind::BeginSuite, ProgressMode::Verbose) => {
                println!("{}", style(event.suite_path.join(" › ")).bold());
            }
            (EventKind::Info, ProgressMode::Verbose) => {
                println!(
                    "{} {}",
                    style("ℹ️ ").dim(),
                    event.output_text.as_deref().unwrap_or_default()
                );
            }
            _ => {}
        }
        Ok(())
    }
}
