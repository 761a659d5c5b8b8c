// Commands module - handles CLI command execution

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

pub mod replay;
pub mod run;
pub mod select;

pub use replay::handle_replay;
pub use run::run_tests;
pub use select::handle_select;

use crate::cli::{Cli, ReportArgs};
use crate::config::Config;
use crate::execution::EventReconciler;
use crate::report::console::EnvironmentInfo;
use crate::report::{ConsoleReporter, StreamingJsonReporter};
use crate::selector;
use crate::state::RunSummary;

/// Handle shell completion
pub fn handle_completion(shell_type: &str) -> Result<()> {
    use clap::CommandFactory;
    use clap_complete::{Shell, generate};

    let shell = match shell_type.to_lowercase().as_str() {
        "bash" => Shell::Bash,
        "zsh" => Shell::Zsh,
        "fish" => Shell::Fish,
        "elvish" => Shell::Elvish,
        "powershell" => Shell::PowerShell,
        _ => {
            anyhow::bail!(
                "Unsupported shell: {}. Supported: bash, zsh, fish, elvish, powershell",
                shell_type
            );
        }
    };

    let mut cmd = crate::cli::Cli::command();
    let name = cmd.get_name().to_string();
    let mut stdout = std::io::stdout();

    generate(shell, &mut cmd, name, &mut stdout);

    Ok(())
}

/// Configuration from `--config-file`, or from the default locations; `None` when no file exists
pub fn resolve_config(cli: &Cli) -> Result<Option<Config>> {
    match &cli.config_file {
        Some(path) => Config::load_from_file(path).map(Some),
        None => Ok(Config::load()),
    }
}

/// Identifiers listed in a tests file
pub fn read_test_list(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read tests file: {}", path.display()))?;
    Ok(selector::parse_test_list(&content))
}

/// Tests expected to run, when a tests file names the full list
pub fn expected_tests(report: &ReportArgs, only: &str, invert: bool) -> Result<Option<Vec<String>>> {
    report
        .tests_file
        .as_deref()
        .map(|path| read_test_list(path).map(|all| selector::select(&all, only, invert)))
        .transpose()
}

/// Reconciler seeded with the plan, reporters attached per `report`.
///
/// Returns the console reporter separately so the caller can print the summary after the run.
pub fn build_reconciler(
    cli: &Cli,
    config: &Config,
    report: &ReportArgs,
    plan: Option<&[String]>,
    env_info: EnvironmentInfo,
) -> Result<(EventReconciler, Option<Arc<ConsoleReporter>>)> {
    let mut reconciler = EventReconciler::new(config.general.root_suite.clone());
    if let Some(plan) = plan {
        reconciler = reconciler.with_plan(&config.general.suite_prefix, plan);
    }

    if report.stream {
        reconciler.attach(Box::new(StreamingJsonReporter::stdout()))?;
        return Ok((reconciler, None));
    }

    if !config.progress.color {
        console::set_colors_enabled(false);
    }
    let mode = report.progress_mode(&config.progress.mode, cli.verbose);
    let console = Arc::new(ConsoleReporter::new(
        mode,
        plan.map(|p| p.len() as u64),
        env_info,
    ));
    reconciler.attach(Box::new(console.clone()))?;
    Ok((reconciler, Some(console)))
}

/// Print the end-of-run output and map the outcome to a process exit code
pub fn finish_report(
    summary: &RunSummary,
    console: Option<&ConsoleReporter>,
    summary_json: bool,
) -> Result<i32> {
    if let Some(console) = console {
        console.print_summary(summary);
    }
    if summary_json {
        let json =
            serde_json::to_string_pretty(summary).context("Failed to serialize run summary")?;
        println!("{}", json);
    }
    Ok(summary.outcome.exit_code())
}
