// Run command - launch the test host and reconcile its output

use anyhow::Result;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use super::{build_reconciler, expected_tests, finish_report, resolve_config};
use crate::cli::Cli;
use crate::cli::args::{RunArgs, parse_env_pairs};
use crate::config::{self, Config};
use crate::execution::TestHostCommand;
use crate::report::console::EnvironmentInfo;
use crate::selector::{SELECT_ALL, SELECT_NONE};

/// Returns the process exit code for the run outcome
pub async fn run_tests(cli: &Cli, args: &RunArgs) -> Result<i32> {
    let loaded = resolve_config(cli)?;
    let config_loaded = loaded.is_some();
    let config = loaded.unwrap_or_default();

    let program = args
        .host
        .clone()
        .or_else(|| config.host.program.as_ref().map(PathBuf::from))
        .ok_or_else(|| {
            anyhow::anyhow!("No test host given; pass --host or set host.program in the config")
        })?;

    let timeout = resolve_timeout(args, config_loaded, &config);
    let only = args
        .report
        .only
        .clone()
        .unwrap_or_else(|| config.selection.only.clone());
    let invert = args.report.invert || config.selection.invert;

    let plan = expected_tests(&args.report, &only, invert)?;
    let selection = match &plan {
        Some(_) if only.trim() == SELECT_ALL && !invert => None,
        Some(tests) => Some(tests.clone()),
        None if invert => {
            anyhow::bail!("--invert needs --tests-file to know which tests to exclude")
        }
        None if only.trim() == SELECT_ALL => None,
        None if only.trim() == SELECT_NONE => Some(Vec::new()),
        None => Some(
            only.split(',')
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .map(str::to_string)
                .collect(),
        ),
    };

    let mut command = TestHostCommand::new(&program);
    command.arguments = config.host.args.clone();
    command.arguments.extend(args.host_args.iter().cloned());
    command.environment = config.environment.clone();
    command.selection = selection;
    command.timeout = Duration::from_secs(timeout);

    let overrides: BTreeMap<String, String> = parse_env_pairs(&args.env).into_iter().collect();

    let env_info = EnvironmentInfo {
        host: program.display().to_string(),
        selection: if invert {
            format!("not {}", only)
        } else {
            only.clone()
        },
        timeout_seconds: timeout,
    };
    let (reconciler, console) =
        build_reconciler(cli, &config, &args.report, plan.as_deref(), env_info)?;

    info!(
        "Running {} with timeout {}s",
        program.display(),
        command.timeout.as_secs()
    );
    let summary = command.run(reconciler, &overrides).await?;

    finish_report(&summary, console.as_deref(), args.report.summary_json)
}

/// CLI flag, then the configuration file, then the environment, then the default
fn resolve_timeout(args: &RunArgs, config_loaded: bool, config: &Config) -> u64 {
    match args.timeout {
        Some(timeout) => timeout,
        None if config_loaded => config.general.timeout,
        None => config::env_timeout(),
    }
}
