// Replay command - reconcile a recorded host log as if the host had just run

use anyhow::{Context, Result};
use tracing::info;

use super::{build_reconciler, expected_tests, finish_report, resolve_config};
use crate::cli::Cli;
use crate::cli::args::ReplayArgs;
use crate::report::console::EnvironmentInfo;
use crate::state::ExitStatus;

/// Returns the process exit code for the replayed outcome
pub fn handle_replay(cli: &Cli, args: &ReplayArgs) -> Result<i32> {
    let config = resolve_config(cli)?.unwrap_or_default();

    let content = std::fs::read_to_string(&args.log)
        .with_context(|| format!("Failed to read host log: {}", args.log.display()))?;

    let only = args
        .report
        .only
        .clone()
        .unwrap_or_else(|| config.selection.only.clone());
    let invert = args.report.invert || config.selection.invert;
    let plan = expected_tests(&args.report, &only, invert)?;

    let env_info = EnvironmentInfo {
        host: format!("replay of {}", args.log.display()),
        selection: only,
        timeout_seconds: 0,
    };
    let (mut reconciler, console) =
        build_reconciler(cli, &config, &args.report, plan.as_deref(), env_info)?;

    let mut lines = 0usize;
    for line in content.lines() {
        reconciler.feed(line);
        lines += 1;
    }
    info!("Replayed {} lines from {}", lines, args.log.display());

    let summary = reconciler.finish(exit_status(args));
    finish_report(&summary, console.as_deref(), args.report.summary_json)
}

fn exit_status(args: &ReplayArgs) -> ExitStatus {
    if args.timed_out {
        ExitStatus::TimedOut
    } else if let Some(signal) = args.signal {
        ExitStatus::Signaled(signal)
    } else {
        ExitStatus::Exited(args.exit_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Commands;
    use clap::Parser;

    fn replay_args(argv: &[&str]) -> ReplayArgs {
        let mut full = vec!["hosttestify", "replay", "host.log"];
        full.extend_from_slice(argv);
        match Cli::try_parse_from(full).unwrap().command {
            Some(Commands::Replay(args)) => args,
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_exit_status_from_flags() {
        assert_eq!(exit_status(&replay_args(&[])), ExitStatus::Exited(0));
        assert_eq!(
            exit_status(&replay_args(&["--exit-code", "1"])),
            ExitStatus::Exited(1)
        );
        assert_eq!(
            exit_status(&replay_args(&["--signal", "9"])),
            ExitStatus::Signaled(9)
        );
        assert_eq!(
            exit_status(&replay_args(&["--timed-out"])),
            ExitStatus::TimedOut
        );
    }
}
