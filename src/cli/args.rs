// CLI argument definitions using Clap

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Progress indicator modes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressMode {
    Dots,
    Bar,
    None,
    Verbose,
}

impl std::str::FromStr for ProgressMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dots" => Ok(Self::Dots),
            "bar" => Ok(Self::Bar),
            "none" => Ok(Self::None),
            "verbose" => Ok(Self::Verbose),
            _ => Ok(Self::Dots),
        }
    }
}

/// Run unit tests inside a test host and reconcile its event stream
#[derive(Parser, Debug)]
#[command(name = "hosttestify")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run unit tests in a test host process and report authoritative results", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose debug output
    #[arg(short = 'v', long, global = true, default_value_t = false)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(short = 'c', long, global = true, default_value_t = false)]
    pub no_color: bool,

    /// Read configuration from this file instead of the default locations
    #[arg(long, global = true, value_name = "CONFIG_FILE")]
    pub config_file: Option<PathBuf>,

    /// Show current configuration and exit
    #[arg(long, default_value_t = false)]
    pub config: bool,

    /// Create default configuration file
    #[arg(long, value_name = "CONFIG_FILE")]
    pub init_config: Option<PathBuf>,

    /// Install shell completion (bash, zsh, fish, elvish, powershell)
    #[arg(long, value_name = "SHELL_TYPE", value_parser = ["bash", "zsh", "fish", "elvish", "powershell"])]
    pub completion: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Launch the test host and report its results
    Run(RunArgs),

    /// Print the identifiers a selection spec keeps
    Select(SelectArgs),

    /// Reconcile a recorded test host log without launching anything
    Replay(ReplayArgs),
}

/// Options shared by commands that drive the reconciler
#[derive(Args, Debug, Clone, Default)]
pub struct ReportArgs {
    /// File listing the expected tests, one `Class/method` per line
    #[arg(long, value_name = "FILE")]
    pub tests_file: Option<PathBuf>,

    /// Tests to run: All, None, or comma-separated Class and Class/method tokens
    #[arg(long, value_name = "SPEC")]
    pub only: Option<String>,

    /// Run everything except the tests matched by --only
    #[arg(long, default_value_t = false)]
    pub invert: bool,

    /// Output streaming JSON events (for IDE integration)
    #[arg(long, default_value_t = false)]
    pub stream: bool,

    /// Progress indicator style (auto, dots, bar, verbose, none)
    #[arg(long)]
    pub progress: Option<String>,

    /// Print the run summary as JSON after the run
    #[arg(long, default_value_t = false)]
    pub summary_json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Test host executable (overrides the configuration file)
    #[arg(long, value_name = "PROGRAM")]
    pub host: Option<PathBuf>,

    /// Kill the test host after this many seconds
    #[arg(short = 't', long)]
    pub timeout: Option<u64>,

    /// Extra environment for the test host
    #[arg(short = 'e', long = "env", value_name = "KEY=VALUE")]
    pub env: Vec<String>,

    #[command(flatten)]
    pub report: ReportArgs,

    /// Arguments passed to the test host
    #[arg(last = true)]
    pub host_args: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct SelectArgs {
    /// File listing every known test, one `Class/method` per line
    #[arg(long, value_name = "FILE")]
    pub tests_file: PathBuf,

    /// Selection spec
    #[arg(long, default_value = "All")]
    pub only: String,

    /// Invert the selection
    #[arg(long, default_value_t = false)]
    pub invert: bool,

    /// Output format (text, json)
    #[arg(long, default_value = "text")]
    pub format: String,
}

#[derive(Args, Debug, Clone)]
pub struct ReplayArgs {
    /// Recorded test host output, one record per line
    #[arg(required = true)]
    pub log: PathBuf,

    /// Exit status the host ended with
    #[arg(long, default_value_t = 0, conflicts_with_all = ["signal", "timed_out"])]
    pub exit_code: i32,

    /// The host was killed by this signal
    #[arg(long)]
    pub signal: Option<i32>,

    /// The host was killed after timing out
    #[arg(long, default_value_t = false)]
    pub timed_out: bool,

    #[command(flatten)]
    pub report: ReportArgs,
}

/// Parse `KEY=VALUE` pairs, skipping malformed entries
pub fn parse_env_pairs(pairs: &[String]) -> Vec<(String, String)> {
    pairs
        .iter()
        .filter_map(|pair| {
            pair.split_once('=')
                .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        })
        .filter(|(k, _)| !k.is_empty())
        .collect()
}

impl ReportArgs {
    /// Resolve the progress mode, honoring `auto`
    pub fn progress_mode(&self, configured: &str, verbose: bool) -> ProgressMode {
        let progress = self.progress.as_deref().unwrap_or(configured);
        match progress {
            "auto" => {
                if verbose {
                    ProgressMode::Verbose
                } else {
                    ProgressMode::Dots
                }
            }
            other => other.parse().unwrap_or(ProgressMode::Dots),
        }
    }
}

impl SelectArgs {
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_with_host_args() {
        let cli = Cli::try_parse_from([
            "hosttestify",
            "run",
            "--host",
            "/bin/testhost",
            "--only",
            "ClassA",
            "-e",
            "A=1",
            "--",
            "--bundle",
            "Foo.xctest",
        ])
        .unwrap();

        match cli.command {
            Some(Commands::Run(args)) => {
                assert_eq!(args.host, Some(PathBuf::from("/bin/testhost")));
                assert_eq!(args.report.only.as_deref(), Some("ClassA"));
                assert_eq!(args.env, vec!["A=1"]);
                assert_eq!(args.host_args, vec!["--bundle", "Foo.xctest"]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_replay_exit_flags_conflict() {
        let result =
            Cli::try_parse_from(["hosttestify", "replay", "log.txt", "--exit-code", "1", "--timed-out"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_env_pairs() {
        let pairs = parse_env_pairs(&[
            "A=1".to_string(),
            "broken".to_string(),
            "B=x=y".to_string(),
            "=nokey".to_string(),
        ]);
        assert_eq!(
            pairs,
            vec![
                ("A".to_string(), "1".to_string()),
                ("B".to_string(), "x=y".to_string())
            ]
        );
    }

    #[test]
    fn test_progress_auto_follows_verbose() {
        let args = ReportArgs::default();
        assert_eq!(args.progress_mode("auto", true), ProgressMode::Verbose);
        assert_eq!(args.progress_mode("auto", false), ProgressMode::Dots);
        assert_eq!(args.progress_mode("bar", false), ProgressMode::Bar);
    }
}
