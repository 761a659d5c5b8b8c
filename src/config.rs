// Configuration file handling

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub host: HostConfig,

    #[serde(default)]
    pub selection: SelectionConfig,

    #[serde(default)]
    pub progress: ProgressConfig,

    /// Extra variables for the test host environment
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Test host timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Name of the synthetic suite that owns the whole run
    #[serde(default = "default_root_suite")]
    pub root_suite: String,

    /// Suites the host nests class suites under (e.g. ["All tests", "Foo.xctest"])
    #[serde(default)]
    pub suite_prefix: Vec<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            root_suite: default_root_suite(),
            suite_prefix: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HostConfig {
    /// Test host executable
    #[serde(default)]
    pub program: Option<String>,

    /// Arguments passed before the selection flags
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// `All`, `None`, or comma-separated `Class` / `Class/method` tokens
    #[serde(default = "default_only")]
    pub only: String,

    #[serde(default)]
    pub invert: bool,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            only: default_only(),
            invert: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressConfig {
    /// Progress indicator mode
    #[serde(default = "default_progress")]
    pub mode: String,

    /// Enable colored output
    #[serde(default = "default_color")]
    pub color: bool,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            mode: default_progress(),
            color: default_color(),
        }
    }
}

// Default values
pub const ENV_HOSTTESTIFY_TIMEOUT: &str = "HOSTTESTIFY_TIMEOUT";
pub const CONFIG_FILE_NAME: &str = ".hosttestifyrc.toml";

pub fn default_timeout() -> u64 {
    300
}

pub fn default_root_suite() -> String {
    String::from("All tests")
}

fn default_only() -> String {
    String::from(crate::selector::SELECT_ALL)
}

fn default_progress() -> String {
    String::from("auto")
}

fn default_color() -> bool {
    true
}

/// Timeout from the environment, falling back to the built-in default
pub fn env_timeout() -> u64 {
    std::env::var(ENV_HOSTTESTIFY_TIMEOUT)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or_else(default_timeout)
}

impl Config {
    /// Load configuration from default locations
    pub fn load() -> Option<Self> {
        // Check locations in order:
        // 1. .hosttestifyrc.toml (current directory)
        // 2. ~/.hosttestifyrc.toml (home directory)

        let mut paths = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            paths.push(cwd.join(CONFIG_FILE_NAME));
        }
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(CONFIG_FILE_NAME));
        }

        paths
            .iter()
            .find(|path| path.exists())
            .and_then(|path| match Self::load_from_file(path) {
                Ok(config) => Some(config),
                Err(e) => {
                    tracing::warn!("Ignoring configuration file: {:#}", e);
                    None
                }
            })
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Parse configuration from TOML string
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Generate default configuration as TOML
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml = r#"
[general]
timeout = 60
root_suite = "Run"
suite_prefix = ["All tests", "Foo.xctest"]

[host]
program = "/usr/bin/testhost"
args = ["--bundle", "Foo.xctest"]

[selection]
only = "ClassA,ClassB/testBar"
invert = true

[progress]
mode = "bar"
color = false

[environment]
DYLD_LIBRARY_PATH = "/opt/lib"
"#;

        let config = Config::parse(toml).expect("Failed to parse config");
        assert_eq!(config.general.timeout, 60);
        assert_eq!(config.general.root_suite, "Run");
        assert_eq!(config.general.suite_prefix, vec!["All tests", "Foo.xctest"]);
        assert_eq!(config.host.program.as_deref(), Some("/usr/bin/testhost"));
        assert_eq!(config.host.args.len(), 2);
        assert_eq!(config.selection.only, "ClassA,ClassB/testBar");
        assert!(config.selection.invert);
        assert_eq!(config.progress.mode, "bar");
        assert!(!config.progress.color);
        assert_eq!(config.environment["DYLD_LIBRARY_PATH"], "/opt/lib");
    }

    #[test]
    fn test_parse_rejects_wrong_types() {
        assert!(Config::parse("[general]\ntimeout = \"soon\"\n").is_err());
    }

    #[test]
    fn test_default_round_trips_through_toml() {
        let text = Config::default().to_toml();
        let parsed = Config::parse(&text).unwrap();
        assert_eq!(parsed.general.timeout, default_timeout());
        assert_eq!(parsed.selection.only, "All");
    }
}
