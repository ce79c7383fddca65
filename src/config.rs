// Configuration module for symscan
// Reads from environment variables with sensible defaults

use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

/// Global configuration instance
static CONFIG: OnceLock<Config> = OnceLock::new();

/// Directory names skipped anywhere in a scanned tree.
pub const DEFAULT_EXCLUDE_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "__pycache__",
    ".venv",
    "venv",
    "node_modules",
    ".tox",
    ".mypy_cache",
    ".pytest_cache",
    "dist",
    "build",
    "bin",
    "obj",
];

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// .NET extractor project directory (SYMSCAN_ROSLYN_TOOL_DIR)
    pub roslyn_tool_dir: PathBuf,

    /// Roslyn subprocess timeout in seconds (SYMSCAN_ROSLYN_TIMEOUT_SECS)
    pub roslyn_timeout_secs: u64,

    /// dotnet executable (SYMSCAN_DOTNET)
    pub dotnet: String,

    /// Excluded directory names (SYMSCAN_EXCLUDE_DIRS, comma separated)
    pub exclude_dirs: Vec<String>,

    /// Default tracing filter (SYMSCAN_LOG)
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            roslyn_tool_dir: PathBuf::from("tools/roslyn-extractor"),
            roslyn_timeout_secs: 300,
            dotnet: "dotnet".to_string(),
            exclude_dirs: DEFAULT_EXCLUDE_DIRS.iter().map(|s| s.to_string()).collect(),
            log_filter: "symscan=info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Self {
        let mut config = Config::default();

        if let Ok(val) = env::var("SYMSCAN_ROSLYN_TOOL_DIR") {
            if !val.trim().is_empty() {
                config.roslyn_tool_dir = PathBuf::from(val.trim());
            }
        }

        if let Ok(val) = env::var("SYMSCAN_ROSLYN_TIMEOUT_SECS") {
            match val.parse::<u64>() {
                Ok(parsed) if parsed > 0 => config.roslyn_timeout_secs = parsed,
                _ => {
                    tracing::warn!(
                        "Invalid SYMSCAN_ROSLYN_TIMEOUT_SECS value: {}, using default: {}",
                        val,
                        config.roslyn_timeout_secs
                    );
                }
            }
        }

        if let Ok(val) = env::var("SYMSCAN_DOTNET") {
            if !val.trim().is_empty() {
                config.dotnet = val.trim().to_string();
            }
        }

        if let Ok(val) = env::var("SYMSCAN_EXCLUDE_DIRS") {
            let dirs = parse_exclude_dirs(&val);
            if dirs.is_empty() {
                tracing::warn!(
                    "Invalid SYMSCAN_EXCLUDE_DIRS value: {:?}, using defaults",
                    val
                );
            } else {
                config.exclude_dirs = dirs;
            }
        }

        if let Ok(val) = env::var("SYMSCAN_LOG") {
            if !val.trim().is_empty() {
                config.log_filter = val.trim().to_string();
            }
        }

        config
    }

    /// Get the global configuration instance
    pub fn get() -> &'static Config {
        CONFIG.get_or_init(Config::from_env)
    }

    pub fn roslyn_timeout(&self) -> Duration {
        Duration::from_secs(self.roslyn_timeout_secs)
    }
}

fn parse_exclude_dirs(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.roslyn_timeout_secs, 300);
        assert_eq!(config.roslyn_timeout(), Duration::from_secs(300));
        assert_eq!(config.dotnet, "dotnet");
        assert!(config.exclude_dirs.iter().any(|dir| dir == "node_modules"));
        assert!(config.exclude_dirs.iter().any(|dir| dir == "obj"));
    }

    #[test]
    fn parses_comma_separated_dirs() {
        assert_eq!(parse_exclude_dirs(" .git, vendor ,,"), vec![".git", "vendor"]);
        assert!(parse_exclude_dirs(" , ").is_empty());
    }
}
