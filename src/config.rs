use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration loaded from hangcheck.toml.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct HarnessConfig {
    pub watchdog: WatchdogConfig,
    pub suite: SuiteConfig,
}

/// Watchdog settings. One knob matters: how long a single test may run.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WatchdogConfig {
    /// Per-test timeout in seconds (fractional allowed).
    pub timeout_secs: f64,
    /// Raise SIGQUIT on alarm so an external native stack dumper
    /// (e.g. an embedding VM) can print its threads. Off unless the
    /// environment actually installs such a handler.
    pub native_stack_dump: bool,
    /// How long to wait for the asynchronous native dump to finish
    /// before printing our own backtrace.
    pub dump_grace_ms: u64,
}

/// The set of test commands the harness runs.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SuiteConfig {
    /// Shell used to run each test command.
    pub shell: String,
    pub tests: Vec<TestCase>,
}

/// A single test: a human-readable name plus a shell command.
#[derive(Debug, Clone, Deserialize)]
pub struct TestCase {
    pub name: String,
    pub command: String,
}

/// Errors that can occur while loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the config file.
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Config file is not valid TOML.
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    /// timeout_secs must be a positive number.
    InvalidTimeout { value: f64 },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "failed to read config {}: {}", path.display(), source)
            }
            ConfigError::Parse { path, source } => {
                write!(f, "failed to parse config {}: {}", path.display(), source)
            }
            ConfigError::InvalidTimeout { value } => {
                write!(f, "watchdog.timeout_secs must be positive, got {value}")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::InvalidTimeout { .. } => None,
        }
    }
}

impl WatchdogConfig {
    /// The configured timeout as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_secs)
    }

    /// The grace pause for the native stack dump.
    pub fn dump_grace(&self) -> Duration {
        Duration::from_millis(self.dump_grace_ms)
    }
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<HarnessConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;

    let config: HarnessConfig = toml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &HarnessConfig) -> Result<(), ConfigError> {
    let t = config.watchdog.timeout_secs;
    if !(t > 0.0) || !t.is_finite() {
        return Err(ConfigError::InvalidTimeout { value: t });
    }
    Ok(())
}

// --- Default implementations ---

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 60.0,
            native_stack_dump: false,
            dump_grace_ms: 1_000,
        }
    }
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            shell: "sh".to_string(),
            tests: Vec::new(),
        }
    }
}
