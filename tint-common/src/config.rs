//! Configuration loading and resolution
//!
//! Settings are resolved once at startup in this priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (handled by the binary's argument parser)
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! The resolved [`ServiceConfig`] is read-only for the lifetime of the
//! process and is shared by reference with every component that needs it.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

/// Default HTTP port for tint-api
pub const DEFAULT_PORT: u16 = 5780;

/// Default bind host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default upload limit (10 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Content types accepted by default
pub const DEFAULT_ALLOWED_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];

/// Default remote backend round-trip timeout
pub const DEFAULT_BACKEND_TIMEOUT_SECS: u64 = 60;

/// Default timeout for the remote health probe
pub const DEFAULT_HEALTH_TIMEOUT_SECS: u64 = 2;

/// Scratch directories older than this are swept
pub const DEFAULT_STALE_AFTER_SECS: u64 = 24 * 60 * 60;

/// Interval between scratch sweeps
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60 * 60;

/// Which transform strategy serves colorization requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendMode {
    /// Deterministic tonal approximation computed in-process
    #[default]
    Local,
    /// Forward to an external colorization service
    Remote,
}

impl BackendMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendMode::Local => "local",
            BackendMode::Remote => "remote",
        }
    }
}

impl fmt::Display for BackendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(BackendMode::Local),
            "remote" => Ok(BackendMode::Remote),
            other => Err(format!(
                "unknown backend mode '{}' (expected 'local' or 'remote')",
                other
            )),
        }
    }
}

/// Bootstrap configuration loaded from TOML file
///
/// Every field is optional; anything missing falls through to the
/// compiled default.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    /// Root directory for per-request scratch scopes
    pub scratch_dir: Option<PathBuf>,
    pub logging: LoggingConfig,
    pub backend: BackendSection,
    pub limits: LimitsSection,
    pub maintenance: MaintenanceSection,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// `[backend]` table
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BackendSection {
    pub mode: Option<BackendMode>,
    pub url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub health_timeout_secs: Option<u64>,
    pub fallback_to_local: Option<bool>,
}

/// `[limits]` table
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LimitsSection {
    pub max_upload_bytes: Option<usize>,
    pub allowed_types: Option<Vec<String>>,
}

/// `[maintenance]` table
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MaintenanceSection {
    pub stale_after_secs: Option<u64>,
    pub sweep_interval_secs: Option<u64>,
}

/// Values supplied on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub backend_mode: Option<BackendMode>,
    pub backend_url: Option<String>,
    pub scratch_dir: Option<PathBuf>,
    pub log_level: Option<String>,
}

/// Fully resolved, read-only service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub backend_mode: BackendMode,
    /// Base URL of the remote colorization service, without trailing slash
    pub backend_url: Option<String>,
    pub backend_timeout: Duration,
    pub health_timeout: Duration,
    /// Fall back to the local approximation when the remote is unavailable
    pub fallback_to_local: bool,
    pub max_upload_bytes: usize,
    pub allowed_types: Vec<String>,
    pub scratch_dir: PathBuf,
    pub stale_after: Duration,
    pub sweep_interval: Duration,
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            backend_mode: BackendMode::default(),
            backend_url: None,
            backend_timeout: Duration::from_secs(DEFAULT_BACKEND_TIMEOUT_SECS),
            health_timeout: Duration::from_secs(DEFAULT_HEALTH_TIMEOUT_SECS),
            fallback_to_local: false,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            allowed_types: DEFAULT_ALLOWED_TYPES.iter().map(|t| t.to_string()).collect(),
            scratch_dir: default_scratch_dir(),
            stale_after: Duration::from_secs(DEFAULT_STALE_AFTER_SECS),
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            log_level: default_log_level(),
        }
    }
}

impl ServiceConfig {
    /// Resolve the effective configuration from overrides and TOML
    ///
    /// Returns `Error::Config` if the combination is unusable.
    pub fn resolve(overrides: &ConfigOverrides, toml: &TomlConfig) -> Result<Self> {
        let defaults = ServiceConfig::default();

        let backend_url = overrides
            .backend_url
            .clone()
            .or_else(|| toml.backend.url.clone())
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty());

        let config = ServiceConfig {
            host: overrides
                .host
                .clone()
                .or_else(|| toml.host.clone())
                .unwrap_or(defaults.host),
            port: overrides.port.or(toml.port).unwrap_or(defaults.port),
            backend_mode: overrides
                .backend_mode
                .or(toml.backend.mode)
                .unwrap_or(defaults.backend_mode),
            backend_url,
            backend_timeout: toml
                .backend
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.backend_timeout),
            health_timeout: toml
                .backend
                .health_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.health_timeout),
            fallback_to_local: toml
                .backend
                .fallback_to_local
                .unwrap_or(defaults.fallback_to_local),
            max_upload_bytes: toml
                .limits
                .max_upload_bytes
                .unwrap_or(defaults.max_upload_bytes),
            allowed_types: toml
                .limits
                .allowed_types
                .as_ref()
                .map(|types| types.iter().map(|t| t.trim().to_ascii_lowercase()).collect())
                .unwrap_or(defaults.allowed_types),
            scratch_dir: overrides
                .scratch_dir
                .clone()
                .or_else(|| toml.scratch_dir.clone())
                .unwrap_or(defaults.scratch_dir),
            stale_after: toml
                .maintenance
                .stale_after_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.stale_after),
            sweep_interval: toml
                .maintenance
                .sweep_interval_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.sweep_interval),
            log_level: overrides
                .log_level
                .clone()
                .unwrap_or_else(|| toml.logging.level.clone()),
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.backend_mode == BackendMode::Remote && self.backend_url.is_none() {
            return Err(Error::Config(
                "backend mode 'remote' requires a backend URL. Configure using one of:\n\
                 1. Command line: --backend-url http://host:port\n\
                 2. Environment: TINT_BACKEND_URL=http://host:port\n\
                 3. TOML config: [backend] url = \"http://host:port\""
                    .to_string(),
            ));
        }
        if self.max_upload_bytes == 0 {
            return Err(Error::Config("limits.max_upload_bytes must be greater than 0".to_string()));
        }
        if self.allowed_types.is_empty() {
            return Err(Error::Config("limits.allowed_types must not be empty".to_string()));
        }
        if self.backend_timeout.is_zero() {
            return Err(Error::Config("backend.timeout_secs must be greater than 0".to_string()));
        }
        // A younger cutoff would sweep scopes of requests still in flight
        if self.stale_after <= self.backend_timeout {
            return Err(Error::Config(format!(
                "maintenance.stale_after_secs ({}) must exceed backend.timeout_secs ({})",
                self.stale_after.as_secs(),
                self.backend_timeout.as_secs()
            )));
        }
        if self.sweep_interval.is_zero() {
            return Err(Error::Config(
                "maintenance.sweep_interval_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// `host:port` string for the listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Platform config file location: `<config_dir>/tint/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("tint").join("config.toml"))
}

fn default_scratch_dir() -> PathBuf {
    std::env::temp_dir().join("tint-scratch")
}

/// Load the TOML bootstrap file
///
/// A missing file is not an error: a warning is logged and defaults are
/// used. A file that exists but cannot be read or parsed is a
/// configuration error.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!(
            "Config file {} not found, using built-in defaults",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML {} failed: {}", path.display(), e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML {} failed: {}", path.display(), e)))?;

    info!("Loaded configuration from {}", path.display());
    Ok(config)
}
