//! # entryswap-config
//!
//! Configuration management for entryswap.
//!
//! Loads configuration from:
//! 1. `~/.entryswap/config.toml` (global)
//! 2. `.entryswap/config.toml` (project-local, overrides global)
//! 3. Environment variables (highest priority)

pub mod logging;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard};

pub use logging::{init_logging, Component, LogLevel};

/// Environment variable overriding `diagnostics.log_file`
pub const ENV_LOG_FILE: &str = "ENTRYSWAP_LOG_FILE";
/// Environment variable overriding `diagnostics.enabled` (`0`/`1`, `false`/`true`)
pub const ENV_DIAGNOSTICS: &str = "ENTRYSWAP_DIAGNOSTICS";
/// Environment variable overriding `logging.level`
pub const ENV_LOG_LEVEL: &str = "ENTRYSWAP_LOG_LEVEL";

/// Global config instance
static CONFIG: Lazy<RwLock<Config>> = Lazy::new(|| RwLock::new(load_or_default(Config::load())));

/// Fall back to defaults on a broken config, leaving a trace of why.
pub fn load_or_default(result: Result<Config, ConfigError>) -> Config {
    result.unwrap_or_else(|err| {
        log_config_warn!("Config load failed, using defaults", error = err.to_string().as_str());
        Config::default()
    })
}

/// Get global config (read-only)
pub fn config() -> RwLockReadGuard<'static, Config> {
    CONFIG.read().unwrap_or_else(PoisonError::into_inner)
}

/// Reload config from disk
pub fn reload() -> Result<(), ConfigError> {
    let new_config = Config::load()?;
    *CONFIG.write().unwrap_or_else(PoisonError::into_inner) = new_config;
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub diagnostics: DiagnosticsConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load config from standard locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(
            Self::global_config_path().as_deref(),
            Path::new(".entryswap/config.toml"),
        )
        .map(|mut config| {
            config.apply_env_overrides();
            config
        })
    }

    /// Load the global file (if given and present), then merge the project file
    /// over it. Environment overrides are not applied here.
    pub fn load_from(global: Option<&Path>, project: &Path) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(global_path) = global {
            if global_path.exists() {
                let path = global_path.display().to_string();
                log_config_debug!("Loading global config", path = path.as_str());
                let contents = std::fs::read_to_string(global_path)?;
                config = toml::from_str(&contents)?;
            }
        }

        if project.exists() {
            let path = project.display().to_string();
            log_config_debug!("Loading project config", path = path.as_str());
            let contents = std::fs::read_to_string(project)?;
            let project_config: PartialConfig = toml::from_str(&contents)?;
            config.merge(project_config);
        }

        Ok(config)
    }

    /// Global config path: ~/.entryswap/config.toml
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".entryswap/config.toml"))
    }

    /// Project values override only the keys the project file actually sets
    fn merge(&mut self, other: PartialConfig) {
        if let Some(diag) = other.diagnostics {
            if let Some(enabled) = diag.enabled {
                self.diagnostics.enabled = enabled;
            }
            if let Some(log_file) = diag.log_file {
                self.diagnostics.log_file = log_file;
            }
            if let Some(prefix) = diag.prefix {
                self.diagnostics.prefix = prefix;
            }
        }
        if let Some(level) = other.logging.and_then(|l| l.level) {
            self.logging.level = level;
        }
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides using an arbitrary lookup (environment in production)
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_LOG_FILE) {
            self.diagnostics.log_file = PathBuf::from(path);
        }
        if let Some(flag) = lookup(ENV_DIAGNOSTICS) {
            match flag.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "on" => self.diagnostics.enabled = true,
                "0" | "false" | "off" => self.diagnostics.enabled = false,
                _ => log_config_debug!(
                    "Ignoring invalid override",
                    key = ENV_DIAGNOSTICS,
                    value = flag.as_str(),
                ),
            }
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            match level.parse::<LogLevel>() {
                Ok(level) => self.logging.level = level,
                Err(_) => log_config_debug!(
                    "Ignoring invalid override",
                    key = ENV_LOG_LEVEL,
                    value = level.as_str(),
                ),
            }
        }
    }

    /// Generate default config TOML string
    pub fn default_toml() -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(&Config::default())?)
    }
}

/// Diagnostic log file configuration (the `__IL2CPP_LOG` sink)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Write diagnostic lines at all
    pub enabled: bool,
    /// Append-only log file, relative paths resolve against the host's cwd
    pub log_file: PathBuf,
    /// Prepended to every line
    pub prefix: String,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_file: PathBuf::from("log.txt"),
            prefix: "LOG: ".to_string(),
        }
    }
}

/// Structured logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Warn,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct PartialConfig {
    diagnostics: Option<PartialDiagnostics>,
    logging: Option<PartialLogging>,
}

#[derive(Debug, Default, Deserialize)]
struct PartialDiagnostics {
    enabled: Option<bool>,
    log_file: Option<PathBuf>,
    prefix: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PartialLogging {
    level: Option<LogLevel>,
}
