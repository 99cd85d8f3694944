//! Runtime configuration: environment, log level, and a plain-text config file loader.
//!
//! This module sits alongside [`crate::limits`]: [`limits`](crate::limits) carries the
//! numeric bounds the parser and router enforce, while [`ServerConfig`] and
//! [`AppConfig`] carry the handful of deployment-level knobs (bind address,
//! environment, log level, worker count) that get turned into those limits
//! and into engine selection at startup.
//!
//! # Examples
//!
//! ```no_run
//! use anvil_web::config::{AppConfig, Environment};
//!
//! let config = AppConfig::from_file("anvil.conf").unwrap_or_default();
//! if config.environment == Environment::Production {
//!     assert!(!config.log_level.is_verbose());
//! }
//! ```

use crate::limits::constants::MAX_CONFIG_FILE_SIZE;
use std::{fmt, fs, io, net::SocketAddr, path::Path, str::FromStr, time::Duration};

/// Deployment environment. Affects only the default log level and whether
/// the JSON error body includes debug detail — no parsing behavior changes
/// across environments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    /// Verbose logging, no response sanitization.
    Development,
    /// Moderate logging, used by CI and staging deploys.
    Staging,
    /// Minimal logging, error bodies never leak internal detail.
    #[default]
    Production,
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "staging" | "stage" => Ok(Self::Staging),
            "production" | "prod" => Ok(Self::Production),
            _ => Err(ConfigError::InvalidValue {
                key: "environment".into(),
                value: value.into(),
            }),
        }
    }
}

/// Minimum severity of events emitted through [`tracing`].
///
/// Maps directly onto [`tracing::Level`]; kept as its own enum so
/// configuration files don't need to know about the `tracing` crate's
/// representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// `true` for [`Self::Debug`] and [`Self::Trace`].
    pub fn is_verbose(self) -> bool {
        matches!(self, Self::Debug | Self::Trace)
    }

    pub(crate) fn as_tracing_level(self) -> tracing::Level {
        match self {
            Self::Error => tracing::Level::ERROR,
            Self::Warn => tracing::Level::WARN,
            Self::Info => tracing::Level::INFO,
            Self::Debug => tracing::Level::DEBUG,
            Self::Trace => tracing::Level::TRACE,
        }
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::Info
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            _ => Err(ConfigError::InvalidValue {
                key: "log_level".into(),
                value: value.into(),
            }),
        }
    }
}

/// Which of the two execution models a [`Server`](crate::Server) drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    /// One task per accepted connection, admission bounded by an atomic counter.
    Thread,
    /// A single-threaded reactor driving an explicit per-connection state machine.
    Reactor,
}

impl Default for EngineKind {
    fn default() -> Self {
        Self::Thread
    }
}

impl FromStr for EngineKind {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "thread" | "threaded" => Ok(Self::Thread),
            "reactor" | "single-threaded" | "single_threaded" => Ok(Self::Reactor),
            _ => Err(ConfigError::InvalidValue {
                key: "engine".into(),
                value: value.into(),
            }),
        }
    }
}

/// Top-level server configuration: bind address, engine, and log level.
///
/// Does not carry the parsing/connection limit structs in [`crate::limits`];
/// those are configured separately through [`ServerBuilder`](crate::ServerBuilder)
/// so that a deployment can version the two independently.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the listener binds to (default: `127.0.0.1:8080`).
    pub bind_addr: SocketAddr,
    /// Execution model to drive (default: [`EngineKind::Thread`]).
    pub engine: EngineKind,
    /// Deployment environment (default: [`Environment::Production`]).
    pub environment: Environment,
    /// Minimum severity logged through `tracing` (default: [`LogLevel::Info`]).
    pub log_level: LogLevel,
    /// Graceful shutdown grace period once a shutdown signal is received
    /// (default: `5 seconds`).
    pub shutdown_grace_period: Duration,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            engine: EngineKind::default(),
            environment: Environment::default(),
            log_level: LogLevel::default(),
            shutdown_grace_period: Duration::from_secs(5),

            _priv: (),
        }
    }
}

/// Application-level configuration layered on top of [`ServerConfig`].
///
/// Loaded from a plain `key = value` text file (see [`AppConfig::from_file`]),
/// environment variables are not read directly — a deployment that wants
/// env-driven config should read them itself and populate this struct.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Server-level settings.
    pub server: ServerConfig,
    /// Human-readable name surfaced in `Server` response headers and logs.
    pub name: String,
    /// Deployment environment, duplicated here for convenience in app code
    /// that doesn't want to reach into `server.environment`.
    pub environment: Environment,
    /// Minimum severity logged through `tracing`.
    pub log_level: LogLevel,
}

impl AppConfig {
    /// Loads configuration from a plain-text file.
    ///
    /// # Format
    ///
    /// ```text
    /// # comments start with '#' and blank lines are ignored
    /// bind_addr = 0.0.0.0:8080
    /// engine = reactor
    /// environment = production
    /// log_level = info
    /// name = my-service
    /// ```
    ///
    /// Unknown keys are rejected with [`ConfigError::UnknownKey`] rather
    /// than silently ignored, so a typo in a config file fails loudly at
    /// startup instead of silently keeping a default.
    ///
    /// Files larger than [`MAX_CONFIG_FILE_SIZE`] are rejected before being
    /// parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let metadata = fs::metadata(path).map_err(ConfigError::Io)?;
        if metadata.len() as usize > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::FileTooLarge {
                size: metadata.len() as usize,
                limit: MAX_CONFIG_FILE_SIZE,
            });
        }

        let contents = fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_str_contents(&contents)
    }

    fn from_str_contents(contents: &str) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        for (lineno, raw_line) in contents.lines().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (key, value) = line.split_once('=').ok_or(ConfigError::MalformedLine {
                line: lineno + 1,
            })?;
            let key = key.trim();
            let value = value.trim();

            match key {
                "bind_addr" => {
                    config.server.bind_addr =
                        value.parse().map_err(|_| ConfigError::InvalidValue {
                            key: key.into(),
                            value: value.into(),
                        })?
                }
                "engine" => config.server.engine = value.parse()?,
                "environment" => {
                    let env = value.parse()?;
                    config.server.environment = env;
                    config.environment = env;
                }
                "log_level" => {
                    let level = value.parse()?;
                    config.server.log_level = level;
                    config.log_level = level;
                }
                "shutdown_grace_period_secs" => {
                    let secs: u64 = value.parse().map_err(|_| ConfigError::InvalidValue {
                        key: key.into(),
                        value: value.into(),
                    })?;
                    config.server.shutdown_grace_period = Duration::from_secs(secs);
                }
                "name" => config.name = value.to_string(),
                other => {
                    return Err(ConfigError::UnknownKey(other.to_string()));
                }
            }
        }

        Ok(config)
    }
}

/// Errors that can occur while loading or parsing configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    Io(io::Error),
    /// The configuration file exceeded [`MAX_CONFIG_FILE_SIZE`].
    FileTooLarge { size: usize, limit: usize },
    /// A line was not in `key = value` form.
    MalformedLine { line: usize },
    /// A key was not recognized.
    UnknownKey(String),
    /// A value could not be parsed for its key.
    InvalidValue { key: String, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read configuration file: {err}"),
            Self::FileTooLarge { size, limit } => {
                write!(f, "configuration file too large: {size} bytes (limit {limit})")
            }
            Self::MalformedLine { line } => write!(f, "malformed line {line}, expected `key = value`"),
            Self::UnknownKey(key) => write!(f, "unknown configuration key: {key}"),
            Self::InvalidValue { key, value } => {
                write!(f, "invalid value for `{key}`: {value}")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_basic_file() {
        let contents = "\
            # comment\n\
            bind_addr = 0.0.0.0:9090\n\
            engine = reactor\n\
            environment = staging\n\
            log_level = debug\n\
            name = demo-service\n\
        ";

        let config = AppConfig::from_str_contents(contents).unwrap();
        assert_eq!(config.server.bind_addr, "0.0.0.0:9090".parse().unwrap());
        assert_eq!(config.server.engine, EngineKind::Reactor);
        assert_eq!(config.environment, Environment::Staging);
        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.name, "demo-service");
    }

    #[test]
    fn rejects_unknown_key() {
        let err = AppConfig::from_str_contents("totally_unknown = 1\n").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownKey(_)));
    }

    #[test]
    fn rejects_malformed_line() {
        let err = AppConfig::from_str_contents("not-a-key-value-pair\n").unwrap_err();
        assert!(matches!(err, ConfigError::MalformedLine { .. }));
    }

    #[test]
    fn ignores_blank_lines_and_comments() {
        let config = AppConfig::from_str_contents("\n# just a comment\n\n").unwrap();
        assert_eq!(config.environment, Environment::Production);
    }

    #[test]
    fn log_level_ordering_is_verbosity() {
        assert!(LogLevel::Trace > LogLevel::Debug);
        assert!(LogLevel::Debug > LogLevel::Info);
        assert!(!LogLevel::Info.is_verbose());
        assert!(LogLevel::Debug.is_verbose());
    }
}
