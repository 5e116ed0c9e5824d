//! Configuration file management for ocspcheck.
//!
//! This module handles loading, parsing, and merging configuration from TOML files
//! and command-line arguments. It supports a hierarchical configuration system where
//! settings can be specified in multiple places with clear precedence rules.
//!
//! # Configuration Precedence
//!
//! 1. Default values (lowest priority)
//! 2. Configuration file (ocspcheck.toml or specified with --config)
//! 3. Command-line arguments (highest priority)
//!
//! The merged [`Config`] is then resolved into a [`CheckConfig`], the plain
//! value the revocation checker is constructed with.
//!
//! # Example Configuration File
//!
//! ```toml
//! url = "https://example.com"
//! pem = "server.pem"
//! no_staple = false
//! output = "text"
//! exit_code = 2
//! issuer_fetch_timeout_secs = 10
//!
//! [prometheus]
//! enabled = true
//! address = "http://localhost:9091"
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default bound on the AIA issuer certificate download.
pub const DEFAULT_ISSUER_FETCH_TIMEOUT_SECS: u64 = 10;

/// Name of the configuration file picked up from the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "ocspcheck.toml";

/// Main configuration structure for ocspcheck.
///
/// All fields are optional to support partial configuration and merging.
/// Missing values will be filled in by defaults or overridden by CLI arguments.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct Config {
    /// HTTPS URL whose server certificate is checked
    pub url: Option<String>,
    /// Path to a PEM certificate to check
    pub pem: Option<PathBuf>,
    /// OCSP responder to use instead of the one in the certificate
    pub responder: Option<String>,
    /// Ignore stapled OCSP responses
    pub no_staple: Option<bool>,
    /// Dump raw OCSP requests and responses as PEM
    pub dump: Option<bool>,
    /// Output format: text, json
    pub output: Option<String>,
    /// Exit code to use when a certificate is revoked
    pub exit_code: Option<i32>,
    /// Timeout for fetching the issuer certificate, in seconds
    pub issuer_fetch_timeout_secs: Option<u64>,
    /// CA bundle used to verify the TLS server
    pub ca_file: Option<PathBuf>,
    /// Prometheus configuration
    pub prometheus: Option<PrometheusConfig>,
}

/// Prometheus integration configuration.
///
/// Controls whether verdicts are pushed to a Prometheus Push Gateway
/// and specifies the gateway address.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PrometheusConfig {
    /// Enable prometheus metrics pushing
    pub enabled: Option<bool>,
    /// Prometheus push gateway address (e.g., "http://localhost:9091")
    pub address: Option<String>,
}

/// Output formats understood by the binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Fully resolved settings for one run of the revocation checker.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckConfig {
    pub url: Option<String>,
    pub pem: Option<PathBuf>,
    pub responder: Option<String>,
    pub no_staple: bool,
    pub dump: bool,
    pub issuer_fetch_timeout: Duration,
    pub ca_file: Option<PathBuf>,
}

impl Default for CheckConfig {
    fn default() -> Self {
        CheckConfig {
            url: None,
            pem: None,
            responder: None,
            no_staple: false,
            dump: false,
            issuer_fetch_timeout: Duration::from_secs(DEFAULT_ISSUER_FETCH_TIMEOUT_SECS),
            ca_file: None,
        }
    }
}

impl Config {
    /// Loads configuration from a TOML file.
    ///
    /// # Returns
    ///
    /// * `Ok(Config)` - Successfully parsed configuration
    /// * `Err(ConfigError::Io)` - File could not be read
    /// * `Err(ConfigError::Parse)` - File contains invalid TOML
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use ocspcheck::config::Config;
    /// let config = Config::from_file("ocspcheck.toml")?;
    /// # Ok::<(), ocspcheck::config::ConfigError>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io(e.to_string()))?;

        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        Ok(config)
    }

    /// Creates a configuration holding the built-in defaults.
    ///
    /// # Default Values
    ///
    /// - `url`, `pem`, `responder`: None (must be provided)
    /// - `no_staple`, `dump`: false
    /// - `output`: "text"
    /// - `exit_code`: 2
    /// - `issuer_fetch_timeout_secs`: 10
    /// - `prometheus.enabled`: false
    /// - `prometheus.address`: "http://localhost:9091"
    pub fn defaults() -> Self {
        Config {
            url: None,
            pem: None,
            responder: None,
            no_staple: Some(false),
            dump: Some(false),
            output: Some("text".to_string()),
            exit_code: Some(2),
            issuer_fetch_timeout_secs: Some(DEFAULT_ISSUER_FETCH_TIMEOUT_SECS),
            ca_file: None,
            prometheus: Some(PrometheusConfig {
                enabled: Some(false),
                address: Some("http://localhost:9091".to_string()),
            }),
        }
    }

    /// Merges this configuration with another, prioritizing the other's values.
    ///
    /// For each field, if the `other` config has a value (Some), it overrides
    /// this config's value. If the `other` value is None, keeps the current value.
    ///
    /// # Example
    ///
    /// ```
    /// # use ocspcheck::config::Config;
    /// let defaults = Config::defaults();
    /// let file_config = Config::from_file("ocspcheck.toml").unwrap_or_default();
    /// let merged = defaults.merge_with(file_config);
    /// ```
    pub fn merge_with(mut self, other: Config) -> Self {
        if other.url.is_some() {
            self.url = other.url;
        }
        if other.pem.is_some() {
            self.pem = other.pem;
        }
        if other.responder.is_some() {
            self.responder = other.responder;
        }
        if other.no_staple.is_some() {
            self.no_staple = other.no_staple;
        }
        if other.dump.is_some() {
            self.dump = other.dump;
        }
        if other.output.is_some() {
            self.output = other.output;
        }
        if other.exit_code.is_some() {
            self.exit_code = other.exit_code;
        }
        if other.issuer_fetch_timeout_secs.is_some() {
            self.issuer_fetch_timeout_secs = other.issuer_fetch_timeout_secs;
        }
        if other.ca_file.is_some() {
            self.ca_file = other.ca_file;
        }
        if let Some(other_prom) = other.prometheus {
            if let Some(ref mut self_prom) = self.prometheus {
                if other_prom.enabled.is_some() {
                    self_prom.enabled = other_prom.enabled;
                }
                if other_prom.address.is_some() {
                    self_prom.address = other_prom.address;
                }
            } else {
                self.prometheus = Some(other_prom);
            }
        }
        self
    }

    /// Resolves the settings the revocation checker runs with.
    pub fn to_check_config(&self) -> Result<CheckConfig, ConfigError> {
        let issuer_fetch_timeout_secs = self
            .issuer_fetch_timeout_secs
            .unwrap_or(DEFAULT_ISSUER_FETCH_TIMEOUT_SECS);
        if issuer_fetch_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "issuer_fetch_timeout_secs must be greater than zero".to_string(),
            ));
        }

        Ok(CheckConfig {
            url: self.url.clone().filter(|url| !url.is_empty()),
            pem: self.pem.clone().filter(|pem| !pem.as_os_str().is_empty()),
            responder: self.responder.clone().filter(|r| !r.is_empty()),
            no_staple: self.no_staple.unwrap_or(false),
            dump: self.dump.unwrap_or(false),
            issuer_fetch_timeout: Duration::from_secs(issuer_fetch_timeout_secs),
            ca_file: self.ca_file.clone(),
        })
    }

    /// Parses the `output` setting.
    pub fn output_format(&self) -> Result<OutputFormat, ConfigError> {
        match self.output.as_deref().unwrap_or("text") {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(ConfigError::Validation(format!(
                "unknown output format '{}', expected text or json",
                other
            ))),
        }
    }

    /// Push gateway address, when pushing is enabled.
    pub fn prometheus_address(&self) -> Option<String> {
        let prometheus = self.prometheus.as_ref()?;
        if prometheus.enabled.unwrap_or(false) {
            prometheus.address.clone()
        } else {
            None
        }
    }

    /// Generates an example configuration file in TOML format.
    ///
    /// Creates a sample configuration with all available options set to
    /// example values. Useful for bootstrapping a new configuration file.
    pub fn example_toml() -> String {
        let example = Config {
            url: Some("https://example.com".to_string()),
            pem: Some(PathBuf::from("server.pem")),
            responder: None,
            no_staple: Some(false),
            dump: Some(false),
            output: Some("text".to_string()),
            exit_code: Some(2),
            issuer_fetch_timeout_secs: Some(DEFAULT_ISSUER_FETCH_TIMEOUT_SECS),
            ca_file: None,
            prometheus: Some(PrometheusConfig {
                enabled: Some(false),
                address: Some("http://localhost:9091".to_string()),
            }),
        };

        toml::to_string_pretty(&example)
            .unwrap_or_else(|_| "# Error generating example".to_string())
    }
}

/// Errors that can occur during configuration loading and parsing.
#[derive(Debug)]
pub enum ConfigError {
    /// I/O error (file not found, permission denied, etc.)
    Io(String),
    /// TOML parsing error (invalid syntax, type mismatch, etc.)
    Parse(String),
    /// Validation error (missing required fields, invalid values, etc.)
    Validation(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(msg) => write!(f, "IO Error: {}", msg),
            ConfigError::Parse(msg) => write!(f, "Parse Error: {}", msg),
            ConfigError::Validation(msg) => write!(f, "Validation Error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}
