//! Configuration management for Strand applications.
//!
//! Configuration is driven by environment variables, optionally seeded from
//! a `.env`-style file of `KEY=VALUE` lines. The process environment always
//! takes precedence over file values.

use std::path::Path;

use crate::error::{StrandError, StrandResult};

/// Global configuration for a Strand application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrandConfig {
    /// Bind address handed to the transport layer.
    pub listen: String,
    /// Log level filter for the tracing subscriber.
    pub log_level: String,
    /// Whether diagnostic error responses include failure details.
    pub debug: bool,
}

impl Default for StrandConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8000".to_owned(),
            log_level: "info".to_owned(),
            debug: false,
        }
    }
}

impl StrandConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Load configuration from a `.env`-style file, then apply environment
    /// variable overrides on top.
    ///
    /// Lines starting with `#` and blank lines are skipped. Every other
    /// line must be `KEY=VALUE`.
    ///
    /// # Errors
    ///
    /// Returns [`StrandError::Config`] if the file cannot be read, a line
    /// is malformed, or a boolean value is not one of `0`, `1`, `true`,
    /// `false`.
    pub fn from_env_file(path: impl AsRef<Path>) -> StrandResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| StrandError::Config(format!("cannot read {}: {e}", path.display())))?;

        let mut config = Self::default();
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| StrandError::Config(format!("malformed line: {line}")))?;
            config.set(key.trim(), value.trim())?;
        }

        config.apply_env();
        Ok(config)
    }

    /// Apply environment variable overrides in place.
    fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("STRAND_LISTEN") {
            self.listen = v;
        }
        if let Ok(v) = std::env::var("STRAND_LOG_LEVEL") {
            self.log_level = v;
        }
        if let Ok(v) = std::env::var("STRAND_DEBUG") {
            self.debug = v == "1" || v.eq_ignore_ascii_case("true");
        }
    }

    /// Set a single configuration key from its string value.
    fn set(&mut self, key: &str, value: &str) -> StrandResult<()> {
        match key {
            "STRAND_LISTEN" => self.listen = value.to_owned(),
            "STRAND_LOG_LEVEL" => self.log_level = value.to_owned(),
            "STRAND_DEBUG" => self.debug = parse_bool(value)?,
            // Unknown keys are tolerated so applications can share the file.
            _ => {}
        }
        Ok(())
    }
}

/// Parse a strict boolean: `0`/`1` or case-insensitive `true`/`false`.
fn parse_bool(value: &str) -> StrandResult<bool> {
    match value {
        "0" => Ok(false),
        "1" => Ok(true),
        _ if value.eq_ignore_ascii_case("true") => Ok(true),
        _ if value.eq_ignore_ascii_case("false") => Ok(false),
        _ => Err(StrandError::Config(format!("not a boolean: {value}"))),
    }
}
