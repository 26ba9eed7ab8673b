//! Configuration parsing and management.
//!
//! Parses the TOML configuration describing the vendor middleware
//! location, the external signer, and the polling cadences. Every section
//! is optional and fully defaulted, so an empty file (or no file at all)
//! yields a working development configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from configuration loading.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The TOML is invalid.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Serialization failed.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// The parsed config is semantically invalid.
    #[error("invalid config: {0}")]
    Validation(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AutographConfig {
    /// Vendor middleware settings.
    #[serde(default)]
    pub middleware: MiddlewareConfig,

    /// External signer settings.
    #[serde(default)]
    pub signer: SignerConfig,

    /// Polling cadences.
    #[serde(default)]
    pub polling: PollingConfig,
}

impl AutographConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or fails
    /// validation.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or the parsed values fail
    /// validation (zero poll intervals, empty dev command).
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serializes the configuration to TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.polling.card_poll_secs == 0 {
            return Err(ConfigError::Validation(
                "polling.card_poll_secs must be non-zero".to_string(),
            ));
        }
        if self.polling.integrity_verify_secs == 0 {
            return Err(ConfigError::Validation(
                "polling.integrity_verify_secs must be non-zero".to_string(),
            ));
        }
        if self.signer.dev_fallback && self.signer.dev_command.is_empty() {
            return Err(ConfigError::Validation(
                "signer.dev_command must not be empty when dev_fallback is enabled".to_string(),
            ));
        }
        Ok(())
    }
}

/// Vendor middleware settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MiddlewareConfig {
    /// Path of the vendor PKCS#11 library.
    #[serde(default = "default_middleware_library")]
    pub library_path: PathBuf,
}

impl Default for MiddlewareConfig {
    fn default() -> Self {
        Self {
            library_path: default_middleware_library(),
        }
    }
}

/// External signer settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SignerConfig {
    /// Path of the prebuilt signer binary.
    #[serde(default = "default_signer_binary")]
    pub binary_path: PathBuf,

    /// Whether a missing binary may fall back to the interpreter-based
    /// development runner. Outside development the missing binary is a
    /// hard error.
    #[serde(default)]
    pub dev_fallback: bool,

    /// Development runner argv, program first.
    #[serde(default = "default_dev_command")]
    pub dev_command: Vec<String>,

    /// Working directory for the development runner.
    #[serde(default)]
    pub dev_working_dir: Option<PathBuf>,
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            binary_path: default_signer_binary(),
            dev_fallback: false,
            dev_command: default_dev_command(),
            dev_working_dir: None,
        }
    }
}

/// Polling cadences, in seconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PollingConfig {
    /// Card reader/presence poll interval.
    #[serde(default = "default_card_poll_secs")]
    pub card_poll_secs: u64,

    /// Periodic document re-verification interval.
    #[serde(default = "default_integrity_verify_secs")]
    pub integrity_verify_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            card_poll_secs: default_card_poll_secs(),
            integrity_verify_secs: default_integrity_verify_secs(),
        }
    }
}

fn default_middleware_library() -> PathBuf {
    PathBuf::from(
        "/Library/Belgium Identity Card/Pkcs11/beid-pkcs11.bundle/Contents/MacOS/libbeidpkcs11.dylib",
    )
}

fn default_signer_binary() -> PathBuf {
    PathBuf::from("python-dist/autograph-signer/main.bin")
}

fn default_dev_command() -> Vec<String> {
    ["uv", "run", "python", "main.py"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

const fn default_card_poll_secs() -> u64 {
    2
}

const fn default_integrity_verify_secs() -> u64 {
    5
}
