//! Configuration for the Barkeep client.
//!
//! Covers the remote service connection (base URL, shared access
//! token, request timeout) and the reveal pacing intervals. Loaded
//! from a JSON file with per-field defaults so a partial config stays
//! valid.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// The default config file name.
pub const CONFIG_FILE_NAME: &str = "barkeep.json";

/// Default base URL of the recommendation service API.
fn default_base_url() -> String {
    "http://127.0.0.1:5012/api".to_string()
}

/// Default request timeout in seconds.
const fn default_request_timeout() -> u64 {
    30
}

/// Default settle delay before answering is enabled, in milliseconds.
const fn default_settle_ms() -> u64 {
    500
}

/// Default pause between submission and the response reveal, in
/// milliseconds.
const fn default_pre_reveal_ms() -> u64 {
    100
}

/// Default per-character reveal rate, in milliseconds.
const fn default_per_char_ms() -> u64 {
    30
}

/// Default per-character reveal rate when recommendations are
/// attached, in milliseconds.
const fn default_per_char_recommended_ms() -> u64 {
    25
}

/// Errors produced when loading or validating a config file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Could not read config file '{path}': {message}")]
    Read {
        /// Path to the config file.
        path: String,
        /// Description of the I/O failure.
        message: String,
    },

    /// The file is not valid JSON for the expected shape.
    #[error("Invalid JSON in config file '{path}': {message}\n\nSuggestion: Validate your barkeep.json with a JSON linter")]
    Parse {
        /// Path to the config file.
        path: String,
        /// Description of the parse error.
        message: String,
    },

    /// A field value fails validation.
    #[error("Invalid configuration: {message}\n\nSuggestion: {suggestion}")]
    Validation {
        /// Description of the validation failure.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },
}

/// Reveal pacing intervals.
///
/// The defaults reproduce the intended conversational feel: a short
/// settle before answering opens, a beat before the response appears,
/// and a typing animation proportional to the response length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pacing {
    /// Pause after a question appears before answering is permitted.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    /// Pause between answer submission and the response reveal.
    #[serde(default = "default_pre_reveal_ms")]
    pub pre_reveal_ms: u64,

    /// Reveal duration per response character.
    #[serde(default = "default_per_char_ms")]
    pub per_char_ms: u64,

    /// Reveal duration per response character when a recommendation
    /// pair is attached.
    #[serde(default = "default_per_char_recommended_ms")]
    pub per_char_recommended_ms: u64,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            settle_ms: default_settle_ms(),
            pre_reveal_ms: default_pre_reveal_ms(),
            per_char_ms: default_per_char_ms(),
            per_char_recommended_ms: default_per_char_recommended_ms(),
        }
    }
}

impl Pacing {
    /// The settle delay as a [`Duration`].
    #[must_use]
    pub const fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    /// The pre-reveal delay as a [`Duration`].
    #[must_use]
    pub const fn pre_reveal(&self) -> Duration {
        Duration::from_millis(self.pre_reveal_ms)
    }

    /// Typing duration for a response of `len` characters.
    ///
    /// Uses the faster per-character rate when `recommended` indicates
    /// a recommendation pair rides along with the response.
    #[must_use]
    pub fn typing_duration(&self, len: usize, recommended: bool) -> Duration {
        let rate = if recommended {
            self.per_char_recommended_ms
        } else {
            self.per_char_ms
        };
        Duration::from_millis(rate.saturating_mul(len as u64))
    }
}

/// Main configuration for the Barkeep client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Base URL of the recommendation service API, including the
    /// common prefix (e.g. `http://host:5012/api`).
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Shared access token sent as the `code` query parameter on every
    /// call.
    #[serde(default)]
    pub access_token: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Reveal pacing intervals.
    #[serde(default)]
    pub pacing: Pacing,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            access_token: String::new(),
            request_timeout_secs: default_request_timeout(),
            pacing: Pacing::default(),
        }
    }
}

impl Config {
    /// Loads a config from a JSON file and validates it.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let display = path.display().to_string();

        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: display.clone(),
            message: e.to_string(),
        })?;

        let config: Self =
            serde_json::from_str(&contents).map_err(|e| ConfigError::Parse {
                path: display,
                message: e.to_string(),
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Validates field values, returning an actionable error on the
    /// first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::Validation {
                message: "baseUrl must not be empty".to_string(),
                suggestion: "Set baseUrl to the service API root, e.g. http://127.0.0.1:5012/api"
                    .to_string(),
            });
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ConfigError::Validation {
                message: format!("baseUrl '{}' is not an http(s) URL", self.base_url),
                suggestion: "Include the scheme, e.g. http://127.0.0.1:5012/api".to_string(),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Validation {
                message: "requestTimeoutSecs must be at least 1".to_string(),
                suggestion: "Use a small positive timeout; 30 is the default".to_string(),
            });
        }
        if self.pacing.per_char_ms == 0 || self.pacing.per_char_recommended_ms == 0 {
            return Err(ConfigError::Validation {
                message: "pacing per-character rates must be positive".to_string(),
                suggestion: "Use perCharMs >= 1 and perCharRecommendedMs >= 1".to_string(),
            });
        }
        Ok(())
    }

    /// The per-request timeout as a [`Duration`].
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
