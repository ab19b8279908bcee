//! Tool settings loaded from an optional TOML file.
//!
//! Settings supply the middle tier of transport configuration: a channel
//! record always wins, the settings file fills in what a channel leaves out,
//! and built-in defaults cover the rest. The file is optional; without one
//! every value takes its built-in default.
//!
//! ```toml
//! manifest = "ota/manifest.json"
//!
//! [mqtt]
//! keepalive_secs = 30
//! qos = 0
//!
//! [https]
//! timeout_secs = 10
//! method = "POST"
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Manifest path used when neither the command line nor settings name one.
pub const DEFAULT_MANIFEST: &str = "ota/manifest.json";

/// Errors raised while loading tool settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The settings file could not be read.
    #[error("cannot read settings file {path}: {source}")]
    Read {
        /// Path of the settings file.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The settings file is not valid TOML or has unknown keys.
    #[error("invalid settings: {reason}")]
    Parse {
        /// Description of the parse failure.
        reason: String,
    },

    /// A setting holds a value outside its permitted range.
    #[error("invalid setting '{field}': {reason}")]
    Invalid {
        /// Dotted name of the offending setting.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Settings shared by the deploy and package tools.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ToolSettings {
    /// Root manifest path used when the command line does not give one.
    pub manifest: Option<PathBuf>,
    /// Fallbacks for MQTT channel fields.
    pub mqtt: MqttDefaults,
    /// Fallbacks for HTTPS channel fields.
    pub https: HttpDefaults,
}

impl ToolSettings {
    /// Parse settings from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or unknown keys and
    /// [`ConfigError::Invalid`] for out-of-range values.
    ///
    /// # Examples
    ///
    /// ```
    /// use otaship_release::config::ToolSettings;
    ///
    /// let settings = ToolSettings::from_toml_str("[mqtt]\nqos = 2\n").expect("settings");
    /// assert_eq!(settings.mqtt.qos, 2);
    /// assert_eq!(settings.https.method, "PUT");
    /// ```
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let settings: Self = toml::from_str(source).map_err(|err| ConfigError::Parse {
            reason: err.to_string(),
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from `path`, or return the defaults when no path is
    /// given.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] when the file cannot be read, and the
    /// errors of [`Self::from_toml_str`] otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        log::debug!("loading settings from {}", path.display());
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Resolve the root manifest path: the command line first, then the
    /// settings file, then [`DEFAULT_MANIFEST`].
    #[must_use]
    pub fn manifest_path(&self, cli: Option<&Path>) -> PathBuf {
        cli.or(self.manifest.as_deref())
            .map_or_else(|| PathBuf::from(DEFAULT_MANIFEST), Path::to_path_buf)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.mqtt.qos > 2 {
            return Err(ConfigError::Invalid {
                field: "mqtt.qos",
                reason: format!("{} is not one of 0, 1, 2", self.mqtt.qos),
            });
        }
        if u16::try_from(self.mqtt.keepalive_secs).is_err() {
            return Err(ConfigError::Invalid {
                field: "mqtt.keepalive_secs",
                reason: format!("must be at most {} seconds", u16::MAX),
            });
        }
        if self.https.timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "https.timeout_secs",
                reason: "must be greater than zero".to_owned(),
            });
        }
        if self.https.method.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "https.method",
                reason: "must not be empty".to_owned(),
            });
        }
        Ok(())
    }
}

/// Fallback values for MQTT channel fields.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct MqttDefaults {
    /// Keep-alive interval in seconds.
    pub keepalive_secs: u64,
    /// Quality of service level, 0 to 2.
    pub qos: u8,
}

impl Default for MqttDefaults {
    fn default() -> Self {
        Self {
            keepalive_secs: 60,
            qos: 1,
        }
    }
}

/// Fallback values for HTTPS channel fields.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct HttpDefaults {
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// HTTP method used for uploads.
    pub method: String,
}

impl Default for HttpDefaults {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            method: "PUT".to_owned(),
        }
    }
}
