//! Delivery transports: MQTT publish and HTTP(S) upload.
//!
//! Each transport parses its typed settings from an open channel record and
//! owns the validation of its fields. Network access sits behind a trait
//! ([`MqttPublisher`], [`HttpUploader`]) so dispatch can run against test
//! doubles.

pub mod https;
pub mod mqtt;
mod tls;

use crate::manifest::{ChannelConfig, ManifestError};
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

pub use https::{HttpSettings, HttpUploader, UreqUploader};
pub use mqtt::{MqttPublisher, MqttSettings, RumqttPublisher};

#[cfg(any(test, feature = "test-support"))]
pub use https::MockHttpUploader;
#[cfg(any(test, feature = "test-support"))]
pub use mqtt::MockMqttPublisher;

/// A built-in delivery protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// Publish the artifact to an MQTT broker.
    Mqtt,
    /// Upload the artifact over HTTP or HTTPS.
    Https,
}

impl Protocol {
    /// Return the lowercase protocol name used in manifests.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mqtt => "mqtt",
            Self::Https => "https",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = ManifestError;

    /// Parse a protocol name, ignoring ASCII case.
    ///
    /// # Examples
    ///
    /// ```
    /// use otaship_release::transport::Protocol;
    ///
    /// assert_eq!("MQTT".parse::<Protocol>().ok(), Some(Protocol::Mqtt));
    /// assert!("ftp".parse::<Protocol>().is_err());
    /// ```
    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.to_ascii_lowercase().as_str() {
            "mqtt" => Ok(Self::Mqtt),
            "https" => Ok(Self::Https),
            _ => Err(ManifestError::UnsupportedProtocol {
                protocol: name.to_owned(),
            }),
        }
    }
}

/// Errors raised by live network delivery.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The MQTT client failed to connect, publish, or receive the
    /// acknowledgement.
    #[error("MQTT publish to {broker} failed: {reason}")]
    Mqtt {
        /// Broker address as configured.
        broker: String,
        /// Description of the client failure.
        reason: String,
    },

    /// The HTTP request could not be completed.
    #[error("HTTP {method} {url} failed: {reason}")]
    Http {
        /// Request method.
        method: String,
        /// Target URL.
        url: String,
        /// Description of the client failure.
        reason: String,
    },

    /// The server answered with a non-success status.
    #[error("HTTP {method} {url} returned status {status}")]
    Status {
        /// Request method.
        method: String,
        /// Target URL.
        url: String,
        /// The status code received.
        status: u16,
    },

    /// The artifact payload could not be read.
    #[error("cannot read payload {path}: {source}")]
    Payload {
        /// Path of the artifact file.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Typed access to optional channel fields.
///
/// Every accessor returns `Ok(None)` for an absent or `null` field and a
/// [`ManifestError::ChannelField`] when the field has the wrong type.
struct Fields<'a> {
    protocol: &'static str,
    channel: &'a ChannelConfig,
}

impl<'a> Fields<'a> {
    const fn new(protocol: &'static str, channel: &'a ChannelConfig) -> Self {
        Self { protocol, channel }
    }

    fn get(&self, field: &str) -> Option<&'a Value> {
        self.channel.get(field).filter(|value| !value.is_null())
    }

    fn error(&self, field: &'static str, problem: impl Into<String>) -> ManifestError {
        ManifestError::channel_field(self.protocol, field, problem)
    }

    fn string(&self, field: &'static str) -> Result<Option<&'a str>, ManifestError> {
        self.get(field)
            .map(|value| value.as_str().ok_or_else(|| self.error(field, "must be a string")))
            .transpose()
    }

    fn required_string(&self, field: &'static str) -> Result<&'a str, ManifestError> {
        self.string(field)?
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| self.error(field, "is required"))
    }

    fn boolean(&self, field: &'static str) -> Result<Option<bool>, ManifestError> {
        self.get(field)
            .map(|value| value.as_bool().ok_or_else(|| self.error(field, "must be a boolean")))
            .transpose()
    }

    fn unsigned(&self, field: &'static str) -> Result<Option<u64>, ManifestError> {
        self.get(field)
            .map(|value| {
                value
                    .as_u64()
                    .ok_or_else(|| self.error(field, "must be a non-negative integer"))
            })
            .transpose()
    }

    fn number(&self, field: &'static str) -> Result<Option<f64>, ManifestError> {
        self.get(field)
            .map(|value| value.as_f64().ok_or_else(|| self.error(field, "must be a number")))
            .transpose()
    }
}
