//! Deployment dispatch.
//!
//! Artifacts are delivered strictly in declaration order, and each
//! artifact's protocols in their declared order. The first error aborts the
//! run; the [`DispatchFailure`] it produces carries the report of every leaf
//! completed before it, so callers can tell exactly what reached the field.
//!
//! Dry-run derives every transport parameter exactly as a live run does and
//! logs the intended delivery instead of touching the network.

use crate::artifact::{VersionArtifact, iter_artifacts};
use crate::config::ToolSettings;
use crate::error::ReleaseError;
use crate::manifest::{ManifestError, load_manifest, load_version_manifest, resolve_version};
use crate::transport::{
    HttpSettings, HttpUploader, MqttPublisher, MqttSettings, Protocol, RumqttPublisher,
    TransportError, UreqUploader,
};
use log::{debug, info};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Caller-controlled dispatch behaviour.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchOptions {
    transports: Option<BTreeSet<String>>,
    dry_run: bool,
}

impl DispatchOptions {
    /// Create options from a transport allow-list and the dry-run flag.
    ///
    /// An empty allow-list permits every protocol. Names are compared
    /// without regard to ASCII case.
    #[must_use]
    pub fn new<S: AsRef<str>>(transports: &[S], dry_run: bool) -> Self {
        let transports = (!transports.is_empty()).then(|| {
            transports
                .iter()
                .map(|name| name.as_ref().to_ascii_lowercase())
                .collect()
        });
        Self {
            transports,
            dry_run,
        }
    }

    /// Return whether delivery is simulated.
    #[must_use]
    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    /// Return whether `protocol` (already lower-cased) passes the allow-list.
    #[must_use]
    pub fn allows(&self, protocol: &str) -> bool {
        self.transports
            .as_ref()
            .is_none_or(|allowed| allowed.contains(protocol))
    }
}

/// What happened to one (artifact, protocol) leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The transport completed the delivery.
    Delivered,
    /// Dry-run: parameters were derived and the delivery was logged.
    Simulated,
    /// The protocol was excluded by the transport allow-list.
    Skipped,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Delivered => "delivered",
            Self::Simulated => "simulated",
            Self::Skipped => "skipped",
        })
    }
}

/// One completed leaf of a dispatch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Artifact name.
    pub artifact: String,
    /// Protocol name, lower-cased.
    pub protocol: String,
    /// What happened.
    pub outcome: Outcome,
}

/// Per-leaf record of a dispatch run, in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeploymentReport {
    deliveries: Vec<Delivery>,
}

impl DeploymentReport {
    /// Return the recorded leaves in processing order.
    #[must_use]
    pub fn deliveries(&self) -> &[Delivery] {
        &self.deliveries
    }

    /// Count the leaves with the given outcome.
    #[must_use]
    pub fn count(&self, outcome: Outcome) -> usize {
        self.deliveries
            .iter()
            .filter(|delivery| delivery.outcome == outcome)
            .count()
    }

    fn record(&mut self, artifact: &str, protocol: &str, outcome: Outcome) {
        self.deliveries.push(Delivery {
            artifact: artifact.to_owned(),
            protocol: protocol.to_owned(),
            outcome,
        });
    }
}

/// The error that stopped a dispatch run.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The artifact or its channel failed validation.
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    /// Live delivery failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// A dispatch run aborted by its first error.
#[derive(Debug, Error)]
#[error("deploying artifact '{artifact}' over {protocol} failed: {source}")]
pub struct DispatchFailure {
    /// Artifact being processed when the error occurred.
    pub artifact: String,
    /// Protocol being processed when the error occurred.
    pub protocol: String,
    /// Leaves completed before the error.
    pub completed: DeploymentReport,
    /// The error itself.
    pub source: Box<DispatchError>,
}

impl DispatchFailure {
    /// Return whether the run stopped on a validation error rather than a
    /// transport error.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(*self.source, DispatchError::Manifest(_))
    }
}

/// Delivers resolved artifacts through injected transports.
pub struct Dispatcher<'a> {
    mqtt: &'a dyn MqttPublisher,
    http: &'a dyn HttpUploader,
    settings: &'a ToolSettings,
    options: &'a DispatchOptions,
}

impl<'a> Dispatcher<'a> {
    /// Create a dispatcher over the given transports.
    #[must_use]
    pub fn new(
        mqtt: &'a dyn MqttPublisher,
        http: &'a dyn HttpUploader,
        settings: &'a ToolSettings,
        options: &'a DispatchOptions,
    ) -> Self {
        Self {
            mqtt,
            http,
            settings,
            options,
        }
    }

    /// Deliver every artifact over each of its protocols, in order.
    ///
    /// # Errors
    ///
    /// Returns a [`DispatchFailure`] for the first leaf that fails. No later
    /// leaf is attempted.
    pub fn dispatch(&self, artifacts: &[VersionArtifact]) -> Result<DeploymentReport, DispatchFailure> {
        let mut report = DeploymentReport::default();
        for artifact in artifacts {
            for declared in artifact.protocols() {
                let protocol = declared.to_ascii_lowercase();
                match self.deliver(artifact, &protocol) {
                    Ok(outcome) => report.record(artifact.name(), &protocol, outcome),
                    Err(err) => {
                        return Err(DispatchFailure {
                            artifact: artifact.name().to_owned(),
                            protocol,
                            completed: report,
                            source: Box::new(err),
                        });
                    }
                }
            }
        }
        Ok(report)
    }

    fn deliver(&self, artifact: &VersionArtifact, protocol: &str) -> Result<Outcome, DispatchError> {
        if !self.options.allows(protocol) {
            debug!("skipping {protocol} for {}: not in transport filter", artifact.name());
            return Ok(Outcome::Skipped);
        }
        let channel = artifact
            .channel(protocol)
            .ok_or_else(|| ManifestError::MissingChannel {
                artifact: artifact.name().to_owned(),
                protocol: protocol.to_owned(),
            })?;
        match protocol.parse::<Protocol>()? {
            Protocol::Mqtt => {
                let settings = MqttSettings::from_channel(artifact.name(), channel, &self.settings.mqtt)?;
                self.publish(artifact, &settings)
            }
            Protocol::Https => {
                let settings = HttpSettings::from_channel(channel, &self.settings.https)?;
                self.upload(artifact, &settings)
            }
        }
    }

    fn publish(&self, artifact: &VersionArtifact, settings: &MqttSettings) -> Result<Outcome, DispatchError> {
        if self.options.dry_run() {
            info!(
                "[MQTT] Would publish {} ({} bytes, qos={}) to {} on {}",
                artifact.source().display(),
                artifact.size(),
                settings.qos,
                settings.topic,
                settings.broker
            );
            return Ok(Outcome::Simulated);
        }
        let payload = read_payload(artifact)?;
        debug!(
            "connecting to {}:{} as {}",
            settings.host, settings.port, settings.client_id
        );
        self.mqtt.publish(settings, &payload)?;
        info!(
            "[MQTT] Published {} ({} bytes, qos={}) to {} on {}",
            artifact.name(),
            payload.len(),
            settings.qos,
            settings.topic,
            settings.broker
        );
        Ok(Outcome::Delivered)
    }

    fn upload(&self, artifact: &VersionArtifact, settings: &HttpSettings) -> Result<Outcome, DispatchError> {
        if self.options.dry_run() {
            info!(
                "[HTTPS] Would send {} ({} bytes) to {} via {}",
                artifact.source().display(),
                artifact.size(),
                settings.url,
                settings.method
            );
            return Ok(Outcome::Simulated);
        }
        let payload = read_payload(artifact)?;
        let status = self.http.upload(settings, &payload)?;
        info!(
            "[HTTPS] Sent {} ({} bytes) to {} via {}: status {status}",
            artifact.name(),
            payload.len(),
            settings.url,
            settings.method
        );
        Ok(Outcome::Delivered)
    }
}

fn read_payload(artifact: &VersionArtifact) -> Result<Vec<u8>, TransportError> {
    std::fs::read(artifact.source()).map_err(|source| TransportError::Payload {
        path: artifact.source().to_path_buf(),
        source,
    })
}

/// What to deploy and how.
#[derive(Debug, Clone)]
pub struct DeployRequest<'a> {
    /// Path of the root manifest.
    pub manifest: &'a Path,
    /// Version identifier to deploy.
    pub version: &'a str,
    /// Transport fallbacks.
    pub settings: &'a ToolSettings,
    /// Allow-list and dry-run flag.
    pub options: DispatchOptions,
}

/// Deploy a version using the production MQTT and HTTP transports.
///
/// # Errors
///
/// See [`deploy_version_with`].
pub fn deploy_version(request: &DeployRequest<'_>) -> Result<DeploymentReport, ReleaseError> {
    deploy_version_with(request, &RumqttPublisher, &UreqUploader)
}

/// Deploy a version through injected transports.
///
/// Loads and validates the root manifest, resolves the requested version,
/// verifies every artifact, and only then starts delivery. An integrity
/// failure in any artifact therefore stops the run before anything is sent.
///
/// # Errors
///
/// Returns [`ReleaseError::Manifest`] when loading, validation, or
/// verification fails and [`ReleaseError::Dispatch`] when delivery stops.
pub fn deploy_version_with(
    request: &DeployRequest<'_>,
    mqtt: &dyn MqttPublisher,
    http: &dyn HttpUploader,
) -> Result<DeploymentReport, ReleaseError> {
    let manifest = load_manifest(request.manifest)?;
    let entry = resolve_version(&manifest, request.version)?;
    let version = load_version_manifest(entry)?;
    let artifacts = iter_artifacts(&manifest, &version).collect::<Result<Vec<_>, _>>()?;
    debug!(
        "resolved {} artifact(s) for version {}",
        artifacts.len(),
        request.version
    );

    let dispatcher = Dispatcher::new(mqtt, http, request.settings, &request.options);
    let report = dispatcher.dispatch(&artifacts)?;
    info!(
        "version {}: {} delivered, {} simulated, {} skipped",
        request.version,
        report.count(Outcome::Delivered),
        report.count(Outcome::Simulated),
        report.count(Outcome::Skipped)
    );
    Ok(report)
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
