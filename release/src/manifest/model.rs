//! Typed root manifest: product metadata, deployment defaults, and the
//! version index.
//!
//! A [`Manifest`] is built once per command invocation from the root
//! manifest file. Its [`ManifestVersion`] entries only record where each
//! version manifest lives; the version manifests themselves are loaded on
//! demand through [`super::loader::load_version_manifest`].

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Open, protocol-specific channel configuration record.
pub type ChannelConfig = Map<String, Value>;

/// Channel name to configuration record.
pub type ChannelMap = BTreeMap<String, ChannelConfig>;

/// Protocols used when neither the artifact nor the manifest names any.
pub const DEFAULT_PROTOCOLS: [&str; 2] = ["mqtt", "https"];

/// Product name used when the manifest does not declare one.
pub const FALLBACK_PRODUCT_NAME: &str = "firmware";

/// A named delivery configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    name: String,
    config: ChannelConfig,
}

impl Channel {
    /// Create a channel from its name and configuration record.
    #[must_use]
    pub fn new(name: impl Into<String>, config: ChannelConfig) -> Self {
        Self {
            name: name.into(),
            config,
        }
    }

    /// Return the channel name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Return the configuration record.
    #[must_use]
    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }
}

/// Deployment defaults owned by the root manifest.
///
/// Holds the lowest-precedence tier of channel configuration and the
/// protocol list applied to artifacts that do not declare their own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentConfig {
    channels: BTreeMap<String, Channel>,
    default_protocols: Vec<String>,
}

impl DeploymentConfig {
    /// Create a deployment configuration.
    #[must_use]
    pub fn new(channels: BTreeMap<String, Channel>, default_protocols: Vec<String>) -> Self {
        Self {
            channels,
            default_protocols,
        }
    }

    /// Return the default channels keyed by name.
    #[must_use]
    pub fn channels(&self) -> &BTreeMap<String, Channel> {
        &self.channels
    }

    /// Return the default protocol list.
    #[must_use]
    pub fn default_protocols(&self) -> &[String] {
        &self.default_protocols
    }

    /// Return a copy of the default channel configurations.
    #[must_use]
    pub fn channel_configs(&self) -> ChannelMap {
        self.channels
            .iter()
            .map(|(name, channel)| (name.clone(), channel.config().clone()))
            .collect()
    }
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            channels: BTreeMap::new(),
            default_protocols: DEFAULT_PROTOCOLS.iter().map(|&p| p.to_owned()).collect(),
        }
    }
}

/// One entry of the root manifest's version index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestVersion {
    identifier: String,
    label: Option<String>,
    manifest_path: PathBuf,
}

impl ManifestVersion {
    /// Create a version entry.
    #[must_use]
    pub fn new(
        identifier: impl Into<String>,
        label: Option<String>,
        manifest_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            label,
            manifest_path: manifest_path.into(),
        }
    }

    /// Return the version identifier.
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Return the optional human-readable label.
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Return the resolved path of the version manifest.
    #[must_use]
    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }
}

/// The validated root release manifest.
#[derive(Debug, Clone)]
pub struct Manifest {
    path: PathBuf,
    schema_version: i64,
    product: Map<String, Value>,
    deployment: DeploymentConfig,
    versions: Vec<ManifestVersion>,
    raw: Value,
}

/// Parts of a [`Manifest`], grouped so the constructor stays small.
#[derive(Debug, Clone)]
pub struct ManifestParts {
    /// Path the root manifest was read from.
    pub path: PathBuf,
    /// Declared schema version.
    pub schema_version: i64,
    /// Opaque product metadata.
    pub product: Map<String, Value>,
    /// Deployment defaults.
    pub deployment: DeploymentConfig,
    /// Version index in declaration order.
    pub versions: Vec<ManifestVersion>,
    /// The document as read, kept for in-place rewrites.
    pub raw: Value,
}

impl Manifest {
    /// Assemble a manifest from already validated parts.
    #[must_use]
    pub fn from_parts(parts: ManifestParts) -> Self {
        Self {
            path: parts.path,
            schema_version: parts.schema_version,
            product: parts.product,
            deployment: parts.deployment,
            versions: parts.versions,
            raw: parts.raw,
        }
    }

    /// Return the path the manifest was read from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Return the directory containing the manifest.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    /// Return the schema version.
    #[must_use]
    pub fn schema_version(&self) -> i64 {
        self.schema_version
    }

    /// Return the product metadata record.
    #[must_use]
    pub fn product(&self) -> &Map<String, Value> {
        &self.product
    }

    /// Return the product name, or `"firmware"` when none is declared.
    #[must_use]
    pub fn product_name(&self) -> &str {
        self.product
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or(FALLBACK_PRODUCT_NAME)
    }

    /// Return the deployment defaults.
    #[must_use]
    pub fn deployment(&self) -> &DeploymentConfig {
        &self.deployment
    }

    /// Return the version index in declaration order.
    #[must_use]
    pub fn versions(&self) -> &[ManifestVersion] {
        &self.versions
    }

    /// Look up a version entry by identifier.
    #[must_use]
    pub fn version(&self, identifier: &str) -> Option<&ManifestVersion> {
        self.versions.iter().find(|v| v.identifier() == identifier)
    }

    /// Return the raw JSON document.
    #[must_use]
    pub fn raw(&self) -> &Value {
        &self.raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn manifest_with_product(product: Value) -> Manifest {
        Manifest::from_parts(ManifestParts {
            path: PathBuf::from("/srv/ota/manifest.json"),
            schema_version: 1,
            product: product.as_object().cloned().unwrap_or_default(),
            deployment: DeploymentConfig::default(),
            versions: vec![ManifestVersion::new(
                "0.0.1",
                None,
                "/srv/ota/versions/0.0.1/ota.json",
            )],
            raw: json!({}),
        })
    }

    #[test]
    fn default_deployment_uses_mqtt_then_https() {
        let deployment = DeploymentConfig::default();
        assert_eq!(deployment.default_protocols(), ["mqtt", "https"]);
        assert!(deployment.channels().is_empty());
    }

    #[test]
    fn product_name_falls_back_to_firmware() {
        assert_eq!(manifest_with_product(json!({})).product_name(), "firmware");
        assert_eq!(
            manifest_with_product(json!({"name": "Gateway"})).product_name(),
            "Gateway"
        );
    }

    #[test]
    fn base_dir_is_manifest_parent() {
        let manifest = manifest_with_product(json!({}));
        assert_eq!(manifest.base_dir(), Path::new("/srv/ota"));
        assert!(manifest.version("0.0.1").is_some());
        assert!(manifest.version("0.0.2").is_none());
    }
}
