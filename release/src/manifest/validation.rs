//! Structural validation of root and version manifests.
//!
//! Validation walks the raw JSON first so every failure can name the exact
//! field at fault, then builds the typed model. Nothing partially built is
//! returned on failure.

use super::error::{ManifestError, Result};
use super::loader::{FsStore, ManifestStore};
use super::model::{
    Channel, ChannelMap, DEFAULT_PROTOCOLS, DeploymentConfig, Manifest, ManifestParts,
    ManifestVersion,
};
use super::version::VersionManifest;
use otaship_common::Sha256Digest;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

fn ensure(condition: bool, message: impl FnOnce() -> String) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(ManifestError::invalid(message()))
    }
}

/// Validate a root manifest document read from `path`.
///
/// When `base_dir` is supplied, every referenced version manifest must exist
/// under it. Version manifest paths are resolved against `base_dir`, or the
/// directory of `path` when none is given.
///
/// # Errors
///
/// Returns [`ManifestError`] describing the first violated constraint.
///
/// # Examples
///
/// ```
/// use otaship_release::manifest::validate_manifest;
/// use serde_json::json;
/// use std::path::Path;
///
/// let document = json!({
///     "schema_version": 1,
///     "product": {"name": "Gateway"},
///     "versions": [{"id": "1.0.0", "manifest": "versions/1.0.0/ota.json"}],
/// });
/// let manifest = validate_manifest(document, Path::new("ota/manifest.json"), None)
///     .expect("valid manifest");
/// assert_eq!(manifest.deployment().default_protocols(), ["mqtt", "https"]);
/// ```
pub fn validate_manifest(document: Value, path: &Path, base_dir: Option<&Path>) -> Result<Manifest> {
    validate_manifest_with(document, path, base_dir, &FsStore)
}

/// Validate a root manifest document, checking file existence via `store`.
///
/// # Errors
///
/// See [`validate_manifest`].
pub fn validate_manifest_with(
    document: Value,
    path: &Path,
    base_dir: Option<&Path>,
    store: &dyn ManifestStore,
) -> Result<Manifest> {
    let root = document
        .as_object()
        .ok_or_else(|| ManifestError::invalid("the manifest must be a JSON object"))?;

    let schema_version = root
        .get("schema_version")
        .and_then(Value::as_i64)
        .ok_or_else(|| ManifestError::invalid("'schema_version' must be an integer"))?;

    let product = root
        .get("product")
        .and_then(Value::as_object)
        .cloned()
        .ok_or_else(|| ManifestError::invalid("'product' section is required"))?;

    let deployment = parse_deployment(root.get("deployment"))?;

    let entries = root
        .get("versions")
        .and_then(Value::as_array)
        .filter(|entries| !entries.is_empty())
        .ok_or_else(|| ManifestError::invalid("'versions' must be a non-empty list"))?;

    let resolve_dir = base_dir.unwrap_or_else(|| path.parent().unwrap_or_else(|| Path::new("")));
    let mut seen = BTreeSet::new();
    let mut versions = Vec::with_capacity(entries.len());
    for entry in entries {
        let version = parse_version_entry(entry, resolve_dir)?;
        if !seen.insert(version.identifier().to_owned()) {
            return Err(ManifestError::DuplicateVersion {
                version: version.identifier().to_owned(),
            });
        }
        if base_dir.is_some() && !store.exists(version.manifest_path()) {
            return Err(ManifestError::MissingVersionManifest {
                version: version.identifier().to_owned(),
                manifest: manifest_reference(entry),
            });
        }
        versions.push(version);
    }

    Ok(Manifest::from_parts(ManifestParts {
        path: path.to_path_buf(),
        schema_version,
        product,
        deployment,
        versions,
        raw: document,
    }))
}

fn parse_deployment(section: Option<&Value>) -> Result<DeploymentConfig> {
    let Some(section) = section else {
        return Ok(DeploymentConfig::default());
    };
    let section = section
        .as_object()
        .ok_or_else(|| ManifestError::invalid("'deployment' must be an object when provided"))?;

    let channels = match section.get("channels") {
        Some(value) => channel_records(value, "deployment.channels")?,
        None => ChannelMap::new(),
    };
    let channels: BTreeMap<String, Channel> = channels
        .into_iter()
        .map(|(name, config)| (name.clone(), Channel::new(name, config)))
        .collect();

    let default_protocols = match section.get("default_protocols") {
        Some(value) => string_list(value).ok_or_else(|| {
            ManifestError::invalid("'deployment.default_protocols' must be a list of protocol names")
        })?,
        None => DEFAULT_PROTOCOLS.iter().map(|&p| p.to_owned()).collect(),
    };

    Ok(DeploymentConfig::new(channels, default_protocols))
}

fn parse_version_entry(entry: &Value, resolve_dir: &Path) -> Result<ManifestVersion> {
    let entry = entry
        .as_object()
        .ok_or_else(|| ManifestError::invalid("each entry in 'versions' must be an object"))?;
    let id = entry
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| ManifestError::invalid("each version requires an 'id' string"))?;
    let manifest = entry.get("manifest").and_then(Value::as_str).ok_or_else(|| {
        ManifestError::invalid(format!("version '{id}' must define a 'manifest' path"))
    })?;
    let label = match entry.get("label") {
        None | Some(Value::Null) => None,
        Some(Value::String(label)) => Some(label.clone()),
        Some(_) => {
            return Err(ManifestError::invalid(format!(
                "version '{id}' label must be a string"
            )));
        }
    };
    Ok(ManifestVersion::new(id, label, resolve_dir.join(manifest)))
}

fn manifest_reference(entry: &Value) -> String {
    entry
        .get("manifest")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned()
}

/// Check that `value` is a record of records and return it as a channel map.
fn channel_records(value: &Value, field: &str) -> Result<ChannelMap> {
    let records = value
        .as_object()
        .ok_or_else(|| ManifestError::invalid(format!("'{field}' must be an object")))?;
    records
        .iter()
        .map(|(name, config)| {
            config
                .as_object()
                .cloned()
                .map(|config| (name.clone(), config))
                .ok_or_else(|| {
                    ManifestError::invalid(format!("channel '{name}' in '{field}' must be a JSON object"))
                })
        })
        .collect()
}

fn string_list(value: &Value) -> Option<Vec<String>> {
    value
        .as_array()?
        .iter()
        .map(|item| item.as_str().map(str::to_owned))
        .collect()
}

/// Validate a version manifest document read from `path`.
///
/// The document's own `version` field must equal `expected`; a manifest
/// copied under the wrong id is never accepted.
///
/// # Errors
///
/// Returns [`ManifestError`] describing the first violated constraint.
pub fn validate_version_manifest(
    document: Value,
    path: &Path,
    expected: &str,
) -> Result<VersionManifest> {
    let root = document
        .as_object()
        .ok_or_else(|| ManifestError::invalid("the version manifest must be a JSON object"))?;

    let found = root.get("version").and_then(Value::as_str).unwrap_or("<missing>");
    if found != expected {
        return Err(ManifestError::VersionMismatch {
            expected: expected.to_owned(),
            found: found.to_owned(),
        });
    }

    optional_string(root, "created_at")?;
    optional_string(root, "base_path")?;
    if let Some(channels) = root.get("channels") {
        channel_records(channels, "channels")?;
    }

    let artifacts = root
        .get("artifacts")
        .and_then(Value::as_array)
        .filter(|artifacts| !artifacts.is_empty())
        .ok_or_else(|| {
            ManifestError::invalid("the version manifest must provide at least one artifact")
        })?;
    for artifact in artifacts {
        check_artifact(artifact)?;
    }

    let mut manifest: VersionManifest =
        serde_json::from_value(document).map_err(|err| ManifestError::Parse {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
    manifest.path = path.to_path_buf();
    Ok(manifest)
}

fn optional_string(record: &Map<String, Value>, field: &str) -> Result<()> {
    ensure(
        record.get(field).is_none_or(Value::is_string),
        || format!("'{field}' must be a string when provided"),
    )
}

fn check_artifact(artifact: &Value) -> Result<()> {
    let record = artifact
        .as_object()
        .ok_or_else(|| ManifestError::invalid("artifacts must be JSON objects"))?;
    for key in ["name", "filename", "size", "sha256"] {
        ensure(record.contains_key(key), || {
            format!("artifact is missing required key '{key}'")
        })?;
    }
    let name = record
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| ManifestError::invalid("artifact 'name' must be a string"))?;
    ensure(record.get("filename").is_some_and(Value::is_string), || {
        format!("artifact '{name}' filename must be a string")
    })?;
    ensure(record.get("size").is_some_and(Value::is_u64), || {
        format!("artifact '{name}' size must be a non-negative integer")
    })?;
    let digest = record
        .get("sha256")
        .and_then(Value::as_str)
        .ok_or_else(|| ManifestError::invalid(format!("artifact '{name}' sha256 must be a string")))?;
    digest.parse::<Sha256Digest>().map_err(|err| ManifestError::InvalidDigest {
        artifact: name.to_owned(),
        source: err,
    })?;

    if let Some(protocols) = record.get("protocols") {
        let protocols = string_list(protocols).filter(|list| !list.is_empty());
        ensure(protocols.is_some(), || {
            format!("artifact '{name}': when provided, 'protocols' must be a non-empty list")
        })?;
    }
    if let Some(channels) = record.get("channels") {
        channel_records(channels, &format!("artifacts.{name}.channels"))?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "validation_tests.rs"]
mod tests;
