//! Behaviour-driven tests for channel merging and artifact integrity.
//!
//! Scenarios edit a release tree on disk, then resolve its artifacts through
//! the public resolver. Values in steps are JSON literals.

mod support;

use otaship_common::test_support::ReleaseTree;
use otaship_release::artifact::{VersionArtifact, iter_artifacts};
use otaship_release::manifest::{
    ManifestError, load_manifest, load_version_manifest, resolve_version,
};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use serde_json::{Value, json};
use std::fs;
use std::path::PathBuf;

const VERSION: &str = "1.0.0";

#[derive(Default)]
struct ArtifactWorld {
    tree: Option<ReleaseTree>,
    artifacts: Vec<VersionArtifact>,
    error: Option<ManifestError>,
}

#[fixture]
fn world() -> ArtifactWorld {
    ArtifactWorld::default()
}

fn tree(world: &ArtifactWorld) -> &ReleaseTree {
    world.tree.as_ref().expect("release tree set")
}

fn literal(text: &str) -> Value {
    serde_json::from_str(text).expect("JSON literal")
}

fn version_manifest_path(world: &ArtifactWorld) -> PathBuf {
    tree(world).version_dir(VERSION).join("ota.json")
}

fn edit_version(world: &ArtifactWorld, edit: impl FnOnce(&mut Value)) {
    let mut document = support::read_json(&version_manifest_path(world));
    edit(&mut document);
    tree(world)
        .write_version(VERSION, &document)
        .expect("rewrite version manifest");
}

fn set_field(record: &mut Value, protocol: &str, field: &str, value: Value) {
    if !record.is_object() {
        *record = json!({});
    }
    let channel = record
        .as_object_mut()
        .expect("channels object")
        .entry(protocol.to_owned())
        .or_insert_with(|| json!({}));
    channel[field] = value;
}

fn resolved(world: &ArtifactWorld) -> &VersionArtifact {
    assert!(world.error.is_none(), "resolution failed: {:?}", world.error);
    world.artifacts.first().expect("one artifact")
}

// ---------------------------------------------------------------------------
// Step definitions
// ---------------------------------------------------------------------------

#[given("a release tree with version \"{version}\"")]
fn given_release_tree(world: &mut ArtifactWorld, version: String) {
    assert_eq!(version, VERSION);
    world.tree = Some(support::release_tree(&version));
}

#[given("the artifact overrides {protocol} field \"{field}\" with {value}")]
fn given_artifact_override(world: &mut ArtifactWorld, protocol: String, field: String, value: String) {
    edit_version(world, |document| {
        set_field(
            &mut document["artifacts"][0]["channels"],
            &protocol,
            &field,
            literal(&value),
        );
    });
}

#[given("the version overrides {protocol} field \"{field}\" with {value}")]
fn given_version_override(world: &mut ArtifactWorld, protocol: String, field: String, value: String) {
    edit_version(world, |document| {
        set_field(&mut document["channels"], &protocol, &field, literal(&value));
    });
}

#[given("the deployment sets {protocol} field \"{field}\" to {value}")]
fn given_deployment_field(world: &mut ArtifactWorld, protocol: String, field: String, value: String) {
    let tree = tree(world);
    let mut document = support::read_json(&tree.manifest_path());
    set_field(
        &mut document["deployment"]["channels"],
        &protocol,
        &field,
        literal(&value),
    );
    tree.write_root(&document).expect("rewrite root manifest");
}

#[given("the artifact declares size {size}")]
fn given_declared_size(world: &mut ArtifactWorld, size: u64) {
    edit_version(world, |document| {
        document["artifacts"][0]["size"] = Value::from(size);
    });
}

#[given("the artifact file is replaced with \"{contents}\"")]
fn given_artifact_replaced(world: &mut ArtifactWorld, contents: String) {
    let path = tree(world).version_dir(VERSION).join("fw.bin");
    fs::write(path, contents).expect("replace artifact");
}

#[given("the artifact file is deleted")]
fn given_artifact_deleted(world: &mut ArtifactWorld) {
    fs::remove_file(tree(world).version_dir(VERSION).join("fw.bin")).expect("remove artifact");
}

#[when("the artifacts are resolved")]
fn when_resolved(world: &mut ArtifactWorld) {
    let manifest = load_manifest(&tree(world).manifest_path()).expect("root manifest");
    let entry = resolve_version(&manifest, VERSION).expect("version declared");
    let version = load_version_manifest(entry).expect("version manifest");
    match iter_artifacts(&manifest, &version).collect::<Result<Vec<_>, _>>() {
        Ok(artifacts) => world.artifacts = artifacts,
        Err(err) => world.error = Some(err),
    }
}

#[then("the resolved {protocol} channel has \"{field}\" equal to {value}")]
fn then_channel_field(world: &mut ArtifactWorld, protocol: String, field: String, value: String) {
    let channel = resolved(world).channel(&protocol).expect("channel resolved");
    assert_eq!(channel.get(&field), Some(&literal(&value)));
}

#[then("the artifact protocols are \"{protocols}\"")]
fn then_protocols(world: &mut ArtifactWorld, protocols: String) {
    let expected: Vec<&str> = protocols.split(',').collect();
    assert_eq!(resolved(world).protocols(), expected.as_slice());
}

#[then("resolution fails with \"{text}\"")]
fn then_resolution_fails(world: &mut ArtifactWorld, text: String) {
    let err = world.error.as_ref().expect("an error was recorded");
    let message = err.to_string();
    assert!(message.contains(&text), "unexpected error: {message}");
    assert!(world.artifacts.is_empty());
}

// ---------------------------------------------------------------------------
// Scenario bindings
// ---------------------------------------------------------------------------

#[scenario(
    path = "tests/features/artifact_resolution.feature",
    name = "Artifact overrides merge per key over deployment defaults"
)]
fn scenario_artifact_overrides(world: ArtifactWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/artifact_resolution.feature",
    name = "Version overrides sit between deployment and artifact tiers"
)]
fn scenario_three_tiers(world: ArtifactWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/artifact_resolution.feature",
    name = "Nested channel values are replaced whole"
)]
fn scenario_shallow_merge(world: ArtifactWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/artifact_resolution.feature",
    name = "Protocols default to the deployment defaults"
)]
fn scenario_default_protocols(world: ArtifactWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/artifact_resolution.feature",
    name = "A size mismatch stops resolution"
)]
fn scenario_size_mismatch(world: ArtifactWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/artifact_resolution.feature",
    name = "A checksum mismatch stops resolution"
)]
fn scenario_checksum_mismatch(world: ArtifactWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/artifact_resolution.feature",
    name = "A missing artifact file stops resolution"
)]
fn scenario_missing_file(world: ArtifactWorld) {
    let _ = world;
}
