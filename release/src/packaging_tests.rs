//! Unit tests for release packaging.

use super::*;
use crate::artifact::iter_artifacts;
use crate::manifest::{load_version_manifest, resolve_version};
use otaship_common::sha256_hex;
use otaship_common::test_support::ReleaseTree;
use rstest::{fixture, rstest};
use serde_json::json;
use std::collections::BTreeMap;

const FIRMWARE: &[u8] = b"new firmware image";

#[fixture]
fn tree() -> ReleaseTree {
    let tree = ReleaseTree::new().expect("release tree");
    let entry = tree
        .write_artifact("1.0.0", "fw", "fw.bin", b"old firmware")
        .expect("artifact");
    tree.write_release(
        "1.0.0",
        &json!({"mqtt": {"broker": "mqtt://broker.test", "topic": "fw"}}),
        vec![entry],
    )
    .expect("release");
    tree
}

fn binary(tree: &ReleaseTree, contents: &[u8]) -> PathBuf {
    let path = tree.root().join("build").join("firmware.bin");
    fs::create_dir_all(path.parent().expect("parent")).expect("build dir");
    fs::write(&path, contents).expect("binary");
    path
}

fn params(tree: &ReleaseTree, version: &str) -> PackageParams {
    PackageParams {
        manifest: tree.manifest_path(),
        binary: binary(tree, FIRMWARE),
        version: version.to_owned(),
        ..PackageParams::default()
    }
}

fn root_versions(tree: &ReleaseTree) -> Vec<Value> {
    let text = fs::read_to_string(tree.manifest_path()).expect("root manifest");
    let document: Value = serde_json::from_str(&text).expect("json");
    document["versions"].as_array().cloned().expect("versions")
}

fn snapshot(dir: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    let mut files = BTreeMap::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        for entry in fs::read_dir(&current).expect("read dir") {
            let path = entry.expect("entry").path();
            if path.is_dir() {
                files.insert(path.clone(), Vec::new());
                pending.push(path);
            } else {
                let contents = fs::read(&path).expect("read file");
                files.insert(path, contents);
            }
        }
    }
    files
}

#[rstest]
fn writes_binary_and_version_manifest(tree: ReleaseTree) {
    let output = package_build(&params(&tree, "2.0.0")).expect("package");

    let version_dir = tree.version_dir("2.0.0");
    assert_eq!(output.version_manifest, absolute(&version_dir.join("ota.json")).expect("abs"));
    assert_eq!(
        output.artifact_path.file_name().and_then(|n| n.to_str()),
        Some("Gateway Firmware-2.0.0.bin")
    );
    assert_eq!(fs::read(&output.artifact_path).expect("copied"), FIRMWARE);
    assert!(!output.manifest_updated);

    let written: Value =
        serde_json::from_str(&fs::read_to_string(&output.version_manifest).expect("read"))
            .expect("json");
    let artifact = &written["artifacts"][0];
    assert_eq!(written["version"], "2.0.0");
    assert_eq!(artifact["name"], "Gateway Firmware");
    assert_eq!(artifact["size"], FIRMWARE.len());
    assert_eq!(artifact["sha256"], sha256_hex(FIRMWARE).into_inner());
    assert_eq!(artifact["protocols"], json!(["mqtt", "https"]));
    assert_eq!(artifact["channels"]["mqtt"]["topic"], "fw");
    assert_eq!(written["channels"], artifact["channels"]);
    assert!(written["created_at"].as_str().is_some_and(|s| s.ends_with('Z')));
}

#[rstest]
fn version_manifest_text_is_sorted_and_newline_terminated(tree: ReleaseTree) {
    let output = package_build(&params(&tree, "2.0.0")).expect("package");
    let text = fs::read_to_string(&output.version_manifest).expect("read");

    assert!(text.ends_with("}\n"));
    assert!(text.contains("\n  \"artifacts\": ["));
    let artifacts = text.find("\"artifacts\"").expect("artifacts key");
    let version = text.find("\"version\"").expect("version key");
    assert!(artifacts < version);
}

#[rstest]
fn overrides_project_file_name_and_output(tree: ReleaseTree) {
    let output_dir = tree.root().join("releases");
    let output = package_build(&PackageParams {
        project: Some("gateway".to_owned()),
        artifact_name: Some("gw.bin".to_owned()),
        output_dir: Some(output_dir.clone()),
        ..params(&tree, "2.0.0")
    })
    .expect("package");

    assert!(output.artifact_path.ends_with("releases/2.0.0/gw.bin"));
    assert_eq!(output.document.artifacts[0].name, "gateway");
    assert!(output_dir.join("2.0.0/ota.json").is_file());
}

#[rstest]
fn packaged_version_deploys_cleanly(tree: ReleaseTree) {
    package_build(&PackageParams {
        update_manifest: true,
        ..params(&tree, "2.0.0")
    })
    .expect("package");

    let manifest = load_manifest(&tree.manifest_path()).expect("root manifest");
    let entry = resolve_version(&manifest, "2.0.0").expect("filed");
    let version = load_version_manifest(entry).expect("version manifest");
    let artifacts: Vec<_> = iter_artifacts(&manifest, &version)
        .collect::<Result<_, _>>()
        .expect("verified");
    assert_eq!(artifacts.len(), 1);
    assert_eq!(artifacts[0].size(), FIRMWARE.len() as u64);
}

#[rstest]
fn update_appends_then_replaces_in_place(tree: ReleaseTree) {
    let first = package_build(&PackageParams {
        update_manifest: true,
        label: Some("beta".to_owned()),
        ..params(&tree, "2.0.0")
    })
    .expect("first package");
    assert!(first.manifest_updated);
    assert_eq!(
        root_versions(&tree),
        [
            json!({"id": "1.0.0", "manifest": "versions/1.0.0/ota.json"}),
            json!({"id": "2.0.0", "manifest": "versions/2.0.0/ota.json", "label": "beta"}),
        ]
    );

    let mut second = params(&tree, "2.0.0");
    second.binary = binary(&tree, b"rebuilt firmware");
    second.output_dir = Some(tree.root().join("releases"));
    second.update_manifest = true;
    package_build(&second).expect("second package");

    assert_eq!(
        root_versions(&tree),
        [
            json!({"id": "1.0.0", "manifest": "versions/1.0.0/ota.json"}),
            json!({"id": "2.0.0", "manifest": "releases/2.0.0/ota.json", "label": "beta"}),
        ]
    );
}

#[rstest]
fn root_rewrite_preserves_other_fields(tree: ReleaseTree) {
    let mut document: Value =
        serde_json::from_str(&fs::read_to_string(tree.manifest_path()).expect("read")).expect("json");
    document["product"]["hardware"] = json!("rev-c");
    document["notes"] = json!({"owner": "firmware team"});
    tree.write_root(&document).expect("root");

    package_build(&PackageParams {
        update_manifest: true,
        ..params(&tree, "2.0.0")
    })
    .expect("package");

    let text = fs::read_to_string(tree.manifest_path()).expect("read");
    assert!(text.ends_with('\n'));
    let rewritten: Value = serde_json::from_str(&text).expect("json");
    assert_eq!(rewritten["product"]["hardware"], "rev-c");
    assert_eq!(rewritten["notes"]["owner"], "firmware team");
    assert!(lock_path(&tree.manifest_path()).is_file());
}

#[rstest]
fn dry_run_writes_nothing(tree: ReleaseTree) {
    let params = PackageParams {
        update_manifest: true,
        dry_run: true,
        ..params(&tree, "2.0.0")
    };
    let before = snapshot(tree.root());

    let output = package_build(&params).expect("dry run");

    assert_eq!(snapshot(tree.root()), before);
    assert!(!output.manifest_updated);
    assert_eq!(output.document.artifacts[0].sha256, sha256_hex(FIRMWARE).into_inner());
}

#[rstest]
fn missing_binary_is_reported(tree: ReleaseTree) {
    let err = package_build(&PackageParams {
        binary: tree.root().join("absent.bin"),
        ..params(&tree, "2.0.0")
    })
    .expect_err("missing binary");
    assert!(matches!(err, PackagingError::BinaryNotFound { .. }));
}

#[rstest]
#[case::empty("")]
#[case::separator("2.0/1")]
#[case::backslash("2.0\\1")]
#[case::parent("..")]
fn rejects_unsafe_version_ids(tree: ReleaseTree, #[case] version: &str) {
    let err = package_build(&params(&tree, version)).expect_err("invalid id");
    assert!(matches!(err, PackagingError::Manifest(ManifestError::InvalidField { .. })));
}

#[rstest]
fn rejects_artifact_names_with_directories(tree: ReleaseTree) {
    let err = package_build(&PackageParams {
        artifact_name: Some("../escape.bin".to_owned()),
        ..params(&tree, "2.0.0")
    })
    .expect_err("invalid file name");
    assert!(matches!(err, PackagingError::Manifest(ManifestError::InvalidField { .. })));
}

#[rstest]
fn output_outside_manifest_root_cannot_be_filed(tree: ReleaseTree) {
    let elsewhere = tempfile::tempdir().expect("temp dir");
    let err = package_build(&PackageParams {
        output_dir: Some(elsewhere.path().to_path_buf()),
        update_manifest: true,
        ..params(&tree, "2.0.0")
    })
    .expect_err("outside root");
    assert!(matches!(err, PackagingError::OutsideManifestRoot { .. }));
}

#[rstest]
fn update_requires_versions_list() {
    let mut document = json!({"schema_version": 1});
    let entry = VersionEntry {
        id: "1.0.0".to_owned(),
        manifest: "versions/1.0.0/ota.json".to_owned(),
        label: None,
    };
    let err = apply_entry(&mut document, &entry).expect_err("no versions");
    assert_eq!(err.to_string(), "'versions' must be a list");
}

#[rstest]
#[case::plain("versions/1.0.0/ota.json")]
#[case::nested("a/b/c/ota.json")]
fn posix_joins_with_forward_slashes(#[case] relative: &str) {
    let path: PathBuf = relative.split('/').collect();
    assert_eq!(posix(&path), relative);
}
