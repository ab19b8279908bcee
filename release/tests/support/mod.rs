//! Shared fixtures for the release behaviour suites.

use otaship_common::test_support::ReleaseTree;
use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Contents of the single artifact written by [`release_tree`].
pub const FIRMWARE: &[u8] = b"temporary firmware";

/// Return the workspace root (parent of the release crate).
pub fn workspace_root() -> PathBuf {
    PathBuf::from(std::env!("CARGO_MANIFEST_DIR"))
        .parent()
        .expect("manifest dir should have parent")
        .to_owned()
}

/// Return the path of the checked-in sample root manifest.
pub fn sample_manifest() -> PathBuf {
    workspace_root().join("ota").join("manifest.json")
}

/// Copy the sample release tree into a fresh temporary directory.
pub fn copy_sample_tree() -> TempDir {
    let dir = TempDir::new().expect("temp dir");
    copy_dir(&workspace_root().join("ota"), dir.path());
    dir
}

fn copy_dir(from: &Path, to: &Path) {
    fs::create_dir_all(to).expect("create dir");
    for entry in fs::read_dir(from).expect("read dir") {
        let entry = entry.expect("dir entry");
        let target = to.join(entry.file_name());
        if entry.path().is_dir() {
            copy_dir(&entry.path(), &target);
        } else {
            fs::copy(entry.path(), &target).expect("copy file");
        }
    }
}

/// Lay out a release tree declaring `version` with one `fw` artifact and
/// MQTT plus HTTPS deployment channels.
pub fn release_tree(version: &str) -> ReleaseTree {
    let tree = ReleaseTree::new().expect("release tree");
    let entry = tree
        .write_artifact(version, "fw", "fw.bin", FIRMWARE)
        .expect("artifact");
    tree.write_release(version, &default_channels(), vec![entry])
        .expect("release");
    tree
}

/// Deployment channels used by [`release_tree`].
pub fn default_channels() -> Value {
    json!({
        "mqtt": {"broker": "mqtt://broker.test", "topic": "fw/gateway", "qos": 1},
        "https": {"url": "https://updates.test/fw", "method": "PUT"}
    })
}

/// Read a JSON document from disk.
pub fn read_json(path: &Path) -> Value {
    let text = fs::read_to_string(path).expect("read json");
    serde_json::from_str(&text).expect("parse json")
}
