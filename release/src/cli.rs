//! Command-line definitions for `ota-deploy` and `ota-package`.
//!
//! The binaries stay thin: they parse one of the structures below, set up
//! logging, and call [`run_deploy`] or [`run_package`]. Transports are
//! injected through the `_with` variants so the whole command path can be
//! exercised in tests without a broker or server.

use crate::config::ToolSettings;
use crate::dispatch::{DeployRequest, DeploymentReport, DispatchOptions, deploy_version_with};
use crate::error::ReleaseError;
use crate::packaging::{PackageOutput, PackageParams, package_build};
use crate::transport::{HttpUploader, MqttPublisher, RumqttPublisher, UreqUploader};
use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use std::path::Path;

/// Deploy a firmware version over MQTT and HTTPS.
#[derive(Parser, Debug, Clone)]
#[command(name = "ota-deploy", about)]
#[command(long_about = concat!(
    "Deploy a firmware version over MQTT and HTTPS.\n\n",
    "Loads the root manifest, resolves the requested version, verifies the size ",
    "and SHA-256 digest of every artifact, and then delivers each artifact over ",
    "its declared protocols in manifest order. The first failure stops the run.",
))]
#[command(after_help = concat!(
    "EXIT STATUS:\n",
    "  0  every artifact was delivered (or simulated)\n",
    "  2  the manifest or a channel failed validation\n",
    "  1  any other failure\n\n",
    "EXAMPLES:\n",
    "  Preview a deployment:\n",
    "    $ ota-deploy --version 1.4.0 --dry-run\n\n",
    "  Deliver over HTTPS only:\n",
    "    $ ota-deploy --version 1.4.0 --transport https",
))]
pub struct DeployCli {
    /// Root manifest [default: settings file, else ota/manifest.json].
    #[arg(short, long, env = "OTASHIP_MANIFEST", value_name = "PATH")]
    pub manifest: Option<Utf8PathBuf>,

    /// Version identifier to deploy.
    #[arg(long, value_name = "ID")]
    pub version: String,

    /// Deliver only over this protocol (repeatable).
    #[arg(short, long = "transport", value_name = "PROTOCOL")]
    pub transports: Vec<String>,

    /// Validate and log intended deliveries without touching the network.
    #[arg(long)]
    pub dry_run: bool,

    /// Log per-step progress.
    #[arg(short, long)]
    pub verbose: bool,

    /// TOML settings file.
    #[arg(long, env = "OTASHIP_CONFIG", value_name = "PATH")]
    pub config: Option<Utf8PathBuf>,
}

/// Package a built firmware binary as a release version.
#[derive(Parser, Debug, Clone)]
#[command(name = "ota-package", about)]
#[command(after_help = concat!(
    "LAYOUT:\n",
    "  <output>/<version>/<artifact name>\n",
    "  <output>/<version>/ota.json\n\n",
    "EXAMPLES:\n",
    "  Package and file a release:\n",
    "    $ ota-package --binary build/fw.bin --version 1.4.0 --update-manifest",
))]
pub struct PackageCli {
    /// Root manifest [default: settings file, else ota/manifest.json].
    #[arg(short, long, env = "OTASHIP_MANIFEST", value_name = "PATH")]
    pub manifest: Option<Utf8PathBuf>,

    /// Built firmware binary.
    #[arg(short, long, value_name = "PATH")]
    pub binary: Utf8PathBuf,

    /// Version identifier to package.
    #[arg(long, value_name = "ID")]
    pub version: String,

    /// Artifact name [default: product name].
    #[arg(short, long, value_name = "NAME")]
    pub project: Option<String>,

    /// Output directory [default: versions/ beside the manifest].
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<Utf8PathBuf>,

    /// Artifact file name [default: <project>-<version>.bin].
    #[arg(long, value_name = "FILE")]
    pub artifact_name: Option<String>,

    /// Label for the root manifest entry.
    #[arg(short, long)]
    pub label: Option<String>,

    /// File the version in the root manifest.
    #[arg(short, long)]
    pub update_manifest: bool,

    /// Hash the binary and log intended writes without performing them.
    #[arg(long)]
    pub dry_run: bool,

    /// Log per-step progress.
    #[arg(short, long)]
    pub verbose: bool,

    /// TOML settings file.
    #[arg(long, env = "OTASHIP_CONFIG", value_name = "PATH")]
    pub config: Option<Utf8PathBuf>,
}

impl PackageCli {
    /// Build packaging parameters for the given root manifest.
    #[must_use]
    pub fn params(&self, manifest: &Path) -> PackageParams {
        PackageParams {
            manifest: manifest.to_path_buf(),
            binary: self.binary.clone().into_std_path_buf(),
            version: self.version.clone(),
            project: self.project.clone(),
            output_dir: self.output_dir.clone().map(Utf8PathBuf::into_std_path_buf),
            artifact_name: self.artifact_name.clone(),
            label: self.label.clone(),
            update_manifest: self.update_manifest,
            dry_run: self.dry_run,
        }
    }
}

fn load_settings(config: Option<&Utf8Path>) -> Result<ToolSettings, ReleaseError> {
    Ok(ToolSettings::load(config.map(Utf8Path::as_std_path))?)
}

/// Run the deploy command with the production transports.
///
/// # Errors
///
/// See [`run_deploy_with`].
pub fn run_deploy(cli: &DeployCli) -> Result<DeploymentReport, ReleaseError> {
    run_deploy_with(cli, &RumqttPublisher, &UreqUploader)
}

/// Run the deploy command through injected transports.
///
/// # Errors
///
/// Returns [`ReleaseError::Config`] when the settings file is invalid and
/// the errors of [`deploy_version_with`] otherwise.
pub fn run_deploy_with(
    cli: &DeployCli,
    mqtt: &dyn MqttPublisher,
    http: &dyn HttpUploader,
) -> Result<DeploymentReport, ReleaseError> {
    let settings = load_settings(cli.config.as_deref())?;
    let manifest = settings.manifest_path(cli.manifest.as_deref().map(Utf8Path::as_std_path));
    let request = DeployRequest {
        manifest: &manifest,
        version: &cli.version,
        settings: &settings,
        options: DispatchOptions::new(&cli.transports, cli.dry_run),
    };
    deploy_version_with(&request, mqtt, http)
}

/// Run the package command.
///
/// # Errors
///
/// Returns [`ReleaseError::Config`] when the settings file is invalid and
/// [`ReleaseError::Packaging`] when packaging fails.
pub fn run_package(cli: &PackageCli) -> Result<PackageOutput, ReleaseError> {
    let settings = load_settings(cli.config.as_deref())?;
    let manifest = settings.manifest_path(cli.manifest.as_deref().map(Utf8Path::as_std_path));
    Ok(package_build(&cli.params(&manifest))?)
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
