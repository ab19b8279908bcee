//! `ota-package` entrypoint.
//!
//! Packages a built binary as a release version and prints the path of the
//! version manifest on stdout.

use clap::Parser;
use log::error;
use otaship_common::logging;
use otaship_release::cli::{PackageCli, run_package};
use otaship_release::error::ReleaseError;
use otaship_release::packaging::PackageOutput;
use std::io::Write;

fn main() {
    let cli = PackageCli::parse();
    logging::init(cli.verbose);
    let mut stdout = std::io::stdout();
    let exit_code = exit_code_for(run_package(&cli), &mut stdout);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn exit_code_for(result: Result<PackageOutput, ReleaseError>, stdout: &mut dyn Write) -> i32 {
    match result {
        Ok(output) => {
            if writeln!(stdout, "{}", output.version_manifest.display()).is_err() {
                // Closed stdout does not undo a completed package.
            }
            0
        }
        Err(err) => {
            error!("{err}");
            err.exit_code()
        }
    }
}
