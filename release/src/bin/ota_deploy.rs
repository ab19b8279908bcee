//! `ota-deploy` entrypoint.
//!
//! Delivers one firmware version from the release manifest. Exit status is 0
//! on success, 2 for validation failures and 1 for anything else.

use clap::Parser;
use log::{error, info};
use otaship_common::logging;
use otaship_release::cli::{DeployCli, run_deploy};
use otaship_release::dispatch::{DeploymentReport, Outcome};
use otaship_release::error::ReleaseError;

fn main() {
    let cli = DeployCli::parse();
    logging::init(cli.verbose);
    let exit_code = exit_code_for(run_deploy(&cli));
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn exit_code_for(result: Result<DeploymentReport, ReleaseError>) -> i32 {
    match result {
        Ok(report) => {
            info!(
                "deployment complete: {} delivered, {} simulated, {} skipped",
                report.count(Outcome::Delivered),
                report.count(Outcome::Simulated),
                report.count(Outcome::Skipped)
            );
            0
        }
        Err(ReleaseError::Dispatch(failure)) => {
            for delivery in failure.completed.deliveries() {
                info!(
                    "completed before failure: {} over {} ({})",
                    delivery.artifact, delivery.protocol, delivery.outcome
                );
            }
            let err = ReleaseError::Dispatch(failure);
            error!("{err}");
            err.exit_code()
        }
        Err(err) => {
            error!("{err}");
            err.exit_code()
        }
    }
}
