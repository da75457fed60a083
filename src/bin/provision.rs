// src/bin/provision.rs

use clap::Parser;
use shipyard::cli::ProvisionArgs;
use shipyard::{ProvisionOutcome, logging, output, run_provision};

#[tokio::main]
async fn main() {
    let args = ProvisionArgs::parse();
    if let Err(err) = logging::init_logging(args.common.log_level) {
        eprintln!("provision error: {err:?}");
        std::process::exit(1);
    }

    let result = run_provision(&args).await;
    let code = output::emit("provision", args.common.json, result, |outcome| match outcome {
        ProvisionOutcome::DryRun { script, .. } => script.clone(),
        ProvisionOutcome::Provisioned(report) => format!("provisioned {}", report.host),
    });
    std::process::exit(code);
}
