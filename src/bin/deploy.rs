// src/bin/deploy.rs

use clap::Parser;
use shipyard::cli::DeployArgs;
use shipyard::{DeployOutcome, logging, output, run_deploy};

#[tokio::main]
async fn main() {
    let args = DeployArgs::parse();
    if let Err(err) = logging::init_logging(args.common.log_level) {
        eprintln!("deploy error: {err:?}");
        std::process::exit(1);
    }

    let result = run_deploy(&args).await;
    let code = output::emit("deploy", args.common.json, result, |outcome| match outcome {
        DeployOutcome::DryRun { script, .. } => script.clone(),
        DeployOutcome::Deployed(report) => match report.pid {
            Some(pid) => format!("deployed {} to {} (pid {pid})", report.release, report.host),
            None => format!("deployed {} to {}", report.release, report.host),
        },
    });
    std::process::exit(code);
}
