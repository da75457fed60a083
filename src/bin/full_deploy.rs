// src/bin/full_deploy.rs

use clap::Parser;
use shipyard::cli::FullDeployArgs;
use shipyard::{logging, output, run_full_deploy};

#[tokio::main]
async fn main() {
    let args = FullDeployArgs::parse();
    if let Err(err) = logging::init_logging(args.common.log_level) {
        eprintln!("full_deploy error: {err:?}");
        std::process::exit(1);
    }

    let result = run_full_deploy(&args).await;
    let code = output::emit("full_deploy", args.common.json, result, |outcome| {
        format!(
            "released and deployed {} to {}",
            outcome.release.identifier, outcome.deploy.host
        )
    });
    std::process::exit(code);
}
