// src/bin/release.rs

use clap::Parser;
use shipyard::cli::ReleaseArgs;
use shipyard::{logging, output, run_release};

#[tokio::main]
async fn main() {
    let args = ReleaseArgs::parse();
    if let Err(err) = logging::init_logging(args.common.log_level) {
        eprintln!("release error: {err:?}");
        std::process::exit(1);
    }

    let result = run_release(&args).await;
    let code = output::emit("release", args.common.json, result, |release| {
        release.identifier.to_string()
    });
    std::process::exit(code);
}
