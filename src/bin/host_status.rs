// src/bin/host_status.rs

use clap::Parser;
use shipyard::cli::HostStatusArgs;
use shipyard::{logging, output, run_host_status};

fn or_unknown(value: Option<&str>) -> &str {
    value.unwrap_or("unknown")
}

#[tokio::main]
async fn main() {
    let args = HostStatusArgs::parse();
    if let Err(err) = logging::init_logging(args.common.log_level) {
        eprintln!("host_status error: {err:?}");
        std::process::exit(1);
    }

    let result = run_host_status(&args).await;
    let code = output::emit("host_status", args.common.json, result, |status| {
        let s = &status.snapshot;
        let pid = s.pid.map(|p| p.to_string());
        let matching = s
            .matching_pids
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        format!(
            "host:     {}\nhead:     {}\nrelease:  {}\npid:      {} ({})\nmatching: {}",
            status.host,
            or_unknown(s.head.as_deref()),
            or_unknown(s.release.as_deref()),
            or_unknown(pid.as_deref()),
            if s.alive { "running" } else { "not running" },
            if matching.is_empty() { "none" } else { matching.as_str() },
        )
    });
    std::process::exit(code);
}
