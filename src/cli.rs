// src/cli.rs

//! CLI argument parsing using `clap`.
//!
//! Each binary has its own argument struct; the shared flags live in
//! [`CommonArgs`] and are flattened into every one of them.

use clap::{Args, Parser, ValueEnum};

/// Flags accepted by every command.
#[derive(Debug, Clone, Args)]
pub struct CommonArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Shipyard.toml` in the current working directory; when that
    /// file does not exist the built-in defaults are used.
    #[arg(long, value_name = "PATH", default_value = "Shipyard.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SHIPYARD_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Print the result (or the failure) as a JSON object on stdout.
    #[arg(long)]
    pub json: bool,
}

/// Mint a release marker at the current commit and publish it.
#[derive(Debug, Clone, Parser)]
#[command(name = "release", version, long_about = None)]
pub struct ReleaseArgs {
    #[command(flatten)]
    pub common: CommonArgs,
}

/// Deploy an existing release to the host.
#[derive(Debug, Clone, Parser)]
#[command(name = "deploy", version, long_about = None)]
pub struct DeployArgs {
    /// Release identifier, e.g. `release-20250101120000-abcd123`.
    pub release: String,

    /// User to log in as on the host.
    pub host_user: String,

    /// Host name or IP address.
    pub host_address: String,

    /// Print the remote script instead of running it.
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the configured health check.
    #[arg(long)]
    pub no_health_check: bool,

    #[command(flatten)]
    pub common: CommonArgs,
}

/// Mint a release, then deploy the newest release to the host.
#[derive(Debug, Clone, Parser)]
#[command(name = "full_deploy", version, long_about = None)]
pub struct FullDeployArgs {
    pub host_user: String,

    pub host_address: String,

    /// Skip the configured health check.
    #[arg(long)]
    pub no_health_check: bool,

    #[command(flatten)]
    pub common: CommonArgs,
}

/// Prepare a bare host so it can be deployed to.
#[derive(Debug, Clone, Parser)]
#[command(name = "provision", version, long_about = None)]
pub struct ProvisionArgs {
    pub host_user: String,

    pub host_address: String,

    /// Delete and recreate the project directory. First-time setup only:
    /// anything the server stored there is lost.
    #[arg(long)]
    pub fresh: bool,

    /// Print the remote script instead of running it.
    #[arg(long)]
    pub dry_run: bool,

    #[command(flatten)]
    pub common: CommonArgs,
}

/// Show the host's checked-out commit and server process state.
#[derive(Debug, Clone, Parser)]
#[command(name = "host_status", version, long_about = None)]
pub struct HostStatusArgs {
    pub host_user: String,

    pub host_address: String,

    #[command(flatten)]
    pub common: CommonArgs,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deploy_takes_three_positionals() {
        let args = DeployArgs::try_parse_from([
            "deploy",
            "release-20250101120000-abcd123",
            "bob",
            "10.0.0.5",
            "--json",
        ])
        .unwrap();
        assert_eq!(args.release, "release-20250101120000-abcd123");
        assert_eq!(args.host_user, "bob");
        assert_eq!(args.host_address, "10.0.0.5");
        assert!(args.common.json);
        assert_eq!(args.common.config, "Shipyard.toml");
    }

    #[test]
    fn release_takes_no_positionals() {
        assert!(ReleaseArgs::try_parse_from(["release", "extra"]).is_err());
        assert!(ReleaseArgs::try_parse_from(["release", "--log-level", "debug"]).is_ok());
    }

    #[test]
    fn full_deploy_requires_host() {
        assert!(FullDeployArgs::try_parse_from(["full_deploy", "bob"]).is_err());
    }
}
