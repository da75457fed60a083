// src/lib.rs

pub mod cli;
pub mod config;
pub mod deploy;
pub mod errors;
pub mod exec;
pub mod host;
pub mod logging;
pub mod output;
pub mod provision;
pub mod release;
pub mod types;

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::cli::{
    CommonArgs, DeployArgs, FullDeployArgs, HostStatusArgs, ProvisionArgs, ReleaseArgs,
};
use crate::config::{ConfigFile, default_config_path, load_and_validate, load_or_default};
use crate::deploy::{DeployReport, Deployer};
use crate::errors::{Result, ShipyardError};
use crate::exec::{CommandRunner, TokioCommandRunner};
use crate::host::{Host, HostSnapshot, RemoteSession, SshSession, inspect_host};
use crate::provision::{ProvisionOptions, ProvisionReport, Provisioner};
use crate::release::{GitCli, Release, ReleaseId, ReleaseManager, Repository};

/// Result of `deploy`: either the planned script or the finished deploy.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DeployOutcome {
    DryRun { release: String, host: Host, script: String },
    Deployed(DeployReport),
}

#[derive(Debug, Clone, Serialize)]
pub struct FullDeployOutcome {
    pub release: Release,
    pub deploy: DeployReport,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ProvisionOutcome {
    DryRun { host: Host, script: String },
    Provisioned(ProvisionReport),
}

#[derive(Debug, Clone, Serialize)]
pub struct HostStatus {
    pub host: Host,
    #[serde(flatten)]
    pub snapshot: HostSnapshot,
}

/// Load the config named on the command line.
///
/// Only the default path may be absent; an explicitly named file must exist.
pub fn load_config(common: &CommonArgs) -> Result<ConfigFile> {
    let path = PathBuf::from(&common.config);
    if path == default_config_path() {
        load_or_default(&path)
    } else {
        load_and_validate(&path)
    }
}

fn command_runner() -> Arc<dyn CommandRunner> {
    Arc::new(TokioCommandRunner::new())
}

fn ssh_session(cfg: &ConfigFile, user: &str, address: &str) -> Result<SshSession> {
    let host = Host::new(user, address, cfg.project.path.clone())?;
    Ok(SshSession::new(host, cfg.transport.clone(), command_runner()))
}

fn release_manager(cfg: &ConfigFile) -> ReleaseManager<GitCli> {
    ReleaseManager::new(GitCli::new(command_runner()), cfg.release.clone())
}

/// Entry point of the `release` binary.
pub async fn run_release(args: &ReleaseArgs) -> Result<Release> {
    let cfg = load_config(&args.common)?;
    release_manager(&cfg).mint().await
}

/// Entry point of the `deploy` binary.
pub async fn run_deploy(args: &DeployArgs) -> Result<DeployOutcome> {
    let cfg = load_config(&args.common)?;
    // Existence is only checked on the host, after fetching.
    let release = ReleaseId::parse_with_prefix(&args.release, &cfg.release.prefix)?;
    let session = ssh_session(&cfg, &args.host_user, &args.host_address)?;
    let mut deployer = Deployer::new(session, cfg);
    if args.no_health_check {
        deployer = deployer.with_health_check(None);
    }

    if args.dry_run {
        return Ok(DeployOutcome::DryRun {
            release: release.to_string(),
            host: deployer.host().clone(),
            script: deployer.plan(&release).render(),
        });
    }

    deployer.deploy(&release).await.map(DeployOutcome::Deployed)
}

/// Entry point of the `full_deploy` binary.
pub async fn run_full_deploy(args: &FullDeployArgs) -> Result<FullDeployOutcome> {
    let cfg = load_config(&args.common)?;
    let manager = release_manager(&cfg);
    let session = ssh_session(&cfg, &args.host_user, &args.host_address)?;
    let mut deployer = Deployer::new(session, cfg);
    if args.no_health_check {
        deployer = deployer.with_health_check(None);
    }
    release_then_deploy(&manager, &deployer).await
}

/// Mint a release, resolve the newest release, and deploy it.
///
/// Stops before touching the host if minting fails.
pub async fn release_then_deploy<R, S>(
    manager: &ReleaseManager<R>,
    deployer: &Deployer<S>,
) -> Result<FullDeployOutcome>
where
    R: Repository,
    S: RemoteSession,
{
    let minted = manager.mint().await?;
    let latest = manager
        .latest_release()
        .await?
        .ok_or_else(|| ShipyardError::Resolution {
            identifier: minted.identifier.to_string(),
            detail: "no releases found after minting".to_string(),
        })?;
    if latest != minted.identifier {
        warn!(minted = %minted.identifier, latest = %latest, "newest release differs from the one just minted");
    }
    let release = manager.resolve(&latest).await?;
    info!(release = %release.identifier, host = %deployer.host(), "deploying newest release");
    let deploy = deployer.deploy(&release.identifier).await?;
    Ok(FullDeployOutcome { release, deploy })
}

/// Entry point of the `provision` binary.
pub async fn run_provision(args: &ProvisionArgs) -> Result<ProvisionOutcome> {
    let cfg = load_config(&args.common)?;
    let session = ssh_session(&cfg, &args.host_user, &args.host_address)?;
    let provisioner = Provisioner::new(session, cfg);
    let options = ProvisionOptions { fresh: args.fresh };

    if args.dry_run {
        return Ok(ProvisionOutcome::DryRun {
            host: provisioner.host().clone(),
            script: provisioner.plan(options)?.render(),
        });
    }

    provisioner.provision(options).await.map(ProvisionOutcome::Provisioned)
}

/// Entry point of the `host_status` binary.
pub async fn run_host_status(args: &HostStatusArgs) -> Result<HostStatus> {
    let cfg = load_config(&args.common)?;
    let session = ssh_session(&cfg, &args.host_user, &args.host_address)?;
    let snapshot = inspect_host(&session, &cfg).await?;
    Ok(HostStatus {
        host: session.host().clone(),
        snapshot,
    })
}
