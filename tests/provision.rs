// tests/provision.rs

mod common;
use crate::common::{ConfigFileBuilder, SimulatedHost, init_tracing, release_id, remote_with_release};

use std::error::Error;

use shipyard::deploy::Deployer;
use shipyard::errors::{ErrorKind, ShipyardError};
use shipyard::provision::{ProvisionOptions, Provisioner};
use shipyard::types::{DependencyIsolation, Stage};

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn bare_host_becomes_deployable() -> TestResult {
    init_tracing();
    let cfg = ConfigFileBuilder::new().build();
    let host = SimulatedHost::bare("bob", "10.0.0.5", &cfg, remote_with_release());

    let early = Deployer::new(host.clone(), cfg.clone())
        .deploy(&release_id())
        .await
        .unwrap_err();
    assert_eq!(early.stage(), Some(Stage::Fetch));

    let report = Provisioner::new(host.clone(), cfg.clone())
        .provision(ProvisionOptions::default())
        .await?;
    assert!(report.ok);
    assert!(!report.fresh);
    assert_eq!(report.isolation, DependencyIsolation::Sandboxed);
    assert!(host.packages_installed());
    assert!(host.is_cloned());
    assert!(host.environment_ready());

    Deployer::new(host.clone(), cfg).deploy(&release_id()).await?;
    assert_eq!(host.servers().len(), 1);
    Ok(())
}

#[tokio::test]
async fn provisioning_twice_is_harmless() -> TestResult {
    let cfg = ConfigFileBuilder::new().build();
    let host = SimulatedHost::new("bob", "10.0.0.5", &cfg, remote_with_release());
    let pid = host.spawn_server("release-20241231235959-0123456");
    let provisioner = Provisioner::new(host.clone(), cfg);

    provisioner.provision(ProvisionOptions::default()).await?;
    provisioner.provision(ProvisionOptions::default()).await?;

    assert!(host.is_running(pid));
    assert_eq!(host.recorded_pid(), Some(pid));
    Ok(())
}

#[tokio::test]
async fn fresh_provisioning_recreates_project_state() -> TestResult {
    let cfg = ConfigFileBuilder::new().build();
    let host = SimulatedHost::new("bob", "10.0.0.5", &cfg, remote_with_release());
    Deployer::new(host.clone(), cfg.clone()).deploy(&release_id()).await?;
    assert!(host.head().is_some());

    let report = Provisioner::new(host.clone(), cfg)
        .provision(ProvisionOptions { fresh: true })
        .await?;

    assert!(report.fresh);
    assert!(host.servers().is_empty());
    assert_eq!(host.head(), None);
    assert_eq!(host.recorded_release(), None);
    assert!(host.is_cloned());
    Ok(())
}

#[tokio::test]
async fn fresh_provisioning_refuses_while_unrecorded_server_runs() -> TestResult {
    let cfg = ConfigFileBuilder::new().build();
    let host = SimulatedHost::new("bob", "10.0.0.5", &cfg, remote_with_release());
    Deployer::new(host.clone(), cfg.clone()).deploy(&release_id()).await?;
    let stray = host.spawn("python main.py");

    let err = Provisioner::new(host.clone(), cfg)
        .provision(ProvisionOptions { fresh: true })
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ShipyardError::Provision {
            stage: Stage::StopPrevious,
            ..
        }
    ));
    assert!(host.is_running(stray));
    // The directory was not wiped.
    assert!(host.head().is_some());
    Ok(())
}

#[tokio::test]
async fn stage_failure_is_reported_with_its_stage() -> TestResult {
    let cfg = ConfigFileBuilder::new().build();
    let host = SimulatedHost::bare("bob", "10.0.0.5", &cfg, remote_with_release());
    host.fail_at(Stage::CloneRepository);

    let err = Provisioner::new(host.clone(), cfg)
        .provision(ProvisionOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ProvisionError);
    assert!(matches!(
        err,
        ShipyardError::Provision {
            stage: Stage::CloneRepository,
            ..
        }
    ));
    assert!(host.packages_installed());
    assert!(!host.is_cloned());
    Ok(())
}

#[tokio::test]
async fn repository_url_is_required() -> TestResult {
    let cfg = ConfigFileBuilder::new().without_repository_url().build();
    let host = SimulatedHost::bare("bob", "10.0.0.5", &cfg, remote_with_release());

    let err = Provisioner::new(host.clone(), cfg)
        .provision(ProvisionOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ConfigError);
    assert!(host.scripts().is_empty());
    Ok(())
}

#[test]
fn plan_owner_defaults_to_login_user() -> TestResult {
    let cfg = ConfigFileBuilder::new().build();
    let host = SimulatedHost::bare("bob", "10.0.0.5", &cfg, remote_with_release());

    let script = Provisioner::new(host, cfg).plan(ProvisionOptions::default())?;
    let text = script.render();

    assert_eq!(
        script.stages(),
        vec![
            Stage::InstallPackages,
            Stage::PrepareDirectory,
            Stage::CloneRepository,
            Stage::CreateEnvironment,
        ]
    );
    assert!(text.contains("$SUDO chown bob: /srv/app || exit 61"));
    assert!(text.contains("python3-venv"));
    Ok(())
}
