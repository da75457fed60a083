// tests/deploy_pipeline.rs

mod common;
use crate::common::{
    COMMIT, ConfigFileBuilder, RELEASE, deploy_fixture, init_tracing, release_id,
};

use std::error::Error;

use shipyard::errors::{ErrorKind, ShipyardError};
use shipyard::host::inspect_host;
use shipyard::release::ReleaseId;
use shipyard::types::{Stage, StopPolicy};

type TestResult = Result<(), Box<dyn Error>>;

const OLD_RELEASE: &str = "release-20241231235959-0123456";

#[tokio::test]
async fn deploy_replaces_running_server_with_release() -> TestResult {
    init_tracing();
    let (host, deployer) = deploy_fixture(ConfigFileBuilder::new().build());
    let old = host.spawn_server(OLD_RELEASE);

    let report = deployer.deploy(&release_id()).await?;

    assert!(report.ok);
    assert_eq!(report.release, RELEASE);
    assert_eq!(report.host.to_string(), "bob@10.0.0.5:/srv/app");
    assert_eq!(report.previous_release.as_deref(), Some(OLD_RELEASE));
    assert_eq!(report.stopped, vec![old]);
    assert_eq!(report.head.as_deref(), Some(COMMIT));

    assert!(!host.is_running(old));
    let servers = host.servers();
    assert_eq!(servers.len(), 1);
    assert_eq!(report.pid, Some(servers[0]));
    assert_eq!(host.head().as_deref(), Some(COMMIT));
    assert_eq!(host.recorded_release().as_deref(), Some(RELEASE));
    Ok(())
}

#[tokio::test]
async fn redeploying_keeps_exactly_one_server() -> TestResult {
    init_tracing();
    let (host, deployer) = deploy_fixture(ConfigFileBuilder::new().build());

    let first = deployer.deploy(&release_id()).await?;
    let second = deployer.deploy(&release_id()).await?;

    assert_eq!(host.servers(), vec![second.pid.unwrap()]);
    assert_eq!(second.stopped, vec![first.pid.unwrap()]);
    assert_eq!(second.previous_release.as_deref(), Some(RELEASE));
    Ok(())
}

#[tokio::test]
async fn first_deploy_has_nothing_to_stop() -> TestResult {
    let (host, deployer) = deploy_fixture(ConfigFileBuilder::new().build());

    let report = deployer.deploy(&release_id()).await?;

    assert!(report.stopped.is_empty());
    assert_eq!(report.previous_release, None);
    assert_eq!(host.servers().len(), 1);
    Ok(())
}

#[tokio::test]
async fn unknown_release_leaves_host_untouched() -> TestResult {
    init_tracing();
    let (host, deployer) = deploy_fixture(ConfigFileBuilder::new().build());
    let old = host.spawn_server(OLD_RELEASE);
    let missing: ReleaseId = "release-20250202000000-fffffff".parse()?;

    let err = deployer.deploy(&missing).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ResolutionError);
    assert_eq!(err.stage(), Some(Stage::Resolve));
    assert!(err.to_string().contains("release-20250202000000-fffffff"));
    assert!(host.is_running(old));
    assert_eq!(host.servers(), vec![old]);
    assert_eq!(host.head(), None);
    assert_eq!(host.recorded_release().as_deref(), Some(OLD_RELEASE));
    Ok(())
}

#[tokio::test]
async fn launch_failure_after_stop_leaves_no_server() -> TestResult {
    let (host, deployer) = deploy_fixture(ConfigFileBuilder::new().build());
    let old = host.spawn_server(OLD_RELEASE);
    host.fail_at(Stage::Launch);

    let err = deployer.deploy(&release_id()).await.unwrap_err();

    assert!(matches!(
        err,
        ShipyardError::ProcessControl {
            stage: Stage::Launch,
            ..
        }
    ));
    assert!(!err.is_retryable());
    assert!(!host.is_running(old));
    assert!(host.servers().is_empty());
    Ok(())
}

#[tokio::test]
async fn dependency_failure_keeps_old_server_running() -> TestResult {
    let (host, deployer) = deploy_fixture(ConfigFileBuilder::new().build());
    let old = host.spawn_server(OLD_RELEASE);
    host.fail_at(Stage::SyncDependencies);

    let err = deployer.deploy(&release_id()).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::DependencySyncError);
    assert!(err.is_retryable());
    assert_eq!(host.servers(), vec![old]);
    Ok(())
}

#[tokio::test]
async fn fetch_failure_is_a_transport_error() -> TestResult {
    let (host, deployer) = deploy_fixture(ConfigFileBuilder::new().build());
    host.fail_at(Stage::Fetch);

    let err = deployer.deploy(&release_id()).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::TransportError);
    assert_eq!(err.stage(), Some(Stage::Fetch));
    assert!(err.is_retryable());
    Ok(())
}

#[tokio::test]
async fn unreachable_host_runs_nothing() -> TestResult {
    let (host, deployer) = deploy_fixture(ConfigFileBuilder::new().build());
    host.set_unreachable(true);

    let err = deployer.deploy(&release_id()).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::TransportError);
    assert_eq!(err.stage(), None);
    assert!(host.scripts().is_empty());
    Ok(())
}

#[tokio::test]
async fn failed_health_check_does_not_roll_back() -> TestResult {
    let cfg = ConfigFileBuilder::new()
        .with_health_check("curl -fsS localhost:8080/health", 2)
        .build();
    let (host, deployer) = deploy_fixture(cfg);
    host.fail_at(Stage::HealthCheck);

    let err = deployer.deploy(&release_id()).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::HealthCheckError);
    assert_eq!(host.servers().len(), 1);
    assert_eq!(host.recorded_release().as_deref(), Some(RELEASE));
    Ok(())
}

#[tokio::test]
async fn disabled_health_check_is_not_run() -> TestResult {
    let cfg = ConfigFileBuilder::new()
        .with_health_check("false", 1)
        .build();
    let (host, deployer) = deploy_fixture(cfg);
    let deployer = deployer.with_health_check(None);
    host.fail_at(Stage::HealthCheck);

    let report = deployer.deploy(&release_id()).await?;

    assert!(!report.health_checked);
    assert!(!deployer.plan(&release_id()).stages().contains(&Stage::HealthCheck));
    Ok(())
}

#[tokio::test]
async fn identity_stop_refuses_to_launch_beside_unrecorded_server() -> TestResult {
    init_tracing();
    let (host, deployer) = deploy_fixture(ConfigFileBuilder::new().build());
    let editor = host.spawn("vim main.py");
    let recorded = host.spawn_server(OLD_RELEASE);
    let stray = host.spawn("python main.py --debug");

    let err = deployer.deploy(&release_id()).await.unwrap_err();

    assert!(matches!(
        err,
        ShipyardError::ProcessControl {
            stage: Stage::StopPrevious,
            ..
        }
    ));
    assert!(err.to_string().contains(&stray.to_string()));
    assert!(!host.is_running(recorded));
    assert!(host.is_running(editor));
    // The unrecorded process is left alone and nothing is launched next to it.
    assert_eq!(host.servers(), vec![stray]);
    Ok(())
}

#[tokio::test]
async fn unrecorded_server_is_replaced_under_pattern_policy() -> TestResult {
    let cfg = ConfigFileBuilder::new()
        .with_stop_policy(StopPolicy::Pattern)
        .build();
    let (host, deployer) = deploy_fixture(cfg);
    // Started by hand, so there is no pid file.
    let legacy = host.spawn("python main.py");

    let report = deployer.deploy(&release_id()).await?;

    assert_eq!(report.stopped, vec![legacy]);
    assert_eq!(host.servers().len(), 1);
    Ok(())
}

#[tokio::test]
async fn pattern_stop_clears_every_matching_process() -> TestResult {
    let cfg = ConfigFileBuilder::new()
        .with_stop_policy(StopPolicy::Pattern)
        .build();
    let (host, deployer) = deploy_fixture(cfg);
    let editor = host.spawn("vim main.py");
    let first = host.spawn("python main.py");
    let second = host.spawn("python main.py --debug");

    let report = deployer.deploy(&release_id()).await?;

    assert_eq!(report.stopped, vec![first, second]);
    assert!(host.is_running(editor));
    assert_eq!(host.servers(), vec![report.pid.unwrap()]);
    Ok(())
}

#[tokio::test]
async fn status_reflects_deployed_release() -> TestResult {
    let cfg = ConfigFileBuilder::new().build();
    let (host, deployer) = deploy_fixture(cfg.clone());

    let before = inspect_host(&host, &cfg).await?;
    assert!(!before.alive);
    assert_eq!(before.release, None);

    let report = deployer.deploy(&release_id()).await?;
    let after = inspect_host(&host, &cfg).await?;

    assert!(after.alive);
    assert_eq!(after.pid, report.pid);
    assert_eq!(after.release.as_deref(), Some(RELEASE));
    assert_eq!(after.head.as_deref(), Some(COMMIT));
    assert_eq!(after.matching_pids, vec![report.pid.unwrap()]);
    Ok(())
}
