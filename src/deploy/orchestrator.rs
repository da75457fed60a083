// src/deploy/orchestrator.rs

//! Deploy Orchestrator: drives one host to one release in one session.

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::ConfigFile;
use crate::errors::{Result, ShipyardError};
use crate::exec::CommandOutput;
use crate::host::script::{RemoteScript, parse_markers, plain_output, stages_reached};
use crate::host::{Host, RemoteSession};
use crate::release::ReleaseId;
use crate::types::Stage;

use super::health::HealthCheck;
use super::plan::deploy_script;

/// Outcome of a successful deploy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeployReport {
    pub ok: bool,
    pub release: String,
    pub host: Host,
    /// Release that was live before this deploy, if one was recorded.
    pub previous_release: Option<String>,
    /// Commit the host's tree points at after checkout.
    pub head: Option<String>,
    /// Pid of the newly launched server.
    pub pid: Option<u32>,
    /// Pids that were signalled to stop.
    pub stopped: Vec<u32>,
    pub health_checked: bool,
}

impl DeployReport {
    fn from_output(release: &ReleaseId, host: &Host, stdout: &str, health_checked: bool) -> Self {
        let markers = parse_markers(stdout);
        let non_empty = |key: &str| markers.get(key).filter(|v| !v.is_empty()).cloned();
        Self {
            ok: true,
            release: release.to_string(),
            host: host.clone(),
            previous_release: non_empty("previous_release"),
            head: non_empty("head"),
            pid: non_empty("pid").and_then(|p| p.parse().ok()),
            stopped: markers
                .get("stopped")
                .map(|v| v.split_whitespace().filter_map(|p| p.parse().ok()).collect())
                .unwrap_or_default(),
            health_checked,
        }
    }
}

/// Drives the deploy pipeline over a [`RemoteSession`].
///
/// There is no locking: callers must not run two deploys against the same
/// host at once.
pub struct Deployer<S: RemoteSession> {
    session: S,
    cfg: ConfigFile,
    health: Option<HealthCheck>,
}

impl<S: RemoteSession> Deployer<S> {
    pub fn new(session: S, cfg: ConfigFile) -> Self {
        let health = HealthCheck::from_config(&cfg);
        Self {
            session,
            cfg,
            health,
        }
    }

    /// Replace the configured health check (or disable it with `None`).
    pub fn with_health_check(mut self, health: Option<HealthCheck>) -> Self {
        self.health = health;
        self
    }

    pub fn host(&self) -> &Host {
        self.session.host()
    }

    /// The script `deploy` would send, for dry runs.
    pub fn plan(&self, release: &ReleaseId) -> RemoteScript {
        deploy_script(&self.cfg, release, self.health.as_ref())
    }

    /// Fetch, checkout, sync, stop, launch (and health-check) `release`.
    ///
    /// The first failing stage ends the session and is reported as its own
    /// error kind. A failure after the stop stage leaves no server running.
    pub async fn deploy(&self, release: &ReleaseId) -> Result<DeployReport> {
        let host = self.session.host();
        let script = self.plan(release);
        info!(release = %release, host = %host, "deploy started");

        let output = match self.session.execute(&script).await {
            Ok(output) => output,
            Err(err) => {
                error!(release = %release, host = %host, error = %err, "remote session failed; host state is indeterminate");
                return Err(err);
            }
        };
        log_remote_output(host, &output);

        if let Some(code) = output.exit_code.filter(|c| *c != 0) {
            let err = classify_failure(release, code, &output);
            error!(release = %release, host = %host, stage = ?err.stage(), error = %err, "deploy failed");
            if err.stage().is_some_and(|s| matches!(s, Stage::Launch | Stage::HealthCheck)) {
                warn!(host = %host, "no healthy server may be running; inspect the host");
            }
            return Err(err);
        }

        let report = DeployReport::from_output(release, host, &output.stdout, self.health.is_some());
        if let Some(head) = &report.head {
            if !release.names_commit(head) {
                warn!(release = %release, head = %head, "checked-out commit does not match the identifier's commit");
            }
        }
        info!(
            release = %release,
            host = %host,
            pid = ?report.pid,
            previous = ?report.previous_release,
            "deploy finished"
        );
        Ok(report)
    }
}

fn log_remote_output(host: &Host, output: &CommandOutput) {
    for stage in stages_reached(&output.stdout) {
        debug!(host = %host, stage = %stage, "remote stage started");
    }
    for line in plain_output(&output.stdout) {
        debug!(host = %host, "remote: {}", line);
    }
    for line in output.stderr.lines() {
        debug!(host = %host, "remote stderr: {}", line);
    }
}

/// Map the script's exit status to the stage that failed.
pub fn classify_failure(release: &ReleaseId, code: i32, output: &CommandOutput) -> ShipyardError {
    let detail = output.diagnostic();
    match Stage::from_exit_code(code) {
        Some(Stage::Fetch) => ShipyardError::Transport {
            stage: Some(Stage::Fetch),
            detail,
        },
        Some(Stage::Resolve) => ShipyardError::Resolution {
            identifier: release.to_string(),
            detail: "marker not found on the remote after fetch".to_string(),
        },
        Some(Stage::Checkout) => ShipyardError::Checkout {
            identifier: release.to_string(),
            detail,
        },
        Some(Stage::SyncDependencies) => ShipyardError::DependencySync(detail),
        Some(stage @ (Stage::StopPrevious | Stage::Launch)) => {
            ShipyardError::ProcessControl { stage, detail }
        }
        Some(Stage::HealthCheck) => ShipyardError::HealthCheck(detail),
        _ => ShipyardError::transport(format!(
            "remote script exited with unexpected status {code}: {detail}"
        )),
    }
}
