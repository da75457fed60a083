// src/provision/mod.rs

//! Provisioner: turns a bare host into a deploy target.
//!
//! Every stage is safe to repeat. The one exception is `fresh` mode, which
//! stops the running server and then deletes and recreates the project
//! directory with any state the server kept there; it is meant for
//! first-time setup only. It refuses to wipe the directory while a process
//! matching the server signature keeps running.

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::ConfigFile;
use crate::deploy::lifecycle::stop_step;
use crate::deploy::plan::sync_step;
use crate::errors::{Result, ShipyardError};
use crate::host::script::{RemoteScript, ScriptStep, plain_output, quote_path, shell_quote};
use crate::host::{Host, RemoteSession};
use crate::types::{DependencyIsolation, Stage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProvisionOptions {
    /// Delete and recreate the project directory.
    pub fresh: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvisionReport {
    pub ok: bool,
    pub host: Host,
    pub fresh: bool,
    pub isolation: DependencyIsolation,
}

pub fn install_packages_step(cfg: &ConfigFile) -> ScriptStep {
    let mut step = ScriptStep::new(Stage::InstallPackages)
        .unchecked("SUDO=\"\"; [ \"$(id -u)\" -eq 0 ] || SUDO=\"sudo -n\"");
    if !cfg.provision.packages.is_empty() {
        let packages = cfg
            .provision
            .packages
            .iter()
            .map(|p| shell_quote(p))
            .collect::<Vec<_>>()
            .join(" ");
        step = step
            .checked("$SUDO apt-get update -qq")
            .checked(format!(
                "$SUDO env DEBIAN_FRONTEND=noninteractive apt-get install -y -qq {packages}"
            ));
    }
    step.checked(format!(
        "command -v {} > /dev/null",
        shell_quote(&cfg.dependencies.runtime)
    ))
}

pub fn prepare_directory_step(cfg: &ConfigFile, owner: &str, fresh: bool) -> ScriptStep {
    let project = quote_path(&cfg.project.path);
    let mut step = ScriptStep::new(Stage::PrepareDirectory);
    if fresh {
        step = step.checked(format!("$SUDO rm -rf {project}"));
    }
    step.checked(format!("$SUDO mkdir -p {project}"))
        .checked(format!("$SUDO chown {}: {project}", shell_quote(owner)))
}

pub fn clone_step(cfg: &ConfigFile, url: &str) -> ScriptStep {
    let project = quote_path(&cfg.project.path);
    let git_dir = quote_path(&cfg.project.path.join(".git"));
    ScriptStep::new(Stage::CloneRepository)
        .checked(format!(
            "[ -d {git_dir} ] || git clone --quiet --origin {} {} {project}",
            shell_quote(&cfg.project.remote),
            shell_quote(url)
        ))
        .checked(format!("mkdir -p {}", quote_path(&cfg.state_dir())))
}

/// Create (sandboxed) and populate the dependency environment.
pub fn environment_step(cfg: &ConfigFile) -> ScriptStep {
    ScriptStep {
        stage: Stage::CreateEnvironment,
        commands: sync_step(cfg).commands,
    }
}

/// Drives provisioning over a [`RemoteSession`].
pub struct Provisioner<S: RemoteSession> {
    session: S,
    cfg: ConfigFile,
}

impl<S: RemoteSession> Provisioner<S> {
    pub fn new(session: S, cfg: ConfigFile) -> Self {
        Self { session, cfg }
    }

    pub fn host(&self) -> &Host {
        self.session.host()
    }

    pub fn plan(&self, options: ProvisionOptions) -> Result<RemoteScript> {
        let url = self.cfg.project.repository_url.as_deref().ok_or_else(|| {
            ShipyardError::ConfigError(
                "[project].repository_url is required to provision a host".to_string(),
            )
        })?;
        let owner = self
            .cfg
            .provision
            .owner
            .clone()
            .unwrap_or_else(|| self.session.host().user.clone());

        let mut script = RemoteScript::new(format!("provision {}", self.session.host()));
        script.push(install_packages_step(&self.cfg));
        if options.fresh {
            // The pid and release files live under the directory about to be
            // removed; the server must be gone first.
            script.push(stop_step(&self.cfg));
        }
        script.push(prepare_directory_step(&self.cfg, &owner, options.fresh));
        script.push(clone_step(&self.cfg, url));
        script.push(environment_step(&self.cfg));
        Ok(script)
    }

    pub async fn provision(&self, options: ProvisionOptions) -> Result<ProvisionReport> {
        let host = self.session.host();
        let script = self.plan(options)?;
        if options.fresh {
            warn!(host = %host, path = %self.cfg.project.path.display(), "fresh provisioning recreates the project directory");
        }
        info!(host = %host, isolation = ?self.cfg.dependencies.isolation, "provisioning started");

        let output = self.session.execute(&script).await?;
        for line in plain_output(&output.stdout) {
            debug!(host = %host, "remote: {}", line);
        }

        match output.exit_code {
            Some(0) => {
                info!(host = %host, "provisioning finished");
                Ok(ProvisionReport {
                    ok: true,
                    host: host.clone(),
                    fresh: options.fresh,
                    isolation: self.cfg.dependencies.isolation,
                })
            }
            Some(code) => {
                let detail = output.diagnostic();
                let err = match Stage::from_exit_code(code) {
                    Some(stage) => ShipyardError::Provision { stage, detail },
                    None => ShipyardError::transport(format!(
                        "provisioning script exited with unexpected status {code}: {detail}"
                    )),
                };
                error!(host = %host, error = %err, "provisioning failed");
                Err(err)
            }
            None => Err(ShipyardError::transport("provisioning session terminated by a signal")),
        }
    }
}
