// src/deploy/plan.rs

//! Building the deploy script: fetch, resolve, checkout, sync, stop, launch.

use crate::config::ConfigFile;
use crate::host::script::{RemoteScript, ScriptStep, marker, quote_path, shell_quote};
use crate::release::ReleaseId;
use crate::types::{DependencyIsolation, Stage};

use super::health::HealthCheck;
use super::lifecycle::{launch_step, stop_step};

fn tag_ref(release: &ReleaseId) -> String {
    shell_quote(&format!("refs/tags/{release}^{{commit}}"))
}

/// Refresh all markers so releases minted after the last sync resolve.
pub fn fetch_step(cfg: &ConfigFile) -> ScriptStep {
    let project = quote_path(&cfg.project.path);
    ScriptStep::new(Stage::Fetch).checked(format!(
        "git -C {project} fetch --quiet --tags {}",
        shell_quote(&cfg.project.remote)
    ))
}

/// Fail before anything on the host changes if the marker is unknown.
pub fn resolve_step(cfg: &ConfigFile, release: &ReleaseId) -> ScriptStep {
    let project = quote_path(&cfg.project.path);
    ScriptStep::new(Stage::Resolve).checked(format!(
        "git -C {project} rev-parse --verify --quiet {} > /dev/null",
        tag_ref(release)
    ))
}

/// Detach the working tree at exactly the marked commit.
pub fn checkout_step(cfg: &ConfigFile, release: &ReleaseId) -> ScriptStep {
    let project = quote_path(&cfg.project.path);
    ScriptStep::new(Stage::Checkout)
        .checked(format!(
            "git -C {project} checkout --quiet --detach {}",
            tag_ref(release)
        ))
        .unchecked(marker("head", &format!("$(git -C {project} rev-parse HEAD)")))
}

/// Install or upgrade what the manifest lists; nothing is uninstalled.
pub fn sync_step(cfg: &ConfigFile) -> ScriptStep {
    let manifest = quote_path(&cfg.manifest_path());
    let runtime = &cfg.dependencies.runtime;
    let step = ScriptStep::new(Stage::SyncDependencies);

    match (cfg.dependencies.isolation, cfg.environment_dir()) {
        (DependencyIsolation::Sandboxed, Some(env_dir)) => {
            let env = quote_path(&env_dir);
            let python = quote_path(&env_dir.join("bin").join("python"));
            step.checked(format!("[ -x {python} ] || {runtime} -m venv {env}"))
                .checked(format!("{python} -m pip install --quiet -r {manifest}"))
        }
        _ => step.checked(format!("{runtime} -m pip install --quiet -r {manifest}")),
    }
}

/// The complete deploy script for one release.
pub fn deploy_script(
    cfg: &ConfigFile,
    release: &ReleaseId,
    health: Option<&HealthCheck>,
) -> RemoteScript {
    let mut script = RemoteScript::new(format!("deploy {release}")).for_release(release.clone());
    script.push(fetch_step(cfg));
    script.push(resolve_step(cfg, release));
    script.push(checkout_step(cfg, release));
    script.push(sync_step(cfg));
    script.push(stop_step(cfg));
    script.push(launch_step(cfg, release));
    if let Some(check) = health {
        script.push(check.step(cfg));
    }
    script
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RawConfigFile;

    fn release() -> ReleaseId {
        "release-20250101120000-abcd123".parse().unwrap()
    }

    #[test]
    fn stages_run_in_fail_closed_order() {
        let cfg = ConfigFile::try_from(RawConfigFile::default()).unwrap();
        let script = deploy_script(&cfg, &release(), None);
        assert_eq!(
            script.stages(),
            vec![
                Stage::Fetch,
                Stage::Resolve,
                Stage::Checkout,
                Stage::SyncDependencies,
                Stage::StopPrevious,
                Stage::Launch,
            ]
        );
        assert_eq!(script.release(), Some(&release()));
    }

    #[test]
    fn rendered_script_targets_tag_commit() {
        let cfg = ConfigFile::try_from(RawConfigFile::default()).unwrap();
        let text = deploy_script(&cfg, &release(), None).render();
        assert!(text.contains("git -C /srv/app fetch --quiet --tags origin || exit 70"));
        assert!(text.contains(
            "git -C /srv/app rev-parse --verify --quiet 'refs/tags/release-20250101120000-abcd123^{commit}' > /dev/null || exit 71"
        ));
        assert!(text.contains(
            "git -C /srv/app checkout --quiet --detach 'refs/tags/release-20250101120000-abcd123^{commit}' || exit 72"
        ));
        assert!(text.contains(
            "/srv/app/.venv/bin/python -m pip install --quiet -r /srv/app/requirements.txt || exit 73"
        ));
    }

    #[test]
    fn global_isolation_installs_with_runtime() {
        let mut raw = RawConfigFile::default();
        raw.dependencies.isolation = DependencyIsolation::Global;
        raw.dependencies.runtime = "python3.11".into();
        let cfg = ConfigFile::try_from(raw).unwrap();
        let step = sync_step(&cfg);
        assert_eq!(step.commands.len(), 1);
        assert_eq!(
            step.commands[0].line,
            "python3.11 -m pip install --quiet -r /srv/app/requirements.txt"
        );
    }
}
