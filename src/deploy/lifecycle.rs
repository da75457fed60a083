// src/deploy/lifecycle.rs

//! Stopping the previous server instance and launching the new one.
//!
//! The launched process's pid goes to `<state_dir>/server.pid` and its
//! release to `<state_dir>/release`. Under [`StopPolicy::Identity`] only that
//! recorded pid is ever signalled, and only while its command line still
//! contains the server signature. A matching process this host never
//! recorded is left alone, and its presence fails the stop stage.

use crate::config::ConfigFile;
use crate::host::script::{ScriptStep, marker, quote_path, shell_quote};
use crate::release::ReleaseId;
use crate::types::{DependencyIsolation, Stage, StopPolicy};

/// Shell test that is true when `$var` is alive and still runs the server.
fn is_server_pid(var: &str, signature: &str) -> String {
    format!(
        "kill -0 \"${var}\" 2>/dev/null && tr '\\0' ' ' < /proc/\"${var}\"/cmdline 2>/dev/null | grep -qF -- {signature}"
    )
}

/// Signal the previous instance: SIGTERM, a grace period, then SIGKILL.
///
/// Finding nothing to stop is not an error. The stage fails when a targeted
/// process survives SIGKILL, when any process matching the signature is
/// still running afterwards (under `Identity` that is a server this host
/// never recorded, which is left alone rather than signalled), or when the
/// pid file cannot be removed. A new server is never launched beside an old
/// one.
pub fn stop_step(cfg: &ConfigFile) -> ScriptStep {
    let pid_file = quote_path(&cfg.pid_file());
    let release_file = quote_path(&cfg.release_file());
    let signature = shell_quote(cfg.signature());
    let grace = cfg.server.stop_timeout_secs;

    let step = ScriptStep::new(Stage::StopPrevious)
        .unchecked(marker(
            "previous_release",
            &format!("$(cat {release_file} 2>/dev/null)"),
        ))
        .unchecked("targets=\"\"");

    let step = match cfg.server.stop_policy {
        StopPolicy::Identity => step
            .unchecked(format!("old=$(cat {pid_file} 2>/dev/null)"))
            .unchecked(format!(
                "if [ -n \"$old\" ] && {}; then targets=\"$old\"; fi",
                is_server_pid("old", &signature)
            )),
        StopPolicy::Pattern => step.unchecked(format!(
            "targets=$(pgrep -f -- {signature} | tr '\\n' ' ')"
        )),
    };

    step.unchecked("for p in $targets; do kill -TERM \"$p\" 2>/dev/null; done")
        .unchecked(format!(
            "waited=0; while [ -n \"$targets\" ] && [ \"$waited\" -lt {grace} ]; do \
             alive=\"\"; for p in $targets; do kill -0 \"$p\" 2>/dev/null && alive=\"$alive $p\"; done; \
             [ -z \"$alive\" ] && break; sleep 1; waited=$((waited + 1)); done"
        ))
        .unchecked(
            "for p in $targets; do if kill -0 \"$p\" 2>/dev/null; then kill -KILL \"$p\" 2>/dev/null; sleep 1; fi; done",
        )
        .unchecked(
            "survivors=\"\"; for p in $targets; do kill -0 \"$p\" 2>/dev/null && survivors=\"$survivors $p\"; done",
        )
        .unchecked(marker("stopped", "$targets"))
        .checked(
            "if [ -n \"$survivors\" ]; then echo \"server did not exit after KILL:$survivors\" >&2; false; fi",
        )
        .unchecked(format!(
            "leftover=$(pgrep -f -- {signature} | tr '\\n' ' ')"
        ))
        .unchecked(marker("leftover", "$leftover"))
        .checked(
            "if [ -n \"${leftover// /}\" ]; then echo \"processes matching the server signature are still running: $leftover\" >&2; false; fi",
        )
        .checked(format!("rm -f {pid_file}"))
}

/// Rotate the log when it has grown past the configured size.
fn rotate_log_line(cfg: &ConfigFile) -> Option<String> {
    let limit = cfg.server.log_rotate_bytes;
    if limit == 0 {
        return None;
    }
    let log = quote_path(&cfg.log_path());
    let rotated = shell_quote(&format!("{}.1", cfg.log_path().to_string_lossy()));
    Some(format!(
        "if [ -f {log} ] && [ \"$(stat -c %s {log})\" -ge {limit} ]; then mv -f {log} {rotated}; fi"
    ))
}

/// Environment assignments prefixed to the server command.
pub fn launch_environment(cfg: &ConfigFile, release: &ReleaseId) -> Vec<String> {
    let mut env = vec![
        format!("TZ={}", shell_quote(&cfg.server.timezone)),
        format!("SHIPYARD_RELEASE={}", shell_quote(&release.to_string())),
    ];
    if cfg.dependencies.isolation == DependencyIsolation::Sandboxed {
        if let Some(dir) = cfg.environment_dir() {
            let bin = dir.join("bin");
            env.push(format!("VIRTUAL_ENV={}", quote_path(&dir)));
            env.push(format!("PATH={}:\"$PATH\"", quote_path(&bin)));
        }
    }
    env
}

/// Start the server detached from the session.
///
/// `setsid nohup` with every standard stream redirected lets the process
/// outlive the ssh connection. The launch counts as failed if the new pid is
/// gone one second later.
pub fn launch_step(cfg: &ConfigFile, release: &ReleaseId) -> ScriptStep {
    let project = quote_path(&cfg.project.path);
    let state_dir = quote_path(&cfg.state_dir());
    let pid_file = quote_path(&cfg.pid_file());
    let release_file = quote_path(&cfg.release_file());
    let log = quote_path(&cfg.log_path());
    let env = launch_environment(cfg, release).join(" ");

    let mut step = ScriptStep::new(Stage::Launch).checked(format!("mkdir -p {state_dir}"));
    if let Some(rotate) = rotate_log_line(cfg) {
        step = step.checked(rotate);
    }
    step.checked(format!("cd {project}"))
        .unchecked(format!(
            "{env} setsid nohup {} >> {log} 2>&1 < /dev/null &",
            cfg.server.command
        ))
        .unchecked("new=$!")
        .checked(format!("echo \"$new\" > {pid_file}"))
        .checked(format!("echo {} > {release_file}", shell_quote(&release.to_string())))
        .unchecked("sleep 1")
        .unchecked(marker("pid", "$new"))
        .checked("kill -0 \"$new\" 2>/dev/null")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RawConfigFile;

    fn cfg_with(f: impl FnOnce(&mut RawConfigFile)) -> ConfigFile {
        let mut raw = RawConfigFile::default();
        f(&mut raw);
        ConfigFile::try_from(raw).unwrap()
    }

    fn release() -> ReleaseId {
        "release-20250101120000-abcd123".parse().unwrap()
    }

    fn text(step: &ScriptStep) -> String {
        step.commands
            .iter()
            .map(|c| c.line.clone())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn identity_stop_targets_only_recorded_pid() {
        let step = stop_step(&cfg_with(|_| {}));
        let body = text(&step);
        assert!(body.contains("old=$(cat /srv/app/.shipyard/server.pid 2>/dev/null)"));
        assert!(body.contains("grep -qF -- 'python main.py'"));
        assert!(!body.contains("targets=$(pgrep"));
        assert!(body.contains("-lt 10 ]"));
    }

    #[test]
    fn every_policy_checks_for_leftover_servers_before_launch() {
        for policy in [StopPolicy::Identity, StopPolicy::Pattern] {
            let body = text(&stop_step(&cfg_with(|raw| raw.server.stop_policy = policy)));
            assert!(
                body.contains("leftover=$(pgrep -f -- 'python main.py' | tr '\\n' ' ')"),
                "{policy:?}"
            );
            assert!(body.contains("echo \"::shipyard leftover=$leftover\""));
        }
    }

    #[test]
    fn pattern_stop_uses_command_line_match() {
        let step = stop_step(&cfg_with(|raw| {
            raw.server.stop_policy = StopPolicy::Pattern;
            raw.server.signature = Some("main.py".into());
        }));
        assert!(text(&step).contains("targets=$(pgrep -f -- main.py | tr '\\n' ' ')"));
    }

    #[test]
    fn stop_fails_on_survivors_leftovers_or_pid_file() {
        let step = stop_step(&cfg_with(|_| {}));
        let checked: Vec<_> = step.commands.iter().filter(|c| c.checked).map(|c| c.line.as_str()).collect();
        assert_eq!(checked.len(), 3);
        assert!(checked[0].starts_with("if [ -n \"$survivors\" ]"));
        assert!(checked[1].starts_with("if [ -n \"${leftover// /}\" ]"));
        assert_eq!(checked[2], "rm -f /srv/app/.shipyard/server.pid");
    }

    #[test]
    fn launch_sets_timezone_release_and_venv_path() {
        let step = launch_step(&cfg_with(|_| {}), &release());
        let body = text(&step);
        assert!(body.contains(
            "TZ=Europe/Moscow SHIPYARD_RELEASE=release-20250101120000-abcd123 VIRTUAL_ENV=/srv/app/.venv PATH=/srv/app/.venv/bin:\"$PATH\" setsid nohup python main.py >> /srv/app/bot.log 2>&1 < /dev/null &"
        ));
        assert!(body.contains("echo \"$new\" > /srv/app/.shipyard/server.pid"));
        assert!(body.contains("echo release-20250101120000-abcd123 > /srv/app/.shipyard/release"));
        assert!(body.contains("mv -f /srv/app/bot.log /srv/app/bot.log.1"));
    }

    #[test]
    fn global_install_does_not_touch_path_and_rotation_can_be_disabled() {
        let cfg = cfg_with(|raw| {
            raw.dependencies.isolation = DependencyIsolation::Global;
            raw.server.log_rotate_bytes = 0;
        });
        let body = text(&launch_step(&cfg, &release()));
        assert!(!body.contains("PATH="));
        assert!(!body.contains("mv -f"));
    }
}
