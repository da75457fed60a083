// src/host/inspect.rs

//! Read-only queries of the host's last known state.

use serde::Serialize;
use tracing::debug;

use crate::config::ConfigFile;
use crate::errors::{Result, ShipyardError};
use crate::types::Stage;

use super::script::{RemoteScript, ScriptStep, marker, parse_markers, quote_path, shell_quote};
use super::session::RemoteSession;

/// What a host looked like when it was last inspected.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct HostSnapshot {
    /// Commit checked out in the project directory.
    pub head: Option<String>,
    /// Release recorded by the last successful launch.
    pub release: Option<String>,
    /// Pid recorded by the last launch.
    pub pid: Option<u32>,
    /// Whether the recorded pid is still a running server.
    pub alive: bool,
    /// Every pid whose command line contains the server signature.
    pub matching_pids: Vec<u32>,
}

/// Build the inspection script for the configured project.
pub fn inspect_script(cfg: &ConfigFile) -> RemoteScript {
    let project = quote_path(&cfg.project.path);
    let pid_file = quote_path(&cfg.pid_file());
    let release_file = quote_path(&cfg.release_file());
    let signature = shell_quote(cfg.signature());

    let mut script = RemoteScript::new("inspect");
    script.push(
        ScriptStep::new(Stage::Inspect)
            .unchecked(marker("head", &format!("$(git -C {project} rev-parse HEAD 2>/dev/null)")))
            .unchecked(marker("release", &format!("$(cat {release_file} 2>/dev/null)")))
            .unchecked(format!("pid=$(cat {pid_file} 2>/dev/null)"))
            .unchecked(marker("pid", "$pid"))
            .unchecked(format!(
                "if [ -n \"$pid\" ] && kill -0 \"$pid\" 2>/dev/null && tr '\\0' ' ' < /proc/\"$pid\"/cmdline | grep -qF -- {signature}; then {}; else {}; fi",
                marker("alive", "true"),
                marker("alive", "false"),
            ))
            .unchecked(marker(
                "matching",
                &format!("$(pgrep -f -- {signature} | tr '\\n' ' ')"),
            )),
    );
    script
}

/// Parse the markers produced by [`inspect_script`].
pub fn parse_snapshot(stdout: &str) -> HostSnapshot {
    let markers = parse_markers(stdout);
    let non_empty = |key: &str| {
        markers
            .get(key)
            .filter(|v| !v.is_empty())
            .cloned()
    };
    HostSnapshot {
        head: non_empty("head"),
        release: non_empty("release"),
        pid: non_empty("pid").and_then(|p| p.parse().ok()),
        alive: markers.get("alive").map(|v| v == "true").unwrap_or(false),
        matching_pids: markers
            .get("matching")
            .map(|v| v.split_whitespace().filter_map(|p| p.parse().ok()).collect())
            .unwrap_or_default(),
    }
}

/// Query HEAD and process state on the session's host.
pub async fn inspect_host<S: RemoteSession + ?Sized>(
    session: &S,
    cfg: &ConfigFile,
) -> Result<HostSnapshot> {
    let output = session.execute(&inspect_script(cfg)).await?;
    if !output.is_success() {
        return Err(ShipyardError::transport(format!(
            "inspecting {} failed: {}",
            session.host(),
            output.diagnostic()
        )));
    }
    let snapshot = parse_snapshot(&output.stdout);
    debug!(host = %session.host(), ?snapshot, "host inspected");
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RawConfigFile;

    #[test]
    fn snapshot_parses_markers() {
        let out = "::shipyard stage=inspect\n::shipyard head=abcd1234\n::shipyard release=release-20250101120000-abcd123\n::shipyard pid=4242\n::shipyard alive=true\n::shipyard matching=4242 977 \n";
        let snap = parse_snapshot(out);
        assert_eq!(snap.head.as_deref(), Some("abcd1234"));
        assert_eq!(snap.release.as_deref(), Some("release-20250101120000-abcd123"));
        assert_eq!(snap.pid, Some(4242));
        assert!(snap.alive);
        assert_eq!(snap.matching_pids, vec![4242, 977]);
    }

    #[test]
    fn empty_markers_mean_unknown() {
        let out = "::shipyard head=\n::shipyard release=\n::shipyard pid=\n::shipyard alive=false\n::shipyard matching=\n";
        assert_eq!(parse_snapshot(out), HostSnapshot::default());
    }

    #[test]
    fn script_only_reads() {
        let cfg = ConfigFile::try_from(RawConfigFile::default()).unwrap();
        let text = inspect_script(&cfg).render();
        assert!(text.contains("git -C /srv/app rev-parse HEAD"));
        assert!(text.contains("pgrep -f -- 'python main.py'"));
        assert!(!text.contains("kill -TERM"));
        assert!(!text.contains("|| exit"));
    }
}
