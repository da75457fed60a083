use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use shipyard::config::ConfigFile;
use shipyard::errors::{Result, ShipyardError};
use shipyard::exec::CommandOutput;
use shipyard::host::script::MARKER_PREFIX;
use shipyard::host::{Host, RemoteScript, RemoteSession, ScriptStep};
use shipyard::types::{Stage, StopPolicy};
use tracing::debug;

use crate::fake_repo::FakeRemote;

/// First pid handed out to servers the simulation launches.
const FIRST_PID: u32 = 4100;

#[derive(Debug, Default)]
struct HostState {
    cloned: bool,
    packages_installed: bool,
    environment_ready: bool,
    /// Tags known to the host's checkout after its last fetch.
    fetched: BTreeMap<String, String>,
    head: Option<String>,
    /// Running processes: pid to command line.
    processes: BTreeMap<u32, String>,
    pid_file: Option<u32>,
    release_file: Option<String>,
    next_pid: u32,
    fail_at: Option<Stage>,
    unreachable: bool,
    scripts: Vec<String>,
}

/// An in-memory host that interprets [`RemoteScript`]s stage by stage.
///
/// It follows the same contract as a real host: each stage announces
/// itself with a marker, reports its markers, and the first failing stage
/// ends the session with that stage's exit code.
#[derive(Clone)]
pub struct SimulatedHost {
    host: Host,
    remote: FakeRemote,
    command: String,
    signature: String,
    stop_policy: StopPolicy,
    state: Arc<Mutex<HostState>>,
}

impl SimulatedHost {
    /// A provisioned host (checkout present, environment ready) for `cfg`.
    pub fn new(user: &str, address: &str, cfg: &ConfigFile, remote: FakeRemote) -> Self {
        let host = Host::new(user, address, cfg.project.path.clone())
            .expect("simulated host needs a valid address");
        Self {
            host,
            remote,
            command: cfg.server.command.clone(),
            signature: cfg.signature().to_string(),
            stop_policy: cfg.server.stop_policy,
            state: Arc::new(Mutex::new(HostState {
                cloned: true,
                packages_installed: true,
                environment_ready: true,
                next_pid: FIRST_PID,
                ..HostState::default()
            })),
        }
    }

    /// A host with nothing installed and no checkout.
    pub fn bare(user: &str, address: &str, cfg: &ConfigFile, remote: FakeRemote) -> Self {
        let host = Self::new(user, address, cfg, remote);
        {
            let mut state = host.state.lock().unwrap();
            state.cloned = false;
            state.packages_installed = false;
            state.environment_ready = false;
        }
        host
    }

    /// Make the stage fail the next time it runs (and every time after).
    pub fn fail_at(&self, stage: Stage) {
        self.state.lock().unwrap().fail_at = Some(stage);
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().unwrap().unreachable = unreachable;
    }

    /// Start a process outside any deploy and return its pid.
    pub fn spawn(&self, cmdline: &str) -> u32 {
        let mut state = self.state.lock().unwrap();
        let pid = state.next_pid;
        state.next_pid += 1;
        state.processes.insert(pid, cmdline.to_string());
        pid
    }

    /// Start a server as a previous deploy of `release` would have.
    pub fn spawn_server(&self, release: &str) -> u32 {
        let pid = self.spawn(&self.command);
        let mut state = self.state.lock().unwrap();
        state.pid_file = Some(pid);
        state.release_file = Some(release.to_string());
        pid
    }

    pub fn is_running(&self, pid: u32) -> bool {
        self.state.lock().unwrap().processes.contains_key(&pid)
    }

    /// Pids of running processes whose command line carries the signature.
    pub fn servers(&self) -> Vec<u32> {
        let state = self.state.lock().unwrap();
        matching(&state.processes, &self.signature)
    }

    pub fn head(&self) -> Option<String> {
        self.state.lock().unwrap().head.clone()
    }

    pub fn recorded_release(&self) -> Option<String> {
        self.state.lock().unwrap().release_file.clone()
    }

    pub fn recorded_pid(&self) -> Option<u32> {
        self.state.lock().unwrap().pid_file
    }

    pub fn is_cloned(&self) -> bool {
        self.state.lock().unwrap().cloned
    }

    pub fn environment_ready(&self) -> bool {
        self.state.lock().unwrap().environment_ready
    }

    pub fn packages_installed(&self) -> bool {
        self.state.lock().unwrap().packages_installed
    }

    /// Labels of every script executed so far.
    pub fn scripts(&self) -> Vec<String> {
        self.state.lock().unwrap().scripts.clone()
    }

    fn run_step(
        &self,
        state: &mut HostState,
        script: &RemoteScript,
        step: &ScriptStep,
        out: &mut String,
    ) -> std::result::Result<(), String> {
        match step.stage {
            Stage::InstallPackages => state.packages_installed = true,
            Stage::PrepareDirectory => {
                if step.commands.iter().any(|c| c.line.contains("rm -rf")) {
                    state.cloned = false;
                    state.environment_ready = false;
                    state.fetched.clear();
                    state.head = None;
                    state.pid_file = None;
                    state.release_file = None;
                }
            }
            Stage::CloneRepository => {
                if !state.cloned {
                    state.cloned = true;
                    state.fetched = self.remote.tags();
                }
            }
            Stage::CreateEnvironment | Stage::SyncDependencies => {
                if !state.cloned {
                    return Err("requirements file not found".to_string());
                }
                state.environment_ready = true;
            }
            Stage::Fetch => {
                if !state.cloned {
                    return Err("fatal: not a git repository".to_string());
                }
                state.fetched = self.remote.tags();
            }
            Stage::Resolve => {
                let release = script.release().map(|r| r.to_string()).unwrap_or_default();
                if !state.fetched.contains_key(&release) {
                    return Err(format!("unknown revision {release}"));
                }
            }
            Stage::Checkout => {
                let release = script.release().map(|r| r.to_string()).unwrap_or_default();
                let commit = state
                    .fetched
                    .get(&release)
                    .cloned()
                    .ok_or_else(|| format!("pathspec '{release}' did not match"))?;
                state.head = Some(commit.clone());
                marker(out, "head", &commit);
            }
            Stage::StopPrevious => {
                marker(out, "previous_release", state.release_file.as_deref().unwrap_or(""));
                let targets: Vec<u32> = match self.stop_policy {
                    StopPolicy::Identity => state
                        .pid_file
                        .filter(|pid| {
                            state
                                .processes
                                .get(pid)
                                .is_some_and(|cmd| cmd.contains(&self.signature))
                        })
                        .into_iter()
                        .collect(),
                    StopPolicy::Pattern => matching(&state.processes, &self.signature),
                };
                for pid in &targets {
                    state.processes.remove(pid);
                }
                let stopped = targets
                    .iter()
                    .map(|p| p.to_string())
                    .collect::<Vec<_>>()
                    .join(" ");
                marker(out, "stopped", &stopped);
                let leftover = matching(&state.processes, &self.signature)
                    .iter()
                    .map(|p| p.to_string())
                    .collect::<Vec<_>>()
                    .join(" ");
                marker(out, "leftover", &leftover);
                if !leftover.is_empty() {
                    return Err(format!(
                        "processes matching the server signature are still running: {leftover}"
                    ));
                }
                state.pid_file = None;
            }
            Stage::Launch => {
                let release = script.release().map(|r| r.to_string()).unwrap_or_default();
                let pid = state.next_pid;
                state.next_pid += 1;
                state.processes.insert(pid, self.command.clone());
                state.pid_file = Some(pid);
                state.release_file = Some(release);
                marker(out, "pid", &pid.to_string());
            }
            Stage::HealthCheck => {}
            Stage::Inspect => {
                marker(out, "head", state.head.as_deref().unwrap_or(""));
                marker(out, "release", state.release_file.as_deref().unwrap_or(""));
                let pid = state.pid_file.map(|p| p.to_string()).unwrap_or_default();
                marker(out, "pid", &pid);
                let alive = state.pid_file.is_some_and(|pid| {
                    state
                        .processes
                        .get(&pid)
                        .is_some_and(|cmd| cmd.contains(&self.signature))
                });
                marker(out, "alive", if alive { "true" } else { "false" });
                let pids = matching(&state.processes, &self.signature)
                    .iter()
                    .map(|p| p.to_string())
                    .collect::<Vec<_>>()
                    .join(" ");
                marker(out, "matching", &pids);
            }
        }
        Ok(())
    }
}

fn matching(processes: &BTreeMap<u32, String>, signature: &str) -> Vec<u32> {
    processes
        .iter()
        .filter(|(_, cmd)| cmd.contains(signature))
        .map(|(pid, _)| *pid)
        .collect()
}

fn marker(out: &mut String, key: &str, value: &str) {
    let _ = writeln!(out, "{MARKER_PREFIX}{key}={value}");
}

#[async_trait]
impl RemoteSession for SimulatedHost {
    fn host(&self) -> &Host {
        &self.host
    }

    async fn execute(&self, script: &RemoteScript) -> Result<CommandOutput> {
        let mut state = self.state.lock().unwrap();
        if state.unreachable {
            return Err(ShipyardError::transport(format!(
                "ssh to {} failed: connection timed out",
                self.host
            )));
        }
        state.scripts.push(script.label().to_string());

        let mut stdout = String::new();
        for step in script.steps() {
            marker(&mut stdout, "stage", step.stage.name());
            let result = if state.fail_at == Some(step.stage) {
                Err(format!("simulated failure in {}", step.stage))
            } else {
                self.run_step(&mut state, script, step, &mut stdout)
            };
            if let Err(stderr) = result {
                debug!(stage = %step.stage, %stderr, "simulated stage failed");
                return Ok(CommandOutput {
                    exit_code: Some(step.stage.exit_code()),
                    stdout,
                    stderr,
                });
            }
        }
        Ok(CommandOutput {
            exit_code: Some(0),
            stdout,
            stderr: String::new(),
        })
    }
}
