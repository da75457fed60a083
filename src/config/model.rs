// src/config/model.rs

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::types::{DependencyIsolation, StopPolicy};

/// Raw configuration as read from `Shipyard.toml`.
///
/// ```toml
/// [release]
/// prefix = "release"
/// trunk_branch = "main"
///
/// [project]
/// path = "/srv/app"
/// repository_url = "git@github.com:me/bot.git"
///
/// [server]
/// command = "python main.py"
/// timezone = "Europe/Moscow"
///
/// [dependencies]
/// isolation = "sandboxed"
/// ```
///
/// Every section is optional. Use [`ConfigFile::try_from`] to validate.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub release: ReleaseSection,

    #[serde(default)]
    pub project: ProjectSection,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub dependencies: DependenciesSection,

    #[serde(default)]
    pub provision: ProvisionSection,

    #[serde(default)]
    pub transport: TransportSection,

    #[serde(default)]
    pub health_check: Option<HealthCheckSection>,
}

/// Validated configuration.
///
/// Only obtainable through `TryFrom<RawConfigFile>` (or the loader), so code
/// holding a `ConfigFile` can rely on the invariants checked in `validate`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub release: ReleaseSection,
    pub project: ProjectSection,
    pub server: ServerSection,
    pub dependencies: DependenciesSection,
    pub provision: ProvisionSection,
    pub transport: TransportSection,
    pub health_check: Option<HealthCheckSection>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            release: raw.release,
            project: raw.project,
            server: raw.server,
            dependencies: raw.dependencies,
            provision: raw.provision,
            transport: raw.transport,
            health_check: raw.health_check,
        }
    }

    /// Absolute path of the server log on the host.
    pub fn log_path(&self) -> PathBuf {
        self.project.resolve(&self.server.log_file)
    }

    /// Absolute path of the directory holding the pid/release files.
    pub fn state_dir(&self) -> PathBuf {
        self.project.resolve(&self.server.state_dir)
    }

    pub fn pid_file(&self) -> PathBuf {
        self.state_dir().join("server.pid")
    }

    pub fn release_file(&self) -> PathBuf {
        self.state_dir().join("release")
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.project.resolve(&self.dependencies.manifest)
    }

    /// Absolute path of the sandboxed environment, if isolation is enabled.
    pub fn environment_dir(&self) -> Option<PathBuf> {
        match self.dependencies.isolation {
            DependencyIsolation::Sandboxed => {
                Some(self.project.resolve(&self.dependencies.environment_dir))
            }
            DependencyIsolation::Global => None,
        }
    }

    /// Command-line fragment identifying the server process.
    pub fn signature(&self) -> &str {
        self.server
            .signature
            .as_deref()
            .unwrap_or(&self.server.command)
    }
}

/// `[release]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReleaseSection {
    /// Fixed identifier prefix, e.g. `release` in `release-20250101120000-abcd123`.
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// The only branch releases may be minted from.
    #[serde(default = "default_trunk_branch")]
    pub trunk_branch: String,

    /// Shared remote the marker is published to.
    #[serde(default = "default_remote")]
    pub remote: String,

    /// Annotation message; `{id}` is replaced by the identifier.
    #[serde(default = "default_message")]
    pub message: String,
}

fn default_prefix() -> String {
    "release".to_string()
}

fn default_trunk_branch() -> String {
    "main".to_string()
}

fn default_remote() -> String {
    "origin".to_string()
}

fn default_message() -> String {
    "Release {id}".to_string()
}

impl Default for ReleaseSection {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            trunk_branch: default_trunk_branch(),
            remote: default_remote(),
            message: default_message(),
        }
    }
}

/// `[project]` section: where the project lives on the host.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectSection {
    #[serde(default = "default_project_path")]
    pub path: PathBuf,

    /// Clone URL used by provisioning.
    #[serde(default)]
    pub repository_url: Option<String>,

    /// Name of the remote inside the host's checkout.
    #[serde(default = "default_remote")]
    pub remote: String,
}

fn default_project_path() -> PathBuf {
    PathBuf::from("/srv/app")
}

impl ProjectSection {
    /// Resolve a possibly relative path against the project directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.path.join(path)
        }
    }
}

impl Default for ProjectSection {
    fn default() -> Self {
        Self {
            path: default_project_path(),
            repository_url: None,
            remote: default_remote(),
        }
    }
}

/// `[server]` section: the long-running process being deployed.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    /// Launch command, run from the project directory.
    #[serde(default = "default_command")]
    pub command: String,

    /// Command-line fragment that identifies a running server.
    ///
    /// Defaults to `command`.
    #[serde(default)]
    pub signature: Option<String>,

    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,

    /// IANA timezone exported as `TZ` to the server.
    #[serde(default = "default_timezone")]
    pub timezone: String,

    #[serde(default)]
    pub stop_policy: StopPolicy,

    /// Seconds to wait after SIGTERM before escalating to SIGKILL.
    #[serde(default = "default_stop_timeout_secs")]
    pub stop_timeout_secs: u64,

    /// Rotate the log before launch once it reaches this size; 0 disables.
    #[serde(default = "default_log_rotate_bytes")]
    pub log_rotate_bytes: u64,

    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
}

fn default_command() -> String {
    "python main.py".to_string()
}

fn default_log_file() -> PathBuf {
    PathBuf::from("bot.log")
}

fn default_timezone() -> String {
    "Europe/Moscow".to_string()
}

fn default_stop_timeout_secs() -> u64 {
    10
}

fn default_log_rotate_bytes() -> u64 {
    10 * 1024 * 1024
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".shipyard")
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            command: default_command(),
            signature: None,
            log_file: default_log_file(),
            timezone: default_timezone(),
            stop_policy: StopPolicy::default(),
            stop_timeout_secs: default_stop_timeout_secs(),
            log_rotate_bytes: default_log_rotate_bytes(),
            state_dir: default_state_dir(),
        }
    }
}

/// `[dependencies]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DependenciesSection {
    #[serde(default)]
    pub isolation: DependencyIsolation,

    /// Dependency manifest, relative to the project directory.
    #[serde(default = "default_manifest")]
    pub manifest: PathBuf,

    /// Runtime interpreter used to create the environment / install globally.
    #[serde(default = "default_runtime")]
    pub runtime: String,

    #[serde(default = "default_environment_dir")]
    pub environment_dir: PathBuf,
}

fn default_manifest() -> PathBuf {
    PathBuf::from("requirements.txt")
}

fn default_runtime() -> String {
    "python3".to_string()
}

fn default_environment_dir() -> PathBuf {
    PathBuf::from(".venv")
}

impl Default for DependenciesSection {
    fn default() -> Self {
        Self {
            isolation: DependencyIsolation::default(),
            manifest: default_manifest(),
            runtime: default_runtime(),
            environment_dir: default_environment_dir(),
        }
    }
}

/// `[provision]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProvisionSection {
    /// OS packages installed with apt-get.
    #[serde(default = "default_packages")]
    pub packages: Vec<String>,

    /// Owner of the project directory; defaults to the host user.
    #[serde(default)]
    pub owner: Option<String>,
}

fn default_packages() -> Vec<String> {
    ["git", "python3", "python3-venv", "python3-pip"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for ProvisionSection {
    fn default() -> Self {
        Self {
            packages: default_packages(),
            owner: None,
        }
    }
}

/// `[transport]` section: how the remote session is opened.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransportSection {
    #[serde(default = "default_ssh_program")]
    pub ssh_program: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub identity_file: Option<PathBuf>,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Hard ceiling on a whole remote session.
    #[serde(default = "default_session_timeout_secs")]
    pub session_timeout_secs: u64,

    /// Extra `-o Key=Value` options passed to ssh.
    #[serde(default)]
    pub options: Vec<String>,
}

fn default_ssh_program() -> String {
    "ssh".to_string()
}

fn default_port() -> u16 {
    22
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_session_timeout_secs() -> u64 {
    600
}

impl Default for TransportSection {
    fn default() -> Self {
        Self {
            ssh_program: default_ssh_program(),
            port: default_port(),
            identity_file: None,
            connect_timeout_secs: default_connect_timeout_secs(),
            session_timeout_secs: default_session_timeout_secs(),
            options: Vec::new(),
        }
    }
}

/// `[health_check]` section. Absent means no health check.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HealthCheckSection {
    /// Shell command run on the host from the project directory.
    pub command: String,

    #[serde(default = "default_health_delay_secs")]
    pub delay_secs: u64,

    #[serde(default = "default_health_attempts")]
    pub attempts: u32,
}

fn default_health_delay_secs() -> u64 {
    3
}

fn default_health_attempts() -> u32 {
    1
}
