// src/types.rs

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How runtime dependencies are installed on the host.
///
/// - `Sandboxed`: a per-project environment (e.g. a virtualenv) under the
///   project directory; its `bin/` is put first on `PATH` at launch.
/// - `Global`: install straight into the host-wide runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyIsolation {
    Sandboxed,
    Global,
}

impl Default for DependencyIsolation {
    fn default() -> Self {
        DependencyIsolation::Sandboxed
    }
}

impl FromStr for DependencyIsolation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sandboxed" => Ok(DependencyIsolation::Sandboxed),
            "global" => Ok(DependencyIsolation::Global),
            other => Err(format!(
                "invalid dependency isolation: {other} (expected \"sandboxed\" or \"global\")"
            )),
        }
    }
}

/// How the previous server instance is located before it is signalled.
///
/// - `Identity` (default): only the pid recorded at launch, and only while
///   its command line still contains the server signature.
/// - `Pattern`: every process whose command line contains the signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StopPolicy {
    Identity,
    Pattern,
}

impl Default for StopPolicy {
    fn default() -> Self {
        StopPolicy::Identity
    }
}

impl FromStr for StopPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "identity" => Ok(StopPolicy::Identity),
            "pattern" => Ok(StopPolicy::Pattern),
            other => Err(format!(
                "invalid stop policy: {other} (expected \"identity\" or \"pattern\")"
            )),
        }
    }
}

/// One stage of a remote script.
///
/// Every stage owns a distinct exit status so that a failure inside the
/// single remote session can be attributed to the stage that caused it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    // provisioning
    InstallPackages,
    PrepareDirectory,
    CloneRepository,
    CreateEnvironment,
    // deploy
    Fetch,
    Resolve,
    Checkout,
    SyncDependencies,
    StopPrevious,
    Launch,
    HealthCheck,
    // read-only
    Inspect,
}

impl Stage {
    pub const ALL: [Stage; 12] = [
        Stage::InstallPackages,
        Stage::PrepareDirectory,
        Stage::CloneRepository,
        Stage::CreateEnvironment,
        Stage::Fetch,
        Stage::Resolve,
        Stage::Checkout,
        Stage::SyncDependencies,
        Stage::StopPrevious,
        Stage::Launch,
        Stage::HealthCheck,
        Stage::Inspect,
    ];

    /// Exit status the remote script uses when this stage fails.
    ///
    /// Kept clear of 1/2 (generic shell failures), 126/127 (command not
    /// found) and 255 (ssh's own failure status).
    pub fn exit_code(self) -> i32 {
        match self {
            Stage::InstallPackages => 60,
            Stage::PrepareDirectory => 61,
            Stage::CloneRepository => 62,
            Stage::CreateEnvironment => 63,
            Stage::Fetch => 70,
            Stage::Resolve => 71,
            Stage::Checkout => 72,
            Stage::SyncDependencies => 73,
            Stage::StopPrevious => 74,
            Stage::Launch => 75,
            Stage::HealthCheck => 76,
            Stage::Inspect => 80,
        }
    }

    pub fn from_exit_code(code: i32) -> Option<Stage> {
        Stage::ALL.into_iter().find(|s| s.exit_code() == code)
    }

    pub fn name(self) -> &'static str {
        match self {
            Stage::InstallPackages => "install_packages",
            Stage::PrepareDirectory => "prepare_directory",
            Stage::CloneRepository => "clone_repository",
            Stage::CreateEnvironment => "create_environment",
            Stage::Fetch => "fetch",
            Stage::Resolve => "resolve",
            Stage::Checkout => "checkout",
            Stage::SyncDependencies => "sync_dependencies",
            Stage::StopPrevious => "stop_previous",
            Stage::Launch => "launch",
            Stage::HealthCheck => "health_check",
            Stage::Inspect => "inspect",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
