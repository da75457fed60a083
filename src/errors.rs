// src/errors.rs

//! Crate-wide error type, mirroring the failure taxonomy of a deploy.

use serde::Serialize;
use thiserror::Error;

use crate::types::Stage;

#[derive(Error, Debug)]
pub enum ShipyardError {
    /// Dirty tree or wrong branch at mint time.
    #[error("Precondition violated: {0}")]
    PreconditionViolation(String),

    /// The release identifier is not known to the host's repository.
    #[error("Release '{identifier}' could not be resolved: {detail}")]
    Resolution { identifier: String, detail: String },

    /// The release resolved but the host's tree could not be switched to it.
    #[error("Checkout of '{identifier}' failed: {detail}")]
    Checkout { identifier: String, detail: String },

    /// The session or network failed; the operation may be retried.
    #[error("Transport error{}: {detail}", stage_suffix(.stage))]
    Transport { stage: Option<Stage>, detail: String },

    #[error("Dependency sync failed: {0}")]
    DependencySync(String),

    /// Stopping or launching the server failed; the host needs inspection.
    #[error("Process control failed during {stage}: {detail}")]
    ProcessControl { stage: Stage, detail: String },

    #[error("Health check failed: {0}")]
    HealthCheck(String),

    /// A provisioning stage failed on the host.
    #[error("Provisioning failed during {stage}: {detail}")]
    Provision { stage: Stage, detail: String },

    /// A local git command failed.
    #[error("Git error: {0}")]
    Git(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn stage_suffix(stage: &Option<Stage>) -> String {
    match stage {
        Some(stage) => format!(" during {stage}"),
        None => String::new(),
    }
}

/// Serializable classification of a [`ShipyardError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    PreconditionViolation,
    ResolutionError,
    TransportError,
    DependencySyncError,
    ProcessControlError,
    HealthCheckError,
    ProvisionError,
    GitError,
    ConfigError,
    Internal,
}

impl ShipyardError {
    pub fn transport(detail: impl Into<String>) -> Self {
        ShipyardError::Transport {
            stage: None,
            detail: detail.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ShipyardError::PreconditionViolation(_) => ErrorKind::PreconditionViolation,
            ShipyardError::Resolution { .. } | ShipyardError::Checkout { .. } => {
                ErrorKind::ResolutionError
            }
            ShipyardError::Transport { .. } => ErrorKind::TransportError,
            ShipyardError::DependencySync(_) => ErrorKind::DependencySyncError,
            ShipyardError::ProcessControl { .. } => ErrorKind::ProcessControlError,
            ShipyardError::HealthCheck(_) => ErrorKind::HealthCheckError,
            ShipyardError::Provision { .. } => ErrorKind::ProvisionError,
            ShipyardError::Git(_) => ErrorKind::GitError,
            ShipyardError::ConfigError(_) | ShipyardError::TomlError(_) => ErrorKind::ConfigError,
            ShipyardError::IoError(_) | ShipyardError::Other(_) => ErrorKind::Internal,
        }
    }

    /// The remote stage the failure is attributed to, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            ShipyardError::Resolution { .. } => Some(Stage::Resolve),
            ShipyardError::Checkout { .. } => Some(Stage::Checkout),
            ShipyardError::Transport { stage, .. } => *stage,
            ShipyardError::DependencySync(_) => Some(Stage::SyncDependencies),
            ShipyardError::ProcessControl { stage, .. } => Some(*stage),
            ShipyardError::HealthCheck(_) => Some(Stage::HealthCheck),
            ShipyardError::Provision { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Whether retrying without any operator action can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ShipyardError::Transport { .. } | ShipyardError::DependencySync(_)
        )
    }

    /// Process exit status used by the binaries for this failure.
    ///
    /// A failure attributed to a remote stage exits with that stage's code
    /// (see [`Stage::exit_code`]), so the status names the first failing step.
    /// Everything else exits with a small per-kind code.
    pub fn exit_code(&self) -> i32 {
        if let Some(stage) = self.stage() {
            return stage.exit_code();
        }
        match self.kind() {
            ErrorKind::PreconditionViolation => 2,
            ErrorKind::ResolutionError => 3,
            ErrorKind::TransportError => 4,
            ErrorKind::DependencySyncError => 5,
            ErrorKind::ProcessControlError => 6,
            ErrorKind::HealthCheckError => 7,
            ErrorKind::ProvisionError => 8,
            ErrorKind::GitError => 9,
            ErrorKind::ConfigError => 10,
            ErrorKind::Internal => 1,
        }
    }
}

/// Machine-readable failure record printed by `--json`.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    pub ok: bool,
    pub kind: ErrorKind,
    pub stage: Option<Stage>,
    pub retryable: bool,
    pub message: String,
}

impl From<&ShipyardError> for ErrorReport {
    fn from(err: &ShipyardError) -> Self {
        ErrorReport {
            ok: false,
            kind: err.kind(),
            stage: err.stage(),
            retryable: err.is_retryable(),
            message: err.to_string(),
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, ShipyardError>;
