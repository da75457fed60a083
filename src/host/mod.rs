// src/host/mod.rs

//! The single deployment target and the ways of talking to it.
//!
//! - [`script`] models the ordered, fail-closed remote scripts.
//! - [`session`] provides the `RemoteSession` trait and its ssh transport.
//! - [`inspect`] reads the host's last known state (HEAD, live process).

pub mod inspect;
pub mod script;
pub mod session;

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::errors::{Result, ShipyardError};

pub use inspect::{HostSnapshot, inspect_host};
pub use script::{RemoteCommand, RemoteScript, ScriptStep};
pub use session::{RemoteSession, SshSession};

/// Where the server runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Host {
    pub user: String,
    pub address: String,
    pub project_path: PathBuf,
}

impl Host {
    pub fn new(
        user: impl Into<String>,
        address: impl Into<String>,
        project_path: impl Into<PathBuf>,
    ) -> Result<Self> {
        let host = Self {
            user: user.into(),
            address: address.into(),
            project_path: project_path.into(),
        };
        host.validate()?;
        Ok(host)
    }

    fn validate(&self) -> Result<()> {
        let bad = |field: &str, value: &str| {
            ShipyardError::ConfigError(format!("invalid host {field}: {value:?}"))
        };
        if self.user.is_empty() || self.user.contains(['@', ' ', '/']) {
            return Err(bad("user", &self.user));
        }
        if self.address.is_empty() || self.address.starts_with('-') || self.address.contains(' ') {
            return Err(bad("address", &self.address));
        }
        if !self.project_path.is_absolute() {
            return Err(bad("project path", &self.project_path.to_string_lossy()));
        }
        Ok(())
    }

    /// `user@address`, as passed to ssh.
    pub fn destination(&self) -> String {
        format!("{}@{}", self.user, self.address)
    }

    pub fn project_path(&self) -> &Path {
        &self.project_path
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.user, self.address, self.project_path.display())
    }
}
