// src/release/repository.rs

//! Local source-control access needed to mint releases.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::errors::{Result, ShipyardError};
use crate::exec::{CommandRunner, CommandSpec};

/// What the Release Manager needs from the local repository.
///
/// [`GitCli`] drives the `git` binary; tests use an in-memory fake.
#[async_trait]
pub trait Repository: Send + Sync {
    /// `true` when there are no staged, unstaged or untracked changes.
    async fn is_clean(&self) -> Result<bool>;

    /// Name of the checked-out branch, `None` on a detached HEAD.
    async fn current_branch(&self) -> Result<Option<String>>;

    /// Full hash of `HEAD`.
    async fn head_commit(&self) -> Result<String>;

    /// Marker names starting with `prefix`.
    async fn list_tags(&self, prefix: &str) -> Result<Vec<String>>;

    /// Full commit hash a marker points at, `None` if it does not exist.
    async fn tag_commit(&self, name: &str) -> Result<Option<String>>;

    async fn create_annotated_tag(&self, name: &str, commit: &str, message: &str) -> Result<()>;

    /// Publish a marker to the shared remote.
    async fn push_tag(&self, remote: &str, name: &str) -> Result<()>;

    async fn delete_local_tag(&self, name: &str) -> Result<()>;
}

/// [`Repository`] implemented on top of the `git` command line.
pub struct GitCli {
    runner: Arc<dyn CommandRunner>,
    workdir: Option<PathBuf>,
}

impl GitCli {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            workdir: None,
        }
    }

    /// Operate on the repository at `dir` instead of the current directory.
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(dir.into());
        self
    }

    fn spec(&self, args: &[&str]) -> CommandSpec {
        let spec = CommandSpec::new("git").args(args.iter().copied());
        match &self.workdir {
            Some(dir) => spec.cwd(dir.clone()),
            None => spec,
        }
    }

    /// Run git and return stdout, mapping a non-zero exit to `Git`.
    async fn git(&self, args: &[&str]) -> Result<String> {
        let output = self.runner.run(&self.spec(args)).await?;
        if !output.is_success() {
            return Err(ShipyardError::Git(format!(
                "git {} failed: {}",
                args.join(" "),
                output.diagnostic()
            )));
        }
        Ok(output.stdout)
    }
}

#[async_trait]
impl Repository for GitCli {
    async fn is_clean(&self) -> Result<bool> {
        let status = self.git(&["status", "--porcelain"]).await?;
        Ok(status.trim().is_empty())
    }

    async fn current_branch(&self) -> Result<Option<String>> {
        // `symbolic-ref` fails on a detached HEAD; that is not an error here.
        let output = self
            .runner
            .run(&self.spec(&["symbolic-ref", "--quiet", "--short", "HEAD"]))
            .await?;
        match output.exit_code {
            Some(0) => Ok(Some(output.stdout.trim().to_string())),
            Some(1) => Ok(None),
            _ => Err(ShipyardError::Git(format!(
                "git symbolic-ref failed: {}",
                output.diagnostic()
            ))),
        }
    }

    async fn head_commit(&self) -> Result<String> {
        Ok(self.git(&["rev-parse", "HEAD"]).await?.trim().to_string())
    }

    async fn list_tags(&self, prefix: &str) -> Result<Vec<String>> {
        let pattern = format!("{prefix}-*");
        let out = self.git(&["tag", "--list", &pattern]).await?;
        Ok(out
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn tag_commit(&self, name: &str) -> Result<Option<String>> {
        let rev = format!("refs/tags/{name}^{{commit}}");
        let output = self
            .runner
            .run(&self.spec(&["rev-parse", "--verify", "--quiet", &rev]))
            .await?;
        if output.is_success() {
            Ok(Some(output.stdout.trim().to_string()))
        } else {
            Ok(None)
        }
    }

    async fn create_annotated_tag(&self, name: &str, commit: &str, message: &str) -> Result<()> {
        self.git(&["tag", "--annotate", name, "--message", message, commit])
            .await?;
        debug!(tag = %name, commit = %commit, "created annotated tag");
        Ok(())
    }

    async fn push_tag(&self, remote: &str, name: &str) -> Result<()> {
        let refspec = format!("refs/tags/{name}");
        let output = self
            .runner
            .run(&self.spec(&["push", remote, &refspec]))
            .await?;
        if !output.is_success() {
            return Err(ShipyardError::transport(format!(
                "pushing {name} to {remote} failed: {}",
                output.diagnostic()
            )));
        }
        info!(tag = %name, remote = %remote, "published tag");
        Ok(())
    }

    async fn delete_local_tag(&self, name: &str) -> Result<()> {
        self.git(&["tag", "--delete", name]).await?;
        Ok(())
    }
}
