// src/release/manager.rs

//! Minting releases from a clean trunk checkout.

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use crate::config::ReleaseSection;
use crate::errors::{Result, ShipyardError};

use super::identifier::{Release, ReleaseId};
use super::repository::Repository;

/// Mints and resolves releases in one repository.
pub struct ReleaseManager<R: Repository> {
    repo: R,
    settings: ReleaseSection,
}

impl<R: Repository> ReleaseManager<R> {
    pub fn new(repo: R, settings: ReleaseSection) -> Self {
        Self { repo, settings }
    }

    /// Refuse unless the tree is clean and trunk is checked out.
    ///
    /// There is no override.
    pub async fn check_preconditions(&self) -> Result<()> {
        if !self.repo.is_clean().await? {
            return Err(ShipyardError::PreconditionViolation(
                "working tree has uncommitted changes".to_string(),
            ));
        }

        let trunk = &self.settings.trunk_branch;
        match self.repo.current_branch().await? {
            Some(branch) if &branch == trunk => Ok(()),
            Some(branch) => Err(ShipyardError::PreconditionViolation(format!(
                "active branch is '{branch}', releases are only minted from '{trunk}'"
            ))),
            None => Err(ShipyardError::PreconditionViolation(format!(
                "HEAD is detached, releases are only minted from '{trunk}'"
            ))),
        }
    }

    /// Mint a release at the current commit using the wall clock.
    pub async fn mint(&self) -> Result<Release> {
        self.mint_at(Utc::now()).await
    }

    /// Mint a release as if the clock read `now`.
    ///
    /// The marker is created locally and then published; if publishing
    /// fails the local marker is removed again and the error is returned,
    /// so a marker that exists only locally is never left behind.
    pub async fn mint_at(&self, now: DateTime<Utc>) -> Result<Release> {
        self.check_preconditions().await?;

        let commit = self.repo.head_commit().await?;
        let created_at = self.next_timestamp(now).await?;
        let identifier = ReleaseId::new(&self.settings.prefix, created_at, &commit)?;
        let name = identifier.to_string();
        let message = self.settings.message.replace("{id}", &name);

        self.repo
            .create_annotated_tag(&name, &commit, &message)
            .await?;

        if let Err(err) = self.repo.push_tag(&self.settings.remote, &name).await {
            warn!(tag = %name, error = %err, "publish failed; removing local tag");
            if let Err(cleanup) = self.repo.delete_local_tag(&name).await {
                warn!(tag = %name, error = %cleanup, "could not remove unpublished local tag");
            }
            return Err(err);
        }

        info!(release = %identifier, commit = %commit, "release minted");

        Ok(Release {
            created_at: identifier.created_at(),
            identifier,
            source_commit: commit,
        })
    }

    /// The newest release with the configured prefix, if any.
    pub async fn latest_release(&self) -> Result<Option<ReleaseId>> {
        let tags = self.repo.list_tags(&self.settings.prefix).await?;
        Ok(tags
            .iter()
            .filter_map(|t| ReleaseId::parse_with_prefix(t, &self.settings.prefix).ok())
            .max())
    }

    /// Look up an existing release and the commit it annotates.
    pub async fn resolve(&self, identifier: &ReleaseId) -> Result<Release> {
        let name = identifier.to_string();
        let commit = self
            .repo
            .tag_commit(&name)
            .await?
            .ok_or_else(|| ShipyardError::Resolution {
                identifier: name.clone(),
                detail: "no such marker in the local repository".to_string(),
            })?;
        Ok(Release {
            identifier: identifier.clone(),
            created_at: identifier.created_at(),
            source_commit: commit,
        })
    }

    /// A creation time strictly after the newest existing release.
    ///
    /// Identifiers have second precision, so two mints within one second (or
    /// a clock that stepped backwards) would otherwise collide or sort out of
    /// order.
    async fn next_timestamp(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let now_secs = now - Duration::nanoseconds(i64::from(now.timestamp_subsec_nanos()));
        match self.latest_release().await? {
            Some(latest) if latest.created_at() >= now_secs => {
                warn!(latest = %latest, "clock has not advanced past newest release; bumping timestamp");
                Ok(latest.created_at() + Duration::seconds(1))
            }
            _ => Ok(now_secs),
        }
    }
}
