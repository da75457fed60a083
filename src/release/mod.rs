// src/release/mod.rs

//! Release Manager: mints uniquely named, annotated version markers.
//!
//! - [`identifier`] defines `ReleaseId` and the `Release` record.
//! - [`repository`] abstracts the local git repository.
//! - [`manager`] enforces the clean-trunk precondition and publishes markers.

pub mod identifier;
pub mod manager;
pub mod repository;

pub use identifier::{Release, ReleaseId, SHORT_COMMIT_LEN};
pub use manager::ReleaseManager;
pub use repository::{GitCli, Repository};
