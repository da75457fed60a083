// src/deploy/mod.rs

//! Deploy Orchestrator and the process lifecycle it embeds.
//!
//! - [`plan`] builds the single remote script for a release.
//! - [`lifecycle`] holds the stop/launch stages.
//! - [`health`] is the optional post-launch check.
//! - [`orchestrator`] executes the script and maps failures to errors.

pub mod health;
pub mod lifecycle;
pub mod orchestrator;
pub mod plan;

pub use health::HealthCheck;
pub use orchestrator::{DeployReport, Deployer, classify_failure};
pub use plan::deploy_script;
