// src/config/mod.rs

//! Configuration loading and validation for `Shipyard.toml`.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, load_or_default};
pub use model::{
    ConfigFile, DependenciesSection, HealthCheckSection, ProjectSection, ProvisionSection,
    RawConfigFile, ReleaseSection, ServerSection, TransportSection,
};
