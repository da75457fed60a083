use std::path::PathBuf;

use shipyard::config::{ConfigFile, HealthCheckSection, RawConfigFile};
use shipyard::types::{DependencyIsolation, StopPolicy};

/// Builder for `ConfigFile` to simplify test setup.
///
/// Starts from the built-in defaults, plus a repository URL so that
/// provisioning can be planned.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        let mut config = RawConfigFile::default();
        config.project.repository_url = Some("git@example.com:team/bot.git".to_string());
        Self { config }
    }

    pub fn with_project_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.project.path = path.into();
        self
    }

    pub fn without_repository_url(mut self) -> Self {
        self.config.project.repository_url = None;
        self
    }

    pub fn with_command(mut self, command: &str) -> Self {
        self.config.server.command = command.to_string();
        self
    }

    pub fn with_stop_policy(mut self, policy: StopPolicy) -> Self {
        self.config.server.stop_policy = policy;
        self
    }

    pub fn with_runtime(mut self, runtime: &str) -> Self {
        self.config.dependencies.runtime = runtime.to_string();
        self
    }

    pub fn with_isolation(mut self, isolation: DependencyIsolation) -> Self {
        self.config.dependencies.isolation = isolation;
        self
    }

    pub fn with_health_check(mut self, command: &str, attempts: u32) -> Self {
        self.config.health_check = Some(HealthCheckSection {
            command: command.to_string(),
            delay_secs: 0,
            attempts,
        });
        self
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}
