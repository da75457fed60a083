// src/deploy/health.rs

//! Optional post-launch health check.
//!
//! Runs inside the deploy session after launch. A failing check fails the
//! deploy but does not roll back: the new process keeps running and the
//! report names the previous release for a manual redeploy.

use crate::config::{ConfigFile, HealthCheckSection};
use crate::host::script::{ScriptStep, quote_path};
use crate::types::Stage;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthCheck {
    pub command: String,
    pub delay_secs: u64,
    pub attempts: u32,
}

impl From<&HealthCheckSection> for HealthCheck {
    fn from(section: &HealthCheckSection) -> Self {
        Self {
            command: section.command.clone(),
            delay_secs: section.delay_secs,
            attempts: section.attempts,
        }
    }
}

impl HealthCheck {
    /// The configured check, if any.
    pub fn from_config(cfg: &ConfigFile) -> Option<Self> {
        cfg.health_check.as_ref().map(Self::from)
    }

    pub fn step(&self, cfg: &ConfigFile) -> ScriptStep {
        let project = quote_path(&cfg.project.path);
        ScriptStep::new(Stage::HealthCheck)
            .unchecked(format!(
                "healthy=0; for attempt in $(seq 1 {}); do sleep {}; if (cd {project} && {}); then healthy=1; break; fi; done",
                self.attempts, self.delay_secs, self.command
            ))
            .checked("[ \"$healthy\" = 1 ]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RawConfigFile;

    #[test]
    fn step_retries_command_from_project_dir() {
        let mut raw = RawConfigFile::default();
        raw.health_check = Some(HealthCheckSection {
            command: "curl -fsS http://127.0.0.1:8080/health".into(),
            delay_secs: 2,
            attempts: 5,
        });
        let cfg = ConfigFile::try_from(raw).unwrap();
        let check = HealthCheck::from_config(&cfg).unwrap();
        let step = check.step(&cfg);

        assert_eq!(step.stage, Stage::HealthCheck);
        assert!(step.commands[0].line.contains("$(seq 1 5)"));
        assert!(step.commands[0].line.contains("sleep 2"));
        assert!(step.commands[0]
            .line
            .contains("(cd /srv/app && curl -fsS http://127.0.0.1:8080/health)"));
        assert!(step.commands[1].checked);
    }

    #[test]
    fn absent_section_means_no_check() {
        let cfg = ConfigFile::try_from(RawConfigFile::default()).unwrap();
        assert!(HealthCheck::from_config(&cfg).is_none());
    }
}
