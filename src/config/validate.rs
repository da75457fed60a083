// src/config/validate.rs

use std::sync::LazyLock;

use regex::Regex;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{Result, ShipyardError};

static PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9._]*$").expect("static regex"));

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::ShipyardError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_release(cfg)?;
    validate_project(cfg)?;
    validate_server(cfg)?;
    validate_transport(cfg)?;
    validate_health_check(cfg)?;
    Ok(())
}

fn config_error(msg: impl Into<String>) -> ShipyardError {
    ShipyardError::ConfigError(msg.into())
}

fn validate_release(cfg: &RawConfigFile) -> Result<()> {
    // The prefix may not contain '-' so identifiers split unambiguously.
    if !PREFIX_RE.is_match(&cfg.release.prefix) {
        return Err(config_error(format!(
            "[release].prefix must start with a letter and contain only letters, digits, '.' or '_' (got {:?})",
            cfg.release.prefix
        )));
    }
    if cfg.release.trunk_branch.trim().is_empty() {
        return Err(config_error("[release].trunk_branch must not be empty"));
    }
    if cfg.release.remote.trim().is_empty() {
        return Err(config_error("[release].remote must not be empty"));
    }
    Ok(())
}

fn validate_project(cfg: &RawConfigFile) -> Result<()> {
    if !cfg.project.path.is_absolute() {
        return Err(config_error(format!(
            "[project].path must be absolute (got {})",
            cfg.project.path.display()
        )));
    }
    if cfg.project.remote.trim().is_empty() {
        return Err(config_error("[project].remote must not be empty"));
    }
    Ok(())
}

fn validate_server(cfg: &RawConfigFile) -> Result<()> {
    if cfg.server.command.trim().is_empty() {
        return Err(config_error("[server].command must not be empty"));
    }
    if let Some(sig) = &cfg.server.signature {
        if sig.trim().is_empty() {
            return Err(config_error("[server].signature must not be empty when set"));
        }
    }
    let tz = &cfg.server.timezone;
    if tz.is_empty() || tz.chars().any(char::is_whitespace) {
        return Err(config_error(format!(
            "[server].timezone must be a single IANA name like \"Europe/Moscow\" (got {tz:?})"
        )));
    }
    Ok(())
}

fn validate_transport(cfg: &RawConfigFile) -> Result<()> {
    if cfg.transport.session_timeout_secs == 0 {
        return Err(config_error(
            "[transport].session_timeout_secs must be >= 1 (got 0)",
        ));
    }
    if cfg.transport.ssh_program.trim().is_empty() {
        return Err(config_error("[transport].ssh_program must not be empty"));
    }
    Ok(())
}

fn validate_health_check(cfg: &RawConfigFile) -> Result<()> {
    if let Some(hc) = &cfg.health_check {
        if hc.command.trim().is_empty() {
            return Err(config_error("[health_check].command must not be empty"));
        }
        if hc.attempts == 0 {
            return Err(config_error("[health_check].attempts must be >= 1 (got 0)"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn expect_config_error(raw: RawConfigFile, needle: &str) {
        match ConfigFile::try_from(raw) {
            Err(ShipyardError::ConfigError(msg)) => {
                assert!(msg.contains(needle), "message {msg:?} lacks {needle:?}")
            }
            other => panic!("expected ConfigError, got {other:?}"),
        }
    }

    #[test]
    fn defaults_are_valid() {
        let cfg = ConfigFile::try_from(RawConfigFile::default()).unwrap();
        assert_eq!(cfg.signature(), "python main.py");
        assert_eq!(cfg.log_path(), PathBuf::from("/srv/app/bot.log"));
        assert_eq!(cfg.pid_file(), PathBuf::from("/srv/app/.shipyard/server.pid"));
        assert_eq!(cfg.environment_dir(), Some(PathBuf::from("/srv/app/.venv")));
    }

    #[test]
    fn prefix_with_dash_is_rejected() {
        let mut raw = RawConfigFile::default();
        raw.release.prefix = "my-release".into();
        expect_config_error(raw, "[release].prefix");
    }

    #[test]
    fn relative_project_path_is_rejected() {
        let mut raw = RawConfigFile::default();
        raw.project.path = PathBuf::from("srv/app");
        expect_config_error(raw, "must be absolute");
    }

    #[test]
    fn timezone_with_spaces_is_rejected() {
        let mut raw = RawConfigFile::default();
        raw.server.timezone = "Europe/Moscow; rm -rf /".into();
        expect_config_error(raw, "[server].timezone");
    }

    #[test]
    fn zero_session_timeout_is_rejected() {
        let mut raw = RawConfigFile::default();
        raw.transport.session_timeout_secs = 0;
        expect_config_error(raw, "session_timeout_secs");
    }
}
