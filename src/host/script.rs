// src/host/script.rs

//! Remote shell scripts made of ordered, fail-closed stages.
//!
//! A script is sent to the host in one session and runs top to bottom. Every
//! checked command is suffixed with `|| exit <code>` where the code belongs to
//! the enclosing [`Stage`], so the first failure ends the session and the
//! exit status tells the local side which stage failed.
//!
//! Scripts report facts back through marker lines on stdout:
//!
//! ```text
//! ::shipyard stage=checkout
//! ::shipyard head=0123abcd...
//! ```

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use crate::release::ReleaseId;
use crate::types::Stage;

pub const MARKER_PREFIX: &str = "::shipyard ";

/// One line of shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCommand {
    pub line: String,
    /// Whether a non-zero status aborts the script with the stage's code.
    pub checked: bool,
}

impl RemoteCommand {
    pub fn checked(line: impl Into<String>) -> Self {
        Self {
            line: line.into(),
            checked: true,
        }
    }

    pub fn unchecked(line: impl Into<String>) -> Self {
        Self {
            line: line.into(),
            checked: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptStep {
    pub stage: Stage,
    pub commands: Vec<RemoteCommand>,
}

impl ScriptStep {
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            commands: Vec::new(),
        }
    }

    pub fn checked(mut self, line: impl Into<String>) -> Self {
        self.commands.push(RemoteCommand::checked(line));
        self
    }

    pub fn unchecked(mut self, line: impl Into<String>) -> Self {
        self.commands.push(RemoteCommand::unchecked(line));
        self
    }
}

/// An ordered list of stages executed in a single remote session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteScript {
    label: String,
    release: Option<ReleaseId>,
    steps: Vec<ScriptStep>,
}

impl RemoteScript {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            release: None,
            steps: Vec::new(),
        }
    }

    /// Attach the release this script deploys.
    pub fn for_release(mut self, release: ReleaseId) -> Self {
        self.release = Some(release);
        self
    }

    pub fn push(&mut self, step: ScriptStep) {
        self.steps.push(step);
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn release(&self) -> Option<&ReleaseId> {
        self.release.as_ref()
    }

    pub fn steps(&self) -> &[ScriptStep] {
        &self.steps
    }

    pub fn stages(&self) -> Vec<Stage> {
        self.steps.iter().map(|s| s.stage).collect()
    }

    pub fn step(&self, stage: Stage) -> Option<&ScriptStep> {
        self.steps.iter().find(|s| s.stage == stage)
    }

    /// Render the script as bash source.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "#!/usr/bin/env bash");
        let _ = writeln!(out, "# shipyard: {}", self.label);
        let _ = writeln!(out, "set -u");
        for step in &self.steps {
            let code = step.stage.exit_code();
            let _ = writeln!(out);
            let _ = writeln!(out, "echo {}", shell_quote(&format!("{MARKER_PREFIX}stage={}", step.stage)));
            for cmd in &step.commands {
                if cmd.checked {
                    let _ = writeln!(out, "{} || exit {code}", cmd.line);
                } else {
                    let _ = writeln!(out, "{}", cmd.line);
                }
            }
        }
        out
    }
}

/// Quote `s` for POSIX shells.
pub fn shell_quote(s: &str) -> String {
    if !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:@%+,".contains(c))
    {
        return s.to_string();
    }
    format!("'{}'", s.replace('\'', r"'\''"))
}

pub fn quote_path(path: &Path) -> String {
    shell_quote(&path.to_string_lossy())
}

/// A line that reports `key` with the value of a shell expression.
///
/// `expr` is inserted verbatim inside double quotes, so it may use `$(...)`.
pub fn marker(key: &str, expr: &str) -> String {
    format!("echo \"{MARKER_PREFIX}{key}={expr}\"")
}

/// Collect `key=value` markers from script output; later values win.
///
/// `stage` markers are excluded; see [`stages_reached`].
pub fn parse_markers(stdout: &str) -> BTreeMap<String, String> {
    stdout
        .lines()
        .filter_map(|l| l.trim_end().strip_prefix(MARKER_PREFIX))
        .filter_map(|kv| kv.split_once('='))
        .filter(|(k, _)| *k != "stage")
        .map(|(k, v)| (k.to_string(), v.trim().to_string()))
        .collect()
}

/// Stage names in the order the script announced them.
pub fn stages_reached(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter_map(|l| l.trim_end().strip_prefix(MARKER_PREFIX))
        .filter_map(|kv| kv.strip_prefix("stage="))
        .map(str::to_string)
        .collect()
}

/// Everything except marker lines; what the remote commands printed.
pub fn plain_output(stdout: &str) -> impl Iterator<Item = &str> {
    stdout
        .lines()
        .filter(|l| !l.starts_with(MARKER_PREFIX))
}
