// src/host/session.rs

//! Remote sessions: how a [`RemoteScript`] reaches the host.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::TransportSection;
use crate::errors::{Result, ShipyardError};
use crate::exec::{CommandOutput, CommandRunner, CommandSpec};

use super::Host;
use super::script::RemoteScript;

/// Exit status ssh itself uses for connection and protocol failures.
pub const SSH_FAILURE_STATUS: i32 = 255;

/// A transport able to run one script on one host.
///
/// `execute` returns `Ok` whenever the script ran, whatever its exit
/// status; `Err` means the session itself failed (connection refused,
/// authentication, timeout), which leaves the host in an unknown state.
#[async_trait]
pub trait RemoteSession: Send + Sync {
    fn host(&self) -> &Host;

    async fn execute(&self, script: &RemoteScript) -> Result<CommandOutput>;
}

/// Runs scripts through the `ssh` client, feeding the script on stdin to
/// `bash -s`, so its text never shows up in a remote process listing.
pub struct SshSession {
    host: Host,
    transport: TransportSection,
    runner: Arc<dyn CommandRunner>,
}

impl SshSession {
    pub fn new(host: Host, transport: TransportSection, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            host,
            transport,
            runner,
        }
    }

    /// The ssh invocation for a script, without the script itself.
    pub fn command_for(&self, script: &RemoteScript) -> CommandSpec {
        let t = &self.transport;
        let mut spec = CommandSpec::new(&t.ssh_program)
            .args(["-o", "BatchMode=yes"])
            .arg("-o")
            .arg(format!("ConnectTimeout={}", t.connect_timeout_secs))
            .arg("-p")
            .arg(t.port.to_string());

        if let Some(identity) = &t.identity_file {
            spec = spec.arg("-i").arg(identity.to_string_lossy());
        }
        for opt in &t.options {
            spec = spec.arg("-o").arg(opt.clone());
        }

        spec.arg(self.host.destination())
            .args(["bash", "-s"])
            .stdin(script.render())
            .timeout(Duration::from_secs(t.session_timeout_secs))
    }
}

#[async_trait]
impl RemoteSession for SshSession {
    fn host(&self) -> &Host {
        &self.host
    }

    async fn execute(&self, script: &RemoteScript) -> Result<CommandOutput> {
        info!(host = %self.host, script = %script.label(), "opening remote session");
        let output = self.runner.run(&self.command_for(script)).await?;

        match output.exit_code {
            Some(SSH_FAILURE_STATUS) => Err(ShipyardError::transport(format!(
                "ssh to {} failed: {}",
                self.host,
                output.diagnostic()
            ))),
            None => Err(ShipyardError::transport(format!(
                "session to {} was terminated by a signal",
                self.host
            ))),
            Some(code) => {
                debug!(host = %self.host, exit_code = code, "remote session finished");
                Ok(output)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn session(transport: TransportSection) -> SshSession {
        let host = Host::new("bob", "10.0.0.5", "/srv/app").unwrap();
        SshSession::new(host, transport, Arc::new(crate::exec::TokioCommandRunner::new()))
    }

    #[test]
    fn command_uses_batch_mode_and_stdin_script() {
        let s = session(TransportSection::default());
        let script = RemoteScript::new("uptime");
        let spec = s.command_for(&script);

        assert_eq!(spec.program, "ssh");
        assert_eq!(
            spec.args,
            vec![
                "-o", "BatchMode=yes", "-o", "ConnectTimeout=10", "-p", "22", "bob@10.0.0.5",
                "bash", "-s"
            ]
        );
        assert_eq!(spec.stdin.as_deref(), Some(script.render().as_str()));
        assert_eq!(spec.timeout, Some(Duration::from_secs(600)));
    }

    #[test]
    fn identity_file_and_options_are_forwarded() {
        let transport = TransportSection {
            identity_file: Some(PathBuf::from("/home/me/.ssh/deploy")),
            options: vec!["StrictHostKeyChecking=accept-new".to_string()],
            port: 2222,
            ..TransportSection::default()
        };
        let spec = session(transport).command_for(&RemoteScript::new("uptime"));
        let joined = spec.args.join(" ");
        assert!(joined.contains("-p 2222"));
        assert!(joined.contains("-i /home/me/.ssh/deploy"));
        assert!(joined.contains("-o StrictHostKeyChecking=accept-new bob@10.0.0.5"));
    }
}
