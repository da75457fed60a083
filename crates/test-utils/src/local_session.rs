use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use shipyard::errors::Result;
use shipyard::exec::{CommandOutput, CommandRunner, CommandSpec, TokioCommandRunner};
use shipyard::host::{Host, RemoteScript, RemoteSession};

/// Runs scripts with the local `bash -s`, the way `SshSession` runs them on
/// the host, so rendered scripts can be exercised against real processes.
#[derive(Clone)]
pub struct LocalSession {
    host: Host,
    runner: TokioCommandRunner,
}

impl LocalSession {
    pub fn new(project_path: &Path) -> Self {
        let host = Host::new("tester", "localhost", project_path)
            .expect("local session needs an absolute project path");
        Self {
            host,
            runner: TokioCommandRunner::new(),
        }
    }
}

#[async_trait]
impl RemoteSession for LocalSession {
    fn host(&self) -> &Host {
        &self.host
    }

    async fn execute(&self, script: &RemoteScript) -> Result<CommandOutput> {
        let spec = CommandSpec::new("bash")
            .arg("-s")
            .stdin(script.render())
            .timeout(Duration::from_secs(60));
        self.runner.run(&spec).await
    }
}
