use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use shipyard::errors::Result;
use shipyard::exec::{CommandOutput, CommandRunner, CommandSpec};

/// A fake command runner that:
/// - records every command it is asked to run
/// - answers with queued outputs in order, then with empty successes.
#[derive(Clone, Default)]
pub struct ScriptedRunner {
    calls: Arc<Mutex<Vec<CommandSpec>>>,
    replies: Arc<Mutex<VecDeque<CommandOutput>>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(&self, output: CommandOutput) -> &Self {
        self.replies.lock().unwrap().push_back(output);
        self
    }

    pub fn reply_ok(&self, stdout: &str) -> &Self {
        self.reply(CommandOutput::success(stdout))
    }

    pub fn reply_err(&self, code: i32, stderr: &str) -> &Self {
        self.reply(CommandOutput::failure(code, stderr))
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    /// Arguments of each recorded call, joined with spaces.
    pub fn call_lines(&self) -> Vec<String> {
        self.calls()
            .iter()
            .map(|c| format!("{} {}", c.program, c.args.join(" ")))
            .collect()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        self.calls.lock().unwrap().push(spec.clone());
        let next = self.replies.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| CommandOutput::success("")))
    }
}
