//! Mock command runner for testing
//!
//! Records every invocation in memory and answers with scripted responses,
//! so the edit pipeline can be tested without a kustomize binary.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{KustomizeError, Result};
use crate::exec::{CommandRunner, CommandSpec};

/// Scripted outcome of a mocked command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockResponse {
    /// Succeed with this stdout
    Output(String),
    /// Fail with this stderr
    Failure(String),
}

/// In-memory command runner for testing
#[derive(Debug, Clone, Default)]
pub struct MockRunner {
    /// Every command received, in order
    calls: Arc<Mutex<Vec<CommandSpec>>>,
    /// Responses keyed by argument prefix; first match wins
    responses: Arc<Mutex<Vec<(Vec<String>, MockResponse)>>>,
}

impl MockRunner {
    /// Create a runner that answers every command with empty output
    pub fn new() -> Self {
        Self::default()
    }

    /// Respond to commands whose arguments start with `args_prefix`
    pub fn on(self, args_prefix: &[&str], response: MockResponse) -> Self {
        lock(&self.responses).push((
            args_prefix.iter().map(|s| s.to_string()).collect(),
            response,
        ));
        self
    }

    /// Answer `version --short` with the given text
    pub fn with_version(self, output: &str) -> Self {
        self.on(&["version", "--short"], MockResponse::Output(output.to_string()))
    }

    /// Fail commands whose arguments start with `args_prefix`
    pub fn failing(self, args_prefix: &[&str], stderr: &str) -> Self {
        self.on(args_prefix, MockResponse::Failure(stderr.to_string()))
    }

    /// All recorded commands
    pub fn calls(&self) -> Vec<CommandSpec> {
        lock(&self.calls).clone()
    }

    /// Recorded argument lists, excluding version probes
    pub fn edit_invocations(&self) -> Vec<Vec<String>> {
        lock(&self.calls)
            .iter()
            .filter(|c| c.args.first().map(String::as_str) != Some("version"))
            .map(|c| c.args.clone())
            .collect()
    }

    /// Number of recorded commands
    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Forget recorded commands
    pub fn reset(&self) {
        lock(&self.calls).clear();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl CommandRunner for MockRunner {
    fn run(&self, command: &CommandSpec) -> Result<String> {
        lock(&self.calls).push(command.clone());

        let responses = lock(&self.responses);
        let response = responses
            .iter()
            .find(|(prefix, _)| command.args.starts_with(prefix))
            .map(|(_, r)| r.clone());

        match response {
            Some(MockResponse::Output(out)) => Ok(out),
            Some(MockResponse::Failure(stderr)) => Err(KustomizeError::ToolFailed {
                command: command.to_log_string(),
                status: "exit status: 1".to_string(),
                stderr,
            }),
            None => Ok(String::new()),
        }
    }
}
