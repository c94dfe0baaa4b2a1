//! External process execution
//!
//! Every kustomize invocation goes through a [`CommandRunner`], so the
//! pipeline can be exercised against [`crate::MockRunner`] in tests and
//! against the real binary through [`ProcessRunner`].

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{KustomizeError, Result};

/// A single invocation of an external binary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Binary name or path
    pub program: String,
    /// Arguments, not including the program
    pub args: Vec<String>,
    /// Working directory (inherited when `None`)
    pub dir: Option<PathBuf>,
    /// Variables set on top of the inherited environment
    pub env: Option<Vec<(String, String)>>,
    /// Inherited variables removed before `env` is applied
    pub env_remove: Vec<String>,
}

impl CommandSpec {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            dir: None,
            env: None,
            env_remove: Vec::new(),
        }
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn env(mut self, env: Vec<(String, String)>) -> Self {
        self.env = Some(env);
        self
    }

    pub fn env_remove(mut self, names: Vec<String>) -> Self {
        self.env_remove = names;
        self
    }

    /// Render the command so it can be pasted into a shell
    ///
    /// Empty arguments become `""` and arguments containing whitespace are
    /// double-quoted with internal quotes escaped.
    pub fn to_log_string(&self) -> String {
        std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|arg| quote_arg(arg))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn quote_arg(arg: &str) -> String {
    if arg.is_empty() {
        "\"\"".to_string()
    } else if arg.chars().any(char::is_whitespace) {
        format!("{:?}", arg)
    } else {
        arg.to_string()
    }
}

/// Executes external commands synchronously
pub trait CommandRunner: Send + Sync {
    /// Run the command and return its stdout
    ///
    /// A non-zero exit status is an error carrying the command's stderr.
    fn run(&self, command: &CommandSpec) -> Result<String>;
}

/// Runs commands as child processes
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for ProcessRunner {
    fn run(&self, command: &CommandSpec) -> Result<String> {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args);

        if let Some(dir) = &command.dir {
            cmd.current_dir(dir);
        }
        for name in &command.env_remove {
            cmd.env_remove(name);
        }
        if let Some(env) = &command.env {
            cmd.envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }

        tracing::debug!("running {}", command.to_log_string());

        let output = cmd.output().map_err(|e| KustomizeError::Spawn {
            command: command.to_log_string(),
            source: e,
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(KustomizeError::ToolFailed {
                command: command.to_log_string(),
                status: output.status.to_string(),
                stderr,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
