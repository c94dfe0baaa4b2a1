//! CLI error types with exit code handling
//!
//! This module provides a unified error type for CLI operations that
//! maps errors to appropriate exit codes.

use kustwrap_core::CoreError;
use kustwrap_engine::{BuildFailure, KustomizeError};
use miette::Diagnostic;
use thiserror::Error;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum CliError {
    /// Customization spec, kustomization file or config file is unusable
    #[error("Configuration error: {message}")]
    #[diagnostic(code(kustwrap::cli::config))]
    Config {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// kustomize failed or could not be started
    #[error("kustomize failed: {message}")]
    #[diagnostic(code(kustwrap::cli::tool))]
    Tool {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Invalid command line input
    #[error("Invalid input: {message}")]
    #[diagnostic(code(kustwrap::cli::input))]
    Input { message: String },

    /// IO error (file not found, permissions, etc.)
    #[error("IO error: {message}")]
    #[diagnostic(code(kustwrap::cli::io))]
    Io { message: String },

    /// Wrapped error for passthrough (stores the formatted message)
    #[error("{message}")]
    #[diagnostic(code(kustwrap::cli::error))]
    Other { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config { .. } => exit_codes::CONFIG_ERROR,
            CliError::Tool { .. } => exit_codes::TOOL_ERROR,
            CliError::Input { .. } => exit_codes::USAGE_ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Other { .. } => exit_codes::ERROR,
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: None,
        }
    }

    /// Create a configuration error with help text
    pub fn config_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    /// Create an input error (user provided invalid input)
    pub fn input(message: impl Into<String>) -> Self {
        Self::Input {
            message: message.into(),
        }
    }

    /// Attach help text to errors that carry it
    fn with_help(self, text: String) -> Self {
        match self {
            Self::Config { message, .. } => Self::Config {
                message,
                help: Some(text),
            },
            Self::Tool { message, .. } => Self::Tool {
                message,
                help: Some(text),
            },
            other => other,
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Io(e) => e.into(),
            other => CliError::config(other.to_string()),
        }
    }
}

impl From<KustomizeError> for CliError {
    fn from(err: KustomizeError) -> Self {
        let message = err.to_string();
        match err {
            KustomizeError::KustomizationNotFound { .. } => CliError::config_with_help(
                message,
                "the application path must contain kustomization.yaml, kustomization.yml or Kustomization",
            ),
            KustomizeError::UnsupportedFeature { .. } => {
                CliError::config_with_help(message, "upgrade kustomize or point --kustomize at a newer binary")
            }
            KustomizeError::InvalidKustomization { .. }
            | KustomizeError::RepoRoot { .. }
            | KustomizeError::Credentials { .. }
            | KustomizeError::Yaml(_) => CliError::config(message),
            KustomizeError::Core(core) => core.into(),
            KustomizeError::ToolFailed { .. }
            | KustomizeError::Spawn { .. }
            | KustomizeError::VersionDetection { .. }
            | KustomizeError::UnparsableVersion { .. } => CliError::Tool {
                message,
                help: None,
            },
            KustomizeError::Io { .. } => CliError::Io { message },
            _ => CliError::Other { message },
        }
    }
}

impl From<BuildFailure> for CliError {
    fn from(failure: BuildFailure) -> Self {
        let BuildFailure { commands, source } = failure;
        let err = CliError::from(source);
        if commands.is_empty() {
            return err;
        }

        let mut help = String::from("commands run before the failure:");
        for command in &commands {
            help.push_str("\n  ");
            help.push_str(command);
        }
        err.with_help(help)
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
