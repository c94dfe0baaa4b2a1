//! Error types for kustwrap-engine

use kustwrap_core::CoreError;
use semver::Version;
use thiserror::Error;

use crate::version::Feature;

/// Result type for kustwrap-engine operations
pub type Result<T> = std::result::Result<T, KustomizeError>;

/// Errors that can occur while driving kustomize
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KustomizeError {
    // ============ Configuration Errors ============
    #[error("kustomization file not found in the path {dir}")]
    KustomizationNotFound { dir: String },

    #[error("invalid kustomization file {path}: {message}")]
    InvalidKustomization { path: String, message: String },

    #[error("{feature} not supported: requires kustomize v{required} and above, found v{detected}")]
    UnsupportedFeature {
        feature: Feature,
        required: Version,
        detected: Version,
    },

    #[error("failed to open the repo folder {path}: {source}")]
    RepoRoot {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to resolve repository credentials: {message}")]
    Credentials { message: String },

    // ============ Invocation Errors ============
    #[error("`{command}` failed {status}: {stderr}")]
    ToolFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("failed to execute `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    // ============ Version Errors ============
    #[error("could not get kustomize version: {message}")]
    VersionDetection { message: String },

    #[error("expected string that includes semver formatted version but got: '{output}'")]
    UnparsableVersion { output: String },

    // ============ Wrapped Errors ============
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl KustomizeError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// True for failures reported by the kustomize process itself
    pub fn is_tool_failure(&self) -> bool {
        matches!(self, Self::ToolFailed { .. } | Self::Spawn { .. })
    }
}

/// A failed build, with the redacted commands that ran before the failure
#[derive(Debug, Error)]
#[error("{source}")]
pub struct BuildFailure {
    /// Commands executed up to and including the failing one
    pub commands: Vec<String>,
    #[source]
    pub source: KustomizeError,
}

impl BuildFailure {
    pub fn error(&self) -> &KustomizeError {
        &self.source
    }

    pub fn into_error(self) -> KustomizeError {
        self.source
    }
}
