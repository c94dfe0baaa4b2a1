//! Kustomize version detection and feature gating
//!
//! The version is probed once with `kustomize version --short` and cached in
//! the [`VersionOracle`]. When the output cannot be parsed the oracle assumes
//! the output format changed again and falls back to `v99.99.99`, so every
//! version-gated feature is treated as supported.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;
use semver::{BuildMetadata, Prerelease, Version};

use crate::error::{KustomizeError, Result};
use crate::exec::{CommandRunner, CommandSpec};

/// Version assumed when detection fails
pub const UNKNOWN_VERSION: Version = Version::new(99, 99, 99);

/// Default kustomize binary name
pub const DEFAULT_BINARY: &str = "kustomize";

static SEMVER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"v?(?P<major>[0-9]+)(?:\.(?P<minor>[0-9]+))?(?:\.(?P<patch>[0-9]+))?(?:-(?P<pre>[0-9A-Za-z\-]+(?:\.[0-9A-Za-z\-]+)*))?(?:\+(?P<build>[0-9A-Za-z\-]+(?:\.[0-9A-Za-z\-]+)*))?",
    )
    .expect("valid regex")
});

/// Behaviour that depends on the installed kustomize version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    /// `edit add label/annotation` takes one argument per pair (v3.8.5)
    SeparateEditAddArgs,
    /// `edit add component` (v3.7.0)
    Components,
    /// `--helm-kube-version` and `--helm-api-versions` build flags (v5.3.0)
    HelmVersionFlags,
}

impl Feature {
    /// Minimum kustomize version providing this feature
    pub fn min_version(self) -> Version {
        match self {
            Feature::SeparateEditAddArgs => Version::new(3, 8, 5),
            Feature::Components => Version::new(3, 7, 0),
            Feature::HelmVersionFlags => Version::new(5, 3, 0),
        }
    }

    /// True if `version` provides this feature
    pub fn supported_by(self, version: &Version) -> bool {
        *version >= self.min_version()
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Feature::SeparateEditAddArgs => "separate edit add arguments",
            Feature::Components => "kustomize components",
            Feature::HelmVersionFlags => "helm version flags",
        };
        f.write_str(name)
    }
}

/// Lazily detected, cached kustomize version
pub struct VersionOracle {
    binary: String,
    runner: Arc<dyn CommandRunner>,
    version: OnceCell<Version>,
}

impl fmt::Debug for VersionOracle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VersionOracle")
            .field("binary", &self.binary)
            .field("version", &self.version.get())
            .finish()
    }
}

impl VersionOracle {
    /// Create an oracle that probes `binary` on first use
    pub fn new(binary: impl Into<String>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            binary: binary.into(),
            runner,
            version: OnceCell::new(),
        }
    }

    /// Create an oracle with an already known version; the binary is never probed
    pub fn with_version(
        binary: impl Into<String>,
        runner: Arc<dyn CommandRunner>,
        version: Version,
    ) -> Self {
        let oracle = Self::new(binary, runner);
        // A fresh cell is always empty
        let _ = oracle.version.set(version);
        oracle
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// The detected version, probing the binary on first call
    ///
    /// Concurrent first callers block until one of them has finished probing.
    pub fn get(&self) -> &Version {
        self.version.get_or_init(|| match self.detect() {
            Ok(version) => {
                tracing::debug!("detected kustomize {}", version);
                version
            }
            Err(e) => {
                tracing::warn!("Failed to parse kustomize version: {}", e);
                UNKNOWN_VERSION
            }
        })
    }

    /// Whether the detected version provides `feature`
    pub fn supports(&self, feature: Feature) -> bool {
        feature.supported_by(self.get())
    }

    /// Fail with `UnsupportedFeature` unless `feature` is available
    pub fn require(&self, feature: Feature) -> Result<()> {
        let detected = self.get();
        if feature.supported_by(detected) {
            Ok(())
        } else {
            Err(KustomizeError::UnsupportedFeature {
                feature,
                required: feature.min_version(),
                detected: detected.clone(),
            })
        }
    }

    /// Normalized version text, without parsing or caching
    pub fn version_text(&self) -> Result<String> {
        version_with_runner(&self.binary, self.runner.as_ref())
    }

    fn detect(&self) -> Result<Version> {
        let text = self.version_text()?;
        parse_version(&text)
    }
}

/// Query the version text of a kustomize binary
pub fn version(binary: &str) -> Result<String> {
    version_with_runner(binary, &crate::exec::ProcessRunner)
}

fn version_with_runner(binary: &str, runner: &dyn CommandRunner) -> Result<String> {
    let command = CommandSpec::new(binary, ["version", "--short"]);
    let output = runner
        .run(&command)
        .map_err(|e| KustomizeError::VersionDetection {
            message: e.to_string(),
        })?;
    Ok(normalize_version_output(&output))
}

/// Clean up `kustomize version --short` output
///
/// `{kustomize/v3.8.1  2020-07-16T00:58:46Z  }` becomes
/// `v3.8.1 2020-07-16T00:58:46Z`.
pub fn normalize_version_output(output: &str) -> String {
    let version = output.trim();
    let version = version.strip_prefix('{').unwrap_or(version);
    let version = version.strip_suffix('}').unwrap_or(version);
    let version = version.trim().replace("  ", " ");
    match version.strip_prefix("kustomize/") {
        Some(rest) => rest.to_string(),
        None => version,
    }
}

/// Extract the first semver-shaped substring of `text`
///
/// Missing minor and patch components default to zero, so `v4` parses as
/// `4.0.0`.
pub fn parse_version(text: &str) -> Result<Version> {
    let unparsable = || KustomizeError::UnparsableVersion {
        output: text.to_string(),
    };

    let caps = SEMVER_RE.captures(text).ok_or_else(unparsable)?;
    let number = |name: &str| -> Result<u64> {
        caps.name(name)
            .map_or(Ok(0), |m| m.as_str().parse::<u64>())
            .map_err(|_| unparsable())
    };

    let mut version = Version::new(number("major")?, number("minor")?, number("patch")?);
    if let Some(pre) = caps.name("pre") {
        version.pre = Prerelease::new(pre.as_str()).map_err(|_| unparsable())?;
    }
    if let Some(build) = caps.name("build") {
        version.build = BuildMetadata::new(build.as_str()).map_err(|_| unparsable())?;
    }
    Ok(version)
}
