//! Kustomize build orchestration
//!
//! A [`Kustomize`] ties the pieces together for one application directory:
//! it resolves repository credentials, applies the customization spec with
//! `kustomize edit`, runs `kustomize build` and extracts the images of the
//! generated resources.

use std::path::PathBuf;
use std::sync::Arc;

use kustwrap_core::{BuildOpts, CustomizationSpec, Env, KustomizeOptions, ResourceObject, split_yaml};
use semver::Version;
use serde::Serialize;
use url::Url;

use crate::build::{build_args, is_helm_enabled};
use crate::env::{
    CertBundleLocator, GIT_SSL_CAINFO, NoCertBundles, NoCredentials, RepoCredentials,
    inherited_proxy_vars, is_https_url, upsert_proxy_env,
};
use crate::error::{BuildFailure, Result};
use crate::exec::{CommandRunner, CommandSpec, ProcessRunner};
use crate::images::image_parameters;
use crate::pipeline::{ArgumentPipeline, CommandLog};
use crate::version::{DEFAULT_BINARY, Feature, VersionOracle};

/// Where an application lives and how to reach kustomize
#[derive(Debug, Clone, Default)]
pub struct KustomizeApp {
    /// Repository checkout, as an absolute path; `kustomize build` runs here
    pub repo_root: PathBuf,
    /// Application directory, absolute or relative to `repo_root`; empty
    /// for the repository root itself
    pub path: PathBuf,
    /// Repository URL, used to find a custom CA bundle
    pub repo_url: Option<String>,
    /// kustomize binary; `kustomize` from `PATH` when unset
    pub binary_path: Option<String>,
    pub proxy: Option<String>,
    pub no_proxy: Option<String>,
}

impl KustomizeApp {
    pub fn new(repo_root: impl Into<PathBuf>, path: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_repo_url(mut self, repo_url: impl Into<String>) -> Self {
        self.repo_url = Some(repo_url.into());
        self
    }

    pub fn with_binary(mut self, binary_path: impl Into<String>) -> Self {
        self.binary_path = Some(binary_path.into());
        self
    }

    pub fn with_proxy(mut self, proxy: impl Into<String>, no_proxy: Option<String>) -> Self {
        self.proxy = Some(proxy.into());
        self.no_proxy = no_proxy;
        self
    }

    /// The kustomize binary to run
    pub fn binary(&self) -> &str {
        self.binary_path
            .as_deref()
            .filter(|b| !b.is_empty())
            .unwrap_or(DEFAULT_BINARY)
    }

    /// Application directory resolved against the repository root
    pub fn app_path(&self) -> PathBuf {
        if self.path.as_os_str().is_empty() {
            self.repo_root.clone()
        } else {
            self.repo_root.join(&self.path)
        }
    }
}

/// Result of a successful build
#[derive(Debug, Clone, Serialize)]
pub struct BuildOutput {
    /// Generated resources, in kustomize output order
    pub objects: Vec<ResourceObject>,
    /// Sorted container images, duplicates kept
    pub images: Vec<String>,
    /// Commands that were run, with the repository root replaced by `.`
    pub commands: Vec<String>,
}

/// Builds one application with kustomize
pub struct Kustomize {
    app: KustomizeApp,
    runner: Arc<dyn CommandRunner>,
    oracle: Arc<VersionOracle>,
    credentials: Arc<dyn RepoCredentials>,
    cert_locator: Arc<dyn CertBundleLocator>,
}

impl std::fmt::Debug for Kustomize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Kustomize")
            .field("app", &self.app)
            .field("oracle", &self.oracle)
            .finish_non_exhaustive()
    }
}

impl Kustomize {
    /// Create a builder running the real binary without credentials
    pub fn new(app: KustomizeApp) -> Self {
        let runner: Arc<dyn CommandRunner> = Arc::new(ProcessRunner::new());
        let oracle = Arc::new(VersionOracle::new(app.binary(), runner.clone()));
        Self {
            app,
            runner,
            oracle,
            credentials: Arc::new(NoCredentials),
            cert_locator: Arc::new(NoCertBundles),
        }
    }

    /// Use `runner` for every invocation, including version detection
    ///
    /// This replaces the version oracle; call [`Kustomize::with_oracle`]
    /// afterwards to share an existing one.
    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.oracle = Arc::new(VersionOracle::new(self.app.binary(), runner.clone()));
        self.runner = runner;
        self
    }

    /// Share a version oracle, and its cached version, between builders
    pub fn with_oracle(mut self, oracle: Arc<VersionOracle>) -> Self {
        self.oracle = oracle;
        self
    }

    pub fn with_credentials(mut self, credentials: Arc<dyn RepoCredentials>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_cert_locator(mut self, cert_locator: Arc<dyn CertBundleLocator>) -> Self {
        self.cert_locator = cert_locator;
        self
    }

    pub fn app(&self) -> &KustomizeApp {
        &self.app
    }

    pub fn oracle(&self) -> &Arc<VersionOracle> {
        &self.oracle
    }

    /// Detected kustomize version, `99.99.99` if it could not be determined
    pub fn version(&self) -> &Version {
        self.oracle.get()
    }

    /// Normalized output of `kustomize version --short`
    pub fn detect_version(&self) -> Result<String> {
        self.oracle.version_text()
    }

    /// Apply `spec` to the application and build it
    ///
    /// The working tree is modified in place. On failure the commands run so
    /// far are returned with the error.
    pub fn build(
        &self,
        spec: &CustomizationSpec,
        options: Option<&KustomizeOptions>,
        env: &Env,
        build_opts: Option<&BuildOpts>,
    ) -> std::result::Result<BuildOutput, BuildFailure> {
        let mut log = CommandLog::new();
        let result = self.run(spec, options, env, build_opts, &mut log);
        let commands = log.redacted(&self.app.repo_root);

        match result {
            Ok(objects) => {
                let images = image_parameters(&objects);
                tracing::debug!(
                    "built {} object(s) with {} image(s) from {}",
                    objects.len(),
                    images.len(),
                    self.app.path.display()
                );
                Ok(BuildOutput {
                    objects,
                    images,
                    commands,
                })
            }
            Err(source) => Err(BuildFailure { commands, source }),
        }
    }

    fn run(
        &self,
        spec: &CustomizationSpec,
        options: Option<&KustomizeOptions>,
        env: &Env,
        build_opts: Option<&BuildOpts>,
        log: &mut CommandLog,
    ) -> Result<Vec<ResourceObject>> {
        // Released when this function returns, whichever step failed
        let credentials = self.credentials.environ()?;

        // Set on top of the inherited environment of every invocation
        let mut exec_env = env.environ();
        exec_env.extend(credentials.vars().iter().cloned());
        if let Some(ca) = self.ca_bundle_env() {
            exec_env.push(ca);
        }
        let exec_env = upsert_proxy_env(exec_env, self.app.proxy.as_deref(), self.app.no_proxy.as_deref());
        let env_remove = inherited_proxy_vars(self.app.proxy.as_deref());

        let app_path = self.app.app_path();
        let pipeline = ArgumentPipeline {
            binary: self.app.binary(),
            app_path: &app_path,
            repo_root: &self.app.repo_root,
            exec_env: Some(exec_env.as_slice()),
            env_remove: &env_remove,
            runner: self.runner.as_ref(),
            oracle: &self.oracle,
        };
        pipeline.apply(spec, env, log)?;

        let build_options = options.map(|o| o.build_options.as_str()).unwrap_or_default();
        let helm_flags_supported = build_opts.is_some()
            && is_helm_enabled(build_options)
            && self.oracle.supports(Feature::HelmVersionFlags);

        let args = build_args(
            &app_path.display().to_string(),
            build_options,
            build_opts,
            helm_flags_supported,
        );
        let command = CommandSpec::new(self.app.binary(), args)
            .current_dir(&self.app.repo_root)
            .env(exec_env)
            .env_remove(env_remove);
        log.push(command.to_log_string());

        let output = self.runner.run(&command)?;
        Ok(split_yaml(&output)?)
    }

    /// `GIT_SSL_CAINFO` for HTTPS repositories with a custom CA bundle
    fn ca_bundle_env(&self) -> Option<(String, String)> {
        let repo_url = self.app.repo_url.as_deref().filter(|u| is_https_url(u))?;

        let host = match Url::parse(repo_url) {
            Ok(url) => url.host_str()?.to_string(),
            Err(e) => {
                tracing::warn!("Could not parse repo URL '{}': {}", repo_url, e);
                return None;
            }
        };

        match self.cert_locator.cert_bundle_path(&host) {
            Ok(Some(path)) => Some((GIT_SSL_CAINFO.to_string(), path.display().to_string())),
            Ok(None) => {
                tracing::debug!("no CA bundle configured for {}", host);
                None
            }
            Err(e) => {
                tracing::warn!("Could not get CA bundle path for {}: {}", host, e);
                None
            }
        }
    }
}
