//! CLI commands

pub mod build;
pub mod images;
pub mod version;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Args;
use kustwrap_core::{BuildOpts, CustomizationSpec, Env, KustomizeOptions};
use kustwrap_engine::{
    BuildOutput, HttpsCredentials, Kustomize, KustomizeApp, NoCredentials, RepoCredentials,
    SshCredentials, TlsDataDir,
};

use crate::config::KustwrapConfig;
use crate::display::OutputFormat;
use crate::error::{CliError, Result};

/// Arguments shared by `build` and `images`
#[derive(Args, Debug, Clone)]
pub struct BuildArgs {
    /// Repository checkout; the build runs here and it is edited in place
    pub repo_root: PathBuf,

    /// Application directory, relative to the repository root
    pub path: Option<PathBuf>,

    /// Customization spec file (YAML or JSON)
    #[arg(short, long)]
    pub spec: Option<PathBuf>,

    /// Extra `kustomize build` options, split on whitespace
    #[arg(long, allow_hyphen_values = true)]
    pub build_options: Option<String>,

    /// Kubernetes version passed to helm (with --enable-helm)
    #[arg(long)]
    pub kube_version: Option<String>,

    /// API version passed to helm (with --enable-helm)
    #[arg(long = "api-version")]
    pub api_versions: Vec<String>,

    /// Environment for substitution and kustomize (NAME=VALUE)
    #[arg(short, long = "env")]
    pub env: Vec<String>,

    /// Repository URL, used to select a CA bundle for HTTPS repositories
    #[arg(long)]
    pub repo_url: Option<String>,

    /// kustomize binary
    #[arg(long, env = "KUSTWRAP_KUSTOMIZE")]
    pub kustomize: Option<String>,

    /// Proxy for git fetches made by kustomize
    #[arg(long, env = "KUSTWRAP_PROXY")]
    pub proxy: Option<String>,

    /// Hosts that bypass the proxy
    #[arg(long, env = "KUSTWRAP_NO_PROXY")]
    pub no_proxy: Option<String>,

    /// Directory of per-host CA bundles
    #[arg(long, env = "KUSTWRAP_TLS_DATA_PATH")]
    pub tls_data_path: Option<PathBuf>,

    /// Username for HTTPS remote bases
    #[arg(long, env = "KUSTWRAP_GIT_USERNAME")]
    pub git_username: Option<String>,

    /// Password for HTTPS remote bases
    #[arg(long, env = "KUSTWRAP_GIT_PASSWORD", hide_env_values = true)]
    pub git_password: Option<String>,

    /// Private key file for SSH remote bases
    #[arg(long, conflicts_with_all = ["git_username", "git_password"])]
    pub ssh_key: Option<PathBuf>,

    /// Skip SSH host key verification
    #[arg(long, requires = "ssh_key")]
    pub insecure_ignore_host_key: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Yaml)]
    pub output: OutputFormat,

    /// Print the commands that were run to stderr
    #[arg(long)]
    pub show_commands: bool,
}

/// Everything needed for one build, resolved from flags and config
pub struct BuildRequest {
    pub kustomize: Kustomize,
    pub spec: CustomizationSpec,
    pub options: Option<KustomizeOptions>,
    pub env: Env,
    pub build_opts: Option<BuildOpts>,
}

impl BuildRequest {
    /// Resolve flags, falling back to the config file
    pub fn from_args(args: &BuildArgs, config: &KustwrapConfig) -> Result<Self> {
        let repo_root = std::fs::canonicalize(&args.repo_root).map_err(|e| {
            CliError::config(format!(
                "repository root {} is not accessible: {}",
                args.repo_root.display(),
                e
            ))
        })?;
        if !repo_root.is_dir() {
            return Err(CliError::config(format!(
                "repository root {} is not a directory",
                repo_root.display()
            )));
        }

        let mut app = KustomizeApp::new(repo_root, args.path.clone().unwrap_or_default());
        app.repo_url = args.repo_url.clone();
        app.binary_path = args.kustomize.clone().or_else(|| config.binary_path.clone());
        app.proxy = args.proxy.clone().or_else(|| config.proxy.clone());
        app.no_proxy = args.no_proxy.clone().or_else(|| config.no_proxy.clone());

        let mut kustomize = Kustomize::new(app).with_credentials(credentials(args)?);
        if let Some(tls) = args.tls_data_path.as_ref().or(config.tls_data_path.as_ref()) {
            kustomize = kustomize.with_cert_locator(Arc::new(TlsDataDir::new(tls)));
        }

        let spec = match &args.spec {
            Some(path) => load_spec(path)?,
            None => CustomizationSpec::default(),
        };

        let options = args
            .build_options
            .clone()
            .or_else(|| config.build_options.clone())
            .map(KustomizeOptions::new);

        let env = Env::parse_all(args.env.as_slice()).map_err(|e| CliError::input(e.to_string()))?;

        let build_opts = (args.kube_version.is_some() || !args.api_versions.is_empty()).then(|| {
            BuildOpts {
                kube_version: args.kube_version.clone(),
                api_versions: args.api_versions.clone(),
            }
        });

        Ok(Self {
            kustomize,
            spec,
            options,
            env,
            build_opts,
        })
    }

    /// Run the build
    pub fn run(&self) -> Result<BuildOutput> {
        tracing::debug!(
            "building {} with {}",
            self.kustomize.app().app_path().display(),
            self.kustomize.app().binary()
        );
        Ok(self.kustomize.build(
            &self.spec,
            self.options.as_ref(),
            &self.env,
            self.build_opts.as_ref(),
        )?)
    }
}

fn load_spec(path: &Path) -> Result<CustomizationSpec> {
    CustomizationSpec::from_file(path).map_err(|e| {
        CliError::config_with_help(
            format!("failed to load customization spec {}: {}", path.display(), e),
            "see `namePrefix`, `images`, `replicas`, `commonLabels`, `patches` and `components`",
        )
    })
}

fn credentials(args: &BuildArgs) -> Result<Arc<dyn RepoCredentials>> {
    if let Some(key_path) = &args.ssh_key {
        let private_key = std::fs::read_to_string(key_path).map_err(|e| CliError::Io {
            message: format!("failed to read SSH key {}: {}", key_path.display(), e),
        })?;
        return Ok(Arc::new(SshCredentials {
            private_key,
            insecure_ignore_host_key: args.insecure_ignore_host_key,
        }));
    }

    if args.git_username.is_some() || args.git_password.is_some() {
        return Ok(Arc::new(HttpsCredentials {
            username: args.git_username.clone(),
            password: args.git_password.clone(),
            ..Default::default()
        }));
    }

    Ok(Arc::new(NoCredentials))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: BuildArgs,
    }

    fn parse(args: &[&str]) -> BuildArgs {
        TestCli::try_parse_from(std::iter::once("kustwrap").chain(args.iter().copied()))
            .unwrap()
            .args
    }

    #[test]
    fn test_flags_override_config() {
        let repo = TempDir::new().unwrap();
        let root = repo.path().to_str().unwrap();
        let config = KustwrapConfig {
            binary_path: Some("/opt/kustomize".to_string()),
            build_options: Some("--enable-helm".to_string()),
            proxy: Some("http://config-proxy:3128".to_string()),
            ..Default::default()
        };

        let request = BuildRequest::from_args(
            &parse(&[root, "apps/web", "--kustomize", "/usr/local/bin/kustomize"]),
            &config,
        )
        .unwrap();

        let app = request.kustomize.app();
        assert_eq!(app.binary(), "/usr/local/bin/kustomize");
        assert_eq!(app.proxy.as_deref(), Some("http://config-proxy:3128"));
        assert_eq!(
            request.options.as_ref().map(|o| o.build_options.as_str()),
            Some("--enable-helm")
        );
        assert!(app.app_path().ends_with("apps/web"));
    }

    #[test]
    fn test_build_opts_only_when_requested() {
        let repo = TempDir::new().unwrap();
        let root = repo.path().to_str().unwrap();
        let config = KustwrapConfig::default();

        let request = BuildRequest::from_args(&parse(&[root]), &config).unwrap();
        assert!(request.build_opts.is_none());
        assert!(request.options.is_none());

        let request = BuildRequest::from_args(
            &parse(&[root, "--kube-version", "1.30.0", "--api-version", "v1"]),
            &config,
        )
        .unwrap();
        let opts = request.build_opts.unwrap();
        assert_eq!(opts.kube_version.as_deref(), Some("1.30.0"));
        assert_eq!(opts.api_versions, vec!["v1"]);
    }

    #[test]
    fn test_spec_and_env_loaded() {
        let repo = TempDir::new().unwrap();
        let spec_path = repo.path().join("spec.yaml");
        std::fs::write(&spec_path, "namespace: prod\nimages:\n- app:${TAG}\n").unwrap();
        let root = repo.path().to_str().unwrap();

        let request = BuildRequest::from_args(
            &parse(&[root, "--spec", spec_path.to_str().unwrap(), "--env", "TAG=1.2.3"]),
            &KustwrapConfig::default(),
        )
        .unwrap();

        assert_eq!(request.spec.namespace, "prod");
        assert_eq!(request.env.envsubst(&request.spec.images[0]), "app:1.2.3");
    }

    #[test]
    fn test_invalid_env_entry() {
        let repo = TempDir::new().unwrap();
        let root = repo.path().to_str().unwrap();
        let err = BuildRequest::from_args(&parse(&[root, "--env", "=x"]), &KustwrapConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, CliError::Input { .. }));
    }

    #[test]
    fn test_missing_repo_root() {
        let repo = TempDir::new().unwrap();
        let missing = repo.path().join("missing");
        let err = BuildRequest::from_args(
            &parse(&[missing.to_str().unwrap()]),
            &KustwrapConfig::default(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, CliError::Config { .. }));
    }

    #[test]
    fn test_ssh_key_conflicts_with_https_credentials() {
        let result = TestCli::try_parse_from([
            "kustwrap",
            "/repo",
            "--ssh-key",
            "/key",
            "--git-username",
            "bot",
        ]);
        assert!(result.is_err());
    }
}
