//! Environment assembly for kustomize invocations
//!
//! kustomize fetches remote bases with git, so the build environment carries:
//! - repository credentials ([`RepoCredentials`])
//! - a custom CA bundle for HTTPS repositories ([`CertBundleLocator`])
//! - HTTP(S) proxy settings ([`upsert_proxy_env`], [`inherited_proxy_vars`])

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{KustomizeError, Result};

/// Environment variable pointing git at a CA bundle
pub const GIT_SSL_CAINFO: &str = "GIT_SSL_CAINFO";

const HTTP_PROXY: &str = "http_proxy";
const HTTPS_PROXY: &str = "https_proxy";
const NO_PROXY: &str = "no_proxy";

/// Credential environment for one build
///
/// Dropping the value releases whatever the credentials allocated (for
/// example temporary key files), so it must outlive every invocation that
/// uses `vars`.
pub struct CredentialsEnv {
    vars: Vec<(String, String)>,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl CredentialsEnv {
    pub fn new(vars: Vec<(String, String)>) -> Self {
        Self {
            vars,
            release: None,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Run `release` when this value is dropped
    pub fn on_release(mut self, release: impl FnOnce() + Send + 'static) -> Self {
        self.release = Some(Box::new(release));
        self
    }

    pub fn vars(&self) -> &[(String, String)] {
        &self.vars
    }
}

impl fmt::Debug for CredentialsEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Values may be secrets
        let names: Vec<&str> = self.vars.iter().map(|(k, _)| k.as_str()).collect();
        f.debug_struct("CredentialsEnv")
            .field("vars", &names)
            .field("release", &self.release.is_some())
            .finish()
    }
}

impl Drop for CredentialsEnv {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

/// Source of repository access environment variables
pub trait RepoCredentials: Send + Sync {
    fn environ(&self) -> Result<CredentialsEnv>;
}

/// Public repositories
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCredentials;

impl RepoCredentials for NoCredentials {
    fn environ(&self) -> Result<CredentialsEnv> {
        Ok(CredentialsEnv::empty())
    }
}

/// HTTPS repository credentials
///
/// Username and password are exported as `GIT_USERNAME` / `GIT_PASSWORD` for
/// the configured git askpass helper. A client certificate is written to a
/// private temporary directory that is removed on release.
#[derive(Clone, Default)]
pub struct HttpsCredentials {
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_cert: Option<String>,
    pub client_key: Option<String>,
    pub insecure: bool,
}

impl fmt::Debug for HttpsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpsCredentials")
            .field("username", &self.username)
            .field("client_cert", &self.client_cert.is_some())
            .field("insecure", &self.insecure)
            .finish()
    }
}

impl RepoCredentials for HttpsCredentials {
    fn environ(&self) -> Result<CredentialsEnv> {
        let mut vars = Vec::new();

        if let Some(username) = &self.username {
            vars.push(("GIT_USERNAME".to_string(), username.clone()));
        }
        if let Some(password) = &self.password {
            vars.push(("GIT_PASSWORD".to_string(), password.clone()));
        }
        if self.insecure {
            vars.push(("GIT_SSL_NO_VERIFY".to_string(), "true".to_string()));
        }

        let (cert, key) = match (&self.client_cert, &self.client_key) {
            (Some(cert), Some(key)) => (cert, key),
            (None, None) => return Ok(CredentialsEnv::new(vars)),
            _ => {
                return Err(KustomizeError::Credentials {
                    message: "client certificate and key must be provided together".to_string(),
                });
            }
        };

        let dir = private_temp_dir()?;
        let cert_path = write_private(dir.path(), "client.crt", cert)?;
        let key_path = write_private(dir.path(), "client.key", key)?;
        vars.push(("GIT_SSL_CERT".to_string(), cert_path.display().to_string()));
        vars.push(("GIT_SSL_KEY".to_string(), key_path.display().to_string()));

        Ok(CredentialsEnv::new(vars).on_release(move || {
            if let Err(e) = dir.close() {
                tracing::warn!("Failed to remove client certificate files: {}", e);
            }
        }))
    }
}

/// SSH repository credentials
#[derive(Clone)]
pub struct SshCredentials {
    pub private_key: String,
    pub insecure_ignore_host_key: bool,
}

impl fmt::Debug for SshCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SshCredentials")
            .field("insecure_ignore_host_key", &self.insecure_ignore_host_key)
            .finish_non_exhaustive()
    }
}

impl RepoCredentials for SshCredentials {
    fn environ(&self) -> Result<CredentialsEnv> {
        let dir = private_temp_dir()?;
        let key_path = write_private(dir.path(), "id_key", &self.private_key)?;

        let mut ssh = format!("ssh -i {}", key_path.display());
        if self.insecure_ignore_host_key {
            ssh.push_str(" -o StrictHostKeyChecking=no -o UserKnownHostsFile=/dev/null");
        }

        Ok(
            CredentialsEnv::new(vec![("GIT_SSH_COMMAND".to_string(), ssh)]).on_release(move || {
                if let Err(e) = dir.close() {
                    tracing::warn!("Failed to remove SSH key file: {}", e);
                }
            }),
        )
    }
}

fn private_temp_dir() -> Result<tempfile::TempDir> {
    tempfile::Builder::new()
        .prefix("kustwrap-creds-")
        .tempdir()
        .map_err(|e| KustomizeError::Credentials {
            message: format!("failed to create temporary directory: {}", e),
        })
}

fn write_private(dir: &Path, name: &str, content: &str) -> Result<PathBuf> {
    let path = dir.join(name);

    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true).mode(0o600);
        options
            .open(&path)
            .and_then(|mut f| f.write_all(content.as_bytes()))
            .map_err(|e| KustomizeError::Credentials {
                message: format!("failed to write {}: {}", path.display(), e),
            })?;
    }

    #[cfg(not(unix))]
    {
        fs::write(&path, content).map_err(|e| KustomizeError::Credentials {
            message: format!("failed to write {}: {}", path.display(), e),
        })?;
    }

    Ok(path)
}

/// Finds a custom CA bundle for a repository host
pub trait CertBundleLocator: Send + Sync {
    /// Path of the bundle for `host`, or `None` if no bundle is configured
    fn cert_bundle_path(&self, host: &str) -> Result<Option<PathBuf>>;
}

/// No custom CA bundles
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCertBundles;

impl CertBundleLocator for NoCertBundles {
    fn cert_bundle_path(&self, _host: &str) -> Result<Option<PathBuf>> {
        Ok(None)
    }
}

/// Directory holding one PEM bundle per host, named after the host
#[derive(Debug, Clone)]
pub struct TlsDataDir {
    root: PathBuf,
}

impl TlsDataDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl CertBundleLocator for TlsDataDir {
    fn cert_bundle_path(&self, host: &str) -> Result<Option<PathBuf>> {
        if host.is_empty() || host.contains(['/', '\\']) || host.starts_with('.') {
            return Err(KustomizeError::Credentials {
                message: format!("invalid server name '{}'", host),
            });
        }

        let path = self.root.join(host);
        match fs::metadata(&path) {
            Ok(meta) if meta.is_file() => Ok(Some(path)),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(KustomizeError::io(
                format!("failed to read CA bundle {}", path.display()),
                e,
            )),
        }
    }
}

/// True for `https://` repository URLs
pub fn is_https_url(url: &str) -> bool {
    url.starts_with("https://")
}

/// True for `http_proxy`, `https_proxy` and `no_proxy`, in any case
pub fn is_proxy_var(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    name.starts_with(HTTP_PROXY) || name.starts_with(HTTPS_PROXY) || name.starts_with(NO_PROXY)
}

/// Proxy variables of the current process that a configured proxy replaces
///
/// Empty without a proxy, so the inherited settings stay in effect.
pub fn inherited_proxy_vars(proxy: Option<&str>) -> Vec<String> {
    if proxy.is_none_or(str::is_empty) {
        return Vec::new();
    }
    std::env::vars_os()
        .filter_map(|(name, _)| name.into_string().ok())
        .filter(|name| is_proxy_var(name))
        .collect()
}

/// Replace proxy variables in `env` when a proxy is configured
///
/// Existing `http_proxy`, `https_proxy` and `no_proxy` entries (matched
/// case-insensitively) are dropped and replaced. Without a proxy the
/// environment is returned unchanged.
pub fn upsert_proxy_env(
    env: Vec<(String, String)>,
    proxy: Option<&str>,
    no_proxy: Option<&str>,
) -> Vec<(String, String)> {
    let proxy = match proxy {
        Some(p) if !p.is_empty() => p,
        _ => return env,
    };

    let mut env: Vec<(String, String)> = env.into_iter().filter(|(name, _)| !is_proxy_var(name)).collect();

    env.push((HTTP_PROXY.to_string(), proxy.to_string()));
    env.push((HTTPS_PROXY.to_string(), proxy.to_string()));
    env.push((NO_PROXY.to_string(), no_proxy.unwrap_or_default().to_string()));
    env
}
