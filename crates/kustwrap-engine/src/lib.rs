//! Kustwrap Engine - Driving the kustomize CLI
//!
//! This crate turns a [`kustwrap_core::CustomizationSpec`] into `kustomize edit`
//! invocations and runs `kustomize build`:
//!
//! - **Version detection**: `kustomize version --short` probed once and cached
//! - **Edit pipeline**: customizations applied in a fixed order
//! - **Patch merging**: inline patches written into the kustomization file
//! - **Image scanning**: container images collected from the generated objects
//!
//! ## Example
//!
//! ```rust,no_run
//! use kustwrap_core::{CustomizationSpec, Env};
//! use kustwrap_engine::{Kustomize, KustomizeApp};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let app = KustomizeApp::new("/srv/repo", "apps/web");
//! let spec = CustomizationSpec {
//!     namespace: "prod".to_string(),
//!     ..Default::default()
//! };
//!
//! let output = Kustomize::new(app).build(&spec, None, &Env::new(), None)?;
//! for image in &output.images {
//!     println!("{image}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! The working tree is edited in place, so builds must run on a disposable
//! checkout.

pub mod build;
pub mod env;
pub mod error;
pub mod exec;
pub mod images;
pub mod kustomize;
pub mod mock;
pub mod patches;
pub mod pipeline;
pub mod version;

pub use build::build_args;
pub use env::{
    CertBundleLocator, CredentialsEnv, HttpsCredentials, NoCertBundles, NoCredentials,
    RepoCredentials, SshCredentials, TlsDataDir, inherited_proxy_vars, upsert_proxy_env,
};
pub use error::{BuildFailure, KustomizeError, Result};
pub use exec::{CommandRunner, CommandSpec, ProcessRunner};
pub use images::{get_images, image_parameters};
pub use kustomize::{BuildOutput, Kustomize, KustomizeApp};
pub use mock::{MockResponse, MockRunner};
pub use patches::{find_kustomization, merge_patches};
pub use pipeline::{ArgumentPipeline, CommandLog};
pub use version::{Feature, UNKNOWN_VERSION, VersionOracle, parse_version, version};
