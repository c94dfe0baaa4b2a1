//! Kustwrap Core - Core types for driving kustomize
//!
//! This crate provides the foundational types used throughout Kustwrap:
//! - `CustomizationSpec`: Declarative edits applied before `kustomize build`
//! - `KustomizePatch`: Inline patches merged into the kustomization file
//! - `Env`: Caller-supplied environment with `$VAR` substitution
//! - `ResourceObject`: One generated Kubernetes resource
//! - `split_yaml`: Multi-document manifest splitting

pub mod customization;
pub mod env;
pub mod error;
pub mod manifest;

pub use customization::{
    BuildOpts, CustomizationSpec, KustomizeOptions, KustomizePatch, PatchTarget, Replica,
    ReplicaCount,
};
pub use env::{Env, EnvEntry};
pub use error::{CoreError, Result};
pub use manifest::{ResourceObject, split_yaml};
