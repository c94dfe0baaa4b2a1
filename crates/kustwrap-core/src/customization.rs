//! Customization specs applied to a kustomization before it is built
//!
//! A `CustomizationSpec` is the declarative description of every edit the
//! caller wants: name prefix/suffix, image overrides, replica counts, common
//! labels and annotations, namespace, inline patches and components. It is
//! deserialized from YAML (camelCase keys) and never mutated afterwards.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{CoreError, Result};

/// Declarative edits applied with `kustomize edit` before building
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CustomizationSpec {
    /// Prefix prepended to every resource name
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name_prefix: String,

    /// Suffix appended to every resource name
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name_suffix: String,

    /// Image overrides (`name=new:tag`, `name:tag`, `name@sha256:...`)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,

    /// Replica count overrides
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub replicas: Vec<Replica>,

    /// Labels added to every resource
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub common_labels: BTreeMap<String, String>,

    /// Annotations added to every resource
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub common_annotations: BTreeMap<String, String>,

    /// Expand `$VAR` references in annotation values
    pub common_annotations_envsubst: bool,

    /// Overwrite labels that already exist
    pub force_common_labels: bool,

    /// Overwrite annotations that already exist
    pub force_common_annotations: bool,

    /// Do not add common labels to selectors
    pub label_without_selector: bool,

    /// Add common labels to pod templates even without selectors
    pub label_include_templates: bool,

    /// Namespace set on every resource
    #[serde(skip_serializing_if = "String::is_empty")]
    pub namespace: String,

    /// Inline patches merged into the kustomization file
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub patches: Vec<KustomizePatch>,

    /// Component directories, relative to the application path
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<String>,

    /// Drop component paths that do not exist instead of failing the build
    pub ignore_missing_components: bool,
}

impl CustomizationSpec {
    /// Load a spec from a YAML or JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse a spec from YAML (JSON is accepted as a YAML subset)
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// True when no edit would be applied
    pub fn is_empty(&self) -> bool {
        self.name_prefix.is_empty()
            && self.name_suffix.is_empty()
            && self.images.is_empty()
            && self.replicas.is_empty()
            && self.common_labels.is_empty()
            && self.common_annotations.is_empty()
            && self.namespace.is_empty()
            && self.patches.is_empty()
            && self.components.is_empty()
    }
}

/// A replica override for one workload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Replica {
    /// Workload name
    pub name: String,
    /// Target count
    pub count: ReplicaCount,
}

/// Replica count as written by the user: a number or a numeric string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReplicaCount {
    Int(i64),
    Str(String),
}

impl Replica {
    pub fn new(name: impl Into<String>, count: i64) -> Self {
        Self {
            name: name.into(),
            count: ReplicaCount::Int(count),
        }
    }

    /// Resolve the count to a concrete integer
    pub fn int_count(&self) -> Result<i64> {
        match &self.count {
            ReplicaCount::Int(n) => Ok(*n),
            ReplicaCount::Str(s) => s
                .parse::<i64>()
                .map_err(|_| CoreError::InvalidReplicaCount { value: s.clone() }),
        }
    }
}

/// An inline patch, stored verbatim under `patches` in the kustomization file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KustomizePatch {
    /// Path to a patch file, relative to the kustomization
    #[serde(skip_serializing_if = "String::is_empty")]
    pub path: String,

    /// Inline patch content (strategic merge or JSON 6902)
    #[serde(skip_serializing_if = "String::is_empty")]
    pub patch: String,

    /// Resources the patch applies to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<PatchTarget>,

    /// Patch options such as `allowNameChange`
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, bool>,
}

impl KustomizePatch {
    /// Convert into the generic document form used in the kustomization file
    pub fn to_value(&self) -> Result<serde_yaml::Value> {
        Ok(serde_yaml::to_value(self)?)
    }
}

/// Resource selector for a patch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PatchTarget {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub group: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub label_selector: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub annotation_selector: String,
}

/// Raw options for the `kustomize build` invocation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KustomizeOptions {
    /// Extra arguments appended to `kustomize build`, split on whitespace
    pub build_options: String,
}

impl KustomizeOptions {
    pub fn new(build_options: impl Into<String>) -> Self {
        Self {
            build_options: build_options.into(),
        }
    }
}

/// Cluster facts forwarded to Helm chart inflation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuildOpts {
    /// Kubernetes version passed as `--helm-kube-version`
    pub kube_version: Option<String>,
    /// API versions passed as repeated `--helm-api-versions`
    pub api_versions: Vec<String>,
}
