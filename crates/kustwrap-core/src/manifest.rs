//! Generated resource objects and multi-document manifest splitting

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

use crate::error::{CoreError, Result};

/// One generated Kubernetes resource, kept as a generic YAML mapping
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceObject(pub Mapping);

impl ResourceObject {
    pub fn new(object: Mapping) -> Self {
        Self(object)
    }

    /// The underlying mapping
    pub fn object(&self) -> &Mapping {
        &self.0
    }

    pub fn into_inner(self) -> Mapping {
        self.0
    }

    pub fn api_version(&self) -> Option<&str> {
        self.0.get("apiVersion").and_then(Value::as_str)
    }

    pub fn kind(&self) -> Option<&str> {
        self.0.get("kind").and_then(Value::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.metadata_field("name")
    }

    pub fn namespace(&self) -> Option<&str> {
        self.metadata_field("namespace")
    }

    fn metadata_field(&self, field: &str) -> Option<&str> {
        self.0
            .get("metadata")
            .and_then(|m| m.get(field))
            .and_then(Value::as_str)
    }

    /// Display name for logs: `namespace/Kind/name` or `Kind/name`
    pub fn display_name(&self) -> String {
        let kind = self.kind().unwrap_or("Unknown");
        let name = self.name().unwrap_or("unnamed");
        match self.namespace() {
            Some(ns) => format!("{}/{}/{}", ns, kind, name),
            None => format!("{}/{}", kind, name),
        }
    }

    /// Serialize back to a YAML document
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.0)?)
    }
}

/// Split a multi-document YAML stream into resource objects
///
/// Empty and `null` documents are skipped. Any other non-mapping document
/// is an error, as is malformed YAML.
pub fn split_yaml(manifest: &str) -> Result<Vec<ResourceObject>> {
    let mut objects = Vec::new();

    for document in serde_yaml::Deserializer::from_str(manifest) {
        let value = Value::deserialize(document).map_err(|e| CoreError::ManifestParse {
            message: e.to_string(),
        })?;

        match value {
            Value::Null => continue,
            Value::Mapping(map) => objects.push(ResourceObject(map)),
            other => {
                return Err(CoreError::ManifestParse {
                    message: format!("expected a mapping, got {}", value_type(&other)),
                });
            }
        }
    }

    Ok(objects)
}

/// Short type name of a YAML value, for error messages
pub fn value_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}
