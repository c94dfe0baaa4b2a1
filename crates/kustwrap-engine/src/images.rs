//! Container image extraction from rendered manifests

use kustwrap_core::ResourceObject;
use serde_yaml::{Mapping, Value};

/// Keys whose sequences hold container specs
const CONTAINER_KEYS: [&str; 2] = ["containers", "initContainers"];

/// All container images referenced by `objects`, sorted
///
/// Duplicates are kept.
pub fn image_parameters(objects: &[ResourceObject]) -> Vec<String> {
    let mut images: Vec<String> = objects
        .iter()
        .flat_map(|obj| get_images(obj.object()))
        .collect();
    images.sort();
    images
}

/// Images of every container found anywhere below `object`
///
/// The whole tree is walked rather than known pod-spec paths, so custom
/// resources embedding pod templates are covered too.
pub fn get_images(object: &Mapping) -> Vec<String> {
    let mut images = Vec::new();
    collect(object, &mut images);
    images
}

fn collect(map: &Mapping, images: &mut Vec<String>) {
    for (key, value) in map {
        match value {
            Value::Sequence(items) if key.as_str().is_some_and(|k| CONTAINER_KEYS.contains(&k)) => {
                for container in items {
                    if let Some(image) = container.get("image").and_then(image_text) {
                        images.push(image);
                    }
                }
            }
            Value::Sequence(items) => {
                for item in items {
                    if let Value::Mapping(inner) = item {
                        collect(inner, images);
                    }
                }
            }
            Value::Mapping(inner) => collect(inner, images),
            _ => {}
        }
    }
}

fn image_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => None,
        other => serde_yaml::to_string(other)
            .ok()
            .map(|s| s.trim_end().to_string()),
    }
}
