//! Inline patch merging into the kustomization file
//!
//! `kustomize edit` has no command for adding inline patches, so they are
//! written straight into the `patches` list of the kustomization file. The
//! file is parsed, that single key is updated and the whole document is
//! re-serialized; other keys keep their values but not their formatting.

use std::fs;
use std::path::{Path, PathBuf};

use kustwrap_core::KustomizePatch;
use kustwrap_core::manifest::value_type;
use serde_yaml::Value;

use crate::error::{KustomizeError, Result};

/// Recognized kustomization file names, in lookup order
pub const KUSTOMIZATION_NAMES: [&str; 3] = ["kustomization.yaml", "kustomization.yml", "Kustomization"];

/// Command-log entry recorded in place of an edit command for patches
pub const PATCHES_LOG_ENTRY: &str = "# kustomization.yaml updated with patches. There is no `kustomize edit` command for adding patches. In order to generate the manifests in your local environment, you will need to copy the patches into kustomization.yaml manually.";

/// True if `name` is one of the recognized kustomization file names
pub fn is_kustomization(name: &str) -> bool {
    KUSTOMIZATION_NAMES.contains(&name)
}

/// Find the kustomization file in `dir`, first recognized name wins
pub fn find_kustomization(dir: &Path) -> Option<PathBuf> {
    KUSTOMIZATION_NAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| fs::metadata(path).is_ok())
}

/// Append `patches` to the `patches` list of the kustomization in `dir`
///
/// Returns the path of the rewritten file. The file keeps its permission
/// bits; it is replaced in one write, not atomically.
pub fn merge_patches(dir: &Path, patches: &[KustomizePatch]) -> Result<PathBuf> {
    let path = find_kustomization(dir).ok_or_else(|| KustomizeError::KustomizationNotFound {
        dir: dir.display().to_string(),
    })?;
    let shown = path.display().to_string();

    let content = fs::read_to_string(&path)
        .map_err(|e| KustomizeError::io(format!("failed to load {}", shown), e))?;
    let document: Value = serde_yaml::from_str(&content).map_err(|e| {
        KustomizeError::InvalidKustomization {
            path: shown.clone(),
            message: format!("failed to unmarshal: {}", e),
        }
    })?;

    let updated = merge_into_document(document, patches).map_err(|message| {
        KustomizeError::InvalidKustomization {
            path: shown.clone(),
            message,
        }
    })?;

    let serialized = serde_yaml::to_string(&updated)?;
    let permissions = fs::metadata(&path)
        .map_err(|e| KustomizeError::io(format!("failed to stat {}", shown), e))?
        .permissions();

    fs::write(&path, serialized).map_err(|e| {
        KustomizeError::io(
            format!("failed to write {} with updated 'patches' field", shown),
            e,
        )
    })?;
    fs::set_permissions(&path, permissions)
        .map_err(|e| KustomizeError::io(format!("failed to restore permissions of {}", shown), e))?;

    tracing::debug!("merged {} patch(es) into {}", patches.len(), shown);
    Ok(path)
}

/// Merge `patches` into a parsed kustomization document
///
/// Errors are returned as messages describing the unexpected structure.
pub fn merge_into_document(
    document: Value,
    patches: &[KustomizePatch],
) -> std::result::Result<Value, String> {
    let mut map = match document {
        Value::Mapping(map) => map,
        other => {
            return Err(format!(
                "expected a mapping at the top level, but got {}",
                value_type(&other)
            ));
        }
    };

    let new_patches = patches
        .iter()
        .map(KustomizePatch::to_value)
        .collect::<kustwrap_core::Result<Vec<_>>>()
        .map_err(|e| e.to_string())?;

    match map.get_mut("patches") {
        Some(Value::Sequence(existing)) => existing.extend(new_patches),
        Some(other) => {
            return Err(format!(
                "expected 'patches' field to be a sequence, but got {}",
                value_type(other)
            ));
        }
        None => {
            map.insert(Value::from("patches"), Value::Sequence(new_patches));
        }
    }

    Ok(Value::Mapping(map))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn patch(path: &str) -> KustomizePatch {
        KustomizePatch {
            path: path.to_string(),
            ..Default::default()
        }
    }

    fn patch_paths(document: &Value) -> Vec<String> {
        document["patches"]
            .as_sequence()
            .unwrap()
            .iter()
            .map(|p| p["path"].as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_is_kustomization() {
        assert!(is_kustomization("kustomization.yaml"));
        assert!(is_kustomization("kustomization.yml"));
        assert!(is_kustomization("Kustomization"));
        assert!(!is_kustomization("kustomization.json"));
        assert!(!is_kustomization("Kustomization.yaml"));
    }

    #[test]
    fn test_find_prefers_first_name() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Kustomization"), "resources: []\n").unwrap();
        fs::write(dir.path().join("kustomization.yml"), "resources: []\n").unwrap();

        let found = find_kustomization(dir.path()).unwrap();
        assert_eq!(found.file_name().unwrap(), "kustomization.yml");
    }

    #[test]
    fn test_merge_appends_to_existing_patches() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("kustomization.yaml"),
            "resources:\n- deployment.yaml\npatches:\n- path: q1.yaml\n- path: q2.yaml\n",
        )
        .unwrap();

        let path = merge_patches(dir.path(), &[patch("p1.yaml")]).unwrap();

        let document: Value = serde_yaml::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(patch_paths(&document), vec!["q1.yaml", "q2.yaml", "p1.yaml"]);
        assert_eq!(document["resources"][0].as_str(), Some("deployment.yaml"));
    }

    #[test]
    fn test_merge_without_existing_patches() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("kustomization.yml"), "namePrefix: a-\n").unwrap();

        merge_patches(dir.path(), &[patch("p1.yaml")]).unwrap();

        let content = fs::read_to_string(dir.path().join("kustomization.yml")).unwrap();
        insta::assert_snapshot!(content, @r"
        namePrefix: a-
        patches:
        - path: p1.yaml
        ");
    }

    #[test]
    fn test_merge_missing_kustomization() {
        let dir = TempDir::new().unwrap();
        let err = merge_patches(dir.path(), &[patch("p1.yaml")]).unwrap_err();
        assert!(matches!(err, KustomizeError::KustomizationNotFound { .. }));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_merge_rejects_non_mapping_document() {
        let err = merge_into_document(Value::from("just text"), &[patch("p1.yaml")]).unwrap_err();
        assert!(err.contains("expected a mapping"));
    }

    #[test]
    fn test_merge_rejects_non_sequence_patches() {
        let document: Value = serde_yaml::from_str("patches: not-a-list\n").unwrap();
        let err = merge_into_document(document, &[patch("p1.yaml")]).unwrap_err();
        assert_eq!(err, "expected 'patches' field to be a sequence, but got string");
    }

    #[test]
    fn test_merge_invalid_file_reports_path() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("kustomization.yaml"), "- a\n- b\n").unwrap();

        let err = merge_patches(dir.path(), &[patch("p1.yaml")]).unwrap_err();
        assert!(matches!(err, KustomizeError::InvalidKustomization { .. }));
        assert!(err.to_string().contains("kustomization.yaml"));
    }

    #[cfg(unix)]
    #[test]
    fn test_merge_preserves_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kustomization.yaml");
        fs::write(&path, "resources: []\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o640)).unwrap();

        merge_patches(dir.path(), &[patch("p1.yaml")]).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o640);
    }
}
