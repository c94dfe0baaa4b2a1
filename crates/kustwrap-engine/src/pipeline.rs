//! The `kustomize edit` pipeline
//!
//! Customizations are applied one `kustomize edit` invocation at a time, in
//! a fixed order:
//!
//! 1. name prefix
//! 2. name suffix
//! 3. images
//! 4. replicas
//! 5. common labels
//! 6. common annotations
//! 7. namespace
//! 8. patches (written into the kustomization file directly)
//! 9. components
//!
//! kustomize applies some of these transformations in an order that depends
//! on when they were added, so this order must not change. The first failing
//! step aborts the pipeline; edits already made to the working tree are not
//! rolled back.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use kustwrap_core::{CustomizationSpec, Env};

use crate::error::{KustomizeError, Result};
use crate::exec::{CommandRunner, CommandSpec};
use crate::patches::{self, PATCHES_LOG_ENTRY};
use crate::version::{Feature, VersionOracle};

/// Human-readable record of every command run during a build
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandLog {
    entries: Vec<String>,
}

impl CommandLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: impl Into<String>) {
        self.entries.push(entry.into());
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries with every occurrence of `root` replaced by `.`
    ///
    /// Trailing separators and `.` components of `root` are dropped first,
    /// so `/repo/` matches the `/repo/apps/web` the commands were built with.
    pub fn redacted(&self, root: &Path) -> Vec<String> {
        let root = root.components().collect::<PathBuf>().display().to_string();
        if root.is_empty() {
            return self.entries.clone();
        }
        self.entries.iter().map(|e| e.replace(&root, ".")).collect()
    }
}

/// Applies a [`CustomizationSpec`] with `kustomize edit`
pub struct ArgumentPipeline<'a> {
    /// kustomize binary
    pub binary: &'a str,
    /// Application directory; every edit runs here
    pub app_path: &'a Path,
    /// Repository checkout; components may not resolve outside of it
    pub repo_root: &'a Path,
    /// Variables set on top of the inherited environment of edit commands
    pub exec_env: Option<&'a [(String, String)]>,
    /// Inherited variables removed from edit commands
    pub env_remove: &'a [String],
    pub runner: &'a dyn CommandRunner,
    pub oracle: &'a VersionOracle,
}

impl ArgumentPipeline<'_> {
    /// Apply every non-empty customization of `spec`, in order
    pub fn apply(&self, spec: &CustomizationSpec, env: &Env, log: &mut CommandLog) -> Result<()> {
        if !spec.name_prefix.is_empty() {
            self.edit(["edit", "set", "nameprefix", "--", spec.name_prefix.as_str()], log)?;
        }

        if !spec.name_suffix.is_empty() {
            self.edit(["edit", "set", "namesuffix", "--", spec.name_suffix.as_str()], log)?;
        }

        if !spec.images.is_empty() {
            // Allows references such as ${APP_REVISION} in image tags
            let images = spec.images.iter().map(|image| env.envsubst(image));
            self.edit(args(["edit", "set", "image"]).chain(images), log)?;
        }

        if !spec.replicas.is_empty() {
            let replicas = spec
                .replicas
                .iter()
                .map(|r| -> Result<String> { Ok(format!("{}={}", r.name, r.int_count()?)) })
                .collect::<Result<Vec<_>>>()?;
            self.edit(args(["edit", "set", "replicas"]).chain(replicas), log)?;
        }

        if !spec.common_labels.is_empty() {
            let mut cmd: Vec<String> = args(["edit", "add", "label"]).collect();
            if spec.force_common_labels {
                cmd.push("--force".to_string());
            }
            if spec.label_without_selector {
                cmd.push("--without-selector".to_string());
            }
            if spec.label_include_templates {
                cmd.push("--include-templates".to_string());
            }
            let labels = substitute_values(&spec.common_labels, env);
            cmd.extend(self.edit_add_args(&labels));
            self.edit(cmd, log)?;
        }

        if !spec.common_annotations.is_empty() {
            let mut cmd: Vec<String> = args(["edit", "add", "annotation"]).collect();
            if spec.force_common_annotations {
                cmd.push("--force".to_string());
            }
            let annotations = if spec.common_annotations_envsubst {
                substitute_values(&spec.common_annotations, env)
            } else {
                spec.common_annotations.clone()
            };
            cmd.extend(self.edit_add_args(&annotations));
            self.edit(cmd, log)?;
        }

        if !spec.namespace.is_empty() {
            self.edit(["edit", "set", "namespace", "--", spec.namespace.as_str()], log)?;
        }

        if !spec.patches.is_empty() {
            patches::merge_patches(self.app_path, &spec.patches)?;
            log.push(PATCHES_LOG_ENTRY);
        }

        if !spec.components.is_empty() {
            self.oracle.require(Feature::Components)?;

            let components = if spec.ignore_missing_components {
                self.existing_components(&spec.components)?
            } else {
                spec.components.clone()
            };

            if components.is_empty() {
                tracing::debug!("no components left to add after skipping missing ones");
            } else {
                self.edit(args(["edit", "add", "component"]).chain(components), log)?;
            }
        }

        Ok(())
    }

    /// Encode `key:value` pairs for `edit add label|annotation`
    ///
    /// kustomize v3.8.5 changed the parsing of these commands: older versions
    /// expect a single comma-joined argument, newer ones one argument per pair.
    pub fn edit_add_args(&self, pairs: &BTreeMap<String, String>) -> Vec<String> {
        encode_pairs(pairs, self.oracle.supports(Feature::SeparateEditAddArgs))
    }

    fn edit<I, S>(&self, cmd_args: I, log: &mut CommandLog) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut command = CommandSpec::new(self.binary, cmd_args).current_dir(self.app_path);
        if let Some(env) = self.exec_env {
            command = command.env(env.to_vec());
        }
        if !self.env_remove.is_empty() {
            command = command.env_remove(self.env_remove.to_vec());
        }

        log.push(command.to_log_string());
        self.runner.run(&command)
    }

    /// Components that exist inside the repository root
    ///
    /// Paths that are missing, unreadable or that resolve outside of the
    /// repository are dropped.
    fn existing_components(&self, components: &[String]) -> Result<Vec<String>> {
        let repo_error = |e: std::io::Error| KustomizeError::RepoRoot {
            path: self.repo_root.display().to_string(),
            source: e,
        };
        let root = fs::canonicalize(self.repo_root).map_err(repo_error)?;
        let lexical_root = normalize_lexically(&std::path::absolute(self.repo_root).map_err(repo_error)?);
        let app_path = std::path::absolute(self.app_path).map_err(repo_error)?;

        let mut found = Vec::with_capacity(components.len());
        for component in components {
            let candidate = normalize_lexically(&app_path.join(component));
            let Ok(relative) = candidate.strip_prefix(&lexical_root) else {
                tracing::debug!("{} component directory is outside of the repository", component);
                continue;
            };

            match fs::canonicalize(root.join(relative)) {
                Ok(resolved) if resolved.starts_with(&root) => found.push(component.clone()),
                Ok(_) => {
                    tracing::debug!("{} component directory resolves outside of the repository", relative.display());
                }
                Err(_) => {
                    tracing::debug!("{} component directory does not exist", relative.display());
                }
            }
        }
        Ok(found)
    }
}

fn args<const N: usize>(items: [&str; N]) -> impl Iterator<Item = String> {
    items.into_iter().map(str::to_string)
}

fn substitute_values(values: &BTreeMap<String, String>, env: &Env) -> BTreeMap<String, String> {
    values
        .iter()
        .map(|(k, v)| (k.clone(), env.envsubst(v)))
        .collect()
}

/// `key:value` arguments, joined with commas unless `separate`
pub fn encode_pairs(pairs: &BTreeMap<String, String>, separate: bool) -> Vec<String> {
    let encoded = pairs.iter().map(|(k, v)| format!("{}:{}", k, v));
    if separate {
        encoded.collect()
    } else {
        vec![encoded.collect::<Vec<_>>().join(",")]
    }
}

/// Resolve `.` and `..` without touching the filesystem
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockRunner;
    use kustwrap_core::{KustomizePatch, Replica, ReplicaCount};
    use semver::Version;
    use std::sync::Arc;
    use tempfile::TempDir;

    struct Fixture {
        repo: TempDir,
        app: PathBuf,
        runner: MockRunner,
        oracle: VersionOracle,
    }

    impl Fixture {
        fn new(version: Version) -> Self {
            let repo = TempDir::new().unwrap();
            let app = repo.path().join("apps").join("web");
            fs::create_dir_all(&app).unwrap();
            fs::write(app.join("kustomization.yaml"), "resources:\n- deployment.yaml\n").unwrap();

            let runner = MockRunner::new();
            let oracle = VersionOracle::with_version("kustomize", Arc::new(runner.clone()), version);
            Self {
                repo,
                app,
                runner,
                oracle,
            }
        }

        fn pipeline(&self) -> ArgumentPipeline<'_> {
            ArgumentPipeline {
                binary: "kustomize",
                app_path: &self.app,
                repo_root: self.repo.path(),
                exec_env: None,
                env_remove: &[],
                runner: &self.runner,
                oracle: &self.oracle,
            }
        }

        fn apply(&self, spec: &CustomizationSpec) -> (Result<()>, CommandLog) {
            let mut log = CommandLog::new();
            let result = self.pipeline().apply(spec, &Env::new(), &mut log);
            (result, log)
        }
    }

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_full_spec_runs_in_fixed_order() {
        let fixture = Fixture::new(Version::new(5, 4, 0));
        let spec = CustomizationSpec {
            name_prefix: "pre-".to_string(),
            name_suffix: "-suf".to_string(),
            images: vec!["nginx:1.25".to_string()],
            replicas: vec![Replica::new("web", 3)],
            common_labels: labels(&[("team", "platform")]),
            common_annotations: labels(&[("owner", "sre")]),
            namespace: "prod".to_string(),
            ..Default::default()
        };

        let (result, log) = fixture.apply(&spec);
        result.unwrap();

        let commands: Vec<String> = fixture
            .runner
            .edit_invocations()
            .iter()
            .map(|args| args[..3].join(" "))
            .collect();
        assert_eq!(
            commands,
            vec![
                "edit set nameprefix",
                "edit set namesuffix",
                "edit set image",
                "edit set replicas",
                "edit add label",
                "edit add annotation",
                "edit set namespace",
            ]
        );
        assert_eq!(log.len(), 7);

        insta::assert_snapshot!(log.entries().join("\n"), @r"
        kustomize edit set nameprefix -- pre-
        kustomize edit set namesuffix -- -suf
        kustomize edit set image nginx:1.25
        kustomize edit set replicas web=3
        kustomize edit add label team:platform
        kustomize edit add annotation owner:sre
        kustomize edit set namespace -- prod
        ");
    }

    #[test]
    fn test_empty_spec_runs_nothing() {
        let fixture = Fixture::new(Version::new(5, 4, 0));
        let (result, log) = fixture.apply(&CustomizationSpec::default());
        result.unwrap();
        assert!(log.is_empty());
        assert_eq!(fixture.runner.call_count(), 0);
    }

    #[test]
    fn test_edits_run_in_application_directory() {
        let fixture = Fixture::new(Version::new(5, 4, 0));
        let spec = CustomizationSpec {
            namespace: "prod".to_string(),
            ..Default::default()
        };
        fixture.apply(&spec).0.unwrap();

        let calls = fixture.runner.calls();
        assert_eq!(calls[0].dir.as_deref(), Some(fixture.app.as_path()));
    }

    #[test]
    fn test_failure_stops_later_steps() {
        let fixture = Fixture::new(Version::new(5, 4, 0));
        let runner = fixture.runner.clone().failing(&["edit", "set", "image"], "invalid image");
        let spec = CustomizationSpec {
            name_prefix: "pre-".to_string(),
            images: vec!["bad image".to_string()],
            namespace: "prod".to_string(),
            ..Default::default()
        };

        let (result, log) = fixture.apply(&spec);
        let err = result.unwrap_err();
        assert!(err.to_string().contains("invalid image"));
        assert_eq!(runner.edit_invocations().len(), 2);
        assert_eq!(log.len(), 2);
        assert!(log.entries()[1].contains("edit set image"));
    }

    #[test]
    fn test_images_are_env_substituted() {
        let fixture = Fixture::new(Version::new(5, 4, 0));
        let mut env = Env::new();
        env.push("REVISION", "abc123");
        let spec = CustomizationSpec {
            images: vec!["app=registry/app:${REVISION}".to_string(), "nginx".to_string()],
            ..Default::default()
        };

        let mut log = CommandLog::new();
        fixture.pipeline().apply(&spec, &env, &mut log).unwrap();

        assert_eq!(
            fixture.runner.edit_invocations()[0],
            vec!["edit", "set", "image", "app=registry/app:abc123", "nginx"]
        );
    }

    #[test]
    fn test_invalid_replica_count_runs_nothing() {
        let fixture = Fixture::new(Version::new(5, 4, 0));
        let spec = CustomizationSpec {
            replicas: vec![
                Replica::new("web", 2),
                Replica {
                    name: "worker".to_string(),
                    count: ReplicaCount::Str("many".to_string()),
                },
            ],
            ..Default::default()
        };

        let (result, log) = fixture.apply(&spec);
        assert!(result.unwrap_err().to_string().contains("many"));
        assert!(log.is_empty());
        assert_eq!(fixture.runner.call_count(), 0);
    }

    #[test]
    fn test_labels_joined_before_3_8_5() {
        let fixture = Fixture::new(Version::new(3, 8, 4));
        let spec = CustomizationSpec {
            common_labels: labels(&[("a", "1"), ("b", "2")]),
            force_common_labels: true,
            label_without_selector: true,
            label_include_templates: true,
            ..Default::default()
        };
        fixture.apply(&spec).0.unwrap();

        assert_eq!(
            fixture.runner.edit_invocations()[0],
            vec![
                "edit",
                "add",
                "label",
                "--force",
                "--without-selector",
                "--include-templates",
                "a:1,b:2"
            ]
        );
    }

    #[test]
    fn test_labels_separate_from_3_8_5() {
        let fixture = Fixture::new(Version::new(3, 8, 5));
        let spec = CustomizationSpec {
            common_labels: labels(&[("a", "1"), ("b", "2")]),
            ..Default::default()
        };
        fixture.apply(&spec).0.unwrap();

        assert_eq!(
            fixture.runner.edit_invocations()[0],
            vec!["edit", "add", "label", "a:1", "b:2"]
        );
    }

    #[test]
    fn test_annotation_envsubst_is_opt_in() {
        let fixture = Fixture::new(Version::new(5, 0, 0));
        let mut env = Env::new();
        env.push("REV", "r1");
        let mut spec = CustomizationSpec {
            common_labels: labels(&[("rev", "$REV")]),
            common_annotations: labels(&[("rev", "$REV")]),
            force_common_annotations: true,
            ..Default::default()
        };

        let mut log = CommandLog::new();
        fixture.pipeline().apply(&spec, &env, &mut log).unwrap();
        let calls = fixture.runner.edit_invocations();
        assert_eq!(calls[0], vec!["edit", "add", "label", "rev:r1"]);
        assert_eq!(calls[1], vec!["edit", "add", "annotation", "--force", "rev:$REV"]);

        fixture.runner.reset();
        spec.common_annotations_envsubst = true;
        fixture.pipeline().apply(&spec, &env, &mut log).unwrap();
        let calls = fixture.runner.edit_invocations();
        assert_eq!(calls[1], vec!["edit", "add", "annotation", "--force", "rev:r1"]);
    }

    #[test]
    fn test_patches_logged_without_invocation() {
        let fixture = Fixture::new(Version::new(5, 4, 0));
        let spec = CustomizationSpec {
            namespace: "prod".to_string(),
            patches: vec![KustomizePatch {
                path: "patch.yaml".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };

        let (result, log) = fixture.apply(&spec);
        result.unwrap();

        assert_eq!(fixture.runner.call_count(), 1);
        assert_eq!(log.entries()[1], PATCHES_LOG_ENTRY);
        let content = fs::read_to_string(fixture.app.join("kustomization.yaml")).unwrap();
        assert!(content.contains("path: patch.yaml"));
    }

    #[test]
    fn test_patches_without_kustomization_fail() {
        let fixture = Fixture::new(Version::new(5, 4, 0));
        fs::remove_file(fixture.app.join("kustomization.yaml")).unwrap();
        let spec = CustomizationSpec {
            patches: vec![KustomizePatch::default()],
            components: vec!["../../components/a".to_string()],
            ..Default::default()
        };

        let (result, log) = fixture.apply(&spec);
        assert!(matches!(
            result.unwrap_err(),
            KustomizeError::KustomizationNotFound { .. }
        ));
        assert!(log.is_empty());
    }

    #[test]
    fn test_components_unsupported_before_3_7_0() {
        let fixture = Fixture::new(Version::new(3, 6, 0));
        let spec = CustomizationSpec {
            components: vec!["../../components/a".to_string()],
            ..Default::default()
        };

        let (result, log) = fixture.apply(&spec);
        let err = result.unwrap_err();
        assert!(err.to_string().contains("not supported"));
        assert!(matches!(err, KustomizeError::UnsupportedFeature { .. }));
        assert_eq!(fixture.runner.call_count(), 0);
        assert!(log.is_empty());
    }

    #[test]
    fn test_components_added_as_given() {
        let fixture = Fixture::new(Version::new(3, 7, 0));
        let spec = CustomizationSpec {
            components: vec!["../../components/a".to_string(), "missing".to_string()],
            ..Default::default()
        };
        fixture.apply(&spec).0.unwrap();

        assert_eq!(
            fixture.runner.edit_invocations()[0],
            vec!["edit", "add", "component", "../../components/a", "missing"]
        );
    }

    #[test]
    fn test_missing_components_skipped() {
        let fixture = Fixture::new(Version::new(5, 4, 0));
        fs::create_dir_all(fixture.repo.path().join("components").join("a")).unwrap();
        let outside = TempDir::new().unwrap();
        let escaping = format!("{}/x", outside.path().display());
        let spec = CustomizationSpec {
            components: vec![
                "../../components/a".to_string(),
                "../../components/missing".to_string(),
                "../../../escape".to_string(),
                escaping,
            ],
            ignore_missing_components: true,
            ..Default::default()
        };
        fixture.apply(&spec).0.unwrap();

        assert_eq!(
            fixture.runner.edit_invocations(),
            vec![vec!["edit", "add", "component", "../../components/a"]]
        );
    }

    #[test]
    fn test_all_components_missing_skips_invocation() {
        let fixture = Fixture::new(Version::new(5, 4, 0));
        let spec = CustomizationSpec {
            components: vec!["../../components/missing".to_string()],
            ignore_missing_components: true,
            ..Default::default()
        };

        let (result, log) = fixture.apply(&spec);
        result.unwrap();
        assert!(log.is_empty());
        assert_eq!(fixture.runner.call_count(), 0);
    }

    #[test]
    fn test_missing_repo_root_fails() {
        let fixture = Fixture::new(Version::new(5, 4, 0));
        let missing = fixture.repo.path().join("does-not-exist");
        let pipeline = ArgumentPipeline {
            repo_root: &missing,
            ..fixture.pipeline()
        };
        let spec = CustomizationSpec {
            components: vec!["a".to_string()],
            ignore_missing_components: true,
            ..Default::default()
        };

        let err = pipeline
            .apply(&spec, &Env::new(), &mut CommandLog::new())
            .unwrap_err();
        assert!(matches!(err, KustomizeError::RepoRoot { .. }));
    }

    #[test]
    fn test_encode_pairs() {
        let pairs = labels(&[("a", "1"), ("b", "2")]);
        assert_eq!(encode_pairs(&pairs, false), vec!["a:1,b:2"]);
        assert_eq!(encode_pairs(&pairs, true), vec!["a:1", "b:2"]);
    }

    #[test]
    fn test_redaction_replaces_every_occurrence() {
        let mut log = CommandLog::new();
        log.push("kustomize build /tmp/repo/apps/web --load-restrictor /tmp/repo");
        log.push("kustomize edit set namespace -- prod");

        assert_eq!(
            log.redacted(Path::new("/tmp/repo")),
            vec![
                "kustomize build ./apps/web --load-restrictor .",
                "kustomize edit set namespace -- prod",
            ]
        );
    }

    #[test]
    fn test_redaction_ignores_trailing_separator() {
        let mut log = CommandLog::new();
        log.push("kustomize build /tmp/repo/apps/web");

        assert_eq!(
            log.redacted(Path::new("/tmp/repo/")),
            vec!["kustomize build ./apps/web"]
        );
    }

    #[test]
    fn test_normalize_lexically() {
        assert_eq!(
            normalize_lexically(Path::new("/repo/apps/web/../../components/./a")),
            PathBuf::from("/repo/components/a")
        );
        assert_eq!(normalize_lexically(Path::new("a/../../b")), PathBuf::from("../b"));
    }
}
