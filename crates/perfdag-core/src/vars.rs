//! Task variables loaded from the configuration tree.
//!
//! ```text
//! {root}/tasks/{task}/defaults.yaml
//! {root}/releases/{version}/{platform}/{profile}/{task}.yaml
//! ```
//!
//! Release files override task defaults. Either file may be missing.

use crate::layers::{ConfigMap, Layer, Layers};
use crate::release::Release;
use crate::{Error, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Loads per-task variable bundles for a release.
#[derive(Debug, Clone)]
pub struct TaskVarsLoader {
    root: PathBuf,
}

impl TaskVarsLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn defaults_path(&self, task: &str) -> PathBuf {
        self.root.join("tasks").join(task).join("defaults.yaml")
    }

    pub fn release_path(&self, release: &Release, task: &str) -> PathBuf {
        self.root
            .join("releases")
            .join(&release.version)
            .join(release.platform.as_str())
            .join(&release.profile)
            .join(format!("{}.yaml", task))
    }

    /// Task defaults overridden by the release-specific file.
    pub fn build_task_vars(&self, release: &Release, task: &str) -> Result<ConfigMap> {
        let mut layers = Layers::<Value>::new();
        for (name, path) in [
            ("defaults", self.defaults_path(task)),
            ("release", self.release_path(release, task)),
        ] {
            if let Some(values) = read_vars_file(&path)? {
                debug!(task, layer = name, path = %path.display(), "Loaded task variables");
                layers.push(Layer::new(name, values));
            }
        }

        Ok(ConfigMap::from_layers(format!("{} task variables", task), &layers))
    }
}

/// Read a YAML mapping; a missing file is `None`, an empty one is `{}`.
pub fn read_vars_file(path: &Path) -> Result<Option<BTreeMap<String, Value>>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(Some(BTreeMap::new()));
    }
    let values: BTreeMap<String, Value> = serde_yaml::from_str(&content).map_err(|e| {
        Error::Serialization(format!("{}: {}", path.display(), e))
    })?;
    Ok(Some(values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::release::Platform;
    use serde_json::json;

    fn write(path: &Path, content: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_release_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loader = TaskVarsLoader::new(dir.path());
        let release = Release::new(Platform::Baremetal, "4.8", "4.8.0-0.nightly");

        write(
            &loader.defaults_path("install"),
            "openshift_worker_count: 3\njetski_skiptags: ''\n",
        );
        write(
            &loader.release_path(&release, "install"),
            "openshift_worker_count: 10\n",
        );

        let vars = loader.build_task_vars(&release, "install").unwrap();
        assert_eq!(vars.get("openshift_worker_count"), Some(&json!(10)));
        assert_eq!(vars.get("jetski_skiptags"), Some(&json!("")));
        assert_eq!(vars.name(), "install task variables");
    }

    #[test]
    fn test_missing_files_give_empty_vars() {
        let dir = tempfile::tempdir().unwrap();
        let loader = TaskVarsLoader::new(dir.path());
        let release = Release::new(Platform::Aws, "4.9", "4.9.0-0.nightly");

        let vars = loader.build_task_vars(&release, "benchmarks").unwrap();
        assert!(vars.values().is_empty());
    }

    #[test]
    fn test_invalid_yaml_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.yaml");
        std::fs::write(&path, "- not\n- a mapping\n").unwrap();

        let err = read_vars_file(&path).unwrap_err();
        assert!(err.to_string().contains("broken.yaml"));
    }
}
