//! Inputs shared by every builder.

use perfdag_core::layers::EnvMap;
use perfdag_core::release::Release;
use perfdag_core::vars::TaskVarsLoader;
use perfdag_secrets::SecretStore;
use std::path::{Path, PathBuf};

pub const DEFAULT_DAGS_ROOT: &str = "/opt/airflow/dags/repo/dags/openshift_nightlies";
pub const DEFAULT_EXECUTOR_IMAGE: &str = "quay.io/cloud-bulldozer/airflow-ansible:2.0.0";
pub const DEFAULT_INDEX_IMAGE: &str = "quay.io/keithwhitley4/airflow-ansible:2.0.0";

/// Where scripts live, where side-channel files go, and which images run units.
#[derive(Debug, Clone)]
pub struct DagSettings {
    pub dags_root: PathBuf,
    pub side_channel_dir: PathBuf,
    pub executor_image: String,
    pub index_image: String,
}

impl Default for DagSettings {
    fn default() -> Self {
        Self {
            dags_root: PathBuf::from(DEFAULT_DAGS_ROOT),
            side_channel_dir: PathBuf::from("/tmp"),
            executor_image: DEFAULT_EXECUTOR_IMAGE.to_string(),
            index_image: DEFAULT_INDEX_IMAGE.to_string(),
        }
    }
}

impl DagSettings {
    /// Absolute path of a script under `{dags_root}/scripts`.
    pub fn script(&self, relative: &str) -> String {
        self.dags_root
            .join("scripts")
            .join(relative)
            .display()
            .to_string()
    }

    pub fn side_channel_dir(&self) -> &Path {
        &self.side_channel_dir
    }
}

/// Snapshot of the process environment the workflow is defined in.
#[derive(Debug, Clone, Default)]
pub struct HostEnv {
    vars: EnvMap,
}

impl HostEnv {
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self {
            vars: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Value of `key`, or the empty string.
    pub fn get_or_empty(&self, key: &str) -> String {
        self.get(key).unwrap_or_default().to_string()
    }

    /// Variables whose name contains `needle`.
    pub fn matching(&self, needle: &str) -> EnvMap {
        self.vars
            .iter()
            .filter(|(k, _)| k.contains(needle))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn all(&self) -> &EnvMap {
        &self.vars
    }
}

/// Everything a builder reads. Nothing here is mutated while building.
#[derive(Clone, Copy)]
pub struct BuildContext<'a> {
    pub release: &'a Release,
    pub store: &'a SecretStore,
    pub vars: &'a TaskVarsLoader,
    pub settings: &'a DagSettings,
    pub host: &'a HostEnv,
}
