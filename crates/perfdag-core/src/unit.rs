//! Execution units handed to the scheduler.

use crate::ids::UnitId;
use crate::layers::EnvMap;
use crate::release::Release;
use serde::{Deserialize, Serialize};

/// Retry count of every unit built here.
pub const DEFAULT_RETRIES: u32 = 3;

/// Mount point of the kubeconfig secret inside executor pods.
pub const KUBECONFIG_MOUNT_PATH: &str = "/home/airflow/auth";

/// When a unit may start relative to its upstream units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerRule {
    /// Every upstream unit succeeded.
    #[default]
    AllSuccess,
    /// Every upstream unit finished, whatever the outcome.
    AllDone,
}

/// Kubeconfig secret mounted into the executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KubeconfigVolume {
    pub secret_name: String,
    pub mount_path: String,
}

/// Pod profile the scheduler runs a unit in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorProfile {
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubeconfig: Option<KubeconfigVolume>,
}

impl ExecutorProfile {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            kubeconfig: None,
        }
    }

    /// Profile with the release's kubeconfig mounted, for units that talk
    /// to the cluster under test.
    pub fn with_cluster_access(image: impl Into<String>, release: &Release) -> Self {
        Self {
            kubeconfig: Some(KubeconfigVolume {
                secret_name: format!("{}-kubeconfig", release.release_name()),
                mount_path: KUBECONFIG_MOUNT_PATH.to_string(),
            }),
            ..Self::new(image)
        }
    }

    pub fn has_cluster_access(&self) -> bool {
        self.kubeconfig.is_some()
    }
}

/// A runnable step: one shell command with its resolved environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionUnit {
    pub id: UnitId,
    pub command: String,
    pub env: EnvMap,
    pub retries: u32,
    #[serde(default)]
    pub trigger_rule: TriggerRule,
    #[serde(default)]
    pub depends_on_past: bool,
    pub executor: ExecutorProfile,
    /// Display group, if the unit was created inside one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

impl ExecutionUnit {
    pub fn new(id: UnitId, command: impl Into<String>, executor: ExecutorProfile) -> Self {
        Self {
            id,
            command: command.into(),
            env: EnvMap::new(),
            retries: DEFAULT_RETRIES,
            trigger_rule: TriggerRule::AllSuccess,
            depends_on_past: false,
            executor,
            group: None,
        }
    }

    pub fn with_env(mut self, env: EnvMap) -> Self {
        self.env = env;
        self
    }

    pub fn with_trigger_rule(mut self, rule: TriggerRule) -> Self {
        self.trigger_rule = rule;
        self
    }

    pub fn in_group(mut self, group: Option<String>) -> Self {
        self.group = group;
        self
    }
}
