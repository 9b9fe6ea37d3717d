//! Benchmark unit-of-work factory.

use crate::context::{BuildContext, DagSettings};
use perfdag_core::layers::{ConfigMap, EnvMap, Layers};
use perfdag_core::release::Release;
use perfdag_core::spec::BenchmarkLeaf;
use perfdag_core::unit::{ExecutionUnit, ExecutorProfile};
use perfdag_core::{Result, UnitId};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

pub const SNAPPY_URL_VAR: &str = "SNAPPY_DATA_SERVER_URL";
pub const SNAPPY_USER_VAR: &str = "SNAPPY_DATA_SERVER_USERNAME";
pub const SNAPPY_PASSWORD_VAR: &str = "SNAPPY_DATA_SERVER_PASSWORD";
pub const ELASTICSEARCH_SECRET: &str = "elasticsearch";
pub const GIT_USER_VAR: &str = "git_user";
pub const BAREMETAL_INSTALL_SECRET: &str = "baremetal_openshift_install_config";
pub const KUBEADMIN_PASSWORD_ENV: &str = "KUBEADMIN_PASSWORD";

const UPSTREAM_GIT_USER: &str = "cloud-bulldozer";

/// Result folder on the snappy server for a git user.
pub fn snappy_folder(git_user: &str) -> String {
    if git_user == UPSTREAM_GIT_USER {
        "perf-ci".to_string()
    } else {
        git_user.to_string()
    }
}

/// Baremetal install variables overlaid with the install secret.
pub async fn baremetal_install_config(ctx: &BuildContext<'_>) -> Result<ConfigMap> {
    let install_vars = ctx.vars.build_task_vars(ctx.release, "install")?;
    let secrets: BTreeMap<String, Value> = ctx.store.get_json(BAREMETAL_INSTALL_SECRET).await?;

    let layers = Layers::new()
        .layer("install task variables", install_vars.into_values())
        .layer(BAREMETAL_INSTALL_SECRET, secrets);
    Ok(ConfigMap::from_layers("baremetal install configuration", &layers))
}

/// Environment shared by every benchmark of a task group.
#[derive(Debug, Clone, Default)]
pub struct BenchmarkEnv {
    pub base: EnvMap,
    /// Platform-specific credentials; empty on cloud platforms.
    pub platform: EnvMap,
    pub es_server: String,
    pub kubeadmin_password: String,
}

impl BenchmarkEnv {
    pub async fn load(ctx: &BuildContext<'_>, task_group: &str) -> Result<Self> {
        let store = ctx.store;
        let git_user = store.get_or(GIT_USER_VAR, UPSTREAM_GIT_USER).await?;

        let base: EnvMap = [
            (SNAPPY_URL_VAR, store.get(SNAPPY_URL_VAR).await?),
            (SNAPPY_USER_VAR, store.get(SNAPPY_USER_VAR).await?),
            (SNAPPY_PASSWORD_VAR, store.get(SNAPPY_PASSWORD_VAR).await?),
            ("SNAPPY_USER_FOLDER", snappy_folder(&git_user)),
            ("PLATFORM", ctx.release.platform.to_string()),
            ("TASK_GROUP", task_group.to_string()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        let platform = if ctx.release.platform.is_baremetal() {
            let config = baremetal_install_config(ctx).await?;
            [
                ("SSHKEY_TOKEN", config.require_str("sshkey_token")?),
                ("ORCHESTRATION_USER", config.require_str("provisioner_user")?),
                ("ORCHESTRATION_HOST", config.require_str("provisioner_hostname")?),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
        } else {
            EnvMap::new()
        };

        Ok(Self {
            base,
            platform,
            es_server: store.get(ELASTICSEARCH_SECRET).await?,
            kubeadmin_password: ctx.host.get_or_empty(KUBEADMIN_PASSWORD_ENV),
        })
    }
}

/// Builds one benchmark unit per leaf.
#[derive(Debug, Clone)]
pub struct UnitFactory {
    task_group: String,
    env: BenchmarkEnv,
    executor: ExecutorProfile,
    script: String,
}

impl UnitFactory {
    pub fn new(
        settings: &DagSettings,
        release: &Release,
        task_group: impl Into<String>,
        env: BenchmarkEnv,
    ) -> Self {
        Self {
            task_group: task_group.into(),
            env,
            executor: ExecutorProfile::with_cluster_access(&settings.executor_image, release),
            script: settings.script("run_benchmark.sh"),
        }
    }

    pub fn task_group(&self) -> &str {
        &self.task_group
    }

    /// Base, platform, leaf overrides, then `ES_SERVER` and
    /// `KUBEADMIN_PASSWORD`.
    pub fn leaf_env(&self, leaf: &BenchmarkLeaf) -> EnvMap {
        Layers::new()
            .layer("benchmark", self.env.base.clone())
            .layer("platform", self.env.platform.clone())
            .layer(format!("{} overrides", leaf.name), leaf.env.clone())
            .layer("result store", [("ES_SERVER", self.env.es_server.clone())])
            .layer(
                "host",
                [(KUBEADMIN_PASSWORD_ENV, self.env.kubeadmin_password.clone())],
            )
            .resolve()
    }

    /// Ids are `{task_group}_{name}` and are not deduplicated.
    pub fn build_leaf(&self, leaf: &BenchmarkLeaf, group: Option<&str>) -> ExecutionUnit {
        let command = format!(
            "{} -w {} -c {} ",
            self.script, leaf.workload, leaf.command
        );
        let id = UnitId::prefixed(&self.task_group, &leaf.name);
        debug!(unit = %id, workload = %leaf.workload, "Building benchmark unit");

        ExecutionUnit::new(id, command, self.executor.clone())
            .with_env(self.leaf_env(leaf))
            .in_group(group.map(str::to_string))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use perfdag_core::release::Platform;
    use perfdag_core::unit::{DEFAULT_RETRIES, TriggerRule};
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn env_of(pairs: &[(&str, &str)]) -> EnvMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn factory(env: BenchmarkEnv) -> UnitFactory {
        let settings = DagSettings {
            dags_root: PathBuf::from("/dags"),
            ..Default::default()
        };
        let release = Release::new(Platform::Aws, "4.9", "4.9.0-0.nightly");
        UnitFactory::new(&settings, &release, "benchmarks", env)
    }

    fn leaf(name: &str, env: &[(&str, &str)]) -> BenchmarkLeaf {
        BenchmarkLeaf {
            name: name.to_string(),
            workload: "kube-burner".to_string(),
            command: "./run.sh".to_string(),
            env: env_of(env),
        }
    }

    #[test]
    fn test_snappy_folder() {
        assert_eq!(snappy_folder("cloud-bulldozer"), "perf-ci");
        assert_eq!(snappy_folder("jdoe"), "jdoe");
    }

    #[test]
    fn test_leaf_env_precedence() {
        let factory = factory(BenchmarkEnv {
            base: env_of(&[("A", "1"), ("B", "2")]),
            platform: EnvMap::new(),
            es_server: "http://es".to_string(),
            kubeadmin_password: String::new(),
        });

        let env = factory.leaf_env(&leaf("density", &[("B", "3"), ("C", "4")]));
        assert_eq!(
            env,
            env_of(&[
                ("A", "1"),
                ("B", "3"),
                ("C", "4"),
                ("ES_SERVER", "http://es"),
                ("KUBEADMIN_PASSWORD", ""),
            ])
        );
    }

    #[test]
    fn test_computed_keys_beat_leaf_overrides() {
        let factory = factory(BenchmarkEnv {
            base: env_of(&[("SSHKEY_TOKEN", "base")]),
            platform: env_of(&[("SSHKEY_TOKEN", "platform")]),
            es_server: "http://es".to_string(),
            kubeadmin_password: "kubeadmin".to_string(),
        });

        let env = factory.leaf_env(&leaf(
            "density",
            &[("ES_SERVER", "http://other"), ("KUBEADMIN_PASSWORD", "x")],
        ));
        assert_eq!(env["ES_SERVER"], "http://es");
        assert_eq!(env["KUBEADMIN_PASSWORD"], "kubeadmin");
        assert_eq!(env["SSHKEY_TOKEN"], "platform");
    }

    #[test]
    fn test_build_leaf() {
        let factory = factory(BenchmarkEnv::default());
        let unit = factory.build_leaf(&leaf("node-density", &[]), Some("control-plane"));

        assert_eq!(unit.id.as_str(), "benchmarks_node-density");
        assert_eq!(
            unit.command,
            "/dags/scripts/run_benchmark.sh -w kube-burner -c ./run.sh "
        );
        assert_eq!(unit.retries, DEFAULT_RETRIES);
        assert_eq!(unit.trigger_rule, TriggerRule::AllSuccess);
        assert_eq!(unit.group.as_deref(), Some("control-plane"));
        assert!(unit.executor.has_cluster_access());
    }

    #[test]
    fn test_duplicate_names_give_duplicate_ids() {
        let factory = factory(BenchmarkEnv::default());
        let first = factory.build_leaf(&leaf("uperf", &[]), None);
        let second = factory.build_leaf(&leaf("uperf", &[]), None);
        assert_eq!(first.id, second.id);
    }
}
