//! Baremetal cluster install and scale-up.
//!
//! The install unit hands its resolved configuration to the installer
//! playbooks through a JSON file, then the benchmark subgraph runs after it.

use crate::benchmarks::{BenchmarkPlan, E2EBenchmarks};
use crate::context::BuildContext;
use crate::factory::{ELASTICSEARCH_SECRET, baremetal_install_config};
use crate::workflow::{UnitRef, Workflow};
use perfdag_core::layers::{ConfigMap, EnvMap, Layers};
use perfdag_core::unit::{ExecutionUnit, ExecutorProfile, TriggerRule};
use perfdag_core::{Error, Result, UnitId};
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Install,
    Scaleup,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Install => "install",
            Operation::Scaleup => "scaleup",
        }
    }

    /// Config key the operation's worker count is read from.
    pub fn worker_count_key(&self) -> &'static str {
        match self {
            Operation::Install => "openshift_worker_count",
            Operation::Scaleup => "openshift_worker_scaleup_target",
        }
    }

    pub fn script(&self) -> &'static str {
        match self {
            Operation::Install => "install/baremetal_install.sh",
            Operation::Scaleup => "install/baremetal_scaleup.sh",
        }
    }

    /// Task group of the benchmarks that follow the operation.
    pub fn bench_group(&self) -> &'static str {
        match self {
            Operation::Install => "install-bench",
            Operation::Scaleup => "scaleup-bench",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "install" => Ok(Operation::Install),
            "scaleup" => Ok(Operation::Scaleup),
            other => Err(Error::InvalidValue {
                key: "operation".to_string(),
                reason: format!("unknown operation {}", other),
            }),
        }
    }
}

/// Install or scale-up unit with its benchmarks.
#[derive(Debug, Clone)]
pub struct InstallPlan {
    pub install: UnitRef,
    pub side_channel: PathBuf,
    pub benchmarks: BenchmarkPlan,
}

pub struct BaremetalInstaller<'a> {
    ctx: BuildContext<'a>,
    config: ConfigMap,
    es_server: String,
    executor: ExecutorProfile,
}

impl<'a> BaremetalInstaller<'a> {
    pub async fn load(ctx: BuildContext<'a>) -> Result<Self> {
        if !ctx.release.platform.is_baremetal() {
            return Err(Error::UnsupportedPlatform {
                platform: ctx.release.platform.to_string(),
                operation: "install".to_string(),
            });
        }

        let config = baremetal_install_config(&ctx).await?;
        let es_server = ctx.store.get(ELASTICSEARCH_SECRET).await?;
        Ok(Self::new(ctx, config, es_server))
    }

    /// `config` is install variables already overlaid with the install secret.
    pub fn new(ctx: BuildContext<'a>, config: ConfigMap, es_server: String) -> Self {
        Self {
            executor: ExecutorProfile::new(&ctx.settings.executor_image),
            ctx,
            config,
            es_server,
        }
    }

    pub fn side_channel_path(&self, operation: Operation) -> PathBuf {
        self.ctx.settings.side_channel_dir().join(format!(
            "{}-{}-task.json",
            self.ctx.release.release_name(),
            operation
        ))
    }

    /// Full configuration written for the playbooks.
    pub fn resolve_config(&self, operation: Operation) -> Result<ConfigMap> {
        let release = self.ctx.release;
        let layers = Layers::new()
            .layer("install configuration", self.config.values().clone())
            .layer(
                "result store",
                [("es_server", Value::String(self.es_server.clone()))],
            );
        let mut config = ConfigMap::from_layers("install configuration", &layers);

        let pull_secret = serde_json::to_string(config.require("openshift_install_pull_secret")?)?;
        let worker_count = config.require(operation.worker_count_key())?.clone();

        config.insert("pullsecret", pull_secret);
        config.insert("version", release.release_stream.clone());
        config.insert("build", release.build.clone());
        config.insert("worker_count", worker_count);
        Ok(config)
    }

    /// Overwrites any previous file for the same release and operation.
    pub fn write_side_channel(&self, operation: Operation, config: &ConfigMap) -> Result<PathBuf> {
        let path = self.side_channel_path(operation);
        std::fs::write(&path, config.to_json_pretty()?)?;
        info!(path = %path.display(), operation = %operation, "Wrote install configuration");
        Ok(path)
    }

    fn install_env(&self, config: &ConfigMap) -> Result<EnvMap> {
        let release_name = self.ctx.release.release_name();
        let required: EnvMap = [
            ("SSHKEY_TOKEN", config.require_str("sshkey_token")?),
            ("OPENSHIFT_WORKER_COUNT", config.require_str("openshift_worker_count")?),
            ("BAREMETAL_NETWORK_CIDR", config.require_str("baremetal_network_cidr")?),
            ("BAREMETAL_NETWORK_VLAN", config.require_str("baremetal_network_vlan")?),
            ("OPENSHIFT_BASE_DOMAIN", config.require_str("openshift_base_domain")?),
            ("JETSKI_SKIPTAGS", config.require_str("jetski_skiptags")?),
            ("KUBECONFIG_PATH", config.require_str("kubeconfig_path")?),
            ("KUBECONFIG_NAME", format!("{}-kubeconfig", release_name)),
            ("KUBEADMIN_NAME", format!("{}-kubeadmin", release_name)),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        Ok(Layers::new()
            .layer("install", required)
            .layer("kubernetes", self.ctx.host.matching("KUBERNETES"))
            .resolve())
    }

    /// Resolve configuration and environment, write the side-channel file
    /// and build the unit. Nothing is registered.
    fn install_unit(
        &self,
        operation: Operation,
        trigger_rule: TriggerRule,
    ) -> Result<(ExecutionUnit, PathBuf)> {
        let release = self.ctx.release;
        let config = self.resolve_config(operation)?;
        let env = self.install_env(&config)?;
        let path = self.write_side_channel(operation, &config)?;

        let command = format!(
            "{} -p {} -v {} -j {} -o {} ",
            self.ctx.settings.script(operation.script()),
            release.platform,
            release.version,
            path.display(),
            operation
        );
        let unit = ExecutionUnit::new(
            UnitId::new(format!("{}-cluster", operation)),
            command,
            self.executor.clone(),
        )
        .with_env(env)
        .with_trigger_rule(trigger_rule);

        Ok((unit, path))
    }

    /// Build and register the install or scale-up unit.
    pub fn build_install(
        &self,
        workflow: &mut Workflow,
        operation: Operation,
        trigger_rule: TriggerRule,
    ) -> Result<(UnitRef, PathBuf)> {
        let (unit, path) = self.install_unit(operation, trigger_rule)?;
        Ok((workflow.add_unit(unit), path))
    }

    /// Install or scale up, then run the operation's benchmarks.
    ///
    /// Benchmark expansion and install configuration are resolved before
    /// the first unit is registered, so a missing key or a malformed
    /// benchmark list leaves `workflow` as it was.
    pub async fn plan(&self, workflow: &mut Workflow, operation: Operation) -> Result<InstallPlan> {
        let e2e = E2EBenchmarks::load(&self.ctx, operation.bench_group()).await?;
        let expanded = e2e.expand()?;
        let (unit, side_channel) = self.install_unit(operation, TriggerRule::AllSuccess)?;

        let install = workflow.add_unit(unit);
        let benchmarks = e2e.register_chained(workflow, expanded)?;
        if let Some(first) = benchmarks.stages().first() {
            workflow.chain(&[vec![install], first.clone()])?;
        }

        Ok(InstallPlan {
            install,
            side_channel,
            benchmarks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{DagSettings, HostEnv};
    use perfdag_core::release::{Platform, Release};
    use perfdag_core::vars::TaskVarsLoader;
    use perfdag_secrets::SecretStore;
    use serde_json::json;
    use std::collections::BTreeMap;

    struct Fixture {
        release: Release,
        store: SecretStore,
        vars: TaskVarsLoader,
        settings: DagSettings,
        host: HostEnv,
        _dir: tempfile::TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let mut release = Release::new(Platform::Baremetal, "4.8", "4.8.0-0.nightly");
            release.build = Some("4.8.0-0.nightly-2021-06-01".to_string());
            Self {
                release,
                store: SecretStore::default(),
                vars: TaskVarsLoader::new(dir.path()),
                settings: DagSettings {
                    dags_root: PathBuf::from("/dags"),
                    side_channel_dir: dir.path().to_path_buf(),
                    ..Default::default()
                },
                host: HostEnv::from_pairs([
                    ("KUBERNETES_SERVICE_HOST", "10.0.0.1"),
                    ("HOME", "/root"),
                ]),
                _dir: dir,
            }
        }

        fn ctx(&self) -> BuildContext<'_> {
            BuildContext {
                release: &self.release,
                store: &self.store,
                vars: &self.vars,
                settings: &self.settings,
                host: &self.host,
            }
        }
    }

    fn install_config(worker_count: u32) -> ConfigMap {
        let values: BTreeMap<String, Value> = [
            ("sshkey_token", json!("token")),
            ("openshift_worker_count", json!(worker_count)),
            ("openshift_worker_scaleup_target", json!(worker_count + 10)),
            ("baremetal_network_cidr", json!("192.168.0.0/24")),
            ("baremetal_network_vlan", json!(10)),
            ("openshift_base_domain", json!("example.com")),
            ("jetski_skiptags", json!("")),
            ("kubeconfig_path", json!("/root/.kube")),
            ("openshift_install_pull_secret", json!({"auths": {}})),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        ConfigMap::new("install configuration", values)
    }

    #[test]
    fn test_install_unit() {
        let fixture = Fixture::new();
        let installer =
            BaremetalInstaller::new(fixture.ctx(), install_config(3), "http://es".to_string());
        let mut workflow = Workflow::new("test");

        let (install, path) = installer
            .build_install(&mut workflow, Operation::Install, TriggerRule::AllSuccess)
            .unwrap();
        let unit = workflow.unit(install).unwrap();

        assert_eq!(unit.id.as_str(), "install-cluster");
        assert_eq!(
            unit.command,
            format!(
                "/dags/scripts/install/baremetal_install.sh -p baremetal -v 4.8 -j {} -o install ",
                path.display()
            )
        );
        assert!(path.ends_with("4.8-baremetal-default-install-task.json"));
        assert_eq!(unit.env["OPENSHIFT_WORKER_COUNT"], "3");
        assert_eq!(unit.env["BAREMETAL_NETWORK_VLAN"], "10");
        assert_eq!(unit.env["KUBECONFIG_NAME"], "4.8-baremetal-default-kubeconfig");
        assert_eq!(unit.env["KUBEADMIN_NAME"], "4.8-baremetal-default-kubeadmin");
        assert_eq!(unit.env["KUBERNETES_SERVICE_HOST"], "10.0.0.1");
        assert!(!unit.env.contains_key("HOME"));

        let written: BTreeMap<String, Value> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["worker_count"], json!(3));
        assert_eq!(written["es_server"], json!("http://es"));
        assert_eq!(written["pullsecret"], json!("{\"auths\":{}}"));
        assert_eq!(written["version"], json!("4.8.0-0.nightly"));
        assert_eq!(written["build"], json!("4.8.0-0.nightly-2021-06-01"));
    }

    #[test]
    fn test_scaleup_uses_scaleup_keys() {
        let fixture = Fixture::new();
        let installer =
            BaremetalInstaller::new(fixture.ctx(), install_config(3), "http://es".to_string());
        let mut workflow = Workflow::new("test");

        let (scaleup, path) = installer
            .build_install(&mut workflow, Operation::Scaleup, TriggerRule::AllSuccess)
            .unwrap();
        let unit = workflow.unit(scaleup).unwrap();

        assert_eq!(unit.id.as_str(), "scaleup-cluster");
        assert!(unit.command.starts_with("/dags/scripts/install/baremetal_scaleup.sh "));
        assert!(unit.command.ends_with("-o scaleup "));
        assert!(path.ends_with("4.8-baremetal-default-scaleup-task.json"));

        let config = installer.resolve_config(Operation::Scaleup).unwrap();
        assert_eq!(config.get("worker_count"), Some(&json!(13)));
    }

    #[test]
    fn test_side_channel_overwritten() {
        let fixture = Fixture::new();
        let mut workflow = Workflow::new("test");

        let first = BaremetalInstaller::new(fixture.ctx(), install_config(3), "http://es".to_string());
        let (_, path) = first
            .build_install(&mut workflow, Operation::Install, TriggerRule::AllSuccess)
            .unwrap();

        let second = BaremetalInstaller::new(fixture.ctx(), install_config(5), "http://es".to_string());
        let (_, again) = second
            .build_install(&mut workflow, Operation::Install, TriggerRule::AllSuccess)
            .unwrap();
        assert_eq!(path, again);

        let content = std::fs::read_to_string(&path).unwrap();
        let written: BTreeMap<String, Value> = serde_json::from_str(&content).unwrap();
        assert_eq!(written["worker_count"], json!(5));
        assert_eq!(content.matches("\"worker_count\"").count(), 1);
    }

    #[test]
    fn test_missing_key_fails_at_use() {
        let fixture = Fixture::new();
        let mut config = install_config(3).into_values();
        config.remove("baremetal_network_cidr");
        let installer = BaremetalInstaller::new(
            fixture.ctx(),
            ConfigMap::new("install configuration", config),
            "http://es".to_string(),
        );

        let mut workflow = Workflow::new("test");
        let err = installer
            .build_install(&mut workflow, Operation::Install, TriggerRule::AllSuccess)
            .unwrap_err();
        assert!(matches!(err, Error::MissingKey { ref key, .. } if key == "baremetal_network_cidr"));
        assert!(workflow.is_empty());
        assert!(!installer.side_channel_path(Operation::Install).exists());
    }

    #[tokio::test]
    async fn test_cloud_platform_unsupported() {
        let mut fixture = Fixture::new();
        fixture.release.platform = Platform::Aws;
        let err = BaremetalInstaller::load(fixture.ctx()).await.err().unwrap();
        assert!(matches!(err, Error::UnsupportedPlatform { .. }));
    }

    #[test]
    fn test_operation_parse() {
        assert_eq!("install".parse::<Operation>().unwrap(), Operation::Install);
        assert_eq!("scaleup".parse::<Operation>().unwrap(), Operation::Scaleup);
        assert!("cleanup".parse::<Operation>().is_err());
    }
}
