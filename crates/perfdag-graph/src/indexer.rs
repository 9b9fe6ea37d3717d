//! Result indexing units.
//!
//! Every benchmark unit gets one `index_results` successor that records
//! its outcome, success or not, in the results store.

use crate::context::{BuildContext, HostEnv};
use crate::factory::ELASTICSEARCH_SECRET;
use crate::workflow::{UnitRef, UnitTree, Workflow};
use perfdag_core::layers::{EnvMap, Layers};
use perfdag_core::unit::{ExecutionUnit, ExecutorProfile, TriggerRule};
use perfdag_core::{Error, Result, UnitId};
use tracing::debug;

pub const INDEX_UNIT_ID: &str = "index_results";
pub const INDEX_GROUP: &str = "Index Results";

/// Builds indexing units for one release.
#[derive(Debug, Clone)]
pub struct StatusIndexer {
    env: EnvMap,
    host: HostEnv,
    executor: ExecutorProfile,
    script: String,
}

impl StatusIndexer {
    pub async fn load(ctx: &BuildContext<'_>) -> Result<Self> {
        let es_server = ctx.store.get(ELASTICSEARCH_SECRET).await?;
        Ok(Self::new(ctx, es_server))
    }

    pub fn new(ctx: &BuildContext<'_>, es_server: String) -> Self {
        let release = ctx.release;
        let env: EnvMap = [
            (
                "OPENSHIFT_CLIENT_LOCATION",
                release.client_location.clone().unwrap_or_default(),
            ),
            ("RELEASE_STREAM", release.release_stream.clone()),
            ("ES_SERVER", es_server),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        Self {
            env,
            host: ctx.host.clone(),
            executor: ExecutorProfile::with_cluster_access(&ctx.settings.index_image, release),
            script: ctx.settings.script("index.sh"),
        }
    }

    /// Indexing unit for the benchmark unit `upstream`.
    pub fn index_unit(&self, upstream: &UnitId) -> ExecutionUnit {
        let env = Layers::new()
            .layer("index", self.env.clone())
            .layer("upstream", [("TASK_ID", upstream.to_string())])
            .layer("host", self.host.all().clone())
            .resolve();

        ExecutionUnit::new(
            UnitId::new(INDEX_UNIT_ID),
            format!("{} ", self.script),
            self.executor.clone(),
        )
        .with_env(env)
        .with_trigger_rule(TriggerRule::AllDone)
        .in_group(Some(INDEX_GROUP.to_string()))
    }
}

/// Give every leaf of `trees` an indexing successor.
///
/// Groups and sequences are walked, never indexed. Returns the indexing
/// units in leaf order.
pub fn attach_indexers(
    workflow: &mut Workflow,
    trees: &[UnitTree<UnitRef>],
    indexer: &StatusIndexer,
) -> Result<Vec<UnitRef>> {
    let mut indexers = Vec::new();
    for tree in trees {
        for benchmark in tree.refs() {
            let upstream = workflow
                .unit(benchmark)
                .map(|u| u.id.clone())
                .ok_or_else(|| Error::Graph(format!("unknown unit {}", benchmark.index())))?;

            let index = workflow.add_unit(indexer.index_unit(&upstream));
            workflow.depend(benchmark, index)?;
            debug!(benchmark = %upstream, "Attached result indexer");
            indexers.push(index);
        }
    }
    Ok(indexers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::DagSettings;
    use perfdag_core::release::{Platform, Release};
    use perfdag_core::unit::DEFAULT_RETRIES;
    use perfdag_core::vars::TaskVarsLoader;
    use perfdag_secrets::SecretStore;
    use std::path::PathBuf;

    fn indexer(host: HostEnv) -> StatusIndexer {
        let mut release = Release::new(Platform::Aws, "4.9", "4.9.0-0.nightly");
        release.client_location = Some("https://mirror/oc.tar.gz".to_string());
        let store = SecretStore::default();
        let vars = TaskVarsLoader::new("/nonexistent");
        let settings = DagSettings {
            dags_root: PathBuf::from("/dags"),
            ..Default::default()
        };
        let ctx = BuildContext {
            release: &release,
            store: &store,
            vars: &vars,
            settings: &settings,
            host: &host,
        };
        StatusIndexer::new(&ctx, "http://es".to_string())
    }

    fn benchmark(id: &str) -> ExecutionUnit {
        ExecutionUnit::new(UnitId::new(id), "run", ExecutorProfile::new("image"))
    }

    #[test]
    fn test_index_unit() {
        let host = HostEnv::from_pairs([("HOME", "/root"), ("ES_SERVER", "http://host-es")]);
        let unit = indexer(host).index_unit(&UnitId::new("benchmarks_uperf"));

        assert_eq!(unit.id.as_str(), INDEX_UNIT_ID);
        assert_eq!(unit.command, "/dags/scripts/index.sh ");
        assert_eq!(unit.retries, DEFAULT_RETRIES);
        assert_eq!(unit.trigger_rule, TriggerRule::AllDone);
        assert_eq!(unit.group.as_deref(), Some(INDEX_GROUP));
        assert_eq!(unit.env["OPENSHIFT_CLIENT_LOCATION"], "https://mirror/oc.tar.gz");
        assert_eq!(unit.env["RELEASE_STREAM"], "4.9.0-0.nightly");
        assert_eq!(unit.env["TASK_ID"], "benchmarks_uperf");
        assert_eq!(unit.env["HOME"], "/root");
        // The host environment has the last word.
        assert_eq!(unit.env["ES_SERVER"], "http://host-es");
    }

    #[test]
    fn test_one_indexer_per_leaf() {
        let mut workflow = Workflow::new("test");
        let tree = vec![
            UnitTree::Unit(benchmark("a")),
            UnitTree::Group {
                label: "g".to_string(),
                children: vec![
                    UnitTree::Unit(benchmark("b")),
                    UnitTree::Sequence(vec![UnitTree::Unit(benchmark("c"))]),
                ],
            },
        ];
        let refs: Vec<UnitTree<UnitRef>> =
            tree.into_iter().map(|t| workflow.add_tree(t)).collect();

        let indexers = attach_indexers(&mut workflow, &refs, &indexer(HostEnv::default())).unwrap();

        assert_eq!(indexers.len(), 3);
        assert_eq!(workflow.len(), 6);
        let leaves: Vec<UnitRef> = refs.iter().flat_map(|t| t.refs()).collect();
        for (leaf, index) in leaves.iter().zip(&indexers) {
            assert_eq!(workflow.successors(*leaf), vec![*index]);
            assert_eq!(workflow.predecessors(*index), vec![*leaf]);
            assert_eq!(
                workflow.unit(*index).unwrap().env["TASK_ID"],
                workflow.unit(*leaf).unwrap().id.as_str()
            );
        }
    }
}
