//! End-to-end benchmark subgraph for one task group.

use crate::builder::GraphBuilder;
use crate::context::BuildContext;
use crate::factory::{BenchmarkEnv, UnitFactory};
use crate::indexer::{StatusIndexer, attach_indexers};
use crate::workflow::{UnitRef, UnitTree, Workflow};
use perfdag_core::Result;
use perfdag_core::layers::ConfigMap;
use perfdag_core::spec::BenchmarkSpec;
use perfdag_core::unit::ExecutionUnit;
use tracing::{debug, info};

pub const DEFAULT_TASK_GROUP: &str = "benchmarks";

/// Benchmarks registered in a workflow.
#[derive(Debug, Clone)]
pub struct BenchmarkPlan {
    /// One entry per top-level benchmark, shaped like the input tree.
    pub trees: Vec<UnitTree<UnitRef>>,
    /// Indexing units, in benchmark order.
    pub indexers: Vec<UnitRef>,
}

impl BenchmarkPlan {
    /// Top-level entries as chain stages; nested entries run side by side.
    pub fn stages(&self) -> Vec<Vec<UnitRef>> {
        self.trees.iter().map(UnitTree::refs).collect()
    }

    pub fn benchmark_count(&self) -> usize {
        self.trees.iter().map(UnitTree::leaf_count).sum()
    }
}

/// Builds the benchmark subgraph of a task group.
pub struct E2EBenchmarks {
    vars: ConfigMap,
    factory: UnitFactory,
    indexer: StatusIndexer,
}

impl E2EBenchmarks {
    /// Read task variables and secrets; fails on the first missing one.
    pub async fn load(ctx: &BuildContext<'_>, task_group: &str) -> Result<Self> {
        let vars = ctx.vars.build_task_vars(ctx.release, "benchmarks")?;
        debug!(
            task_group,
            release = %ctx.release.release_name(),
            keys = ?vars.values().keys().collect::<Vec<_>>(),
            "Benchmark task configuration"
        );

        let env = BenchmarkEnv::load(ctx, task_group).await?;
        let factory = UnitFactory::new(ctx.settings, ctx.release, task_group, env);
        let indexer = StatusIndexer::load(ctx).await?;

        Ok(Self {
            vars,
            factory,
            indexer,
        })
    }

    pub fn from_parts(vars: ConfigMap, factory: UnitFactory, indexer: StatusIndexer) -> Self {
        Self {
            vars,
            factory,
            indexer,
        }
    }

    pub fn task_group(&self) -> &str {
        self.factory.task_group()
    }

    /// The `benchmarks` list of the task variables.
    pub fn specs(&self) -> Result<Vec<BenchmarkSpec>> {
        BenchmarkSpec::parse_list(self.vars.require("benchmarks")?)
    }

    /// Build every benchmark unit without touching a workflow.
    pub fn expand(&self) -> Result<Vec<UnitTree<ExecutionUnit>>> {
        GraphBuilder::new(&self.factory).expand(&self.specs()?)
    }

    /// Expand, register and index every benchmark.
    pub fn get_benchmarks(&self, workflow: &mut Workflow) -> Result<BenchmarkPlan> {
        let expanded = self.expand()?;
        self.register(workflow, expanded)
    }

    /// Like [`Self::get_benchmarks`], with the top-level entries chained.
    pub fn get_chained_benchmarks(&self, workflow: &mut Workflow) -> Result<BenchmarkPlan> {
        let expanded = self.expand()?;
        self.register_chained(workflow, expanded)
    }

    /// Register units from [`Self::expand`] and give each an indexer.
    pub fn register(
        &self,
        workflow: &mut Workflow,
        expanded: Vec<UnitTree<ExecutionUnit>>,
    ) -> Result<BenchmarkPlan> {
        let trees: Vec<UnitTree<UnitRef>> =
            expanded.into_iter().map(|t| workflow.add_tree(t)).collect();
        let indexers = attach_indexers(workflow, &trees, &self.indexer)?;

        let plan = BenchmarkPlan { trees, indexers };
        info!(
            task_group = %self.task_group(),
            benchmarks = plan.benchmark_count(),
            "Built benchmark subgraph"
        );
        Ok(plan)
    }

    pub fn register_chained(
        &self,
        workflow: &mut Workflow,
        expanded: Vec<UnitTree<ExecutionUnit>>,
    ) -> Result<BenchmarkPlan> {
        let plan = self.register(workflow, expanded)?;
        workflow.chain(&plan.stages())?;
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{DagSettings, HostEnv};
    use crate::factory::BenchmarkEnv;
    use perfdag_core::release::{Platform, Release};
    use perfdag_core::vars::TaskVarsLoader;
    use perfdag_secrets::SecretStore;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn benchmarks(value: serde_json::Value) -> E2EBenchmarks {
        let release = Release::new(Platform::Aws, "4.9", "4.9.0-0.nightly");
        let settings = DagSettings::default();
        let store = SecretStore::default();
        let vars = TaskVarsLoader::new("/nonexistent");
        let host = HostEnv::default();
        let ctx = BuildContext {
            release: &release,
            store: &store,
            vars: &vars,
            settings: &settings,
            host: &host,
        };

        let mut values = BTreeMap::new();
        values.insert("benchmarks".to_string(), value);
        E2EBenchmarks::from_parts(
            ConfigMap::new("benchmarks task variables", values),
            UnitFactory::new(&settings, &release, "benchmarks", BenchmarkEnv::default()),
            StatusIndexer::new(&ctx, "http://es".to_string()),
        )
    }

    fn leaf(name: &str) -> serde_json::Value {
        json!({ "name": name, "workload": "w", "command": "c" })
    }

    #[test]
    fn test_chained_stages() {
        let e2e = benchmarks(json!([
            leaf("a"),
            { "group": "g", "benchmarks": [leaf("b"), leaf("c")] },
            leaf("d"),
        ]));
        let mut workflow = Workflow::new("test");
        let plan = e2e.get_chained_benchmarks(&mut workflow).unwrap();

        assert_eq!(plan.benchmark_count(), 4);
        assert_eq!(plan.indexers.len(), 4);

        let stages = plan.stages();
        assert_eq!(stages.len(), 3);
        let (a, b, c, d) = (stages[0][0], stages[1][0], stages[1][1], stages[2][0]);

        let mut expected = vec![b, c, plan.indexers[0]];
        expected.sort();
        assert_eq!(workflow.successors(a), expected);
        assert_eq!(workflow.predecessors(d), vec![b, c]);
    }

    #[test]
    fn test_missing_benchmarks_key() {
        let e2e = E2EBenchmarks {
            vars: ConfigMap::new("benchmarks task variables", BTreeMap::new()),
            ..benchmarks(json!([]))
        };
        let err = e2e.specs().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing key 'benchmarks' in benchmarks task variables"
        );
    }

    #[test]
    fn test_invalid_benchmarks_rejected() {
        let e2e = benchmarks(json!([{ "group": "empty", "benchmarks": [] }]));
        let mut workflow = Workflow::new("test");
        assert!(e2e.get_benchmarks(&mut workflow).is_err());
        assert!(workflow.is_empty());
    }
}
