//! Declarative benchmark tree.
//!
//! A benchmark list comes from task variables and nests arbitrarily:
//!
//! ```yaml
//! benchmarks:
//!   - name: node-density
//!     workload: kube-burner
//!     command: ./run.sh
//!   - group: network-perf
//!     benchmarks:
//!       - name: uperf
//!         workload: network-perf
//!         command: ./run_smoke.sh
//!         env:
//!           SAMPLES: 3
//! ```
//!
//! A node carrying a `benchmarks` key is a branch, anything else is a leaf.
//! The distinction is made once here; the graph builder matches on it.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A node of the benchmark tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawBenchmark", into = "RawBenchmark")]
pub enum BenchmarkSpec {
    Leaf(BenchmarkLeaf),
    Branch(BenchmarkBranch),
}

/// A single benchmark run by `run_benchmark.sh`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchmarkLeaf {
    pub name: String,
    pub workload: String,
    pub command: String,
    /// Overrides layered on top of the shared benchmark environment.
    pub env: BTreeMap<String, String>,
}

/// A nested, never empty, list of benchmarks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchmarkBranch {
    /// Display group. Unlabelled branches open no grouping scope.
    pub group: Option<String>,
    pub benchmarks: Vec<BenchmarkSpec>,
}

/// Wire shape shared by leaves and branches.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawBenchmark {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    workload: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    command: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    env: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    benchmarks: Option<Vec<BenchmarkSpec>>,
}

impl TryFrom<RawBenchmark> for BenchmarkSpec {
    type Error = Error;

    fn try_from(raw: RawBenchmark) -> Result<Self> {
        if let Some(benchmarks) = raw.benchmarks {
            if benchmarks.is_empty() {
                let label = raw.group.as_deref().unwrap_or("<unnamed>");
                return Err(Error::InvalidSpec(format!(
                    "branch {} has an empty benchmarks list",
                    label
                )));
            }
            return Ok(BenchmarkSpec::Branch(BenchmarkBranch {
                group: raw.group,
                benchmarks,
            }));
        }

        let name = raw
            .name
            .ok_or_else(|| Error::InvalidSpec("benchmark is missing 'name'".to_string()))?;
        let workload = raw.workload.ok_or_else(|| {
            Error::InvalidSpec(format!("benchmark {} is missing 'workload'", name))
        })?;
        let command = raw.command.ok_or_else(|| {
            Error::InvalidSpec(format!("benchmark {} is missing 'command'", name))
        })?;

        let env = raw
            .env
            .into_iter()
            .map(|(k, v)| (k, scalar_to_string(v)))
            .collect();

        Ok(BenchmarkSpec::Leaf(BenchmarkLeaf {
            name,
            workload,
            command,
            env,
        }))
    }
}

impl From<BenchmarkSpec> for RawBenchmark {
    fn from(spec: BenchmarkSpec) -> Self {
        match spec {
            BenchmarkSpec::Leaf(leaf) => RawBenchmark {
                name: Some(leaf.name),
                workload: Some(leaf.workload),
                command: Some(leaf.command),
                env: leaf
                    .env
                    .into_iter()
                    .map(|(k, v)| (k, serde_json::Value::String(v)))
                    .collect(),
                ..Default::default()
            },
            BenchmarkSpec::Branch(branch) => RawBenchmark {
                group: branch.group,
                benchmarks: Some(branch.benchmarks),
                ..Default::default()
            },
        }
    }
}

/// Environment values are passed to shell scripts, so scalars are
/// stringified the way a YAML author would expect.
pub fn scalar_to_string(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

impl BenchmarkSpec {
    /// Parse a benchmark list out of a task-variable value.
    pub fn parse_list(value: &serde_json::Value) -> Result<Vec<BenchmarkSpec>> {
        let list: Vec<BenchmarkSpec> = serde_json::from_value(value.clone())
            .map_err(|e| Error::InvalidSpec(e.to_string()))?;
        Ok(list)
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, BenchmarkSpec::Leaf(_))
    }

    /// Number of leaves below and including this node.
    pub fn leaf_count(&self) -> usize {
        match self {
            BenchmarkSpec::Leaf(_) => 1,
            BenchmarkSpec::Branch(branch) => branch.benchmarks.iter().map(Self::leaf_count).sum(),
        }
    }

    /// Number of labelled branches below and including this node.
    pub fn group_count(&self) -> usize {
        match self {
            BenchmarkSpec::Leaf(_) => 0,
            BenchmarkSpec::Branch(branch) => {
                let own = usize::from(branch.group.is_some());
                own + branch.benchmarks.iter().map(Self::group_count).sum::<usize>()
            }
        }
    }

    /// Nesting depth; a leaf has depth 0.
    pub fn depth(&self) -> usize {
        match self {
            BenchmarkSpec::Leaf(_) => 0,
            BenchmarkSpec::Branch(branch) => {
                1 + branch.benchmarks.iter().map(Self::depth).max().unwrap_or(0)
            }
        }
    }
}
