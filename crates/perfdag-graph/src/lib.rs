//! Benchmark workflow construction.
//!
//! Secrets and task variables are read once by the async `load`
//! constructors; expansion, indexing and chaining afterwards are pure and
//! synchronous.

pub mod benchmarks;
pub mod builder;
pub mod context;
pub mod factory;
pub mod indexer;
pub mod installer;
pub mod render;
pub mod workflow;

pub use benchmarks::{BenchmarkPlan, DEFAULT_TASK_GROUP, E2EBenchmarks};
pub use builder::{GraphBuilder, MAX_DEPTH};
pub use context::{BuildContext, DagSettings, HostEnv};
pub use factory::{BenchmarkEnv, UnitFactory};
pub use indexer::{StatusIndexer, attach_indexers};
pub use installer::{BaremetalInstaller, InstallPlan, Operation};
pub use workflow::{GraphError, UnitRef, UnitTree, Workflow, WorkflowExport};
