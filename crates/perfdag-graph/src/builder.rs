//! Recursive benchmark graph builder.
//!
//! Turns the benchmark tree into a tree of units of the same shape:
//! leaves become units, labelled branches become groups and unlabelled
//! branches become sequences. Nothing is registered here; the caller
//! hands the result to [`crate::Workflow::add_tree`].

use crate::factory::UnitFactory;
use crate::workflow::UnitTree;
use perfdag_core::spec::BenchmarkSpec;
use perfdag_core::unit::ExecutionUnit;
use perfdag_core::{Error, Result};
use tracing::debug;

/// Deepest branch nesting accepted from configuration.
pub const MAX_DEPTH: usize = 32;

pub struct GraphBuilder<'a> {
    factory: &'a UnitFactory,
    max_depth: usize,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(factory: &'a UnitFactory) -> Self {
        Self {
            factory,
            max_depth: MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Expand `nodes` depth-first, keeping sibling order.
    pub fn expand(&self, nodes: &[BenchmarkSpec]) -> Result<Vec<UnitTree<ExecutionUnit>>> {
        self.expand_at(nodes, 0, "benchmarks", None)
    }

    fn expand_at(
        &self,
        nodes: &[BenchmarkSpec],
        depth: usize,
        path: &str,
        group: Option<&str>,
    ) -> Result<Vec<UnitTree<ExecutionUnit>>> {
        if depth > self.max_depth {
            return Err(Error::Structure {
                path: path.to_string(),
                reason: format!("nesting deeper than {} levels", self.max_depth),
            });
        }

        let mut out = Vec::with_capacity(nodes.len());
        for (index, node) in nodes.iter().enumerate() {
            let node_path = format!("{}[{}]", path, index);
            let expanded = match node {
                BenchmarkSpec::Leaf(leaf) => UnitTree::Unit(self.factory.build_leaf(leaf, group)),
                BenchmarkSpec::Branch(branch) => {
                    if branch.benchmarks.is_empty() {
                        return Err(Error::Structure {
                            path: node_path,
                            reason: "empty benchmarks list".to_string(),
                        });
                    }
                    let child_path = format!("{}.benchmarks", node_path);
                    match &branch.group {
                        Some(label) => {
                            debug!(group = %label, depth, "Opening benchmark group");
                            let children = self.expand_at(
                                &branch.benchmarks,
                                depth + 1,
                                &child_path,
                                Some(label.as_str()),
                            )?;
                            UnitTree::Group {
                                label: label.clone(),
                                children,
                            }
                        }
                        // No scope of its own: children stay in the parent's group.
                        None => UnitTree::Sequence(self.expand_at(
                            &branch.benchmarks,
                            depth + 1,
                            &child_path,
                            group,
                        )?),
                    }
                }
            };
            out.push(expanded);
        }
        Ok(out)
    }
}
