//! Workflow graph handed to the scheduler.
//!
//! Units live in a petgraph DAG; edges mean "upstream must finish before
//! downstream is considered". Unit ids are labels and may repeat, so
//! units are addressed by [`UnitRef`].

use chrono::{DateTime, Utc};
use perfdag_core::unit::ExecutionUnit;
use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Cycle detected in unit dependencies")]
    CycleDetected,
    #[error("Unknown unit reference: {0}")]
    UnknownUnit(usize),
}

impl From<GraphError> for perfdag_core::Error {
    fn from(err: GraphError) -> Self {
        perfdag_core::Error::Graph(err.to_string())
    }
}

/// Handle to a unit registered in a [`Workflow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitRef(NodeIndex);

impl UnitRef {
    pub fn index(&self) -> usize {
        self.0.index()
    }
}

/// Output of graph building; mirrors the benchmark tree it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitTree<T> {
    Unit(T),
    /// A labelled branch.
    Group { label: String, children: Vec<UnitTree<T>> },
    /// An unlabelled branch.
    Sequence(Vec<UnitTree<T>>),
}

impl<T> UnitTree<T> {
    /// Leaves in depth-first, pre-order.
    pub fn leaves(&self) -> Vec<&T> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a T>) {
        match self {
            UnitTree::Unit(unit) => out.push(unit),
            UnitTree::Group { children, .. } | UnitTree::Sequence(children) => {
                for child in children {
                    child.collect_leaves(out);
                }
            }
        }
    }

    pub fn leaf_count(&self) -> usize {
        match self {
            UnitTree::Unit(_) => 1,
            UnitTree::Group { children, .. } | UnitTree::Sequence(children) => {
                children.iter().map(UnitTree::leaf_count).sum()
            }
        }
    }

    /// Same shape, every leaf passed through `f` in pre-order.
    pub fn map<U, F>(self, f: &mut F) -> UnitTree<U>
    where
        F: FnMut(T) -> U,
    {
        match self {
            UnitTree::Unit(unit) => UnitTree::Unit(f(unit)),
            UnitTree::Group { label, children } => UnitTree::Group {
                label,
                children: children.into_iter().map(|c| c.map(&mut *f)).collect(),
            },
            UnitTree::Sequence(children) => {
                UnitTree::Sequence(children.into_iter().map(|c| c.map(&mut *f)).collect())
            }
        }
    }
}

impl UnitTree<UnitRef> {
    /// Copy of the leaf refs, in order.
    pub fn refs(&self) -> Vec<UnitRef> {
        self.leaves().into_iter().copied().collect()
    }
}

/// Directed acyclic graph of execution units.
#[derive(Debug, Default)]
pub struct Workflow {
    name: String,
    graph: DiGraph<ExecutionUnit, ()>,
}

impl Workflow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            graph: DiGraph::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_unit(&mut self, unit: ExecutionUnit) -> UnitRef {
        debug!(unit = %unit.id, group = ?unit.group, "Registering unit");
        UnitRef(self.graph.add_node(unit))
    }

    /// Register every leaf of `tree`, keeping its shape.
    pub fn add_tree(&mut self, tree: UnitTree<ExecutionUnit>) -> UnitTree<UnitRef> {
        tree.map(&mut |unit| self.add_unit(unit))
    }

    pub fn unit(&self, unit: UnitRef) -> Option<&ExecutionUnit> {
        self.graph.node_weight(unit.0)
    }

    fn check(&self, unit: UnitRef) -> Result<(), GraphError> {
        if unit.index() < self.graph.node_count() {
            Ok(())
        } else {
            Err(GraphError::UnknownUnit(unit.index()))
        }
    }

    /// `upstream >> downstream`. Adding an existing edge is a no-op.
    pub fn depend(&mut self, upstream: UnitRef, downstream: UnitRef) -> Result<(), GraphError> {
        self.check(upstream)?;
        self.check(downstream)?;
        self.graph.update_edge(upstream.0, downstream.0, ());
        debug!(
            upstream = upstream.index(),
            downstream = downstream.index(),
            "Registered dependency"
        );
        Ok(())
    }

    /// Chain stages: every unit of stage `i` precedes every unit of stage `i + 1`.
    ///
    /// Adjacent multi-unit stages are joined all-to-all, not pairwise, so
    /// stages of different lengths are accepted.
    pub fn chain(&mut self, stages: &[Vec<UnitRef>]) -> Result<(), GraphError> {
        for pair in stages.windows(2) {
            for &upstream in &pair[0] {
                for &downstream in &pair[1] {
                    self.depend(upstream, downstream)?;
                }
            }
        }
        Ok(())
    }

    /// Units with no upstream.
    pub fn roots(&self) -> Vec<UnitRef> {
        self.graph
            .node_indices()
            .filter(|&idx| {
                self.graph
                    .neighbors_directed(idx, Direction::Incoming)
                    .next()
                    .is_none()
            })
            .map(UnitRef)
            .collect()
    }

    pub fn successors(&self, unit: UnitRef) -> Vec<UnitRef> {
        let mut out: Vec<UnitRef> = self
            .graph
            .neighbors_directed(unit.0, Direction::Outgoing)
            .map(UnitRef)
            .collect();
        out.sort();
        out
    }

    pub fn predecessors(&self, unit: UnitRef) -> Vec<UnitRef> {
        let mut out: Vec<UnitRef> = self
            .graph
            .neighbors_directed(unit.0, Direction::Incoming)
            .map(UnitRef)
            .collect();
        out.sort();
        out
    }

    pub fn topological_order(&self) -> Result<Vec<UnitRef>, GraphError> {
        toposort(&self.graph, None)
            .map(|indices| indices.into_iter().map(UnitRef).collect())
            .map_err(|_| GraphError::CycleDetected)
    }

    /// All units in registration order.
    pub fn units(&self) -> Vec<(UnitRef, &ExecutionUnit)> {
        self.graph
            .node_indices()
            .filter_map(|idx| self.graph.node_weight(idx).map(|u| (UnitRef(idx), u)))
            .collect()
    }

    /// Refs of every unit labelled `id`.
    pub fn find(&self, id: &str) -> Vec<UnitRef> {
        self.units()
            .into_iter()
            .filter(|(_, unit)| unit.id.as_str() == id)
            .map(|(r, _)| r)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Serializable snapshot; fails if the graph is not acyclic.
    pub fn export(&self) -> Result<WorkflowExport, GraphError> {
        self.topological_order()?;

        let units = self
            .units()
            .into_iter()
            .map(|(r, unit)| ExportedUnit {
                index: r.index(),
                unit: unit.clone(),
            })
            .collect();

        let mut edges: Vec<(usize, usize)> = self
            .graph
            .edge_references()
            .map(|e| (e.source().index(), e.target().index()))
            .collect();
        edges.sort();

        Ok(WorkflowExport {
            name: self.name.clone(),
            generated_at: Utc::now(),
            units,
            edges,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportedUnit {
    pub index: usize,
    #[serde(flatten)]
    pub unit: ExecutionUnit,
}

/// Units and `(upstream, downstream)` edges by unit index.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowExport {
    pub name: String,
    pub generated_at: DateTime<Utc>,
    pub units: Vec<ExportedUnit>,
    pub edges: Vec<(usize, usize)>,
}
