//! Plain-text views of a built workflow.

use crate::workflow::{GraphError, UnitRef, UnitTree, Workflow};
use std::fmt::Write;

const INDENT: &str = "  ";

/// Indented outline of `trees`, one line per group and per unit.
///
/// Groups print as `label/`, unlabelled sequences as `-`.
pub fn render_trees(workflow: &Workflow, trees: &[UnitTree<UnitRef>]) -> String {
    let mut out = String::new();
    for tree in trees {
        render_node(workflow, tree, 0, &mut out);
    }
    out
}

fn render_node(workflow: &Workflow, tree: &UnitTree<UnitRef>, depth: usize, out: &mut String) {
    let pad = INDENT.repeat(depth);
    match tree {
        UnitTree::Unit(unit) => {
            let id = workflow
                .unit(*unit)
                .map(|u| u.id.to_string())
                .unwrap_or_else(|| "?".to_string());
            let _ = writeln!(out, "{}{} #{}", pad, id, unit.index());
        }
        UnitTree::Group { label, children } => {
            let _ = writeln!(out, "{}{}/", pad, label);
            for child in children {
                render_node(workflow, child, depth + 1, out);
            }
        }
        UnitTree::Sequence(children) => {
            let _ = writeln!(out, "{}-", pad);
            for child in children {
                render_node(workflow, child, depth + 1, out);
            }
        }
    }
}

/// Every unit in dependency order with its downstream units.
pub fn render_edges(workflow: &Workflow) -> Result<String, GraphError> {
    let mut out = String::new();
    for unit_ref in workflow.topological_order()? {
        let Some(unit) = workflow.unit(unit_ref) else {
            continue;
        };
        let group = unit
            .group
            .as_deref()
            .map(|g| format!(" [{}]", g))
            .unwrap_or_default();
        let _ = writeln!(out, "#{} {}{}", unit_ref.index(), unit.id, group);
        for next in workflow.successors(unit_ref) {
            if let Some(downstream) = workflow.unit(next) {
                let _ = writeln!(out, "{}-> #{} {}", INDENT, next.index(), downstream.id);
            }
        }
    }
    Ok(out)
}
