//! Cross-block output references.
//!
//! A block refers to another block's output by holding the key
//! `<label>_output` in one of its reference-bearing fields (see
//! [`Block::references`](crate::Block::references)). Conditional merge labels
//! name a block directly and are tracked the same way.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::graph::BlockGraph;
use crate::node::NodeId;
use crate::registry::FieldPath;

/// Label -> every (node, field) that refers to it.
pub type ReferenceMap = BTreeMap<String, BTreeSet<(NodeId, FieldPath)>>;

/// A reference naming a label that no block carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingReference {
  pub label: String,
  pub node_id: NodeId,
  pub field: FieldPath,
}

pub fn scan_references(graph: &BlockGraph) -> ReferenceMap {
  let mut map = ReferenceMap::new();
  for node in graph.nodes() {
    let Some(block) = node.as_block() else {
      continue;
    };
    for (field, key) in block.block.references() {
      if let Some(label) = key.label() {
        map
          .entry(label.to_string())
          .or_default()
          .insert((node.id.clone(), field));
      }
    }
  }
  map
}

/// Clear every field that refers to `removed_label`.
///
/// Nodes are never removed; pruning a label nobody refers to is a no-op.
pub fn prune_references(mut graph: BlockGraph, removed_label: &str) -> BlockGraph {
  let referrers: BTreeSet<NodeId> = scan_references(&graph)
    .remove(removed_label)
    .unwrap_or_default()
    .into_iter()
    .map(|(id, _)| id)
    .collect();

  for id in referrers {
    if let Some(block) = graph.node_mut(&id).and_then(|n| n.as_block_mut()) {
      if block.block.clear_label_references(removed_label) {
        debug!(node_id = %id, label = %removed_label, "cleared reference to removed block");
      }
    }
  }
  graph
}

/// Clear every reference whose label is not in the graph.
pub fn prune_dangling_references(mut graph: BlockGraph) -> BlockGraph {
  let labels = graph.labels();
  let referrers: BTreeSet<NodeId> = dangling_references(&graph)
    .into_iter()
    .map(|d| d.node_id)
    .collect();

  for id in referrers {
    if let Some(block) = graph.node_mut(&id).and_then(|n| n.as_block_mut()) {
      block.block.retain_labels(|l| labels.contains(l));
    }
  }
  graph
}

/// Repoint references from `old_label` to `new_label`.
pub fn rewrite_references(mut graph: BlockGraph, old_label: &str, new_label: &str) -> BlockGraph {
  let referrers: BTreeSet<NodeId> = scan_references(&graph)
    .remove(old_label)
    .unwrap_or_default()
    .into_iter()
    .map(|(id, _)| id)
    .collect();

  for id in referrers {
    if let Some(block) = graph.node_mut(&id).and_then(|n| n.as_block_mut()) {
      block.block.rename_label_references(old_label, new_label);
    }
  }
  graph
}

pub fn dangling_references(graph: &BlockGraph) -> Vec<DanglingReference> {
  let labels = graph.labels();
  let mut dangling = Vec::new();
  for id in graph.topological_order() {
    let Some(block) = graph.node(&id).and_then(|n| n.as_block()) else {
      continue;
    };
    for (field, key) in block.block.references() {
      if let Some(label) = key.label().filter(|l| !labels.contains(*l)) {
        dangling.push(DanglingReference {
          label: label.to_string(),
          node_id: id.clone(),
          field,
        });
      }
    }
  }
  dangling
}
