//! Structural edits over the block graph.
//!
//! Every operation consumes a graph value and returns the edited graph. They
//! are total: an edit that names an unknown node, or an anchor that does not
//! describe a valid position, returns the graph unchanged. The checks run
//! before any mutation, so a half-applied edit is never observable.

use std::collections::HashSet;

use blockflow_config::Branch;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::edge::{BranchTag, Edge, EdgeKind};
use crate::graph::{BlockGraph, Scope};
use crate::label::LabelAllocator;
use crate::node::{Block, BlockKind, BlockNode, Node, NodeId, NodeKind};
use crate::references::{prune_dangling_references, prune_references, rewrite_references};

/// Where a new block attaches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anchor {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub previous_id: Option<NodeId>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub next_id: Option<NodeId>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub parent_id: Option<NodeId>,
  /// Branch of `parent_id` when the parent is a conditional.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub branch_id: Option<String>,
}

impl Anchor {
  pub fn between(previous_id: impl Into<NodeId>, next_id: impl Into<NodeId>) -> Self {
    Self {
      previous_id: Some(previous_id.into()),
      next_id: Some(next_id.into()),
      ..Default::default()
    }
  }

  pub fn inside(mut self, parent_id: impl Into<NodeId>) -> Self {
    self.parent_id = Some(parent_id.into());
    self
  }

  pub fn in_branch(mut self, parent_id: impl Into<NodeId>, branch_id: impl Into<String>) -> Self {
    self.parent_id = Some(parent_id.into());
    self.branch_id = Some(branch_id.into());
    self
  }

  fn scope(&self) -> Scope {
    match (&self.parent_id, &self.branch_id) {
      (Some(parent), Some(branch)) => Scope::branch(parent.clone(), branch.clone()),
      (Some(parent), None) => Scope::body(parent.clone()),
      (None, _) => Scope::root(),
    }
  }

  fn tag(&self) -> Option<BranchTag> {
    match (&self.parent_id, &self.branch_id) {
      (Some(parent), Some(branch)) => Some(BranchTag {
        conditional_id: parent.clone(),
        branch_id: branch.clone(),
      }),
      _ => None,
    }
  }
}

/// Anchor for a bulk import, optionally overriding the kind of the edges
/// leading into each imported block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertionPoint {
  #[serde(flatten)]
  pub anchor: Anchor,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub edge_kind: Option<EdgeKind>,
}

/// A block captured by an external recorder, not yet labelled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedBlock {
  pub block: Block,
  #[serde(default)]
  pub continue_on_failure: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub model: Option<String>,
}

impl From<Block> for RecordedBlock {
  fn from(block: Block) -> Self {
    Self {
      block,
      continue_on_failure: false,
      model: None,
    }
  }
}

/// Applies structural edits to block graphs.
#[derive(Debug, Clone, Default)]
pub struct GraphEditor {
  labels: LabelAllocator,
}

impl GraphEditor {
  pub fn new(labels: LabelAllocator) -> Self {
    Self { labels }
  }

  /// The allocator used for fresh labels.
  pub fn labels(&self) -> &LabelAllocator {
    &self.labels
  }

  /// Insert a default block of `kind` at `anchor`.
  ///
  /// Returns the id of the new block, or `None` when the anchor was rejected.
  pub fn add_node(
    &self,
    graph: BlockGraph,
    kind: BlockKind,
    anchor: &Anchor,
  ) -> (BlockGraph, Option<NodeId>) {
    if !anchor_is_valid(&graph, anchor) {
      debug!(?anchor, %kind, "ignoring add_node with invalid anchor");
      return (graph, None);
    }

    let mut graph = graph;
    let label = self.labels.generate(&graph.labels());
    let id = splice(
      &mut graph,
      BlockNode::new(label, Block::default_for(kind)),
      anchor,
      None,
    );
    (graph, Some(id))
  }

  /// Delete a block together with everything nested inside it.
  ///
  /// Incoming edges from outside the removed set are retargeted to the
  /// block's successor and take the successor edge's kind.
  pub fn delete_node(&self, graph: BlockGraph, id: &str) -> BlockGraph {
    let Some(node) = graph.node(id) else {
      debug!(node_id = %id, "ignoring delete of unknown node");
      return graph;
    };
    if node.as_block().is_none() {
      debug!(node_id = %id, "ignoring delete of a marker node");
      return graph;
    }

    let mut removed: HashSet<NodeId> = graph
      .descendants(id)
      .unwrap_or_default()
      .into_iter()
      .collect();
    removed.insert(id.to_string());

    let removed_labels: Vec<String> = graph
      .nodes()
      .iter()
      .filter(|n| removed.contains(&n.id))
      .filter_map(|n| n.label().map(str::to_string))
      .collect();

    let successor = graph
      .edges_from(id)
      .find(|e| !removed.contains(&e.target))
      .map(|e| (e.target.clone(), e.kind));

    let mut graph = graph;
    if let Some((target, kind)) = successor {
      for edge in graph.edges_mut() {
        if edge.target == id && !removed.contains(&edge.source) {
          edge.target = target.clone();
          edge.kind = kind;
        }
      }
    }
    graph.remove_nodes(&removed);

    for label in &removed_labels {
      graph = prune_references(graph, label);
    }

    debug!(node_id = %id, removed = removed.len(), "deleted node");

    if graph.is_empty_state() {
      return BlockGraph::empty_state();
    }
    graph
  }

  /// Replace a block with a default block of `kind`, keeping only its id and
  /// parent. The label and every other attribute are discarded.
  pub fn retype_node(&self, graph: BlockGraph, id: &str, kind: BlockKind) -> BlockGraph {
    let Some(node) = graph.node(id) else {
      debug!(node_id = %id, "ignoring retype of unknown node");
      return graph;
    };
    let Some(old) = node.as_block() else {
      debug!(node_id = %id, "ignoring retype of a marker node");
      return graph;
    };

    let parent_id = node.parent_id.clone();
    let mut stale_labels = vec![old.label.clone()];
    let descendants: HashSet<NodeId> = graph
      .descendants(id)
      .unwrap_or_default()
      .into_iter()
      .collect();
    stale_labels.extend(
      graph
        .nodes()
        .iter()
        .filter(|n| descendants.contains(&n.id))
        .filter_map(|n| n.label().map(str::to_string)),
    );

    let mut graph = graph;
    let label = self.labels.generate(&graph.labels());
    graph.remove_nodes(&descendants);

    let block = Block::default_for(kind);
    if kind.is_container() {
      synthesize_body(&mut graph, id, &block);
    }
    graph.replace_node(Node {
      id: id.to_string(),
      parent_id,
      kind: NodeKind::Block(BlockNode::new(label, block)),
    });

    for label in &stale_labels {
      graph = prune_references(graph, label);
    }
    graph
  }

  /// Insert externally recorded blocks, in order, at `point`.
  ///
  /// Each block gets a fresh label; labels handed out earlier in the same
  /// import count as taken.
  pub fn import_recorded_blocks(
    &self,
    graph: BlockGraph,
    blocks: Vec<RecordedBlock>,
    point: &InsertionPoint,
  ) -> (BlockGraph, Vec<NodeId>) {
    if blocks.is_empty() || !anchor_is_valid(&graph, &point.anchor) {
      debug!(anchor = ?point.anchor, count = blocks.len(), "ignoring recorded block import");
      return (graph, Vec::new());
    }

    let mut graph = graph;
    let mut batch = self.labels.batch(graph.labels());
    let mut previous = point.anchor.previous_id.clone();
    let mut created = Vec::with_capacity(blocks.len());

    for recorded in blocks {
      let anchor = Anchor {
        previous_id: previous.take(),
        ..point.anchor.clone()
      };
      let node = BlockNode {
        label: batch.allocate(),
        continue_on_failure: recorded.continue_on_failure,
        model: recorded.model,
        block: recorded.block,
      };
      let id = splice(&mut graph, node, &anchor, point.edge_kind);
      previous = Some(id.clone());
      created.push(id);
    }

    let graph = prune_dangling_references(graph);
    debug!(count = created.len(), "imported recorded blocks");
    (graph, created)
  }

  /// Show exactly one branch of a conditional.
  pub fn set_active_branch(
    &self,
    graph: BlockGraph,
    conditional_id: &str,
    branch_id: &str,
  ) -> BlockGraph {
    let declared = graph
      .node(conditional_id)
      .and_then(|n| n.conditional())
      .is_some_and(|c| c.has_branch(branch_id));
    if !declared {
      debug!(%conditional_id, %branch_id, "ignoring activation of unknown branch");
      return graph;
    }

    let mut graph = graph;
    if let Some(Block::Conditional(c)) = graph
      .node_mut(conditional_id)
      .and_then(|n| n.as_block_mut())
      .map(|b| &mut b.block)
    {
      c.active_branch_id = branch_id.to_string();
    }
    for edge in graph.edges_mut() {
      if let Some(tag) = &edge.branch {
        if tag.conditional_id == conditional_id {
          edge.hidden = tag.branch_id != branch_id;
        }
      }
    }
    graph
  }

  /// Append a branch to a conditional, with an empty chain.
  pub fn add_branch(&self, graph: BlockGraph, conditional_id: &str, branch: Branch) -> BlockGraph {
    let accepted = graph
      .node(conditional_id)
      .and_then(|n| n.conditional())
      .is_some_and(|c| !c.has_branch(&branch.branch_id));
    let start = graph.start_marker(Some(conditional_id)).map(|n| n.id.clone());
    let marker = graph
      .insertion_marker(Some(conditional_id))
      .map(|n| n.id.clone());
    let (true, Some(start), Some(marker)) = (accepted, start, marker) else {
      debug!(%conditional_id, branch_id = %branch.branch_id, "ignoring add_branch");
      return graph;
    };

    let mut graph = graph;
    let tag = BranchTag {
      conditional_id: conditional_id.to_string(),
      branch_id: branch.branch_id.clone(),
    };
    if let Some(Block::Conditional(c)) = graph
      .node_mut(conditional_id)
      .and_then(|n| n.as_block_mut())
      .map(|b| &mut b.block)
    {
      c.branches.push(branch);
    }
    graph.push_edge(Edge::tagged(start, marker, tag, true));
    graph
  }

  /// Remove a branch and every block on it. The last branch cannot be removed.
  pub fn remove_branch(&self, graph: BlockGraph, conditional_id: &str, branch_id: &str) -> BlockGraph {
    let removable = graph
      .node(conditional_id)
      .and_then(|n| n.conditional())
      .is_some_and(|c| c.has_branch(branch_id) && c.branches.len() > 1);
    if !removable {
      debug!(%conditional_id, %branch_id, "ignoring remove_branch");
      return graph;
    }

    let on_branch: Vec<NodeId> = graph
      .chain(&Scope::branch(conditional_id, branch_id))
      .into_iter()
      .filter(|id| graph.node(id).is_some_and(|n| n.as_block().is_some()))
      .collect();

    let mut graph = graph;
    for id in on_branch {
      graph = self.delete_node(graph, &id);
    }
    graph.retain_edges(|e| !e.in_branch(conditional_id, branch_id));

    let mut fallback = None;
    if let Some(Block::Conditional(c)) = graph
      .node_mut(conditional_id)
      .and_then(|n| n.as_block_mut())
      .map(|b| &mut b.block)
    {
      c.branches.retain(|b| b.branch_id != branch_id);
      if c.active_branch_id == branch_id {
        fallback = c.branches.first().map(|b| b.branch_id.clone());
      }
    }
    match fallback {
      Some(first) => self.set_active_branch(graph, conditional_id, &first),
      None => graph,
    }
  }

  /// Replace a block's attributes with a value of the same kind.
  ///
  /// A conditional must keep its branch ids; the active branch is preserved.
  /// References to labels that do not exist are cleared.
  pub fn update_block(&self, graph: BlockGraph, id: &str, block: Block) -> BlockGraph {
    let Some(current) = graph.node(id).and_then(|n| n.as_block()) else {
      debug!(node_id = %id, "ignoring update of unknown block");
      return graph;
    };
    if current.block.kind() != block.kind() {
      debug!(node_id = %id, from = %current.block.kind(), to = %block.kind(), "ignoring update that changes kind");
      return graph;
    }

    let mut block = block;
    if let (Block::Conditional(old), Block::Conditional(new)) = (&current.block, &mut block) {
      let old_ids: Vec<&str> = old.branches.iter().map(|b| b.branch_id.as_str()).collect();
      let new_ids: Vec<&str> = new.branches.iter().map(|b| b.branch_id.as_str()).collect();
      if old_ids != new_ids {
        debug!(node_id = %id, "ignoring update that restructures branches");
        return graph;
      }
      new.active_branch_id = old.active_branch_id.clone();
    }

    let mut graph = graph;
    if let Some(target) = graph.node_mut(id).and_then(|n| n.as_block_mut()) {
      target.block = block;
    }
    prune_dangling_references(graph)
  }

  /// Rename a block and repoint references to it.
  pub fn relabel(&self, graph: BlockGraph, id: &str, label: &str) -> BlockGraph {
    let label = label.trim();
    let Some(old) = graph.node(id).and_then(|n| n.label()).map(str::to_string) else {
      debug!(node_id = %id, "ignoring relabel of unknown block");
      return graph;
    };
    if label.is_empty() || old == label {
      return graph;
    }
    if graph.find_by_label(label).is_some() {
      debug!(node_id = %id, %label, "ignoring relabel to a taken label");
      return graph;
    }

    let mut graph = graph;
    if let Some(block) = graph.node_mut(id).and_then(|n| n.as_block_mut()) {
      block.label = label.to_string();
    }
    rewrite_references(graph, &old, label)
  }

  /// Set whether the workflow keeps running when this block fails.
  pub fn set_continue_on_failure(&self, mut graph: BlockGraph, id: &str, value: bool) -> BlockGraph {
    if let Some(block) = graph.node_mut(id).and_then(|n| n.as_block_mut()) {
      block.continue_on_failure = value;
    }
    graph
  }

  /// Set or clear the model override of a block.
  pub fn set_model(&self, mut graph: BlockGraph, id: &str, model: Option<String>) -> BlockGraph {
    if let Some(block) = graph.node_mut(id).and_then(|n| n.as_block_mut()) {
      block.model = model;
    }
    graph
  }
}

/// Check that an anchor names a real position in one chain.
///
/// With both ends given, the edge `previous -> next` must exist in the
/// anchor's scope. With one end given, it must be the open end of its chain.
fn anchor_is_valid(graph: &BlockGraph, anchor: &Anchor) -> bool {
  match (&anchor.parent_id, &anchor.branch_id) {
    (None, Some(_)) => return false,
    (Some(parent), branch) => {
      let Some(container) = graph.node(parent).and_then(|n| n.as_block()) else {
        return false;
      };
      match (&container.block, branch) {
        (Block::Loop(_), None) => {}
        (Block::Conditional(c), Some(branch)) if c.has_branch(branch) => {}
        _ => return false,
      }
    }
    (None, None) => {}
  }

  let same_parent = [&anchor.previous_id, &anchor.next_id]
    .into_iter()
    .flatten()
    .all(|id| {
      graph
        .node(id)
        .is_some_and(|n| n.parent_id == anchor.parent_id)
    });
  if !same_parent {
    return false;
  }

  let scope = anchor.scope();
  let chain = graph.chain(&scope);
  let on_chain = |id: &NodeId| chain.contains(id);

  match (&anchor.previous_id, &anchor.next_id) {
    (Some(previous), Some(next)) => {
      let tag = anchor.tag();
      on_chain(previous)
        && on_chain(next)
        && graph
          .edges_from(previous)
          .any(|e| e.target == *next && e.branch == tag)
    }
    (Some(previous), None) => {
      on_chain(previous)
        && !graph.node(previous).is_some_and(Node::is_insertion_marker)
        && !graph.edges_from(previous).any(|e| scope.admits(e))
    }
    (None, Some(next)) => {
      on_chain(next)
        && !graph.node(next).is_some_and(Node::is_start)
        && !graph.edges_to(next).any(|e| scope.admits(e))
    }
    (None, None) => false,
  }
}

/// Kind of a freshly created edge into `target`.
fn edge_kind_into(graph: &BlockGraph, target: &str, tag: &Option<BranchTag>) -> EdgeKind {
  if tag.is_some() {
    EdgeKind::Branch
  } else if graph.node(target).is_some_and(|n| n.is_insertion_marker()) {
    EdgeKind::Plain
  } else {
    EdgeKind::Insertable
  }
}

/// Place `block` between the anchor's previous and next nodes.
fn splice(
  graph: &mut BlockGraph,
  block: BlockNode,
  anchor: &Anchor,
  edge_kind: Option<EdgeKind>,
) -> NodeId {
  let tag = anchor.tag();
  let hidden = tag.as_ref().is_some_and(|t| {
    graph
      .node(&t.conditional_id)
      .and_then(|n| n.conditional())
      .is_some_and(|c| c.active_branch_id != t.branch_id)
  });

  if let (Some(previous), Some(next)) = (&anchor.previous_id, &anchor.next_id) {
    graph.retain_edges(|e| !(e.source == *previous && e.target == *next && e.branch == tag));
  }

  let is_container = block.block.kind().is_container();
  let contents = is_container.then(|| block.block.clone());
  let node = Node::block(anchor.parent_id.clone(), block);
  let id = node.id.clone();
  graph.push_node(node);

  if let Some(contents) = contents {
    synthesize_body(graph, &id, &contents);
  }

  if let Some(previous) = &anchor.previous_id {
    let kind = edge_kind.unwrap_or_else(|| edge_kind_into(graph, &id, &tag));
    graph.push_edge(Edge {
      branch: tag.clone(),
      hidden,
      ..Edge::new(previous.clone(), id.clone(), kind)
    });
  }
  if let Some(next) = &anchor.next_id {
    let kind = edge_kind_into(graph, next, &tag);
    graph.push_edge(Edge {
      branch: tag.clone(),
      hidden,
      ..Edge::new(id.clone(), next.clone(), kind)
    });
  }

  id
}

/// Create the start and insertion markers of a container body.
fn synthesize_body(graph: &mut BlockGraph, container_id: &str, block: &Block) {
  let start = Node::start(Some(container_id.to_string()));
  let marker = Node::insertion_marker(Some(container_id.to_string()));
  let (start_id, marker_id) = (start.id.clone(), marker.id.clone());
  graph.push_node(start);
  graph.push_node(marker);

  match block {
    Block::Loop(_) => graph.push_edge(Edge::new(start_id, marker_id, EdgeKind::Plain)),
    Block::Conditional(c) => {
      for branch in &c.branches {
        let tag = BranchTag {
          conditional_id: container_id.to_string(),
          branch_id: branch.branch_id.clone(),
        };
        let hidden = branch.branch_id != c.active_branch_id;
        graph.push_edge(Edge::tagged(start_id.clone(), marker_id.clone(), tag, hidden));
      }
    }
    _ => {}
  }
}
