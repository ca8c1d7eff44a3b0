use std::collections::{HashMap, HashSet, VecDeque};

use crate::edge::{Edge, EdgeKind};
use crate::error::GraphError;
use crate::node::{Block, Node, NodeId};

/// One chain of the graph: the top level, a loop body, or a conditional branch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Scope {
  pub parent_id: Option<NodeId>,
  pub branch_id: Option<String>,
}

impl Scope {
  pub fn root() -> Self {
    Self {
      parent_id: None,
      branch_id: None,
    }
  }

  pub fn body(parent_id: impl Into<NodeId>) -> Self {
    Self {
      parent_id: Some(parent_id.into()),
      branch_id: None,
    }
  }

  pub fn branch(parent_id: impl Into<NodeId>, branch_id: impl Into<String>) -> Self {
    Self {
      parent_id: Some(parent_id.into()),
      branch_id: Some(branch_id.into()),
    }
  }

  pub(crate) fn admits(&self, edge: &Edge) -> bool {
    match (&self.parent_id, &self.branch_id) {
      (Some(parent), Some(branch)) => edge.in_branch(parent, branch),
      _ => edge.branch.is_none(),
    }
  }
}

/// The block graph: an arena of nodes plus sequential edges.
///
/// Nodes keep their insertion order. The id index and the parent -> children
/// index are derived and rebuilt after every mutation.
#[derive(Debug, Clone, Default)]
pub struct BlockGraph {
  nodes: Vec<Node>,
  edges: Vec<Edge>,
  index: HashMap<NodeId, usize>,
  children: HashMap<NodeId, Vec<NodeId>>,
}

impl PartialEq for BlockGraph {
  fn eq(&self, other: &Self) -> bool {
    self.nodes == other.nodes && self.edges == other.edges
  }
}

impl BlockGraph {
  /// A graph with no nodes at all.
  pub fn new() -> Self {
    Self::default()
  }

  /// The canonical empty workflow: a start marker followed by an insertion marker.
  pub fn empty_state() -> Self {
    let start = Node::start(None);
    let marker = Node::insertion_marker(None);
    let edge = Edge::new(start.id.clone(), marker.id.clone(), EdgeKind::Plain);
    Self::from_parts(vec![start, marker], vec![edge])
  }

  /// Rebuild a graph from persisted nodes and edges.
  pub fn from_parts(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
    let mut graph = Self {
      nodes,
      edges,
      index: HashMap::new(),
      children: HashMap::new(),
    };
    graph.reindex();
    graph
  }

  pub fn into_parts(self) -> (Vec<Node>, Vec<Edge>) {
    (self.nodes, self.edges)
  }

  fn reindex(&mut self) {
    self.index = self
      .nodes
      .iter()
      .enumerate()
      .map(|(i, n)| (n.id.clone(), i))
      .collect();

    self.children.clear();
    for node in &self.nodes {
      if let Some(parent) = &node.parent_id {
        self
          .children
          .entry(parent.clone())
          .or_default()
          .push(node.id.clone());
      }
    }
  }

  /// Every node, in insertion order.
  pub fn nodes(&self) -> &[Node] {
    &self.nodes
  }

  /// Every sequential edge, hidden ones included.
  pub fn edges(&self) -> &[Edge] {
    &self.edges
  }

  /// Number of nodes, markers included.
  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  /// Whether a node with this id exists.
  pub fn contains(&self, id: &str) -> bool {
    self.index.contains_key(id)
  }

  /// Look up a node by id.
  pub fn node(&self, id: &str) -> Option<&Node> {
    self.index.get(id).map(|&i| &self.nodes[i])
  }

  /// Like [`node`](Self::node), failing with [`GraphError::NotFound`].
  pub fn get_node(&self, id: &str) -> Result<&Node, GraphError> {
    self
      .node(id)
      .ok_or_else(|| GraphError::NotFound(id.to_string()))
  }

  /// Direct children of a container, in arena order.
  pub fn children(&self, parent_id: &str) -> Result<Vec<&Node>, GraphError> {
    self.get_node(parent_id)?;
    Ok(
      self
        .children
        .get(parent_id)
        .map(|ids| ids.iter().filter_map(|id| self.node(id)).collect())
        .unwrap_or_default(),
    )
  }

  /// Transitive closure of `children`, breadth first.
  pub fn descendants(&self, id: &str) -> Result<Vec<NodeId>, GraphError> {
    self.get_node(id)?;

    let mut result = Vec::new();
    let mut queue: VecDeque<&str> = VecDeque::from([id]);
    while let Some(current) = queue.pop_front() {
      if let Some(children) = self.children.get(current) {
        for child in children {
          result.push(child.clone());
          queue.push_back(child);
        }
      }
    }
    Ok(result)
  }

  /// Outgoing edges of a node, across every branch.
  pub fn edges_from<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
    self.edges.iter().filter(move |e| e.source == id)
  }

  /// Incoming edges of a node, across every branch.
  pub fn edges_to<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
    self.edges.iter().filter(move |e| e.target == id)
  }

  /// All block labels currently in the graph.
  pub fn labels(&self) -> HashSet<String> {
    self
      .nodes
      .iter()
      .filter_map(|n| n.label().map(str::to_string))
      .collect()
  }

  /// The block carrying `label`, if any.
  pub fn find_by_label(&self, label: &str) -> Option<&Node> {
    self.nodes.iter().find(|n| n.label() == Some(label))
  }

  /// Whether any user block exists.
  pub fn has_blocks(&self) -> bool {
    self.nodes.iter().any(|n| n.as_block().is_some())
  }

  /// Whether the graph holds only markers (or nothing).
  pub fn is_empty_state(&self) -> bool {
    !self.has_blocks()
  }

  fn scope_nodes<'a>(&'a self, parent_id: Option<&'a str>) -> impl Iterator<Item = &'a Node> + 'a {
    self
      .nodes
      .iter()
      .filter(move |n| n.parent_id.as_deref() == parent_id)
  }

  /// The start marker of the top-level chain (`None`) or of a container body.
  pub fn start_marker(&self, parent_id: Option<&str>) -> Option<&Node> {
    self
      .nodes
      .iter()
      .find(|n| n.parent_id.as_deref() == parent_id && n.is_start())
  }

  /// The insertion marker of the top-level chain (`None`) or of a container body.
  pub fn insertion_marker(&self, parent_id: Option<&str>) -> Option<&Node> {
    self
      .nodes
      .iter()
      .find(|n| n.parent_id.as_deref() == parent_id && n.is_insertion_marker())
  }

  /// Node ids of one chain, in sequence order.
  ///
  /// The walk begins at the scope's start marker (or, failing that, the first
  /// node of the scope without an incoming in-scope edge) and follows the
  /// scope's edges until it runs out of successors.
  pub fn chain(&self, scope: &Scope) -> Vec<NodeId> {
    let parent = scope.parent_id.as_deref();
    let head = self.start_marker(parent).or_else(|| {
      self.scope_nodes(parent).find(|n| {
        !self.edges_to(&n.id).any(|e| {
          scope.admits(e)
            && self
              .node(&e.source)
              .is_some_and(|s| s.parent_id.as_deref() == parent)
        })
      })
    });

    let mut chain = Vec::new();
    let mut seen = HashSet::new();
    let mut current = head.map(|n| n.id.as_str());
    while let Some(id) = current {
      if !seen.insert(id) {
        break;
      }
      chain.push(id.to_string());
      current = self
        .edges_from(id)
        .find(|e| scope.admits(e))
        .map(|e| e.target.as_str());
    }
    chain
  }

  /// Depth-first order over the whole graph.
  ///
  /// Each container is followed by its body (every branch of a conditional in
  /// declaration order). Nodes not reachable from the top-level chain come last
  /// in arena order.
  pub fn topological_order(&self) -> Vec<NodeId> {
    let mut order = Vec::with_capacity(self.nodes.len());
    let mut seen = HashSet::new();
    self.walk(&Scope::root(), &mut order, &mut seen);

    for node in &self.nodes {
      if seen.insert(node.id.clone()) {
        order.push(node.id.clone());
      }
    }
    order
  }

  fn walk(&self, scope: &Scope, order: &mut Vec<NodeId>, seen: &mut HashSet<NodeId>) {
    for id in self.chain(scope) {
      if !seen.insert(id.clone()) {
        continue;
      }
      order.push(id.clone());

      match self.node(&id).and_then(|n| n.as_block()).map(|b| &b.block) {
        Some(Block::Loop(_)) => self.walk(&Scope::body(id.as_str()), order, seen),
        Some(Block::Conditional(c)) => {
          for branch in &c.branches {
            self.walk(
              &Scope::branch(id.as_str(), branch.branch_id.as_str()),
              order,
              seen,
            );
          }
        }
        _ => {}
      }
    }
  }

  /// The scope whose chain holds `id`.
  pub fn scope_of(&self, id: &str) -> Option<Scope> {
    let node = self.node(id)?;
    let Some(parent) = node.parent_id.as_deref() else {
      return Some(Scope::root());
    };
    let container = self.node(parent)?;
    match container.conditional() {
      Some(conditional) => conditional
        .branches
        .iter()
        .map(|b| Scope::branch(parent, b.branch_id.as_str()))
        .find(|scope| self.chain(scope).iter().any(|n| n == id)),
      None => Some(Scope::body(parent)),
    }
  }

  pub(crate) fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
    self.index.get(id).map(|&i| &mut self.nodes[i])
  }

  pub(crate) fn edges_mut(&mut self) -> &mut [Edge] {
    &mut self.edges
  }

  pub(crate) fn push_node(&mut self, node: Node) {
    self.nodes.push(node);
    self.reindex();
  }

  pub(crate) fn push_edge(&mut self, edge: Edge) {
    self.edges.push(edge);
  }

  pub(crate) fn retain_edges(&mut self, keep: impl FnMut(&Edge) -> bool) {
    self.edges.retain(keep);
  }

  /// Swap the node with the same id in place.
  pub(crate) fn replace_node(&mut self, node: Node) {
    if let Some(&i) = self.index.get(&node.id) {
      self.nodes[i] = node;
      self.reindex();
    }
  }

  /// Remove nodes and every edge touching them.
  pub(crate) fn remove_nodes(&mut self, ids: &HashSet<NodeId>) {
    self.nodes.retain(|n| !ids.contains(&n.id));
    self
      .edges
      .retain(|e| !ids.contains(&e.source) && !ids.contains(&e.target));
    self.reindex();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::edge::BranchTag;
  use crate::node::{BlockKind, BlockNode};

  fn block(label: &str, parent: Option<&str>, kind: BlockKind) -> Node {
    Node::block(
      parent.map(str::to_string),
      BlockNode::new(label, Block::default_for(kind)),
    )
  }

  /// start -> a -> loop[start -> inner -> marker] -> marker
  fn sample_graph() -> (BlockGraph, Vec<NodeId>) {
    let start = Node::start(None);
    let a = block("a", None, BlockKind::Task);
    let lp = block("lp", None, BlockKind::Loop);
    let loop_start = Node::start(Some(lp.id.clone()));
    let inner = block("inner", Some(&lp.id), BlockKind::Code);
    let loop_marker = Node::insertion_marker(Some(lp.id.clone()));
    let marker = Node::insertion_marker(None);

    let edges = vec![
      Edge::new(start.id.clone(), a.id.clone(), EdgeKind::Insertable),
      Edge::new(a.id.clone(), lp.id.clone(), EdgeKind::Insertable),
      Edge::new(lp.id.clone(), marker.id.clone(), EdgeKind::Plain),
      Edge::new(loop_start.id.clone(), inner.id.clone(), EdgeKind::Insertable),
      Edge::new(inner.id.clone(), loop_marker.id.clone(), EdgeKind::Plain),
    ];
    let ids = vec![
      start.id.clone(),
      a.id.clone(),
      lp.id.clone(),
      loop_start.id.clone(),
      inner.id.clone(),
      loop_marker.id.clone(),
      marker.id.clone(),
    ];
    let nodes = vec![start, marker, inner, loop_marker, a, loop_start, lp];
    (BlockGraph::from_parts(nodes, edges), ids)
  }

  #[test]
  fn test_empty_graph_queries() {
    let graph = BlockGraph::new();
    assert!(graph.topological_order().is_empty());
    assert!(graph.chain(&Scope::root()).is_empty());
    assert!(graph.labels().is_empty());
    assert!(graph.is_empty_state());
  }

  #[test]
  fn test_unknown_ids_are_not_found() {
    let graph = BlockGraph::empty_state();
    assert_eq!(
      graph.get_node("missing").unwrap_err(),
      GraphError::NotFound("missing".to_string())
    );
    assert!(graph.children("missing").is_err());
    assert!(graph.descendants("missing").is_err());
  }

  #[test]
  fn test_empty_state_shape() {
    let graph = BlockGraph::empty_state();
    assert_eq!(graph.len(), 2);
    assert_eq!(graph.edges().len(), 1);
    assert_eq!(graph.edges()[0].kind, EdgeKind::Plain);
    assert!(graph.start_marker(None).is_some());
    assert!(graph.insertion_marker(None).is_some());
  }

  #[test]
  fn test_marker_lookup_outlives_parent_id() {
    let (graph, ids) = sample_graph();
    let (start, marker) = {
      let lp = ids[2].clone();
      (graph.start_marker(Some(&lp)), graph.insertion_marker(Some(&lp)))
    };
    assert_eq!(start.map(|n| n.id.as_str()), Some(ids[3].as_str()));
    assert_eq!(marker.map(|n| n.id.as_str()), Some(ids[5].as_str()));
    assert_eq!(graph.start_marker(None).map(|n| n.id.as_str()), Some(ids[0].as_str()));
    assert!(graph.start_marker(Some(&ids[1])).is_none());
  }

  #[test]
  fn test_topological_order_descends_into_bodies() {
    let (graph, ids) = sample_graph();
    assert_eq!(graph.topological_order(), ids);
  }

  #[test]
  fn test_children_and_descendants() {
    let (graph, ids) = sample_graph();
    let lp = &ids[2];

    let children: Vec<&str> = graph
      .children(lp)
      .unwrap()
      .iter()
      .map(|n| n.id.as_str())
      .collect();
    assert_eq!(children, vec![ids[4].as_str(), ids[5].as_str(), ids[3].as_str()]);
    assert_eq!(graph.descendants(lp).unwrap().len(), 3);
    assert!(graph.descendants(&ids[1]).unwrap().is_empty());
  }

  #[test]
  fn test_chain_follows_branch_tags() {
    let cond = block("cond", None, BlockKind::Conditional);
    let start = Node::start(Some(cond.id.clone()));
    let marker = Node::insertion_marker(Some(cond.id.clone()));
    let inner = block("inner", Some(&cond.id), BlockKind::Wait);
    let tag = |b: &str| BranchTag {
      conditional_id: cond.id.clone(),
      branch_id: b.to_string(),
    };
    let edges = vec![
      Edge::tagged(start.id.clone(), inner.id.clone(), tag("branch_1"), false),
      Edge::tagged(inner.id.clone(), marker.id.clone(), tag("branch_1"), false),
      Edge::tagged(start.id.clone(), marker.id.clone(), tag("branch_2"), true),
    ];
    let graph = BlockGraph::from_parts(
      vec![cond.clone(), start.clone(), marker.clone(), inner.clone()],
      edges,
    );

    assert_eq!(
      graph.chain(&Scope::branch(cond.id.as_str(), "branch_1")),
      vec![start.id.clone(), inner.id.clone(), marker.id.clone()]
    );
    assert_eq!(
      graph.chain(&Scope::branch(cond.id.as_str(), "branch_2")),
      vec![start.id.clone(), marker.id.clone()]
    );
    assert_eq!(
      graph.scope_of(&inner.id),
      Some(Scope::branch(cond.id.as_str(), "branch_1"))
    );
  }

  #[test]
  fn test_unreachable_nodes_are_appended() {
    let (graph, _) = sample_graph();
    let (mut nodes, edges) = graph.into_parts();
    let orphan = block("orphan", None, BlockKind::Wait);
    let orphan_id = orphan.id.clone();
    nodes.push(orphan);
    let graph = BlockGraph::from_parts(nodes, edges);

    assert_eq!(graph.topological_order().last(), Some(&orphan_id));
  }
}
