use std::collections::{HashMap, HashSet};

use blockflow_config::ParameterDescriptor;

use crate::graph::BlockGraph;
use crate::node::{Block, Node};
use crate::registry::KeyRef;

/// Check a graph against the workflow parameters.
///
/// Returns human-readable messages in a stable order: parameter problems,
/// then per-node problems in topological order, then edge problems. An empty
/// result means the graph can be exported.
pub fn validate(graph: &BlockGraph, parameters: &[ParameterDescriptor]) -> Vec<String> {
  let mut messages = Vec::new();

  let mut parameter_keys = HashSet::new();
  for parameter in parameters {
    if !parameter_keys.insert(parameter.key()) {
      messages.push(format!("duplicate parameter key '{}'", parameter.key()));
    }
  }

  let labels = graph.labels();
  let mut seen_labels = HashSet::new();
  for id in graph.topological_order() {
    let Some(node) = graph.node(&id) else {
      continue;
    };
    check_parent(graph, node, &mut messages);

    let Some(block) = node.as_block() else {
      continue;
    };
    let name = if block.label.trim().is_empty() {
      messages.push(format!("block {} has an empty label", node.id));
      node.id.as_str()
    } else {
      block.label.as_str()
    };
    if !block.label.trim().is_empty() && !seen_labels.insert(block.label.as_str()) {
      messages.push(format!("duplicate label '{}'", block.label));
    }

    for field in block.block.missing_required_fields() {
      messages.push(format!("{name}: required field '{field}' is empty"));
    }

    for (field, key) in block.block.references() {
      match key {
        KeyRef::Output(label) if !labels.contains(label) => {
          messages.push(format!("{name}: {field} references unknown block '{label}'"));
        }
        KeyRef::Label(label) if !labels.contains(label) => {
          messages.push(format!("{name}: {field} names unknown block '{label}'"));
        }
        KeyRef::Parameter(key) if !parameter_keys.contains(key) => {
          messages.push(format!("{name}: {field} references unknown parameter '{key}'"));
        }
        _ => {}
      }
    }

    if let Block::Conditional(conditional) = &block.block {
      if conditional.branches.is_empty() {
        messages.push(format!("{name}: conditional has no branches"));
      }
      let mut branch_ids = HashSet::new();
      for branch in &conditional.branches {
        if !branch_ids.insert(branch.branch_id.as_str()) {
          messages.push(format!("{name}: duplicate branch '{}'", branch.branch_id));
        }
      }
      if !conditional.has_branch(&conditional.active_branch_id) {
        messages.push(format!(
          "{name}: active branch '{}' is not declared",
          conditional.active_branch_id
        ));
      }
    }

    if !in_own_chain(graph, node) {
      messages.push(format!("{name}: block is not connected to its chain"));
    }
  }

  check_edges(graph, &mut messages);

  if has_cycle(graph) {
    messages.push("sequential edges form a cycle".to_string());
  }

  messages
}

fn check_parent(graph: &BlockGraph, node: &Node, messages: &mut Vec<String>) {
  let Some(parent) = &node.parent_id else {
    return;
  };
  if !graph.node(parent).is_some_and(Node::is_container) {
    messages.push(format!(
      "node {} has parent {parent} which is not a loop or conditional",
      node.id
    ));
  }
}

fn in_own_chain(graph: &BlockGraph, node: &Node) -> bool {
  graph
    .scope_of(&node.id)
    .is_some_and(|scope| graph.chain(&scope).contains(&node.id))
}

fn check_edges(graph: &BlockGraph, messages: &mut Vec<String>) {
  for edge in graph.edges() {
    if !graph.contains(&edge.source) || !graph.contains(&edge.target) {
      messages.push(format!("edge {} connects an unknown node", edge.id));
      continue;
    }
    let Some(tag) = &edge.branch else {
      continue;
    };
    match graph.node(&tag.conditional_id).and_then(Node::conditional) {
      Some(conditional) if conditional.has_branch(&tag.branch_id) => {
        let active = conditional.active_branch_id == tag.branch_id;
        if edge.hidden == active {
          messages.push(format!(
            "edge {} visibility does not match the active branch",
            edge.id
          ));
        }
      }
      _ => messages.push(format!(
        "edge {} is tagged with undeclared branch '{}' of {}",
        edge.id, tag.branch_id, tag.conditional_id
      )),
    }
  }
}

/// Detect a cycle over sequential edges using DFS coloring.
fn has_cycle(graph: &BlockGraph) -> bool {
  #[derive(Clone, Copy, PartialEq)]
  enum Color {
    White,
    Gray,
    Black,
  }

  let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
  for edge in graph.edges() {
    adjacency
      .entry(edge.source.as_str())
      .or_default()
      .push(edge.target.as_str());
  }

  fn dfs<'a>(
    node: &'a str,
    adjacency: &HashMap<&'a str, Vec<&'a str>>,
    color: &mut HashMap<&'a str, Color>,
  ) -> bool {
    color.insert(node, Color::Gray);
    if let Some(neighbors) = adjacency.get(node) {
      for &neighbor in neighbors {
        match color.get(neighbor).copied().unwrap_or(Color::White) {
          Color::Gray => return true,
          Color::White => {
            if dfs(neighbor, adjacency, color) {
              return true;
            }
          }
          Color::Black => {}
        }
      }
    }
    color.insert(node, Color::Black);
    false
  }

  let mut color: HashMap<&str, Color> = HashMap::new();
  for node in graph.nodes() {
    let id = node.id.as_str();
    if color.get(id).is_none() && dfs(id, &adjacency, &mut color) {
      return true;
    }
  }
  false
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::edge::{BranchTag, Edge, EdgeKind};
  use crate::editor::{Anchor, GraphEditor};
  use crate::node::{BlockKind, BlockNode};
  use blockflow_config::{CodeBlock, LoopBlock, TaskBlock, WorkflowParameterType};

  fn task(label: &str, keys: &[&str]) -> Node {
    Node::block(
      None,
      BlockNode::new(
        label,
        Block::Task(TaskBlock {
          navigation_goal: "go".to_string(),
          parameter_keys: keys.iter().map(|k| k.to_string()).collect(),
          ..Default::default()
        }),
      ),
    )
  }

  /// start -> nodes... -> marker
  fn linear(nodes: Vec<Node>) -> BlockGraph {
    let mut all = vec![Node::start(None)];
    all.extend(nodes);
    all.push(Node::insertion_marker(None));
    let edges = all
      .windows(2)
      .map(|w| Edge::new(w[0].id.clone(), w[1].id.clone(), EdgeKind::Insertable))
      .collect();
    BlockGraph::from_parts(all, edges)
  }

  fn param(key: &str) -> ParameterDescriptor {
    ParameterDescriptor::Workflow {
      key: key.to_string(),
      description: None,
      workflow_parameter_type: WorkflowParameterType::String,
      default_value: None,
    }
  }

  #[test]
  fn test_valid_graph_has_no_messages() {
    let graph = linear(vec![task("a", &["url"]), task("b", &["a_output"])]);
    assert!(validate(&graph, &[param("url")]).is_empty());
    assert!(validate(&BlockGraph::empty_state(), &[]).is_empty());
  }

  #[test]
  fn test_reports_duplicate_labels_and_parameters() {
    let graph = linear(vec![task("a", &[]), task("a", &[])]);
    let messages = validate(&graph, &[param("url"), param("url")]);
    assert_eq!(
      messages,
      vec![
        "duplicate parameter key 'url'".to_string(),
        "duplicate label 'a'".to_string(),
      ]
    );
  }

  #[test]
  fn test_reports_missing_fields_and_unknown_references() {
    let code = Node::block(
      None,
      BlockNode::new(
        "run",
        Block::Code(CodeBlock {
          code: String::new(),
          parameter_keys: vec!["ghost_output".to_string(), "secret".to_string()],
        }),
      ),
    );
    let messages = validate(&linear(vec![code]), &[]);
    assert_eq!(
      messages,
      vec![
        "run: required field 'code' is empty".to_string(),
        "run: parameter_keys[0] references unknown block 'ghost'".to_string(),
        "run: parameter_keys[1] references unknown parameter 'secret'".to_string(),
      ]
    );
  }

  #[test]
  fn test_reports_cycles() {
    let a = task("a", &[]);
    let b = task("b", &[]);
    let edges = vec![
      Edge::new(a.id.clone(), b.id.clone(), EdgeKind::Insertable),
      Edge::new(b.id.clone(), a.id.clone(), EdgeKind::Insertable),
    ];
    let graph = BlockGraph::from_parts(vec![a, b], edges);
    let messages = validate(&graph, &[]);
    assert!(messages.contains(&"sequential edges form a cycle".to_string()));
  }

  #[test]
  fn test_reports_bad_parent() {
    let a = task("a", &[]);
    let mut child = task("child", &[]);
    child.parent_id = Some(a.id.clone());
    let child_id = child.id.clone();
    let graph = linear(vec![a.clone(), child]);

    let messages = validate(&graph, &[]);
    assert!(messages.contains(&format!(
      "node {child_id} has parent {} which is not a loop or conditional",
      a.id
    )));
  }

  #[test]
  fn test_reports_undeclared_branch_tags() {
    let editor = GraphEditor::default();
    let graph = BlockGraph::empty_state();
    let start = graph.start_marker(None).unwrap().id.clone();
    let marker = graph.insertion_marker(None).unwrap().id.clone();
    let (graph, cond) = editor.add_node(graph, BlockKind::Conditional, &Anchor::between(start, marker));
    let cond = cond.unwrap();

    let (mut nodes, mut edges) = graph.into_parts();
    let inner_start = nodes
      .iter()
      .find(|n| n.parent_id.as_deref() == Some(cond.as_str()) && n.is_start())
      .unwrap()
      .id
      .clone();
    let inner_marker = nodes
      .iter()
      .find(|n| n.parent_id.as_deref() == Some(cond.as_str()) && n.is_insertion_marker())
      .unwrap()
      .id
      .clone();
    let tag = BranchTag {
      conditional_id: cond.clone(),
      branch_id: "branch_9".to_string(),
    };
    let stray = Edge::tagged(inner_start, inner_marker, tag, true);
    let stray_id = stray.id.clone();
    edges.push(stray);
    for node in &mut nodes {
      if let crate::node::NodeKind::Block(block) = &mut node.kind {
        if let Block::Conditional(c) = &mut block.block {
          c.branches[0].expression = Some("x".to_string());
        }
      }
    }
    let graph = BlockGraph::from_parts(nodes, edges);

    let messages = validate(&graph, &[]);
    assert_eq!(
      messages,
      vec![format!(
        "edge {stray_id} is tagged with undeclared branch 'branch_9' of {cond}"
      )]
    );
  }

  #[test]
  fn test_loop_without_source_is_reported() {
    let lp = Node::block(
      None,
      BlockNode::new(
        "lp",
        Block::Loop(LoopBlock {
          loop_over: None,
          complete_if_empty: false,
        }),
      ),
    );
    let messages = validate(&linear(vec![lp]), &[]);
    assert_eq!(messages, vec!["lp: required field 'loop_over' is empty".to_string()]);
  }

  #[test]
  fn test_reports_disconnected_block() {
    let graph = linear(vec![task("a", &[])]);
    let (mut nodes, edges) = graph.into_parts();
    nodes.push(task("orphan", &[]));
    let graph = BlockGraph::from_parts(nodes, edges);

    assert_eq!(
      validate(&graph, &[]),
      vec!["orphan: block is not connected to its chain".to_string()]
    );
  }
}
