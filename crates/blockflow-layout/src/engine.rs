use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use blockflow_graph::{Block, BlockGraph, NodeId, Scope};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::LayoutConfig;
use crate::geometry::{Position, Size};

/// Placement of one node. `position` is relative to the enclosing container,
/// or absolute for top-level nodes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeLayout {
  pub position: Position,
  pub size: Size,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Layout {
  pub nodes: BTreeMap<NodeId, NodeLayout>,
  /// Nodes that are not drawn, such as those on inactive branches.
  pub hidden: BTreeSet<NodeId>,
  /// Bounding box of the top-level chain.
  pub width: f64,
  pub height: f64,
}

impl Layout {
  pub fn get(&self, id: &str) -> Option<&NodeLayout> {
    self.nodes.get(id)
  }

  pub fn is_hidden(&self, id: &str) -> bool {
    self.hidden.contains(id)
  }
}

/// Computes node positions for a block graph.
///
/// Chains are stacked top to bottom and centered on their widest node.
/// Containers are sized bottom-up to fit the body they show.
#[derive(Debug, Clone, Default)]
pub struct LayoutEngine {
  config: LayoutConfig,
}

impl LayoutEngine {
  pub fn new(config: LayoutConfig) -> Self {
    Self { config }
  }

  pub fn config(&self) -> &LayoutConfig {
    &self.config
  }

  /// Lay out `graph` using measured node sizes where available.
  pub fn layout(&self, graph: &BlockGraph, sizes: &HashMap<NodeId, Size>) -> Layout {
    let mut pass = Pass {
      graph,
      sizes,
      config: &self.config,
      placed: BTreeMap::new(),
      entered: HashSet::new(),
    };
    let (extent, _) = pass.scope(&Scope::root());

    let hidden: BTreeSet<NodeId> = graph
      .nodes()
      .iter()
      .filter(|n| !pass.placed.contains_key(&n.id))
      .map(|n| n.id.clone())
      .collect();

    debug!(
      placed = pass.placed.len(),
      hidden = hidden.len(),
      width = extent.width,
      height = extent.height,
      "computed layout"
    );

    Layout {
      nodes: pass.placed,
      hidden,
      width: extent.width,
      height: extent.height,
    }
  }
}

struct Pass<'a> {
  graph: &'a BlockGraph,
  sizes: &'a HashMap<NodeId, Size>,
  config: &'a LayoutConfig,
  placed: BTreeMap<NodeId, NodeLayout>,
  entered: HashSet<NodeId>,
}

impl Pass<'_> {
  /// Lay out one chain with its first node at the origin. Returns the chain's
  /// bounding box and the ids placed directly in it.
  fn scope(&mut self, scope: &Scope) -> (Size, Vec<NodeId>) {
    let mut members = Vec::new();
    for id in self.graph.chain(scope) {
      if !self.entered.insert(id.clone()) {
        continue;
      }
      let size = self.extent(&id);
      members.push((id, size));
    }

    let widest = members
      .iter()
      .map(|(_, size)| size.width)
      .fold(0.0_f64, f64::max);

    let mut y = 0.0;
    for (id, size) in &members {
      let position = Position::new((widest - size.width) / 2.0, y);
      self.placed.insert(
        id.clone(),
        NodeLayout {
          position,
          size: *size,
        },
      );
      y += size.height + self.config.spacing;
    }
    let height = if members.is_empty() {
      0.0
    } else {
      y - self.config.spacing
    };

    (
      Size::new(widest, height),
      members.into_iter().map(|(id, _)| id).collect(),
    )
  }

  /// Extent of a node, laying out its visible body first when it has one.
  fn extent(&mut self, id: &str) -> Size {
    let node = self.graph.node(id);
    let measured = self.sizes.get(id).copied().unwrap_or_else(|| {
      if node.is_some_and(|n| n.as_block().is_some()) {
        self.config.default_block_size
      } else {
        self.config.marker_size
      }
    });

    let body = match node.and_then(|n| n.as_block()).map(|b| &b.block) {
      Some(Block::Loop(_)) => Scope::body(id),
      Some(Block::Conditional(c)) => Scope::branch(id, c.active_branch_id.as_str()),
      _ => return measured,
    };

    let (inner, members) = self.scope(&body);
    let size = Size::new(
      measured.width.max(inner.width + 2.0 * self.config.margin_x),
      measured
        .height
        .max(inner.height + self.config.margin_top + self.config.margin_bottom),
    );

    let offset_x = (size.width - inner.width) / 2.0;
    for member in members {
      if let Some(placed) = self.placed.get_mut(&member) {
        placed.position.x += offset_x;
        placed.position.y += self.config.margin_top;
      }
    }
    size
  }
}
