use serde::{Deserialize, Serialize};

use crate::node::NodeId;

/// Visual flavour of a sequential edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
  /// Edge into an insertion marker.
  Plain,
  /// Edge between two blocks that offers an "insert here" affordance.
  Insertable,
  /// Edge inside one branch of a conditional.
  Branch,
}

/// Identifies the conditional branch an edge belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BranchTag {
  pub conditional_id: NodeId,
  pub branch_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
  pub id: String,
  pub source: NodeId,
  pub target: NodeId,
  pub kind: EdgeKind,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub branch: Option<BranchTag>,
  pub hidden: bool,
}

impl Edge {
  pub fn new(source: impl Into<NodeId>, target: impl Into<NodeId>, kind: EdgeKind) -> Self {
    Self {
      id: uuid::Uuid::new_v4().to_string(),
      source: source.into(),
      target: target.into(),
      kind,
      branch: None,
      hidden: false,
    }
  }

  /// A branch edge; hidden unless its branch is the active one.
  pub fn tagged(
    source: impl Into<NodeId>,
    target: impl Into<NodeId>,
    tag: BranchTag,
    hidden: bool,
  ) -> Self {
    Self {
      branch: Some(tag),
      hidden,
      ..Self::new(source, target, EdgeKind::Branch)
    }
  }

  pub fn touches(&self, node_id: &str) -> bool {
    self.source == node_id || self.target == node_id
  }

  pub fn in_branch(&self, conditional_id: &str, branch_id: &str) -> bool {
    self
      .branch
      .as_ref()
      .is_some_and(|t| t.conditional_id == conditional_id && t.branch_id == branch_id)
  }
}
