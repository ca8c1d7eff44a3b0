use blockflow_config::Branch;
use blockflow_graph::{
  Anchor, Block, BlockGraph, BlockKind, GraphEditor, InsertionPoint, NodeId, RecordedBlock,
};
use serde::{Deserialize, Serialize};

/// One user edit, as sent by a canvas or replayed from a script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum EditCommand {
  AddNode {
    kind: BlockKind,
    #[serde(default)]
    anchor: Anchor,
  },
  DeleteNode {
    id: NodeId,
  },
  RetypeNode {
    id: NodeId,
    kind: BlockKind,
  },
  ImportRecordedBlocks {
    blocks: Vec<RecordedBlock>,
    #[serde(default)]
    at: InsertionPoint,
  },
  SetActiveBranch {
    conditional_id: NodeId,
    branch_id: String,
  },
  AddBranch {
    conditional_id: NodeId,
    branch: Branch,
  },
  RemoveBranch {
    conditional_id: NodeId,
    branch_id: String,
  },
  UpdateBlock {
    id: NodeId,
    block: Block,
  },
  Relabel {
    id: NodeId,
    label: String,
  },
  SetContinueOnFailure {
    id: NodeId,
    value: bool,
  },
  SetModel {
    id: NodeId,
    #[serde(default)]
    model: Option<String>,
  },
}

impl EditCommand {
  pub fn name(&self) -> &'static str {
    match self {
      EditCommand::AddNode { .. } => "add_node",
      EditCommand::DeleteNode { .. } => "delete_node",
      EditCommand::RetypeNode { .. } => "retype_node",
      EditCommand::ImportRecordedBlocks { .. } => "import_recorded_blocks",
      EditCommand::SetActiveBranch { .. } => "set_active_branch",
      EditCommand::AddBranch { .. } => "add_branch",
      EditCommand::RemoveBranch { .. } => "remove_branch",
      EditCommand::UpdateBlock { .. } => "update_block",
      EditCommand::Relabel { .. } => "relabel",
      EditCommand::SetContinueOnFailure { .. } => "set_continue_on_failure",
      EditCommand::SetModel { .. } => "set_model",
    }
  }
}

/// Result of applying an [`EditCommand`].
#[derive(Debug, Clone)]
pub struct EditOutcome {
  pub graph: BlockGraph,
  /// Blocks created by the edit, in chain order.
  pub created: Vec<NodeId>,
  /// Whether the edit changed the graph, so its layout must be recomputed.
  pub layout_stale: bool,
}

/// Apply a command with `editor`. Rejected commands return the graph unchanged.
pub fn apply_edit(editor: &GraphEditor, graph: BlockGraph, command: EditCommand) -> EditOutcome {
  let before = graph.clone();
  let mut created = Vec::new();
  let graph = match command {
    EditCommand::AddNode { kind, anchor } => {
      let (graph, id) = editor.add_node(graph, kind, &anchor);
      created.extend(id);
      graph
    }
    EditCommand::DeleteNode { id } => editor.delete_node(graph, &id),
    EditCommand::RetypeNode { id, kind } => editor.retype_node(graph, &id, kind),
    EditCommand::ImportRecordedBlocks { blocks, at } => {
      let (graph, ids) = editor.import_recorded_blocks(graph, blocks, &at);
      created = ids;
      graph
    }
    EditCommand::SetActiveBranch {
      conditional_id,
      branch_id,
    } => editor.set_active_branch(graph, &conditional_id, &branch_id),
    EditCommand::AddBranch {
      conditional_id,
      branch,
    } => editor.add_branch(graph, &conditional_id, branch),
    EditCommand::RemoveBranch {
      conditional_id,
      branch_id,
    } => editor.remove_branch(graph, &conditional_id, &branch_id),
    EditCommand::UpdateBlock { id, block } => editor.update_block(graph, &id, block),
    EditCommand::Relabel { id, label } => editor.relabel(graph, &id, &label),
    EditCommand::SetContinueOnFailure { id, value } => {
      editor.set_continue_on_failure(graph, &id, value)
    }
    EditCommand::SetModel { id, model } => editor.set_model(graph, &id, model),
  };

  let layout_stale = graph != before;
  EditOutcome {
    graph,
    created,
    layout_stale,
  }
}
