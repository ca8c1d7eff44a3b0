use blockflow_config::{
  BlockBody, BlockDescriptor, BranchDescriptor, CURRENT_VERSION, ParameterDescriptor,
  WorkflowDefinition,
};
use blockflow_graph::{Block, BlockGraph, BlockNode, Scope, validate};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ExportError;
use crate::parameters::reconcile_parameters;

/// Definition fields that do not live in the graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DefinitionMeta {
  pub title: String,
  #[serde(default)]
  pub parameters: Vec<ParameterDescriptor>,
}

impl DefinitionMeta {
  pub fn new(title: impl Into<String>) -> Self {
    Self {
      title: title.into(),
      parameters: Vec::new(),
    }
  }
}

/// Serialize a graph into a portable definition at the current version.
///
/// Refused in full when the graph has any validation problem.
pub fn export(graph: &BlockGraph, meta: &DefinitionMeta) -> Result<WorkflowDefinition, ExportError> {
  let parameters = reconcile_parameters(graph, &meta.parameters);

  let messages = validate(graph, &parameters);
  if !messages.is_empty() {
    debug!(problems = messages.len(), "refusing to export invalid graph");
    return Err(ExportError::Invalid { messages });
  }

  Ok(WorkflowDefinition {
    version: CURRENT_VERSION,
    title: meta.title.clone(),
    parameters,
    blocks: descriptors(graph, &Scope::root()),
  })
}

fn descriptors(graph: &BlockGraph, scope: &Scope) -> Vec<BlockDescriptor> {
  graph
    .chain(scope)
    .iter()
    .filter_map(|id| graph.node(id))
    .filter_map(|node| node.as_block().map(|block| descriptor(graph, &node.id, block)))
    .collect()
}

fn descriptor(graph: &BlockGraph, id: &str, node: &BlockNode) -> BlockDescriptor {
  let body = match &node.block {
    Block::Task(b) => BlockBody::Task(b.clone()),
    Block::Loop(b) => BlockBody::Loop {
      attributes: b.clone(),
      children: descriptors(graph, &Scope::body(id)),
    },
    Block::Conditional(c) => BlockBody::Conditional {
      branches: c
        .branches
        .iter()
        .map(|branch| BranchDescriptor {
          branch: branch.clone(),
          children: descriptors(graph, &Scope::branch(id, branch.branch_id.as_str())),
        })
        .collect(),
    },
    Block::Code(b) => BlockBody::Code(b.clone()),
    Block::TextPrompt(b) => BlockBody::TextPrompt(b.clone()),
    Block::HttpRequest(b) => BlockBody::HttpRequest(b.clone()),
    Block::Extraction(b) => BlockBody::Extraction(b.clone()),
    Block::FileDownload(b) => BlockBody::FileDownload(b.clone()),
    Block::Login(b) => BlockBody::Login(b.clone()),
    Block::SendEmail(b) => BlockBody::SendEmail(b.clone()),
    Block::Wait(b) => BlockBody::Wait(b.clone()),
    Block::GotoUrl(b) => BlockBody::GotoUrl(b.clone()),
    Block::PdfParser(b) => BlockBody::PdfParser(b.clone()),
    Block::FileParser(b) => BlockBody::FileParser(b.clone()),
    Block::Validation(b) => BlockBody::Validation(b.clone()),
  };

  BlockDescriptor {
    label: node.label.clone(),
    continue_on_failure: node.continue_on_failure,
    model: node.model.clone(),
    body,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use blockflow_config::{GotoUrlBlock, LoopBlock};
  use blockflow_graph::{Anchor, BlockKind, GraphEditor};

  fn append(graph: BlockGraph, kind: BlockKind) -> (BlockGraph, String) {
    let marker = graph.insertion_marker(None).unwrap().id.clone();
    let previous = graph.edges_to(&marker).next().unwrap().source.clone();
    let (graph, id) = GraphEditor::default().add_node(graph, kind, &Anchor::between(previous, marker));
    (graph, id.unwrap())
  }

  #[test]
  fn test_export_empty_graph() {
    let definition = export(&BlockGraph::empty_state(), &DefinitionMeta::new("empty")).unwrap();
    assert_eq!(definition, WorkflowDefinition::new("empty"));
  }

  #[test]
  fn test_export_refuses_invalid_graph() {
    let (graph, _) = append(BlockGraph::empty_state(), BlockKind::GotoUrl);
    let err = export(&graph, &DefinitionMeta::new("t")).unwrap_err();
    let ExportError::Invalid { messages } = err;
    assert_eq!(messages, vec!["block_1: required field 'url' is empty".to_string()]);
  }

  #[test]
  fn test_export_inlines_loop_body() {
    let editor = GraphEditor::default();
    let (graph, lp) = append(BlockGraph::empty_state(), BlockKind::Loop);
    let start = graph.start_marker(Some(&lp)).unwrap().id.clone();
    let marker = graph.insertion_marker(Some(&lp)).unwrap().id.clone();
    let (graph, inner) =
      editor.add_node(graph, BlockKind::GotoUrl, &Anchor::between(start, marker).inside(&lp));
    let inner = inner.unwrap();
    let graph = editor.update_block(
      graph,
      &lp,
      Block::Loop(LoopBlock {
        loop_over: Some("urls".to_string()),
        complete_if_empty: true,
      }),
    );
    let graph = editor.update_block(
      graph,
      &inner,
      Block::GotoUrl(GotoUrlBlock {
        url: "https://example.com".to_string(),
      }),
    );
    let meta = DefinitionMeta {
      title: "loop".to_string(),
      parameters: vec![ParameterDescriptor::Workflow {
        key: "urls".to_string(),
        description: None,
        workflow_parameter_type: blockflow_config::WorkflowParameterType::Json,
        default_value: None,
      }],
    };

    let definition = export(&graph, &meta).unwrap();

    assert_eq!(definition.blocks.len(), 1);
    let BlockBody::Loop { attributes, children } = &definition.blocks[0].body else {
      panic!("expected a loop");
    };
    assert_eq!(attributes.loop_over.as_deref(), Some("urls"));
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].label, "block_2");
  }
}
