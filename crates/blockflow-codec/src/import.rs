use std::collections::HashSet;

use blockflow_config::{BlockBody, BlockDescriptor, CURRENT_VERSION, WorkflowDefinition};
use blockflow_graph::{
  Block, BlockGraph, BlockNode, BranchTag, ConditionalBlock, Edge, EdgeKind, Node, NodeId,
};
use tracing::debug;

use crate::error::ImportError;
use crate::export::DefinitionMeta;

/// Rebuild a graph from a definition at the current version.
///
/// Every body gets fresh start and insertion markers. The first branch of each
/// conditional is the active one.
pub fn import(definition: &WorkflowDefinition) -> Result<(BlockGraph, DefinitionMeta), ImportError> {
  if definition.version != CURRENT_VERSION {
    return Err(ImportError::UnsupportedVersion {
      found: definition.version,
      expected: CURRENT_VERSION,
    });
  }

  let mut builder = Builder::default();
  let start = builder.push(Node::start(None));
  let marker = builder.push(Node::insertion_marker(None));
  builder.chain(&start, &marker, None, None, &definition.blocks)?;

  debug!(
    title = %definition.title,
    nodes = builder.nodes.len(),
    edges = builder.edges.len(),
    "imported definition"
  );

  let meta = DefinitionMeta {
    title: definition.title.clone(),
    parameters: definition.parameters.clone(),
  };
  Ok((BlockGraph::from_parts(builder.nodes, builder.edges), meta))
}

#[derive(Default)]
struct Builder {
  nodes: Vec<Node>,
  edges: Vec<Edge>,
  labels: HashSet<String>,
}

impl Builder {
  fn push(&mut self, node: Node) -> NodeId {
    let id = node.id.clone();
    self.nodes.push(node);
    id
  }

  /// Wire `start -> blocks... -> marker` inside one body.
  fn chain(
    &mut self,
    start: &NodeId,
    marker: &NodeId,
    parent: Option<&NodeId>,
    tag: Option<(BranchTag, bool)>,
    blocks: &[BlockDescriptor],
  ) -> Result<(), ImportError> {
    let mut previous = start.clone();
    for descriptor in blocks {
      let id = self.block(parent, descriptor)?;
      self.connect(&previous, &id, &tag, EdgeKind::Insertable);
      previous = id;
    }
    self.connect(&previous, marker, &tag, EdgeKind::Plain);
    Ok(())
  }

  fn connect(&mut self, source: &NodeId, target: &NodeId, tag: &Option<(BranchTag, bool)>, kind: EdgeKind) {
    let edge = match tag {
      Some((tag, hidden)) => Edge::tagged(source.clone(), target.clone(), tag.clone(), *hidden),
      None => Edge::new(source.clone(), target.clone(), kind),
    };
    self.edges.push(edge);
  }

  fn block(&mut self, parent: Option<&NodeId>, descriptor: &BlockDescriptor) -> Result<NodeId, ImportError> {
    if !self.labels.insert(descriptor.label.clone()) {
      return Err(ImportError::DuplicateLabel {
        label: descriptor.label.clone(),
      });
    }

    let block = match &descriptor.body {
      BlockBody::Task(b) => Block::Task(b.clone()),
      BlockBody::Loop { attributes, .. } => Block::Loop(attributes.clone()),
      BlockBody::Conditional { branches } => Block::Conditional(ConditionalBlock {
        branches: branches.iter().map(|b| b.branch.clone()).collect(),
        active_branch_id: branches
          .first()
          .map(|b| b.branch.branch_id.clone())
          .unwrap_or_default(),
      }),
      BlockBody::Code(b) => Block::Code(b.clone()),
      BlockBody::TextPrompt(b) => Block::TextPrompt(b.clone()),
      BlockBody::HttpRequest(b) => Block::HttpRequest(b.clone()),
      BlockBody::Extraction(b) => Block::Extraction(b.clone()),
      BlockBody::FileDownload(b) => Block::FileDownload(b.clone()),
      BlockBody::Login(b) => Block::Login(b.clone()),
      BlockBody::SendEmail(b) => Block::SendEmail(b.clone()),
      BlockBody::Wait(b) => Block::Wait(b.clone()),
      BlockBody::GotoUrl(b) => Block::GotoUrl(b.clone()),
      BlockBody::PdfParser(b) => Block::PdfParser(b.clone()),
      BlockBody::FileParser(b) => Block::FileParser(b.clone()),
      BlockBody::Validation(b) => Block::Validation(b.clone()),
    };

    let id = self.push(Node::block(
      parent.cloned(),
      BlockNode {
        label: descriptor.label.clone(),
        continue_on_failure: descriptor.continue_on_failure,
        model: descriptor.model.clone(),
        block,
      },
    ));

    match &descriptor.body {
      BlockBody::Loop { children, .. } => {
        let start = self.push(Node::start(Some(id.clone())));
        let marker = self.push(Node::insertion_marker(Some(id.clone())));
        self.chain(&start, &marker, Some(&id), None, children)?;
      }
      BlockBody::Conditional { branches } => {
        let start = self.push(Node::start(Some(id.clone())));
        let marker = self.push(Node::insertion_marker(Some(id.clone())));
        for (i, branch) in branches.iter().enumerate() {
          let tag = BranchTag {
            conditional_id: id.clone(),
            branch_id: branch.branch.branch_id.clone(),
          };
          self.chain(&start, &marker, Some(&id), Some((tag, i != 0)), &branch.children)?;
        }
      }
      _ => {}
    }

    Ok(id)
  }
}
