use std::fmt;

use blockflow_config::{
  Branch, CodeBlock, ExtractionBlock, FileDownloadBlock, FileParserBlock, GotoUrlBlock,
  HttpRequestBlock, LoginBlock, LoopBlock, PdfParserBlock, SendEmailBlock, TaskBlock,
  TextPromptBlock, ValidationBlock, WaitBlock,
};
use serde::{Deserialize, Serialize};

/// Opaque, stable node identifier.
pub type NodeId = String;

/// A node of the block graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
  pub id: NodeId,
  /// The Loop or Conditional whose body contains this node.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub parent_id: Option<NodeId>,
  pub kind: NodeKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node_type", rename_all = "snake_case")]
pub enum NodeKind {
  /// Entry of the top-level chain or of a container body.
  Start,
  /// Trailing placeholder of a chain where new blocks get appended.
  InsertionMarker,
  Block(BlockNode),
}

/// A user-authored block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockNode {
  pub label: String,
  pub continue_on_failure: bool,
  pub model: Option<String>,
  pub block: Block,
}

impl BlockNode {
  pub fn new(label: impl Into<String>, block: Block) -> Self {
    Self {
      label: label.into(),
      continue_on_failure: false,
      model: None,
      block,
    }
  }
}

impl Node {
  pub(crate) fn new(parent_id: Option<NodeId>, kind: NodeKind) -> Self {
    Self {
      id: uuid::Uuid::new_v4().to_string(),
      parent_id,
      kind,
    }
  }

  pub fn start(parent_id: Option<NodeId>) -> Self {
    Self::new(parent_id, NodeKind::Start)
  }

  pub fn insertion_marker(parent_id: Option<NodeId>) -> Self {
    Self::new(parent_id, NodeKind::InsertionMarker)
  }

  pub fn block(parent_id: Option<NodeId>, block: BlockNode) -> Self {
    Self::new(parent_id, NodeKind::Block(block))
  }

  pub fn as_block(&self) -> Option<&BlockNode> {
    match &self.kind {
      NodeKind::Block(block) => Some(block),
      _ => None,
    }
  }

  pub(crate) fn as_block_mut(&mut self) -> Option<&mut BlockNode> {
    match &mut self.kind {
      NodeKind::Block(block) => Some(block),
      _ => None,
    }
  }

  pub fn label(&self) -> Option<&str> {
    self.as_block().map(|b| b.label.as_str())
  }

  pub fn is_start(&self) -> bool {
    matches!(self.kind, NodeKind::Start)
  }

  pub fn is_insertion_marker(&self) -> bool {
    matches!(self.kind, NodeKind::InsertionMarker)
  }

  pub fn is_container(&self) -> bool {
    self.as_block().is_some_and(|b| b.block.kind().is_container())
  }

  pub fn conditional(&self) -> Option<&ConditionalBlock> {
    match self.as_block().map(|b| &b.block) {
      Some(Block::Conditional(conditional)) => Some(conditional),
      _ => None,
    }
  }
}

/// Attributes of a conditional block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalBlock {
  pub branches: Vec<Branch>,
  pub active_branch_id: String,
}

impl ConditionalBlock {
  pub fn branch(&self, branch_id: &str) -> Option<&Branch> {
    self.branches.iter().find(|b| b.branch_id == branch_id)
  }

  pub fn has_branch(&self, branch_id: &str) -> bool {
    self.branch(branch_id).is_some()
  }
}

/// Typed attributes, one case per block kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "block_type", rename_all = "snake_case")]
pub enum Block {
  Task(TaskBlock),
  Loop(LoopBlock),
  Conditional(ConditionalBlock),
  Code(CodeBlock),
  TextPrompt(TextPromptBlock),
  HttpRequest(HttpRequestBlock),
  Extraction(ExtractionBlock),
  FileDownload(FileDownloadBlock),
  Login(LoginBlock),
  SendEmail(SendEmailBlock),
  Wait(WaitBlock),
  GotoUrl(GotoUrlBlock),
  PdfParser(PdfParserBlock),
  FileParser(FileParserBlock),
  Validation(ValidationBlock),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
  Task,
  Loop,
  Conditional,
  Code,
  TextPrompt,
  HttpRequest,
  Extraction,
  FileDownload,
  Login,
  SendEmail,
  Wait,
  GotoUrl,
  PdfParser,
  FileParser,
  Validation,
}

impl BlockKind {
  pub const ALL: [BlockKind; 15] = [
    BlockKind::Task,
    BlockKind::Loop,
    BlockKind::Conditional,
    BlockKind::Code,
    BlockKind::TextPrompt,
    BlockKind::HttpRequest,
    BlockKind::Extraction,
    BlockKind::FileDownload,
    BlockKind::Login,
    BlockKind::SendEmail,
    BlockKind::Wait,
    BlockKind::GotoUrl,
    BlockKind::PdfParser,
    BlockKind::FileParser,
    BlockKind::Validation,
  ];

  pub fn is_container(self) -> bool {
    matches!(self, BlockKind::Loop | BlockKind::Conditional)
  }

  pub fn as_str(self) -> &'static str {
    match self {
      BlockKind::Task => "task",
      BlockKind::Loop => "loop",
      BlockKind::Conditional => "conditional",
      BlockKind::Code => "code",
      BlockKind::TextPrompt => "text_prompt",
      BlockKind::HttpRequest => "http_request",
      BlockKind::Extraction => "extraction",
      BlockKind::FileDownload => "file_download",
      BlockKind::Login => "login",
      BlockKind::SendEmail => "send_email",
      BlockKind::Wait => "wait",
      BlockKind::GotoUrl => "goto_url",
      BlockKind::PdfParser => "pdf_parser",
      BlockKind::FileParser => "file_parser",
      BlockKind::Validation => "validation",
    }
  }
}

impl fmt::Display for BlockKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}
