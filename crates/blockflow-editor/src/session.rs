//! An editing session over one workflow.
//!
//! The session owns the current graph, its definition metadata, the measured
//! node sizes reported by the canvas and the layout computed from them. Each
//! committed edit replaces the graph value and triggers exactly one layout
//! pass; edits that leave the graph unchanged are not committed.

use std::collections::HashMap;

use blockflow_codec::{DefinitionMeta, ExportError, ImportError, export, import};
use blockflow_config::WorkflowDefinition;
use blockflow_graph::{BlockGraph, GraphEditor, NodeId};
use blockflow_layout::{Layout, LayoutEngine, Size};
use blockflow_store::SaveRequest;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::command::{EditCommand, apply_edit};
use crate::config::EditorConfig;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
  #[error(transparent)]
  Import(#[from] ImportError),

  #[error(transparent)]
  Export(#[from] ExportError),

  #[error("save worker is not running")]
  SaveClosed,
}

pub struct Session {
  editor: GraphEditor,
  engine: LayoutEngine,
  graph: BlockGraph,
  meta: DefinitionMeta,
  sizes: HashMap<NodeId, Size>,
  layout: Layout,
  layout_passes: u64,
  revision: u64,
}

impl Session {
  /// A session over an empty workflow.
  pub fn new(title: impl Into<String>, config: &EditorConfig) -> Self {
    Self::with_graph(BlockGraph::empty_state(), DefinitionMeta::new(title), config)
  }

  /// A session over an existing definition at the current version.
  pub fn from_definition(
    definition: &WorkflowDefinition,
    config: &EditorConfig,
  ) -> Result<Self, SessionError> {
    let (graph, meta) = import(definition)?;
    Ok(Self::with_graph(graph, meta, config))
  }

  fn with_graph(graph: BlockGraph, meta: DefinitionMeta, config: &EditorConfig) -> Self {
    let mut session = Self {
      editor: GraphEditor::default(),
      engine: LayoutEngine::new(config.layout.clone()),
      graph,
      meta,
      sizes: HashMap::new(),
      layout: Layout::default(),
      layout_passes: 0,
      revision: 0,
    };
    session.relayout();
    session
  }

  pub fn graph(&self) -> &BlockGraph {
    &self.graph
  }

  pub fn meta(&self) -> &DefinitionMeta {
    &self.meta
  }

  pub fn meta_mut(&mut self) -> &mut DefinitionMeta {
    &mut self.meta
  }

  pub fn layout(&self) -> &Layout {
    &self.layout
  }

  /// Number of layout passes run so far, including the initial one.
  pub fn layout_passes(&self) -> u64 {
    self.layout_passes
  }

  /// Number of committed edits.
  pub fn revision(&self) -> u64 {
    self.revision
  }

  /// Apply an edit. Returns the ids of blocks it created.
  ///
  /// An edit that does not change the graph is dropped without a layout pass.
  pub fn apply(&mut self, command: EditCommand) -> Vec<NodeId> {
    let name = command.name();
    let graph = std::mem::take(&mut self.graph);
    let outcome = apply_edit(&self.editor, graph, command);
    self.graph = outcome.graph;
    if !outcome.layout_stale {
      debug!(command = name, "edit left the graph unchanged");
      return outcome.created;
    }

    self.sizes.retain(|id, _| self.graph.contains(id));
    self.revision += 1;
    debug!(command = name, revision = self.revision, "committed edit");
    self.relayout();
    outcome.created
  }

  /// Record the measured size of a node. Re-lays out only when the size
  /// differs from the one already known.
  pub fn update_size(&mut self, id: &str, size: Size) {
    if !self.graph.contains(id) || self.sizes.get(id) == Some(&size) {
      return;
    }
    self.sizes.insert(id.to_string(), size);
    self.relayout();
  }

  /// Export the current graph as an immutable definition snapshot.
  pub fn snapshot(&self) -> Result<WorkflowDefinition, SessionError> {
    Ok(export(&self.graph, &self.meta)?)
  }

  /// Queue a snapshot of the current graph with a save worker.
  pub async fn save(
    &self,
    workflow_id: impl Into<String>,
    sender: &mpsc::Sender<SaveRequest>,
  ) -> Result<(), SessionError> {
    let workflow_id = workflow_id.into();
    let definition = self.snapshot()?;
    info!(workflow_id = %workflow_id, revision = self.revision, "queueing snapshot");
    sender
      .send(SaveRequest {
        workflow_id,
        definition,
      })
      .await
      .map_err(|_| SessionError::SaveClosed)
  }

  fn relayout(&mut self) {
    self.layout = self.engine.layout(&self.graph, &self.sizes);
    self.layout_passes += 1;
  }
}
