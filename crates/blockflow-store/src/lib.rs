//! Blockflow Store
//!
//! Persistence for portable definitions. The [`DefinitionStore`] trait is the
//! backend seam; [`FsDefinitionStore`] keeps one JSON file per workflow.
//!
//! Saving from an editor goes through a [`SaveWorker`], which receives
//! immutable definition snapshots over a channel and writes them in the
//! background, reporting each outcome to a [`SaveNotifier`].

mod events;
mod fs;
mod poll;
mod saver;

pub use events::{ChannelNotifier, NoopNotifier, SaveEvent, SaveNotifier};
pub use fs::FsDefinitionStore;
pub use poll::{PollConfig, PollError, poll_until};
pub use saver::{SaveConfig, SaveRequest, SaveWorker};

use async_trait::async_trait;
use blockflow_config::WorkflowDefinition;

/// Error type for definition storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  /// No definition is stored under this workflow id.
  #[error("definition not found: {0}")]
  NotFound(String),

  /// The workflow id cannot be used as a storage key.
  #[error("invalid workflow id: {0:?}")]
  InvalidId(String),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("serialization error: {0}")]
  Json(#[from] serde_json::Error),

  /// A stored document could not be read back at the current version.
  #[error("failed to load definition: {0}")]
  Load(#[from] blockflow_codec::LoadError),

  #[error("save worker is not running")]
  ChannelClosed,
}

/// Definition storage backend.
#[async_trait]
pub trait DefinitionStore: Send + Sync {
  /// Store a definition, replacing any previous one for the workflow.
  async fn save(&self, workflow_id: &str, definition: &WorkflowDefinition) -> Result<(), StoreError>;

  /// Load a definition, upgrading it if it was written at an older version.
  async fn load(&self, workflow_id: &str) -> Result<WorkflowDefinition, StoreError>;

  /// Ids of every stored workflow, sorted.
  async fn list(&self) -> Result<Vec<String>, StoreError>;
}
