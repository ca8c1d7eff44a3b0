//! Save events and notifiers.
//!
//! The save worker reports the outcome of every snapshot it persists so an
//! editor can show "saved" state or surface failures.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SaveEvent {
  /// The snapshot was written.
  Saved { workflow_id: String, blocks: usize },

  /// Writing the snapshot failed; the previous stored version is unchanged.
  Failed { workflow_id: String, error: String },
}

impl SaveEvent {
  pub fn workflow_id(&self) -> &str {
    match self {
      SaveEvent::Saved { workflow_id, .. } | SaveEvent::Failed { workflow_id, .. } => workflow_id,
    }
  }
}

/// Receives save events from a [`SaveWorker`](crate::SaveWorker).
pub trait SaveNotifier: Send + Sync {
  fn notify(&self, event: SaveEvent);
}

/// A notifier that discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl SaveNotifier for NoopNotifier {
  fn notify(&self, _event: SaveEvent) {}
}

/// A notifier that forwards events to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  // Unbounded so a slow consumer never stalls the worker; there is one event
  // per save.
  sender: mpsc::UnboundedSender<SaveEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<SaveEvent>) -> Self {
    Self { sender }
  }
}

impl SaveNotifier for ChannelNotifier {
  fn notify(&self, event: SaveEvent) {
    // The receiver may have been dropped.
    let _ = self.sender.send(event);
  }
}
