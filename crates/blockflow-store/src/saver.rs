//! Background saving of definition snapshots.
//!
//! The `SaveWorker` owns an mpsc channel of save requests. Each request holds
//! its own copy of the definition, so edits made after a snapshot was queued
//! never change what gets written.

use std::sync::Arc;

use blockflow_config::WorkflowDefinition;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::events::{SaveEvent, SaveNotifier};
use crate::{DefinitionStore, StoreError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveConfig {
  /// Capacity of the request channel.
  pub buffer_size: usize,
}

impl Default for SaveConfig {
  fn default() -> Self {
    Self { buffer_size: 16 }
  }
}

/// One snapshot to persist.
#[derive(Debug, Clone)]
pub struct SaveRequest {
  pub workflow_id: String,
  pub definition: WorkflowDefinition,
}

/// Persists definition snapshots in the background.
///
/// # Usage
///
/// ```ignore
/// let worker = SaveWorker::new(store, Arc::new(NoopNotifier), &SaveConfig::default());
/// let sender = worker.sender();
///
/// let cancel = CancellationToken::new();
/// tokio::spawn(worker.start(cancel.clone()));
///
/// sender.send(SaveRequest { workflow_id, definition }).await?;
/// ```
pub struct SaveWorker {
  sender: mpsc::Sender<SaveRequest>,
  receiver: mpsc::Receiver<SaveRequest>,
  store: Arc<dyn DefinitionStore>,
  notifier: Arc<dyn SaveNotifier>,
}

impl SaveWorker {
  pub fn new(
    store: Arc<dyn DefinitionStore>,
    notifier: Arc<dyn SaveNotifier>,
    config: &SaveConfig,
  ) -> Self {
    let (sender, receiver) = mpsc::channel(config.buffer_size.max(1));
    Self {
      sender,
      receiver,
      store,
      notifier,
    }
  }

  /// A handle for queueing snapshots.
  pub fn sender(&self) -> mpsc::Sender<SaveRequest> {
    self.sender.clone()
  }

  /// Queue a snapshot of `definition`.
  pub async fn submit(
    &self,
    workflow_id: impl Into<String>,
    definition: WorkflowDefinition,
  ) -> Result<(), StoreError> {
    self
      .sender
      .send(SaveRequest {
        workflow_id: workflow_id.into(),
        definition,
      })
      .await
      .map_err(|_| StoreError::ChannelClosed)
  }

  /// Run the save loop.
  ///
  /// Runs until the cancellation token fires or every sender, including the
  /// worker's own, has been dropped. Requests already received are finished
  /// before a cancellation is observed.
  pub async fn start(self, cancel: CancellationToken) {
    let Self {
      sender,
      mut receiver,
      store,
      notifier,
    } = self;
    // Only external senders keep the loop alive.
    drop(sender);

    info!("starting save worker");
    loop {
      tokio::select! {
        biased;
        request = receiver.recv() => {
          let Some(request) = request else {
            info!("save worker channel closed");
            break;
          };
          persist(store.as_ref(), notifier.as_ref(), request).await;
        }
        _ = cancel.cancelled() => {
          info!("save worker cancelled");
          break;
        }
      }
    }
  }
}

async fn persist(store: &dyn DefinitionStore, notifier: &dyn SaveNotifier, request: SaveRequest) {
  let SaveRequest {
    workflow_id,
    definition,
  } = request;

  match store.save(&workflow_id, &definition).await {
    Ok(()) => {
      info!(workflow_id = %workflow_id, blocks = definition.blocks.len(), "saved definition");
      notifier.notify(SaveEvent::Saved {
        workflow_id,
        blocks: definition.blocks.len(),
      });
    }
    Err(e) => {
      error!(workflow_id = %workflow_id, error = %e, "failed to save definition");
      notifier.notify(SaveEvent::Failed {
        workflow_id,
        error: e.to_string(),
      });
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::events::ChannelNotifier;
  use crate::fs::FsDefinitionStore;

  fn worker(dir: &std::path::Path) -> (SaveWorker, mpsc::UnboundedReceiver<SaveEvent>, Arc<FsDefinitionStore>) {
    let store = Arc::new(FsDefinitionStore::new(dir));
    let (tx, rx) = mpsc::unbounded_channel();
    let worker = SaveWorker::new(
      store.clone(),
      Arc::new(ChannelNotifier::new(tx)),
      &SaveConfig::default(),
    );
    (worker, rx, store)
  }

  #[tokio::test]
  async fn test_worker_persists_snapshot_not_later_edits() {
    let dir = tempfile::tempdir().unwrap();
    let (worker, mut events, store) = worker(dir.path());
    let sender = worker.sender();
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(worker.start(cancel.clone()));

    let mut definition = WorkflowDefinition::new("before");
    sender
      .send(SaveRequest {
        workflow_id: "wf".to_string(),
        definition: definition.clone(),
      })
      .await
      .unwrap();
    definition.title = "after".to_string();

    let event = events.recv().await.unwrap();
    assert_eq!(
      event,
      SaveEvent::Saved {
        workflow_id: "wf".to_string(),
        blocks: 0
      }
    );
    assert_eq!(store.load("wf").await.unwrap().title, "before");

    cancel.cancel();
    handle.await.unwrap();
  }

  #[tokio::test]
  async fn test_worker_reports_failures() {
    let dir = tempfile::tempdir().unwrap();
    let (worker, mut events, _) = worker(dir.path());
    let sender = worker.sender();
    let handle = tokio::spawn(worker.start(CancellationToken::new()));

    sender
      .send(SaveRequest {
        workflow_id: "../escape".to_string(),
        definition: WorkflowDefinition::new("x"),
      })
      .await
      .unwrap();

    let event = events.recv().await.unwrap();
    assert!(matches!(event, SaveEvent::Failed { ref workflow_id, .. } if workflow_id == "../escape"));

    drop(sender);
    handle.await.unwrap();
  }

  #[tokio::test]
  async fn test_worker_stops_on_cancel() {
    let dir = tempfile::tempdir().unwrap();
    let (worker, _events, _) = worker(dir.path());
    let _sender = worker.sender();
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(worker.start(cancel.clone()));

    cancel.cancel();
    tokio::time::timeout(std::time::Duration::from_secs(5), handle)
      .await
      .unwrap()
      .unwrap();
  }

  #[tokio::test]
  async fn test_submitted_snapshots_drain_before_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let (worker, mut events, store) = worker(dir.path());
    worker.submit("wf", WorkflowDefinition::new("queued")).await.unwrap();

    // No external senders remain, so the loop exits once the queue is empty.
    let handle = tokio::spawn(worker.start(CancellationToken::new()));

    assert!(matches!(events.recv().await.unwrap(), SaveEvent::Saved { .. }));
    handle.await.unwrap();
    assert_eq!(store.load("wf").await.unwrap().title, "queued");
  }
}
