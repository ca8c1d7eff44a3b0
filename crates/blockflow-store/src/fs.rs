use std::path::PathBuf;

use async_trait::async_trait;
use blockflow_config::WorkflowDefinition;
use tokio::fs;
use tracing::debug;

use crate::{DefinitionStore, StoreError};

const EXTENSION: &str = "json";

/// Filesystem-based definition store.
///
/// Each definition is stored as pretty-printed JSON at
/// `{base_path}/{workflow_id}.json`. The base directory is created on first
/// save.
#[derive(Debug, Clone)]
pub struct FsDefinitionStore {
  base_path: PathBuf,
}

impl FsDefinitionStore {
  pub fn new(base_path: impl Into<PathBuf>) -> Self {
    Self {
      base_path: base_path.into(),
    }
  }

  fn key_to_path(&self, workflow_id: &str) -> Result<PathBuf, StoreError> {
    let valid = !workflow_id.is_empty()
      && workflow_id != "."
      && workflow_id != ".."
      && !workflow_id.contains(['/', '\\']);
    if !valid {
      return Err(StoreError::InvalidId(workflow_id.to_string()));
    }
    Ok(self.base_path.join(format!("{workflow_id}.{EXTENSION}")))
  }
}

#[async_trait]
impl DefinitionStore for FsDefinitionStore {
  async fn save(&self, workflow_id: &str, definition: &WorkflowDefinition) -> Result<(), StoreError> {
    let path = self.key_to_path(workflow_id)?;
    fs::create_dir_all(&self.base_path).await?;

    let json = serde_json::to_string_pretty(definition)?;
    // Staged write; readers never see a partial file.
    let staging = path.with_extension("json.tmp");
    fs::write(&staging, json).await?;
    fs::rename(&staging, &path).await?;

    debug!(workflow_id = %workflow_id, path = %path.display(), "wrote definition");
    Ok(())
  }

  async fn load(&self, workflow_id: &str) -> Result<WorkflowDefinition, StoreError> {
    let path = self.key_to_path(workflow_id)?;
    let text = fs::read_to_string(&path).await.map_err(|e| {
      if e.kind() == std::io::ErrorKind::NotFound {
        StoreError::NotFound(workflow_id.to_string())
      } else {
        StoreError::Io(e)
      }
    })?;
    Ok(blockflow_codec::load_definition(&text)?)
  }

  async fn list(&self) -> Result<Vec<String>, StoreError> {
    let mut entries = match fs::read_dir(&self.base_path).await {
      Ok(entries) => entries,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
      Err(e) => return Err(e.into()),
    };

    let mut ids = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
      let path = entry.path();
      if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
        continue;
      }
      if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
        ids.push(stem.to_string());
      }
    }
    ids.sort();
    Ok(ids)
  }
}
