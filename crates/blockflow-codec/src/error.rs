use thiserror::Error;

/// Errors that can occur while exporting a graph.
#[derive(Debug, Error)]
pub enum ExportError {
  /// The graph failed validation; nothing was exported.
  #[error("workflow is invalid: {}", messages.join("; "))]
  Invalid { messages: Vec<String> },
}

/// Errors that can occur while importing a definition.
#[derive(Debug, Error)]
pub enum ImportError {
  /// The definition must be upgraded first.
  #[error("unsupported definition version {found}, expected {expected}")]
  UnsupportedVersion { found: u32, expected: u32 },

  #[error("duplicate block label: {label}")]
  DuplicateLabel { label: String },
}

/// Errors that can occur while upgrading a definition.
#[derive(Debug, Error)]
pub enum UpgradeError {
  /// A legacy block has no counterpart in the current schema.
  #[error("block '{label}' has type '{block_type}' which cannot be upgraded")]
  UnmappableBlock { label: String, block_type: String },

  #[error("unknown definition version {version}")]
  UnknownVersion { version: u32 },

  #[error("malformed definition: {0}")]
  Malformed(String),
}

/// Errors that can occur while loading definition text.
#[derive(Debug, Error)]
pub enum LoadError {
  #[error("invalid definition JSON: {0}")]
  Json(#[from] serde_json::Error),

  #[error("definition has no version")]
  MissingVersion,

  #[error(transparent)]
  Upgrade(#[from] UpgradeError),
}
