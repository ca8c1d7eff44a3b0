use serde::{Deserialize, Serialize};

use crate::block::BlockDescriptor;
use crate::parameter::ParameterDescriptor;

/// Schema version written by this editor.
pub const CURRENT_VERSION: u32 = 3;

/// Suffix of the parameter key under which a block publishes its output.
pub const OUTPUT_SUFFIX: &str = "_output";

/// A portable workflow definition at [`CURRENT_VERSION`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
  pub version: u32,
  pub title: String,
  #[serde(default)]
  pub parameters: Vec<ParameterDescriptor>,
  #[serde(default)]
  pub blocks: Vec<BlockDescriptor>,
}

impl WorkflowDefinition {
  /// An empty definition at the current version.
  pub fn new(title: impl Into<String>) -> Self {
    Self {
      version: CURRENT_VERSION,
      title: title.into(),
      parameters: Vec::new(),
      blocks: Vec::new(),
    }
  }
}

/// The parameter key that references the output of the block labelled `label`.
pub fn output_key(label: &str) -> String {
  format!("{label}{OUTPUT_SUFFIX}")
}

/// The label whose output `key` references, if `key` is an output reference.
pub fn output_label(key: &str) -> Option<&str> {
  key
    .strip_suffix(OUTPUT_SUFFIX)
    .filter(|label| !label.is_empty())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_output_key_round_trip() {
    assert_eq!(output_key("block_1"), "block_1_output");
    assert_eq!(output_label("block_1_output"), Some("block_1"));
  }

  #[test]
  fn test_output_label_rejects_plain_keys() {
    assert_eq!(output_label("start_url"), None);
    assert_eq!(output_label("_output"), None);
  }

  #[test]
  fn test_definition_defaults_missing_lists() {
    let def: WorkflowDefinition =
      serde_json::from_str(r#"{ "version": 3, "title": "Empty" }"#).unwrap();
    assert_eq!(def, WorkflowDefinition::new("Empty"));
  }
}
