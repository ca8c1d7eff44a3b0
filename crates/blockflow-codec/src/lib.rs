//! Conversion between block graphs and portable definitions.
//!
//! [`export`] turns a valid graph into a [`WorkflowDefinition`] at the current
//! schema version, and [`import`] turns such a definition back into a graph.
//! Documents written at an older version go through [`upgrade`] first;
//! [`load_definition`] does both steps for definition text.

mod error;
mod export;
mod import;
mod parameters;
mod upgrade;

use blockflow_config::WorkflowDefinition;

pub use error::{ExportError, ImportError, LoadError, UpgradeError};
pub use export::{DefinitionMeta, export};
pub use import::import;
pub use parameters::{VAULT_ACCESS_PARAMETERS, reconcile_parameters};
pub use upgrade::upgrade;

/// Parse definition JSON written at any known version.
pub fn load_definition(text: &str) -> Result<WorkflowDefinition, LoadError> {
  let value: serde_json::Value = serde_json::from_str(text)?;
  let version = value
    .get("version")
    .and_then(serde_json::Value::as_u64)
    .ok_or(LoadError::MissingVersion)?;
  let version = u32::try_from(version)
    .map_err(|_| UpgradeError::Malformed(format!("version {version} out of range")))?;

  let (value, _) = upgrade(value, version)?;
  Ok(serde_json::from_value(value)?)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_load_current_definition() {
    let definition = load_definition(r#"{"version": 3, "title": "t"}"#).unwrap();
    assert_eq!(definition, WorkflowDefinition::new("t"));
  }

  #[test]
  fn test_load_upgrades_legacy_definition() {
    let text = r#"{
      "version": 2,
      "title": "legacy",
      "blocks": [{ "block_type": "for_loop", "label": "each", "loop_over_parameter_key": "urls" }]
    }"#;
    let definition = load_definition(text).unwrap();
    assert_eq!(definition.version, 3);
    assert!(matches!(
      &definition.blocks[0].body,
      blockflow_config::BlockBody::Loop { attributes, .. } if attributes.loop_over.as_deref() == Some("urls")
    ));
  }

  #[test]
  fn test_load_requires_version() {
    assert!(matches!(
      load_definition(r#"{"title": "t"}"#),
      Err(LoadError::MissingVersion)
    ));
    assert!(matches!(load_definition("not json"), Err(LoadError::Json(_))));
  }

  #[test]
  fn test_load_rejects_out_of_range_version() {
    let err = load_definition(r#"{"version": 4294967296, "title": "t"}"#).unwrap_err();
    assert!(matches!(
      err,
      LoadError::Upgrade(UpgradeError::Malformed(ref message)) if message == "version 4294967296 out of range"
    ));
  }
}
