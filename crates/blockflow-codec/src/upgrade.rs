//! Schema migrations over raw definition JSON.
//!
//! Each migration lifts a document by one version. A migration leaves block
//! types introduced by later versions untouched, so running it over an
//! already-migrated document changes nothing.

use blockflow_config::CURRENT_VERSION;
use serde_json::{Map, Value};
use tracing::info;

use crate::error::UpgradeError;

type Migration = fn(&mut Map<String, Value>) -> Result<(), UpgradeError>;

/// Migrations indexed by the version they upgrade from, starting at 1.
const MIGRATIONS: [Migration; 2] = [unify_task_kinds, rename_for_loop];

const V2_BLOCK_TYPES: &[&str] = &[
  "task",
  "for_loop",
  "conditional",
  "code",
  "text_prompt",
  "http_request",
  "extraction",
  "file_download",
  "login",
  "send_email",
  "wait",
  "goto_url",
  "pdf_parser",
  "file_parser",
  "validation",
];

const V3_BLOCK_TYPES: &[&str] = &[
  "task",
  "loop",
  "conditional",
  "code",
  "text_prompt",
  "http_request",
  "extraction",
  "file_download",
  "login",
  "send_email",
  "wait",
  "goto_url",
  "pdf_parser",
  "file_parser",
  "validation",
];

/// Migrate `definition` from `from_version` to the current version.
///
/// The identity at the current version. Any block that cannot be mapped fails
/// the whole upgrade.
pub fn upgrade(definition: Value, from_version: u32) -> Result<(Value, u32), UpgradeError> {
  if from_version == CURRENT_VERSION {
    return Ok((definition, CURRENT_VERSION));
  }
  if from_version == 0 || from_version > CURRENT_VERSION {
    return Err(UpgradeError::UnknownVersion {
      version: from_version,
    });
  }

  let mut definition = definition;
  let Value::Object(document) = &mut definition else {
    return Err(UpgradeError::Malformed("definition is not an object".to_string()));
  };

  for version in from_version..CURRENT_VERSION {
    let migrate = MIGRATIONS[(version - 1) as usize];
    if let Some(blocks) = document.get_mut("blocks") {
      walk_blocks(blocks, migrate)?;
    }
    info!(from = version, to = version + 1, "migrated definition");
  }
  document.insert("version".to_string(), Value::from(CURRENT_VERSION));

  Ok((definition, CURRENT_VERSION))
}

/// Apply `migrate` to every block of a block list, depth first.
fn walk_blocks(blocks: &mut Value, migrate: Migration) -> Result<(), UpgradeError> {
  let Value::Array(blocks) = blocks else {
    return Err(UpgradeError::Malformed("blocks is not an array".to_string()));
  };

  for block in blocks {
    let Value::Object(block) = block else {
      return Err(UpgradeError::Malformed("block is not an object".to_string()));
    };
    migrate(block)?;

    for key in ["children", "loop_blocks"] {
      if let Some(children) = block.get_mut(key) {
        walk_blocks(children, migrate)?;
      }
    }
    if let Some(Value::Array(branches)) = block.get_mut("branches") {
      for branch in branches {
        if let Some(children) = branch.get_mut("children") {
          walk_blocks(children, migrate)?;
        }
      }
    }
  }
  Ok(())
}

fn block_type(block: &Map<String, Value>) -> &str {
  block.get("block_type").and_then(Value::as_str).unwrap_or_default()
}

fn unmappable(block: &Map<String, Value>) -> UpgradeError {
  UpgradeError::UnmappableBlock {
    label: block
      .get("label")
      .and_then(Value::as_str)
      .unwrap_or("<unlabelled>")
      .to_string(),
    block_type: block_type(block).to_string(),
  }
}

/// v1 -> v2: `navigation` and `action` become `task` with a `task_kind`;
/// `login_task` becomes `login`.
fn unify_task_kinds(block: &mut Map<String, Value>) -> Result<(), UpgradeError> {
  let (new_type, task_kind) = match block_type(block) {
    "navigation" => ("task", Some("navigation")),
    "action" => ("task", Some("action")),
    "login_task" => ("login", None),
    other if V2_BLOCK_TYPES.contains(&other) || V3_BLOCK_TYPES.contains(&other) => return Ok(()),
    _ => return Err(unmappable(block)),
  };

  block.insert("block_type".to_string(), Value::from(new_type));
  if let Some(kind) = task_kind {
    block.insert("task_kind".to_string(), Value::from(kind));
  }
  Ok(())
}

/// v2 -> v3: `for_loop` becomes `loop`, renaming its body and source fields.
fn rename_for_loop(block: &mut Map<String, Value>) -> Result<(), UpgradeError> {
  match block_type(block) {
    "for_loop" => {}
    other if V3_BLOCK_TYPES.contains(&other) => return Ok(()),
    _ => return Err(unmappable(block)),
  }

  block.insert("block_type".to_string(), Value::from("loop"));
  if let Some(children) = block.remove("loop_blocks") {
    block.insert("children".to_string(), children);
  }
  if let Some(source) = block.remove("loop_over_parameter_key") {
    block.insert("loop_over".to_string(), source);
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn v1_document() -> Value {
    json!({
      "version": 1,
      "title": "legacy",
      "blocks": [
        { "block_type": "navigation", "label": "open", "url": "https://example.com",
          "navigation_goal": "open the page" },
        { "block_type": "for_loop", "label": "each", "loop_over_parameter_key": "open_output",
          "loop_blocks": [
            { "block_type": "action", "label": "click", "navigation_goal": "click it" },
            { "block_type": "login_task", "label": "sign_in", "url": "https://example.com/login" }
          ] }
      ]
    })
  }

  #[test]
  fn test_identity_at_current_version() {
    let doc = json!({ "version": 3, "title": "t", "blocks": [{ "block_type": "anything" }] });
    let (upgraded, version) = upgrade(doc.clone(), CURRENT_VERSION).unwrap();
    assert_eq!(upgraded, doc);
    assert_eq!(version, CURRENT_VERSION);
  }

  #[test]
  fn test_upgrade_from_v1() {
    let (upgraded, version) = upgrade(v1_document(), 1).unwrap();
    assert_eq!(version, 3);
    assert_eq!(
      upgraded,
      json!({
        "version": 3,
        "title": "legacy",
        "blocks": [
          { "block_type": "task", "task_kind": "navigation", "label": "open",
            "url": "https://example.com", "navigation_goal": "open the page" },
          { "block_type": "loop", "label": "each", "loop_over": "open_output",
            "children": [
              { "block_type": "task", "task_kind": "action", "label": "click",
                "navigation_goal": "click it" },
              { "block_type": "login", "label": "sign_in", "url": "https://example.com/login" }
            ] }
        ]
      })
    );
  }

  #[test]
  fn test_upgrade_is_idempotent() {
    let (once, _) = upgrade(v1_document(), 1).unwrap();
    let (twice, _) = upgrade(once.clone(), 1).unwrap();
    assert_eq!(once, twice);
  }

  #[test]
  fn test_unmappable_block_fails_whole_upgrade() {
    let doc = json!({
      "version": 2,
      "title": "t",
      "blocks": [
        { "block_type": "goto_url", "label": "ok", "url": "x" },
        { "block_type": "conditional", "label": "c", "branches": [
          { "branch_id": "b1", "label": "If", "children": [
            { "block_type": "teleport", "label": "beam_me_up" }
          ] }
        ] }
      ]
    });
    let err = upgrade(doc, 2).unwrap_err();
    assert!(matches!(
      err,
      UpgradeError::UnmappableBlock { ref label, ref block_type }
        if label == "beam_me_up" && block_type == "teleport"
    ));
  }

  #[test]
  fn test_unknown_versions_are_rejected() {
    assert!(matches!(
      upgrade(json!({}), 0),
      Err(UpgradeError::UnknownVersion { version: 0 })
    ));
    assert!(matches!(
      upgrade(json!({}), 9),
      Err(UpgradeError::UnknownVersion { version: 9 })
    ));
  }
}
