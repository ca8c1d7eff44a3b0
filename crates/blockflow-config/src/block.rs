use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::enums::{FileType, HttpMethod, TaskKind};

/// One block of a portable definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockDescriptor {
  pub label: String,
  #[serde(default)]
  pub continue_on_failure: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub model: Option<String>,
  #[serde(flatten)]
  pub body: BlockBody,
}

/// Type-specific fields of a block, tagged by `block_type`.
///
/// Container blocks embed their bodies inline: a loop carries its `children`,
/// a conditional carries one child list per branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "block_type", rename_all = "snake_case")]
pub enum BlockBody {
  Task(TaskBlock),
  Loop {
    #[serde(flatten)]
    attributes: LoopBlock,
    #[serde(default)]
    children: Vec<BlockDescriptor>,
  },
  Conditional {
    branches: Vec<BranchDescriptor>,
  },
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

/// A conditional branch together with the blocks it runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchDescriptor {
  #[serde(flatten)]
  pub branch: Branch,
  #[serde(default)]
  pub children: Vec<BlockDescriptor>,
}

/// One alternative path of a conditional block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Branch {
  pub branch_id: String,
  pub label: String,
  /// Criteria evaluated by the backend; `None` for the default branch.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub expression: Option<String>,
  /// Label of the block where this branch rejoins the main chain.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub merge_label: Option<String>,
  #[serde(default)]
  pub is_default: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskBlock {
  pub task_kind: TaskKind,
  pub url: String,
  pub navigation_goal: String,
  pub data_extraction_goal: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub data_schema: Option<serde_json::Value>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub max_retries: Option<u32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub complete_criterion: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub terminate_criterion: Option<String>,
  pub parameter_keys: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopBlock {
  /// Parameter key (or block output key) holding the list to iterate.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub loop_over: Option<String>,
  pub complete_if_empty: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodeBlock {
  pub code: String,
  pub parameter_keys: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextPromptBlock {
  pub prompt: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub json_schema: Option<serde_json::Value>,
  pub parameter_keys: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpRequestBlock {
  pub method: HttpMethod,
  pub url: String,
  pub headers: BTreeMap<String, String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub body: Option<serde_json::Value>,
  pub timeout_secs: u32,
  pub parameter_keys: Vec<String>,
}

impl Default for HttpRequestBlock {
  fn default() -> Self {
    Self {
      method: HttpMethod::Get,
      url: String::new(),
      headers: BTreeMap::new(),
      body: None,
      timeout_secs: 30,
      parameter_keys: Vec::new(),
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionBlock {
  pub url: String,
  pub data_extraction_goal: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub data_schema: Option<serde_json::Value>,
  pub parameter_keys: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileDownloadBlock {
  pub url: String,
  pub navigation_goal: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub download_suffix: Option<String>,
  pub parameter_keys: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginBlock {
  pub url: String,
  pub navigation_goal: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub totp_identifier: Option<String>,
  pub parameter_keys: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SendEmailBlock {
  pub recipients: Vec<String>,
  pub subject: String,
  pub body: String,
  pub file_attachments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitBlock {
  pub wait_sec: u32,
}

impl Default for WaitBlock {
  fn default() -> Self {
    Self { wait_sec: 5 }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GotoUrlBlock {
  pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfParserBlock {
  pub file_url: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub json_schema: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileParserBlock {
  pub file_url: String,
  pub file_type: FileType,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationBlock {
  pub complete_criterion: String,
  pub terminate_criterion: String,
  pub parameter_keys: Vec<String>,
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_leaf_block_flattens_fields() {
    let block = BlockDescriptor {
      label: "block_1".to_string(),
      continue_on_failure: false,
      model: None,
      body: BlockBody::GotoUrl(GotoUrlBlock {
        url: "https://example.com".to_string(),
      }),
    };

    assert_eq!(
      serde_json::to_value(&block).unwrap(),
      json!({
        "label": "block_1",
        "continue_on_failure": false,
        "block_type": "goto_url",
        "url": "https://example.com"
      })
    );
  }

  #[test]
  fn test_loop_block_embeds_children() {
    let value = json!({
      "block_type": "loop",
      "label": "block_1",
      "loop_over": "urls",
      "children": [
        { "block_type": "wait", "label": "block_2", "wait_sec": 2 }
      ]
    });

    let block: BlockDescriptor = serde_json::from_value(value).unwrap();
    match block.body {
      BlockBody::Loop {
        attributes,
        children,
      } => {
        assert_eq!(attributes.loop_over.as_deref(), Some("urls"));
        assert!(!attributes.complete_if_empty);
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].label, "block_2");
        assert_eq!(children[0].body, BlockBody::Wait(WaitBlock { wait_sec: 2 }));
      }
      other => panic!("expected loop, got {:?}", other),
    }
  }

  #[test]
  fn test_conditional_branches_embed_children() {
    let value = json!({
      "block_type": "conditional",
      "label": "block_1",
      "branches": [
        {
          "branch_id": "branch_1",
          "label": "If",
          "expression": "{{ block_0_output.ok }}",
          "children": [{ "block_type": "goto_url", "label": "block_2", "url": "" }]
        },
        { "branch_id": "branch_2", "label": "Else", "is_default": true }
      ]
    });

    let block: BlockDescriptor = serde_json::from_value(value).unwrap();
    let BlockBody::Conditional { branches } = block.body else {
      panic!("expected conditional");
    };
    assert_eq!(branches.len(), 2);
    assert_eq!(branches[0].children.len(), 1);
    assert!(branches[1].branch.is_default);
    assert!(branches[1].children.is_empty());
  }

  #[test]
  fn test_defaults_fill_missing_fields() {
    let block: BlockDescriptor = serde_json::from_value(json!({
      "block_type": "http_request",
      "label": "block_1"
    }))
    .unwrap();

    assert_eq!(
      block.body,
      BlockBody::HttpRequest(HttpRequestBlock::default())
    );
  }
}
