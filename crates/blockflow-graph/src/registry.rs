//! Per-kind knowledge about blocks.
//!
//! Every table here is an exhaustive match over [`Block`], so adding a block
//! kind fails to compile until its default attributes, reference-bearing
//! fields and required fields are declared.

use std::fmt;

use blockflow_config::{
  Branch, CodeBlock, ExtractionBlock, FileDownloadBlock, FileParserBlock, GotoUrlBlock,
  HttpRequestBlock, LoginBlock, LoopBlock, PdfParserBlock, SendEmailBlock, TaskBlock,
  TextPromptBlock, ValidationBlock, WaitBlock, output_key, output_label,
};
use serde::{Deserialize, Serialize};

use crate::node::{Block, BlockKind, ConditionalBlock};

/// Location of a reference-bearing attribute inside a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldPath {
  /// An entry of `parameter_keys`.
  ParameterKey(usize),
  LoopOver,
  /// `merge_label` of the branch at this index.
  MergeLabel(usize),
}

impl fmt::Display for FieldPath {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      FieldPath::ParameterKey(i) => write!(f, "parameter_keys[{i}]"),
      FieldPath::LoopOver => f.write_str("loop_over"),
      FieldPath::MergeLabel(i) => write!(f, "branches[{i}].merge_label"),
    }
  }
}

/// A key held by a reference-bearing field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRef<'a> {
  /// References the output of the block with this label.
  Output(&'a str),
  /// References a workflow parameter.
  Parameter(&'a str),
  /// Names a block label directly.
  Label(&'a str),
}

impl<'a> KeyRef<'a> {
  fn classify(key: &'a str) -> Self {
    match output_label(key) {
      Some(label) => KeyRef::Output(label),
      None => KeyRef::Parameter(key),
    }
  }

  /// The block label this key depends on, if any.
  pub fn label(self) -> Option<&'a str> {
    match self {
      KeyRef::Output(label) | KeyRef::Label(label) => Some(label),
      KeyRef::Parameter(_) => None,
    }
  }
}

impl Default for ConditionalBlock {
  fn default() -> Self {
    Self {
      branches: vec![
        Branch {
          branch_id: "branch_1".to_string(),
          label: "If".to_string(),
          expression: Some(String::new()),
          merge_label: None,
          is_default: false,
        },
        Branch {
          branch_id: "branch_2".to_string(),
          label: "Else".to_string(),
          expression: None,
          merge_label: None,
          is_default: true,
        },
      ],
      active_branch_id: "branch_1".to_string(),
    }
  }
}

impl Block {
  /// Default attributes for a freshly created block of `kind`.
  pub fn default_for(kind: BlockKind) -> Self {
    match kind {
      BlockKind::Task => Block::Task(TaskBlock::default()),
      BlockKind::Loop => Block::Loop(LoopBlock::default()),
      BlockKind::Conditional => Block::Conditional(ConditionalBlock::default()),
      BlockKind::Code => Block::Code(CodeBlock::default()),
      BlockKind::TextPrompt => Block::TextPrompt(TextPromptBlock::default()),
      BlockKind::HttpRequest => Block::HttpRequest(HttpRequestBlock::default()),
      BlockKind::Extraction => Block::Extraction(ExtractionBlock::default()),
      BlockKind::FileDownload => Block::FileDownload(FileDownloadBlock::default()),
      BlockKind::Login => Block::Login(LoginBlock::default()),
      BlockKind::SendEmail => Block::SendEmail(SendEmailBlock::default()),
      BlockKind::Wait => Block::Wait(WaitBlock::default()),
      BlockKind::GotoUrl => Block::GotoUrl(GotoUrlBlock::default()),
      BlockKind::PdfParser => Block::PdfParser(PdfParserBlock::default()),
      BlockKind::FileParser => Block::FileParser(FileParserBlock::default()),
      BlockKind::Validation => Block::Validation(ValidationBlock::default()),
    }
  }

  pub fn kind(&self) -> BlockKind {
    match self {
      Block::Task(_) => BlockKind::Task,
      Block::Loop(_) => BlockKind::Loop,
      Block::Conditional(_) => BlockKind::Conditional,
      Block::Code(_) => BlockKind::Code,
      Block::TextPrompt(_) => BlockKind::TextPrompt,
      Block::HttpRequest(_) => BlockKind::HttpRequest,
      Block::Extraction(_) => BlockKind::Extraction,
      Block::FileDownload(_) => BlockKind::FileDownload,
      Block::Login(_) => BlockKind::Login,
      Block::SendEmail(_) => BlockKind::SendEmail,
      Block::Wait(_) => BlockKind::Wait,
      Block::GotoUrl(_) => BlockKind::GotoUrl,
      Block::PdfParser(_) => BlockKind::PdfParser,
      Block::FileParser(_) => BlockKind::FileParser,
      Block::Validation(_) => BlockKind::Validation,
    }
  }

  pub fn parameter_keys(&self) -> &[String] {
    match self {
      Block::Task(b) => &b.parameter_keys,
      Block::Code(b) => &b.parameter_keys,
      Block::TextPrompt(b) => &b.parameter_keys,
      Block::HttpRequest(b) => &b.parameter_keys,
      Block::Extraction(b) => &b.parameter_keys,
      Block::FileDownload(b) => &b.parameter_keys,
      Block::Login(b) => &b.parameter_keys,
      Block::Validation(b) => &b.parameter_keys,
      Block::Loop(_)
      | Block::Conditional(_)
      | Block::SendEmail(_)
      | Block::Wait(_)
      | Block::GotoUrl(_)
      | Block::PdfParser(_)
      | Block::FileParser(_) => &[],
    }
  }

  fn parameter_keys_mut(&mut self) -> Option<&mut Vec<String>> {
    match self {
      Block::Task(b) => Some(&mut b.parameter_keys),
      Block::Code(b) => Some(&mut b.parameter_keys),
      Block::TextPrompt(b) => Some(&mut b.parameter_keys),
      Block::HttpRequest(b) => Some(&mut b.parameter_keys),
      Block::Extraction(b) => Some(&mut b.parameter_keys),
      Block::FileDownload(b) => Some(&mut b.parameter_keys),
      Block::Login(b) => Some(&mut b.parameter_keys),
      Block::Validation(b) => Some(&mut b.parameter_keys),
      Block::Loop(_)
      | Block::Conditional(_)
      | Block::SendEmail(_)
      | Block::Wait(_)
      | Block::GotoUrl(_)
      | Block::PdfParser(_)
      | Block::FileParser(_) => None,
    }
  }

  /// Every reference-bearing field of this block with the key it holds.
  pub fn references(&self) -> Vec<(FieldPath, KeyRef<'_>)> {
    let mut refs: Vec<(FieldPath, KeyRef<'_>)> = self
      .parameter_keys()
      .iter()
      .enumerate()
      .map(|(i, key)| (FieldPath::ParameterKey(i), KeyRef::classify(key)))
      .collect();

    match self {
      Block::Loop(l) => {
        if let Some(key) = &l.loop_over {
          refs.push((FieldPath::LoopOver, KeyRef::classify(key)));
        }
      }
      Block::Conditional(c) => {
        for (i, branch) in c.branches.iter().enumerate() {
          if let Some(label) = &branch.merge_label {
            refs.push((FieldPath::MergeLabel(i), KeyRef::Label(label)));
          }
        }
      }
      _ => {}
    }

    refs
  }

  /// Clear every field that depends on `label`. Returns whether anything changed.
  pub(crate) fn clear_label_references(&mut self, label: &str) -> bool {
    self.retain_labels(|l| l != label)
  }

  /// Clear every field whose label dependency fails `keep`.
  pub(crate) fn retain_labels(&mut self, keep: impl Fn(&str) -> bool) -> bool {
    let mut changed = false;

    if let Some(keys) = self.parameter_keys_mut() {
      let before = keys.len();
      keys.retain(|key| output_label(key).is_none_or(|l| keep(l)));
      changed |= keys.len() != before;
    }

    match self {
      Block::Loop(l) => {
        if l
          .loop_over
          .as_deref()
          .and_then(output_label)
          .is_some_and(|l| !keep(l))
        {
          l.loop_over = None;
          changed = true;
        }
      }
      Block::Conditional(c) => {
        for branch in &mut c.branches {
          if branch.merge_label.as_deref().is_some_and(|l| !keep(l)) {
            branch.merge_label = None;
            changed = true;
          }
        }
      }
      _ => {}
    }

    changed
  }

  /// Point every field that depends on `old` at `new` instead.
  pub(crate) fn rename_label_references(&mut self, old: &str, new: &str) -> bool {
    let mut changed = false;
    let old_key = output_key(old);
    let new_key = output_key(new);

    if let Some(keys) = self.parameter_keys_mut() {
      for key in keys.iter_mut().filter(|k| **k == old_key) {
        *key = new_key.clone();
        changed = true;
      }
    }

    match self {
      Block::Loop(l) => {
        if l.loop_over.as_deref() == Some(old_key.as_str()) {
          l.loop_over = Some(new_key);
          changed = true;
        }
      }
      Block::Conditional(c) => {
        for branch in &mut c.branches {
          if branch.merge_label.as_deref() == Some(old) {
            branch.merge_label = Some(new.to_string());
            changed = true;
          }
        }
      }
      _ => {}
    }

    changed
  }

  /// Names of required attributes that are currently empty.
  pub fn missing_required_fields(&self) -> Vec<String> {
    let mut missing = Vec::new();
    let mut require = |empty: bool, field: &str| {
      if empty {
        missing.push(field.to_string());
      }
    };

    match self {
      Block::Task(b) => require(
        b.navigation_goal.trim().is_empty() && b.data_extraction_goal.trim().is_empty(),
        "navigation_goal",
      ),
      Block::Loop(b) => require(b.loop_over.is_none(), "loop_over"),
      Block::Conditional(b) => {
        for (i, branch) in b.branches.iter().enumerate() {
          require(
            !branch.is_default && branch.expression.as_deref().is_none_or(|e| e.trim().is_empty()),
            &format!("branches[{i}].expression"),
          );
        }
      }
      Block::Code(b) => require(b.code.trim().is_empty(), "code"),
      Block::TextPrompt(b) => require(b.prompt.trim().is_empty(), "prompt"),
      Block::HttpRequest(b) => require(b.url.trim().is_empty(), "url"),
      Block::Extraction(b) => require(b.data_extraction_goal.trim().is_empty(), "data_extraction_goal"),
      Block::FileDownload(b) => require(b.navigation_goal.trim().is_empty(), "navigation_goal"),
      Block::Login(b) => require(b.url.trim().is_empty(), "url"),
      Block::SendEmail(b) => {
        require(b.recipients.is_empty(), "recipients");
        require(b.subject.trim().is_empty(), "subject");
      }
      Block::Wait(b) => require(b.wait_sec == 0, "wait_sec"),
      Block::GotoUrl(b) => require(b.url.trim().is_empty(), "url"),
      Block::PdfParser(b) => require(b.file_url.trim().is_empty(), "file_url"),
      Block::FileParser(b) => require(b.file_url.trim().is_empty(), "file_url"),
      Block::Validation(b) => require(
        b.complete_criterion.trim().is_empty() && b.terminate_criterion.trim().is_empty(),
        "complete_criterion",
      ),
    }

    missing
  }
}
