//! Blockflow Config
//!
//! This crate contains the serializable "portable definition" types for
//! Blockflow. A portable definition is what the editor saves, what the
//! execution backend consumes, and what the editor loads back into a block
//! graph.
//!
//! Definitions are versioned. Documents written by older editors are migrated
//! by `blockflow-codec` before they are deserialized into these types, so the
//! types here always describe [`CURRENT_VERSION`].
//!
//! ```json
//! {
//!   "version": 3,
//!   "title": "Download invoices",
//!   "parameters": [
//!     { "parameter_type": "workflow", "key": "start_url", "workflow_parameter_type": "string" }
//!   ],
//!   "blocks": [
//!     { "block_type": "goto_url", "label": "block_1", "url": "https://example.com" },
//!     {
//!       "block_type": "loop",
//!       "label": "block_2",
//!       "loop_over": "block_1_output",
//!       "children": [
//!         { "block_type": "file_download", "label": "block_3", "url": "", "navigation_goal": "" }
//!       ]
//!     }
//!   ]
//! }
//! ```

mod block;
mod definition;
mod enums;
mod parameter;

pub use block::{
  BlockBody, BlockDescriptor, Branch, BranchDescriptor, CodeBlock, ExtractionBlock,
  FileDownloadBlock, FileParserBlock, GotoUrlBlock, HttpRequestBlock, LoginBlock, LoopBlock,
  PdfParserBlock, SendEmailBlock, TaskBlock, TextPromptBlock, ValidationBlock, WaitBlock,
};
pub use definition::{CURRENT_VERSION, OUTPUT_SUFFIX, WorkflowDefinition, output_key, output_label};
pub use enums::{FileType, HttpMethod, TaskKind, WorkflowParameterType};
pub use parameter::ParameterDescriptor;
