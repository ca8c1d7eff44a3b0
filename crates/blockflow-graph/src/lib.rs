//! The block graph and the structural edits over it.
//!
//! A [`BlockGraph`] holds start markers, insertion markers and user blocks
//! joined by sequential edges. Loops and conditionals own a nested body with
//! its own start and insertion marker; a conditional's body is split into one
//! chain per branch by tagging edges with a [`BranchTag`].
//!
//! Graphs are values. Every [`GraphEditor`] operation consumes a graph and
//! returns the edited one, keeping labels unique and output references
//! pointing at existing blocks.

mod edge;
mod editor;
mod error;
mod graph;
mod label;
mod node;
mod references;
mod registry;
mod validate;

pub use edge::{BranchTag, Edge, EdgeKind};
pub use editor::{Anchor, GraphEditor, InsertionPoint, RecordedBlock};
pub use error::GraphError;
pub use graph::{BlockGraph, Scope};
pub use label::{LabelAllocator, LabelBatch};
pub use node::{Block, BlockKind, BlockNode, ConditionalBlock, Node, NodeId, NodeKind};
pub use references::{
  DanglingReference, ReferenceMap, dangling_references, prune_dangling_references,
  prune_references, rewrite_references, scan_references,
};
pub use registry::{FieldPath, KeyRef};
pub use validate::validate;
