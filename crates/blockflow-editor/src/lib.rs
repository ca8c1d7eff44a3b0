//! Blockflow Editor
//!
//! Ties the graph editor, the layout engine and the codec together into an
//! editing [`Session`]. Edits arrive as serializable [`EditCommand`]s; the
//! session commits them, keeps the layout current and exports snapshots for
//! the save worker.

mod command;
mod config;
mod session;

pub use command::{EditCommand, EditOutcome, apply_edit};
pub use config::{ConfigError, EditorConfig};
pub use session::{Session, SessionError};
