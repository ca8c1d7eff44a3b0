mod config;
mod engine;
mod geometry;

pub use config::LayoutConfig;
pub use engine::{Layout, LayoutEngine, NodeLayout};
pub use geometry::{Position, Size};
