use serde::{Deserialize, Serialize};

use crate::geometry::Size;

/// Layout parameters, in logical layout units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
  /// Vertical gap between consecutive nodes of a chain.
  pub spacing: f64,
  /// Horizontal space between a container's edge and its body.
  pub margin_x: f64,
  /// Space above a container's body, under the container header.
  pub margin_top: f64,
  pub margin_bottom: f64,
  /// Extent of a block whose size has not been measured.
  pub default_block_size: Size,
  /// Extent of start and insertion markers that have not been measured.
  pub marker_size: Size,
}

impl Default for LayoutConfig {
  fn default() -> Self {
    Self {
      spacing: 40.0,
      margin_x: 24.0,
      margin_top: 60.0,
      margin_bottom: 24.0,
      default_block_size: Size::new(280.0, 72.0),
      marker_size: Size::new(24.0, 24.0),
    }
  }
}
