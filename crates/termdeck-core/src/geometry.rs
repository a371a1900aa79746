//! Geometry types for terminal sizes and pane placement.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Dimensions of a terminal viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct Dimensions {
    /// Number of rows
    pub rows: u16,
    /// Number of columns
    pub cols: u16,
}

impl Dimensions {
    /// Create new dimensions.
    pub fn new(rows: u16, cols: u16) -> Self {
        Self { rows, cols }
    }

    /// Whether both axes are non-zero.
    pub fn is_valid(&self) -> bool {
        self.rows > 0 && self.cols > 0
    }
}

impl Default for Dimensions {
    fn default() -> Self {
        Self::new(24, 80)
    }
}

/// Axis along which panes are split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SplitDirection {
    /// Panes side by side
    Horizontal,
    /// Panes stacked top to bottom
    Vertical,
}

/// Where the host surface lives, used to pick a split direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum LocationHint {
    /// Bottom panel: wide and short
    Panel,
    /// Editor area: wide
    Editor,
    /// Side bar: narrow and tall
    Sidebar,
    /// Secondary side bar
    Auxiliary,
    /// Unknown placement
    Unknown,
}
