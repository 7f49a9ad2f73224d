/// TPU configuration parameters

use serde::{Deserialize, Serialize};

/// Widest array the lane masks can describe (one bit per row/column in a `u64`).
pub const MAX_ARRAY_WIDTH: usize = 64;

/// TPU configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TpuConfig {
  /// Array width W (the array is W×W cells, storage rows are W lanes wide)
  pub width: usize,
  /// Number of task descriptors that may be resident in the sequencer at once
  pub queue_depth: usize,
  /// Unified buffer depth in rows
  pub buffer_rows: usize,
}

impl TpuConfig {
  /// Create the default configuration
  pub fn new() -> Self {
    Self {
      width: 4,
      queue_depth: 4,
      buffer_rows: 256,
    }
  }

  /// Default configuration with a custom array width
  pub fn with_width(width: usize) -> Self {
    Self {
      width,
      ..Self::new()
    }
  }
}

impl Default for TpuConfig {
  fn default() -> Self {
    Self::new()
  }
}
