pub mod array;
pub mod bias;
pub mod buffer;
pub mod cell;
pub mod model;
pub mod sequencer;
pub mod tpu;

pub use array::{Array, ArrayInput};
pub use bias::BiasStage;
pub use buffer::{ReadPort, UnifiedBuffer};
pub use cell::Cell;
pub use model::{create_simulation, TpuModel};
pub use sequencer::{Sequencer, SequencerOutput, TaskDescriptor};
pub use tpu::Tpu;

// Type aliases
pub type ElemT = i8;
pub type AccT = i32;
pub type RegT = u64;

/// Contiguous mask with the `n` low bits set.
pub fn lane_mask(n: usize) -> u64 {
  if n >= 64 {
    u64::MAX
  } else {
    (1u64 << n) - 1
  }
}

/// Whether lane `lane` is set in `mask`.
pub fn lane_enabled(mask: u64, lane: usize) -> bool {
  lane < 64 && (mask >> lane) & 1 == 1
}

/// Output-pipeline depth of a W-wide array: cycles from presenting a row at the
/// west edge to its result row being visible at the south edge.
///
/// Lane `r` is skewed by `r` cycles, crosses `W` cells in its column on the way
/// down and `c` cells on the way east, and column `c` is deskewed by `W-1-c`.
pub fn pipeline_depth(width: usize) -> u64 {
  (2 * width.max(1) - 1) as u64
}
