/// Processing cell - one multiply-accumulate unit with a double-buffered weight
use super::{AccT, ElemT};
use crate::builtin::{Module, Wire};

/// Signals sampled by a cell on a clock edge
#[derive(Debug, Clone, Default)]
pub struct CellInput {
  /// Partial sum from the cell above (zero at the north edge)
  pub psum_in: AccT,
  /// Staged weight candidate
  pub weight_in: ElemT,
  /// Latch `weight_in` into the inactive register
  pub accept_weight: bool,
  /// Operand token from the cell to the west
  pub data_in: Wire<ElemT>,
  /// Switch pulse: promote the inactive weight before computing
  pub switch_in: bool,
  /// Row and column enable, both bits set
  pub enabled: bool,
}

/// Cell - registered, one cycle latency from input to output
#[derive(Debug, Clone)]
pub struct Cell {
  pub input: CellInput,

  // 双缓冲权重寄存器
  weight_active: ElemT,
  weight_inactive: ElemT,

  // 寄存输出
  psum_out: AccT,
  data_out: Wire<ElemT>,
  weight_out: ElemT,
  switch_out: bool,
}

impl Cell {
  pub fn new() -> Self {
    Self {
      input: CellInput::default(),
      weight_active: 0,
      weight_inactive: 0,
      psum_out: 0,
      data_out: Wire::default(),
      weight_out: 0,
      switch_out: false,
    }
  }

  pub fn weight_active(&self) -> ElemT {
    self.weight_active
  }

  pub fn weight_inactive(&self) -> ElemT {
    self.weight_inactive
  }

  pub fn psum_out(&self) -> AccT {
    self.psum_out
  }

  pub fn data_out(&self) -> &Wire<ElemT> {
    &self.data_out
  }

  /// Staged weight as seen by the next cell south, one cycle after it was latched
  pub fn weight_out(&self) -> ElemT {
    self.weight_out
  }

  pub fn switch_out(&self) -> bool {
    self.switch_out
  }
}

impl Default for Cell {
  fn default() -> Self {
    Self::new()
  }
}

impl Module for Cell {
  fn run(&mut self) {
    let input = &self.input;

    // Switch promotes the value staged before this edge, even if a new weight
    // is accepted on the same edge.
    let staged = self.weight_inactive;
    if input.accept_weight {
      self.weight_inactive = input.weight_in;
    }
    if input.switch_in {
      self.weight_active = staged;
    }

    let mac = (input.data_in.value as AccT)
      .wrapping_mul(self.weight_active as AccT)
      .wrapping_add(input.psum_in);

    if input.enabled {
      // bubble: the partial sum rides through untouched
      self.psum_out = if input.data_in.valid { mac } else { input.psum_in };
      self.data_out = input.data_in.clone();
      self.switch_out = input.switch_in;
    } else {
      self.psum_out = 0;
      self.data_out = Wire::new(0);
      self.switch_out = false;
    }
    self.weight_out = self.weight_inactive;
  }

  fn reset(&mut self) {
    *self = Self::new();
  }

  fn name(&self) -> &str {
    "cell"
  }
}
