/// Systolic array - W×W mesh of cells with edge skew registers
use super::cell::{Cell, CellInput};
use super::{lane_enabled, lane_mask, AccT, ElemT};
use crate::builtin::{Delay, Module, Wire};

/// Weight-load token travelling south through one column
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WeightToken {
  pub value: ElemT,
  /// Destination row; only the cell in this row latches the value
  pub row: usize,
}

/// Signals presented at the array edges for one cycle
#[derive(Debug, Clone, Default)]
pub struct ArrayInput {
  /// West edge, one operand token per row. Missing lanes are bubbles.
  pub west: Vec<Wire<ElemT>>,
  /// North edge, one weight token per column
  pub north: Vec<Wire<WeightToken>>,
  /// Switch pulse presented at every column entry
  pub switch: bool,
}

impl ArrayInput {
  /// Present an operand row. Lane `r` is valid only when bit `r` of `mask` is set.
  pub fn with_operands(mut self, row: &[ElemT], mask: u64) -> Self {
    self.west = row
      .iter()
      .enumerate()
      .map(|(r, &value)| Wire {
        value,
        valid: lane_enabled(mask, r),
      })
      .collect();
    self
  }

  /// Present one row of a weight block, tagged with its destination row index.
  pub fn with_weights(mut self, row: &[ElemT], row_index: usize) -> Self {
    self.north = row
      .iter()
      .map(|&value| Wire::valid(WeightToken { value, row: row_index }))
      .collect();
    self
  }

  pub fn with_switch(mut self) -> Self {
    self.switch = true;
    self
  }
}

/// Systolic Array
///
/// Operand row `p` presented in cycle `n` meets cell `(r, c)` in cycle `n + r + c`,
/// the same cycle a switch pulse presented in cycle `n` reaches that cell. The
/// result row is visible at the south edge `pipeline_depth(W)` cycles after the
/// operand row was presented.
#[derive(Clone)]
pub struct Array {
  width: usize,

  // 输入
  pub input: ArrayInput,

  cells: Vec<Vec<Cell>>,
  // token leaving cell (r, c) towards (r+1, c)
  load_pipe: Vec<Vec<Wire<WeightToken>>>,

  // 边沿寄存器
  west_skew: Vec<Delay<Wire<ElemT>>>,
  north_skew: Vec<Delay<(Wire<WeightToken>, bool)>>,
  south_deskew: Vec<Delay<AccT>>,

  // 输出
  south: Vec<AccT>,

  row_mask: u64,
  col_mask: u64,
  col_size: usize,
}

impl Array {
  pub fn new(width: usize) -> Self {
    let width = width.max(1);
    Self {
      width,
      input: ArrayInput::default(),
      cells: (0..width).map(|_| (0..width).map(|_| Cell::new()).collect()).collect(),
      load_pipe: vec![vec![Wire::default(); width]; width],
      west_skew: (0..width).map(Delay::new).collect(),
      north_skew: (0..width).map(Delay::new).collect(),
      south_deskew: (0..width).map(|c| Delay::new(width - 1 - c)).collect(),
      south: vec![0; width],
      row_mask: lane_mask(width),
      col_mask: lane_mask(width),
      col_size: width,
    }
  }

  pub fn width(&self) -> usize {
    self.width
  }

  /// Result row currently visible at the south edge
  pub fn south(&self) -> &[AccT] {
    &self.south
  }

  pub fn row_mask(&self) -> u64 {
    self.row_mask
  }

  pub fn col_mask(&self) -> u64 {
    self.col_mask
  }

  pub fn col_size(&self) -> usize {
    self.col_size
  }

  /// Rows with a cleared bit are disabled.
  pub fn set_row_mask(&mut self, mask: u64) {
    self.row_mask = mask & lane_mask(self.width);
  }

  /// Columns with a cleared bit are disabled.
  pub fn set_col_mask(&mut self, mask: u64) {
    self.col_mask = mask & lane_mask(self.width);
  }

  /// Number of columns that accept weight tokens at the north edge
  pub fn set_col_size(&mut self, size: usize) {
    self.col_size = size.min(self.width);
  }

  pub fn active_weights(&self) -> Vec<Vec<ElemT>> {
    self.cells.iter().map(|row| row.iter().map(|cell| cell.weight_active()).collect()).collect()
  }

  pub fn staged_weights(&self) -> Vec<Vec<ElemT>> {
    self.cells.iter().map(|row| row.iter().map(|cell| cell.weight_out()).collect()).collect()
  }
}

impl Module for Array {
  fn run(&mut self) {
    let w = self.width;

    let west: Vec<Wire<ElemT>> = (0..w)
      .map(|r| {
        let lane = self.input.west.get(r).cloned().unwrap_or_default();
        self.west_skew[r].push(lane)
      })
      .collect();

    let north: Vec<(Wire<WeightToken>, bool)> = (0..w)
      .map(|c| {
        let mut token = self.input.north.get(c).cloned().unwrap_or_default();
        if c >= self.col_size {
          token.clear();
        }
        self.north_skew[c].push((token, self.input.switch))
      })
      .collect();

    // Reverse order: every cell reads its north and west neighbours before they
    // commit this cycle's outputs.
    for r in (0..w).rev() {
      for c in (0..w).rev() {
        let data_in = if c == 0 {
          west[r].clone()
        } else {
          self.cells[r][c - 1].data_out().clone()
        };
        let psum_in = if r == 0 { 0 } else { self.cells[r - 1][c].psum_out() };
        let (token, switch_in) = if r == 0 {
          north[c].clone()
        } else {
          (self.load_pipe[r - 1][c].clone(), self.cells[r - 1][c].switch_out())
        };

        let cell = &mut self.cells[r][c];
        cell.input = CellInput {
          psum_in,
          weight_in: token.value.value,
          accept_weight: token.valid && token.value.row == r,
          data_in,
          switch_in,
          enabled: lane_enabled(self.row_mask, r) && lane_enabled(self.col_mask, c),
        };
        cell.run();
        self.load_pipe[r][c] = token;
      }
    }

    for c in 0..w {
      self.south[c] = self.south_deskew[c].push(self.cells[w - 1][c].psum_out());
    }
  }

  fn reset(&mut self) {
    for cell in self.cells.iter_mut().flatten() {
      cell.reset();
    }
    for token in self.load_pipe.iter_mut().flatten() {
      *token = Wire::default();
    }
    self.west_skew.iter_mut().for_each(Delay::clear);
    self.north_skew.iter_mut().for_each(Delay::clear);
    self.south_deskew.iter_mut().for_each(Delay::clear);
    self.input = ArrayInput::default();
    self.south.fill(0);
    self.row_mask = lane_mask(self.width);
    self.col_mask = lane_mask(self.width);
    self.col_size = self.width;
  }

  fn name(&self) -> &str {
    "systolic_array"
  }
}
