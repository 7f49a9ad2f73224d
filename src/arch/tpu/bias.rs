/// Bias stage - adds the C row to the array output
use super::{lane_enabled, AccT};
use crate::builtin::{Module, Wire};

/// Bias Stage
///
/// Registered, one result row per cycle. A row is emitted (and `writeback_valid`
/// raised) whenever at least one lane is valid; invalid lanes read as zero.
#[derive(Clone)]
pub struct BiasStage {
  width: usize,

  // 输入
  pub psum: Vec<AccT>,
  pub bias: Vec<AccT>,
  pub mask: u64,

  // 输出
  pub out: Wire<Vec<AccT>>,
}

impl BiasStage {
  pub fn new(width: usize) -> Self {
    Self {
      width,
      psum: vec![0; width],
      bias: vec![0; width],
      mask: 0,
      out: Wire::new(vec![0; width]),
    }
  }

  pub fn writeback_valid(&self) -> bool {
    self.out.valid
  }
}

impl Module for BiasStage {
  fn run(&mut self) {
    if (0..self.width).any(|lane| lane_enabled(self.mask, lane)) {
      let row = (0..self.width)
        .map(|lane| {
          if lane_enabled(self.mask, lane) {
            let psum = self.psum.get(lane).copied().unwrap_or(0);
            let bias = self.bias.get(lane).copied().unwrap_or(0);
            psum.wrapping_add(bias)
          } else {
            0
          }
        })
        .collect();
      self.out.set(row);
    } else {
      self.out.clear();
    }
    self.mask = 0;
  }

  fn reset(&mut self) {
    *self = Self::new(self.width);
  }

  fn name(&self) -> &str {
    "bias_stage"
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_masked_add() {
    let mut stage = BiasStage::new(3);
    stage.psum = vec![10, 20, 30];
    stage.bias = vec![1, 2, 3];
    stage.mask = 0b011;
    stage.run();
    assert!(stage.writeback_valid());
    assert_eq!(stage.out.value, vec![11, 22, 0]);

    // mask is consumed, no pulse without a new bias row
    stage.run();
    assert!(!stage.writeback_valid());
  }

  #[test]
  fn test_wrapping_add() {
    let mut stage = BiasStage::new(1);
    stage.psum = vec![i32::MAX];
    stage.bias = vec![1];
    stage.mask = 0b1;
    stage.run();
    assert_eq!(stage.out.value, vec![i32::MIN]);
  }
}
