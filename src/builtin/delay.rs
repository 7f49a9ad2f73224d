/// Fixed-length register chain
use std::collections::VecDeque;

/// A chain of `len` registers. `push` shifts a new value in and returns the one
/// that entered `len` cycles earlier; a zero-length chain is a plain wire.
#[derive(Debug, Clone)]
pub struct Delay<T: Clone + Default> {
  regs: VecDeque<T>,
}

impl<T: Clone + Default> Delay<T> {
  pub fn new(len: usize) -> Self {
    Self {
      regs: std::iter::repeat(T::default()).take(len).collect(),
    }
  }

  pub fn len(&self) -> usize {
    self.regs.len()
  }

  pub fn is_empty(&self) -> bool {
    self.regs.is_empty()
  }

  pub fn push(&mut self, value: T) -> T {
    self.regs.push_back(value);
    // len >= 1 after the push, so pop_front never misses
    self.regs.pop_front().unwrap_or_default()
  }

  pub fn clear(&mut self) {
    for reg in self.regs.iter_mut() {
      *reg = T::default();
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_zero_length_is_a_wire() {
    let mut d: Delay<u8> = Delay::new(0);
    assert_eq!(d.push(5), 5);
    assert!(d.is_empty());
  }

  #[test]
  fn test_delay_and_clear() {
    let mut d: Delay<u8> = Delay::new(2);
    assert_eq!(d.push(1), 0);
    assert_eq!(d.push(2), 0);
    assert_eq!(d.push(3), 1);
    d.clear();
    assert_eq!(d.push(4), 0);
    assert_eq!(d.len(), 2);
  }
}
