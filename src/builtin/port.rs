/// Port and signal types for module interconnection

/// A wire/signal that carries data between modules.
/// Every signal carries its own valid flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wire<T: Clone> {
  pub value: T,
  pub valid: bool,
}

impl<T: Clone> Wire<T> {
  pub fn new(value: T) -> Self {
    Self { value, valid: false }
  }

  /// A wire already carrying a valid value.
  pub fn valid(value: T) -> Self {
    Self { value, valid: true }
  }

  pub fn set(&mut self, value: T) {
    self.value = value;
    self.valid = true;
  }

  pub fn clear(&mut self) {
    self.valid = false;
  }

  /// The carried value, only when the valid flag is raised.
  pub fn get(&self) -> Option<&T> {
    if self.valid {
      Some(&self.value)
    } else {
      None
    }
  }
}

impl<T: Clone + Default> Default for Wire<T> {
  fn default() -> Self {
    Self {
      value: T::default(),
      valid: false,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_wire_valid_flag() {
    let mut wire: Wire<i32> = Wire::default();
    assert_eq!(wire.get(), None);

    wire.set(7);
    assert_eq!(wire.get(), Some(&7));

    wire.clear();
    assert!(!wire.valid);
    // value is retained, only the qualifier drops
    assert_eq!(wire.value, 7);
  }
}
