pub mod delay;
pub mod port;

pub use delay::Delay;
pub use port::Wire;

/// A clocked hardware block.
///
/// `run` advances the block by one clock edge: it consumes the inputs that were
/// latched during the previous cycle and produces the registered outputs that
/// neighbours will observe during the next one.
pub trait Module {
  fn run(&mut self);
  fn reset(&mut self);
  fn name(&self) -> &str;
}
