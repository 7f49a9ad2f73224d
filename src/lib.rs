pub mod arch;
pub mod builtin;
pub mod config;
pub mod simulator;

pub use arch::tpu::{TaskDescriptor, Tpu};
pub use crate::config::TpuConfig;
pub use simulator::sim::mode::{SimConfig, StepMode};
pub use simulator::utils::log;
