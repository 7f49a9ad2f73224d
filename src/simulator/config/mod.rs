pub mod config;
pub mod workload;

pub use self::config::{load_and_merge_configs, AppConfig, CliOverrides};
pub use workload::{load_workload, Workload};
