use ::config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;

use crate::config::{TpuConfig, MAX_ARRAY_WIDTH};
use crate::simulator::sim::mode::{SimConfig, StepMode};

/// Built-in defaults, the lowest configuration layer
pub const DEFAULT_CONFIG: &str = include_str!("default.toml");

/// 模拟配置部分
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SimulationSection {
  #[serde(default)]
  pub quiet: bool,
  #[serde(default)]
  pub step_mode: bool,
  #[serde(default)]
  pub trace_file: String,
  #[serde(default = "default_max_cycles")]
  pub max_cycles: u64,
}

fn default_max_cycles() -> u64 {
  100_000
}

impl Default for SimulationSection {
  fn default() -> Self {
    Self {
      quiet: false,
      step_mode: false,
      trace_file: String::new(),
      max_cycles: default_max_cycles(),
    }
  }
}

/// 统一的应用配置
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct AppConfig {
  #[serde(default)]
  pub tpu: TpuConfig,
  #[serde(default)]
  pub simulation: SimulationSection,
}

impl AppConfig {
  /// Driver settings for `Simulator::new`
  pub fn sim_config(&self) -> SimConfig {
    SimConfig {
      quiet: self.simulation.quiet,
      step_mode: if self.simulation.step_mode {
        StepMode::Step
      } else {
        StepMode::Continuous
      },
      trace_file: if self.simulation.trace_file.is_empty() {
        None
      } else {
        Some(self.simulation.trace_file.clone())
      },
      max_cycles: self.simulation.max_cycles,
    }
  }
}

/// Command-line settings that win over every file and environment layer
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
  pub quiet: bool,
  pub step: bool,
  pub trace_file: Option<String>,
  pub width: Option<usize>,
  pub queue_depth: Option<usize>,
  pub max_cycles: Option<u64>,
}

fn invalid(msg: String) -> io::Error {
  io::Error::new(io::ErrorKind::InvalidData, msg)
}

/// Load the layered configuration: built-in defaults, then `path` if given, then
/// `TPUSIM__SECTION__KEY` environment variables.
pub fn load_config(path: Option<&Path>) -> io::Result<AppConfig> {
  let mut builder = Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));

  if let Some(path) = path {
    if !path.exists() {
      return Err(io::Error::new(
        io::ErrorKind::NotFound,
        format!("cannot read config file {:?}", path),
      ));
    }
    builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
  }

  builder = builder.add_source(
    Environment::with_prefix("TPUSIM")
      .prefix_separator("__")
      .separator("__")
      .try_parsing(true),
  );

  builder
    .build()
    .and_then(|cfg| cfg.try_deserialize::<AppConfig>())
    .map_err(|e| invalid(format!("failed to load configuration: {}", e)))
}

/// 应用CLI参数覆写配置
pub fn apply_cli_overrides(config: &mut AppConfig, cli: &CliOverrides) {
  if cli.quiet {
    config.simulation.quiet = true;
  }
  if cli.step {
    config.simulation.step_mode = true;
  }
  if let Some(file) = &cli.trace_file {
    config.simulation.trace_file = file.clone();
  }
  if let Some(width) = cli.width {
    config.tpu.width = width;
  }
  if let Some(depth) = cli.queue_depth {
    config.tpu.queue_depth = depth;
  }
  if let Some(max_cycles) = cli.max_cycles {
    config.simulation.max_cycles = max_cycles;
  }
}

/// 验证配置
pub fn validate_config(config: &AppConfig) -> io::Result<()> {
  let tpu = &config.tpu;
  if tpu.width == 0 || tpu.width > MAX_ARRAY_WIDTH {
    return Err(invalid(format!(
      "tpu.width must be between 1 and {}, got {}",
      MAX_ARRAY_WIDTH, tpu.width
    )));
  }
  if tpu.queue_depth == 0 {
    return Err(invalid("tpu.queue_depth must be at least 1".to_string()));
  }
  if tpu.buffer_rows == 0 {
    return Err(invalid("tpu.buffer_rows must be at least 1".to_string()));
  }
  if config.simulation.max_cycles == 0 {
    return Err(invalid("simulation.max_cycles must be at least 1".to_string()));
  }
  Ok(())
}

/// 加载并合并配置
///
/// 流程：
/// 1. 默认配置 + 自定义配置文件 + 环境变量
/// 2. 应用CLI参数覆写
/// 3. 验证配置
pub fn load_and_merge_configs(custom_config_path: Option<&Path>, cli: &CliOverrides) -> io::Result<AppConfig> {
  let mut config = load_config(custom_config_path)?;
  apply_cli_overrides(&mut config, cli);
  validate_config(&config)?;
  Ok(config)
}
