/// Workload files: memory images, a task list and read-back requests
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

use crate::arch::tpu::{AccT, TaskDescriptor};
use crate::config::TpuConfig;

/// Rows written into the unified buffer before the first task is issued
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MemoryImage {
  pub addr: u64,
  pub rows: Vec<Vec<AccT>>,
}

/// Rows read back through the read-back port once every task has retired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct Readback {
  pub addr: u64,
  #[serde(default = "default_readback_rows")]
  pub rows: u64,
}

fn default_readback_rows() -> u64 {
  1
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Workload {
  #[serde(default)]
  pub memory: Vec<MemoryImage>,
  #[serde(default, rename = "task")]
  pub tasks: Vec<TaskDescriptor>,
  #[serde(default)]
  pub readback: Vec<Readback>,
}

impl Workload {
  /// Check the workload fits the configured Tpu
  pub fn validate(&self, tpu: &TpuConfig) -> io::Result<()> {
    let rows = tpu.buffer_rows as u64;
    for image in &self.memory {
      if image.addr + image.rows.len() as u64 > rows {
        return Err(invalid(format!(
          "memory image at {:#x} ({} rows) exceeds buffer of {} rows",
          image.addr,
          image.rows.len(),
          rows
        )));
      }
      if let Some(row) = image.rows.iter().find(|row| row.len() > tpu.width) {
        return Err(invalid(format!(
          "memory image at {:#x} has a row of {} lanes, array width is {}",
          image.addr,
          row.len(),
          tpu.width
        )));
      }
    }
    for (i, task) in self.tasks.iter().enumerate() {
      task
        .check(tpu.width)
        .map_err(|e| invalid(format!("task {}: {}", i, e)))?;
    }
    for readback in &self.readback {
      if readback.addr + readback.rows > rows {
        return Err(invalid(format!(
          "readback at {:#x} ({} rows) exceeds buffer of {} rows",
          readback.addr, readback.rows, rows
        )));
      }
    }
    Ok(())
  }
}

fn invalid(msg: String) -> io::Error {
  io::Error::new(io::ErrorKind::InvalidData, msg)
}

pub fn parse_workload(content: &str) -> io::Result<Workload> {
  toml::from_str::<Workload>(content).map_err(|e| invalid(format!("failed to parse workload: {}", e)))
}

/// 从指定文件加载工作负载
pub fn load_workload(path: &Path) -> io::Result<Workload> {
  let content = fs::read_to_string(path)
    .map_err(|e| io::Error::new(io::ErrorKind::NotFound, format!("cannot read workload {:?}: {}", path, e)))?;
  parse_workload(&content)
}
