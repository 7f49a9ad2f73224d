use super::config::workload::{Readback, Workload};
use super::sim::mode::{SimConfig, StepMode};
use super::sim::shell::{Command, Shell};
use super::sim::{inject_message, model_step};
use super::utils::log::set_log;
use super::utils::report::{print_simulation_records, RunReport};
use crate::arch::tpu::AccT;
use crate::arch::tpu::model::{
  create_simulation, CmdMsg, IrqMsg, MemDataMsg, MemReadMsg, MemWriteMsg, CMD_PORT, IRQ_PORT, MEM_DATA_PORT,
  MEM_READ_PORT, MEM_WRITE_PORT, RESET_PORT,
};
use crate::config::TpuConfig;
use crate::log_info;
use serde::Serialize;
use sim::simulator::{Message, Simulation};
use std::fs::File;
use std::io::{self, BufWriter, Result};

/// Drives the Tpu DEVS simulation: loads a workload, clocks until idle, then
/// reads the requested rows back.
pub struct Simulator {
  config: SimConfig,
  simulation: Simulation,
  trace_writer: Option<BufWriter<File>>,
  shell: Option<Shell>,
  // 单步模式状态
  steps_left: u32,
  continuous: bool,
  readback: Vec<Readback>,
  report: RunReport,
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
  serde_json::to_string(value).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

impl Simulator {
  pub fn new(config: SimConfig, tpu: &TpuConfig) -> Result<Self> {
    set_log(!config.quiet);

    let trace_writer = match &config.trace_file {
      Some(path) => Some(BufWriter::new(File::create(path)?)),
      None => None,
    };
    let shell = match config.step_mode {
      StepMode::Step => Some(Shell::new()?),
      StepMode::Continuous => None,
    };

    log_info!(
      "{}x{} array, queue depth {}, {} buffer rows",
      tpu.width,
      tpu.width,
      tpu.queue_depth,
      tpu.buffer_rows
    );

    Ok(Self {
      config,
      simulation: create_simulation(tpu),
      trace_writer,
      shell,
      steps_left: 0,
      continuous: false,
      readback: Vec::new(),
      report: RunReport::default(),
    })
  }

  /// Cycles simulated so far
  pub fn cycle(&self) -> u64 {
    self.report.cycles
  }

  pub fn report(&self) -> &RunReport {
    &self.report
  }

  pub fn simulation_mut(&mut self) -> &mut Simulation {
    &mut self.simulation
  }

  /// Queue the workload: memory images go in first, then the task commands in order.
  pub fn load(&mut self, workload: &Workload) -> Result<()> {
    for image in &workload.memory {
      for (i, row) in image.rows.iter().enumerate() {
        self.write_row(image.addr + i as u64, row.clone())?;
      }
    }
    for task in &workload.tasks {
      let (xs1, xs2) = task.encode();
      inject_message(&mut self.simulation, None, CMD_PORT, &to_json(&CmdMsg { xs1, xs2 })?);
    }
    self.readback.extend(workload.readback.iter().copied());

    log_info!(
      "loaded {} memory image(s), {} task(s), {} readback request(s)",
      workload.memory.len(),
      workload.tasks.len(),
      workload.readback.len()
    );
    Ok(())
  }

  pub fn write_row(&mut self, addr: u64, data: Vec<AccT>) -> Result<()> {
    let content = to_json(&MemWriteMsg { addr, data })?;
    inject_message(&mut self.simulation, None, MEM_WRITE_PORT, &content);
    Ok(())
  }

  pub fn request_readback(&mut self, addr: u64) -> Result<()> {
    let content = to_json(&MemReadMsg { addr })?;
    inject_message(&mut self.simulation, None, MEM_READ_PORT, &content);
    Ok(())
  }

  /// Abandon everything in flight; storage contents survive.
  pub fn reset(&mut self) {
    inject_message(&mut self.simulation, None, RESET_PORT, "{}");
  }

  /// Run the loaded tasks to completion, then the read-backs.
  pub fn run(&mut self) -> Result<RunReport> {
    match self.config.step_mode {
      StepMode::Continuous => log_info!("Continuous mode"),
      StepMode::Step => log_info!("Step mode - Enter to step, 'si N' to step N cycles, 'c' to continue, 'q' to quit"),
    }

    if self.run_until_idle()? {
      for readback in std::mem::take(&mut self.readback) {
        for addr in readback.addr..readback.addr + readback.rows {
          self.request_readback(addr)?;
        }
      }
      self.run_until_idle()?;
    }

    if !self.config.quiet {
      print_simulation_records(&mut self.simulation);
    }
    Ok(self.report.clone())
  }

  /// Clock at most `cycles` cycles, stopping early once every model is passive.
  /// Returns the cycles actually simulated.
  pub fn step_cycles(&mut self, cycles: u64) -> Result<u64> {
    let start = self.report.cycles;
    while self.report.cycles - start < cycles {
      if !self.step()? {
        break;
      }
    }
    Ok(self.report.cycles - start)
  }

  /// Returns false if the run stopped early (cycle limit or user quit).
  fn run_until_idle(&mut self) -> Result<bool> {
    loop {
      if self.report.cycles >= self.config.max_cycles {
        log::warn!("stopping at cycle limit {}", self.config.max_cycles);
        self.report.timed_out = true;
        return Ok(false);
      }
      if !self.permit_step()? {
        return Ok(false);
      }
      if !self.step()? {
        return Ok(true);
      }
    }
  }

  fn permit_step(&mut self) -> Result<bool> {
    let shell = match self.shell.as_mut() {
      Some(shell) if !self.continuous && self.steps_left == 0 => shell,
      _ => return Ok(true),
    };
    log_info!("cycle {}", self.report.cycles);
    match shell.read_command()? {
      Command::Step(n) => self.steps_left = n,
      Command::Continue => self.continuous = true,
      Command::Quit => return Ok(false),
    }
    Ok(true)
  }

  /// One clock cycle. Returns false when nothing was left to simulate.
  fn step(&mut self) -> Result<bool> {
    let result = model_step(&mut self.simulation, &mut self.trace_writer)?;
    self.collect(&result.emitted)?;
    if result.advanced {
      self.report.cycles += 1;
      self.steps_left = self.steps_left.saturating_sub(1);
    }
    Ok(result.advanced)
  }

  fn collect(&mut self, emitted: &[Message]) -> Result<()> {
    for msg in emitted {
      match msg.source_port() {
        IRQ_PORT => {
          let irq: IrqMsg = serde_json::from_str(msg.content())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
          log_info!("task {} done at cycle {}", irq.completed, irq.cycle);
          self.report.irqs.push(irq);
        },
        MEM_DATA_PORT => {
          let row: MemDataMsg = serde_json::from_str(msg.content())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
          self.report.readback.push(row);
        },
        _ => {},
      }
    }
    Ok(())
  }
}
