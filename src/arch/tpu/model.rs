/// DEVS wrapper - drives the Tpu one clock per internal event
use std::collections::VecDeque;
use std::f64::INFINITY;

use serde::{Deserialize, Serialize};
use sim::models::model_trait::{DevsModel, Reportable, ReportableModel, SerializableModel};
use sim::models::{Model, ModelMessage, ModelRecord};
use sim::simulator::{Connector, Services, Simulation};
use sim::utils::errors::SimulationError;

use super::{AccT, RegT, TaskDescriptor, Tpu};
use crate::builtin::Module;
use crate::config::TpuConfig;
use crate::model_record;

pub const TPU_ID: &str = "tpu";
pub const HOST_ID: &str = "host";

// TpuModel 端口
pub const CMD_PORT: &str = "cmd";
pub const MEM_WRITE_PORT: &str = "mem_write";
pub const MEM_READ_PORT: &str = "mem_read";
pub const RESET_PORT: &str = "reset";
pub const IRQ_PORT: &str = "irq";
pub const MEM_DATA_PORT: &str = "mem_data";

/// Packed task command on the `cmd` port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CmdMsg {
  pub xs1: RegT,
  pub xs2: RegT,
}

/// Host row write on the `mem_write` port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemWriteMsg {
  pub addr: u64,
  pub data: Vec<AccT>,
}

/// Read-back request on `mem_read`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemReadMsg {
  pub addr: u64,
}

/// Read-back row on `mem_data`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemDataMsg {
  pub addr: u64,
  pub data: Vec<AccT>,
}

/// Completion interrupt on `irq`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IrqMsg {
  /// Running count of completed tasks
  pub completed: u64,
  pub cycle: u64,
}

fn decode<T: for<'de> Deserialize<'de>>(content: &str) -> Result<T, SimulationError> {
  serde_json::from_str(content).map_err(|_| SimulationError::InvalidModelState)
}

fn encode<T: Serialize>(value: &T) -> Result<String, SimulationError> {
  serde_json::to_string(value).map_err(|_| SimulationError::InvalidModelState)
}

/// TpuModel
///
/// Passive while the Tpu is idle and nothing is queued. Commands that meet a full
/// queue wait in a host-side FIFO and are retried once per cycle.
#[derive(Clone)]
pub struct TpuModel {
  tpu: Tpu,
  pending_cmds: VecDeque<TaskDescriptor>,
  pending_reads: VecDeque<u64>,
  inflight_read: Option<u64>,
  stalled: u64,
  until_next_event: f64,
  records: Vec<ModelRecord>,
}

impl TpuModel {
  pub fn new(config: &TpuConfig) -> Self {
    Self {
      tpu: Tpu::new(TPU_ID, config),
      pending_cmds: VecDeque::new(),
      pending_reads: VecDeque::new(),
      inflight_read: None,
      stalled: 0,
      until_next_event: INFINITY,
      records: Vec::new(),
    }
  }

  pub fn tpu(&self) -> &Tpu {
    &self.tpu
  }

  /// Cycles a command waited for queue space
  pub fn stalled_cycles(&self) -> u64 {
    self.stalled
  }

  fn has_work(&self) -> bool {
    self.tpu.busy() || !self.pending_cmds.is_empty() || !self.pending_reads.is_empty() || self.inflight_read.is_some()
  }

  fn wake(&mut self) {
    self.until_next_event = self.until_next_event.min(1.0);
  }
}

impl DevsModel for TpuModel {
  fn events_ext(&mut self, incoming_message: &ModelMessage, services: &mut Services) -> Result<(), SimulationError> {
    match incoming_message.port_name.as_str() {
      CMD_PORT => {
        let cmd: CmdMsg = decode(&incoming_message.content)?;
        let desc = TaskDescriptor::decode(cmd.xs1, cmd.xs2);
        if let Err(e) = desc.check(self.tpu.width()) {
          log::error!("{}: malformed command {:#x} {:#x}: {}", TPU_ID, cmd.xs1, cmd.xs2, e);
          return Err(SimulationError::InvalidModelState);
        }
        model_record!(self, services, "cmd", format!("{:?}", desc));
        self.pending_cmds.push_back(desc);
        self.wake();
      },
      MEM_WRITE_PORT => {
        let write: MemWriteMsg = decode(&incoming_message.content)?;
        self.tpu.write_row(write.addr, &write.data);
      },
      MEM_READ_PORT => {
        let read: MemReadMsg = decode(&incoming_message.content)?;
        self.pending_reads.push_back(read.addr);
        self.wake();
      },
      RESET_PORT => {
        model_record!(self, services, "reset", "cycle {}", self.tpu.cycle());
        self.tpu.reset();
        self.pending_cmds.clear();
        self.pending_reads.clear();
        self.inflight_read = None;
        self.until_next_event = INFINITY;
      },
      other => {
        log::error!("{}: message on unknown port '{}'", TPU_ID, other);
        return Err(SimulationError::InvalidModelState);
      },
    }
    Ok(())
  }

  fn events_int(&mut self, services: &mut Services) -> Result<Vec<ModelMessage>, SimulationError> {
    let mut messages = Vec::new();

    // 每周期最多发出一条命令
    if let Some(&desc) = self.pending_cmds.front() {
      if self.tpu.issue(desc) {
        self.pending_cmds.pop_front();
        model_record!(self, services, "issue", "cycle {}", self.tpu.cycle());
      } else {
        self.stalled += 1;
      }
    }
    if let Some(addr) = self.pending_reads.pop_front() {
      self.tpu.request_readback(addr);
      self.inflight_read = Some(addr);
    } else {
      self.inflight_read = None;
    }

    self.tpu.run();

    if let Some(addr) = self.inflight_read.take() {
      let data = self.tpu.readback().map(|row| row.to_vec()).unwrap_or_default();
      messages.push(ModelMessage {
        port_name: MEM_DATA_PORT.to_string(),
        content: encode(&MemDataMsg { addr, data })?,
      });
    }
    if self.tpu.done() {
      let irq = IrqMsg {
        completed: self.tpu.completed(),
        cycle: self.tpu.cycle(),
      };
      model_record!(self, services, "irq", "task {} at cycle {}", irq.completed, irq.cycle);
      messages.push(ModelMessage {
        port_name: IRQ_PORT.to_string(),
        content: encode(&irq)?,
      });
    }

    self.until_next_event = if self.has_work() { 1.0 } else { INFINITY };
    Ok(messages)
  }

  fn time_advance(&mut self, time_delta: f64) {
    self.until_next_event -= time_delta;
  }

  fn until_next_event(&self) -> f64 {
    self.until_next_event
  }
}

impl Reportable for TpuModel {
  fn status(&self) -> String {
    if self.tpu.busy() {
      format!("busy, {} completed", self.tpu.completed())
    } else {
      format!("idle, {} completed", self.tpu.completed())
    }
  }

  fn records(&self) -> &Vec<ModelRecord> {
    &self.records
  }
}

impl ReportableModel for TpuModel {}

impl SerializableModel for TpuModel {
  fn get_type(&self) -> &'static str {
    "TpuModel"
  }
}

/// Host sink - records interrupts and read-back rows
#[derive(Clone)]
pub struct HostModel {
  records: Vec<ModelRecord>,
}

impl HostModel {
  pub fn new() -> Self {
    Self { records: Vec::new() }
  }
}

impl Default for HostModel {
  fn default() -> Self {
    Self::new()
  }
}

impl DevsModel for HostModel {
  fn events_ext(&mut self, incoming_message: &ModelMessage, services: &mut Services) -> Result<(), SimulationError> {
    model_record!(self, services, incoming_message.port_name, incoming_message.content);
    Ok(())
  }

  fn events_int(&mut self, _services: &mut Services) -> Result<Vec<ModelMessage>, SimulationError> {
    Ok(Vec::new())
  }

  fn time_advance(&mut self, _time_delta: f64) {}

  fn until_next_event(&self) -> f64 {
    INFINITY
  }
}

impl Reportable for HostModel {
  fn status(&self) -> String {
    format!("{} message(s)", self.records.len())
  }

  fn records(&self) -> &Vec<ModelRecord> {
    &self.records
  }
}

impl ReportableModel for HostModel {}

impl SerializableModel for HostModel {
  fn get_type(&self) -> &'static str {
    "HostModel"
  }
}

/// Tpu plus a host sink, wired irq/mem_data → host
pub fn create_simulation(config: &TpuConfig) -> Simulation {
  let models = vec![
    Model::new(String::from(TPU_ID), Box::new(TpuModel::new(config))),
    Model::new(String::from(HOST_ID), Box::new(HostModel::new())),
  ];

  let connectors = vec![
    Connector::new(
      String::from("tpu_host_irq"),
      String::from(TPU_ID),
      String::from(HOST_ID),
      String::from(IRQ_PORT),
      String::from(IRQ_PORT),
    ),
    Connector::new(
      String::from("tpu_host_mem_data"),
      String::from(TPU_ID),
      String::from(HOST_ID),
      String::from(MEM_DATA_PORT),
      String::from(MEM_DATA_PORT),
    ),
  ];

  Simulation::post(models, connectors)
}

#[cfg(test)]
mod tests {
  use super::*;
  use sim::simulator::Message;

  fn inject(simulation: &mut Simulation, port: &str, content: String) {
    let msg = Message::new(
      HOST_ID.to_string(),
      port.to_string(),
      TPU_ID.to_string(),
      port.to_string(),
      simulation.get_global_time(),
      content,
    );
    simulation.inject_input(msg);
  }

  /// Step until every model is passive, returning what the Tpu emitted.
  fn drain(simulation: &mut Simulation, limit: usize) -> Vec<Message> {
    let mut emitted = Vec::new();
    for _ in 0..limit {
      let next = simulation
        .models()
        .iter()
        .fold(INFINITY, |min, model| f64::min(min, model.until_next_event()));
      if next == INFINITY && simulation.get_messages().is_empty() {
        break;
      }
      emitted.extend(simulation.step().unwrap());
    }
    emitted
  }

  fn task() -> TaskDescriptor {
    TaskDescriptor {
      addr_a: 0,
      addr_b: 2,
      addr_c: 4,
      addr_d: 6,
      m: 2,
      k: 2,
      n: 2,
    }
  }

  #[test]
  fn test_command_to_irq() {
    let mut simulation = create_simulation(&TpuConfig::with_width(2));
    for (addr, data) in [(0, vec![10, 1]), (1, vec![20, 2]), (2, vec![2, 3]), (3, vec![4, 5])] {
      inject(&mut simulation, MEM_WRITE_PORT, encode(&MemWriteMsg { addr, data }).unwrap());
    }
    let (xs1, xs2) = task().encode();
    inject(&mut simulation, CMD_PORT, encode(&CmdMsg { xs1, xs2 }).unwrap());

    let emitted = drain(&mut simulation, 100);
    let irqs: Vec<IrqMsg> = emitted
      .iter()
      .filter(|m| m.source_port() == IRQ_PORT)
      .map(|m| decode(m.content()).unwrap())
      .collect();
    assert_eq!(irqs.len(), 1);
    assert_eq!(irqs[0].completed, 1);

    inject(&mut simulation, MEM_READ_PORT, encode(&MemReadMsg { addr: 7 }).unwrap());
    let emitted = drain(&mut simulation, 10);
    let rows: Vec<MemDataMsg> = emitted
      .iter()
      .filter(|m| m.source_port() == MEM_DATA_PORT)
      .map(|m| decode(m.content()).unwrap())
      .collect();
    assert_eq!(rows, vec![MemDataMsg { addr: 7, data: vec![48, 70] }]);
  }

  #[test]
  fn test_full_queue_stalls_host() {
    let config = TpuConfig {
      queue_depth: 1,
      ..TpuConfig::with_width(2)
    };
    let mut simulation = create_simulation(&config);
    let (xs1, xs2) = task().encode();
    for _ in 0..3 {
      inject(&mut simulation, CMD_PORT, encode(&CmdMsg { xs1, xs2 }).unwrap());
    }
    let emitted = drain(&mut simulation, 200);
    assert_eq!(emitted.iter().filter(|m| m.source_port() == IRQ_PORT).count(), 3);
  }

  #[test]
  fn test_bad_message_is_an_error() {
    let mut simulation = create_simulation(&TpuConfig::with_width(2));
    inject(&mut simulation, MEM_READ_PORT, "not json".to_string());
    assert!(simulation.step().is_err());

    let mut simulation = create_simulation(&TpuConfig::with_width(2));
    let (xs1, xs2) = TaskDescriptor { m: 3, ..task() }.encode();
    inject(&mut simulation, CMD_PORT, encode(&CmdMsg { xs1, xs2 }).unwrap());
    assert!(simulation.step().is_err());
  }
}
