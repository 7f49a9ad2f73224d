/// Sequencer - task queue plus the weight, operand, bias and writeback flows
pub mod flow;
pub mod task;

pub use flow::{WeightTag, WritebackRecord};
pub use task::{Task, TaskDescriptor, TaskQueue};

use flow::{BiasFlow, OperandFlow, WeightFlow, Writeback};

use super::pipeline_depth;
use crate::builtin::Module;

/// Storage write issued by the writeback flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteCmd {
  pub addr: u64,
  pub mask: u64,
}

/// Control signals for one cycle.
///
/// `read_*` requests are answered by storage in the next cycle. The tags describe
/// the storage responses visible in this cycle, i.e. the reads issued in the
/// previous one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequencerOutput {
  pub read_a: Option<u64>,
  pub read_b: Option<u64>,
  pub read_c: Option<u64>,
  /// B response is a weight row for this destination row
  pub weight_load: Option<WeightTag>,
  /// A response is an operand row, valid lanes given by the K mask
  pub operand: Option<u64>,
  /// C response is a bias row, valid lanes given by the N mask
  pub bias: Option<u64>,
  pub switch: bool,
  pub write: Option<WriteCmd>,
  /// One-shot completion pulse
  pub done: bool,
}

/// Sequencer
#[derive(Clone)]
pub struct Sequencer {
  width: usize,
  cycle: u64,

  queue: TaskQueue,
  weight: WeightFlow,
  operand: OperandFlow,
  bias: BiasFlow,
  writeback: Writeback,

  // tags for reads issued last cycle
  weight_tag: Option<WeightTag>,
  operand_tag: Option<u64>,
  bias_tag: Option<u64>,
  switch_pending: bool,

  // 输入
  pub writeback_valid: bool,
  // 输出
  pub output: SequencerOutput,
}

impl Sequencer {
  pub fn new(width: usize, queue_depth: usize) -> Self {
    Self {
      width: width.max(1),
      cycle: 0,
      queue: TaskQueue::new(queue_depth),
      weight: WeightFlow::new(),
      operand: OperandFlow::new(),
      bias: BiasFlow::new(),
      writeback: Writeback::new(),
      weight_tag: None,
      operand_tag: None,
      bias_tag: None,
      switch_pending: false,
      writeback_valid: false,
      output: SequencerOutput::default(),
    }
  }

  pub fn cycle(&self) -> u64 {
    self.cycle
  }

  /// Command queue has room
  pub fn ready(&self) -> bool {
    !self.queue.is_full()
  }

  pub fn busy(&self) -> bool {
    !self.queue.is_empty()
      || !self.weight.is_idle()
      || !self.operand.is_idle()
      || !self.bias.is_idle()
      || !self.writeback.is_empty()
      || self.switch_pending
      || self.weight_tag.is_some()
      || self.operand_tag.is_some()
      || self.bias_tag.is_some()
  }

  /// Tasks admitted and not yet retired
  pub fn pending(&self) -> usize {
    self.queue.len()
  }

  /// Tasks whose results are being written back
  pub fn open_records(&self) -> usize {
    self.writeback.len()
  }

  /// Admit a task. Returns false when the queue is full or the task does not fit
  /// the array; the caller retries or drops it.
  pub fn issue(&mut self, desc: TaskDescriptor) -> bool {
    if let Err(e) = desc.check(self.width) {
      log::warn!("sequencer: rejected task {:?}: {}", desc, e);
      return false;
    }
    match self.queue.push(desc) {
      Some(id) => {
        log::info!(
          "sequencer: task {} admitted (M={} K={} N={}) at cycle {}",
          id,
          desc.m,
          desc.k,
          desc.n,
          self.cycle
        );
        true
      }
      None => false,
    }
  }

  /// Advance one cycle.
  pub fn step(&mut self, writeback_valid: bool) -> SequencerOutput {
    let mut out = SequencerOutput {
      weight_load: self.weight_tag.take(),
      operand: self.operand_tag.take(),
      bias: self.bias_tag.take(),
      switch: std::mem::take(&mut self.switch_pending),
      ..SequencerOutput::default()
    };

    if writeback_valid {
      let wb = self.writeback.observe();
      out.write = wb.write.map(|(addr, mask)| WriteCmd { addr, mask });
      if let Some(id) = wb.retired {
        match self.queue.pop() {
          Some(task) if task.id == id => {
            log::info!("sequencer: task {} done at cycle {}", id, self.cycle);
          }
          other => {
            log::warn!("sequencer: retired record {} but queue head was {:?}", id, other.map(|t| t.id));
          }
        }
        out.done = true;
      }
    }

    let operand_idle = self.operand.is_idle();
    let op = self.operand.step(self.cycle);
    if let Some(task) = op.started {
      let bias_at = self.cycle + pipeline_depth(self.width);
      log::debug!("operand flow: task {} started, bias at cycle {}", task.id, bias_at);
      self.writeback.open(&task);
      self.bias.schedule(bias_at, task);
    }
    if let Some((addr, mask)) = op.read {
      out.read_a = Some(addr);
      self.operand_tag = Some(mask);
    }

    if let Some((addr, mask)) = self.bias.step(self.cycle) {
      out.read_c = Some(addr);
      self.bias_tag = Some(mask);
    }

    let ws = self.weight.step(&self.queue, operand_idle);
    if let Some(task) = ws.commit {
      log::debug!("weight flow: task {} switch committed at cycle {}", task.id, self.cycle);
      // switch presented next cycle, operand reads one cycle after that
      self.switch_pending = true;
      self.operand.arm(task, self.cycle + 2);
    }
    if let Some((addr, tag)) = ws.read {
      out.read_b = Some(addr);
      self.weight_tag = Some(tag);
    }

    self.cycle += 1;
    out
  }
}

impl Module for Sequencer {
  fn run(&mut self) {
    self.output = self.step(self.writeback_valid);
    self.writeback_valid = false;
  }

  /// Abandons every admitted task without a completion pulse.
  fn reset(&mut self) {
    let dropped = self.queue.len();
    if dropped > 0 {
      log::info!("sequencer: reset abandons {} task(s)", dropped);
    }
    *self = Self::new(self.width, self.queue.capacity());
  }

  fn name(&self) -> &str {
    "sequencer"
  }
}
