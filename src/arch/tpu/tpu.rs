/// Tpu Top - sequencer, unified buffer, systolic array and bias stage
use super::array::ArrayInput;
use super::buffer::{ReadPort, WriteReq};
use super::sequencer::SequencerOutput;
use super::{AccT, Array, BiasStage, ElemT, RegT, Sequencer, TaskDescriptor, UnifiedBuffer};
use crate::builtin::Module;
use crate::config::TpuConfig;

/// Tpu - 顶层模块
#[derive(Clone)]
pub struct Tpu {
  name: String,
  config: TpuConfig,

  pub sequencer: Sequencer,
  pub buffer: UnifiedBuffer,
  pub array: Array,
  pub bias: BiasStage,

  done: bool,
  completed: u64,
}

fn narrow(row: &[AccT]) -> Vec<ElemT> {
  row.iter().map(|&v| v as ElemT).collect()
}

impl Tpu {
  pub fn new(name: impl Into<String>, config: &TpuConfig) -> Self {
    let width = config.width;
    Self {
      name: name.into(),
      config: config.clone(),
      sequencer: Sequencer::new(width, config.queue_depth),
      buffer: UnifiedBuffer::new(width, config.buffer_rows),
      array: Array::new(width),
      bias: BiasStage::new(width),
      done: false,
      completed: 0,
    }
  }

  pub fn config(&self) -> &TpuConfig {
    &self.config
  }

  pub fn width(&self) -> usize {
    self.config.width
  }

  pub fn cycle(&self) -> u64 {
    self.sequencer.cycle()
  }

  /// 发送任务（队列满时返回 false，调用方需重试）
  pub fn issue(&mut self, desc: TaskDescriptor) -> bool {
    self.sequencer.issue(desc)
  }

  /// RoCC-style command with a packed descriptor
  pub fn issue_packed(&mut self, xs1: RegT, xs2: RegT) -> bool {
    self.issue(TaskDescriptor::decode(xs1, xs2))
  }

  pub fn ready(&self) -> bool {
    self.sequencer.ready()
  }

  pub fn busy(&self) -> bool {
    self.sequencer.busy()
  }

  /// High only in the cycle a task's last result row was written
  pub fn done(&self) -> bool {
    self.done
  }

  /// Tasks completed since the last reset
  pub fn completed(&self) -> u64 {
    self.completed
  }

  /// 主机直接写存储
  pub fn write_row(&mut self, addr: u64, data: &[AccT]) {
    self.buffer.write_row(addr, data);
  }

  /// Write consecutive rows starting at `addr`.
  pub fn write_matrix(&mut self, addr: u64, rows: &[Vec<AccT>]) {
    for (i, row) in rows.iter().enumerate() {
      self.buffer.write_row(addr + i as u64, row);
    }
  }

  /// 主机直接读存储
  pub fn read_row(&self, addr: u64) -> Vec<AccT> {
    self.buffer.read_row(addr)
  }

  /// Queue a read on the read-back port; the row is available after the next `run`.
  pub fn request_readback(&mut self, addr: u64) {
    self.buffer.request(ReadPort::R, addr);
  }

  pub fn readback(&self) -> Option<&[AccT]> {
    self.buffer.response(ReadPort::R)
  }

  /// Clock until the sequencer is idle. Returns the cycles spent, or `None` if
  /// still busy after `limit` cycles.
  pub fn run_until_idle(&mut self, limit: u64) -> Option<u64> {
    let start = self.cycle();
    while self.busy() {
      if self.cycle() - start >= limit {
        log::warn!("{}: still busy after {} cycles", self.name, limit);
        return None;
      }
      self.run();
    }
    Some(self.cycle() - start)
  }

  fn drive_array(&mut self, ctrl: &SequencerOutput, a: Option<Vec<ElemT>>, b: Option<Vec<ElemT>>) {
    let mut input = ArrayInput::default();
    if let Some(mask) = ctrl.operand {
      match a {
        Some(row) => input = input.with_operands(&row, mask),
        None => log::warn!("{}: operand tag without A data", self.name),
      }
    }
    if let Some(tag) = ctrl.weight_load {
      match b {
        Some(row) => {
          self.array.set_col_size(tag.cols);
          input = input.with_weights(&row, tag.row);
        }
        None => log::warn!("{}: weight tag without B data", self.name),
      }
    }
    if ctrl.switch {
      input = input.with_switch();
    }
    self.array.input = input;
    self.array.run();
  }
}

impl Module for Tpu {
  fn run(&mut self) {
    // 采样上一周期的寄存输出
    let wb_valid = self.bias.writeback_valid();
    let wb_row = self.bias.out.value.clone();
    let a = self.buffer.response(ReadPort::A).map(narrow);
    let b = self.buffer.response(ReadPort::B).map(narrow);
    let c = self.buffer.response(ReadPort::C).map(|row| row.to_vec());
    let south = self.array.south().to_vec();

    // 1. 控制器
    self.sequencer.writeback_valid = wb_valid;
    self.sequencer.run();
    let ctrl = self.sequencer.output.clone();
    self.done = ctrl.done;
    if ctrl.done {
      self.completed += 1;
    }

    // 2. 偏置级
    self.bias.psum = south;
    if let Some(mask) = ctrl.bias {
      match c {
        Some(row) => {
          self.bias.bias = row;
          self.bias.mask = mask;
        }
        None => log::warn!("{}: bias tag without C data", self.name),
      }
    }
    self.bias.run();

    // 3. 脉动阵列
    self.drive_array(&ctrl, a, b);

    // 4. 存储：写回结果，发出下一周期的读请求
    if let Some(cmd) = ctrl.write {
      self.buffer.write_req.set(WriteReq {
        addr: cmd.addr,
        data: wb_row,
        mask: cmd.mask,
      });
    }
    for (port, addr) in [(ReadPort::A, ctrl.read_a), (ReadPort::B, ctrl.read_b), (ReadPort::C, ctrl.read_c)] {
      if let Some(addr) = addr {
        self.buffer.request(port, addr);
      }
    }
    self.buffer.run();
  }

  fn reset(&mut self) {
    self.sequencer.reset();
    self.buffer.reset();
    self.array.reset();
    self.bias.reset();
    self.done = false;
    self.completed = 0;
  }

  fn name(&self) -> &str {
    &self.name
  }
}
