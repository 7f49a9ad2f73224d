/// Per-stream request generators driven by the sequencer
use std::collections::VecDeque;

use super::task::{Task, TaskQueue};
use crate::arch::tpu::lane_mask;

/// Row index and active column count riding with a weight row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeightTag {
  pub row: usize,
  pub cols: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WeightState {
  Idle,
  Loading { task: Task, cursor: usize },
  /// All rows staged, waiting to switch
  Pending { task: Task },
}

/// What the weight flow did in one cycle
#[derive(Debug, Clone, Copy, Default)]
pub struct WeightStep {
  pub read: Option<(u64, WeightTag)>,
  /// Task whose switch was committed this cycle
  pub commit: Option<Task>,
}

/// Weight (B) flow - walks B from its last row to its first, then switches.
#[derive(Debug, Clone)]
pub struct WeightFlow {
  state: WeightState,
  next_task: u64,
}

impl WeightFlow {
  pub fn new() -> Self {
    Self {
      state: WeightState::Idle,
      next_task: 0,
    }
  }

  pub fn is_idle(&self) -> bool {
    self.state == WeightState::Idle
  }

  /// `operand_idle` is the operand flow's state at the start of this cycle. The
  /// switch of a staged block waits until the previous task issued its last operand
  /// read, and loading the next block starts in the same cycle the switch commits.
  pub fn step(&mut self, queue: &TaskQueue, operand_idle: bool) -> WeightStep {
    let mut step = WeightStep::default();

    if let WeightState::Pending { task } = self.state {
      if !operand_idle {
        return step;
      }
      step.commit = Some(task);
      self.state = WeightState::Idle;
    }

    if self.state == WeightState::Idle {
      if let Some(task) = queue.get(self.next_task) {
        log::debug!("weight flow: load task {} from B@{}", task.id, task.desc.addr_b);
        self.next_task += 1;
        self.state = WeightState::Loading {
          task: *task,
          cursor: (task.desc.k as usize).saturating_sub(1),
        };
      }
    }

    if let WeightState::Loading { task, cursor } = self.state {
      let tag = WeightTag {
        row: cursor,
        cols: task.desc.n as usize,
      };
      step.read = Some((task.desc.addr_b as u64 + cursor as u64, tag));
      self.state = if cursor == 0 {
        WeightState::Pending { task }
      } else {
        WeightState::Loading { task, cursor: cursor - 1 }
      };
    }

    step
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OperandState {
  Idle,
  Armed { task: Task, start_at: u64 },
  Streaming { task: Task, row: usize },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OperandStep {
  /// Address and K lane mask of the read issued this cycle
  pub read: Option<(u64, u64)>,
  /// Task whose first operand read was issued this cycle
  pub started: Option<Task>,
}

/// Operand (A) flow
#[derive(Debug, Clone)]
pub struct OperandFlow {
  state: OperandState,
}

impl OperandFlow {
  pub fn new() -> Self {
    Self {
      state: OperandState::Idle,
    }
  }

  pub fn is_idle(&self) -> bool {
    self.state == OperandState::Idle
  }

  pub fn arm(&mut self, task: Task, start_at: u64) {
    if !self.is_idle() {
      log::warn!("operand flow: task {} armed while busy", task.id);
    }
    self.state = OperandState::Armed { task, start_at };
  }

  pub fn step(&mut self, cycle: u64) -> OperandStep {
    let mut step = OperandStep::default();

    if let OperandState::Armed { task, start_at } = self.state {
      if cycle >= start_at {
        step.started = Some(task);
        self.state = OperandState::Streaming { task, row: 0 };
      }
    }

    if let OperandState::Streaming { task, row } = self.state {
      step.read = Some((task.desc.addr_a as u64 + row as u64, lane_mask(task.desc.k as usize)));
      self.state = if row + 1 >= task.desc.m as usize {
        OperandState::Idle
      } else {
        OperandState::Streaming { task, row: row + 1 }
      };
    }

    step
  }
}

/// Bias (C) flow - one stream at a time, started at a cycle fixed when the
/// matching operand stream began.
#[derive(Debug, Clone)]
pub struct BiasFlow {
  scheduled: VecDeque<(u64, Task)>,
  active: Option<(Task, usize)>,
}

impl BiasFlow {
  pub fn new() -> Self {
    Self {
      scheduled: VecDeque::new(),
      active: None,
    }
  }

  pub fn is_idle(&self) -> bool {
    self.active.is_none() && self.scheduled.is_empty()
  }

  pub fn schedule(&mut self, start_at: u64, task: Task) {
    self.scheduled.push_back((start_at, task));
  }

  /// Address and N lane mask of the read issued this cycle
  pub fn step(&mut self, cycle: u64) -> Option<(u64, u64)> {
    if self.active.is_none() {
      if let Some(&(start_at, task)) = self.scheduled.front() {
        if cycle >= start_at {
          if cycle > start_at {
            log::warn!("bias flow: task {} started {} cycles late", task.id, cycle - start_at);
          }
          self.scheduled.pop_front();
          self.active = Some((task, 0));
        }
      }
    }

    let (task, row) = self.active?;
    self.active = if row + 1 >= task.desc.m as usize {
      None
    } else {
      Some((task, row + 1))
    };
    Some((task.desc.addr_c as u64 + row as u64, lane_mask(task.desc.n as usize)))
  }
}

/// Destination and column mask of a task whose results are still arriving
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WritebackRecord {
  pub task: u64,
  pub addr_d: u64,
  pub col_mask: u64,
  pub rows: usize,
  pub offset: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WritebackStep {
  /// Address and lane strobe for the row written this cycle
  pub write: Option<(u64, u64)>,
  /// Task whose last row was written this cycle
  pub retired: Option<u64>,
}

/// Writeback tracker - matches result pulses to records in FIFO order
#[derive(Debug, Clone)]
pub struct Writeback {
  records: VecDeque<WritebackRecord>,
}

impl Writeback {
  pub fn new() -> Self {
    Self {
      records: VecDeque::new(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.records.is_empty()
  }

  pub fn len(&self) -> usize {
    self.records.len()
  }

  pub fn open(&mut self, task: &Task) {
    self.records.push_back(WritebackRecord {
      task: task.id,
      addr_d: task.desc.addr_d as u64,
      col_mask: lane_mask(task.desc.n as usize),
      rows: task.desc.m as usize,
      offset: 0,
    });
  }

  /// Consume one `writeback_valid` pulse.
  pub fn observe(&mut self) -> WritebackStep {
    let Some(record) = self.records.front_mut() else {
      log::warn!("writeback pulse with no pending record");
      return WritebackStep::default();
    };

    let write = Some((record.addr_d + record.offset as u64, record.col_mask));
    record.offset += 1;
    let retired = if record.offset >= record.rows {
      self.records.pop_front().map(|record| record.task)
    } else {
      None
    };
    WritebackStep { write, retired }
  }
}
