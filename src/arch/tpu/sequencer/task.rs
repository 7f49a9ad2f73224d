/// Task descriptors and the admission queue
use std::collections::VecDeque;
use std::io;

use serde::{Deserialize, Serialize};

use crate::arch::tpu::RegT;

/// One `D = A×B + C` job over sub-matrices no wider than the array.
///
/// Addresses are storage row indices. Row `i` of A lives at `addr_a + i`, and so on
/// for B, C and D.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDescriptor {
  pub addr_a: u16,
  pub addr_b: u16,
  pub addr_c: u16,
  pub addr_d: u16,
  /// rows of A, C and D
  pub m: u8,
  /// columns of A, rows of B
  pub k: u8,
  /// columns of B, C and D
  pub n: u8,
}

impl TaskDescriptor {
  /// Unpack a host command: `xs1 = A | B<<16 | C<<32 | D<<48`, `xs2 = M | K<<8 | N<<16`.
  pub fn decode(xs1: RegT, xs2: RegT) -> Self {
    Self {
      addr_a: (xs1 & 0xffff) as u16,
      addr_b: ((xs1 >> 16) & 0xffff) as u16,
      addr_c: ((xs1 >> 32) & 0xffff) as u16,
      addr_d: ((xs1 >> 48) & 0xffff) as u16,
      m: (xs2 & 0xff) as u8,
      k: ((xs2 >> 8) & 0xff) as u8,
      n: ((xs2 >> 16) & 0xff) as u8,
    }
  }

  pub fn encode(&self) -> (RegT, RegT) {
    let xs1 = self.addr_a as RegT
      | (self.addr_b as RegT) << 16
      | (self.addr_c as RegT) << 32
      | (self.addr_d as RegT) << 48;
    let xs2 = self.m as RegT | (self.k as RegT) << 8 | (self.n as RegT) << 16;
    (xs1, xs2)
  }

  /// Every length must lie in `1..=width`.
  pub fn check(&self, width: usize) -> io::Result<()> {
    for (name, len) in [("M", self.m), ("K", self.k), ("N", self.n)] {
      if len == 0 || len as usize > width {
        return Err(io::Error::new(
          io::ErrorKind::InvalidInput,
          format!("{} = {} out of range 1..={}", name, len, width),
        ));
      }
    }
    Ok(())
  }
}

/// An admitted task together with its admission number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Task {
  pub id: u64,
  pub desc: TaskDescriptor,
}

/// FIFO of admitted tasks; an entry stays resident until its last result row is
/// written back.
#[derive(Debug, Clone)]
pub struct TaskQueue {
  entries: VecDeque<Task>,
  capacity: usize,
  next_id: u64,
}

impl TaskQueue {
  pub fn new(capacity: usize) -> Self {
    Self {
      entries: VecDeque::with_capacity(capacity),
      capacity: capacity.max(1),
      next_id: 0,
    }
  }

  pub fn is_full(&self) -> bool {
    self.entries.len() >= self.capacity
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  /// Admit a task; `None` when the queue is full.
  pub fn push(&mut self, desc: TaskDescriptor) -> Option<u64> {
    if self.is_full() {
      return None;
    }
    let id = self.next_id;
    self.next_id += 1;
    self.entries.push_back(Task { id, desc });
    Some(id)
  }

  pub fn get(&self, id: u64) -> Option<&Task> {
    self.entries.iter().find(|task| task.id == id)
  }

  pub fn front(&self) -> Option<&Task> {
    self.entries.front()
  }

  pub fn pop(&mut self) -> Option<Task> {
    self.entries.pop_front()
  }

  /// Id the next admitted task will receive
  pub fn next_id(&self) -> u64 {
    self.next_id
  }

  pub fn clear(&mut self) {
    self.entries.clear();
    self.next_id = 0;
  }
}
