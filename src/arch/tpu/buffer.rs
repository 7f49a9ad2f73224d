/// Unified buffer - row-addressed operand/result storage
use super::AccT;
use crate::builtin::{Module, Wire};

/// Independent read ports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadPort {
  A,
  B,
  C,
  /// Host read-back
  R,
}

impl ReadPort {
  pub const ALL: [ReadPort; 4] = [ReadPort::A, ReadPort::B, ReadPort::C, ReadPort::R];

  fn index(self) -> usize {
    self as usize
  }
}

/// 写请求
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteReq {
  pub addr: u64,
  pub data: Vec<AccT>,
  /// Lane strobe, bit `i` enables lane `i`
  pub mask: u64,
}

/// Unified Buffer
///
/// Every read port answers a request one cycle later. A read and a write to the
/// same row in one cycle returns the old contents.
#[derive(Clone)]
pub struct UnifiedBuffer {
  width: usize,

  // 输入：读请求（行地址）
  pub read_req: [Wire<u64>; 4],
  // 输入：写请求
  pub write_req: Wire<WriteReq>,

  // 输出：读响应
  read_resp: [Wire<Vec<AccT>>; 4],

  rows: Vec<Vec<AccT>>,
}

impl UnifiedBuffer {
  pub fn new(width: usize, rows: usize) -> Self {
    Self {
      width,
      read_req: Default::default(),
      write_req: Wire::default(),
      read_resp: Default::default(),
      rows: vec![vec![0; width]; rows],
    }
  }

  pub fn width(&self) -> usize {
    self.width
  }

  pub fn depth(&self) -> usize {
    self.rows.len()
  }

  pub fn request(&mut self, port: ReadPort, addr: u64) {
    self.read_req[port.index()].set(addr);
  }

  /// Data for the request issued on `port` in the previous cycle
  pub fn response(&self, port: ReadPort) -> Option<&[AccT]> {
    self.read_resp[port.index()].get().map(|row| row.as_slice())
  }

  /// 直接写入一行（主机侧，不经过端口）
  pub fn write_row(&mut self, addr: u64, data: &[AccT]) {
    match self.rows.get_mut(addr as usize) {
      Some(row) => {
        for (lane, value) in row.iter_mut().zip(data.iter()) {
          *lane = *value;
        }
      }
      None => log::warn!("buffer: host write to row {} out of range", addr),
    }
  }

  /// 直接读取一行（主机侧，越界返回0）
  pub fn read_row(&self, addr: u64) -> Vec<AccT> {
    self.rows.get(addr as usize).cloned().unwrap_or_else(|| vec![0; self.width])
  }
}

impl Module for UnifiedBuffer {
  fn run(&mut self) {
    // 先读后写
    for port in ReadPort::ALL {
      let i = port.index();
      match self.read_req[i].get().copied() {
        Some(addr) => {
          let row = self.read_row(addr);
          self.read_resp[i].set(row);
        }
        None => self.read_resp[i].clear(),
      }
      self.read_req[i].clear();
    }

    if let Some(req) = self.write_req.get() {
      match self.rows.get_mut(req.addr as usize) {
        Some(row) => {
          for (lane, (cell, value)) in row.iter_mut().zip(req.data.iter()).enumerate() {
            if lane < 64 && (req.mask >> lane) & 1 == 1 {
              *cell = *value;
            }
          }
        }
        None => log::warn!("buffer: write to row {} out of range, dropped", req.addr),
      }
    }
    self.write_req.clear();
  }

  /// Drops pending requests and responses; storage contents survive.
  fn reset(&mut self) {
    self.read_req = Default::default();
    self.write_req = Wire::default();
    self.read_resp = Default::default();
  }

  fn name(&self) -> &str {
    "unified_buffer"
  }
}
