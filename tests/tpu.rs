use proptest::prelude::*;
use tpusim::arch::tpu::AccT;
use tpusim::builtin::Module;
use tpusim::{TaskDescriptor, Tpu, TpuConfig};

fn task(addr_a: u16, addr_b: u16, addr_c: u16, addr_d: u16, m: u8, k: u8, n: u8) -> TaskDescriptor {
  TaskDescriptor {
    addr_a,
    addr_b,
    addr_c,
    addr_d,
    m,
    k,
    n,
  }
}

/// Reference `A×B + C` over the sub-matrix the descriptor names.
fn reference(tpu: &Tpu, desc: &TaskDescriptor) -> Vec<Vec<AccT>> {
  let row = |addr: u16, i: usize| tpu.read_row(addr as u64 + i as u64);
  (0..desc.m as usize)
    .map(|i| {
      let a = row(desc.addr_a, i);
      let c = row(desc.addr_c, i);
      (0..desc.n as usize)
        .map(|j| {
          (0..desc.k as usize).fold(c[j], |acc, p| acc.wrapping_add(a[p] * row(desc.addr_b, p)[j]))
        })
        .collect()
    })
    .collect()
}

fn run_collecting_done(tpu: &mut Tpu, limit: u64) -> Vec<u64> {
  let mut done_at = Vec::new();
  for cycle in 0..limit {
    tpu.run();
    if tpu.done() {
      done_at.push(cycle);
    }
    if !tpu.busy() {
      break;
    }
  }
  done_at
}

#[test]
fn identity_times_two_plus_bias() {
  let mut tpu = Tpu::new("tpu", &TpuConfig::with_width(4));
  let eye = |scale: AccT| -> Vec<Vec<AccT>> {
    (0..4).map(|r| (0..4).map(|c| if r == c { scale } else { 0 }).collect()).collect()
  };
  tpu.write_matrix(0, &eye(1));
  tpu.write_matrix(4, &eye(2));
  tpu.write_matrix(8, &vec![vec![3; 4]; 4]);

  assert!(tpu.issue(task(0, 4, 8, 12, 4, 4, 4)));
  assert!(tpu.run_until_idle(200).is_some());
  assert_eq!(tpu.completed(), 1);

  // read through the clocked read-back port
  for i in 0..4 {
    tpu.request_readback(12 + i);
    tpu.run();
    let expected: Vec<AccT> = (0..4).map(|c| if c == i as usize { 5 } else { 3 }).collect();
    assert_eq!(tpu.readback(), Some(&expected[..]));
  }
}

#[test]
fn back_to_back_tasks_with_different_shapes() {
  let mut tpu = Tpu::new("tpu", &TpuConfig::with_width(4));
  tpu.write_matrix(0, &[vec![1, 2, 3, 9], vec![4, 5, 6, 9]]);
  tpu.write_matrix(4, &[vec![1, 0, 9, 9], vec![0, 1, 9, 9], vec![1, 1, 9, 9], vec![9, 9, 9, 9]]);
  tpu.write_row(16, &[7, 7, 7, 7]);
  tpu.write_row(20, &[1, 2, 3, 4]);
  tpu.write_matrix(10, &vec![vec![-1; 4]; 3]);

  assert!(tpu.issue(task(0, 4, 8, 10, 2, 3, 2)));
  assert!(tpu.issue(task(16, 20, 16, 12, 1, 1, 4)));

  let done_at = run_collecting_done(&mut tpu, 200);
  assert_eq!(done_at.len(), 2);
  assert!(done_at[1] > done_at[0]);
  assert!(!tpu.busy());

  // lanes beyond N keep their previous contents
  assert_eq!(tpu.read_row(10), vec![4, 5, -1, -1]);
  assert_eq!(tpu.read_row(11), vec![10, 11, -1, -1]);
  assert_eq!(tpu.read_row(12), vec![14, 21, 28, 35]);
}

#[test]
fn queue_full_rejects_until_retired() {
  let config = TpuConfig {
    queue_depth: 1,
    ..TpuConfig::with_width(2)
  };
  let mut tpu = Tpu::new("tpu", &config);
  let desc = task(0, 2, 4, 6, 2, 2, 2);
  assert!(tpu.issue(desc));
  assert!(!tpu.ready());
  assert!(!tpu.issue(desc));

  assert!(tpu.run_until_idle(100).is_some());
  assert!(tpu.ready());
  assert!(tpu.issue(desc));
}

#[test]
fn oversized_task_is_rejected() {
  let mut tpu = Tpu::new("tpu", &TpuConfig::with_width(2));
  assert!(!tpu.issue(task(0, 2, 4, 6, 3, 2, 2)));
  assert!(!tpu.issue(task(0, 2, 4, 6, 2, 0, 2)));
  assert!(!tpu.busy());
  assert!(tpu.ready());
}

#[test]
fn reset_mid_flight_abandons_tasks() {
  let mut tpu = Tpu::new("tpu", &TpuConfig::with_width(2));
  tpu.write_matrix(0, &[vec![10, 1], vec![20, 2]]);
  tpu.write_matrix(2, &[vec![2, 3], vec![4, 5]]);
  tpu.issue(task(0, 2, 4, 6, 2, 2, 2));
  for _ in 0..5 {
    tpu.run();
  }
  assert!(tpu.busy());

  tpu.reset();
  assert!(!tpu.busy());
  assert!(run_collecting_done(&mut tpu, 50).is_empty());
  assert_eq!(tpu.completed(), 0);
  assert_eq!(tpu.read_row(6), vec![0, 0]);

  // storage survives, a fresh task still runs
  tpu.issue(task(0, 2, 4, 6, 2, 2, 2));
  assert!(tpu.run_until_idle(100).is_some());
  assert_eq!(tpu.read_row(7), vec![48, 70]);
}

/// Width, then two (M, K, N) shapes, then a storage image of 64 full-width rows
fn workload() -> impl Strategy<Value = (usize, [(u8, u8, u8); 2], Vec<Vec<AccT>>)> {
  (1usize..=4).prop_flat_map(|w| {
    let len = 1..=w as u8;
    let shape = (len.clone(), len.clone(), len);
    (
      Just(w),
      [shape.clone(), shape],
      prop::collection::vec(prop::collection::vec(-128 as AccT..128, w), 64),
    )
  })
}

proptest! {
  #[test]
  fn matches_reference_matmul((w, shapes, image) in workload()) {
    let config = TpuConfig { width: w, queue_depth: 2, buffer_rows: 128 };
    let mut tpu = Tpu::new("tpu", &config);
    tpu.write_matrix(0, &image);
    tpu.write_matrix(64, &vec![vec![77; w]; 16]);

    let descs: Vec<TaskDescriptor> = shapes
      .iter()
      .enumerate()
      .map(|(i, &(m, k, n))| {
        let base = i as u16 * 32;
        task(base, base + 8, base + 16, 64 + i as u16 * 8, m, k, n)
      })
      .collect();
    let expected: Vec<_> = descs.iter().map(|desc| reference(&tpu, desc)).collect();

    for desc in &descs {
      prop_assert!(tpu.issue(*desc));
    }
    prop_assert!(tpu.run_until_idle(1000).is_some());
    prop_assert_eq!(tpu.completed(), 2);

    for (desc, rows) in descs.iter().zip(&expected) {
      for i in 0..w {
        let got = tpu.read_row(desc.addr_d as u64 + i as u64);
        for j in 0..w {
          let want = if i < desc.m as usize && j < desc.n as usize { rows[i][j] } else { 77 };
          prop_assert_eq!(got[j], want, "D{:?} row {} lane {}", desc, i, j);
        }
      }
    }
  }

  #[test]
  fn readback_is_idempotent(rows in prop::collection::vec(prop::collection::vec(any::<AccT>(), 3), 1..8)) {
    let mut tpu = Tpu::new("tpu", &TpuConfig::with_width(3));
    tpu.write_matrix(0, &rows);
    for (i, row) in rows.iter().enumerate() {
      for _ in 0..2 {
        tpu.request_readback(i as u64);
        tpu.run();
        prop_assert_eq!(tpu.readback(), Some(&row[..]));
      }
      prop_assert_eq!(&tpu.read_row(i as u64), row);
    }
  }
}
