use std::fs;
use std::path::PathBuf;

use tpusim::arch::tpu::model::MemDataMsg;
use tpusim::simulator::config::workload::parse_workload;
use tpusim::simulator::config::{load_workload, Workload};
use tpusim::simulator::Simulator;
use tpusim::{SimConfig, TpuConfig};

fn workload_path(name: &str) -> PathBuf {
  PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("workloads").join(name)
}

fn quiet() -> SimConfig {
  SimConfig {
    quiet: true,
    ..SimConfig::default()
  }
}

fn run(config: SimConfig, tpu: &TpuConfig, workload: &Workload) -> tpusim::simulator::utils::RunReport {
  workload.validate(tpu).unwrap();
  let mut simulator = Simulator::new(config, tpu).unwrap();
  simulator.load(workload).unwrap();
  simulator.run().unwrap()
}

#[test]
fn identity_workload() {
  let workload = load_workload(&workload_path("identity4x4.toml")).unwrap();
  let report = run(quiet(), &TpuConfig::default(), &workload);

  assert!(!report.timed_out);
  assert_eq!(report.completed(), 1);
  assert_eq!(report.irqs[0].completed, 1);

  let rows: Vec<MemDataMsg> = (0..4)
    .map(|i| MemDataMsg {
      addr: 12 + i,
      data: (0..4).map(|c| if c == i { 5 } else { 3 }).collect(),
    })
    .collect();
  assert_eq!(report.readback, rows);
}

#[test]
fn back_to_back_workload() {
  let workload = load_workload(&workload_path("back_to_back.toml")).unwrap();
  let report = run(quiet(), &TpuConfig::default(), &workload);

  assert_eq!(report.completed(), 2);
  assert!(report.irqs[1].cycle > report.irqs[0].cycle);
  let data: Vec<Vec<i32>> = report.readback.iter().map(|row| row.data.clone()).collect();
  assert_eq!(data, vec![vec![4, 5, 0, 0], vec![10, 11, 0, 0], vec![14, 21, 28, 35]]);
}

#[test]
fn host_stalls_on_full_queue() {
  let mut workload = load_workload(&workload_path("identity4x4.toml")).unwrap();
  let task = workload.tasks[0];
  workload.tasks = vec![task; 3];
  let tpu = TpuConfig {
    queue_depth: 1,
    ..TpuConfig::default()
  };
  let report = run(quiet(), &tpu, &workload);

  assert_eq!(report.completed(), 3);
  let counts: Vec<u64> = report.irqs.iter().map(|irq| irq.completed).collect();
  assert_eq!(counts, vec![1, 2, 3]);
}

#[test]
fn cycle_limit_stops_the_run() {
  let workload = load_workload(&workload_path("identity4x4.toml")).unwrap();
  let config = SimConfig {
    max_cycles: 5,
    ..quiet()
  };
  let report = run(config, &TpuConfig::default(), &workload);

  assert!(report.timed_out);
  assert_eq!(report.cycles, 5);
  assert!(report.irqs.is_empty());
  assert!(report.readback.is_empty());
}

#[test]
fn reset_drops_in_flight_work() {
  let workload = load_workload(&workload_path("identity4x4.toml")).unwrap();
  let mut simulator = Simulator::new(quiet(), &TpuConfig::default()).unwrap();
  simulator.load(&workload).unwrap();
  assert_eq!(simulator.step_cycles(4).unwrap(), 4);

  simulator.reset();
  let report = simulator.run().unwrap();
  assert!(report.irqs.is_empty());
  // the result rows were never written
  assert!(report.readback.iter().all(|row| row.data == vec![0; 4]));
  assert_eq!(report.readback.len(), 4);
}

#[test]
fn trace_file_records_messages() {
  let dir = tempfile::tempdir().unwrap();
  let trace = dir.path().join("trace.jsonl");
  let config = SimConfig {
    trace_file: Some(trace.to_string_lossy().to_string()),
    ..quiet()
  };
  let workload = parse_workload(
    r#"
[[memory]]
addr = 0
rows = [[3]]

[[memory]]
addr = 1
rows = [[4]]

[[task]]
addr_a = 0
addr_b = 1
addr_c = 2
addr_d = 3
m = 1
k = 1
n = 1

[[readback]]
addr = 3
"#,
  )
  .unwrap();
  let report = run(config, &TpuConfig::with_width(1), &workload);
  assert_eq!(report.readback[0].data, vec![12]);

  let content = fs::read_to_string(&trace).unwrap();
  let ports: Vec<String> = content
    .lines()
    .map(|line| {
      let entry: serde_json::Value = serde_json::from_str(line).unwrap();
      entry["target_port"].as_str().unwrap().to_string()
    })
    .collect();
  for port in ["mem_write", "cmd", "irq", "mem_read", "mem_data"] {
    assert!(ports.iter().any(|p| p == port), "no {} message in trace", port);
  }
}
