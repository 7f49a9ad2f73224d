use clap::Parser;
use std::path::PathBuf;
use tpusim::log_info;
use tpusim::simulator::config::{load_and_merge_configs, load_workload, CliOverrides};
use tpusim::simulator::utils::log::init_log;
use tpusim::simulator::Simulator;

/// tpusim - cycle-level systolic array simulator
#[derive(Parser, Debug)]
#[command(name = "tpusim")]
#[command(version = "0.1.0")]
#[command(about = "Cycle-level simulator of a weight-stationary systolic array", long_about = None)]
struct Args {
  /// Workload file (TOML: memory images, tasks, readback requests)
  #[arg(short, long, value_name = "FILE")]
  workload: PathBuf,

  /// Configuration file layered over the built-in defaults
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Enable step mode (interactive stepping)
  #[arg(short, long)]
  step: bool,

  /// Quiet mode (suppress log messages)
  #[arg(short, long)]
  quiet: bool,

  /// Output trace file path
  #[arg(long, value_name = "FILE")]
  trace_file: Option<String>,

  /// Array width W
  #[arg(long)]
  width: Option<usize>,

  /// Task queue depth
  #[arg(long)]
  queue_depth: Option<usize>,

  /// Stop after this many cycles
  #[arg(long)]
  max_cycles: Option<u64>,
}

fn main() -> std::io::Result<()> {
  let args = Args::parse();

  let cli = CliOverrides {
    quiet: args.quiet,
    step: args.step,
    trace_file: args.trace_file,
    width: args.width,
    queue_depth: args.queue_depth,
    max_cycles: args.max_cycles,
  };
  let config = load_and_merge_configs(args.config.as_deref(), &cli)?;
  init_log(config.simulation.quiet);

  let workload = load_workload(&args.workload)?;
  workload.validate(&config.tpu)?;

  let mut simulator = Simulator::new(config.sim_config(), &config.tpu)?;
  simulator.load(&workload)?;
  let report = simulator.run()?;

  for row in &report.readback {
    log_info!("D[{:#06x}] = {:?}", row.addr, row.data);
  }
  report.print();

  if report.timed_out {
    return Err(std::io::Error::new(
      std::io::ErrorKind::TimedOut,
      format!("workload did not finish within {} cycles", config.simulation.max_cycles),
    ));
  }
  Ok(())
}
