use sim::models::{Model, Reportable};
use sim::simulator::Simulation;

use crate::arch::tpu::model::{IrqMsg, MemDataMsg};

/// Outcome of one workload run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
  /// Clock cycles simulated
  pub cycles: u64,
  pub irqs: Vec<IrqMsg>,
  pub readback: Vec<MemDataMsg>,
  /// Run stopped at the cycle limit with work outstanding
  pub timed_out: bool,
}

impl RunReport {
  pub fn completed(&self) -> usize {
    self.irqs.len()
  }

  pub fn print(&self) {
    println!("\n--- Run Report ---");
    println!("cycles:    {}", self.cycles);
    println!("completed: {}", self.completed());
    for irq in &self.irqs {
      println!("  irq #{} at cycle {}", irq.completed, irq.cycle);
    }
    for row in &self.readback {
      println!("  D[{:#06x}] = {:?}", row.addr, row.data);
    }
    if self.timed_out {
      println!("stopped at cycle limit");
    }
    println!("--- End Report ---\n");
  }
}

pub fn print_simulation_records(simulation: &mut Simulation) {
  println!("\n--- Simulation Records ---");

  for model in simulation.models().iter() {
    print_model_records(model);
  }

  println!("--- End Records ---\n");
}

fn print_model_records(model: &Model) {
  let records = model.records();

  if !records.is_empty() {
    println!("\n[{}] {}", model.id(), model.status());
    for record in records {
      println!("  Time {:.1}: {} {}", record.time, record.action, record.subject);
    }
  }
}
