use std::fs::File;
use std::io::{self, BufWriter, Result, Write};

use sim::models::model_trait::DevsModel;
use sim::simulator::{Message, Simulation};

/// What one call to `model_step` did
#[derive(Debug, Default)]
pub struct StepResult {
  /// Simulation time moved forward by one timed event
  pub advanced: bool,
  /// Messages produced by internal events, delivered on the next call
  pub emitted: Vec<Message>,
}

fn sim_error(e: impl std::fmt::Debug) -> io::Error {
  io::Error::new(io::ErrorKind::Other, format!("Simulation error: {:?}", e))
}

fn trace_messages(messages: &[Message], trace_writer: &mut Option<BufWriter<File>>) -> Result<()> {
  for msg in messages {
    log::debug!(
      "[MSG] t={:.1} {}:{} -> {}:{} | {}",
      msg.time(),
      msg.source_id(),
      msg.source_port(),
      msg.target_id(),
      msg.target_port(),
      msg.content()
    );
  }

  if let Some(writer) = trace_writer {
    for msg in messages {
      let trace_entry = serde_json::json!({
        "time": msg.time(),
        "source": msg.source_id(),
        "source_port": msg.source_port(),
        "target": msg.target_id(),
        "target_port": msg.target_port(),
        "content": msg.content()
      });
      writeln!(writer, "{}", trace_entry)?;
    }
    writer.flush()?;
  }
  Ok(())
}

/// Deliver every pending message, then fire the next timed event if there is one.
pub fn model_step(simulation: &mut Simulation, trace_writer: &mut Option<BufWriter<File>>) -> Result<StepResult> {
  let mut result = StepResult::default();

  // zero-time delivery of pending messages
  loop {
    let pending = simulation.get_messages().clone();
    if pending.is_empty() {
      break;
    }
    trace_messages(&pending, trace_writer)?;
    let emitted = simulation.step().map_err(sim_error)?;
    result.emitted.extend(emitted);
  }

  let until_next_event = simulation
    .models()
    .iter()
    .fold(f64::INFINITY, |min, model| f64::min(min, model.until_next_event()));

  if until_next_event == f64::INFINITY {
    // all models passive, wait for external events
    return Ok(result);
  }

  let emitted = simulation.step().map_err(sim_error)?;
  result.emitted.extend(emitted);
  result.advanced = true;
  Ok(result)
}
