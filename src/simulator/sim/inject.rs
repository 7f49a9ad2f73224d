use sim::simulator::{Message, Simulation};

use crate::arch::tpu::model::{HOST_ID, TPU_ID};

/// Inject a message into a model input port at the current simulation time
///
/// # Parameters
/// - `simulation`: Simulation instance
/// - `target_model`: Target model id, defaults to the Tpu
/// - `target_port`: Target input port; the source port carries the same name
/// - `content`: Message payload (JSON)
pub fn inject_message(simulation: &mut Simulation, target_model: Option<&str>, target_port: &str, content: &str) {
  let msg = Message::new(
    HOST_ID.to_string(),
    target_port.to_string(),
    target_model.unwrap_or(TPU_ID).to_string(),
    target_port.to_string(),
    simulation.get_global_time(),
    content.to_string(),
  );
  simulation.inject_input(msg);
}
