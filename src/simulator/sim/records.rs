/// Push a `ModelRecord` stamped with the current simulation time.
///
/// Usage:
/// ```ignore
/// model_record!(self, services, "irq", "plain subject");
/// model_record!(self, services, "irq", "task {} at cycle {}", id, cycle);
/// ```
#[macro_export]
macro_rules! model_record {
  ($self:expr, $services:expr, $action:expr, $fmt:literal, $($arg:tt)+) => {
    $self.records.push(sim::models::ModelRecord {
      time: $services.global_time(),
      action: $action.to_string(),
      subject: format!($fmt, $($arg)+),
    });
  };
  ($self:expr, $services:expr, $action:expr, $subject:expr) => {
    $self.records.push(sim::models::ModelRecord {
      time: $services.global_time(),
      action: $action.to_string(),
      subject: $subject.to_string(),
    });
  };
}
