/// Logging setup and user-facing output
use std::sync::atomic::{AtomicBool, Ordering};

use env_logger::Env;
use log::LevelFilter;

static ENABLE_LOG: AtomicBool = AtomicBool::new(true);

/// Set user-facing output enabled
pub fn set_log(enabled: bool) {
  ENABLE_LOG.store(enabled, Ordering::Relaxed);
}

/// Check if user-facing output is enabled, default is true
pub fn is_log_enabled() -> bool {
  ENABLE_LOG.load(Ordering::Relaxed)
}

/// Install the env_logger backend. `RUST_LOG` overrides the default `info`
/// filter; quiet mode caps everything at `warn`.
pub fn init_log(quiet: bool) {
  let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
  builder.format_timestamp(None);
  if quiet {
    builder.filter_level(LevelFilter::Warn);
  }
  // a second initialisation (tests, embedding) keeps the first logger
  let _ = builder.try_init();
  set_log(!quiet);
}

/// Print a message with a blue [tpusim] prefix unless quiet
#[macro_export]
macro_rules! log_info {
  ($($arg:tt)*) => {
    if $crate::simulator::utils::log::is_log_enabled() {
      println!("\x1b[34m[tpusim]\x1b[0m {}", format!($($arg)*));
    }
  };
}
