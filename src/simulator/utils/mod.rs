pub mod log;
pub mod report;

pub use report::RunReport;
