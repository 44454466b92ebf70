pub mod executor;
pub mod process;
pub mod tee;

pub use executor::HarvestRunner;
pub use process::{activated_env, resolve_program};
pub use tee::{test_log_name, LogTee};
