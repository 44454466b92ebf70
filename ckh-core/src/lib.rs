pub mod config;
pub mod error;
pub mod models;

pub use config::{Config, ConfigOverrides};
pub use error::{CkhError, Result};
pub use models::{HarvesterCall, Invocation, InvocationRecord, InvocationStatus};
