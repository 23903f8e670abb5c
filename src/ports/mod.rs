//! Port traits (interfaces) for external dependencies.

pub mod config_port;
pub mod executor_port;
