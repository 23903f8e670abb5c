//! Concrete adapter implementations for ports.

#[cfg(feature = "postgres")]
pub mod postgres_executor;
#[cfg(feature = "sqlite")]
pub mod sqlite_executor;
pub mod csv_writer;
pub mod file_config_adapter;
