//! Core domain types and logic.

pub mod config_validation;
pub mod error;
pub mod field;
pub mod offset;
pub mod predicate;
pub mod query_builder;
pub mod report;
pub mod statement;
pub mod value;
