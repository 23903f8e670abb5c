//! earni: earnings report queries over relative trading-day prices.
//!
//! Hexagonal architecture: the field whitelist, predicates and query builder
//! live in [`domain`], port traits in [`ports`], store and file
//! implementations in [`adapters`].

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod cli;
