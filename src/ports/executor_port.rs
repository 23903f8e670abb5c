//! Statement execution port trait.

use crate::domain::error::EarniError;
use crate::domain::statement::{Dialect, Statement};
use crate::domain::value::Row;

/// Owns at most one store connection. Not shared across threads; give each
/// worker its own executor.
pub trait Executor {
    /// Placeholder style the store expects.
    fn dialect(&self) -> Dialect;

    /// Open a connection unless a live one is already held.
    fn connect(&mut self) -> Result<(), EarniError>;

    /// Run `statement`, connecting first if needed, and return every row.
    fn run(&mut self, statement: &Statement) -> Result<Vec<Row>, EarniError>;

    /// Commit pending work and drop the connection. No-op when closed.
    fn disconnect(&mut self) -> Result<(), EarniError>;
}
