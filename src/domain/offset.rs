//! Relative trading-day offsets around an earnings report.
//!
//! Day zero is never stored: whether the report lands before the open or
//! after the close decides which session it belongs to, so the price table
//! only carries the sessions strictly before and after it.

use crate::domain::error::EarniError;
use std::fmt;

/// Every offset with a column in the price history table, ascending.
pub const VALID_OFFSETS: [i32; 16] = [
    -30, -20, -10, -5, -4, -3, -2, -1, 1, 2, 3, 4, 5, 10, 20, 30,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OffsetDay(i32);

impl OffsetDay {
    pub fn new(days: i32) -> Option<Self> {
        VALID_OFFSETS.contains(&days).then_some(Self(days))
    }

    /// Validate `days` for the named call argument.
    pub fn parse_arg(argument: &str, days: i32) -> Result<Self, EarniError> {
        Self::new(days).ok_or_else(|| EarniError::InvalidOffset {
            argument: argument.to_string(),
            value: days,
            valid: VALID_OFFSETS.to_vec(),
        })
    }

    pub fn all() -> impl Iterator<Item = OffsetDay> {
        VALID_OFFSETS.into_iter().map(OffsetDay)
    }

    /// Column-name suffix: `minus_{n}` before the report, `plus_{n}` after.
    pub fn suffix(self) -> String {
        if self.0 < 0 {
            format!("minus_{}", self.0.unsigned_abs())
        } else {
            format!("plus_{}", self.0)
        }
    }
}

impl fmt::Display for OffsetDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.suffix())
    }
}
