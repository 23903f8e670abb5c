//! Rows of the two tables the query layer reads.

use crate::domain::field::PriceAttribute;
use crate::domain::offset::OffsetDay;
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// One earnings report event.
#[derive(Debug, Clone, PartialEq)]
pub struct EarningsReport {
    pub ticker: String,
    pub date: NaiveDate,
    pub period_end: Option<String>,
    pub eps_reported: f64,
    pub eps_estimate: f64,
    pub surprise: f64,
    pub surprise_percent: f64,
    /// e.g. "After Close", "Before Open"; "Invalid" when unknown.
    pub time_of_report: String,
}

/// Prices around one report. Prices are integer cents, volumes share counts.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceHistory {
    pub ticker: String,
    pub report_date: NaiveDate,
    pub is_valid: bool,
    pub values: BTreeMap<(OffsetDay, PriceAttribute), i64>,
}

impl PriceHistory {
    pub fn new(ticker: &str, report_date: NaiveDate, is_valid: bool) -> Self {
        Self {
            ticker: ticker.to_string(),
            report_date,
            is_valid,
            values: BTreeMap::new(),
        }
    }

    pub fn with(mut self, attribute: PriceAttribute, offset: OffsetDay, value: i64) -> Self {
        self.values.insert((offset, attribute), value);
        self
    }
}
