#![allow(dead_code)]

use chrono::NaiveDate;
use earni::adapters::sqlite_executor::SqliteExecutor;
use earni::domain::error::EarniError;
use earni::domain::field::PriceAttribute;
use earni::domain::offset::OffsetDay;
use earni::domain::report::{EarningsReport, PriceHistory};
use earni::domain::statement::{Dialect, Statement};
use earni::domain::value::Row;
use earni::ports::executor_port::Executor;
use std::io::Write;

/// Records every statement it is asked to run and answers with canned rows.
pub struct MockExecutor {
    pub dialect: Dialect,
    pub rows: Vec<Row>,
    pub error: Option<String>,
    pub ran: Vec<Statement>,
    pub connects: usize,
    pub disconnects: usize,
}

impl MockExecutor {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            rows: Vec::new(),
            error: None,
            ran: Vec::new(),
            connects: 0,
            disconnects: 0,
        }
    }

    pub fn with_rows(mut self, rows: Vec<Row>) -> Self {
        self.rows = rows;
        self
    }

    pub fn failing(mut self, reason: &str) -> Self {
        self.error = Some(reason.to_string());
        self
    }
}

impl Executor for MockExecutor {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn connect(&mut self) -> Result<(), EarniError> {
        self.connects += 1;
        Ok(())
    }

    fn run(&mut self, statement: &Statement) -> Result<Vec<Row>, EarniError> {
        self.ran.push(statement.clone());
        match &self.error {
            Some(reason) => Err(EarniError::QueryExecution {
                statement: statement.sql().to_string(),
                reason: reason.clone(),
            }),
            None => Ok(self.rows.clone()),
        }
    }

    fn disconnect(&mut self) -> Result<(), EarniError> {
        self.disconnects += 1;
        Ok(())
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn day(n: i32) -> OffsetDay {
    OffsetDay::new(n).unwrap()
}

pub fn make_report(ticker: &str, date: NaiveDate, reported: f64, estimate: f64) -> EarningsReport {
    let surprise = reported - estimate;
    EarningsReport {
        ticker: ticker.to_string(),
        date,
        period_end: None,
        eps_reported: reported,
        eps_estimate: estimate,
        surprise,
        surprise_percent: surprise / estimate * 100.0,
        time_of_report: "After Close".to_string(),
    }
}

/// Close prices in cents on the trading days either side of the report.
pub fn make_history(
    ticker: &str,
    date: NaiveDate,
    is_valid: bool,
    close_minus_1: i64,
    close_plus_1: i64,
) -> PriceHistory {
    PriceHistory::new(ticker, date, is_valid)
        .with(PriceAttribute::Close, day(-1), close_minus_1)
        .with(PriceAttribute::Close, day(1), close_plus_1)
        .with(PriceAttribute::Open, day(1), close_minus_1 + 50)
}

/// | ticker | date       | eps rep/est | close -1 | close +1 | valid | reported    |
/// |--------|------------|-------------|----------|----------|-------|-------------|
/// | AAPL   | 2024-02-01 | 2.18 / 2.10 | 18420    | 18650    | yes   | After Close |
/// | MSFT   | 2024-01-30 | 2.93 / 2.78 | 40800    | 39800    | yes   | After Close |
/// | NFLX   | 2024-01-23 | 2.11 / 2.22 | 48500    | 54400    | yes   | After Close |
/// | TSLA   | 2024-01-24 | 0.71 / 0.74 | 20700    | 18300    | no    | After Close |
/// | BND    | 2024-01-26 | 1.00 / 1.00 | 10000    | 15000    | yes   | Before Open |
///
/// period_end is NULL everywhere.
pub fn seed(exec: &mut SqliteExecutor) {
    exec.initialize_schema().unwrap();
    let rows = [
        ("AAPL", date(2024, 2, 1), 2.18, 2.10, true, 18_420, 18_650),
        ("MSFT", date(2024, 1, 30), 2.93, 2.78, true, 40_800, 39_800),
        ("NFLX", date(2024, 1, 23), 2.11, 2.22, true, 48_500, 54_400),
        ("TSLA", date(2024, 1, 24), 0.71, 0.74, false, 20_700, 18_300),
        ("BND", date(2024, 1, 26), 1.00, 1.00, true, 10_000, 15_000),
    ];
    for (ticker, d, reported, estimate, valid, before, after) in rows {
        let mut report = make_report(ticker, d, reported, estimate);
        if ticker == "BND" {
            report.time_of_report = "Before Open".to_string();
        }
        exec.insert_report(&report).unwrap();
        exec.insert_price_history(&make_history(ticker, d, valid, before, after))
            .unwrap();
    }
}

pub fn seeded_executor() -> SqliteExecutor {
    let mut exec = SqliteExecutor::in_memory();
    seed(&mut exec);
    exec
}

/// Tickers from the first column, sorted.
pub fn tickers(rows: &[Row]) -> Vec<String> {
    let mut out: Vec<String> = rows
        .iter()
        .map(|r| r[0].as_str().unwrap().to_string())
        .collect();
    out.sort();
    out
}

pub fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}
