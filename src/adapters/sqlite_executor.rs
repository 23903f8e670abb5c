//! SQLite executor.

use crate::domain::config_validation::sqlite_path;
use crate::domain::error::EarniError;
use crate::domain::field::PriceAttribute;
use crate::domain::offset::OffsetDay;
use crate::domain::report::{EarningsReport, PriceHistory};
use crate::domain::statement::{Dialect, Statement};
use crate::domain::value::{Row, Value};
use crate::ports::config_port::ConfigPort;
use crate::ports::executor_port::Executor;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params, params_from_iter, Connection, OpenFlags};
use std::path::PathBuf;

#[derive(Debug, Clone)]
enum Target {
    File { path: PathBuf, read_only: bool },
    Memory,
}

pub struct SqliteExecutor {
    target: Target,
    conn: Option<Connection>,
}

impl SqliteExecutor {
    /// Reads `[sqlite] path` and `[sqlite] read_only` (default false).
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, EarniError> {
        let path = sqlite_path(config)?;
        if config.get_bool("sqlite", "read_only", false) {
            Ok(Self::open_read_only(path))
        } else {
            Ok(Self::open(path))
        }
    }

    /// Executor for a database file. Nothing is opened until first use.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            target: Target::File {
                path: path.into(),
                read_only: false,
            },
            conn: None,
        }
    }

    /// Like [`SqliteExecutor::open`], but the file must already exist and
    /// cannot be written through this executor.
    pub fn open_read_only(path: impl Into<PathBuf>) -> Self {
        Self {
            target: Target::File {
                path: path.into(),
                read_only: true,
            },
            conn: None,
        }
    }

    /// Private in-memory database. Its contents live as long as the
    /// connection, so a disconnect discards them.
    pub fn in_memory() -> Self {
        Self {
            target: Target::Memory,
            conn: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// Create both tables if missing.
    pub fn initialize_schema(&mut self) -> Result<(), EarniError> {
        let mut price_columns = String::new();
        for offset in OffsetDay::all() {
            for attribute in PriceAttribute::ALL {
                price_columns.push_str(&format!(",\n    {} INTEGER", attribute.column(offset)));
            }
        }

        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS earnings_reports (
    ticker TEXT NOT NULL,
    date TEXT NOT NULL,
    period_end TEXT,
    eps_reported REAL,
    eps_estimate REAL,
    surprise REAL,
    surprise_percent REAL,
    time_of_report TEXT,
    PRIMARY KEY (ticker, date)
);
CREATE TABLE IF NOT EXISTS price_history (
    ticker TEXT NOT NULL,
    report_date TEXT NOT NULL,
    is_valid INTEGER NOT NULL DEFAULT 1{price_columns},
    PRIMARY KEY (ticker, report_date)
);"
        );

        self.connection()?
            .execute_batch(&ddl)
            .map_err(|e| EarniError::QueryExecution {
                statement: ddl.clone(),
                reason: e.to_string(),
            })
    }

    pub fn insert_report(&mut self, report: &EarningsReport) -> Result<(), EarniError> {
        let sql = "INSERT OR REPLACE INTO earnings_reports
                   (ticker, date, period_end, eps_reported, eps_estimate, surprise, surprise_percent, time_of_report)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)";
        self.connection()?
            .execute(
                sql,
                params![
                    report.ticker,
                    report.date.format("%Y-%m-%d").to_string(),
                    report.period_end,
                    report.eps_reported,
                    report.eps_estimate,
                    report.surprise,
                    report.surprise_percent,
                    report.time_of_report,
                ],
            )
            .map_err(|e| EarniError::QueryExecution {
                statement: sql.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    pub fn insert_price_history(&mut self, history: &PriceHistory) -> Result<(), EarniError> {
        let mut columns = vec![
            "ticker".to_string(),
            "report_date".to_string(),
            "is_valid".to_string(),
        ];
        let mut values = vec![
            SqlValue::Text(history.ticker.clone()),
            SqlValue::Text(history.report_date.format("%Y-%m-%d").to_string()),
            SqlValue::Integer(i64::from(history.is_valid)),
        ];
        for (&(offset, attribute), &value) in &history.values {
            columns.push(attribute.column(offset));
            values.push(SqlValue::Integer(value));
        }
        let placeholders: Vec<String> = (1..=values.len()).map(|n| format!("?{n}")).collect();
        let sql = format!(
            "INSERT OR REPLACE INTO price_history ({}) VALUES ({})",
            columns.join(", "),
            placeholders.join(", ")
        );

        self.connection()?
            .execute(&sql, params_from_iter(values))
            .map_err(|e| EarniError::QueryExecution {
                statement: sql.clone(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    fn connection(&mut self) -> Result<&Connection, EarniError> {
        self.connect()?;
        self.conn.as_ref().ok_or_else(|| EarniError::Connection {
            reason: "connection unavailable".into(),
        })
    }

    fn is_alive(conn: &Connection) -> bool {
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .is_ok()
    }
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(v) => SqlValue::Integer(i64::from(*v)),
        Value::Int(v) => SqlValue::Integer(*v),
        Value::Float(v) => SqlValue::Real(*v),
        Value::Text(v) => SqlValue::Text(v.clone()),
        Value::Date(v) => SqlValue::Text(v.format("%Y-%m-%d").to_string()),
    }
}

fn from_sql(index: usize, value: ValueRef<'_>) -> Result<Value, rusqlite::Error> {
    match value {
        ValueRef::Null => Ok(Value::Null),
        ValueRef::Integer(v) => Ok(Value::Int(v)),
        ValueRef::Real(v) => Ok(Value::Float(v)),
        ValueRef::Text(bytes) => Ok(Value::Text(String::from_utf8_lossy(bytes).into_owned())),
        ValueRef::Blob(_) => Err(rusqlite::Error::InvalidColumnType(
            index,
            "blob".to_string(),
            rusqlite::types::Type::Blob,
        )),
    }
}

impl Executor for SqliteExecutor {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn connect(&mut self) -> Result<(), EarniError> {
        if let Some(conn) = &self.conn {
            if Self::is_alive(conn) {
                return Ok(());
            }
            tracing::warn!("sqlite connection failed liveness probe; reconnecting");
            self.conn = None;
        }

        let conn = match &self.target {
            Target::File {
                path,
                read_only: false,
            } => Connection::open(path),
            Target::File {
                path,
                read_only: true,
            } => Connection::open_with_flags(
                path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            ),
            Target::Memory => Connection::open_in_memory(),
        }
        .map_err(|e| EarniError::Connection {
            reason: e.to_string(),
        })?;

        tracing::info!(database = ?self.target, "connected to sqlite");
        self.conn = Some(conn);
        Ok(())
    }

    fn run(&mut self, statement: &Statement) -> Result<Vec<Row>, EarniError> {
        let conn = self.connection()?;
        let query_err = |e: rusqlite::Error| EarniError::QueryExecution {
            statement: statement.sql().to_string(),
            reason: e.to_string(),
        };

        let mut stmt = conn.prepare(statement.sql()).map_err(query_err)?;
        let width = stmt.column_count();
        let rows = stmt
            .query_map(params_from_iter(statement.params().iter().map(to_sql)), |row| {
                (0..width)
                    .map(|i| from_sql(i, row.get_ref(i)?))
                    .collect::<Result<Row, _>>()
            })
            .map_err(query_err)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(query_err)?);
        }
        Ok(out)
    }

    fn disconnect(&mut self) -> Result<(), EarniError> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };
        if !conn.is_autocommit() {
            conn.execute_batch("COMMIT")
                .map_err(|e| EarniError::Connection {
                    reason: e.to_string(),
                })?;
        }
        conn.close().map_err(|(_, e)| EarniError::Connection {
            reason: e.to_string(),
        })?;
        tracing::info!("disconnected from sqlite");
        Ok(())
    }
}
