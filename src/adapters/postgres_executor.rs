//! PostgreSQL executor.

use crate::domain::config_validation::postgres_conninfo;
use crate::domain::error::EarniError;
use crate::domain::statement::{Dialect, Statement};
use crate::domain::value::{Row, Value};
use crate::ports::config_port::ConfigPort;
use crate::ports::executor_port::Executor;
use chrono::NaiveDate;
use postgres::types::{ToSql, Type};
use postgres::{Client, NoTls};
use std::time::Duration;

const DEFAULT_LIVENESS_TIMEOUT_SECS: i64 = 5;

pub struct PostgresExecutor {
    conninfo: String,
    liveness_timeout: Duration,
    client: Option<Client>,
}

impl PostgresExecutor {
    /// Reads the conninfo and `[postgres] liveness_timeout_secs`.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, EarniError> {
        let conninfo = postgres_conninfo(config)?;
        let secs = config.get_int(
            "postgres",
            "liveness_timeout_secs",
            DEFAULT_LIVENESS_TIMEOUT_SECS,
        );
        if secs <= 0 {
            return Err(EarniError::ConfigInvalid {
                section: "postgres".into(),
                key: "liveness_timeout_secs".into(),
                reason: "liveness_timeout_secs must be positive".into(),
            });
        }
        Ok(Self::new(conninfo).with_liveness_timeout(Duration::from_secs(secs as u64)))
    }

    /// Nothing is opened until first use.
    pub fn new(conninfo: impl Into<String>) -> Self {
        Self {
            conninfo: conninfo.into(),
            liveness_timeout: Duration::from_secs(DEFAULT_LIVENESS_TIMEOUT_SECS as u64),
            client: None,
        }
    }

    pub fn with_liveness_timeout(mut self, timeout: Duration) -> Self {
        self.liveness_timeout = timeout;
        self
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }
}

fn to_sql(value: &Value) -> Box<dyn ToSql + Sync> {
    match value {
        Value::Null => Box::new(Option::<String>::None),
        Value::Bool(v) => Box::new(*v),
        Value::Int(v) => Box::new(*v),
        Value::Float(v) => Box::new(*v),
        Value::Text(v) => Box::new(v.clone()),
        Value::Date(v) => Box::new(*v),
    }
}

fn from_row(row: &postgres::Row) -> Result<Row, postgres::Error> {
    let mut out = Vec::with_capacity(row.len());
    for (i, column) in row.columns().iter().enumerate() {
        let ty = column.type_();
        let value = if *ty == Type::BOOL {
            row.try_get::<_, Option<bool>>(i)?.map(Value::Bool)
        } else if *ty == Type::INT2 {
            row.try_get::<_, Option<i16>>(i)?.map(|v| Value::Int(i64::from(v)))
        } else if *ty == Type::INT4 {
            row.try_get::<_, Option<i32>>(i)?.map(|v| Value::Int(i64::from(v)))
        } else if *ty == Type::INT8 {
            row.try_get::<_, Option<i64>>(i)?.map(Value::Int)
        } else if *ty == Type::FLOAT4 {
            row.try_get::<_, Option<f32>>(i)?.map(|v| Value::Float(f64::from(v)))
        } else if *ty == Type::FLOAT8 {
            row.try_get::<_, Option<f64>>(i)?.map(Value::Float)
        } else if *ty == Type::DATE {
            row.try_get::<_, Option<NaiveDate>>(i)?.map(Value::Date)
        } else {
            // text, varchar, bpchar, name; anything else fails here with the
            // column type in the message
            row.try_get::<_, Option<String>>(i)?.map(Value::Text)
        };
        out.push(value.unwrap_or(Value::Null));
    }
    Ok(out)
}

impl Executor for PostgresExecutor {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn connect(&mut self) -> Result<(), EarniError> {
        if let Some(client) = self.client.as_mut() {
            if !client.is_closed() && client.is_valid(self.liveness_timeout).is_ok() {
                return Ok(());
            }
            tracing::warn!("postgres connection failed liveness probe; reconnecting");
            self.client = None;
        }

        let client = Client::connect(&self.conninfo, NoTls).map_err(|e| EarniError::Connection {
            reason: e.to_string(),
        })?;
        tracing::info!("connected to postgres");
        self.client = Some(client);
        Ok(())
    }

    fn run(&mut self, statement: &Statement) -> Result<Vec<Row>, EarniError> {
        self.connect()?;
        let client = self.client.as_mut().ok_or_else(|| EarniError::Connection {
            reason: "connection unavailable".into(),
        })?;
        let query_err = |e: postgres::Error| EarniError::QueryExecution {
            statement: statement.sql().to_string(),
            reason: e.to_string(),
        };

        let owned: Vec<Box<dyn ToSql + Sync>> = statement.params().iter().map(to_sql).collect();
        let params: Vec<&(dyn ToSql + Sync)> = owned.iter().map(|p| p.as_ref()).collect();

        let rows = client.query(statement.sql(), &params).map_err(query_err)?;
        rows.iter()
            .map(from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(query_err)
    }

    /// The client runs in autocommit mode, so closing it leaves nothing
    /// uncommitted.
    fn disconnect(&mut self) -> Result<(), EarniError> {
        let Some(client) = self.client.take() else {
            return Ok(());
        };
        client.close().map_err(|e| EarniError::Connection {
            reason: e.to_string(),
        })?;
        tracing::info!("disconnected from postgres");
        Ok(())
    }
}
