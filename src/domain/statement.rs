//! Assembled statements and placeholder numbering.

use crate::domain::value::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// `$n` placeholders, each cast to the bound value's type so the server
    /// never has to infer a parameter type from the column it meets.
    Postgres,
    /// `?n` placeholders.
    Sqlite,
}

/// Statement text plus the values bound to its placeholders, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    sql: String,
    params: Vec<Value>,
}

impl Statement {
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

/// Accumulates statement text, numbering placeholders as values are pushed.
#[derive(Debug)]
pub struct StatementWriter {
    dialect: Dialect,
    sql: String,
    params: Vec<Value>,
}

impl StatementWriter {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            sql: String::new(),
            params: Vec::new(),
        }
    }

    /// Append trusted text: keywords, whitelisted expressions, operators.
    pub fn push_sql(&mut self, text: &str) {
        self.sql.push_str(text);
    }

    /// Bind `value` and append its placeholder. NULL is written as the
    /// keyword since it carries no type to bind with.
    pub fn push_param(&mut self, value: Value) {
        if value.is_null() {
            self.sql.push_str("NULL");
            return;
        }
        self.params.push(value);
        let n = self.params.len();
        match self.dialect {
            Dialect::Sqlite => self.sql.push_str(&format!("?{n}")),
            Dialect::Postgres => {
                let cast = match &self.params[n - 1] {
                    Value::Bool(_) => "boolean",
                    Value::Int(_) => "bigint",
                    Value::Float(_) => "double precision",
                    Value::Date(_) => "date",
                    Value::Text(_) | Value::Null => "text",
                };
                self.sql.push_str(&format!("${n}::{cast}"));
            }
        }
    }

    pub fn finish(self) -> Statement {
        Statement {
            sql: self.sql,
            params: self.params,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_placeholders_are_numbered() {
        let mut w = StatementWriter::new(Dialect::Sqlite);
        w.push_sql("a > ");
        w.push_param(Value::Int(1));
        w.push_sql(" AND b = ");
        w.push_param(Value::from("x"));
        let stmt = w.finish();
        assert_eq!(stmt.sql(), "a > ?1 AND b = ?2");
        assert_eq!(stmt.params(), &[Value::Int(1), Value::from("x")]);
    }

    #[test]
    fn postgres_placeholders_are_cast() {
        let mut w = StatementWriter::new(Dialect::Postgres);
        w.push_param(Value::Int(1));
        w.push_sql(" ");
        w.push_param(Value::Float(0.5));
        w.push_sql(" ");
        w.push_param(Value::from("AAPL"));
        assert_eq!(
            w.finish().sql(),
            "$1::bigint $2::double precision $3::text"
        );
    }

    #[test]
    fn null_is_not_bound() {
        let mut w = StatementWriter::new(Dialect::Sqlite);
        w.push_sql("a = ");
        w.push_param(Value::Null);
        w.push_sql(" AND b = ");
        w.push_param(Value::Int(2));
        let stmt = w.finish();
        assert_eq!(stmt.sql(), "a = NULL AND b = ?1");
        assert_eq!(stmt.params().len(), 1);
    }
}
