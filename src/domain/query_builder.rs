//! Chainable SELECT/WHERE builder over the earnings/price join.
//!
//! A builder moves through three states:
//!
//! - **Idle**: nothing selected or filtered.
//! - **Building**: at least one SELECT or WHERE entry recorded.
//! - **Executed**: [`QueryBuilder::execute`] takes the recorded clauses out
//!   of the builder before assembling anything, so the builder is back to
//!   Idle whether the store accepted the statement or not.
//!
//! Every identifier passes through the [`FieldRegistry`]; every
//! caller-supplied scalar is bound as a parameter.

use crate::domain::error::EarniError;
use crate::domain::field::{FieldRegistry, PriceAttribute, Resolved, FROM_CLAUSE};
use crate::domain::offset::OffsetDay;
use crate::domain::predicate::{self, ArithOp, Expr, Predicate, Relation};
use crate::domain::statement::{Dialect, Statement, StatementWriter};
use crate::domain::value::{Row, Value};
use crate::ports::executor_port::Executor;
use chrono::NaiveDate;

/// Right-hand side of a comparison or computed column.
///
/// A [`Operand::Name`] is resolved non-strictly: a known field becomes its
/// physical expression, anything else is bound as a text literal.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Name(String),
    Value(Value),
}

impl From<&str> for Operand {
    fn from(v: &str) -> Self {
        Operand::Name(v.to_string())
    }
}

impl From<String> for Operand {
    fn from(v: String) -> Self {
        Operand::Name(v)
    }
}

impl From<Value> for Operand {
    fn from(v: Value) -> Self {
        Operand::Value(v)
    }
}

impl From<i32> for Operand {
    fn from(v: i32) -> Self {
        Operand::Value(v.into())
    }
}

impl From<i64> for Operand {
    fn from(v: i64) -> Self {
        Operand::Value(v.into())
    }
}

impl From<f64> for Operand {
    fn from(v: f64) -> Self {
        Operand::Value(v.into())
    }
}

impl From<bool> for Operand {
    fn from(v: bool) -> Self {
        Operand::Value(v.into())
    }
}

impl From<NaiveDate> for Operand {
    fn from(v: NaiveDate) -> Self {
        Operand::Value(v.into())
    }
}

/// One name or an ordered list of names for [`QueryBuilder::select`].
pub trait IntoFields {
    fn into_fields(self) -> Vec<String>;
}

impl IntoFields for &str {
    fn into_fields(self) -> Vec<String> {
        vec![self.to_string()]
    }
}

impl IntoFields for String {
    fn into_fields(self) -> Vec<String> {
        vec![self]
    }
}

impl<S: AsRef<str>> IntoFields for &[S] {
    fn into_fields(self) -> Vec<String> {
        self.iter().map(|s| s.as_ref().to_string()).collect()
    }
}

impl<S: AsRef<str>, const N: usize> IntoFields for [S; N] {
    fn into_fields(self) -> Vec<String> {
        self.iter().map(|s| s.as_ref().to_string()).collect()
    }
}

impl<S: AsRef<str>> IntoFields for Vec<S> {
    fn into_fields(self) -> Vec<String> {
        self.iter().map(|s| s.as_ref().to_string()).collect()
    }
}

/// "Price at day A beats price at day B", optionally adjusted.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceDiff {
    pub day_a: i32,
    pub day_b: i32,
    /// Absolute adjustment: `a > b + amount`. Takes precedence over `percent`.
    pub amount: Option<f64>,
    /// Multiplicative adjustment: `a >= b * percent`.
    pub percent: Option<f64>,
    pub price_type_a: PriceAttribute,
    pub price_type_b: PriceAttribute,
    /// Relation used by the percent form. Defaults to `>=`.
    pub percent_relation: Relation,
}

impl PriceDiff {
    pub fn new(day_a: i32, day_b: i32) -> Self {
        Self {
            day_a,
            day_b,
            amount: None,
            percent: None,
            price_type_a: PriceAttribute::Close,
            price_type_b: PriceAttribute::Close,
            percent_relation: Relation::Ge,
        }
    }

    pub fn amount(mut self, amount: f64) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn percent(mut self, percent: f64) -> Self {
        self.percent = Some(percent);
        self
    }

    pub fn price_types(mut self, a: PriceAttribute, b: PriceAttribute) -> Self {
        self.price_type_a = a;
        self.price_type_b = b;
        self
    }

    pub fn percent_relation(mut self, relation: Relation) -> Self {
        self.percent_relation = relation;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
enum SelectItem {
    /// SELECT-context rendering from the registry.
    Field(String),
    Computed { expr: Expr, alias: String },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Clauses {
    select: Vec<SelectItem>,
    wheres: Vec<Predicate>,
}

impl Clauses {
    pub fn select_len(&self) -> usize {
        self.select.len()
    }

    pub fn where_len(&self) -> usize {
        self.wheres.len()
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.wheres
    }

    fn assemble(&self, dialect: Dialect) -> Result<Statement, EarniError> {
        if self.select.is_empty() {
            return Err(EarniError::EmptyQuery { missing: "SELECT" });
        }
        if self.wheres.is_empty() {
            return Err(EarniError::EmptyQuery { missing: "WHERE" });
        }

        let mut w = StatementWriter::new(dialect);
        w.push_sql("SELECT ");
        for (i, item) in self.select.iter().enumerate() {
            if i > 0 {
                w.push_sql(", ");
            }
            match item {
                SelectItem::Field(text) => w.push_sql(text),
                SelectItem::Computed { expr, alias } => {
                    expr.render(&mut w);
                    w.push_sql(" AS ");
                    w.push_sql(alias);
                }
            }
        }
        w.push_sql(" FROM ");
        w.push_sql(FROM_CLAUSE);
        w.push_sql(" WHERE ");
        for (i, p) in self.wheres.iter().enumerate() {
            if i > 0 {
                w.push_sql(" AND ");
            }
            p.render(&mut w);
        }
        Ok(w.finish())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum QueryState {
    #[default]
    Idle,
    Building(Clauses),
}

impl QueryState {
    pub fn is_idle(&self) -> bool {
        matches!(self, QueryState::Idle)
    }

    fn clauses_mut(&mut self) -> &mut Clauses {
        if self.is_idle() {
            *self = QueryState::Building(Clauses::default());
        }
        match self {
            QueryState::Building(clauses) => clauses,
            QueryState::Idle => unreachable!("state promoted to Building above"),
        }
    }
}

pub struct QueryBuilder<'a> {
    registry: &'a FieldRegistry,
    executor: &'a mut dyn Executor,
    state: QueryState,
}

impl std::fmt::Debug for QueryBuilder<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryBuilder")
            .field("registry", &self.registry)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<'a> QueryBuilder<'a> {
    pub fn new(registry: &'a FieldRegistry, executor: &'a mut dyn Executor) -> Self {
        Self {
            registry,
            executor,
            state: QueryState::Idle,
        }
    }

    pub fn state(&self) -> &QueryState {
        &self.state
    }

    /// Append fields to the SELECT list in order. Nothing is appended
    /// unless every name resolves.
    pub fn select(&mut self, fields: impl IntoFields) -> Result<&mut Self, EarniError> {
        let resolved = fields
            .into_fields()
            .iter()
            .map(|name| self.registry.resolve_select(name).map(SelectItem::Field))
            .collect::<Result<Vec<_>, _>>()?;
        if resolved.is_empty() {
            return Ok(self);
        }
        self.state.clauses_mut().select.extend(resolved);
        Ok(self)
    }

    /// Append `left <op> right AS alias` to the SELECT list.
    pub fn custom_select(
        &mut self,
        left: &str,
        op: ArithOp,
        right: impl Into<Operand>,
        alias: &str,
    ) -> Result<&mut Self, EarniError> {
        let left = Expr::Column(self.registry.resolve_field(left)?.expression().to_string());
        let right = self.operand(right.into())?;
        if matches!(right, Expr::Param(Value::Null)) {
            return Err(EarniError::NullComparison {
                operator: op.to_string(),
            });
        }
        if !is_identifier(alias) {
            return Err(EarniError::InvalidAlias {
                alias: alias.to_string(),
            });
        }
        self.state.clauses_mut().select.push(SelectItem::Computed {
            expr: Expr::binary(left, op, right),
            alias: alias.to_string(),
        });
        Ok(self)
    }

    /// Filter on `field <relation> value [+ offset]`.
    pub fn where_value_is(
        &mut self,
        field: &str,
        relation: Relation,
        value: impl Into<Operand>,
        offset: Option<f64>,
    ) -> Result<&mut Self, EarniError> {
        let left = Expr::Column(self.registry.resolve_field(field)?.expression().to_string());
        let right = self.operand(value.into())?;
        let is_null = matches!(right, Expr::Param(Value::Null));
        let p = match offset {
            None if is_null => predicate::null_check(left, relation)?,
            Some(_) if is_null => {
                return Err(EarniError::NullComparison {
                    operator: ArithOp::Add.to_string(),
                });
            }
            Some(offset) => predicate::amount_offset(left, relation, right, offset)
                .map_err(|_| EarniError::InvalidNumber {
                    argument: "offset".to_string(),
                    value: offset,
                })?,
            None => predicate::plain(left, relation, right),
        };
        self.state.clauses_mut().wheres.push(p);
        Ok(self)
    }

    /// Filter on one relative-day price beating another.
    pub fn where_price_diff(&mut self, diff: PriceDiff) -> Result<&mut Self, EarniError> {
        let day_a = OffsetDay::parse_arg("day_a", diff.day_a)?;
        let day_b = OffsetDay::parse_arg("day_b", diff.day_b)?;
        let a = self.price_column(diff.price_type_a, day_a)?;
        let b = self.price_column(diff.price_type_b, day_b)?;
        let p = predicate::relative_day_diff(
            a,
            b,
            diff.amount,
            diff.percent,
            diff.percent_relation,
        )?;
        self.state.clauses_mut().wheres.push(p);
        Ok(self)
    }

    /// Assemble the pending statement without running it or resetting.
    pub fn statement(&self) -> Result<Statement, EarniError> {
        match &self.state {
            QueryState::Idle => Err(EarniError::EmptyQuery { missing: "SELECT" }),
            QueryState::Building(clauses) => clauses.assemble(self.executor.dialect()),
        }
    }

    /// Run the pending statement. The builder is Idle afterwards on every
    /// path, including assembly and store errors.
    pub fn execute(&mut self) -> Result<Vec<Row>, EarniError> {
        let clauses = match std::mem::take(&mut self.state) {
            QueryState::Idle => return Err(EarniError::EmptyQuery { missing: "SELECT" }),
            QueryState::Building(clauses) => clauses,
        };
        let statement = clauses.assemble(self.executor.dialect())?;
        tracing::debug!(
            sql = statement.sql(),
            params = statement.params().len(),
            "executing statement"
        );
        let rows = self.executor.run(&statement)?;
        tracing::debug!(rows = rows.len(), "statement returned");
        Ok(rows)
    }

    fn operand(&self, operand: Operand) -> Result<Expr, EarniError> {
        match operand {
            Operand::Value(Value::Float(v)) => {
                Ok(Expr::Param(Value::Float(predicate::finite("value", v)?)))
            }
            Operand::Value(v) => Ok(Expr::Param(v)),
            Operand::Name(name) => Ok(match self.registry.resolve(&name, false)? {
                Resolved::Field(field) => Expr::Column(field.expression().to_string()),
                Resolved::Literal(text) => Expr::Param(Value::Text(text.to_string())),
            }),
        }
    }

    fn price_column(&self, attribute: PriceAttribute, day: OffsetDay) -> Result<Expr, EarniError> {
        let name = attribute.column(day);
        Ok(Expr::Column(
            self.registry.resolve_field(&name)?.expression().to_string(),
        ))
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
