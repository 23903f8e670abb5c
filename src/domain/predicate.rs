//! WHERE-clause predicates over resolved operands.
//!
//! The constructors here are pure: they take operands that have already
//! been through the field registry and produce a [`Predicate`]. Numeric
//! adjustments are kept as bound parameters; [`Predicate`]'s `Display`
//! inlines them only for diagnostics.

use crate::domain::error::EarniError;
use crate::domain::statement::StatementWriter;
use crate::domain::value::Value;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Lt,
    Gt,
    Eq,
    Le,
    Ge,
    Ne,
}

impl Relation {
    pub fn as_str(self) -> &'static str {
        match self {
            Relation::Lt => "<",
            Relation::Gt => ">",
            Relation::Eq => "=",
            Relation::Le => "<=",
            Relation::Ge => ">=",
            Relation::Ne => "!=",
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Relation {
    type Err = EarniError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "<" => Ok(Relation::Lt),
            ">" => Ok(Relation::Gt),
            "=" => Ok(Relation::Eq),
            "<=" => Ok(Relation::Le),
            ">=" => Ok(Relation::Ge),
            "!=" => Ok(Relation::Ne),
            _ => Err(EarniError::InvalidRelation {
                relation: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl ArithOp {
    pub fn as_str(self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
        }
    }
}

impl fmt::Display for ArithOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArithOp {
    type Err = EarniError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "+" => Ok(ArithOp::Add),
            "-" => Ok(ArithOp::Sub),
            "*" => Ok(ArithOp::Mul),
            "/" => Ok(ArithOp::Div),
            _ => Err(EarniError::InvalidOperator {
                operator: s.to_string(),
            }),
        }
    }
}

/// A resolved operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Whitelisted physical expression from the field registry.
    Column(String),
    Param(Value),
    Binary {
        left: Box<Expr>,
        op: ArithOp,
        right: Box<Expr>,
    },
}

impl Expr {
    pub fn binary(left: Expr, op: ArithOp, right: Expr) -> Self {
        Expr::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    pub fn render(&self, w: &mut StatementWriter) {
        match self {
            Expr::Column(text) => w.push_sql(text),
            Expr::Param(value) => w.push_param(value.clone()),
            Expr::Binary { left, op, right } => {
                left.render_nested(w);
                w.push_sql(&format!(" {op} "));
                right.render_nested(w);
            }
        }
    }

    fn render_nested(&self, w: &mut StatementWriter) {
        if matches!(self, Expr::Binary { .. }) {
            w.push_sql("(");
            self.render(w);
            w.push_sql(")");
        } else {
            self.render(w);
        }
    }

    fn fmt_nested(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if matches!(self, Expr::Binary { .. }) {
            write!(f, "({self})")
        } else {
            write!(f, "{self}")
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Column(text) => f.write_str(text),
            Expr::Param(value) => write!(f, "{value}"),
            Expr::Binary { left, op, right } => {
                left.fmt_nested(f)?;
                write!(f, " {op} ")?;
                right.fmt_nested(f)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub left: Expr,
    pub relation: Relation,
    pub right: Expr,
}

impl Predicate {
    pub fn render(&self, w: &mut StatementWriter) {
        self.left.render(w);
        match self.null_test() {
            Some(test) => w.push_sql(test),
            None => {
                w.push_sql(&format!(" {} ", self.relation));
                self.right.render(w);
            }
        }
    }

    /// `= NULL` and `!= NULL` compare as `IS [NOT] NULL`.
    fn null_test(&self) -> Option<&'static str> {
        match (&self.right, self.relation) {
            (Expr::Param(Value::Null), Relation::Eq) => Some(" IS NULL"),
            (Expr::Param(Value::Null), Relation::Ne) => Some(" IS NOT NULL"),
            _ => None,
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.null_test() {
            Some(test) => write!(f, "{}{}", self.left, test),
            None => write!(f, "{} {} {}", self.left, self.relation, self.right),
        }
    }
}

/// Reject NaN and infinities before they become parameters.
pub fn finite(argument: &str, value: f64) -> Result<f64, EarniError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(EarniError::InvalidNumber {
            argument: argument.to_string(),
            value,
        })
    }
}

/// `left rel right`
pub fn plain(left: Expr, relation: Relation, right: Expr) -> Predicate {
    Predicate {
        left,
        relation,
        right,
    }
}

/// `left IS NULL` for `=`, `left IS NOT NULL` for `!=`. Any other relation
/// against NULL is never true and is rejected.
pub fn null_check(left: Expr, relation: Relation) -> Result<Predicate, EarniError> {
    match relation {
        Relation::Eq | Relation::Ne => Ok(plain(left, relation, Expr::Param(Value::Null))),
        other => Err(EarniError::NullComparison {
            operator: other.to_string(),
        }),
    }
}

/// `left rel right + amount`
pub fn amount_offset(
    left: Expr,
    relation: Relation,
    right: Expr,
    amount: f64,
) -> Result<Predicate, EarniError> {
    let amount = finite("amount", amount)?;
    Ok(plain(
        left,
        relation,
        Expr::binary(right, ArithOp::Add, Expr::Param(Value::Float(amount))),
    ))
}

/// `left rel right * percent`
pub fn percent_offset(
    left: Expr,
    relation: Relation,
    right: Expr,
    percent: f64,
) -> Result<Predicate, EarniError> {
    let percent = finite("percent", percent)?;
    Ok(plain(
        left,
        relation,
        Expr::binary(right, ArithOp::Mul, Expr::Param(Value::Float(percent))),
    ))
}

/// Price at day A against price at day B.
///
/// `amount` wins over `percent` when both are present:
/// - amount: `a > b + amount`
/// - percent: `a <percent_relation> b * percent`
/// - neither: `a > b`
///
/// `percent_relation` is `>=` in existing queries; the other two forms
/// always use `>`.
pub fn relative_day_diff(
    a: Expr,
    b: Expr,
    amount: Option<f64>,
    percent: Option<f64>,
    percent_relation: Relation,
) -> Result<Predicate, EarniError> {
    match (amount, percent) {
        (Some(amount), _) => amount_offset(a, Relation::Gt, b, amount),
        (None, Some(percent)) => percent_offset(a, percent_relation, b, percent),
        (None, None) => Ok(plain(a, Relation::Gt, b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::statement::Dialect;

    fn col(name: &str) -> Expr {
        Expr::Column(name.to_string())
    }

    fn render(p: &Predicate, dialect: Dialect) -> (String, Vec<Value>) {
        let mut w = StatementWriter::new(dialect);
        p.render(&mut w);
        let stmt = w.finish();
        (stmt.sql().to_string(), stmt.params().to_vec())
    }

    #[test]
    fn relation_round_trip() {
        for s in ["<", ">", "=", "<=", ">=", "!="] {
            assert_eq!(s.parse::<Relation>().unwrap().as_str(), s);
        }
        assert!(matches!(
            "<>".parse::<Relation>(),
            Err(EarniError::InvalidRelation { .. })
        ));
        assert!(matches!(
            "; DROP".parse::<Relation>(),
            Err(EarniError::InvalidRelation { .. })
        ));
    }

    #[test]
    fn operator_set_is_closed() {
        for s in ["+", "-", "*", "/"] {
            assert_eq!(s.parse::<ArithOp>().unwrap().as_str(), s);
        }
        for s in ["%", "||", "+ 1; --", ""] {
            assert!(matches!(
                s.parse::<ArithOp>(),
                Err(EarniError::InvalidOperator { .. })
            ));
        }
    }

    #[test]
    fn plain_diff() {
        let p = relative_day_diff(col("close_plus_1"), col("close_minus_1"), None, None, Relation::Ge)
            .unwrap();
        assert_eq!(p.to_string(), "close_plus_1 > close_minus_1");
        let (sql, params) = render(&p, Dialect::Sqlite);
        assert_eq!(sql, "close_plus_1 > close_minus_1");
        assert!(params.is_empty());
    }

    #[test]
    fn percent_diff_uses_ge() {
        let p = relative_day_diff(
            col("close_plus_1"),
            col("close_minus_1"),
            None,
            Some(0.9),
            Relation::Ge,
        )
        .unwrap();
        assert_eq!(p.to_string(), "close_plus_1 >= close_minus_1 * 0.9");
        let (sql, params) = render(&p, Dialect::Sqlite);
        assert_eq!(sql, "close_plus_1 >= close_minus_1 * ?1");
        assert_eq!(params, vec![Value::Float(0.9)]);
    }

    #[test]
    fn amount_diff_binds_value() {
        let p = relative_day_diff(
            col("close_plus_1"),
            col("close_minus_1"),
            Some(50.0),
            None,
            Relation::Ge,
        )
        .unwrap();
        assert_eq!(p.to_string(), "close_plus_1 > close_minus_1 + 50");
        let (sql, params) = render(&p, Dialect::Postgres);
        assert_eq!(sql, "close_plus_1 > close_minus_1 + $1::double precision");
        assert_eq!(params, vec![Value::Float(50.0)]);
        assert!(!sql.contains("amount"));
    }

    #[test]
    fn amount_wins_over_percent() {
        let p = relative_day_diff(
            col("close_plus_1"),
            col("close_minus_1"),
            Some(10.0),
            Some(0.5),
            Relation::Ge,
        )
        .unwrap();
        assert_eq!(p.relation, Relation::Gt);
        assert_eq!(p.to_string(), "close_plus_1 > close_minus_1 + 10");
    }

    #[test]
    fn percent_relation_is_configurable() {
        let p = relative_day_diff(
            col("open_plus_2"),
            col("open_minus_2"),
            None,
            Some(1.1),
            Relation::Gt,
        )
        .unwrap();
        assert_eq!(p.to_string(), "open_plus_2 > open_minus_2 * 1.1");
    }

    #[test]
    fn non_finite_adjustments_rejected() {
        let err = amount_offset(col("a"), Relation::Gt, col("b"), f64::NAN).unwrap_err();
        assert!(matches!(err, EarniError::InvalidNumber { ref argument, .. } if argument == "amount"));
        let err = percent_offset(col("a"), Relation::Gt, col("b"), f64::INFINITY).unwrap_err();
        assert!(matches!(err, EarniError::InvalidNumber { ref argument, .. } if argument == "percent"));
    }

    #[test]
    fn null_checks() {
        let p = null_check(col("er.period_end"), Relation::Eq).unwrap();
        assert_eq!(render(&p, Dialect::Postgres), ("er.period_end IS NULL".to_string(), vec![]));
        assert_eq!(p.to_string(), "er.period_end IS NULL");

        let p = null_check(col("close_plus_1"), Relation::Ne).unwrap();
        assert_eq!(render(&p, Dialect::Sqlite).0, "close_plus_1 IS NOT NULL");

        match null_check(col("close_plus_1"), Relation::Le) {
            Err(EarniError::NullComparison { operator }) => assert_eq!(operator, "<="),
            other => panic!("expected NullComparison, got {other:?}"),
        }
    }

    #[test]
    fn nested_binary_is_parenthesized() {
        let inner = Expr::binary(col("a"), ArithOp::Sub, col("b"));
        let outer = Expr::binary(inner, ArithOp::Mul, Expr::Param(Value::Int(2)));
        assert_eq!(outer.to_string(), "(a - b) * 2");
        let mut w = StatementWriter::new(Dialect::Sqlite);
        outer.render(&mut w);
        assert_eq!(w.finish().sql(), "(a - b) * ?1");
    }
}
