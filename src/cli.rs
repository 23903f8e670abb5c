//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_writer::write_rows;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::config_validation::{validate_store_config, Backend};
use crate::domain::error::EarniError;
use crate::domain::field::FieldRegistry;
use crate::domain::predicate::{ArithOp, Relation};
use crate::domain::query_builder::{Operand, PriceDiff, QueryBuilder};
use crate::domain::statement::Statement;
use crate::domain::value::{Row, Value};
use crate::ports::config_port::ConfigPort;
use crate::ports::executor_port::Executor;

#[derive(Parser, Debug)]
#[command(
    name = "earni",
    about = "Query earnings reports by relative trading-day prices"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List every logical field, its kind and the expression it maps to
    Fields,
    /// Build and run a query, writing CSV
    Query {
        #[arg(short, long)]
        config: PathBuf,
        /// Comma-separated logical fields, in output order
        #[arg(short, long, value_delimiter = ',')]
        select: Vec<String>,
        /// Computed column: "LEFT OP RIGHT AS alias"
        #[arg(long)]
        custom: Vec<String>,
        /// Filter: "FIELD REL VALUE [+|- OFFSET]"
        #[arg(short = 'w', long = "where")]
        wheres: Vec<String>,
        /// Price comparison: "A,B[,amount=X][,percent=Y][,a=ATTR][,b=ATTR][,percent_relation=REL]"
        #[arg(long = "price-diff", allow_hyphen_values = true)]
        price_diffs: Vec<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Print the statement and its parameters without connecting
        #[arg(long)]
        dry_run: bool,
    },
}

/// One parsed `--where` filter.
#[derive(Debug, Clone, PartialEq)]
pub struct WhereClause {
    pub field: String,
    pub relation: Relation,
    pub value: Operand,
    pub offset: Option<f64>,
}

/// One parsed `--custom` column.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomSelect {
    pub left: String,
    pub op: ArithOp,
    pub right: Operand,
    pub alias: String,
}

/// Everything a `query` invocation asks for.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryRequest {
    pub select: Vec<String>,
    pub custom: Vec<CustomSelect>,
    pub wheres: Vec<WhereClause>,
    pub price_diffs: Vec<PriceDiff>,
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Fields => run_fields(),
        Command::Query {
            config,
            select,
            custom,
            wheres,
            price_diffs,
            output,
            dry_run,
        } => {
            let request = match parse_request(select, &custom, &wheres, &price_diffs) {
                Ok(r) => r,
                Err(e) => {
                    eprintln!("error: {e}");
                    return (&e).into();
                }
            };
            match run_query(&config, &request, output.as_deref(), dry_run) {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    eprintln!("error: {e}");
                    (&e).into()
                }
            }
        }
    }
}

fn run_fields() -> ExitCode {
    let registry = FieldRegistry::build();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for field in registry.fields() {
        if writeln!(
            out,
            "{}\t{}\t{}",
            field.name(),
            field.kind(),
            field.expression()
        )
        .is_err()
        {
            return ExitCode::from(1);
        }
    }
    ExitCode::SUCCESS
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, EarniError> {
    tracing::info!(path = %path.display(), "loading config");
    FileConfigAdapter::from_file(path)
}

/// Build the executor named by `[store] backend`. Nothing connects yet.
pub fn open_executor(config: &dyn ConfigPort) -> Result<Box<dyn Executor>, EarniError> {
    let backend = validate_store_config(config)?;
    match backend {
        #[cfg(feature = "sqlite")]
        Backend::Sqlite => Ok(Box::new(
            crate::adapters::sqlite_executor::SqliteExecutor::from_config(config)?,
        )),
        #[cfg(feature = "postgres")]
        Backend::Postgres => Ok(Box::new(
            crate::adapters::postgres_executor::PostgresExecutor::from_config(config)?,
        )),
        #[allow(unreachable_patterns)]
        other => Err(EarniError::ConfigInvalid {
            section: "store".into(),
            key: "backend".into(),
            reason: format!("{other:?} support is not compiled in"),
        }),
    }
}

/// Load config, build the statement and either print it (`dry_run`) or run
/// it and write CSV to `output_path` or stdout.
pub fn run_query(
    config_path: &Path,
    request: &QueryRequest,
    output_path: Option<&Path>,
    dry_run: bool,
) -> Result<(), EarniError> {
    let config = load_config(config_path)?;
    let mut executor = open_executor(&config)?;
    let registry = FieldRegistry::build();
    let with_header = config.get_bool("output", "header", true);

    let mut qb = QueryBuilder::new(&registry, executor.as_mut());
    let headers = apply_request(&mut qb, request)?;

    if dry_run {
        let statement = qb.statement()?;
        let stdout = io::stdout();
        return write_statement(stdout.lock(), &statement);
    }

    let rows = qb.execute();
    drop(qb);
    let disconnected = executor.disconnect();
    let rows = rows?;
    disconnected?;
    tracing::info!(rows = rows.len(), "query complete");

    write_output(output_path, with_header.then_some(headers.as_slice()), &rows)
}

fn write_output(
    output_path: Option<&Path>,
    headers: Option<&[String]>,
    rows: &[Row],
) -> Result<(), EarniError> {
    match output_path {
        Some(path) => write_rows(File::create(path)?, headers, rows),
        None => write_rows(io::stdout().lock(), headers, rows),
    }
}

/// Statement text followed by one `N = value` line per parameter.
pub fn write_statement<W: Write>(mut out: W, statement: &Statement) -> Result<(), EarniError> {
    writeln!(out, "{}", statement.sql())?;
    for (i, value) in statement.params().iter().enumerate() {
        writeln!(out, "{} = {}", i + 1, value)?;
    }
    Ok(())
}

/// Feed `request` into the builder and return the output column labels.
pub fn apply_request(
    qb: &mut QueryBuilder<'_>,
    request: &QueryRequest,
) -> Result<Vec<String>, EarniError> {
    let mut headers = Vec::new();

    if !request.select.is_empty() {
        qb.select(request.select.as_slice())?;
        headers.extend(request.select.iter().cloned());
    }
    for c in &request.custom {
        qb.custom_select(&c.left, c.op, c.right.clone(), &c.alias)?;
        headers.push(c.alias.clone());
    }
    for w in &request.wheres {
        qb.where_value_is(&w.field, w.relation, w.value.clone(), w.offset)?;
    }
    for d in &request.price_diffs {
        qb.where_price_diff(d.clone())?;
    }
    Ok(headers)
}

pub fn parse_request(
    select: Vec<String>,
    custom: &[String],
    wheres: &[String],
    price_diffs: &[String],
) -> Result<QueryRequest, EarniError> {
    Ok(QueryRequest {
        select: select
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        custom: custom
            .iter()
            .map(|s| parse_custom(s))
            .collect::<Result<_, _>>()?,
        wheres: wheres
            .iter()
            .map(|s| parse_where(s))
            .collect::<Result<_, _>>()?,
        price_diffs: price_diffs
            .iter()
            .map(|s| parse_price_diff(s))
            .collect::<Result<_, _>>()?,
    })
}

fn invalid(flag: &str, value: &str, reason: impl Into<String>) -> EarniError {
    EarniError::InvalidArgument {
        flag: flag.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

/// Integers and decimals become bound numbers, `YYYY-MM-DD` (bare or quoted)
/// a date and `NULL` the null value; `'quoted'` text is always a literal;
/// anything else is a name resolved non-strictly.
pub fn parse_operand(token: &str) -> Operand {
    if let Ok(v) = token.parse::<i64>() {
        return Operand::Value(Value::Int(v));
    }
    if let Ok(v) = token.parse::<f64>() {
        if v.is_finite() {
            return Operand::Value(Value::Float(v));
        }
    }
    if token.eq_ignore_ascii_case("null") {
        return Operand::Value(Value::Null);
    }
    let quoted = token
        .strip_prefix('\'')
        .and_then(|t| t.strip_suffix('\''));
    if let Ok(d) = NaiveDate::parse_from_str(quoted.unwrap_or(token), "%Y-%m-%d") {
        return Operand::Value(Value::Date(d));
    }
    match quoted {
        Some(text) => Operand::Value(Value::Text(text.to_string())),
        None => Operand::Name(token.to_string()),
    }
}

fn parse_number(flag: &str, clause: &str, token: &str) -> Result<f64, EarniError> {
    token
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| invalid(flag, clause, format!("'{token}' is not a number")))
}

/// Leading whitespace-delimited token and the remainder.
fn next_token(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    if s.is_empty() {
        return None;
    }
    let end = s.find(char::is_whitespace).unwrap_or(s.len());
    Some((&s[..end], &s[end..]))
}

/// Like `next_token`, but a `'...'` literal is one token even when it
/// contains spaces.
fn operand_token(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    match s.strip_prefix('\'') {
        Some(body) => {
            let end = body.find('\'')? + 2;
            Some((&s[..end], &s[end..]))
        }
        None => next_token(s),
    }
}

/// `FIELD REL VALUE`, optionally followed by `+ OFFSET` or `- OFFSET`.
pub fn parse_where(clause: &str) -> Result<WhereClause, EarniError> {
    let malformed = || invalid("where", clause, "expected FIELD REL VALUE [+|- OFFSET]");
    let (field, rest) = next_token(clause).ok_or_else(malformed)?;
    let (relation, rest) = next_token(rest).ok_or_else(malformed)?;
    let (value, rest) = operand_token(rest).ok_or_else(malformed)?;

    let offset = match next_token(rest) {
        None => None,
        Some((sign, rest)) => {
            let (amount, rest) = next_token(rest).ok_or_else(malformed)?;
            if !rest.trim().is_empty() {
                return Err(malformed());
            }
            let amount = parse_number("where", clause, amount)?;
            match sign {
                "+" => Some(amount),
                "-" => Some(-amount),
                other => {
                    return Err(invalid(
                        "where",
                        clause,
                        format!("expected + or - before the offset, got '{other}'"),
                    ))
                }
            }
        }
    };

    Ok(WhereClause {
        field: field.to_string(),
        relation: relation.parse()?,
        value: parse_operand(value),
        offset,
    })
}

/// `LEFT OP RIGHT AS alias`
pub fn parse_custom(clause: &str) -> Result<CustomSelect, EarniError> {
    let malformed = || invalid("custom", clause, "expected LEFT OP RIGHT AS alias");
    let (left, rest) = next_token(clause).ok_or_else(malformed)?;
    let (op, rest) = next_token(rest).ok_or_else(malformed)?;
    let (right, rest) = operand_token(rest).ok_or_else(malformed)?;
    let (kw, rest) = next_token(rest).ok_or_else(malformed)?;
    let (alias, rest) = next_token(rest).ok_or_else(malformed)?;
    if !kw.eq_ignore_ascii_case("as") || !rest.trim().is_empty() {
        return Err(malformed());
    }

    Ok(CustomSelect {
        left: left.to_string(),
        op: op.parse()?,
        right: parse_operand(right),
        alias: alias.to_string(),
    })
}

/// `A,B` followed by optional `key=value` adjustments.
pub fn parse_price_diff(clause: &str) -> Result<PriceDiff, EarniError> {
    let mut parts = clause.split(',').map(str::trim);
    let mut day = |name: &str| -> Result<i32, EarniError> {
        let token = parts
            .next()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| invalid("price-diff", clause, format!("missing {name}")))?;
        token
            .parse::<i32>()
            .map_err(|_| invalid("price-diff", clause, format!("{name} '{token}' is not an integer")))
    };
    let day_a = day("day_a")?;
    let day_b = day("day_b")?;

    let mut diff = PriceDiff::new(day_a, day_b);
    for part in parts {
        let (key, value) = part
            .split_once('=')
            .ok_or_else(|| invalid("price-diff", clause, format!("expected key=value, got '{part}'")))?;
        match key.trim() {
            "amount" => diff.amount = Some(parse_number("price-diff", clause, value.trim())?),
            "percent" => diff.percent = Some(parse_number("price-diff", clause, value.trim())?),
            "a" => diff.price_type_a = value.trim().parse()?,
            "b" => diff.price_type_b = value.trim().parse()?,
            "percent_relation" => diff.percent_relation = value.trim().parse()?,
            other => {
                return Err(invalid(
                    "price-diff",
                    clause,
                    format!("unknown key '{other}'"),
                ))
            }
        }
    }
    Ok(diff)
}
