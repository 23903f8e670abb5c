//! Logical field whitelist.
//!
//! Callers only ever name logical fields. The registry maps each name to the
//! physical expression it stands for in the fixed earnings/price join, and
//! is the single gate through which identifiers reach statement text.

use crate::domain::error::EarniError;
use crate::domain::offset::OffsetDay;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// The fixed join every statement reads from.
pub const FROM_CLAUSE: &str = "earnings_reports AS er \
     JOIN price_history AS ph ON er.ticker = ph.ticker AND er.date = ph.report_date";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PriceAttribute {
    Open,
    Close,
    High,
    Low,
    Volume,
}

impl PriceAttribute {
    pub const ALL: [PriceAttribute; 5] = [
        PriceAttribute::Open,
        PriceAttribute::Close,
        PriceAttribute::High,
        PriceAttribute::Low,
        PriceAttribute::Volume,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PriceAttribute::Open => "open",
            PriceAttribute::Close => "close",
            PriceAttribute::High => "high",
            PriceAttribute::Low => "low",
            PriceAttribute::Volume => "volume",
        }
    }

    /// Price history column for this attribute at `offset`, e.g. `close_plus_1`.
    pub fn column(self, offset: OffsetDay) -> String {
        format!("{}_{}", self.as_str(), offset.suffix())
    }
}

impl fmt::Display for PriceAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PriceAttribute {
    type Err = EarniError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "open" => Ok(PriceAttribute::Open),
            "close" => Ok(PriceAttribute::Close),
            "high" => Ok(PriceAttribute::High),
            "low" => Ok(PriceAttribute::Low),
            "volume" => Ok(PriceAttribute::Volume),
            _ => Err(EarniError::InvalidPriceAttribute {
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Price {
        attribute: PriceAttribute,
        offset: OffsetDay,
    },
    Earnings,
    Computed,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Price { .. } => f.write_str("price"),
            FieldKind::Earnings => f.write_str("earnings"),
            FieldKind::Computed => f.write_str("computed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalField {
    name: String,
    expression: String,
    alias: Option<String>,
    kind: FieldKind,
}

impl LogicalField {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// WHERE-context rendering. Never aliased.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// SELECT-context rendering; computed fields carry `AS alias`.
    pub fn select_expression(&self) -> String {
        match &self.alias {
            Some(alias) => format!("{} AS {}", self.expression, alias),
            None => self.expression.clone(),
        }
    }
}

/// Outcome of resolving a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolved<'a> {
    Field(&'a LogicalField),
    /// Unknown name accepted verbatim by a non-strict lookup.
    Literal(&'a str),
}

/// Physical names of the earnings report attributes.
const EARNINGS_FIELDS: [(&str, &str); 9] = [
    ("ticker", "er.ticker"),
    ("report_date", "er.date"),
    ("period_end", "er.period_end"),
    ("eps_reported", "er.eps_reported"),
    ("eps_estimate", "er.eps_estimate"),
    ("surprise", "er.surprise"),
    ("surprise_percent", "er.surprise_percent"),
    ("time_of_report", "er.time_of_report"),
    ("is_valid", "ph.is_valid"),
];

#[derive(Debug, Clone)]
pub struct FieldRegistry {
    fields: Vec<LogicalField>,
    index: HashMap<String, usize>,
}

impl FieldRegistry {
    /// Generate the whitelist. Price fields come first (attribute-major,
    /// offsets ascending), then earnings attributes, then computed fields.
    pub fn build() -> Self {
        let mut fields = Vec::new();

        for attribute in PriceAttribute::ALL {
            for offset in OffsetDay::all() {
                let column = attribute.column(offset);
                fields.push(LogicalField {
                    name: column.clone(),
                    expression: column,
                    alias: None,
                    kind: FieldKind::Price { attribute, offset },
                });
            }
        }

        for (name, expression) in EARNINGS_FIELDS {
            fields.push(LogicalField {
                name: name.to_string(),
                expression: expression.to_string(),
                alias: None,
                kind: FieldKind::Earnings,
            });
        }

        fields.push(LogicalField {
            name: "eps_diff".to_string(),
            expression: "(er.eps_reported - er.eps_estimate)".to_string(),
            alias: Some("eps_diff".to_string()),
            kind: FieldKind::Computed,
        });

        let index = fields
            .iter()
            .enumerate()
            .map(|(i, f)| (f.name.clone(), i))
            .collect();

        Self { fields, index }
    }

    pub fn get(&self, name: &str) -> Option<&LogicalField> {
        self.index.get(name).map(|&i| &self.fields[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn fields(&self) -> &[LogicalField] {
        &self.fields
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Look up `name`. Unknown names fail when `strict`, and come back as
    /// [`Resolved::Literal`] otherwise.
    pub fn resolve<'a>(&'a self, name: &'a str, strict: bool) -> Result<Resolved<'a>, EarniError> {
        match self.get(name) {
            Some(field) => Ok(Resolved::Field(field)),
            None if strict => Err(self.unknown(name)),
            None => Ok(Resolved::Literal(name)),
        }
    }

    /// Strict WHERE-context lookup.
    pub fn resolve_field(&self, name: &str) -> Result<&LogicalField, EarniError> {
        self.get(name).ok_or_else(|| self.unknown(name))
    }

    /// Strict SELECT-context lookup.
    pub fn resolve_select(&self, name: &str) -> Result<String, EarniError> {
        self.resolve_field(name).map(LogicalField::select_expression)
    }

    fn unknown(&self, name: &str) -> EarniError {
        EarniError::InvalidField {
            name: name.to_string(),
            valid: self.names().map(str::to_string).collect(),
        }
    }
}

impl Default for FieldRegistry {
    fn default() -> Self {
        Self::build()
    }
}
