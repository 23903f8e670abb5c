//! Domain error types.

/// Top-level error type for earni.
#[derive(Debug, thiserror::Error)]
pub enum EarniError {
    #[error("unknown field '{name}' (valid fields: {})", .valid.join(", "))]
    InvalidField { name: String, valid: Vec<String> },

    #[error("invalid {argument} offset {value} (valid offsets: {})", join_offsets(.valid))]
    InvalidOffset {
        argument: String,
        value: i32,
        valid: Vec<i32>,
    },

    #[error("{argument} must be a finite number, got {value}")]
    InvalidNumber { argument: String, value: f64 },

    #[error("invalid relation '{relation}' (expected one of <, >, =, <=, >=, !=)")]
    InvalidRelation { relation: String },

    #[error("invalid operator '{operator}' (expected one of +, -, *, /)")]
    InvalidOperator { operator: String },

    #[error("invalid price attribute '{value}' (expected one of open, close, high, low, volume)")]
    InvalidPriceAttribute { value: String },

    #[error("NULL cannot be used with '{operator}'; only = NULL and != NULL filters are supported")]
    NullComparison { operator: String },

    #[error("invalid alias '{alias}': aliases must match [A-Za-z_][A-Za-z0-9_]*")]
    InvalidAlias { alias: String },

    #[error("invalid --{flag} '{value}': {reason}")]
    InvalidArgument {
        flag: String,
        value: String,
        reason: String,
    },

    #[error("query has no {missing} clause")]
    EmptyQuery { missing: &'static str },

    #[error("connection error: {reason}")]
    Connection { reason: String },

    #[error("query execution error: {reason} (statement: {statement})")]
    QueryExecution { statement: String, reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn join_offsets(valid: &[i32]) -> String {
    valid
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<&EarniError> for std::process::ExitCode {
    fn from(err: &EarniError) -> Self {
        let code: u8 = match err {
            EarniError::Io(_) => 1,
            EarniError::ConfigParse { .. }
            | EarniError::ConfigMissing { .. }
            | EarniError::ConfigInvalid { .. } => 2,
            EarniError::Connection { .. } => 3,
            EarniError::QueryExecution { .. } => 4,
            EarniError::InvalidField { .. }
            | EarniError::InvalidOffset { .. }
            | EarniError::InvalidNumber { .. }
            | EarniError::InvalidRelation { .. }
            | EarniError::InvalidOperator { .. }
            | EarniError::InvalidPriceAttribute { .. }
            | EarniError::InvalidAlias { .. }
            | EarniError::NullComparison { .. }
            | EarniError::InvalidArgument { .. }
            | EarniError::EmptyQuery { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
