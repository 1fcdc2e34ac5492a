use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("parameter value in bad format: {0} (expected <value>:<weight>:<max_threshold>)")]
    MalformedParam(String),

    #[error("unknown metric: {0}")]
    UnknownMetric(String),

    #[error("invalid weight config for {metric}: {reason}")]
    InvalidWeight { metric: String, reason: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("csv header does not match the canonical field order")]
    Header,

    #[error("csv record has {found} fields, expected {expected}")]
    FieldCount { expected: usize, found: usize },

    #[error("invalid value for {field}: {value:?}")]
    Value { field: String, value: String },

    #[error("unterminated quoted field")]
    Unterminated,
}
