use std::fmt;

#[derive(Debug)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (negative tolerance, pct out of range, etc.).
    ConfigValidation(String),
    /// Missing required column in input data.
    MissingColumn { file: String, column: String },
    /// Date parse error.
    DateParse { file: String, record_id: String, value: String },
    /// Amount parse error.
    AmountParse { file: String, record_id: String, value: String },
    /// Enum-valued column holds an unknown value (kind, direction, status).
    FieldParse { file: String, record_id: String, column: String, value: String },
    /// IO error (CSV read/write, etc.).
    Io(String),
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::MissingColumn { file, column } => {
                write!(f, "{file}: missing column '{column}'")
            }
            Self::DateParse { file, record_id, value } => {
                write!(f, "{file}, record '{record_id}': cannot parse date '{value}'")
            }
            Self::AmountParse { file, record_id, value } => {
                write!(f, "{file}, record '{record_id}': cannot parse amount '{value}'")
            }
            Self::FieldParse { file, record_id, column, value } => {
                write!(
                    f,
                    "{file}, record '{record_id}': invalid {column} value '{value}'"
                )
            }
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for ReconError {}
