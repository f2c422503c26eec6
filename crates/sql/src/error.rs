#![forbid(unsafe_code)]

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PreprocessError {
    Lex(String),
    Parse(String),
    UnknownView(String),
    UnknownColumn { view: String, column: String },
    ReadOnlyColumn { view: String, column: String },
    MissingColumn { view: String, column: String },
    DuplicateColumn { view: String, column: String },
    Unsupported(&'static str),
}

impl PreprocessError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Lex(_) | Self::Parse(_) => "PARSE_ERROR",
            Self::UnknownView(_) => "UNKNOWN_VIEW",
            Self::UnknownColumn { .. } => "UNKNOWN_COLUMN",
            Self::ReadOnlyColumn { .. } => "READ_ONLY_COLUMN",
            Self::MissingColumn { .. } => "MISSING_COLUMN",
            Self::DuplicateColumn { .. } => "DUPLICATE_COLUMN",
            Self::Unsupported(_) => "UNSUPPORTED",
        }
    }
}

impl std::fmt::Display for PreprocessError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lex(message) => write!(f, "lex error: {message}"),
            Self::Parse(message) => write!(f, "parse error: {message}"),
            Self::UnknownView(name) => write!(f, "unknown view '{name}'"),
            Self::UnknownColumn { view, column } => {
                write!(f, "column '{column}' does not exist on view '{view}'")
            }
            Self::ReadOnlyColumn { view, column } => {
                write!(f, "column '{column}' of view '{view}' cannot be written")
            }
            Self::MissingColumn { view, column } => {
                write!(f, "column '{column}' is required when writing to view '{view}'")
            }
            Self::DuplicateColumn { view, column } => {
                write!(f, "column '{column}' is assigned twice on view '{view}'")
            }
            Self::Unsupported(message) => write!(f, "unsupported statement: {message}"),
        }
    }
}

impl std::error::Error for PreprocessError {}

pub type Result<T> = std::result::Result<T, PreprocessError>;
