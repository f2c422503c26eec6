#![forbid(unsafe_code)]

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IdentifierError {
    Empty,
    TooLong,
    InvalidFirstChar,
    InvalidChar { ch: char, index: usize },
}

impl IdentifierError {
    pub fn message(&self) -> &'static str {
        match self {
            Self::Empty => "identifier must not be empty",
            Self::TooLong => "identifier is too long",
            Self::InvalidFirstChar => "identifier must start with an ascii letter or digit",
            Self::InvalidChar { .. } => "identifier contains an unsupported character",
        }
    }
}

const MAX_IDENTIFIER_LEN: usize = 128;

/// Trims and validates a user-supplied identifier (version names, store ids).
pub fn canonical_identifier(value: impl Into<String>) -> Result<String, IdentifierError> {
    let value = value.into();
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(IdentifierError::Empty);
    }
    if trimmed.len() > MAX_IDENTIFIER_LEN {
        return Err(IdentifierError::TooLong);
    }
    let mut chars = trimmed.chars();
    let Some(first) = chars.next() else {
        return Err(IdentifierError::Empty);
    };
    if !first.is_ascii_alphanumeric() {
        return Err(IdentifierError::InvalidFirstChar);
    }
    for (index, ch) in trimmed.chars().enumerate().skip(1) {
        if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '/' | '-') {
            continue;
        }
        return Err(IdentifierError::InvalidChar { ch, index });
    }
    Ok(trimmed.to_string())
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VersionName(String);

impl VersionName {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn try_new(value: impl Into<String>) -> Result<Self, IdentifierError> {
        canonical_identifier(value).map(Self)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoreId(String);

impl StoreId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn try_new(value: impl Into<String>) -> Result<Self, IdentifierError> {
        let value = canonical_identifier(value)?;
        // Store ids name files on disk; no path separators.
        if let Some(index) = value.find('/') {
            return Err(IdentifierError::InvalidChar { ch: '/', index });
        }
        Ok(Self(value))
    }
}
