#![forbid(unsafe_code)]

use cs_sql::PreprocessError;

#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Sql(rusqlite::Error),
    Json(serde_json::Error),
    Config(String),
    InvalidInput(&'static str),
    Preprocess(PreprocessError),
    MalformedImage(&'static str),
    Plugin(String),
    BranchCycle,
    BranchDepthExceeded,
    UnknownVersion,
    UnknownCommit,
    UnknownConflict,
    UnknownFile,
    UnknownStore,
    PluginNotFound(String),
    EmptyCheckpoint,
    VersionAlreadyExists,
    ConflictAlreadyResolved,
    ImmutableChangeSet,
    MergeBlocked { conflicts: Vec<String> },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Constraint,
    Conflict,
    Storage,
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_)
            | Self::InvalidInput(_)
            | Self::Preprocess(_)
            | Self::MalformedImage(_)
            | Self::Plugin(_)
            | Self::BranchCycle
            | Self::BranchDepthExceeded => ErrorKind::Validation,
            Self::UnknownVersion
            | Self::UnknownCommit
            | Self::UnknownConflict
            | Self::UnknownFile
            | Self::UnknownStore
            | Self::PluginNotFound(_) => ErrorKind::NotFound,
            Self::EmptyCheckpoint
            | Self::VersionAlreadyExists
            | Self::ConflictAlreadyResolved
            | Self::ImmutableChangeSet => ErrorKind::Constraint,
            Self::MergeBlocked { .. } => ErrorKind::Conflict,
            Self::Io(_) | Self::Sql(_) | Self::Json(_) => ErrorKind::Storage,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Io(_) => "IO",
            Self::Sql(_) => "SQLITE",
            Self::Json(_) => "JSON",
            Self::Config(_) => "INVALID_CONFIG",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::Preprocess(err) => err.code(),
            Self::MalformedImage(_) => "MALFORMED_IMAGE",
            Self::Plugin(_) => "PLUGIN_FAILED",
            Self::BranchCycle => "VERSION_CYCLE",
            Self::BranchDepthExceeded => "VERSION_DEPTH_EXCEEDED",
            Self::UnknownVersion => "UNKNOWN_VERSION",
            Self::UnknownCommit => "UNKNOWN_COMMIT",
            Self::UnknownConflict => "UNKNOWN_CONFLICT",
            Self::UnknownFile => "UNKNOWN_FILE",
            Self::UnknownStore => "UNKNOWN_STORE",
            Self::PluginNotFound(_) => "PLUGIN_NOT_FOUND",
            Self::EmptyCheckpoint => "EMPTY_CHECKPOINT",
            Self::VersionAlreadyExists => "VERSION_ALREADY_EXISTS",
            Self::ConflictAlreadyResolved => "CONFLICT_ALREADY_RESOLVED",
            Self::ImmutableChangeSet => "IMMUTABLE_CHANGE_SET",
            Self::MergeBlocked { .. } => "MERGE_BLOCKED",
        }
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "io: {err}"),
            Self::Sql(err) => write!(f, "sqlite: {err}"),
            Self::Json(err) => write!(f, "json: {err}"),
            Self::Config(message) => write!(f, "invalid config: {message}"),
            Self::InvalidInput(message) => write!(f, "invalid input: {message}"),
            Self::Preprocess(err) => write!(f, "{err}"),
            Self::MalformedImage(message) => write!(f, "malformed store image: {message}"),
            Self::Plugin(message) => write!(f, "plugin failed: {message}"),
            Self::BranchCycle => write!(f, "version inheritance cycle"),
            Self::BranchDepthExceeded => write!(f, "version inheritance depth exceeded"),
            Self::UnknownVersion => write!(f, "unknown version"),
            Self::UnknownCommit => write!(f, "unknown commit"),
            Self::UnknownConflict => write!(f, "unknown conflict"),
            Self::UnknownFile => write!(f, "unknown file"),
            Self::UnknownStore => write!(f, "unknown store"),
            Self::PluginNotFound(key) => write!(f, "no plugin handles '{key}'"),
            Self::EmptyCheckpoint => write!(f, "nothing to checkpoint: working change set is empty"),
            Self::VersionAlreadyExists => write!(f, "version already exists"),
            Self::ConflictAlreadyResolved => write!(f, "conflict already resolved"),
            Self::ImmutableChangeSet => write!(f, "change set is immutable"),
            Self::MergeBlocked { conflicts } => write!(
                f,
                "merge blocked by {} unresolved conflict(s): {}",
                conflicts.len(),
                conflicts.join(", ")
            ),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Sql(err) => Some(err),
            Self::Json(err) => Some(err),
            Self::Preprocess(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        if is_immutable_change_set(&value) {
            return Self::ImmutableChangeSet;
        }
        Self::Sql(value)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<PreprocessError> for StoreError {
    fn from(value: PreprocessError) -> Self {
        Self::Preprocess(value)
    }
}

/// Raised by the `change_set_element` triggers.
pub(crate) const IMMUTABLE_CHANGE_SET_MESSAGE: &str = "change set is immutable";

fn is_immutable_change_set(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(_, Some(message)) => {
            message.contains(IMMUTABLE_CHANGE_SET_MESSAGE)
        }
        _ => false,
    }
}
