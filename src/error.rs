//! Error types shared by the store, the importer and the web layer.
//!
//! `NotFound`, `ConstraintViolation`, `AuthenticationFailure` and
//! `AuthorizationRequired` are recoverable outcomes the caller branches on.
//! `Storage` and `Credential` mean the request cannot be served at all.

use thiserror::Error;

/// Which write constraint rejected a row.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    /// A unique column (or column set) already holds this value.
    #[error("{entity} with {field} '{value}' already exists")]
    Duplicate {
        entity: &'static str,
        field: String,
        value: String,
    },

    /// A reference field points at a row that does not exist.
    #[error("{field} {id} does not exist")]
    MissingReference { field: &'static str, id: i64 },

    /// A value outside the accepted token set (e.g. a verdict).
    #[error("'{value}' is not a valid {field}")]
    InvalidValue { field: &'static str, value: String },
}

impl Violation {
    /// Name of the field that failed, for boundary-layer messages.
    pub fn field(&self) -> &str {
        match self {
            Violation::Duplicate { field, .. } => field.as_str(),
            Violation::MissingReference { field, .. } => *field,
            Violation::InvalidValue { field, .. } => *field,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("constraint violation: {0}")]
    ConstraintViolation(#[from] Violation),

    #[error("invalid username or password")]
    AuthenticationFailure,

    #[error("login required")]
    AuthorizationRequired,

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("credential hashing failed: {0}")]
    Credential(String),

    #[error("import failed: {0}")]
    Import(#[from] csv::Error),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        StoreError::NotFound { entity, id }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    /// The violation carried by a `ConstraintViolation`, if that is what this is.
    pub fn violation(&self) -> Option<&Violation> {
        match self {
            StoreError::ConstraintViolation(v) => Some(v),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid {field}: {message}")]
    Invalid { field: &'static str, message: String },
}
