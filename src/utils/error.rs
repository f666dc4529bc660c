use crate::domain::model::{Collection, Side};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InventoryError {
    #[error("Starting point not found: {name}")]
    StartingPointNotFound { name: String },

    #[error("Connected cable not found: {cable}")]
    ConnectedCableNotFound { cable: String },

    #[error("Endpoint {endpoint} is not attached to a cable on {side}")]
    EndpointNotAttached { endpoint: String, side: Side },

    #[error("Cable not found: {name}")]
    CableNotFound { name: String },

    #[error("Cycle detected after {hops} hops")]
    CycleDetected { hops: usize },

    #[error("{collection} record not found: {key}")]
    RecordNotFound { collection: Collection, key: String },

    #[error("{collection} record already exists: {key}")]
    DuplicateRecord { collection: Collection, key: String },

    #[error("Schema violation in {collection}: {message}")]
    SchemaViolation {
        collection: Collection,
        message: String,
    },

    #[error("Invalid document: {message}")]
    InvalidDocument { message: String },

    #[error("Revision conflict on {collection} record {key}")]
    RevisionConflict { collection: Collection, key: String },

    #[error("Concurrent modification: gave up after {attempts} attempts")]
    ConcurrentModification { attempts: u32 },

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("Unexpected response ({status}): {message}")]
    UnexpectedResponse { status: u16, message: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid configuration for {field} ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    NotFound,
    Conflict,
    Validation,
    Traversal,
    Configuration,
    Storage,
    Remote,
}

impl InventoryError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::StartingPointNotFound { .. }
            | Self::ConnectedCableNotFound { .. }
            | Self::EndpointNotAttached { .. }
            | Self::CableNotFound { .. }
            | Self::RecordNotFound { .. } => ErrorCategory::NotFound,
            Self::DuplicateRecord { .. }
            | Self::RevisionConflict { .. }
            | Self::ConcurrentModification { .. } => ErrorCategory::Conflict,
            Self::SchemaViolation { .. } | Self::InvalidDocument { .. } => {
                ErrorCategory::Validation
            }
            Self::CycleDetected { .. } => ErrorCategory::Traversal,
            Self::ConfigError { .. }
            | Self::MissingConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::ConfigValidationError { .. } => ErrorCategory::Configuration,
            Self::IoError(_) | Self::SerializationError(_) => ErrorCategory::Storage,
            Self::ApiError(_) | Self::UnexpectedResponse { .. } => ErrorCategory::Remote,
        }
    }

    /// Short message returned to API callers. Lookup failures keep the exact
    /// wording clients already match on.
    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::StartingPointNotFound { .. } => "Starting point not found".to_string(),
            Self::ConnectedCableNotFound { .. } => "Connected cable not found".to_string(),
            Self::CableNotFound { .. } => "Cable not found".to_string(),
            Self::RecordNotFound { collection, .. } => {
                format!("{} not found", collection.noun())
            }
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::NotFound => "Check the identifier; names are case-sensitive",
            ErrorCategory::Conflict => "Re-read the record and retry the request",
            ErrorCategory::Validation => "Fix the document so it matches the collection schema",
            ErrorCategory::Traversal => "Inspect the cable connections for a loop",
            ErrorCategory::Configuration => "Review command-line flags and the TOML config file",
            ErrorCategory::Storage => "Check the snapshot file path and permissions",
            ErrorCategory::Remote => "Make sure the module-db server is running and reachable",
        }
    }
}

pub type Result<T> = std::result::Result<T, InventoryError>;
