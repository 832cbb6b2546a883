//! Error types for mnemon operations.
//!
//! Every public entry point of the engine is fail-soft: per-record store
//! failures are logged and skipped, vector index failures degrade search to
//! metadata-only ranking. `MnemonError` is what the collaborator seams
//! (store, access tracker, vector index) report back to the engine, and
//! what configuration loading returns.

use thiserror::Error;

/// Result type alias for mnemon operations.
pub type MnemonResult<T> = Result<T, MnemonError>;

/// Main error type for all mnemon operations.
#[derive(Error, Debug)]
pub enum MnemonError {
    /// Observation not found.
    #[error("Observation not found: {message}")]
    NotFound {
        message: String,
        code: ErrorCode,
        observation_id: Option<i64>,
    },

    /// Persistent store operation failed.
    #[error("Database error: {message}")]
    Database {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Vector index operation failed.
    #[error("Vector index error: {message}")]
    VectorIndex {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Vector index did not answer in time.
    #[error("Vector index timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64, code: ErrorCode },

    /// Scheduler lifecycle error.
    #[error("Scheduler error: {0}")]
    Scheduler(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Error codes for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Observation (OBS_xxx)
    ObsNotFound,

    // Database (DB_xxx)
    DbConnectionFailed,
    DbOperationFailed,

    // Vector index (VEC_xxx)
    VecQueryFailed,
    VecTimeout,
    VecMalformedResponse,

    // Internal
    Internal,
}

impl ErrorCode {
    /// Get the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ObsNotFound => "OBS_001",
            ErrorCode::DbConnectionFailed => "DB_001",
            ErrorCode::DbOperationFailed => "DB_002",
            ErrorCode::VecQueryFailed => "VEC_001",
            ErrorCode::VecTimeout => "VEC_002",
            ErrorCode::VecMalformedResponse => "VEC_003",
            ErrorCode::Internal => "INT_001",
        }
    }
}

impl MnemonError {
    /// Create a not found error.
    pub fn not_found(observation_id: i64) -> Self {
        Self::NotFound {
            message: format!("Observation with id '{}' not found", observation_id),
            code: ErrorCode::ObsNotFound,
            observation_id: Some(observation_id),
        }
    }

    /// Create an error for a database that could not be opened.
    pub fn connection_failed(err: rusqlite::Error) -> Self {
        Self::Database {
            message: format!("Failed to open database: {}", err),
            code: ErrorCode::DbConnectionFailed,
            source: Some(Box::new(err)),
        }
    }

    /// Create a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
            code: ErrorCode::DbOperationFailed,
            source: None,
        }
    }

    /// Create a vector index error.
    pub fn vector_index(message: impl Into<String>) -> Self {
        Self::VectorIndex {
            message: message.into(),
            code: ErrorCode::VecQueryFailed,
            source: None,
        }
    }

    /// Create an error for an index response that cannot be interpreted.
    pub fn malformed_response(message: impl Into<String>) -> Self {
        Self::VectorIndex {
            message: message.into(),
            code: ErrorCode::VecMalformedResponse,
            source: None,
        }
    }

    /// Create a timeout error.
    pub fn timeout(timeout_ms: u64) -> Self {
        Self::Timeout {
            timeout_ms,
            code: ErrorCode::VecTimeout,
        }
    }

    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound { code, .. } => *code,
            Self::Database { code, .. } => *code,
            Self::VectorIndex { code, .. } => *code,
            Self::Timeout { code, .. } => *code,
            _ => ErrorCode::Internal,
        }
    }

    /// Whether this error came from the vector index (including timeouts).
    pub fn is_index_failure(&self) -> bool {
        matches!(self, Self::VectorIndex { .. } | Self::Timeout { .. })
    }
}

impl From<rusqlite::Error> for MnemonError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database {
            message: err.to_string(),
            code: ErrorCode::DbOperationFailed,
            source: Some(Box::new(err)),
        }
    }
}

impl From<tokio_cron_scheduler::JobSchedulerError> for MnemonError {
    fn from(err: tokio_cron_scheduler::JobSchedulerError) -> Self {
        Self::Scheduler(err.to_string())
    }
}
