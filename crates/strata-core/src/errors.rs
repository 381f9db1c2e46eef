use thiserror::Error;

/// Result type alias using StrataError
pub type Result<T> = std::result::Result<T, StrataError>;

/// Canonical error kind taxonomy
///
/// Every [`StrataError`] variant maps onto exactly one kind. Kinds carry a
/// stable code suitable for programmatic handling, log fields and tests.
/// Callers distinguish "my precondition was stale" (`ConcurrencyConflict`)
/// from "the operation failed" (everything else); "nothing to report" is
/// never an error and is modelled as `Ok(None)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Tenant lookup against a tenant that does not exist
    NotFound,
    /// Tenant creation collided with an existing tenant
    AlreadyExists,
    /// Expected-version precondition failed on append
    ConcurrencyConflict,
    /// Migration ledger disagrees with the known migration set
    SchemaDivergence,
    /// Payload or metadata encode/decode failure
    Serialization,
    /// Underlying storage engine failure
    Storage,
    /// Filesystem failure outside the storage engine
    Io,
    /// Caller supplied arguments that can never succeed
    InvalidInput,
    /// Configuration could not be parsed or failed validation
    Config,
}

impl ErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "ERR_NOT_FOUND",
            ErrorKind::AlreadyExists => "ERR_ALREADY_EXISTS",
            ErrorKind::ConcurrencyConflict => "ERR_CONCURRENCY_CONFLICT",
            ErrorKind::SchemaDivergence => "ERR_SCHEMA_DIVERGENCE",
            ErrorKind::Serialization => "ERR_SERIALIZATION",
            ErrorKind::Storage => "ERR_STORAGE",
            ErrorKind::Io => "ERR_IO",
            ErrorKind::InvalidInput => "ERR_INVALID_INPUT",
            ErrorKind::Config => "ERR_CONFIG",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Error taxonomy for Strata operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StrataError {
    // ===== Tenant Errors =====
    /// No storage file exists for the tenant, or it is not tracked by this manager
    #[error("Tenant not found: {tenant}")]
    TenantNotFound { tenant: String },

    /// A storage file already exists at the tenant's path
    #[error("Tenant already exists: {tenant}")]
    TenantAlreadyExists { tenant: String },

    // ===== Event Store Errors =====
    /// The stream was not at the version the batch was built against
    #[error("Concurrency conflict on stream {stream_id}: expected version {expected_version}")]
    ConcurrencyConflict {
        stream_id: String,
        expected_version: u64,
    },

    // ===== Migration Errors =====
    /// Ledger entry at `position` names a different migration than the known set
    #[error("Schema divergence at ledger position {position}: expected {expected}, found {found}")]
    SchemaDivergence {
        position: usize,
        expected: String,
        found: String,
    },

    /// A recorded migration's script differs from the known script
    #[error("Checksum mismatch for migration {migration}: recorded {recorded}, known {known}")]
    ChecksumMismatch {
        migration: String,
        recorded: String,
        known: String,
    },

    /// A migration script failed; its transaction was rolled back
    #[error("Migration {migration} failed: {reason}")]
    Migration { migration: String, reason: String },

    // ===== Serialization Errors =====
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Stored type tag has no registered decoder
    #[error("Unknown event type: {event_type}")]
    UnknownEventType { event_type: String },

    // ===== Storage Errors =====
    #[error("Storage error in {op}: {message}")]
    Storage { op: String, message: String },

    #[error("IO error in {op}: {message}")]
    Io { op: String, message: String },

    // ===== Validation Errors =====
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("Invalid configuration: {reason}")]
    Config { reason: String },
}

impl StrataError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            StrataError::TenantNotFound { .. } => ErrorKind::NotFound,
            StrataError::TenantAlreadyExists { .. } => ErrorKind::AlreadyExists,
            StrataError::ConcurrencyConflict { .. } => ErrorKind::ConcurrencyConflict,
            StrataError::SchemaDivergence { .. } | StrataError::ChecksumMismatch { .. } => {
                ErrorKind::SchemaDivergence
            }
            StrataError::Serialization { .. } | StrataError::UnknownEventType { .. } => {
                ErrorKind::Serialization
            }
            StrataError::Migration { .. } | StrataError::Storage { .. } => ErrorKind::Storage,
            StrataError::Io { .. } => ErrorKind::Io,
            StrataError::InvalidInput { .. } => ErrorKind::InvalidInput,
            StrataError::Config { .. } => ErrorKind::Config,
        }
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind().code()
    }

    /// True when the caller should reload the stream and retry the command
    pub fn is_concurrency_conflict(&self) -> bool {
        self.kind() == ErrorKind::ConcurrencyConflict
    }
}

impl From<serde_json::Error> for StrataError {
    fn from(err: serde_json::Error) -> Self {
        StrataError::Serialization {
            message: err.to_string(),
        }
    }
}
