//! Error types for the genroute core library.
//!
//! Every fallible operation in the core returns [`GenrouteResult`]. Errors carry
//! a stable code so that logs and CLI output can be correlated.
//!
//! # Error Codes Reference
//!
//! | Code Range | Category | Description |
//! |------------|----------|-------------|
//! | E1001-E1099 | Database | Connection, query and migration errors |
//! | E2001-E2099 | Config | Config file and validation errors |
//! | E3001-E3099 | Provider | Provider calls, probes and HTTP transport errors |
//! | E4001-E4099 | Selection | Capability mismatch and exhausted fallback chains |
//! | E5001-E5099 | Ledger | Usage store, persistence and export errors |
//! | E9001-E9099 | General | Internal, IO, serialization and validation errors |

use std::fmt;
use thiserror::Error;
use tracing::{error, warn};

/// Context information for error tracking and debugging.
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub file: &'static str,
    pub line: u32,
    pub column: u32,
    pub operation: Option<String>,
}

impl ErrorContext {
    pub fn new(file: &'static str, line: u32, column: u32) -> Self {
        Self {
            file,
            line,
            column,
            operation: None,
        }
    }

    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)?;
        if let Some(ref op) = self.operation {
            write!(f, " ({})", op)?;
        }
        Ok(())
    }
}

/// Macro to create an ErrorContext at the current source location.
#[macro_export]
macro_rules! error_context {
    () => {
        $crate::error::ErrorContext::new(file!(), line!(), column!())
    };
    ($op:expr) => {
        $crate::error::ErrorContext::new(file!(), line!(), column!()).with_operation($op)
    };
}

/// The main error type for the genroute core library.
#[derive(Debug, Error)]
pub enum GenrouteError {
    // ========================================================================
    // Database Errors (E1001-E1099)
    // ========================================================================
    /// Failed to establish database connection
    #[error("[E1001] Database connection failed: {message}")]
    DatabaseConnectionFailed {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Database query execution failed
    #[error("[E1002] Database query failed: {0}")]
    DatabaseQueryFailed(String),

    /// Database migration failed
    #[error("[E1003] Database migration failed: {0}")]
    DatabaseMigrationFailed(String),

    /// Database pool exhausted or unavailable
    #[error("[E1004] Database pool unavailable: {0}")]
    DatabasePoolUnavailable(String),

    // ========================================================================
    // Configuration Errors (E2001-E2099)
    // ========================================================================
    /// Configuration file parse error
    #[error("[E2002] Failed to parse configuration: {0}")]
    ConfigParseError(String),

    /// Invalid configuration value
    #[error("[E2003] Invalid configuration value for '{key}': {message}")]
    InvalidConfigValue { key: String, message: String },

    // ========================================================================
    // Provider Errors (E3001-E3099)
    // ========================================================================
    /// No client registered under this provider name
    #[error("[E3001] Provider not found: {0}")]
    ProviderNotFound(String),

    /// A client is already registered under this name
    #[error("[E3002] Provider already registered: {0}")]
    ProviderAlreadyRegistered(String),

    /// A generation call returned an error
    #[error("[E3003] Provider '{provider}' call failed: {message}")]
    ProviderCallFailed { provider: String, message: String },

    /// A generation call or probe did not answer in time
    #[error("[E3004] Provider '{provider}' timed out after {timeout_secs} seconds")]
    ProviderTimeout { provider: String, timeout_secs: u64 },

    /// HTTP request to a provider endpoint failed
    #[error("[E3005] API request failed: {0}")]
    ApiRequestFailed(String),

    /// Provider response could not be decoded
    #[error("[E3006] Failed to parse API response: {0}")]
    ApiParseError(String),

    /// Provider asked us to slow down
    #[error("[E3007] Rate limit exceeded for '{provider}', retry after {retry_after_secs} seconds")]
    ApiRateLimitExceeded {
        provider: String,
        retry_after_secs: u64,
    },

    /// Provider rejected our credentials
    #[error("[E3008] Authentication failed for '{provider}': {message}")]
    ApiAuthenticationFailed { provider: String, message: String },

    /// Provider endpoint unreachable or returning 5xx
    #[error("[E3009] Provider unavailable: {0}")]
    ApiServiceUnavailable(String),

    // ========================================================================
    // Selection Errors (E4001-E4099)
    // ========================================================================
    /// No registered provider offers the requested capability within the constraints
    #[error("[E4001] No provider supports capability '{capability}' for task '{task_type}'")]
    CapabilityMismatch {
        task_type: String,
        capability: String,
    },

    /// Capable providers exist but none made it into the candidate list
    #[error("[E4002] No suitable provider for task '{task_type}'")]
    NoSuitableProvider { task_type: String },

    /// Every candidate was tried and failed
    #[error("[E4003] All providers failed for task '{task_type}' (tried: {}){}", .attempted.join(", "), last_error_suffix(.last_error))]
    FallbackExhausted {
        task_type: String,
        attempted: Vec<String>,
        last_error: Option<String>,
    },

    // ========================================================================
    // Ledger Errors (E5001-E5099)
    // ========================================================================
    /// The external usage store rejected an operation
    #[error("[E5001] Usage store operation failed: {0}")]
    UsageStoreFailed(String),

    /// The persistence worker is no longer accepting work
    #[error("[E5002] Usage ledger unavailable: {0}")]
    LedgerUnavailable(String),

    /// Usage export could not be produced
    #[error("[E5003] Usage export failed: {0}")]
    ExportFailed(String),

    // ========================================================================
    // General Errors (E9001-E9099)
    // ========================================================================
    /// Internal error
    #[error("[E9001] Internal error: {0}")]
    Internal(String),

    /// Input failed validation
    #[error("[E9002] Validation error: {0}")]
    ValidationError(String),

    /// IO error
    #[error("[E9003] IO error: {0}")]
    IoError(String),

    /// Serialization error
    #[error("[E9004] Serialization error: {0}")]
    SerializationError(String),
}

impl GenrouteError {
    /// Create a database connection error from a string message.
    pub fn database_connection_failed(message: impl Into<String>) -> Self {
        GenrouteError::DatabaseConnectionFailed {
            message: message.into(),
            source: None,
        }
    }

    pub fn provider_call_failed(provider: impl Into<String>, message: impl Into<String>) -> Self {
        GenrouteError::ProviderCallFailed {
            provider: provider.into(),
            message: message.into(),
        }
    }
}

fn last_error_suffix(last_error: &Option<String>) -> String {
    last_error
        .as_ref()
        .map(|e| format!(": {}", e))
        .unwrap_or_default()
}

/// Result type alias for genroute operations.
pub type GenrouteResult<T> = Result<T, GenrouteError>;

// ============================================================================
// From trait implementations
// ============================================================================

impl From<sqlx::Error> for GenrouteError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::PoolTimedOut => GenrouteError::DatabasePoolUnavailable(err.to_string()),
            sqlx::Error::PoolClosed => {
                GenrouteError::DatabasePoolUnavailable("Connection pool is closed".to_string())
            }
            sqlx::Error::Configuration(_) => {
                GenrouteError::database_connection_failed(err.to_string())
            }
            _ => GenrouteError::DatabaseQueryFailed(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for GenrouteError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        GenrouteError::DatabaseMigrationFailed(err.to_string())
    }
}

impl From<reqwest::Error> for GenrouteError {
    fn from(err: reqwest::Error) -> Self {
        let host = err
            .url()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| "unknown".to_string());

        if err.is_timeout() {
            GenrouteError::ProviderTimeout {
                provider: host,
                timeout_secs: 0,
            }
        } else if err.is_connect() {
            GenrouteError::ApiServiceUnavailable(err.to_string())
        } else if let Some(status) = err.status() {
            match status.as_u16() {
                429 => GenrouteError::ApiRateLimitExceeded {
                    provider: host,
                    retry_after_secs: 60,
                },
                401 | 403 => GenrouteError::ApiAuthenticationFailed {
                    provider: host,
                    message: status.to_string(),
                },
                500..=599 => GenrouteError::ApiServiceUnavailable(err.to_string()),
                _ => GenrouteError::ApiRequestFailed(err.to_string()),
            }
        } else if err.is_decode() {
            GenrouteError::ApiParseError(err.to_string())
        } else {
            GenrouteError::ApiRequestFailed(err.to_string())
        }
    }
}

impl From<serde_json::Error> for GenrouteError {
    fn from(err: serde_json::Error) -> Self {
        GenrouteError::SerializationError(err.to_string())
    }
}

impl From<std::io::Error> for GenrouteError {
    fn from(err: std::io::Error) -> Self {
        GenrouteError::IoError(err.to_string())
    }
}

impl From<crate::db::DatabaseError> for GenrouteError {
    fn from(err: crate::db::DatabaseError) -> Self {
        match err {
            crate::db::DatabaseError::ConnectionFailed(e) => {
                GenrouteError::database_connection_failed(e.to_string())
            }
            crate::db::DatabaseError::MigrationFailed(e) => {
                GenrouteError::DatabaseMigrationFailed(e.to_string())
            }
            crate::db::DatabaseError::InvalidConfig(msg) => GenrouteError::InvalidConfigValue {
                key: "database".to_string(),
                message: msg,
            },
        }
    }
}

impl From<crate::config::ConfigLoadError> for GenrouteError {
    fn from(err: crate::config::ConfigLoadError) -> Self {
        match err {
            crate::config::ConfigLoadError::InvalidValue { key, message } => {
                GenrouteError::InvalidConfigValue { key, message }
            }
            other => GenrouteError::ConfigParseError(other.to_string()),
        }
    }
}

// ============================================================================
// Error categorization helpers
// ============================================================================

impl GenrouteError {
    pub fn is_database_error(&self) -> bool {
        matches!(
            self,
            GenrouteError::DatabaseConnectionFailed { .. }
                | GenrouteError::DatabaseQueryFailed(_)
                | GenrouteError::DatabaseMigrationFailed(_)
                | GenrouteError::DatabasePoolUnavailable(_)
        )
    }

    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            GenrouteError::ConfigParseError(_)
                | GenrouteError::InvalidConfigValue { .. }
        )
    }

    pub fn is_provider_error(&self) -> bool {
        matches!(
            self,
            GenrouteError::ProviderNotFound(_)
                | GenrouteError::ProviderAlreadyRegistered(_)
                | GenrouteError::ProviderCallFailed { .. }
                | GenrouteError::ProviderTimeout { .. }
                | GenrouteError::ApiRequestFailed(_)
                | GenrouteError::ApiParseError(_)
                | GenrouteError::ApiRateLimitExceeded { .. }
                | GenrouteError::ApiAuthenticationFailed { .. }
                | GenrouteError::ApiServiceUnavailable(_)
        )
    }

    /// Returns true for the errors a caller sees when routing itself fails,
    /// as opposed to a single candidate failing.
    pub fn is_selection_error(&self) -> bool {
        matches!(
            self,
            GenrouteError::CapabilityMismatch { .. }
                | GenrouteError::NoSuitableProvider { .. }
                | GenrouteError::FallbackExhausted { .. }
        )
    }

    /// Returns true if this error is transient and the operation might succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GenrouteError::DatabasePoolUnavailable(_)
                | GenrouteError::DatabaseConnectionFailed { .. }
                | GenrouteError::ProviderTimeout { .. }
                | GenrouteError::ApiRateLimitExceeded { .. }
                | GenrouteError::ApiServiceUnavailable(_)
                | GenrouteError::ProviderCallFailed { .. }
        )
    }

    /// Returns a suggested retry delay in seconds if the error is transient.
    pub fn suggested_retry_delay(&self) -> Option<u64> {
        match self {
            GenrouteError::ApiRateLimitExceeded {
                retry_after_secs, ..
            } => Some(*retry_after_secs),
            GenrouteError::DatabasePoolUnavailable(_) => Some(1),
            GenrouteError::DatabaseConnectionFailed { .. } => Some(2),
            GenrouteError::ApiServiceUnavailable(_) => Some(5),
            GenrouteError::ProviderTimeout { .. } => Some(10),
            GenrouteError::ProviderCallFailed { .. } => Some(2),
            _ => None,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            GenrouteError::DatabaseConnectionFailed { .. } => "E1001",
            GenrouteError::DatabaseQueryFailed(_) => "E1002",
            GenrouteError::DatabaseMigrationFailed(_) => "E1003",
            GenrouteError::DatabasePoolUnavailable(_) => "E1004",
            GenrouteError::ConfigParseError(_) => "E2002",
            GenrouteError::InvalidConfigValue { .. } => "E2003",
            GenrouteError::ProviderNotFound(_) => "E3001",
            GenrouteError::ProviderAlreadyRegistered(_) => "E3002",
            GenrouteError::ProviderCallFailed { .. } => "E3003",
            GenrouteError::ProviderTimeout { .. } => "E3004",
            GenrouteError::ApiRequestFailed(_) => "E3005",
            GenrouteError::ApiParseError(_) => "E3006",
            GenrouteError::ApiRateLimitExceeded { .. } => "E3007",
            GenrouteError::ApiAuthenticationFailed { .. } => "E3008",
            GenrouteError::ApiServiceUnavailable(_) => "E3009",
            GenrouteError::CapabilityMismatch { .. } => "E4001",
            GenrouteError::NoSuitableProvider { .. } => "E4002",
            GenrouteError::FallbackExhausted { .. } => "E4003",
            GenrouteError::UsageStoreFailed(_) => "E5001",
            GenrouteError::LedgerUnavailable(_) => "E5002",
            GenrouteError::ExportFailed(_) => "E5003",
            GenrouteError::Internal(_) => "E9001",
            GenrouteError::ValidationError(_) => "E9002",
            GenrouteError::IoError(_) => "E9003",
            GenrouteError::SerializationError(_) => "E9004",
        }
    }

    /// Returns a user-friendly suggestion for how to resolve this error.
    pub fn user_suggestion(&self) -> Option<&'static str> {
        match self {
            GenrouteError::DatabaseConnectionFailed { .. } => {
                Some("Check that PostgreSQL is running and DATABASE_URL is correct")
            }
            GenrouteError::CapabilityMismatch { .. } => {
                Some("Add a provider with this capability to [[registry.providers]]")
            }
            GenrouteError::NoSuitableProvider { .. } => {
                Some("Check the fallback chain for this task type and monthly budgets")
            }
            GenrouteError::ApiRateLimitExceeded { .. } => {
                Some("Wait for the rate limit to reset or lower the dispatch concurrency")
            }
            GenrouteError::ApiAuthenticationFailed { .. } => {
                Some("Check the API key environment variable for this provider")
            }
            GenrouteError::ProviderNotFound(_) => {
                Some("Run 'genroute providers' to list configured providers")
            }
            _ => None,
        }
    }

    /// Log this error with appropriate severity level.
    pub fn log(&self) {
        let code = self.error_code();
        let suggestion = self.user_suggestion();

        if self.is_transient() {
            warn!(
                error_code = %code,
                suggestion = suggestion,
                "Transient error occurred: {}",
                self
            );
        } else {
            error!(
                error_code = %code,
                suggestion = suggestion,
                "Error occurred: {}",
                self
            );
        }
    }

    /// Log this error with context information.
    pub fn log_with_context(&self, context: &ErrorContext) {
        let code = self.error_code();

        if self.is_transient() {
            warn!(error_code = %code, location = %context, "Transient error at {}: {}", context, self);
        } else {
            error!(error_code = %code, location = %context, "Error at {}: {}", context, self);
        }
    }
}

// ============================================================================
// User-friendly error formatting for CLI
// ============================================================================

/// Format an error for CLI display with suggestions.
pub struct CliErrorDisplay<'a> {
    error: &'a GenrouteError,
    show_suggestion: bool,
}

impl<'a> CliErrorDisplay<'a> {
    pub fn new(error: &'a GenrouteError) -> Self {
        Self {
            error,
            show_suggestion: true,
        }
    }

    pub fn without_suggestion(mut self) -> Self {
        self.show_suggestion = false;
        self
    }
}

impl<'a> fmt::Display for CliErrorDisplay<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.error)?;

        if self.show_suggestion {
            if let Some(suggestion) = self.error.user_suggestion() {
                writeln!(f)?;
                writeln!(f, "  Suggestion: {}", suggestion)?;
            }
        }

        if let Some(delay) = self.error.suggested_retry_delay() {
            writeln!(f)?;
            writeln!(
                f,
                "  This error may be temporary. Try again in {} seconds.",
                delay
            )?;
        }

        Ok(())
    }
}
