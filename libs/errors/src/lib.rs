//! Unified error handling for the deposition recipe services
//!
//! Each crate keeps its own domain-specific error enum and implements
//! [`DepoErrorTrait`] to expose a common classification to callers (CLI,
//! orchestration layer, logs).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// ErrorInfo - serializable error report
// ============================================================================

/// Standard error information handed to the orchestration layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable error code (e.g. `RECIPESRV_INTEGRITY_ERROR`)
    pub code: String,
    /// Human readable message
    pub message: String,
    /// Error category
    pub category: ErrorCategory,
    /// Detailed error description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Per-field (or per-row) errors
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub field_errors: HashMap<String, Vec<String>>,
}

impl ErrorInfo {
    /// Create a new ErrorInfo with a code, message and category
    pub fn new(code: impl Into<String>, message: impl Into<String>, category: ErrorCategory) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            category,
            details: None,
            field_errors: HashMap::new(),
        }
    }

    /// Add details
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Add a field error
    pub fn add_field_error(mut self, field: impl Into<String>, error: impl Into<String>) -> Self {
        self.field_errors
            .entry(field.into())
            .or_default()
            .push(error.into());
        self
    }
}

// ============================================================================
// Error categories
// ============================================================================

/// Error category enum - used for classification and log routing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    // Recipe analysis
    Structural,
    Timing,

    // PLC synchronization
    Capacity,
    Transport,
    Timeout,
    Codec,
    Verification,

    // File codec
    Integrity,
    Incompatible,

    // Infrastructure
    Configuration,
    Io,
    Cancelled,
    Internal,
}

impl ErrorCategory {
    /// Stable lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Structural => "structural",
            Self::Timing => "timing",
            Self::Capacity => "capacity",
            Self::Transport => "transport",
            Self::Timeout => "timeout",
            Self::Codec => "codec",
            Self::Verification => "verification",
            Self::Integrity => "integrity",
            Self::Incompatible => "incompatible",
            Self::Configuration => "configuration",
            Self::Io => "io",
            Self::Cancelled => "cancelled",
            Self::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Error capability trait
// ============================================================================

/// Error capability trait
///
/// Defines a unified interface that every crate's error type implements.
/// Crates keep their own domain-specific variants and gain a common
/// interface by implementing this trait.
///
/// Nothing in the core retries on its own. `is_retryable` only tells the
/// caller whether re-running the whole operation is meaningful.
pub trait DepoErrorTrait: std::error::Error + Send + Sync + 'static {
    /// Get error code (for logs and reports)
    fn error_code(&self) -> &'static str;

    /// Get error category
    fn category(&self) -> ErrorCategory;

    /// Whether re-running the whole operation may succeed
    fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Transport | ErrorCategory::Timeout
        )
    }

    /// Get log level
    fn log_level(&self) -> tracing::Level {
        use tracing::Level;
        match self.category() {
            ErrorCategory::Internal | ErrorCategory::Integrity | ErrorCategory::Verification => {
                Level::ERROR
            },
            ErrorCategory::Transport | ErrorCategory::Timeout | ErrorCategory::Incompatible => {
                Level::WARN
            },
            ErrorCategory::Cancelled => Level::INFO,
            _ => Level::WARN,
        }
    }

    /// Whether an operator should be alerted
    ///
    /// A failed verification means the controller may hold a recipe that
    /// differs from the one the operator sent.
    fn should_alert(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Verification | ErrorCategory::Internal
        )
    }

    /// Convert to a serializable report
    fn to_error_info(&self) -> ErrorInfo {
        ErrorInfo::new(self.error_code(), self.to_string(), self.category())
    }
}
