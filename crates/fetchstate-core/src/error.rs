//! # Fetch Error Types
//!
//! The error taxonomy a producer may reject with, and the classification
//! that decides whether a rejection is ever shown to the user.
//!
//! ## Error Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Fetch Error Categories                            │
//! │                                                                         │
//! │  SUPPRESSED (never reach FetchState::error)                            │
//! │  ├── NotReady           - a required input is missing                  │
//! │  ├── Aborted            - invocation superseded or torn down           │
//! │  └── ContractViolation  - producer resolved without a value            │
//! │                           (logged; promoted only under strict policy)  │
//! │                                                                         │
//! │  REPORTABLE (set FetchState::error, keep last-known-good value)        │
//! │  ├── Request            - plain message failure                        │
//! │  └── Source             - wrapped std::error::Error                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

// =============================================================================
// Fetch Error
// =============================================================================

/// Failure reported by a producer, or synthesized by the engine.
///
/// Cheap to clone: the only heap payloads are a `String` or an `Arc`.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// The producer cannot run yet.
    ///
    /// ## When This Occurs
    /// - A required input (namespace, API handle, ...) is not available yet
    /// - The caller is expected to swap in a new producer once it is
    #[error("Not ready yet. {0}")]
    NotReady(String),

    /// The request was cancelled before it could settle.
    #[error("Request was aborted")]
    Aborted,

    /// The producer resolved without a value.
    #[error("Producer resolved without a value; this is likely an API issue")]
    ContractViolation,

    /// Any other failure, carried as a message.
    #[error("{0}")]
    Request(String),

    /// Any other failure, carried as the original error.
    #[error("{0}")]
    Source(Arc<dyn std::error::Error + Send + Sync>),
}

impl FetchError {
    /// Creates a [`FetchError::NotReady`] with the given reason.
    pub fn not_ready(reason: impl Into<String>) -> Self {
        FetchError::NotReady(reason.into())
    }

    /// Creates a [`FetchError::Request`] with the given message.
    pub fn request(message: impl Into<String>) -> Self {
        FetchError::Request(message.into())
    }

    /// Wraps an arbitrary error as a reportable failure.
    pub fn from_source<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        FetchError::Source(Arc::new(err))
    }

    /// Built-in classification of this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            FetchError::NotReady(_) => ErrorClass::NotReady,
            FetchError::Aborted => ErrorClass::Cancelled,
            FetchError::ContractViolation => ErrorClass::ContractViolation,
            FetchError::Request(_) | FetchError::Source(_) => ErrorClass::Reportable,
        }
    }

    /// Returns true if this error must never populate the visible error.
    pub fn is_suppressed(&self) -> bool {
        self.class().is_suppressed()
    }
}

impl PartialEq for FetchError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FetchError::NotReady(a), FetchError::NotReady(b)) => a == b,
            (FetchError::Aborted, FetchError::Aborted) => true,
            (FetchError::ContractViolation, FetchError::ContractViolation) => true,
            (FetchError::Request(a), FetchError::Request(b)) => a == b,
            // Opaque sources compare by identity.
            (FetchError::Source(a), FetchError::Source(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

// =============================================================================
// Error Classification
// =============================================================================

/// How the engine treats a rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Missing input; wait for a new producer.
    NotReady,
    /// Superseded or torn down.
    Cancelled,
    /// Producer broke its contract by resolving without a value.
    ContractViolation,
    /// Everything else: surfaces on the observable error.
    Reportable,
}

impl ErrorClass {
    /// Returns true for the categories that never reach the observable error.
    pub fn is_suppressed(self) -> bool {
        !matches!(self, ErrorClass::Reportable)
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorClass::NotReady => write!(f, "not_ready"),
            ErrorClass::Cancelled => write!(f, "cancelled"),
            ErrorClass::ContractViolation => write!(f, "contract_violation"),
            ErrorClass::Reportable => write!(f, "reportable"),
        }
    }
}

/// Application-supplied hook deciding the class of a rejection.
pub type ErrorClassifier = Arc<dyn Fn(&FetchError) -> ErrorClass + Send + Sync>;

/// Classifier that defers to [`FetchError::class`].
pub fn default_classifier() -> ErrorClassifier {
    Arc::new(FetchError::class)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("connection refused")]
    struct Refused;

    #[test]
    fn test_not_ready_message() {
        let err = FetchError::not_ready("Do not have namespace");
        assert_eq!(err.to_string(), "Not ready yet. Do not have namespace");
    }

    #[test]
    fn test_suppressed_categories() {
        assert!(FetchError::not_ready("x").is_suppressed());
        assert!(FetchError::Aborted.is_suppressed());
        assert!(FetchError::ContractViolation.is_suppressed());

        assert!(!FetchError::request("boom").is_suppressed());
        assert!(!FetchError::from_source(Refused).is_suppressed());
    }

    #[test]
    fn test_source_display_and_identity() {
        let err = FetchError::from_source(Refused);
        assert_eq!(err.to_string(), "connection refused");
        assert_eq!(err, err.clone());
        assert_ne!(err, FetchError::from_source(Refused));
    }

    #[test]
    fn test_default_classifier_matches_class() {
        let classify = default_classifier();
        assert_eq!(classify(&FetchError::Aborted), ErrorClass::Cancelled);
        assert_eq!(classify(&FetchError::request("x")), ErrorClass::Reportable);
    }

    #[test]
    fn test_error_class_display() {
        assert_eq!(ErrorClass::NotReady.to_string(), "not_ready");
        assert_eq!(ErrorClass::Reportable.to_string(), "reportable");
    }
}
