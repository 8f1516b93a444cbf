//! Error taxonomy for registration storage operations.
//!
//! Every failure the store reports to its caller is one of the variants of
//! [`RegistrationError`]. The HTTP layer is expected to translate them with
//! [`RegistrationError::http_status`].

use thiserror::Error;

/// Result type alias for registration operations.
pub type Result<T> = std::result::Result<T, RegistrationError>;

/// Errors reported by the registration store and its backends.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    // ═══════════════════════════════════════════════════════════
    // Caller Errors
    // ═══════════════════════════════════════════════════════════

    /// Bad input shape, e.g. a missing or non-string event name.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A field value violates a declared constraint.
    #[error("Validation failed for `{field}`: {message}")]
    Validation {
        /// Name of the offending field
        field: String,
        /// What was wrong with it
        message: String,
    },

    /// The operation targets a record that does not exist.
    #[error("Registration {id} not found in event `{event_name}`")]
    NotFound {
        /// Event collection that was searched
        event_name: String,
        /// Identifier that failed to resolve
        id: String,
    },

    // ═══════════════════════════════════════════════════════════
    // Conflicts
    // ═══════════════════════════════════════════════════════════

    /// Registration number collided with an existing record.
    #[error("Duplicate registration number {registration_number} in event `{event_name}`")]
    DuplicateKey {
        /// Event collection where the collision happened
        event_name: String,
        /// The colliding registration number
        registration_number: String,
    },

    /// The record changed between read and write.
    #[error("Registration {id} was modified concurrently (expected revision {expected})")]
    ConcurrentModification {
        /// Record identifier
        id: String,
        /// Revision the writer based its update on
        expected: u64,
    },

    // ═══════════════════════════════════════════════════════════
    // System Errors
    // ═══════════════════════════════════════════════════════════

    /// The persistence layer could not be reached.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// Stored data could not be decoded, or another internal fault.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RegistrationError {
    /// Shorthand for a [`RegistrationError::Validation`].
    #[must_use]
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Returns `true` for registration-number collisions.
    ///
    /// # Examples
    ///
    /// ```
    /// # use registration_core::RegistrationError;
    /// let err = RegistrationError::DuplicateKey {
    ///     event_name: "Tech Hunt".into(),
    ///     registration_number: "TEC-ABC-123".into(),
    /// };
    /// assert!(err.is_duplicate_key());
    /// ```
    #[must_use]
    pub const fn is_duplicate_key(&self) -> bool {
        matches!(self, Self::DuplicateKey { .. })
    }

    /// Returns `true` for optimistic-concurrency conflicts.
    #[must_use]
    pub const fn is_concurrent_modification(&self) -> bool {
        matches!(self, Self::ConcurrentModification { .. })
    }

    /// Returns `true` if the caller sent something the store rejects.
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        matches!(self, Self::InvalidArgument(_) | Self::Validation { .. })
    }

    /// HTTP status code the web layer should answer with.
    ///
    /// # Examples
    ///
    /// ```
    /// # use registration_core::RegistrationError;
    /// assert_eq!(RegistrationError::InvalidArgument("x".into()).http_status(), 400);
    /// assert_eq!(RegistrationError::Unavailable("down".into()).http_status(), 503);
    /// ```
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::InvalidArgument(_) | Self::Validation { .. } => 400,
            Self::NotFound { .. } => 404,
            Self::DuplicateKey { .. } | Self::ConcurrentModification { .. } => 409,
            Self::Unavailable(_) => 503,
            Self::Internal(_) => 500,
        }
    }
}

impl From<serde_json::Error> for RegistrationError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("Document encoding failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_display_names_field() {
        let err = RegistrationError::validation("paymentMethod", "`bitcoin` is not allowed");
        let display = format!("{err}");
        assert!(display.contains("paymentMethod"));
        assert!(display.contains("bitcoin"));
    }

    #[test]
    fn status_mapping() {
        let not_found = RegistrationError::NotFound {
            event_name: "Tech Hunt".into(),
            id: "abc".into(),
        };
        assert_eq!(not_found.http_status(), 404);
        assert_eq!(
            RegistrationError::validation("tshirtSize", "bad").http_status(),
            400
        );
        assert_eq!(
            RegistrationError::DuplicateKey {
                event_name: "Tech Hunt".into(),
                registration_number: "TEC-1-ABC".into(),
            }
            .http_status(),
            409
        );
        assert_eq!(RegistrationError::Internal("x".into()).http_status(), 500);
    }

    #[test]
    fn classification_helpers() {
        assert!(RegistrationError::InvalidArgument("x".into()).is_user_error());
        assert!(!RegistrationError::Unavailable("x".into()).is_user_error());
        assert!(
            RegistrationError::ConcurrentModification {
                id: "a".into(),
                expected: 2
            }
            .is_concurrent_modification()
        );
    }
}
