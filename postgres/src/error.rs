//! `sqlx` error mapping.

use registration_core::RegistrationError;

/// SQLSTATE for a missing table.
const UNDEFINED_TABLE: &str = "42P01";

/// Map a `sqlx` error onto the store's error taxonomy.
///
/// Connectivity problems become `Unavailable`; everything else is
/// `Internal`. Unique violations are handled by the caller, which knows
/// which constraint means what.
pub(crate) fn map_sqlx_error(context: &str, error: &sqlx::Error) -> RegistrationError {
    let mapped = match error {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) | sqlx::Error::Tls(_) => {
            RegistrationError::Unavailable(format!("{context}: {error}"))
        }
        sqlx::Error::Database(db) if db.code().as_deref() == Some(UNDEFINED_TABLE) => {
            RegistrationError::Internal(format!("{context}: collection table is missing: {error}"))
        }
        _ => RegistrationError::Internal(format!("{context}: {error}")),
    };
    metrics::counter!("registration.postgres.errors", "kind" => error_kind(&mapped)).increment(1);
    mapped
}

/// Whether `error` reports a missing table.
pub(crate) fn is_undefined_table(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.code().as_deref() == Some(UNDEFINED_TABLE))
}

/// Whether `error` violates the named unique constraint.
pub(crate) fn violates(error: &sqlx::Error, constraint: &str) -> bool {
    match error {
        sqlx::Error::Database(db) => db.is_unique_violation() && db.constraint() == Some(constraint),
        _ => false,
    }
}

const fn error_kind(error: &RegistrationError) -> &'static str {
    match error {
        RegistrationError::Unavailable(_) => "unavailable",
        _ => "internal",
    }
}
