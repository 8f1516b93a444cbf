//! Persistence abstraction for per-event registration collections.
//!
//! Every event owns one physical collection (a table in `PostgreSQL`, a map
//! in memory). The store talks to it exclusively through
//! [`RegistrationBackend`], so the same lifecycle logic runs against any
//! implementation:
//!
//! - `PostgresRegistrationBackend` (in `registration-postgres`): production
//! - `InMemoryRegistrationBackend` (in `registration-testing`): fast,
//!   deterministic tests
//!
//! # Dyn Compatibility
//!
//! Methods return boxed futures instead of using `async fn` so the store can
//! hold an `Arc<dyn RegistrationBackend>`.

use crate::error::Result;
use crate::event_name::EventName;
use crate::number::RegistrationNumber;
use crate::record::{RegistrationId, RegistrationRecord};
use crate::status::{PaymentStatus, RegistrationStatus};
use std::fmt;
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by [`RegistrationBackend`] methods.
pub type BackendFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Handle to one event's physical collection.
///
/// Obtained from the backend, cached by the registry, and passed back to the
/// backend for every record operation.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CollectionHandle {
    event_name: EventName,
    name: String,
}

impl CollectionHandle {
    /// Create a handle. Backends call this; the store never invents handles.
    #[must_use]
    pub fn new(event_name: EventName, name: impl Into<String>) -> Self {
        Self {
            event_name,
            name: name.into(),
        }
    }

    /// Event this collection belongs to.
    #[must_use]
    pub const fn event_name(&self) -> &EventName {
        &self.event_name
    }

    /// Backend-specific physical name (table name, map key, ...).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for CollectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.event_name, self.name)
    }
}

/// Filters for listing registrations. Every `Some` narrows the result.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RegistrationQuery {
    /// Workflow status
    pub registration_status: Option<RegistrationStatus>,
    /// Payment status
    pub payment_status: Option<PaymentStatus>,
    /// Check-in flag
    pub checked_in: Option<bool>,
    /// Exact (lowercased) `email`
    pub email: Option<String>,
    /// Exact team name
    pub team_name: Option<String>,
    /// Maximum number of records, newest first
    pub limit: Option<usize>,
}

impl RegistrationQuery {
    /// Query matching every record.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Restrict to a workflow status.
    #[must_use]
    pub const fn with_status(mut self, status: RegistrationStatus) -> Self {
        self.registration_status = Some(status);
        self
    }

    /// Restrict to a payment status.
    #[must_use]
    pub const fn with_payment_status(mut self, status: PaymentStatus) -> Self {
        self.payment_status = Some(status);
        self
    }

    /// Restrict to checked-in (or not checked-in) records.
    #[must_use]
    pub const fn with_checked_in(mut self, checked_in: bool) -> Self {
        self.checked_in = Some(checked_in);
        self
    }

    /// Restrict to one email address. Matched case-insensitively.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into().trim().to_lowercase());
        self
    }

    /// Restrict to one team.
    #[must_use]
    pub fn with_team_name(mut self, team_name: impl Into<String>) -> Self {
        self.team_name = Some(team_name.into());
        self
    }

    /// Cap the number of results.
    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether `record` satisfies every filter (the limit is not considered).
    ///
    /// Backends that cannot push a filter down may use this after loading.
    #[must_use]
    pub fn matches(&self, record: &RegistrationRecord) -> bool {
        self.registration_status.is_none_or(|s| record.registration_status == s)
            && self.payment_status.is_none_or(|s| record.payment_status() == s)
            && self.checked_in.is_none_or(|c| record.is_checked_in() == c)
            && self
                .email
                .as_deref()
                .is_none_or(|e| record.applicant.email.as_deref() == Some(e))
            && self
                .team_name
                .as_deref()
                .is_none_or(|t| record.team.team_name.as_deref() == Some(t))
    }
}

/// Storage for registration records, partitioned by event.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; one backend instance is shared by
/// every request.
///
/// # Collections
///
/// [`create_collection`](Self::create_collection) must be idempotent: when
/// several callers (possibly in different processes) race to create the
/// same event's collection, all of them get a handle to one physical
/// collection.
///
/// # Errors
///
/// Connectivity failures are reported as
/// [`RegistrationError::Unavailable`](crate::RegistrationError::Unavailable),
/// undecodable stored data as
/// [`RegistrationError::Internal`](crate::RegistrationError::Internal).
pub trait RegistrationBackend: Send + Sync {
    /// Find the existing collection for `event_name`, if any.
    fn open_collection(&self, event_name: EventName) -> BackendFuture<'_, Option<CollectionHandle>>;

    /// Create the collection for `event_name`, or return the existing one.
    fn create_collection(&self, event_name: EventName) -> BackendFuture<'_, CollectionHandle>;

    /// Insert a new record.
    ///
    /// # Errors
    ///
    /// [`RegistrationError::DuplicateKey`](crate::RegistrationError::DuplicateKey)
    /// if the registration number is already taken in this collection.
    fn insert(&self, collection: CollectionHandle, record: RegistrationRecord) -> BackendFuture<'_, ()>;

    /// Load a record by id.
    fn fetch(&self, collection: CollectionHandle, id: RegistrationId) -> BackendFuture<'_, Option<RegistrationRecord>>;

    /// Load a record by registration number.
    fn fetch_by_number(
        &self,
        collection: CollectionHandle,
        number: RegistrationNumber,
    ) -> BackendFuture<'_, Option<RegistrationRecord>>;

    /// Replace a stored record if its revision is still `expected_revision`.
    ///
    /// The new record carries its own (incremented) revision.
    ///
    /// # Errors
    ///
    /// - [`RegistrationError::NotFound`](crate::RegistrationError::NotFound)
    ///   if the record does not exist
    /// - [`RegistrationError::ConcurrentModification`](crate::RegistrationError::ConcurrentModification)
    ///   if the stored revision differs
    fn replace(
        &self,
        collection: CollectionHandle,
        expected_revision: u64,
        record: RegistrationRecord,
    ) -> BackendFuture<'_, ()>;

    /// List records matching `query`, newest `submittedAt` first.
    fn query(&self, collection: CollectionHandle, query: RegistrationQuery) -> BackendFuture<'_, Vec<RegistrationRecord>>;
}
