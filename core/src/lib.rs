//! # Registration Core
//!
//! Core types and traits for storing festival event registrations.
//!
//! Every event gets its own collection of registration records. A record
//! has a fixed set of declared, typed fields plus an extension bag holding
//! whatever else the event's form asked for.
//!
//! ## Core Concepts
//!
//! - **[`EventName`]**: Normalized partition key; one collection per event
//! - **[`RegistrationRecord`]**: One submission, declared fields plus extras
//! - **[`schema`]**: Casting and validation of submitted fields
//! - **[`RegistrationBackend`]**: Persistence for per-event collections
//! - **[`NumberGenerator`]**: Human-readable registration numbers
//! - **[`environment::Clock`]**: Injected time source
//!
//! ## Example
//!
//! ```
//! use registration_core::{schema, EventName, Submission};
//! use serde_json::json;
//!
//! let submission = Submission::from_value(json!({
//!     "eventName": "Tech Hunt",
//!     "teamName": " Alpha ",
//!     "email": "A@B.com",
//! }))
//! .unwrap();
//!
//! let event: EventName = submission.event_name().unwrap();
//! let normalized = schema::normalize_submission(submission.fields).unwrap();
//!
//! assert_eq!(event.as_str(), "Tech Hunt");
//! assert_eq!(normalized.fields["teamName"], json!("Alpha"));
//! assert_eq!(normalized.fields["email"], json!("a@b.com"));
//! ```

pub mod backend;
pub mod error;
pub mod event_name;
pub mod number;
pub mod record;
pub mod schema;
pub mod status;
pub mod submission;

pub use backend::{BackendFuture, CollectionHandle, RegistrationBackend, RegistrationQuery};
pub use error::{RegistrationError, Result};
pub use event_name::EventName;
pub use number::{NumberGenerator, RandomNumberGenerator, RegistrationNumber};
pub use record::{
    ActorId, Attachment, FormResponse, InternalComment, Participant, RegistrationId, RegistrationRecord, Stamp,
    TeamMember,
};
pub use status::{NotificationKind, PaymentMethod, PaymentStatus, Priority, RegistrationStatus, Source};
pub use submission::{FileReference, Submission};

// Re-export commonly used types
pub use chrono::{DateTime, Utc};

/// Environment module - injected dependencies
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use registration_core::environment::{Clock, SystemClock};
    ///
    /// let before = chrono::Utc::now();
    /// assert!(SystemClock.now() >= before);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall-clock time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
