//! # Registration Runtime
//!
//! The registration store for a multi-event festival.
//!
//! Each event's registrations live in their own collection, created the
//! first time someone registers for that event. The store validates
//! submissions against the registration schema, allocates registration
//! numbers, and applies the admin-side lifecycle transitions (check-in,
//! approval, payment verification, review) with optimistic concurrency.
//!
//! ## Core Components
//!
//! - [`RegistrationStore`]: creation, reads, amendments and transitions
//! - [`CollectionRegistry`]: event name to collection handle cache
//! - [`StoreConfig`]: retry policies for number collisions and conflicts
//! - [`retry`]: bounded exponential backoff
//! - [`metrics`]: counters and the Prometheus exporter
//!
//! ## Example
//!
//! ```
//! use registration_core::{ActorId, RegistrationQuery, Submission};
//! use registration_runtime::RegistrationStore;
//! use registration_testing::InMemoryRegistrationBackend;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = RegistrationStore::new(Arc::new(InMemoryRegistrationBackend::new()));
//!
//! let submission = Submission::from_value(json!({
//!     "eventName": "Robo Race",
//!     "teamName": "Gearheads",
//!     "email": "lead@example.com",
//! }))?;
//! let record = store.submit(submission).await?;
//!
//! store.verify_payment("Robo Race", record.id, ActorId::new("treasurer")).await?;
//!
//! let pending = store
//!     .list("Robo Race", RegistrationQuery::all().with_email("LEAD@example.com"))
//!     .await?;
//! assert_eq!(pending.len(), 1);
//! # Ok(())
//! # }
//! ```

/// Retry logic with exponential backoff
pub mod retry;

/// Prometheus metrics for observability
pub mod metrics;

/// Store configuration
pub mod config;

/// Event collection registry
pub mod registry;

/// The registration store
pub mod store;

pub use config::StoreConfig;
pub use registry::CollectionRegistry;
pub use store::RegistrationStore;
