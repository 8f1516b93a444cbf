//! `PostgreSQL` backend for the festival registration store.
//!
//! Implements [`RegistrationBackend`](registration_core::RegistrationBackend)
//! with one table per event:
//!
//! - `registration_collections` catalogs which table belongs to which event
//! - collection creation is idempotent across processes (advisory lock in a
//!   transaction)
//! - registration numbers are unique per event table
//! - updates compare-and-swap on the `revision` column
//! - connectivity failures surface as `Unavailable`
//!
//! # Example
//!
//! ```no_run
//! use registration_postgres::{PostgresConfig, PostgresRegistrationBackend};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PostgresConfig::new("postgres://localhost/festival");
//! let backend = PostgresRegistrationBackend::connect(&config).await?;
//! backend.migrate().await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod config;
mod error;
pub mod schema;

pub use backend::PostgresRegistrationBackend;
pub use config::{ConfigError, PostgresConfig};
