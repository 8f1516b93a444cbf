//! # Registration Testing
//!
//! Testing utilities for the registration store.
//!
//! This crate provides:
//! - [`InMemoryRegistrationBackend`]: `HashMap`-backed persistence
//! - [`FixedClock`] and [`test_clock`]: deterministic time
//! - [`SequenceNumberGenerator`]: scripted registration numbers, for
//!   forcing collisions
//! - [`helpers`]: tracing bootstrap and payload builders
//!
//! ## Example
//!
//! ```
//! use registration_testing::{helpers::fields, test_clock, InMemoryRegistrationBackend};
//! use registration_core::environment::Clock;
//! use serde_json::json;
//!
//! let backend = InMemoryRegistrationBackend::new();
//! let submitted = fields(json!({"teamName": "Alpha"}));
//! assert_eq!(submitted["teamName"], json!("Alpha"));
//! assert_eq!(test_clock().now(), test_clock().now());
//! assert_eq!(backend.collection_count(), 0);
//! ```

use chrono::{DateTime, Utc};
use registration_core::environment::Clock;

pub mod backend_mocks;

/// Mock implementations of environment traits.
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use registration_core::{EventName, NumberGenerator, RegistrationNumber};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use registration_testing::mocks::FixedClock;
    /// use registration_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }

    /// Hands out scripted registration numbers in order, then repeats the
    /// last one forever.
    ///
    /// # Example
    ///
    /// ```
    /// use registration_testing::mocks::SequenceNumberGenerator;
    /// use registration_core::{EventName, NumberGenerator};
    /// use chrono::Utc;
    ///
    /// let generator = SequenceNumberGenerator::new(["TEC-1-AAA", "TEC-1-AAB"]);
    /// let event = EventName::parse("Tech Hunt").unwrap();
    /// assert_eq!(generator.generate(&event, Utc::now()).as_str(), "TEC-1-AAA");
    /// assert_eq!(generator.generate(&event, Utc::now()).as_str(), "TEC-1-AAB");
    /// assert_eq!(generator.generate(&event, Utc::now()).as_str(), "TEC-1-AAB");
    /// assert_eq!(generator.calls(), 3);
    /// ```
    #[derive(Debug)]
    pub struct SequenceNumberGenerator {
        queue: Mutex<VecDeque<RegistrationNumber>>,
        last: Mutex<Option<RegistrationNumber>>,
        calls: AtomicUsize,
    }

    impl SequenceNumberGenerator {
        /// Script the numbers to hand out.
        #[must_use]
        pub fn new<I, S>(numbers: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            Self {
                queue: Mutex::new(numbers.into_iter().map(RegistrationNumber::new).collect()),
                last: Mutex::new(None),
                calls: AtomicUsize::new(0),
            }
        }

        /// Always hand out `number`.
        #[must_use]
        pub fn constant(number: impl Into<String>) -> Self {
            Self::new([number.into()])
        }

        /// How many numbers were requested.
        #[must_use]
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl NumberGenerator for SequenceNumberGenerator {
        #[allow(clippy::unwrap_used)]
        fn generate(&self, event_name: &EventName, _now: DateTime<Utc>) -> RegistrationNumber {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut last = self.last.lock().unwrap();
            if let Some(next) = self.queue.lock().unwrap().pop_front() {
                *last = Some(next);
            }
            last.clone()
                .unwrap_or_else(|| RegistrationNumber::new(format!("{}-0-000", event_name.prefix(3))))
        }
    }
}

/// Test helpers and utilities.
pub mod helpers {
    use serde_json::{Map, Value};
    use tracing_subscriber::EnvFilter;

    /// Install a `tracing` subscriber writing to the test harness.
    ///
    /// Honors `RUST_LOG`; defaults to `warn`. Safe to call from every test.
    pub fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
            .with_test_writer()
            .try_init();
    }

    /// Turn a `json!({...})` literal into a field map.
    ///
    /// Non-objects yield an empty map.
    #[must_use]
    pub fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }
}

// Re-export commonly used items
pub use backend_mocks::InMemoryRegistrationBackend;
pub use helpers::init_tracing;
pub use mocks::{FixedClock, SequenceNumberGenerator, test_clock};

#[cfg(test)]
mod tests {
    use super::*;
    use registration_core::{EventName, NumberGenerator};

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        let time1 = clock.now();
        let time2 = clock.now();
        assert_eq!(time1, time2);
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn empty_sequence_falls_back_to_prefix() {
        let generator = SequenceNumberGenerator::new(Vec::<String>::new());
        let number = generator.generate(&EventName::parse("Omegatrix").unwrap(), test_clock().now());
        assert_eq!(number.as_str(), "OME-0-000");
    }
}
