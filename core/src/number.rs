//! Registration number generation.
//!
//! Numbers look like `TEC-M5K2Z9QX-4QF`: an uppercase prefix of the event
//! name, the creation time in base 36, and three random base-36 characters.
//! They are not collision-proof; the backend's unique index is the final
//! arbiter and the store regenerates on conflict.

use crate::event_name::EventName;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

const BASE36_DIGITS: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Characters of the event name used as prefix.
pub const PREFIX_LEN: usize = 3;

/// Length of the random suffix.
pub const SUFFIX_LEN: usize = 3;

/// Human-readable unique identifier of a registration.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegistrationNumber(String);

impl RegistrationNumber {
    /// Wrap an existing registration number, e.g. one scanned from a QR code.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Get the number as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegistrationNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RegistrationNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Source of registration numbers.
///
/// Injected into the store so tests can script collisions.
pub trait NumberGenerator: Send + Sync {
    /// Produce a candidate number for a new registration in `event_name`.
    fn generate(&self, event_name: &EventName, now: DateTime<Utc>) -> RegistrationNumber;
}

/// Default generator: prefix, base-36 millisecond timestamp, random suffix.
///
/// # Examples
///
/// ```
/// use registration_core::{EventName, NumberGenerator, RandomNumberGenerator};
/// use chrono::Utc;
///
/// let event = EventName::parse("Tech Hunt").unwrap();
/// let number = RandomNumberGenerator.generate(&event, Utc::now());
/// assert!(number.as_str().starts_with("TEC-"));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomNumberGenerator;

impl NumberGenerator for RandomNumberGenerator {
    fn generate(&self, event_name: &EventName, now: DateTime<Utc>) -> RegistrationNumber {
        let millis = u64::try_from(now.timestamp_millis()).unwrap_or(0);
        let mut rng = rand::thread_rng();
        let suffix: String = (0..SUFFIX_LEN)
            .map(|_| char::from(BASE36_DIGITS[rng.gen_range(0..BASE36_DIGITS.len())]))
            .collect();

        RegistrationNumber(format!(
            "{}-{}-{suffix}",
            event_name.prefix(PREFIX_LEN),
            to_base36(millis)
        ))
    }
}

/// Uppercase base-36 rendering of `value`.
///
/// ```
/// use registration_core::number::to_base36;
///
/// assert_eq!(to_base36(0), "0");
/// assert_eq!(to_base36(35), "Z");
/// assert_eq!(to_base36(36), "10");
/// ```
#[must_use]
pub fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        #[allow(clippy::cast_possible_truncation)] // remainder is always < 36
        digits.push(BASE36_DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}
