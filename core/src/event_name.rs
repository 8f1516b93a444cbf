//! Event name identification.
//!
//! An [`EventName`] is the partition key of the registration store: every
//! record lives in the collection belonging to exactly one event name.

use crate::error::{RegistrationError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Normalized name of a festival event.
///
/// Construction trims surrounding whitespace and rejects names that are
/// empty afterwards, so two spellings that differ only in padding resolve to
/// the same collection.
///
/// # Examples
///
/// ```
/// use registration_core::EventName;
///
/// let name = EventName::parse("  Tech Hunt ").unwrap();
/// assert_eq!(name.as_str(), "Tech Hunt");
///
/// let parsed: EventName = "Omegatrix".parse().unwrap();
/// assert_eq!(parsed.as_str(), "Omegatrix");
///
/// assert!(EventName::parse("   ").is_err());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EventName(String);

impl EventName {
    /// Parse and normalize an event name.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::InvalidArgument`] if the name is empty
    /// after trimming.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(RegistrationError::InvalidArgument(
                "Event name must be a non-empty string".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Parse an event name taken from a JSON payload.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::InvalidArgument`] if the value is not a
    /// string or is blank.
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::String(s) => Self::parse(s),
            other => Err(RegistrationError::InvalidArgument(format!(
                "Event name must be a non-empty string, got {}",
                json_type_name(other)
            ))),
        }
    }

    /// Get the event name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First `len` characters of the name, uppercased.
    ///
    /// Used as the human-readable prefix of registration numbers.
    ///
    /// ```
    /// use registration_core::EventName;
    ///
    /// let name = EventName::parse("Tech Hunt").unwrap();
    /// assert_eq!(name.prefix(3), "TEC");
    /// ```
    #[must_use]
    pub fn prefix(&self, len: usize) -> String {
        self.0.chars().take(len).collect::<String>().to_uppercase()
    }

    /// Convert into the inner `String`.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for EventName {
    type Err = RegistrationError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for EventName {
    type Error = RegistrationError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<EventName> for String {
    fn from(name: EventName) -> Self {
        name.0
    }
}

impl AsRef<str> for EventName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

pub(crate) const fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn trims_whitespace() {
        let name = EventName::parse("\t Tech Hunt \n").unwrap();
        assert_eq!(name.as_str(), "Tech Hunt");
        assert_eq!(name, EventName::parse("Tech Hunt").unwrap());
    }

    #[test]
    fn rejects_empty_and_blank() {
        assert!(matches!(
            EventName::parse(""),
            Err(RegistrationError::InvalidArgument(_))
        ));
        assert!(matches!(
            EventName::parse("    "),
            Err(RegistrationError::InvalidArgument(_))
        ));
    }

    #[test]
    fn from_value_rejects_non_strings() {
        for value in [json!(null), json!(42), json!(["Tech Hunt"]), json!({"name": "x"})] {
            let err = EventName::from_value(&value).unwrap_err();
            assert!(matches!(err, RegistrationError::InvalidArgument(_)));
        }
        assert_eq!(
            EventName::from_value(&json!(" FIFA Mobile ")).unwrap().as_str(),
            "FIFA Mobile"
        );
    }

    #[test]
    fn prefix_handles_short_and_lowercase_names() {
        assert_eq!(EventName::parse("ai").unwrap().prefix(3), "AI");
        assert_eq!(EventName::parse("omegatrix").unwrap().prefix(3), "OME");
    }

    #[test]
    fn deserialization_normalizes() {
        let name: EventName = serde_json::from_value(json!("  Robo Race ")).unwrap();
        assert_eq!(name.as_str(), "Robo Race");
        assert!(serde_json::from_value::<EventName>(json!("  ")).is_err());
    }
}
