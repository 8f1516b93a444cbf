//! Declared field schema applied to incoming submissions.
//!
//! Registration forms differ per event, so the schema is permissive: keys it
//! does not declare pass through untouched. Declared keys are cast and
//! checked the way the festival forms have always been treated: text is
//! trimmed (and `email` lowercased), numbers and booleans are cast from
//! their string spellings, enumerations are checked against their allowed
//! set, and absent booleans get their defaults.
//!
//! Keys the server owns (identity, workflow, review and audit state) are
//! removed before anything is stored.

use crate::error::{RegistrationError, Result};
use crate::event_name::json_type_name;
use crate::record::MAX_FLAT_TEAM_MEMBER;
use crate::status::{PaymentMethod, PaymentStatus, Priority, Source};
use serde_json::{Map, Number, Value};

/// Allowed `experienceLevel` values.
pub const EXPERIENCE_LEVELS: &[&str] = &["beginner", "intermediate", "advanced", "expert", ""];

/// Allowed `tshirtSize` values.
pub const TSHIRT_SIZES: &[&str] = &["XS", "S", "M", "L", "XL", "XXL", "XXXL", ""];

/// Allowed `howDidYouHear` values.
pub const HOW_DID_YOU_HEAR: &[&str] = &[
    "social-media",
    "friend",
    "college",
    "website",
    "poster",
    "email",
    "other",
    "",
];

/// How a declared field is cast and checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Free text. Numbers and booleans are rendered as strings.
    Text {
        /// Strip surrounding whitespace
        trim: bool,
        /// Lowercase after trimming
        lowercase: bool,
    },
    /// JSON number; numeric strings are parsed.
    Number {
        /// Value filled in when the key is absent
        default: Option<i64>,
    },
    /// JSON boolean; `"true"`, `"yes"`, `"1"`, `1` and their negations are cast.
    Boolean {
        /// Value filled in when the key is absent
        default: Option<bool>,
    },
    /// One of a fixed set of strings.
    Enum {
        /// Every accepted value
        allowed: &'static [&'static str],
    },
}

/// A declared top-level field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Document key
    pub name: &'static str,
    /// Cast and validation rule
    pub kind: FieldKind,
}

const fn text(name: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        kind: FieldKind::Text {
            trim: false,
            lowercase: false,
        },
    }
}

const fn trimmed(name: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        kind: FieldKind::Text {
            trim: true,
            lowercase: false,
        },
    }
}

const fn number(name: &'static str, default: Option<i64>) -> FieldSpec {
    FieldSpec {
        name,
        kind: FieldKind::Number { default },
    }
}

const fn boolean(name: &'static str, default: bool) -> FieldSpec {
    FieldSpec {
        name,
        kind: FieldKind::Boolean {
            default: Some(default),
        },
    }
}

const fn one_of(name: &'static str, allowed: &'static [&'static str]) -> FieldSpec {
    FieldSpec {
        name,
        kind: FieldKind::Enum { allowed },
    }
}

/// Every declared top-level field except the flat `teamMember{N}…` slots,
/// which [`field_spec`] recognizes by pattern.
pub const DECLARED_FIELDS: &[FieldSpec] = &[
    // Applicant
    trimmed("fullName"),
    text("full_name"),
    FieldSpec {
        name: "email",
        kind: FieldKind::Text {
            trim: true,
            lowercase: true,
        },
    },
    text("emailAddress"),
    trimmed("phone"),
    text("contactNumber"),
    text("contact"),
    trimmed("alternatePhone"),
    trimmed("college"),
    text("collegeName"),
    trimmed("year"),
    text("yearOfStudy"),
    trimmed("department"),
    trimmed("rollNumber"),
    trimmed("studentId"),
    text("eventId"),
    // Team
    trimmed("teamName"),
    trimmed("teamSize"),
    trimmed("numberOfParticipants"),
    boolean("isTeamLeader", true),
    trimmed("teamLeaderName"),
    trimmed("teamLeaderEmail"),
    trimmed("teamLeaderPhone"),
    // Payment
    trimmed("paymentMode"),
    one_of("paymentMethod", PaymentMethod::VALUES),
    trimmed("paymentDate"),
    trimmed("transactionId"),
    number("paymentAmount", None),
    text("paymentCurrency"),
    one_of("paymentStatus", PaymentStatus::VALUES),
    // Gaming
    trimmed("fifaUsername"),
    trimmed("teamOvr"),
    trimmed("deviceModel"),
    trimmed("gameUsername"),
    trimmed("gamertag"),
    trimmed("playerRating"),
    trimmed("platformPreference"),
    // Event specific
    one_of("experienceLevel", EXPERIENCE_LEVELS),
    text("skillLevel"),
    text("dietaryRestrictions"),
    text("specialRequirements"),
    text("accessibility"),
    one_of("tshirtSize", TSHIRT_SIZES),
    one_of("howDidYouHear", HOW_DID_YOU_HEAR),
    boolean("previousParticipation", false),
    text("expectations"),
    text("additionalComments"),
    // Consent
    boolean("whatsappConfirmed", false),
    boolean("agreeToTerms", false),
    boolean("agreeToRules", false),
    boolean("consentToPhotography", false),
    boolean("consentToDataProcessing", false),
    boolean("agreeToCodeOfConduct", false),
    // Results
    number("score", Some(0)),
    number("rank", None),
    text("result"),
    boolean("certificateIssued", false),
    text("certificateUrl"),
    // Metadata
    one_of("source", Source::VALUES),
    one_of("priority", Priority::VALUES),
    text("category"),
];

/// Keys only the server may write. Dropped from submissions and amendments.
pub const SERVER_OWNED_KEYS: &[&str] = &[
    "id",
    "_id",
    "__v",
    "eventName",
    "registrationNumber",
    "registrationStatus",
    "checkedIn",
    "checkInTime",
    "checkInBy",
    "attended",
    "attendanceMarkedAt",
    "paymentVerifiedBy",
    "paymentVerifiedAt",
    "paymentReceipt",
    "paymentScreenshot",
    "cashReceipt",
    "documents",
    "approvedBy",
    "approvedAt",
    "reviewedBy",
    "reviewedAt",
    "adminNotes",
    "internalComments",
    "emailConfirmationSent",
    "emailConfirmationSentAt",
    "reminderEmailSent",
    "reminderEmailSentAt",
    "smsNotificationSent",
    "whatsappNotificationSent",
    "certificateIssuedAt",
    "submittedAt",
    "createdAt",
    "updatedAt",
    "revision",
];

const FLAT_MEMBER_ATTRIBUTES: &[&str] = &["Name", "Email", "Phone", "College", "Year", "Department"];

const PARTICIPANT_TEXT_KEYS: &[&str] = &[
    "name",
    "contact",
    "email",
    "college",
    "year",
    "department",
    "rollNumber",
    "role",
];

const PARTICIPANT_SERVER_KEYS: &[&str] = &["idFile", "idFileUrl", "idFileCloudinaryId"];

/// Look up the declared rule for a top-level key.
///
/// ```
/// use registration_core::schema::{field_spec, FieldKind};
///
/// assert!(matches!(field_spec("score").unwrap().kind, FieldKind::Number { default: Some(0) }));
/// assert!(field_spec("teamMember3Email").is_some());
/// assert!(field_spec("teamMember6Email").is_none());
/// assert!(field_spec("favoriteColor").is_none());
/// ```
#[must_use]
pub fn field_spec(name: &str) -> Option<FieldSpec> {
    if let Some(spec) = DECLARED_FIELDS.iter().find(|spec| spec.name == name) {
        return Some(*spec);
    }
    flat_member_spec(name)
}

fn flat_member_spec(name: &str) -> Option<FieldSpec> {
    let rest = name.strip_prefix("teamMember")?;
    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    let slot: usize = digits.parse().ok()?;
    if !(2..=MAX_FLAT_TEAM_MEMBER).contains(&slot) {
        return None;
    }
    let attribute = &rest[digits.len()..];
    FLAT_MEMBER_ATTRIBUTES.iter().find(|a| **a == attribute).map(|a| FieldSpec {
        // Only the kind is consulted for flat member slots.
        name: *a,
        kind: FieldKind::Text {
            trim: false,
            lowercase: false,
        },
    })
}

/// Whether `key` is written only by the server.
#[must_use]
pub fn is_server_owned(key: &str) -> bool {
    SERVER_OWNED_KEYS.contains(&key)
}

/// Submission fields after casting and validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedFields {
    /// Fields ready to be merged into a record document
    pub fields: Map<String, Value>,
    /// Keys that were removed because the server owns them
    pub dropped: Vec<String>,
}

/// Normalize a new submission, filling declared defaults.
///
/// # Errors
///
/// Returns [`RegistrationError::Validation`] naming the first field that
/// cannot be cast or is outside its allowed set, or when `paymentStatus`
/// is submitted as `verified`.
///
/// # Examples
///
/// ```
/// use registration_core::schema::normalize_submission;
/// use serde_json::json;
///
/// let raw = json!({ "email": "  A@B.com ", "agreeToTerms": "yes", "favoriteColor": "blue" });
/// let normalized = normalize_submission(raw.as_object().unwrap().clone()).unwrap();
/// assert_eq!(normalized.fields["email"], json!("a@b.com"));
/// assert_eq!(normalized.fields["agreeToTerms"], json!(true));
/// assert_eq!(normalized.fields["favoriteColor"], json!("blue"));
/// assert_eq!(normalized.fields["score"], json!(0));
/// ```
pub fn normalize_submission(fields: Map<String, Value>) -> Result<NormalizedFields> {
    normalize(fields, true)
}

/// Normalize admin corrections to an existing record. Defaults are not
/// filled, so absent keys leave the stored values alone.
///
/// # Errors
///
/// Same as [`normalize_submission`].
pub fn normalize_amendment(fields: Map<String, Value>) -> Result<NormalizedFields> {
    normalize(fields, false)
}

fn normalize(fields: Map<String, Value>, fill_defaults: bool) -> Result<NormalizedFields> {
    let mut normalized = NormalizedFields::default();

    for (key, value) in fields {
        if is_server_owned(&key) {
            normalized.dropped.push(key);
            continue;
        }
        if key == "participants" {
            let participants = normalize_participants(value, &mut normalized.dropped)?;
            normalized.fields.insert(key, participants);
            continue;
        }
        if key == "formResponses" && !matches!(value, Value::Array(_) | Value::Null) {
            return Err(RegistrationError::validation(
                "formResponses",
                format!("expected an array, got {}", json_type_name(&value)),
            ));
        }
        match field_spec(&key) {
            Some(spec) => {
                if let Some(cast) = cast_field(&key, spec.kind, value)? {
                    normalized.fields.insert(key, cast);
                }
            }
            None => {
                normalized.fields.insert(key, value);
            }
        }
    }

    if normalized.fields.get("paymentStatus").and_then(Value::as_str) == Some(PaymentStatus::Verified.as_str()) {
        return Err(RegistrationError::validation(
            "paymentStatus",
            "`verified` can only be set by payment verification",
        ));
    }

    if fill_defaults {
        for spec in DECLARED_FIELDS {
            if normalized.fields.contains_key(spec.name) {
                continue;
            }
            let default = match spec.kind {
                FieldKind::Boolean { default: Some(b) } => Value::Bool(b),
                FieldKind::Number { default: Some(n) } => Value::Number(n.into()),
                _ => continue,
            };
            normalized.fields.insert(spec.name.to_string(), default);
        }
    }

    Ok(normalized)
}

/// Cast one declared value. `Ok(None)` means the key should be treated as
/// absent.
fn cast_field(field: &str, kind: FieldKind, value: Value) -> Result<Option<Value>> {
    if value.is_null() {
        return Ok(None);
    }
    match kind {
        FieldKind::Text { trim, lowercase } => {
            let mut s = cast_text(field, value)?;
            if trim {
                s = s.trim().to_string();
            }
            if lowercase {
                s = s.to_lowercase();
            }
            Ok(Some(Value::String(s)))
        }
        FieldKind::Number { .. } => cast_number(field, &value),
        FieldKind::Boolean { .. } => cast_boolean(field, &value).map(|b| Some(Value::Bool(b))),
        FieldKind::Enum { allowed } => {
            let s = match value {
                Value::String(s) => s,
                other => {
                    return Err(RegistrationError::validation(
                        field,
                        format!("expected a string, got {}", json_type_name(&other)),
                    ));
                }
            };
            if allowed.contains(&s.as_str()) {
                Ok(Some(Value::String(s)))
            } else {
                Err(RegistrationError::validation(
                    field,
                    format!("`{s}` is not one of {}", allowed.join(", ")),
                ))
            }
        }
    }
}

fn cast_text(field: &str, value: Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(RegistrationError::validation(
            field,
            format!("expected text, got {}", json_type_name(&other)),
        )),
    }
}

fn cast_number(field: &str, value: &Value) -> Result<Option<Value>> {
    match value {
        Value::Number(_) => Ok(Some(value.clone())),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                return Ok(Some(Value::Number(i.into())));
            }
            s.parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(|n| Some(Value::Number(n)))
                .ok_or_else(|| RegistrationError::validation(field, format!("`{s}` is not a number")))
        }
        other => Err(RegistrationError::validation(
            field,
            format!("expected a number, got {}", json_type_name(other)),
        )),
    }
}

fn cast_boolean(field: &str, value: &Value) -> Result<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) if n.as_i64() == Some(1) => Ok(true),
        Value::Number(n) if n.as_i64() == Some(0) => Ok(false),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" | "on" => Ok(true),
            "false" | "no" | "0" | "off" => Ok(false),
            _ => Err(RegistrationError::validation(field, format!("`{s}` is not a boolean"))),
        },
        other => Err(RegistrationError::validation(
            field,
            format!("cannot read {other} as a boolean"),
        )),
    }
}

fn normalize_participants(value: Value, dropped: &mut Vec<String>) -> Result<Value> {
    let entries = match value {
        Value::Null => return Ok(Value::Array(Vec::new())),
        Value::Array(entries) => entries,
        // Multipart forms encode `participants[0][name]` as an index-keyed object.
        Value::Object(map) => {
            let mut indexed: Vec<(usize, Value)> = map
                .into_iter()
                .map(|(k, v)| {
                    k.parse::<usize>().map(|i| (i, v)).map_err(|_| {
                        RegistrationError::validation("participants", format!("unexpected key `{k}`"))
                    })
                })
                .collect::<Result<_>>()?;
            indexed.sort_by_key(|(i, _)| *i);
            indexed.into_iter().map(|(_, v)| v).collect()
        }
        other => {
            return Err(RegistrationError::validation(
                "participants",
                format!("expected an array, got {}", json_type_name(&other)),
            ));
        }
    };

    let mut participants = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        let Value::Object(fields) = entry else {
            return Err(RegistrationError::validation(
                format!("participants.{index}"),
                "expected an object",
            ));
        };
        let mut participant = Map::new();
        for (key, value) in fields {
            let path = format!("participants.{index}.{key}");
            if PARTICIPANT_SERVER_KEYS.contains(&key.as_str()) {
                dropped.push(path);
                continue;
            }
            let kind = if PARTICIPANT_TEXT_KEYS.contains(&key.as_str()) {
                Some(FieldKind::Text {
                    trim: false,
                    lowercase: false,
                })
            } else if key == "order" {
                Some(FieldKind::Number { default: None })
            } else {
                None
            };
            match kind {
                Some(kind) => {
                    if let Some(cast) = cast_field(&path, kind, value)? {
                        participant.insert(key, cast);
                    }
                }
                None => {
                    participant.insert(key, value);
                }
            }
        }
        participants.push(Value::Object(participant));
    }
    Ok(Value::Array(participants))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    fn field_of(err: &RegistrationError) -> &str {
        match err {
            RegistrationError::Validation { field, .. } => field,
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn trims_and_lowercases_declared_text() {
        let normalized = normalize_submission(object(json!({
            "fullName": "  Riya Sen ",
            "email": " Riya@Example.COM ",
            "teamName": " Alpha ",
            "full_name": "  untouched  ",
            "phone": 9876543210_u64,
        })))
        .unwrap();
        assert_eq!(normalized.fields["fullName"], json!("Riya Sen"));
        assert_eq!(normalized.fields["email"], json!("riya@example.com"));
        assert_eq!(normalized.fields["teamName"], json!("Alpha"));
        assert_eq!(normalized.fields["full_name"], json!("  untouched  "));
        assert_eq!(normalized.fields["phone"], json!("9876543210"));
    }

    #[test]
    fn unknown_keys_pass_through() {
        let normalized = normalize_submission(object(json!({
            "favoriteColor": "blue",
            "customAnswers": {"q1": [1, 2]},
        })))
        .unwrap();
        assert_eq!(normalized.fields["favoriteColor"], json!("blue"));
        assert_eq!(normalized.fields["customAnswers"], json!({"q1": [1, 2]}));
    }

    #[test]
    fn casts_numbers_and_booleans() {
        let normalized = normalize_submission(object(json!({
            "paymentAmount": " 250.5 ",
            "rank": "3",
            "agreeToTerms": "true",
            "consentToPhotography": 0,
            "isTeamLeader": "no",
        })))
        .unwrap();
        assert_eq!(normalized.fields["paymentAmount"], json!(250.5));
        assert_eq!(normalized.fields["rank"], json!(3));
        assert_eq!(normalized.fields["agreeToTerms"], json!(true));
        assert_eq!(normalized.fields["consentToPhotography"], json!(false));
        assert_eq!(normalized.fields["isTeamLeader"], json!(false));
    }

    #[test]
    fn fills_defaults_only_for_submissions() {
        let submission = normalize_submission(Map::new()).unwrap();
        assert_eq!(submission.fields["isTeamLeader"], json!(true));
        assert_eq!(submission.fields["previousParticipation"], json!(false));
        assert_eq!(submission.fields["score"], json!(0));
        assert!(!submission.fields.contains_key("rank"));

        let amendment = normalize_amendment(Map::new()).unwrap();
        assert!(amendment.fields.is_empty());
    }

    #[test]
    fn rejects_bad_numbers_and_booleans() {
        let err = normalize_submission(object(json!({"paymentAmount": "lots"}))).unwrap_err();
        assert_eq!(field_of(&err), "paymentAmount");
        let err = normalize_submission(object(json!({"agreeToRules": "maybe"}))).unwrap_err();
        assert_eq!(field_of(&err), "agreeToRules");
    }

    #[test]
    fn enum_violation_names_field_value_and_allowed_set() {
        let err = normalize_submission(object(json!({"tshirtSize": "XXXXL"}))).unwrap_err();
        match err {
            RegistrationError::Validation { field, message } => {
                assert_eq!(field, "tshirtSize");
                assert!(message.contains("XXXXL"));
                assert!(message.contains("XXXL"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        let err = normalize_submission(object(json!({"paymentMethod": "bitcoin"}))).unwrap_err();
        assert_eq!(field_of(&err), "paymentMethod");
    }

    #[test]
    fn empty_string_allowed_where_declared() {
        let normalized = normalize_submission(object(json!({
            "experienceLevel": "",
            "howDidYouHear": "",
        })))
        .unwrap();
        assert_eq!(normalized.fields["experienceLevel"], json!(""));
        assert!(normalize_submission(object(json!({"priority": ""}))).is_err());
    }

    #[test]
    fn null_declared_values_are_absent() {
        let normalized = normalize_amendment(object(json!({"paymentMethod": null, "score": null}))).unwrap();
        assert!(normalized.fields.is_empty());
    }

    #[test]
    fn server_owned_keys_are_dropped() {
        let normalized = normalize_submission(object(json!({
            "registrationNumber": "FAKE-1-ABC",
            "registrationStatus": "confirmed",
            "checkedIn": true,
            "revision": 99,
            "eventName": "Other",
            "teamName": "Alpha",
        })))
        .unwrap();
        assert!(!normalized.fields.contains_key("registrationNumber"));
        assert!(!normalized.fields.contains_key("checkedIn"));
        assert_eq!(normalized.fields["teamName"], json!("Alpha"));
        assert_eq!(normalized.dropped.len(), 5);
    }

    #[test]
    fn verified_payment_status_is_rejected() {
        let err = normalize_submission(object(json!({"paymentStatus": "verified"}))).unwrap_err();
        assert_eq!(field_of(&err), "paymentStatus");
        let ok = normalize_submission(object(json!({"paymentStatus": "not-required"}))).unwrap();
        assert_eq!(ok.fields["paymentStatus"], json!("not-required"));
    }

    #[test]
    fn participants_from_indexed_object() {
        let normalized = normalize_submission(object(json!({
            "participants": {
                "1": {"name": "Second", "order": "2"},
                "0": {"name": "First", "contact": 12345, "idFile": "x.png"}
            }
        })))
        .unwrap();
        assert_eq!(
            normalized.fields["participants"],
            json!([{"name": "First", "contact": "12345"}, {"name": "Second", "order": 2}])
        );
        assert_eq!(normalized.dropped, vec!["participants.0.idFile".to_string()]);
    }

    #[test]
    fn participants_must_be_objects() {
        let err = normalize_submission(object(json!({"participants": ["Alice"]}))).unwrap_err();
        assert_eq!(field_of(&err), "participants.0");
    }

    #[test]
    fn form_responses_must_be_an_array() {
        let err = normalize_submission(object(json!({"formResponses": "none"}))).unwrap_err();
        assert_eq!(field_of(&err), "formResponses");
    }

    proptest! {
        #[test]
        fn email_is_always_trimmed_lowercase(local in "[A-Za-z0-9]{1,12}", pad in " {0,3}") {
            let raw = format!("{pad}{local}@Example.Org{pad}");
            let normalized = normalize_submission(object(json!({"email": raw}))).unwrap();
            let email = normalized.fields["email"].as_str().unwrap().to_string();
            prop_assert_eq!(email, format!("{}@example.org", local.to_lowercase()));
        }

        #[test]
        fn undeclared_keys_are_untouched(key in "x[a-zA-Z]{1,10}", value in "[ -~]{0,20}") {
            let normalized = normalize_submission(object(json!({ key.clone(): value.clone() }))).unwrap();
            prop_assert_eq!(&normalized.fields[&key], &json!(value));
        }
    }
}
