//! The registration record and its sub-records.
//!
//! A record serializes to one flat camelCase document. Declared fields are
//! typed; every other key lands in [`RegistrationRecord::extra`] and is
//! written back verbatim, so event-specific form fields survive without
//! schema changes.

use crate::error::{RegistrationError, Result};
use crate::event_name::EventName;
use crate::number::RegistrationNumber;
use crate::status::{NotificationKind, PaymentMethod, PaymentStatus, Priority, RegistrationStatus, Source};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier of a stored registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegistrationId(pub Uuid);

impl RegistrationId {
    /// Generate a fresh random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RegistrationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RegistrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RegistrationId {
    type Err = RegistrationError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| RegistrationError::InvalidArgument(format!("Invalid registration id `{s}`: {e}")))
    }
}

/// Identifier of the admin (or system user) performing an action.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(String);

impl ActorId {
    /// Wrap an actor identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who did something, and when.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Stamp {
    /// When the action happened
    pub at: DateTime<Utc>,
    /// Who performed it
    pub by: ActorId,
}

impl Stamp {
    /// Create a stamp.
    #[must_use]
    pub const fn new(at: DateTime<Utc>, by: ActorId) -> Self {
        Self { at, by }
    }
}

/// Reference to an uploaded file held by the file-storage collaborator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    /// Original file name, if the uploader supplied one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    /// Public URL of the stored file
    pub url: String,
    /// Storage-side identifier (for deletion or transformation)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_id: Option<String>,
}

/// One member of a team, in the participant-list representation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[allow(missing_docs)]
pub struct Participant {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub college: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roll_number: Option<String>,
    /// e.g. `leader` or `member`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
    /// Uploaded identity document
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_file: Option<Attachment>,
    /// Undeclared participant keys
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Answer to an event-specific custom question.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormResponse {
    /// Machine name, e.g. `favoriteLanguage`
    pub field_name: String,
    /// Question text shown on the form
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_label: Option<String>,
    /// Input kind, e.g. `select` or `text`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<String>,
    /// The answer, any JSON value
    #[serde(default)]
    pub value: Value,
    /// Position in the form
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
}

/// Internal admin comment. Comments are only ever appended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct InternalComment {
    pub comment: String,
    pub added_by: ActorId,
    pub added_at: DateTime<Utc>,
}

/// Client fingerprint captured at submission time.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[allow(missing_docs)]
pub struct SubmittedFrom {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub browser: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
}

/// Submitter identity. Forms disagree on field names, so alternates are
/// all declared and the accessors on [`RegistrationRecord`] pick the first
/// one present.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[allow(missing_docs)]
pub struct Applicant {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(rename = "full_name", skip_serializing_if = "Option::is_none")]
    pub full_name_alt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alternate_phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub college: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub college_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year_of_study: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roll_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
}

/// Team-level fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[allow(missing_docs)]
pub struct Team {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_participants: Option<String>,
    pub is_team_leader: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_leader_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_leader_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_leader_phone: Option<String>,
    pub participants: Vec<Participant>,
}

impl Default for Team {
    fn default() -> Self {
        Self {
            team_name: None,
            team_size: None,
            number_of_participants: None,
            is_team_leader: true,
            team_leader_name: None,
            team_leader_email: None,
            team_leader_phone: None,
            participants: Vec::new(),
        }
    }
}

/// Payment details supplied with the submission.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[allow(missing_docs)]
pub struct Payment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<PaymentMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_amount: Option<f64>,
    pub payment_currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_receipt: Option<Attachment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_screenshot: Option<Attachment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cash_receipt: Option<Attachment>,
}

impl Default for Payment {
    fn default() -> Self {
        Self {
            payment_mode: None,
            payment_method: None,
            payment_date: None,
            transaction_id: None,
            payment_amount: None,
            payment_currency: "INR".to_string(),
            payment_receipt: None,
            payment_screenshot: None,
            cash_receipt: None,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawPaymentVerification {
    payment_status: PaymentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    payment_verified_by: Option<ActorId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    payment_verified_at: Option<DateTime<Utc>>,
}

/// Payment verification sub-state.
///
/// `Verified` always carries the stamp of the admin who verified it; stored
/// documents violating that are rejected when decoded.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPaymentVerification", into = "RawPaymentVerification")]
pub struct PaymentVerification {
    status: PaymentStatus,
    verified: Option<Stamp>,
}

impl PaymentVerification {
    /// Current payment status.
    #[must_use]
    pub const fn status(&self) -> PaymentStatus {
        self.status
    }

    /// Verification stamp, present iff the status is `Verified`.
    #[must_use]
    pub const fn verified(&self) -> Option<&Stamp> {
        self.verified.as_ref()
    }

    /// Mark the payment verified. Returns `false` if it already was.
    pub fn verify(&mut self, stamp: Stamp) -> bool {
        if self.status == PaymentStatus::Verified && self.verified.is_some() {
            return false;
        }
        self.status = PaymentStatus::Verified;
        self.verified = Some(stamp);
        true
    }

    /// Move to a non-verified status, clearing any verification stamp.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::Validation`] for `Verified`, which can
    /// only be reached through [`PaymentVerification::verify`].
    pub fn set_status(&mut self, status: PaymentStatus) -> Result<()> {
        if status == PaymentStatus::Verified {
            return Err(RegistrationError::validation(
                "paymentStatus",
                "`verified` can only be set by payment verification",
            ));
        }
        self.status = status;
        self.verified = None;
        Ok(())
    }
}

impl TryFrom<RawPaymentVerification> for PaymentVerification {
    type Error = String;

    fn try_from(raw: RawPaymentVerification) -> std::result::Result<Self, String> {
        let verified = match (raw.payment_verified_at, raw.payment_verified_by) {
            (Some(at), Some(by)) => Some(Stamp::new(at, by)),
            _ => None,
        };
        if raw.payment_status == PaymentStatus::Verified && verified.is_none() {
            return Err("paymentStatus is `verified` without paymentVerifiedAt/paymentVerifiedBy".to_string());
        }
        Ok(Self {
            status: raw.payment_status,
            verified: if raw.payment_status == PaymentStatus::Verified { verified } else { None },
        })
    }
}

impl From<PaymentVerification> for RawPaymentVerification {
    fn from(value: PaymentVerification) -> Self {
        let (by, at) = value.verified.map_or((None, None), |s| (Some(s.by), Some(s.at)));
        Self {
            payment_status: value.status,
            payment_verified_by: by,
            payment_verified_at: at,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawCheckIn {
    checked_in: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    check_in_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    check_in_by: Option<ActorId>,
}

/// Check-in state. Checked in always means a time and an actor.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawCheckIn", into = "RawCheckIn")]
pub struct CheckIn {
    stamp: Option<Stamp>,
}

impl CheckIn {
    /// Whether the participant has been checked in.
    #[must_use]
    pub const fn is_checked_in(&self) -> bool {
        self.stamp.is_some()
    }

    /// First check-in stamp.
    #[must_use]
    pub const fn stamp(&self) -> Option<&Stamp> {
        self.stamp.as_ref()
    }

    /// Record a check-in. Returns `false` if already checked in; the first
    /// stamp is kept.
    pub fn mark(&mut self, stamp: Stamp) -> bool {
        if self.stamp.is_some() {
            return false;
        }
        self.stamp = Some(stamp);
        true
    }
}

impl TryFrom<RawCheckIn> for CheckIn {
    type Error = String;

    fn try_from(raw: RawCheckIn) -> std::result::Result<Self, String> {
        if !raw.checked_in {
            return Ok(Self { stamp: None });
        }
        match (raw.check_in_time, raw.check_in_by) {
            (Some(at), Some(by)) => Ok(Self {
                stamp: Some(Stamp::new(at, by)),
            }),
            _ => Err("checkedIn is true without checkInTime/checkInBy".to_string()),
        }
    }
}

impl From<CheckIn> for RawCheckIn {
    fn from(value: CheckIn) -> Self {
        match value.stamp {
            Some(stamp) => Self {
                checked_in: true,
                check_in_time: Some(stamp.at),
                check_in_by: Some(stamp.by),
            },
            None => Self::default(),
        }
    }
}

/// Delivery flags for outbound messages.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[allow(missing_docs)]
pub struct Notifications {
    pub email_confirmation_sent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_confirmation_sent_at: Option<DateTime<Utc>>,
    pub reminder_email_sent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reminder_email_sent_at: Option<DateTime<Utc>>,
    pub sms_notification_sent: bool,
    pub whatsapp_notification_sent: bool,
}

impl Notifications {
    /// Flag a notification as sent. Returns `false` if it already was.
    pub fn record(&mut self, kind: NotificationKind, at: DateTime<Utc>) -> bool {
        let (flag, timestamp) = match kind {
            NotificationKind::EmailConfirmation => {
                (&mut self.email_confirmation_sent, Some(&mut self.email_confirmation_sent_at))
            }
            NotificationKind::ReminderEmail => (&mut self.reminder_email_sent, Some(&mut self.reminder_email_sent_at)),
            NotificationKind::Sms => (&mut self.sms_notification_sent, None),
            NotificationKind::Whatsapp => (&mut self.whatsapp_notification_sent, None),
        };
        if *flag {
            return false;
        }
        *flag = true;
        if let Some(timestamp) = timestamp {
            *timestamp = Some(at);
        }
        true
    }
}

/// Admin review state.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[allow(missing_docs)]
pub struct Review {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_notes: Option<String>,
    pub internal_comments: Vec<InternalComment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewed_by: Option<ActorId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<ActorId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
}

/// Unified view of one team member, whichever representation the form used.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct TeamMember {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub college: Option<String>,
    pub year: Option<String>,
    pub department: Option<String>,
    pub role: Option<String>,
}

/// Highest flat `teamMember{N}…` slot declared by the schema.
pub const MAX_FLAT_TEAM_MEMBER: usize = 5;

/// One registration submission for one event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct RegistrationRecord {
    pub id: RegistrationId,
    pub registration_number: RegistrationNumber,
    pub event_name: EventName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,

    #[serde(flatten)]
    pub applicant: Applicant,
    #[serde(flatten)]
    pub team: Team,
    #[serde(flatten)]
    pub payment: Payment,
    #[serde(flatten)]
    pub payment_verification: PaymentVerification,

    #[serde(default)]
    pub form_responses: Vec<FormResponse>,
    /// Non-payment uploads keyed by form field (`idProof`, `resume`, ...)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub documents: BTreeMap<String, Attachment>,

    #[serde(default)]
    pub registration_status: RegistrationStatus,
    #[serde(flatten)]
    pub check_in: CheckIn,
    #[serde(default)]
    pub attended: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attendance_marked_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub notifications: Notifications,
    #[serde(flatten)]
    pub review: Review,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_from: Option<SubmittedFrom>,
    #[serde(default)]
    pub source: Source,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    pub submitted_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub revision: u64,

    /// Every undeclared key, stored and returned verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RegistrationRecord {
    /// Decode a flat document.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if a declared field has the wrong
    /// shape or a state invariant is violated.
    pub fn from_document(document: Map<String, Value>) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_value(Value::Object(document))
    }

    /// Encode into one flat document.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::Internal`] if encoding fails.
    pub fn to_document(&self) -> Result<Map<String, Value>> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(RegistrationError::Internal(format!(
                "Record encoded to a non-object: {other}"
            ))),
        }
    }

    /// Submitter name, whichever field the form used.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        first_present(&[&self.applicant.full_name, &self.applicant.full_name_alt])
    }

    /// Submitter email, whichever field the form used.
    #[must_use]
    pub fn primary_email(&self) -> Option<&str> {
        first_present(&[&self.applicant.email, &self.applicant.email_address])
    }

    /// Submitter phone, whichever field the form used.
    #[must_use]
    pub fn primary_phone(&self) -> Option<&str> {
        first_present(&[
            &self.applicant.phone,
            &self.applicant.contact_number,
            &self.applicant.contact,
        ])
    }

    /// Submitter college, whichever field the form used.
    #[must_use]
    pub fn primary_college(&self) -> Option<&str> {
        first_present(&[&self.applicant.college, &self.applicant.college_name])
    }

    /// Current payment status.
    #[must_use]
    pub const fn payment_status(&self) -> PaymentStatus {
        self.payment_verification.status()
    }

    /// Whether the participant has been checked in.
    #[must_use]
    pub const fn is_checked_in(&self) -> bool {
        self.check_in.is_checked_in()
    }

    /// Team members in order.
    ///
    /// Uses the participant list when the form sent one; otherwise the team
    /// leader (from the applicant or team-leader fields) followed by the flat
    /// `teamMember2…teamMember5` fields.
    #[must_use]
    pub fn team_members(&self) -> Vec<TeamMember> {
        if !self.team.participants.is_empty() {
            let mut participants: Vec<&Participant> = self.team.participants.iter().collect();
            participants.sort_by_key(|p| p.order.unwrap_or(i64::MAX));
            return participants
                .into_iter()
                .map(|p| TeamMember {
                    name: p.name.clone(),
                    email: p.email.clone(),
                    phone: p.contact.clone(),
                    college: p.college.clone(),
                    year: p.year.clone(),
                    department: p.department.clone(),
                    role: p.role.clone(),
                })
                .collect();
        }

        let leader = TeamMember {
            name: self.team.team_leader_name.clone().or_else(|| self.display_name().map(str::to_string)),
            email: self.team.team_leader_email.clone().or_else(|| self.primary_email().map(str::to_string)),
            phone: self.team.team_leader_phone.clone().or_else(|| self.primary_phone().map(str::to_string)),
            college: self.primary_college().map(str::to_string),
            year: self.applicant.year.clone().or_else(|| self.applicant.year_of_study.clone()),
            department: self.applicant.department.clone(),
            role: Some("leader".to_string()),
        };

        let mut members = Vec::new();
        if leader.name.is_some() || leader.email.is_some() {
            members.push(leader);
        }
        for slot in 2..=MAX_FLAT_TEAM_MEMBER {
            let member = TeamMember {
                name: self.flat_member_field(slot, "Name"),
                email: self.flat_member_field(slot, "Email"),
                phone: self.flat_member_field(slot, "Phone"),
                college: self.flat_member_field(slot, "College"),
                year: self.flat_member_field(slot, "Year"),
                department: self.flat_member_field(slot, "Department"),
                role: Some("member".to_string()),
            };
            if member.name.is_some() || member.email.is_some() || member.phone.is_some() {
                members.push(member);
            }
        }
        members
    }

    fn flat_member_field(&self, slot: usize, attribute: &str) -> Option<String> {
        self.extra
            .get(&format!("teamMember{slot}{attribute}"))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }
}

fn first_present<'a>(candidates: &[&'a Option<String>]) -> Option<&'a str> {
    candidates
        .iter()
        .filter_map(|c| c.as_deref())
        .find(|s| !s.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base_document() -> Map<String, Value> {
        let value = json!({
            "id": "7f1c8e1e-3a38-4d35-8a3f-2c1b1d7f0e11",
            "registrationNumber": "TEC-M5D4RUO0-A1B",
            "eventName": "Tech Hunt",
            "submittedAt": "2025-01-01T00:00:00Z",
            "createdAt": "2025-01-01T00:00:00Z",
            "updatedAt": "2025-01-01T00:00:00Z",
        });
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn defaults_match_declared_schema() {
        let record = RegistrationRecord::from_document(base_document()).unwrap();
        assert_eq!(record.registration_status, RegistrationStatus::Pending);
        assert_eq!(record.payment_status(), PaymentStatus::Pending);
        assert_eq!(record.payment.payment_currency, "INR");
        assert!(record.team.is_team_leader);
        assert!(!record.is_checked_in());
        assert_eq!(record.source, Source::Web);
        assert_eq!(record.priority, Priority::Normal);
        assert_eq!(record.revision, 0);
    }

    #[test]
    fn unknown_keys_round_trip_verbatim() {
        let mut doc = base_document();
        doc.insert("favoriteColor".into(), json!("blue"));
        doc.insert("customField1".into(), json!({"nested": [1, 2, 3]}));
        doc.insert("teamName".into(), json!("Alpha"));

        let record = RegistrationRecord::from_document(doc).unwrap();
        assert_eq!(record.team.team_name.as_deref(), Some("Alpha"));
        assert_eq!(record.extra.get("favoriteColor"), Some(&json!("blue")));
        assert!(!record.extra.contains_key("teamName"));

        let encoded = record.to_document().unwrap();
        assert_eq!(encoded.get("favoriteColor"), Some(&json!("blue")));
        assert_eq!(encoded.get("customField1"), Some(&json!({"nested": [1, 2, 3]})));
        assert_eq!(encoded.get("teamName"), Some(&json!("Alpha")));

        let decoded = RegistrationRecord::from_document(encoded).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn checked_in_without_stamp_is_rejected() {
        let mut doc = base_document();
        doc.insert("checkedIn".into(), json!(true));
        assert!(RegistrationRecord::from_document(doc).is_err());
    }

    #[test]
    fn verified_payment_without_stamp_is_rejected() {
        let mut doc = base_document();
        doc.insert("paymentStatus".into(), json!("verified"));
        assert!(RegistrationRecord::from_document(doc.clone()).is_err());

        doc.insert("paymentVerifiedAt".into(), json!("2025-01-02T10:00:00Z"));
        doc.insert("paymentVerifiedBy".into(), json!("admin-1"));
        let record = RegistrationRecord::from_document(doc).unwrap();
        assert_eq!(record.payment_status(), PaymentStatus::Verified);
        assert_eq!(record.payment_verification.verified().unwrap().by.as_str(), "admin-1");
    }

    #[test]
    fn check_in_stamp_serializes_flat() {
        let mut record = RegistrationRecord::from_document(base_document()).unwrap();
        let at = DateTime::parse_from_rfc3339("2025-02-01T09:00:00Z").unwrap().with_timezone(&Utc);
        assert!(record.check_in.mark(Stamp::new(at, ActorId::new("volunteer-7"))));
        assert!(!record.check_in.mark(Stamp::new(Utc::now(), ActorId::new("someone-else"))));

        let doc = record.to_document().unwrap();
        assert_eq!(doc.get("checkedIn"), Some(&json!(true)));
        assert_eq!(doc.get("checkInBy"), Some(&json!("volunteer-7")));
        assert!(doc.contains_key("checkInTime"));
    }

    #[test]
    fn alternate_identity_fields_resolve() {
        let mut doc = base_document();
        doc.insert("full_name".into(), json!("Riya Sen"));
        doc.insert("emailAddress".into(), json!("riya@example.com"));
        doc.insert("contactNumber".into(), json!("9876543210"));
        doc.insert("collegeName".into(), json!("BPPIMT"));
        let record = RegistrationRecord::from_document(doc).unwrap();
        assert_eq!(record.display_name(), Some("Riya Sen"));
        assert_eq!(record.primary_email(), Some("riya@example.com"));
        assert_eq!(record.primary_phone(), Some("9876543210"));
        assert_eq!(record.primary_college(), Some("BPPIMT"));
    }

    #[test]
    fn team_members_from_flat_fields() {
        let mut doc = base_document();
        doc.insert("teamLeaderName".into(), json!("Arjun"));
        doc.insert("teamMember2Name".into(), json!("Bela"));
        doc.insert("teamMember2Email".into(), json!("bela@example.com"));
        doc.insert("teamMember4Name".into(), json!("Dev"));
        let record = RegistrationRecord::from_document(doc).unwrap();

        let members = record.team_members();
        let names: Vec<_> = members.iter().map(|m| m.name.as_deref().unwrap()).collect();
        assert_eq!(names, vec!["Arjun", "Bela", "Dev"]);
        assert_eq!(members[0].role.as_deref(), Some("leader"));
    }

    #[test]
    fn team_members_prefer_participant_list() {
        let mut doc = base_document();
        doc.insert("teamMember2Name".into(), json!("Ignored"));
        doc.insert(
            "participants".into(),
            json!([
                {"name": "Second", "order": 2, "role": "member"},
                {"name": "First", "order": 1, "role": "leader", "tshirt": "M"}
            ]),
        );
        let record = RegistrationRecord::from_document(doc).unwrap();
        let names: Vec<_> = record
            .team_members()
            .into_iter()
            .map(|m| m.name.unwrap())
            .collect();
        assert_eq!(names, vec!["First", "Second"]);
        assert_eq!(record.team.participants[1].extra.get("tshirt"), Some(&json!("M")));
    }

    #[test]
    fn notifications_record_once() {
        let mut notifications = Notifications::default();
        let at = Utc::now();
        assert!(notifications.record(NotificationKind::EmailConfirmation, at));
        assert!(!notifications.record(NotificationKind::EmailConfirmation, at));
        assert_eq!(notifications.email_confirmation_sent_at, Some(at));
        assert!(notifications.record(NotificationKind::Sms, at));
        assert!(notifications.sms_notification_sent);
    }

    #[test]
    fn payment_status_cannot_be_set_to_verified_directly() {
        let mut verification = PaymentVerification::default();
        assert!(verification.set_status(PaymentStatus::Verified).is_err());
        verification.set_status(PaymentStatus::NotRequired).unwrap();
        assert_eq!(verification.status(), PaymentStatus::NotRequired);
    }
}
