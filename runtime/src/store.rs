//! The registration store: creation, reads, amendments and admin
//! transitions over per-event collections.
//!
//! # Numbers
//!
//! Registration numbers come from a [`NumberGenerator`] and are not
//! guaranteed unique. The backend's unique index rejects collisions and the
//! store regenerates a bounded number of times.
//!
//! # Updates
//!
//! Every update is read, modify, compare-and-swap on the record's
//! `revision`. On a conflict the record is reloaded and the change applied
//! again, so concurrent transitions on one record all land.

use crate::config::StoreConfig;
use crate::metrics::RegistrationMetrics;
use crate::registry::CollectionRegistry;
use crate::retry::retry_with_predicate;
use registration_core::environment::{Clock, SystemClock};
use registration_core::schema::{NormalizedFields, normalize_amendment, normalize_submission};
use registration_core::submission::apply_files;
use registration_core::{
    ActorId, CollectionHandle, DateTime, EventName, InternalComment, NotificationKind, NumberGenerator,
    RandomNumberGenerator, RegistrationBackend, RegistrationError, RegistrationId, RegistrationNumber,
    PaymentStatus, RegistrationQuery, RegistrationRecord, RegistrationStatus, Result, Stamp, Submission, Utc,
};
use serde_json::{Map, Value};
use std::fmt::Display;
use std::sync::Arc;

/// Registration store over one backend.
///
/// # Example
///
/// ```
/// use registration_runtime::RegistrationStore;
/// use registration_core::{ActorId, RegistrationStatus, Submission};
/// use registration_testing::InMemoryRegistrationBackend;
/// use serde_json::json;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = RegistrationStore::new(Arc::new(InMemoryRegistrationBackend::new()));
///
/// let fields = json!({"teamName": "Alpha", "email": "a@b.com"});
/// let record = store
///     .create_registration("Tech Hunt", Submission::from_value(fields)?)
///     .await?;
/// assert!(record.registration_number.as_str().starts_with("TEC-"));
///
/// let checked_in = store
///     .mark_checked_in("Tech Hunt", record.id, ActorId::new("volunteer-1"))
///     .await?;
/// assert_eq!(checked_in.registration_status, RegistrationStatus::CheckedIn);
/// # Ok(())
/// # }
/// ```
pub struct RegistrationStore {
    backend: Arc<dyn RegistrationBackend>,
    registry: CollectionRegistry,
    clock: Arc<dyn Clock>,
    numbers: Arc<dyn NumberGenerator>,
    config: StoreConfig,
}

impl RegistrationStore {
    /// Store with the system clock, random registration numbers and
    /// default retry policies.
    #[must_use]
    pub fn new(backend: Arc<dyn RegistrationBackend>) -> Self {
        Self {
            registry: CollectionRegistry::new(Arc::clone(&backend)),
            backend,
            clock: Arc::new(SystemClock),
            numbers: Arc::new(RandomNumberGenerator),
            config: StoreConfig::default(),
        }
    }

    /// Replace the time source.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the registration-number generator.
    #[must_use]
    pub fn with_number_generator(mut self, numbers: Arc<dyn NumberGenerator>) -> Self {
        self.numbers = numbers;
        self
    }

    /// Replace the configuration.
    #[must_use]
    pub fn with_config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    /// The collection registry used by this store.
    #[must_use]
    pub const fn registry(&self) -> &CollectionRegistry {
        &self.registry
    }

    // ═══════════════════════════════════════════════════════════
    // Creation
    // ═══════════════════════════════════════════════════════════

    /// Validate and persist a new registration for `event_name`.
    ///
    /// Creates the event's collection on first use.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` for a blank event name
    /// - `Validation` when a declared field cannot be cast or an uploaded
    ///   file refers to a missing participant
    /// - `DuplicateKey` when every regenerated number collided
    /// - `Unavailable` when the backend cannot be reached
    #[tracing::instrument(level = "debug", skip(self, submission))]
    pub async fn create_registration(&self, event_name: &str, submission: Submission) -> Result<RegistrationRecord> {
        let event_name = EventName::parse(event_name)?;
        let collection = self.registry.resolve_name(&event_name).await?;

        let Submission { fields, files } = submission;
        let NormalizedFields { fields, dropped } = normalize_submission(fields)?;
        if !dropped.is_empty() {
            tracing::debug!(event = %event_name, ?dropped, "Dropped server-owned keys from submission");
        }

        let now = self.clock.now();
        let mut draft = new_record(&event_name, fields, now)?;
        apply_files(&mut draft, &files)?;

        let draft = &draft;
        let event = &event_name;
        let record = retry_with_predicate(
            self.config.number_retry.clone(),
            |_attempt| {
                let collection = CollectionHandle::clone(&collection);
                async move {
                    let mut candidate = draft.clone();
                    candidate.registration_number = self.numbers.generate(event, self.clock.now());
                    self.backend.insert(collection, candidate.clone()).await?;
                    Ok(candidate)
                }
            },
            |err: &RegistrationError| {
                if err.is_duplicate_key() {
                    RegistrationMetrics::record_collision();
                    true
                } else {
                    false
                }
            },
        )
        .await?;

        RegistrationMetrics::record_created(event_name.as_str());
        tracing::info!(
            event = %event_name,
            id = %record.id,
            registration_number = %record.registration_number,
            "Registration created"
        );
        Ok(record)
    }

    /// Like [`create_registration`](Self::create_registration), taking the
    /// event name from the payload's `eventName` field.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `eventName` is missing or not a non-blank
    /// string; otherwise as `create_registration`.
    pub async fn submit(&self, submission: Submission) -> Result<RegistrationRecord> {
        let event_name = submission.event_name()?;
        self.create_registration(event_name.as_str(), submission).await
    }

    // ═══════════════════════════════════════════════════════════
    // Reads
    // ═══════════════════════════════════════════════════════════

    /// Load a registration by id.
    ///
    /// # Errors
    ///
    /// `NotFound` if the event has no collection or the id is unknown.
    pub async fn get(&self, event_name: &str, id: RegistrationId) -> Result<RegistrationRecord> {
        let event_name = EventName::parse(event_name)?;
        let collection = self.existing_collection(&event_name, &id).await?;
        self.backend
            .fetch(collection, id)
            .await?
            .ok_or_else(|| not_found(&event_name, id))
    }

    /// Load a registration by its registration number, e.g. one scanned at
    /// the check-in desk.
    ///
    /// # Errors
    ///
    /// `NotFound` if the event has no collection or the number is unknown.
    pub async fn find_by_registration_number(&self, event_name: &str, number: &str) -> Result<RegistrationRecord> {
        let event_name = EventName::parse(event_name)?;
        let number = RegistrationNumber::new(number.trim());
        let collection = self.existing_collection(&event_name, &number).await?;
        self.backend
            .fetch_by_number(collection, number.clone())
            .await?
            .ok_or_else(|| not_found(&event_name, number))
    }

    /// List an event's registrations, newest first. Unknown events have
    /// none.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for a blank event name; backend failures.
    pub async fn list(&self, event_name: &str, query: RegistrationQuery) -> Result<Vec<RegistrationRecord>> {
        let event_name = EventName::parse(event_name)?;
        match self.registry.lookup(&event_name).await? {
            Some(collection) => self.backend.query(CollectionHandle::clone(&collection), query).await,
            None => Ok(Vec::new()),
        }
    }

    // ═══════════════════════════════════════════════════════════
    // Admin transitions
    // ═══════════════════════════════════════════════════════════

    /// Check a participant in at the venue.
    ///
    /// Sets `checkedIn`, `checkInTime`, `checkInBy` and the `checked-in`
    /// workflow status. Repeating it keeps the first time and actor.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown event or id; `ConcurrentModification` if
    /// conflicts outlast the retry policy.
    pub async fn mark_checked_in(
        &self,
        event_name: &str,
        id: RegistrationId,
        actor: ActorId,
    ) -> Result<RegistrationRecord> {
        self.update(event_name, id, "check_in", |record, now| {
            let stamped = record.check_in.mark(Stamp::new(now, actor.clone()));
            let relabelled = record.registration_status != RegistrationStatus::CheckedIn;
            record.registration_status = RegistrationStatus::CheckedIn;
            Ok(stamped || relabelled)
        })
        .await
    }

    /// Approve a registration: `confirmed` plus `approvedBy`/`approvedAt`.
    ///
    /// A confirmed record that already carries an approval is left alone.
    ///
    /// # Errors
    ///
    /// As [`mark_checked_in`](Self::mark_checked_in).
    pub async fn approve(&self, event_name: &str, id: RegistrationId, actor: ActorId) -> Result<RegistrationRecord> {
        self.update(event_name, id, "approve", |record, now| {
            if record.registration_status == RegistrationStatus::Confirmed && record.review.approved_by.is_some() {
                return Ok(false);
            }
            record.registration_status = RegistrationStatus::Confirmed;
            record.review.approved_by = Some(actor.clone());
            record.review.approved_at = Some(now);
            Ok(true)
        })
        .await
    }

    /// Mark the payment verified, whatever the workflow status. Repeating
    /// it keeps the first verification stamp.
    ///
    /// # Errors
    ///
    /// As [`mark_checked_in`](Self::mark_checked_in).
    pub async fn verify_payment(
        &self,
        event_name: &str,
        id: RegistrationId,
        actor: ActorId,
    ) -> Result<RegistrationRecord> {
        self.update(event_name, id, "verify_payment", |record, now| {
            Ok(record.payment_verification.verify(Stamp::new(now, actor.clone())))
        })
        .await
    }

    /// Move to any workflow status, stamping `reviewedBy`/`reviewedAt`.
    ///
    /// # Errors
    ///
    /// As [`mark_checked_in`](Self::mark_checked_in).
    pub async fn update_status(
        &self,
        event_name: &str,
        id: RegistrationId,
        status: RegistrationStatus,
        actor: ActorId,
    ) -> Result<RegistrationRecord> {
        self.update(event_name, id, "update_status", |record, now| {
            if record.registration_status == status {
                return Ok(false);
            }
            record.registration_status = status;
            record.review.reviewed_by = Some(actor.clone());
            record.review.reviewed_at = Some(now);
            Ok(true)
        })
        .await
    }

    /// Append an internal comment.
    ///
    /// # Errors
    ///
    /// `Validation` for a blank comment; otherwise as
    /// [`mark_checked_in`](Self::mark_checked_in).
    pub async fn add_comment(
        &self,
        event_name: &str,
        id: RegistrationId,
        actor: ActorId,
        comment: &str,
    ) -> Result<RegistrationRecord> {
        let comment = comment.trim();
        if comment.is_empty() {
            return Err(RegistrationError::validation("comment", "must not be blank"));
        }
        self.update(event_name, id, "add_comment", |record, now| {
            record.review.internal_comments.push(InternalComment {
                comment: comment.to_string(),
                added_by: actor.clone(),
                added_at: now,
            });
            Ok(true)
        })
        .await
    }

    /// Replace the admin notes (`None` clears them).
    ///
    /// # Errors
    ///
    /// As [`mark_checked_in`](Self::mark_checked_in).
    pub async fn set_admin_notes(
        &self,
        event_name: &str,
        id: RegistrationId,
        actor: ActorId,
        notes: Option<String>,
    ) -> Result<RegistrationRecord> {
        self.update(event_name, id, "admin_notes", |record, now| {
            if record.review.admin_notes == notes {
                return Ok(false);
            }
            record.review.admin_notes.clone_from(&notes);
            record.review.reviewed_by = Some(actor.clone());
            record.review.reviewed_at = Some(now);
            Ok(true)
        })
        .await
    }

    /// Record attendance. Repeating it keeps the first timestamp.
    ///
    /// # Errors
    ///
    /// As [`mark_checked_in`](Self::mark_checked_in).
    pub async fn mark_attended(&self, event_name: &str, id: RegistrationId) -> Result<RegistrationRecord> {
        self.update(event_name, id, "attended", |record, now| {
            if record.attended {
                return Ok(false);
            }
            record.attended = true;
            record.attendance_marked_at = Some(now);
            Ok(true)
        })
        .await
    }

    /// Flag an outbound notification as sent.
    ///
    /// # Errors
    ///
    /// As [`mark_checked_in`](Self::mark_checked_in).
    pub async fn record_notification(
        &self,
        event_name: &str,
        id: RegistrationId,
        kind: NotificationKind,
    ) -> Result<RegistrationRecord> {
        self.update(event_name, id, "notification", |record, now| {
            Ok(record.notifications.record(kind, now))
        })
        .await
    }

    /// Merge admin corrections into the submitted fields.
    ///
    /// Uses the submission rules, without defaults. Server-owned keys
    /// (registration number, event name, workflow and audit state) are
    /// ignored. Each amended participant is merged over the stored one at
    /// the same position, so uploaded identity files survive. A payment
    /// status change goes through [`PaymentVerification::set_status`] and is
    /// refused once the payment has been verified.
    ///
    /// [`PaymentVerification::set_status`]: registration_core::record::PaymentVerification::set_status
    ///
    /// # Errors
    ///
    /// `Validation` for fields the schema rejects or for a payment status
    /// change on a verified payment; otherwise as
    /// [`mark_checked_in`](Self::mark_checked_in).
    pub async fn amend(
        &self,
        event_name: &str,
        id: RegistrationId,
        fields: Map<String, Value>,
    ) -> Result<RegistrationRecord> {
        let NormalizedFields { mut fields, dropped } = normalize_amendment(fields)?;
        if !dropped.is_empty() {
            tracing::debug!(event = event_name, %id, ?dropped, "Ignored server-owned keys in amendment");
        }
        let payment_status = fields
            .remove("paymentStatus")
            .as_ref()
            .and_then(Value::as_str)
            .map(PaymentStatus::parse)
            .transpose()?;
        let fields = &fields;
        self.update(event_name, id, "amend", |record, _now| {
            let mut document = record.to_document()?;
            let mut changed = false;
            for (key, value) in fields {
                let value = if key == "participants" {
                    merge_participants(document.get(key), value)
                } else {
                    value.clone()
                };
                if document.get(key) != Some(&value) {
                    document.insert(key.clone(), value);
                    changed = true;
                }
            }
            if changed {
                *record = RegistrationRecord::from_document(document)
                    .map_err(|e| RegistrationError::validation("amendment", e.to_string()))?;
            }
            if let Some(status) = payment_status.filter(|status| *status != record.payment_status()) {
                if record.payment_verification.verified().is_some() {
                    return Err(RegistrationError::validation(
                        "paymentStatus",
                        "a verified payment cannot be amended",
                    ));
                }
                record.payment_verification.set_status(status)?;
                changed = true;
            }
            Ok(changed)
        })
        .await
    }

    // ═══════════════════════════════════════════════════════════
    // Internals
    // ═══════════════════════════════════════════════════════════

    async fn existing_collection(&self, event_name: &EventName, id: &impl Display) -> Result<CollectionHandle> {
        self.registry
            .lookup(event_name)
            .await?
            .map(|handle| CollectionHandle::clone(&handle))
            .ok_or_else(|| not_found(event_name, id))
    }

    /// Load, apply, compare-and-swap; reload and reapply on conflict.
    ///
    /// `apply` returns whether it changed anything; unchanged records are
    /// returned without a write.
    async fn update<F>(
        &self,
        event_name: &str,
        id: RegistrationId,
        kind: &'static str,
        apply: F,
    ) -> Result<RegistrationRecord>
    where
        F: Fn(&mut RegistrationRecord, DateTime<Utc>) -> Result<bool> + Sync,
    {
        let event_name = EventName::parse(event_name)?;
        let collection = self.existing_collection(&event_name, &id).await?;

        let apply = &apply;
        let event = &event_name;
        let record = retry_with_predicate(
            self.config.conflict_retry.clone(),
            |_attempt| {
                let collection = collection.clone();
                async move {
                    let mut record = self
                        .backend
                        .fetch(collection.clone(), id)
                        .await?
                        .ok_or_else(|| not_found(event, id))?;
                    let now = self.clock.now();
                    if !apply(&mut record, now)? {
                        return Ok(record);
                    }
                    let expected = record.revision;
                    record.revision = expected + 1;
                    record.updated_at = now;
                    self.backend.replace(collection, expected, record.clone()).await?;
                    RegistrationMetrics::record_transition(kind);
                    Ok(record)
                }
            },
            |err: &RegistrationError| {
                if err.is_concurrent_modification() {
                    RegistrationMetrics::record_conflict();
                    true
                } else {
                    false
                }
            },
        )
        .await?;

        tracing::debug!(event = %event_name, %id, kind, revision = record.revision, "Registration updated");
        Ok(record)
    }
}

impl std::fmt::Debug for RegistrationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrationStore")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Overlay amended participants on the stored ones, position by position.
fn merge_participants(stored: Option<&Value>, amended: &Value) -> Value {
    let (Some(Value::Array(stored)), Value::Array(amended)) = (stored, amended) else {
        return amended.clone();
    };
    let merged = amended
        .iter()
        .enumerate()
        .map(|(index, incoming)| match (stored.get(index), incoming) {
            (Some(Value::Object(existing)), Value::Object(changes)) => {
                let mut participant = existing.clone();
                participant.extend(changes.iter().map(|(k, v)| (k.clone(), v.clone())));
                Value::Object(participant)
            }
            _ => incoming.clone(),
        })
        .collect();
    Value::Array(merged)
}

fn not_found(event_name: &EventName, id: impl Display) -> RegistrationError {
    RegistrationError::NotFound {
        event_name: event_name.to_string(),
        id: id.to_string(),
    }
}

/// Fresh record from normalized fields; the registration number is filled
/// in per insert attempt.
fn new_record(event_name: &EventName, fields: Map<String, Value>, now: DateTime<Utc>) -> Result<RegistrationRecord> {
    let mut document = fields;
    let timestamp = serde_json::to_value(now)?;
    document.insert("id".into(), serde_json::to_value(RegistrationId::new())?);
    document.insert("registrationNumber".into(), Value::String(String::new()));
    document.insert("eventName".into(), Value::String(event_name.as_str().to_string()));
    document.insert(
        "registrationStatus".into(),
        Value::String(RegistrationStatus::Pending.as_str().to_string()),
    );
    document.insert("submittedAt".into(), timestamp.clone());
    document.insert("createdAt".into(), timestamp.clone());
    document.insert("updatedAt".into(), timestamp);
    document.insert("revision".into(), Value::from(0_u64));

    RegistrationRecord::from_document(document)
        .map_err(|e| RegistrationError::validation("submission", e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use registration_testing::{InMemoryRegistrationBackend, helpers::fields};
    use serde_json::json;

    #[test]
    fn new_record_sets_server_fields() {
        let event = EventName::parse("Tech Hunt").unwrap();
        let now = Utc::now();
        let record = new_record(&event, fields(json!({"teamName": "Alpha"})), now).unwrap();
        assert_eq!(record.event_name, event);
        assert_eq!(record.registration_status, RegistrationStatus::Pending);
        assert_eq!(record.submitted_at, now);
        assert_eq!(record.revision, 0);
        assert_eq!(record.team.team_name.as_deref(), Some("Alpha"));
    }

    #[test]
    fn malformed_declared_shapes_are_validation_errors() {
        let event = EventName::parse("Tech Hunt").unwrap();
        let err = new_record(&event, fields(json!({"tags": "not-a-list"})), Utc::now()).unwrap_err();
        assert!(err.is_user_error());
    }

    #[tokio::test]
    async fn unchanged_transition_does_not_write() {
        let store = RegistrationStore::new(Arc::new(InMemoryRegistrationBackend::new()));
        let record = store
            .create_registration("Tech Hunt", Submission::new(fields(json!({"teamName": "Alpha"}))))
            .await
            .unwrap();
        let first = store.mark_attended("Tech Hunt", record.id).await.unwrap();
        let second = store.mark_attended("Tech Hunt", record.id).await.unwrap();
        assert_eq!(first.revision, 1);
        assert_eq!(second.revision, 1);
        assert_eq!(first.attendance_marked_at, second.attendance_marked_at);
    }
}
