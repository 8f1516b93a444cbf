//! In-memory registration backend for fast, deterministic tests.
//!
//! Records are stored as flat JSON documents, exactly as a document database
//! would hold them, so every round trip exercises the record's serialization
//! and the extension bag.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Lock poisoning only happens after a test already panicked

use registration_core::{
    BackendFuture, CollectionHandle, EventName, RegistrationBackend, RegistrationError, RegistrationId,
    RegistrationNumber, RegistrationQuery, RegistrationRecord, Result,
};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

#[derive(Debug, Default)]
struct Collection {
    handle_name: String,
    documents: HashMap<RegistrationId, Map<String, Value>>,
    numbers: HashMap<RegistrationNumber, RegistrationId>,
}

/// In-memory [`RegistrationBackend`].
///
/// Supports simulated latency (to widen race windows in concurrency tests)
/// and an offline switch (to test `Unavailable` propagation).
///
/// # Example
///
/// ```
/// use registration_testing::InMemoryRegistrationBackend;
/// use registration_core::{EventName, RegistrationBackend};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = InMemoryRegistrationBackend::new();
/// let event = EventName::parse("Tech Hunt")?;
///
/// assert!(backend.open_collection(event.clone()).await?.is_none());
/// let handle = backend.create_collection(event.clone()).await?;
/// assert_eq!(backend.open_collection(event).await?, Some(handle));
/// assert_eq!(backend.collection_count(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryRegistrationBackend {
    collections: Arc<RwLock<HashMap<EventName, Collection>>>,
    latency: Option<Duration>,
    offline: Arc<AtomicBool>,
    create_calls: Arc<AtomicUsize>,
}

impl InMemoryRegistrationBackend {
    /// Create an empty backend
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep for `latency` at the start of every operation.
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make every subsequent operation fail with `Unavailable` (or recover).
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of physical collections.
    #[must_use]
    pub fn collection_count(&self) -> usize {
        self.collections.read().unwrap().len()
    }

    /// How many times `create_collection` was called.
    #[must_use]
    pub fn create_collection_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    /// Number of records stored for `event_name` (0 if it has no collection).
    #[must_use]
    pub fn record_count(&self, event_name: &EventName) -> usize {
        self.collections
            .read()
            .unwrap()
            .get(event_name)
            .map_or(0, |c| c.documents.len())
    }

    /// Raw stored document, for asserting on the persisted shape.
    #[must_use]
    pub fn raw_document(&self, event_name: &EventName, id: RegistrationId) -> Option<Map<String, Value>> {
        self.collections
            .read()
            .unwrap()
            .get(event_name)
            .and_then(|c| c.documents.get(&id).cloned())
    }

    /// Overwrite a stored document, bypassing all checks.
    ///
    /// Used to plant corrupt data.
    pub fn put_raw_document(&self, event_name: &EventName, id: RegistrationId, document: Map<String, Value>) {
        if let Some(collection) = self.collections.write().unwrap().get_mut(event_name) {
            collection.documents.insert(id, document);
        }
    }

    async fn enter(&self) -> Result<()> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(RegistrationError::Unavailable(
                "in-memory backend is offline".to_string(),
            ));
        }
        Ok(())
    }

    fn missing_collection(handle: &CollectionHandle) -> RegistrationError {
        RegistrationError::Internal(format!("collection {handle} does not exist"))
    }
}

fn decode(document: &Map<String, Value>) -> Result<RegistrationRecord> {
    RegistrationRecord::from_document(document.clone())
        .map_err(|e| RegistrationError::Internal(format!("stored document is corrupt: {e}")))
}

fn collection_name(event_name: &EventName) -> String {
    let slug: String = event_name
        .as_str()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    format!("registrations_{slug}")
}

impl RegistrationBackend for InMemoryRegistrationBackend {
    fn open_collection(&self, event_name: EventName) -> BackendFuture<'_, Option<CollectionHandle>> {
        Box::pin(async move {
            self.enter().await?;
            let collections = self.collections.read().unwrap();
            Ok(collections
                .get(&event_name)
                .map(|c| CollectionHandle::new(event_name.clone(), c.handle_name.clone())))
        })
    }

    fn create_collection(&self, event_name: EventName) -> BackendFuture<'_, CollectionHandle> {
        Box::pin(async move {
            self.create_calls.fetch_add(1, Ordering::SeqCst);
            self.enter().await?;
            let mut collections = self.collections.write().unwrap();
            let collection = collections.entry(event_name.clone()).or_insert_with(|| Collection {
                handle_name: collection_name(&event_name),
                ..Collection::default()
            });
            Ok(CollectionHandle::new(event_name, collection.handle_name.clone()))
        })
    }

    fn insert(&self, handle: CollectionHandle, record: RegistrationRecord) -> BackendFuture<'_, ()> {
        Box::pin(async move {
            self.enter().await?;
            let document = record.to_document()?;
            let mut collections = self.collections.write().unwrap();
            let collection = collections
                .get_mut(handle.event_name())
                .ok_or_else(|| Self::missing_collection(&handle))?;
            if collection.numbers.contains_key(&record.registration_number) {
                return Err(RegistrationError::DuplicateKey {
                    event_name: handle.event_name().to_string(),
                    registration_number: record.registration_number.to_string(),
                });
            }
            collection.numbers.insert(record.registration_number.clone(), record.id);
            collection.documents.insert(record.id, document);
            Ok(())
        })
    }

    fn fetch(&self, handle: CollectionHandle, id: RegistrationId) -> BackendFuture<'_, Option<RegistrationRecord>> {
        Box::pin(async move {
            self.enter().await?;
            let collections = self.collections.read().unwrap();
            collections
                .get(handle.event_name())
                .and_then(|c| c.documents.get(&id))
                .map(decode)
                .transpose()
        })
    }

    fn fetch_by_number(
        &self,
        handle: CollectionHandle,
        number: RegistrationNumber,
    ) -> BackendFuture<'_, Option<RegistrationRecord>> {
        Box::pin(async move {
            self.enter().await?;
            let collections = self.collections.read().unwrap();
            collections
                .get(handle.event_name())
                .and_then(|c| c.numbers.get(&number).and_then(|id| c.documents.get(id)))
                .map(decode)
                .transpose()
        })
    }

    fn replace(
        &self,
        handle: CollectionHandle,
        expected_revision: u64,
        record: RegistrationRecord,
    ) -> BackendFuture<'_, ()> {
        Box::pin(async move {
            self.enter().await?;
            let document = record.to_document()?;
            let mut collections = self.collections.write().unwrap();
            let collection = collections
                .get_mut(handle.event_name())
                .ok_or_else(|| Self::missing_collection(&handle))?;
            let stored = collection
                .documents
                .get(&record.id)
                .ok_or_else(|| RegistrationError::NotFound {
                    event_name: handle.event_name().to_string(),
                    id: record.id.to_string(),
                })?;
            let stored_revision = stored.get("revision").and_then(Value::as_u64).unwrap_or(0);
            if stored_revision != expected_revision {
                return Err(RegistrationError::ConcurrentModification {
                    id: record.id.to_string(),
                    expected: expected_revision,
                });
            }
            if let Some(owner) = collection.numbers.get(&record.registration_number) {
                if *owner != record.id {
                    return Err(RegistrationError::DuplicateKey {
                        event_name: handle.event_name().to_string(),
                        registration_number: record.registration_number.to_string(),
                    });
                }
            }
            collection.documents.insert(record.id, document);
            Ok(())
        })
    }

    fn query(&self, handle: CollectionHandle, query: RegistrationQuery) -> BackendFuture<'_, Vec<RegistrationRecord>> {
        Box::pin(async move {
            self.enter().await?;
            let collections = self.collections.read().unwrap();
            let Some(collection) = collections.get(handle.event_name()) else {
                return Ok(Vec::new());
            };
            let mut records = collection
                .documents
                .values()
                .map(decode)
                .collect::<Result<Vec<_>>>()?;
            records.retain(|r| query.matches(r));
            records.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at).then_with(|| a.id.cmp(&b.id)));
            if let Some(limit) = query.limit {
                records.truncate(limit);
            }
            Ok(records)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use registration_core::RegistrationStatus;
    use serde_json::json;

    fn record(number: &str) -> RegistrationRecord {
        serde_json::from_value(json!({
            "id": uuid_for(number),
            "registrationNumber": number,
            "eventName": "Tech Hunt",
            "favoriteColor": "blue",
            "submittedAt": "2025-01-01T00:00:00Z",
            "createdAt": "2025-01-01T00:00:00Z",
            "updatedAt": "2025-01-01T00:00:00Z",
        }))
        .unwrap()
    }

    fn uuid_for(number: &str) -> String {
        let suffix: u32 = number.bytes().map(u32::from).sum();
        format!("00000000-0000-4000-8000-{suffix:012}")
    }

    async fn setup() -> (InMemoryRegistrationBackend, CollectionHandle) {
        let backend = InMemoryRegistrationBackend::new();
        let handle = backend
            .create_collection(EventName::parse("Tech Hunt").unwrap())
            .await
            .unwrap();
        (backend, handle)
    }

    #[tokio::test]
    async fn create_collection_is_idempotent() {
        let (backend, first) = setup().await;
        let second = backend
            .create_collection(EventName::parse("Tech Hunt").unwrap())
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(backend.collection_count(), 1);
        assert_eq!(backend.create_collection_calls(), 2);
    }

    #[tokio::test]
    async fn duplicate_numbers_are_rejected() {
        let (backend, handle) = setup().await;
        backend.insert(handle.clone(), record("TEC-1-AAA")).await.unwrap();
        let mut clash = record("TEC-1-AAB");
        clash.registration_number = RegistrationNumber::new("TEC-1-AAA");
        let err = backend.insert(handle, clash).await.unwrap_err();
        assert!(err.is_duplicate_key());
    }

    #[tokio::test]
    async fn documents_keep_extra_fields() {
        let (backend, handle) = setup().await;
        let r = record("TEC-1-AAA");
        backend.insert(handle.clone(), r.clone()).await.unwrap();
        let raw = backend.raw_document(handle.event_name(), r.id).unwrap();
        assert_eq!(raw.get("favoriteColor"), Some(&json!("blue")));
        let loaded = backend
            .fetch_by_number(handle, r.registration_number.clone())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded, r);
    }

    #[tokio::test]
    async fn replace_checks_revision() {
        let (backend, handle) = setup().await;
        let mut r = record("TEC-1-AAA");
        backend.insert(handle.clone(), r.clone()).await.unwrap();

        r.revision = 1;
        r.registration_status = RegistrationStatus::Confirmed;
        backend.replace(handle.clone(), 0, r.clone()).await.unwrap();

        let err = backend.replace(handle.clone(), 0, r.clone()).await.unwrap_err();
        assert!(err.is_concurrent_modification());

        let loaded = backend.fetch(handle, r.id).await.unwrap().unwrap();
        assert_eq!(loaded.registration_status, RegistrationStatus::Confirmed);
        assert_eq!(loaded.revision, 1);
    }

    #[tokio::test]
    async fn replace_unknown_record_is_not_found() {
        let (backend, handle) = setup().await;
        let err = backend.replace(handle, 0, record("TEC-1-AAA")).await.unwrap_err();
        assert!(matches!(err, RegistrationError::NotFound { .. }));
    }

    #[tokio::test]
    async fn offline_backend_is_unavailable() {
        let (backend, handle) = setup().await;
        backend.set_offline(true);
        let err = backend.fetch(handle.clone(), RegistrationId::new()).await.unwrap_err();
        assert_eq!(err.http_status(), 503);
        backend.set_offline(false);
        assert!(backend.fetch(handle, RegistrationId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_documents_surface_as_internal() {
        let (backend, handle) = setup().await;
        let r = record("TEC-1-AAA");
        backend.insert(handle.clone(), r.clone()).await.unwrap();
        let mut raw = backend.raw_document(handle.event_name(), r.id).unwrap();
        raw.insert("checkedIn".into(), json!(true));
        backend.put_raw_document(handle.event_name(), r.id, raw);

        let err = backend.fetch(handle, r.id).await.unwrap_err();
        assert!(matches!(err, RegistrationError::Internal(_)));
    }
}
