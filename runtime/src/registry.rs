//! Event name to collection handle registry.
//!
//! The first registration for a new event creates its collection; every
//! later call is served from an in-process cache. The backend stays the
//! source of truth: clearing the cache only costs a lookup.

use crate::metrics::RegistrationMetrics;
use registration_core::{CollectionHandle, EventName, RegistrationBackend, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Lazily populated map from event name to collection handle.
///
/// Reads take a shared lock. Creation is serialized by a separate mutex and
/// re-checks the cache after acquiring it, so concurrent first-time
/// resolutions of the same event reach the backend once and share one
/// handle.
///
/// # Example
///
/// ```
/// use registration_runtime::CollectionRegistry;
/// use registration_testing::InMemoryRegistrationBackend;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let registry = CollectionRegistry::new(Arc::new(InMemoryRegistrationBackend::new()));
///
/// let first = registry.resolve(" Tech Hunt ").await?;
/// let second = registry.resolve("Tech Hunt").await?;
/// assert!(Arc::ptr_eq(&first, &second));
/// # Ok(())
/// # }
/// ```
pub struct CollectionRegistry {
    backend: Arc<dyn RegistrationBackend>,
    cache: RwLock<HashMap<EventName, Arc<CollectionHandle>>>,
    creation: Mutex<()>,
}

impl CollectionRegistry {
    /// Create an empty registry over `backend`.
    #[must_use]
    pub fn new(backend: Arc<dyn RegistrationBackend>) -> Self {
        Self {
            backend,
            cache: RwLock::new(HashMap::new()),
            creation: Mutex::new(()),
        }
    }

    /// Resolve a raw event name, creating its collection if needed.
    ///
    /// # Errors
    ///
    /// - [`RegistrationError::InvalidArgument`](registration_core::RegistrationError::InvalidArgument)
    ///   if the name is blank
    /// - whatever the backend reports while opening or creating
    pub async fn resolve(&self, event_name: &str) -> Result<Arc<CollectionHandle>> {
        let event_name = EventName::parse(event_name)?;
        self.resolve_name(&event_name).await
    }

    /// Resolve an event name taken from a JSON payload.
    ///
    /// # Errors
    ///
    /// Same as [`resolve`](Self::resolve), plus `InvalidArgument` for
    /// non-string values.
    pub async fn resolve_value(&self, event_name: &Value) -> Result<Arc<CollectionHandle>> {
        let event_name = EventName::from_value(event_name)?;
        self.resolve_name(&event_name).await
    }

    /// Resolve a normalized event name, creating its collection if needed.
    ///
    /// # Errors
    ///
    /// Whatever the backend reports while opening or creating.
    pub async fn resolve_name(&self, event_name: &EventName) -> Result<Arc<CollectionHandle>> {
        if let Some(handle) = self.cached(event_name).await {
            return Ok(handle);
        }

        let _creation = self.creation.lock().await;
        if let Some(handle) = self.cached(event_name).await {
            return Ok(handle);
        }

        let handle = if let Some(existing) = self.backend.open_collection(event_name.clone()).await? {
            tracing::debug!(event = %event_name, collection = existing.name(), "Opened existing collection");
            existing
        } else {
            let created = self.backend.create_collection(event_name.clone()).await?;
            RegistrationMetrics::record_collection_created();
            tracing::info!(event = %event_name, collection = created.name(), "Created event collection");
            created
        };

        Ok(self.remember(event_name, handle).await)
    }

    /// Find an event's collection without creating it.
    ///
    /// # Errors
    ///
    /// Whatever the backend reports while opening.
    pub async fn lookup(&self, event_name: &EventName) -> Result<Option<Arc<CollectionHandle>>> {
        if let Some(handle) = self.cached(event_name).await {
            return Ok(Some(handle));
        }
        match self.backend.open_collection(event_name.clone()).await? {
            Some(handle) => Ok(Some(self.remember(event_name, handle).await)),
            None => Ok(None),
        }
    }

    /// Event names currently cached, sorted.
    pub async fn cached_events(&self) -> Vec<EventName> {
        let mut names: Vec<EventName> = self.cache.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Drop every cached handle.
    pub async fn clear(&self) {
        self.cache.write().await.clear();
    }

    /// Number of cached handles.
    pub async fn len(&self) -> usize {
        self.cache.read().await.len()
    }

    /// Whether nothing is cached.
    pub async fn is_empty(&self) -> bool {
        self.cache.read().await.is_empty()
    }

    async fn cached(&self, event_name: &EventName) -> Option<Arc<CollectionHandle>> {
        self.cache.read().await.get(event_name).cloned()
    }

    /// Cache `handle` unless another task got there first; returns the
    /// cached one either way.
    async fn remember(&self, event_name: &EventName, handle: CollectionHandle) -> Arc<CollectionHandle> {
        let mut cache = self.cache.write().await;
        Arc::clone(
            cache
                .entry(event_name.clone())
                .or_insert_with(|| Arc::new(handle)),
        )
    }
}

impl std::fmt::Debug for CollectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionRegistry").finish_non_exhaustive()
    }
}
