//! Client context for one server session
//!
//! Owns everything the UI layer shares for a session: the remote session,
//! the schema loader, the object cache, the event bus and the async reader.
//! Created at login and torn down with `shutdown()`.

use crate::async_reader::AsyncReader;
use crate::cache::ObjectCache;
use crate::config::ClientConfig;
use crate::error::CoreError;
use crate::event::{DataEvent, EventBus};
use crate::listing::ObjectListing;
use crate::loader::Loader;
use crate::session::{remote_call, DirectorySession};
use dircache_types::{ObjectHandle, ObjectId, ObjectQuery, TypeId};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};

/// Shared state for one logged-in session
pub struct ClientContext {
    session: Arc<dyn DirectorySession>,
    config: ClientConfig,
    loader: Loader,
    cache: ObjectCache,
    event_bus: EventBus,
    reader: Mutex<Option<AsyncReader>>,
}

impl ClientContext {
    /// Create the context and start loading the schema
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(session: Arc<dyn DirectorySession>, config: ClientConfig) -> Self {
        let event_bus = EventBus::new(config.event_bus_capacity);
        let loader = Loader::start(Arc::clone(&session), &config, event_bus.clone());

        Self {
            session,
            config,
            loader,
            cache: ObjectCache::new(),
            event_bus,
            reader: Mutex::new(None),
        }
    }

    /// Create with default configuration
    pub fn with_defaults(session: Arc<dyn DirectorySession>) -> Self {
        Self::new(session, ClientConfig::default())
    }

    pub fn loader(&self) -> &Loader {
        &self.loader
    }

    pub fn cache(&self) -> &ObjectCache {
        &self.cache
    }

    /// Get the event bus for subscribing to updates
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // ===================
    // Object listings
    // ===================

    /// Listing of one type's objects, from cache when possible
    ///
    /// On a miss the server is asked for editable objects only, or for
    /// everything when `show_all` is set. Concurrent misses for a type share
    /// one query. A cached editable-only listing is augmented with the full
    /// list the first time `show_all` is requested, and never again after
    /// that, even if the type has no non-editable objects.
    pub async fn object_listing(
        &self,
        type_id: TypeId,
        show_all: bool,
    ) -> Result<Arc<ObjectListing>, CoreError> {
        let (listing, fetched) = self
            .cache
            .get_or_fetch(type_id, || async move {
                if show_all {
                    let handles = self.query(ObjectQuery::all(type_id)).await?;
                    Ok(ObjectListing::from_full_query(handles))
                } else {
                    let handles = self.query(ObjectQuery::editable(type_id)).await?;
                    Ok(ObjectListing::new(handles))
                }
            })
            .await?;

        if fetched {
            self.event_bus.publish(DataEvent::ListingCached(type_id));
        }

        if !show_all || listing.is_complete() {
            if !fetched {
                debug!(type_id = %type_id, "Listing served from cache");
            }
            return Ok(listing);
        }

        debug!(type_id = %type_id, "Cached listing incomplete, fetching non-editables");
        let handles = self.query(ObjectQuery::all(type_id)).await?;
        match listing.merge_non_editable(handles) {
            Ok(added) => {
                self.event_bus
                    .publish(DataEvent::ListingAugmented { type_id, added });
            }
            // Another caller augmented it while this query was in flight.
            Err(CoreError::AlreadyAugmented) => {}
            Err(e) => return Err(e),
        }
        Ok(listing)
    }

    async fn query(&self, query: ObjectQuery) -> Result<Vec<ObjectHandle>, CoreError> {
        let handles = remote_call(
            "query_objects",
            self.config.remote_timeout,
            self.session.query_objects(&query),
        )
        .await?;

        if let Some(stray) = handles.iter().find(|h| h.type_id() != query.type_id) {
            return Err(CoreError::WrongType {
                object_id: stray.id,
                type_id: query.type_id,
            });
        }
        Ok(handles)
    }

    // ===================
    // Change notifications
    // ===================

    /// Record a newly created object in its type's cached listing
    ///
    /// Returns false when no listing is cached for the type.
    pub fn object_created(&self, handle: ObjectHandle) -> bool {
        let id = handle.id;
        let Some(listing) = self.cache.get(id.type_id()) else {
            return false;
        };
        listing.add_handle(handle);
        self.event_bus.publish(DataEvent::ObjectAdded(id));
        true
    }

    /// Drop a deleted object from its type's cached listing
    pub fn object_removed(&self, id: ObjectId) -> Option<ObjectHandle> {
        let removed = self.cache.get(id.type_id())?.remove_handle(&id)?;
        self.event_bus.publish(DataEvent::ObjectRemoved(id));
        Some(removed)
    }

    /// Apply a label change to the cached listing
    pub fn object_relabeled(&self, id: ObjectId, label: impl Into<String>) -> Option<ObjectHandle> {
        let updated = self.cache.get(id.type_id())?.relabel(&id, label)?;
        self.event_bus.publish(DataEvent::ObjectRelabeled(id));
        Some(updated)
    }

    /// Apply flag or label changes to a cached handle
    pub fn object_updated(&self, handle: ObjectHandle) -> Option<ObjectHandle> {
        let id = handle.id;
        let previous = self.cache.get(id.type_id())?.update_handle(handle)?;
        self.event_bus.publish(DataEvent::ObjectUpdated(id));
        Some(previous)
    }

    // ===================
    // Lifecycle
    // ===================

    /// Drop every cached listing
    pub fn clear_caches(&self) {
        self.cache.clear_all();
        self.event_bus.publish(DataEvent::CachesCleared);
    }

    /// Reload the schema and drop cached listings
    pub fn reload(&self) {
        info!(generation = self.loader.generation(), "Reloading client context");
        self.loader.reload();
        self.clear_caches();
    }

    /// Start forwarding server-push messages to the event bus
    ///
    /// Returns false if the session has no async port. A reader that is
    /// already running is stopped and replaced.
    pub fn start_async_reader(&self) -> bool {
        let Some(port) = self.session.async_port() else {
            debug!("Session has no async port");
            return false;
        };

        let reader = AsyncReader::start(port, self.event_bus.clone());
        if let Some(previous) = self.reader.lock().replace(reader) {
            previous.stop();
        }
        true
    }

    /// Take the running reader, e.g. to `join()` it
    pub fn take_async_reader(&self) -> Option<AsyncReader> {
        self.reader.lock().take()
    }

    /// Stop background work and drop all session data
    pub fn shutdown(&self) {
        if let Some(reader) = self.reader.lock().take() {
            reader.stop();
        }
        self.loader.shutdown();
        self.cache.clear_all();
        info!("Client context shut down");
    }
}
