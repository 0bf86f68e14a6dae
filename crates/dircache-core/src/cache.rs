//! Session-scoped object listing cache
//!
//! Maps a type id to the listing last fetched for it. Entries live until a
//! caller replaces or removes them; there is no eviction. Misses filled
//! through `get_or_fetch` run one fetch per type, however many callers ask.

use crate::error::CoreError;
use crate::listing::{HandleFilter, ObjectListing};
use dashmap::DashMap;
use dircache_types::{ObjectHandle, ObjectId, TypeId};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

type FetchCell = Arc<OnceCell<Arc<ObjectListing>>>;

/// Per-type cache of object listings
#[derive(Debug, Default)]
pub struct ObjectCache {
    lists: DashMap<TypeId, Arc<ObjectListing>>,
    fetches: DashMap<TypeId, FetchCell>,
}

impl ObjectCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, type_id: TypeId) -> bool {
        self.lists.contains_key(&type_id)
    }

    pub fn get(&self, type_id: TypeId) -> Option<Arc<ObjectListing>> {
        self.lists.get(&type_id).map(|r| Arc::clone(r.value()))
    }

    /// Build a listing from raw query results and cache it
    pub fn put_handles(
        &self,
        type_id: TypeId,
        handles: impl IntoIterator<Item = ObjectHandle>,
    ) -> Arc<ObjectListing> {
        self.put_listing(type_id, ObjectListing::new(handles))
    }

    /// Cache an already-built listing, replacing any previous entry
    pub fn put_listing(&self, type_id: TypeId, listing: ObjectListing) -> Arc<ObjectListing> {
        let listing = Arc::new(listing);
        debug!(type_id = %type_id, handles = listing.len(), "Caching listing");
        self.lists.insert(type_id, Arc::clone(&listing));
        listing
    }

    /// Cached listing for a type, or the result of `fetch` on a miss
    ///
    /// Concurrent misses for one type share a single `fetch`; every caller
    /// gets the listing that ends up cached. The flag is true only for the
    /// caller whose `fetch` ran. A failed fetch caches nothing and the next
    /// caller tries again.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        type_id: TypeId,
        fetch: F,
    ) -> Result<(Arc<ObjectListing>, bool), CoreError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ObjectListing, CoreError>>,
    {
        if let Some(listing) = self.get(type_id) {
            return Ok((listing, false));
        }

        let cell = Arc::clone(self.fetches.entry(type_id).or_default().value());
        let mut fetched = false;
        let listing = cell
            .get_or_try_init(|| {
                fetched = true;
                async move { fetch().await.map(Arc::new) }
            })
            .await?;

        // First finisher publishes; a listing put meanwhile wins.
        let cached = Arc::clone(
            self.lists
                .entry(type_id)
                .or_insert_with(|| Arc::clone(listing))
                .value(),
        );
        self.fetches
            .remove_if(&type_id, |_, pending| Arc::ptr_eq(pending, &cell));

        if fetched {
            debug!(type_id = %type_id, handles = cached.len(), "Fetched listing cached");
        }
        Ok((cached, fetched))
    }

    /// Merge non-editable handles into the cached listing for a type
    ///
    /// A missing entry is a caller error ([`CoreError::NotCached`]).
    pub fn augment(
        &self,
        type_id: TypeId,
        handles: impl IntoIterator<Item = ObjectHandle>,
    ) -> Result<usize, CoreError> {
        let listing = self.get(type_id).ok_or(CoreError::NotCached { type_id })?;
        let added = listing.merge_non_editable(handles)?;
        debug!(type_id = %type_id, added, "Augmented listing with non-editables");
        Ok(added)
    }

    pub fn remove(&self, type_id: TypeId) -> Option<Arc<ObjectListing>> {
        self.fetches.remove(&type_id);
        self.lists.remove(&type_id).map(|(_, listing)| listing)
    }

    pub fn clear_all(&self) {
        self.fetches.clear();
        self.lists.clear();
        debug!("Object cache cleared");
    }

    pub fn len(&self) -> usize {
        self.lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }

    /// Type ids with a cached listing, ascending
    pub fn cached_types(&self) -> Vec<TypeId> {
        let mut types: Vec<_> = self.lists.iter().map(|r| *r.key()).collect();
        types.sort();
        types
    }

    // ===================
    // Passthroughs (None on a cache miss)
    // ===================

    pub fn handles(&self, type_id: TypeId, filter: HandleFilter) -> Option<Vec<ObjectHandle>> {
        self.get(type_id).map(|listing| listing.handles(filter))
    }

    pub fn labels(&self, type_id: TypeId, filter: HandleFilter) -> Option<Vec<String>> {
        self.get(type_id).map(|listing| listing.labels(filter))
    }

    pub fn handle(&self, type_id: TypeId, id: &ObjectId) -> Option<ObjectHandle> {
        self.get(type_id).and_then(|listing| listing.handle(id))
    }

    /// Whether the cached listing for a type includes non-editables
    pub fn contains_non_editable(&self, type_id: TypeId) -> Result<bool, CoreError> {
        self.get(type_id)
            .map(|listing| listing.contains_non_editable())
            .ok_or(CoreError::NotCached { type_id })
    }
}
