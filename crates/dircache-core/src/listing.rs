//! Sorted object listings for one object type
//!
//! A listing keeps two label-sorted views of the same handles (everything,
//! and active-only) plus an id index. All mutators keep both views sorted
//! with binary-search insertion and keep the index consistent with them.

use crate::error::CoreError;
use dircache_types::{ObjectHandle, ObjectId};
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// Case-insensitive string ordering used for labels and type names
pub fn cmp_ignore_case(a: &str, b: &str) -> Ordering {
    let lower_a = a.chars().flat_map(char::to_lowercase);
    let lower_b = b.chars().flat_map(char::to_lowercase);
    lower_a.cmp(lower_b)
}

fn cmp_labels(a: &ObjectHandle, b: &ObjectHandle) -> Ordering {
    cmp_ignore_case(&a.label, &b.label)
}

/// Which handles a listing query returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HandleFilter {
    pub include_inactive: bool,
    pub include_non_editable: bool,
}

impl HandleFilter {
    /// Active, editable handles only
    pub fn editable_active() -> Self {
        Self::default()
    }

    /// Active handles, editable or not
    pub fn active() -> Self {
        Self {
            include_inactive: false,
            include_non_editable: true,
        }
    }

    /// Every handle
    pub fn all() -> Self {
        Self {
            include_inactive: true,
            include_non_editable: true,
        }
    }

    pub fn with_inactive(mut self, include: bool) -> Self {
        self.include_inactive = include;
        self
    }

    pub fn with_non_editable(mut self, include: bool) -> Self {
        self.include_non_editable = include;
        self
    }

    fn admits(&self, handle: &ObjectHandle) -> bool {
        self.include_non_editable || handle.editable
    }
}

#[derive(Debug, Default)]
struct ListingState {
    handles: Vec<ObjectHandle>,
    active: Vec<ObjectHandle>,
    index: HashMap<ObjectId, ObjectHandle>,
    contains_non_editable: bool,
    /// Built from, or merged with, a query that included non-editables
    full_query: bool,
}

impl ListingState {
    fn view(&self, include_inactive: bool) -> &[ObjectHandle] {
        if include_inactive {
            &self.handles
        } else {
            &self.active
        }
    }

    fn insert(&mut self, handle: ObjectHandle) {
        if self.index.contains_key(&handle.id) {
            self.remove(&handle.id);
        }

        if handle.is_active() {
            insert_sorted(&mut self.active, handle.clone());
        }
        insert_sorted(&mut self.handles, handle.clone());
        self.index.insert(handle.id, handle);
    }

    fn remove(&mut self, id: &ObjectId) -> Option<ObjectHandle> {
        let handle = self.index.remove(id)?;
        self.handles.retain(|h| h.id != *id);
        if handle.is_active() {
            self.active.retain(|h| h.id != *id);
        }
        Some(handle)
    }
}

/// Insert after any equal labels, keeping `vec` sorted
fn insert_sorted(vec: &mut Vec<ObjectHandle>, handle: ObjectHandle) {
    let position = vec.partition_point(|existing| cmp_labels(existing, &handle) != Ordering::Greater);
    vec.insert(position, handle);
}

/// Label-sorted listing of the objects of one type
///
/// Internally synchronized: every method takes `&self`. Reads return
/// snapshots that never observe later mutations.
#[derive(Debug, Default)]
pub struct ObjectListing {
    state: RwLock<ListingState>,
}

impl ObjectListing {
    /// Build a listing from server results
    ///
    /// Handles are stably sorted by label; a repeated id keeps its first
    /// occurrence.
    pub fn new(handles: impl IntoIterator<Item = ObjectHandle>) -> Self {
        let mut state = ListingState::default();

        for handle in handles {
            if state.index.contains_key(&handle.id) {
                debug!(id = %handle.id, "Dropping duplicate handle from listing");
                continue;
            }
            if !handle.editable {
                state.contains_non_editable = true;
            }
            state.index.insert(handle.id, handle.clone());
            state.handles.push(handle);
        }

        state.handles.sort_by(cmp_labels);
        state.active = state
            .handles
            .iter()
            .filter(|handle| handle.is_active())
            .cloned()
            .collect();

        Self {
            state: RwLock::new(state),
        }
    }

    /// Build a listing from a query that included non-editable objects
    ///
    /// Such a listing is complete even when every handle is editable.
    pub fn from_full_query(handles: impl IntoIterator<Item = ObjectHandle>) -> Self {
        let listing = Self::new(handles);
        listing.state.write().full_query = true;
        listing
    }

    /// Sorted snapshot of the handles admitted by `filter`
    pub fn handles(&self, filter: HandleFilter) -> Vec<ObjectHandle> {
        let state = self.state.read();
        let view = state.view(filter.include_inactive);

        if filter.include_non_editable || !state.contains_non_editable {
            return view.to_vec();
        }

        view.iter()
            .filter(|handle| filter.admits(handle))
            .cloned()
            .collect()
    }

    /// Labels of the handles admitted by `filter`, in sorted order
    pub fn labels(&self, filter: HandleFilter) -> Vec<String> {
        let state = self.state.read();
        state
            .view(filter.include_inactive)
            .iter()
            .filter(|handle| filter.admits(handle))
            .map(|handle| handle.label.clone())
            .collect()
    }

    /// Copy of one handle
    pub fn handle(&self, id: &ObjectId) -> Option<ObjectHandle> {
        self.state.read().index.get(id).cloned()
    }

    pub fn contains(&self, id: &ObjectId) -> bool {
        self.state.read().index.contains_key(id)
    }

    /// Insert a handle in sorted position, replacing any handle with its id
    pub fn add_handle(&self, handle: ObjectHandle) {
        let mut state = self.state.write();
        if !handle.editable {
            state.contains_non_editable = true;
        }
        state.insert(handle);
    }

    /// Remove a handle from both views
    pub fn remove_handle(&self, id: &ObjectId) -> Option<ObjectHandle> {
        self.state.write().remove(id)
    }

    /// Change a handle's label and move it to its new sorted position
    ///
    /// Returns the updated handle, or `None` if the id is not listed.
    pub fn relabel(&self, id: &ObjectId, label: impl Into<String>) -> Option<ObjectHandle> {
        let mut state = self.state.write();
        let mut handle = state.remove(id)?;
        handle.label = label.into();
        state.insert(handle.clone());
        Some(handle)
    }

    /// Replace a listed handle's label and flags
    ///
    /// Returns the previous version, or `None` (and lists nothing) if the id
    /// is not already present.
    pub fn update_handle(&self, handle: ObjectHandle) -> Option<ObjectHandle> {
        let mut state = self.state.write();
        let previous = state.remove(&handle.id)?;
        if !handle.editable {
            state.contains_non_editable = true;
        }
        state.insert(handle);
        Some(previous)
    }

    /// Extend an editable-only listing with handles it does not yet have
    ///
    /// Fails with [`CoreError::AlreadyAugmented`] once the listing contains
    /// non-editable handles. Returns the number of handles added.
    pub fn merge_non_editable(
        &self,
        handles: impl IntoIterator<Item = ObjectHandle>,
    ) -> Result<usize, CoreError> {
        let mut state = self.state.write();
        if state.contains_non_editable {
            return Err(CoreError::AlreadyAugmented);
        }

        let mut added = 0;
        for handle in handles {
            if state.index.contains_key(&handle.id) {
                continue;
            }
            if !handle.editable {
                state.contains_non_editable = true;
            }
            state.insert(handle);
            added += 1;
        }
        state.full_query = true;

        Ok(added)
    }

    pub fn contains_non_editable(&self) -> bool {
        self.state.read().contains_non_editable
    }

    /// Whether non-editable objects are already covered
    ///
    /// True once non-editables are present or a full query was merged in,
    /// even if that query turned up none.
    pub fn is_complete(&self) -> bool {
        let state = self.state.read();
        state.full_query || state.contains_non_editable
    }

    /// Total handle count, inactive included
    pub fn len(&self) -> usize {
        self.state.read().handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().handles.is_empty()
    }

    pub fn active_len(&self) -> usize {
        self.state.read().active.len()
    }
}

impl fmt::Display for ObjectListing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for handle in self.state.read().handles.iter() {
            writeln!(f, "{}", handle)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dircache_types::TypeId;

    fn oid(num: u32) -> ObjectId {
        ObjectId::new(TypeId(3), num)
    }

    fn labels_of(handles: &[ObjectHandle]) -> Vec<&str> {
        handles.iter().map(|h| h.label.as_str()).collect()
    }

    fn assert_sorted(handles: &[ObjectHandle]) {
        for pair in handles.windows(2) {
            assert_ne!(
                cmp_labels(&pair[0], &pair[1]),
                Ordering::Greater,
                "{} sorts after {}",
                pair[0].label,
                pair[1].label
            );
        }
    }

    fn sample() -> ObjectListing {
        ObjectListing::new(vec![
            ObjectHandle::new(oid(1), "delta"),
            ObjectHandle::new(oid(2), "Bravo").inactive(),
            ObjectHandle::new(oid(3), "alpha"),
            ObjectHandle::new(oid(4), "Echo").inactive(),
            ObjectHandle::new(oid(5), "charlie"),
        ])
    }

    #[test]
    fn test_cmp_ignore_case() {
        assert_eq!(cmp_ignore_case("alpha", "ALPHA"), Ordering::Equal);
        assert_eq!(cmp_ignore_case("Alpha", "beta"), Ordering::Less);
        assert_eq!(cmp_ignore_case("zeta", "Alpha"), Ordering::Greater);
        assert_eq!(cmp_ignore_case("ab", "ABC"), Ordering::Less);
    }

    #[test]
    fn test_new_partitions_views() {
        let listing = ObjectListing::new(vec![
            ObjectHandle::new(oid(1), "Zeta"),
            ObjectHandle::new(oid(2), "Alpha").inactive(),
        ]);

        let all = listing.handles(HandleFilter::all());
        assert_eq!(labels_of(&all), vec!["Alpha", "Zeta"]);
        assert_eq!(all[0].id, oid(2));

        let active = listing.handles(HandleFilter::active());
        assert_eq!(labels_of(&active), vec!["Zeta"]);
        assert_eq!(active[0].id, oid(1));

        assert!(!listing.contains_non_editable());
    }

    #[test]
    fn test_view_sizes_count_inactive() {
        let listing = sample();
        assert_eq!(listing.handles(HandleFilter::active()).len(), 3);
        assert_eq!(listing.handles(HandleFilter::all()).len(), 5);
        assert_eq!(listing.len(), 5);
        assert_eq!(listing.active_len(), 3);
    }

    #[test]
    fn test_new_drops_duplicate_ids() {
        let listing = ObjectListing::new(vec![
            ObjectHandle::new(oid(1), "first"),
            ObjectHandle::new(oid(1), "second"),
        ]);
        assert_eq!(listing.len(), 1);
        assert_eq!(listing.handle(&oid(1)).unwrap().label, "first");
    }

    #[test]
    fn test_non_editable_filtering() {
        let listing = ObjectListing::new(vec![
            ObjectHandle::new(oid(1), "mine"),
            ObjectHandle::new(oid(2), "theirs").read_only(),
            ObjectHandle::new(oid(3), "old theirs").read_only().inactive(),
        ]);

        assert!(listing.contains_non_editable());
        assert_eq!(
            labels_of(&listing.handles(HandleFilter::editable_active())),
            vec!["mine"]
        );
        assert_eq!(
            listing.labels(HandleFilter::all()),
            vec!["mine", "old theirs", "theirs"]
        );
        assert_eq!(
            listing.labels(HandleFilter::all().with_non_editable(false)),
            vec!["mine"]
        );
    }

    #[test]
    fn test_snapshots_do_not_track_mutation() {
        let listing = sample();
        let before = listing.handles(HandleFilter::all());

        listing.relabel(&oid(1), "aardvark");
        listing.remove_handle(&oid(3));

        assert_eq!(before.len(), 5);
        assert_eq!(before.iter().find(|h| h.id == oid(1)).unwrap().label, "delta");
    }

    #[test]
    fn test_add_handle_keeps_order() {
        let listing = sample();
        listing.add_handle(ObjectHandle::new(oid(6), "Bingo"));
        listing.add_handle(ObjectHandle::new(oid(7), "zulu").inactive());

        let all = listing.handles(HandleFilter::all());
        assert_sorted(&all);
        assert_eq!(
            labels_of(&all),
            vec!["alpha", "Bingo", "Bravo", "charlie", "delta", "Echo", "zulu"]
        );

        let active = listing.handles(HandleFilter::active());
        assert_sorted(&active);
        assert_eq!(labels_of(&active), vec!["alpha", "Bingo", "charlie", "delta"]);
    }

    #[test]
    fn test_add_handle_replaces_same_id() {
        let listing = sample();
        listing.add_handle(ObjectHandle::new(oid(2), "bravo revived"));

        assert_eq!(listing.len(), 5);
        assert_eq!(listing.active_len(), 4);
        assert_eq!(listing.handle(&oid(2)).unwrap().label, "bravo revived");
    }

    #[test]
    fn test_remove_handle() {
        let listing = sample();

        let removed = listing.remove_handle(&oid(5)).unwrap();
        assert_eq!(removed.label, "charlie");
        assert!(listing.handle(&oid(5)).is_none());
        assert!(!listing.contains(&oid(5)));
        assert!(listing
            .handles(HandleFilter::all())
            .iter()
            .all(|h| h.id != oid(5)));
        assert!(listing
            .handles(HandleFilter::active())
            .iter()
            .all(|h| h.id != oid(5)));

        assert!(listing.remove_handle(&oid(5)).is_none());
    }

    #[test]
    fn test_relabel_moves_handle_first() {
        let listing = sample();

        let updated = listing.relabel(&oid(1), "Aardvark").unwrap();
        assert_eq!(updated.label, "Aardvark");

        let all = listing.handles(HandleFilter::all());
        assert_eq!(all.len(), 5);
        assert_eq!(all[0].id, oid(1));
        assert_sorted(&all);

        let active = listing.handles(HandleFilter::active());
        assert_eq!(active[0].id, oid(1));
        assert_sorted(&active);

        assert!(listing.relabel(&oid(42), "nobody").is_none());
        assert_eq!(listing.len(), 5);
    }

    #[test]
    fn test_update_handle_moves_between_views() {
        let listing = sample();

        let mut delta = listing.handle(&oid(1)).unwrap();
        delta.inactive = true;
        let previous = listing.update_handle(delta).unwrap();
        assert!(!previous.inactive);

        assert_eq!(listing.active_len(), 2);
        assert!(listing
            .handles(HandleFilter::active())
            .iter()
            .all(|h| h.id != oid(1)));

        let stranger = ObjectHandle::new(oid(99), "stranger");
        assert!(listing.update_handle(stranger).is_none());
        assert!(!listing.contains(&oid(99)));
    }

    #[test]
    fn test_merge_non_editable_adds_unseen_only() {
        let listing = sample();

        let added = listing
            .merge_non_editable(vec![
                ObjectHandle::new(oid(1), "delta renamed").read_only(),
                ObjectHandle::new(oid(8), "foxtrot").read_only(),
                ObjectHandle::new(oid(9), "golf"),
            ])
            .unwrap();

        assert_eq!(added, 2);
        assert!(listing.contains_non_editable());
        assert_eq!(listing.handle(&oid(1)).unwrap().label, "delta");
        assert!(listing.handle(&oid(1)).unwrap().editable);
        assert_eq!(listing.len(), 7);
        assert_sorted(&listing.handles(HandleFilter::all()));

        let again = listing.merge_non_editable(vec![ObjectHandle::new(oid(10), "hotel")]);
        assert!(matches!(again, Err(CoreError::AlreadyAugmented)));
        assert!(!listing.contains(&oid(10)));
    }

    #[test]
    fn test_complete_without_non_editables() {
        let listing = sample();
        assert!(!listing.is_complete());

        let added = listing
            .merge_non_editable(vec![ObjectHandle::new(oid(1), "delta")])
            .unwrap();
        assert_eq!(added, 0);
        assert!(!listing.contains_non_editable());
        assert!(listing.is_complete());

        let full = ObjectListing::from_full_query(vec![ObjectHandle::new(oid(1), "delta")]);
        assert!(full.is_complete());
        assert!(!full.contains_non_editable());
    }

    #[test]
    fn test_display_lists_every_handle() {
        let listing = ObjectListing::new(vec![
            ObjectHandle::new(oid(1), "b"),
            ObjectHandle::new(oid(2), "a").inactive(),
        ]);
        assert_eq!(listing.to_string(), "a (3:2) [inactive]\nb (3:1)\n");
    }
}
