// ── Generic reactive entity collection ──
//
// Ordered storage with push-based change notification via `watch`
// channels. Every mutation publishes a whole new snapshot in a single
// assignment, so readers see either the old sequence or the new one.

use std::sync::Arc;

use indexmap::IndexMap;
use tokio::sync::watch;

use crate::model::{EntityId, Resource};

type Snapshot<T> = Arc<Vec<Arc<T>>>;

/// An ordered, reactive collection for a single resource kind.
///
/// Order is insertion order (server response order after a fetch).
/// Identity is `Resource::id`; no two entries share an id once a
/// mutation returns.
pub(crate) struct EntityCollection<T: Resource> {
    /// Version counter, bumped on every mutation.
    version: watch::Sender<u64>,

    /// Full snapshot, replaced on mutation.
    snapshot: watch::Sender<Snapshot<T>>,
}

impl<T: Resource> EntityCollection<T> {
    pub(crate) fn new() -> Self {
        let (version, _) = watch::channel(0u64);
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));

        Self { version, snapshot }
    }

    /// Replace the whole sequence. Duplicate ids collapse to the first
    /// position carrying the last value. Returns the resulting length.
    pub(crate) fn replace(&self, items: Vec<T>) -> usize {
        let mut by_id: IndexMap<EntityId, T> = IndexMap::with_capacity(items.len());
        for item in items {
            // `insert` keeps the original slot when the key already exists.
            by_id.insert(item.id().clone(), item);
        }

        let values: Vec<Arc<T>> = by_id.into_values().map(Arc::new).collect();
        let len = values.len();
        self.snapshot.send_replace(Arc::new(values));
        self.bump_version();
        len
    }

    /// Modify the entry with `id` in place, or offer to append one.
    ///
    /// `f` receives the entry when present, or `None` on a miss; a miss
    /// appends whatever `f` returns. Nothing is published when a miss
    /// yields `None`. Returns whether the collection changed.
    pub(crate) fn upsert_with<F>(&self, id: &EntityId, f: F) -> bool
    where
        F: FnOnce(Option<&mut T>) -> Option<T>,
    {
        let modified = self.snapshot.send_if_modified(|snap| {
            let position = snap.iter().position(|e| e.id() == id);
            let next: Vec<Arc<T>> = match position {
                Some(pos) => {
                    let mut next = (**snap).clone();
                    f(Some(Arc::make_mut(&mut next[pos])));
                    next
                }
                None => {
                    let Some(item) = f(None) else {
                        return false;
                    };
                    let mut next = (**snap).clone();
                    next.push(Arc::new(item));
                    next
                }
            };
            *snap = Arc::new(next);
            true
        });
        if modified {
            self.bump_version();
        }
        modified
    }

    /// Look up an entry by id (linear scan, collections are page-sized).
    pub(crate) fn get_by_id(&self, id: &EntityId) -> Option<Arc<T>> {
        self.snapshot
            .borrow()
            .iter()
            .find(|e| e.id() == id)
            .map(Arc::clone)
    }

    pub(crate) fn contains(&self, id: &EntityId) -> bool {
        self.snapshot.borrow().iter().any(|e| e.id() == id)
    }

    /// Get the current snapshot (cheap `Arc` clone).
    pub(crate) fn snapshot(&self) -> Snapshot<T> {
        self.snapshot.borrow().clone()
    }

    /// Subscribe to snapshot changes via a `watch::Receiver`.
    pub(crate) fn subscribe(&self) -> watch::Receiver<Snapshot<T>> {
        self.snapshot.subscribe()
    }

    pub(crate) fn len(&self) -> usize {
        self.snapshot.borrow().len()
    }

    pub(crate) fn version(&self) -> u64 {
        *self.version.borrow()
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn bump_version(&self) {
        // `send_modify` updates unconditionally, even with zero receivers.
        self.version.send_modify(|v| *v += 1);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::Machine;
    use serde_json::json;

    fn machine(id: i64, name: &str) -> Machine {
        serde_json::from_value(json!({ "id": id, "name": name })).unwrap()
    }

    fn names(col: &EntityCollection<Machine>) -> Vec<String> {
        col.snapshot().iter().map(|m| m.name.clone()).collect()
    }

    #[test]
    fn replace_keeps_response_order() {
        let col = EntityCollection::new();
        col.replace(vec![machine(2, "b"), machine(1, "a"), machine(3, "c")]);
        assert_eq!(names(&col), ["b", "a", "c"]);
    }

    #[test]
    fn replace_collapses_duplicates_first_position_last_value() {
        let col = EntityCollection::new();
        let len = col.replace(vec![machine(1, "old"), machine(2, "x"), machine(1, "new")]);
        assert_eq!(len, 2);
        assert_eq!(names(&col), ["new", "x"]);
    }

    #[test]
    fn replace_twice_is_idempotent() {
        let col = EntityCollection::new();
        let batch = vec![machine(1, "a"), machine(2, "b")];
        col.replace(batch.clone());
        let first: Vec<Machine> = col.snapshot().iter().map(|m| (**m).clone()).collect();
        col.replace(batch);
        let second: Vec<Machine> = col.snapshot().iter().map(|m| (**m).clone()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn miss_without_insert_publishes_nothing() {
        let col = EntityCollection::new();
        col.replace(vec![machine(1, "a")]);
        let before = col.version();
        let rx = col.subscribe();

        assert!(!col.upsert_with(&EntityId::from(9), |_| None));
        assert_eq!(col.version(), before);
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn hit_leaves_old_snapshot_untouched() {
        let col = EntityCollection::new();
        col.replace(vec![machine(1, "a"), machine(2, "b")]);
        let old = col.snapshot();

        let changed = col.upsert_with(&EntityId::from(2), |m| {
            if let Some(m) = m {
                m.name = "B".into();
            }
            None
        });

        assert!(changed);
        assert_eq!(old[1].name, "b");
        assert_eq!(names(&col), ["a", "B"]);
    }

    #[test]
    fn miss_with_insert_appends() {
        let col = EntityCollection::new();
        col.replace(vec![machine(1, "a")]);

        assert!(col.upsert_with(&EntityId::from(5), |_| Some(machine(5, "e"))));

        assert_eq!(col.len(), 2);
        assert!(col.contains(&EntityId::from(5)));
        assert_eq!(col.get_by_id(&EntityId::from(5)).unwrap().name, "e");
    }
}
