//! Observed collections
//!
//! An [`ObservedCollection`] is the reconciled in-memory view of remote
//! state: an ordered set of records, unique by identity key, that
//! announces membership changes over a broadcast channel. Poll cycles
//! diff a fresh snapshot against the collection with [`compare`] and
//! mutate surviving records in place, so subscribers holding an `Arc`
//! to a record keep receiving its updates across polls.

use std::sync::Arc;
use std::sync::RwLock;

use tokio::sync::broadcast;

/// Types that expose the identity key used to reconcile poll snapshots
pub trait Keyed {
    /// Stable identity of this record within one collection
    fn key(&self) -> &str;
}

/// Membership change announced by an [`ObservedCollection`]
#[derive(Debug)]
pub enum CollectionEvent<T> {
    /// A record was observed for the first time
    Added(Arc<T>),
    /// A previously observed record disappeared
    Removed(Arc<T>),
}

impl<T> Clone for CollectionEvent<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Added(item) => Self::Added(Arc::clone(item)),
            Self::Removed(item) => Self::Removed(Arc::clone(item)),
        }
    }
}

/// Order-preserving set of records, unique by [`Keyed::key`]
#[derive(Debug)]
pub struct ObservedCollection<T> {
    entries: RwLock<Vec<Arc<T>>>,
    events: broadcast::Sender<CollectionEvent<T>>,
}

impl<T: Keyed + Send + Sync + 'static> ObservedCollection<T> {
    /// Creates an empty collection
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            entries: RwLock::new(Vec::new()),
            events,
        }
    }

    /// Subscribes to membership changes
    ///
    /// Only changes after this call are delivered; read the current
    /// membership with [`snapshot`](Self::snapshot) first.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CollectionEvent<T>> {
        self.events.subscribe()
    }

    /// Adds a record, announcing it to subscribers
    ///
    /// If a record with the same key is already present it is returned
    /// unchanged and no event fires; the collection never holds two
    /// records with one identity.
    pub fn insert(&self, item: T) -> Arc<T> {
        let mut entries = self.entries.write().unwrap();
        if let Some(existing) = entries.iter().find(|e| e.key() == item.key()) {
            return Arc::clone(existing);
        }

        let item = Arc::new(item);
        entries.push(Arc::clone(&item));
        let _ = self.events.send(CollectionEvent::Added(Arc::clone(&item)));
        item
    }

    /// Removes the record with the given key, announcing the removal
    pub fn remove(&self, key: &str) -> Option<Arc<T>> {
        let mut entries = self.entries.write().unwrap();
        let index = entries.iter().position(|e| e.key() == key)?;
        let item = entries.remove(index);
        let _ = self.events.send(CollectionEvent::Removed(Arc::clone(&item)));
        Some(item)
    }

    /// Returns the record with the given key, if present
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Arc<T>> {
        self.entries
            .read()
            .unwrap()
            .iter()
            .find(|e| e.key() == key)
            .map(Arc::clone)
    }

    /// Returns the current membership in observation order
    #[must_use]
    pub fn snapshot(&self) -> Vec<Arc<T>> {
        self.entries.read().unwrap().clone()
    }

    /// Returns `true` if any record satisfies the predicate
    pub fn any(&self, mut predicate: impl FnMut(&T) -> bool) -> bool {
        self.entries.read().unwrap().iter().any(|e| predicate(e))
    }

    /// Number of records currently observed
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    /// Returns `true` if nothing is currently observed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().unwrap().is_empty()
    }
}

impl<T: Keyed + Send + Sync + 'static> Default for ObservedCollection<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Three-way partition of a fresh snapshot against known entries
#[derive(Debug)]
pub struct Diff<O, N> {
    /// Snapshot entries with no known counterpart
    pub added: Vec<N>,
    /// Known entries absent from the snapshot
    pub removed: Vec<O>,
    /// Pairs of (known entry, fresh snapshot) present on both sides;
    /// the known entry is kept and updated in place, never replaced
    pub kept: Vec<(O, N)>,
}

/// Partitions `fresh` against `old` using the given identity match
pub fn compare<O: Clone, N>(
    old: &[O],
    fresh: Vec<N>,
    matches: impl Fn(&O, &N) -> bool,
) -> Diff<O, N> {
    let mut added = Vec::new();
    let mut kept = Vec::new();
    let mut matched = vec![false; old.len()];

    for item in fresh {
        match old.iter().position(|o| matches(o, &item)) {
            Some(index) => {
                matched[index] = true;
                kept.push((old[index].clone(), item));
            }
            None => added.push(item),
        }
    }

    let removed = old
        .iter()
        .zip(&matched)
        .filter(|(_, seen)| !**seen)
        .map(|(o, _)| o.clone())
        .collect();

    Diff {
        added,
        removed,
        kept,
    }
}

/// Elements of `lhs` with no match in `rhs`
pub fn difference<T: Clone, U>(
    lhs: &[T],
    rhs: &[U],
    matches: impl Fn(&T, &U) -> bool,
) -> Vec<T> {
    lhs.iter()
        .filter(|t| !rhs.iter().any(|u| matches(t, u)))
        .cloned()
        .collect()
}
