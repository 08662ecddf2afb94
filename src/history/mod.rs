//! Bounded, observable record of recently run queries.
//!
//! Items keep insertion order (oldest first). Adding an item equal to one
//! already recorded changes nothing and notifies nobody. When the history is
//! full the oldest item is evicted. Observers are called synchronously on
//! the thread that changed the history.

pub mod items;

pub use items::{HistoryItem, MapReduceHistoryItem, QueryHistoryItem, summarize};

use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

/// Default number of items kept.
pub const DEFAULT_MAX_SIZE: usize = 100;

/// Change notification delivered to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryEvent {
    ItemsChanged { len: usize },
}

/// Handle returned by [`QueryHistory::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Observer = Arc<dyn Fn(&HistoryEvent) + Send + Sync>;

struct Observers {
    next_id: u64,
    entries: Vec<(SubscriptionId, Observer)>,
}

pub struct QueryHistory<T: HistoryItem> {
    items: RwLock<Vec<T>>,
    max_size: usize,
    observers: Mutex<Observers>,
}

impl<T: HistoryItem> Default for QueryHistory<T> {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SIZE)
    }
}

impl<T: HistoryItem> QueryHistory<T> {
    /// Create a history keeping at most `max_size` items (at least one).
    pub fn new(max_size: usize) -> Self {
        Self {
            items: RwLock::new(Vec::new()),
            max_size: max_size.max(1),
            observers: Mutex::new(Observers {
                next_id: 0,
                entries: Vec::new(),
            }),
        }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Record `item` unless an equal item is already present.
    ///
    /// Returns `true` when the item was appended.
    pub fn add(&self, item: T) -> bool {
        let len = {
            let mut items = self.write_items();
            if items.contains(&item) {
                debug!("History already holds {}", item.label());
                return false;
            }
            items.push(item);
            if items.len() > self.max_size {
                let overflow = items.len() - self.max_size;
                items.drain(..overflow);
            }
            items.len()
        };
        debug!("History now holds {} items", len);
        self.notify(HistoryEvent::ItemsChanged { len });
        true
    }

    /// Copy of the recorded items, oldest first.
    pub fn items(&self) -> Vec<T> {
        self.read_items().clone()
    }

    pub fn len(&self) -> usize {
        self.read_items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Most recently added item.
    pub fn latest(&self) -> Option<T> {
        self.read_items().last().cloned()
    }

    pub fn clear(&self) {
        self.write_items().clear();
        self.notify(HistoryEvent::ItemsChanged { len: 0 });
    }

    pub fn subscribe<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&HistoryEvent) + Send + Sync + 'static,
    {
        let mut observers = match self.observers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let id = SubscriptionId(observers.next_id);
        observers.next_id += 1;
        observers.entries.push((id, Arc::new(observer)));
        id
    }

    /// Remove a subscriber; returns `false` when `id` was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = match self.observers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let before = observers.entries.len();
        observers.entries.retain(|(entry, _)| *entry != id);
        observers.entries.len() != before
    }

    // a panicking writer leaves the list valid, so poisoning is ignored
    fn read_items(&self) -> RwLockReadGuard<'_, Vec<T>> {
        self.items.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_items(&self) -> RwLockWriteGuard<'_, Vec<T>> {
        self.items.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, event: HistoryEvent) {
        // observers run without the lock held so they may read or subscribe
        let current: Vec<Observer> = match self.observers.lock() {
            Ok(guard) => guard.entries.iter().map(|(_, o)| Arc::clone(o)).collect(),
            Err(poisoned) => poisoned
                .into_inner()
                .entries
                .iter()
                .map(|(_, o)| Arc::clone(o))
                .collect(),
        };
        for observer in current {
            observer(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_duplicate_map_reduce_pair_kept_once() {
        let history = QueryHistory::default();
        assert!(history.add(MapReduceHistoryItem::new("map", "reduce")));
        assert!(!history.add(MapReduceHistoryItem::new("map", "reduce")));
        assert_eq!(history.items().len(), 1);
    }

    #[test]
    fn test_duplicate_does_not_reorder() {
        let history = QueryHistory::new(10);
        let a = QueryHistoryItem::new(Some(doc! { "a": 1 }), None, None);
        let b = QueryHistoryItem::new(Some(doc! { "b": 1 }), None, None);
        history.add(a.clone());
        history.add(b.clone());
        history.add(a.clone());
        assert_eq!(history.items(), vec![a, b.clone()]);
        assert_eq!(history.latest(), Some(b));
    }

    #[test]
    fn test_oldest_evicted_when_full() {
        let history = QueryHistory::new(3);
        for i in 0..5 {
            history.add(MapReduceHistoryItem::new(format!("m{i}"), "r"));
        }
        let maps: Vec<String> = history.items().into_iter().map(|i| i.map_function).collect();
        assert_eq!(maps, vec!["m2", "m3", "m4"]);
    }

    #[test]
    fn test_observers_notified_on_change_only() {
        let history = QueryHistory::new(10);
        let calls = Arc::new(AtomicUsize::new(0));
        let last_len = Arc::new(AtomicUsize::new(usize::MAX));
        let id = {
            let calls = calls.clone();
            let last_len = last_len.clone();
            history.subscribe(move |event| {
                let HistoryEvent::ItemsChanged { len } = *event;
                calls.fetch_add(1, Ordering::SeqCst);
                last_len.store(len, Ordering::SeqCst);
            })
        };

        history.add(MapReduceHistoryItem::new("m", "r"));
        history.add(MapReduceHistoryItem::new("m", "r"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(last_len.load(Ordering::SeqCst), 1);

        history.clear();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(last_len.load(Ordering::SeqCst), 0);

        assert!(history.unsubscribe(id));
        assert!(!history.unsubscribe(id));
        history.add(MapReduceHistoryItem::new("m", "r"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_poisoned_lock_still_usable() {
        let history = Arc::new(QueryHistory::new(10));
        history.add(MapReduceHistoryItem::new("m0", "r"));
        let writer = {
            let history = history.clone();
            std::thread::spawn(move || {
                let _items = history.items.write().unwrap();
                panic!("writer failed while holding the lock");
            })
        };
        assert!(writer.join().is_err());
        assert!(history.items.is_poisoned());

        assert!(history.add(MapReduceHistoryItem::new("m1", "r")));
        assert_eq!(history.len(), 2);
        assert_eq!(history.latest(), Some(MapReduceHistoryItem::new("m1", "r")));
        history.clear();
        assert!(history.items().is_empty());
    }

    #[test]
    fn test_concurrent_readers() {
        let history = Arc::new(QueryHistory::new(1000));
        for i in 0..100 {
            history.add(MapReduceHistoryItem::new(format!("m{i}"), "r"));
        }
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let history = history.clone();
                std::thread::spawn(move || history.items().len())
            })
            .collect();
        for reader in readers {
            assert_eq!(reader.join().unwrap(), 100);
        }
    }
}
