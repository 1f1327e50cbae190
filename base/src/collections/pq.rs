//! A keyed priority queue which yields the item with the *smallest*
//! priority first.  The emulator uses this to hold the deadlines of
//! pending peripheral events, keyed by event identifier.
use std::cmp::Ordering;
use std::fmt::{self, Debug, Formatter};
use std::hash::Hash;

use keyed_priority_queue::KeyedPriorityQueue;

/// Wraps a value so that it compares in reverse; `KeyedPriorityQueue`
/// is a max-heap and we want the earliest deadline.
#[derive(Debug)]
struct Earliest<T> {
    inner: T,
}

impl<T> From<T> for Earliest<T> {
    fn from(inner: T) -> Earliest<T> {
        Earliest { inner }
    }
}

impl<T: Ord> PartialOrd for Earliest<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: Eq> Eq for Earliest<T> {}

impl<T: Eq> PartialEq for Earliest<T> {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl<T: Ord> Ord for Earliest<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        other.inner.cmp(&self.inner)
    }
}

#[test]
fn test_earliest_order() {
    assert_eq!(Earliest::from(1), Earliest::from(1));
    assert_ne!(Earliest::from(1), Earliest::from(0));
    assert!(Earliest::from(1) < Earliest::from(0));
    assert!(Earliest::from(100) <= Earliest::from(99));
}

pub struct EarliestFirstQueue<K: Hash + Eq, P: Ord> {
    items: KeyedPriorityQueue<K, Earliest<P>>,
}

impl<K, P> EarliestFirstQueue<K, P>
where
    K: Hash + Eq,
    P: Ord,
{
    pub fn new() -> EarliestFirstQueue<K, P> {
        EarliestFirstQueue {
            items: KeyedPriorityQueue::new(),
        }
    }

    pub fn peek(&self) -> Option<(&K, &P)> {
        self.items.peek().map(|(k, p)| (k, &p.inner))
    }

    pub fn pop(&mut self) -> Option<(K, P)> {
        self.items.pop().map(|(k, p)| (k, p.inner))
    }

    /// Remove and return the earliest item, but only if its priority
    /// is no later than `limit`.
    pub fn pop_due(&mut self, limit: &P) -> Option<(K, P)> {
        if matches!(self.peek(), Some((_, p)) if p <= limit) {
            self.pop()
        } else {
            None
        }
    }

    /// Insert an item.  If `key` was already present, its priority
    /// is replaced and the old priority is returned.
    pub fn push(&mut self, key: K, priority: P) -> Option<P> {
        self.items
            .push(key, Earliest::from(priority))
            .map(|old| old.inner)
    }

    pub fn remove(&mut self, key: &K) -> Option<P> {
        self.items.remove(key).map(|p| p.inner)
    }

    pub fn clear(&mut self) {
        self.items = KeyedPriorityQueue::new();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<K, P> Default for EarliestFirstQueue<K, P>
where
    K: Hash + Eq,
    P: Ord,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, P> Debug for EarliestFirstQueue<K, P>
where
    K: Hash + Eq + Debug,
    P: Ord + Debug,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("EarliestFirstQueue")
            .field("len", &self.items.len())
            .field("next", &self.peek())
            .finish()
    }
}

#[test]
fn test_empty() {
    let mut q: EarliestFirstQueue<u64, u64> = EarliestFirstQueue::default();
    assert!(q.is_empty());
    assert_eq!(0, q.len());
    assert_eq!(q.peek(), None);
    assert_eq!(q.pop(), None);
    assert_eq!(q.pop_due(&u64::MAX), None);
}

#[test]
fn test_repeat_push_replaces_deadline() {
    let mut q: EarliestFirstQueue<u64, u64> = EarliestFirstQueue::new();
    assert_eq!(q.push(7, 200), None);
    assert_eq!(q.push(7, 400), Some(200));
    assert_eq!(q.push(7, 300), Some(400));
    assert_eq!(q.len(), 1);
    assert_eq!(q.pop(), Some((7, 300)));
    assert!(q.is_empty());
}

#[test]
fn test_earliest_deadline_first() {
    let mut q: EarliestFirstQueue<&'static str, u64> = EarliestFirstQueue::new();
    q.push("late", 850);
    q.push("early", 170);
    q.push("middle", 340);
    assert_eq!(q.pop(), Some(("early", 170)));
    assert_eq!(q.pop(), Some(("middle", 340)));
    assert_eq!(q.pop(), Some(("late", 850)));
    assert_eq!(q.pop(), None);
}

#[test]
fn test_pop_due() {
    let mut q: EarliestFirstQueue<u64, u64> = EarliestFirstQueue::new();
    q.push(1, 1000);
    q.push(2, 500);
    assert_eq!(q.pop_due(&499), None);
    assert_eq!(q.pop_due(&500), Some((2, 500)));
    assert_eq!(q.pop_due(&999), None);
    assert_eq!(q.pop_due(&5000), Some((1, 1000)));
    assert!(q.is_empty());
}

#[test]
fn test_remove_and_reschedule() {
    let mut q: EarliestFirstQueue<u64, u64> = EarliestFirstQueue::new();
    q.push(1, 10);
    q.push(2, 20);
    assert_eq!(q.remove(&1), Some(10));
    assert_eq!(q.remove(&1), None);
    assert_eq!(q.push(2, 5), Some(20));
    assert_eq!(q.peek(), Some((&2, &5)));
    q.clear();
    assert!(q.is_empty());
}
