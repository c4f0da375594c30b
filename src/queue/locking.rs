use super::PriorityQueue;

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::{Mutex, MutexGuard, PoisonError};

struct Entry<K, V> {
    key: K,
    sequence: u64,
    value: V,
}

// `BinaryHeap` pops its maximum, so the smallest key (then the oldest entry) compares greatest.
impl<K: Ord, V> Ord for Entry<K, V> {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .key
            .cmp(&self.key)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl<K: Ord, V> PartialOrd for Entry<K, V> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K: Ord, V> PartialEq for Entry<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<K: Ord, V> Eq for Entry<K, V> {}

struct Heap<K, V> {
    entries: BinaryHeap<Entry<K, V>>,
    sequence: u64,
}

/// A binary heap behind a single mutex. This is the baseline the skiplist queue is measured
/// against.
pub struct LockingPriorityQueue<K, V> {
    inner: Mutex<Heap<K, V>>,
}

impl<K: Ord, V> Default for LockingPriorityQueue<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord, V> LockingPriorityQueue<K, V> {
    pub fn new() -> LockingPriorityQueue<K, V> {
        LockingPriorityQueue {
            inner: Mutex::new(Heap {
                entries: BinaryHeap::new(),
                sequence: 0,
            }),
        }
    }

    // Every critical section leaves the heap consistent, so a poisoned lock is still usable.
    fn heap(&self) -> MutexGuard<'_, Heap<K, V>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn enqueue(&self, key: K, value: V) {
        let mut heap = self.heap();
        let sequence = heap.sequence;
        heap.sequence += 1;
        heap.entries.push(Entry {
            key,
            sequence,
            value,
        });
    }

    pub fn try_dequeue(&self) -> Option<(K, V)> {
        self.heap()
            .entries
            .pop()
            .map(|entry| (entry.key, entry.value))
    }

    pub fn try_peek(&self) -> Option<(K, V)>
    where
        K: Clone,
        V: Clone,
    {
        self.heap()
            .entries
            .peek()
            .map(|entry| (entry.key.clone(), entry.value.clone()))
    }

    pub fn clear(&self) {
        self.heap().entries.clear();
    }

    pub fn count(&self) -> usize {
        self.heap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap().entries.is_empty()
    }
}

impl<K, V> PriorityQueue<K, V> for LockingPriorityQueue<K, V>
where
    K: Ord + Clone + Send,
    V: Clone + Send,
{
    fn name(&self) -> &'static str {
        "locking"
    }

    fn enqueue(&self, key: K, value: V) {
        LockingPriorityQueue::enqueue(self, key, value)
    }

    fn try_dequeue(&self) -> Option<(K, V)> {
        LockingPriorityQueue::try_dequeue(self)
    }

    fn try_peek(&self) -> Option<(K, V)> {
        LockingPriorityQueue::try_peek(self)
    }

    fn clear(&self) {
        LockingPriorityQueue::clear(self)
    }
}
