pub mod locking;

use cpq_skiplist::{Comparator, ConcurrentPriorityQueue};

/// Operations shared by every queue the benchmark can drive.
pub trait PriorityQueue<K, V>: Send + Sync {
    fn name(&self) -> &'static str;

    fn enqueue(&self, key: K, value: V);

    fn try_dequeue(&self) -> Option<(K, V)>;

    fn try_peek(&self) -> Option<(K, V)>;

    fn clear(&self);
}

impl<K, V, C> PriorityQueue<K, V> for ConcurrentPriorityQueue<K, V, C>
where
    K: Clone + Send + Sync + 'static,
    V: Clone + Send + 'static,
    C: Comparator<K>,
{
    fn name(&self) -> &'static str {
        "concurrent"
    }

    fn enqueue(&self, key: K, value: V) {
        ConcurrentPriorityQueue::enqueue(self, key, value)
    }

    fn try_dequeue(&self) -> Option<(K, V)> {
        ConcurrentPriorityQueue::try_dequeue(self)
    }

    fn try_peek(&self) -> Option<(K, V)> {
        ConcurrentPriorityQueue::try_peek(self)
    }

    fn clear(&self) {
        ConcurrentPriorityQueue::clear(self)
    }
}
