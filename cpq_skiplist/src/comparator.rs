use std::cmp::Ordering;

/// A total order over queue keys. The smallest key is dequeued first.
///
/// Any `Fn(&K, &K) -> Ordering` closure is a comparator, so a custom order can be passed inline:
///
/// ```
/// use cpq_skiplist::ConcurrentPriorityQueue;
///
/// let queue = ConcurrentPriorityQueue::builder()
///     .comparator(|a: &i32, b: &i32| b.cmp(a))
///     .build()
///     .unwrap();
/// queue.enqueue(1, "low");
/// queue.enqueue(2, "high");
/// assert_eq!(queue.try_dequeue(), Some((2, "high")));
/// ```
pub trait Comparator<K>: Send + Sync {
    fn compare(&self, a: &K, b: &K) -> Ordering;
}

/// Orders keys by their `Ord` implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct NaturalOrder;

impl<K: Ord> Comparator<K> for NaturalOrder {
    fn compare(&self, a: &K, b: &K) -> Ordering {
        a.cmp(b)
    }
}

impl<K, F> Comparator<K> for F
where
    F: Fn(&K, &K) -> Ordering + Send + Sync,
{
    fn compare(&self, a: &K, b: &K) -> Ordering {
        self(a, b)
    }
}
