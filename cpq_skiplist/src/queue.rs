use super::comparator::{Comparator, NaturalOrder};
use super::error::{QueueError, Result};
use super::skiplist::{Entries, SkipList};

pub const DEFAULT_HEIGHT: usize = 20;
pub const DEFAULT_DELETE_THRESHOLD: usize = 10;

/// A concurrent priority queue. Any number of threads may enqueue and dequeue at once; dequeue
/// hands out entries in key order under the queue's comparator, with one relaxation below.
///
/// Dequeued entries are only tombstoned at first. Once `delete_threshold` tombstones sit in front
/// of the minimum, the dequeuing thread unlinks them in one step. Enqueue never links a node
/// right after a tombstone, so a key smaller than the first live entry that arrives while
/// tombstones are still in front lands behind that entry instead:
///
/// ```
/// use cpq_skiplist::ConcurrentPriorityQueue;
///
/// let queue = ConcurrentPriorityQueue::new();
/// queue.enqueue(5, "five");
/// queue.enqueue(6, "six");
/// assert_eq!(queue.try_dequeue(), Some((5, "five")));
///
/// queue.enqueue(1, "one");
/// assert_eq!(queue.try_dequeue(), Some((6, "six")));
/// assert_eq!(queue.try_dequeue(), Some((1, "one")));
/// ```
///
/// With no tombstones in front of the minimum, every key is placed in order.
pub struct ConcurrentPriorityQueue<K, V, C = NaturalOrder>
where
    K: Send + 'static,
    V: Send + 'static,
{
    list: SkipList<K, V, C>,
}

/// Configures a queue before it is built. Defaults to a height of 20, a delete threshold of 10 and
/// the keys' natural order.
pub struct QueueBuilder<C = NaturalOrder> {
    height: usize,
    delete_threshold: usize,
    comparator: C,
}

impl Default for QueueBuilder {
    fn default() -> QueueBuilder {
        QueueBuilder {
            height: DEFAULT_HEIGHT,
            delete_threshold: DEFAULT_DELETE_THRESHOLD,
            comparator: NaturalOrder,
        }
    }
}

impl<C> QueueBuilder<C> {
    /// Number of index levels. Nodes get a height drawn uniformly from `1..height`.
    pub fn height(mut self, height: usize) -> Self {
        self.height = height;
        self
    }

    /// Tombstones a dequeue may step over before it unlinks them. Must be at least 2.
    pub fn delete_threshold(mut self, delete_threshold: usize) -> Self {
        self.delete_threshold = delete_threshold;
        self
    }

    pub fn comparator<D>(self, comparator: D) -> QueueBuilder<D> {
        QueueBuilder {
            height: self.height,
            delete_threshold: self.delete_threshold,
            comparator,
        }
    }

    pub fn build<K, V>(self) -> Result<ConcurrentPriorityQueue<K, V, C>>
    where
        K: Send + 'static,
        V: Send + 'static,
        C: Comparator<K>,
    {
        if self.height < 1 {
            return Err(QueueError::InvalidConfig("height", self.height));
        }
        if self.delete_threshold < 2 {
            return Err(QueueError::InvalidConfig(
                "delete_threshold",
                self.delete_threshold,
            ));
        }

        debug!(
            "building queue with height {} and delete threshold {}",
            self.height, self.delete_threshold
        );
        Ok(ConcurrentPriorityQueue {
            list: SkipList::new(self.height, self.delete_threshold, self.comparator),
        })
    }
}

impl<K, V> ConcurrentPriorityQueue<K, V>
where
    K: Ord + Send + 'static,
    V: Send + 'static,
{
    pub fn new() -> ConcurrentPriorityQueue<K, V> {
        ConcurrentPriorityQueue {
            list: SkipList::new(DEFAULT_HEIGHT, DEFAULT_DELETE_THRESHOLD, NaturalOrder),
        }
    }
}

impl<K, V> Default for ConcurrentPriorityQueue<K, V>
where
    K: Ord + Send + 'static,
    V: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl ConcurrentPriorityQueue<(), ()> {
    pub fn builder() -> QueueBuilder {
        QueueBuilder::default()
    }
}

impl<K, V, C> ConcurrentPriorityQueue<K, V, C>
where
    K: Send + 'static,
    V: Send + 'static,
    C: Comparator<K>,
{
    /// Adds an entry. Entries with equal keys enqueued by one thread are dequeued in the order
    /// they were enqueued. A key below the first live entry may be placed behind it while
    /// dequeued entries are still waiting to be unlinked; see the type level docs.
    pub fn enqueue(&self, key: K, value: V) {
        self.list.insert(key, value)
    }

    /// Removes and returns the first live entry, or `None` if there is none. That is the smallest
    /// key except in the case described on the type.
    pub fn try_dequeue(&self) -> Option<(K, V)>
    where
        K: Clone,
    {
        self.list.pop_min()
    }

    pub fn dequeue(&self) -> Result<(K, V)>
    where
        K: Clone,
    {
        self.try_dequeue().ok_or(QueueError::EmptyQueue)
    }

    /// Returns a copy of the entry with the smallest key without removing it.
    pub fn try_peek(&self) -> Option<(K, V)>
    where
        K: Clone,
        V: Clone,
    {
        self.list.peek()
    }

    pub fn peek(&self) -> Result<(K, V)>
    where
        K: Clone,
        V: Clone,
    {
        self.try_peek().ok_or(QueueError::EmptyQueue)
    }

    /// Removes every entry. Entries enqueued while `clear` runs may survive it.
    pub fn clear(&self) {
        self.list.clear()
    }

    /// Number of live entries. Walks the whole queue.
    pub fn count(&self) -> usize {
        self.list.count()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Copies of the live entries, in no guaranteed order. The walk is lazy, so it sees some of
    /// the changes made while it runs.
    ///
    /// The iterator pins the current thread for as long as it lives, which holds back the freeing
    /// of dequeued nodes on every thread. Drop it as soon as the walk is done.
    pub fn unordered_entries(&self) -> Entries<'_, K, V, C>
    where
        K: Clone,
        V: Clone,
    {
        self.list.entries()
    }

    pub fn height(&self) -> usize {
        self.list.height()
    }

    pub fn delete_threshold(&self) -> usize {
        self.list.delete_threshold()
    }

    pub fn comparator(&self) -> &C {
        self.list.comparator()
    }

    #[cfg(test)]
    fn raw_len(&self) -> usize {
        self.list.raw_len()
    }
}
