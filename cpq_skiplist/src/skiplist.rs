use super::buffer_pool::{BufferPool, PooledBuffer};
use super::comparator::Comparator;
use super::node::{Node, Tower};
use crossbeam::epoch::{self, Guard, Shared};
use crossbeam::utils::Backoff;
use rand::Rng;
use spin::Mutex;
use std::cmp::Ordering;
use std::ptr;

/// Where a key belongs on every level.
///
/// A null predecessor is the head, a null successor is the tail.
struct Location<'a, K, V> {
    predecessors: PooledBuffer<'a, Node<K, V>>,
    successors: PooledBuffer<'a, Node<K, V>>,
    // The node the level 0 walk stepped onto because its predecessor was deleted.
    last_deleted: *const Node<K, V>,
}

impl<'a, K, V> Location<'a, K, V> {
    fn predecessor<'g>(&self, level: usize, _guard: &'g Guard) -> Shared<'g, Node<K, V>> {
        Shared::from(self.predecessors[level])
    }

    fn successor<'g>(&self, level: usize, _guard: &'g Guard) -> Shared<'g, Node<K, V>> {
        Shared::from(self.successors[level])
    }
}

pub struct SkipList<K: Send + 'static, V: Send + 'static, C> {
    head: Tower<K, V>,
    // Serializes writes to the head's level 0 slot.
    head_lock: Mutex<()>,
    height: usize,
    delete_threshold: usize,
    comparator: C,
    pool: BufferPool<Node<K, V>>,
}

impl<K, V, C> SkipList<K, V, C>
where
    K: Send + 'static,
    V: Send + 'static,
    C: Comparator<K>,
{
    pub fn new(height: usize, delete_threshold: usize, comparator: C) -> SkipList<K, V, C> {
        debug_assert!(height >= 1);
        debug_assert!(delete_threshold >= 2);

        SkipList {
            head: Tower::new(height),
            head_lock: Mutex::new(()),
            height,
            delete_threshold,
            comparator,
            pool: BufferPool::new(height),
        }
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn delete_threshold(&self) -> usize {
        self.delete_threshold
    }

    pub fn comparator(&self) -> &C {
        &self.comparator
    }

    fn random_height(&self) -> usize {
        if self.height <= 2 {
            1
        } else {
            rand::thread_rng().gen_range(1, self.height)
        }
    }

    fn tower<'g>(&'g self, node: Shared<'g, Node<K, V>>) -> &'g Tower<K, V> {
        match unsafe { node.as_ref() } {
            Some(node) => &node.tower,
            None => &self.head,
        }
    }

    fn is_deleted(node: Shared<'_, Node<K, V>>) -> bool {
        unsafe { node.as_ref() }.map_or(false, Node::is_deleted)
    }

    fn locate<'g>(&'g self, key: &K, guard: &'g Guard) -> Location<'g, K, V> {
        let mut location = Location {
            predecessors: self.pool.rent(),
            successors: self.pool.rent(),
            last_deleted: ptr::null(),
        };

        let mut pred: Shared<'g, Node<K, V>> = Shared::null();
        for level in (0..self.height).rev() {
            let mut current = self.tower(pred).load(level, guard);

            while let Some(node) = unsafe { current.as_ref() } {
                if level == 0 && Self::is_deleted(pred) {
                    location.last_deleted = current.as_raw();
                } else if !node.is_deleted()
                    && self.comparator.compare(&node.key, key) == Ordering::Greater
                {
                    break;
                }

                pred = current;
                current = node.tower.load(level, guard);
            }

            location.predecessors[level] = pred.as_raw();
            location.successors[level] = current.as_raw();
        }

        location
    }

    pub fn insert(&self, key: K, value: V) {
        let height = self.random_height();
        let guard = &epoch::pin();

        let node = Node::allocate(key, value, height, guard);
        let entry = unsafe { node.deref() };

        let mut location = self.locate(&entry.key, guard);
        loop {
            let pred = location.predecessor(0, guard);
            let succ = location.successor(0, guard);

            let linked = unsafe { entry.tower.store(0, succ, guard) }
                && self.link_first(pred, succ, node, guard);
            if linked {
                break;
            }

            location = self.locate(&entry.key, guard);
        }

        let mut level = 1;
        while level < height {
            let succ = location.successor(level, guard);
            if entry.is_deleted()
                || Self::is_deleted(succ)
                || (!succ.is_null() && succ.as_raw() == location.last_deleted)
            {
                break;
            }

            if !unsafe { entry.tower.store(level, succ, guard) } {
                break;
            }

            let pred = self.tower(location.predecessor(level, guard));
            if unsafe { pred.compare_and_set(level, succ, node, guard) } {
                level += 1;
                continue;
            }

            location = self.locate(&entry.key, guard);
            if location.predecessor(0, guard) != node {
                break;
            }
        }

        entry.finish_inserting();
        unsafe { Node::release(node, guard) };
    }

    /// Swings the level 0 link of `pred` from `succ` to `node`, holding the lock of `pred`.
    fn link_first<'g>(
        &'g self,
        pred: Shared<'g, Node<K, V>>,
        succ: Shared<'g, Node<K, V>>,
        node: Shared<'g, Node<K, V>>,
        guard: &'g Guard,
    ) -> bool {
        if Self::is_deleted(succ) {
            return false;
        }

        match unsafe { pred.as_ref() } {
            None => {
                let _lock = self.head_lock.lock();
                unsafe { self.head.compare_and_set(0, succ, node, guard) }
            }
            Some(pred) => {
                let _lock = pred.lock();
                // A deleted predecessor may already be behind the head; linking after it is only
                // safe at the very end of the list.
                (succ.is_null() || !pred.is_deleted())
                    && unsafe { pred.tower.compare_and_set(0, succ, node, guard) }
            }
        }
    }

    /// Claims the first live node, and once enough tombstones have piled up in front of it moves
    /// the head past them.
    pub fn pop_min(&self) -> Option<(K, V)>
    where
        K: Clone,
    {
        let guard = &epoch::pin();

        let observed_head = self.head.load(0, guard);
        let mut new_head = Shared::null();
        let mut deleted_count = 0;
        let mut current = observed_head;

        let (claimed, entry) = loop {
            let node = unsafe { current.as_ref() }?;

            if new_head.is_null() && node.is_inserting() {
                new_head = current;
            }

            if !node.is_deleted() {
                if let Some(value) = node.lock().claim() {
                    deleted_count += 1;
                    break (current, (node.key.clone(), value));
                }
            }

            deleted_count += 1;
            current = node.tower.load(0, guard);
        };

        if deleted_count >= self.delete_threshold {
            if new_head.is_null() {
                new_head = claimed;
            }
            if self.advance_head(observed_head, new_head, guard) {
                trace!("head advanced past {} deleted nodes", deleted_count);
                self.remove_deleted_prefix(guard);
            }
        }

        Some(entry)
    }

    fn advance_head<'g>(
        &'g self,
        observed: Shared<'g, Node<K, V>>,
        new_head: Shared<'g, Node<K, V>>,
        guard: &'g Guard,
    ) -> bool {
        let _lock = self.head_lock.lock();
        self.head.load(0, guard) == observed && unsafe { self.head.store(0, new_head, guard) }
    }

    /// Drops stale upper level head links to deleted nodes. Level 0 is left to `pop_min`.
    fn remove_deleted_prefix(&self, guard: &Guard) {
        for level in (1..self.height).rev() {
            let backoff = Backoff::new();
            loop {
                let first = self.head.load(level, guard);
                let node = match unsafe { first.as_ref() } {
                    Some(node) if node.is_deleted() => node,
                    _ => break,
                };

                let mut live = node.tower.load(level, guard);
                while let Some(next) = unsafe { live.as_ref() } {
                    if !next.is_deleted() {
                        break;
                    }
                    live = next.tower.load(level, guard);
                }

                if unsafe { self.head.compare_and_set(level, first, live, guard) } {
                    break;
                }
                backoff.spin();
            }
        }
    }

    pub fn peek(&self) -> Option<(K, V)>
    where
        K: Clone,
        V: Clone,
    {
        let guard = &epoch::pin();

        let mut current = self.head.load(0, guard);
        while let Some(node) = unsafe { current.as_ref() } {
            if !node.is_deleted() {
                if let Some(value) = node.lock().value() {
                    return Some((node.key.clone(), value.clone()));
                }
            }
            current = node.tower.load(0, guard);
        }

        None
    }

    pub fn is_empty(&self) -> bool {
        let guard = &epoch::pin();

        let mut current = self.head.load(0, guard);
        while let Some(node) = unsafe { current.as_ref() } {
            if !node.is_deleted() {
                return false;
            }
            current = node.tower.load(0, guard);
        }

        true
    }

    /// Detaches every node from the head and marks them deleted. Nodes linked concurrently after
    /// the detach survive.
    pub fn clear(&self) {
        let guard = &epoch::pin();

        let first = {
            let _lock = self.head_lock.lock();
            let first = self.head.load(0, guard);
            for level in 0..self.height {
                unsafe { self.head.store(level, Shared::null(), guard) };
            }
            first
        };

        let mut current = first;
        let mut cleared = 0;
        while let Some(node) = unsafe { current.as_ref() } {
            node.lock().mark_deleted();
            cleared += 1;
            current = node.tower.load(0, guard);
        }
        debug!("cleared {} nodes", cleared);
    }

    pub fn count(&self) -> usize {
        self.iter().filter(|node| !node.is_deleted()).count()
    }

    #[cfg(test)]
    pub fn raw_len(&self) -> usize {
        self.iter().count()
    }

    fn iter(&self) -> Iter<'_, K, V, C> {
        let guard = epoch::pin();
        let current = self.head.load(0, &guard).as_raw();
        Iter {
            _list: self,
            guard,
            current,
        }
    }

    pub fn entries(&self) -> Entries<'_, K, V, C>
    where
        K: Clone,
        V: Clone,
    {
        Entries { inner: self.iter() }
    }
}

impl<K: Send + 'static, V: Send + 'static, C> Drop for SkipList<K, V, C> {
    fn drop(&mut self) {
        let guard = &epoch::pin();

        // An upper level link may point back at a node earlier on level 0, which would keep a
        // cycle alive. Cut them on every listed node before letting go of the list.
        let mut current = self.head.load(0, guard);
        while let Some(node) = unsafe { current.as_ref() } {
            for level in 1..node.tower.height() {
                unsafe { node.tower.store(level, Shared::null(), guard) };
            }
            current = node.tower.load(0, guard);
        }

        for level in 0..self.height {
            unsafe { self.head.store(level, Shared::null(), guard) };
        }
        guard.flush();
    }
}

/// Level 0 walk over every node reachable from the head, tombstones included.
struct Iter<'a, K: Send + 'static, V: Send + 'static, C> {
    _list: &'a SkipList<K, V, C>,
    guard: Guard,
    current: *const Node<K, V>,
}

impl<'a, K: Send + 'static, V: Send + 'static, C> Iterator for Iter<'a, K, V, C> {
    type Item = &'a Node<K, V>;

    fn next(&mut self) -> Option<&'a Node<K, V>> {
        // Nodes stay allocated while `guard` is pinned, and the iterator cannot outlive the list.
        let node: &'a Node<K, V> = unsafe { self.current.as_ref() }?;
        self.current = node.tower.load(0, &self.guard).as_raw();
        Some(node)
    }
}

/// Live entries of a list, copied out one at a time.
///
/// The iterator keeps the current thread pinned until it is dropped, and no retired node is freed
/// on any thread meanwhile.
pub struct Entries<'a, K: Send + 'static, V: Send + 'static, C> {
    inner: Iter<'a, K, V, C>,
}

impl<K, V, C> Iterator for Entries<'_, K, V, C>
where
    K: Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    type Item = (K, V);

    fn next(&mut self) -> Option<(K, V)> {
        for node in &mut self.inner {
            if node.is_deleted() {
                continue;
            }
            if let Some(value) = node.lock().value() {
                return Some((node.key.clone(), value.clone()));
            }
        }
        None
    }
}
