use crossbeam::epoch::{Atomic, Guard, Shared};
use spin::{Mutex, MutexGuard};
use std::sync::atomic::{self, AtomicBool, AtomicUsize, Ordering};

// Set on every successor slot of a node whose last incoming link is gone. A marked slot no longer
// owns a reference and refuses writes, but still leads readers to the old successor.
const RETIRED: usize = 1;

/// Successor slots of a node or of the head sentinel. A null slot is the tail.
///
/// Every unmarked non-null slot owns one reference on its target, so writes go through `store` and
/// `compare_and_set`, which keep the counts balanced.
pub struct Tower<K, V> {
    successors: Box<[Atomic<Node<K, V>>]>,
}

impl<K, V> Tower<K, V> {
    pub fn new(height: usize) -> Tower<K, V> {
        Tower {
            successors: (0..height).map(|_| Atomic::null()).collect(),
        }
    }

    pub fn height(&self) -> usize {
        self.successors.len()
    }

    pub fn load<'g>(&self, level: usize, guard: &'g Guard) -> Shared<'g, Node<K, V>> {
        self.successors[level]
            .load(Ordering::Acquire, guard)
            .with_tag(0)
    }

    /// Points `level` at `new`. Returns false, leaving the slot untouched, if `new` has already been
    /// retired.
    ///
    /// # Safety
    ///
    /// `new` must have been loaded under `guard`. The tower must not be retired: it belongs to the
    /// head, or to a node kept alive by the caller's own reference or by a link the caller relies
    /// on. Nobody else may write `level` concurrently.
    pub unsafe fn store<'g>(
        &self,
        level: usize,
        new: Shared<'g, Node<K, V>>,
        guard: &'g Guard,
    ) -> bool {
        if !Node::acquire(new) {
            return false;
        }
        let old = self.successors[level].swap(new, Ordering::AcqRel, guard);
        Node::release(old, guard);
        true
    }

    /// Swings `level` from `current` to `new`. Fails if the slot changed, if its node has been
    /// retired or if `new` has.
    ///
    /// # Safety
    ///
    /// `current` and `new` must have been loaded under `guard`.
    pub unsafe fn compare_and_set<'g>(
        &self,
        level: usize,
        current: Shared<'g, Node<K, V>>,
        new: Shared<'g, Node<K, V>>,
        guard: &'g Guard,
    ) -> bool {
        if !Node::acquire(new) {
            return false;
        }
        match self.successors[level].compare_and_set(current, new, Ordering::AcqRel, guard) {
            Ok(_) => {
                Node::release(current, guard);
                true
            }
            Err(_) => {
                Node::release(new, guard);
                false
            }
        }
    }

    /// Marks every slot and hands back what they pointed at.
    fn retire(&self, retired: &mut Vec<*const Node<K, V>>, guard: &Guard) {
        for slot in self.successors.iter() {
            let old = slot.fetch_or(RETIRED, Ordering::AcqRel, guard);
            if !old.is_null() {
                retired.push(old.as_raw());
            }
        }
    }
}

pub struct Node<K, V> {
    pub key: K,
    // Doubles as the node lock: `deleted` only flips with it held.
    value: Mutex<Option<V>>,
    deleted: AtomicBool,
    inserting: AtomicBool,
    // Links pointing at this node, plus the inserter's own reference while enqueue runs.
    refs: AtomicUsize,
    pub tower: Tower<K, V>,
}

impl<K, V> Node<K, V> {
    /// Allocates a node holding a single reference, owned by the caller.
    pub fn allocate<'g>(key: K, value: V, height: usize, _guard: &'g Guard) -> Shared<'g, Self> {
        let node = Box::new(Node {
            key,
            value: Mutex::new(Some(value)),
            deleted: AtomicBool::new(false),
            inserting: AtomicBool::new(true),
            refs: AtomicUsize::new(1),
            tower: Tower::new(height),
        });
        Shared::from(Box::into_raw(node) as *const Self)
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::Acquire)
    }

    pub fn is_inserting(&self) -> bool {
        self.inserting.load(Ordering::Acquire)
    }

    pub fn finish_inserting(&self) {
        self.inserting.store(false, Ordering::Release);
    }

    pub fn lock(&self) -> NodeGuard<'_, K, V> {
        NodeGuard {
            node: self,
            value: self.value.lock(),
        }
    }

    /// Takes a reference unless the count already reached zero. The null tail always succeeds.
    unsafe fn acquire(node: Shared<'_, Self>) -> bool {
        let node = match node.as_ref() {
            Some(node) => node,
            None => return true,
        };
        let mut refs = node.refs.load(Ordering::Relaxed);
        loop {
            if refs == 0 {
                return false;
            }
            match node.refs.compare_exchange_weak(
                refs,
                refs + 1,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(current) => refs = current,
            }
        }
    }

    /// Drops a reference. When the last one goes the node's own links are dropped at once, so a
    /// whole unreachable chain is retired in one pass and freed in one batch once no pinned thread
    /// can still observe it.
    pub unsafe fn release(node: Shared<'_, Self>, guard: &Guard) {
        let mut pending = vec![node.as_raw()];
        let mut retired = Vec::new();

        while let Some(raw) = pending.pop() {
            let node = match raw.as_ref() {
                Some(node) => node,
                None => continue,
            };
            if node.refs.fetch_sub(1, Ordering::Release) == 1 {
                atomic::fence(Ordering::Acquire);
                node.tower.retire(&mut pending, guard);
                retired.push(raw as *mut Self);
            }
        }

        if !retired.is_empty() {
            trace!("retiring {} nodes", retired.len());
            guard.defer_unchecked(move || {
                for raw in retired {
                    drop(Box::from_raw(raw));
                }
            });
        }
    }

    #[cfg(test)]
    pub fn refs(&self) -> usize {
        self.refs.load(Ordering::Acquire)
    }
}

/// A locked node. Liveness checks and value access happen through it.
pub struct NodeGuard<'a, K, V> {
    node: &'a Node<K, V>,
    value: MutexGuard<'a, Option<V>>,
}

impl<'a, K, V> NodeGuard<'a, K, V> {
    /// Marks the node deleted and moves its value out. `None` if another thread got there first.
    pub fn claim(&mut self) -> Option<V> {
        if self.node.is_deleted() {
            return None;
        }
        self.node.deleted.store(true, Ordering::Release);
        self.value.take()
    }

    pub fn mark_deleted(&mut self) {
        self.node.deleted.store(true, Ordering::Release);
    }

    pub fn value(&self) -> Option<&V> {
        if self.node.is_deleted() {
            return None;
        }
        self.value.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::epoch;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn claim_happens_once() {
        let guard = &epoch::pin();
        let node = Node::allocate(1, "one".to_string(), 1, guard);
        let node_ref = unsafe { node.deref() };

        assert_eq!(node_ref.lock().value().map(String::as_str), Some("one"));
        assert_eq!(node_ref.lock().claim(), Some("one".to_string()));
        assert!(node_ref.is_deleted());
        assert_eq!(node_ref.lock().claim(), None);
        assert_eq!(node_ref.lock().value(), None);

        unsafe { Node::release(node, guard) };
    }

    #[test]
    fn concurrent_claims_hand_out_the_value_once() {
        let guard = &epoch::pin();
        let node = Node::allocate(1, 1, 1, guard);
        let raw = node.as_raw() as usize;

        let handles: Vec<_> = (0..8)
            .map(|_| {
                thread::spawn(move || {
                    let node = unsafe { &*(raw as *const Node<i32, i32>) };
                    node.lock().claim().is_some()
                })
            })
            .collect();
        let claimed = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|claimed| *claimed)
            .count();

        assert_eq!(claimed, 1);
        unsafe { Node::release(node, guard) };
    }

    #[test]
    fn links_hold_references() {
        let guard = &epoch::pin();
        let head: Tower<i32, i32> = Tower::new(2);
        let node = Node::allocate(1, 1, 2, guard);
        let node_ref = unsafe { node.deref() };

        unsafe {
            assert!(head.store(0, node, guard));
            assert!(head.compare_and_set(1, Shared::null(), node, guard));
        }
        assert_eq!(node_ref.refs(), 3);

        unsafe { Node::release(node, guard) };
        assert_eq!(node_ref.refs(), 2);

        unsafe {
            assert!(!head.compare_and_set(1, Shared::null(), node, guard));
            assert_eq!(node_ref.refs(), 2);
            assert!(head.store(1, Shared::null(), guard));
            assert!(head.store(0, Shared::null(), guard));
        }
    }

    #[test]
    fn retired_nodes_cannot_be_linked() {
        let guard = &epoch::pin();
        let head: Tower<i32, i32> = Tower::new(1);
        let node = Node::allocate(1, 1, 1, guard);

        unsafe {
            Node::release(node, guard);
            assert!(!head.store(0, node, guard));
        }
        assert!(head.load(0, guard).is_null());
    }

    #[test]
    fn retired_towers_refuse_writes_but_keep_their_successors() {
        let guard = &epoch::pin();
        let head: Tower<i32, i32> = Tower::new(1);
        let first = Node::allocate(1, 1, 1, guard);
        let second = Node::allocate(2, 2, 1, guard);
        let late = Node::allocate(3, 3, 1, guard);
        let (first_ref, second_ref) = unsafe { (first.deref(), second.deref()) };

        unsafe {
            assert!(first_ref.tower.store(0, second, guard));
            assert!(head.store(0, first, guard));
            Node::release(first, guard);
            assert_eq!(second_ref.refs(), 2);

            // Unlinking `first` drops its link on `second` at once.
            assert!(head.store(0, Shared::null(), guard));
            assert_eq!(second_ref.refs(), 1);
            assert!(first_ref.tower.load(0, guard) == second);
            assert!(!first_ref.tower.compare_and_set(0, second, late, guard));

            Node::release(second, guard);
            Node::release(late, guard);
        }
    }

    #[test]
    fn unlinked_chain_is_retired_in_one_pass() {
        struct Counted(Arc<AtomicUsize>);

        impl Drop for Counted {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let dropped = Arc::new(AtomicUsize::new(0));
        {
            let guard = &epoch::pin();
            let head: Tower<Counted, ()> = Tower::new(1);
            let mut last = Shared::null();
            for _ in 0..1000 {
                let node = Node::allocate(Counted(dropped.clone()), (), 1, guard);
                unsafe {
                    assert!(node.deref().tower.store(0, last, guard));
                    Node::release(last, guard);
                }
                last = node;
            }
            unsafe {
                assert!(head.store(0, last, guard));
                Node::release(last, guard);
                assert!(head.store(0, Shared::null(), guard));
            }
        }

        for _ in 0..1000 {
            if dropped.load(Ordering::SeqCst) == 1000 {
                break;
            }
            epoch::pin().flush();
            thread::yield_now();
        }
        assert_eq!(dropped.load(Ordering::SeqCst), 1000);
    }

    #[test]
    fn inserting_flag_is_cleared() {
        let guard = &epoch::pin();
        let node = Node::allocate(1, 1, 1, guard);
        let node_ref = unsafe { node.deref() };
        assert!(node_ref.is_inserting());
        node_ref.finish_inserting();
        assert!(!node_ref.is_inserting());
        unsafe { Node::release(node, guard) };
    }
}
