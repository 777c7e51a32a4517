use parking_lot::RwLock;
use std::collections::HashMap;
use std::hash::Hash;

const NIL: usize = usize::MAX;

/// Thread-safe set of eviction candidates in least-recently-used order.
///
/// A slab of nodes linked by index forms the recency list (most recent at
/// the head), and a map from value to node slot gives O(1) membership and
/// removal. Freed slots are recycled through a free-slot list.
pub struct LruReplacer<T> {
    inner: RwLock<LruInner<T>>,
}

struct LruInner<T> {
    nodes: Vec<Node<T>>,
    free_slots: Vec<usize>,
    head: usize,
    tail: usize,
    map: HashMap<T, usize>,
}

struct Node<T> {
    value: Option<T>,
    prev: usize,
    next: usize,
}

impl<T> LruInner<T> {
    /// Detach the node at `idx` from the recency list.
    fn unlink(&mut self, idx: usize) {
        let (prev, next) = (self.nodes[idx].prev, self.nodes[idx].next);
        match prev {
            NIL => self.head = next,
            p => self.nodes[p].next = next,
        }
        match next {
            NIL => self.tail = prev,
            n => self.nodes[n].prev = prev,
        }
    }

    /// Link the node at `idx` in as the most recently used.
    fn push_front(&mut self, idx: usize) {
        self.nodes[idx].prev = NIL;
        self.nodes[idx].next = self.head;
        match self.head {
            NIL => self.tail = idx,
            h => self.nodes[h].prev = idx,
        }
        self.head = idx;
    }
}

impl<T: Eq + Hash + Clone> LruReplacer<T> {
    pub fn new() -> Self {
        LruReplacer {
            inner: RwLock::new(LruInner {
                nodes: Vec::new(),
                free_slots: Vec::new(),
                head: NIL,
                tail: NIL,
                map: HashMap::new(),
            }),
        }
    }

    /// Mark `value` most recently used, inserting it if absent.
    pub fn insert(&self, value: T) {
        let mut inner = self.inner.write();
        debug_assert_eq!(inner.map.len(), inner.nodes.len() - inner.free_slots.len());
        if let Some(&idx) = inner.map.get(&value) {
            inner.unlink(idx);
            inner.push_front(idx);
            return;
        }
        let idx = match inner.free_slots.pop() {
            Some(idx) => {
                inner.nodes[idx].value = Some(value.clone());
                idx
            }
            None => {
                inner.nodes.push(Node {
                    value: Some(value.clone()),
                    prev: NIL,
                    next: NIL,
                });
                inner.nodes.len() - 1
            }
        };
        inner.map.insert(value, idx);
        inner.push_front(idx);
    }

    /// Remove and return the least recently used value.
    pub fn victim(&self) -> Option<T> {
        let mut inner = self.inner.write();
        let idx = inner.tail;
        if idx == NIL {
            return None;
        }
        inner.unlink(idx);
        let value = inner.nodes[idx].value.take().expect("tail node is live");
        inner.free_slots.push(idx);
        let removed = inner.map.remove(&value);
        debug_assert!(removed.is_some());
        Some(value)
    }

    /// Remove `value` from the candidate set, reporting whether it was there.
    pub fn erase(&self, value: &T) -> bool {
        let mut inner = self.inner.write();
        match inner.map.remove(value) {
            Some(idx) => {
                inner.unlink(idx);
                inner.nodes[idx].value = None;
                inner.free_slots.push(idx);
                true
            }
            None => false,
        }
    }

    /// Number of eviction candidates.
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.read().map.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Eq + Hash + Clone> Default for LruReplacer<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_lru_basic() {
        let replacer = LruReplacer::new();
        for v in [1, 2, 3, 4, 5, 6] {
            replacer.insert(v);
        }
        // Re-referencing 1 moves it to the front.
        replacer.insert(1);
        assert_eq!(replacer.len(), 6);

        assert_eq!(replacer.victim(), Some(2));
        assert_eq!(replacer.victim(), Some(3));
        assert_eq!(replacer.victim(), Some(4));

        assert!(!replacer.erase(&4));
        assert!(replacer.erase(&6));
        assert_eq!(replacer.len(), 2);

        assert_eq!(replacer.victim(), Some(5));
        assert_eq!(replacer.victim(), Some(1));
        assert_eq!(replacer.victim(), None);
        assert!(replacer.is_empty());
    }

    #[test]
    fn test_lru_order() {
        let replacer = LruReplacer::new();
        for v in 0..64 {
            replacer.insert(v);
        }
        for v in 0..64 {
            assert_eq!(replacer.victim(), Some(v));
        }
        assert_eq!(replacer.victim(), None);
    }

    #[test]
    fn test_reinsert_changes_order() {
        let replacer = LruReplacer::new();
        replacer.insert('a');
        replacer.insert('b');
        replacer.insert('a');
        assert_eq!(replacer.victim(), Some('b'));
        assert_eq!(replacer.victim(), Some('a'));
    }

    #[test]
    fn test_slot_reuse() {
        let replacer = LruReplacer::new();
        for round in 0..10 {
            for v in 0..100 {
                replacer.insert(round * 100 + v);
            }
            for v in 0..100 {
                assert!(replacer.erase(&(round * 100 + v)));
            }
            assert!(replacer.is_empty());
        }
        // All slots were recycled, none grew beyond the first round.
        assert_eq!(replacer.inner.read().nodes.len(), 100);
    }

    #[test]
    fn test_concurrent_insert_victim() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 1000;
        let replacer: Arc<LruReplacer<usize>> = Arc::new(LruReplacer::new());
        let mut handles = vec![];
        for t in 0..THREADS {
            let replacer = Arc::clone(&replacer);
            handles.push(thread::spawn(move || {
                for i in 0..PER_THREAD {
                    replacer.insert(t * PER_THREAD + i);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(replacer.len(), THREADS * PER_THREAD);

        let mut victims = vec![];
        while let Some(v) = replacer.victim() {
            victims.push(v);
        }
        assert_eq!(victims.len(), THREADS * PER_THREAD);
        victims.sort_unstable();
        victims.dedup();
        assert_eq!(victims.len(), THREADS * PER_THREAD);
    }
}
