//! Recency ring: a slab-backed doubly linked list paired with a key index.
//!
//! Links are slab indices rather than pointers. Freed slots are recycled
//! through a free list. The list and the index are only ever changed
//! together, so a key is indexed exactly when its node is linked.

use std::collections::HashMap;

use strata_core::Timestamp;

/// Index into the slab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct SlabIdx(u32);

/// Bookkeeping for one cached entry. The payload lives in the byte store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecencyNode {
    pub key: String,
    pub last_visit: Timestamp,
}

#[derive(Debug)]
struct SlabNode {
    value: RecencyNode,
    prev: Option<SlabIdx>,
    next: Option<SlabIdx>,
}

/// Least-recently-used order over keys. Front is oldest, back is newest.
#[derive(Debug, Default)]
pub struct Ring {
    slots: Vec<Option<SlabNode>>,
    free_indices: Vec<u32>,
    head: Option<SlabIdx>,
    tail: Option<SlabIdx>,
    index: HashMap<String, SlabIdx>,
}

impl Ring {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&RecencyNode> {
        let idx = *self.index.get(key)?;
        self.node(idx).map(|n| &n.value)
    }

    /// Refresh `key` and move it to the back. Returns false if absent.
    pub fn touch(&mut self, key: &str, now: Timestamp) -> bool {
        let Some(&idx) = self.index.get(key) else {
            return false;
        };
        if let Some(node) = self.node_mut(idx) {
            node.value.last_visit = now;
        }
        self.move_to_back(idx);
        true
    }

    /// Touch `key` if present, else append a fresh node at the back.
    pub fn upsert(&mut self, key: &str, now: Timestamp) {
        if !self.touch(key, now) {
            let idx = self.push_back(RecencyNode {
                key: key.to_string(),
                last_visit: now,
            });
            self.index.insert(key.to_string(), idx);
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<RecencyNode> {
        let idx = self.index.remove(key)?;
        self.unlink(idx)
    }

    /// Oldest node, if any.
    pub fn front(&self) -> Option<&RecencyNode> {
        self.head.and_then(|idx| self.node(idx)).map(|n| &n.value)
    }

    pub fn pop_front(&mut self) -> Option<RecencyNode> {
        let idx = self.head?;
        let node = self.unlink(idx)?;
        self.index.remove(&node.key);
        Some(node)
    }

    /// Remove every node, returning them oldest first.
    pub fn drain(&mut self) -> Vec<RecencyNode> {
        let mut out = Vec::with_capacity(self.len());
        while let Some(node) = self.pop_front() {
            out.push(node);
        }
        self.slots.clear();
        self.free_indices.clear();
        out
    }

    /// Keys oldest first.
    pub fn keys(&self) -> Vec<&str> {
        let mut out = Vec::with_capacity(self.len());
        let mut current = self.head;
        while let Some(idx) = current {
            let Some(node) = self.node(idx) else { break };
            out.push(node.value.key.as_str());
            current = node.next;
        }
        out
    }

    // -- Internal helpers --

    fn push_back(&mut self, value: RecencyNode) -> SlabIdx {
        let idx = self.alloc_slot(value);
        if let Some(old_tail) = self.tail {
            if let Some(n) = self.node_mut(old_tail) {
                n.next = Some(idx);
            }
            if let Some(n) = self.node_mut(idx) {
                n.prev = Some(old_tail);
            }
        } else {
            self.head = Some(idx);
        }
        self.tail = Some(idx);
        idx
    }

    fn unlink(&mut self, idx: SlabIdx) -> Option<RecencyNode> {
        let node = self.slots.get_mut(idx.0 as usize)?.take()?;
        self.detach(node.prev, node.next);
        self.free_indices.push(idx.0);
        Some(node.value)
    }

    /// Repair the neighbours of a node that is leaving its position.
    fn detach(&mut self, prev: Option<SlabIdx>, next: Option<SlabIdx>) {
        match prev {
            Some(p) => {
                if let Some(n) = self.node_mut(p) {
                    n.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(nx) => {
                if let Some(n) = self.node_mut(nx) {
                    n.prev = prev;
                }
            }
            None => self.tail = prev,
        }
    }

    fn move_to_back(&mut self, idx: SlabIdx) {
        if self.tail == Some(idx) {
            return;
        }
        let Some((prev, next)) = self.node(idx).map(|n| (n.prev, n.next)) else {
            return;
        };
        self.detach(prev, next);

        let old_tail = self.tail;
        if let Some(t) = old_tail {
            if let Some(n) = self.node_mut(t) {
                n.next = Some(idx);
            }
        }
        if let Some(n) = self.node_mut(idx) {
            n.prev = old_tail;
            n.next = None;
        }
        if self.head.is_none() {
            self.head = Some(idx);
        }
        self.tail = Some(idx);
    }

    fn alloc_slot(&mut self, value: RecencyNode) -> SlabIdx {
        let node = SlabNode {
            value,
            prev: None,
            next: None,
        };
        if let Some(free) = self.free_indices.pop() {
            self.slots[free as usize] = Some(node);
            SlabIdx(free)
        } else {
            self.slots.push(Some(node));
            SlabIdx((self.slots.len() - 1) as u32)
        }
    }

    fn node(&self, idx: SlabIdx) -> Option<&SlabNode> {
        self.slots.get(idx.0 as usize)?.as_ref()
    }

    fn node_mut(&mut self, idx: SlabIdx) -> Option<&mut SlabNode> {
        self.slots.get_mut(idx.0 as usize)?.as_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;
    use std::collections::VecDeque;

    #[test]
    fn test_upsert_orders_by_recency() {
        let now = Utc::now();
        let mut ring = Ring::new();
        ring.upsert("a", now);
        ring.upsert("b", now);
        ring.upsert("c", now);
        assert_eq!(ring.keys(), vec!["a", "b", "c"]);

        ring.upsert("a", now);
        assert_eq!(ring.keys(), vec!["b", "c", "a"]);
        assert_eq!(ring.front().map(|n| n.key.as_str()), Some("b"));
        assert_eq!(ring.len(), 3);
    }

    #[test]
    fn test_touch_refreshes_last_visit() {
        let t0 = Utc::now();
        let t1 = t0 + chrono::Duration::seconds(5);
        let mut ring = Ring::new();
        ring.upsert("a", t0);
        assert!(ring.touch("a", t1));
        assert_eq!(ring.get("a").map(|n| n.last_visit), Some(t1));
        assert!(!ring.touch("missing", t1));
    }

    #[test]
    fn test_remove_middle_and_ends() {
        let now = Utc::now();
        let mut ring = Ring::new();
        for k in ["a", "b", "c", "d"] {
            ring.upsert(k, now);
        }
        assert!(ring.remove("b").is_some());
        assert_eq!(ring.keys(), vec!["a", "c", "d"]);
        assert!(ring.remove("a").is_some());
        assert!(ring.remove("d").is_some());
        assert_eq!(ring.keys(), vec!["c"]);
        assert!(ring.remove("zzz").is_none());
    }

    #[test]
    fn test_pop_front_and_slot_reuse() {
        let now = Utc::now();
        let mut ring = Ring::new();
        ring.upsert("a", now);
        ring.upsert("b", now);
        assert_eq!(ring.pop_front().map(|n| n.key), Some("a".to_string()));
        ring.upsert("c", now);
        assert_eq!(ring.slots.len(), 2);
        assert_eq!(ring.keys(), vec!["b", "c"]);
    }

    #[test]
    fn test_drain_empties_ring() {
        let now = Utc::now();
        let mut ring = Ring::new();
        ring.upsert("a", now);
        ring.upsert("b", now);
        let drained: Vec<String> = ring.drain().into_iter().map(|n| n.key).collect();
        assert_eq!(drained, vec!["a", "b"]);
        assert!(ring.is_empty());
        assert!(ring.front().is_none());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Upsert(u8),
        Remove(u8),
        Pop,
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..8).prop_map(Op::Upsert),
            (0u8..8).prop_map(Op::Remove),
            Just(Op::Pop),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(300))]

        /// Property: the ring matches a naive recency list after any op sequence.
        #[test]
        fn prop_ring_matches_model(ops in prop::collection::vec(op_strategy(), 0..64)) {
            let now = Utc::now();
            let mut ring = Ring::new();
            let mut model: VecDeque<String> = VecDeque::new();

            for op in ops {
                match op {
                    Op::Upsert(k) => {
                        let key = k.to_string();
                        ring.upsert(&key, now);
                        model.retain(|m| m != &key);
                        model.push_back(key);
                    }
                    Op::Remove(k) => {
                        let key = k.to_string();
                        let removed = ring.remove(&key).is_some();
                        let before = model.len();
                        model.retain(|m| m != &key);
                        prop_assert_eq!(removed, before != model.len());
                    }
                    Op::Pop => {
                        let popped = ring.pop_front().map(|n| n.key);
                        prop_assert_eq!(popped, model.pop_front());
                    }
                }
                let keys: Vec<String> = ring.keys().into_iter().map(String::from).collect();
                prop_assert_eq!(keys, model.iter().cloned().collect::<Vec<_>>());
                prop_assert_eq!(ring.len(), model.len());
            }
        }
    }
}
