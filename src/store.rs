use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use generational_arena::{Arena, Index};

#[derive(Debug)]
struct Node<K, V> {
  key: K,
  value: Arc<V>,
  next: Option<Index>,
  prev: Option<Index>,
}

/// The LRU store: an arena-backed doubly-linked recency list plus a hash
/// lookup from key to node. All operations are O(1) amortized.
///
/// Not safe for concurrent access. Single-owner discipline is enforced by
/// the actor that holds it, never by internal locking.
#[derive(Debug)]
pub(crate) struct EvictionStore<K: Eq + Hash + Clone, V> {
  // Arena stores all nodes contiguously.
  nodes: Arena<Node<K, V>>,
  // O(1) lookup of a key to its node index in the arena.
  lookup: HashMap<K, Index, ahash::RandomState>,
  // Head is the most-recently-used entry.
  head: Option<Index>,
  // Tail is the least-recently-used entry.
  tail: Option<Index>,
  // Maximum number of entries before an insertion evicts the tail.
  // Zero means unbounded.
  capacity: usize,
}

impl<K: Eq + Hash + Clone, V> EvictionStore<K, V> {
  pub fn new(capacity: usize) -> Self {
    Self {
      nodes: Arena::new(),
      lookup: HashMap::default(),
      head: None,
      tail: None,
      capacity,
    }
  }

  // Detaches a node from the list without touching the arena or the map.
  fn unlink(&mut self, index: Index) {
    let node = &self.nodes[index];
    let prev_node_idx = node.prev;
    let next_node_idx = node.next;

    if let Some(prev_idx) = prev_node_idx {
      self.nodes[prev_idx].next = next_node_idx;
    } else {
      // Unlinking the head of the list.
      self.head = next_node_idx;
    }

    if let Some(next_idx) = next_node_idx {
      self.nodes[next_idx].prev = prev_node_idx;
    } else {
      // Unlinking the tail of the list.
      self.tail = prev_node_idx;
    }
  }

  // Makes an already-allocated node the new head.
  fn push_front_node(&mut self, index: Index) {
    let old_head_idx = self.head;
    self.nodes[index].next = old_head_idx;
    self.nodes[index].prev = None;
    self.head = Some(index);

    if let Some(old_head) = old_head_idx {
      self.nodes[old_head].prev = Some(index);
    }

    if self.tail.is_none() {
      self.tail = Some(index);
    }
  }

  fn move_to_front(&mut self, index: Index) {
    if self.head != Some(index) {
      self.unlink(index);
      self.push_front_node(index);
    }
  }

  /// Looks up `key`, promoting it to most-recently-used on a hit.
  pub fn get(&mut self, key: &K) -> Option<Arc<V>> {
    if let Some(&index) = self.lookup.get(key) {
      self.move_to_front(index);
      Some(self.nodes[index].value.clone())
    } else {
      None
    }
  }

  /// Inserts or updates `key`, making it the most-recently-used entry.
  ///
  /// When a positive capacity is configured and the insertion pushes the
  /// length past it, the least-recently-used entry is evicted.
  pub fn put(&mut self, key: K, value: Arc<V>) {
    if let Some(&index) = self.lookup.get(&key) {
      self.nodes[index].value = value;
      self.move_to_front(index);
      return;
    }

    let node = Node {
      key: key.clone(),
      value,
      next: None,
      prev: None,
    };
    let index = self.nodes.insert(node);
    self.lookup.insert(key, index);
    self.push_front_node(index);

    if self.capacity != 0 && self.len() > self.capacity {
      self.evict_oldest();
    }
  }

  /// Removes `key` if present.
  pub fn remove(&mut self, key: &K) {
    if let Some(index) = self.lookup.remove(key) {
      self.unlink(index);
      self.nodes.remove(index);
    }
  }

  /// Evicts the least-recently-used entry, returning its key.
  pub fn evict_oldest(&mut self) -> Option<K> {
    let tail_index = self.tail?;
    self.unlink(tail_index);
    let node = self.nodes.remove(tail_index)?;
    self.lookup.remove(&node.key);
    Some(node.key)
  }

  /// Returns the number of entries currently held.
  pub fn len(&self) -> usize {
    self.lookup.len()
  }

  /// Purges every entry.
  pub fn clear(&mut self) {
    self.nodes.clear();
    self.lookup.clear();
    self.head = None;
    self.tail = None;
  }

  // A helper for tests, to get the order of keys from head to tail.
  #[cfg(test)]
  fn keys_as_vec(&self) -> Vec<K> {
    let mut keys = Vec::new();
    let mut current = self.head;
    while let Some(index) = current {
      keys.push(self.nodes[index].key.clone());
      current = self.nodes[index].next;
    }
    keys
  }
}

#[cfg(test)]
mod test {
  use super::*;

  fn unbounded() -> EvictionStore<i32, i32> {
    EvictionStore::new(0)
  }

  #[test]
  fn new_store_is_empty() {
    let store = unbounded();
    assert_eq!(store.len(), 0);
    assert!(store.keys_as_vec().is_empty(), "new store should hold no keys");
  }

  #[test]
  fn put_and_get_roundtrip() {
    let mut store = unbounded();
    store.put(1, Arc::new(10));
    store.put(2, Arc::new(20));

    assert_eq!(store.get(&1).as_deref(), Some(&10));
    assert_eq!(store.get(&2).as_deref(), Some(&20));
    assert_eq!(store.get(&3), None);
    assert_eq!(store.len(), 2);
  }

  #[test]
  fn get_promotes_to_front() {
    let mut store = unbounded();
    store.put(1, Arc::new(1));
    store.put(2, Arc::new(2));
    store.put(3, Arc::new(3));
    assert_eq!(store.keys_as_vec(), vec![3, 2, 1]);

    // Reading the LRU entry must make it the MRU entry.
    store.get(&1);
    assert_eq!(store.keys_as_vec(), vec![1, 3, 2]);
  }

  #[test]
  fn put_existing_updates_value_and_promotes() {
    let mut store = unbounded();
    store.put(1, Arc::new(10));
    store.put(2, Arc::new(20));
    store.put(1, Arc::new(11));

    assert_eq!(store.len(), 2, "update must not grow the store");
    assert_eq!(store.get(&1).as_deref(), Some(&11));
    assert_eq!(store.keys_as_vec(), vec![1, 2]);
  }

  #[test]
  fn capacity_evicts_least_recently_used() {
    let mut store = EvictionStore::new(2);
    store.put(1, Arc::new(1));
    store.put(2, Arc::new(2));
    store.put(3, Arc::new(3));

    assert_eq!(store.len(), 2);
    assert_eq!(store.get(&1), None, "oldest entry should have been evicted");
    assert_eq!(store.keys_as_vec(), vec![3, 2]);
  }

  #[test]
  fn promoted_entry_survives_eviction() {
    let mut store = EvictionStore::new(2);
    store.put(1, Arc::new(1));
    store.put(2, Arc::new(2));

    // Re-putting the oldest key promotes it, so the next insertion must
    // evict key 2, not key 1.
    store.put(1, Arc::new(1));
    store.put(3, Arc::new(3));

    assert_eq!(store.get(&2), None);
    assert!(store.get(&1).is_some());
    assert!(store.get(&3).is_some());
  }

  #[test]
  fn unbounded_store_grows_indefinitely() {
    let mut store = unbounded();
    for key in 0..1_000 {
      store.put(key, Arc::new(key));
    }
    assert_eq!(store.len(), 1_000);
  }

  #[test]
  fn remove_item_from_middle() {
    let mut store = unbounded();
    store.put(1, Arc::new(1));
    store.put(2, Arc::new(2));
    store.put(3, Arc::new(3));

    store.remove(&2);
    assert_eq!(store.len(), 2);
    assert_eq!(store.get(&2), None);
    assert_eq!(store.keys_as_vec(), vec![3, 1]);
  }

  #[test]
  fn remove_non_existent_item() {
    let mut store = unbounded();
    store.put(1, Arc::new(1));
    store.remove(&99);
    assert_eq!(store.len(), 1);
  }

  #[test]
  fn evict_oldest_returns_tail_key() {
    let mut store = unbounded();
    store.put(1, Arc::new(1));
    store.put(2, Arc::new(2));

    assert_eq!(store.evict_oldest(), Some(1));
    assert_eq!(store.evict_oldest(), Some(2));
    assert_eq!(store.evict_oldest(), None);
    assert_eq!(store.len(), 0);
  }

  #[test]
  fn clear_resets_store() {
    let mut store = unbounded();
    store.put(1, Arc::new(1));
    store.put(2, Arc::new(2));

    store.clear();
    assert_eq!(store.len(), 0);
    assert_eq!(store.get(&1), None);
    assert!(store.keys_as_vec().is_empty());

    // The store stays usable after a clear.
    store.put(3, Arc::new(3));
    assert_eq!(store.len(), 1);
  }
}
