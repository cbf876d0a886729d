pub mod hashmap;
pub mod skiplist;

use crate::{
  data::record::{Key, Value},
  option::OverflowType,
};

/// In-memory fallback map of one bucket. Contents never reach the arena.
///
/// Implementations must be safe to read concurrently with a writer; the
/// engine still serialises writers through the owning bucket's guard.
pub trait OverflowStore: Sync + Send {
  /// Inserts or overwrites, returning the previous value if any.
  fn put(&self, key: Key, value: Value) -> Option<Value>;

  fn get(&self, key: &Key) -> Option<Value>;

  fn contains(&self, key: &Key) -> bool;

  fn len(&self) -> usize;
}

/// Creates an overflow store of the given type.
pub fn new_overflow_store(overflow_type: &OverflowType, capacity_hint: usize) -> Box<dyn OverflowStore> {
  match *overflow_type {
    OverflowType::HashMap => Box::new(hashmap::HashMapStore::with_capacity(capacity_hint)),
    OverflowType::SkipList => Box::new(skiplist::SkipListStore::new()),
  }
}
