use std::collections::HashMap;

use parking_lot::RwLock;

use crate::data::record::{Key, Value};

use super::OverflowStore;

pub struct HashMapStore {
  map: RwLock<HashMap<Key, Value>>,
}

impl HashMapStore {
  pub fn with_capacity(capacity: usize) -> Self {
    Self {
      map: RwLock::new(HashMap::with_capacity(capacity)),
    }
  }
}

impl OverflowStore for HashMapStore {
  fn put(&self, key: Key, value: Value) -> Option<Value> {
    let mut write_guard = self.map.write();
    write_guard.insert(key, value)
  }

  fn get(&self, key: &Key) -> Option<Value> {
    let read_guard = self.map.read();
    read_guard.get(key).copied()
  }

  fn contains(&self, key: &Key) -> bool {
    self.map.read().contains_key(key)
  }

  fn len(&self) -> usize {
    self.map.read().len()
  }
}

#[cfg(test)]
mod tests {
  use crate::data::record::VALUE_SIZE;

  use super::*;

  #[test]
  fn test_hashmap_put() {
    let store = HashMapStore::with_capacity(16);
    let key = Key::new(*b"overflow-key-001");

    let res1 = store.put(key, Value::new([1; VALUE_SIZE]));
    assert!(res1.is_none());

    let res2 = store.put(key, Value::new([2; VALUE_SIZE]));
    assert_eq!(res2, Some(Value::new([1; VALUE_SIZE])));
    assert_eq!(store.len(), 1);
  }

  #[test]
  fn test_hashmap_get() {
    let store = HashMapStore::with_capacity(0);
    let key = Key::new(*b"overflow-key-002");
    assert!(store.get(&key).is_none());
    assert!(!store.contains(&key));
    assert_eq!(store.len(), 0);

    store.put(key, Value::new([9; VALUE_SIZE]));
    assert_eq!(store.get(&key), Some(Value::new([9; VALUE_SIZE])));
    assert!(store.contains(&key));
    assert!(!store.contains(&Key::new(*b"overflow-key-003")));
  }
}
