use crossbeam_skiplist::SkipMap;

use crate::data::record::{Key, Value};

use super::OverflowStore;

/// Lock-free overflow map; readers never wait on the bucket writer.
pub struct SkipListStore {
  skl: SkipMap<Key, Value>,
}

impl SkipListStore {
  pub fn new() -> Self {
    Self { skl: SkipMap::new() }
  }
}

impl Default for SkipListStore {
  fn default() -> Self {
    Self::new()
  }
}

impl OverflowStore for SkipListStore {
  fn put(&self, key: Key, value: Value) -> Option<Value> {
    let mut result = None;
    if let Some(entry) = self.skl.get(&key) {
      result = Some(*entry.value());
    }
    self.skl.insert(key, value);
    result
  }

  fn get(&self, key: &Key) -> Option<Value> {
    self.skl.get(key).map(|entry| *entry.value())
  }

  fn contains(&self, key: &Key) -> bool {
    self.skl.contains_key(key)
  }

  fn len(&self) -> usize {
    self.skl.len()
  }
}

#[cfg(test)]
mod tests {
  use std::{sync::Arc, thread};

  use crate::data::record::VALUE_SIZE;

  use super::*;

  #[test]
  fn test_skl_put_overwrites() {
    let store = SkipListStore::new();
    let key = Key::new(*b"skiplist-key-001");

    assert!(store.put(key, Value::new([1; VALUE_SIZE])).is_none());
    assert_eq!(
      store.put(key, Value::new([2; VALUE_SIZE])),
      Some(Value::new([1; VALUE_SIZE]))
    );
    assert_eq!(store.get(&key), Some(Value::new([2; VALUE_SIZE])));
    assert_eq!(store.len(), 1);
  }

  #[test]
  fn test_skl_concurrent_readers() {
    let store = Arc::new(SkipListStore::new());
    let key = Key::new(*b"skiplist-key-002");
    store.put(key, Value::new([0; VALUE_SIZE]));

    let reader = {
      let store = store.clone();
      thread::spawn(move || {
        for _ in 0..1000 {
          let value = store.get(&key).unwrap();
          // Replaced entries are whole values, never a mix.
          assert!(value.iter().all(|b| *b == value[0]));
        }
      })
    };
    for round in 0..1000u32 {
      store.put(key, Value::new([(round % 251) as u8; VALUE_SIZE]));
    }
    reader.join().unwrap();
    assert!(store.contains(&key));
  }
}
