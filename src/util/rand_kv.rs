use rand::Rng;

use crate::data::record::{Key, Value, KEY_SIZE, VALUE_SIZE};

const KEY_PREFIX: &[u8] = b"nvmkv-";
const VALUE_PREFIX: &[u8] = b"nvmkv-value-";

/// Deterministic, never-zero key for index `i`.
pub fn get_test_key(i: usize) -> Key {
  let mut buf = [0u8; KEY_SIZE];
  buf[..KEY_PREFIX.len()].copy_from_slice(KEY_PREFIX);
  let digits = format!("{:010}", i as u64 % 10_000_000_000);
  buf[KEY_PREFIX.len()..].copy_from_slice(digits.as_bytes());
  Key::new(buf)
}

/// Value tagged with `i`, padded with random bytes.
pub fn get_test_value(i: usize) -> Value {
  let mut buf = [0u8; VALUE_SIZE];
  let tag = format!("{:010}-", i as u64 % 10_000_000_000);
  let tag_end = VALUE_PREFIX.len() + tag.len();
  buf[..VALUE_PREFIX.len()].copy_from_slice(VALUE_PREFIX);
  buf[VALUE_PREFIX.len()..tag_end].copy_from_slice(tag.as_bytes());
  rand::rng().fill(&mut buf[tag_end..]);
  Value::new(buf)
}

pub fn random_key<R: Rng + ?Sized>(rng: &mut R) -> Key {
  let mut buf = [0u8; KEY_SIZE];
  loop {
    rng.fill(&mut buf[..]);
    let key = Key::new(buf);
    if !key.is_zero() {
      return key;
    }
  }
}

pub fn random_value<R: Rng + ?Sized>(rng: &mut R) -> Value {
  let mut buf = [0u8; VALUE_SIZE];
  rng.fill(&mut buf[..]);
  Value::new(buf)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_get_test_key_value() {
    for i in 0..=10 {
      assert!(!get_test_key(i).is_zero());
      assert!(get_test_value(i).starts_with(VALUE_PREFIX));
    }
    assert_eq!(get_test_key(42).as_bytes(), b"nvmkv-0000000042");
    assert_ne!(get_test_key(1), get_test_key(2));
    assert_eq!(get_test_key(usize::MAX).as_bytes().len(), KEY_SIZE);
  }

  #[test]
  fn test_random_kv() {
    let mut rng = rand::rng();
    let key = random_key(&mut rng);
    assert!(!key.is_zero());
    assert_ne!(random_value(&mut rng), random_value(&mut rng));
  }
}
