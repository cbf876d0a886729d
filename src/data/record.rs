use std::mem::{offset_of, size_of};

use derive_more::{Deref, From};

use crate::errors::{Errors, Result};

pub const KEY_SIZE: usize = 16;
pub const VALUE_SIZE: usize = 80;
pub const RECORD_SIZE: usize = size_of::<Record>();

/// Opaque 16-byte key, compared byte for byte.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, From, Deref)]
pub struct Key([u8; KEY_SIZE]);

/// Opaque 80-byte value.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, From, Deref)]
pub struct Value([u8; VALUE_SIZE]);

/// On-arena layout of one slot. Key first, value after, no framing.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record {
  pub key: Key,
  pub value: Value,
}

pub(crate) const KEY_OFFSET: usize = offset_of!(Record, key);
pub(crate) const VALUE_OFFSET: usize = offset_of!(Record, value);

const _: () = assert!(RECORD_SIZE == KEY_SIZE + VALUE_SIZE);
const _: () = assert!(KEY_OFFSET == 0 && VALUE_OFFSET == KEY_SIZE);

impl Key {
  pub const ZERO: Key = Key([0; KEY_SIZE]);

  pub fn new(bytes: [u8; KEY_SIZE]) -> Self {
    Key(bytes)
  }

  /// The all-zero key doubles as the "unwritten slot" marker in the arena.
  pub fn is_zero(&self) -> bool {
    self.0 == [0; KEY_SIZE]
  }

  pub fn as_bytes(&self) -> &[u8] {
    &self.0
  }
}

impl Value {
  pub const ZERO: Value = Value([0; VALUE_SIZE]);

  pub fn new(bytes: [u8; VALUE_SIZE]) -> Self {
    Value(bytes)
  }

  pub fn as_bytes(&self) -> &[u8] {
    &self.0
  }
}

impl TryFrom<&[u8]> for Key {
  type Error = Errors;

  fn try_from(buf: &[u8]) -> Result<Self> {
    let bytes: [u8; KEY_SIZE] = buf.try_into().map_err(|_| Errors::KeySizeMismatch {
      expected: KEY_SIZE,
      actual: buf.len(),
    })?;
    Ok(Key(bytes))
  }
}

impl TryFrom<&[u8]> for Value {
  type Error = Errors;

  fn try_from(buf: &[u8]) -> Result<Self> {
    let bytes: [u8; VALUE_SIZE] = buf.try_into().map_err(|_| Errors::ValueSizeMismatch {
      expected: VALUE_SIZE,
      actual: buf.len(),
    })?;
    Ok(Value(bytes))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_record_layout() {
    assert_eq!(RECORD_SIZE, 96);
    assert_eq!(KEY_OFFSET, 0);
    assert_eq!(VALUE_OFFSET, 16);
  }

  #[test]
  fn test_key_try_from() {
    let key = Key::try_from(&b"0123456789abcdef"[..]).unwrap();
    assert_eq!(key.as_bytes(), b"0123456789abcdef");
    assert!(!key.is_zero());

    let res = Key::try_from(&b"short"[..]);
    assert_eq!(
      res,
      Err(Errors::KeySizeMismatch {
        expected: KEY_SIZE,
        actual: 5
      })
    );
  }

  #[test]
  fn test_value_try_from() {
    let raw = vec![7u8; VALUE_SIZE];
    let value = Value::try_from(raw.as_slice()).unwrap();
    assert_eq!(value.as_bytes(), raw.as_slice());

    let res = Value::try_from(&raw[..VALUE_SIZE - 1]);
    assert!(matches!(res, Err(Errors::ValueSizeMismatch { actual: 79, .. })));
  }

  #[test]
  fn test_zero_key() {
    assert!(Key::ZERO.is_zero());
    assert!(Key::from([0u8; KEY_SIZE]).is_zero());
    let mut raw = [0u8; KEY_SIZE];
    raw[15] = 1;
    assert!(!Key::new(raw).is_zero());
  }
}
