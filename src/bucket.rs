use std::{
  ptr,
  sync::atomic::{AtomicBool, AtomicU64, Ordering},
};

use parking_lot::{Mutex, MutexGuard};

use crate::{
  data::record::{Key, Value, RECORD_SIZE},
  errors::BucketFull,
  fio::mmap::MmapArena,
  index::OverflowStore,
};

const RECORD: u64 = RECORD_SIZE as u64;

pub(crate) type BucketGuard<'a> = MutexGuard<'a, ()>;

/// A record position inside one bucket's arena range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Slot(u64);

impl Slot {
  /// Position in insertion order, 0 for the first record.
  pub(crate) fn number(&self) -> u64 {
    self.0 / RECORD
  }
}

/// One partition of the arena: a dense, append-only run of records plus the
/// overflow map that takes over once the run stops admitting keys.
///
/// `fill` only grows, and only under `guard`. Records below the published
/// fill are fully written, so readers may scan them without the guard.
pub(crate) struct Bucket {
  index: usize,
  base: u64,
  capacity: u64,
  limit: u64,
  fill: AtomicU64,
  guard: Mutex<()>,
  escalated: AtomicBool,
  overflow: Box<dyn OverflowStore>,
}

impl Bucket {
  /// `capacity` and `limit` are byte counts; `limit` is the share of
  /// `capacity` the escalation policy lets appends use.
  pub(crate) fn new(
    index: usize,
    base: u64,
    capacity: u64,
    limit: u64,
    overflow: Box<dyn OverflowStore>,
  ) -> Self {
    debug_assert!(capacity % RECORD == 0 && limit <= capacity);
    Self {
      index,
      base,
      capacity,
      limit,
      fill: AtomicU64::new(0),
      guard: Mutex::new(()),
      escalated: AtomicBool::new(false),
      overflow,
    }
  }

  /// Rebuilds the fill offset from arena contents: live records run up to the
  /// first slot whose key is all zero. Returns the number of live records.
  pub(crate) fn recover(&self, arena: &MmapArena) -> u64 {
    let _guard = self.guard.lock();
    let mut fill = 0;
    while fill < self.capacity {
      // SAFETY: guard held and no other thread knows this bucket yet.
      let key = unsafe { arena.read_key(self.base + fill) };
      if key.is_zero() {
        break;
      }
      fill += RECORD;
    }
    self.fill.store(fill, Ordering::Release);
    fill / RECORD
  }

  pub(crate) fn lock(&self) -> BucketGuard<'_> {
    self.guard.lock()
  }

  fn owns(&self, guard: &BucketGuard<'_>) -> bool {
    ptr::eq(MutexGuard::mutex(guard), &self.guard)
  }

  /// Linear scan of the filled region in insertion order.
  pub(crate) fn find(&self, arena: &MmapArena, key: &Key) -> Option<Slot> {
    let fill = self.fill.load(Ordering::Acquire);
    let mut offset = 0;
    while offset < fill {
      // SAFETY: keys below the published fill are immutable.
      if unsafe { arena.read_key(self.base + offset) } == *key {
        return Some(Slot(offset));
      }
      offset += RECORD;
    }
    None
  }

  /// Writes the value, then the key, then publishes the slot. A crash between
  /// the two copies leaves a zero key, which recovery treats as free space.
  pub(crate) fn append(
    &self,
    arena: &MmapArena,
    guard: &BucketGuard<'_>,
    key: &Key,
    value: &Value,
  ) -> Result<Slot, BucketFull> {
    debug_assert!(self.owns(guard));
    let fill = self.fill.load(Ordering::Relaxed);
    if fill + RECORD > self.limit {
      return Err(BucketFull(self.index));
    }

    let offset = self.base + fill;
    arena.write_value(offset, value);
    // SAFETY: we hold the guard and the slot is past the published fill, so
    // no reader looks at it yet.
    unsafe { arena.write_key(offset, key) }
    self.fill.store(fill + RECORD, Ordering::Release);
    Ok(Slot(fill))
  }

  pub(crate) fn update_in_place(
    &self,
    arena: &MmapArena,
    guard: &BucketGuard<'_>,
    slot: Slot,
    value: &Value,
  ) {
    debug_assert!(self.owns(guard));
    arena.write_value(self.base + slot.0, value)
  }

  /// Without this bucket's guard, an in-place update racing with the read
  /// may be observed half-written.
  pub(crate) fn read_value(&self, arena: &MmapArena, slot: Slot) -> Value {
    arena.read_value(self.base + slot.0)
  }

  /// Stores the record in the overflow map. Returns true if this was the
  /// first record the bucket ever sent there.
  pub(crate) fn put_overflow(&self, guard: &BucketGuard<'_>, key: Key, value: Value) -> bool {
    debug_assert!(self.owns(guard));
    self.overflow.put(key, value);
    !self.escalated.swap(true, Ordering::AcqRel)
  }

  pub(crate) fn get_overflow(&self, key: &Key) -> Option<Value> {
    if !self.is_escalated() {
      return None;
    }
    self.overflow.get(key)
  }

  pub(crate) fn overflow_contains(&self, key: &Key) -> bool {
    self.is_escalated() && self.overflow.contains(key)
  }

  pub(crate) fn is_escalated(&self) -> bool {
    self.escalated.load(Ordering::Acquire)
  }

  /// No further append can succeed. Saturation is permanent.
  pub(crate) fn is_saturated(&self) -> bool {
    self.fill.load(Ordering::Acquire) + RECORD > self.limit
  }

  pub(crate) fn is_full(&self) -> bool {
    self.fill.load(Ordering::Acquire) == self.capacity
  }

  pub(crate) fn records(&self) -> u64 {
    self.fill.load(Ordering::Acquire) / RECORD
  }

  pub(crate) fn overflow_len(&self) -> usize {
    self.overflow.len()
  }
}
