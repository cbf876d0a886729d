use std::sync::atomic::{AtomicU64, Ordering};

use log::{error, info, warn};
use xxhash_rust::xxh3::xxh3_64;

use crate::{
  bucket::{Bucket, BucketGuard},
  data::record::{Key, Value, RECORD_SIZE},
  errors::{BucketFull, Result},
  fio::{self, mmap::MmapArena},
  index::new_overflow_store,
  option::{Options, ReadMode},
  policy::Location,
};

/// Storage engine instance.
///
/// All buckets are created once at open and indexed by `hash(key) & mask`;
/// the bucket count never changes for the lifetime of the instance.
pub struct Engine {
  options: Options,
  arena: MmapArena,
  buckets: Vec<Bucket>,
  mask: u64,
  get_count: AtomicU64,
  set_count: AtomicU64,
  closed: bool,
}

/// Snapshot of engine counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stat {
  /// Records resident in the arena.
  pub arena_records: u64,
  /// Records held only in overflow maps.
  pub overflow_records: usize,
  /// Buckets that have sent at least one record to their overflow map.
  pub escalated_buckets: usize,
  /// Buckets whose arena range is completely used.
  pub full_buckets: usize,
  pub get_count: u64,
  pub set_count: u64,
}

enum Hit {
  Arena { bucket: usize, slot: u64, value: Value },
  Overflow { bucket: usize, value: Value },
}

impl Engine {
  /// Maps the arena and rebuilds every bucket's fill offset from it.
  pub fn open(opts: Options) -> Result<Self> {
    opts.check()?;

    let arena = fio::new_arena(&opts)?;

    let capacity = opts.bucket_capacity();
    let limit = opts.policy.record_limit(capacity / RECORD_SIZE as u64) * RECORD_SIZE as u64;
    let buckets: Vec<Bucket> = (0..opts.bucket_count)
      .map(|i| {
        Bucket::new(
          i,
          i as u64 * capacity,
          capacity,
          limit,
          new_overflow_store(&opts.overflow_type, opts.overflow_capacity_hint),
        )
      })
      .collect();

    let recovered: u64 = buckets.iter().map(|bucket| bucket.recover(&arena)).sum();
    info!(
      "engine ready: {} byte arena, {} buckets x {} records, {} records recovered, policy {:?}",
      arena.len(),
      opts.bucket_count,
      capacity / RECORD_SIZE as u64,
      recovered,
      opts.policy
    );

    Ok(Self {
      mask: opts.bucket_count as u64 - 1,
      options: opts,
      arena,
      buckets,
      get_count: AtomicU64::new(0),
      set_count: AtomicU64::new(0),
      closed: false,
    })
  }

  /// Stores `value` under `key`, overwriting any previous value.
  ///
  /// Never fails: when the key's arena buckets can take no more records,
  /// the home bucket's overflow map absorbs it.
  pub fn set(&self, key: &Key, value: &Value) {
    self.tick(&self.set_count, "set");

    let home = self.bucket_of(key);
    let home_bucket = &self.buckets[home];

    // A zero key would read as free space on recovery, so it never enters the arena.
    if key.is_zero() || home_bucket.overflow_contains(key) {
      let guard = home_bucket.lock();
      self.put_overflow(home, &guard, key, value);
      return;
    }

    for idx in self.options.policy.probe(home, self.buckets.len()) {
      let bucket = &self.buckets[idx];
      let guard = bucket.lock();
      if let Some(slot) = bucket.find(&self.arena, key) {
        bucket.update_in_place(&self.arena, &guard, slot, value);
        return;
      }
      match bucket.append(&self.arena, &guard, key, value) {
        Ok(_) => return,
        Err(BucketFull(_)) => continue,
      }
    }

    let guard = home_bucket.lock();
    self.put_overflow(home, &guard, key, value);
  }

  /// Returns the latest value stored under `key`, `None` if it was never set.
  pub fn get(&self, key: &Key) -> Option<Value> {
    self.tick(&self.get_count, "get");

    match self.lookup(key)? {
      Hit::Arena { value, .. } | Hit::Overflow { value, .. } => Some(value),
    }
  }

  /// Reports where `key` currently lives.
  pub fn resolve(&self, key: &Key) -> Option<Location> {
    match self.lookup(key)? {
      Hit::Arena { bucket, slot, .. } => Some(Location::Arena { bucket, slot }),
      Hit::Overflow { bucket, .. } => Some(Location::Overflow { bucket }),
    }
  }

  /// Flushes the arena to its backing file.
  pub fn sync(&self) -> Result<()> {
    self.arena.sync()
  }

  pub fn stat(&self) -> Stat {
    let mut stat = Stat {
      get_count: self.get_count.load(Ordering::Relaxed),
      set_count: self.set_count.load(Ordering::Relaxed),
      ..Default::default()
    };
    for bucket in self.buckets.iter() {
      stat.arena_records += bucket.records();
      stat.overflow_records += bucket.overflow_len();
      if bucket.is_escalated() {
        stat.escalated_buckets += 1;
      }
      if bucket.is_full() {
        stat.full_buckets += 1;
      }
    }
    stat
  }

  pub fn options(&self) -> &Options {
    &self.options
  }

  /// Unmaps the arena, syncing it first if `sync_on_close` is set.
  pub fn close(mut self) -> Result<()> {
    self.closed = true;
    if self.options.sync_on_close {
      self.sync()?;
    }
    info!(
      "engine on {:?} closed after {} sets, {} gets",
      self.arena.path(),
      self.set_count.load(Ordering::Relaxed),
      self.get_count.load(Ordering::Relaxed)
    );
    Ok(())
  }

  pub(crate) fn bucket_of(&self, key: &Key) -> usize {
    (xxh3_64(key.as_bytes()) & self.mask) as usize
  }

  fn lookup(&self, key: &Key) -> Option<Hit> {
    let home = self.bucket_of(key);
    let home_bucket = &self.buckets[home];

    if let Some(value) = home_bucket.get_overflow(key) {
      return Some(Hit::Overflow { bucket: home, value });
    }
    if key.is_zero() {
      return None;
    }

    for idx in self.options.policy.probe(home, self.buckets.len()) {
      let bucket = &self.buckets[idx];
      let _guard = match self.options.read_mode {
        ReadMode::Locked => Some(bucket.lock()),
        ReadMode::LockFree => None,
      };
      if let Some(slot) = bucket.find(&self.arena, key) {
        // May be torn in `LockFree` mode.
        let value = bucket.read_value(&self.arena, slot);
        return Some(Hit::Arena {
          bucket: idx,
          slot: slot.number(),
          value,
        });
      }
      // Nothing chained past a bucket that still has room.
      if !bucket.is_saturated() {
        return None;
      }
    }

    home_bucket
      .get_overflow(key)
      .map(|value| Hit::Overflow { bucket: home, value })
  }

  fn put_overflow(&self, home: usize, guard: &BucketGuard<'_>, key: &Key, value: &Value) {
    if self.buckets[home].put_overflow(guard, *key, *value) {
      warn!("bucket {} escalated to the overflow store", home);
    }
  }

  fn tick(&self, counter: &AtomicU64, op: &str) {
    let count = counter.fetch_add(1, Ordering::Relaxed) + 1;
    let interval = self.options.log_interval;
    if interval != 0 && count % interval == 0 {
      info!("{} count: {}", op, count);
    }
  }
}

impl Drop for Engine {
  fn drop(&mut self) {
    if self.closed || !self.options.sync_on_close {
      return;
    }
    if let Err(e) = self.sync() {
      error!("failed to sync arena on drop: {}", e);
    }
  }
}
