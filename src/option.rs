use lazy_static::lazy_static;
use log::debug;
use std::path::PathBuf;

use crate::{
  data::record::RECORD_SIZE,
  errors::{Errors, Result},
};

lazy_static! {
  pub static ref DEFAULT_ARENA_PATH: PathBuf = std::env::temp_dir().join("nvm-kv").join("DB");
}

/// Arena size used for local runs and tests of the default preset.
pub const LOCAL_ARENA_SIZE: u64 = 960 << 20; // 960MB

/// Arena size of the production preset.
pub const PRODUCTION_ARENA_SIZE: u64 = 72 << 30; // 72GB

#[derive(Debug, Clone)]
pub struct Options {
  pub path: PathBuf,

  pub arena_size: u64,

  /// Must be a power of two; keys are reduced to a bucket by bit-mask.
  pub bucket_count: usize,

  pub policy: EscalationPolicy,

  pub overflow_type: OverflowType,

  /// Initial capacity reserved for each bucket's overflow map.
  pub overflow_capacity_hint: usize,

  pub read_mode: ReadMode,

  pub arena_type: ArenaType,

  pub populate: bool,

  pub preallocate: bool,

  pub sync_on_close: bool,

  /// Log the running get/set counters every `log_interval` operations, 0 disables.
  pub log_interval: u64,
}

/// How a bucket decides that a new key no longer fits in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationPolicy {
  /// Append until the bucket is full, then use the overflow store.
  CapacityOnly,

  /// Append while the bucket holds fewer than `limit` records.
  Threshold { limit: usize },

  /// Try up to `probe_limit` following buckets before the overflow store.
  Chaining { probe_limit: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowType {
  HashMap,

  SkipList,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
  /// Reads take the bucket guard and never observe a torn value.
  Locked,

  /// Reads scan without the guard. A read racing an in-place update of the
  /// same key may return a mixture of the old and new value.
  LockFree,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArenaType {
  /// Shared mapping of `path`, survives restarts.
  FileMap,

  /// Anonymous mapping, gone with the process.
  Anonymous,
}

impl Default for Options {
  fn default() -> Self {
    Self {
      path: DEFAULT_ARENA_PATH.clone(),
      arena_size: LOCAL_ARENA_SIZE,
      bucket_count: 1024,
      policy: EscalationPolicy::Chaining { probe_limit: 5 },
      overflow_type: OverflowType::HashMap,
      overflow_capacity_hint: 0,
      read_mode: ReadMode::Locked,
      arena_type: ArenaType::FileMap,
      populate: false,
      preallocate: false,
      sync_on_close: false,
      log_interval: 100_000,
    }
  }
}

impl Options {
  pub fn production(path: impl Into<PathBuf>) -> Self {
    Self {
      path: path.into(),
      arena_size: PRODUCTION_ARENA_SIZE,
      overflow_capacity_hint: 2048,
      log_interval: 100_000_000,
      ..Default::default()
    }
  }

  /// Bytes owned by one bucket, rounded down to whole records.
  pub fn bucket_capacity(&self) -> u64 {
    let raw = self.arena_size / self.bucket_count.max(1) as u64;
    raw - raw % RECORD_SIZE as u64
  }

  pub(crate) fn check(&self) -> Result<()> {
    if self.arena_type == ArenaType::FileMap && self.path.as_os_str().is_empty() {
      return Err(Errors::InvalidArenaPath);
    }
    if self.bucket_count == 0 || !self.bucket_count.is_power_of_two() {
      return Err(Errors::BucketCountNotPowerOfTwo);
    }
    if self.bucket_capacity() == 0 {
      return Err(Errors::ArenaTooSmall);
    }
    match self.policy {
      EscalationPolicy::Threshold { limit } if limit == 0 => {
        return Err(Errors::InvalidConflictThreshold)
      }
      EscalationPolicy::Chaining { probe_limit } if probe_limit == 0 => {
        return Err(Errors::InvalidProbeLimit)
      }
      _ => {}
    }

    debug!(
      "options accepted: {} buckets of {} bytes, policy {:?}, reads {:?}",
      self.bucket_count,
      self.bucket_capacity(),
      self.policy,
      self.read_mode
    );
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_default_options_are_valid() {
    let opts = Options::default();
    assert!(opts.check().is_ok());
    assert_eq!(opts.bucket_capacity() % RECORD_SIZE as u64, 0);
    assert!(opts.bucket_capacity() * opts.bucket_count as u64 <= opts.arena_size);
  }

  #[test]
  fn test_production_preset() {
    let opts = Options::production("/mnt/pmem/DB");
    assert_eq!(opts.arena_size, PRODUCTION_ARENA_SIZE);
    assert_eq!(opts.bucket_count, 1024);
    assert!(opts.check().is_ok());
  }

  #[test]
  fn test_bucket_count_must_be_power_of_two() {
    let mut opts = Options::default();
    opts.bucket_count = 1000;
    assert_eq!(opts.check(), Err(Errors::BucketCountNotPowerOfTwo));

    opts.bucket_count = 0;
    assert_eq!(opts.check(), Err(Errors::BucketCountNotPowerOfTwo));
  }

  #[test]
  fn test_arena_too_small() {
    let mut opts = Options::default();
    opts.bucket_count = 4;
    opts.arena_size = 4 * RECORD_SIZE as u64 - 1;
    assert_eq!(opts.check(), Err(Errors::ArenaTooSmall));
  }

  #[test]
  fn test_bucket_capacity_rounds_down() {
    let mut opts = Options::default();
    opts.bucket_count = 2;
    opts.arena_size = 2 * (3 * RECORD_SIZE as u64 + 50);
    assert_eq!(opts.bucket_capacity(), 3 * RECORD_SIZE as u64);
  }

  #[test]
  fn test_policy_limits() {
    let mut opts = Options::default();
    opts.policy = EscalationPolicy::Threshold { limit: 0 };
    assert_eq!(opts.check(), Err(Errors::InvalidConflictThreshold));

    opts.policy = EscalationPolicy::Chaining { probe_limit: 0 };
    assert_eq!(opts.check(), Err(Errors::InvalidProbeLimit));

    opts.policy = EscalationPolicy::CapacityOnly;
    assert!(opts.check().is_ok());
  }

  #[test]
  fn test_empty_path() {
    let mut opts = Options::default();
    opts.path = PathBuf::new();
    assert_eq!(opts.check(), Err(Errors::InvalidArenaPath));

    opts.arena_type = ArenaType::Anonymous;
    assert!(opts.check().is_ok());
  }
}
