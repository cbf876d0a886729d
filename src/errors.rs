use std::result;

use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum Errors {
  #[error("arena path is empty")]
  InvalidArenaPath,

  #[error("failed to create the arena directory")]
  FailedToCreateArenaDir,

  #[error("failed to open the arena file")]
  FailedToOpenArenaFile,

  #[error("failed to size the arena file")]
  FailedToSizeArenaFile,

  #[error("failed to map the arena")]
  FailedToMapArena,

  #[error("arena file is {actual} bytes, expected {expected}")]
  ArenaSizeMismatch { expected: u64, actual: u64 },

  #[error("the arena file is in use by another engine")]
  ArenaInUse,

  #[error("bucket count must be a non-zero power of two")]
  BucketCountNotPowerOfTwo,

  #[error("arena is too small to hold one record per bucket")]
  ArenaTooSmall,

  #[error("chaining probe limit must be at least 1")]
  InvalidProbeLimit,

  #[error("conflict threshold must be at least 1")]
  InvalidConflictThreshold,

  #[error("failed to sync the arena")]
  FailedToSyncArena,

  #[error("key must be exactly {expected} bytes, got {actual}")]
  KeySizeMismatch { expected: usize, actual: usize },

  #[error("value must be exactly {expected} bytes, got {actual}")]
  ValueSizeMismatch { expected: usize, actual: usize },
}

pub type Result<T> = result::Result<T, Errors>;

/// Raised when a bucket cannot take another record under the active policy.
/// Never leaves the crate: the engine absorbs it by escalating.
#[derive(Error, Debug, PartialEq, Eq, Clone, Copy)]
#[error("bucket {0} is full")]
pub(crate) struct BucketFull(pub usize);
