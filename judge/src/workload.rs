use log::{debug, error};
use nvm_kv::{
  db::Engine,
  util::rand_kv::{random_key, random_value},
  Key, Value,
};
use rand::{rngs::StdRng, SeedableRng};
use rand_distr::{Distribution, Normal, NormalError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CheckError {
  #[error("invalid read distribution: {0}")]
  Distribution(#[from] NormalError),

  #[error("check result failed on thread {thread}, key {key:?}")]
  Mismatch { thread: usize, key: Key },
}

/// Keys and the last value this thread wrote for them.
pub type Pool = Vec<(Key, Value)>;

/// Writes `count` random records, keeping every `sample_every`-th in the pool.
pub fn set_pure(engine: &Engine, count: usize, sample_every: usize) -> Pool {
  let mut rng = rand::rng();
  let sample_every = sample_every.max(1);
  let mut pool = Vec::with_capacity(count / sample_every + 1);
  for n in 0..count {
    let key = random_key(&mut rng);
    let value = random_value(&mut rng);
    engine.set(&key, &value);
    if n % sample_every == 0 {
      pool.push((key, value));
    }
  }
  pool
}

/// Mixed workload over the pool. Pool indices come from a normal distribution
/// centred on the middle of the pool; the hot centre is read and checked, the
/// tails are overwritten with fresh values.
pub fn set_get(
  engine: &Engine,
  thread: usize,
  pool: &mut Pool,
  count: usize,
  seed: u64,
) -> Result<(), CheckError> {
  if pool.len() < 2 {
    debug!("thread {} has no pool to check", thread);
    return Ok(());
  }

  let mut rng = StdRng::seed_from_u64(seed);
  let mean = pool.len() as f64 / 2.0;
  let normal = Normal::new(mean, pool.len() as f64 * 0.01)?;
  let edge = pool.len() as f64 * 0.0196;
  let last = pool.len() - 1;

  for _ in 0..count {
    let idx = (normal.sample(&mut rng).max(0.0) as usize).min(last);
    if (idx as f64 - mean).abs() > edge {
      let value = random_value(&mut rng);
      pool[idx].1 = value;
      engine.set(&pool[idx].0, &value);
      continue;
    }

    let (key, expected) = &pool[idx];
    if engine.get(key).as_ref() != Some(expected) {
      error!("check result failed on thread {}, pool index {}", thread, idx);
      return Err(CheckError::Mismatch { thread, key: *key });
    }
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use nvm_kv::option::{ArenaType, Options};

  use super::*;

  fn small_engine() -> Engine {
    let mut opts = Options::default();
    opts.arena_type = ArenaType::Anonymous;
    opts.arena_size = 16 * 4 * 96;
    opts.bucket_count = 16;
    opts.log_interval = 0;
    Engine::open(opts).unwrap()
  }

  #[test]
  fn test_set_pure_samples() {
    let engine = small_engine();
    let pool = set_pure(&engine, 1000, 10);
    assert_eq!(pool.len(), 100);
    for (key, value) in pool.iter() {
      assert_eq!(engine.get(key).as_ref(), Some(value));
    }
    assert_eq!(engine.stat().set_count, 1000);
  }

  #[test]
  fn test_set_get_passes_on_consistent_engine() {
    let engine = small_engine();
    let mut pool = set_pure(&engine, 5000, 5);
    assert!(set_get(&engine, 0, &mut pool, 20000, 23333).is_ok());
    assert!(engine.stat().get_count > 0);
  }

  #[test]
  fn test_set_get_detects_mismatch() {
    let engine = small_engine();
    let mut pool = set_pure(&engine, 400, 1);
    // Every pool entry claims a value the engine never stored.
    for entry in pool.iter_mut() {
      entry.1 = Value::new([0xAB; 80]);
    }
    let res = set_get(&engine, 3, &mut pool, 1000, 7);
    assert!(matches!(res, Err(CheckError::Mismatch { thread: 3, .. })));
  }

  #[test]
  fn test_set_get_tiny_pool() {
    let engine = small_engine();
    let mut pool = set_pure(&engine, 1, 1);
    assert!(set_get(&engine, 0, &mut pool, 10, 1).is_ok());
  }
}
