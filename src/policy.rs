//! Collision resolution: which buckets a key may occupy and when a bucket
//! stops taking new records.

use crate::option::EscalationPolicy;

/// Where a key currently lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
  /// In the arena, `slot` records into bucket `bucket`.
  Arena { bucket: usize, slot: u64 },

  /// In the overflow store of bucket `bucket`.
  Overflow { bucket: usize },
}

impl EscalationPolicy {
  /// Buckets probed for a key, the home bucket included.
  pub fn probe_count(&self, bucket_count: usize) -> usize {
    match *self {
      EscalationPolicy::Chaining { probe_limit } => probe_limit.min(bucket_count - 1) + 1,
      _ => 1,
    }
  }

  /// Most records a bucket with room for `capacity` records will take.
  pub fn record_limit(&self, capacity: u64) -> u64 {
    match *self {
      EscalationPolicy::Threshold { limit } => (limit as u64).min(capacity),
      _ => capacity,
    }
  }

  /// Home bucket followed by its chaining neighbours, wrapping around.
  pub(crate) fn probe(&self, home: usize, bucket_count: usize) -> Probe {
    Probe {
      next: home,
      remaining: self.probe_count(bucket_count),
      mask: bucket_count - 1,
    }
  }
}

pub(crate) struct Probe {
  next: usize,
  remaining: usize,
  mask: usize,
}

impl Iterator for Probe {
  type Item = usize;

  fn next(&mut self) -> Option<usize> {
    if self.remaining == 0 {
      return None;
    }
    let current = self.next;
    self.next = (current + 1) & self.mask;
    self.remaining -= 1;
    Some(current)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_probe_single_bucket_policies() {
    let capacity = EscalationPolicy::CapacityOnly;
    assert_eq!(capacity.probe(7, 16).collect::<Vec<_>>(), vec![7]);

    let threshold = EscalationPolicy::Threshold { limit: 3 };
    assert_eq!(threshold.probe(0, 16).collect::<Vec<_>>(), vec![0]);
  }

  #[test]
  fn test_probe_chaining_wraps() {
    let chaining = EscalationPolicy::Chaining { probe_limit: 3 };
    assert_eq!(chaining.probe(14, 16).collect::<Vec<_>>(), vec![14, 15, 0, 1]);
  }

  #[test]
  fn test_probe_chaining_capped_by_bucket_count() {
    let chaining = EscalationPolicy::Chaining { probe_limit: 5 };
    assert_eq!(chaining.probe(1, 2).collect::<Vec<_>>(), vec![1, 0]);
    assert_eq!(chaining.probe(0, 1).collect::<Vec<_>>(), vec![0]);
  }

  #[test]
  fn test_record_limit() {
    assert_eq!(EscalationPolicy::CapacityOnly.record_limit(10), 10);
    assert_eq!(EscalationPolicy::Threshold { limit: 4 }.record_limit(10), 4);
    assert_eq!(EscalationPolicy::Threshold { limit: 40 }.record_limit(10), 10);
    assert_eq!(
      EscalationPolicy::Chaining { probe_limit: 2 }.record_limit(10),
      10
    );
  }
}
