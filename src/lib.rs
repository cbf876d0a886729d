//! nvm-kv: a fixed-record key/value engine that lives directly in a
//! byte-addressable persistent memory arena.
//!
//! Records are a 16-byte key and an 80-byte value. The arena is split into
//! equal buckets; each bucket is an append-only run of records guarded by its
//! own lock, with an in-memory overflow map for keys that no longer fit.
//!
//! # Features
//!
//! * One mutex per bucket, contention follows hash skew rather than load
//! * Lock-free or locked reads, chosen at open
//! * Capacity, threshold or bucket-chaining escalation policies
//! * Arena records survive restarts; overflow records do not
//!
//! # Basic Usage
//!
//! ```
//! use nvm_kv::{
//!   db::Engine,
//!   option::{ArenaType, Options},
//!   Key, Value,
//! };
//!
//! let mut opts = Options::default();
//! opts.arena_type = ArenaType::Anonymous;
//! opts.arena_size = 64 << 20;
//! opts.bucket_count = 64;
//! let engine = Engine::open(opts).expect("failed to open nvm-kv engine");
//!
//! let key = Key::new(*b"hello-nvm-kv-key");
//! let value = Value::new([7u8; 80]);
//! engine.set(&key, &value);
//!
//! assert_eq!(engine.get(&key), Some(value));
//! ```

mod bucket;
mod data;
mod fio;
mod index;

pub mod db;
pub mod errors;
pub mod option;
pub mod policy;
pub mod util;

pub use data::record::{Key, Record, Value, KEY_SIZE, RECORD_SIZE, VALUE_SIZE};
pub use policy::Location;
