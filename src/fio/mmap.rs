use std::{
  fs::{self, File, OpenOptions},
  mem::{align_of, size_of},
  path::{Path, PathBuf},
  ptr::{self, NonNull},
  sync::atomic::{AtomicU64, Ordering},
};

use fs2::FileExt;
use log::{error, info};
use memmap2::{MmapMut, MmapOptions};

use crate::{
  data::record::{Key, Value, KEY_OFFSET, KEY_SIZE, RECORD_SIZE, VALUE_OFFSET, VALUE_SIZE},
  errors::{Errors, Result},
};

const WORD: usize = size_of::<u64>();
const VALUE_WORDS: usize = VALUE_SIZE / WORD;

const _: () = assert!(VALUE_SIZE % WORD == 0 && VALUE_OFFSET % WORD == 0 && RECORD_SIZE % WORD == 0);

/// A fixed-size, zero-initialised byte region with a stable base address.
///
/// Slot accessors take byte offsets of record starts. Only the bucket index
/// computes those offsets; everything else addresses records by bucket.
pub struct MmapArena {
  // Declared before `file`: the mapping goes away before closing the file
  // releases the exclusive lock.
  map: MmapMut,
  base: NonNull<u8>,
  len: u64,
  file: Option<File>,
  path: Option<PathBuf>,
}

// SAFETY: `base` points into `map`, which lives as long as the arena and never
// moves. Writers are serialised per bucket by the engine; see the accessors.
unsafe impl Send for MmapArena {}
unsafe impl Sync for MmapArena {}

impl MmapArena {
  pub fn open_file<P>(path: P, size: u64, populate: bool, preallocate: bool) -> Result<Self>
  where
    P: AsRef<Path>,
  {
    let path = path.as_ref();
    if let Some(dir) = path.parent() {
      if !dir.as_os_str().is_empty() && !dir.is_dir() {
        if let Err(e) = fs::create_dir_all(dir) {
          error!("failed to create arena dir {:?}: {}", dir, e);
          return Err(Errors::FailedToCreateArenaDir);
        }
      }
    }

    let file = match OpenOptions::new()
      .create(true)
      .read(true)
      .write(true)
      .truncate(false)
      .open(path)
    {
      Ok(file) => file,
      Err(e) => {
        error!("failed to open arena file {:?}: {}", path, e);
        return Err(Errors::FailedToOpenArenaFile);
      }
    };

    if FileExt::try_lock_exclusive(&file).is_err() {
      return Err(Errors::ArenaInUse);
    }

    let actual = match file.metadata() {
      Ok(meta) => meta.len(),
      Err(e) => {
        error!("failed to stat arena file {:?}: {}", path, e);
        return Err(Errors::FailedToOpenArenaFile);
      }
    };
    if actual == 0 {
      if let Err(e) = file.set_len(size) {
        error!("failed to size arena file to {} bytes: {}", size, e);
        return Err(Errors::FailedToSizeArenaFile);
      }
    } else if actual != size {
      return Err(Errors::ArenaSizeMismatch {
        expected: size,
        actual,
      });
    }
    if preallocate {
      if let Err(e) = FileExt::allocate(&file, size) {
        error!("failed to preallocate {} bytes: {}", size, e);
        return Err(Errors::FailedToSizeArenaFile);
      }
    }

    let mut map_opts = MmapOptions::new();
    map_opts.len(map_len(size)?);
    if populate {
      map_opts.populate();
    }
    // SAFETY: the file is exclusively locked, nothing else in this process
    // maps it, and it is never truncated while mapped.
    let map = match unsafe { map_opts.map_mut(&file) } {
      Ok(map) => map,
      Err(e) => {
        error!("failed to map arena file {:?}: {}", path, e);
        return Err(Errors::FailedToMapArena);
      }
    };

    info!("mapped arena {:?} ({} bytes)", path, size);
    Ok(Self::from_map(map, size, Some(file), Some(path.to_path_buf())))
  }

  pub fn anonymous(size: u64, populate: bool) -> Result<Self> {
    let mut map_opts = MmapOptions::new();
    map_opts.len(map_len(size)?);
    if populate {
      map_opts.populate();
    }
    let map = match map_opts.map_anon() {
      Ok(map) => map,
      Err(e) => {
        error!("failed to map anonymous arena of {} bytes: {}", size, e);
        return Err(Errors::FailedToMapArena);
      }
    };

    info!("mapped anonymous arena ({} bytes)", size);
    Ok(Self::from_map(map, size, None, None))
  }

  fn from_map(mut map: MmapMut, len: u64, file: Option<File>, path: Option<PathBuf>) -> Self {
    let base = NonNull::new(map.as_mut_ptr()).unwrap_or(NonNull::dangling());
    Self {
      map,
      base,
      len,
      file,
      path,
    }
  }

  pub fn len(&self) -> u64 {
    self.len
  }

  pub fn path(&self) -> Option<&Path> {
    self.path.as_deref()
  }

  /// Flushes dirty pages of a file-backed arena to storage.
  pub fn sync(&self) -> Result<()> {
    if self.file.is_none() {
      return Ok(());
    }
    if let Err(e) = self.map.flush() {
      error!("failed to flush arena: {}", e);
      return Err(Errors::FailedToSyncArena);
    }
    Ok(())
  }

  #[inline]
  fn slot_ptr(&self, offset: u64, field: usize, size: usize) -> *mut u8 {
    assert!(
      offset + (field + size) as u64 <= self.len,
      "slot offset {offset} outside arena of {} bytes",
      self.len
    );
    assert_eq!(offset % RECORD_SIZE as u64, 0, "slot offset {offset} is not a record start");
    // SAFETY: bounds checked above.
    unsafe { self.base.as_ptr().add(offset as usize + field) }
  }

  /// # Safety
  /// The key of a slot is written once, before the slot is published, so
  /// reading keys below a bucket's published fill offset never races.
  #[inline]
  pub(crate) unsafe fn read_key(&self, offset: u64) -> Key {
    let src = self.slot_ptr(offset, KEY_OFFSET, KEY_SIZE);
    ptr::read(src as *const Key)
  }

  /// Loads a value word by word. A store racing with this load may leave
  /// the result mixing old and new words, never a half-written word.
  #[inline]
  pub(crate) fn read_value(&self, offset: u64) -> Value {
    let words = self.value_words(offset);
    let mut bytes = [0u8; VALUE_SIZE];
    for (word, chunk) in words.iter().zip(bytes.chunks_exact_mut(WORD)) {
      chunk.copy_from_slice(&word.load(Ordering::Relaxed).to_ne_bytes());
    }
    Value::new(bytes)
  }

  /// # Safety
  /// The caller must hold the owning bucket's guard.
  #[inline]
  pub(crate) unsafe fn write_key(&self, offset: u64, key: &Key) {
    let dst = self.slot_ptr(offset, KEY_OFFSET, KEY_SIZE);
    ptr::copy_nonoverlapping(key.as_ptr(), dst, KEY_SIZE);
  }

  /// Stores a value word by word. Writers must still be serialised by the
  /// owning bucket's guard; lock-free readers may observe a mix of words.
  #[inline]
  pub(crate) fn write_value(&self, offset: u64, value: &Value) {
    let words = self.value_words(offset);
    for (word, chunk) in words.iter().zip(value.chunks_exact(WORD)) {
      let mut buf = [0u8; WORD];
      buf.copy_from_slice(chunk);
      word.store(u64::from_ne_bytes(buf), Ordering::Relaxed);
    }
  }

  #[inline]
  fn value_words(&self, offset: u64) -> &[AtomicU64; VALUE_WORDS] {
    let ptr = self.slot_ptr(offset, VALUE_OFFSET, VALUE_SIZE);
    debug_assert_eq!(ptr as usize % align_of::<AtomicU64>(), 0);
    // SAFETY: in bounds, 8-byte aligned (page-aligned base, record starts and
    // the value offset are multiples of 8), and value bytes are only ever
    // accessed through these atomics.
    unsafe { &*(ptr as *const [AtomicU64; VALUE_WORDS]) }
  }
}

fn map_len(size: u64) -> Result<usize> {
  usize::try_from(size).map_err(|_| {
    error!("arena of {} bytes does not fit the address space", size);
    Errors::FailedToMapArena
  })
}
