pub mod mmap;

use crate::{
  errors::Result,
  option::{ArenaType, Options},
};

use self::mmap::MmapArena;

/// Maps the arena described by `options`.
pub fn new_arena(options: &Options) -> Result<MmapArena> {
  match options.arena_type {
    ArenaType::FileMap => MmapArena::open_file(
      &options.path,
      options.arena_size,
      options.populate,
      options.preallocate,
    ),
    ArenaType::Anonymous => MmapArena::anonymous(options.arena_size, options.populate),
  }
}
