//! Reader and writer for DRS/BMG game-model archives.
//!
//! [`load`] and [`save`] work on whole files. The [`archive`] module exposes the layers
//! underneath for callers that need the index table, the hierarchy or the skipped-record
//! diagnostics.

pub mod archive;
pub mod error;
pub mod math;
pub mod primitive;
pub mod records;

use std::path::Path;

pub use archive::{Archetype, LoadedArchive, ReadOptions, WriteOptions};
pub use error::{DrsError, Result};
pub use records::{Payload, RecordKind, RecordTree};

/// Reads the archive at `path` with default options and returns its records.
pub fn load(path: impl AsRef<Path>) -> Result<RecordTree> {
    let bytes = std::fs::read(path)?;
    Ok(archive::read_archive(&bytes, &ReadOptions::default())?.tree)
}

/// Writes `tree` to `path` laid out as `archetype`.
pub fn save(path: impl AsRef<Path>, tree: &RecordTree, archetype: Archetype) -> Result<()> {
    let bytes = archive::write_archive(tree, archetype, &WriteOptions::default())?;
    std::fs::write(path, bytes)?;
    Ok(())
}
