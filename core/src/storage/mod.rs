//! The uniform capability surface every concrete storage backend implements.
//! No driver internals leak past this trait into the protocol dispatcher --
//! mirrors the teacher's record-of-function-pointers-plus-opaque-driver
//! pattern, mapped onto a plain trait object (`&dyn StorageDriver`).

use crate::error::Result;
use std::io::{Read, Write};

/// Bitmask returned by [`StorageDriver::feature`]. Static per driver.
pub mod feature {
    pub const PATH_SYNC: u64 = 1 << 0;
    pub const ATOMIC: u64 = 1 << 1;
}

/// A single-pass, non-seekable read cursor scoped to one `openRead` command.
pub trait ReadHandle: Read {}
impl<T: Read> ReadHandle for T {}

/// A single-pass, non-seekable write cursor scoped to one `openWrite`
/// command. `commit` finalizes the write (e.g. renaming a temp file into
/// place for atomic writes, or syncing); `abandon` releases the handle
/// without committing, for the `BLOCK -1` path.
pub trait WriteHandle: Write {
    fn commit(self: Box<Self>) -> Result<()>;
    fn abandon(self: Box<Self>) -> Result<()>;
}

/// Parameters for [`StorageDriver::new_write`], bundled the way the source
/// command parameter list carries them.
pub struct WriteOptions {
    pub mode_file: Option<u32>,
    pub mode_path: Option<u32>,
    pub user: Option<String>,
    pub group: Option<String>,
    pub mtime: Option<i64>,
    pub create_path: bool,
    pub sync_file: bool,
    pub sync_path: bool,
    pub atomic: bool,
}

/// The capability surface consumed by the protocol dispatcher. A concrete
/// backend (local filesystem, object store) implements this trait; the
/// core never reaches past it.
pub trait StorageDriver: Send {
    fn exists(&self, path: &str) -> Result<bool>;

    /// Static per driver; advertised once via `storage/feature`.
    fn feature(&self) -> u64;

    /// Leaf names under `path`, optionally filtered by a driver-applied
    /// match expression. The core performs no filtering of its own.
    fn list(&self, path: &str, expression: Option<&str>) -> Result<Vec<String>>;

    /// `None` if the driver does not support this check -- the dispatcher
    /// treats that as a hard protocol error, not a fallback.
    fn path_exists(&self, path: &str) -> Result<Option<bool>>;

    fn path_create(
        &self,
        path: &str,
        error_on_exists: bool,
        no_parent_create: bool,
        mode: Option<u32>,
    ) -> Result<()>;

    /// Returns whether anything was actually removed.
    fn path_remove(&self, path: &str, recursive: bool) -> Result<bool>;

    fn path_sync(&self, path: &str) -> Result<()>;

    fn remove(&self, path: &str, error_on_missing: bool) -> Result<()>;

    fn new_read(&self, path: &str, ignore_missing: bool) -> Result<Option<Box<dyn ReadHandle>>>;

    fn new_write(&self, path: &str, options: WriteOptions) -> Result<Box<dyn WriteHandle>>;
}
