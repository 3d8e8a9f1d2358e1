//! The reference storage driver: a [`StorageDriver`] backed by the local
//! filesystem, rooted at one directory. Exists to exercise
//! [`storage_protocol_core::server::ProtocolServer`] end to end; a real
//! deployment would plug in an object-store driver instead.

use regex::Regex;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use storage_protocol_core::error::{Error, Result};
use storage_protocol_core::storage::{feature, ReadHandle, StorageDriver, WriteHandle, WriteOptions};

pub struct LocalFsDriver {
    root: PathBuf,
}

impl LocalFsDriver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LocalFsDriver { root: root.into() }
    }

    /// Resolve a protocol path (always `/`-rooted, forward-slash separated)
    /// to an absolute filesystem path under `root`. Rejects `..` components
    /// so a session cannot escape its storage root.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = path.trim_start_matches('/');
        let mut resolved = self.root.clone();
        for component in relative.split('/') {
            match component {
                "" | "." => continue,
                ".." => {
                    return Err(Error::Protocol(format!(
                        "path escapes storage root: {path:?}"
                    )))
                }
                other => resolved.push(other),
            }
        }
        Ok(resolved)
    }
}

impl StorageDriver for LocalFsDriver {
    fn exists(&self, path: &str) -> Result<bool> {
        let resolved = self.resolve(path)?;
        Ok(resolved.is_file())
    }

    fn feature(&self) -> u64 {
        feature::PATH_SYNC | feature::ATOMIC
    }

    fn list(&self, path: &str, expression: Option<&str>) -> Result<Vec<String>> {
        let resolved = self.resolve(path)?;
        let matcher = expression
            .map(|e| Regex::new(e).map_err(|err| Error::Protocol(format!("invalid list expression: {err}"))))
            .transpose()?;
        let mut names = Vec::new();
        let entries = fs::read_dir(&resolved)
            .map_err(|e| Error::PathOpen(format!("{path}: {e}")))?;
        for entry in entries {
            let entry = entry.map_err(|e| Error::PathOpen(format!("{path}: {e}")))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if matcher.as_ref().map_or(true, |re| re.is_match(&name)) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    fn path_exists(&self, path: &str) -> Result<Option<bool>> {
        let resolved = self.resolve(path)?;
        Ok(Some(resolved.is_dir()))
    }

    fn path_create(
        &self,
        path: &str,
        error_on_exists: bool,
        no_parent_create: bool,
        mode: Option<u32>,
    ) -> Result<()> {
        let resolved = self.resolve(path)?;
        if resolved.is_dir() {
            if error_on_exists {
                return Err(Error::Protocol(format!("path already exists: {path}")));
            }
            return Ok(());
        }
        let result = if no_parent_create {
            fs::create_dir(&resolved)
        } else {
            fs::create_dir_all(&resolved)
        };
        result.map_err(|e| Error::PathOpen(format!("{path}: {e}")))?;
        apply_unix_mode(&resolved, mode)?;
        Ok(())
    }

    fn path_remove(&self, path: &str, recursive: bool) -> Result<bool> {
        let resolved = self.resolve(path)?;
        if !resolved.is_dir() {
            return Ok(false);
        }
        let result = if recursive {
            fs::remove_dir_all(&resolved)
        } else {
            fs::remove_dir(&resolved)
        };
        result.map_err(|e| Error::PathOpen(format!("{path}: {e}")))?;
        Ok(true)
    }

    fn path_sync(&self, path: &str) -> Result<()> {
        let resolved = self.resolve(path)?;
        let dir = File::open(&resolved).map_err(|e| Error::PathOpen(format!("{path}: {e}")))?;
        dir.sync_all().map_err(|e| Error::PathOpen(format!("{path}: {e}")))?;
        Ok(())
    }

    fn remove(&self, path: &str, error_on_missing: bool) -> Result<()> {
        let resolved = self.resolve(path)?;
        match fs::remove_file(&resolved) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound && !error_on_missing => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(Error::PathMissing(path.to_string()))
            }
            Err(e) => Err(Error::FileWrite(format!("{path}: {e}"))),
        }
    }

    fn new_read(&self, path: &str, ignore_missing: bool) -> Result<Option<Box<dyn ReadHandle>>> {
        let resolved = self.resolve(path)?;
        match File::open(&resolved) {
            Ok(file) => Ok(Some(Box::new(file))),
            Err(e) if e.kind() == io::ErrorKind::NotFound && ignore_missing => Ok(None),
            Err(e) => Err(Error::FileOpen(format!("{path}: {e}"))),
        }
    }

    fn new_write(&self, path: &str, options: WriteOptions) -> Result<Box<dyn WriteHandle>> {
        let final_path = self.resolve(path)?;
        if options.create_path {
            if let Some(parent) = final_path.parent() {
                fs::create_dir_all(parent)
                    .map_err(|e| Error::PathOpen(format!("{path}: {e}")))?;
                apply_unix_mode(parent, options.mode_path)?;
            }
        }

        let write_path = if options.atomic {
            sibling_temp_path(&final_path)
        } else {
            final_path.clone()
        };

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&write_path)
            .map_err(|e| Error::FileOpen(format!("{path}: {e}")))?;
        apply_unix_mode(&write_path, options.mode_file)?;

        Ok(Box::new(LocalWriteHandle {
            file,
            final_path,
            staged_path: options.atomic.then_some(write_path),
            sync_file: options.sync_file,
            sync_path: options.sync_path,
            mtime: options.mtime,
        }))
    }
}

struct LocalWriteHandle {
    file: File,
    final_path: PathBuf,
    /// Set when the write landed at a temporary sibling path that still
    /// needs renaming into place on commit (the `atomic` option).
    staged_path: Option<PathBuf>,
    sync_file: bool,
    sync_path: bool,
    mtime: Option<i64>,
}

impl io::Write for LocalWriteHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl WriteHandle for LocalWriteHandle {
    fn commit(mut self: Box<Self>) -> Result<()> {
        if self.sync_file {
            self.file
                .sync_all()
                .map_err(|e| Error::FileWrite(format!("sync failed: {e}")))?;
        }
        if let Some(mtime) = self.mtime {
            set_mtime(&self.staged_path.clone().unwrap_or_else(|| self.final_path.clone()), mtime)?;
        }
        if let Some(staged) = &self.staged_path {
            fs::rename(staged, &self.final_path)
                .map_err(|e| Error::FileWrite(format!("atomic rename failed: {e}")))?;
        }
        if self.sync_path {
            if let Some(parent) = self.final_path.parent() {
                let dir = File::open(parent)
                    .map_err(|e| Error::PathOpen(format!("{}: {e}", parent.display())))?;
                dir.sync_all()
                    .map_err(|e| Error::PathOpen(format!("{}: {e}", parent.display())))?;
            }
        }
        Ok(())
    }

    fn abandon(self: Box<Self>) -> Result<()> {
        drop(self.file);
        let written = self.staged_path.as_deref().unwrap_or(&self.final_path);
        let _ = fs::remove_file(written);
        Ok(())
    }
}

fn sibling_temp_path(final_path: &Path) -> PathBuf {
    let file_name = final_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    final_path.with_file_name(format!(".{file_name}.part"))
}

#[cfg(unix)]
fn apply_unix_mode(path: &Path, mode: Option<u32>) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    if let Some(mode) = mode {
        fs::set_permissions(path, fs::Permissions::from_mode(mode))
            .map_err(|e| Error::PathOpen(format!("{}: {e}", path.display())))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn apply_unix_mode(_path: &Path, _mode: Option<u32>) -> Result<()> {
    Ok(())
}

#[cfg(unix)]
fn set_mtime(path: &Path, mtime: i64) -> Result<()> {
    let time = filetime::FileTime::from_unix_time(mtime, 0);
    filetime::set_file_mtime(path, time)
        .map_err(|e| Error::FileWrite(format!("{}: {e}", path.display())))
}

#[cfg(not(unix))]
fn set_mtime(_path: &Path, _mtime: i64) -> Result<()> {
    Ok(())
}
