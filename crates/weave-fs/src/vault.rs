//! Vault file access
//!
//! The [`Vault`] trait is the host-environment seam the sync engine reads and
//! writes through. [`FsVault`] implements it over a plain directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use crate::{Error, NormalizedPath, Result, VaultPath, io};

/// File operations the sync engine needs from its host.
pub trait Vault: Send + Sync {
    /// Read a file as raw bytes.
    fn read_bytes(&self, path: &VaultPath) -> Result<Vec<u8>>;

    /// Read a file as UTF-8 text.
    fn read_text(&self, path: &VaultPath) -> Result<String> {
        let bytes = self.read_bytes(path)?;
        String::from_utf8(bytes).map_err(|e| Error::InvalidPath {
            path: path.to_string(),
            reason: format!("not valid UTF-8: {e}"),
        })
    }

    /// Create or overwrite a file, creating parent directories as needed.
    fn write_bytes(&self, path: &VaultPath, content: &[u8]) -> Result<()>;

    /// Whether a file exists at `path`.
    fn exists(&self, path: &VaultPath) -> bool;

    /// Last modification time in milliseconds since the Unix epoch.
    fn modified_ms(&self, path: &VaultPath) -> Result<i64>;

    /// All files in the vault, sorted. Dot-prefixed entries are excluded.
    fn list_files(&self) -> Result<Vec<VaultPath>>;

    /// Delete a file.
    fn remove(&self, path: &VaultPath) -> Result<()>;

    /// Move a file, creating the destination's parent directories.
    fn rename(&self, from: &VaultPath, to: &VaultPath) -> Result<()>;
}

/// A vault backed by a directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct FsVault {
    root: PathBuf,
}

impl FsVault {
    /// Open a vault rooted at `root`. The directory must exist.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let root = dunce::canonicalize(root).map_err(|e| Error::io(root, e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn native(&self, path: &VaultPath) -> PathBuf {
        path.resolve(&self.root)
    }

    fn collect(&self, dir: &Path, prefix: &str, out: &mut Vec<VaultPath>) -> Result<()> {
        let entries = fs::read_dir(dir).map_err(|e| Error::io(dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| Error::io(dir, e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }

            let relative = if prefix.is_empty() {
                name
            } else {
                format!("{prefix}/{name}")
            };
            let file_type = entry.file_type().map_err(|e| Error::io(entry.path(), e))?;

            if file_type.is_dir() {
                self.collect(&entry.path(), &relative, out)?;
            } else if file_type.is_file() {
                match VaultPath::parse(&relative) {
                    Ok(path) => out.push(path),
                    Err(e) => tracing::warn!(path = %relative, error = %e, "skipping unsyncable file"),
                }
            }
        }
        Ok(())
    }
}

impl Vault for FsVault {
    fn read_bytes(&self, path: &VaultPath) -> Result<Vec<u8>> {
        let native = self.native(path);
        fs::read(&native).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::NotFound {
                    path: path.to_string(),
                }
            } else {
                Error::io(native, e)
            }
        })
    }

    fn write_bytes(&self, path: &VaultPath, content: &[u8]) -> Result<()> {
        io::write_atomic(&NormalizedPath::new(self.native(path)), content)
    }

    fn exists(&self, path: &VaultPath) -> bool {
        self.native(path).is_file()
    }

    fn modified_ms(&self, path: &VaultPath) -> Result<i64> {
        let native = self.native(path);
        let modified = fs::metadata(&native)
            .and_then(|meta| meta.modified())
            .map_err(|e| Error::io(&native, e))?;
        let since_epoch = modified.duration_since(UNIX_EPOCH).unwrap_or_default();
        Ok(i64::try_from(since_epoch.as_millis()).unwrap_or(i64::MAX))
    }

    fn list_files(&self) -> Result<Vec<VaultPath>> {
        let mut files = Vec::new();
        self.collect(&self.root, "", &mut files)?;
        files.sort();
        Ok(files)
    }

    fn remove(&self, path: &VaultPath) -> Result<()> {
        let native = self.native(path);
        fs::remove_file(&native).map_err(|e| Error::io(native, e))
    }

    fn rename(&self, from: &VaultPath, to: &VaultPath) -> Result<()> {
        let source = self.native(from);
        let target = self.native(to);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        fs::rename(&source, &target).map_err(|e| Error::io(source, e))
    }
}
