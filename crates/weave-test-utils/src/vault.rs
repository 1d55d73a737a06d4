//! [`TestVault`] builder for sync scenarios.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tempfile::TempDir;
use weave_fs::{FsVault, NormalizedPath, Vault, VaultPath};

/// Parse a vault path, panicking on invalid input.
pub fn vp(raw: &str) -> VaultPath {
    VaultPath::parse(raw).unwrap_or_else(|e| panic!("invalid vault path {raw:?}: {e}"))
}

/// A temporary vault directory with helper methods for test setup and
/// assertion.
///
/// # Example
///
/// ```rust,no_run
/// use weave_test_utils::TestVault;
///
/// let vault = TestVault::new();
/// vault.write("notes/a.md", "# A");
/// vault.assert_file_contains("notes/a.md", "# A");
/// ```
pub struct TestVault {
    temp_dir: TempDir,
    vault: Arc<FsVault>,
}

impl Default for TestVault {
    fn default() -> Self {
        Self::new()
    }
}

impl TestVault {
    /// Create an empty vault in a temporary directory.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let vault = Arc::new(FsVault::open(temp_dir.path()).unwrap());
        Self { temp_dir, vault }
    }

    /// Return the root path of the temporary directory.
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn normalized_root(&self) -> NormalizedPath {
        NormalizedPath::new(self.root())
    }

    /// The vault as the engine consumes it.
    pub fn vault(&self) -> Arc<dyn Vault> {
        self.vault.clone()
    }

    /// Write a file, creating parent directories.
    pub fn write(&self, path: &str, content: impl AsRef<[u8]>) {
        self.vault
            .write_bytes(&vp(path), content.as_ref())
            .unwrap_or_else(|e| panic!("TestVault::write {path}: {e}"));
    }

    /// Write a file and push its modification time `secs` into the future,
    /// so it reads as newer than anything recorded so far.
    pub fn write_newer(&self, path: &str, content: impl AsRef<[u8]>, secs: u64) {
        self.write(path, content);
        let file = fs::File::options()
            .write(true)
            .open(self.root().join(path))
            .unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(secs))
            .unwrap();
    }

    /// Push a file's modification time into the past.
    pub fn age(&self, path: &str, secs: u64) {
        let file = fs::File::options()
            .write(true)
            .open(self.root().join(path))
            .unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(secs))
            .unwrap();
    }

    pub fn read(&self, path: &str) -> Vec<u8> {
        fs::read(self.root().join(path))
            .unwrap_or_else(|_| panic!("Could not read file: {path}"))
    }

    pub fn read_text(&self, path: &str) -> String {
        String::from_utf8(self.read(path)).unwrap()
    }

    pub fn remove(&self, path: &str) {
        fs::remove_file(self.root().join(path)).unwrap();
    }

    /// Assert that `path` (relative to the vault root) exists.
    ///
    /// # Panics
    /// Panics with a descriptive message if the path does not exist.
    pub fn assert_file_exists(&self, path: &str) {
        let full_path = self.root().join(path);
        assert!(
            full_path.exists(),
            "Expected file to exist: {}",
            full_path.display()
        );
    }

    /// Assert that `path` (relative to the vault root) does **not** exist.
    ///
    /// # Panics
    /// Panics with a descriptive message if the path exists.
    pub fn assert_file_not_exists(&self, path: &str) {
        let full_path = self.root().join(path);
        assert!(
            !full_path.exists(),
            "Expected file NOT to exist: {}",
            full_path.display()
        );
    }

    /// Assert that the file at `path` contains `content`.
    ///
    /// # Panics
    /// Panics if the file cannot be read or does not contain `content`.
    pub fn assert_file_contains(&self, path: &str, content: &str) {
        let file_content = self.read_text(path);
        assert!(
            file_content.contains(content),
            "File {path} does not contain expected content.\nExpected: {content}\nActual: {file_content}"
        );
    }
}
