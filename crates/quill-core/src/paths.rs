//! Filesystem layout
//!
//! All on-disk locations are derived from a single `Paths` value owned by
//! the repository; nothing is process-global. The layout under the user's
//! home directory:
//!
//! - `~/.config/quill/config.json` - config list
//! - `~/.config/quill/<username>.key` - PIN-encrypted password
//! - `~/.config/quill/editor` - preferred editor name
//! - `~/.cache/quill/local/<username>/` - authoritative local blobs
//! - `~/.cache/quill/remote/<username>/` - blobs from the last fetch
//! - `~/.cache/quill/local/<username>.tar.bz2` - local archive
//! - `~/.cache/quill/remote/<username>.tar.bz2` - remote archive
//! - `~/.cache/quill/temp/temp` - scratch file, shredded on cleanup
//!
//! `ensure` is idempotent and must run before any store operation.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use rand::RngCore;
use tracing::debug;

use crate::error::{Error, Result};

const APP_DIR: &str = "quill";

/// File name suffix of the per-user sync archive
pub const ARCHIVE_SUFFIX: &str = ".tar.bz2";

/// Resolved config and cache locations for one store
#[derive(Debug, Clone)]
pub struct Paths {
    config_dir: PathBuf,
    cache_dir: PathBuf,
}

impl Paths {
    /// Resolve against the user's standard config and cache directories
    pub fn new() -> Result<Self> {
        let config_root = dirs::config_dir()
            .ok_or_else(|| Error::Io(std::io::Error::other("no config directory for this user")))?;
        let cache_root = dirs::cache_dir()
            .ok_or_else(|| Error::Io(std::io::Error::other("no cache directory for this user")))?;
        Ok(Self {
            config_dir: config_root.join(APP_DIR),
            cache_dir: cache_root.join(APP_DIR),
        })
    }

    /// Resolve everything under an arbitrary root (used by tests)
    pub fn under(root: &Path) -> Self {
        Self {
            config_dir: root.join(".config").join(APP_DIR),
            cache_dir: root.join(".cache").join(APP_DIR),
        }
    }

    /// Create every directory of the layout; safe to call repeatedly
    pub fn ensure(&self) -> Result<()> {
        debug!("ensuring quill directories");
        for dir in [
            self.config_dir.clone(),
            self.cache_dir.clone(),
            self.local_dir(),
            self.remote_dir(),
            self.temp_dir(),
        ] {
            fs::create_dir_all(&dir)?;
        }
        Ok(())
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.json")
    }

    pub fn key_file(&self, username: &str) -> PathBuf {
        self.config_dir.join(format!("{username}.key"))
    }

    pub fn editor_file(&self) -> PathBuf {
        self.config_dir.join("editor")
    }

    pub fn local_dir(&self) -> PathBuf {
        self.cache_dir.join("local")
    }

    pub fn remote_dir(&self) -> PathBuf {
        self.cache_dir.join("remote")
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.cache_dir.join("temp")
    }

    /// The scratch file used for editor round-trips
    pub fn scratch_file(&self) -> PathBuf {
        self.temp_dir().join("temp")
    }

    /// Directory of this user's authoritative local blobs
    pub fn local_repo(&self, username: &str) -> PathBuf {
        self.local_dir().join(username)
    }

    /// Directory of blobs unpacked from the last fetched remote archive
    pub fn remote_repo(&self, username: &str) -> PathBuf {
        self.remote_dir().join(username)
    }

    pub fn local_archive(&self, username: &str) -> PathBuf {
        self.local_dir().join(format!("{username}{ARCHIVE_SUFFIX}"))
    }

    pub fn remote_archive(&self, username: &str) -> PathBuf {
        self.remote_dir().join(format!("{username}{ARCHIVE_SUFFIX}"))
    }

    /// Shred the scratch file; best-effort
    pub fn clean_up(&self) {
        let _ = shred_file(&self.scratch_file());
    }

    /// Shred the configuration file
    pub fn erase_config(&self) {
        let _ = shred_file(&self.config_file());
    }

    /// Remove the whole configuration and cache trees
    pub fn erase_all(&self) {
        self.clean_up();
        self.erase_config();
        let _ = fs::remove_dir_all(&self.cache_dir);
        let _ = fs::remove_dir_all(&self.config_dir);
    }
}

/// Overwrite a file with random bytes, then remove it
///
/// Succeeds silently when the file does not exist.
pub fn shred_file(path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }
    let len = fs::metadata(path)?.len() as usize;
    let mut noise = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut noise);
    let mut file = File::create(path)?;
    file.write_all(&noise)?;
    file.sync_all()?;
    drop(file);
    fs::remove_file(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn ensure_creates_layout_idempotently() {
        let tmp = TempDir::new().unwrap();
        let paths = Paths::under(tmp.path());

        paths.ensure().unwrap();
        paths.ensure().unwrap();

        assert!(paths.local_dir().is_dir());
        assert!(paths.remote_dir().is_dir());
        assert!(paths.temp_dir().is_dir());
        assert!(paths.config_file().parent().unwrap().is_dir());
    }

    #[test]
    fn per_user_locations() {
        let tmp = TempDir::new().unwrap();
        let paths = Paths::under(tmp.path());

        assert!(paths.local_repo("alice").ends_with("local/alice"));
        assert!(paths.remote_repo("alice").ends_with("remote/alice"));
        assert!(paths
            .local_archive("alice")
            .to_string_lossy()
            .ends_with("local/alice.tar.bz2"));
        assert!(paths
            .key_file("alice")
            .to_string_lossy()
            .ends_with("alice.key"));
    }

    #[test]
    fn shred_removes_file() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("secret.txt");
        fs::write(&target, b"sensitive").unwrap();

        shred_file(&target).unwrap();
        assert!(!target.exists());
    }

    #[test]
    fn shred_missing_file_is_ok() {
        let tmp = TempDir::new().unwrap();
        assert!(shred_file(&tmp.path().join("nope")).is_ok());
    }

    #[test]
    fn erase_all_removes_trees() {
        let tmp = TempDir::new().unwrap();
        let paths = Paths::under(tmp.path());
        paths.ensure().unwrap();
        fs::write(paths.config_file(), b"[]").unwrap();

        paths.erase_all();
        assert!(!paths.config_file().exists());
        assert!(!paths.local_dir().exists());
    }
}
