//! Content-addressed file storage.
//!
//! Ingested files are copied under the content directory and named after
//! their blake3 hash, keeping the original extension. The stored basename is
//! what asset rows reference.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use blake3::Hasher;

use crate::error::StorageError;
use crate::{Error, Result};

/// A file copied into the content directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredContent {
    /// Basename under the content directory.
    pub basename: String,
    /// Hex blake3 digest of the bytes.
    pub hash: String,
    /// Absolute path of the stored copy.
    pub path: PathBuf,
    /// False if a file with this name was already present.
    pub created: bool,
}

/// Directory of stored content files.
#[derive(Debug, Clone)]
pub struct ContentStore {
    root: PathBuf,
}

impl ContentStore {
    /// Open (creating if needed) the content directory.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        let root = fs::canonicalize(&root)?;
        Ok(Self { root })
    }

    /// Root directory of stored files.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Hash a source file and derive its stored basename.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the source cannot be read.
    pub fn fingerprint(source: &Path) -> Result<(String, String)> {
        let mut file = File::open(source)?;
        let mut hasher = Hasher::new();
        io::copy(&mut file, &mut hasher)?;
        let hash = hasher.finalize().to_hex().to_string();

        let basename = match source.extension().and_then(|e| e.to_str()) {
            Some(ext) if !ext.is_empty() => format!("{hash}.{}", ext.to_lowercase()),
            _ => hash.clone(),
        };
        Ok((hash, basename))
    }

    /// Copy `source` into the store under `basename` and flush it to disk.
    ///
    /// The copy is written to a temporary name and renamed into place so a
    /// crash never leaves a truncated file under the final name.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the copy or sync fails.
    pub fn ingest(&self, source: &Path, hash: &str, basename: &str) -> Result<StoredContent> {
        let target = self.root.join(check_basename(basename)?);
        let created = !target.exists();
        let partial = self.root.join(format!("{basename}.part"));

        let copy = || -> io::Result<()> {
            fs::copy(source, &partial)?;
            File::open(&partial)?.sync_all()?;
            fs::rename(&partial, &target)?;
            Ok(())
        };

        if let Err(e) = copy() {
            let _ = fs::remove_file(&partial);
            return Err(e.into());
        }

        // Make the rename itself durable where the platform allows it.
        if let Ok(dir) = File::open(&self.root) {
            let _ = dir.sync_all();
        }

        tracing::debug!(basename, "Stored content");
        Ok(StoredContent {
            basename: basename.to_string(),
            hash: hash.to_string(),
            path: target,
            created,
        })
    }

    /// Delete a stored file; a missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid basename or a failed delete.
    pub fn remove(&self, basename: &str) -> Result<()> {
        let path = self.root.join(check_basename(basename)?);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Resolve a stored basename to its real absolute path.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a basename that is not a plain file
    /// name, and `NotFound` if the file is missing on disk.
    pub fn real_path(&self, basename: &str) -> Result<PathBuf> {
        let path = self.root.join(check_basename(basename)?);
        match fs::canonicalize(&path) {
            Ok(real) if real.is_file() => Ok(real),
            Ok(_) => Err(StorageError::not_found("content", basename).into()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StorageError::not_found("content", basename).into())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Reject anything that could escape the content directory.
fn check_basename(basename: &str) -> Result<&str> {
    let is_plain = !basename.is_empty()
        && basename != "."
        && basename != ".."
        && !basename.contains(['/', '\\', '\0']);
    if is_plain {
        Ok(basename)
    } else {
        Err(Error::validation(format!(
            "'{basename}' is not a valid content reference"
        )))
    }
}
