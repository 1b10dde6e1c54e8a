//! Package archives
//!
//! An archive handle gives read access to the files inside a package archive.
//! [`loader::ArchiveLoader`] picks the package format by asking each registered
//! [`loader::PackageLoader`] whether it understands the archive.

pub mod loader;

use std::fmt;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use zip::ZipArchive;

use crate::error::{NexusError, Result};

pub use loader::{ArchiveLoader, ComposerLoader, PackageLoader, ZpkLoader};

/// Read access to the entries of a package archive.
pub trait ArchiveHandle: fmt::Debug {
    /// Location of the archive.
    fn path(&self) -> &Path;

    /// Whether the archive contains an entry with this name.
    fn contains(&self, name: &str) -> bool;

    /// Read the full content of an entry.
    fn read(&mut self, name: &str) -> Result<Vec<u8>>;

    /// Read an entry as UTF-8 text.
    fn read_to_string(&mut self, name: &str) -> Result<String> {
        let bytes = self.read(name)?;
        String::from_utf8(bytes).map_err(|_| {
            NexusError::unexpected_value(format!("Archive entry is not valid UTF-8: {}", name))
        })
    }
}

/// Zip archive handle, used for both composer and ZPK archives.
pub struct ZipArchiveHandle {
    path: PathBuf,
    archive: ZipArchive<Cursor<Vec<u8>>>,
}

impl ZipArchiveHandle {
    /// Open a local zip file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        Self::from_bytes(path, data)
    }

    /// Wrap an in-memory zip archive. `path` is only used for reporting.
    pub fn from_bytes(path: impl Into<PathBuf>, data: Vec<u8>) -> Result<Self> {
        let archive = ZipArchive::new(Cursor::new(data))?;
        Ok(Self {
            path: path.into(),
            archive,
        })
    }

    pub fn len(&self) -> usize {
        self.archive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archive.is_empty()
    }
}

impl fmt::Debug for ZipArchiveHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZipArchiveHandle")
            .field("path", &self.path)
            .field("entries", &self.archive.len())
            .finish()
    }
}

impl ArchiveHandle for ZipArchiveHandle {
    fn path(&self) -> &Path {
        &self.path
    }

    fn contains(&self, name: &str) -> bool {
        self.archive.file_names().any(|entry| entry == name)
    }

    fn read(&mut self, name: &str) -> Result<Vec<u8>> {
        let mut file = self.archive.by_name(name)?;
        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer)?;
        Ok(buffer)
    }
}
