//! Format detection and package loading for archives.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::ArchiveHandle;
use crate::error::{NexusError, Result};
use crate::package::{ArchivePackage, ComposerPackage, ZpkPackage};

/// Reads one package format from an archive.
pub trait PackageLoader: fmt::Debug + Send + Sync {
    /// Whether this loader understands the archive.
    fn can_read_from_archive(&self, archive: &dyn ArchiveHandle) -> bool;

    /// Read the package metadata.
    fn load(&self, archive: &mut dyn ArchiveHandle) -> Result<Box<dyn ArchivePackage>>;
}

/// Loader for composer archives (`composer.json` at the archive root).
#[derive(Debug, Default)]
pub struct ComposerLoader;

impl ComposerLoader {
    pub const DESCRIPTOR_FILE: &'static str = "composer.json";
}

impl PackageLoader for ComposerLoader {
    fn can_read_from_archive(&self, archive: &dyn ArchiveHandle) -> bool {
        archive.contains(Self::DESCRIPTOR_FILE)
    }

    fn load(&self, archive: &mut dyn ArchiveHandle) -> Result<Box<dyn ArchivePackage>> {
        if !archive.contains(Self::DESCRIPTOR_FILE) {
            return Err(NexusError::invalid_argument(
                "The archive does not contain a composer.json",
            ));
        }

        let json = archive.read_to_string(Self::DESCRIPTOR_FILE)?;
        Ok(Box::new(ComposerPackage::from_json_str(&json)?))
    }
}

/// Loader for ZPK archives (`deployment.xml` at the archive root).
#[derive(Debug, Default)]
pub struct ZpkLoader;

impl ZpkLoader {
    pub const DESCRIPTOR_FILE: &'static str = "deployment.xml";
}

impl PackageLoader for ZpkLoader {
    fn can_read_from_archive(&self, archive: &dyn ArchiveHandle) -> bool {
        archive.contains(Self::DESCRIPTOR_FILE)
    }

    fn load(&self, archive: &mut dyn ArchiveHandle) -> Result<Box<dyn ArchivePackage>> {
        if !archive.contains(Self::DESCRIPTOR_FILE) {
            return Err(NexusError::invalid_argument(
                "The archive does not contain a deployment descriptor",
            ));
        }

        let xml = archive.read_to_string(Self::DESCRIPTOR_FILE)?;
        Ok(Box::new(ZpkPackage::from_xml(&xml)?))
    }
}

/// Resolves local archive files and reads packages from them.
#[derive(Debug)]
pub struct ArchiveLoader {
    download_dir: PathBuf,
    loaders: Vec<Box<dyn PackageLoader>>,
}

impl ArchiveLoader {
    /// Create a loader without any package format registered.
    pub fn new(download_dir: impl Into<PathBuf>) -> Self {
        Self {
            download_dir: download_dir.into(),
            loaders: Vec::new(),
        }
    }

    /// Create a loader with the ZPK and composer formats registered.
    pub fn with_default_loaders(download_dir: impl Into<PathBuf>) -> Self {
        let mut loader = Self::new(download_dir);
        loader.add_loader(Box::new(ZpkLoader));
        loader.add_loader(Box::new(ComposerLoader));
        loader
    }

    /// Register a package loader. Loaders are asked in registration order.
    pub fn add_loader(&mut self, loader: Box<dyn PackageLoader>) {
        self.loaders.push(loader);
    }

    pub fn download_directory(&self) -> &Path {
        &self.download_dir
    }

    /// Ensure the archive is available locally and return its path.
    ///
    /// Existing paths are used as given, anything else is looked up in the
    /// download directory.
    pub fn ensure_local_archive_file(&self, archive: impl AsRef<Path>) -> Result<PathBuf> {
        let archive = archive.as_ref();

        if archive.is_file() {
            return Ok(archive.to_path_buf());
        }

        let candidate = self.download_dir.join(archive);
        if candidate.is_file() {
            return Ok(candidate);
        }

        Err(NexusError::runtime(format!(
            "Archive is not available locally: {}",
            archive.display()
        )))
    }

    /// Read the package from an archive using the first loader that accepts it.
    pub fn get_package(&self, archive: &mut dyn ArchiveHandle) -> Result<Box<dyn ArchivePackage>> {
        let loader = self
            .loaders
            .iter()
            .find(|loader| loader.can_read_from_archive(&*archive))
            .ok_or_else(|| {
                NexusError::runtime(format!(
                    "Unsupported archive type: {}",
                    archive.path().display()
                ))
            })?;

        debug!(archive = %archive.path().display(), loader = ?loader, "Loading package from archive");
        loader.load(archive)
    }
}
