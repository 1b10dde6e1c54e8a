use std::collections::BTreeMap;

use serde_json::{Map, Value};

use super::dependency::PlatformDependency;
use super::parameter::PackageParameter;
use super::{Package, is_stable_version};
use crate::error::{NexusError, Result};

/// Persistable copy of a package, owned by an [`Application`](crate::application::Application).
#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationPackage {
    id: String,
    name: String,
    version: String,
    package_type: String,
    document_root: String,
    archive: Option<String>,
    extra: Map<String, Value>,
    variables: BTreeMap<String, String>,
    parameters: Vec<PackageParameter>,
    dependencies: Vec<PlatformDependency>,
    stable: bool,
}

impl ApplicationPackage {
    /// Snapshot any package implementation.
    pub fn from_package(package: &dyn Package) -> Self {
        Self {
            id: package.id(),
            name: package.name().to_string(),
            version: package.version(),
            package_type: package.package_type().to_string(),
            document_root: package.document_root().to_string(),
            archive: None,
            extra: package.extra().clone(),
            variables: package.variables().clone(),
            parameters: package
                .parameters()
                .iter()
                .map(|p| PackageParameter::from_parameter(p))
                .collect(),
            dependencies: package.dependencies().to_vec(),
            stable: package.is_stable(),
        }
    }

    /// Refresh this copy from another package of the same type.
    pub fn copy_from(&mut self, package: &dyn Package) -> Result<()> {
        if !self.package_type.is_empty() && self.package_type != package.package_type() {
            return Err(NexusError::unexpected_value(format!(
                "Incompatible package type: expected \"{}\", got \"{}\"",
                self.package_type,
                package.package_type()
            )));
        }

        let archive = self.archive.take();
        *self = Self::from_package(package);
        self.archive = archive;
        Ok(())
    }

    /// Location of the archive this package was read from, if known.
    pub fn archive(&self) -> Option<&str> {
        self.archive.as_deref()
    }

    pub fn set_archive(&mut self, archive: impl Into<String>) {
        self.archive = Some(archive.into());
    }

    pub fn set_is_stable(&mut self, stable: bool) {
        self.stable = stable;
    }

    /// Whether the version string itself looks stable, ignoring any override.
    pub fn has_stable_version(&self) -> bool {
        is_stable_version(&self.version)
    }
}

impl Package for ApplicationPackage {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> String {
        self.version.clone()
    }

    fn package_type(&self) -> &str {
        &self.package_type
    }

    fn document_root(&self) -> &str {
        &self.document_root
    }

    fn parameters(&self) -> &[PackageParameter] {
        &self.parameters
    }

    fn variables(&self) -> &BTreeMap<String, String> {
        &self.variables
    }

    fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    fn is_stable(&self) -> bool {
        self.stable
    }

    fn dependencies(&self) -> &[PlatformDependency] {
        &self.dependencies
    }
}
