//! Applications group the packages published under one package name.

use std::sync::{Arc, RwLock};

use serde::Serialize;

use crate::error::{NexusError, Result};
use crate::package::{ApplicationPackage, Package, PackageExport, export_package};

/// Application shared between the instances deployed from it.
pub type SharedApplication = Arc<RwLock<Application>>;

/// A named set of package versions.
#[derive(Debug, Clone, Default)]
pub struct Application {
    id: String,
    label: Option<String>,
    icon: Option<Vec<u8>>,
    packages: Vec<ApplicationPackage>,
}

/// Exported application
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationExport {
    pub id: String,
    pub label: String,
    #[serde(rename = "hasIcon")]
    pub has_icon: bool,
    pub packages: Vec<PackageExport>,
}

impl Application {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Wrap the application for sharing with instances.
    pub fn into_shared(self) -> SharedApplication {
        Arc::new(RwLock::new(self))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Display label, falls back to the id.
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.id)
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = Some(label.into());
    }

    pub fn icon(&self) -> Option<&[u8]> {
        self.icon.as_deref()
    }

    pub fn set_icon(&mut self, icon: Vec<u8>) {
        self.icon = Some(icon);
    }

    pub fn packages(&self) -> &[ApplicationPackage] {
        &self.packages
    }

    /// Add a package snapshot. Package ids are unique within an application.
    pub fn add_package(&mut self, package: &dyn Package) -> Result<&ApplicationPackage> {
        let id = package.id();
        if self.find_package(&id).is_some() {
            return Err(NexusError::logic(format!(
                "Package {} already exists in application {}",
                id, self.id
            )));
        }

        self.packages.push(ApplicationPackage::from_package(package));
        Ok(&self.packages[self.packages.len() - 1])
    }

    pub fn find_package(&self, package_id: &str) -> Option<&ApplicationPackage> {
        self.packages.iter().find(|p| p.id() == package_id)
    }

    pub fn has_package(&self, package: &dyn Package) -> bool {
        self.find_package(&package.id()).is_some()
    }

    pub fn export(&self) -> ApplicationExport {
        ApplicationExport {
            id: self.id.clone(),
            label: self.label().to_string(),
            has_icon: self.icon.is_some(),
            packages: self.packages.iter().map(export_package).collect(),
        }
    }
}
