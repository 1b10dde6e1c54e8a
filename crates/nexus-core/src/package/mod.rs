//! Package model
//!
//! Packages are the parsed metadata of a deployable archive. Two source
//! formats are supported:
//! - composer packages (`composer.json` with an `extra.deployment` section)
//! - ZPK packages (`deployment.xml` deployment descriptor)
//!
//! Both are exposed through the [`Package`] trait. Entities never keep the
//! format-specific types around; they store [`ApplicationPackage`] copies.

pub mod application_package;
pub mod composer;
pub mod constraint;
pub mod dependency;
pub mod export;
pub mod parameter;
pub mod version;
pub mod zpk;

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Map, Value};

pub use application_package::ApplicationPackage;
pub use composer::ComposerPackage;
pub use constraint::{
    CombinationType, Constraint, ConstraintBuilder, ConstraintCombination, SingleConstraint,
};
pub use dependency::PlatformDependency;
pub use export::{PackageExport, ParameterExport, export_package};
pub use parameter::{PackageParameter, Parameter, ParameterDefinition};
pub use version::{BuildId, is_stable_version};
pub use zpk::ZpkPackage;

use crate::error::Result;

/// Read access to a parsed package.
pub trait Package: fmt::Debug + Send + Sync {
    /// Unique package id, `name@version` (the version includes a build id if set).
    fn id(&self) -> String {
        format!("{}@{}", self.name(), self.version())
    }

    fn name(&self) -> &str;

    /// The package version, including the `+<buildId>` suffix if one is set.
    fn version(&self) -> String;

    /// Package type tag (`composer`, `zpk`).
    fn package_type(&self) -> &str;

    /// Relative path to the document root.
    fn document_root(&self) -> &str;

    fn parameters(&self) -> &[PackageParameter];

    fn variables(&self) -> &BTreeMap<String, String>;

    /// Format specific extra information.
    fn extra(&self) -> &Map<String, Value>;

    fn extra_value(&self, name: &str) -> Option<&Value> {
        self.extra().get(name)
    }

    fn is_stable(&self) -> bool {
        is_stable_version(&self.version())
    }

    /// Platform requirements declared by the package.
    fn dependencies(&self) -> &[PlatformDependency] {
        &[]
    }

    fn parameter(&self, name: &str) -> Option<&PackageParameter> {
        self.parameters().iter().find(|p| p.name() == name)
    }
}

/// Packages whose reported version can carry a build identifier.
pub trait BuildIdAware {
    /// Set the build id. An empty string clears it, malformed ids are rejected.
    fn set_build_id(&mut self, build_id: &str) -> Result<()>;

    fn build_id(&self) -> Option<&str>;
}

/// A package freshly read from an archive.
pub trait ArchivePackage: Package + BuildIdAware {
    fn as_package(&self) -> &dyn Package;
}

impl<T: Package + BuildIdAware> ArchivePackage for T {
    fn as_package(&self) -> &dyn Package {
        self
    }
}
