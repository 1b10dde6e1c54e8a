//! Platform dependencies declared by packages.

use serde::Serialize;

use super::constraint::{Constraint, ConstraintBuilder};
use crate::error::Result;

/// Dependency on a platform component (`php`, `ext-pdo`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformDependency {
    name: String,
    constraint: String,
}

impl PlatformDependency {
    /// Typename for platform dependencies
    pub const TYPE_PLATFORM: &'static str = "platform";

    pub fn new(name: impl Into<String>, constraint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            constraint: constraint.into(),
        }
    }

    /// A dependency satisfied by any version.
    pub fn any(name: impl Into<String>) -> Self {
        Self::new(name, "*")
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dependency_type(&self) -> &'static str {
        Self::TYPE_PLATFORM
    }

    pub fn constraint_str(&self) -> &str {
        &self.constraint
    }

    /// Parse the constraint string into a matchable tree.
    pub fn constraint(&self) -> Result<Constraint> {
        ConstraintBuilder::new().create_constraint(&self.constraint)
    }

    /// Check a platform version against this dependency.
    pub fn is_satisfied_by(&self, version: &str) -> Result<bool> {
        Ok(self.constraint()?.matches(version))
    }
}
