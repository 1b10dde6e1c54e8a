//! Application instances
//!
//! An instance is one deployment of an application: a package version mounted
//! at a path on a vhost, configured with user parameters. Assigning a new
//! package keeps the previous package and parameters around for a single
//! step of rollback.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::application::SharedApplication;
use crate::error::{NexusError, Result};
use crate::package::{ApplicationPackage, Package};
use crate::vhost::VHost;

static INSTANCE_ID_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_-]+$").expect("Invalid instance id regex")
});

static PATH_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/?[A-Za-z0-9_-]+(/[A-Za-z0-9_-]+)*/?$").expect("Invalid path regex")
});

/// Deployment state of an application instance.
///
/// `Working` is only produced by aggregation over nodes. Node reports outside
/// the known set are kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ApplicationState {
    #[default]
    Pending,
    Staging,
    Activating,
    Deployed,
    Deactivating,
    Inactive,
    Removing,
    Removed,
    Error,
    Working,
    Unknown,
    Other(String),
}

impl ApplicationState {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Staging => "staging",
            Self::Activating => "activating",
            Self::Deployed => "deployed",
            Self::Deactivating => "deactivating",
            Self::Inactive => "inactive",
            Self::Removing => "removing",
            Self::Removed => "removed",
            Self::Error => "error",
            Self::Working => "working",
            Self::Unknown => "unknown",
            Self::Other(state) => state,
        }
    }

    /// Transitional states that aggregate to [`ApplicationState::Working`].
    pub fn is_working(&self) -> bool {
        matches!(
            self,
            Self::Activating | Self::Deactivating | Self::Removing | Self::Staging
        )
    }
}

impl From<&str> for ApplicationState {
    fn from(state: &str) -> Self {
        match state {
            "pending" => Self::Pending,
            "staging" => Self::Staging,
            "activating" => Self::Activating,
            "deployed" => Self::Deployed,
            "deactivating" => Self::Deactivating,
            "inactive" => Self::Inactive,
            "removing" => Self::Removing,
            "removed" => Self::Removed,
            "error" => Self::Error,
            "working" => Self::Working,
            "unknown" => Self::Unknown,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for ApplicationState {
    fn from(state: String) -> Self {
        Self::from(state.as_str())
    }
}

impl From<ApplicationState> for String {
    fn from(state: ApplicationState) -> Self {
        state.as_str().to_string()
    }
}

impl fmt::Display for ApplicationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User supplied parameter values, keyed by parameter name.
pub type UserParameters = BTreeMap<String, String>;

/// One deployment of an application.
#[derive(Debug, Clone)]
pub struct ApplicationInstance {
    id: String,
    label: Option<String>,
    state: ApplicationState,
    application: SharedApplication,
    package: Option<ApplicationPackage>,
    previous_package: Option<ApplicationPackage>,
    vhost: Option<String>,
    path: String,
    flavor: Option<String>,
    user_parameters: UserParameters,
    previous_user_parameters: Option<UserParameters>,
    removed: bool,
}

/// Exported application instance
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationInstanceExport {
    pub id: String,
    pub label: String,
    pub state: ApplicationState,
    pub application: String,
    pub package: Option<String>,
    pub previous_package: Option<String>,
    pub vhost: Option<String>,
    pub path: String,
    pub flavor: Option<String>,
    pub user_parameters: UserParameters,
    pub is_removed: bool,
}

impl ApplicationInstance {
    /// Create an instance of `application`.
    ///
    /// The id must be a slug. A given path is validated and normalized to
    /// `/segment/.../`; without one the instance is mounted at `/`.
    pub fn new(
        application: SharedApplication,
        id: impl Into<String>,
        vhost: Option<&VHost>,
        path: Option<&str>,
    ) -> Result<Self> {
        let id = id.into();
        if !INSTANCE_ID_REGEX.is_match(&id) {
            return Err(NexusError::invalid_argument(format!(
                "Bad application instance identifier: {}",
                id
            )));
        }

        let path = match path.filter(|p| !p.is_empty()) {
            Some(path) => normalize_path(path)?,
            None => "/".to_string(),
        };

        Ok(Self {
            id,
            label: None,
            state: ApplicationState::Pending,
            application,
            package: None,
            previous_package: None,
            vhost: vhost.map(|v| v.id().to_string()),
            path,
            flavor: None,
            user_parameters: UserParameters::new(),
            previous_user_parameters: None,
            removed: false,
        })
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

    pub fn state(&self) -> &ApplicationState {
        &self.state
    }

    pub fn set_state(&mut self, state: impl Into<ApplicationState>) {
        let state = state.into();
        if state != self.state {
            debug!(instance = %self.id, from = %self.state, to = %state, "Application instance state changed");
        }
        self.state = state;
    }

    pub fn application(&self) -> &SharedApplication {
        &self.application
    }

    /// Id of the parent application.
    pub fn application_id(&self) -> Result<String> {
        let application = self
            .application
            .read()
            .map_err(|_| NexusError::runtime("Application lock poisoned"))?;
        Ok(application.id().to_string())
    }

    pub fn belongs_to(&self, application: &SharedApplication) -> bool {
        Arc::ptr_eq(&self.application, application)
    }

    /// Id of the vhost this instance is mounted on, if one was given.
    pub fn vhost(&self) -> Option<&str> {
        self.vhost.as_deref()
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn package(&self) -> Option<&ApplicationPackage> {
        self.package.as_ref()
    }

    pub fn previous_package(&self) -> Option<&ApplicationPackage> {
        self.previous_package.as_ref()
    }

    /// Deploy another package of the parent application.
    ///
    /// The current package and user parameters become the rollback snapshot.
    pub fn set_package(&mut self, package: &dyn Package) -> Result<()> {
        let package_id = package.id();
        let snapshot = {
            let application = self
                .application
                .read()
                .map_err(|_| NexusError::runtime("Application lock poisoned"))?;

            application.find_package(&package_id).cloned().ok_or_else(|| {
                NexusError::logic(format!(
                    "Package {} does not provide application {}",
                    package_id,
                    application.id()
                ))
            })?
        };

        debug!(instance = %self.id, package = %package_id, "Assigning package");
        self.previous_package = self.package.replace(snapshot);
        self.previous_user_parameters = Some(self.user_parameters.clone());
        Ok(())
    }

    /// Restore the previous package and user parameters.
    pub fn rollback(&mut self) -> Result<()> {
        let previous = self
            .previous_package
            .take()
            .ok_or_else(|| NexusError::logic("Cannot roll back without previous package"))?;

        debug!(instance = %self.id, package = %previous.id(), "Rolling back package");
        self.package = Some(previous);
        self.user_parameters = self.previous_user_parameters.take().unwrap_or_default();
        Ok(())
    }

    pub fn flavor(&self) -> Option<&str> {
        self.flavor.as_deref()
    }

    pub fn set_flavor(&mut self, flavor: Option<String>) {
        self.flavor = flavor;
    }

    pub fn user_parameters(&self) -> &UserParameters {
        &self.user_parameters
    }

    pub fn set_user_parameters(&mut self, parameters: UserParameters) {
        self.user_parameters = parameters;
    }

    pub fn previous_user_parameters(&self) -> Option<&UserParameters> {
        self.previous_user_parameters.as_ref()
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }

    /// Mark the instance for removal.
    pub fn remove(&mut self) {
        self.set_state(ApplicationState::Removing);
        self.removed = true;
    }

    pub fn export(&self) -> Result<ApplicationInstanceExport> {
        Ok(ApplicationInstanceExport {
            id: self.id.clone(),
            label: self.label().to_string(),
            state: self.state.clone(),
            application: self.application_id()?,
            package: self.package.as_ref().map(|p| p.id()),
            previous_package: self.previous_package.as_ref().map(|p| p.id()),
            vhost: self.vhost.clone(),
            path: self.path.clone(),
            flavor: self.flavor.clone(),
            user_parameters: self.user_parameters.clone(),
            is_removed: self.removed,
        })
    }
}

fn normalize_path(path: &str) -> Result<String> {
    if !PATH_REGEX.is_match(path) {
        return Err(NexusError::invalid_argument(format!(
            "Bad application path: {}",
            path
        )));
    }

    Ok(format!("/{}/", path.trim_matches('/')))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_string_conversion() {
        assert_eq!(ApplicationState::from("deployed"), ApplicationState::Deployed);
        assert_eq!(
            ApplicationState::from("upgrading"),
            ApplicationState::Other("upgrading".into())
        );
        assert_eq!(ApplicationState::Other("upgrading".into()).as_str(), "upgrading");
        assert_eq!(ApplicationState::Working.to_string(), "working");
    }

    #[test]
    fn test_state_serializes_as_string() {
        let json = serde_json::to_string(&ApplicationState::Removing).unwrap();
        assert_eq!(json, "\"removing\"");
        let state: ApplicationState = serde_json::from_str("\"staging\"").unwrap();
        assert!(state.is_working());
    }

    #[test]
    fn test_path_normalization() {
        assert_eq!(normalize_path("shop").unwrap(), "/shop/");
        assert_eq!(normalize_path("/shop/admin").unwrap(), "/shop/admin/");
        assert_eq!(normalize_path("/Shop_1/").unwrap(), "/Shop_1/");
        for bad in ["/", "//shop", "shop//admin", "shop.php", "a b"] {
            assert!(normalize_path(bad).unwrap_err().is_invalid_argument(), "{bad}");
        }
    }
}
