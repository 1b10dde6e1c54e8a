//! Virtual hosts
//!
//! A vhost names the web host an application instance is mounted under. The
//! reserved name `*` denotes the default vhost and can only be obtained through
//! [`VHost::default_vhost`].

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::error::{NexusError, Result};
use crate::ids::generate_id;

/// Name of the default vhost
pub const DEFAULT_VHOST: &str = "*";

static VALID_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_-]+(\.[A-Za-z0-9_-]+)*$").expect("Invalid vhost name regex")
});

#[derive(Debug, Clone, PartialEq)]
pub struct VHost {
    id: String,
    name: String,
    flavor: Option<String>,
    aliases: Vec<String>,
    enable_ssl: bool,
}

/// Exported vhost
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VHostExport {
    /// `None` for the default vhost.
    pub id: Option<String>,
    pub name: String,
    pub is_default: bool,
    pub flavor: Option<String>,
    pub aliases: Vec<String>,
    pub enable_ssl: bool,
}

impl VHost {
    /// Create a named vhost with a freshly generated id.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        validate_name(&name)?;

        Ok(Self {
            id: generate_id("VHOST."),
            name,
            flavor: None,
            aliases: Vec::new(),
            enable_ssl: false,
        })
    }

    /// The catch-all vhost.
    pub fn default_vhost() -> Self {
        Self {
            id: generate_id("VHOST."),
            name: DEFAULT_VHOST.to_string(),
            flavor: None,
            aliases: Vec::new(),
            enable_ssl: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_default(&self) -> bool {
        self.name == DEFAULT_VHOST
    }

    /// Rename the vhost. The default vhost name cannot be assigned.
    pub fn set_name(&mut self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        validate_name(&name)?;
        self.name = name;
        Ok(())
    }

    pub fn flavor(&self) -> Option<&str> {
        self.flavor.as_deref()
    }

    pub fn set_flavor(&mut self, flavor: Option<String>) {
        self.flavor = flavor;
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    /// Add an alias. Empty and duplicate aliases are ignored.
    pub fn add_alias(&mut self, alias: impl Into<String>) {
        let alias = alias.into();
        if !alias.is_empty() && !self.aliases.contains(&alias) {
            self.aliases.push(alias);
        }
    }

    pub fn remove_alias(&mut self, alias: &str) {
        self.aliases.retain(|a| a != alias);
    }

    pub fn clear_aliases(&mut self) {
        self.aliases.clear();
    }

    pub fn set_aliases<I, S>(&mut self, aliases: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.clear_aliases();
        for alias in aliases {
            self.add_alias(alias);
        }
    }

    pub fn is_ssl_enabled(&self) -> bool {
        self.enable_ssl
    }

    pub fn set_enable_ssl(&mut self, enable_ssl: bool) {
        self.enable_ssl = enable_ssl;
    }

    /// Update the vhost from an exported representation.
    ///
    /// The name is validated before anything is changed.
    pub fn exchange_array(&mut self, data: &Value) -> Result<()> {
        let data = data
            .as_object()
            .ok_or_else(|| NexusError::invalid_argument("VHost data must be an object"))?;

        let name = data.get("name").and_then(Value::as_str).unwrap_or_default();
        validate_name(name)?;

        self.name = name.to_string();
        self.flavor = data
            .get("flavor")
            .and_then(Value::as_str)
            .map(str::to_string);
        self.set_aliases(
            data.get("aliases")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
                .filter_map(Value::as_str),
        );
        self.enable_ssl = data
            .get("enableSsl")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        Ok(())
    }

    pub fn export(&self) -> VHostExport {
        VHostExport {
            id: (!self.is_default()).then(|| self.id.clone()),
            name: self.name.clone(),
            is_default: self.is_default(),
            flavor: self.flavor.clone(),
            aliases: self.aliases.clone(),
            enable_ssl: self.enable_ssl,
        }
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(NexusError::invalid_argument(
            "The VHost name must not be empty",
        ));
    }

    if name == DEFAULT_VHOST || !VALID_NAME_REGEX.is_match(name) {
        return Err(NexusError::invalid_argument(format!(
            "Invalid vhost name: \"{}\"",
            name
        )));
    }

    Ok(())
}
