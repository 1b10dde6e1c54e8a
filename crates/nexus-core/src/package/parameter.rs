//! Package parameters.
//!
//! A parameter is a typed, labelled input a package asks the operator for when
//! an instance is deployed. Both package formats feed their format-specific
//! declarations through [`ParameterDefinition`], which owns validation and
//! default handling, so the composer and ZPK parsers only translate syntax.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::error::{NexusError, Result};

/// Parameter type used when a declaration does not name one.
pub const DEFAULT_PARAMETER_TYPE: &str = "text";

static PARAMETER_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("Invalid parameter name regex")
});

/// Check whether `name` is usable as a parameter (and environment variable) name.
pub fn is_valid_parameter_name(name: &str) -> bool {
    PARAMETER_NAME_REGEX.is_match(name)
}

/// Read access to a package parameter, regardless of where it came from.
pub trait Parameter {
    /// The parameter name, safe to pass as an environment variable name.
    fn name(&self) -> &str;

    /// Type hint for building the input widget (`text`, `select`, `password`, ...).
    fn parameter_type(&self) -> &str;

    fn default_value(&self) -> Option<&str>;

    /// Human readable label. Falls back to the name.
    fn label(&self) -> &str;

    /// Arbitrary element options.
    fn options(&self) -> &BTreeMap<String, Value>;

    /// Allowed values mapped to their display labels, if the value is constrained.
    fn value_options(&self) -> Option<&BTreeMap<String, String>>;

    fn is_required(&self) -> bool;

    fn has_value_options(&self) -> bool {
        self.value_options().is_some()
    }

    /// Check a user supplied value against the declared value options.
    ///
    /// Unconstrained parameters accept anything.
    fn accepts_value(&self, value: &str) -> bool {
        match self.value_options() {
            Some(allowed) => allowed.contains_key(value),
            None => true,
        }
    }
}

/// Owned, persistable parameter implementation.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageParameter {
    name: String,
    label: Option<String>,
    parameter_type: String,
    default: Option<String>,
    options: BTreeMap<String, Value>,
    value_options: Option<BTreeMap<String, String>>,
    required: bool,
}

impl PackageParameter {
    /// Create a `text` parameter with the given name.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        validate_name(&name)?;

        Ok(Self {
            name,
            label: None,
            parameter_type: DEFAULT_PARAMETER_TYPE.to_string(),
            default: None,
            options: BTreeMap::new(),
            value_options: None,
            required: false,
        })
    }

    /// Copy any other parameter implementation.
    pub fn from_parameter(parameter: &dyn Parameter) -> Self {
        let label = parameter.label();
        Self {
            name: parameter.name().to_string(),
            label: (label != parameter.name()).then(|| label.to_string()),
            parameter_type: parameter.parameter_type().to_string(),
            default: parameter.default_value().map(str::to_string),
            options: parameter.options().clone(),
            value_options: parameter.value_options().cloned(),
            required: parameter.is_required(),
        }
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        validate_name(&name)?;
        self.name = name;
        Ok(())
    }

    pub fn set_type(&mut self, parameter_type: impl Into<String>) {
        self.parameter_type = parameter_type.into();
    }

    pub fn set_default(&mut self, default: Option<String>) {
        self.default = default;
    }

    /// Set the label. An empty label restores the name fallback.
    pub fn set_label(&mut self, label: impl Into<String>) {
        let label = label.into();
        self.label = (!label.is_empty()).then_some(label);
    }

    pub fn set_required(&mut self, required: bool) {
        self.required = required;
    }

    pub fn set_option(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.options.insert(name.into(), value.into());
    }

    pub fn set_options(&mut self, options: BTreeMap<String, Value>) {
        self.options = options;
    }

    /// Add an allowed value. The label defaults to the value itself.
    pub fn add_value_option(&mut self, option: impl Into<String>, label: Option<String>) {
        let option = option.into();
        let label = label.unwrap_or_else(|| option.clone());
        self.value_options
            .get_or_insert_with(BTreeMap::new)
            .insert(option, label);
    }

    /// Replace the allowed values. An empty map still constrains the value.
    pub fn set_value_options<I, K, V>(&mut self, options: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.value_options = Some(
            options
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
    }

    pub fn remove_value_options(&mut self) {
        self.value_options = None;
    }
}

impl Parameter for PackageParameter {
    fn name(&self) -> &str {
        &self.name
    }

    fn parameter_type(&self) -> &str {
        &self.parameter_type
    }

    fn default_value(&self) -> Option<&str> {
        self.default.as_deref()
    }

    fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }

    fn options(&self) -> &BTreeMap<String, Value> {
        &self.options
    }

    fn value_options(&self) -> Option<&BTreeMap<String, String>> {
        self.value_options.as_ref()
    }

    fn is_required(&self) -> bool {
        self.required
    }
}

fn validate_name(name: &str) -> Result<()> {
    if !is_valid_parameter_name(name) {
        return Err(NexusError::invalid_argument(format!(
            "Invalid parameter name: \"{}\"",
            name
        )));
    }
    Ok(())
}

/// Format-neutral parameter declaration produced by the package parsers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterDefinition {
    pub name: String,
    pub parameter_type: Option<String>,
    pub label: Option<String>,
    pub default: Option<String>,
    pub required: bool,
    pub options: BTreeMap<String, Value>,
    pub value_options: Option<BTreeMap<String, String>>,
}

impl ParameterDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Turn the declaration into a validated parameter.
    ///
    /// Empty type, label and default strings are treated as absent.
    pub fn build(self) -> Result<PackageParameter> {
        let mut parameter = PackageParameter::new(self.name)?;

        if let Some(parameter_type) = self.parameter_type.filter(|t| !t.is_empty()) {
            parameter.set_type(parameter_type);
        }
        if let Some(label) = self.label {
            parameter.set_label(label);
        }

        parameter.set_default(self.default.filter(|d| !d.is_empty()));
        parameter.set_required(self.required);
        parameter.set_options(self.options);

        if let Some(value_options) = self.value_options {
            parameter.set_value_options(value_options);
        }

        Ok(parameter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_falls_back_to_name() {
        let mut param = PackageParameter::new("db_host").unwrap();
        assert_eq!(param.label(), "db_host");

        param.set_label("Database host");
        assert_eq!(param.label(), "Database host");

        param.set_label("");
        assert_eq!(param.label(), "db_host");
    }

    #[test]
    fn test_invalid_names_rejected() {
        for name in ["", "1abc", "db-host", "with space", "a.b"] {
            let err = PackageParameter::new(name).unwrap_err();
            assert!(err.is_invalid_argument(), "{name} should be rejected");
        }
        assert!(PackageParameter::new("_private").is_ok());
        assert!(PackageParameter::new("APP_ENV").is_ok());
    }

    #[test]
    fn test_value_options_constrain_values() {
        let mut param = PackageParameter::new("mode").unwrap();
        assert!(!param.has_value_options());
        assert!(param.accepts_value("anything"));

        param.add_value_option("fast", None);
        param.add_value_option("safe", Some("Safe mode".into()));

        assert!(param.has_value_options());
        assert!(param.accepts_value("fast"));
        assert!(!param.accepts_value("slow"));
        assert_eq!(param.value_options().unwrap()["safe"], "Safe mode");
        assert_eq!(param.value_options().unwrap()["fast"], "fast");

        param.remove_value_options();
        assert!(param.accepts_value("slow"));
    }

    #[test]
    fn test_empty_value_options_still_constrain() {
        let mut param = PackageParameter::new("mode").unwrap();
        param.set_value_options(Vec::<(String, String)>::new());
        assert!(param.has_value_options());
        assert!(!param.accepts_value("fast"));
    }

    #[test]
    fn test_copy_from_other_parameter() {
        let mut original = PackageParameter::new("level").unwrap();
        original.set_type("select");
        original.set_label("Level");
        original.set_default(Some("2".into()));
        original.set_required(true);
        original.set_option("readonly", true);
        original.set_value_options([("1", "One"), ("2", "Two")]);

        let copy = PackageParameter::from_parameter(&original);
        assert_eq!(copy, original);
    }

    #[test]
    fn test_copy_keeps_label_fallback() {
        let original = PackageParameter::new("plain").unwrap();
        let copy = PackageParameter::from_parameter(&original);
        assert_eq!(copy.label(), "plain");
        assert_eq!(copy, original);
    }

    #[test]
    fn test_definition_build_defaults() {
        let param = ParameterDefinition::new("name").build().unwrap();
        assert_eq!(param.parameter_type(), DEFAULT_PARAMETER_TYPE);
        assert_eq!(param.default_value(), None);
        assert!(!param.is_required());
        assert!(!param.has_value_options());
    }

    #[test]
    fn test_definition_build_treats_empty_strings_as_absent() {
        let def = ParameterDefinition {
            name: "port".into(),
            parameter_type: Some(String::new()),
            label: Some(String::new()),
            default: Some(String::new()),
            ..Default::default()
        };
        let param = def.build().unwrap();
        assert_eq!(param.parameter_type(), "text");
        assert_eq!(param.label(), "port");
        assert_eq!(param.default_value(), None);
    }
}
