//! Composer packages
//!
//! A composer package is described by its `composer.json`. Deployment specific
//! metadata lives in the `extra.deployment` section:
//!
//! ```json
//! {
//!     "name": "acme/shop",
//!     "version": "1.2.0",
//!     "extra": {
//!         "deployment": {
//!             "docroot": "public",
//!             "variables": { "APP_ENV": "prod" },
//!             "parameters": {
//!                 "db_password": "password",
//!                 "mode": { "type": "select", "valueOptions": ["fast", "safe"] }
//!             }
//!         }
//!     }
//! }
//! ```

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::warn;

use super::dependency::PlatformDependency;
use super::parameter::{PackageParameter, ParameterDefinition};
use super::version::{BuildId, is_stable_version, normalize_package_name};
use super::{BuildIdAware, Package};
use crate::error::{NexusError, Result};

/// Composer package type constant
pub const TYPE_COMPOSER: &str = "composer";

const DEPLOYMENT_SECTION: &str = "deployment";

/// Package parsed from a `composer.json` document.
#[derive(Debug, Clone)]
pub struct ComposerPackage {
    name: String,
    version: String,
    build_id: BuildId,
    document_root: String,
    parameters: Vec<PackageParameter>,
    variables: BTreeMap<String, String>,
    extra: Map<String, Value>,
    dependencies: Vec<PlatformDependency>,
}

impl ComposerPackage {
    /// Parse a `composer.json` document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(&value)
    }

    /// Build the package from an already decoded document.
    pub fn from_value(composer: &Value) -> Result<Self> {
        let composer = composer
            .as_object()
            .ok_or_else(|| NexusError::unexpected_value("composer.json must be an object"))?;

        let name = required_field(composer, "name")?;
        let version = required_field(composer, "version")?;

        let mut extra = composer
            .get("extra")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        let deployment = match extra.remove(DEPLOYMENT_SECTION) {
            Some(Value::Object(section)) => section,
            // An empty section may be encoded as `[]`
            Some(Value::Array(items)) if items.is_empty() => Map::new(),
            _ => {
                return Err(NexusError::unexpected_value(
                    "Missing deployment section in composer.json",
                ));
            }
        };

        let document_root = deployment
            .get("docroot")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        Ok(Self {
            name: normalize_package_name(name),
            version: version.to_string(),
            build_id: BuildId::default(),
            document_root,
            parameters: parse_parameters(deployment.get("parameters"))?,
            variables: parse_variables(deployment.get("variables")),
            extra,
            dependencies: parse_requirements(composer.get("require")),
        })
    }
}

fn required_field<'a>(composer: &'a Map<String, Value>, field: &str) -> Result<&'a str> {
    match composer.get(field).and_then(Value::as_str) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(NexusError::unexpected_value(format!(
            "Missing field in composer.json: {}",
            field
        ))),
    }
}

/// Render a scalar JSON value the way it would appear in a config file.
fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn parse_variables(section: Option<&Value>) -> BTreeMap<String, String> {
    let Some(Value::Object(variables)) = section else {
        return BTreeMap::new();
    };

    let mut result = BTreeMap::new();
    for (key, value) in variables {
        match scalar_to_string(value) {
            Some(value) if !key.is_empty() => {
                result.insert(key.clone(), value);
            }
            _ => warn!(variable = %key, "Skipping non-scalar deployment variable"),
        }
    }

    result
}

fn parse_parameters(section: Option<&Value>) -> Result<Vec<PackageParameter>> {
    let Some(Value::Object(parameters)) = section else {
        return Ok(Vec::new());
    };

    let mut result: Vec<PackageParameter> = Vec::new();

    for (name, declaration) in parameters {
        if name.is_empty() {
            continue;
        }

        let mut definition = ParameterDefinition::new(name.as_str());

        match declaration {
            Value::String(parameter_type) => {
                definition.parameter_type = Some(parameter_type.clone());
            }
            Value::Object(fields) => exchange_definition(&mut definition, fields),
            _ => {
                warn!(parameter = %name, "Skipping malformed parameter declaration");
                continue;
            }
        }

        result.push(definition.build()?);
    }

    Ok(result)
}

/// Apply the object form of a parameter declaration.
fn exchange_definition(definition: &mut ParameterDefinition, fields: &Map<String, Value>) {
    definition.parameter_type = fields.get("type").and_then(scalar_to_string);
    definition.label = fields.get("label").and_then(scalar_to_string);
    definition.default = fields.get("default").and_then(scalar_to_string);
    definition.required = fields.get("required").is_some_and(is_truthy);

    if let Some(Value::Object(options)) = fields.get("options") {
        definition.options = options
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
    }

    definition.value_options = match fields.get("valueOptions") {
        Some(Value::Object(options)) => Some(
            options
                .iter()
                .filter_map(|(key, label)| scalar_to_string(label).map(|l| (key.clone(), l)))
                .collect(),
        ),
        Some(Value::Array(values)) => Some(
            values
                .iter()
                .filter_map(scalar_to_string)
                .map(|v| (v.clone(), v))
                .collect(),
        ),
        _ => None,
    };
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !matches!(s.to_ascii_lowercase().as_str(), "" | "0" | "false" | "no" | "off"),
        _ => false,
    }
}

/// Platform requirements: `php` and `ext-*` entries of the `require` section.
fn parse_requirements(section: Option<&Value>) -> Vec<PlatformDependency> {
    let Some(Value::Object(require)) = section else {
        return Vec::new();
    };

    require
        .iter()
        .filter(|(name, _)| name.as_str() == "php" || name.starts_with("ext-"))
        .map(|(name, constraint)| match constraint.as_str() {
            Some(c) => PlatformDependency::new(name.as_str(), c),
            None => PlatformDependency::any(name.as_str()),
        })
        .collect()
}

impl Package for ComposerPackage {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> String {
        self.build_id.apply(&self.version)
    }

    /// Stability of the release itself; build id tokens do not count.
    fn is_stable(&self) -> bool {
        is_stable_version(&self.version)
    }

    fn package_type(&self) -> &str {
        TYPE_COMPOSER
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

    fn dependencies(&self) -> &[PlatformDependency] {
        &self.dependencies
    }
}

impl BuildIdAware for ComposerPackage {
    fn set_build_id(&mut self, build_id: &str) -> Result<()> {
        self.build_id = BuildId::parse(build_id)?;
        Ok(())
    }

    fn build_id(&self) -> Option<&str> {
        self.build_id.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::Parameter;
    use serde_json::json;

    fn minimal() -> Value {
        json!({
            "name": "Acme/Shop",
            "version": "1.0.0",
            "extra": { "deployment": {} }
        })
    }

    #[test]
    fn test_missing_required_fields() {
        for field in ["name", "version"] {
            let mut doc = minimal();
            doc.as_object_mut().unwrap().remove(field);
            let err = ComposerPackage::from_value(&doc).unwrap_err();
            assert!(err.is_unexpected_value());
            assert!(err.to_string().contains(field));
        }

        let mut doc = minimal();
        doc["version"] = json!("");
        assert!(ComposerPackage::from_value(&doc).unwrap_err().is_unexpected_value());
    }

    #[test]
    fn test_deployment_section_must_be_object() {
        let mut doc = minimal();
        doc["extra"]["deployment"] = json!("nope");
        assert!(ComposerPackage::from_value(&doc).unwrap_err().is_unexpected_value());

        doc["extra"] = json!({});
        assert!(ComposerPackage::from_value(&doc).unwrap_err().is_unexpected_value());
    }

    #[test]
    fn test_extra_excludes_deployment() {
        let mut doc = minimal();
        doc["extra"]["branch-alias"] = json!({"dev-master": "1.0.x-dev"});
        let package = ComposerPackage::from_value(&doc).unwrap();
        assert!(package.extra_value("deployment").is_none());
        assert!(package.extra_value("branch-alias").is_some());
    }

    #[test]
    fn test_variables_stringified() {
        let mut doc = minimal();
        doc["extra"]["deployment"]["variables"] = json!({
            "A": "x",
            "B": 3,
            "C": true,
            "D": {"nested": 1}
        });
        let package = ComposerPackage::from_value(&doc).unwrap();
        let vars = package.variables();
        assert_eq!(vars.len(), 3);
        assert_eq!(vars["B"], "3");
        assert_eq!(vars["C"], "true");
    }

    #[test]
    fn test_required_flag_truthiness() {
        let mut doc = minimal();
        doc["extra"]["deployment"]["parameters"] = json!({
            "a": {"required": "yes"},
            "b": {"required": 0},
            "c": {"required": true}
        });
        let package = ComposerPackage::from_value(&doc).unwrap();
        assert!(package.parameter("a").unwrap().is_required());
        assert!(!package.parameter("b").unwrap().is_required());
        assert!(package.parameter("c").unwrap().is_required());
    }

    #[test]
    fn test_require_section_dependencies() {
        let mut doc = minimal();
        doc["require"] = json!({
            "php": ">=7.1",
            "ext-pdo": "*",
            "monolog/monolog": "^2.0"
        });
        let package = ComposerPackage::from_value(&doc).unwrap();
        let names: Vec<_> = package.dependencies().iter().map(|d| d.name()).collect();
        assert_eq!(names, vec!["ext-pdo", "php"]);
    }
}
