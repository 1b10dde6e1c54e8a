//! Structural export of packages for the API layer.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

use super::{Package, Parameter};

/// Exported package, serialized with camelCase keys.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageExport {
    pub id: String,
    pub document_root: String,
    pub extra: Map<String, Value>,
    pub name: String,
    #[serde(rename = "type")]
    pub package_type: String,
    pub version: String,
    pub variables: BTreeMap<String, String>,
    pub parameters: BTreeMap<String, ParameterExport>,
}

/// Exported parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterExport {
    pub name: String,
    pub label: String,
    pub default: Option<String>,
    #[serde(rename = "type")]
    pub parameter_type: String,
    pub required: bool,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_options: Option<BTreeMap<String, String>>,
}

impl ParameterExport {
    /// Export a parameter. Non-scalar options are skipped.
    pub fn from_parameter(parameter: &dyn Parameter) -> Self {
        let options = parameter
            .options()
            .iter()
            .filter(|(_, value)| is_scalar(value))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Self {
            name: parameter.name().to_string(),
            label: parameter.label().to_string(),
            default: parameter.default_value().map(str::to_string),
            parameter_type: parameter.parameter_type().to_string(),
            required: parameter.is_required(),
            options,
            value_options: parameter.value_options().cloned(),
        }
    }
}

fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::Bool(_) | Value::Number(_) | Value::String(_))
}

/// Export any package implementation.
pub fn export_package<P: Package + ?Sized>(package: &P) -> PackageExport {
    let parameters = package
        .parameters()
        .iter()
        .map(|p| (p.name().to_string(), ParameterExport::from_parameter(p)))
        .collect();

    PackageExport {
        id: package.id(),
        document_root: package.document_root().to_string(),
        extra: package.extra().clone(),
        name: package.name().to_string(),
        package_type: package.package_type().to_string(),
        version: package.version(),
        variables: package.variables().clone(),
        parameters,
    }
}

impl PackageExport {
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
