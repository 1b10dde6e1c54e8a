//! ZPK packages
//!
//! ZPK archives carry a `deployment.xml` deployment descriptor. The descriptor
//! is validated against the fixed schema in [`schema`] before any field is read,
//! then parsed eagerly into owned data.

pub mod schema;

use std::collections::BTreeMap;

use roxmltree::{Document, Node};
use serde_json::{Map, Value};

use super::dependency::PlatformDependency;
use super::parameter::{PackageParameter, ParameterDefinition};
use super::version::{BuildId, is_stable_version, normalize_package_name};
use super::{BuildIdAware, Package};
use crate::error::{NexusError, Result};
use schema::{child, elements, text};

pub use schema::ZPK_XML_NAMESPACE;

/// ZPK package type constant
pub const TYPE_ZPK: &str = "zpk";

pub const EXTRA_APP_DIR: &str = "app-dir";
pub const EXTRA_SCRIPTS_DIR: &str = "scripts-dir";

const TRUTHY: &[&str] = &["true", "1", "yes", "on", "y"];

/// Package parsed from a ZPK deployment descriptor.
#[derive(Debug, Clone)]
pub struct ZpkPackage {
    name: String,
    version: String,
    build_id: BuildId,
    document_root: String,
    app_dir: String,
    scripts_dir: String,
    parameters: Vec<PackageParameter>,
    variables: BTreeMap<String, String>,
    extra: Map<String, Value>,
    dependencies: Vec<PlatformDependency>,
}

impl ZpkPackage {
    /// Parse and validate a deployment descriptor.
    pub fn from_xml(xml: &str) -> Result<Self> {
        let document = Document::parse(xml)
            .map_err(|e| NexusError::runtime(format!("Invalid deployment descriptor: {}", e)))?;

        schema::validate(&document)?;

        let root = document.root_element();
        let field = |name: &str| child(root, name).map(text).unwrap_or_default();

        let app_dir = field("appdir");
        let scripts_dir = field("scriptsdir");

        let mut extra = Map::new();
        extra.insert(EXTRA_APP_DIR.to_string(), Value::String(app_dir.clone()));
        extra.insert(EXTRA_SCRIPTS_DIR.to_string(), Value::String(scripts_dir.clone()));

        let version = child(root, "version")
            .and_then(|v| child(v, "release"))
            .map(text)
            .unwrap_or_default();

        Ok(Self {
            name: normalize_package_name(&field("name")),
            version,
            build_id: BuildId::default(),
            document_root: field("docroot"),
            app_dir,
            scripts_dir,
            parameters: parse_parameters(root)?,
            variables: parse_variables(root),
            extra,
            dependencies: parse_dependencies(root),
        })
    }

    pub fn app_dir(&self) -> &str {
        &self.app_dir
    }

    pub fn scripts_dir(&self) -> &str {
        &self.scripts_dir
    }
}

fn is_truthy(value: Option<&str>) -> bool {
    value.is_some_and(|v| TRUTHY.contains(&v.trim().to_ascii_lowercase().as_str()))
}

fn parse_parameters(root: Node<'_, '_>) -> Result<Vec<PackageParameter>> {
    let Some(parameters) = child(root, "parameters") else {
        return Ok(Vec::new());
    };

    let mut result = Vec::new();

    for node in elements(parameters).filter(|n| n.tag_name().name() == "parameter") {
        let name = node.attribute("id").unwrap_or_default();
        let parameter_type = node.attribute("type").unwrap_or_default();

        if name.is_empty() || parameter_type.is_empty() {
            continue;
        }

        let mut definition = ParameterDefinition::new(name);
        definition.parameter_type = Some(parameter_type.to_string());
        definition.label = node.attribute("display").map(str::to_string);
        definition.default = child(node, "defaultvalue").map(text);
        definition.required = is_truthy(node.attribute("required"));
        definition
            .options
            .insert("readonly".to_string(), Value::Bool(is_truthy(node.attribute("readonly"))));

        if parameter_type == "choice" {
            let enums = child(node, "validation").and_then(|v| child(v, "enums"));
            let options = enums
                .into_iter()
                .flat_map(elements)
                .filter(|n| n.tag_name().name() == "enum")
                .map(|n| {
                    let value = text(n);
                    (value.clone(), value)
                })
                .collect();

            definition.parameter_type = Some("select".to_string());
            definition.value_options = Some(options);
        }

        result.push(definition.build()?);
    }

    Ok(result)
}

fn parse_variables(root: Node<'_, '_>) -> BTreeMap<String, String> {
    let Some(variables) = child(root, "variables") else {
        return BTreeMap::new();
    };

    elements(variables)
        .filter(|n| n.tag_name().name() == "variable")
        .filter_map(|n| {
            let key = n.attribute("name").filter(|k| !k.is_empty())?;
            Some((key.to_string(), n.attribute("value").unwrap_or_default().to_string()))
        })
        .collect()
}

/// Build a constraint string from `<min>`, `<max>`, `<equals>` and `<exclude>` children.
fn version_constraint(node: Node<'_, '_>) -> String {
    let terms: Vec<String> = elements(node)
        .filter_map(|n| {
            let operator = match n.tag_name().name() {
                "min" => ">=",
                "max" => "<=",
                "equals" => "=",
                "exclude" => "!=",
                _ => return None,
            };
            let version = text(n);
            (!version.is_empty()).then(|| format!("{}{}", operator, version))
        })
        .collect();

    if terms.is_empty() {
        "*".to_string()
    } else {
        terms.join(" ")
    }
}

fn parse_dependencies(root: Node<'_, '_>) -> Vec<PlatformDependency> {
    let Some(required) = child(root, "dependencies").and_then(|d| child(d, "required")) else {
        return Vec::new();
    };

    let mut result = Vec::new();

    for node in elements(required) {
        match node.tag_name().name() {
            "php" => result.push(PlatformDependency::new("php", version_constraint(node))),
            "extension" => {
                let Some(name) = child(node, "name").map(text).filter(|n| !n.is_empty()) else {
                    continue;
                };
                result.push(PlatformDependency::new(
                    format!("ext-{}", name.to_ascii_lowercase()),
                    version_constraint(node),
                ));
            }
            _ => {}
        }
    }

    result
}

impl Package for ZpkPackage {
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
        TYPE_ZPK
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

impl BuildIdAware for ZpkPackage {
    fn set_build_id(&mut self, build_id: &str) -> Result<()> {
        self.build_id = BuildId::parse(build_id)?;
        Ok(())
    }

    fn build_id(&self) -> Option<&str> {
        self.build_id.as_deref()
    }
}
