//! Structural validation of ZPK deployment descriptors.
//!
//! Mirrors the deployment descriptor schema: the root element, the allowed
//! top-level children, mandatory elements and the enumerated attribute values
//! the parser relies on.

use roxmltree::{Document, Node};

use crate::error::{NexusError, Result};

/// Namespace of the deployment descriptor schema
pub const ZPK_XML_NAMESPACE: &str = "http://www.zend.com/server/deployment-descriptor/1.0";

const PACKAGE_TYPES: &[&str] = &["application", "library", "plugin"];

const PARAMETER_TYPES: &[&str] = &[
    "checkbox", "choice", "email", "hidden", "hostname", "number", "password", "string",
];

const BOOLEAN_VALUES: &[&str] = &["true", "false", "1", "0"];

/// Top-level elements that may appear at most once.
const SINGLE_ELEMENTS: &[&str] = &[
    "type",
    "name",
    "summary",
    "description",
    "version",
    "releasedate",
    "icon",
    "eula",
    "license",
    "appdir",
    "docroot",
    "scriptsdir",
    "dependencies",
    "parameters",
    "variables",
    "persistentresources",
    "healthcheck",
    "updateurl",
    "ignoreupdates",
];

/// Top-level elements that may repeat.
const REPEATED_ELEMENTS: &[&str] = &["deployaction", "tag"];

/// Validate a parsed descriptor document.
pub fn validate(document: &Document<'_>) -> Result<()> {
    let root = document.root_element();

    if root.tag_name().name() != "package" || root.tag_name().namespace() != Some(ZPK_XML_NAMESPACE)
    {
        return Err(invalid("root element must be <package> in the descriptor namespace"));
    }

    let mut seen: Vec<&str> = Vec::new();
    for child in elements(root) {
        let tag = child.tag_name().name();

        if child.tag_name().namespace() != Some(ZPK_XML_NAMESPACE) {
            return Err(invalid(format!("element <{}> is outside the descriptor namespace", tag)));
        }

        if SINGLE_ELEMENTS.contains(&tag) {
            if seen.contains(&tag) {
                return Err(invalid(format!("duplicate element <{}>", tag)));
            }
            seen.push(tag);
        } else if !REPEATED_ELEMENTS.contains(&tag) {
            return Err(invalid(format!("unexpected element <{}>", tag)));
        }
    }

    for required in ["name", "version", "appdir"] {
        if !seen.contains(&required) {
            return Err(invalid(format!("missing element <{}>", required)));
        }
    }

    if let Some(package_type) = child(root, "type") {
        let value = text(package_type);
        if !PACKAGE_TYPES.contains(&value.as_str()) {
            return Err(invalid(format!("unknown package type \"{}\"", value)));
        }
    }

    let release = child(root, "version").and_then(|v| child(v, "release"));
    if release.is_none_or(|r| text(r).is_empty()) {
        return Err(invalid("missing <version><release>"));
    }

    if let Some(parameters) = child(root, "parameters") {
        for parameter in elements(parameters) {
            validate_parameter(parameter)?;
        }
    }

    if let Some(variables) = child(root, "variables") {
        for variable in elements(variables) {
            if variable.tag_name().name() != "variable" {
                return Err(invalid("<variables> may only contain <variable>"));
            }
            if variable.attribute("name").is_none() || variable.attribute("value").is_none() {
                return Err(invalid("<variable> requires name and value attributes"));
            }
        }
    }

    Ok(())
}

fn validate_parameter(parameter: Node<'_, '_>) -> Result<()> {
    if parameter.tag_name().name() != "parameter" {
        return Err(invalid("<parameters> may only contain <parameter>"));
    }

    let id = parameter
        .attribute("id")
        .filter(|id| !id.is_empty())
        .ok_or_else(|| invalid("<parameter> requires an id"))?;

    match parameter.attribute("type") {
        Some(t) if PARAMETER_TYPES.contains(&t) => {}
        Some(t) => {
            return Err(invalid(format!("parameter \"{}\" has unknown type \"{}\"", id, t)));
        }
        None => return Err(invalid(format!("parameter \"{}\" has no type", id))),
    }

    for flag in ["required", "readonly"] {
        if let Some(value) = parameter.attribute(flag) {
            if !BOOLEAN_VALUES.contains(&value) {
                return Err(invalid(format!(
                    "parameter \"{}\" has a non-boolean {} attribute",
                    id, flag
                )));
            }
        }
    }

    Ok(())
}

fn invalid(detail: impl AsRef<str>) -> NexusError {
    NexusError::runtime(format!("Invalid deployment descriptor: {}", detail.as_ref()))
}

/// Element children of a node.
pub(crate) fn elements<'a, 'input>(
    node: Node<'a, 'input>,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(Node::is_element)
}

/// First element child with the given local name.
pub(crate) fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    elements(node).find(|n| n.tag_name().name() == name)
}

/// Trimmed text content of an element.
pub(crate) fn text(node: Node<'_, '_>) -> String {
    node.descendants()
        .filter(Node::is_text)
        .filter_map(|n| n.text())
        .collect::<String>()
        .trim()
        .to_string()
}
