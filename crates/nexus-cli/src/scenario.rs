//! Deploy target simulation from a TOML scenario.
//!
//! ```toml
//! name = "production"
//!
//! [[vhosts]]
//! name = "shop.example.com"
//! aliases = ["www.shop.example.com"]
//! ssl = true
//!
//! [[applications]]
//! id = "acme/shop"
//! versions = ["1.0.0", "1.1.0"]
//! archives = ["archives/shop-1.2.0.zip"]
//!
//! [[instances]]
//! id = "shop"
//! application = "acme/shop"
//! package = "acme/shop@1.1.0"
//! vhost = "shop.example.com"
//!
//! [[nodes]]
//! name = "web-1"
//! states = { shop = ["staging", "activating", "deployed"] }
//! ```
//!
//! Every node is of type `static`: its strategy replays the scripted states,
//! one entry per refresh round, repeating the last entry once exhausted.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{debug, info};

use nexus_core::application::Application;
use nexus_core::archive::{ArchiveLoader, ZipArchiveHandle};
use nexus_core::config::NexusConfig;
use nexus_core::instance::{ApplicationInstance, UserParameters};
use nexus_core::node::{Node, NodeReport, NodeStrategy, StrategyRegistry};
use nexus_core::package::{ArchivePackage, ComposerPackage, Package};
use nexus_core::target::DeployTarget;
use nexus_core::vhost::VHost;

/// Node type served by [`StaticStrategy`].
pub const STATIC_NODE_TYPE: &str = "static";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub vhosts: Vec<VHostSpec>,
    #[serde(default)]
    pub applications: Vec<ApplicationSpec>,
    #[serde(default)]
    pub instances: Vec<InstanceSpec>,
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VHostSpec {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub ssl: bool,
    pub flavor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApplicationSpec {
    pub id: String,
    pub label: Option<String>,
    /// Versions of synthetic composer packages.
    #[serde(default)]
    pub versions: Vec<String>,
    /// Package archives, relative to the scenario file or the download directory.
    #[serde(default)]
    pub archives: Vec<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstanceSpec {
    pub id: String,
    pub application: String,
    pub package: Option<String>,
    pub label: Option<String>,
    pub vhost: Option<String>,
    pub path: Option<String>,
    pub flavor: Option<String>,
    #[serde(default)]
    pub parameters: UserParameters,
    /// Mark the instance for removal before the first round.
    #[serde(default)]
    pub remove: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeSpec {
    pub name: String,
    pub url: Option<String>,
    pub secret: Option<String>,
    #[serde(default)]
    pub syncable: bool,
    #[serde(default)]
    pub server_info: Map<String, Value>,
    /// Scripted states per instance id.
    #[serde(default)]
    pub states: BTreeMap<String, Vec<String>>,
}

impl Scenario {
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse scenario {}", path.display()))
    }

    /// Build the deploy target described by this scenario.
    pub fn build(&self, base_dir: &Path, config: &NexusConfig) -> Result<DeployTarget> {
        let mut target = DeployTarget::new(&self.name);

        for spec in &self.vhosts {
            let mut vhost = VHost::new(&spec.name)?;
            vhost.set_aliases(spec.aliases.iter().map(String::as_str));
            vhost.set_enable_ssl(spec.ssl);
            vhost.set_flavor(spec.flavor.clone());
            target.add_vhost(vhost)?;
        }

        let loader = ArchiveLoader::with_default_loaders(config.download_dir());
        let mut applications = BTreeMap::new();
        for spec in &self.applications {
            let application = build_application(spec, base_dir, &loader)?;
            applications.insert(spec.id.clone(), application.into_shared());
        }

        for spec in &self.instances {
            let application = applications
                .get(&spec.application)
                .ok_or_else(|| anyhow!("Instance {} uses unknown application {}", spec.id, spec.application))?;

            let vhost = match &spec.vhost {
                Some(name) => Some(
                    target
                        .vhosts()
                        .iter()
                        .find(|v| v.name() == name.as_str())
                        .ok_or_else(|| anyhow!("Instance {} uses unknown vhost {}", spec.id, name))?,
                ),
                None => None,
            };

            let mut instance =
                ApplicationInstance::new(application.clone(), &spec.id, vhost, spec.path.as_deref())?;

            if let Some(label) = &spec.label {
                instance.set_label(label);
            }
            instance.set_flavor(
                spec.flavor
                    .clone()
                    .or_else(|| config.deployment.default_flavor.clone()),
            );

            if let Some(package_id) = &spec.package {
                let package = application
                    .read()
                    .map_err(|_| anyhow!("Application lock poisoned"))?
                    .find_package(package_id)
                    .cloned()
                    .ok_or_else(|| anyhow!("Unknown package {} for instance {}", package_id, spec.id))?;
                instance.set_package(&package)?;
            }
            instance.set_user_parameters(spec.parameters.clone());

            target.add_application(instance);
            if spec.remove {
                target.remove_application(&spec.id)?;
            }
        }

        let provider = Arc::new(strategy_registry(&self.nodes));
        for spec in &self.nodes {
            let mut node = Node::new(STATIC_NODE_TYPE)?;
            node.set_name(&spec.name);
            if let Some(url) = &spec.url {
                node.set_url(url)?;
            }
            if let Some(secret) = &spec.secret {
                node.set_secret(secret);
            }
            node.set_server_info(spec.server_info.clone());
            node.set_strategy_provider(provider.clone());

            target.attach_node(node)?;
        }

        info!(
            target_name = %self.name,
            vhosts = target.vhosts().len(),
            nodes = target.nodes().len(),
            instances = target.applications().len(),
            "Scenario loaded"
        );
        Ok(target)
    }
}

fn build_application(
    spec: &ApplicationSpec,
    base_dir: &Path,
    loader: &ArchiveLoader,
) -> Result<Application> {
    let mut application = Application::new(&spec.id);
    if let Some(label) = &spec.label {
        application.set_label(label);
    }

    for version in &spec.versions {
        let package = ComposerPackage::from_value(&json!({
            "name": spec.id,
            "version": version,
            "extra": { "deployment": { "docroot": "public" } },
        }))?;
        application.add_package(&package)?;
    }

    for archive in &spec.archives {
        let local = base_dir.join(archive);
        let path = loader
            .ensure_local_archive_file(if local.is_file() { &local } else { archive })
            .with_context(|| format!("Archive {} not found", archive.display()))?;

        let mut handle = ZipArchiveHandle::open(&path)?;
        let package = loader.get_package(&mut handle)?;
        if package.name() != spec.id {
            bail!(
                "Archive {} provides {}, not {}",
                path.display(),
                package.name(),
                spec.id
            );
        }

        let stored = application.add_package(package.as_package())?;
        debug!(application = %spec.id, package = %stored.id(), "Package added from archive");
    }

    Ok(application)
}

/// Registry serving [`StaticStrategy`] for every scripted node.
fn strategy_registry(nodes: &[NodeSpec]) -> StrategyRegistry {
    let scripts: Arc<BTreeMap<String, NodeScript>> = Arc::new(
        nodes
            .iter()
            .map(|spec| {
                let script = NodeScript {
                    syncable: spec.syncable,
                    states: spec.states.clone(),
                };
                (spec.name.clone(), script)
            })
            .collect(),
    );

    let mut registry = StrategyRegistry::new();
    registry.register(STATIC_NODE_TYPE, move || {
        Box::new(StaticStrategy::new(Arc::clone(&scripts))) as Box<dyn NodeStrategy>
    });
    registry
}

#[derive(Debug, Clone, Default)]
struct NodeScript {
    syncable: bool,
    states: BTreeMap<String, Vec<String>>,
}

/// Strategy replaying scripted per-instance states.
///
/// The script is picked by node name when the strategy is bound to its node.
#[derive(Debug)]
pub struct StaticStrategy {
    scripts: Arc<BTreeMap<String, NodeScript>>,
    script: NodeScript,
    node: String,
    round: usize,
}

impl StaticStrategy {
    fn new(scripts: Arc<BTreeMap<String, NodeScript>>) -> Self {
        Self {
            scripts,
            script: NodeScript::default(),
            node: String::new(),
            round: 0,
        }
    }
}

impl NodeStrategy for StaticStrategy {
    fn type_id(&self) -> &str {
        STATIC_NODE_TYPE
    }

    fn set_entity(&mut self, node: &Node) {
        self.node = node.name().unwrap_or(node.id()).to_string();
        self.script = self.scripts.get(&self.node).cloned().unwrap_or_default();
    }

    fn attach(&mut self, target: &DeployTarget) -> nexus_core::Result<()> {
        debug!(node = %self.node, deploy_target = %target.name(), "Static node attached");
        Ok(())
    }

    fn detach(&mut self) -> nexus_core::Result<()> {
        Ok(())
    }

    fn sync(&mut self) -> nexus_core::Result<()> {
        info!(node = %self.node, "Static node synced");
        Ok(())
    }

    fn refresh(&mut self) -> nexus_core::Result<Option<NodeReport>> {
        let mut report = NodeReport::new("online");
        for (instance, states) in &self.script.states {
            if let Some(state) = states.get(self.round).or_else(|| states.last()) {
                report = report.with_application_state(instance, state.as_str());
            }
        }

        self.round += 1;
        Ok(Some(report))
    }

    fn rebuild(&mut self, _instance: Option<&ApplicationInstance>) -> nexus_core::Result<()> {
        Ok(())
    }

    fn accepts_cluster_sibling(&self, node: &Node) -> bool {
        node.node_type() == STATIC_NODE_TYPE
    }

    fn can_sync(&self) -> bool {
        self.script.syncable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexus_core::target::TargetState;

    const SCENARIO: &str = r#"
name = "production"

[[vhosts]]
name = "shop.example.com"
ssl = true

[[applications]]
id = "acme/shop"
versions = ["1.0.0", "1.1.0"]

[[instances]]
id = "shop"
application = "acme/shop"
package = "acme/shop@1.1.0"
vhost = "shop.example.com"
path = "store"

[[instances]]
id = "legacy"
application = "acme/shop"
package = "acme/shop@1.0.0"
remove = true

[[nodes]]
name = "web-1"
syncable = true
states = { shop = ["staging", "deployed"], legacy = ["removing", "removed"] }

[[nodes]]
name = "web-2"
states = { shop = ["deployed"], legacy = ["removed"] }
"#;

    fn build() -> DeployTarget {
        let scenario: Scenario = toml::from_str(SCENARIO).unwrap();
        scenario.build(Path::new("."), &NexusConfig::new()).unwrap()
    }

    #[test]
    fn test_scenario_builds_target() {
        let target = build();

        assert_eq!(target.name(), "production");
        assert_eq!(target.vhosts().len(), 1);
        assert_eq!(target.nodes().len(), 2);
        assert!(target.nodes().iter().all(|n| n.is_attached()));

        let shop = target.find_application_instance("shop").unwrap();
        assert_eq!(shop.path(), "/store/");
        assert_eq!(shop.package().map(|p| p.id()), Some("acme/shop@1.1.0".to_string()));
        assert!(target.find_application_instance("legacy").unwrap().is_removed());
    }

    #[test]
    fn test_rounds_replay_scripted_states() {
        let mut target = build();

        assert_eq!(target.refresh_status().unwrap(), TargetState::Pending);
        assert_eq!(
            target.find_application_instance("shop").unwrap().state().as_str(),
            "staging"
        );
        assert!(target.find_application_instance("legacy").is_some());

        target.refresh_status().unwrap();
        assert_eq!(
            target.find_application_instance("shop").unwrap().state().as_str(),
            "deployed"
        );
        assert!(target.find_application_instance("legacy").is_none());
        assert!(target.can_sync().unwrap());
    }

    #[test]
    fn test_unknown_application_is_reported() {
        let scenario: Scenario = toml::from_str(
            r#"
name = "broken"

[[instances]]
id = "shop"
application = "acme/missing"
"#,
        )
        .unwrap();

        let err = scenario.build(Path::new("."), &NexusConfig::new()).unwrap_err();
        assert!(err.to_string().contains("unknown application"));
    }
}
