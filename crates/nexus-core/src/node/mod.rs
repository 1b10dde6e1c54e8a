//! Deployment nodes
//!
//! A node is one host running application instances. The node entity keeps
//! the status last reported for it and forwards every environment affecting
//! operation to its [`NodeStrategy`].

pub mod strategy;

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info};
use url::Url;

use crate::error::{NexusError, Result};
use crate::ids::generate_id;
use crate::instance::{ApplicationInstance, ApplicationState};
use crate::target::DeployTarget;

pub use strategy::{NodeReport, NodeStrategy, NodeStrategyProvider, StrategyRegistry};

/// State of a node that has not reported anything yet.
pub const STATE_UNINITIALIZED: &str = "uninitialized";

#[derive(Debug)]
pub struct Node {
    id: String,
    name: Option<String>,
    node_type: String,
    deploy_target: Option<String>,
    url: Option<Url>,
    secret: Option<String>,
    state: String,
    application_states: BTreeMap<String, ApplicationState>,
    server_info: Map<String, Value>,
    flat_server_info: OnceLock<BTreeMap<String, Value>>,
    strategy_provider: Option<Arc<dyn NodeStrategyProvider>>,
    strategy: Option<Box<dyn NodeStrategy>>,
}

/// Exported node. The secret is never exported.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeExport {
    pub id: String,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub node_type: String,
    pub url: Option<String>,
    pub state: String,
    pub is_attached: bool,
    pub deploy_target: Option<String>,
    pub application_states: BTreeMap<String, ApplicationState>,
    pub server_info: Map<String, Value>,
}

impl Node {
    /// Create a node of the given type.
    pub fn new(node_type: impl Into<String>) -> Result<Self> {
        let node_type = node_type.into();
        if node_type.is_empty() {
            return Err(NexusError::logic("The node type must not be empty"));
        }

        Ok(Self {
            id: generate_id("NODE."),
            name: None,
            node_type,
            deploy_target: None,
            url: None,
            secret: None,
            state: STATE_UNINITIALIZED.to_string(),
            application_states: BTreeMap::new(),
            server_info: Map::new(),
            flat_server_info: OnceLock::new(),
            strategy_provider: None,
            strategy: None,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    /// The node type used to look up the strategy.
    pub fn node_type(&self) -> &str {
        &self.node_type
    }

    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    pub fn set_url(&mut self, url: &str) -> Result<()> {
        let parsed = Url::parse(url)
            .map_err(|e| NexusError::invalid_argument(format!("Invalid node url {}: {}", url, e)))?;
        self.url = Some(parsed);
        Ok(())
    }

    pub fn secret(&self) -> Option<&str> {
        self.secret.as_deref()
    }

    pub fn set_secret(&mut self, secret: impl Into<String>) {
        self.secret = Some(secret.into());
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    pub fn set_state(&mut self, state: impl Into<String>) {
        self.state = state.into();
    }

    /// Replace the node state and all application states at once.
    pub fn update_state(
        &mut self,
        state: impl Into<String>,
        application_states: BTreeMap<String, ApplicationState>,
    ) {
        self.state = state.into();
        self.set_application_states(application_states);
    }

    /// Merge application states into the known ones.
    pub fn update_application_states<I, K, S>(&mut self, states: I)
    where
        I: IntoIterator<Item = (K, S)>,
        K: Into<String>,
        S: Into<ApplicationState>,
    {
        for (instance_id, state) in states {
            self.application_states
                .insert(instance_id.into(), state.into());
        }
    }

    /// Replace all application states.
    pub fn set_application_states<I, K, S>(&mut self, states: I)
    where
        I: IntoIterator<Item = (K, S)>,
        K: Into<String>,
        S: Into<ApplicationState>,
    {
        self.application_states.clear();
        self.update_application_states(states);
    }

    pub fn application_states(&self) -> &BTreeMap<String, ApplicationState> {
        &self.application_states
    }

    /// State reported for an instance, `unknown` if the node never reported one.
    pub fn application_state(&self, instance_id: &str) -> ApplicationState {
        self.application_states
            .get(instance_id)
            .cloned()
            .unwrap_or(ApplicationState::Unknown)
    }

    pub fn server_info(&self) -> &Map<String, Value> {
        &self.server_info
    }

    pub fn set_server_info(&mut self, server_info: Map<String, Value>) {
        self.server_info = server_info;
        self.flat_server_info = OnceLock::new();
    }

    /// Look up a server info value by dot separated key (`php.version`).
    pub fn server_info_value(&self, key: &str) -> Option<&Value> {
        self.flat_server_info
            .get_or_init(|| flatten(&self.server_info))
            .get(key)
    }

    pub fn is_attached(&self) -> bool {
        self.deploy_target.is_some()
    }

    /// Id of the deploy target this node is attached to.
    pub fn deploy_target_id(&self) -> Option<&str> {
        self.deploy_target.as_deref()
    }

    pub fn set_strategy_provider(&mut self, provider: Arc<dyn NodeStrategyProvider>) {
        self.strategy_provider = Some(provider);
    }

    /// Bind a strategy explicitly.
    pub fn set_strategy(&mut self, mut strategy: Box<dyn NodeStrategy>) {
        strategy.set_entity(self);
        self.strategy = Some(strategy);
    }

    /// Resolve the strategy, asking the provider on first use.
    pub fn strategy(&mut self) -> Result<&mut (dyn NodeStrategy + 'static)> {
        if self.strategy.is_none() {
            let provider = self
                .strategy_provider
                .as_ref()
                .filter(|p| p.has(&self.node_type))
                .ok_or_else(|| NexusError::logic("Missing node strategy"))?;

            let strategy = provider.get(&self.node_type)?;
            debug!(node = %self.id, node_type = %self.node_type, "Resolved node strategy");
            self.set_strategy(strategy);
        }

        self.strategy
            .as_deref_mut()
            .ok_or_else(|| NexusError::logic("Missing node strategy"))
    }

    /// Type id reported by the strategy.
    pub fn type_id(&mut self) -> Result<String> {
        Ok(self.strategy()?.type_id().to_string())
    }

    /// Attach the node to a deploy target.
    pub fn attach(&mut self, target: &DeployTarget) -> Result<()> {
        if self.deploy_target.is_some() {
            return Err(NexusError::logic(
                "This node is already attached to a deploy target",
            ));
        }

        self.strategy()?.attach(target)?;
        self.deploy_target = Some(target.id().to_string());
        info!(node = %self.id, deploy_target = %target.id(), "Node attached");
        Ok(())
    }

    pub fn detach(&mut self) -> Result<()> {
        self.strategy()?.detach()?;
        if let Some(target) = self.deploy_target.take() {
            info!(node = %self.id, deploy_target = %target, "Node detached");
        }
        Ok(())
    }

    pub fn sync(&mut self) -> Result<()> {
        info!(node = %self.id, "Syncing node");
        self.strategy()?.sync()
    }

    /// Refresh the node status from its strategy.
    pub fn refresh(&mut self) -> Result<()> {
        if let Some(report) = self.strategy()?.refresh()? {
            debug!(node = %self.id, state = %report.state, "Node refreshed");
            self.update_state(report.state, report.application_states);
        }
        Ok(())
    }

    pub fn rebuild(&mut self, instance: Option<&ApplicationInstance>) -> Result<()> {
        self.strategy()?.rebuild(instance)
    }

    pub fn accepts_cluster_sibling(&mut self, node: &Node) -> Result<bool> {
        Ok(self.strategy()?.accepts_cluster_sibling(node))
    }

    pub fn can_sync(&mut self) -> Result<bool> {
        Ok(self.strategy()?.can_sync())
    }

    pub fn export(&self) -> NodeExport {
        NodeExport {
            id: self.id.clone(),
            name: self.name.clone(),
            node_type: self.node_type.clone(),
            url: self.url.as_ref().map(Url::to_string),
            state: self.state.clone(),
            is_attached: self.is_attached(),
            deploy_target: self.deploy_target.clone(),
            application_states: self.application_states.clone(),
            server_info: self.server_info.clone(),
        }
    }
}

/// Flatten nested objects and arrays into dot separated keys.
///
/// Every level is kept: `{"php": {"version": "8.2"}}` yields both `php` and
/// `php.version`.
fn flatten(info: &Map<String, Value>) -> BTreeMap<String, Value> {
    let mut flat = BTreeMap::new();
    for (key, value) in info {
        flatten_into(&mut flat, key.clone(), value);
    }
    flat
}

fn flatten_into(flat: &mut BTreeMap<String, Value>, key: String, value: &Value) {
    match value {
        Value::Object(map) => {
            for (child, v) in map {
                flatten_into(flat, format!("{}.{}", key, child), v);
            }
        }
        Value::Array(items) => {
            for (index, v) in items.iter().enumerate() {
                flatten_into(flat, format!("{}.{}", key, index), v);
            }
        }
        _ => {}
    }
    flat.insert(key, value.clone());
}
