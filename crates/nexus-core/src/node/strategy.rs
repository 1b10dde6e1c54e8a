//! Node strategies
//!
//! A strategy implements the deployment technology behind a node (an agent
//! speaking some protocol, a local webserver, ...). Nodes only carry the type
//! id; the strategy is resolved through a [`NodeStrategyProvider`].

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{NexusError, Result};
use crate::instance::{ApplicationInstance, ApplicationState};
use crate::target::DeployTarget;

use super::Node;

/// Fresh status reported by a strategy refresh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeReport {
    /// General node state.
    pub state: String,
    /// Per application instance state, keyed by instance id.
    pub application_states: BTreeMap<String, ApplicationState>,
}

impl NodeReport {
    pub fn new(state: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            application_states: BTreeMap::new(),
        }
    }

    pub fn with_application_state(
        mut self,
        instance_id: impl Into<String>,
        state: impl Into<ApplicationState>,
    ) -> Self {
        self.application_states
            .insert(instance_id.into(), state.into());
        self
    }
}

/// Deployment technology behind a node.
pub trait NodeStrategy: fmt::Debug + Send + Sync {
    /// Type id this strategy implements.
    fn type_id(&self) -> &str;

    /// Called once the strategy is bound to its node.
    fn set_entity(&mut self, _node: &Node) {}

    /// The node was attached to a deploy target.
    fn attach(&mut self, target: &DeployTarget) -> Result<()>;

    /// The node is being detached from its deploy target.
    fn detach(&mut self) -> Result<()>;

    /// Push the deploy target configuration to the node.
    fn sync(&mut self) -> Result<()>;

    /// Query the backing node. `None` keeps the node's current status.
    fn refresh(&mut self) -> Result<Option<NodeReport>>;

    /// Rebuild one application instance, or everything when `None`.
    fn rebuild(&mut self, instance: Option<&ApplicationInstance>) -> Result<()>;

    /// Whether `node` may join this node in a cluster.
    fn accepts_cluster_sibling(&self, node: &Node) -> bool;

    fn can_sync(&self) -> bool;
}

/// Source of strategies for node types.
pub trait NodeStrategyProvider: fmt::Debug + Send + Sync {
    fn has(&self, type_id: &str) -> bool;

    /// Create a strategy for the node type.
    fn get(&self, type_id: &str) -> Result<Box<dyn NodeStrategy>>;
}

type StrategyFactory = Box<dyn Fn() -> Box<dyn NodeStrategy> + Send + Sync>;

/// Provider backed by registered factories, one per node type.
#[derive(Default)]
pub struct StrategyRegistry {
    factories: BTreeMap<String, StrategyFactory>,
}

impl StrategyRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory for a node type. Replaces an existing registration.
    pub fn register<F>(&mut self, type_id: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn NodeStrategy> + Send + Sync + 'static,
    {
        self.factories.insert(type_id.into(), Box::new(factory));
    }

    /// Registered node types.
    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

impl fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("types", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl NodeStrategyProvider for StrategyRegistry {
    fn has(&self, type_id: &str) -> bool {
        self.factories.contains_key(type_id)
    }

    fn get(&self, type_id: &str) -> Result<Box<dyn NodeStrategy>> {
        let factory = self.factories.get(type_id).ok_or_else(|| {
            NexusError::logic(format!("No strategy registered for node type {}", type_id))
        })?;
        Ok(factory())
    }
}
