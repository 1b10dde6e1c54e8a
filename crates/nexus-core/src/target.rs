//! Deploy targets
//!
//! A deploy target groups nodes, vhosts and the application instances that
//! should run on every node of the target. Nodes report per instance states;
//! the target rolls them up into one state per instance and one overall state:
//!
//! 1. Each node state is mapped to an aggregation class. Transitional states
//!    (`staging`, `activating`, `deactivating`, `removing`) become `working`.
//! 2. Classes are ranked `pending < removed < inactive < deployed < error < working`,
//!    anything else ranks lowest.
//! 3. The instance takes the raw state of the first node with the highest rank.
//! 4. Removed instances are dropped once they resolve to `removed`.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{NexusError, Result};
use crate::ids::generate_id;
use crate::instance::{ApplicationInstance, ApplicationInstanceExport, ApplicationState};
use crate::node::{Node, NodeExport};
use crate::vhost::{VHost, VHostExport};

/// Aggregated state of a deploy target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetState {
    #[default]
    Pending,
    Working,
    Error,
}

impl TargetState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Working => "working",
            Self::Error => "error",
        }
    }

    pub fn parse(state: &str) -> Result<Self> {
        match state {
            "pending" => Ok(Self::Pending),
            "working" => Ok(Self::Working),
            "error" => Ok(Self::Error),
            other => Err(NexusError::invalid_argument(format!(
                "Invalid deploy target state: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for TargetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rank of an aggregation class. Unranked states score 0.
pub fn aggregation_level(state: &ApplicationState) -> u32 {
    match state {
        ApplicationState::Pending => 1,
        ApplicationState::Removed => 2,
        ApplicationState::Inactive => 4,
        ApplicationState::Deployed => 8,
        ApplicationState::Error => 16,
        ApplicationState::Working => 32,
        _ => 0,
    }
}

/// Map a node reported state to its aggregation class.
pub fn aggregation_class(state: &ApplicationState) -> ApplicationState {
    if state.is_working() {
        ApplicationState::Working
    } else {
        state.clone()
    }
}

/// Resolve the instance state from the states reported by each node.
///
/// Returns the raw state of the first node with the highest ranked class, or
/// `unknown` if no node reported a ranked state.
pub fn resolve_application_state<I>(node_states: I) -> ApplicationState
where
    I: IntoIterator<Item = ApplicationState>,
{
    let mut resolved = ApplicationState::Unknown;
    let mut level = 0;

    for state in node_states {
        let node_level = aggregation_level(&aggregation_class(&state));
        if node_level > level {
            level = node_level;
            resolved = state;
        }
    }

    resolved
}

/// Roll instance states up into the target state.
///
/// `working` wins immediately, `error` wins over `pending`.
pub fn aggregate_states<'a, I>(instance_states: I) -> TargetState
where
    I: IntoIterator<Item = &'a ApplicationState>,
{
    let mut state = TargetState::Pending;

    for instance_state in instance_states {
        match instance_state {
            ApplicationState::Working => return TargetState::Working,
            ApplicationState::Error => state = TargetState::Error,
            _ => {}
        }
    }

    state
}

#[derive(Debug)]
pub struct DeployTarget {
    id: String,
    name: String,
    vhosts: Vec<VHost>,
    nodes: Vec<Node>,
    applications: Vec<ApplicationInstance>,
    state: TargetState,
}

/// Exported deploy target
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployTargetExport {
    pub id: String,
    pub name: String,
    pub state: TargetState,
    pub can_manage_vhosts: bool,
    pub vhosts: Vec<VHostExport>,
    pub nodes: Vec<NodeExport>,
    pub applications: Vec<ApplicationInstanceExport>,
}

impl DeployTarget {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: generate_id("TARGET."),
            name: name.into(),
            vhosts: Vec::new(),
            nodes: Vec::new(),
            applications: Vec::new(),
            state: TargetState::Pending,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn state(&self) -> TargetState {
        self.state
    }

    /// Set the state from its string form. Only `pending`, `working` and `error` are accepted.
    pub fn set_state(&mut self, state: &str) -> Result<()> {
        self.state = TargetState::parse(state)?;
        Ok(())
    }

    // === VHosts ===

    /// Add a vhost. Names are unique within a target.
    pub fn add_vhost(&mut self, vhost: VHost) -> Result<()> {
        if self.has_vhost_name(vhost.name()) {
            return Err(NexusError::logic(format!(
                "Duplicate vhost name: {}",
                vhost.name()
            )));
        }

        self.vhosts.push(vhost);
        Ok(())
    }

    pub fn get_vhost(&self, id: &str) -> Option<&VHost> {
        self.vhosts.iter().find(|v| v.id() == id)
    }

    /// Rename a vhost, keeping names unique within the target.
    pub fn rename_vhost(&mut self, id: &str, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        if self.vhosts.iter().any(|v| v.id() != id && v.name() == name) {
            return Err(NexusError::logic(format!("Duplicate vhost name: {}", name)));
        }

        let vhost = self
            .vhosts
            .iter_mut()
            .find(|v| v.id() == id)
            .ok_or_else(|| NexusError::logic(format!("Unknown vhost: {}", id)))?;
        vhost.set_name(name)
    }

    pub fn has_vhost_name(&self, name: &str) -> bool {
        self.vhosts.iter().any(|v| v.name() == name)
    }

    pub fn vhosts(&self) -> &[VHost] {
        &self.vhosts
    }

    pub fn remove_vhost(&mut self, id: &str) -> Option<VHost> {
        let index = self.vhosts.iter().position(|v| v.id() == id)?;
        Some(self.vhosts.remove(index))
    }

    pub fn can_manage_vhosts(&self) -> bool {
        true
    }

    // === Nodes ===

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id() == id)
    }

    /// Attach a node to this target and take ownership of it.
    pub fn attach_node(&mut self, mut node: Node) -> Result<()> {
        node.attach(self)?;
        self.nodes.push(node);
        Ok(())
    }

    /// Detach a node and hand it back.
    pub fn detach_node(&mut self, id: &str) -> Result<Node> {
        let index = self
            .nodes
            .iter()
            .position(|n| n.id() == id)
            .ok_or_else(|| NexusError::logic(format!("Node {} is not attached to this target", id)))?;

        self.nodes[index].detach()?;
        Ok(self.nodes.remove(index))
    }

    // === Application instances ===

    pub fn applications(&self) -> &[ApplicationInstance] {
        &self.applications
    }

    /// Add an instance. An instance with the same id is replaced in place.
    pub fn add_application(&mut self, instance: ApplicationInstance) {
        match self
            .applications
            .iter_mut()
            .find(|a| a.id() == instance.id())
        {
            Some(existing) => *existing = instance,
            None => self.applications.push(instance),
        }
    }

    pub fn find_application_instance(&self, id: &str) -> Option<&ApplicationInstance> {
        self.applications.iter().find(|a| a.id() == id)
    }

    pub fn find_application_instance_mut(&mut self, id: &str) -> Option<&mut ApplicationInstance> {
        self.applications.iter_mut().find(|a| a.id() == id)
    }

    /// All instances deployed from the given application.
    pub fn find_instances_by_application(&self, application_id: &str) -> Vec<&ApplicationInstance> {
        self.applications
            .iter()
            .filter(|a| a.application_id().is_ok_and(|id| id == application_id))
            .collect()
    }

    /// Mark an instance for removal.
    ///
    /// The instance stays in the target until every node reports it removed.
    pub fn remove_application(&mut self, id: &str) -> Result<()> {
        let instance = self
            .find_application_instance_mut(id)
            .ok_or_else(|| NexusError::logic(format!("Unknown application instance: {}", id)))?;

        instance.remove();
        info!(instance = %id, "Application instance marked for removal");
        Ok(())
    }

    // === Aggregation ===

    /// Recompute the state of one instance from the node reports.
    ///
    /// Returns the resolved state. A removed instance that resolves to
    /// `removed` is dropped from the target.
    pub fn update_application_state(&mut self, id: &str) -> Result<ApplicationState> {
        let index = self
            .applications
            .iter()
            .position(|a| a.id() == id)
            .ok_or_else(|| NexusError::logic(format!("Unknown application instance: {}", id)))?;

        let state = resolve_application_state(self.nodes.iter().map(|n| n.application_state(id)));
        debug!(instance = %id, state = %state, "Resolved application state");

        let instance = &mut self.applications[index];
        instance.set_state(state.clone());

        if instance.is_removed() && *instance.state() == ApplicationState::Removed {
            self.applications.remove(index);
            info!(instance = %id, "Removed application instance discarded");
        }

        Ok(state)
    }

    /// Recompute every instance state, then the target state.
    pub fn update_application_states(&mut self) -> Result<TargetState> {
        let ids: Vec<String> = self
            .applications
            .iter()
            .map(|a| a.id().to_string())
            .collect();

        for id in &ids {
            self.update_application_state(id)?;
        }

        Ok(self.aggregate_state())
    }

    /// Roll the instance states up into the target state.
    pub fn aggregate_state(&mut self) -> TargetState {
        let state = aggregate_states(self.applications.iter().map(|a| a.state()));
        if state != self.state {
            debug!(target_id = %self.id, from = %self.state, to = %state, "Deploy target state changed");
        }
        self.state = state;
        state
    }

    /// Refresh every node, then recompute all states.
    pub fn refresh_status(&mut self) -> Result<TargetState> {
        for node in &mut self.nodes {
            node.refresh()?;
        }

        self.update_application_states()
    }

    // === Sync ===

    /// Whether at least one node can be synced.
    pub fn can_sync(&mut self) -> Result<bool> {
        for node in &mut self.nodes {
            if node.can_sync()? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Sync every syncable node. The first failure is returned as is.
    pub fn sync(&mut self) -> Result<()> {
        if !self.can_sync()? {
            return Err(NexusError::logic("Target is not syncable"));
        }

        for node in &mut self.nodes {
            if node.can_sync()? {
                node.sync()?;
            }
        }

        info!(target_id = %self.id, "Deploy target synced");
        Ok(())
    }

    pub fn export(&self) -> Result<DeployTargetExport> {
        Ok(DeployTargetExport {
            id: self.id.clone(),
            name: self.name.clone(),
            state: self.state,
            can_manage_vhosts: self.can_manage_vhosts(),
            vhosts: self.vhosts.iter().map(VHost::export).collect(),
            nodes: self.nodes.iter().map(Node::export).collect(),
            applications: self
                .applications
                .iter()
                .map(ApplicationInstance::export)
                .collect::<Result<_>>()?,
        })
    }
}
