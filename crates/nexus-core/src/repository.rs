//! Persistence contracts
//!
//! The core never talks to a database. Callers load entities through a
//! [`Repository`], mutate them in memory and hand them to a
//! [`PersistenceManager`] to commit. [`InMemoryRepository`] implements both
//! with staged writes and is what the CLI and tests use.

use tracing::debug;

use crate::application::Application;
use crate::error::Result;
use crate::node::Node;
use crate::target::DeployTarget;
use crate::vhost::VHost;

/// Anything with a stable id.
pub trait Entity {
    fn entity_id(&self) -> &str;
}

impl Entity for DeployTarget {
    fn entity_id(&self) -> &str {
        self.id()
    }
}

impl Entity for Node {
    fn entity_id(&self) -> &str {
        self.id()
    }
}

impl Entity for Application {
    fn entity_id(&self) -> &str {
        self.id()
    }
}

impl Entity for VHost {
    fn entity_id(&self) -> &str {
        self.id()
    }
}

/// Read access to stored entities.
pub trait Repository<T: Entity> {
    fn find_one(&self, id: &str) -> Option<&T>;

    fn find_one_mut(&mut self, id: &str) -> Option<&mut T>;

    fn find_all(&self) -> Vec<&T>;
}

/// Write access to stored entities.
pub trait PersistenceManager<T: Entity> {
    /// Stage an insert or update.
    fn persist(&mut self, entity: T);

    /// Stage a removal.
    fn remove(&mut self, id: &str);

    /// Commit staged changes, all of them or only those for `id`.
    fn flush(&mut self, id: Option<&str>) -> Result<()>;
}

#[derive(Debug)]
enum Change<T> {
    Persist(T),
    Remove(String),
}

impl<T: Entity> Change<T> {
    fn id(&self) -> &str {
        match self {
            Change::Persist(entity) => entity.entity_id(),
            Change::Remove(id) => id.as_str(),
        }
    }
}

/// In-memory store with staged writes.
///
/// Reads only see flushed state. Committed entities keep their insertion order.
#[derive(Debug)]
pub struct InMemoryRepository<T> {
    committed: Vec<T>,
    staged: Vec<Change<T>>,
}

impl<T> Default for InMemoryRepository<T> {
    fn default() -> Self {
        Self {
            committed: Vec::new(),
            staged: Vec::new(),
        }
    }
}

impl<T: Entity> InMemoryRepository<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of staged, not yet flushed changes.
    pub fn pending(&self) -> usize {
        self.staged.len()
    }

    fn apply(&mut self, change: Change<T>) {
        match change {
            Change::Persist(entity) => {
                let id = entity.entity_id().to_string();
                match self.committed.iter_mut().find(|e| e.entity_id() == id) {
                    Some(existing) => *existing = entity,
                    None => self.committed.push(entity),
                }
                debug!(entity = %id, "Entity persisted");
            }
            Change::Remove(id) => {
                self.committed.retain(|e| e.entity_id() != id);
                debug!(entity = %id, "Entity removed");
            }
        }
    }
}

impl<T: Entity> Repository<T> for InMemoryRepository<T> {
    fn find_one(&self, id: &str) -> Option<&T> {
        self.committed.iter().find(|e| e.entity_id() == id)
    }

    fn find_one_mut(&mut self, id: &str) -> Option<&mut T> {
        self.committed.iter_mut().find(|e| e.entity_id() == id)
    }

    fn find_all(&self) -> Vec<&T> {
        self.committed.iter().collect()
    }
}

impl<T: Entity> PersistenceManager<T> for InMemoryRepository<T> {
    fn persist(&mut self, entity: T) {
        self.staged.push(Change::Persist(entity));
    }

    fn remove(&mut self, id: &str) {
        self.staged.push(Change::Remove(id.to_string()));
    }

    fn flush(&mut self, id: Option<&str>) -> Result<()> {
        let staged = std::mem::take(&mut self.staged);

        for change in staged {
            match id {
                Some(id) if change.id() != id => self.staged.push(change),
                _ => self.apply(change),
            }
        }

        Ok(())
    }
}
