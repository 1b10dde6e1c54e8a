//! Nexus Core Library
//!
//! Provides the deployment domain model: packages read from composer and ZPK
//! archives, applications and their deployed instances, nodes and the deploy
//! targets that aggregate node reports into instance and target states.

pub mod application;
pub mod archive;
pub mod config;
pub mod error;
pub mod ids;
pub mod instance;
pub mod job;
pub mod node;
pub mod package;
pub mod repository;
pub mod target;
pub mod vhost;

pub use error::{ErrorKind, NexusError, Result};

/// Re-exports of commonly used types
pub mod prelude {
    // Errors
    pub use crate::error::{ErrorKind, NexusError, Result};

    // Packages
    pub use crate::package::{
        ApplicationPackage, ArchivePackage, BuildIdAware, ComposerPackage, Constraint,
        ConstraintBuilder, Package, PackageExport, PackageParameter, Parameter,
        PlatformDependency, ZpkPackage, export_package,
    };

    // Archives
    pub use crate::archive::{ArchiveHandle, ArchiveLoader, PackageLoader, ZipArchiveHandle};

    // Entities
    pub use crate::application::{Application, SharedApplication};
    pub use crate::instance::{ApplicationInstance, ApplicationState, UserParameters};
    pub use crate::node::{Node, NodeReport, NodeStrategy, NodeStrategyProvider, StrategyRegistry};
    pub use crate::target::{DeployTarget, TargetState};
    pub use crate::vhost::VHost;

    // Jobs
    pub use crate::job::{Job, JobAggregate, JobRegistry};

    // Persistence
    pub use crate::repository::{Entity, InMemoryRepository, PersistenceManager, Repository};

    // Configuration
    pub use crate::config::{ConfigStore, NexusConfig};
}
