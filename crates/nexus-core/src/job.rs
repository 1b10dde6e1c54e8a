//! Background jobs
//!
//! Jobs are units of deferred work (syncing a node, rebuilding an instance).
//! A [`JobAggregate`] runs a set of jobs in priority order and can be
//! serialized for queueing:
//!
//! ```json
//! {"p": 1, "j": [["sync-node", {"node": "..."}, 10], ["rebuild", {}, 1]]}
//! ```
//!
//! Deserialization needs a [`JobRegistry`] that knows how to rebuild each kind.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Value, json};
use tracing::debug;

use crate::error::{NexusError, Result};

/// Priority used when a job does not define one.
pub const DEFAULT_PRIORITY: i64 = 1;

pub trait Job: fmt::Debug + Send {
    /// Kind tag used to find the deserializer.
    fn kind(&self) -> &str;

    fn priority(&self) -> i64 {
        DEFAULT_PRIORITY
    }

    fn run(&mut self) -> Result<()>;

    /// Job specific payload.
    fn serialize(&self) -> Value;
}

type JobFactory = Box<dyn Fn(&Value) -> Result<Box<dyn Job>> + Send + Sync>;

/// Maps job kinds to deserializers.
#[derive(Default)]
pub struct JobRegistry {
    factories: BTreeMap<String, JobFactory>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, kind: impl Into<String>, factory: F)
    where
        F: Fn(&Value) -> Result<Box<dyn Job>> + Send + Sync + 'static,
    {
        self.factories.insert(kind.into(), Box::new(factory));
    }

    pub fn has(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// Rebuild a job from its kind and payload.
    pub fn create(&self, kind: &str, data: &Value) -> Result<Box<dyn Job>> {
        if kind == JobAggregate::KIND {
            return Ok(Box::new(JobAggregate::deserialize(data, self)?));
        }

        let factory = self
            .factories
            .get(kind)
            .ok_or_else(|| NexusError::unexpected_value(format!("Invalid job type: {}", kind)))?;
        factory(data)
    }
}

impl fmt::Debug for JobRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobRegistry")
            .field("kinds", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[derive(Debug)]
struct QueuedJob {
    priority: i64,
    job: Box<dyn Job>,
}

/// Priority ordered set of jobs, itself runnable as a job.
#[derive(Debug)]
pub struct JobAggregate {
    priority: i64,
    jobs: Vec<QueuedJob>,
}

impl Default for JobAggregate {
    fn default() -> Self {
        Self::new(DEFAULT_PRIORITY)
    }
}

impl JobAggregate {
    pub const KIND: &'static str = "aggregate";

    pub fn new(priority: i64) -> Self {
        Self {
            priority,
            jobs: Vec::new(),
        }
    }

    /// Queue a job under its own priority.
    pub fn add(&mut self, job: Box<dyn Job>) {
        let priority = job.priority();
        self.insert(job, priority);
    }

    /// Queue a job with an explicit priority.
    ///
    /// Higher priorities run first, equal priorities in insertion order.
    pub fn insert(&mut self, job: Box<dyn Job>, priority: i64) {
        let index = self.jobs.partition_point(|queued| queued.priority >= priority);
        self.jobs.insert(index, QueuedJob { priority, job });
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Job kinds in execution order.
    pub fn kinds(&self) -> Vec<&str> {
        self.jobs.iter().map(|queued| queued.job.kind()).collect()
    }

    pub fn to_json_string(&self) -> String {
        Job::serialize(self).to_string()
    }

    /// Rebuild an aggregate from its serialized form.
    pub fn deserialize(data: &Value, registry: &JobRegistry) -> Result<Self> {
        let malformed = || NexusError::unexpected_value("Serialized job aggregation invalid");

        let priority = data.get("p").and_then(Value::as_i64).ok_or_else(malformed)?;
        let entries = data.get("j").and_then(Value::as_array).ok_or_else(malformed)?;

        let mut aggregate = Self::new(priority);
        for entry in entries {
            let (kind, payload, priority) = match entry.as_array().map(Vec::as_slice) {
                Some([Value::String(kind), payload, priority]) => {
                    (kind, payload, priority.as_i64().ok_or_else(malformed)?)
                }
                _ => return Err(malformed()),
            };

            aggregate.insert(registry.create(kind, payload)?, priority);
        }

        Ok(aggregate)
    }

    pub fn from_json_str(json: &str, registry: &JobRegistry) -> Result<Self> {
        let data: Value = serde_json::from_str(json)
            .map_err(|e| NexusError::unexpected_value(format!("Serialized job aggregation invalid: {}", e)))?;
        Self::deserialize(&data, registry)
    }
}

impl Job for JobAggregate {
    fn kind(&self) -> &str {
        Self::KIND
    }

    fn priority(&self) -> i64 {
        self.priority
    }

    /// Run every job in order. The first failure stops the run.
    fn run(&mut self) -> Result<()> {
        for queued in &mut self.jobs {
            debug!(kind = %queued.job.kind(), priority = queued.priority, "Running job");
            queued.job.run()?;
        }
        Ok(())
    }

    fn serialize(&self) -> Value {
        let jobs: Vec<Value> = self
            .jobs
            .iter()
            .map(|queued| json!([queued.job.kind(), queued.job.serialize(), queued.priority]))
            .collect();

        json!({ "p": self.priority, "j": jobs })
    }
}
