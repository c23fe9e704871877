use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error};

use super::entity::ModelEntity;
use super::event::{MODEL_EVENT_NAMES, ModelEvent};
use crate::publish::{Publisher, Subscription};
use crate::stream::StreamConsumer;
use crate::{Result, SyncError};

/// Immutable name-keyed view of every backend entity.
///
/// Cloning is cheap; every change produces a new snapshot and leaves the
/// old one untouched.
#[derive(Debug, Clone, Default)]
pub struct ModelSnapshot {
    files: Arc<HashMap<String, Arc<ModelEntity>>>,
}

impl ModelSnapshot {
    pub fn from_entities(entities: impl IntoIterator<Item = ModelEntity>) -> Self {
        let files = entities
            .into_iter()
            .map(|e| (e.name.clone(), Arc::new(e)))
            .collect();
        Self {
            files: Arc::new(files),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<ModelEntity>> {
        self.files.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<ModelEntity>)> {
        self.files.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// True when both snapshots share the same underlying map
    pub fn ptr_eq(&self, other: &ModelSnapshot) -> bool {
        Arc::ptr_eq(&self.files, &other.files)
    }

    fn with_entity(&self, entity: ModelEntity) -> Self {
        let mut files = (*self.files).clone();
        files.insert(entity.name.clone(), Arc::new(entity));
        Self {
            files: Arc::new(files),
        }
    }

    fn without(&self, name: &str) -> Self {
        let mut files = (*self.files).clone();
        files.remove(name);
        Self {
            files: Arc::new(files),
        }
    }
}

/// Single source of truth for backend entities.
///
/// Consumes model events from the event channel and publishes a fresh
/// snapshot after each one that applies. Faulty events are logged and
/// dropped, leaving the snapshot as it was.
pub struct ModelStore {
    files: Publisher<ModelSnapshot>,
    initialized: bool,
}

impl Default for ModelStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelStore {
    pub fn new() -> Self {
        Self {
            files: Publisher::new(ModelSnapshot::default()),
            initialized: false,
        }
    }

    /// Whether a full model has arrived since the last disconnect
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn snapshot(&self) -> &ModelSnapshot {
        self.files.current()
    }

    /// Subscribe to snapshot publications. The current snapshot is
    /// delivered immediately.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: FnMut(&ModelSnapshot) + 'static,
    {
        self.files.subscribe(callback)
    }

    /// Apply one event. On error the snapshot is unchanged and nothing is
    /// published.
    pub fn apply(&mut self, event: ModelEvent) -> Result<()> {
        let current = self.files.current();
        let next = match event {
            ModelEvent::Init(entities) => {
                let start = Instant::now();
                let snapshot = ModelSnapshot::from_entities(entities);
                debug!(
                    files = snapshot.len(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "model initialised"
                );
                self.initialized = true;
                snapshot
            }
            ModelEvent::Added(entity) => {
                if current.contains(&entity.name) {
                    return Err(SyncError::EntityExists(entity.name));
                }
                debug!(name = %entity.name, "added file");
                current.with_entity(entity)
            }
            ModelEvent::Updated(entity) => {
                if !current.contains(&entity.name) {
                    return Err(SyncError::EntityMissing(entity.name));
                }
                debug!(name = %entity.name, state = entity.state.as_str(), "updated file");
                current.with_entity(entity)
            }
            ModelEvent::Removed(entity) => {
                if !current.contains(&entity.name) {
                    return Err(SyncError::EntityMissing(entity.name));
                }
                debug!(name = %entity.name, "removed file");
                current.without(&entity.name)
            }
        };
        self.files.publish(next);
        Ok(())
    }

    /// Drop every entity and publish the empty model
    pub fn clear(&mut self) {
        self.initialized = false;
        self.files.publish(ModelSnapshot::default());
    }
}

impl StreamConsumer for ModelStore {
    fn event_names(&self) -> Vec<String> {
        MODEL_EVENT_NAMES.iter().map(|n| n.to_string()).collect()
    }

    fn on_connected(&mut self) {}

    fn on_disconnected(&mut self) {
        // The backend owns the model; while unreachable it is unknown
        self.clear();
    }

    fn on_event(&mut self, name: &str, data: &str) {
        let result = ModelEvent::decode(name, data).and_then(|event| self.apply(event));
        if let Err(e) = result {
            error!(event = name, error = %e, "dropping model event");
        }
    }
}
