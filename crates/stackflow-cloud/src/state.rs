//! Resource state snapshots and the notification sink they are published to
//!
//! A snapshot is an immutable value. Every transition produces a new snapshot
//! merged over the previous one; properties that the transition does not
//! mention are left untouched.

use crate::resource::{ResourceId, ResourceStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tokio::sync::broadcast;

/// Property carrying the remote identifier of a resource
pub const SOURCE_PROPERTY: &str = "resource.source";

/// Severity tag attached to a state label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateStyle {
    Info,
    Success,
    Warn,
    Error,
}

impl From<ResourceStatus> for StateStyle {
    fn from(status: ResourceStatus) -> Self {
        match status {
            ResourceStatus::Running => StateStyle::Success,
            ResourceStatus::FailedToProvision => StateStyle::Error,
            ResourceStatus::Pending | ResourceStatus::Starting | ResourceStatus::NoAction => {
                StateStyle::Info
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceProperty {
    pub name: String,
    pub value: String,
}

impl ResourceProperty {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceUrl {
    pub name: String,
    pub url: String,
}

/// Label and style currently shown for a resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateLabel {
    pub label: String,
    pub style: StateStyle,
}

/// Last published state of a resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    pub resource_type: Option<String>,
    pub state: Option<StateLabel>,
    pub properties: Vec<ResourceProperty>,
    pub urls: Vec<ResourceUrl>,
    pub updated_at: DateTime<Utc>,
}

impl Default for ResourceSnapshot {
    fn default() -> Self {
        Self {
            resource_type: None,
            state: None,
            properties: Vec::new(),
            urls: Vec::new(),
            updated_at: Utc::now(),
        }
    }
}

impl ResourceSnapshot {
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }

    pub fn label(&self) -> Option<&str> {
        self.state.as_ref().map(|s| s.label.as_str())
    }
}

/// One published state change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateTransition {
    pub status: ResourceStatus,
    pub style: StateStyle,
    pub resource_type: Option<String>,
    pub properties: Vec<ResourceProperty>,
    pub urls: Vec<ResourceUrl>,
}

impl StateTransition {
    pub fn new(status: ResourceStatus) -> Self {
        Self {
            status,
            style: status.into(),
            resource_type: None,
            properties: Vec::new(),
            urls: Vec::new(),
        }
    }

    pub fn starting() -> Self {
        Self::new(ResourceStatus::Starting)
    }

    pub fn running() -> Self {
        Self::new(ResourceStatus::Running)
    }

    pub fn failed() -> Self {
        Self::new(ResourceStatus::FailedToProvision)
    }

    pub fn no_action() -> Self {
        Self::new(ResourceStatus::NoAction)
    }

    pub fn with_resource_type(mut self, resource_type: impl Into<String>) -> Self {
        self.resource_type = Some(resource_type.into());
        self
    }

    pub fn with_properties(mut self, properties: Vec<ResourceProperty>) -> Self {
        self.properties.extend(properties);
        self
    }

    pub fn with_urls(mut self, urls: Vec<ResourceUrl>) -> Self {
        self.urls.extend(urls);
        self
    }

    pub fn label(&self) -> String {
        self.status.to_string()
    }

    /// The same status for a child resource; properties and urls stay with the parent
    pub fn for_child(&self) -> Self {
        Self {
            status: self.status,
            style: self.style,
            resource_type: None,
            properties: Vec::new(),
            urls: Vec::new(),
        }
    }

    /// Merge this transition over `snapshot`
    pub fn apply(&self, mut snapshot: ResourceSnapshot) -> ResourceSnapshot {
        snapshot.state = Some(StateLabel {
            label: self.label(),
            style: self.style,
        });
        if let Some(resource_type) = &self.resource_type {
            snapshot.resource_type = Some(resource_type.clone());
        }
        for property in &self.properties {
            match snapshot.properties.iter_mut().find(|p| p.name == property.name) {
                Some(existing) => existing.value = property.value.clone(),
                None => snapshot.properties.push(property.clone()),
            }
        }
        for url in &self.urls {
            if !snapshot.urls.contains(url) {
                snapshot.urls.push(url.clone());
            }
        }
        snapshot.updated_at = Utc::now();
        snapshot
    }
}

/// Pure function from the current snapshot to the next one
pub type SnapshotTransform = Box<dyn FnOnce(ResourceSnapshot) -> ResourceSnapshot + Send>;

/// Receives state updates for resources
///
/// Implementations apply `transform` to the current snapshot of `resource`
/// (a default snapshot when none exists yet) and store the result. Updates
/// for one resource must be serialized.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn publish_update(
        &self,
        resource: &ResourceId,
        transform: SnapshotTransform,
    ) -> ResourceSnapshot;
}

/// In-memory snapshot store
///
/// Every published snapshot is also broadcast to subscribers.
pub struct SnapshotStore {
    snapshots: Mutex<HashMap<ResourceId, ResourceSnapshot>>,
    updates: broadcast::Sender<(ResourceId, ResourceSnapshot)>,
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotStore {
    const CHANNEL_CAPACITY: usize = 256;

    pub fn new() -> Self {
        let (updates, _) = broadcast::channel(Self::CHANNEL_CAPACITY);
        Self {
            snapshots: Mutex::new(HashMap::new()),
            updates,
        }
    }

    pub fn snapshot(&self, resource: &ResourceId) -> Option<ResourceSnapshot> {
        self.snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(resource)
            .cloned()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<(ResourceId, ResourceSnapshot)> {
        self.updates.subscribe()
    }
}

#[async_trait]
impl NotificationSink for SnapshotStore {
    async fn publish_update(
        &self,
        resource: &ResourceId,
        transform: SnapshotTransform,
    ) -> ResourceSnapshot {
        let next = {
            let mut snapshots = self.snapshots.lock().unwrap_or_else(PoisonError::into_inner);
            let current = snapshots.remove(resource).unwrap_or_default();
            let next = transform(current);
            snapshots.insert(resource.clone(), next.clone());
            next
        };
        // No subscribers is fine
        let _ = self.updates.send((resource.clone(), next.clone()));
        next
    }
}

/// Sink wrapper that logs every published state
pub struct TracingSink<S = SnapshotStore> {
    inner: S,
}

impl<S: NotificationSink> TracingSink<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: NotificationSink> NotificationSink for TracingSink<S> {
    async fn publish_update(
        &self,
        resource: &ResourceId,
        transform: SnapshotTransform,
    ) -> ResourceSnapshot {
        let snapshot = self.inner.publish_update(resource, transform).await;
        if let Some(state) = &snapshot.state {
            match state.style {
                StateStyle::Error => {
                    tracing::error!(resource = %resource, state = %state.label, "Resource state changed")
                }
                StateStyle::Warn => {
                    tracing::warn!(resource = %resource, state = %state.label, "Resource state changed")
                }
                StateStyle::Info | StateStyle::Success => {
                    tracing::info!(resource = %resource, state = %state.label, "Resource state changed")
                }
            }
        }
        snapshot
    }
}
