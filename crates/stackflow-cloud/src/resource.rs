//! Declared resources and their live status

use crate::error::CloudError;
use crate::signal::CompletionSignal;
use crate::stack::StackOutput;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{OnceLock, PoisonError, RwLock};

/// Stable identifier of a resource within one application model
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ResourceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Kind of a resource; the key provisioners are registered under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    /// Stack deployed outside this application, read-only
    StackReference,
    /// Stack deployed from a template
    TemplateStack,
    /// Construct-tree app that synthesizes one or more stacks
    App,
    /// Stack synthesized by an app
    AppStack,
    /// Construct declared inside a stack
    Construct,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 5] = [
        ResourceKind::StackReference,
        ResourceKind::TemplateStack,
        ResourceKind::App,
        ResourceKind::AppStack,
        ResourceKind::Construct,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::StackReference => "stack-reference",
            ResourceKind::TemplateStack => "template-stack",
            ResourceKind::App => "app",
            ResourceKind::AppStack => "app-stack",
            ResourceKind::Construct => "construct",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = CloudError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| CloudError::InvalidConfig(format!("unknown resource kind: {}", s)))
    }
}

/// Status of a resource during a provisioning run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    /// Declared, not yet picked up by a run
    Pending,
    /// Provisioning has started
    Starting,
    /// Live and converged
    Running,
    /// Provisioning ended in an error
    FailedToProvision,
    /// Nothing knows how to provision it; complete with no action
    NoAction,
}

impl ResourceStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ResourceStatus::Running | ResourceStatus::FailedToProvision | ResourceStatus::NoAction
        )
    }
}

impl std::fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceStatus::Pending => write!(f, "Pending"),
            ResourceStatus::Starting => write!(f, "Starting"),
            ResourceStatus::Running => write!(f, "Running"),
            ResourceStatus::FailedToProvision => write!(f, "Failed to Provision"),
            ResourceStatus::NoAction => write!(f, "Complete (no action)"),
        }
    }
}

/// Settings the client factory uses to build an authenticated client
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientProfile {
    /// Named credentials profile
    pub profile: Option<String>,
    /// Target region
    pub region: Option<String>,
    /// Custom API endpoint (e.g. a local emulator)
    pub endpoint_url: Option<String>,
}

/// Kind-specific declaration of a resource
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceSpec {
    /// Remote stack name; defaults to the resource id
    pub stack_name: Option<String>,

    /// Template file on disk
    pub template_path: Option<PathBuf>,

    /// Inline template body
    pub template_body: Option<String>,

    /// Template parameters
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,

    /// Synthesized construct-tree output directory (apps only)
    pub assembly_dir: Option<PathBuf>,

    /// Client settings; the factory falls back to its defaults when absent
    pub client: Option<ClientProfile>,
}

/// A node of the application model
///
/// Identity, kind, parent and spec are fixed at declaration time. Status and
/// outputs are written only by the provisioning pipeline.
#[derive(Debug)]
pub struct Resource {
    id: ResourceId,
    kind: ResourceKind,
    parent: Option<ResourceId>,
    spec: ResourceSpec,
    status: RwLock<ResourceStatus>,
    outputs: RwLock<Vec<StackOutput>>,
    completion: OnceLock<CompletionSignal>,
}

impl Resource {
    pub fn new(id: impl Into<ResourceId>, kind: ResourceKind) -> Self {
        Self {
            id: id.into(),
            kind,
            parent: None,
            spec: ResourceSpec::default(),
            status: RwLock::new(ResourceStatus::Pending),
            outputs: RwLock::new(Vec::new()),
            completion: OnceLock::new(),
        }
    }

    pub fn with_parent(mut self, parent: impl Into<ResourceId>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_spec(mut self, spec: ResourceSpec) -> Self {
        self.spec = spec;
        self
    }

    pub fn with_template(mut self, path: impl Into<PathBuf>) -> Self {
        self.spec.template_path = Some(path.into());
        self
    }

    pub fn with_stack_name(mut self, stack_name: impl Into<String>) -> Self {
        self.spec.stack_name = Some(stack_name.into());
        self
    }

    pub fn id(&self) -> &ResourceId {
        &self.id
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn parent(&self) -> Option<&ResourceId> {
        self.parent.as_ref()
    }

    pub fn spec(&self) -> &ResourceSpec {
        &self.spec
    }

    /// Name of the remote stack backing this resource
    pub fn stack_name(&self) -> &str {
        self.spec.stack_name.as_deref().unwrap_or(self.id.as_str())
    }

    /// Top-level resources are the ones a run provisions directly
    pub fn requires_provisioning(&self) -> bool {
        self.parent.is_none()
    }

    pub fn status(&self) -> ResourceStatus {
        *self.status.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set_status(&self, status: ResourceStatus) {
        *self.status.write().unwrap_or_else(PoisonError::into_inner) = status;
    }

    pub fn outputs(&self) -> Vec<StackOutput> {
        self.outputs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Value of a single stack output, e.g. a table name for a connection string
    pub fn output(&self, key: &str) -> Option<String> {
        self.outputs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|o| o.key == key)
            .map(|o| o.value.clone())
    }

    pub(crate) fn set_outputs(&self, outputs: Vec<StackOutput>) {
        *self.outputs.write().unwrap_or_else(PoisonError::into_inner) = outputs;
    }

    /// Create the completion signal, or return the one already created
    pub(crate) fn arm_completion(&self) -> CompletionSignal {
        self.completion.get_or_init(CompletionSignal::new).clone()
    }

    /// Completion signal; `None` until a run has marked the resource starting
    pub fn completion(&self) -> Option<CompletionSignal> {
        self.completion.get().cloned()
    }
}
