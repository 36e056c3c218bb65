//! StackFlow provisioning core
//!
//! This crate takes a declared set of cloud resources (template stacks,
//! construct-tree apps and references to existing stacks) and drives each of
//! them to a live state through a stack deployment control plane, publishing
//! every state change to a notification sink.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  StackFlow CLI                   │
//! │                 (stackflow up)                   │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                stackflow-cloud                   │
//! │  ┌──────────────┐  ┌──────────────────────┐     │
//! │  │ Orchestrator │─▶│ ProvisionerRegistry  │     │
//! │  └──────┬───────┘  └──────────┬───────────┘     │
//! │         │          ┌──────────▼───────────┐     │
//! │  ┌──────▼───────┐  │     Provisioners     │     │
//! │  │ResourceGraph │  │template/app/existing │     │
//! │  └──────────────┘  └──────────┬───────────┘     │
//! │                    ┌──────────▼───────────┐     │
//! │                    │    StackExecutor     │     │
//! │                    │ trait ControlPlane   │     │
//! │                    └──────────────────────┘     │
//! └─────────────────────────┬───────────────────────┘
//!                           │
//!                 ┌─────────▼─────────┐
//!                 │stackflow-cloud-aws│
//!                 │  (CloudFormation) │
//!                 └───────────────────┘
//! ```

pub mod assembly;
pub mod config;
pub mod console;
pub mod error;
pub mod executor;
pub mod graph;
pub mod orchestrator;
pub mod provisioner;
pub mod registry;
pub mod report;
pub mod reporter;
pub mod resource;
pub mod signal;
pub mod stack;
pub mod state;
pub mod template;

// Re-exports
pub use assembly::{AssemblyDirSynthesizer, AssetSummary, CloudAssembly, SynthesizedStack, Synthesizer};
pub use config::{DEFAULT_CAPABILITIES, DEFAULT_NAMESPACE, ExecutorConfig, RetryConfig};
pub use error::{CloudError, Result};
pub use executor::{StackDeployment, StackDeploymentRequest, StackExecutor, StackFailure};
pub use graph::ResourceGraph;
pub use orchestrator::{OrchestrationHandle, Orchestrator};
pub use provisioner::{
    AppProvisioner, ExistingStackProvisioner, ProvisionContext, ProvisionOutcome, Provisioner,
    StackDeployer, StackPublisher, TemplateStackProvisioner,
};
pub use registry::ProvisionerRegistry;
pub use report::{FailedResource, RunReport};
pub use reporter::StateReporter;
pub use resource::{ClientProfile, Resource, ResourceId, ResourceKind, ResourceSpec, ResourceStatus};
pub use signal::{CompletionSignal, Outcome};
pub use stack::{
    ChangeSetDescription, ChangeSetRequest, ChangeSetStatus, ChangeSetType, ClientFactory,
    ControlPlane, StackDescription, StackEvent, StackOutput, StackStatus,
};
pub use state::{
    NotificationSink, ResourceProperty, ResourceSnapshot, ResourceUrl, SnapshotStore,
    SnapshotTransform, StateLabel, StateStyle, StateTransition, TracingSink,
};
pub use template::{DeclaredTemplateProvider, TemplateProvider, TemplateRef};

pub use tokio_util::sync::CancellationToken;
