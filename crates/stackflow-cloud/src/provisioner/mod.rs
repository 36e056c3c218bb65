//! Resource provisioners
//!
//! A provisioner takes one top-level resource from "declared" to "live". Three
//! strategies exist:
//!
//! - [`TemplateStackProvisioner`]: deploys the resource's own template
//! - [`AppProvisioner`]: deploys every stack a construct-tree app synthesized
//! - [`ExistingStackProvisioner`]: reads a stack deployed elsewhere

mod app;
mod reference;
mod template;

pub use app::AppProvisioner;
pub use reference::ExistingStackProvisioner;
pub use template::TemplateStackProvisioner;

use crate::config::ExecutorConfig;
use crate::console;
use crate::error::Result;
use crate::executor::{StackDeploymentRequest, StackExecutor};
use crate::reporter::StateReporter;
use crate::resource::Resource;
use crate::stack::{ClientFactory, StackDescription};
use crate::state::{ResourceProperty, ResourceUrl, SOURCE_PROPERTY, StateTransition};
use crate::template::TemplateRef;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Name of the console link published for deployed stacks
pub const CONSOLE_URL_NAME: &str = "CloudFormation console";

/// Strategy for provisioning one kind of resource
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Short name shown in logs and `validate` output
    fn name(&self) -> &str;

    /// Provision `resource`
    ///
    /// Publishing the terminal state of `resource` itself is left to the
    /// caller; provisioners only publish for resources they manage on the
    /// resource's behalf (an app's stacks).
    async fn provision(
        &self,
        resource: &Arc<Resource>,
        ctx: &ProvisionContext,
    ) -> Result<ProvisionOutcome>;
}

/// What a provisioner gets besides the resource
pub struct ProvisionContext {
    pub reporter: StateReporter,
    pub cancel: CancellationToken,
}

/// Properties and links to publish with the "Running" state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisionOutcome {
    pub properties: Vec<ResourceProperty>,
    pub urls: Vec<ResourceUrl>,
}

impl ProvisionOutcome {
    pub fn into_transition(self) -> StateTransition {
        StateTransition::running()
            .with_properties(self.properties)
            .with_urls(self.urls)
    }
}

/// Collects a stack snapshot into published properties
#[derive(Debug, Clone)]
pub struct StackPublisher {
    namespace: String,
}

impl StackPublisher {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Record the stack outputs on `resource` and build its published state
    pub fn publish(
        &self,
        resource: &Resource,
        stack: &StackDescription,
        template: Option<&Path>,
        public_endpoint: bool,
    ) -> ProvisionOutcome {
        info!(resource = %resource.id(), count = stack.outputs.len(), "Stack has {} output parameters", stack.outputs.len());
        for output in &stack.outputs {
            info!(resource = %resource.id(), name = %output.key, value = %output.value, "Stack output");
        }
        resource.set_outputs(stack.outputs.clone());

        let mut properties: Vec<ResourceProperty> = stack
            .outputs
            .iter()
            .map(|o| ResourceProperty::new(format!("{}.output.{}", self.namespace, o.key), &o.value))
            .collect();
        properties.push(ResourceProperty::new(SOURCE_PROPERTY, &stack.stack_id));
        if let Some(path) = template {
            properties.push(ResourceProperty::new(
                format!("{}.template", self.namespace),
                path.display().to_string(),
            ));
        }

        let urls = console::console_url(&stack.stack_id, public_endpoint)
            .map(|url| ResourceUrl {
                name: CONSOLE_URL_NAME.to_string(),
                url,
            })
            .into_iter()
            .collect();

        ProvisionOutcome { properties, urls }
    }
}

/// Deploys a template for a resource and publishes the result
#[derive(Clone)]
pub struct StackDeployer {
    clients: Arc<dyn ClientFactory>,
    config: ExecutorConfig,
    publisher: StackPublisher,
}

impl StackDeployer {
    pub fn new(
        clients: Arc<dyn ClientFactory>,
        config: ExecutorConfig,
        publisher: StackPublisher,
    ) -> Self {
        Self {
            clients,
            config,
            publisher,
        }
    }

    pub fn clients(&self) -> &Arc<dyn ClientFactory> {
        &self.clients
    }

    pub fn publisher(&self) -> &StackPublisher {
        &self.publisher
    }

    /// Run the executor for `resource`; a failed deployment becomes `ApplyFailed`
    pub async fn deploy(
        &self,
        resource: &Resource,
        template: TemplateRef,
        cancel: &CancellationToken,
    ) -> Result<ProvisionOutcome> {
        let client = self.clients.client_for(resource).await?;
        let public_endpoint = client.is_public_endpoint();
        let executor = StackExecutor::new(client, self.config.clone());

        let request = StackDeploymentRequest {
            resource: resource.id().clone(),
            stack_name: resource.stack_name().to_string(),
            template,
            parameters: resource.spec().parameters.clone(),
        };
        let stack = executor.execute(&request, cancel).await?.into_snapshot()?;

        let outcome = self.publisher.publish(
            resource,
            &stack,
            request.template.path(),
            public_endpoint,
        );
        info!(resource = %resource.id(), stack = %stack.stack_name, "Stack provisioning complete");
        Ok(outcome)
    }
}
