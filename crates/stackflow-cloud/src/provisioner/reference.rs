use super::{ProvisionContext, ProvisionOutcome, Provisioner, StackPublisher};
use crate::error::{CloudError, Result};
use crate::resource::Resource;
use crate::stack::ClientFactory;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::error;

/// Reads a stack deployed outside this application
///
/// Nothing is created or changed; the stack's outputs are captured so
/// dependents can use them.
pub struct ExistingStackProvisioner {
    clients: Arc<dyn ClientFactory>,
    publisher: StackPublisher,
}

impl ExistingStackProvisioner {
    pub fn new(clients: Arc<dyn ClientFactory>, publisher: StackPublisher) -> Self {
        Self { clients, publisher }
    }
}

#[async_trait]
impl Provisioner for ExistingStackProvisioner {
    fn name(&self) -> &str {
        "stack-reference"
    }

    async fn provision(
        &self,
        resource: &Arc<Resource>,
        ctx: &ProvisionContext,
    ) -> Result<ProvisionOutcome> {
        let stack_name = resource.stack_name();
        let client = self.clients.client_for(resource).await?;

        let described = tokio::select! {
            _ = ctx.cancel.cancelled() => {
                return Err(CloudError::Cancelled(format!("stopped reading stack {}", stack_name)));
            }
            described = client.describe_stack(stack_name) => described,
        };

        match described {
            Ok(Some(stack)) => Ok(self
                .publisher
                .publish(resource, &stack, None, client.is_public_endpoint())),
            Ok(None) => {
                error!(resource = %resource.id(), stack = %stack_name, "Stack {} does not exist to add as a resource", stack_name);
                Err(CloudError::StackNotFound(stack_name.to_string()))
            }
            Err(e) => {
                error!(resource = %resource.id(), stack = %stack_name, error = %e, "Error reading {}", stack_name);
                Err(e)
            }
        }
    }
}
