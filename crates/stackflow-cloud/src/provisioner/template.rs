use super::{ProvisionContext, ProvisionOutcome, Provisioner, StackDeployer};
use crate::error::Result;
use crate::resource::Resource;
use crate::template::TemplateProvider;
use async_trait::async_trait;
use std::sync::Arc;

/// Deploys a stack from the template the resource declares
pub struct TemplateStackProvisioner {
    deployer: StackDeployer,
    templates: Arc<dyn TemplateProvider>,
}

impl TemplateStackProvisioner {
    pub fn new(deployer: StackDeployer, templates: Arc<dyn TemplateProvider>) -> Self {
        Self {
            deployer,
            templates,
        }
    }
}

#[async_trait]
impl Provisioner for TemplateStackProvisioner {
    fn name(&self) -> &str {
        "template-stack"
    }

    async fn provision(
        &self,
        resource: &Arc<Resource>,
        ctx: &ProvisionContext,
    ) -> Result<ProvisionOutcome> {
        let template = self.templates.template_for(resource).await?;
        tracing::debug!(resource = %resource.id(), template = %template, "Resolved template");
        self.deployer.deploy(resource, template, &ctx.cancel).await
    }
}
