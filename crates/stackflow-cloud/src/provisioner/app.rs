use super::{ProvisionContext, ProvisionOutcome, Provisioner, StackDeployer};
use crate::assembly::{CloudAssembly, SynthesizedStack, Synthesizer};
use crate::error::{CloudError, Result};
use crate::resource::{Resource, ResourceKind};
use crate::state::StateTransition;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info};

/// Message prefix of a deployment in an account without the toolkit stack
const MISSING_BOOTSTRAP: &str = "Unable to fetch parameters [/cdk-bootstrap/";

/// Deploys every stack a construct-tree app synthesized
///
/// Stacks are deployed one by one in the order the app's `app-stack` children
/// are declared. The first failure stops the sequence: stacks already
/// deployed stay as they are, the remaining ones are marked failed without
/// being attempted.
pub struct AppProvisioner {
    deployer: StackDeployer,
    synthesizer: Arc<dyn Synthesizer>,
}

impl AppProvisioner {
    pub fn new(deployer: StackDeployer, synthesizer: Arc<dyn Synthesizer>) -> Self {
        Self {
            deployer,
            synthesizer,
        }
    }
}

/// Pair each declared stack with its synthesized template
fn match_stacks<'a>(
    app: &Resource,
    declared: &[Arc<Resource>],
    assembly: &'a CloudAssembly,
) -> Result<Vec<(Arc<Resource>, &'a SynthesizedStack)>> {
    let mut plan = Vec::with_capacity(declared.len());
    for stack in declared {
        let synthesized = assembly.stack(stack.stack_name()).ok_or_else(|| {
            CloudError::InvalidConfig(format!(
                "stack {} of app {} is missing from the cloud assembly",
                stack.stack_name(),
                app.id()
            ))
        })?;
        plan.push((stack.clone(), synthesized));
    }

    if let Some(undeclared) = assembly
        .stacks
        .iter()
        .find(|s| !declared.iter().any(|d| d.stack_name() == s.stack_name))
    {
        return Err(CloudError::InvalidConfig(format!(
            "app {} synthesized stack {} that is not declared",
            app.id(),
            undeclared.stack_name
        )));
    }
    Ok(plan)
}

#[async_trait]
impl Provisioner for AppProvisioner {
    fn name(&self) -> &str {
        "app"
    }

    async fn provision(
        &self,
        app: &Arc<Resource>,
        ctx: &ProvisionContext,
    ) -> Result<ProvisionOutcome> {
        let assembly = self.synthesizer.synthesize(app).await?;
        assembly.check_assets()?;

        let declared: Vec<Arc<Resource>> = ctx
            .reporter
            .graph()
            .children_of(app.id())
            .filter(|r| r.kind() == ResourceKind::AppStack)
            .cloned()
            .collect();
        let plan = match_stacks(app, &declared, &assembly)?;

        for (index, (stack, synthesized)) in plan.iter().enumerate() {
            ctx.reporter.mark_starting(stack).await;
            info!(app = %app.id(), resource = %stack.id(), "Provisioning {}...", stack.id());

            match self
                .deployer
                .deploy(stack, synthesized.template.clone(), &ctx.cancel)
                .await
            {
                Ok(outcome) => {
                    ctx.reporter
                        .complete(stack, outcome.into_transition(), Ok(()))
                        .await;
                }
                Err(e) => {
                    if e.to_string().contains(MISSING_BOOTSTRAP) {
                        error!(resource = %stack.id(), "The environment doesn't have the CDK toolkit stack installed. Run 'cdk bootstrap' first");
                    }
                    error!(app = %app.id(), resource = %stack.id(), error = %e, "Error provisioning {}", stack.id());
                    let cause = Arc::new(e);
                    ctx.reporter
                        .complete(stack, StateTransition::failed(), Err(cause.clone()))
                        .await;

                    for (remaining, _) in &plan[index + 1..] {
                        let skipped = CloudError::NotAttempted {
                            stack_name: remaining.stack_name().to_string(),
                            failed_stack: stack.stack_name().to_string(),
                        };
                        ctx.reporter
                            .complete(remaining, StateTransition::failed(), Err(Arc::new(skipped)))
                            .await;
                    }

                    return Err(CloudError::AppStackFailed {
                        app: app.id().to_string(),
                        stack_name: stack.stack_name().to_string(),
                        cause,
                    });
                }
            }
        }

        info!(app = %app.id(), stacks = plan.len(), "App provisioning complete");
        Ok(ProvisionOutcome::default())
    }
}
