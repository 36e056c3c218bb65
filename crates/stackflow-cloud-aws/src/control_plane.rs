//! CloudFormation control plane

use crate::error::AwsError;
use async_trait::async_trait;
use aws_sdk_cloudformation::Client;
use aws_sdk_cloudformation::types::{Capability, ChangeSetType as AwsChangeSetType, Parameter, Stack};
use chrono::{DateTime, Utc};
use stackflow_cloud::{
    ChangeSetDescription, ChangeSetRequest, ChangeSetStatus, ChangeSetType, ControlPlane, Result,
    StackDescription, StackEvent, StackOutput, StackStatus,
};

/// [`ControlPlane`] backed by the CloudFormation API
pub struct CloudFormationControlPlane {
    client: Client,
    public_endpoint: bool,
}

impl CloudFormationControlPlane {
    /// Wrap a configured client; `custom_endpoint` marks a non-public endpoint such as a local emulator
    pub fn new(client: Client, custom_endpoint: bool) -> Self {
        Self {
            client,
            public_endpoint: !custom_endpoint,
        }
    }
}

fn describe(stack: &Stack) -> StackDescription {
    StackDescription {
        stack_id: stack.stack_id().unwrap_or_default().to_string(),
        stack_name: stack.stack_name().unwrap_or_default().to_string(),
        status: stack
            .stack_status()
            .map(|s| StackStatus::from(s.as_str()))
            .unwrap_or_else(|| StackStatus::Unknown(String::new())),
        status_reason: stack.stack_status_reason().map(str::to_string),
        outputs: stack
            .outputs()
            .iter()
            .filter_map(|o| {
                Some(StackOutput {
                    key: o.output_key()?.to_string(),
                    value: o.output_value().unwrap_or_default().to_string(),
                    description: o.description().map(str::to_string),
                })
            })
            .collect(),
    }
}

#[async_trait]
impl ControlPlane for CloudFormationControlPlane {
    fn is_public_endpoint(&self) -> bool {
        self.public_endpoint
    }

    async fn describe_stack(&self, stack_name: &str) -> Result<Option<StackDescription>> {
        let response = match self.client.describe_stacks().stack_name(stack_name).send().await {
            Ok(response) => response,
            Err(e) => {
                let err = AwsError::from_sdk("DescribeStacks", e);
                if err.is_missing_stack() {
                    return Ok(None);
                }
                return Err(err.into());
            }
        };
        Ok(response.stacks().first().map(describe))
    }

    async fn create_change_set(&self, request: &ChangeSetRequest) -> Result<String> {
        let parameters = request
            .parameters
            .iter()
            .map(|(key, value)| {
                Parameter::builder()
                    .parameter_key(key)
                    .parameter_value(value)
                    .build()
            })
            .collect::<Vec<_>>();
        let capabilities = request
            .capabilities
            .iter()
            .map(|c| Capability::from(c.as_str()))
            .collect::<Vec<_>>();
        let change_set_type = match request.change_set_type {
            ChangeSetType::Create => AwsChangeSetType::Create,
            ChangeSetType::Update => AwsChangeSetType::Update,
        };

        let response = self
            .client
            .create_change_set()
            .stack_name(&request.stack_name)
            .change_set_name(&request.change_set_name)
            .change_set_type(change_set_type)
            .template_body(&request.template_body)
            .set_parameters(Some(parameters))
            .set_capabilities(Some(capabilities))
            .send()
            .await
            .map_err(|e| AwsError::from_sdk("CreateChangeSet", e))?;

        response.id().map(str::to_string).ok_or_else(|| {
            AwsError::Api {
                operation: "CreateChangeSet".to_string(),
                code: "MissingId".to_string(),
                message: "response carried no change set id".to_string(),
            }
            .into()
        })
    }

    async fn describe_change_set(
        &self,
        stack_name: &str,
        change_set_id: &str,
    ) -> Result<ChangeSetDescription> {
        let response = self
            .client
            .describe_change_set()
            .stack_name(stack_name)
            .change_set_name(change_set_id)
            .send()
            .await
            .map_err(|e| AwsError::from_sdk("DescribeChangeSet", e))?;

        Ok(ChangeSetDescription {
            status: response
                .status()
                .map(|s| ChangeSetStatus::from(s.as_str()))
                .unwrap_or_else(|| ChangeSetStatus::Other(String::new())),
            status_reason: response.status_reason().map(str::to_string),
            change_count: response.changes().len(),
        })
    }

    async fn execute_change_set(&self, stack_name: &str, change_set_id: &str) -> Result<()> {
        self.client
            .execute_change_set()
            .stack_name(stack_name)
            .change_set_name(change_set_id)
            .send()
            .await
            .map_err(|e| AwsError::from_sdk("ExecuteChangeSet", e))?;
        Ok(())
    }

    async fn delete_change_set(&self, stack_name: &str, change_set_id: &str) -> Result<()> {
        self.client
            .delete_change_set()
            .stack_name(stack_name)
            .change_set_name(change_set_id)
            .send()
            .await
            .map_err(|e| AwsError::from_sdk("DeleteChangeSet", e))?;
        Ok(())
    }

    async fn delete_stack(&self, stack_name: &str) -> Result<()> {
        self.client
            .delete_stack()
            .stack_name(stack_name)
            .send()
            .await
            .map_err(|e| AwsError::from_sdk("DeleteStack", e))?;
        Ok(())
    }

    async fn describe_stack_events(&self, stack_name: &str) -> Result<Vec<StackEvent>> {
        let response = self
            .client
            .describe_stack_events()
            .stack_name(stack_name)
            .send()
            .await
            .map_err(|e| AwsError::from_sdk("DescribeStackEvents", e))?;

        Ok(response
            .stack_events()
            .iter()
            .map(|e| StackEvent {
                logical_resource_id: e.logical_resource_id().unwrap_or_default().to_string(),
                resource_type: e.resource_type().map(str::to_string),
                resource_status: e
                    .resource_status()
                    .map(|s| s.as_str().to_string())
                    .unwrap_or_default(),
                resource_status_reason: e.resource_status_reason().map(str::to_string),
                timestamp: e
                    .timestamp()
                    .and_then(|t| DateTime::<Utc>::from_timestamp(t.secs(), t.subsec_nanos())),
            })
            .collect())
    }
}
